//! Tool registration, execution and batch dispatch.

mod dispatcher;
pub mod errors;
mod executor;
mod registry;
mod r#trait;
mod types;

pub use dispatcher::TurnDispatcher;
pub use errors::ToolError;
pub use executor::ToolExecutor;
pub use registry::ToolRegistry;
pub use r#trait::{FnTool, Tool};
pub use types::{ParamType, Parameter, ToolArguments, ToolSpec};
