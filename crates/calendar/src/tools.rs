//! Tools exposing the appointment book to the model.

use crate::book::{AppointmentBook, BookError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runtime::{ParamType, Tool, ToolArguments, ToolError, ToolRegistry, ToolSpec};
use serde_json::{Value, json};
use std::sync::Arc;

pub const CHECK_AVAILABILITY: &str = "check_appointment_availability";
pub const SCHEDULE: &str = "schedule_appointment";
pub const DELETE: &str = "delete_appointment";

const DATETIME_HELP: &str = "Start of the slot as an RFC 3339 UTC date-time, e.g. 2024-07-15T15:00:00Z";

impl From<BookError> for ToolError {
    fn from(err: BookError) -> Self {
        ToolError::execution(err.to_string())
    }
}

fn check_availability_spec() -> ToolSpec {
    ToolSpec::new(
        CHECK_AVAILABILITY,
        "Check whether the owner is free for an appointment starting at the given time.",
    )
    .required("datetime", ParamType::String, DATETIME_HELP)
}

fn schedule_spec() -> ToolSpec {
    ToolSpec::new(
        SCHEDULE,
        "Book an appointment with the owner. Fails if the slot is taken or in the past.",
    )
    .required("datetime", ParamType::String, DATETIME_HELP)
    .required("attendee", ParamType::String, "Name of the person meeting the owner")
    .optional("purpose", ParamType::String, "What the appointment is about")
}

fn delete_spec() -> ToolSpec {
    ToolSpec::new(
        DELETE,
        "Cancel the appointment that starts exactly at the given time.",
    )
    .required("datetime", ParamType::String, DATETIME_HELP)
}

/// The declared catalog, in the order it is offered to the model.
pub fn catalog() -> Vec<ToolSpec> {
    vec![check_availability_spec(), schedule_spec(), delete_spec()]
}

/// Register all calendar tools against one shared book.
pub fn register(registry: &mut ToolRegistry, book: Arc<AppointmentBook>) -> runtime::Result<()> {
    registry.register(Arc::new(CheckAvailability::new(book.clone())))?;
    registry.register(Arc::new(Schedule::new(book.clone())))?;
    registry.register(Arc::new(Delete::new(book)))?;
    Ok(())
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, ToolError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ToolError::invalid_input(format!("`{raw}` is not an RFC 3339 date-time: {e}")))
}

pub struct CheckAvailability {
    spec: ToolSpec,
    book: Arc<AppointmentBook>,
}

impl CheckAvailability {
    pub fn new(book: Arc<AppointmentBook>) -> Self {
        Self {
            spec: check_availability_spec(),
            book,
        }
    }
}

#[async_trait]
impl Tool for CheckAvailability {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let start = parse_datetime(arguments.str("datetime")?)?;
        let conflict = self.book.conflict(start).await;

        let mut output = json!({
            "datetime": start.to_rfc3339(),
            "available": conflict.is_none(),
        });
        if let Some(existing) = conflict {
            output["conflicts_with"] = json!(existing.start.to_rfc3339());
        }
        Ok(output)
    }
}

pub struct Schedule {
    spec: ToolSpec,
    book: Arc<AppointmentBook>,
}

impl Schedule {
    pub fn new(book: Arc<AppointmentBook>) -> Self {
        Self {
            spec: schedule_spec(),
            book,
        }
    }
}

#[async_trait]
impl Tool for Schedule {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let start = parse_datetime(arguments.str("datetime")?)?;
        let attendee = arguments.str("attendee")?.trim();
        if attendee.is_empty() {
            return Err(ToolError::invalid_input("`attendee` must not be empty"));
        }
        let purpose = arguments.opt_str("purpose")?.map(str::to_string);

        let appointment = self
            .book
            .schedule(start, attendee, purpose, Utc::now())
            .await?;
        Ok(json!({ "scheduled": appointment }))
    }
}

pub struct Delete {
    spec: ToolSpec,
    book: Arc<AppointmentBook>,
}

impl Delete {
    pub fn new(book: Arc<AppointmentBook>) -> Self {
        Self {
            spec: delete_spec(),
            book,
        }
    }
}

#[async_trait]
impl Tool for Delete {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let start = parse_datetime(arguments.str("datetime")?)?;
        let removed = self.book.cancel(start).await?;
        Ok(json!({ "deleted": removed }))
    }
}
