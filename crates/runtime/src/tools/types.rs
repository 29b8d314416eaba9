//! Tool declarations and argument bags.

use super::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Primitive type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A named parameter in a tool's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub description: String,
    pub required: bool,
}

/// A tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Declare a required parameter.
    pub fn required(
        self,
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.param(name, ty, description, true)
    }

    /// Declare an optional parameter.
    pub fn optional(
        self,
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.param(name, ty, description, false)
    }

    fn param(
        mut self,
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            ty,
            description: description.into(),
            required,
        });
        self
    }

    /// Render the parameters as a JSON Schema object.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({ "type": p.ty.to_string(), "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Named arguments supplied by the model for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(pub Map<String, Value>);

impl ToolArguments {
    /// Fetch a required string argument.
    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.opt_str(name)?
            .ok_or_else(|| ToolError::invalid_input(format!("missing required argument `{name}`")))
    }

    /// Fetch an optional string argument.
    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, ToolError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ToolError::invalid_input(format!(
                "argument `{name}` must be a string, got {other}"
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

impl TryFrom<Value> for ToolArguments {
    type Error = ToolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ToolError::invalid_input(format!(
                "arguments must be an object, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_required_fields() {
        let spec = ToolSpec::new("schedule_appointment", "Book a slot")
            .required("datetime", ParamType::String, "UTC start time")
            .optional("purpose", ParamType::String, "Why");

        let schema = spec.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["datetime"]["type"], "string");
        assert_eq!(schema["required"], json!(["datetime"]));
    }

    #[test]
    fn arguments_from_object() {
        let args = ToolArguments::try_from(json!({"datetime": "2024-07-15T15:00:00Z"})).unwrap();
        assert_eq!(args.str("datetime").unwrap(), "2024-07-15T15:00:00Z");
        assert_eq!(args.opt_str("purpose").unwrap(), None);
    }

    #[test]
    fn null_arguments_are_empty() {
        let args = ToolArguments::try_from(Value::Null).unwrap();
        assert!(args.0.is_empty());
    }

    #[test]
    fn non_object_arguments_rejected() {
        let err = ToolArguments::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn wrong_argument_type_rejected() {
        let args = ToolArguments::try_from(json!({"datetime": 15})).unwrap();
        assert!(matches!(args.str("datetime"), Err(ToolError::InvalidInput(_))));
        assert!(matches!(args.str("missing"), Err(ToolError::InvalidInput(_))));
    }
}
