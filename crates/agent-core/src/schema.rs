//! Response Schema
//!
//! Explicit descriptor for the structured final response: an ordered list of
//! named, typed, described fields. Consumed identically by the bind-as-tool
//! validation path and the structured-call request.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{AgentError, Result};
use crate::tool::{ParameterSpec, ToolSpec};

/// Field value type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
}

impl FieldType {
    /// JSON Schema type name
    pub fn json_name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
        }
    }

    /// Whether a JSON value inhabits this type
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
        }
    }
}

/// One field of the response schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name
    pub name: String,

    /// Value type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Whether the field must be present
    #[serde(default)]
    pub required: bool,
}

/// A named record type with a fixed set of typed, described fields.
///
/// Declared once, shared read-only across invocations. In the bind-as-tool
/// strategy the schema is also advertised as a callable pseudo-tool under
/// its own name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Schema name; doubles as the pseudo-tool name
    pub name: String,

    /// What the final response represents
    pub description: String,

    /// Ordered field definitions
    pub fields: Vec<FieldSpec>,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field
    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            description: description.into(),
            required: true,
        });
        self
    }

    /// Add an optional field
    pub fn optional_field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            description: description.into(),
            required: false,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render as a JSON Schema object suitable for a structured-output
    /// request. Unknown fields are rejected by the schema itself.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                json!({
                    "type": field.field_type.json_name(),
                    "description": field.description,
                }),
            );
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Render as a callable pseudo-tool for the bind-as-tool strategy
    pub fn as_tool_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self
                .fields
                .iter()
                .map(|f| ParameterSpec {
                    name: f.name.clone(),
                    param_type: f.field_type.json_name().into(),
                    description: f.description.clone(),
                    required: f.required,
                    enum_values: None,
                })
                .collect(),
        }
    }

    /// Check a value against the declared field set: every required field
    /// present, every present field well-typed, no undeclared fields.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let object = value.as_object().ok_or_else(|| {
            AgentError::SchemaConformance(format!(
                "expected an object for schema '{}', got {}",
                self.name, value
            ))
        })?;

        for field in &self.fields {
            match object.get(&field.name) {
                Some(v) if !field.field_type.matches(v) => {
                    return Err(AgentError::SchemaConformance(format!(
                        "field '{}' expected {}, got {}",
                        field.name,
                        field.field_type.json_name(),
                        v
                    )));
                }
                None if field.required => {
                    return Err(AgentError::SchemaConformance(format!(
                        "missing required field '{}'",
                        field.name
                    )));
                }
                _ => {}
            }
        }

        for key in object.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                return Err(AgentError::SchemaConformance(format!(
                    "field '{}' is not declared by schema '{}'",
                    key, self.name
                )));
            }
        }

        Ok(())
    }

    /// Build the final object directly from tool-call arguments, validating
    /// on the way. There is no second chance to ask the model to fix a
    /// non-conformant payload.
    pub fn from_arguments(&self, arguments: Map<String, Value>) -> Result<Value> {
        let value = Value::Object(arguments);
        self.validate(&value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_schema() -> ResponseSchema {
        ResponseSchema::new("weather_response", "Final weather report")
            .field("temperature", FieldType::Number, "Temperature in degrees")
            .field("wind_direction", FieldType::String, "Compass direction")
            .field("wind_speed", FieldType::Number, "Wind speed")
    }

    #[test]
    fn test_validate_accepts_conformant_object() {
        let schema = weather_schema();
        let value = json!({
            "temperature": 75.0,
            "wind_direction": "SE",
            "wind_speed": 3.0,
        });
        assert!(schema.validate(&value).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_required_field() {
        let schema = weather_schema();
        let value = json!({"temperature": 75.0, "wind_direction": "SE"});
        let err = schema.validate(&value).unwrap_err();
        assert!(matches!(err, AgentError::SchemaConformance(_)));
        assert!(err.to_string().contains("wind_speed"));
    }

    #[test]
    fn test_validate_rejects_mistyped_field() {
        let schema = weather_schema();
        let value = json!({
            "temperature": "seventy-five",
            "wind_direction": "SE",
            "wind_speed": 3.0,
        });
        assert!(schema.validate(&value).is_err());
    }

    #[test]
    fn test_validate_rejects_undeclared_field() {
        let schema = weather_schema();
        let value = json!({
            "temperature": 75.0,
            "wind_direction": "SE",
            "wind_speed": 3.0,
            "humidity": 40,
        });
        assert!(schema.validate(&value).is_err());
    }

    #[test]
    fn test_integer_and_number_distinction() {
        let schema = ResponseSchema::new("counts", "Counts")
            .field("total", FieldType::Integer, "Total count");

        assert!(schema.validate(&json!({"total": 3})).is_ok());
        assert!(schema.validate(&json!({"total": 3.5})).is_err());

        // Number accepts integral values
        let loose = ResponseSchema::new("m", "Measurement")
            .field("value", FieldType::Number, "Value");
        assert!(loose.validate(&json!({"value": 75})).is_ok());
    }

    #[test]
    fn test_optional_field_may_be_absent() {
        let schema = weather_schema().optional_field(
            "conditions",
            FieldType::String,
            "Sky conditions",
        );
        let value = json!({
            "temperature": 75.0,
            "wind_direction": "SE",
            "wind_speed": 3.0,
        });
        assert!(schema.validate(&value).is_ok());
    }

    #[test]
    fn test_json_schema_rendering() {
        let rendered = weather_schema().to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["additionalProperties"], json!(false));
        assert_eq!(rendered["properties"]["temperature"]["type"], "number");
        assert_eq!(
            rendered["required"],
            json!(["temperature", "wind_direction", "wind_speed"])
        );
    }

    #[test]
    fn test_pseudo_tool_spec() {
        let spec = weather_schema().as_tool_spec();
        assert_eq!(spec.name, "weather_response");
        assert_eq!(spec.parameters.len(), 3);
        assert!(spec.parameters.iter().all(|p| p.required));
    }
}
