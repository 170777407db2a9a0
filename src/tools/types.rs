//! Tool definitions and parameter schemas.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::registry::namespaced_tool_name;

/// A tool advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input_schema: ToolInputSchema,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ToolInputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Rename to `<collaborator>__<name>`.
    pub fn namespaced(mut self, collaborator: &str) -> Self {
        self.name = namespaced_tool_name(collaborator, &self.name);
        self
    }
}

/// JSON Schema object describing a tool's parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInputSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_string()
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: object_type(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

impl ToolInputSchema {
    /// Start building an object schema.
    pub fn object() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Lenient conversion from a schema handed over by a tool server.
    ///
    /// Missing fields default; `required` entries that are not strings are dropped.
    pub fn from_value(value: &Value) -> Self {
        let schema_type = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(object_type);
        let properties = value
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let required = value
            .get("required")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            schema_type,
            properties,
            required,
        }
    }

    /// Schema as JSON; `required` is always present, possibly empty.
    pub fn to_value(&self) -> Value {
        json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// Builder for constructing tool parameter schemas.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    fn property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }

    /// Add a string property.
    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = json!({ "type": "string", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add a number property.
    pub fn number(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = json!({ "type": "number", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add a boolean property.
    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = json!({ "type": "boolean", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add an enum (string) property.
    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        let schema = json!({
            "type": "string",
            "description": description.into(),
            "enum": values,
        });
        self.property(name, schema, required)
    }

    pub fn build(self) -> ToolInputSchema {
        ToolInputSchema {
            schema_type: object_type(),
            properties: self.properties,
            required: self.required,
        }
    }
}
