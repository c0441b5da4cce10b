//! Elicitation types: server-initiated requests for end-user input

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Parameters of an `elicitation/create` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitRequestParams {
    /// Text presented to the user
    pub message: String,
    /// JSON schema describing the expected answer.
    ///
    /// Absent for plain confirmations, where only accept/decline/cancel matters.
    #[serde(rename = "requestedSchema", skip_serializing_if = "Option::is_none")]
    pub requested_schema: Option<Value>,
}

impl ElicitRequestParams {
    /// A confirmation without structured content
    pub fn confirm(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requested_schema: None,
        }
    }

    /// A request for content matching `schema`
    pub fn with_schema(message: impl Into<String>, schema: Value) -> Self {
        Self {
            message: message.into(),
            requested_schema: Some(schema),
        }
    }
}

/// What the user did with an elicitation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElicitAction {
    /// The user supplied the requested input
    Accept,
    /// The user explicitly refused
    Decline,
    /// The user dismissed the request
    Cancel,
}

/// The client's answer to an elicitation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitResult {
    /// The user's action
    pub action: ElicitAction,
    /// Content matching the requested schema, present only on accept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl ElicitResult {
    /// Accept with content
    pub fn accept(content: Value) -> Self {
        Self {
            action: ElicitAction::Accept,
            content: Some(content),
        }
    }

    /// Accept a schema-less confirmation
    pub fn accept_empty() -> Self {
        Self {
            action: ElicitAction::Accept,
            content: None,
        }
    }

    /// Decline
    pub fn decline() -> Self {
        Self {
            action: ElicitAction::Decline,
            content: None,
        }
    }

    /// Cancel
    pub fn cancel() -> Self {
        Self {
            action: ElicitAction::Cancel,
            content: None,
        }
    }

    /// Whether the user accepted
    pub fn is_accepted(&self) -> bool {
        self.action == ElicitAction::Accept
    }

    /// Check accepted content against the schema it was requested with.
    ///
    /// Declines and cancels carry no content and always pass. Only the flat
    /// object schemas elicitation uses are checked: required properties
    /// must be present and primitive properties must have their declared type.
    pub fn validate(&self, schema: &Value) -> Result<(), Error> {
        if !self.is_accepted() {
            return Ok(());
        }
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| Error::InvalidParams("accepted elicitation carries no content".to_string()))?;
        let fields = content
            .as_object()
            .ok_or_else(|| Error::InvalidParams(format!("elicitation content is not an object: {}", content)))?;

        let required = schema["required"].as_array().into_iter().flatten().filter_map(Value::as_str);
        for name in required {
            if !fields.contains_key(name) {
                return Err(Error::InvalidParams(format!("elicitation content is missing `{}`", name)));
            }
        }

        let Some(properties) = schema["properties"].as_object() else {
            return Ok(());
        };
        for (name, value) in fields {
            let Some(expected) = properties.get(name).and_then(|p| p["type"].as_str()) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                _ => true,
            };
            if !matches {
                return Err(Error::InvalidParams(format!(
                    "elicitation field `{}` should be {}, got {}",
                    name, expected, value
                )));
            }
        }
        Ok(())
    }

    /// Read the accepted content as `T`
    pub fn content_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.content
            .as_ref()
            .and_then(|c| serde_json::from_value(c.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decline_has_no_content() {
        let value = serde_json::to_value(ElicitResult::decline()).unwrap();
        assert_eq!(value, json!({"action": "decline"}));
    }

    #[test]
    fn test_content_as() {
        #[derive(Deserialize)]
        struct UserInfo {
            name: String,
            age: u32,
        }

        let result: ElicitResult =
            serde_json::from_value(json!({"action": "accept", "content": {"name": "Ada", "age": 36}})).unwrap();
        let info: UserInfo = result.content_as().unwrap();
        assert_eq!(info.name, "Ada");
        assert_eq!(info.age, 36);
    }

    #[test]
    fn test_validate_against_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"},
                "subscribe": {"type": "boolean"}
            },
            "required": ["name"]
        });

        assert!(ElicitResult::accept(json!({"name": "Ada", "age": 36})).validate(&schema).is_ok());
        assert!(ElicitResult::decline().validate(&schema).is_ok());
        assert!(ElicitResult::cancel().validate(&schema).is_ok());
        // Properties the schema does not mention are left alone
        assert!(ElicitResult::accept(json!({"name": "Ada", "nick": 1})).validate(&schema).is_ok());

        for bad in [
            ElicitResult::accept_empty(),
            ElicitResult::accept(json!("Ada")),
            ElicitResult::accept(json!({"age": 36})),
            ElicitResult::accept(json!({"name": 7})),
            ElicitResult::accept(json!({"name": "Ada", "age": 36.5})),
            ElicitResult::accept(json!({"name": "Ada", "subscribe": "yes"})),
        ] {
            assert!(matches!(bad.validate(&schema), Err(Error::InvalidParams(_))), "{bad:?} passed");
        }
    }
}
