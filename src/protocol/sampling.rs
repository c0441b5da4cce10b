//! Sampling message types: the server asks the client's model to generate text

use serde::{Deserialize, Serialize};

use super::Role;

/// Content carried by sampling messages and tool results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text
    Text {
        /// The text
        text: String,
    },
    /// Base64 encoded image
    Image {
        /// The base64-encoded image data
        data: String,
        /// The MIME type of the image
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl Content {
    /// Text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text, if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A message in a sampling conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingMessage {
    /// The role of the message sender
    pub role: Role,

    /// The content of the message
    pub content: Content,
}

impl SamplingMessage {
    /// A user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::text(text),
        }
    }

    /// An assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::text(text),
        }
    }
}

/// Include context option for sampling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum IncludeContext {
    /// Don't include any server context
    None,
    /// Include context from this server only
    ThisServer,
    /// Include context from all servers
    AllServers,
}

/// Model preferences for sampling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelPreferences {
    /// Optional hints for model selection, in order of preference
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hints: Vec<ModelHint>,

    /// How much to prioritize cost when selecting a model
    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,

    /// How much to prioritize sampling speed when selecting a model
    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,

    /// How much to prioritize intelligence when selecting a model
    #[serde(rename = "intelligencePriority", skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f64>,
}

impl ModelPreferences {
    /// Prefer a model by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            hints: vec![ModelHint { name: Some(name.into()) }],
            ..Self::default()
        }
    }

    /// Create model preferences with priorities, each clamped to `[0, 1]`
    pub fn with_priorities(cost: f64, speed: f64, intelligence: f64) -> Self {
        Self {
            hints: Vec::new(),
            cost_priority: Some(cost.clamp(0.0, 1.0)),
            speed_priority: Some(speed.clamp(0.0, 1.0)),
            intelligence_priority: Some(intelligence.clamp(0.0, 1.0)),
        }
    }
}

/// Hint for model selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelHint {
    /// A hint for a model name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Parameters for a `sampling/createMessage` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageParams {
    /// Messages in the conversation history
    pub messages: Vec<SamplingMessage>,

    /// The server's preferences for which model to select
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,

    /// An optional system prompt
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// A request to include context from one or more MCP servers
    #[serde(rename = "includeContext", skip_serializing_if = "Option::is_none")]
    pub include_context: Option<IncludeContext>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Maximum number of tokens to sample
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,

    /// Optional stop sequences
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl CreateMessageParams {
    /// Create parameters for the given conversation
    pub fn new(messages: Vec<SamplingMessage>, max_tokens: u32) -> Self {
        Self {
            messages,
            model_preferences: None,
            system_prompt: None,
            include_context: None,
            temperature: None,
            max_tokens,
            stop_sequences: None,
        }
    }

    /// A single user prompt
    pub fn prompt(text: impl Into<String>, max_tokens: u32) -> Self {
        Self::new(vec![SamplingMessage::user(text)], max_tokens)
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the model preferences
    pub fn with_model_preferences(mut self, preferences: ModelPreferences) -> Self {
        self.model_preferences = Some(preferences);
        self
    }

    /// Set the context-inclusion flag
    pub fn with_include_context(mut self, include: IncludeContext) -> Self {
        self.include_context = Some(include);
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The client's response to a `sampling/createMessage` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageResult {
    /// The role that produced the message
    pub role: Role,

    /// The content of the message
    pub content: Content,

    /// The name of the model that generated the message
    pub model: String,

    /// The reason why sampling stopped, if known
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl CreateMessageResult {
    /// An assistant text reply
    pub fn text(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::text(text),
            model: model.into(),
            stop_reason: Some("endTurn".to_string()),
        }
    }

    /// The generated text, empty for non-text content
    pub fn as_text(&self) -> &str {
        self.content.as_text().unwrap_or_default()
    }
}
