//! Utility functions and types for the MCP SDK

pub mod uri;

// Re-export commonly used utilities
pub use self::uri::{expand_template, is_valid_uri, match_template, template_pattern};
