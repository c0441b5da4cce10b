//! Progress notifications

use serde::{Deserialize, Serialize};

use super::ProgressToken;

/// Parameters of `notifications/progress`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressParams {
    /// Token of the request this progress belongs to
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,
    /// Progress so far; increases with every notification
    pub progress: f64,
    /// Total units of work, absent when unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Optional status message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressParams {
    /// Completion percentage, `None` for indeterminate progress
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0.0 => Some(self.progress / total * 100.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let mut params = ProgressParams {
            progress_token: ProgressToken::Integer(1),
            progress: 2.0,
            total: Some(5.0),
            message: None,
        };
        assert_eq!(params.percentage(), Some(40.0));

        params.total = None;
        assert_eq!(params.percentage(), None);
    }
}
