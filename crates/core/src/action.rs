//! Action results — the uniform outcome of every handler invocation.
//!
//! The dispatcher never returns an error across its public boundary. Every
//! failure, whether a malformed tag or a network error inside a handler, is
//! folded into an [`ActionResult`] with `success: false`.

use serde::{Deserialize, Serialize};

use crate::error::ActionError;

/// Classification of an action failure, mirroring [`ActionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionErrorKind {
    MalformedTag,
    UnknownAction,
    Validation,
    Handler,
}

/// The error half of an [`ActionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub kind: ActionErrorKind,
    pub message: String,
}

/// The result of executing one action (or a merged round of actions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionFailure>,
}

impl ActionResult {
    /// A successful result carrying `data`.
    pub fn ok(data: impl Into<serde_json::Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    /// A failed result with the given kind and message.
    pub fn failure(kind: ActionErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ActionFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    /// The failure message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    /// Render the result as text suitable for feeding back to the model.
    pub fn to_feedback(&self) -> String {
        match (&self.error, &self.data) {
            (Some(err), _) => format!("Error: {}", err.message),
            (None, Some(serde_json::Value::String(s))) => s.clone(),
            (None, Some(value)) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            (None, None) => "OK".to_string(),
        }
    }
}

impl From<ActionError> for ActionResult {
    fn from(err: ActionError) -> Self {
        let kind = match &err {
            ActionError::MalformedTag { .. } => ActionErrorKind::MalformedTag,
            ActionError::UnknownAction { .. } => ActionErrorKind::UnknownAction,
            ActionError::Validation { .. } => ActionErrorKind::Validation,
            ActionError::Handler { .. } => ActionErrorKind::Handler,
        };
        Self::failure(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;

    #[test]
    fn ok_result_has_no_error() {
        let result = ActionResult::ok("Task completed");
        assert!(result.success);
        assert_eq!(result.data, Some(serde_json::json!("Task completed")));
        assert!(result.error.is_none());
    }

    #[test]
    fn action_error_converts_with_kind() {
        let result = ActionResult::from(ActionError::UnknownAction {
            tag: "launch_rocket".into(),
        });
        assert!(!result.success);
        let err = result.error.unwrap();
        assert_eq!(err.kind, ActionErrorKind::UnknownAction);
        assert_eq!(err.message, "Unknown action type: launch_rocket");
    }

    #[test]
    fn handler_error_message_is_passed_through() {
        let result = ActionResult::from(ActionError::handler(
            "read_file",
            CollaboratorError::NotFound("src/missing.rs".into()),
        ));
        assert_eq!(result.error_message(), Some("Not found: src/missing.rs"));
    }

    #[test]
    fn feedback_renders_strings_verbatim() {
        assert_eq!(ActionResult::ok("done").to_feedback(), "done");
        let failed = ActionResult::failure(ActionErrorKind::Validation, "bad path");
        assert_eq!(failed.to_feedback(), "Error: bad path");
    }

    #[test]
    fn kind_serializes_snake_case() {
        let result = ActionResult::failure(ActionErrorKind::MalformedTag, "x");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""kind":"malformed_tag""#));
        assert!(!json.contains("data"));
    }
}
