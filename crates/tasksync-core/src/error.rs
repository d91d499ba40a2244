use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::transport::TransportError;
use crate::wire;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    PreferencesCorrupt,
    NetworkFailure,
    TimeoutFailure,
    AuthFailure,
    PermissionDenied,
    ValidationFailure,
    TaskNotFound,
    ServerFailure,
    MalformedResponse,
    UnknownFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::PreferencesCorrupt => "E1002",
            Self::NetworkFailure => "E2001",
            Self::TimeoutFailure => "E2002",
            Self::AuthFailure => "E3001",
            Self::PermissionDenied => "E3002",
            Self::ValidationFailure => "E4001",
            Self::TaskNotFound => "E4002",
            Self::ServerFailure => "E5001",
            Self::MalformedResponse => "E5002",
            Self::UnknownFailure => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Invalid configuration",
            Self::PreferencesCorrupt => "Saved preferences unreadable",
            Self::NetworkFailure => "Server unreachable",
            Self::TimeoutFailure => "Request timed out",
            Self::AuthFailure => "Authentication required",
            Self::PermissionDenied => "Permission denied",
            Self::ValidationFailure => "Validation failed",
            Self::TaskNotFound => "Task not found",
            Self::ServerFailure => "Server error",
            Self::MalformedResponse => "Malformed server response",
            Self::UnknownFailure => "Request failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => {
                Some("Fix tasksync/config.toml or the TASKSYNC_* variables and retry.")
            }
            Self::PreferencesCorrupt => Some("Delete the preferences file to reset saved filters."),
            Self::NetworkFailure => Some("Check the base URL and your connection, then retry."),
            Self::TimeoutFailure => Some("Retry, or raise `timeout_secs` in the client config."),
            Self::AuthFailure => Some("Set TASKSYNC_TOKEN to a valid bearer token."),
            Self::PermissionDenied => Some("Ask the task owner for access."),
            Self::ValidationFailure => Some("Correct the highlighted fields and resubmit."),
            Self::TaskNotFound => Some("List tasks to find a valid id."),
            Self::ServerFailure => Some("Retry later. The server reported an internal error."),
            Self::MalformedResponse | Self::UnknownFailure => {
                Some("Retry once. If persistent, report a bug with logs.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Field name to validation messages, as returned with a 422.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Classified failure of a fetch or mutation.
///
/// Every transport failure maps to exactly one variant; nothing here is
/// fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No response reached the server.
    #[error("network failure: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// HTTP 422, or a draft rejected before it was sent.
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    /// HTTP 401. The session collaborator is expected to drop its token.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    /// HTTP 5xx.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Anything else, including undecodable success bodies (`status: None`).
    #[error("request failed: {message}")]
    Unknown {
        status: Option<u16>,
        message: String,
    },
}

impl ApiError {
    /// Build a validation failure for a single field.
    #[must_use]
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.clone()]);
        Self::Validation { message, fields }
    }

    /// A success response whose body could not be decoded.
    #[must_use]
    pub fn malformed(detail: impl fmt::Display) -> Self {
        Self::Unknown {
            status: None,
            message: format!("malformed response: {detail}"),
        }
    }

    /// Classify an HTTP error status plus its decoded body.
    #[must_use]
    pub fn from_status(status: u16, body: Option<&Value>) -> Self {
        let message = body
            .and_then(wire::error_message)
            .unwrap_or_else(|| default_status_message(status).to_string());

        match status {
            401 => Self::Auth { message },
            404 => Self::NotFound { message },
            422 => Self::Validation {
                message,
                fields: body.map(wire::field_errors).unwrap_or_default(),
            },
            500..=599 => Self::Server { status, message },
            _ => Self::Unknown {
                status: Some(status),
                message,
            },
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Network(_) => ErrorCode::NetworkFailure,
            Self::Timeout => ErrorCode::TimeoutFailure,
            Self::Validation { .. } => ErrorCode::ValidationFailure,
            Self::Auth { .. } => ErrorCode::AuthFailure,
            Self::NotFound { .. } => ErrorCode::TaskNotFound,
            Self::Server { .. } => ErrorCode::ServerFailure,
            Self::Unknown {
                status: Some(403), ..
            } => ErrorCode::PermissionDenied,
            Self::Unknown { status: None, .. } => ErrorCode::MalformedResponse,
            Self::Unknown { .. } => ErrorCode::UnknownFailure,
        }
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// HTTP 403: reported as an unknown failure, but callers may want to
    /// word it differently.
    #[must_use]
    pub const fn is_permission(&self) -> bool {
        matches!(
            self,
            Self::Unknown {
                status: Some(403),
                ..
            }
        )
    }

    /// Failures where the request may never have been processed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }

    /// Validation messages for one field, if any.
    #[must_use]
    pub fn field_errors(&self, field: &str) -> &[String] {
        match self {
            Self::Validation { fields, .. } => fields.get(field).map_or(&[][..], Vec::as_slice),
            _ => &[],
        }
    }

    /// HTTP status, when the failure carried one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::Validation { .. } => Some(422),
            Self::Server { status, .. } => Some(*status),
            Self::Unknown { status, .. } => *status,
            Self::Network(_) | Self::Timeout => None,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(detail) => Self::Network(detail),
            TransportError::Timeout => Self::Timeout,
            TransportError::Http { status, body } => Self::from_status(status, body.as_ref()),
        }
    }
}

const fn default_status_message(status: u16) -> &'static str {
    match status {
        401 => "session expired or token missing",
        403 => "you do not have permission to access this resource",
        404 => "resource not found",
        422 => "the given data was invalid",
        500..=599 => "there was a problem with the server",
        _ => "unexpected response status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::PreferencesCorrupt,
            ErrorCode::NetworkFailure,
            ErrorCode::TimeoutFailure,
            ErrorCode::AuthFailure,
            ErrorCode::PermissionDenied,
            ErrorCode::ValidationFailure,
            ErrorCode::TaskNotFound,
            ErrorCode::ServerFailure,
            ErrorCode::MalformedResponse,
            ErrorCode::UnknownFailure,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ValidationFailure.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn http_statuses_map_to_taxonomy() {
        assert!(matches!(ApiError::from_status(401, None), ApiError::Auth { .. }));
        assert!(matches!(ApiError::from_status(404, None), ApiError::NotFound { .. }));
        assert!(matches!(
            ApiError::from_status(503, None),
            ApiError::Server { status: 503, .. }
        ));
        assert!(matches!(
            ApiError::from_status(409, None),
            ApiError::Unknown {
                status: Some(409),
                ..
            }
        ));
    }

    #[test]
    fn validation_keeps_field_map() {
        let body = json!({
            "message": "The name field is required.",
            "errors": {"name": ["The name field is required."], "due_date": ["Bad date."]}
        });
        let err = ApiError::from_status(422, Some(&body));
        assert_eq!(err.code(), ErrorCode::ValidationFailure);
        assert_eq!(err.field_errors("name"), ["The name field is required."]);
        assert_eq!(err.field_errors("due_date"), ["Bad date."]);
        assert!(err.field_errors("status").is_empty());
        assert_eq!(err.to_string(), "The name field is required.");
    }

    #[test]
    fn forbidden_is_unknown_but_flagged() {
        let err = ApiError::from_status(403, Some(&json!({"message": "nope"})));
        assert!(err.is_permission());
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn transport_errors_classify() {
        assert_eq!(ApiError::from(TransportError::Timeout), ApiError::Timeout);
        let err = ApiError::from(TransportError::Network("refused".into()));
        assert!(err.is_transient());
        assert_eq!(err.status(), None);
        let err = ApiError::from(TransportError::Http {
            status: 401,
            body: None,
        });
        assert!(err.is_auth());
    }
}
