//! Error types for the Opsgate control plane.
//!
//! This crate provides the foundation error types used throughout the
//! Opsgate workspace. Each category is a small struct that captures the
//! source location of the failure, folded into [`OpsgateErrorKind`] and
//! boxed inside [`OpsgateError`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Permission error: the resolved role lacks the required action.
#[derive(Debug, Clone)]
pub struct PermissionError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl PermissionError {
    /// Create a new PermissionError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Permission Denied: {} at line {} in {}",
            self.message, self.line, self.file
        )
    }
}

impl std::error::Error for PermissionError {}

/// Validation error: malformed workspace name, unknown role, mode,
/// connector, or a missing required field.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new ValidationError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Validation Error: {} at line {} in {}",
            self.message, self.line, self.file
        )
    }
}

impl std::error::Error for ValidationError {}

/// Not-found error: an approval, alert, schedule, source, or invite id
/// matched nothing.
#[derive(Debug, Clone)]
pub struct NotFoundError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl NotFoundError {
    /// Create a new NotFoundError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Not Found: {} at line {} in {}",
            self.message, self.line, self.file
        )
    }
}

impl std::error::Error for NotFoundError {}

/// Failure codes for the approval-token protocol.
///
/// Each maps to a distinct wire error code; every failure is paired
/// with a freshly issued replacement token so the caller can retry
/// without re-planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalCode {
    /// The action requires a token and none was supplied.
    Required,
    /// The supplied token has passed its TTL.
    Expired,
    /// The token is bound to different action/parameters.
    Mismatch,
    /// The token does not exist (never issued, or already consumed).
    Invalid,
    /// High-risk execution is missing a human-supplied justification.
    ReasonRequired,
}

impl ApprovalCode {
    /// Stable wire code for this failure.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalCode::Required => "approval_required",
            ApprovalCode::Expired => "approval_expired",
            ApprovalCode::Mismatch => "approval_mismatch",
            ApprovalCode::Invalid => "approval_invalid",
            ApprovalCode::ReasonRequired => "approval_reason_required",
        }
    }
}

/// Approval-token protocol error.
#[derive(Debug, Clone)]
pub struct ApprovalError {
    /// Protocol failure code
    pub code: ApprovalCode,
    /// Error message
    pub message: String,
    /// Replacement token issued alongside the failure, when one applies
    pub reissued_token: Option<String>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ApprovalError {
    /// Create a new ApprovalError at the current location.
    #[track_caller]
    pub fn new(code: ApprovalCode, message: impl Into<String>, reissued_token: Option<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            code,
            message: message.into(),
            reissued_token,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for ApprovalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Approval Error [{}]: {} at line {} in {}",
            self.code.as_str(),
            self.message,
            self.line,
            self.file
        )
    }
}

impl std::error::Error for ApprovalError {}

/// Rate-limit error with a retry-after hint.
#[derive(Debug, Clone)]
pub struct RateLimitError {
    /// Error message
    pub message: String,
    /// Seconds until the window resets
    pub retry_after_secs: u64,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl RateLimitError {
    /// Create a new RateLimitError at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>, retry_after_secs: u64) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            retry_after_secs,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rate Limited: {} (retry after {}s) at line {} in {}",
            self.message, self.retry_after_secs, self.line, self.file
        )
    }
}

impl std::error::Error for RateLimitError {}

/// Access-gate error: missing or invalid gateway key, or a disallowed
/// origin.
#[derive(Debug, Clone)]
pub struct AccessError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl AccessError {
    /// Create a new AccessError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for AccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Access Denied: {} at line {} in {}",
            self.message, self.line, self.file
        )
    }
}

impl std::error::Error for AccessError {}

/// Storage error: document I/O or serialization failure.
#[derive(Debug, Clone)]
pub struct StorageError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl StorageError {
    /// Create a new StorageError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Storage Error: {} at line {} in {}",
            self.message, self.line, self.file
        )
    }
}

impl std::error::Error for StorageError {}

/// Upstream collaborator error: the external advertising/messaging API
/// reported a failure.
#[derive(Debug, Clone)]
pub struct UpstreamError {
    /// HTTP status reported by the upstream API
    pub status: u16,
    /// Upstream error code
    pub code: String,
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl UpstreamError {
    /// Create a new UpstreamError at the current location.
    #[track_caller]
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            status,
            code: code.into(),
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Upstream Error [{} {}]: {} at line {} in {}",
            self.status, self.code, self.message, self.line, self.file
        )
    }
}

impl std::error::Error for UpstreamError {}

/// Workspace-level error variants.
#[derive(Debug, derive_more::From)]
pub enum OpsgateErrorKind {
    /// Role lacks the required action
    Permission(PermissionError),
    /// Malformed or unknown input
    Validation(ValidationError),
    /// Entity id matched nothing
    NotFound(NotFoundError),
    /// Approval-token protocol failure
    Approval(ApprovalError),
    /// Admission window exceeded
    RateLimit(RateLimitError),
    /// Access gate refused the request
    Access(AccessError),
    /// Document I/O or serialization failure
    Storage(StorageError),
    /// External API collaborator failure
    Upstream(UpstreamError),
}

impl OpsgateErrorKind {
    /// Stable wire code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            OpsgateErrorKind::Permission(_) => "permission_denied",
            OpsgateErrorKind::Validation(_) => "validation_error",
            OpsgateErrorKind::NotFound(_) => "not_found",
            OpsgateErrorKind::Approval(e) => e.code.as_str(),
            OpsgateErrorKind::RateLimit(_) => "rate_limited",
            OpsgateErrorKind::Access(_) => "access_denied",
            OpsgateErrorKind::Storage(_) => "storage_error",
            OpsgateErrorKind::Upstream(_) => "upstream_error",
        }
    }
}

impl std::fmt::Display for OpsgateErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpsgateErrorKind::Permission(e) => write!(f, "{}", e),
            OpsgateErrorKind::Validation(e) => write!(f, "{}", e),
            OpsgateErrorKind::NotFound(e) => write!(f, "{}", e),
            OpsgateErrorKind::Approval(e) => write!(f, "{}", e),
            OpsgateErrorKind::RateLimit(e) => write!(f, "{}", e),
            OpsgateErrorKind::Access(e) => write!(f, "{}", e),
            OpsgateErrorKind::Storage(e) => write!(f, "{}", e),
            OpsgateErrorKind::Upstream(e) => write!(f, "{}", e),
        }
    }
}

/// Opsgate error with kind discrimination.
#[derive(Debug)]
pub struct OpsgateError(Box<OpsgateErrorKind>);

impl OpsgateError {
    /// Create a new error from a kind.
    pub fn new(kind: OpsgateErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &OpsgateErrorKind {
        &self.0
    }

    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        self.0.code()
    }
}

impl std::fmt::Display for OpsgateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Opsgate Error: {}", self.0)
    }
}

impl std::error::Error for OpsgateError {}

// Generic From implementation for any type that converts to OpsgateErrorKind
impl<T> From<T> for OpsgateError
where
    T: Into<OpsgateErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Opsgate operations.
pub type OpsgateResult<T> = std::result::Result<T, OpsgateError>;
