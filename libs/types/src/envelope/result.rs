//! Uniform result envelope returned by every adapter operation
//!
//! An [`AdapterResult`] is either a success carrying data or a failure
//! carrying an [`ErrorInfo`], never both and never neither. The fields are
//! private and the only constructors are [`AdapterResult::ok`] and
//! [`AdapterResult::err`], so the invariant holds by construction.

use serde::Serialize;

/// Error payload of a failed operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    /// Stable machine-readable code, e.g. `ADAPTER_DISABLED`
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Structured context (`operation`, `adapter`, `version`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Error without details
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Execution metadata attached to every result produced by an adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// Wall-clock execution time in milliseconds
    pub execution_time: f64,
    /// Served from cache
    pub cache_hit: bool,
    /// Produced by the operation's fallback hook
    pub fallback_used: bool,
    /// Version of the adapter that produced the result
    pub adapter_version: String,
}

/// Result envelope: success with data, or failure with error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterResult<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ResultMetadata>,
}

impl<T> AdapterResult<T> {
    /// Successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: None,
        }
    }

    /// Failed result
    pub fn err(error: ErrorInfo) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            metadata: None,
        }
    }

    /// Attach execution metadata
    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn metadata(&self) -> Option<&ResultMetadata> {
        self.metadata.as_ref()
    }

    /// Consume into a standard `Result`
    pub fn into_result(self) -> Result<T, ErrorInfo> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            // Unreachable through the public constructors
            (None, None) => Err(ErrorInfo::new("ADAPTER_ERROR", "result carried no data")),
        }
    }

    /// Transform the success payload, keeping error and metadata
    pub fn map<U, F>(self, f: F) -> AdapterResult<U>
    where
        F: FnOnce(T) -> U,
    {
        AdapterResult {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            metadata: self.metadata,
        }
    }
}
