//! Error types for catalog repository operations.
//!
//! Every failure carries an [`ErrorContext`] naming the operation and entity
//! involved, so a log line is enough to tell which merge or lookup failed.

use std::fmt;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Where a repository failure happened.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// e.g. "merge_targets", "get_target"
    pub operation: Option<String>,
    /// e.g. "target", "location"
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub retryable: bool,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("operation", self.operation.as_deref()),
            ("entity", self.entity.as_deref()),
            ("id", self.entity_id.as_deref()),
            ("details", self.details.as_deref()),
        ];
        let mut parts: Vec<String> = fields
            .iter()
            .filter_map(|(name, value)| value.map(|v| format!("{}={}", name, v)))
            .collect();
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Failure of a [`super::CatalogRepository`] call.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Backing store unavailable; worth retrying.
    #[error("Connection error: {message} {context}")]
    ConnectionError { message: String, context: ErrorContext },

    #[error("Not found: {message} {context}")]
    NotFound { message: String, context: ErrorContext },

    /// Request rejected before touching stored data.
    #[error("Data validation error: {message} {context}")]
    ValidationError { message: String, context: ErrorContext },

    /// A multi-record change could not be committed; nothing was applied.
    #[error("Transaction error: {message} {context}")]
    TransactionError { message: String, context: ErrorContext },
}

impl RepositoryError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            context: ErrorContext {
                retryable: true,
                ..Default::default()
            },
        }
    }

    pub fn not_found_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    pub fn validation_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ValidationError {
            message: message.into(),
            context,
        }
    }

    pub fn transaction_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::TransactionError {
            message: message.into(),
            context,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::ConnectionError { context, .. }
            | Self::NotFound { context, .. }
            | Self::ValidationError { context, .. }
            | Self::TransactionError { context, .. } => context,
        }
    }
}
