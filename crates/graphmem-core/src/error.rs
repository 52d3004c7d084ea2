//! Error types for graphmem operations.
//!
//! This module provides a single error hierarchy with structured error codes
//! and suggestions for resolution, shared by the drivers, the episode queue
//! and the MCP server.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for graphmem operations.
pub type GraphMemResult<T> = Result<T, GraphMemError>;

/// Main error type for all graphmem operations.
#[derive(Error, Debug)]
pub enum GraphMemError {
    /// Input or connection-parameter validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Configuration error (unknown backend name, unreadable config file, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Backend not supported by this build.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// Could not reach the graph database.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A query was rejected or failed inside the graph database.
    #[error("Query error: {message}")]
    Query {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Node, edge or episode not found.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        uuid: Option<String>,
    },

    /// Episode queue failure.
    #[error("Queue error: {message}")]
    Queue { message: String, code: ErrorCode },

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValInvalidFormat,
    ValOutOfRange,

    // Connection (CONN_xxx)
    ConnRefused,
    ConnAuthFailed,

    // Query (QRY_xxx)
    QryFailed,
    QryInvalidResponse,

    // Not found (NF_xxx)
    NfEdge,
    NfEpisode,

    // Queue (QUE_xxx)
    QueOperationFailed,
    QueOperationPanicked,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseInvalidValue,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValInvalidFormat => "VAL_003",
            ErrorCode::ValOutOfRange => "VAL_004",
            ErrorCode::ConnRefused => "CONN_001",
            ErrorCode::ConnAuthFailed => "CONN_002",
            ErrorCode::QryFailed => "QRY_001",
            ErrorCode::QryInvalidResponse => "QRY_002",
            ErrorCode::NfEdge => "NF_001",
            ErrorCode::NfEpisode => "NF_002",
            ErrorCode::QueOperationFailed => "QUE_001",
            ErrorCode::QueOperationPanicked => "QUE_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseInvalidValue => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl GraphMemError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a validation error for a value that does not match its expected format.
    pub fn invalid_format(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidFormat,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a validation error for a required parameter that was not provided.
    pub fn missing_field(field: impl Into<String>, suggestion: impl Into<String>) -> Self {
        let field = field.into();
        let mut details = HashMap::new();
        details.insert("field".to_string(), field.clone());
        Self::Validation {
            message: format!("{} must be set", field),
            code: ErrorCode::ValMissingField,
            details,
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            code: ErrorCode::ConnRefused,
            source: None,
        }
    }

    /// Create a connection error that keeps the underlying client error.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            code: ErrorCode::ConnRefused,
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            code: ErrorCode::QryFailed,
            source: None,
        }
    }

    /// Create a query error for a reply the adapter could not interpret.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            code: ErrorCode::QryInvalidResponse,
            source: None,
        }
    }

    /// Create a not found error for an entity edge.
    pub fn edge_not_found(uuid: impl Into<String>) -> Self {
        let id = uuid.into();
        Self::NotFound {
            message: format!("Entity edge with uuid '{}' not found", id),
            code: ErrorCode::NfEdge,
            uuid: Some(id),
        }
    }

    /// Create a not found error for an episode.
    pub fn episode_not_found(uuid: impl Into<String>) -> Self {
        let id = uuid.into();
        Self::NotFound {
            message: format!("Episode with uuid '{}' not found", id),
            code: ErrorCode::NfEpisode,
            uuid: Some(id),
        }
    }

    /// Create a queue error.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
            code: ErrorCode::QueOperationFailed,
        }
    }

    /// Create a queue error for an operation that panicked.
    pub fn operation_panicked(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
            code: ErrorCode::QueOperationPanicked,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidValue,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::Connection { code, .. } => *code,
            Self::Query { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Queue { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error is a validation failure (bad input or missing parameter).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether this error is a configuration failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnsupportedProvider { .. }
        )
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Connection { .. } => {
                Some("Please check that the graph database is running and reachable")
            }
            Self::UnsupportedProvider { .. } => {
                Some("Supported database types are 'neo4j' and 'falkordb'")
            }
            Self::NotFound { .. } => Some("Please check the uuid and ensure it exists"),
            _ => None,
        }
    }
}
