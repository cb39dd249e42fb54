use std::fmt;

use thiserror::Error;

/// Which vocabulary a name was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Collection,
    ProductType,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NameKind::Collection => write!(f, "collection"),
            NameKind::ProductType => write!(f, "product type"),
        }
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unrecognized {kind} name: '{name}'")]
    UnrecognizedName { kind: NameKind, name: String },
    #[error("Malformed timestamp '{0}' (expected YYYY-MM-DDThh:mm:ss.sssZ)")]
    MalformedTimestamp(String),
    #[error("Attribute '{name}' is reserved, use {setter} instead")]
    ReservedAttributeName { name: String, setter: &'static str },
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Catalog rejected the query: {message}")]
    InvalidQuery { status: Option<u16>, message: String },
    #[error("Query failed after {attempts} attempt(s): {message}")]
    QueryExecution { attempts: u32, message: String },
    #[error("Malformed catalog response: {0}")]
    MalformedResponse(String),
    #[error("Geometry error: {0}")]
    Geometry(String),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// True for failures caused by the caller's input, raised before any network activity.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            QueryError::UnrecognizedName { .. }
                | QueryError::MalformedTimestamp(_)
                | QueryError::ReservedAttributeName { .. }
                | QueryError::InvalidFilter(_)
        )
    }
}

// Helper conversions
impl From<config::ConfigError> for QueryError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
