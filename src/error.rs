use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::ResourceKind;

#[derive(Debug, Error, Diagnostic)]
pub enum HomopairError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("{0} records cannot be resolved through a fetcher")]
    UnsupportedKind(ResourceKind),

    #[error("no fetcher registered for {0}")]
    MissingFetcher(ResourceKind),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown scoring profile: {0}")]
    UnknownProfile(String),

    #[error("miRBase request failed: {0}")]
    MirbaseHttp(String),

    #[error("miRBase returned status {status}: {message}")]
    MirbaseStatus { status: u16, message: String },

    #[error("TAIR request failed: {0}")]
    TairHttp(String),

    #[error("TAIR returned status {status}: {message}")]
    TairStatus { status: u16, message: String },

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("unexpected {source_name} page structure: {message}")]
    PageStructure {
        source_name: &'static str,
        message: String,
    },

    #[error("alignment exhausted available memory: {0}")]
    ResourceExhaustion(String),

    #[error("sequence for {0} is empty or unresolved")]
    UnresolvedSequence(String),

    #[error("malformed dataset {path}: {message}")]
    Dataset { path: String, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl HomopairError {
    pub fn is_transient(&self) -> bool {
        match self {
            HomopairError::MirbaseHttp(_)
            | HomopairError::TairHttp(_)
            | HomopairError::NcbiHttp(_) => true,
            HomopairError::MirbaseStatus { status, .. }
            | HomopairError::TairStatus { status, .. }
            | HomopairError::NcbiStatus { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            HomopairError::PageStructure { .. } => true,
            HomopairError::MirbaseStatus { status, .. }
            | HomopairError::TairStatus { status, .. }
            | HomopairError::NcbiStatus { status, .. } => *status == 404,
            _ => false,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            HomopairError::ConfigRead(_)
                | HomopairError::ConfigParse(_)
                | HomopairError::InvalidConfig(_)
                | HomopairError::UnknownProfile(_)
        )
    }
}
