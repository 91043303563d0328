//! Error types for sideload

use std::path::PathBuf;

use thiserror::Error;

/// Terminal failures of the module loader. The pipeline stops on any of them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("module not found or unreadable: {path}: {reason}")]
    NotFound { path: PathBuf, reason: String },

    #[error("type {type_name} not found in module {path}")]
    SymbolNotFound { path: PathBuf, type_name: String },

    #[error("module {path} is not a valid wasm binary: {reason}")]
    BadFormat { path: PathBuf, reason: String },

    #[error("failed to instantiate {type_name}: {reason}")]
    InstantiationFailed { type_name: String, reason: String },
}

/// Failures of the lifecycle entry call. Fatal to the cycle, never to the host.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("lifecycle method {method} not declared on {type_name}")]
    MethodNotFound { type_name: String, method: String },

    #[error("lifecycle method threw: {0}")]
    InvocationThrew(String),
}

/// Failures of a single introspective read, write or call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntrospectError {
    #[error("member {member} not found")]
    MissingMember { member: String },

    #[error("type mismatch on {member}: {detail}")]
    TypeMismatch { member: String, detail: String },

    #[error("access denied to {member}: {detail}")]
    AccessDenied { member: String, detail: String },

    #[error("{member} trapped: {detail}")]
    Trapped { member: String, detail: String },
}

/// Errors outside the load-attach-invoke pipeline (host profiles, engine setup).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for sideload operations
pub type Result<T> = std::result::Result<T, Error>;
