//! WolfQuorum Error Types
//!
//! Two families live here. [`Error`] is the crate-wide error returned by
//! configuration loading and by the reconfiguration driver. [`ConsensusError`]
//! is the single tagged result type for consensus outcomes: it carries a
//! [`Code`] discriminant, an optional offending path or identifier and an
//! optional cause.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quorum::ServerId;

/// Result type alias for WolfQuorum operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfQuorum error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid server spec for server.{id}: {reason}")]
    InvalidServerSpec { id: ServerId, reason: String },

    #[error("Duplicate server id: {0}")]
    DuplicateServer(ServerId),

    #[error("Invalid configuration version: {0}")]
    InvalidVersion(String),

    // Consensus outcomes
    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    // Programming errors
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Consensus code carried by this error, if any
    pub fn code(&self) -> Option<Code> {
        match self {
            Error::Consensus(e) => Some(e.code()),
            _ => None,
        }
    }

    /// Check if the request that produced this error may be retried
    ///
    /// Retrying is always the caller's decision; nothing in this crate
    /// retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code(),
            Some(Code::NewConfigNoQuorum) | Some(Code::BadVersion)
        )
    }

    /// Check if this error is a configuration problem detected before any
    /// quorum policy was installed
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ConfigParse(_)
                | Error::InvalidServerSpec { .. }
                | Error::DuplicateServer(_)
                | Error::InvalidVersion(_)
        )
    }
}

/// Outcome codes shared with the rest of the coordination service.
///
/// Values between [`Code::SystemError`] and [`Code::ApiError`] are system
/// errors; values below [`Code::ApiError`] are API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    Ok,
    SystemError,
    RuntimeInconsistency,
    DataInconsistency,
    ConnectionLoss,
    MarshallingError,
    Unimplemented,
    OperationTimeout,
    BadArguments,
    UnknownSession,
    /// No quorum of the proposed configuration has acknowledged yet
    NewConfigNoQuorum,
    /// Another reconfiguration is already pending
    ReconfigInProgress,
    ApiError,
    NoNode,
    NoAuth,
    /// Base version of a request does not match the last committed version
    BadVersion,
    NoChildrenForEphemerals,
    NodeExists,
    NotEmpty,
    SessionExpired,
    InvalidCallback,
    InvalidAcl,
    AuthFailed,
    SessionMoved,
    NotReadonly,
    EphemeralOnLocalSession,
    NoWatcher,
    RequestTimeout,
    /// Reconfiguration is administratively disabled
    ReconfigDisabled,
    SessionClosedRequireSaslAuth,
    ThrottledOp,
}

impl Code {
    /// Every code, in table order
    pub const ALL: [Code; 31] = [
        Code::Ok,
        Code::SystemError,
        Code::RuntimeInconsistency,
        Code::DataInconsistency,
        Code::ConnectionLoss,
        Code::MarshallingError,
        Code::Unimplemented,
        Code::OperationTimeout,
        Code::BadArguments,
        Code::UnknownSession,
        Code::NewConfigNoQuorum,
        Code::ReconfigInProgress,
        Code::ApiError,
        Code::NoNode,
        Code::NoAuth,
        Code::BadVersion,
        Code::NoChildrenForEphemerals,
        Code::NodeExists,
        Code::NotEmpty,
        Code::SessionExpired,
        Code::InvalidCallback,
        Code::InvalidAcl,
        Code::AuthFailed,
        Code::SessionMoved,
        Code::NotReadonly,
        Code::EphemeralOnLocalSession,
        Code::NoWatcher,
        Code::RequestTimeout,
        Code::ReconfigDisabled,
        Code::SessionClosedRequireSaslAuth,
        Code::ThrottledOp,
    ];

    /// Integer value used on the wire
    pub fn int_value(self) -> i32 {
        match self {
            Code::Ok => 0,
            Code::SystemError => -1,
            Code::RuntimeInconsistency => -2,
            Code::DataInconsistency => -3,
            Code::ConnectionLoss => -4,
            Code::MarshallingError => -5,
            Code::Unimplemented => -6,
            Code::OperationTimeout => -7,
            Code::BadArguments => -8,
            Code::UnknownSession => -12,
            Code::NewConfigNoQuorum => -13,
            Code::ReconfigInProgress => -14,
            Code::ApiError => -100,
            Code::NoNode => -101,
            Code::NoAuth => -102,
            Code::BadVersion => -103,
            Code::NoChildrenForEphemerals => -108,
            Code::NodeExists => -110,
            Code::NotEmpty => -111,
            Code::SessionExpired => -112,
            Code::InvalidCallback => -113,
            Code::InvalidAcl => -114,
            Code::AuthFailed => -115,
            Code::SessionMoved => -118,
            Code::NotReadonly => -119,
            Code::EphemeralOnLocalSession => -120,
            Code::NoWatcher => -121,
            Code::RequestTimeout => -122,
            Code::ReconfigDisabled => -123,
            Code::SessionClosedRequireSaslAuth => -124,
            Code::ThrottledOp => -127,
        }
    }

    /// Look up a code by its integer value
    pub fn from_int(value: i32) -> Option<Code> {
        static LOOKUP: OnceLock<HashMap<i32, Code>> = OnceLock::new();
        LOOKUP
            .get_or_init(|| Code::ALL.iter().map(|c| (c.int_value(), *c)).collect())
            .get(&value)
            .copied()
    }

    /// Human readable description
    pub fn message(self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::SystemError => "SystemError",
            Code::RuntimeInconsistency => "RuntimeInconsistency",
            Code::DataInconsistency => "DataInconsistency",
            Code::ConnectionLoss => "ConnectionLoss",
            Code::MarshallingError => "MarshallingError",
            Code::Unimplemented => "Unimplemented",
            Code::OperationTimeout => "OperationTimeout",
            Code::BadArguments => "BadArguments",
            Code::UnknownSession => "Unknown error UNKNOWN_SESSION",
            Code::NewConfigNoQuorum => "NewConfigNoQuorum",
            Code::ReconfigInProgress => "ReconfigInProgress",
            Code::ApiError => "APIError",
            Code::NoNode => "NoNode",
            Code::NoAuth => "NoAuth",
            Code::BadVersion => "BadVersion",
            Code::NoChildrenForEphemerals => "NoChildrenForEphemerals",
            Code::NodeExists => "NodeExists",
            Code::NotEmpty => "Directory not empty",
            Code::SessionExpired => "Session expired",
            Code::InvalidCallback => "Invalid callback",
            Code::InvalidAcl => "InvalidACL",
            Code::AuthFailed => "AuthFailed",
            Code::SessionMoved => "Session moved",
            Code::NotReadonly => "Not a read-only call",
            Code::EphemeralOnLocalSession => "Ephemeral node on local session",
            Code::NoWatcher => "No such watcher",
            Code::RequestTimeout => "Unknown error REQUEST_TIMEOUT",
            Code::ReconfigDisabled => "Reconfig is disabled",
            Code::SessionClosedRequireSaslAuth => {
                "Session closed because client failed to authenticate"
            }
            Code::ThrottledOp => "Op throttled due to high load",
        }
    }

    /// Check if this code falls in the system error range
    pub fn is_system_error(self) -> bool {
        let v = self.int_value();
        v <= Code::SystemError.int_value() && v > Code::ApiError.int_value()
    }

    /// Check if this code falls in the API error range
    pub fn is_api_error(self) -> bool {
        self.int_value() < Code::ApiError.int_value()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A consensus outcome returned to the originator of a request.
///
/// These are expected results of concurrent cluster operation, never bugs.
#[derive(Debug)]
pub struct ConsensusError {
    code: Code,
    path: Option<String>,
    source: Option<Cause>,
}

impl ConsensusError {
    pub fn new(code: Code) -> Self {
        Self {
            code,
            path: None,
            source: None,
        }
    }

    /// Build from an integer code received from a peer
    pub fn from_int(value: i32) -> Result<Self> {
        match Code::from_int(value) {
            Some(Code::Ok) => Err(Error::InvariantViolation(
                "cannot build a consensus error from code OK".into(),
            )),
            Some(code) => Ok(Self::new(code)),
            None => Err(Error::InvariantViolation(format!(
                "unknown consensus code {}",
                value
            ))),
        }
    }

    /// Attach the offending path or identifier
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach the underlying cause
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn new_config_no_quorum() -> Self {
        Self::new(Code::NewConfigNoQuorum)
    }

    pub fn reconfig_in_progress() -> Self {
        Self::new(Code::ReconfigInProgress)
    }

    pub fn bad_version() -> Self {
        Self::new(Code::BadVersion)
    }

    pub fn reconfig_disabled() -> Self {
        Self::new(Code::ReconfigDisabled)
    }

    pub fn bad_arguments() -> Self {
        Self::new(Code::BadArguments)
    }
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeeperErrorCode = {}", self.code.message())?;
        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            write!(f, " for {}", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConsensusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
