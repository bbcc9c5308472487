//! Process-wide error code space and the `NeuError` type that carries it.
//!
//! Every public fallible operation in the gateway core returns `Result<T, NeuError>`.
//! `NeuError` always knows its `ErrorCode` so boundary adapters (REST handlers, the
//! CLI) can report the wire code without re-deriving it from the Rust error variant.

use thiserror::Error;

/// The single process-wide signed integer error space.
///
/// Negative values mirror POSIX errno semantics; positive values `>= 1000` are
/// domain-specific errors (plugin/node/group/tag, token/auth, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,

    EIntr = -1,
    ENoMem = -2,
    EInval = -3,
    EBusy = -4,
    ETimedOut = -5,
    EConnRefused = -6,
    EClosed = -7,
    EAgain = -8,
    ENotSup = -9,
    EAddrInUse = -10,
    EState = -11,
    ENoEnt = -12,
    EProto = -13,
    EUnreachable = -14,
    EAddrInval = -15,
    EPerm = -16,
    EMsgSize = -17,
    EConnAborted = -18,
    EConnReset = -19,
    ECanceled = -20,
    ENoFiles = -21,
    ENoSpc = -22,
    EExist = -23,
    EReadOnly = -24,
    EWriteOnly = -25,
    ECrypto = -26,
    EPeerAuth = -27,
    ENoArg = -28,
    EAmbiguous = -29,
    EBadType = -30,
    EConnShut = -31,

    Failure = 1000,
    EInternal = 1001,
    BodyIsWrong = 1002,
    ParamIsWrong = 1003,
    NeedToken = 1004,
    DecodeToken = 1005,
    ExpiredToken = 1006,
    ValidateToken = 1007,
    InvalidToken = 1008,
    InvalidUserOrPassword = 1009,

    PluginNameNotFound = 2000,
    NodeTypeInvalid = 2001,
    NodeExist = 2002,
    NodeNotExist = 2003,
    GrpConfigNotExist = 2004,
    TagNotExist = 2005,
    TagAttributeNotSupport = 2006,
    NodeSettingInvalid = 2007,
    NodeSettingNotFound = 2008,
    GrpConfigInUse = 2009,
    NodeNotReady = 2010,
    NodeIsRunning = 2011,
    NodeNotRunning = 2012,
    NodeIsStopped = 2013,
    GrpNotSubscribe = 2014,
    TagTypeNotSupport = 2015,
    GrpConfigExist = 2016,
    TagNameExist = 2017,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// The gateway core's single error type. Every variant knows its `ErrorCode`.
#[derive(Debug, Error)]
pub enum NeuError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("timed out: {0}")]
    TimedOut(String),

    #[error("disconnected: {0}")]
    Disconnected(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("canceled: {0}")]
    Canceled(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("domain error {code}: {message}")]
    Domain { code: ErrorCode, message: String },
}

impl NeuError {
    pub fn code(&self) -> ErrorCode {
        match self {
            NeuError::NotFound(_) => ErrorCode::ENoEnt,
            NeuError::AlreadyExists(_) => ErrorCode::EExist,
            NeuError::InvalidArgument(_) => ErrorCode::EInval,
            NeuError::InvalidState(_) => ErrorCode::EState,
            NeuError::TimedOut(_) => ErrorCode::ETimedOut,
            NeuError::Disconnected(_) => ErrorCode::EClosed,
            NeuError::NotSupported(_) => ErrorCode::ENotSup,
            NeuError::Busy(_) => ErrorCode::EBusy,
            NeuError::Canceled(_) => ErrorCode::ECanceled,
            NeuError::Internal(_) => ErrorCode::EInternal,
            NeuError::Domain { code, .. } => *code,
        }
    }

    pub fn domain(code: ErrorCode, message: impl Into<String>) -> Self {
        NeuError::Domain {
            code,
            message: message.into(),
        }
    }

    pub fn node_exist(name: &str) -> Self {
        Self::domain(ErrorCode::NodeExist, format!("node '{name}' already exists"))
    }

    pub fn node_not_exist(name: &str) -> Self {
        Self::domain(ErrorCode::NodeNotExist, format!("node '{name}' does not exist"))
    }

    pub fn tag_name_exist(name: &str) -> Self {
        Self::domain(ErrorCode::TagNameExist, format!("tag '{name}' already exists in group"))
    }

    pub fn group_config_exist(name: &str) -> Self {
        Self::domain(ErrorCode::GrpConfigExist, format!("group '{name}' already exists"))
    }

    pub fn node_type_invalid(message: impl Into<String>) -> Self {
        Self::domain(ErrorCode::NodeTypeInvalid, message)
    }

    pub fn group_config_not_exist(name: &str) -> Self {
        Self::domain(
            ErrorCode::GrpConfigNotExist,
            format!("group '{name}' does not exist"),
        )
    }
}

pub type Result<T> = std::result::Result<T, NeuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_spec_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::EIntr.code(), -1);
        assert_eq!(ErrorCode::EConnShut.code(), -31);
        assert_eq!(ErrorCode::Failure.code(), 1000);
        assert_eq!(ErrorCode::TagNameExist.code(), 2017);
    }

    #[test]
    fn domain_helpers_carry_expected_code() {
        let e = NeuError::tag_name_exist("t1");
        assert_eq!(e.code(), ErrorCode::TagNameExist);
    }
}
