use std::io;

use thiserror::Error;

/// Server error codes and SQL states.
///
/// ref: https://dev.mysql.com/doc/mysql-errors/8.0/en/server-error-reference.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorKind {
    ConCountError = 1040,
    HandshakeError = 1043,
    AccessDeniedError = 1045,
    NoDbError = 1046,
    UnknownComError = 1047,
    ParseError = 1064,
    EmptyQuery = 1065,
    UnknownError = 1105,
    UnknownProcedure = 1106,
    UnknownSystemVariable = 1193,
    WrongValueForVar = 1231,
    NotSupportedYet = 1235,
    MalformedPacket = 1835,
    UserDoesNotExist = 3162,
    SessionWasKilled = 3169,
}

impl ErrorKind {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// ref: https://dev.mysql.com/doc/refman/8.0/en/error-message-elements.html
    pub fn sqlstate(self) -> &'static [u8; 5] {
        match self {
            ErrorKind::ConCountError => b"08004",
            ErrorKind::HandshakeError => b"08S01",
            ErrorKind::AccessDeniedError => b"28000",
            ErrorKind::NoDbError => b"3D000",
            ErrorKind::UnknownComError => b"08S01",
            ErrorKind::ParseError => b"42000",
            ErrorKind::EmptyQuery => b"42000",
            ErrorKind::UnknownProcedure => b"42000",
            ErrorKind::WrongValueForVar => b"42000",
            ErrorKind::NotSupportedYet => b"42000",
            ErrorKind::UnknownError
            | ErrorKind::UnknownSystemVariable
            | ErrorKind::MalformedPacket
            | ErrorKind::UserDoesNotExist
            | ErrorKind::SessionWasKilled => b"HY000",
        }
    }
}

/// Classification carried by a kill signal, mirroring `KILL [CONNECTION|QUERY]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillKind {
    Connection,
    Query,
}

#[derive(Debug, Error)]
pub enum ServerError {
    /// An error that is reported to the client as an ERR packet.
    #[error("{msg}")]
    Mysql { kind: ErrorKind, msg: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    /// The peer hung up. Distinguished from protocol errors so the
    /// connection task can exit quietly.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Cooperative cancellation delivered by the control plane.
    #[error("session was killed")]
    Killed(KillKind),
}

impl ServerError {
    pub fn mysql(kind: ErrorKind, msg: impl Into<String>) -> Self {
        ServerError::Mysql {
            kind,
            msg: msg.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::mysql(ErrorKind::MalformedPacket, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::mysql(ErrorKind::ParseError, msg)
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::mysql(ErrorKind::NotSupportedYet, msg)
    }

    /// The `(code, sqlstate, message)` triple sent in an ERR packet.
    pub fn err_parts(&self) -> (u16, &'static [u8; 5], String) {
        match self {
            ServerError::Mysql { kind, msg } => (kind.code(), kind.sqlstate(), msg.clone()),
            ServerError::Killed(_) => (
                ErrorKind::SessionWasKilled.code(),
                ErrorKind::SessionWasKilled.sqlstate(),
                "Session was killed".to_string(),
            ),
            other => (
                ErrorKind::UnknownError.code(),
                ErrorKind::UnknownError.sqlstate(),
                other.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(1045, ErrorKind::AccessDeniedError.code());
        assert_eq!(b"28000", ErrorKind::AccessDeniedError.sqlstate());
        assert_eq!(b"HY000", ErrorKind::SessionWasKilled.sqlstate());
    }

    #[test]
    fn test_err_parts() {
        let err = ServerError::mysql(ErrorKind::ParseError, "bad statement");
        let (code, state, msg) = err.err_parts();
        assert_eq!(1064, code);
        assert_eq!(b"42000", state);
        assert_eq!("bad statement", msg);
    }
}
