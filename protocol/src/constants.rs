use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

bitflags! {
    /// Capability flags exchanged during the handshake.
    ///
    /// ref: https://dev.mysql.com/doc/dev/mysql-server/latest/group__group__cs__capabilities__flags.html
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CapabilityFlags: u32 {
        const CLIENT_LONG_PASSWORD = 0x0000_0001;
        /// Send found rows instead of affected rows in EOF_Packet.
        const CLIENT_FOUND_ROWS = 0x0000_0002;
        /// Get all column flags.
        const CLIENT_LONG_FLAG = 0x0000_0004;
        /// Database (schema) name can be specified on connect in Handshake
        /// Response Packet.
        const CLIENT_CONNECT_WITH_DB = 0x0000_0008;
        /// Don't allow database.table.column.
        const CLIENT_NO_SCHEMA = 0x0000_0010;
        /// Compression protocol supported.
        const CLIENT_COMPRESS = 0x0000_0020;
        /// Special handling of ODBC behavior.
        const CLIENT_ODBC = 0x0000_0040;
        /// Can use LOAD DATA LOCAL.
        const CLIENT_LOCAL_FILES = 0x0000_0080;
        /// Ignore spaces before '('.
        const CLIENT_IGNORE_SPACE = 0x0000_0100;
        const CLIENT_PROTOCOL_41 = 0x0000_0200;
        /// This is an interactive client.
        const CLIENT_INTERACTIVE = 0x0000_0400;
        /// Switch to SSL after sending the capability flags.
        const CLIENT_SSL = 0x0000_0800;
        /// Do not issue SIGPIPE if network failures occur.
        const CLIENT_IGNORE_SIGPIPE = 0x0000_1000;
        /// Client knows about transactions; status flags are sent in
        /// OK_Packet / EOF_Packet.
        const CLIENT_TRANSACTIONS = 0x0000_2000;
        const CLIENT_RESERVED = 0x0000_4000;
        const CLIENT_SECURE_CONNECTION = 0x0000_8000;
        /// Can handle multiple statements per COM_QUERY and COM_STMT_PREPARE.
        const CLIENT_MULTI_STATEMENTS = 0x0001_0000;
        /// Can send multiple resultsets for COM_QUERY.
        const CLIENT_MULTI_RESULTS = 0x0002_0000;
        /// Multi-results and OUT parameters in PS-protocol.
        const CLIENT_PS_MULTI_RESULTS = 0x0004_0000;
        /// Supports the pluggable authentication protocol.
        const CLIENT_PLUGIN_AUTH = 0x0008_0000;
        /// Permits connection attributes in Protocol::HandshakeResponse41.
        const CLIENT_CONNECT_ATTRS = 0x0010_0000;
        /// Length of auth response data in Protocol::HandshakeResponse41 is
        /// a length-encoded integer.
        const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA = 0x0020_0000;
        /// Don't close the connection for a user account with expired password.
        const CLIENT_CAN_HANDLE_EXPIRED_PASSWORDS = 0x0040_0000;
        /// Expects Session State Information in OK_Packet.
        const CLIENT_SESSION_TRACK = 0x0080_0000;
        /// Expects an OK_Packet (instead of EOF_Packet) after the resultset
        /// rows of a Text Resultset. EOF_Packet is deprecated as of MySQL 5.7.5.
        const CLIENT_DEPRECATE_EOF = 0x0100_0000;
        /// The client can handle optional metadata information in the resultset.
        const CLIENT_OPTIONAL_RESULTSET_METADATA = 0x0200_0000;
        /// zstd compression level is exchanged after the handshake.
        const CLIENT_ZSTD_COMPRESSION_ALGORITHM = 0x0400_0000;
        /// Optional part containing query parameter set(s) in COM_QUERY and
        /// COM_STMT_EXECUTE packets.
        const CLIENT_QUERY_ATTRIBUTES = 0x0800_0000;
        /// Multi factor authentication.
        const MULTI_FACTOR_AUTHENTICATION = 0x1000_0000;
        const CLIENT_CAPABILITY_EXTENSION = 0x2000_0000;
        /// Verify server certificate. Client only flag.
        const CLIENT_SSL_VERIFY_SERVER_CERT = 0x4000_0000;
        /// Don't reset the options after an unsuccessful connect. Client only flag.
        const CLIENT_REMEMBER_OPTIONS = 0x8000_0000;
    }
}

impl CapabilityFlags {
    /// Capabilities this server advertises in the initial handshake.
    /// CLIENT_SSL is added on top when a TLS acceptor is configured.
    pub fn default_server() -> CapabilityFlags {
        CapabilityFlags::CLIENT_LONG_PASSWORD
            | CapabilityFlags::CLIENT_CONNECT_WITH_DB
            | CapabilityFlags::CLIENT_PROTOCOL_41
            | CapabilityFlags::CLIENT_SECURE_CONNECTION
            | CapabilityFlags::CLIENT_PLUGIN_AUTH
            | CapabilityFlags::CLIENT_CONNECT_ATTRS
            | CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
            | CapabilityFlags::CLIENT_DEPRECATE_EOF
            | CapabilityFlags::CLIENT_ZSTD_COMPRESSION_ALGORITHM
            | CapabilityFlags::CLIENT_QUERY_ATTRIBUTES
    }
}

bitflags! {
    /// Server status flags, sent in OK and EOF packets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ServerStatus: u16 {
        const SERVER_STATUS_IN_TRANS = 0x0001;
        const SERVER_STATUS_AUTOCOMMIT = 0x0002;
        const SERVER_MORE_RESULTS_EXISTS = 0x0008;
        const SERVER_STATUS_NO_GOOD_INDEX_USED = 0x0010;
        const SERVER_STATUS_NO_INDEX_USED = 0x0020;
        /// A read-only non-scrollable cursor was opened for the query.
        /// Signals that COM_STMT_FETCH must be used to fetch the row data.
        const SERVER_STATUS_CURSOR_EXISTS = 0x0040;
        /// A read-only cursor is exhausted, in reply to COM_STMT_FETCH.
        const SERVER_STATUS_LAST_ROW_SENT = 0x0080;
        const SERVER_STATUS_DB_DROPPED = 0x0100;
        const SERVER_STATUS_NO_BACKSLASH_ESCAPES = 0x0200;
        const SERVER_STATUS_METADATA_CHANGED = 0x0400;
        const SERVER_QUERY_WAS_SLOW = 0x0800;
        const SERVER_PS_OUT_PARAMS = 0x1000;
        const SERVER_STATUS_IN_TRANS_READONLY = 0x2000;
        const SERVER_SESSION_STATE_CHANGED = 0x4000;
    }
}

bitflags! {
    /// Column definition flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ColumnFlags: u16 {
        const NOT_NULL_FLAG = 0x0001;
        const PRI_KEY_FLAG = 0x0002;
        const UNIQUE_KEY_FLAG = 0x0004;
        const MULTIPLE_KEY_FLAG = 0x0008;
        const BLOB_FLAG = 0x0010;
        const UNSIGNED_FLAG = 0x0020;
        const ZEROFILL_FLAG = 0x0040;
        const BINARY_FLAG = 0x0080;
        const ENUM_FLAG = 0x0100;
        const AUTO_INCREMENT_FLAG = 0x0200;
        const TIMESTAMP_FLAG = 0x0400;
        const SET_FLAG = 0x0800;
        const NO_DEFAULT_VALUE_FLAG = 0x1000;
        const ON_UPDATE_NOW_FLAG = 0x2000;
        const NUM_FLAG = 0x8000;
    }
}

bitflags! {
    /// COM_STMT_EXECUTE cursor flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CursorFlags: u8 {
        const CURSOR_TYPE_READ_ONLY = 0x01;
        const CURSOR_TYPE_FOR_UPDATE = 0x02;
        const CURSOR_TYPE_SCROLLABLE = 0x04;
        const PARAMETER_COUNT_AVAILABLE = 0x08;
    }
}

/// Command phase packet type codes.
///
/// ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_command_phase.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    ComSleep = 0x00,
    ComQuit = 0x01,
    ComInitDb = 0x02,
    ComQuery = 0x03,
    ComFieldList = 0x04,
    ComCreateDb = 0x05,
    ComDropDb = 0x06,
    ComRefresh = 0x07,
    ComShutdown = 0x08,
    ComStatistics = 0x09,
    ComProcessInfo = 0x0A,
    ComConnect = 0x0B,
    ComProcessKill = 0x0C,
    ComDebug = 0x0D,
    ComPing = 0x0E,
    ComTime = 0x0F,
    ComDelayedInsert = 0x10,
    ComChangeUser = 0x11,
    ComBinlogDump = 0x12,
    ComTableDump = 0x13,
    ComConnectOut = 0x14,
    ComRegisterSlave = 0x15,
    ComStmtPrepare = 0x16,
    ComStmtExecute = 0x17,
    ComStmtSendLongData = 0x18,
    ComStmtClose = 0x19,
    ComStmtReset = 0x1A,
    ComSetOption = 0x1B,
    ComStmtFetch = 0x1C,
    ComDaemon = 0x1D,
    ComBinlogDumpGtid = 0x1E,
    ComResetConnection = 0x1F,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::ComQuery, Command::try_from(0x03).unwrap());
        assert_eq!(0x1C_u8, Command::ComStmtFetch.into());
        assert!(Command::try_from(0xAB_u8).is_err());
    }

    #[test]
    fn test_capability_intersection() {
        let server = CapabilityFlags::default_server();
        let client = CapabilityFlags::CLIENT_PROTOCOL_41
            | CapabilityFlags::CLIENT_DEPRECATE_EOF
            | CapabilityFlags::CLIENT_SSL;
        let joint = server & client;
        assert!(joint.contains(CapabilityFlags::CLIENT_PROTOCOL_41));
        assert!(!joint.contains(CapabilityFlags::CLIENT_SSL));
    }
}
