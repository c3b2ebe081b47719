pub mod auth;
pub mod connection;
pub mod control;
pub mod eval;
pub mod intercept;
pub mod prepared;
pub mod schema;
pub mod server;
pub mod session;
pub mod vars;

pub use auth::{AuthInfo, AuthPlugin, Decision, IdentityProvider, SimpleIdentityProvider, User};
pub use connection::Connection;
pub use control::{Control, KillSwitch};
pub use server::MysqlServer;
pub use session::{Session, SessionContext, QueryResponse};
pub use vars::SystemVariables;

pub use mimic_common::charset::CharacterSet;
pub use mimic_common::column_type::ColumnType;
pub use mimic_common::config::ServerConfig;
pub use mimic_common::err::{ErrorKind, KillKind, ServerError, SqlResult};
pub use mimic_protocol::result::{ResultColumn, ResultSet, Row, Rows, Value};
