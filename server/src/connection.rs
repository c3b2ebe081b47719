//! The per-client state machine: handshake, authentication, and the
//! command loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_native_tls::TlsAcceptor;
use tracing::{debug, info, warn};

use mimic_common::charset::CharacterSet;
use mimic_common::config::ServerConfig;
use mimic_common::err::{ErrorKind, KillKind, ServerError, SqlResult};
use mimic_protocol::constants::{CapabilityFlags, Command, ServerStatus};
use mimic_protocol::packets::{
    make_auth_more_data, make_auth_switch_request, make_column_count, parse_com_change_user,
    parse_com_field_list, parse_com_init_db, parse_com_query, parse_com_stmt_close,
    parse_com_stmt_execute, parse_com_stmt_fetch, parse_com_stmt_reset,
    parse_com_stmt_send_long_data, parse_handshake_response, peek_stmt_id, ColumnDefinition,
    ComStmtPrepareOk, EofPacket, ErrPacket, HandshakeResponse, HandshakeResponse41, HandshakeV10,
    OkPacket,
};
use mimic_protocol::result::{binary, text, ResultSet, Value};
use mimic_protocol::stream::PacketStream;

use crate::auth::{AuthInfo, AuthPlugin, AuthState, Decision, IdentityProvider};
use crate::control::{Control, KillSwitch};
use crate::intercept::{self, QueryContext};
use crate::prepared::{interpolate_params, PreparedStatement};
use crate::schema;
use crate::session::{Session, SessionContext};

/// Cooperative yield cadence while serializing long result sets.
const YIELD_EVERY: usize = 10_000;

pub struct Connection<T> {
    stream: PacketStream<T>,
    session: Box<dyn Session>,
    identity: Arc<dyn IdentityProvider>,
    control: Arc<Control>,
    kill: Arc<KillSwitch>,
    connection_id: u32,
    server_capabilities: CapabilityFlags,
    /// Narrowed once after the handshake response, then frozen.
    capabilities: CapabilityFlags,
    status_flags: ServerStatus,
    max_packet_size: u32,
    client_plugin: Option<String>,
    zstd_compression_level: u8,
    /// Challenge data embedded in the initial handshake, reusable on
    /// COM_CHANGE_USER.
    handshake_auth_data: Option<Vec<u8>>,
    handshake_plugin_name: String,
    stmts: HashMap<u32, PreparedStatement>,
    stmt_seq: u32,
    ctx: SessionContext,
    tls: Option<TlsAcceptor>,
    version: String,
    version_comment: String,
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        io: T,
        session: Box<dyn Session>,
        identity: Arc<dyn IdentityProvider>,
        control: Arc<Control>,
        kill: Arc<KillSwitch>,
        connection_id: u32,
        config: &ServerConfig,
        tls: Option<TlsAcceptor>,
    ) -> SqlResult<Self> {
        let mut ctx = SessionContext::new(connection_id);
        apply_version(&mut ctx, &config.version, &config.version_comment)?;

        let mut server_capabilities = CapabilityFlags::default_server();
        if tls.is_some() {
            server_capabilities |= CapabilityFlags::CLIENT_SSL;
        }

        Ok(Connection {
            stream: PacketStream::new(io),
            session,
            identity,
            control,
            kill,
            connection_id,
            server_capabilities,
            capabilities: CapabilityFlags::empty(),
            status_flags: ServerStatus::SERVER_STATUS_AUTOCOMMIT,
            max_packet_size: 0,
            client_plugin: None,
            zstd_compression_level: 0,
            handshake_auth_data: None,
            handshake_plugin_name: String::new(),
            stmts: HashMap::new(),
            stmt_seq: 0,
            ctx,
            tls,
            version: config.version.clone(),
            version_comment: config.version_comment.clone(),
        })
    }

    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    fn client_charset(&self) -> CharacterSet {
        self.ctx.vars.client_charset()
    }

    fn server_charset(&self) -> CharacterSet {
        self.ctx.vars.server_charset()
    }

    fn deprecate_eof(&self) -> bool {
        self.capabilities
            .contains(CapabilityFlags::CLIENT_DEPRECATE_EOF)
    }

    /// Drive the connection to completion: handshake, auth, command loop.
    pub async fn run(&mut self) -> SqlResult<()> {
        info!("started connection {}", self.connection_id);

        let authenticated = match self.connection_phase().await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                self.write_handshake_error(&e).await;
                self.session.close().await;
                return Err(e);
            }
        };
        if !authenticated {
            self.session.close().await;
            return Ok(());
        }

        if let Err(e) = self.session.init(&self.ctx).await {
            self.write_handshake_error(&e).await;
            self.session.close().await;
            return Err(e);
        }

        let result = self.command_phase().await;
        self.session.close().await;
        info!("closed connection {}", self.connection_id);
        result
    }

    async fn write_handshake_error(&mut self, e: &ServerError) {
        let err = ServerError::mysql(ErrorKind::HandshakeError, e.to_string());
        let packet = ErrPacket::from_error(&err).serialize(self.capabilities, self.server_charset());
        self.stream.write_packet(&packet);
        let _ = self.stream.flush().await;
    }

    // Connection phase --------------------------------------------------

    async fn connection_phase(&mut self) -> SqlResult<bool> {
        let default_plugin = self
            .identity
            .plugins()
            .into_iter()
            .next()
            .ok_or_else(|| ServerError::mysql(ErrorKind::HandshakeError, "no auth plugins"))?;

        let (decision, auth_state) = default_plugin.start(None).await?;
        let auth_data = match &decision {
            Decision::Challenge(data) => data.clone(),
            _ => Vec::new(),
        };
        self.handshake_auth_data = Some(auth_data.clone());
        self.handshake_plugin_name = default_plugin.name().to_string();

        let handshake = HandshakeV10 {
            capabilities: self.server_capabilities,
            server_charset: self.server_charset(),
            server_version: self.ctx.vars.mysql_version(),
            connection_id: self.connection_id,
            auth_data,
            status_flags: self.status_flags,
            auth_plugin_name: default_plugin.name().to_string(),
        };
        self.stream.write_packet(&handshake.serialize());
        self.stream.flush().await?;

        let data = self.stream.read_packet().await?;
        let response = match parse_handshake_response(self.server_capabilities, &data)? {
            HandshakeResponse::SslRequest(_) => {
                let acceptor = self.tls.as_ref().ok_or_else(|| {
                    ServerError::mysql(ErrorKind::HandshakeError, "TLS is not configured")
                })?;
                self.stream.upgrade_tls(acceptor).await?;
                let data = self.stream.read_packet().await?;
                match parse_handshake_response(self.server_capabilities, &data)? {
                    HandshakeResponse::Response41(response) => response,
                    HandshakeResponse::SslRequest(_) => {
                        return Err(ServerError::malformed("repeated SSLRequest"))
                    }
                }
            }
            HandshakeResponse::Response41(response) => response,
        };

        self.apply_handshake_response(&response)?;

        let authenticated = self
            .authenticate(
                response.username.clone(),
                response.auth_response.clone(),
                response.client_plugin.clone(),
                response.connect_attrs.clone(),
                Some((default_plugin, auth_state)),
            )
            .await?;
        self.stream.reset_seq();
        Ok(authenticated)
    }

    fn apply_handshake_response(&mut self, response: &HandshakeResponse41) -> SqlResult<()> {
        self.capabilities = response.capabilities;
        self.max_packet_size = response.max_packet_size;
        self.client_plugin = response.client_plugin.clone();
        self.zstd_compression_level = response.zstd_compression_level;
        debug!(
            "connection {}: capabilities {:?}, max packet {}, client plugin {:?}, zstd level {}",
            self.connection_id,
            self.capabilities,
            self.max_packet_size,
            self.client_plugin,
            self.zstd_compression_level,
        );
        self.ctx.database = response.database.clone();
        self.ctx.connect_attrs = response.connect_attrs.clone();
        self.ctx.vars.set(
            "external_user",
            Value::Str(response.username.clone()),
            true,
        )?;
        self.set_client_charset(response.client_charset)
    }

    fn set_client_charset(&mut self, charset: CharacterSet) -> SqlResult<()> {
        let name = Value::Str(charset.name().to_string());
        self.ctx
            .vars
            .set("character_set_client", name.clone(), false)?;
        self.ctx
            .vars
            .set("character_set_connection", name.clone(), false)?;
        self.ctx.vars.set("character_set_results", name, false)?;
        Ok(())
    }

    /// Run the auth-plugin lifecycle. Writes the final OK or ERR; returns
    /// whether the client is authenticated.
    async fn authenticate(
        &mut self,
        username: String,
        auth_response: Vec<u8>,
        client_plugin_name: Option<String>,
        connect_attrs: HashMap<String, String>,
        optimistic: Option<(Arc<dyn AuthPlugin>, Box<dyn AuthState>)>,
    ) -> SqlResult<bool> {
        let user = match self.identity.user(&username).await? {
            Some(user) => user,
            None => {
                let err = ServerError::mysql(
                    ErrorKind::UserDoesNotExist,
                    format!("User {} does not exist", username),
                );
                let packet =
                    ErrPacket::from_error(&err).serialize(self.capabilities, self.server_charset());
                self.stream.write_packet(&packet);
                self.stream.flush().await?;
                return Ok(false);
            }
        };

        let user_plugin = match user
            .auth_plugin
            .as_deref()
            .and_then(|name| self.identity.plugin(name))
        {
            Some(plugin) => plugin,
            None => self.identity.plugins().into_iter().next().ok_or_else(|| {
                ServerError::mysql(ErrorKind::HandshakeError, "no auth plugins")
            })?,
        };

        let mut auth_info = AuthInfo {
            username: username.clone(),
            data: auth_response,
            user,
            connect_attrs,
            client_plugin_name: client_plugin_name.clone(),
            handshake_auth_data: self.handshake_auth_data.clone(),
            handshake_plugin_name: self.handshake_plugin_name.clone(),
        };

        let (mut decision, mut state) = match optimistic {
            Some((server_plugin, mut server_state))
                if server_plugin.name() == user_plugin.name()
                    && client_plugin_matches(server_plugin.as_ref(), client_plugin_name.as_deref()) =>
            {
                // Optimistic path: resume the handshake plugin with the
                // client's first response.
                let decision = server_state.step(&auth_info).await?;
                (decision, server_state)
            }
            _ => {
                if client_plugin_matches(user_plugin.as_ref(), client_plugin_name.as_deref()) {
                    user_plugin.start(Some(&auth_info)).await?
                } else {
                    // Plugin mismatch: ask the client to switch.
                    let (decision, mut state) = user_plugin.start(None).await?;
                    let plugin_data = match &decision {
                        Decision::Challenge(data) => data.clone(),
                        _ => Vec::new(),
                    };
                    let client_name = user_plugin
                        .client_plugin_name()
                        .unwrap_or_else(|| user_plugin.name());
                    let packet = make_auth_switch_request(
                        self.server_charset(),
                        client_name,
                        &plugin_data,
                    );
                    self.stream.write_packet(&packet);
                    self.stream.flush().await?;

                    let data = self.stream.read_packet().await?;
                    auth_info = auth_info.with_data(data);
                    let decision = state.step(&auth_info).await?;
                    (decision, state)
                }
            }
        };

        while let Decision::Challenge(challenge) = decision {
            self.stream.write_packet(&make_auth_more_data(&challenge));
            self.stream.flush().await?;
            let data = self.stream.read_packet().await?;
            auth_info = auth_info.with_data(data);
            decision = state.step(&auth_info).await?;
        }

        match decision {
            Decision::Success { authenticated_as } => {
                debug!(
                    "connection {} authenticated as {}",
                    self.connection_id, authenticated_as
                );
                self.ctx.username = Some(authenticated_as);
                self.write_ok(OkPacket::with_flags(self.status_flags)).await?;
                Ok(true)
            }
            Decision::Forbidden { msg } => {
                let err = ServerError::mysql(
                    ErrorKind::AccessDeniedError,
                    msg.unwrap_or_else(|| {
                        format!("Access denied for user {}", auth_info.user.name)
                    }),
                );
                let packet =
                    ErrPacket::from_error(&err).serialize(self.capabilities, self.server_charset());
                self.stream.write_packet(&packet);
                self.stream.flush().await?;
                Ok(false)
            }
            Decision::Challenge(_) => unreachable!("challenge handled above"),
        }
    }

    // Command phase -----------------------------------------------------

    async fn command_phase(&mut self) -> SqlResult<()> {
        loop {
            let kill = self.kill.clone();
            let read = tokio::select! {
                result = self.stream.read_packet() => result,
                kind = kill.killed() => Err(ServerError::Killed(kind)),
            };
            let data = match read {
                Ok(data) => data,
                Err(ServerError::ConnectionClosed) => return Ok(()),
                Err(ServerError::Killed(KillKind::Query)) => {
                    // A query kill with no query in flight has nothing to
                    // cancel; swallowing it keeps the stream in sync.
                    self.kill.consume();
                    continue;
                }
                Err(ServerError::Killed(kind @ KillKind::Connection)) => {
                    self.report_kill(kind).await?;
                    return Ok(());
                }
                // Protocol errors are fatal to the connection.
                Err(e) => return Err(e),
            };

            let kill = self.kill.clone();
            let outcome = tokio::select! {
                result = self.dispatch(&data) => result,
                kind = kill.killed() => Err(ServerError::Killed(kind)),
            };

            let proceed = match outcome {
                Ok(proceed) => proceed,
                Err(ServerError::Killed(kind)) => {
                    if !self.report_kill(kind).await? {
                        return Ok(());
                    }
                    true
                }
                Err(e @ ServerError::ConnectionClosed) | Err(e @ ServerError::Io(_)) => {
                    return Err(e)
                }
                Err(e) => {
                    warn!("command failed on connection {}: {}", self.connection_id, e);
                    let packet = ErrPacket::from_error(&e)
                        .serialize(self.capabilities, self.server_charset());
                    self.stream.write_packet(&packet);
                    self.stream.flush().await?;
                    true
                }
            };

            self.stream.reset_seq();
            if !proceed {
                return Ok(());
            }
        }
    }

    /// Report SESSION_WAS_KILLED. Returns whether the command loop should
    /// continue (query kill) or terminate (connection kill).
    async fn report_kill(&mut self, kind: KillKind) -> SqlResult<bool> {
        let err = ServerError::mysql(ErrorKind::SessionWasKilled, "Session was killed");
        let packet = ErrPacket::from_error(&err).serialize(self.capabilities, self.server_charset());
        self.stream.write_packet(&packet);
        self.stream.flush().await?;
        self.stream.reset_seq();
        self.kill.consume();
        match kind {
            KillKind::Query => Ok(true),
            KillKind::Connection => {
                self.stream.shutdown().await?;
                Ok(false)
            }
        }
    }

    /// Dispatch one command packet. Returns false when the loop should
    /// exit (COM_QUIT).
    async fn dispatch(&mut self, data: &[u8]) -> SqlResult<bool> {
        if data.is_empty() {
            return Err(ServerError::malformed("empty command packet"));
        }
        let code = data[0];
        let rest = &data[1..];
        let command = Command::try_from(code).map_err(|_| {
            ServerError::mysql(
                ErrorKind::UnknownComError,
                format!("Unsupported Command: {:#04x}", code),
            )
        })?;
        debug!("connection {} command {:?}", self.connection_id, command);

        match command {
            Command::ComQuit => return Ok(false),
            Command::ComInitDb => self.handle_init_db(rest).await?,
            Command::ComQuery => self.handle_query(rest).await?,
            Command::ComFieldList => self.handle_field_list(rest).await?,
            Command::ComDebug | Command::ComPing | Command::ComSetOption => {
                self.write_ok(OkPacket::with_flags(self.status_flags)).await?
            }
            Command::ComChangeUser => self.handle_change_user(rest).await?,
            Command::ComResetConnection => self.handle_reset_connection().await?,
            Command::ComStmtPrepare => self.handle_stmt_prepare(rest).await?,
            Command::ComStmtExecute => self.handle_stmt_execute(rest).await?,
            Command::ComStmtSendLongData => self.handle_stmt_send_long_data(rest)?,
            Command::ComStmtFetch => self.handle_stmt_fetch(rest).await?,
            Command::ComStmtReset => self.handle_stmt_reset(rest).await?,
            Command::ComStmtClose => self.handle_stmt_close(rest)?,
            other => {
                return Err(ServerError::mysql(
                    ErrorKind::UnknownComError,
                    format!("Unsupported Command: {:?}", other),
                ))
            }
        }
        Ok(true)
    }

    async fn handle_init_db(&mut self, data: &[u8]) -> SqlResult<()> {
        let db = parse_com_init_db(self.client_charset(), data)?;
        self.ctx.database = Some(db.clone());
        self.session.use_db(&db).await?;
        self.write_ok(OkPacket::with_flags(self.status_flags)).await
    }

    async fn handle_query(&mut self, data: &[u8]) -> SqlResult<()> {
        let com_query = parse_com_query(self.capabilities, self.client_charset(), data)?;
        let result = {
            let mut qc = QueryContext::new(
                &mut self.ctx,
                self.session.as_mut(),
                self.control.as_ref(),
                &com_query.query_attrs,
            );
            intercept::handle_query(&mut qc, &com_query.sql).await?
        };
        match result {
            Some(rs) if rs.has_columns() => self.write_text_result_set(rs).await,
            _ => self.write_ok(OkPacket::with_flags(self.status_flags)).await,
        }
    }

    async fn handle_field_list(&mut self, data: &[u8]) -> SqlResult<()> {
        let field_list = parse_com_field_list(self.client_charset(), data)?;
        let db = self
            .ctx
            .database
            .clone()
            .ok_or_else(|| ServerError::mysql(ErrorKind::NoDbError, "No database selected"))?;
        let like = if field_list.wildcard.is_empty() {
            None
        } else {
            Some(field_list.wildcard.as_str())
        };
        let sql = schema::show_columns_query(&db, &field_list.table, like, false);

        let mut rs = {
            let attrs = HashMap::new();
            let mut qc = QueryContext::new(
                &mut self.ctx,
                self.session.as_mut(),
                self.control.as_ref(),
                &attrs,
            );
            intercept::run_internal_select(&mut qc, &sql).await?
        };
        let rows = rs.collect_rows().await?;

        let server_charset = self.server_charset();
        for row in rows {
            let name = row.first().map(|v| v.as_text()).unwrap_or_default();
            let default = match row.get(4) {
                Some(Value::Null) | None => None,
                Some(value) => Some(value.as_text()),
            };
            let def = ColumnDefinition {
                schema: db.clone(),
                table: field_list.table.clone(),
                is_field_list: true,
                default,
                ..ColumnDefinition::named(name)
            };
            self.stream.write_packet(&def.serialize(server_charset));
        }
        self.write_ok_or_eof(0, ServerStatus::empty()).await
    }

    async fn handle_change_user(&mut self, data: &[u8]) -> SqlResult<()> {
        let change = parse_com_change_user(self.capabilities, self.client_charset(), data)?;

        self.stmts.clear();
        self.session.reset().await?;
        self.ctx.reset();
        apply_version(&mut self.ctx, &self.version, &self.version_comment)?;
        self.ctx.database = change.database.clone();
        self.ctx.connect_attrs = change.connect_attrs.clone();
        self.ctx
            .vars
            .set("external_user", Value::Str(change.username.clone()), true)?;
        if let Some(charset) = change.client_charset {
            self.set_client_charset(charset)?;
        }

        let authenticated = self
            .authenticate(
                change.username,
                change.auth_response,
                change.client_plugin,
                change.connect_attrs,
                None,
            )
            .await?;
        if authenticated {
            self.session.init(&self.ctx).await?;
        }
        Ok(())
    }

    async fn handle_reset_connection(&mut self) -> SqlResult<()> {
        // Keep identity and current database; drop statement and variable
        // state.
        self.stmts.clear();
        let database = self.ctx.database.take();
        let username = self.ctx.username.take();
        let connect_attrs = std::mem::take(&mut self.ctx.connect_attrs);
        self.ctx.reset();
        apply_version(&mut self.ctx, &self.version, &self.version_comment)?;
        self.ctx.database = database;
        self.ctx.username = username;
        self.ctx.connect_attrs = connect_attrs;
        self.session.reset().await?;
        self.write_ok(OkPacket::with_flags(self.status_flags)).await
    }

    // Prepared statements -----------------------------------------------

    fn next_stmt_id(&mut self) -> u32 {
        self.stmt_seq = self.stmt_seq.wrapping_add(1);
        if self.stmt_seq == 0 {
            self.stmt_seq = 1;
        }
        self.stmt_seq
    }

    fn stmt_mut(&mut self, stmt_id: u32) -> SqlResult<&mut PreparedStatement> {
        self.stmts.get_mut(&stmt_id).ok_or_else(|| {
            ServerError::mysql(
                ErrorKind::UnknownProcedure,
                format!("Unknown statement: {}", stmt_id),
            )
        })
    }

    async fn handle_stmt_prepare(&mut self, data: &[u8]) -> SqlResult<()> {
        let sql = self.client_charset().decode(data)?;
        let stmt_id = self.next_stmt_id();
        let stmt = PreparedStatement::new(stmt_id, sql);
        let num_params = stmt.num_params;
        self.stmts.insert(stmt_id, stmt);

        let ok = ComStmtPrepareOk {
            stmt_id,
            num_columns: 0,
            num_params,
            warnings: 0,
        };
        self.stream.write_packet(&ok.serialize());

        if num_params > 0 {
            let server_charset = self.server_charset();
            for _ in 0..num_params {
                let def = ColumnDefinition::named("?");
                self.stream.write_packet(&def.serialize(server_charset));
            }
            let eof = EofPacket {
                warnings: 0,
                status_flags: self.status_flags,
            };
            self.stream.write_packet(&eof.serialize(self.capabilities));
        }
        self.stream.flush().await
    }

    fn handle_stmt_send_long_data(&mut self, data: &[u8]) -> SqlResult<()> {
        let long_data = parse_com_stmt_send_long_data(data)?;
        let stmt = self.stmt_mut(long_data.stmt_id)?;
        stmt.append_long_data(long_data.param_id, &long_data.data);
        // No response packet for COM_STMT_SEND_LONG_DATA.
        Ok(())
    }

    async fn handle_stmt_execute(&mut self, data: &[u8]) -> SqlResult<()> {
        let stmt_id = peek_stmt_id(data)?;
        let (num_params, buffers, sql) = {
            let stmt = self.stmt_mut(stmt_id)?;
            // Long-data buffers are cleared on execute regardless of the
            // outcome.
            (stmt.num_params, stmt.param_buffers.take(), stmt.sql.clone())
        };

        let exec = parse_com_stmt_execute(
            self.capabilities,
            self.client_charset(),
            data,
            num_params,
            buffers.as_ref(),
        )?;

        let stmt_values: Vec<Value> = exec
            .params
            .iter()
            .take(num_params as usize)
            .map(|(_, value)| value.clone())
            .collect();
        let attrs: HashMap<String, String> = exec
            .params
            .iter()
            .skip(num_params as usize)
            .filter_map(|(name, value)| name.clone().map(|n| (n, value.as_text())))
            .collect();
        let rewritten = interpolate_params(&sql, &stmt_values);

        let result = {
            let mut qc = QueryContext::new(
                &mut self.ctx,
                self.session.as_mut(),
                self.control.as_ref(),
                &attrs,
            );
            intercept::handle_query(&mut qc, &rewritten).await?
        };

        let rs = match result {
            Some(rs) if rs.has_columns() => rs,
            _ => {
                return self.write_ok(OkPacket::with_flags(self.status_flags)).await;
            }
        };

        self.write_column_header(&rs).await?;

        if exec.use_cursor {
            // Do not drain the rows; stash the cursor for COM_STMT_FETCH.
            self.stmt_mut(stmt_id)?.cursor = Some(rs);
            return self
                .write_ok_or_eof(0, ServerStatus::SERVER_STATUS_CURSOR_EXISTS)
                .await;
        }

        if !self.deprecate_eof() {
            let eof = EofPacket {
                warnings: 0,
                status_flags: self.status_flags,
            };
            self.stream.write_packet(&eof.serialize(self.capabilities));
        }

        let columns = rs.columns.clone();
        let mut rs = rs;
        let mut affected: u64 = 0;
        let mut since_yield = 0usize;
        while let Some(row) = rs.next_row().await? {
            let packet = binary::binary_row(&row, &columns)?;
            self.stream.write_packet(&packet);
            affected += 1;
            since_yield += 1;
            if since_yield >= YIELD_EVERY {
                since_yield = 0;
                self.stream.flush().await?;
                tokio::task::yield_now().await;
            }
        }
        self.write_ok_or_eof(affected, ServerStatus::empty()).await
    }

    async fn handle_stmt_fetch(&mut self, data: &[u8]) -> SqlResult<()> {
        let fetch = parse_com_stmt_fetch(data)?;
        let capabilities = self.capabilities;
        let status_flags = self.status_flags;
        let deprecate_eof = self.deprecate_eof();

        let stmt = self.stmts.get_mut(&fetch.stmt_id).ok_or_else(|| {
            ServerError::mysql(
                ErrorKind::UnknownProcedure,
                format!("Unknown statement: {}", fetch.stmt_id),
            )
        })?;
        let cursor = stmt.cursor.as_mut().ok_or_else(|| {
            ServerError::mysql(
                ErrorKind::UnknownError,
                format!("Statement {} has no open cursor", fetch.stmt_id),
            )
        })?;

        let columns = cursor.columns.clone();
        let mut sent: u32 = 0;
        let mut exhausted = false;
        while sent < fetch.num_rows {
            match cursor.next_row().await? {
                Some(row) => {
                    let packet = binary::binary_row(&row, &columns)?;
                    self.stream.write_packet(&packet);
                    sent += 1;
                }
                None => {
                    exhausted = true;
                    break;
                }
            }
        }
        if !exhausted && sent == fetch.num_rows {
            // Peek ahead so an exactly-consumed cursor reports the end now.
            match cursor.next_row().await? {
                Some(row) => cursor.push_front(row),
                None => exhausted = true,
            }
        }

        let flags = if exhausted {
            ServerStatus::SERVER_STATUS_LAST_ROW_SENT
        } else {
            ServerStatus::SERVER_STATUS_CURSOR_EXISTS
        };
        let packet = if deprecate_eof {
            OkPacket {
                eof: true,
                status_flags: status_flags | flags,
                ..Default::default()
            }
            .serialize(capabilities)
        } else {
            EofPacket {
                warnings: 0,
                status_flags: status_flags | flags,
            }
            .serialize(capabilities)
        };
        self.stream.write_packet(&packet);
        self.stream.flush().await
    }

    async fn handle_stmt_reset(&mut self, data: &[u8]) -> SqlResult<()> {
        let reset = parse_com_stmt_reset(data)?;
        self.stmt_mut(reset.stmt_id)?.reset();
        self.write_ok(OkPacket::with_flags(self.status_flags)).await
    }

    fn handle_stmt_close(&mut self, data: &[u8]) -> SqlResult<()> {
        let close = parse_com_stmt_close(data)?;
        self.stmts.remove(&close.stmt_id);
        // No response packet for COM_STMT_CLOSE.
        Ok(())
    }

    // Result serialization ----------------------------------------------

    async fn write_column_header(&mut self, rs: &ResultSet) -> SqlResult<()> {
        self.stream
            .write_packet(&make_column_count(self.capabilities, rs.columns.len()));
        let server_charset = self.server_charset();
        for column in &rs.columns {
            let def = ColumnDefinition::for_column(column);
            self.stream.write_packet(&def.serialize(server_charset));
        }
        Ok(())
    }

    async fn write_text_result_set(&mut self, mut rs: ResultSet) -> SqlResult<()> {
        self.write_column_header(&rs).await?;
        if !self.deprecate_eof() {
            let eof = EofPacket {
                warnings: 0,
                status_flags: self.status_flags,
            };
            self.stream.write_packet(&eof.serialize(self.capabilities));
        }

        let columns = rs.columns.clone();
        let mut affected: u64 = 0;
        let mut since_yield = 0usize;
        while let Some(row) = rs.next_row().await? {
            let packet = text::text_row(&row, &columns);
            self.stream.write_packet(&packet);
            affected += 1;
            since_yield += 1;
            if since_yield >= YIELD_EVERY {
                since_yield = 0;
                // Drain the write buffer before pulling more rows so a
                // long result set cannot starve other connections.
                self.stream.flush().await?;
                tokio::task::yield_now().await;
            }
        }
        self.write_ok_or_eof(affected, ServerStatus::empty()).await
    }

    async fn write_ok(&mut self, packet: OkPacket) -> SqlResult<()> {
        self.stream.write_packet(&packet.serialize(self.capabilities));
        self.stream.flush().await
    }

    async fn write_ok_or_eof(&mut self, affected_rows: u64, flags: ServerStatus) -> SqlResult<()> {
        let packet = if self.deprecate_eof() {
            OkPacket {
                eof: true,
                affected_rows,
                status_flags: self.status_flags | flags,
                ..Default::default()
            }
            .serialize(self.capabilities)
        } else {
            EofPacket {
                warnings: 0,
                status_flags: self.status_flags | flags,
            }
            .serialize(self.capabilities)
        };
        self.stream.write_packet(&packet);
        self.stream.flush().await
    }
}

fn client_plugin_matches(plugin: &dyn AuthPlugin, client_plugin: Option<&str>) -> bool {
    match plugin.client_plugin_name() {
        None => true,
        Some(name) => client_plugin == Some(name),
    }
}

fn apply_version(ctx: &mut SessionContext, version: &str, version_comment: &str) -> SqlResult<()> {
    ctx.vars
        .set("version", Value::Str(version.to_string()), true)?;
    ctx.vars.set(
        "version_comment",
        Value::Str(version_comment.to_string()),
        true,
    )?;
    Ok(())
}
