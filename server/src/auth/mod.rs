//! Pluggable authentication. A plugin is an explicit state machine: the
//! connection drives it with `start` / `step` and relays `Challenge`
//! rounds as AuthMoreData packets.

pub mod cleartext;
pub mod gullible;
pub mod native;
pub mod no_login;

pub use cleartext::{ClearPasswordAuthPlugin, PasswordVerifier};
pub use gullible::GullibleAuthPlugin;
pub use native::{native_password_auth_string, NativePasswordAuthPlugin};
pub use no_login::NoLoginAuthPlugin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use mimic_common::err::SqlResult;

/// Outcome of one authentication round.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Success { authenticated_as: String },
    Forbidden { msg: Option<String> },
    /// More data for the client; the exchange continues.
    Challenge(Vec<u8>),
}

/// A user record handed back by the identity provider. The strings are
/// plugin-specific hashes or tokens.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub name: String,
    pub auth_string: Option<String>,
    /// Previous auth string, honored during rolling credential rotation.
    pub old_auth_string: Option<String>,
    pub auth_plugin: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        User {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Per-round state passed into an auth plugin step.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub username: String,
    /// The client's latest auth payload.
    pub data: Vec<u8>,
    pub user: User,
    pub connect_attrs: HashMap<String, String>,
    pub client_plugin_name: Option<String>,
    /// Challenge data embedded in the initial handshake, reusable by
    /// plugins on COM_CHANGE_USER to save a round trip.
    pub handshake_auth_data: Option<Vec<u8>>,
    pub handshake_plugin_name: String,
}

impl AuthInfo {
    pub fn with_data(&self, data: Vec<u8>) -> AuthInfo {
        AuthInfo {
            data,
            ..self.clone()
        }
    }
}

/// Resumable exchange state returned by [`AuthPlugin::start`].
#[async_trait]
pub trait AuthState: Send {
    async fn step(&mut self, info: &AuthInfo) -> SqlResult<Decision>;
}

#[async_trait]
pub trait AuthPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Name of the client-side plugin this one speaks to. None means any.
    fn client_plugin_name(&self) -> Option<&'static str>;

    /// Begin the exchange. Without client input this yields the initial
    /// challenge (embedded in HandshakeV10 for the default plugin). With
    /// input it may decide immediately, e.g. when the handshake nonce can
    /// be reused.
    async fn start(&self, info: Option<&AuthInfo>) -> SqlResult<(Decision, Box<dyn AuthState>)>;
}

/// The identity store consulted during authentication. Must be safe for
/// concurrent calls from many connections.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Available plugins; the first is the server's default.
    fn plugins(&self) -> Vec<Arc<dyn AuthPlugin>>;

    async fn user(&self, username: &str) -> SqlResult<Option<User>>;

    fn plugin(&self, name: &str) -> Option<Arc<dyn AuthPlugin>> {
        self.plugins().into_iter().find(|p| p.name() == name)
    }
}

/// Accepts anyone as whoever they claim to be. The default provider, for
/// deployments that do authorization elsewhere.
pub struct AllowAllIdentityProvider;

#[async_trait]
impl IdentityProvider for AllowAllIdentityProvider {
    fn plugins(&self) -> Vec<Arc<dyn AuthPlugin>> {
        vec![Arc::new(GullibleAuthPlugin)]
    }

    async fn user(&self, username: &str) -> SqlResult<Option<User>> {
        Ok(Some(User::new(username)))
    }
}

/// In-memory identity provider over a fixed user table.
pub struct SimpleIdentityProvider {
    plugins: Vec<Arc<dyn AuthPlugin>>,
    users: HashMap<String, User>,
}

impl SimpleIdentityProvider {
    pub fn new(plugins: Vec<Arc<dyn AuthPlugin>>, users: impl IntoIterator<Item = User>) -> Self {
        SimpleIdentityProvider {
            plugins,
            users: users.into_iter().map(|u| (u.name.clone(), u)).collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SimpleIdentityProvider {
    fn plugins(&self) -> Vec<Arc<dyn AuthPlugin>> {
        self.plugins.clone()
    }

    async fn user(&self, username: &str) -> SqlResult<Option<User>> {
        Ok(self.users.get(username).cloned())
    }
}

pub(crate) fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len()];
    for (i, byte) in a.iter().enumerate() {
        out[i] = byte ^ b[i % b.len()];
    }
    out
}

pub(crate) fn sha1(value: &[u8]) -> Vec<u8> {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(value);
    hasher.finalize().as_slice().to_vec()
}
