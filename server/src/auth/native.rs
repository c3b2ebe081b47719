//! mysql_native_password: challenge/response over double-SHA1 hashes.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_connection_phase_authentication_methods_native_password_authentication.html

use async_trait::async_trait;
use rand::Rng;

use mimic_common::err::SqlResult;

use super::{sha1, xor, AuthInfo, AuthPlugin, AuthState, Decision, User};

pub struct NativePasswordAuthPlugin;

impl NativePasswordAuthPlugin {
    pub const NAME: &'static str = "mysql_native_password";
}

struct NativeState {
    nonce: Vec<u8>,
}

#[async_trait]
impl AuthState for NativeState {
    async fn step(&mut self, info: &AuthInfo) -> SqlResult<Decision> {
        Ok(verify(&info.user, &info.data, &self.nonce))
    }
}

#[async_trait]
impl AuthPlugin for NativePasswordAuthPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn client_plugin_name(&self) -> Option<&'static str> {
        Some(Self::NAME)
    }

    async fn start(&self, info: Option<&AuthInfo>) -> SqlResult<(Decision, Box<dyn AuthState>)> {
        if let Some(info) = info {
            // The nonce from the initial handshake can be reused when the
            // client already scrambled against it (COM_CHANGE_USER path).
            if info.handshake_plugin_name == Self::NAME {
                if let Some(nonce) = info.handshake_auth_data.clone().filter(|d| !d.is_empty()) {
                    let mut state = NativeState { nonce };
                    let decision = state.step(info).await?;
                    return Ok((decision, Box::new(state)));
                }
            }
        }

        let nonce = scramble_nonce();
        Ok((
            Decision::Challenge(nonce.clone()),
            Box::new(NativeState { nonce }),
        ))
    }
}

/// 20 random bytes restricted to printable ASCII; some client libraries
/// choke on NUL or high-bit bytes in the nonce.
fn scramble_nonce() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..20).map(|_| rng.gen_range(0x21..=0x7E)).collect()
}

fn verify(user: &User, scramble: &[u8], nonce: &[u8]) -> Decision {
    // Empty password quick path.
    if scramble.is_empty() {
        return if user.auth_string.as_deref().unwrap_or("").is_empty() {
            Decision::Success {
                authenticated_as: user.name.clone(),
            }
        } else {
            Decision::Forbidden { msg: None }
        };
    }

    let candidates = [user.auth_string.as_deref(), user.old_auth_string.as_deref()];
    for stored in candidates.into_iter().flatten() {
        if check_scramble(stored, scramble, nonce) {
            return Decision::Success {
                authenticated_as: user.name.clone(),
            };
        }
    }
    Decision::Forbidden { msg: None }
}

/// The client sends `SHA1(password) XOR SHA1(nonce || SHA1(SHA1(password)))`;
/// the stored auth string is hex `SHA1(SHA1(password))`.
fn check_scramble(stored_hex: &str, scramble: &[u8], nonce: &[u8]) -> bool {
    let sha1_sha1_password = match hex::decode(stored_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut salted = nonce.to_vec();
    salted.extend_from_slice(&sha1_sha1_password);
    let rcvd_sha1_password = xor(scramble, &sha1(&salted));
    sha1(&rcvd_sha1_password) == sha1_sha1_password
}

/// Hex auth string for a plaintext password, as stored in `mysql.user`.
pub fn native_password_auth_string(password: &str) -> String {
    hex::encode(sha1(&sha1(password.as_bytes())))
}

/// Client-side scramble, used by tests and by the auth-string helper docs.
pub fn scramble_password(password: &str, nonce: &[u8]) -> Vec<u8> {
    let sha1_password = sha1(password.as_bytes());
    let mut salted = nonce.to_vec();
    salted.extend_from_slice(&sha1(&sha1_password));
    xor(&sha1_password, &sha1(&salted))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn info(user: User, data: Vec<u8>, handshake: Option<Vec<u8>>) -> AuthInfo {
        AuthInfo {
            username: user.name.clone(),
            data,
            user,
            connect_attrs: HashMap::new(),
            client_plugin_name: Some(NativePasswordAuthPlugin::NAME.to_string()),
            handshake_auth_data: handshake,
            handshake_plugin_name: NativePasswordAuthPlugin::NAME.to_string(),
        }
    }

    #[tokio::test]
    async fn test_correct_password_admitted() {
        let plugin = NativePasswordAuthPlugin;
        let (challenge, mut state) = plugin.start(None).await.unwrap();
        let nonce = match challenge {
            Decision::Challenge(n) => n,
            other => panic!("expected challenge, got {:?}", other),
        };

        let user = User {
            name: "alice".into(),
            auth_string: Some(native_password_auth_string("secret")),
            ..Default::default()
        };
        let scramble = scramble_password("secret", &nonce);
        let decision = state.step(&info(user, scramble, None)).await.unwrap();
        assert_eq!(
            Decision::Success {
                authenticated_as: "alice".into()
            },
            decision
        );
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let plugin = NativePasswordAuthPlugin;
        let (challenge, mut state) = plugin.start(None).await.unwrap();
        let nonce = match challenge {
            Decision::Challenge(n) => n,
            other => panic!("expected challenge, got {:?}", other),
        };

        let user = User {
            name: "alice".into(),
            auth_string: Some(native_password_auth_string("secret")),
            ..Default::default()
        };
        let scramble = scramble_password("wrong", &nonce);
        let decision = state.step(&info(user, scramble, None)).await.unwrap();
        assert_eq!(Decision::Forbidden { msg: None }, decision);
    }

    #[tokio::test]
    async fn test_old_auth_string_rotation() {
        let nonce = b"01234567890123456789".to_vec();
        let user = User {
            name: "alice".into(),
            auth_string: Some(native_password_auth_string("new")),
            old_auth_string: Some(native_password_auth_string("old")),
            ..Default::default()
        };
        let scramble = scramble_password("old", &nonce);
        let mut state = NativeState {
            nonce: nonce.clone(),
        };
        let decision = state.step(&info(user, scramble, None)).await.unwrap();
        assert!(matches!(decision, Decision::Success { .. }));
    }

    #[tokio::test]
    async fn test_empty_password_quick_path() {
        let mut state = NativeState {
            nonce: b"01234567890123456789".to_vec(),
        };
        let user = User::new("ghost");
        let decision = state.step(&info(user, Vec::new(), None)).await.unwrap();
        assert!(matches!(decision, Decision::Success { .. }));

        let locked = User {
            name: "locked".into(),
            auth_string: Some(native_password_auth_string("x")),
            ..Default::default()
        };
        let decision = state.step(&info(locked, Vec::new(), None)).await.unwrap();
        assert!(matches!(decision, Decision::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_handshake_nonce_reuse() {
        let nonce = b"abcdefghijklmnopqrst".to_vec();
        let user = User {
            name: "alice".into(),
            auth_string: Some(native_password_auth_string("pw")),
            ..Default::default()
        };
        let scramble = scramble_password("pw", &nonce);
        let plugin = NativePasswordAuthPlugin;
        // start() with the handshake data decides without another round
        let (decision, _state) = plugin
            .start(Some(&info(user, scramble, Some(nonce))))
            .await
            .unwrap();
        assert!(matches!(decision, Decision::Success { .. }));
    }

    #[test]
    fn test_nonce_is_ascii_safe() {
        let nonce = scramble_nonce();
        assert_eq!(20, nonce.len());
        assert!(nonce.iter().all(|b| (0x21..=0x7E).contains(b)));
    }
}
