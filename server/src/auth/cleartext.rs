//! mysql_clear_password: the client sends the password in the clear
//! (typically under TLS) and a user-supplied verifier checks it.

use std::sync::Arc;

use async_trait::async_trait;

use mimic_common::err::SqlResult;

use super::{AuthInfo, AuthPlugin, AuthState, Decision};

/// Application hook that validates a cleartext credential. Returns the
/// authenticated identity, or None to reject.
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    async fn check(&self, username: &str, password: &str) -> SqlResult<Option<String>>;
}

pub struct ClearPasswordAuthPlugin {
    verifier: Arc<dyn PasswordVerifier>,
}

impl ClearPasswordAuthPlugin {
    pub const NAME: &'static str = "mysql_clear_password";

    pub fn new(verifier: Arc<dyn PasswordVerifier>) -> Self {
        ClearPasswordAuthPlugin { verifier }
    }
}

struct ClearState {
    verifier: Arc<dyn PasswordVerifier>,
}

#[async_trait]
impl AuthState for ClearState {
    async fn step(&mut self, info: &AuthInfo) -> SqlResult<Decision> {
        // The password is null-terminated; tolerate a missing terminator.
        let end = info
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(info.data.len());
        let password = String::from_utf8_lossy(&info.data[..end]).into_owned();

        match self.verifier.check(&info.username, &password).await? {
            Some(authenticated_as) => Ok(Decision::Success { authenticated_as }),
            None => Ok(Decision::Forbidden { msg: None }),
        }
    }
}

#[async_trait]
impl AuthPlugin for ClearPasswordAuthPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn client_plugin_name(&self) -> Option<&'static str> {
        Some(Self::NAME)
    }

    async fn start(&self, info: Option<&AuthInfo>) -> SqlResult<(Decision, Box<dyn AuthState>)> {
        let mut state = ClearState {
            verifier: self.verifier.clone(),
        };
        match info {
            Some(info) if !info.data.is_empty() => {
                let decision = state.step(info).await?;
                Ok((decision, Box::new(state)))
            }
            // 20 bytes of filler for the handshake, ignored by the client.
            _ => Ok((Decision::Challenge(vec![0; 20]), Box::new(state))),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::super::User;
    use super::*;

    struct FixedPassword;

    #[async_trait]
    impl PasswordVerifier for FixedPassword {
        async fn check(&self, username: &str, password: &str) -> SqlResult<Option<String>> {
            Ok((password == "sesame").then(|| username.to_string()))
        }
    }

    fn info(data: Vec<u8>) -> AuthInfo {
        AuthInfo {
            username: "ali".into(),
            data,
            user: User::new("ali"),
            connect_attrs: HashMap::new(),
            client_plugin_name: Some(ClearPasswordAuthPlugin::NAME.to_string()),
            handshake_auth_data: None,
            handshake_plugin_name: "mysql_native_password".to_string(),
        }
    }

    #[tokio::test]
    async fn test_accepts_known_password() {
        let plugin = ClearPasswordAuthPlugin::new(Arc::new(FixedPassword));
        let (decision, _) = plugin.start(Some(&info(b"sesame\0".to_vec()))).await.unwrap();
        assert_eq!(
            Decision::Success {
                authenticated_as: "ali".into()
            },
            decision
        );
    }

    #[tokio::test]
    async fn test_rejects_unknown_password() {
        let plugin = ClearPasswordAuthPlugin::new(Arc::new(FixedPassword));
        let (decision, _) = plugin.start(Some(&info(b"thief\0".to_vec()))).await.unwrap();
        assert!(matches!(decision, Decision::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_initial_challenge_is_filler() {
        let plugin = ClearPasswordAuthPlugin::new(Arc::new(FixedPassword));
        let (decision, _) = plugin.start(None).await.unwrap();
        assert_eq!(Decision::Challenge(vec![0; 20]), decision);
    }
}
