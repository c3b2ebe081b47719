//! A plugin that believes everyone. Default for servers that delegate
//! authorization to the backend.

use async_trait::async_trait;

use mimic_common::err::SqlResult;

use super::{AuthInfo, AuthPlugin, AuthState, Decision};

pub struct GullibleAuthPlugin;

impl GullibleAuthPlugin {
    pub const NAME: &'static str = "mysql_mimic_gullible";
}

struct GullibleState;

#[async_trait]
impl AuthState for GullibleState {
    async fn step(&mut self, info: &AuthInfo) -> SqlResult<Decision> {
        Ok(Decision::Success {
            authenticated_as: info.username.clone(),
        })
    }
}

#[async_trait]
impl AuthPlugin for GullibleAuthPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn client_plugin_name(&self) -> Option<&'static str> {
        None
    }

    async fn start(&self, info: Option<&AuthInfo>) -> SqlResult<(Decision, Box<dyn AuthState>)> {
        let mut state = GullibleState;
        match info {
            Some(info) => {
                let decision = state.step(info).await?;
                Ok((decision, Box::new(state)))
            }
            // 20 bytes of filler for the handshake, ignored by the client.
            None => Ok((Decision::Challenge(vec![0; 20]), Box::new(state))),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::super::User;
    use super::*;

    #[tokio::test]
    async fn test_accepts_anyone() {
        let plugin = GullibleAuthPlugin;
        let info = AuthInfo {
            username: "whoever".into(),
            data: Vec::new(),
            user: User::new("whoever"),
            connect_attrs: HashMap::new(),
            client_plugin_name: None,
            handshake_auth_data: None,
            handshake_plugin_name: GullibleAuthPlugin::NAME.to_string(),
        };
        let (decision, _) = plugin.start(Some(&info)).await.unwrap();
        assert_eq!(
            Decision::Success {
                authenticated_as: "whoever".into()
            },
            decision
        );
    }
}
