//! mysql_no_login: unconditionally refuses direct authentication. Assign
//! it to proxy-only accounts that should never log in themselves.

use async_trait::async_trait;

use mimic_common::err::SqlResult;

use super::{AuthInfo, AuthPlugin, AuthState, Decision};

pub struct NoLoginAuthPlugin;

impl NoLoginAuthPlugin {
    pub const NAME: &'static str = "mysql_no_login";
}

struct NoLoginState;

#[async_trait]
impl AuthState for NoLoginState {
    async fn step(&mut self, _info: &AuthInfo) -> SqlResult<Decision> {
        Ok(Decision::Forbidden { msg: None })
    }
}

#[async_trait]
impl AuthPlugin for NoLoginAuthPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn client_plugin_name(&self) -> Option<&'static str> {
        None
    }

    async fn start(&self, _info: Option<&AuthInfo>) -> SqlResult<(Decision, Box<dyn AuthState>)> {
        Ok((Decision::Forbidden { msg: None }, Box::new(NoLoginState)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_always_forbidden() {
        let plugin = NoLoginAuthPlugin;
        let (decision, _) = plugin.start(None).await.unwrap();
        assert!(matches!(decision, Decision::Forbidden { .. }));
    }
}
