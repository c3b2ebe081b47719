use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::err::{ServerError, SqlResult};

/// Server configuration, loadable from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind: String,
    pub port: u16,
    /// Optional unix domain socket path. When set, a unix listener is
    /// served alongside (or instead of) the TCP listener.
    pub socket: Option<String>,
    /// Fixed 16-bit server id used as the high half of connection ids.
    /// A random id is drawn at startup when unset.
    pub server_id: Option<u16>,
    pub version: String,
    pub version_comment: String,
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PKCS#12 identity bundle.
    pub identity_path: String,
    #[serde(default)]
    pub identity_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0".to_string(),
            port: 3306,
            socket: None,
            server_id: None,
            version: "8.0.29".to_string(),
            version_comment: "mysql-mimic".to_string(),
            tls: None,
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> SqlResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| ServerError::mysql(crate::err::ErrorKind::UnknownError, e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::ServerConfig;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(3306, config.port);
        assert_eq!("mysql-mimic", config.version_comment);
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = ServerConfig {
            port: 3307,
            server_id: Some(17),
            ..ServerConfig::default()
        };
        let text = serde_yaml::to_string(&config).unwrap();
        let back: ServerConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(3307, back.port);
        assert_eq!(Some(17), back.server_id);
    }
}
