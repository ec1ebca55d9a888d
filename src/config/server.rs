use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Public base URL for external access (e.g., "https://files.example.com").
    /// Used to precompute file download URLs. If not set, file records carry no URL.
    pub public_base_url: Option<String>,
    pub storage: StorageConfig,
}

/// Where repository buckets live.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Buckets are directories under `<root>/buckets`.
    Filesystem { root: PathBuf },
    S3(S3Config),
}

#[derive(Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("filehost.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            storage: StorageConfig::Filesystem {
                root: data_dir.clone(),
            },
            data_dir,
            public_base_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = ServerConfig::default();
        assert_eq!(config.db_path(), PathBuf::from("./data/filehost.db"));
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_s3_config_debug_hides_secret() {
        let config = S3Config {
            endpoint: "http://localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "supersecret".to_string(),
        };
        assert!(!format!("{config:?}").contains("supersecret"));
    }
}
