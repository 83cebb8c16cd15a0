use std::env;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from `CURSEBOUND_ADDR`, falling back to defaults.
    pub fn from_env() -> Self {
        let bind_addr = env::var("CURSEBOUND_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        Self { bind_addr }
    }
}
