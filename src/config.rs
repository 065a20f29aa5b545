//! Server configuration from environment variables.
//!
//! `HOST` (default `0.0.0.0`), `PORT` (default `8080`), and `SESSION_KEY` (at least 64 bytes;
//! a random key is used when unset, so sessions do not survive a restart).

/// Minimum length of a session signing key, in bytes.
pub const MIN_SESSION_KEY_LEN: usize = 64;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub session_key: Option<Vec<u8>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_key: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unparseable or too-short values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("HOST").unwrap_or_else(default_host);
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("ignoring invalid PORT {:?}", raw);
                default_port()
            }),
            None => default_port(),
        };
        let session_key = lookup("SESSION_KEY")
            .map(String::into_bytes)
            .filter(|key| {
                let ok = key.len() >= MIN_SESSION_KEY_LEN;
                if !ok {
                    log::warn!("SESSION_KEY shorter than {} bytes, ignoring it", MIN_SESSION_KEY_LEN);
                }
                ok
            });
        Self {
            host,
            port,
            session_key,
        }
    }

    pub fn bind_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        assert_eq!(ServerConfig::from_lookup(|_| None), ServerConfig::default());
    }

    #[test]
    fn reads_and_validates_values() {
        let vars: HashMap<&str, String> = [
            ("HOST", "127.0.0.1".to_string()),
            ("PORT", "not-a-port".to_string()),
            ("SESSION_KEY", "short".to_string()),
        ]
        .into_iter()
        .collect();
        let cfg = ServerConfig::from_lookup(|k| vars.get(k).cloned());
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.session_key, None);
    }
}
