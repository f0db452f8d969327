//! Configuration for Waymark
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Waymark - schema-driven tracker and log-entry service
#[derive(Parser, Debug, Clone)]
#[command(name = "waymark")]
#[command(about = "Schema-driven tracker and log-entry service")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "waymark")]
    pub mongodb_db: String,

    /// Enable development mode (admin API key becomes optional and grants
    /// privileged access without a key)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// API key for privileged operations: permanent deletes, enum-value
    /// removal, backdated entries (required in production)
    #[arg(long, env = "API_KEY_ADMIN")]
    pub api_key_admin: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Resolve a linked tracker from the field name (trailing "log"
    /// stripped) when a nested object declares no createLinkedLog
    #[arg(long, env = "CASCADE_NAME_FALLBACK", default_value = "false")]
    pub cascade_name_fallback: bool,

    /// Cascade warnings retained per user before the oldest are dropped
    #[arg(long, env = "CASCADE_WARNING_CAPACITY", default_value = "100")]
    pub cascade_warning_capacity: usize,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.api_key_admin.is_none() {
            return Err("API_KEY_ADMIN is required in production mode".to_string());
        }
        Ok(())
    }

    /// Whether the presented key grants privileged access
    pub fn is_admin_key(&self, presented: Option<&str>) -> bool {
        match &self.api_key_admin {
            Some(expected) => presented == Some(expected.as_str()),
            // Without a configured key, privileged access only in dev mode
            None => self.dev_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(dev_mode: bool, api_key_admin: Option<&str>) -> Args {
        Args {
            node_id: Uuid::new_v4(),
            listen: "127.0.0.1:8080".parse().unwrap(),
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_db: "waymark".into(),
            dev_mode,
            api_key_admin: api_key_admin.map(String::from),
            log_level: "info".into(),
            cascade_name_fallback: false,
            cascade_warning_capacity: 100,
        }
    }

    #[test]
    fn test_admin_key_matching() {
        let production = args(false, Some("secret"));
        assert!(production.is_admin_key(Some("secret")));
        assert!(!production.is_admin_key(Some("wrong")));
        assert!(!production.is_admin_key(None));

        let dev = args(true, None);
        assert!(dev.is_admin_key(None));
        assert!(dev.is_admin_key(Some("anything")));

        // A configured key binds even in dev mode
        let dev_with_key = args(true, Some("secret"));
        assert!(!dev_with_key.is_admin_key(Some("wrong")));
    }

    #[test]
    fn test_validate_requires_admin_key_in_production() {
        assert!(args(false, None).validate().is_err());
        assert!(args(false, Some("secret")).validate().is_ok());
        assert!(args(true, None).validate().is_ok());
    }
}
