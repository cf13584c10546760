use std::fs;

use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;

pub const DEFAULT_IP: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8826;

pub const CONFIG_FILE_PATH: &str = "config.json";
pub const DATABASE_FILE_PATH: &str = "quiznight.sqlite";

lazy_static! {
    static ref IP_REGEX: Regex =
        Regex::new(r"^((25[0-5]|(2[0-4]|1\d|[1-9]|)\d)\.?\b){4}$").expect("ip regex compiles");
}

/// The listen address of the server, loaded from a config file if one exists.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
}

impl ServerConfig {
    /// Loads the config file at the given path, falling back to default
    /// values for anything missing or invalid.
    pub fn load(path: &str) -> Self {
        let mut config = Self::default();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => {
                info!(
                    "No config file found, using default address {}:{}",
                    config.ip, config.port
                );
                return config;
            }
        };

        let root: serde_json::Value = match serde_json::from_str(&contents) {
            Ok(root) => root,
            Err(e) => {
                warn!("Failed to parse {}: {}. Using default values", path, e);
                return config;
            }
        };

        match root.get("ip").and_then(|v| v.as_str()) {
            Some(ip) if is_valid_ip(ip) => config.ip = ip.to_string(),
            _ => warn!("Config has no valid ip, using default {}", config.ip),
        }

        match root.get("port").and_then(|v| v.as_i64()) {
            Some(port) if is_valid_port(port) => config.port = port as u16,
            _ => warn!("Config has no valid port, using default {}", config.port),
        }

        config
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

fn is_valid_ip(ip: &str) -> bool {
    IP_REGEX.is_match(ip)
}

fn is_valid_port(port: i64) -> bool {
    port > 0 && port < 65535
}
