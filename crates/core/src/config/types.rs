use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::encoder::EncoderConfig;
use crate::queue::QueueConfig;
use crate::renderer::PoolConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served as the static frontend.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

/// Expired-artifact cleanup configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    /// Minutes between cleanup sweeps.
    #[serde(default = "default_cleanup_interval")]
    pub interval_mins: u64,
    /// Output/upload/temp files older than this are removed.
    #[serde(default = "default_output_ttl")]
    pub output_ttl_mins: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_mins: default_cleanup_interval(),
            output_ttl_mins: default_output_ttl(),
        }
    }
}

fn default_cleanup_interval() -> u64 {
    30
}

fn default_output_ttl() -> u64 {
    60
}

/// Request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

/// Sanitized config for API responses (filesystem paths reduced to
/// booleans where they could leak deployment layout)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: SanitizedServerConfig,
    pub queue: QueueConfig,
    pub pool: SanitizedPoolConfig,
    pub cleanup: CleanupConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPoolConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub idle_timeout_secs: u64,
    pub renderer_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: SanitizedServerConfig {
                host: config.server.host,
                port: config.server.port,
            },
            queue: config.queue.clone(),
            pool: SanitizedPoolConfig {
                min_workers: config.pool.min_workers,
                max_workers: config.pool.max_workers,
                idle_timeout_secs: config.pool.idle_timeout_secs,
                renderer_configured: config.pool.renderer_path.is_some(),
            },
            cleanup: config.cleanup.clone(),
            limits: config.limits.clone(),
        }
    }
}
