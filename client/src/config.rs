use std::{fs, path::Path};

use rand::Rng;
use serde::Deserialize;

use shared::errors::{ClientError, ClientResult};

use crate::gpu;

/// Session configuration, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    pub nickname: String,
    pub token: String,
    pub gpu_id: String,
    pub workername: String,
    prefix: String,
    pub device_name: String,
}

impl Config {
    /// Optional address-prefix filter; `"None"` and empty mean unset.
    pub fn prefix(&self) -> Option<&str> {
        if self.prefix.is_empty() || self.prefix == "None" {
            None
        } else {
            Some(&self.prefix)
        }
    }
}

#[derive(Deserialize)]
struct RawConfig {
    nickname: String,
    token: String,
    #[serde(rename = "gpuId")]
    gpu_id: GpuId,
    workername: String,
    prefix: String,
}

/// `gpuId` is accepted as a JSON number or a digit string.
#[derive(Deserialize)]
#[serde(untagged)]
enum GpuId {
    Num(u64),
    Text(String),
}

/// Reads the config file and probes the device name. Both block on the
/// filesystem and external tools, so the work runs on the blocking pool.
pub async fn load_config(path: &str) -> ClientResult<Config> {
    let path = path.to_string();
    tokio::task::spawn_blocking(move || load_config_blocking(&path))
        .await
        .map_err(|err| ClientError::Config(format!("config load task: {err}")))?
}

fn load_config_blocking(path: &str) -> ClientResult<Config> {
    if !Path::new(path).exists() {
        return Err(ClientError::Config(format!("{path} not found, create it first")));
    }
    let text = fs::read_to_string(path)
        .map_err(|err| ClientError::Config(format!("fail to read {path}: {err}")))?;
    let mut config = parse_config(&text)?;
    config.device_name = gpu::model();
    Ok(config)
}

pub(crate) fn parse_config(text: &str) -> ClientResult<Config> {
    let raw: RawConfig =
        serde_json::from_str(text).map_err(|err| ClientError::Config(err.to_string()))?;

    let gpu_id = match raw.gpu_id {
        GpuId::Num(n) => n.to_string(),
        GpuId::Text(s) => {
            if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
                return Err(ClientError::Config("gpuId must be numeric".to_string()));
            }
            s
        }
    };

    // the sentinel worker name gets a one-time random suffix so workers on
    // identical setups stay distinguishable server-side
    let workername = match raw.workername.as_str() {
        "" => return Err(ClientError::Config("workername must not be empty".to_string())),
        "default" => format!("default_{}", random_suffix(4)),
        _ => raw.workername,
    };

    Ok(Config {
        nickname: raw.nickname,
        token: raw.token,
        gpu_id,
        workername,
        prefix: raw.prefix,
        device_name: String::new(),
    })
}

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char).collect()
}
