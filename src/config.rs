use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::brew::{DEFAULT_SPECIAL_PACKAGES, DEFAULT_SPECIAL_TIMEOUT_SECS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// brewfile 路径（默认 ~/.config/lian-brew/Brewfile）
    pub brewfile_path: PathBuf,
    /// 需要特殊处理（提权 + 强制标志 + 限时）的包名单
    pub special_packages: Vec<String>,
    /// 特殊包操作超时（秒）
    pub special_timeout_secs: u64,
    /// 启动时后台执行 brew update
    pub update_on_start: bool,
    /// 状态消息显示时长（秒）
    pub status_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brewfile_path: crate::brewfile::Brewfile::default_path(),
            special_packages: DEFAULT_SPECIAL_PACKAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            special_timeout_secs: DEFAULT_SPECIAL_TIMEOUT_SECS,
            update_on_start: true,
            status_ttl_secs: 3,
        }
    }
}

impl Config {
    fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/lian-brew/config.toml")
    }

    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
