// Known Hosts 持久化服务

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::APP_DIR_NAME;
use crate::models::KnownHostsConfig;

/// 获取默认 known hosts 文件路径
/// macOS: ~/Library/Application Support/shellsync/known_hosts.json
/// Linux: ~/.config/shellsync/known_hosts.json
/// Windows: C:\Users\<用户名>\AppData\Roaming\shellsync\known_hosts.json
pub fn default_known_hosts_file() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("无法获取系统配置目录")?
        .join(APP_DIR_NAME);
    Ok(config_dir.join("known_hosts.json"))
}

/// 加载 known hosts（文件不存在时返回空配置）
pub fn load_known_hosts(path: &Path) -> Result<KnownHostsConfig> {
    if !path.exists() {
        return Ok(KnownHostsConfig::default());
    }
    let content = fs::read_to_string(path).context("无法读取 known hosts 文件")?;
    let config: KnownHostsConfig =
        serde_json::from_str(&content).context("无法解析 known hosts 文件")?;
    Ok(config)
}

/// 保存 known hosts
pub fn save_known_hosts(path: &Path, config: &KnownHostsConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).context("无法创建配置目录")?;
        }
    }
    let content = serde_json::to_string_pretty(config).context("无法序列化 known hosts")?;
    fs::write(path, content).context("无法写入 known hosts 文件")?;
    Ok(())
}
