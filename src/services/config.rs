// 配置加载服务
// 启动时读取一次，生成显式的配置值向下传递

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::{CONFIG_CANDIDATES, CONFIG_ENV};
use crate::error::{Result, SyncError};
use crate::models::{AppConfig, HostKeyMode};

/// 查找配置文件
/// 环境变量优先，其次按候选路径顺序，第一个存在的生效
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        return Err(SyncError::Config(format!(
            "config file {:?} (from {}) does not exist",
            path, CONFIG_ENV
        )));
    }

    CONFIG_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            SyncError::Config(format!(
                "config file not exist, tried {}",
                CONFIG_CANDIDATES.join(", ")
            ))
        })
}

/// 加载配置
pub fn load_config() -> Result<AppConfig> {
    let path = find_config_file()?;
    load_config_from(&path)
}

/// 从指定路径加载配置
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    info!("[Config] Loading config from {:?}", path);
    let content = fs::read_to_string(path)
        .map_err(|e| SyncError::Config(format!("failed to read {:?}: {}", path, e)))?;
    parse_config(&content)
}

/// 解析并校验配置内容
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = serde_yaml::from_str(content)
        .map_err(|e| SyncError::Config(format!("failed to parse config: {}", e)))?;
    validate(&config)?;
    debug!(
        "[Config] Target {}@{}:{}",
        config.server.user, config.server.host, config.server.port
    );
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.server.host.trim().is_empty() {
        return Err(SyncError::Config("server.host is empty".to_string()));
    }
    if config.server.user.trim().is_empty() {
        return Err(SyncError::Config("server.user is empty".to_string()));
    }
    match (&config.upload, &config.download) {
        (Some(_), Some(_)) => {
            return Err(SyncError::Config(
                "only one of upload / download can be configured".to_string(),
            ))
        }
        (None, None) => {
            return Err(SyncError::Config(
                "neither upload nor download is configured".to_string(),
            ))
        }
        _ => {}
    }
    if config.server.host_key.policy == HostKeyMode::Pinned
        && config.server.host_key.fingerprint.is_none()
    {
        return Err(SyncError::Config(
            "server.hostKey.fingerprint is required for pinned policy".to_string(),
        ));
    }
    if config.transfer.chunk_size == 0 || config.transfer.buffer_size == 0 {
        return Err(SyncError::Config(
            "transfer.chunkSize and transfer.bufferSize must be positive".to_string(),
        ));
    }
    if config.transfer.max_in_flight == 0 {
        return Err(SyncError::Config(
            "transfer.maxInFlight must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BUFFER_SIZE, CHUNK_SIZE, DIAL_TIMEOUT_SECS, MAX_IN_FLIGHT};
    use crate::error::ErrorKind;

    const MINIMAL: &str = r#"
server:
  host: 10.0.0.1
  port: 2222
  user: root
  rsaFile: /home/me/.ssh/id_rsa
upload:
  srcFile: /data/backup.tar.gz
  dstDir: /root/backup
"#;

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 2222);
        assert_eq!(config.server.timeout_secs, DIAL_TIMEOUT_SECS);
        assert_eq!(config.server.host_key.policy, HostKeyMode::Tofu);
        assert_eq!(
            config.server.rsa_file,
            PathBuf::from("/home/me/.ssh/id_rsa")
        );

        let upload = config.upload.unwrap();
        assert_eq!(upload.dst_dir, "/root/backup");
        assert!(config.download.is_none());

        assert_eq!(config.transfer.chunk_size, CHUNK_SIZE);
        assert_eq!(config.transfer.buffer_size, BUFFER_SIZE);
        assert_eq!(config.transfer.max_in_flight, MAX_IN_FLIGHT);
        assert!(config.transfer.atomic);
        assert!(config.transfer.verify);
        assert!(config.transfer.io_timeout_secs.is_none());
    }

    #[test]
    fn test_parse_full() {
        let content = r#"
server:
  host: example.com
  user: deploy
  rsaFile: key.pem
  timeoutSecs: 5
  hostKey:
    policy: pinned
    fingerprint: "SHA256:abcdef"
download:
  srcFile: /var/log/app.log
  dstDir: ./logs
transfer:
  chunkSize: 1048576
  maxInFlight: 16
  ioTimeoutSecs: 30
  atomic: false
"#;
        let config = parse_config(content).unwrap();
        assert_eq!(config.server.port, 22);
        assert_eq!(config.server.timeout_secs, 5);
        assert_eq!(config.server.host_key.policy, HostKeyMode::Pinned);
        assert_eq!(
            config.server.host_key.fingerprint.as_deref(),
            Some("SHA256:abcdef")
        );
        assert!(config.upload.is_none());
        assert_eq!(config.download.unwrap().src_file, "/var/log/app.log");
        assert_eq!(config.transfer.chunk_size, 1048576);
        assert_eq!(config.transfer.buffer_size, BUFFER_SIZE);
        assert_eq!(config.transfer.max_in_flight, 16);
        assert_eq!(config.transfer.io_timeout_secs, Some(30));
        assert!(!config.transfer.atomic);
    }

    #[test]
    fn test_rejects_both_directions() {
        let content = format!("{}download:\n  srcFile: /a\n  dstDir: /b\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_rejects_pinned_without_fingerprint() {
        let content = MINIMAL.replace(
            "  rsaFile: /home/me/.ssh/id_rsa\n",
            "  rsaFile: /home/me/.ssh/id_rsa\n  hostKey:\n    policy: pinned\n",
        );
        assert!(matches!(
            parse_config(&content),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_config("server: [not, a, map]"),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = load_config_from(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.server.user, "root");
    }
}
