// SSH 连接配置（连接描述）

use std::path::PathBuf;
use std::time::Duration;

use super::host_key::HostKeyPolicy;
use crate::constants::DIAL_TIMEOUT_SECS;
use crate::models::{HostKeyMode, ServerConf};
use crate::services::known_hosts::default_known_hosts_file;
use crate::error::{Result, SyncError};

/// SSH 连接配置
/// 构建后不可变，只用于创建一次会话
#[derive(Clone, Debug)]
pub struct SshConfig {
    /// 目标主机
    pub host: String,
    /// 端口
    pub port: u16,
    /// 用户名
    pub username: String,
    /// 私钥文件路径
    pub key_path: PathBuf,
    /// 私钥密码（如果有）
    pub passphrase: Option<String>,
    /// 连接超时（秒）
    pub connect_timeout: u64,
    /// 主机密钥校验策略
    pub host_key_policy: HostKeyPolicy,
    /// 心跳配置
    pub keepalive: KeepaliveConfig,
}

/// 心跳配置
#[derive(Clone, Debug)]
pub struct KeepaliveConfig {
    /// 是否启用心跳
    pub enabled: bool,
    /// 心跳间隔（秒）
    pub interval: u64,
    /// 最大重试次数
    pub max_retries: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 60,
            max_retries: 3,
        }
    }
}

impl SshConfig {
    /// 从配置文件的 server 段构建
    pub fn from_server_conf(conf: &ServerConf) -> Result<Self> {
        let host_key_policy = match conf.host_key.policy {
            HostKeyMode::Insecure => HostKeyPolicy::Insecure,
            HostKeyMode::Pinned => {
                let fingerprint = conf.host_key.fingerprint.clone().ok_or_else(|| {
                    SyncError::Config("pinned host key policy needs a fingerprint".to_string())
                })?;
                HostKeyPolicy::Pinned { fingerprint }
            }
            HostKeyMode::Tofu => {
                let store = match &conf.host_key.known_hosts_file {
                    Some(path) => path.clone(),
                    None => default_known_hosts_file()
                        .map_err(|e| SyncError::Config(format!("{:#}", e)))?,
                };
                HostKeyPolicy::Tofu { store }
            }
        };

        Ok(Self {
            host: conf.host.clone(),
            port: conf.port,
            username: conf.user.clone(),
            key_path: conf.rsa_file.clone(),
            passphrase: conf.passphrase.clone(),
            connect_timeout: if conf.timeout_secs == 0 {
                DIAL_TIMEOUT_SECS
            } else {
                conf.timeout_secs
            },
            host_key_policy,
            keepalive: KeepaliveConfig::default(),
        })
    }

    /// host:port
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// 构建 russh 配置
    /// 连接超时只作用于拨号和握手，会话本身不设置不活动超时
    pub fn to_russh_config(&self) -> russh::client::Config {
        let mut config = russh::client::Config::default();
        config.inactivity_timeout = None;
        if self.keepalive.enabled {
            config.keepalive_interval = Some(Duration::from_secs(self.keepalive.interval));
            config.keepalive_max = self.keepalive.max_retries as usize;
        }
        config
    }
}
