// Known Hosts 数据模型
// 用于存储和验证 SSH 服务器公钥指纹（首次信任）

use chrono::Local;
use serde::{Deserialize, Serialize};

/// 已知主机条目
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnownHost {
    /// 主机地址（host:port 格式）
    pub host: String,
    /// 密钥类型（ssh-ed25519, ssh-rsa 等）
    pub key_type: String,
    /// SHA256 指纹
    pub fingerprint: String,
    /// 首次连接时间
    pub first_seen: String,
    /// 最后使用时间
    pub last_used: String,
}

/// 主机密钥比对结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostMatch {
    /// 指纹一致
    Trusted,
    /// 从未见过该主机
    Unknown,
    /// 指纹不一致，附带已记录的指纹
    Mismatch { expected: String },
}

/// Known Hosts 配置
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KnownHostsConfig {
    pub hosts: Vec<KnownHost>,
}

impl KnownHostsConfig {
    /// 比对主机指纹
    pub fn check(&self, host: &str, fingerprint: &str) -> HostMatch {
        match self.hosts.iter().find(|h| h.host == host) {
            Some(known) if known.fingerprint == fingerprint => HostMatch::Trusted,
            Some(known) => HostMatch::Mismatch {
                expected: known.fingerprint.clone(),
            },
            None => HostMatch::Unknown,
        }
    }

    /// 记录新主机（已存在时只更新最后使用时间）
    pub fn record(&mut self, host: &str, key_type: &str, fingerprint: &str) {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        if let Some(known) = self
            .hosts
            .iter_mut()
            .find(|h| h.host == host && h.fingerprint == fingerprint)
        {
            known.last_used = now;
            return;
        }
        self.hosts.push(KnownHost {
            host: host.to_string(),
            key_type: key_type.to_string(),
            fingerprint: fingerprint.to_string(),
            first_seen: now.clone(),
            last_used: now,
        });
    }
}
