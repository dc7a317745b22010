// 主机密钥校验策略

use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::models::HostMatch;
use crate::services::known_hosts::{load_known_hosts, save_known_hosts};

/// 主机密钥校验策略
#[derive(Clone, Debug)]
pub enum HostKeyPolicy {
    /// 首次连接记录指纹，之后必须一致
    Tofu {
        /// known hosts 文件
        store: PathBuf,
    },
    /// 固定指纹（SHA256:...）
    Pinned { fingerprint: String },
    /// 接受任何主机密钥，只能在测试环境显式开启
    Insecure,
}

impl HostKeyPolicy {
    /// 校验服务器公钥指纹
    ///
    /// * `host` - host:port
    /// * `key_type` - 密钥算法名
    /// * `fingerprint` - SHA256 指纹
    pub fn verify(&self, host: &str, key_type: &str, fingerprint: &str) -> Result<()> {
        match self {
            HostKeyPolicy::Insecure => {
                warn!(
                    "[SSH] Host key verification disabled, accepting {} key {} for {}",
                    key_type, fingerprint, host
                );
                Ok(())
            }
            HostKeyPolicy::Pinned {
                fingerprint: expected,
            } => {
                if normalize(expected) == normalize(fingerprint) {
                    Ok(())
                } else {
                    Err(SyncError::HostKey(format!(
                        "{} presented {}, expected pinned {}",
                        host, fingerprint, expected
                    )))
                }
            }
            HostKeyPolicy::Tofu { store } => {
                let mut known = load_known_hosts(store)
                    .map_err(|e| SyncError::HostKey(format!("{:#}", e)))?;
                match known.check(host, fingerprint) {
                    HostMatch::Trusted => {}
                    HostMatch::Unknown => {
                        info!(
                            "[SSH] First connection to {}, trusting {} key {}",
                            host, key_type, fingerprint
                        );
                    }
                    HostMatch::Mismatch { expected } => {
                        return Err(SyncError::HostKey(format!(
                            "{} presented {}, but {:?} recorded {}",
                            host, fingerprint, store, expected
                        )));
                    }
                }
                known.record(host, key_type, fingerprint);
                save_known_hosts(store, &known)
                    .map_err(|e| SyncError::HostKey(format!("{:#}", e)))?;
                Ok(())
            }
        }
    }
}

/// 指纹比较时忽略 "SHA256:" 前缀
fn normalize(fingerprint: &str) -> &str {
    fingerprint.trim().trim_start_matches("SHA256:")
}
