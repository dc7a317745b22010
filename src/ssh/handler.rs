// SSH 客户端 Handler 实现
// 实现 russh::client::Handler trait

use std::future::Future;
use std::sync::{Arc, Mutex};

use russh::keys::PublicKey;
use tracing::{debug, info};

use super::host_key::HostKeyPolicy;
use crate::error::SyncError;

/// 主机密钥校验失败原因（供 client 取回，russh 本身只返回 UnknownKey）
pub type HostKeyRejection = Arc<Mutex<Option<SyncError>>>;

/// SSH 客户端 Handler
/// 处理 SSH 连接过程中的各种回调
pub struct SshClientHandler {
    /// 服务器地址（host:port，用于 known hosts）
    address: String,
    /// 主机密钥校验策略
    policy: HostKeyPolicy,
    /// 校验失败原因
    rejection: HostKeyRejection,
}

impl SshClientHandler {
    /// 创建新的 Handler
    pub fn new(address: String, policy: HostKeyPolicy, rejection: HostKeyRejection) -> Self {
        Self {
            address,
            policy,
            rejection,
        }
    }
}

impl russh::client::Handler for SshClientHandler {
    type Error = russh::Error;

    /// 检查服务器公钥
    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        // 获取密钥指纹
        let fingerprint = server_public_key
            .fingerprint(russh::keys::ssh_key::HashAlg::Sha256)
            .to_string();
        let key_type = server_public_key.algorithm().to_string();

        info!("[SSH] Server key fingerprint: {}", fingerprint);
        debug!("[SSH] Server key type: {}", key_type);

        let policy = self.policy.clone();
        let address = self.address.clone();
        let rejection = self.rejection.clone();

        async move {
            let accepted = match verify_blocking(policy, address, key_type, fingerprint).await {
                Ok(()) => true,
                Err(e) => {
                    if let Ok(mut slot) = rejection.lock() {
                        *slot = Some(e);
                    }
                    false
                }
            };
            Ok(accepted)
        }
    }
}

/// 在阻塞线程池中执行主机密钥校验（TOFU 需要读写 known hosts 文件）
async fn verify_blocking(
    policy: HostKeyPolicy,
    address: String,
    key_type: String,
    fingerprint: String,
) -> Result<(), SyncError> {
    tokio::task::spawn_blocking(move || policy.verify(&address, &key_type, &fingerprint))
        .await
        .map_err(|e| SyncError::HostKey(format!("host key check aborted: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_blocking_tofu() {
        let dir = tempfile::tempdir().unwrap();
        let policy = HostKeyPolicy::Tofu {
            store: dir.path().join("known_hosts.json"),
        };

        verify_blocking(
            policy.clone(),
            "h:22".to_string(),
            "ssh-ed25519".to_string(),
            "SHA256:first".to_string(),
        )
        .await
        .unwrap();

        let err = verify_blocking(
            policy,
            "h:22".to_string(),
            "ssh-ed25519".to_string(),
            "SHA256:second".to_string(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SyncError::HostKey(_)));
    }
}
