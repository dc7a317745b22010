// SSH 客户端核心实现

use std::net::ToSocketAddrs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use russh::client::{AuthResult, Handle};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::config::SshConfig;
use super::handler::{HostKeyRejection, SshClientHandler};
use super::session::SshSession;
use crate::error::{Result, SyncError};

/// SSH 客户端
/// 负责拨号、认证并返回 SshSession，不做重试
pub struct SshClient {
    /// 连接配置
    config: SshConfig,
}

impl SshClient {
    /// 创建新的 SSH 客户端
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// 执行连接
    /// 先加载私钥，密钥有问题时不必发起网络连接
    pub async fn connect(self) -> Result<SshSession> {
        info!(
            "[SSH] Connecting to {}@{}:{}",
            self.config.username, self.config.host, self.config.port
        );

        let key = load_private_key(&self.config.key_path, self.config.passphrase.as_deref())
            .await?;

        let mut handle = self.dial().await?;

        info!("[SSH] Authenticating as '{}'...", self.config.username);
        self.authenticate(&mut handle, key).await?;
        info!("[SSH] Authentication successful");

        Ok(SshSession::new(
            handle,
            self.config.host.clone(),
            self.config.username.clone(),
        ))
    }

    /// 建立 TCP 连接并完成 SSH 握手，两步都受连接超时限制
    async fn dial(&self) -> Result<Handle<SshClientHandler>> {
        let addr = self.config.address();
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| SyncError::Dial(format!("Failed to resolve address {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| SyncError::Dial(format!("No valid address found for {}", addr)))?;

        debug!("[SSH] Resolved {} -> {}", addr, socket_addr);

        let connect_timeout = self.config.connect_timeout();
        let tcp_stream = timeout(connect_timeout, TcpStream::connect(socket_addr))
            .await
            .map_err(|_| SyncError::Timeout {
                operation: "TCP connect",
                secs: self.config.connect_timeout,
            })?
            .map_err(|e| SyncError::Dial(format!("Failed to connect to {}: {}", addr, e)))?;

        info!("[SSH] TCP connection established");

        let russh_config = Arc::new(self.config.to_russh_config());
        let rejection: HostKeyRejection = Arc::new(Mutex::new(None));
        let handler = SshClientHandler::new(
            addr.clone(),
            self.config.host_key_policy.clone(),
            rejection.clone(),
        );

        let result = timeout(
            connect_timeout,
            russh::client::connect_stream(russh_config, tcp_stream, handler),
        )
        .await
        .map_err(|_| SyncError::Timeout {
            operation: "SSH handshake",
            secs: self.config.connect_timeout,
        })?;

        match result {
            Ok(handle) => {
                info!("[SSH] SSH handshake completed");
                Ok(handle)
            }
            Err(e) => {
                // 主机密钥被策略拒绝时返回更具体的错误
                if let Some(reason) = rejection.lock().ok().and_then(|mut slot| slot.take()) {
                    return Err(reason);
                }
                Err(SyncError::Dial(format!("SSH handshake with {} failed: {}", addr, e)))
            }
        }
    }

    /// 公钥认证
    async fn authenticate(
        &self,
        handle: &mut Handle<SshClientHandler>,
        key: russh::keys::PrivateKey,
    ) -> Result<()> {
        // RSA 密钥使用服务器支持的最佳哈希算法（rsa-sha2-256/512）
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(|e| SyncError::Auth(e.to_string()))?
            .flatten();

        let key_with_alg = russh::keys::PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg);

        let auth_result = handle
            .authenticate_publickey(&self.config.username, key_with_alg)
            .await
            .map_err(|e| SyncError::Auth(e.to_string()))?;

        match auth_result {
            AuthResult::Success => Ok(()),
            AuthResult::Failure {
                remaining_methods,
                partial_success,
            } => {
                if partial_success {
                    return Err(SyncError::Auth(
                        "Partial authentication - additional auth required".to_string(),
                    ));
                }
                Err(SyncError::Auth(format!(
                    "Public key authentication failed. Server suggests: {:?}",
                    remaining_methods
                )))
            }
        }
    }
}

/// 加载私钥文件
/// 读取失败 -> KeyRead，解析失败 -> KeySign
pub async fn load_private_key(
    key_path: &Path,
    passphrase: Option<&str>,
) -> Result<russh::keys::PrivateKey> {
    debug!("[SSH] Loading private key from {:?}", key_path);

    let key_data = tokio::fs::read(key_path)
        .await
        .map_err(|source| SyncError::KeyRead {
            path: key_path.to_path_buf(),
            source,
        })?;

    let key = russh::keys::decode_secret_key(&String::from_utf8_lossy(&key_data), passphrase)
        .map_err(|e| SyncError::KeySign(format!("Failed to decode key {:?}: {}", key_path, e)))?;

    debug!("[SSH] Private key loaded successfully");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_key_read_error() {
        let err = load_private_key(Path::new("/no/such/key"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::KeyRead { .. }));
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_garbage_key_is_key_sign_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_rsa");
        std::fs::write(&path, "this is not a private key").unwrap();

        let err = load_private_key(&path, None).await.unwrap_err();
        assert!(matches!(err, SyncError::KeySign(_)));
    }
}
