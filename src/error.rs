// 同步错误类型定义
// 每个组件操作都返回 SyncError，是否致命由顶层 runner 决定

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 错误分类
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// 配置文件缺失或不可读
    Config,
    /// 密钥读取/解析失败、认证被拒、主机密钥不匹配
    Auth,
    /// 连接失败或超时
    Dial,
    /// SFTP 子系统协商失败
    Subchannel,
    /// 本地或远程流读写失败
    Io,
    /// 远程命令执行失败
    Command,
}

/// 同步错误类型
#[derive(Debug, Error)]
pub enum SyncError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 私钥文件读取失败
    #[error("Failed to read key file {path:?}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 私钥无法解析或无法作为签名器使用
    #[error("Key error: {0}")]
    KeySign(String),

    /// 认证失败
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 主机密钥校验失败
    #[error("Host key verification failed: {0}")]
    HostKey(String),

    /// 连接失败（DNS、拒绝连接、握手失败）
    #[error("Dial error: {0}")]
    Dial(String),

    /// 操作超时
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    /// SFTP 子通道错误
    #[error("SFTP subchannel error: {0}")]
    Subchannel(String),

    /// 流读写错误
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// 远程命令错误
    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// 会话已断开
    #[error("Session disconnected: {0}")]
    Disconnected(String),
}

impl SyncError {
    /// 构造带上下文的 IO 错误
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SyncError::Io {
            context: context.into(),
            source,
        }
    }

    /// 错误所属分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Config(_) => ErrorKind::Config,
            SyncError::KeyRead { .. }
            | SyncError::KeySign(_)
            | SyncError::Auth(_)
            | SyncError::HostKey(_) => ErrorKind::Auth,
            SyncError::Dial(_) | SyncError::Timeout { .. } => ErrorKind::Dial,
            SyncError::Subchannel(_) | SyncError::Disconnected(_) => ErrorKind::Subchannel,
            SyncError::Io { .. } => ErrorKind::Io,
            SyncError::Command { .. } => ErrorKind::Command,
        }
    }

    /// 是否可能是临时性故障（网络抖动等），调用方可自行决定是否重试
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Dial(_) | SyncError::Timeout { .. })
    }

    /// 底层 IO 错误类型（如果有）
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            SyncError::Io { source, .. } => Some(source.kind()),
            SyncError::KeyRead { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// 将 SFTP 错误映射为 io::Error，保留 NotFound / PermissionDenied 语义
pub fn sftp_to_io(e: russh_sftp::client::error::Error) -> io::Error {
    use russh_sftp::client::error::Error as SftpError;
    use russh_sftp::protocol::StatusCode;

    match e {
        SftpError::Status(status) => {
            let kind = match status.status_code {
                StatusCode::NoSuchFile => io::ErrorKind::NotFound,
                StatusCode::PermissionDenied => io::ErrorKind::PermissionDenied,
                StatusCode::Eof => io::ErrorKind::UnexpectedEof,
                _ => io::ErrorKind::Other,
            };
            io::Error::new(kind, status.error_message)
        }
        SftpError::Timeout => io::Error::new(io::ErrorKind::TimedOut, "SFTP request timed out"),
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(SyncError::Config("x".into()).kind(), ErrorKind::Config);
        assert_eq!(SyncError::KeySign("x".into()).kind(), ErrorKind::Auth);
        assert_eq!(SyncError::HostKey("x".into()).kind(), ErrorKind::Auth);
        assert_eq!(
            SyncError::Timeout {
                operation: "dial",
                secs: 1
            }
            .kind(),
            ErrorKind::Dial
        );
        assert_eq!(
            SyncError::io("write", io::Error::new(io::ErrorKind::Other, "boom")).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            SyncError::Command {
                command: "ls".into(),
                message: "exit 2".into()
            }
            .kind(),
            ErrorKind::Command
        );
    }

    #[test]
    fn test_transient() {
        assert!(SyncError::Dial("refused".into()).is_transient());
        assert!(!SyncError::Config("missing".into()).is_transient());
        assert!(!SyncError::KeySign("bad".into()).is_transient());
    }

    #[test]
    fn test_io_kind() {
        let err = SyncError::io("open", io::Error::new(io::ErrorKind::NotFound, "nope"));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
        assert_eq!(SyncError::Auth("x".into()).io_kind(), None);
    }
}
