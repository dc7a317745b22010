// SSH 连接模块
//
// 模块结构:
// - config: 连接描述 (SshConfig)
// - host_key: 主机密钥校验策略 (HostKeyPolicy)
// - handler: russh Handler 实现
// - client: 拨号与认证
// - session: SSH 会话 (SshSession, 命令执行, SFTP 子系统)

pub mod client;
pub mod config;
pub mod handler;
pub mod host_key;
pub mod session;

// 公开导出
pub use client::SshClient;
pub use config::{KeepaliveConfig, SshConfig};
pub use host_key::HostKeyPolicy;
pub use session::{shell_quote, SshSession};
