// SSH 会话管理
// 连接成功后的会话对象，提供命令执行和 SFTP 子通道

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use russh::client::{Handle, Msg};
use russh::{ChannelMsg, Disconnect};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::handler::SshClientHandler;
use crate::error::{Result, SyncError};

/// SSH 会话（连接成功后）
/// 由调用方独占，结束时必须 close
pub struct SshSession {
    /// russh Handle
    handle: Arc<Handle<SshClientHandler>>,
    /// 服务器主机名
    host: String,
    /// 用户名
    username: String,
    /// 连接状态
    is_connected: AtomicBool,
    /// 最近一次命令的输出（stdout + stderr）
    last_result: Mutex<Option<String>>,
}

impl SshSession {
    /// 创建新的会话
    pub fn new(handle: Handle<SshClientHandler>, host: String, username: String) -> Self {
        Self {
            handle: Arc::new(handle),
            host,
            username,
            is_connected: AtomicBool::new(true),
            last_result: Mutex::new(None),
        }
    }

    /// 获取主机名
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 获取用户名
    pub fn username(&self) -> &str {
        &self.username
    }

    /// 检查会话是否活跃
    pub fn is_alive(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed) && !self.handle.is_closed()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SyncError::Disconnected(
                "Session is disconnected".to_string(),
            ))
        }
    }

    /// 最近一次命令的输出
    pub fn last_result(&self) -> Option<String> {
        self.last_result.lock().ok().and_then(|r| r.clone())
    }

    /// 执行远程命令，返回合并后的输出
    /// 退出码非 0 视为失败
    pub async fn run_command(&self, command: &str) -> Result<String> {
        self.ensure_alive()?;
        debug!("[SSH] Running command: {}", command);

        let command_error = |message: String| SyncError::Command {
            command: command.to_string(),
            message,
        };

        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| command_error(format!("failed to open exec channel: {}", e)))?;

        let output = ExecChannel::new(channel)
            .exec(command)
            .await
            .map_err(|e| command_error(e.to_string()))?;

        let combined = output.combined_string();
        if let Ok(mut last) = self.last_result.lock() {
            *last = Some(combined.clone());
        }

        if let Some(failure) = output.failure() {
            return Err(command_error(format!("{}: {}", failure, combined.trim_end())));
        }
        Ok(combined)
    }

    /// 打开 SFTP 子系统通道，返回可供 russh-sftp 使用的流
    pub async fn open_sftp_stream(
        &self,
    ) -> Result<impl AsyncRead + AsyncWrite + Unpin + Send + 'static> {
        self.ensure_alive()?;

        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SyncError::Subchannel(format!("Failed to open channel: {}", e)))?;

        // 请求 SFTP 子系统
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| {
                SyncError::Subchannel(format!("Failed to request sftp subsystem: {}", e))
            })?;

        Ok(channel.into_stream())
    }

    /// 关闭会话，重复调用无副作用
    pub async fn close(&self) -> Result<()> {
        if !self.is_connected.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        info!("[SSH] Closing session to {}", self.host);
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            // 对端可能已经断开
            warn!("[SSH] Disconnect failed: {}", e);
        }
        Ok(())
    }
}

// 使用 russh::client::Msg 作为消息类型
type RusshChannel = russh::Channel<Msg>;

/// 执行通道（单条命令）
struct ExecChannel {
    channel: RusshChannel,
}

impl ExecChannel {
    fn new(channel: RusshChannel) -> Self {
        Self { channel }
    }

    /// 执行命令并获取输出
    async fn exec(mut self, command: &str) -> Result<CommandOutput> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| SyncError::Subchannel(e.to_string()))?;

        let mut output = CommandOutput::default();

        while let Some(channel_msg) = self.channel.wait().await {
            match channel_msg {
                ChannelMsg::Data { data } => output.push(&data),
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == 1 {
                        output.push(&data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    output.exit_code = Some(exit_status);
                }
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    output.exit_signal = Some(format!("{:?}", signal_name));
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        if let Err(e) = self.channel.close().await {
            warn!("[SSH] Failed to close exec channel: {}", e);
        }
        Ok(output)
    }
}

/// 命令输出
#[derive(Debug, Default)]
pub struct CommandOutput {
    /// 按到达顺序合并的 stdout + stderr
    pub combined: Vec<u8>,
    /// 退出码（通道关闭前未收到则为 None）
    pub exit_code: Option<u32>,
    /// 终止命令的信号
    pub exit_signal: Option<String>,
}

impl CommandOutput {
    fn push(&mut self, data: &[u8]) {
        self.combined.extend_from_slice(data);
    }

    /// 获取合并输出字符串
    pub fn combined_string(&self) -> String {
        String::from_utf8_lossy(&self.combined).to_string()
    }

    /// 失败原因，成功时为 None
    /// 被信号终止或没有退出码都视为失败
    pub fn failure(&self) -> Option<String> {
        if let Some(signal) = &self.exit_signal {
            return Some(format!("killed by signal {}", signal));
        }
        match self.exit_code {
            Some(0) => None,
            Some(code) => Some(format!("exit status {}", code)),
            None => Some("exited without status".to_string()),
        }
    }
}

/// 为 shell 命令参数加单引号
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}
