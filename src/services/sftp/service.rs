// SFTP 服务 - 封装 russh-sftp 客户端

use std::io;

use russh_sftp::client::fs::File;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tracing::{debug, info, warn};

use super::remote_file::{RemoteFileReader, RemoteFileWriter};
use crate::constants::{MAX_IN_FLIGHT, SFTP_BLOCK_SIZE};
use crate::error::{sftp_to_io, Result, SyncError};
use crate::ssh::session::SshSession;

/// 子通道参数
#[derive(Clone, Debug)]
pub struct SubchannelOptions {
    /// 每个文件同时在途的请求数
    pub max_in_flight: usize,
    /// 单个请求的数据长度
    pub block_size: usize,
}

impl Default for SubchannelOptions {
    fn default() -> Self {
        Self {
            max_in_flight: MAX_IN_FLIGHT,
            block_size: SFTP_BLOCK_SIZE,
        }
    }
}

impl SubchannelOptions {
    /// 传输 size 字节需要的句柄数，至少 1 个，不超过 max_in_flight
    pub fn lanes_for(&self, size: u64) -> usize {
        let block_size = self.block_size.max(1) as u64;
        let blocks = size.div_ceil(block_size).max(1);
        blocks.min(self.max_in_flight.max(1) as u64) as usize
    }
}

/// SFTP 子通道所依附的会话
pub trait ParentSession: Sync {
    /// 会话是否仍然可用
    fn is_alive(&self) -> bool;
}

impl ParentSession for SshSession {
    fn is_alive(&self) -> bool {
        SshSession::is_alive(self)
    }
}

/// SFTP 服务
/// 借用派生它的会话，生命周期不能超过会话
pub struct SftpService<'s> {
    /// 所属会话
    session: &'s dyn ParentSession,
    /// russh-sftp 客户端会话
    sftp: SftpSession,
    options: SubchannelOptions,
    closed: bool,
}

impl<'s> SftpService<'s> {
    /// 在已有会话上协商 SFTP 子系统
    pub async fn new(session: &'s SshSession, options: SubchannelOptions) -> Result<Self> {
        info!(
            "[SFTP] Creating SFTP service on {}@{}",
            session.username(),
            session.host()
        );

        let stream = session.open_sftp_stream().await?;

        // 使用 russh-sftp 包装通道
        let sftp = SftpSession::new(stream)
            .await
            .map_err(|e| SyncError::Subchannel(format!("Failed to create SFTP session: {}", e)))?;

        info!(
            "[SFTP] SFTP service created, up to {} requests in flight per file",
            options.max_in_flight
        );

        Ok(Self::with_session(session, sftp, options))
    }

    /// 使用已协商好的 SFTP 会话
    pub fn with_session(
        session: &'s dyn ParentSession,
        sftp: SftpSession,
        options: SubchannelOptions,
    ) -> Self {
        Self {
            session,
            sftp,
            options,
            closed: false,
        }
    }

    /// 会话关闭后子通道不可再用
    fn ensure_usable(&self) -> Result<()> {
        if self.closed {
            return Err(SyncError::Disconnected(
                "SFTP subchannel is closed".to_string(),
            ));
        }
        if !self.session.is_alive() {
            return Err(SyncError::Disconnected(
                "SSH session behind the SFTP subchannel is closed".to_string(),
            ));
        }
        Ok(())
    }

    /// 打开远程文件用于读取
    /// 句柄数按文件大小计算，小文件只占一个
    pub async fn open_for_read(&self, path: &str) -> Result<RemoteFileReader> {
        self.ensure_usable()?;

        let size = self.stat(path).await?;
        let lane_count = self.options.lanes_for(size);
        debug!("[SFTP] Opening {} for read with {} handles", path, lane_count);

        let mut lanes = Vec::with_capacity(lane_count);
        for _ in 0..lane_count {
            match self.sftp.open(path).await {
                Ok(file) => lanes.push(file),
                Err(e) => {
                    release(lanes).await;
                    return Err(SyncError::io(
                        format!("Failed to open {}", path),
                        sftp_to_io(e),
                    ));
                }
            }
        }

        Ok(RemoteFileReader::new(lanes, size, self.options.block_size))
    }

    /// 创建（或截断）远程文件用于写入，不创建父目录
    /// 后续句柄打开失败时，已创建的文件会被删除
    pub async fn create_for_write(&self, path: &str, expected_size: u64) -> Result<RemoteFileWriter> {
        self.ensure_usable()?;

        let lane_count = self.options.lanes_for(expected_size);
        debug!("[SFTP] Creating {} for write with {} handles", path, lane_count);

        let first = self
            .sftp
            .create(path)
            .await
            .map_err(|e| SyncError::io(format!("Failed to create {}", path), sftp_to_io(e)))?;

        let mut lanes = vec![first];
        for _ in 1..lane_count {
            match self.sftp.open_with_flags(path, OpenFlags::WRITE).await {
                Ok(file) => lanes.push(file),
                Err(e) => {
                    release(lanes).await;
                    if let Err(remove_err) = self.sftp.remove_file(path).await {
                        warn!(
                            "[SFTP] Failed to remove {} after open failure: {}",
                            path, remove_err
                        );
                    }
                    return Err(SyncError::io(
                        format!("Failed to open {} for write", path),
                        sftp_to_io(e),
                    ));
                }
            }
        }

        Ok(RemoteFileWriter::new(lanes, self.options.block_size))
    }

    /// 获取文件大小
    pub async fn stat(&self, path: &str) -> Result<u64> {
        self.ensure_usable()?;
        debug!("[SFTP] Getting stat for: {}", path);

        let attrs = self
            .sftp
            .metadata(path)
            .await
            .map_err(|e| SyncError::io(format!("Failed to stat {}", path), sftp_to_io(e)))?;

        if attrs.is_dir() {
            return Err(SyncError::io(
                format!("Failed to stat {}", path),
                io::Error::new(io::ErrorKind::Other, "is a directory"),
            ));
        }
        Ok(attrs.size.unwrap_or(0))
    }

    /// 重命名文件
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.ensure_usable()?;
        info!("[SFTP] Renaming {} -> {}", from, to);
        self.sftp.rename(from, to).await.map_err(|e| {
            SyncError::io(format!("Failed to rename {} to {}", from, to), sftp_to_io(e))
        })
    }

    /// 重命名，目标已存在且服务器拒绝覆盖时先删除目标
    pub async fn rename_replace(&self, from: &str, to: &str) -> Result<()> {
        match self.rename(from, to).await {
            Ok(()) => Ok(()),
            Err(first) => {
                // 源文件必须存在，否则删除目标后也无法完成
                if self.stat(from).await.is_err() || self.stat(to).await.is_err() {
                    return Err(first);
                }
                debug!("[SFTP] {} exists, replacing it", to);
                self.remove_file(to).await?;
                self.rename(from, to).await
            }
        }
    }

    /// 删除文件
    pub async fn remove_file(&self, path: &str) -> Result<()> {
        self.ensure_usable()?;
        info!("[SFTP] Removing file: {}", path);
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| SyncError::io(format!("Failed to remove {}", path), sftp_to_io(e)))
    }

    /// 关闭 SFTP 会话，重复调用无副作用
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("[SFTP] Closing SFTP service");
        self.sftp
            .close()
            .await
            .map_err(|e| SyncError::Subchannel(format!("Failed to close SFTP session: {}", e)))
    }
}

/// 打开失败时释放已经打开的句柄
async fn release(lanes: Vec<File>) {
    use tokio::io::AsyncWriteExt;

    for mut lane in lanes {
        if let Err(e) = lane.shutdown().await {
            warn!("[SFTP] Failed to release file handle: {}", e);
        }
    }
}

impl Drop for SftpService<'_> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("[SFTP] SFTP service dropped without close");
        }
    }
}
