// 单次同步流程
// 连接 -> 派生 SFTP -> 传输 -> 校验 -> 释放，所有路径上都会关闭子通道和会话

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::engine::{TransferEngine, TransferOptions};
use super::path::{local_destination, remote_destination, temp_path};
use super::progress::{humanize, ProgressObserver};
use super::stream::{ChunkReader, LocalFileReader, LocalFileWriter};
use crate::error::{Result, SyncError};
use crate::models::{AppConfig, Direction, TransferDescriptor, TransferReport};
use crate::services::sftp::{SftpService, SubchannelOptions};
use crate::ssh::{shell_quote, SshClient, SshConfig, SshSession};

/// 待执行的传输任务（尚未获取文件大小）
#[derive(Debug, Clone, PartialEq)]
pub struct SyncJob {
    pub direction: Direction,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl SyncJob {
    /// 根据配置确定传输方向和路径
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match (&config.upload, &config.download) {
            (Some(upload), None) => Ok(Self {
                direction: Direction::Upload,
                source: upload.src_file.clone(),
                destination: PathBuf::from(remote_destination(&upload.dst_dir, &upload.src_file)),
            }),
            (None, Some(download)) => Ok(Self {
                direction: Direction::Download,
                source: PathBuf::from(&download.src_file),
                destination: local_destination(&download.dst_dir, &download.src_file),
            }),
            _ => Err(SyncError::Config(
                "exactly one of upload / download must be configured".to_string(),
            )),
        }
    }

    fn describe(&self, total_bytes: u64) -> TransferDescriptor {
        TransferDescriptor {
            direction: self.direction,
            source: self.source.clone(),
            destination: self.destination.clone(),
            total_bytes,
        }
    }
}

/// 执行一次完整的同步
pub async fn run(config: &AppConfig, observer: &mut dyn ProgressObserver) -> Result<TransferReport> {
    let job = SyncJob::from_config(config)?;
    let ssh_config = SshConfig::from_server_conf(&config.server)?;
    let options = TransferOptions::from(&config.transfer);

    let session = SshClient::new(ssh_config).connect().await?;
    let result = run_on_session(&session, &job, &options, observer).await;

    if let Err(e) = session.close().await {
        warn!("[SSH] Failed to close session: {}", e);
    }
    result
}

/// 在已建立的会话上执行传输
pub async fn run_on_session(
    session: &SshSession,
    job: &SyncJob,
    options: &TransferOptions,
    observer: &mut dyn ProgressObserver,
) -> Result<TransferReport> {
    let mut sftp = SftpService::new(session, subchannel_options(options)).await?;
    let result = transfer(&sftp, job, options, observer).await;

    if let Err(e) = sftp.close().await {
        warn!("[SFTP] {}", e);
    }
    let report = result?;

    if job.direction == Direction::Upload && options.verify {
        verify_remote(session, &job.destination.to_string_lossy()).await?;
    }
    Ok(report)
}

fn subchannel_options(options: &TransferOptions) -> SubchannelOptions {
    SubchannelOptions {
        max_in_flight: options.max_in_flight,
        ..SubchannelOptions::default()
    }
}

/// 在 SFTP 子通道上执行一次上传或下载
pub async fn transfer(
    sftp: &SftpService<'_>,
    job: &SyncJob,
    options: &TransferOptions,
    observer: &mut dyn ProgressObserver,
) -> Result<TransferReport> {
    match job.direction {
        Direction::Upload => upload(sftp, job, options, observer).await,
        Direction::Download => download(sftp, job, options, observer).await,
    }
}

async fn upload(
    sftp: &SftpService<'_>,
    job: &SyncJob,
    options: &TransferOptions,
    observer: &mut dyn ProgressObserver,
) -> Result<TransferReport> {
    let total = tokio::fs::metadata(&job.source)
        .await
        .map_err(|e| SyncError::io(format!("Failed to stat {:?}", job.source), e))?
        .len();
    let descriptor = job.describe(total);
    let destination = descriptor.remote_path();

    info!(
        "[Transfer] Uploading {:?} -> {} ({})",
        descriptor.source,
        destination,
        humanize(total)
    );

    let mut reader = LocalFileReader::open(&descriptor.source, options.buffer_size)
        .await
        .map_err(|e| SyncError::io(format!("Failed to open {:?}", descriptor.source), e))?;

    let target = if options.atomic {
        temp_path(&destination)
    } else {
        destination.clone()
    };

    // 句柄打开失败时子通道已删除创建的文件
    let mut writer = match sftp.create_for_write(&target, total).await {
        Ok(writer) => writer,
        Err(e) => {
            close_quietly(&mut reader, &descriptor.source.to_string_lossy()).await;
            return Err(e);
        }
    };

    let engine = TransferEngine::new(options);
    let report = match engine
        .copy(&mut reader, &mut writer, descriptor.total_bytes, observer)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            if options.atomic {
                discard_remote(sftp, &target).await;
            }
            return Err(e);
        }
    };

    if options.atomic {
        if let Err(e) = sftp.rename_replace(&target, &destination).await {
            discard_remote(sftp, &target).await;
            return Err(e);
        }
    }

    Ok(report)
}

async fn download(
    sftp: &SftpService<'_>,
    job: &SyncJob,
    options: &TransferOptions,
    observer: &mut dyn ProgressObserver,
) -> Result<TransferReport> {
    let remote = job.source.to_string_lossy().to_string();
    let mut reader = sftp.open_for_read(&remote).await?;
    let descriptor = job.describe(reader.size());

    info!(
        "[Transfer] Downloading {} -> {:?} ({})",
        remote,
        descriptor.destination,
        humanize(descriptor.total_bytes)
    );

    let target = if options.atomic {
        PathBuf::from(temp_path(&descriptor.destination.to_string_lossy()))
    } else {
        descriptor.destination.clone()
    };

    let mut writer = match LocalFileWriter::create(&target, options.buffer_size).await {
        Ok(writer) => writer,
        Err(e) => {
            close_quietly(&mut reader, &remote).await;
            return Err(SyncError::io(format!("Failed to create {:?}", target), e));
        }
    };

    let engine = TransferEngine::new(options);
    let report = match engine
        .copy(&mut reader, &mut writer, descriptor.total_bytes, observer)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            if options.atomic {
                discard_local(&target).await;
            }
            return Err(e);
        }
    };

    if options.atomic {
        if let Err(e) = commit_local(&target, &descriptor.destination).await {
            discard_local(&target).await;
            return Err(e);
        }
    }

    if options.verify {
        verify_local_size(&descriptor.destination, report.bytes).await?;
    }

    Ok(report)
}

/// 上传后在远程执行 ls 确认目标文件存在
async fn verify_remote(session: &SshSession, destination: &str) -> Result<()> {
    session
        .run_command(&format!("ls {}", shell_quote(destination)))
        .await?;
    if let Some(listing) = session.last_result() {
        println!("{}", listing.trim_end());
    }
    Ok(())
}

/// 提前退出时关闭读取流，错误只记录
async fn close_quietly(reader: &mut dyn ChunkReader, name: &str) {
    if let Err(e) = reader.close().await {
        warn!("[Transfer] Failed to close {}: {}", name, e);
    }
}

/// 删除远程临时文件
async fn discard_remote(sftp: &SftpService<'_>, path: &str) {
    if let Err(e) = sftp.remove_file(path).await {
        if e.io_kind() != Some(io::ErrorKind::NotFound) {
            warn!("[Transfer] Failed to remove partial file {}: {}", path, e);
        }
    }
}

/// 删除本地临时文件
async fn discard_local(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("[Transfer] Failed to remove partial file {:?}: {}", path, e);
        }
    }
}

/// 将本地临时文件重命名为目标文件
async fn commit_local(temp: &Path, destination: &Path) -> Result<()> {
    if let Err(first) = tokio::fs::rename(temp, destination).await {
        // 部分平台不允许覆盖已有文件
        if tokio::fs::metadata(destination).await.is_err() {
            return Err(SyncError::io(format!("Failed to rename {:?}", temp), first));
        }
        tokio::fs::remove_file(destination)
            .await
            .map_err(|e| SyncError::io(format!("Failed to replace {:?}", destination), e))?;
        tokio::fs::rename(temp, destination)
            .await
            .map_err(|e| SyncError::io(format!("Failed to rename {:?}", temp), e))?;
    }
    Ok(())
}

/// 下载后核对本地文件大小
async fn verify_local_size(path: &Path, expected: u64) -> Result<()> {
    let actual = tokio::fs::metadata(path)
        .await
        .map_err(|e| SyncError::io(format!("Failed to stat {:?}", path), e))?
        .len();
    if actual != expected {
        return Err(SyncError::io(
            format!("Downloaded file {:?} has unexpected size", path),
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {} bytes, found {}", expected, actual),
            ),
        ));
    }
    info!("[Transfer] Verified {:?} ({} bytes)", path, actual);
    Ok(())
}
