// 传输引擎
// 按块在读取流和写入流之间复制数据，累计进度并在每个块后通知观察者

use std::future::Future;
use std::io;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::progress::ProgressObserver;
use super::stream::{read_full, write_full, ChunkReader, ChunkWriter};
use crate::constants::{BUFFER_SIZE, CHUNK_SIZE, MAX_IN_FLIGHT};
use crate::error::{Result, SyncError};
use crate::models::{TransferConf, TransferReport, TransferState};

/// 传输参数
#[derive(Clone, Debug)]
pub struct TransferOptions {
    /// 每次读写的块大小
    pub chunk_size: usize,
    /// 本地缓冲区大小
    pub buffer_size: usize,
    /// 每个文件同时在途的 SFTP 请求数
    pub max_in_flight: usize,
    /// 单次读写超时
    pub io_timeout: Option<Duration>,
    /// 先写临时文件再重命名
    pub atomic: bool,
    /// 上传后执行 ls 校验
    pub verify: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            buffer_size: BUFFER_SIZE,
            max_in_flight: MAX_IN_FLIGHT,
            io_timeout: None,
            atomic: true,
            verify: true,
        }
    }
}

impl From<&TransferConf> for TransferOptions {
    fn from(conf: &TransferConf) -> Self {
        Self {
            chunk_size: conf.chunk_size.max(1),
            buffer_size: conf.buffer_size.max(1),
            max_in_flight: conf.max_in_flight.max(1),
            io_timeout: conf.io_timeout_secs.map(Duration::from_secs),
            atomic: conf.atomic,
            verify: conf.verify,
        }
    }
}

/// 传输引擎
pub struct TransferEngine {
    chunk_size: usize,
    io_timeout: Option<Duration>,
}

impl TransferEngine {
    pub fn new(options: &TransferOptions) -> Self {
        Self {
            chunk_size: options.chunk_size.max(1),
            io_timeout: options.io_timeout,
        }
    }

    /// 复制 reader 的全部内容到 writer
    ///
    /// # Arguments
    /// * `total_bytes` - 源文件大小（传输开始前获取）
    /// * `observer` - 每个块写入后同步调用一次
    ///
    /// 无论成功失败，两个流都会被关闭
    pub async fn copy<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        total_bytes: u64,
        observer: &mut dyn ProgressObserver,
    ) -> Result<TransferReport>
    where
        R: ChunkReader + ?Sized,
        W: ChunkWriter + ?Sized,
    {
        let result = self.copy_chunks(reader, writer, total_bytes, observer).await;

        let reader_closed = self.guard("close source", reader.close()).await;
        let writer_closed = self.guard("close destination", writer.close()).await;

        match result {
            Ok(report) => {
                if let Err(e) = reader_closed {
                    warn!("[Transfer] {}", e);
                }
                // 写入流关闭时可能还有最后一次刷新
                writer_closed?;
                info!(
                    "[Transfer] Copied {} bytes in {} chunks",
                    report.bytes, report.chunks
                );
                Ok(report)
            }
            Err(e) => {
                for closed in [reader_closed, writer_closed] {
                    if let Err(close_err) = closed {
                        warn!("[Transfer] {} (after failure)", close_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn copy_chunks<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        total_bytes: u64,
        observer: &mut dyn ProgressObserver,
    ) -> Result<TransferReport>
    where
        R: ChunkReader + ?Sized,
        W: ChunkWriter + ?Sized,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let mut state = TransferState::start();

        loop {
            let n = self.guard("read source", read_full(reader, &mut buf)).await?;
            if n == 0 {
                break;
            }

            let written = self
                .guard("write destination", write_full(writer, &buf[..n]))
                .await?;
            state.record(written);

            let update = state.snapshot(total_bytes);
            debug!(
                "[Transfer] Chunk {}: {} bytes, {}/{}",
                state.chunks(),
                written,
                update.bytes_transferred,
                update.total_bytes
            );
            observer.on_progress(&update);
        }

        // 空文件没有块，单独报告一次
        if state.chunks() == 0 {
            observer.on_progress(&state.snapshot(total_bytes));
        }

        if state.bytes_transferred() != total_bytes {
            warn!(
                "[Transfer] Source size changed during transfer: expected {} bytes, copied {}",
                total_bytes,
                state.bytes_transferred()
            );
        }

        Ok(TransferReport {
            bytes: state.bytes_transferred(),
            chunks: state.chunks(),
            elapsed: state.elapsed(),
        })
    }

    /// 执行一次流操作，配置了超时则受其限制
    async fn guard<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        let result = match self.io_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no progress within {}s", limit.as_secs()),
                )),
            },
            None => fut.await,
        };
        result.map_err(|e| SyncError::io(format!("Failed to {}", operation), e))
    }
}
