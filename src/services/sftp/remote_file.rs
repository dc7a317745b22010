// 远程文件流
// 每个块拆成若干 SFTP 请求，通过多个文件句柄（lane）并发发出，
// 对外仍然是顺序读写的流

use std::io::{self, SeekFrom};

use async_trait::async_trait;
use futures::future::try_join_all;
use russh_sftp::client::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::transfer::stream::{ChunkReader, ChunkWriter};

/// 将 [0, len) 按 block_size 拆分，第 i 个块交给 lane i % lanes
fn lane_blocks(
    lane: usize,
    lanes: usize,
    len: usize,
    block_size: usize,
) -> impl Iterator<Item = (usize, usize)> {
    (lane..)
        .step_by(lanes)
        .map(move |block| block * block_size)
        .take_while(move |start| *start < len)
        .map(move |start| (start, (start + block_size).min(len)))
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "remote file already closed")
}

/// 关闭所有 lane，返回第一个错误
async fn close_lanes(lanes: Vec<File>) -> io::Result<()> {
    let mut first_error = None;
    for mut lane in lanes {
        if let Err(e) = lane.shutdown().await {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// ======================== 写入 ========================

/// 远程文件写入流
pub struct RemoteFileWriter {
    /// 文件句柄（第一个由 create 打开并截断）
    lanes: Vec<File>,
    /// 下一次写入的偏移量
    offset: u64,
    /// 单个请求的数据长度
    block_size: usize,
    closed: bool,
}

impl RemoteFileWriter {
    pub(super) fn new(lanes: Vec<File>, block_size: usize) -> Self {
        Self {
            lanes,
            offset: 0,
            block_size: block_size.max(1),
            closed: false,
        }
    }
}

#[async_trait]
impl ChunkWriter for RemoteFileWriter {
    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        if data.is_empty() {
            return Ok(0);
        }

        let base = self.offset;
        let lanes = self.lanes.len();
        let block_size = self.block_size;

        let writes = self
            .lanes
            .iter_mut()
            .enumerate()
            .map(|(lane, file)| async move {
                for (start, end) in lane_blocks(lane, lanes, data.len(), block_size) {
                    file.seek(SeekFrom::Start(base + start as u64)).await?;
                    file.write_all(&data[start..end]).await?;
                }
                Ok::<(), io::Error>(())
            });
        try_join_all(writes).await?;

        self.offset += data.len() as u64;
        Ok(data.len())
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        close_lanes(std::mem::take(&mut self.lanes)).await
    }
}

// ======================== 读取 ========================

/// 远程文件读取流
/// 读取长度以打开时的文件大小为准
pub struct RemoteFileReader {
    lanes: Vec<File>,
    /// 下一次读取的偏移量
    offset: u64,
    /// 文件大小
    size: u64,
    block_size: usize,
    closed: bool,
}

impl RemoteFileReader {
    pub(super) fn new(lanes: Vec<File>, size: u64, block_size: usize) -> Self {
        Self {
            lanes,
            offset: 0,
            size,
            block_size: block_size.max(1),
            closed: false,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[async_trait]
impl ChunkReader for RemoteFileReader {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        let remaining = self.size.saturating_sub(self.offset);
        let len = (buf.len() as u64).min(remaining) as usize;
        if len == 0 {
            return Ok(0);
        }

        let base = self.offset;
        let lanes = self.lanes.len();
        let block_size = self.block_size;

        // 每个 lane 拿到互不重叠的若干块
        let mut slices: Vec<Vec<(u64, &mut [u8])>> = (0..lanes).map(|_| Vec::new()).collect();
        for (block, piece) in buf[..len].chunks_mut(block_size).enumerate() {
            let start = (block * block_size) as u64;
            slices[block % lanes].push((base + start, piece));
        }

        let reads = self
            .lanes
            .iter_mut()
            .zip(slices)
            .map(|(file, pieces)| async move {
                for (offset, piece) in pieces {
                    file.seek(SeekFrom::Start(offset)).await?;
                    file.read_exact(piece).await?;
                }
                Ok::<(), io::Error>(())
            });
        try_join_all(reads).await?;

        self.offset += len as u64;
        Ok(len)
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        close_lanes(std::mem::take(&mut self.lanes)).await
    }
}
