// 传输流抽象
// 本地文件和远程 SFTP 文件都实现同一组 trait，复制循环只看到顺序流

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

/// 可读流
#[async_trait]
pub trait ChunkReader: Send {
    /// 读取最多 buf.len() 字节，返回 0 表示正常结束
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// 关闭流，重复调用无副作用
    async fn close(&mut self) -> io::Result<()>;
}

/// 可写流
#[async_trait]
pub trait ChunkWriter: Send {
    /// 写入数据，可能只写入一部分
    async fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// 刷新并关闭流，重复调用无副作用
    async fn close(&mut self) -> io::Result<()>;
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stream already closed")
}

/// 读满 buf，只有遇到流结束时才会返回不足 buf.len() 的长度
pub async fn read_full<R: ChunkReader + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// 完整写入 data
/// 短写时继续写剩余部分，写入 0 字节视为停滞并报错
pub async fn write_full<W: ChunkWriter + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]).await {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("write stalled after {} of {} bytes", written, data.len()),
                ))
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

// ======================== 本地文件 ========================

/// 本地文件读取流（带缓冲）
pub struct LocalFileReader {
    inner: Option<BufReader<File>>,
}

impl LocalFileReader {
    /// 打开本地文件
    pub async fn open(path: &Path, buffer_size: usize) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            inner: Some(BufReader::with_capacity(buffer_size, file)),
        })
    }
}

#[async_trait]
impl ChunkReader for LocalFileReader {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(reader) => reader.read(buf).await,
            None => Err(closed_error()),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.inner.take();
        Ok(())
    }
}

/// 本地文件写入流（带缓冲）
pub struct LocalFileWriter {
    inner: Option<BufWriter<File>>,
}

impl LocalFileWriter {
    /// 创建（或截断）本地文件，不创建父目录
    pub async fn create(path: &Path, buffer_size: usize) -> io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            inner: Some(BufWriter::with_capacity(buffer_size, file)),
        })
    }
}

#[async_trait]
impl ChunkWriter for LocalFileWriter {
    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(writer) => writer.write(data).await,
            None => Err(closed_error()),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(mut writer) = self.inner.take() {
            writer.flush().await?;
            writer.get_mut().sync_all().await?;
        }
        Ok(())
    }
}
