// 传输相关类型
// 定义传输方向、传输描述、传输状态和进度更新

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::transfer::progress::percentage;

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 本地 -> 远程
    Upload,
    /// 远程 -> 本地
    Download,
}

/// 传输描述，传输期间只读
#[derive(Debug, Clone)]
pub struct TransferDescriptor {
    pub direction: Direction,
    /// 源路径（上传时为本地路径）
    pub source: PathBuf,
    /// 目标路径（上传时为远程路径）
    pub destination: PathBuf,
    /// 总字节数（传输开始前从源文件元数据获取）
    pub total_bytes: u64,
}

impl TransferDescriptor {
    /// 远程一侧的路径（SFTP 路径统一使用 '/' 分隔）
    pub fn remote_path(&self) -> String {
        let path = match self.direction {
            Direction::Upload => &self.destination,
            Direction::Download => &self.source,
        };
        path.to_string_lossy().to_string()
    }
}

/// 传输状态
/// 仅由复制循环修改
#[derive(Debug, Clone)]
pub struct TransferState {
    /// 已传输字节数（单调递增）
    bytes_transferred: u64,
    /// 已完成的块数
    chunks: u64,
    /// 开始时间
    started_at: Instant,
}

impl TransferState {
    /// 开始传输
    pub fn start() -> Self {
        Self {
            bytes_transferred: 0,
            chunks: 0,
            started_at: Instant::now(),
        }
    }

    /// 记录一个已写入的块
    pub fn record(&mut self, written: usize) {
        self.bytes_transferred += written as u64;
        self.chunks += 1;
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 生成当前的进度快照
    pub fn snapshot(&self, total_bytes: u64) -> ProgressUpdate {
        ProgressUpdate {
            total_bytes,
            bytes_transferred: self.bytes_transferred,
            percentage: percentage(self.bytes_transferred, total_bytes),
        }
    }
}

/// 进度更新（每个块之后发出一次）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// 总字节数
    pub total_bytes: u64,
    /// 已传输字节数
    pub bytes_transferred: u64,
    /// 进度百分比 (0.0 - 100.0)
    pub percentage: f64,
}

/// 传输结果
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// 写入目标的字节数
    pub bytes: u64,
    /// 块数
    pub chunks: u64,
    /// 耗时
    pub elapsed: Duration,
}

impl TransferReport {
    /// 平均速度 (bytes/s)
    pub fn speed_bytes_per_sec(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.bytes as f64 / secs) as u64
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_monotonic() {
        let mut state = TransferState::start();
        state.record(10);
        let first = state.snapshot(30);
        state.record(20);
        let second = state.snapshot(30);
        assert!(second.bytes_transferred >= first.bytes_transferred);
        assert_eq!(second.bytes_transferred, 30);
        assert_eq!(state.chunks(), 2);
        assert_eq!(second.percentage, 100.0);
    }

    #[test]
    fn test_remote_path_by_direction() {
        let upload = TransferDescriptor {
            direction: Direction::Upload,
            source: PathBuf::from("/local/a/file.txt"),
            destination: PathBuf::from("/remote/dir/file.txt"),
            total_bytes: 0,
        };
        assert_eq!(upload.remote_path(), "/remote/dir/file.txt");

        let download = TransferDescriptor {
            direction: Direction::Download,
            source: PathBuf::from("/remote/dir/file.txt"),
            destination: PathBuf::from("/local/file.txt"),
            total_bytes: 0,
        };
        assert_eq!(download.remote_path(), "/remote/dir/file.txt");
    }

    #[test]
    fn test_report_speed() {
        let report = TransferReport {
            bytes: 2048,
            chunks: 1,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(report.speed_bytes_per_sec(), 1024);

        let instant = TransferReport {
            bytes: 2048,
            chunks: 1,
            elapsed: Duration::ZERO,
        };
        assert_eq!(instant.speed_bytes_per_sec(), 0);
    }
}
