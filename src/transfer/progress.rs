// 进度显示
// 字节数、耗时格式化，以及进度观察者

use std::time::Duration;

use crate::models::ProgressUpdate;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

/// 格式化字节数（1024 进制）
/// 1 KiB 以下显示整数字节，以上保留两位小数
pub fn humanize(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// 格式化耗时为 HH:MM:SS
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// 进度百分比 (0.0 - 100.0)
/// 总大小为 0 时视为已完成
pub fn percentage(transferred: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    ((transferred as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

/// 进度观察者
/// 在复制循环中同步调用，每个块之后一次
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, update: &ProgressUpdate);
}

/// 控制台输出
/// total=<总大小>,current=<已传输>,progress=<百分比>%
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn format_line(update: &ProgressUpdate) -> String {
        format!(
            "total={},current={},progress={:.2}%",
            humanize(update.total_bytes),
            humanize(update.bytes_transferred),
            update.percentage
        )
    }
}

impl ProgressObserver for ConsoleReporter {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        println!("{}", Self::format_line(update));
    }
}

/// 记录所有进度更新
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ProgressLog {
    pub updates: Vec<ProgressUpdate>,
}

#[cfg(test)]
impl ProgressObserver for ProgressLog {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self.updates.push(*update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_boundaries() {
        assert_eq!(humanize(0), "0B");
        assert_eq!(humanize(1023), "1023B");
        assert_eq!(humanize(1024), "1.00KB");
        assert_eq!(humanize(1536), "1.50KB");
        assert_eq!(humanize(1024 * 1024 - 1), "1024.00KB");
        assert_eq!(humanize(1024 * 1024), "1.00MB");
        assert_eq!(humanize(10 * 1024 * 1024), "10.00MB");
        assert_eq!(humanize(1024 * 1024 * 1024), "1.00GB");
        assert_eq!(humanize(5 * 1024 * 1024 * 1024), "5.00GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "00:00:00");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "00:00:59");
        assert_eq!(format_duration(Duration::from_secs(61)), "00:01:01");
        assert_eq!(format_duration(Duration::from_secs(3600 + 120 + 3)), "01:02:03");
        assert_eq!(format_duration(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[test]
    fn test_percentage_bounds() {
        assert_eq!(percentage(0, 0), 100.0);
        assert_eq!(percentage(0, 10), 0.0);
        assert_eq!(percentage(5, 10), 50.0);
        assert_eq!(percentage(10, 10), 100.0);
        // 源文件在传输中变大时也不超过 100
        assert_eq!(percentage(20, 10), 100.0);
    }

    #[test]
    fn test_console_line() {
        let update = ProgressUpdate {
            total_bytes: 10 * 1024 * 1024,
            bytes_transferred: 8 * 1024 * 1024,
            percentage: 80.0,
        };
        assert_eq!(
            ConsoleReporter::format_line(&update),
            "total=10.00MB,current=8.00MB,progress=80.00%"
        );
    }
}
