// 传输模块
//
// - stream: 读写流 trait 及本地文件实现
// - engine: 分块复制循环
// - progress: 进度格式化与观察者
// - path: 目标路径拼接
// - runner: 单次同步的完整流程

pub mod engine;
pub mod path;
pub mod progress;
pub mod runner;
pub mod stream;

pub use engine::{TransferEngine, TransferOptions};
pub use progress::{format_duration, humanize, ConsoleReporter, ProgressObserver};
pub use runner::run;
