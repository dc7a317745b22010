// 数据模型模块

pub mod config;
pub mod known_hosts;
pub mod transfer;

pub use config::{
    AppConfig, DownloadConf, HostKeyConf, HostKeyMode, ServerConf, TransferConf, UploadConf,
};
pub use known_hosts::{HostMatch, KnownHost, KnownHostsConfig};
pub use transfer::{Direction, ProgressUpdate, TransferDescriptor, TransferReport, TransferState};
