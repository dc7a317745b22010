// 配置文件数据结构（YAML）

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{BUFFER_SIZE, CHUNK_SIZE, DIAL_TIMEOUT_SECS, MAX_IN_FLIGHT};

// ======================== 主配置结构 ========================

/// 应用配置
/// 启动时加载一次，之后以参数形式向下传递
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub server: ServerConf,
    #[serde(default)]
    pub upload: Option<UploadConf>,
    #[serde(default)]
    pub download: Option<DownloadConf>,
    #[serde(default)]
    pub transfer: TransferConf,
}

// ======================== 服务器 ========================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConf {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    /// 私钥文件路径
    pub rsa_file: PathBuf,
    /// 私钥密码（如果有）
    #[serde(default)]
    pub passphrase: Option<String>,
    /// 连接超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub host_key: HostKeyConf,
}

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    DIAL_TIMEOUT_SECS
}

/// 主机密钥校验策略
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HostKeyMode {
    /// 首次连接时记录，之后必须一致
    #[default]
    Tofu,
    /// 固定指纹
    Pinned,
    /// 不校验（仅用于测试环境）
    Insecure,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HostKeyConf {
    #[serde(default)]
    pub policy: HostKeyMode,
    /// SHA256 指纹（pinned 模式必填）
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// known hosts 文件路径（tofu 模式，默认位于配置目录）
    #[serde(default)]
    pub known_hosts_file: Option<PathBuf>,
}

// ======================== 传输方向 ========================

/// 上传：本地文件 -> 远程目录
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConf {
    pub src_file: PathBuf,
    pub dst_dir: String,
}

/// 下载：远程文件 -> 本地目录
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadConf {
    pub src_file: String,
    pub dst_dir: PathBuf,
}

// ======================== 传输参数 ========================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferConf {
    /// 每次读写的块大小
    pub chunk_size: usize,
    /// 本地缓冲区大小
    pub buffer_size: usize,
    /// 每个文件同时在途的 SFTP 请求数
    pub max_in_flight: usize,
    /// 单次读写超时（秒），不设置则不限
    pub io_timeout_secs: Option<u64>,
    /// 先写临时文件，成功后再重命名
    pub atomic: bool,
    /// 上传完成后执行 ls 校验
    pub verify: bool,
}

impl Default for TransferConf {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            buffer_size: BUFFER_SIZE,
            max_in_flight: MAX_IN_FLIGHT,
            io_timeout_secs: None,
            atomic: true,
            verify: true,
        }
    }
}
