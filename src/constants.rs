// 传输相关常量

/// 每次读写的块大小（8 MiB）
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// 本地读写缓冲区大小（40 KiB）
pub const BUFFER_SIZE: usize = 4096 * 10;

/// 每个文件同时在途的 SFTP 请求上限
pub const MAX_IN_FLIGHT: usize = 64;

/// 单个 SFTP 读写请求的数据长度
pub const SFTP_BLOCK_SIZE: usize = 32 * 1024;

/// 连接超时（秒）
pub const DIAL_TIMEOUT_SECS: u64 = 1;

/// 退出前等待时间（秒）
pub const EXIT_DELAY_SECS: u64 = 5;

/// 显式指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "SHELLSYNC_CONFIG";

/// 配置文件候选路径（按顺序，第一个存在的生效）
pub const CONFIG_CANDIDATES: [&str; 2] = ["resources/config.yaml", "conf/config.yaml"];

/// 应用目录名（known hosts 等持久化文件）
pub const APP_DIR_NAME: &str = "shellsync";
