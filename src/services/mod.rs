// 后端服务

pub mod config;
pub mod known_hosts;
pub mod sftp;
