// SFTP 子通道

mod remote_file;
mod service;

#[cfg(test)]
pub(crate) mod memory;

pub use remote_file::{RemoteFileReader, RemoteFileWriter};
pub use service::{SftpService, SubchannelOptions};
