// 路径处理

use std::path::{Path, PathBuf};

/// 上传目标路径：dst_dir + ('/' 如果缺失) + 源文件名
pub fn remote_destination(dst_dir: &str, src_file: &Path) -> String {
    let file_name = src_file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if dst_dir.ends_with('/') {
        format!("{}{}", dst_dir, file_name)
    } else {
        format!("{}/{}", dst_dir, file_name)
    }
}

/// 下载目标路径：本地目录 + 远程文件名
pub fn local_destination(dst_dir: &Path, remote_src: &str) -> PathBuf {
    let file_name = remote_src
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(remote_src);
    dst_dir.join(file_name)
}

/// 临时文件路径：<path>.<8 位十六进制>.part
pub fn temp_path(path: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}.{}.part", path, &id[..8])
}
