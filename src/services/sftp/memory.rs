// 内存 SFTP 服务端
// 通过 tokio duplex 连接 russh-sftp 客户端，用于在没有 SSH 服务器的情况下测试子通道

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{
    Attrs, Data, FileAttributes, Handle, OpenFlags, Status, StatusCode,
};

use super::service::{ParentSession, SftpService, SubchannelOptions};

#[derive(Default)]
struct FsState {
    files: HashMap<String, Vec<u8>>,
    /// handle -> path
    handles: HashMap<String, String>,
    next_handle: u64,
    opens: usize,
    /// 前 N 次 open 成功，之后失败
    fail_opens_after: Option<usize>,
    /// 目标存在时拒绝 rename
    refuse_overwrite: bool,
}

/// 内存文件系统（服务端状态）
#[derive(Clone, Default)]
pub struct MemoryFs {
    state: Arc<Mutex<FsState>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), data.to_vec());
    }

    pub fn append(&self, path: &str, data: &[u8]) {
        if let Some(file) = self.state.lock().unwrap().files.get_mut(path) {
            file.extend_from_slice(data);
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    /// 所有文件路径（排序）
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state.lock().unwrap().files.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// 累计 open 次数
    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// 当前未关闭的句柄数
    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().handles.len()
    }

    pub fn fail_opens_after(&self, n: usize) {
        self.state.lock().unwrap().fail_opens_after = Some(n);
    }

    pub fn refuse_overwrite(&self) {
        self.state.lock().unwrap().refuse_overwrite = true;
    }

    /// 启动服务端并返回已完成握手的客户端会话
    pub async fn connect(&self) -> SftpSession {
        let (client, server) = tokio::io::duplex(1024 * 1024);
        russh_sftp::server::run(
            server,
            MemoryHandler {
                state: self.state.clone(),
            },
        )
        .await;
        SftpSession::new(client).await.unwrap()
    }

    /// 在测试会话上创建 SftpService
    pub async fn service<'s>(
        &self,
        session: &'s TestSession,
        options: SubchannelOptions,
    ) -> SftpService<'s> {
        SftpService::with_session(session, self.connect().await, options)
    }
}

/// 测试用会话，可手动断开
pub struct TestSession {
    alive: AtomicBool,
}

impl TestSession {
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
        }
    }

    pub fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl ParentSession for TestSession {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

fn ok(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".to_string(),
        language_tag: "en-US".to_string(),
    }
}

struct MemoryHandler {
    state: Arc<Mutex<FsState>>,
}

impl MemoryHandler {
    fn attrs(&self, id: u32, path: &str) -> Result<Attrs, StatusCode> {
        let state = self.state.lock().map_err(|_| StatusCode::Failure)?;
        let file = state.files.get(path).ok_or(StatusCode::NoSuchFile)?;
        let mut attrs = FileAttributes::empty();
        attrs.size = Some(file.len() as u64);
        attrs.set_regular(true);
        Ok(Attrs { id, attrs })
    }
}

impl russh_sftp::server::Handler for MemoryHandler {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<Handle, Self::Error> {
        let mut state = self.state.lock().map_err(|_| StatusCode::Failure)?;
        if let Some(limit) = state.fail_opens_after {
            if state.opens >= limit {
                return Err(StatusCode::Failure);
            }
        }
        state.opens += 1;

        if pflags.contains(OpenFlags::CREATE) {
            let file = state.files.entry(filename.clone()).or_default();
            if pflags.contains(OpenFlags::TRUNCATE) {
                file.clear();
            }
        } else if !state.files.contains_key(&filename) {
            return Err(StatusCode::NoSuchFile);
        }

        state.next_handle += 1;
        let handle = format!("h{}", state.next_handle);
        state.handles.insert(handle.clone(), filename);
        Ok(Handle { id, handle })
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        let mut state = self.state.lock().map_err(|_| StatusCode::Failure)?;
        state
            .handles
            .remove(&handle)
            .map(|_| ok(id))
            .ok_or(StatusCode::Failure)
    }

    async fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> Result<Data, Self::Error> {
        let state = self.state.lock().map_err(|_| StatusCode::Failure)?;
        let path = state.handles.get(&handle).ok_or(StatusCode::Failure)?;
        let file = state.files.get(path).ok_or(StatusCode::NoSuchFile)?;
        let start = offset as usize;
        if start >= file.len() {
            return Err(StatusCode::Eof);
        }
        let end = (start + len as usize).min(file.len());
        Ok(Data {
            id,
            data: file[start..end].to_vec(),
        })
    }

    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        let mut state = self.state.lock().map_err(|_| StatusCode::Failure)?;
        let path = state
            .handles
            .get(&handle)
            .cloned()
            .ok_or(StatusCode::Failure)?;
        let file = state.files.get_mut(&path).ok_or(StatusCode::NoSuchFile)?;
        let start = offset as usize;
        let end = start + data.len();
        if file.len() < end {
            file.resize(end, 0);
        }
        file[start..end].copy_from_slice(&data);
        Ok(ok(id))
    }

    async fn stat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        self.attrs(id, &path)
    }

    async fn lstat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        self.attrs(id, &path)
    }

    async fn remove(&mut self, id: u32, filename: String) -> Result<Status, Self::Error> {
        let mut state = self.state.lock().map_err(|_| StatusCode::Failure)?;
        state
            .files
            .remove(&filename)
            .map(|_| ok(id))
            .ok_or(StatusCode::NoSuchFile)
    }

    async fn rename(
        &mut self,
        id: u32,
        oldpath: String,
        newpath: String,
    ) -> Result<Status, Self::Error> {
        let mut state = self.state.lock().map_err(|_| StatusCode::Failure)?;
        if !state.files.contains_key(&oldpath) {
            return Err(StatusCode::NoSuchFile);
        }
        if state.refuse_overwrite && state.files.contains_key(&newpath) {
            return Err(StatusCode::Failure);
        }
        if let Some(data) = state.files.remove(&oldpath) {
            state.files.insert(newpath, data);
        }
        Ok(ok(id))
    }
}
