//! In-memory remote store.
//!
//! Behaves like a small Unix FTP server: one shared tree, per-session
//! working directory, FTP-style errors. Used by the tests and by local
//! dry runs of the HTTP surface without a real server.

use async_trait::async_trait;
use sorng_ftp::ftp::{FtpEntry, FtpEntryKind, FtpError, FtpResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::dropzone::store::{Connector, RemoteStore};
use crate::dropzone::types::Credentials;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNode {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
struct MemoryFs {
    nodes: BTreeMap<String, MemoryNode>,
    accounts: HashMap<String, String>,
    structured: bool,
    unreachable: bool,
    fail_store: HashSet<String>,
    fail_mkdir: HashSet<String>,
    fail_listing: bool,
    opened: usize,
    closed: usize,
    commands: Vec<String>,
}

/// Shared tree plus failure switches. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    fs: Arc<Mutex<MemoryFs>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        let fs = MemoryFs {
            structured: true,
            ..Default::default()
        };
        Self {
            fs: Arc::new(Mutex::new(fs)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryFs> {
        lock_fs(&self.fs)
    }

    pub fn with_account(self, identity: &str, secret: &str) -> Self {
        self.lock()
            .accounts
            .insert(identity.to_string(), secret.to_string());
        self
    }

    /// Whether sessions advertise MLSD.
    pub fn with_structured_listing(self, enabled: bool) -> Self {
        self.lock().structured = enabled;
        self
    }

    pub fn add_dir(&self, path: &str) {
        self.lock().nodes.insert(normalize(path), MemoryNode::Dir);
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.lock()
            .nodes
            .insert(normalize(path), MemoryNode::File(data.to_vec()));
    }

    pub fn node(&self, path: &str) -> Option<MemoryNode> {
        self.lock().nodes.get(&normalize(path)).cloned()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let p = normalize(path);
        p == "/" || matches!(self.lock().nodes.get(&p), Some(MemoryNode::Dir))
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.node(path) {
            Some(MemoryNode::File(d)) => Some(d),
            _ => None,
        }
    }

    /// Full copy of the tree for before/after comparisons.
    pub fn snapshot(&self) -> BTreeMap<String, MemoryNode> {
        self.lock().nodes.clone()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn fail_store_of(&self, name: &str) {
        self.lock().fail_store.insert(name.to_string());
    }

    pub fn fail_mkdir_of(&self, path: &str) {
        self.lock().fail_mkdir.insert(normalize(path));
    }

    pub fn fail_listings(&self, fail: bool) {
        self.lock().fail_listing = fail;
    }

    /// Sessions that logged in but never sent QUIT.
    pub fn open_sessions(&self) -> usize {
        let fs = self.lock();
        fs.opened - fs.closed
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().opened
    }

    /// Every command issued so far, as `VERB arg`.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Mutating commands (MKD, STOR) issued so far.
    pub fn mutations(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with("MKD") || c.starts_with("STOR"))
            .collect()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Store = MemoryStore;

    fn endpoint(&self) -> String {
        "memory".into()
    }

    async fn connect(&self, login: &Credentials) -> FtpResult<MemoryStore> {
        let mut fs = self.lock();
        if fs.unreachable {
            return Err(FtpError::connection_failed("memory store is offline"));
        }
        match fs.accounts.get(&login.identity) {
            Some(secret) if *secret == login.secret => {}
            _ => return Err(FtpError::from_reply(530, "530 Login incorrect.")),
        }
        fs.opened += 1;
        let structured = fs.structured;
        drop(fs);
        Ok(MemoryStore {
            fs: self.fs.clone(),
            cwd: "/".into(),
            structured,
            open: true,
        })
    }
}

/// One session against a [`MemoryConnector`] tree.
#[derive(Debug)]
pub struct MemoryStore {
    fs: Arc<Mutex<MemoryFs>>,
    cwd: String,
    structured: bool,
    open: bool,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, MemoryFs> {
        lock_fs(&self.fs)
    }

    fn record(&self, cmd: String) -> FtpResult<MutexGuard<'_, MemoryFs>> {
        if !self.open {
            return Err(FtpError::disconnected("session already closed"));
        }
        let mut fs = self.lock();
        fs.commands.push(cmd);
        Ok(fs)
    }

    fn resolve(&self, path: &str) -> String {
        if path.starts_with('/') {
            normalize(path)
        } else {
            normalize(&format!("{}/{}", self.cwd, path))
        }
    }

    fn children(&self, fs: &MemoryFs) -> Vec<(String, MemoryNode)> {
        fs.nodes
            .iter()
            .filter(|(p, _)| parent_of(p) == self.cwd)
            .map(|(p, n)| (base_name(p).to_string(), n.clone()))
            .collect()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn supports_structured_listing(&self) -> bool {
        self.structured
    }

    async fn change_dir(&mut self, path: &str) -> FtpResult<()> {
        let target = self.resolve(path);
        let fs = self.record(format!("CWD {}", path))?;
        let ok = target == "/" || matches!(fs.nodes.get(&target), Some(MemoryNode::Dir));
        drop(fs);
        if ok {
            self.cwd = target;
            Ok(())
        } else {
            Err(FtpError::from_reply(550, "550 No such file or directory"))
        }
    }

    async fn make_dir(&mut self, name: &str) -> FtpResult<()> {
        let target = self.resolve(name);
        let mut fs = self.record(format!("MKD {}", name))?;
        if fs.fail_mkdir.contains(&target) {
            return Err(FtpError::from_reply(550, "550 Permission denied."));
        }
        if target == "/" || fs.nodes.contains_key(&target) {
            return Err(FtpError::from_reply(550, "550 File exists"));
        }
        let parent = parent_of(&target);
        if parent != "/" && !matches!(fs.nodes.get(parent), Some(MemoryNode::Dir)) {
            return Err(FtpError::from_reply(550, "550 No such file or directory"));
        }
        fs.nodes.insert(target, MemoryNode::Dir);
        Ok(())
    }

    async fn list_structured(&mut self) -> FtpResult<Vec<FtpEntry>> {
        let fs = self.record("MLSD".into())?;
        if !self.structured {
            return Err(FtpError::command_rejected(500, "500 MLSD not understood"));
        }
        if fs.fail_listing {
            return Err(FtpError::from_reply(451, "451 Listing aborted"));
        }
        Ok(self
            .children(&fs)
            .into_iter()
            .map(|(name, node)| match node {
                MemoryNode::Dir => FtpEntry::new(name, FtpEntryKind::Directory),
                MemoryNode::File(d) => {
                    let mut e = FtpEntry::new(name, FtpEntryKind::File);
                    e.size = d.len() as u64;
                    e
                }
            })
            .collect())
    }

    async fn list_lines(&mut self) -> FtpResult<Vec<String>> {
        let fs = self.record("LIST".into())?;
        if fs.fail_listing {
            return Err(FtpError::from_reply(451, "451 Listing aborted"));
        }
        let children = self.children(&fs);
        let mut lines = vec![format!("total {}", children.len())];
        lines.extend(children.into_iter().map(|(name, node)| match node {
            MemoryNode::Dir => format!("drwxr-xr-x 2 ftp ftp 4096 Jan 01 12:00 {}", name),
            MemoryNode::File(d) => {
                format!("-rw-r--r-- 1 ftp ftp {} Jan 01 12:00 {}", d.len(), name)
            }
        }));
        Ok(lines)
    }

    async fn store(
        &mut self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> FtpResult<u64> {
        let target = self.resolve(name);
        {
            let fs = self.record(format!("STOR {}", name))?;
            if fs.fail_store.contains(name) {
                return Err(FtpError::from_reply(452, "452 Insufficient storage space"));
            }
            if matches!(fs.nodes.get(&target), Some(MemoryNode::Dir)) {
                return Err(FtpError::from_reply(550, "550 Is a directory"));
            }
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let len = data.len() as u64;
        self.lock().nodes.insert(target, MemoryNode::File(data));
        Ok(len)
    }

    async fn quit(&mut self) -> FtpResult<()> {
        if !self.open {
            return Ok(());
        }
        let mut fs = self.record("QUIT".into())?;
        fs.closed += 1;
        drop(fs);
        self.open = false;
        Ok(())
    }
}

fn lock_fs(fs: &Arc<Mutex<MemoryFs>>) -> MutexGuard<'_, MemoryFs> {
    // Poisoning is ignored; the tree stays usable after a panicking holder.
    fs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
