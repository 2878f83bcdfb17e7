//! In-process FTP server for loopback tests.
//!
//! Speaks just enough RFC 959 for the client: login, FEAT, PWD/CWD, MKD,
//! PASV/PORT data channels, MLSD/LIST and STOR. The filesystem lives in
//! memory and can be inspected from the test.

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct FakeUser {
    pub name: String,
    pub password: String,
}

impl FakeUser {
    pub fn new(name: &str, password: &str) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Default)]
struct FakeState {
    nodes: BTreeMap<String, Node>,
    rejected_stores: HashSet<String>,
    aborted_stores: HashSet<String>,
    hung_up_stores: HashSet<String>,
    sessions_opened: usize,
    sessions_quit: usize,
}

enum PendingData {
    Passive(TcpListener),
    Active(SocketAddr),
}

/// Handle to a running fake server. The accept loop ends with the runtime.
#[derive(Clone)]
pub struct FakeFtpServer {
    port: u16,
    state: Arc<Mutex<FakeState>>,
}

impl FakeFtpServer {
    pub async fn start(users: Vec<FakeUser>, mlsd: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake ftp server");
        let port = listener.local_addr().expect("local addr").port();
        let state = Arc::new(Mutex::new(FakeState::default()));

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let session = FakeSession {
                    users: users.clone(),
                    mlsd,
                    state: accept_state.clone(),
                    cwd: "/".into(),
                    user: None,
                    logged_in: false,
                    pending: None,
                };
                tokio::spawn(session.run(tcp));
            }
        });

        Self { port, state }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn add_dir(&self, path: &str) {
        self.lock().nodes.insert(path.to_string(), Node::Dir);
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.lock()
            .nodes
            .insert(path.to_string(), Node::File(data.to_vec()));
    }

    pub fn is_dir(&self, path: &str) -> bool {
        path == "/" || matches!(self.lock().nodes.get(path), Some(Node::Dir))
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().nodes.get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Answer STOR of `name` with `550 Permission denied.`
    pub fn reject_store(&self, name: &str) {
        self.lock().rejected_stores.insert(name.to_string());
    }

    /// Accept STOR of `name`, read a little, then close the data
    /// connection and answer `426`. Nothing is stored.
    pub fn abort_store(&self, name: &str) {
        self.lock().aborted_stores.insert(name.to_string());
    }

    /// Answer STOR of `name` with `150`, then drop the control connection
    /// without a closing reply.
    pub fn hang_up_on_store(&self, name: &str) {
        self.lock().hung_up_stores.insert(name.to_string());
    }

    /// (logins accepted, QUITs received)
    pub fn session_counts(&self) -> (usize, usize) {
        let st = self.lock();
        (st.sessions_opened, st.sessions_quit)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake server state poisoned")
    }
}

struct FakeSession {
    users: Vec<FakeUser>,
    mlsd: bool,
    state: Arc<Mutex<FakeState>>,
    cwd: String,
    user: Option<String>,
    logged_in: bool,
    pending: Option<PendingData>,
}

impl FakeSession {
    async fn run(mut self, tcp: TcpStream) {
        let (rd, mut wr) = tcp.into_split();
        let mut reader = BufReader::new(rd);
        if reply(&mut wr, "220 fake ftp ready").await.is_err() {
            return;
        }
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            let (cmd, arg) = match trimmed.split_once(' ') {
                Some((c, a)) => (c.to_ascii_uppercase(), a.to_string()),
                None => (trimmed.to_ascii_uppercase(), String::new()),
            };
            match self.handle(&cmd, &arg, &mut wr).await {
                Ok(true) => {}
                Ok(false) | Err(_) => return,
            }
        }
    }

    async fn handle(&mut self, cmd: &str, arg: &str, wr: &mut OwnedWriteHalf) -> std::io::Result<bool> {
        match cmd {
            "USER" => {
                self.user = Some(arg.to_string());
                reply(wr, "331 Password required").await?;
            }
            "PASS" => {
                let ok = self
                    .users
                    .iter()
                    .any(|u| Some(&u.name) == self.user.as_ref() && u.password == arg);
                if ok {
                    self.logged_in = true;
                    self.state.lock().expect("state").sessions_opened += 1;
                    reply(wr, "230 Logged in").await?;
                } else {
                    reply(wr, "530 Login incorrect.").await?;
                }
            }
            "QUIT" => {
                self.state.lock().expect("state").sessions_quit += 1;
                reply(wr, "221 Goodbye").await?;
                return Ok(false);
            }
            _ if !self.logged_in => reply(wr, "530 Not logged in").await?,
            "FEAT" => {
                let body = if self.mlsd {
                    "211-Features:\r\n MLSD\r\n UTF8\r\n211 End"
                } else {
                    "211-Features:\r\n UTF8\r\n211 End"
                };
                reply(wr, body).await?;
            }
            "OPTS" | "TYPE" | "NOOP" => reply(wr, "200 OK").await?,
            "SYST" => reply(wr, "215 UNIX Type: L8").await?,
            "PWD" => reply(wr, &format!("257 \"{}\" is current directory", self.cwd)).await?,
            "CWD" => {
                let path = resolve(&self.cwd, arg);
                if self.is_dir(&path) {
                    self.cwd = path;
                    reply(wr, "250 Directory changed").await?;
                } else {
                    reply(wr, "550 No such file or directory").await?;
                }
            }
            "MKD" => {
                let path = resolve(&self.cwd, arg);
                let text = {
                    let mut st = self.state.lock().expect("state");
                    if path == "/" || st.nodes.contains_key(&path) {
                        "550 File exists".to_string()
                    } else if parent_of(&path) != "/"
                        && !matches!(st.nodes.get(parent_of(&path)), Some(Node::Dir))
                    {
                        "550 No such file or directory".to_string()
                    } else {
                        st.nodes.insert(path.clone(), Node::Dir);
                        format!("257 \"{}\" created", path)
                    }
                };
                reply(wr, &text).await?;
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let p = listener.local_addr()?.port();
                self.pending = Some(PendingData::Passive(listener));
                reply(
                    wr,
                    &format!("227 Entering Passive Mode (127,0,0,1,{},{})", p / 256, p % 256),
                )
                .await?;
            }
            "PORT" => {
                let nums: Vec<u16> = arg.split(',').filter_map(|n| n.parse().ok()).collect();
                if nums.len() != 6 {
                    reply(wr, "501 Bad PORT").await?;
                } else {
                    let addr = format!(
                        "{}.{}.{}.{}:{}",
                        nums[0],
                        nums[1],
                        nums[2],
                        nums[3],
                        nums[4] * 256 + nums[5]
                    );
                    match addr.parse() {
                        Ok(sa) => {
                            self.pending = Some(PendingData::Active(sa));
                            reply(wr, "200 PORT OK").await?;
                        }
                        Err(_) => reply(wr, "501 Bad PORT").await?,
                    }
                }
            }
            "MLSD" | "LIST" => {
                let path = if arg.is_empty() {
                    self.cwd.clone()
                } else {
                    resolve(&self.cwd, arg)
                };
                if !self.is_dir(&path) {
                    self.pending = None;
                    reply(wr, "550 No such file or directory").await?;
                    return Ok(true);
                }
                let body = self.listing(&path, cmd == "MLSD");
                match self.pending.take() {
                    None => reply(wr, "425 Use PASV or PORT first").await?,
                    Some(pending) => {
                        reply(wr, "150 Here comes the listing").await?;
                        let mut data = open_data(pending).await?;
                        data.write_all(body.as_bytes()).await?;
                        data.shutdown().await?;
                        drop(data);
                        reply(wr, "226 Transfer complete").await?;
                    }
                }
            }
            "STOR" => {
                let (rejected, aborted, hang_up) = {
                    let st = self.state.lock().expect("state");
                    (
                        st.rejected_stores.contains(arg),
                        st.aborted_stores.contains(arg),
                        st.hung_up_stores.contains(arg),
                    )
                };
                let pending = match (rejected, self.pending.take()) {
                    (true, _) => {
                        reply(wr, "550 Permission denied.").await?;
                        return Ok(true);
                    }
                    (false, None) => {
                        reply(wr, "425 Use PASV or PORT first").await?;
                        return Ok(true);
                    }
                    (false, Some(pending)) => pending,
                };
                reply(wr, "150 Ok to send data").await?;
                if hang_up {
                    return Ok(false);
                }
                let mut data = open_data(pending).await?;
                if aborted {
                    let mut head = [0u8; 1024];
                    let _ = data.read(&mut head).await?;
                    drop(data);
                    reply(wr, "426 Connection closed; transfer aborted.").await?;
                } else {
                    let mut buf = Vec::new();
                    data.read_to_end(&mut buf).await?;
                    let path = resolve(&self.cwd, arg);
                    self.state
                        .lock()
                        .expect("state")
                        .nodes
                        .insert(path, Node::File(buf));
                    reply(wr, "226 Transfer complete").await?;
                }
            }
            _ => reply(wr, "502 Command not implemented").await?,
        }
        Ok(true)
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || matches!(self.state.lock().expect("state").nodes.get(path), Some(Node::Dir))
    }

    fn listing(&self, dir: &str, mlsd: bool) -> String {
        let st = self.state.lock().expect("state");
        let mut out = String::new();
        if !mlsd {
            out.push_str("total 0\r\n");
        }
        for (path, node) in st.nodes.iter().filter(|(p, _)| parent_of(p) == dir) {
            let name = &path[path.rfind('/').map_or(0, |i| i + 1)..];
            let line = match (node, mlsd) {
                (Node::Dir, true) => format!("type=dir;modify=20240101120000; {}", name),
                (Node::File(d), true) => {
                    format!("type=file;size={};modify=20240101120000; {}", d.len(), name)
                }
                (Node::Dir, false) => format!("drwxr-xr-x 2 ftp ftp 4096 Jan 01 12:00 {}", name),
                (Node::File(d), false) => {
                    format!("-rw-r--r-- 1 ftp ftp {} Jan 01 12:00 {}", d.len(), name)
                }
            };
            out.push_str(&line);
            out.push_str("\r\n");
        }
        out
    }
}

async fn reply(wr: &mut OwnedWriteHalf, text: &str) -> std::io::Result<()> {
    wr.write_all(format!("{}\r\n", text).as_bytes()).await
}

async fn open_data(pending: PendingData) -> std::io::Result<TcpStream> {
    match pending {
        PendingData::Passive(listener) => Ok(listener.accept().await?.0),
        PendingData::Active(addr) => TcpStream::connect(addr).await,
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn resolve(cwd: &str, arg: &str) -> String {
    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{}/{}", cwd, arg)
    };
    let mut parts: Vec<&str> = Vec::new();
    for seg in joined.split('/') {
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
