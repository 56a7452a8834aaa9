//! A scripted stand-in for the resolver daemon's Varlink socket.
//!
//! [`FakeResolved`] listens on a Unix socket inside a temp directory and
//! answers NUL-terminated JSON calls from per-method scripts. Each call of a
//! method consumes the next script queued for it with [`FakeResolved::script`];
//! a script is a list of [`FakeFrame`]s played back in order.
//!
//! - A plain call with no script left gets a `MethodNotFound` error.
//! - A subscription (`"more": true`) with no script left stays open and idle.
//! - After a subscription's frames are exhausted the connection stays open
//!   until the client closes it.
//!
//! Every call's parameters are recorded and can be inspected with
//! [`FakeResolved::requests`].

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{JoinHandle, JoinSet};

/// One scripted step of a reply sequence.
#[derive(Debug, Clone)]
pub enum FakeFrame {
    /// Reply parameters; marked `continues` when the call asked for more.
    Reply(Value),
    /// Reply parameters without `continues`, ending a subscription.
    Last(Value),
    /// Error reply with the given error id.
    Error(String),
    /// Wait before playing the next frame.
    Pause(Duration),
    /// Close the connection.
    Hangup,
}

#[derive(Default)]
struct Script {
    sessions: HashMap<String, VecDeque<Vec<FakeFrame>>>,
    requests: Vec<(String, Value)>,
}

/// Scripted resolver daemon bound to a temporary socket path.
///
/// The socket and its directory are removed when this value is dropped.
pub struct FakeResolved {
    socket_path: PathBuf,
    script: Arc<Mutex<Script>>,
    accept_task: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl FakeResolved {
    /// Bind the socket and start accepting connections.
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let socket_path = temp_dir.path().join("io.systemd.Resolve");
        let listener = UnixListener::bind(&socket_path).expect("failed to bind fake socket");

        let script = Arc::new(Mutex::new(Script::default()));
        let accept_script = Arc::clone(&script);
        let accept_task = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            while let Ok((stream, _)) = listener.accept().await {
                connections.spawn(serve_connection(stream, Arc::clone(&accept_script)));
            }
        });

        Self {
            socket_path,
            script,
            accept_task,
            _temp_dir: temp_dir,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Queue the frames played for the next call of `method`.
    pub fn script(&self, method: &str, frames: Vec<FakeFrame>) {
        self.script
            .lock()
            .expect("fake script lock poisoned")
            .sessions
            .entry(method.to_string())
            .or_default()
            .push_back(frames);
    }

    /// Parameters of every call of `method` received so far, in order.
    pub fn requests(&self, method: &str) -> Vec<Value> {
        self.script
            .lock()
            .expect("fake script lock poisoned")
            .requests
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Unlink the socket so new connections fail; open ones keep running.
    pub fn shutdown(&self) {
        std::fs::remove_file(&self.socket_path).ok();
    }
}

impl Drop for FakeResolved {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(stream: UnixStream, script: Arc<Mutex<Script>>) {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let mut buf = Vec::new();
        match reader.read_until(0, &mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        if buf.pop() != Some(0) {
            return;
        }
        let Ok(call) = serde_json::from_slice::<Value>(&buf) else {
            return;
        };

        let method = call["method"].as_str().unwrap_or_default().to_string();
        let more = call["more"].as_bool().unwrap_or(false);
        let frames = {
            let mut script = script.lock().expect("fake script lock poisoned");
            script
                .requests
                .push((method.clone(), call["parameters"].clone()));
            script
                .sessions
                .get_mut(&method)
                .and_then(VecDeque::pop_front)
        };

        let Some(frames) = frames else {
            if more {
                drain(reader).await;
                return;
            }
            let not_found = json!({
                "error": "org.varlink.service.MethodNotFound",
                "parameters": {"method": method},
            });
            if send(&mut writer, &not_found).await.is_err() {
                return;
            }
            continue;
        };

        for frame in frames {
            let message = match frame {
                FakeFrame::Reply(parameters) if more => {
                    json!({"parameters": parameters, "continues": true})
                }
                FakeFrame::Reply(parameters) | FakeFrame::Last(parameters) => {
                    json!({"parameters": parameters})
                }
                FakeFrame::Error(id) => json!({"error": id, "parameters": {}}),
                FakeFrame::Pause(duration) => {
                    tokio::time::sleep(duration).await;
                    continue;
                }
                FakeFrame::Hangup => return,
            };
            if send(&mut writer, &message).await.is_err() {
                return;
            }
        }

        if more {
            drain(reader).await;
            return;
        }
    }
}

async fn send(writer: &mut OwnedWriteHalf, message: &Value) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(0);
    writer.write_all(&bytes).await?;
    writer.flush().await
}

async fn drain(mut reader: BufReader<OwnedReadHalf>) {
    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        match reader.read_until(0, &mut scratch).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}
