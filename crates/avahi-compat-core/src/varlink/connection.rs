//! A single Varlink connection over a Unix domain socket.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, trace};

/// Errors from the Varlink transport.
#[derive(Debug, thiserror::Error)]
pub enum VarlinkError {
    #[error("resolver daemon is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("failed to connect to resolver socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("timed out connecting to resolver socket at {0}")]
    ConnectTimeout(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Protocol(String),

    #[error("connection closed by resolver daemon")]
    Closed,

    #[error("call timed out after {0:?}")]
    CallTimeout(Duration),

    #[error("resolver daemon returned error {error}")]
    Remote { error: String, parameters: Value },
}

impl VarlinkError {
    /// Whether the error happened before a connection existed.
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            VarlinkError::NotRunning(_)
                | VarlinkError::Connect { .. }
                | VarlinkError::ConnectTimeout(_)
        )
    }
}

/// One reply message.
#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub parameters: Value,

    #[serde(default)]
    pub continues: bool,

    #[serde(default)]
    pub error: Option<String>,
}

impl Reply {
    /// The reply parameters, or [`VarlinkError::Remote`] for an error reply.
    pub fn into_result(self) -> Result<Value, VarlinkError> {
        match self.error {
            Some(error) => Err(VarlinkError::Remote {
                error,
                parameters: self.parameters,
            }),
            None => Ok(self.parameters),
        }
    }
}

/// Decode reply parameters into a typed struct.
pub fn decode_parameters<T: DeserializeOwned>(parameters: Value) -> Result<T, VarlinkError> {
    serde_json::from_value(parameters)
        .map_err(|e| VarlinkError::Protocol(format!("unexpected reply parameters: {e}")))
}

#[derive(Serialize)]
struct Call<'a, P: ?Sized> {
    method: &'a str,
    parameters: &'a P,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    more: bool,
}

/// An open connection to the resolver daemon.
pub struct VarlinkConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    pending: Vec<u8>,
}

impl VarlinkConnection {
    /// Connect to the socket at `path`, giving up after `timeout`.
    pub async fn connect(path: &Path, timeout: Duration) -> Result<Self, VarlinkError> {
        if !path.exists() {
            return Err(VarlinkError::NotRunning(path.to_path_buf()));
        }

        let stream = match tokio::time::timeout(timeout, UnixStream::connect(path)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(VarlinkError::Connect {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(_) => return Err(VarlinkError::ConnectTimeout(path.to_path_buf())),
        };

        debug!(path = %path.display(), "Connected to resolver socket");

        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            pending: Vec::new(),
        })
    }

    async fn send<P: Serialize + ?Sized>(
        &mut self,
        method: &str,
        parameters: &P,
        more: bool,
    ) -> Result<(), VarlinkError> {
        let call = Call {
            method,
            parameters,
            more,
        };
        let mut buf = serde_json::to_vec(&call)
            .map_err(|e| VarlinkError::Protocol(format!("failed to encode call: {e}")))?;
        buf.push(0);

        trace!(method, more, "Varlink call");
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Issue a call and wait for its single reply.
    pub async fn call<P: Serialize + ?Sized>(
        &mut self,
        method: &str,
        parameters: &P,
    ) -> Result<Value, VarlinkError> {
        self.send(method, parameters, false).await?;
        match self.next_reply().await? {
            Some(reply) => reply.into_result(),
            None => Err(VarlinkError::Closed),
        }
    }

    /// Issue a call asking for a stream of replies.
    pub async fn subscribe<P: Serialize + ?Sized>(
        &mut self,
        method: &str,
        parameters: &P,
    ) -> Result<(), VarlinkError> {
        self.send(method, parameters, true).await
    }

    /// Read the next reply. `Ok(None)` means the daemon closed the socket.
    ///
    /// Cancel safe: bytes of a partially received message are kept and the
    /// next call continues where the cancelled one stopped.
    pub async fn next_reply(&mut self) -> Result<Option<Reply>, VarlinkError> {
        let n = self.reader.read_until(0, &mut self.pending).await?;

        if self.pending.last() != Some(&0) {
            if n == 0 && self.pending.is_empty() {
                return Ok(None);
            }
            self.pending.clear();
            return Err(VarlinkError::Protocol(
                "connection closed in the middle of a message".to_string(),
            ));
        }

        let mut message = std::mem::take(&mut self.pending);
        message.pop();
        let reply = serde_json::from_slice(&message)
            .map_err(|e| VarlinkError::Protocol(format!("invalid reply: {e}")))?;
        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avahi_compat_test_utils::{FakeFrame, FakeResolved};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_connect_missing_socket_is_not_running() {
        let result =
            VarlinkConnection::connect(Path::new("/nonexistent/io.systemd.Resolve"), TIMEOUT).await;
        assert!(matches!(result, Err(VarlinkError::NotRunning(_))));
        assert!(result.err().is_some_and(|e| e.is_connect()));
    }

    #[tokio::test]
    async fn test_call_roundtrip() {
        let server = FakeResolved::start().await;
        server.script(
            "io.example.Echo",
            vec![FakeFrame::Reply(json!({"answer": 42}))],
        );

        let mut conn = VarlinkConnection::connect(server.socket_path(), TIMEOUT)
            .await
            .unwrap();
        let reply = conn
            .call("io.example.Echo", &json!({"question": "?"}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"answer": 42}));

        let requests = server.requests("io.example.Echo");
        assert_eq!(requests, vec![json!({"question": "?"})]);
    }

    #[tokio::test]
    async fn test_error_reply_becomes_remote_error() {
        let server = FakeResolved::start().await;
        server.script(
            "io.example.Fail",
            vec![FakeFrame::Error("io.systemd.Resolve.NoSuchResourceRecord".into())],
        );

        let mut conn = VarlinkConnection::connect(server.socket_path(), TIMEOUT)
            .await
            .unwrap();
        let err = conn.call("io.example.Fail", &json!({})).await.unwrap_err();
        match err {
            VarlinkError::Remote { error, .. } => {
                assert_eq!(error, "io.systemd.Resolve.NoSuchResourceRecord");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscription_streams_until_hangup() {
        let server = FakeResolved::start().await;
        server.script(
            "io.example.Watch",
            vec![
                FakeFrame::Reply(json!({"n": 1})),
                FakeFrame::Reply(json!({"n": 2})),
                FakeFrame::Hangup,
            ],
        );

        let mut conn = VarlinkConnection::connect(server.socket_path(), TIMEOUT)
            .await
            .unwrap();
        conn.subscribe("io.example.Watch", &json!({})).await.unwrap();

        let first = conn.next_reply().await.unwrap().unwrap();
        assert!(first.continues);
        assert_eq!(first.parameters, json!({"n": 1}));
        let second = conn.next_reply().await.unwrap().unwrap();
        assert_eq!(second.parameters, json!({"n": 2}));
        assert!(conn.next_reply().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_reply_survives_cancelled_poll() {
        let server = FakeResolved::start().await;
        server.script(
            "io.example.Slow",
            vec![
                FakeFrame::Pause(Duration::from_millis(150)),
                FakeFrame::Reply(json!({"late": true})),
            ],
        );

        let mut conn = VarlinkConnection::connect(server.socket_path(), TIMEOUT)
            .await
            .unwrap();
        conn.subscribe("io.example.Slow", &json!({})).await.unwrap();

        let polled = tokio::time::timeout(Duration::from_millis(20), conn.next_reply()).await;
        assert!(polled.is_err());

        let reply = conn.next_reply().await.unwrap().unwrap();
        assert_eq!(reply.parameters, json!({"late": true}));
    }

    #[test]
    fn test_reply_decoding() {
        let reply: Reply =
            serde_json::from_value(json!({"error": "io.systemd.TimedOut"})).unwrap();
        assert!(matches!(
            reply.into_result(),
            Err(VarlinkError::Remote { ref error, .. }) if error == "io.systemd.TimedOut"
        ));

        let reply: Reply = serde_json::from_value(json!({"parameters": {"x": 1}})).unwrap();
        assert!(!reply.continues);
        #[derive(Deserialize)]
        struct X {
            x: u8,
        }
        let x: X = decode_parameters(reply.into_result().unwrap()).unwrap();
        assert_eq!(x.x, 1);
    }
}
