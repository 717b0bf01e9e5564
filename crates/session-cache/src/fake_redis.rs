//! Minimal RESP server for exercising the networked backend in tests.
//!
//! Understands `PING`, `SETEX`, `GET` and `DEL`; any other command (such as
//! the client's `CLIENT SETINFO`) is acknowledged with `+OK`. Expiry is not
//! enforced, the TTL is only recorded.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct StoredValue {
    pub value: String,
    pub ttl_secs: u64,
}

type Store = Arc<Mutex<HashMap<String, StoredValue>>>;

pub struct FakeRedis {
    addr: SocketAddr,
    store: Store,
    accept: Option<JoinHandle<()>>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut server = Self {
            addr,
            store: Arc::default(),
            accept: None,
            connections: Arc::default(),
        };
        server.serve(listener);
        server
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    pub fn stored(&self, key: &str) -> Option<StoredValue> {
        self.store.lock().unwrap().get(key).cloned()
    }

    /// Close the listener and every open connection; stored keys are kept
    pub async fn stop(&mut self) {
        if let Some(accept) = self.accept.take() {
            accept.abort();
            let _ = accept.await;
        }
        let connections: Vec<_> = self.connections.lock().unwrap().drain(..).collect();
        for connection in connections {
            connection.abort();
            let _ = connection.await;
        }
    }

    /// Start listening again on the same address
    pub async fn restart(&mut self) {
        self.stop().await;
        let listener = TcpListener::bind(self.addr).await.unwrap();
        self.serve(listener);
    }

    fn serve(&mut self, listener: TcpListener) {
        let store = self.store.clone();
        let connections = self.connections.clone();
        self.accept = Some(tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handle = tokio::spawn(handle_connection(stream, store.clone()));
                connections.lock().unwrap().push(handle);
            }
        }));
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        if let Some(accept) = self.accept.take() {
            accept.abort();
        }
        if let Ok(mut connections) = self.connections.lock() {
            for connection in connections.drain(..) {
                connection.abort();
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, store: Store) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await {
        let reply = execute(&args, &store);
        if write.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Read one `*N` array of bulk strings; `None` on EOF or malformed input
async fn read_command<R>(reader: &mut BufReader<R>) -> Option<Vec<String>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let count: usize = read_header(reader, '*').await?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len: usize = read_header(reader, '$').await?;
        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        args.push(String::from_utf8(buf).ok()?);
    }
    Some(args)
}

async fn read_header<R>(reader: &mut BufReader<R>, prefix: char) -> Option<usize>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    line.trim_end().strip_prefix(prefix)?.parse().ok()
}

fn execute(args: &[String], store: &Store) -> String {
    let Some(name) = args.first() else {
        return "-ERR empty command\r\n".to_string();
    };
    let mut store = store.lock().unwrap();

    match (name.to_ascii_uppercase().as_str(), &args[1..]) {
        ("PING", _) => "+PONG\r\n".to_string(),
        ("SETEX", [key, ttl, value]) => match ttl.parse() {
            Ok(ttl_secs) => {
                store.insert(
                    key.clone(),
                    StoredValue {
                        value: value.clone(),
                        ttl_secs,
                    },
                );
                "+OK\r\n".to_string()
            }
            Err(_) => "-ERR value is not an integer or out of range\r\n".to_string(),
        },
        ("GET", [key]) => match store.get(key) {
            Some(stored) => format!("${}\r\n{}\r\n", stored.value.len(), stored.value),
            None => "$-1\r\n".to_string(),
        },
        ("DEL", keys) => {
            let removed = keys.iter().filter(|k| store.remove(*k).is_some()).count();
            format!(":{}\r\n", removed)
        }
        _ => "+OK\r\n".to_string(),
    }
}
