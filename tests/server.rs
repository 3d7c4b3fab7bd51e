//! End-to-end tests against a real TCP server.

use linekv::commands::CommandHandler;
use linekv::server::{Server, Shutdown, ShutdownReport};
use linekv::storage::{DiskStore, Durability, KvStore, MemoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(3);

struct TestServer {
    addr: SocketAddr,
    shutdown: Arc<Shutdown>,
    task: JoinHandle<ShutdownReport>,
}

async fn start_with(store: Arc<dyn KvStore>, drain_timeout: Option<Duration>) -> TestServer {
    let server = Server::bind("127.0.0.1:0", CommandHandler::new(store))
        .await
        .unwrap()
        .with_drain_timeout(drain_timeout);
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(server.run_until(std::future::pending()));

    TestServer {
        addr,
        shutdown,
        task,
    }
}

async fn start() -> TestServer {
    start_with(Arc::new(MemoryStore::new()), None).await
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn read_line(&mut self) -> Option<String> {
        timeout(READ_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for reply")
            .unwrap()
    }

    async fn request(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_line().await.expect("connection closed")
    }
}

#[tokio::test]
async fn test_get_set_delete() {
    let server = start().await;
    let mut client = Client::connect(server.addr).await;

    assert_eq!(client.request("GET fruit").await, "NOT FOUND");
    assert_eq!(client.request("SET fruit mango").await, "OK");
    assert_eq!(client.request("GET fruit").await, "mango");
    assert_eq!(client.request("DELETE fruit").await, "OK");
    assert_eq!(client.request("GET fruit").await, "NOT FOUND");
}

#[tokio::test]
async fn test_quoted_values_round_trip() {
    let server = start().await;
    let mut client = Client::connect(server.addr).await;

    assert_eq!(client.request(r#"SET 'my key' "my value""#).await, "OK");
    assert_eq!(client.request(r#"get "my key""#).await, "my value");
    assert_eq!(client.request("SET emoji 'ünïcødé ✓'").await, "OK");
    assert_eq!(client.request("GET emoji").await, "ünïcødé ✓");
}

#[tokio::test]
async fn test_keys_lists_matches_once() {
    let server = start().await;
    let mut client = Client::connect(server.addr).await;

    for key in ["user:3", "user:1", "order:1", "user:2"] {
        assert_eq!(client.request(&format!("SET {} x", key)).await, "OK");
    }
    // Overwrite does not duplicate
    assert_eq!(client.request("SET user:1 y").await, "OK");

    client.send("KEYS ^user:").await;
    let mut keys = Vec::new();
    for _ in 0..3 {
        keys.push(client.read_line().await.unwrap());
    }
    assert_eq!(keys, vec!["user:1", "user:2", "user:3"]);

    // The next reply belongs to the next command
    assert_eq!(client.request("GET order:1").await, "x");
}

#[tokio::test]
async fn test_misuse_keeps_connection_open() {
    let server = start().await;
    let mut client = Client::connect(server.addr).await;

    assert_eq!(client.request("GET").await, "GET need a key");
    assert_eq!(client.request("SET k").await, "SET need key and a value");
    assert_eq!(client.request("DELETE").await, "DELETE need a key");
    assert_eq!(client.request("KEYS").await, "KEYS need a regex");
    assert!(client
        .request("KEYS (")
        .await
        .starts_with("Unable to compile regex: "));
    assert_eq!(client.request("PING").await, "Unknown operation: PING");

    // Blank lines produce nothing; the next reply is for SET
    client.send("").await;
    client.send("   ").await;
    assert_eq!(client.request("SET k v").await, "OK");
}

#[tokio::test]
async fn test_quit_closes_connection() {
    let server = start().await;
    let mut client = Client::connect(server.addr).await;

    client.send("QUIT").await;
    client.send("SET after quit").await;

    assert_eq!(client.read_line().await.as_deref(), Some("Bye-bye"));
    assert_eq!(client.read_line().await, None);

    // The command after QUIT was never executed
    let mut other = Client::connect(server.addr).await;
    assert_eq!(other.request("GET after").await, "NOT FOUND");
}

#[tokio::test]
async fn test_concurrent_clients_do_not_interfere() {
    let server = start().await;

    let mut tasks = Vec::new();
    for id in 0..8 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            for round in 0..25 {
                let key = format!("client{}:{}", id, round);
                let value = format!("value-{}-{}", id, round);
                assert_eq!(client.request(&format!("SET {} {}", key, value)).await, "OK");
                assert_eq!(client.request(&format!("GET {}", key)).await, value);
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let mut client = Client::connect(server.addr).await;
    assert_eq!(client.request("GET client3:24").await, "value-3-24");
}

#[tokio::test]
async fn test_shutdown_refuses_new_connections() {
    let server = start().await;

    // Sanity: the server is accepting
    let mut client = Client::connect(server.addr).await;
    assert_eq!(client.request("SET k v").await, "OK");
    client.send("QUIT").await;
    assert_eq!(client.read_line().await.as_deref(), Some("Bye-bye"));

    server.shutdown.trigger();
    let report = timeout(READ_TIMEOUT, server.task)
        .await
        .expect("server should stop")
        .unwrap();
    assert_eq!(report.abandoned, 0);

    assert!(TcpStream::connect(server.addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_drains_open_connections() {
    let server = start().await;

    let mut client = Client::connect(server.addr).await;
    assert_eq!(client.request("SET k v").await, "OK");

    server.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Draining: the server waits, and the open client is still served
    assert!(!server.task.is_finished());
    assert_eq!(server.shutdown.outstanding(), 1);
    assert_eq!(client.request("GET k").await, "v");

    // New clients are refused meanwhile
    assert!(TcpStream::connect(server.addr).await.is_err());

    client.send("QUIT").await;
    assert_eq!(client.read_line().await.as_deref(), Some("Bye-bye"));

    let report = timeout(READ_TIMEOUT, server.task)
        .await
        .expect("server should finish draining")
        .unwrap();
    assert_eq!(report.abandoned, 0);
    assert_eq!(report.connections_accepted, 1);
}

#[tokio::test]
async fn test_drain_timeout_abandons_idle_clients() {
    let server = start_with(
        Arc::new(MemoryStore::new()),
        Some(Duration::from_millis(100)),
    )
    .await;

    let mut client = Client::connect(server.addr).await;
    assert_eq!(client.request("SET k v").await, "OK");

    server.shutdown.trigger();
    let report = timeout(READ_TIMEOUT, server.task)
        .await
        .expect("server should give up draining")
        .unwrap();
    assert_eq!(report.abandoned, 1);
}

#[tokio::test]
async fn test_disk_store_behind_server() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KvStore> = Arc::new(DiskStore::open(dir.path(), Durability::Sync).unwrap());
    let server = start_with(Arc::clone(&store), None).await;

    let mut client = Client::connect(server.addr).await;
    assert_eq!(client.request("SET 'a key' 'a value'").await, "OK");
    assert_eq!(client.request("GET 'a key'").await, "a value");
    client.send("QUIT").await;
    assert_eq!(client.read_line().await.as_deref(), Some("Bye-bye"));

    server.shutdown.trigger();
    server.task.await.unwrap();

    assert_eq!(
        store.get(b"a key").unwrap().as_deref(),
        Some(&b"a value"[..])
    );
}
