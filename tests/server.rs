//! End-to-end tests over a real TCP listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use switchyard::{
    ConnectionInfo, ConnectionPolicy, Error, Metrics, RATE_LIMIT_BODY, Request, Response,
    ResponseFactory, Router, Server, ServerConfig,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

async fn get_widget(req: Request) -> Result<Response, Error> {
    let id = req.variable("id").unwrap_or_default();
    req.ok(&serde_json::json!({ "id": id }))
}

async fn echo(req: Request) -> Result<Response, Error> {
    let text = req.body_as_string();
    req.ok(&text)
}

fn app() -> Router {
    Router::new()
        .get("/widgets/{id}", get_widget)
        .post("/echo", echo)
        .with_admin_routes()
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), Error>>,
}

impl Running {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap();
    }
}

async fn start(server: Server) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve_listener(listener, app(), async move {
        let _ = stopped.await;
    }));
    Running { addr, stop, task }
}

/// Sends `raw` and reads until the server closes the connection.
async fn exchange(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

fn local() -> ServerConfig {
    ServerConfig { bind: "127.0.0.1:0".parse().unwrap(), ..ServerConfig::default() }
}

#[tokio::test]
async fn routes_request_and_closes_connection() {
    let metrics = Arc::new(Metrics::default());
    let running = start(Server::new(local()).metrics(Arc::clone(&metrics))).await;

    let res = exchange(running.addr, "GET /widgets/42?x=1 HTTP/1.1\r\nhost: test\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(res.contains("content-type: application/json\r\n"), "{res}");
    assert!(res.contains("content-length: 11\r\n"), "{res}");
    assert!(res.contains("connection: close\r\n"), "{res}");
    assert!(res.ends_with(r#"{"id":"42"}"#), "{res}");

    let res = exchange(running.addr, "GET /nope HTTP/1.1\r\nhost: test\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found\r\n"), "{res}");

    running.shutdown().await;
    assert_eq!(metrics.request_count(), 2);
    assert_eq!(metrics.status_count(http::StatusCode::OK), Some(1));
    assert_eq!(metrics.status_count(http::StatusCode::NOT_FOUND), Some(1));
}

#[tokio::test]
async fn rate_limited_connection_gets_fixed_429() {
    let server = Server::new(local()).rate_limit_gate(|_: &ConnectionInfo| true);
    let running = start(server).await;

    let res = exchange(running.addr, "GET /widgets/1 HTTP/1.1\r\nhost: test\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 429 Too Many Requests\r\n"), "{res}");
    assert!(res.contains("content-type: text/plain\r\n"), "{res}");
    assert!(res.ends_with(RATE_LIMIT_BODY), "{res}");

    running.shutdown().await;
}

#[tokio::test]
async fn negotiates_text_and_echoes_body() {
    let running = start(Server::new(local())).await;

    let res = exchange(
        running.addr,
        "POST /echo HTTP/1.1\r\nhost: test\r\naccept: text/plain\r\ncontent-length: 5\r\n\r\nhello",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(res.contains("content-type: text/plain\r\n"), "{res}");
    assert!(res.ends_with("\r\n\r\nhello"), "{res}");

    running.shutdown().await;
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let config = ServerConfig { max_body_bytes: 4, ..local() };
    let running = start(Server::new(config)).await;

    let res = exchange(
        running.addr,
        "POST /echo HTTP/1.1\r\nhost: test\r\ncontent-length: 10\r\n\r\n0123456789",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{res}");

    running.shutdown().await;
}

#[tokio::test]
async fn keep_alive_serves_several_requests_per_connection() {
    let config = ServerConfig { connection: ConnectionPolicy::KeepAlive, ..local() };
    let running = start(Server::new(config)).await;

    let res = exchange(
        running.addr,
        "GET /healthz HTTP/1.1\r\nhost: test\r\n\r\n\
         GET /readyz HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(res.matches("HTTP/1.1 200 OK\r\n").count(), 2, "{res}");
    assert!(res.ends_with("ready"), "{res}");

    running.shutdown().await;
}

#[tokio::test]
async fn rate_limited_keep_alive_connection_is_closed_after_one_429() {
    let config = ServerConfig { connection: ConnectionPolicy::KeepAlive, ..local() };
    let running = start(Server::new(config).rate_limit_gate(|_: &ConnectionInfo| true)).await;

    let res = exchange(
        running.addr,
        "GET /healthz HTTP/1.1\r\nhost: test\r\n\r\n\
         GET /readyz HTTP/1.1\r\nhost: test\r\n\r\n",
    )
    .await;
    assert_eq!(res.matches("HTTP/1.1 429 Too Many Requests\r\n").count(), 1, "{res}");
    assert!(res.contains("connection: close\r\n"), "{res}");
    assert!(res.ends_with(RATE_LIMIT_BODY), "{res}");

    running.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let config = ServerConfig { connection: ConnectionPolicy::KeepAlive, ..local() };
    let running = start(Server::new(config)).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    stream.write_all(b"GET /healthz HTTP/1.1\r\nhost: test\r\n\r\n").await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    while !buf.ends_with(b"\r\n\r\nok") {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the response arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
    let res = String::from_utf8(buf).unwrap();
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(!res.contains("connection: close"), "{res}");

    // The client keeps the socket open; stopping must not wait on it.
    let _ = running.stop.send(());
    tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .expect("server did not stop while a keep-alive connection was idle")
        .unwrap()
        .unwrap();

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}
