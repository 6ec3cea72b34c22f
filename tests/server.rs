use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use httpbin::middleware::Observation;
use httpbin::{Config, HttpBin, Server};

async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn serves_over_tcp_and_drains_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (observed_tx, mut observed_rx) = tokio::sync::mpsc::unbounded_channel();
    let config = Config::default().observer(Arc::new(move |o: &Observation| {
        let _ = observed_tx.send(o.status);
    }));

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::from_listener(listener).serve_with_shutdown(HttpBin::new(config).pipeline(), async {
            let _ = stopped.await;
        }),
    );

    let reply = roundtrip(
        addr,
        "GET /get?who=tcp HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
    assert!(reply.contains(r#""who":"tcp""#), "{reply}");
    assert!(reply.contains(r#""origin":"127.0.0.1""#), "{reply}");

    let reply = roundtrip(
        addr,
        "GET /stream/3 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(reply.contains("transfer-encoding: chunked"), "{reply}");
    assert_eq!(reply.matches(r#""id":"#).count(), 3, "{reply}");

    assert_eq!(observed_rx.recv().await, Some(http::StatusCode::OK));
    assert_eq!(observed_rx.recv().await, Some(http::StatusCode::OK));

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn idle_keep_alive_connections_do_not_hold_up_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::from_listener(listener).serve_with_shutdown(HttpBin::new(Config::default()).pipeline(), async {
            let _ = stopped.await;
        }),
    );

    // One request, then the client leaves the connection open and idle.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /ip HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
    let mut reply = Vec::new();
    let mut buf = [0u8; 1024];
    while !reply.ends_with(b"}") {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before the response");
        reply.extend_from_slice(&buf[..n]);
    }

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("shutdown waited on an idle connection")
        .unwrap()
        .unwrap();

    // The server closed its end.
    assert!(matches!(stream.read(&mut buf).await, Ok(0) | Err(_)));
}

#[tokio::test]
async fn invalid_bind_address_is_an_error() {
    let result = Server::bind("not an address")
        .serve_with_shutdown(HttpBin::new(Config::default()).pipeline(), async {})
        .await;
    assert!(matches!(result, Err(httpbin::Error::Addr { .. })));
}
