//! Mock CONNECT-proxy and origin servers for exercising the tunnel
//! orchestrator end to end over real TCP loopback connections. Grounded in
//! `tests/common/hbone_server.rs`'s accept-loop/TLS-acceptor shape, trimmed
//! to plain TLS (no HBONE upgrade, no HTTP/2) and generalized so a proxy
//! forwards its tunnel raw rather than terminating it.

use std::sync::Arc;

use rustls::ServerConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use super::test_tls::IssuedCert;

fn server_config(cert: &IssuedCert) -> Arc<ServerConfig> {
	let config = ServerConfig::builder()
		.with_no_client_auth()
		.with_single_cert(vec![cert.cert_der.clone()], cert.key_der.clone_key())
		.expect("build server config");
	Arc::new(config)
}

/// Binds a TLS server on an OS-assigned loopback port that reads one HTTP
/// request (up to the blank line plus a `Content-Length` body, if any) and
/// writes back `response`. Handles exactly one connection, then exits.
pub async fn spawn_origin(cert: IssuedCert, response: &'static [u8]) -> u16 {
	let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let acceptor = TlsAcceptor::from(server_config(&cert));

	tokio::spawn(async move {
		let (tcp, _) = listener.accept().await.unwrap();
		let mut tls = acceptor.accept(tcp).await.unwrap();
		read_http_request(&mut tls).await;
		tls.write_all(response).await.unwrap();
		tls.shutdown().await.ok();
	});

	port
}

/// Binds a TLS server that speaks CONNECT: it accepts a TLS connection,
/// reads one `CONNECT host:port HTTP/1.1` request, replies
/// `200 Connection Established`, then forwards raw bytes bidirectionally to
/// `forward_to` for the rest of the connection's lifetime. This is what lets
/// the orchestrator's *next* TLS handshake pass through unmodified, the way
/// a real forward proxy's tunnel does.
pub async fn spawn_connect_proxy(cert: IssuedCert, forward_to: u16) -> u16 {
	let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let acceptor = TlsAcceptor::from(server_config(&cert));

	tokio::spawn(async move {
		let (tcp, _) = listener.accept().await.unwrap();
		let mut tls = acceptor.accept(tcp).await.unwrap();
		read_http_request(&mut tls).await;
		tls
			.write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
			.await
			.unwrap();

		let mut upstream = TcpStream::connect(("127.0.0.1", forward_to)).await.unwrap();
		tokio::io::copy_bidirectional(&mut tls, &mut upstream).await.ok();
	});

	port
}

/// Binds a TLS server that always answers a `CONNECT` with
/// `403 Forbidden` instead of establishing a tunnel.
pub async fn spawn_rejecting_proxy(cert: IssuedCert) -> u16 {
	let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let acceptor = TlsAcceptor::from(server_config(&cert));

	tokio::spawn(async move {
		let (tcp, _) = listener.accept().await.unwrap();
		let mut tls = acceptor.accept(tcp).await.unwrap();
		read_http_request(&mut tls).await;
		tls.write_all(b"HTTP/1.1 403 Forbidden\r\n\r\n").await.unwrap();
		tls.shutdown().await.ok();
	});

	port
}

async fn read_http_request<S: tokio::io::AsyncRead + Unpin>(stream: &mut S) {
	let mut buf = Vec::new();
	let mut chunk = [0u8; 4096];
	loop {
		let n = stream.read(&mut chunk).await.unwrap();
		buf.extend_from_slice(&chunk[..n]);
		if let Some(pos) = find(&buf, b"\r\n\r\n") {
			let head = std::str::from_utf8(&buf[..pos]).unwrap();
			let content_length: usize = head
				.lines()
				.find_map(|l| l.strip_prefix("Content-Length: "))
				.and_then(|v| v.trim().parse().ok())
				.unwrap_or(0);
			let have_body = buf.len() - (pos + 4);
			if have_body >= content_length {
				return;
			}
		}
	}
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack.windows(needle.len()).position(|w| w == needle)
}
