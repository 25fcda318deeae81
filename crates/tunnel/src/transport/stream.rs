use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{self, AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// The read-to-end-of-stream cap applied when draining a final HTTP
/// response body. Bodies larger than this are out of scope (see
/// Non-goals: unbounded body streaming).
pub const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// A single hop in the tunnel's layered transport: raw TCP, or a TLS
/// session wrapped around whatever the current top of the stack is.
/// `AsyncRead`/`AsyncWrite` plus `Poll::Pending` supply the readiness-based
/// event model a hand-rolled delegate/event-loop byte stream would
/// otherwise need to provide, so no separate event-loop layer sits on top.
/// Trimmed down to the two transport variants this crate's Non-goals leave
/// in play plus an in-memory variant for tests.
pub struct Socket(SocketType);

pub(crate) enum SocketType {
	Tcp(TcpStream),
	Tls(Box<TlsStream<Box<SocketType>>>),
	Memory(tokio::io::DuplexStream),
}

impl Socket {
	pub fn from_tcp(stream: TcpStream) -> Self {
		Socket(SocketType::Tcp(stream))
	}

	pub fn from_memory(stream: tokio::io::DuplexStream) -> Self {
		Socket(SocketType::Memory(stream))
	}

	/// Wraps a freshly completed TLS client session as the new top of the
	/// stack. The inner stream is boxed so `SocketType::Tls` can recurse
	/// into another `SocketType` without an infinitely-sized enum -- the
	/// same trick `transport/stream.rs` uses (`TlsStream<Box<SocketType>>>`).
	pub(crate) fn from_tls(tls: TlsStream<Box<SocketType>>) -> Self {
		Socket(SocketType::Tls(Box::new(tls)))
	}

	pub(crate) fn into_boxed_inner(self) -> Box<SocketType> {
		Box::new(self.0)
	}
}

impl AsyncRead for SocketType {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		match self.get_mut() {
			SocketType::Tcp(s) => Pin::new(s).poll_read(cx, buf),
			SocketType::Tls(s) => Pin::new(s).poll_read(cx, buf),
			SocketType::Memory(s) => Pin::new(s).poll_read(cx, buf),
		}
	}
}

impl AsyncWrite for SocketType {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		match self.get_mut() {
			SocketType::Tcp(s) => Pin::new(s).poll_write(cx, buf),
			SocketType::Tls(s) => Pin::new(s).poll_write(cx, buf),
			SocketType::Memory(s) => Pin::new(s).poll_write(cx, buf),
		}
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		match self.get_mut() {
			SocketType::Tcp(s) => Pin::new(s).poll_flush(cx),
			SocketType::Tls(s) => Pin::new(s).poll_flush(cx),
			SocketType::Memory(s) => Pin::new(s).poll_flush(cx),
		}
	}

	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		match self.get_mut() {
			SocketType::Tcp(s) => Pin::new(s).poll_shutdown(cx),
			SocketType::Tls(s) => Pin::new(s).poll_shutdown(cx),
			SocketType::Memory(s) => Pin::new(s).poll_shutdown(cx),
		}
	}
}

impl AsyncRead for Socket {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
	}
}

impl AsyncWrite for Socket {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.get_mut().0).poll_flush(cx)
	}

	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.get_mut().0).poll_shutdown(cx)
	}
}
