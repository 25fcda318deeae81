use std::sync::Arc;

use rustls::ClientConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::endpoint::Endpoint;
use crate::error::TunnelError;
use crate::http::{HeaderList, HttpRequest, HttpResponse};
use crate::transport::stream::{MAX_RESPONSE_BYTES, Socket};
use crate::transport::tls;

/// Introspectable FSM state: a `step` corresponds to one CONNECT/TLS round,
/// and tests can assert the orchestrator passed through each state in
/// order. The actual I/O is driven with plain `async`/`.await` rather than
/// a hand-rolled event loop -- tokio's readiness polling already supplies
/// the "bytes available"/"space available" semantics a delegate-driven
/// event loop would otherwise need to hand-roll (see DESIGN.md), so
/// building a second event-loop layer on top would just be redundant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
	Inactive,
	ShouldEstablishTunnelConnection,
	ExpectTunnelConnectionEstablished,
	ShouldSendHttpRequest,
	ExpectHttpResponse,
}

/// Builds N stacked CONNECT+TLS layers and issues one HTTP request through
/// them. Generalizes `client/hbone_tunnel.rs`'s `handshake_double` (exactly
/// two concrete layers, one CONNECT, TLS stacked on an upgraded stream)
/// into the indexing contract that lets this crate support an arbitrary
/// number of proxy hops instead of a hardcoded two.
pub struct Orchestrator {
	targets: Vec<Endpoint>,
	tls_config: Arc<ClientConfig>,
	state: OrchestratorState,
	layer_count: usize,
}

impl Orchestrator {
	/// `targets` must have at least one element; the last is the origin,
	/// any preceding entries are proxies dialed in order.
	pub fn new(targets: Vec<Endpoint>, tls_config: Arc<ClientConfig>) -> Result<Self, TunnelError> {
		if targets.is_empty() {
			return Err(TunnelError::InvalidRequest(
				"a tunnel needs at least one target".into(),
			));
		}
		Ok(Orchestrator {
			targets,
			tls_config,
			state: OrchestratorState::Inactive,
			layer_count: 0,
		})
	}

	pub fn state(&self) -> OrchestratorState {
		self.state
	}

	/// The target index we're currently tunneled to. `layer_count` here
	/// counts completed TLS wraps only (the initial raw TCP connection is
	/// not one); the "currentLayer < 2 ? 0 : currentLayer - 1" branch the
	/// indexing contract describes collapses to the single case
	/// `layer_count - 1` once the raw TCP layer is folded in, since
	/// `current_target_idx`/`establish_tunnel_connection` are only ever
	/// called once at least one TLS layer exists (`layer_count >= 1`).
	fn current_target_idx(&self) -> usize {
		self.layer_count - 1
	}

	/// Drives the full tunnel build-out and issues `request` through it,
	/// returning the final response. One orchestrator handles exactly one
	/// request: there is no connection reuse across calls (see Non-goals:
	/// persistent connections).
	pub async fn run(&mut self, request: HttpRequest) -> Result<HttpResponse, TunnelError> {
		let first = &self.targets[0];
		let tcp = TcpStream::connect((first.host(), first.port()))
			.await
			.map_err(|source| TunnelError::ConnectFailed {
				endpoint: first.clone(),
				source,
			})?;
		self.drive(Socket::from_tcp(tcp), request).await
	}

	/// Drives the state machine once the first hop's raw transport is
	/// already connected. Split out of `run` so tests can hand it an
	/// in-memory transport instead of dialing real TCP.
	async fn drive(&mut self, mut socket: Socket, request: HttpRequest) -> Result<HttpResponse, TunnelError> {
		let first = self.targets[0].clone();
		socket = tls::handshake(socket, &first, self.tls_config.clone()).await?;
		self.layer_count = 1;
		self.state = self.state_after_wrapping();

		loop {
			match self.state {
				OrchestratorState::ShouldEstablishTunnelConnection => {
					socket = self.establish_tunnel_connection(socket).await?;
				},
				OrchestratorState::ExpectTunnelConnectionEstablished => {
					socket = self.expect_tunnel_connection_established(socket).await?;
				},
				OrchestratorState::ShouldSendHttpRequest => {
					socket = self.send_http_request(socket, &request).await?;
				},
				OrchestratorState::ExpectHttpResponse => {
					return self.expect_http_response(socket).await;
				},
				OrchestratorState::Inactive => {
					return Err(TunnelError::Internal(anyhow::anyhow!(
						"orchestrator re-entered Inactive state mid-run"
					)));
				},
			}
		}
	}

	fn state_after_wrapping(&self) -> OrchestratorState {
		if self.layer_count == self.targets.len() {
			OrchestratorState::ShouldSendHttpRequest
		} else {
			OrchestratorState::ShouldEstablishTunnelConnection
		}
	}

	async fn establish_tunnel_connection(&mut self, mut socket: Socket) -> Result<Socket, TunnelError> {
		let current = self.current_target_idx();
		let next = current + 1;
		let proxy = self.targets[current].clone();
		let next_target = self.targets[next].clone();

		tracing::debug!(proxy = %proxy, target = %next_target, "sending CONNECT");
		let connect_req = HttpRequest::connect(&next_target, &proxy, HeaderList::new());
		let bytes_written = write_all_tracked(&mut socket, &connect_req.compose(), &proxy).await?;
		debug_assert!(bytes_written > 0);

		self.state = OrchestratorState::ExpectTunnelConnectionEstablished;
		Ok(socket)
	}

	async fn expect_tunnel_connection_established(
		&mut self,
		mut socket: Socket,
	) -> Result<Socket, TunnelError> {
		let current = self.current_target_idx();
		let next = current + 1;
		let proxy = self.targets[current].clone();
		let next_target = self.targets[next].clone();

		let raw = read_until_double_crlf(&mut socket, &proxy).await?;
		let response = HttpResponse::parse(&raw)?;
		if !response.is_success() {
			return Err(TunnelError::UnexpectedResponse {
				proxy,
				status: response.status,
				description: response.reason,
			});
		}

		tracing::debug!(target = %next_target, "tunnel established, wrapping TLS");
		let socket = tls::handshake(socket, &next_target, self.tls_config.clone()).await?;
		self.layer_count += 1;
		self.state = self.state_after_wrapping();
		Ok(socket)
	}

	async fn send_http_request(
		&mut self,
		mut socket: Socket,
		request: &HttpRequest,
	) -> Result<Socket, TunnelError> {
		let origin = self.targets.last().expect("targets is non-empty").clone();
		write_all_tracked(&mut socket, &request.compose(), &origin).await?;
		self.state = OrchestratorState::ExpectHttpResponse;
		Ok(socket)
	}

	async fn expect_http_response(&mut self, mut socket: Socket) -> Result<HttpResponse, TunnelError> {
		let origin = self.targets.last().expect("targets is non-empty").clone();
		let raw = read_to_eof(&mut socket, &origin).await?;
		let response = HttpResponse::parse(&raw)?;
		self.state = OrchestratorState::Inactive;
		self.layer_count = 0;
		Ok(response)
	}
}

/// Writes `bytes` in a loop (rather than `AsyncWriteExt::write_all`) so that
/// a failure partway through can report how many bytes actually made it to
/// the wire before the error, matching `writingFailed(osCode,
/// bytesProcessedSoFar)`.
async fn write_all_tracked(
	socket: &mut Socket,
	bytes: &[u8],
	endpoint: &Endpoint,
) -> Result<usize, TunnelError> {
	let mut written = 0;
	while written < bytes.len() {
		let n = socket
			.write(&bytes[written..])
			.await
			.map_err(|source| TunnelError::WriteFailed {
				endpoint: endpoint.clone(),
				bytes_written: written,
				source,
			})?;
		written += n;
	}
	Ok(written)
}

/// Reads until the header block's terminating blank line appears. Used for
/// CONNECT responses, where the tunnel stays open afterward -- reading to
/// EOF here would hang forever waiting for a close that never comes.
async fn read_until_double_crlf(socket: &mut Socket, endpoint: &Endpoint) -> Result<Vec<u8>, TunnelError> {
	let mut buf = Vec::new();
	let mut chunk = [0u8; 8192];
	loop {
		if buf.windows(4).any(|w| w == b"\r\n\r\n") {
			return Ok(buf);
		}
		if buf.len() >= MAX_RESPONSE_BYTES {
			return Err(TunnelError::MalformedMessage(
				"CONNECT response exceeded the maximum header size".into(),
			));
		}
		let n = socket
			.read(&mut chunk)
			.await
			.map_err(|source| TunnelError::ReadFailed {
				endpoint: endpoint.clone(),
				bytes_processed: buf.len(),
				source,
			})?;
		if n == 0 {
			return Err(TunnelError::ConnectionClosedEarly {
				endpoint: endpoint.clone(),
			});
		}
		buf.extend_from_slice(&chunk[..n]);
	}
}

/// Reads until the stream closes. Used for the final response, which may
/// carry a body with no length framing beyond "read until the other side
/// hangs up" -- this crate never reuses the connection afterward (see
/// Non-goals: persistent connections), so reading to EOF is always correct
/// here, unlike for the intermediate CONNECT responses.
async fn read_to_eof(socket: &mut Socket, endpoint: &Endpoint) -> Result<Vec<u8>, TunnelError> {
	let mut buf = Vec::new();
	let mut chunk = [0u8; 8192];
	loop {
		if buf.len() >= MAX_RESPONSE_BYTES {
			return Err(TunnelError::MalformedMessage(
				"response exceeded the maximum buffered size".into(),
			));
		}
		let n = socket
			.read(&mut chunk)
			.await
			.map_err(|source| TunnelError::ReadFailed {
				endpoint: endpoint.clone(),
				bytes_processed: buf.len(),
				source,
			})?;
		if n == 0 {
			break;
		}
		buf.extend_from_slice(&chunk[..n]);
	}
	if buf.is_empty() {
		return Err(TunnelError::ConnectionClosedEarly {
			endpoint: endpoint.clone(),
		});
	}
	Ok(buf)
}
