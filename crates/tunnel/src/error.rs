use crate::endpoint::Endpoint;

/// Every failure this crate can surface from its public API.
///
/// Mirrors the `ProxyError`/`transport::tls::Error` convention: one
/// `thiserror` variant per failure category, carrying whatever data the
/// caller needs to act on it rather than collapsing everything into a
/// single opaque string.
#[derive(thiserror::Error, Debug)]
pub enum TunnelError {
	#[error("input is not a recognized tunnel URL")]
	NotOurs,

	#[error("malformed synthetic tunnel URL: {0}")]
	MalformedUrl(String),

	#[error("proxy chain specifies too few hops for the number of layers in the scheme")]
	TooFewProxies,

	#[error("incorrect proxy specification: {0:?}")]
	IncorrectProxySpecification(String),

	#[error("invalid endpoint: host={host:?} port={port}")]
	InvalidEndpoint { host: String, port: u16 },

	#[error("request is invalid: {0}")]
	InvalidRequest(String),

	#[error("failed to connect to {endpoint}: {source}")]
	ConnectFailed {
		endpoint: Endpoint,
		#[source]
		source: std::io::Error,
	},

	#[error("tls handshake with {endpoint} failed: {source}")]
	TlsHandshakeFailed {
		endpoint: Endpoint,
		#[source]
		source: std::io::Error,
	},

	#[error("certificate presented by {endpoint} did not match the pinned certificate")]
	CertificatePinMismatch { endpoint: Endpoint },

	#[error("writing to {endpoint} failed after {bytes_written} bytes: {source}")]
	WriteFailed {
		endpoint: Endpoint,
		bytes_written: usize,
		#[source]
		source: std::io::Error,
	},

	#[error("reading from {endpoint} failed after {bytes_processed} bytes: {source}")]
	ReadFailed {
		endpoint: Endpoint,
		bytes_processed: usize,
		#[source]
		source: std::io::Error,
	},

	#[error("connection to {endpoint} closed before a complete response arrived")]
	ConnectionClosedEarly { endpoint: Endpoint },

	#[error("malformed HTTP message: {0}")]
	MalformedMessage(String),

	#[error("proxy {proxy} rejected the tunnel request: {status} {description}")]
	UnexpectedResponse {
		proxy: Endpoint,
		status: u16,
		description: String,
	},

	#[error("internal invariant violated: {0}")]
	Internal(#[from] anyhow::Error),
}
