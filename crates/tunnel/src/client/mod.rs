use std::sync::Arc;

use bytes::Bytes;
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;
use tracing::{Level, event};

use crate::endpoint::Endpoint;
use crate::error::TunnelError;
use crate::http::{HeaderList, HttpRequest, HttpResponse, Method};
use crate::orchestrator::Orchestrator;
use crate::transport::pin::PinStore;
use crate::transport::tls;
use crate::url_scheme::{SchemeOutcome, parse_synthetic_url};

/// Cheap-to-clone, immutable shared configuration for issuing tunneled
/// requests. Mirrors `client::Client`'s split between a long-lived handle
/// and a per-call `Connector`: constructing a `TunnelClient` builds the
/// `rustls::ClientConfig` once, and `issue_request` spins up a fresh
/// `Orchestrator` per call since a tunnel connection is never reused (see
/// Non-goals: persistent connections).
#[derive(Clone)]
pub struct TunnelClient {
	tls_config: Arc<ClientConfig>,
}

/// Configures pinning and trust roots for a `TunnelClient`. `roots` falls
/// back to the platform's native trust store when left unset.
#[derive(Default)]
pub struct TunnelClientBuilder {
	roots: Option<RootCertStore>,
	pins: PinStore,
}

impl TunnelClientBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_roots(mut self, roots: RootCertStore) -> Self {
		self.roots = Some(roots);
		self
	}

	pub fn pin(mut self, host: impl Into<String>, cert: &CertificateDer<'_>) -> Self {
		self.pins.pin(host, cert);
		self
	}

	pub fn build(self) -> Result<TunnelClient, TunnelError> {
		let tls_config = tls::client_config(self.roots, Arc::new(self.pins))?;
		Ok(TunnelClient { tls_config })
	}
}

impl TunnelClient {
	pub fn builder() -> TunnelClientBuilder {
		TunnelClientBuilder::new()
	}

	/// Decodes `url` as a synthetic tunnel URL, builds the proxy chain it
	/// describes, and issues `method`/`headers`/`body` as the final request
	/// to the inner target. Returns `TunnelError::NotOurs` for any input
	/// that doesn't match one of the `http` + 2-or-more-`s` schemes.
	pub async fn issue_request(
		&self,
		url: &str,
		method: Method,
		headers: HeaderList,
		body: Bytes,
	) -> Result<HttpResponse, TunnelError> {
		let chain = match parse_synthetic_url(url)? {
			SchemeOutcome::NotOurs => return Err(TunnelError::NotOurs),
			SchemeOutcome::Parsed(chain) => chain,
		};

		let origin_host = chain
			.inner_url
			.host_str()
			.ok_or_else(|| TunnelError::MalformedUrl(url.to_string()))?;
		let origin = Endpoint::new(origin_host, chain.inner_url.port().unwrap_or(443))?;

		let mut targets = chain.proxies;
		targets.push(origin.clone());

		let mut path = chain.inner_url.path().to_string();
		if let Some(query) = chain.inner_url.query() {
			path.push('?');
			path.push_str(query);
		}
		let request = HttpRequest::new(method, path, origin.to_string(), headers, body)?;

		event!(
			target: "tunnel request",
			parent: None,
			Level::DEBUG,
			hops = targets.len(),
			origin = %origin,
			"issuing tunneled request"
		);

		let mut orchestrator = Orchestrator::new(targets, self.tls_config.clone())?;
		orchestrator.run(request).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_defaults_to_native_roots() {
		let client = TunnelClient::builder().build();
		assert!(client.is_ok());
	}

	#[tokio::test]
	async fn issue_request_rejects_non_tunnel_urls() {
		let client = TunnelClient::builder().build().unwrap();
		let err = client
			.issue_request("https://example.com", Method::Get, HeaderList::new(), Bytes::new())
			.await
			.unwrap_err();
		assert!(matches!(err, TunnelError::NotOurs));
	}
}
