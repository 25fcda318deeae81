use std::fmt;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{
	CertificateError, ClientConfig, DigitallySignedStruct, OtherError, RootCertStore, SignatureScheme,
};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::TlsConnector;

use crate::endpoint::Endpoint;
use crate::error::TunnelError;
use crate::transport::pin::PinStore;
use crate::transport::stream::{Socket, SocketType};

/// Builds the rustls `ClientConfig` a tunnel layer's TLS session uses.
/// Trust falls back to the platform's native root store when no explicit
/// roots are supplied, mirroring `LocalBackendTLS`'s default. ALPN is left
/// unset -- this crate never negotiates HTTP/2 (see Non-goals), so
/// advertising `h2` would be actively misleading.
pub fn client_config(
	roots: Option<RootCertStore>,
	pins: Arc<PinStore>,
) -> Result<Arc<ClientConfig>, TunnelError> {
	let roots = roots.unwrap_or_else(|| {
		let mut store = RootCertStore::empty();
		for cert in rustls_native_certs::load_native_certs().certs {
			let _ = store.add(cert);
		}
		store
	});
	let roots = Arc::new(roots);

	let mut config = ClientConfig::builder()
		.with_root_certificates(roots.clone())
		.with_no_client_auth();
	if !pins.is_empty() {
		let default = WebPkiServerVerifier::builder(roots)
			.build()
			.map_err(|e| TunnelError::Internal(anyhow::anyhow!(e)))?;
		config
			.dangerous()
			.set_certificate_verifier(Arc::new(PinningVerifier { pins, default }));
	}
	Ok(Arc::new(config))
}

/// Performs the client-side TLS handshake for one tunnel layer: derives the
/// `ServerName` (IP literal vs DNS name) from `target`, same as
/// `client/tls.rs`, sets SNI to `target.host()`, and returns the
/// TLS-wrapped socket as the new top of the stack.
pub async fn handshake(
	socket: Socket,
	target: &Endpoint,
	config: Arc<ClientConfig>,
) -> Result<Socket, TunnelError> {
	let server_name = server_name_for(target)?;
	let connector = TlsConnector::from(config);
	let boxed: Box<SocketType> = socket.into_boxed_inner();
	let tls_stream = connector.connect(server_name, boxed).await.map_err(|source| {
		if is_pin_mismatch(&source) {
			TunnelError::CertificatePinMismatch {
				endpoint: target.clone(),
			}
		} else {
			TunnelError::TlsHandshakeFailed {
				endpoint: target.clone(),
				source,
			}
		}
	})?;
	Ok(Socket::from_tls(tls_stream))
}

/// Distinguishes a pinning rejection from an ordinary handshake failure by
/// downcasting through the `io::Error` tokio-rustls returns. rustls has no
/// verifier-specific error variant of its own, so `PinningVerifier` reports
/// mismatches via `CertificateError::Other`, the escape hatch rustls
/// provides for exactly this.
fn is_pin_mismatch(err: &std::io::Error) -> bool {
	let Some(rustls_err) = err.get_ref().and_then(|e| e.downcast_ref::<rustls::Error>()) else {
		return false;
	};
	matches!(
		rustls_err,
		rustls::Error::InvalidCertificate(CertificateError::Other(other))
			if other.0.downcast_ref::<PinMismatch>().is_some()
	)
}

#[derive(Debug)]
struct PinMismatch;

impl fmt::Display for PinMismatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("certificate did not match the pinned certificate")
	}
}

impl std::error::Error for PinMismatch {}

fn server_name_for(target: &Endpoint) -> Result<ServerName<'static>, TunnelError> {
	let host = target.host();
	let bare = host
		.strip_prefix('[')
		.and_then(|h| h.strip_suffix(']'))
		.unwrap_or(host);
	if let Ok(ip) = bare.parse::<std::net::IpAddr>() {
		return Ok(ServerName::IpAddress(ip.into()));
	}
	ServerName::try_from(host.to_string()).map_err(|_| TunnelError::InvalidEndpoint {
		host: host.to_string(),
		port: target.port(),
	})
}

/// Exact-DER-byte certificate pinning, generalized from
/// `transport::tls::insecure::NoVerifier`'s "skip the default verifier"
/// shape: unlike `NoVerifier`, the default WebPKI chain/hostname check
/// still runs for every host. Hosts with a pin entry additionally require
/// the leaf certificate to match the pinned DER bytes exactly -- pinning
/// narrows trust, it never replaces it.
#[derive(Debug)]
struct PinningVerifier {
	pins: Arc<PinStore>,
	default: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for PinningVerifier {
	fn verify_server_cert(
		&self,
		end_entity: &CertificateDer<'_>,
		intermediates: &[CertificateDer<'_>],
		server_name: &ServerName<'_>,
		ocsp_response: &[u8],
		now: UnixTime,
	) -> Result<ServerCertVerified, rustls::Error> {
		let verified =
			self
				.default
				.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;
		let host = match server_name {
			ServerName::DnsName(name) => name.as_ref().to_string(),
			ServerName::IpAddress(ip) => std::net::IpAddr::from(*ip).to_string(),
			_ => {
				return Err(rustls::Error::General(
					"unsupported server name variant".into(),
				));
			},
		};
		if self.pins.matches(&host, end_entity) {
			Ok(verified)
		} else {
			Err(rustls::Error::InvalidCertificate(CertificateError::Other(
				OtherError(Arc::new(PinMismatch)),
			)))
		}
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		self.default.verify_tls12_signature(message, cert, dss)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		self.default.verify_tls13_signature(message, cert, dss)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		self.default.supported_verify_schemes()
	}
}
