use std::collections::HashMap;

use rustls_pki_types::CertificateDer;

/// A host -> pinned-certificate-DER table. Generalizes
/// `transport::tls::insecure::NoVerifier`'s "accept unconditionally" and
/// `identity::IdentityVerifier`'s "match a SPIFFE identity" into the
/// simplest possible trust predicate this crate needs: an exact,
/// byte-for-byte match of the leaf certificate's DER encoding.
#[derive(Debug, Default, Clone)]
pub struct PinStore {
	pins: HashMap<String, Vec<u8>>,
}

impl PinStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Pins `host` to the exact DER bytes of `cert`. A host with no entry is
	/// left to ordinary chain/hostname verification.
	pub fn pin(&mut self, host: impl Into<String>, cert: &CertificateDer<'_>) {
		self.pins.insert(host.into(), cert.as_ref().to_vec());
	}

	pub fn is_empty(&self) -> bool {
		self.pins.is_empty()
	}

	/// A host with no pin entry is treated as matching -- pinning is
	/// opt-in per host, not a default-deny allowlist.
	pub fn matches(&self, host: &str, presented: &CertificateDer<'_>) -> bool {
		match self.pins.get(host) {
			Some(pinned) => pinned.as_slice() == presented.as_ref(),
			None => true,
		}
	}
}
