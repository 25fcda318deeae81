//! A tiny self-signed test CA, generalized from the certificate-generation
//! shape in `tests/common/hbone_server.rs`'s `generate_test_certs`: one CA
//! key pair signs one leaf certificate per hostname, instead of hardcoding a
//! single SPIFFE identity.

use std::time::{Duration, SystemTime};

use rcgen::{CertificateParams, DistinguishedName, DnType, Issuer, IsCa, KeyPair};
use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

pub struct IssuedCert {
	pub cert_der: CertificateDer<'static>,
	pub key_der: PrivateKeyDer<'static>,
}

pub struct TestCa {
	root_der: CertificateDer<'static>,
	ca_key: KeyPair,
	ca_params: CertificateParams,
}

impl TestCa {
	pub fn new() -> Self {
		let mut params = CertificateParams::default();
		params.is_ca = IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
		let mut dn = DistinguishedName::new();
		dn.push(DnType::CommonName, "nested-tunnel test CA");
		params.distinguished_name = dn;
		params.not_before = SystemTime::now().into();
		params.not_after = (SystemTime::now() + Duration::from_secs(3600)).into();

		let ca_key = KeyPair::generate().expect("generate CA key");
		let cert = params.clone().self_signed(&ca_key).expect("self-sign CA cert");

		TestCa {
			root_der: cert.der().clone(),
			ca_key,
			ca_params: params,
		}
	}

	pub fn root_store(&self) -> RootCertStore {
		let mut store = RootCertStore::empty();
		store.add(self.root_der.clone()).expect("add test root");
		store
	}

	/// Issues a leaf certificate with `hostname` as its sole SAN, signed by
	/// this CA.
	pub fn issue(&self, hostname: &str) -> IssuedCert {
		let mut params = CertificateParams::new(vec![hostname.to_string()]).expect("cert params");
		params.not_before = SystemTime::now().into();
		params.not_after = (SystemTime::now() + Duration::from_secs(3600)).into();

		let key = KeyPair::generate().expect("generate leaf key");
		let issuer = Issuer::from_params(&self.ca_params, &self.ca_key);
		let cert = params.signed_by(&key, &issuer).expect("sign leaf cert");

		IssuedCert {
			cert_der: cert.der().clone(),
			key_der: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
		}
	}
}
