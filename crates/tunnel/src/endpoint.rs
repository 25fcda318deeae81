use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// A validated host/port pair: either a proxy hop or the final origin in a
/// tunnel chain. Grounded in `types::agent::Target`'s `TryFrom<&str>`/
/// `Display` pair, but collapsed to a single variant since this crate never
/// needs the unix-socket case `Target` carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
	host: String,
	port: u16,
}

impl Endpoint {
	/// Validates `host` and `port` against the rules in the data model:
	/// non-empty host, non-zero port, and a host that would round-trip
	/// through a standard URL authority parser. IPv6 literals must carry
	/// their brackets; a bare `::1` is rejected the same way an authority
	/// parser would reject it outside of brackets.
	pub fn new(host: impl Into<String>, port: u16) -> Result<Self, crate::error::TunnelError> {
		let host = host.into();
		if host.is_empty() || port == 0 {
			return Err(crate::error::TunnelError::InvalidEndpoint { host, port });
		}
		if let Some(inner) = host.strip_prefix('[') {
			let Some(inner) = inner.strip_suffix(']') else {
				return Err(crate::error::TunnelError::InvalidEndpoint { host, port });
			};
			if inner.parse::<Ipv6Addr>().is_err() {
				return Err(crate::error::TunnelError::InvalidEndpoint { host, port });
			}
		} else if host.contains(':') {
			// A bare IPv6 literal or any other colon-bearing token is not a
			// valid unbracketed authority host.
			return Err(crate::error::TunnelError::InvalidEndpoint { host, port });
		} else if url::Host::parse(&host).is_err() {
			return Err(crate::error::TunnelError::InvalidEndpoint { host, port });
		}
		Ok(Endpoint { host, port })
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> u16 {
		self.port
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.host, self.port)
	}
}

/// Parses `host[:port]`, defaulting the port to `default_port` when no
/// explicit port is present. A token that fails to parse as a port (e.g. a
/// trailing empty or non-numeric suffix) is treated entirely as the host,
/// matching the authority-parsing rule used by the synthetic URL decoder.
pub fn parse_authority(
	s: &str,
	default_port: u16,
) -> Result<Endpoint, crate::error::TunnelError> {
	if let Some(rest) = s.strip_prefix('[') {
		let Some(bracket_end) = rest.find(']') else {
			return Err(crate::error::TunnelError::InvalidEndpoint {
				host: s.to_string(),
				port: default_port,
			});
		};
		let host = &s[..bracket_end + 2];
		let remainder = &rest[bracket_end + 1..];
		let port = if remainder.is_empty() {
			default_port
		} else if let Some(port_str) = remainder.strip_prefix(':') {
			port_str.parse().map_err(|_| crate::error::TunnelError::InvalidEndpoint {
				host: s.to_string(),
				port: default_port,
			})?
		} else {
			return Err(crate::error::TunnelError::InvalidEndpoint {
				host: s.to_string(),
				port: default_port,
			});
		};
		return Endpoint::new(host, port);
	}

	match s.rsplit_once(':') {
		Some((host, port_str)) if port_str.parse::<u16>().is_ok_and(|p| p > 0) => {
			Endpoint::new(host, port_str.parse().unwrap())
		},
		_ => Endpoint::new(s, default_port),
	}
}

impl FromStr for Endpoint {
	type Err = crate::error::TunnelError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_authority(s, 443)
	}
}
