use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::endpoint::{Endpoint, parse_authority};
use crate::error::TunnelError;

static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^http(s{2,4})$").unwrap());

/// The decoded form of an `httpss://`-family URL: an ordered chain of proxy
/// endpoints to tunnel through, followed by the inner request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChain {
	pub proxies: Vec<Endpoint>,
	pub inner_url: Url,
}

/// The outcome of attempting to decode a string as a synthetic tunnel URL:
/// either it isn't one of ours (no scheme match, not even a URL), or it
/// decoded into a proxy chain and inner target.
#[derive(Debug)]
pub enum SchemeOutcome {
	NotOurs,
	Parsed(ParsedChain),
}

/// Decodes a synthetic `http` + N `s` scheme (`httpss`, `httpsss`,
/// `httpssss`, ...) into an ordered proxy chain plus the inner request URL.
///
/// Manual string splitting is used for the outer decode (rather than
/// handing the whole input to the `url` crate) because the scheme is
/// nonstandard -- `url` only special-cases `http`/`https`/etc, and we need
/// the raw, unparsed authority segments to split proxy hops apart before
/// any of them are individually validated.
pub fn parse_synthetic_url(input: &str) -> Result<SchemeOutcome, TunnelError> {
	let Some((scheme, rest)) = input.split_once("://") else {
		return Ok(SchemeOutcome::NotOurs);
	};
	let Some(caps) = SCHEME_RE.captures(scheme) else {
		return Ok(SchemeOutcome::NotOurs);
	};
	// "https" itself carries one 's'; every additional 's' beyond that adds
	// one proxy hop in front of the inner target.
	let proxy_count = caps[1].len() - 1;

	let parts: Vec<&str> = rest.split('/').collect();
	if parts.len() < proxy_count + 1 {
		return Err(TunnelError::TooFewProxies);
	}

	let mut proxies = Vec::with_capacity(proxy_count);
	for authority in &parts[..proxy_count] {
		let ep = parse_authority(authority, 443)
			.map_err(|_| TunnelError::IncorrectProxySpecification((*authority).to_string()))?;
		proxies.push(ep);
	}

	let inner_rest = parts[proxy_count..].join("/");
	let inner_str = format!("https://{inner_rest}");
	let inner_url = Url::parse(&inner_str)
		.map_err(|_| TunnelError::IncorrectProxySpecification(inner_str))?;

	Ok(SchemeOutcome::Parsed(ParsedChain { proxies, inner_url }))
}
