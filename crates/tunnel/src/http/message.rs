use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::endpoint::Endpoint;
use crate::error::TunnelError;

/// HTTP/1.1 methods this crate composes or parses. Only the verbs the
/// tunnel orchestrator and its callers actually need; there is no value in
/// an exhaustive method registry for a client that never proxies arbitrary
/// traffic on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Connect,
	Delete,
	Get,
	Head,
	Options,
	Post,
	Put,
	Trace,
}

impl Method {
	fn as_str(self) -> &'static str {
		match self {
			Method::Connect => "CONNECT",
			Method::Delete => "DELETE",
			Method::Get => "GET",
			Method::Head => "HEAD",
			Method::Options => "OPTIONS",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Trace => "TRACE",
		}
	}
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Method {
	type Err = TunnelError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"CONNECT" => Method::Connect,
			"DELETE" => Method::Delete,
			"GET" => Method::Get,
			"HEAD" => Method::Head,
			"OPTIONS" => Method::Options,
			"POST" => Method::Post,
			"PUT" => Method::Put,
			"TRACE" => Method::Trace,
			other => return Err(TunnelError::MalformedMessage(format!("unknown method {other:?}"))),
		})
	}
}

/// An ordered list of header name/value pairs. Insertion order is
/// preserved on the wire; lookups are case-insensitive, matching real
/// HTTP/1.1 field-name semantics, even though the storage itself keeps
/// whatever case the caller supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.0.push((name.into(), value.into()));
	}

	pub fn contains(&self, name: &str) -> bool {
		self.0.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self
			.0
			.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

impl FromIterator<(String, String)> for HeaderList {
	fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
		HeaderList(iter.into_iter().collect())
	}
}

/// A composable HTTP/1.1 request. The body is always a single in-memory
/// blob -- there is no chunked transfer-encoding and no streaming, matching
/// this crate's one-shot, non-persistent connection model.
#[derive(Debug, Clone)]
pub struct HttpRequest {
	pub method: Method,
	/// The request-target as it appears on the wire: an origin-form path
	/// (`/index.html`), an authority-form target for `CONNECT`
	/// (`example.com:443`), or `*` for `OPTIONS`.
	pub request_target: String,
	/// The authority used to fill in a missing `Host` header.
	pub authority: String,
	pub headers: HeaderList,
	pub body: Bytes,
}

impl HttpRequest {
	/// Builds a request, enforcing the invariants spec.md requires:
	/// `CONNECT` and `OPTIONS` always need an explicit request-target
	/// (there is no path to derive one from), and `CONNECT`/`HEAD` requests
	/// never carry a body.
	pub fn new(
		method: Method,
		request_target: impl Into<String>,
		authority: impl Into<String>,
		headers: HeaderList,
		body: Bytes,
	) -> Result<Self, TunnelError> {
		let request_target = request_target.into();
		if matches!(method, Method::Connect | Method::Head) && !body.is_empty() {
			return Err(TunnelError::InvalidRequest(format!(
				"{method} requests must not carry a body"
			)));
		}
		if matches!(method, Method::Connect | Method::Options) && request_target.is_empty() {
			return Err(TunnelError::InvalidRequest(format!(
				"{method} requests require an explicit request-target"
			)));
		}
		Ok(HttpRequest {
			method,
			request_target,
			authority: authority.into(),
			headers,
			body,
		})
	}

	/// A `CONNECT` request tunneling to `target` through `proxy`, matching
	/// the composer in `client/connect_tunnel.rs` (`CONNECT {dest} HTTP/1.1`)
	/// generalized to carry caller-supplied extra headers. `Host` is
	/// injected from the proxy's bare host, not the target's -- the CONNECT
	/// request is addressed to the proxy, so its `Host` header names the
	/// proxy, while the request-target names the tunnel's destination.
	pub fn connect(target: &Endpoint, proxy: &Endpoint, extra_headers: HeaderList) -> Self {
		HttpRequest {
			method: Method::Connect,
			request_target: target.to_string(),
			authority: proxy.host().to_string(),
			headers: extra_headers,
			body: Bytes::new(),
		}
	}

	/// Serializes the request to wire bytes. `Host` is injected from
	/// `authority` if the caller didn't supply one; `Content-Length` is
	/// injected if the body is non-empty and the caller didn't supply one.
	/// Both injected headers land right after the caller's first header (or
	/// at the front, if the caller supplied none) -- matching the literal
	/// compose examples, which interleave the injected `Host` between the
	/// caller's first and second header rather than appending it at the end.
	pub fn compose(&self) -> Bytes {
		let mut out = format!("{} {} HTTP/1.1\r\n", self.method, self.request_target).into_bytes();

		let mut injected = Vec::new();
		if !self.headers.contains("Host") {
			injected.push(format!("Host: {}\r\n", self.authority));
		}
		if !self.body.is_empty() && !self.headers.contains("Content-Length") {
			injected.push(format!("Content-Length: {}\r\n", self.body.len()));
		}

		let mut caller_headers = self.headers.iter();
		if let Some((name, value)) = caller_headers.next() {
			out.extend_from_slice(name.as_bytes());
			out.extend_from_slice(b": ");
			out.extend_from_slice(value.as_bytes());
			out.extend_from_slice(b"\r\n");
			for line in &injected {
				out.extend_from_slice(line.as_bytes());
			}
			for (name, value) in caller_headers {
				out.extend_from_slice(name.as_bytes());
				out.extend_from_slice(b": ");
				out.extend_from_slice(value.as_bytes());
				out.extend_from_slice(b"\r\n");
			}
		} else {
			for line in &injected {
				out.extend_from_slice(line.as_bytes());
			}
		}

		out.extend_from_slice(b"\r\n");
		out.extend_from_slice(&self.body);
		Bytes::from(out)
	}
}

/// The five informal/success/redirection/client-error/server-error status
/// buckets, derived from the numeric code's leading digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
	Informational,
	Success,
	Redirection,
	ClientError,
	ServerError,
}

impl StatusCategory {
	fn from_code(code: u16) -> Option<Self> {
		match code / 100 {
			1 => Some(StatusCategory::Informational),
			2 => Some(StatusCategory::Success),
			3 => Some(StatusCategory::Redirection),
			4 => Some(StatusCategory::ClientError),
			5 => Some(StatusCategory::ServerError),
			_ => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
	pub status: u16,
	pub reason: String,
	pub headers: HeaderList,
	pub body: Option<Bytes>,
}

impl HttpResponse {
	pub fn category(&self) -> Option<StatusCategory> {
		StatusCategory::from_code(self.status)
	}

	pub fn is_success(&self) -> bool {
		matches!(self.category(), Some(StatusCategory::Success))
	}

	/// Parses a full HTTP/1.1 response: status line, header block, and
	/// whatever bytes remain as the body (bodies are never chunked or
	/// length-negotiated beyond "whatever's left in the buffer" -- callers
	/// read to end-of-stream or to the end of a CONNECT response's header
	/// block before calling this).
	///
	/// A non-numeric status code is rejected rather than silently coerced
	/// to 200; see DESIGN.md's Open Question decisions for why this
	/// deviates from treating every recognized status as a fixed enum.
	pub fn parse(bytes: &[u8]) -> Result<Self, TunnelError> {
		let text_boundary = find(bytes, b"\r\n\r\n")
			.ok_or_else(|| TunnelError::MalformedMessage("no terminating blank line".into()))?;
		let head = std::str::from_utf8(&bytes[..text_boundary])
			.map_err(|_| TunnelError::MalformedMessage("header block is not valid utf-8".into()))?;
		let mut lines = head.split("\r\n");
		let status_line = lines
			.next()
			.ok_or_else(|| TunnelError::MalformedMessage("missing status line".into()))?;

		let mut parts = status_line.splitn(3, ' ');
		let version = parts
			.next()
			.ok_or_else(|| TunnelError::MalformedMessage("missing HTTP version".into()))?;
		if !version.starts_with("HTTP/") {
			return Err(TunnelError::MalformedMessage(format!(
				"not an HTTP status line: {status_line:?}"
			)));
		}
		let code_str = parts
			.next()
			.ok_or_else(|| TunnelError::MalformedMessage("missing status code".into()))?;
		let status: u16 = code_str
			.parse()
			.map_err(|_| TunnelError::MalformedMessage(format!("non-numeric status code {code_str:?}")))?;
		if !(100..=599).contains(&status) {
			return Err(TunnelError::MalformedMessage(format!(
				"status code out of range: {status}"
			)));
		}
		let reason = parts.next().unwrap_or("").to_string();

		let mut headers = HeaderList::new();
		for line in lines {
			if line.is_empty() {
				continue;
			}
			let (name, value) = line
				.split_once(':')
				.ok_or_else(|| TunnelError::MalformedMessage(format!("malformed header line {line:?}")))?;
			headers.push(name.trim(), value.trim());
		}

		let rest = &bytes[text_boundary + 4..];
		let body = if rest.is_empty() {
			None
		} else {
			Some(Bytes::copy_from_slice(rest))
		};

		Ok(HttpResponse {
			status,
			reason,
			headers,
			body,
		})
	}
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack
		.windows(needle.len())
		.position(|window| window == needle)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn compose_head_request_injects_host() {
		let mut headers = HeaderList::new();
		headers.push("X-Test", "foobar");
		headers.push("X-Foo", "Bar");
		let req = HttpRequest::new(Method::Head, "/", "example.com", headers, Bytes::new()).unwrap();
		let composed = String::from_utf8(req.compose().to_vec()).unwrap();
		assert!(composed.starts_with("HEAD / HTTP/1.1\r\n"));
		assert!(composed.contains("Host: example.com\r\n"));
		assert!(composed.ends_with("\r\n\r\n"));
	}

	#[test]
	fn compose_respects_caller_supplied_host() {
		let mut headers = HeaderList::new();
		headers.push("Host", "caller-supplied.example");
		let req = HttpRequest::new(Method::Get, "/", "example.com", headers, Bytes::new()).unwrap();
		let composed = String::from_utf8(req.compose().to_vec()).unwrap();
		assert_eq!(composed.matches("Host:").count(), 1);
		assert!(composed.contains("Host: caller-supplied.example"));
	}

	#[test]
	fn compose_injects_content_length_for_nonempty_body() {
		let req = HttpRequest::new(
			Method::Post,
			"/submit",
			"example.com",
			HeaderList::new(),
			Bytes::from_static(b"hello"),
		)
		.unwrap();
		let composed = String::from_utf8(req.compose().to_vec()).unwrap();
		assert!(composed.contains("Content-Length: 5\r\n"));
		assert!(composed.ends_with("hello"));
	}

	#[test]
	fn connect_and_options_require_explicit_request_target() {
		assert!(
			HttpRequest::new(Method::Connect, "", "example.com", HeaderList::new(), Bytes::new()).is_err()
		);
		assert!(
			HttpRequest::new(Method::Options, "", "example.com", HeaderList::new(), Bytes::new()).is_err()
		);
	}

	#[test]
	fn connect_and_head_reject_bodies() {
		assert!(
			HttpRequest::new(
				Method::Connect,
				"example.com:443",
				"example.com:443",
				HeaderList::new(),
				Bytes::from_static(b"nope")
			)
			.is_err()
		);
	}

	#[test]
	fn compose_interleaves_injected_host_between_caller_headers() {
		let mut headers = HeaderList::new();
		headers.push("X-Test", "foobar");
		headers.push("X-Foo", "Bar");
		let req = HttpRequest::new(Method::Head, "/", "example.com", headers, Bytes::new()).unwrap();
		assert_eq!(
			req.compose(),
			Bytes::from_static(b"HEAD / HTTP/1.1\r\nX-Test: foobar\r\nHost: example.com\r\nX-Foo: Bar\r\n\r\n")
		);
	}

	#[test]
	fn compose_connect_interleaves_injected_host_between_caller_headers() {
		let target = Endpoint::new("example.com", 80).unwrap();
		let proxy = Endpoint::new("localhost", 8888).unwrap();
		let mut headers = HeaderList::new();
		headers.push("X-Test", "foobar");
		headers.push("X-Foo", "Bar");
		let req = HttpRequest::connect(&target, &proxy, headers);
		assert_eq!(
			req.compose(),
			Bytes::from_static(
				b"CONNECT example.com:80 HTTP/1.1\r\nX-Test: foobar\r\nHost: localhost\r\nX-Foo: Bar\r\n\r\n"
			)
		);
	}

	#[test]
	fn connect_factory_addresses_proxy_but_targets_destination() {
		// Matches spec example 2: target=example.com:80, proxy=localhost:8888
		// composes to "CONNECT example.com:80 HTTP/1.1\r\n...Host: localhost\r\n...".
		let target = Endpoint::new("example.com", 80).unwrap();
		let proxy = Endpoint::new("localhost", 8888).unwrap();
		let req = HttpRequest::connect(&target, &proxy, HeaderList::new());
		let composed = String::from_utf8(req.compose().to_vec()).unwrap();
		assert!(composed.starts_with("CONNECT example.com:80 HTTP/1.1\r\n"));
		assert!(composed.contains("Host: localhost\r\n"));
		assert!(!composed.contains("Host: localhost:8888"));
	}

	#[test]
	fn parse_status_line_and_headers() {
		let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
		let resp = HttpResponse::parse(raw).unwrap();
		assert_eq!(resp.status, 200);
		assert_eq!(resp.reason, "OK");
		assert_eq!(resp.headers.get("Content-Length"), Some("2"));
		assert_eq!(resp.body.as_deref(), Some(&b"ok"[..]));
		assert!(resp.is_success());
	}

	#[test]
	fn parse_rejects_non_numeric_status() {
		let raw = b"HTTP/1.1 OK Whatever\r\n\r\n";
		assert!(HttpResponse::parse(raw).is_err());
	}

	#[test]
	fn parse_connect_response_without_body() {
		let raw = b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n";
		let resp = HttpResponse::parse(raw).unwrap();
		assert_eq!(resp.status, 407);
		assert!(resp.body.is_none());
	}
}
