//! Client-side tunneling over stacked HTTPS `CONNECT` layers.
//!
//! The public entry point is [`client::TunnelClient`]: build one with
//! [`client::TunnelClient::builder`], then call
//! [`client::TunnelClient::issue_request`] with a synthetic `httpss://`
//! (or `httpsss://`, `httpssss://`, ...) URL. [`url_scheme::parse_synthetic_url`]
//! and [`endpoint::Endpoint`] are exposed separately for callers that want
//! to inspect a proxy chain without issuing a request.

pub mod client;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod transport;
pub mod url_scheme;

pub use client::{TunnelClient, TunnelClientBuilder};
pub use endpoint::Endpoint;
pub use error::TunnelError;
pub use http::{HeaderList, HttpRequest, HttpResponse, Method};
pub use url_scheme::{ParsedChain, SchemeOutcome, parse_synthetic_url};
