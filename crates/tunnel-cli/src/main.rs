use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use nested_tunnel::{HeaderList, Method, TunnelClient};
use tracing_subscriber::EnvFilter;

/// Issues one HTTP request through a stacked `httpss://`-family tunnel URL
/// and prints the response to stdout. The only binary allowed to install a
/// tracing subscriber or own process-wide config in this workspace --
/// `nested-tunnel` itself stays a library.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
	/// A synthetic tunnel URL, e.g. httpsss://proxy1:443/proxy2:443/example.com/path
	url: String,

	/// HTTP method to issue.
	#[arg(short, long, default_value = "GET")]
	method: String,

	/// Extra header as "Name: Value", may be repeated.
	#[arg(short = 'H', long = "header")]
	headers: Vec<String>,

	/// Request body, sent as-is.
	#[arg(short, long)]
	body: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.init();

	let args = Args::parse();
	let method = Method::from_str(&args.method.to_uppercase()).context("unrecognized method")?;

	let mut headers = HeaderList::new();
	for raw in &args.headers {
		let (name, value) = raw
			.split_once(':')
			.with_context(|| format!("header {raw:?} is not in \"Name: Value\" form"))?;
		headers.push(name.trim(), value.trim());
	}
	let body = args.body.map(bytes::Bytes::from).unwrap_or_default();

	let client = TunnelClient::builder().build().context("failed to build tunnel client")?;
	let response = client.issue_request(&args.url, method, headers, body).await?;

	println!("HTTP/1.1 {} {}", response.status, response.reason);
	for (name, value) in response.headers.iter() {
		println!("{name}: {value}");
	}
	println!();
	if let Some(ref body) = response.body {
		print!("{}", String::from_utf8_lossy(&body));
	}

	if !response.is_success() {
		std::process::exit(1);
	}
	Ok(())
}
