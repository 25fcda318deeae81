//! Cross-cutting concerns shared by the tunnel crates: nothing here knows
//! about HTTP, TLS, or proxy chains. It exists so `nested-tunnel` and
//! `tunnel-cli` bootstrap logging the same way instead of each rolling its
//! own `tracing_subscriber` setup.

pub mod testing;
