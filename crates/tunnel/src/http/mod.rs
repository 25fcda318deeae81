//! A tiny hand-rolled HTTP/1.1 request/response codec: arbitrary method, an
//! ordered header list, a body treated as a single in-memory blob (no
//! chunked transfer-encoding, no streaming -- out of scope), and a
//! status-line/header-block parser.

mod message;

pub use message::{HeaderList, HttpRequest, HttpResponse, Method, StatusCategory};
