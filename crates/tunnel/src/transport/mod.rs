pub mod pin;
pub mod stream;
pub mod tls;

pub use pin::PinStore;
pub use stream::Socket;
