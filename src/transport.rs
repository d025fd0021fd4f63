//! Backend transport: framing, reconnection, non-blocking I/O

mod backoff;
mod codec;
mod connection;
mod dialer;

pub use backoff::{BackoffMode, BackoffPolicy, ConnectionState};
pub use codec::{encode_frame, FrameDecoder, FrameError, Framing};
pub use connection::{Transport, TransportError};
pub use dialer::{Dialer, TcpDialer};
