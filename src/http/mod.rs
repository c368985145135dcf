//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (accept loop, per-connection task)
//!     → head.rs + request.rs (read and parse the request head, limits)
//!     → [routing layer resolves the backend]
//!     → [tunnel layer hijacks and relays]
//!         → framing.rs (body length decisions, framed relay)
//!         → response.rs (backend response head, Connection: close)
//!
//! Plain HTTP listener in redirect mode:
//!     → redirect.rs (axum, 301 to https)
//! ```

pub mod framing;
pub mod head;
pub mod redirect;
pub mod request;
pub mod response;
pub mod server;

pub use framing::{BodyFraming, FramingError};
pub use request::{HeadLimits, InboundRequest, RequestError};
pub use response::{plain_response, ResponseHead};
pub use server::GatewayServer;
