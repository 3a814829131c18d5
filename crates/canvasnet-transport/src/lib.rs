//! Non-blocking duplex byte-stream abstraction.
//!
//! The message queue never touches a socket directly. It talks to a
//! [`Transport`], which models a buffered, non-blocking stream:
//! - reads return whatever is pending (possibly nothing)
//! - writes may accept only part of what was offered
//! - write completion is signalled separately, from a [`WriteSource`]
//!
//! [`TcpTransport`] is the stock implementation over `std::net::TcpStream`.
//! [`MemoryTransport`] is a scriptable in-memory stream for simulations.

pub mod error;
pub mod memory;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use tcp::{TcpAcceptor, TcpTransport, DEFAULT_WRITE_CAPACITY};
pub use traits::{Transport, WriteSource};
