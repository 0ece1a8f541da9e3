//! edgemesh management-plane reactor
//!
//! A fixed pool of connection slots serves HTTP-style management clients
//! over TCP or a local Unix socket. One event loop drives the whole
//! pool: wait for readiness, process the batch, answer the slots that
//! hold a complete request, reap idle connections.
//!
//! Framing stops at what management traffic needs - a `CRLFCRLF` header
//! terminator plus an optional `Content-Length` body - so this is not a
//! general HTTP server.

pub mod config;
pub mod error;
mod listener;
pub mod pool;
pub mod slot;

pub use config::MgmtConfig;
pub use error::{MgmtError, MgmtResult};
pub use pool::{ReadyEvents, SlotPool, MAX_LISTENERS};
pub use slot::{Slot, SlotState};
