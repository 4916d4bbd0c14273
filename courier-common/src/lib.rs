//! Types shared by every courier crate: the outbound message model, address
//! validation, the clock abstraction and the logging setup.

pub mod address;
pub mod clock;
pub mod error;
pub mod logging;
pub mod message;

pub use address::{Mailbox, is_valid_address};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ValidationError;
pub use message::{EmailPayload, Priority};
pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
