//! A simple but easy to use library for communicating with Piezo Concept
//! nanopositioning controllers.
//!
//! The controller speaks a line based ASCII protocol over a serial port. A
//! [`Session`] opens the port, formats command lines from typed arguments,
//! and reads back the lines of a reply until the line that ends it.
//!
//! ```rust
//! use pcproto::{Axis, Distance, PulseAt, Session, TtlMode, TtlPort};
//!
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::open_serial("/dev/ttyUSB0")?;
//!
//! // Fire-and-forget commands return as soon as the line is written.
//! session.move_x(Distance::um(10.0))?;
//! session.configure_ttl(
//!     TtlPort::try_from(1_u8)?,
//!     TtlMode::Output { axis: Axis::X, at: PulseAt::End },
//! )?;
//!
//! // Queries return every line of the reply.
//! let reply = session.position_x()?;
//! for line in reply.lines() {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Every line sent and received is logged at the `debug` level via the
//! [`log`] crate.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]

pub mod backend;
pub mod command;
pub mod error;
pub mod reply;
pub mod session;
pub mod timeout_guard;
pub mod ttl;
pub mod unit;

pub use command::{Arg, Command, CommandBuilder, Mnemonic};
pub use reply::{Decoding, EndOfReply, Reply, Terminator};
pub use session::{Direction, OpenSerialOptions, Session};
pub use ttl::{Axis, Edge, PulseAt, TtlMode, TtlPort};
pub use unit::{Distance, LengthUnit, Time, TimeUnit};
