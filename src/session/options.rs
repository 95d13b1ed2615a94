//! Types defining the different options when opening a session.

use super::Session;
use crate::{
    backend::{Backend, Serial},
    error::Error,
    reply::Decoding,
};
use serialport as sp;
use std::time::Duration;

/// Options for configuring and opening a serial session.
///
/// ## Example
///
/// ```rust
/// # use pcproto::{Decoding, OpenSerialOptions};
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = OpenSerialOptions::new()
///     .timeout(Some(Duration::from_millis(200)))
///     .reply_timeout(Duration::from_secs(2))
///     .decoding(Decoding::Strict)
///     .open("/dev/ttyUSB0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenSerialOptions {
    /// The custom baud rate
    baud_rate: u32,
    /// The custom per-read timeout
    timeout: Option<Duration>,
    /// How long to wait for the end of a reply.
    reply_timeout: Duration,
    /// How undecodable reply bytes are handled.
    decoding: Decoding,
}

impl OpenSerialOptions {
    /// The baud rate of the controller: 115,200.
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    /// The default per-read timeout: 1 second.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
    /// The default reply timeout: 10 seconds.
    pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a blank set of options ready for configuration.
    ///
    /// The default baud rate, read timeout, and reply timeout are 115,200,
    /// 1 second, and 10 seconds, respectively. Replies are decoded with
    /// [`Decoding::Lossy`].
    ///
    /// Equivalent to [`default`](OpenSerialOptions::default).
    pub fn new() -> Self {
        OpenSerialOptions {
            baud_rate: OpenSerialOptions::DEFAULT_BAUD_RATE,
            timeout: Some(OpenSerialOptions::DEFAULT_TIMEOUT),
            reply_timeout: OpenSerialOptions::DEFAULT_REPLY_TIMEOUT,
            decoding: Decoding::default(),
        }
    }

    /// Set a custom baud rate.
    ///
    /// The default is 115,200.
    pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set a custom read timeout.
    ///
    /// This bounds a single read of the serial port. If duration is `None`,
    /// reads will block indefinitely. The default is 1 second.
    pub fn timeout(&mut self, duration: Option<Duration>) -> &mut Self {
        self.timeout = duration;
        self
    }

    /// Set how long a query waits for the end of its reply.
    ///
    /// The default is 10 seconds.
    pub fn reply_timeout(&mut self, duration: Duration) -> &mut Self {
        self.reply_timeout = duration;
        self
    }

    /// Set how bytes that are not valid UTF-8 are handled.
    ///
    /// The default is [`Decoding::Lossy`].
    pub fn decoding(&mut self, decoding: Decoding) -> &mut Self {
        self.decoding = decoding;
        self
    }

    /// Open a [`Serial`] port with the controller's framing at the specified path.
    fn open_serial_port(&self, path: &str) -> Result<Serial, Error> {
        // The baud rate passed to `new` is ignored by some platforms, so it is
        // set again with `baud_rate` below.
        let port = sp::new(path, OpenSerialOptions::DEFAULT_BAUD_RATE)
            .data_bits(sp::DataBits::Eight)
            .parity(sp::Parity::None)
            .flow_control(sp::FlowControl::None)
            .stop_bits(sp::StopBits::One)
            // The serialport API does not support infinite timeouts.
            .timeout(self.timeout.unwrap_or(Duration::MAX))
            .baud_rate(self.baud_rate)
            .open_native()
            .map(Serial)?;
        log::info!("opened {path} at {} baud", self.baud_rate);
        Ok(port)
    }

    /// Open the session at the specified path with the custom options.
    pub fn open<'a>(&self, path: &str) -> Result<Session<'a, Serial>, Error> {
        Ok(Session::from_backend(
            self.open_serial_port(path)?,
            self.reply_timeout,
            self.decoding,
        ))
    }

    /// Open the session at the specified path with the custom options.
    ///
    /// The type of the underlying backend is erased via dynamic dispatch,
    /// which does have runtime overhead. [`OpenSerialOptions::open`] should
    /// generally be used instead, except when the type of the underlying
    /// backend may not be known at compile time.
    pub fn open_dyn<'a>(&self, path: &str) -> Result<Session<'a, Box<dyn Backend>>, Error> {
        Ok(Session::from_backend(
            Box::new(self.open_serial_port(path)?),
            self.reply_timeout,
            self.decoding,
        ))
    }
}

impl Default for OpenSerialOptions {
    fn default() -> Self {
        OpenSerialOptions::new()
    }
}
