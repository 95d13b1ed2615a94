//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! The [`Session`](crate::Session) APIs return the higher level [`Error`]
//! enum, which every error type converts into, so they compose with `?`:
//!
//! ```
//! use pcproto::error::{Error, InvalidArgumentError};
//!
//! fn foo() -> Result<(), InvalidArgumentError> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```
//!
//! Errors raised while reading a reply keep the lines that were read before
//! the failure, which are available via `lines()`:
//!
//! ```
//! # use pcproto::error::ReplyTimeoutError;
//! # fn wrapper(error: ReplyTimeoutError) {
//! for line in error.lines() {
//!     println!("{line}");
//! }
//! # }
//! ```

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
    (
        $name:path,
        $self:ident =>
        $display:literal
        $(,
            $($arg:expr),+
        )?
    ) => {
        impl std::error::Error for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    $display
                    $(,
                        $($arg),+
                    )?
                )
            }
        }
    };
}

/// Implement `command()` and `lines()` for errors raised part way through a
/// reply.
macro_rules! impl_for_type_containing_partial_reply {
    ($name:ident) => {
        impl $name {
            /// Create an instance of the error.
            pub(crate) fn new<S: Into<String>>(command: S, lines: Vec<String>) -> Self {
                $name(Box::new((command.into(), lines)))
            }

            /// The command whose reply was being read.
            pub fn command(&self) -> &str {
                &self.0 .0
            }

            /// The lines read before the error occurred.
            pub fn lines(&self) -> &[String] {
                &self.0 .1
            }

            /// Consume the error and return the lines read before it occurred.
            pub fn into_lines(self) -> Vec<String> {
                self.0 .1
            }
        }
    };
}

/// Define an error enum that contains concrete error types (not other error enums).
///
/// From and `TryFrom` traits will be implemented for the enum and its underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
///
/// ```compile_fail
/// # // This fails to compile because the macro is not exported.
/// error_enum!{
///     #[non_exhaustive]
///     pub enum ThisError {
///         VariantA(A),
///         VariantB(B),
///         // ...
///     }
/// }
/// ```
macro_rules! error_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $(
                $variant:ident($inner:path)
            ),+
            $(,)?
        }
    ) => {
        $(
            #[$attr]
        )*
        #[allow(missing_docs)]
        pub enum $name {
            $(
                $variant($inner)
            ),+
        }

        impl std::error::Error for $name {}

        // Defer the display to the inner error type
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$variant(e) => std::fmt::Display::fmt(e, f)
                    ),+
                }
            }
        }

        // Allow the enum to be convertible from an infallible error
        impl From<std::convert::Infallible> for $name {
            fn from(other: std::convert::Infallible) -> Self {
                match other {}
            }
        }

        $(
            impl From<$inner> for $name {
                fn from(other: $inner) -> Self {
                    $name::$variant(other)
                }
            }

            impl TryFrom<$name> for $inner {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $name::$variant(value) => Ok(value),
                        value => Err(value)
                    }
                }
            }
        )+
    };
}

/// The specified device is either disconnected or already in use by another process.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SerialDeviceInUseOrDisconnectedError(Box<str>);

impl_error_display! {
    SerialDeviceInUseOrDisconnectedError,
    self =>
    "the specified device is either disconnected or already in use by another process: {}", self.0
}

/// An operation was attempted on a session that has already been closed.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SessionClosedError(Box<str>);

impl SessionClosedError {
    /// Create an instance of the error.
    ///
    /// `operation` describes what was attempted, usually the command mnemonic.
    pub(crate) fn new<S: AsRef<str>>(operation: S) -> Self {
        SessionClosedError(Box::from(operation.as_ref()))
    }

    /// What was attempted on the closed session.
    pub fn operation(&self) -> &str {
        &self.0
    }
}

impl_error_display! {
    SessionClosedError,
    self => "cannot {}: the session is closed", self.0
}

/// A command contains a carriage return or line feed, which would split it
/// into more than one command on the wire.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ReservedCharacterError(Box<(String, u8)>);

impl ReservedCharacterError {
    /// Create an instance of the error.
    pub(crate) fn new<S: Into<String>>(command: S, reserved: u8) -> Self {
        ReservedCharacterError(Box::new((command.into(), reserved)))
    }

    /// The offending command text.
    pub fn command(&self) -> &str {
        &self.0 .0
    }

    /// The reserved byte found in the command.
    pub fn reserved(&self) -> u8 {
        self.0 .1
    }
}

impl_error_display! {
    ReservedCharacterError,
    self => "command contains a reserved character (0x{:02X}): {}", self.0.1, self.0.0.escape_default()
}

/// A reply line contained bytes that are not valid UTF-8.
///
/// Only returned when the session uses [`Decoding::Strict`](crate::Decoding::Strict).
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DecodeError(Box<[u8]>);

impl DecodeError {
    /// Create an instance of the error.
    pub(crate) fn new<R: AsRef<[u8]>>(bytes: R) -> Self {
        DecodeError(Box::from(bytes.as_ref()))
    }

    /// Get the raw bytes of the offending line.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl_error_display! {
    DecodeError,
    self => "reply line is not valid UTF-8: {}", String::from_utf8_lossy(&self.0)
}

/// The end of a reply was not seen before the reply timeout elapsed.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ReplyTimeoutError(Box<(String, Vec<String>)>);

impl_for_type_containing_partial_reply! { ReplyTimeoutError }

impl_error_display! {
    ReplyTimeoutError,
    self => "timed out waiting for the end of the reply to {} after {} line(s)", self.0.0, self.0.1.len()
}

/// The channel reached end-of-stream before the end of a reply was seen.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ChannelClosedError(Box<(String, Vec<String>)>);

impl_for_type_containing_partial_reply! { ChannelClosedError }

impl_error_display! {
    ChannelClosedError,
    self => "the channel closed while reading the reply to {} after {} line(s)", self.0.0, self.0.1.len()
}

/// The controller answered with a line the session recognises as a rejection
/// (for instance, a move outside the travel range).
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RemoteRejectionError(Box<(String, String)>);

impl RemoteRejectionError {
    /// Create an instance of the error.
    pub(crate) fn new<C: Into<String>, L: Into<String>>(command: C, line: L) -> Self {
        RemoteRejectionError(Box::new((command.into(), line.into())))
    }

    /// The command that was rejected.
    pub fn command(&self) -> &str {
        &self.0 .0
    }

    /// The line the controller sent.
    pub fn line(&self) -> &str {
        &self.0 .1
    }
}

impl_error_display! {
    RemoteRejectionError,
    self => "the controller rejected {}: {}", self.0.0, self.0.1
}

/// An argument is outside the range the controller accepts.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InvalidArgumentError(Box<str>);

impl InvalidArgumentError {
    /// Create an instance of the error.
    pub(crate) fn new<S: AsRef<str>>(message: S) -> Self {
        InvalidArgumentError(Box::from(message.as_ref()))
    }
}

impl_error_display! {
    InvalidArgumentError,
    self => "invalid argument: {}", self.0
}

error_enum! {
    /// Any error returned by this crate.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum Error {
        SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
        Io(std::io::Error),
        SessionClosed(SessionClosedError),
        ReservedCharacter(ReservedCharacterError),
        Decode(DecodeError),
        ReplyTimeout(ReplyTimeoutError),
        ChannelClosed(ChannelClosedError),
        RemoteRejection(RemoteRejectionError),
        InvalidArgument(InvalidArgumentError),
    }
}

impl Error {
    /// A convenience function for determining if the error is due to the
    /// channel timing out, either on a single read or while waiting for the
    /// end of a reply.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            Error::ReplyTimeout(_) => true,
            _ => false,
        }
    }

    /// A convenience function for determining if the error is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// The lines read before the error occurred, if the error happened part
    /// way through a reply.
    pub fn partial_reply(&self) -> Option<&[String]> {
        match self {
            Error::ReplyTimeout(e) => Some(e.lines()),
            Error::ChannelClosed(e) => Some(e.lines()),
            _ => None,
        }
    }
}

impl From<serialport::Error> for Error {
    fn from(other: serialport::Error) -> Self {
        use std::io;

        match other.kind() {
            serialport::ErrorKind::NoDevice => Error::SerialDeviceInUseOrDisconnected(
                SerialDeviceInUseOrDisconnectedError(other.description.into_boxed_str()),
            ),
            serialport::ErrorKind::InvalidInput => Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                other.description,
            )),
            serialport::ErrorKind::Unknown => {
                Error::Io(io::Error::new(io::ErrorKind::Other, other.description))
            }
            serialport::ErrorKind::Io(kind) => Error::Io(io::Error::new(kind, other.description)),
        }
    }
}
