//! Types and traits for generating controller commands.
//!
//! A command line is a five character [`Mnemonic`] optionally followed by
//! space separated arguments and always terminated by a line feed:
//!
//! ```text
//! MOVEX 90u\n
//! MRXYZ 1u 1u 0u\n
//! RUNWF\n
//! ```

use crate::{
	error::ReservedCharacterError,
	reply::Terminator,
	unit::{Distance, Time},
};
use std::{borrow::Cow, fmt, io};

/// Define the [`Mnemonic`] enum along with its name lookups.
///
/// Each entry is the mnemonic as sent on the wire followed by the words
/// making up the variant name, e.g. `{ "MOVRX", move relative x }` defines
/// `Mnemonic::MoveRelativeX` and `{ "RUN3D", run_3d }` defines `Mnemonic::Run3d`.
macro_rules! define_mnemonics {
	(
		$(
			$(#[$attr:meta])*
			{ $text:literal, $($name_word:ident)+ }
		),+
		$(,)?
	) => {
		paste::paste! {
			/// The mnemonics of the commands the controller understands.
			#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
			#[non_exhaustive]
			pub enum Mnemonic {
				$(
					$(#[$attr])*
					[< $($name_word:camel)+ >],
				)+
			}

			impl Mnemonic {
				/// Every mnemonic, in definition order.
				pub const ALL: &'static [Mnemonic] = &[
					$( Mnemonic::[< $($name_word:camel)+ >], )+
				];

				/// The mnemonic as it is sent on the wire.
				pub const fn as_str(self) -> &'static str {
					match self {
						$( Mnemonic::[< $($name_word:camel)+ >] => $text, )+
					}
				}

				/// Look up a mnemonic from its wire representation.
				///
				/// Returns `None` if the mnemonic is not recognized.
				pub fn from_name(name: &str) -> Option<Mnemonic> {
					match name {
						$( $text => Some(Mnemonic::[< $($name_word:camel)+ >]), )+
						_ => None,
					}
				}
			}
		}
	};
}

define_mnemonics! {
	/// Relative move of the X axis.
	{ "MOVRX", move relative x },
	/// Relative move of the Y axis.
	{ "MOVRY", move relative y },
	/// Relative move of all three axes.
	{ "MRXYZ", move relative xyz },
	/// Absolute move of the X axis.
	{ "MOVEX", move x },
	/// Absolute move of the Y axis.
	{ "MOVEY", move y },
	/// Absolute move of all three axes.
	{ "MOXYZ", move xyz },
	/// Query the X position.
	{ "GET_X", get x },
	/// Query the Y position.
	{ "GET_Y", get y },
	/// Query the position of all three axes.
	{ "GEXYZ", get xyz },
	/// Set the time between two waveform points.
	{ "STIME", set step time },
	/// Set the shooting time used to place TTL pulses.
	{ "SHTIM", set shooting time },
	/// Query the time between two waveform points.
	{ "GTIME", get step time },
	/// Load a ramp waveform on the X axis.
	{ "SWF_X", set waveform x },
	/// Load a ramp waveform on the Y axis.
	{ "SWF_Y", set waveform y },
	/// Load a ramp waveform on the Z axis.
	{ "SWF_Z", set waveform z },
	/// Run the loaded waveforms.
	{ "RUNWF", run waveform },
	/// Run the waveforms of all three axes in sequence.
	{ "RUXYZ", run xyz },
	/// Run the waveforms of two axes in sequence.
	{ "RUXY_", run xy },
	/// Run the X waveform only.
	{ "RUX__", run x },
	/// Run the Y waveform only.
	{ "RUY__", run y },
	/// Run the Z waveform only.
	{ "RUZ__", run z },
	/// Like `RUXYZ` with the first axis going back and forth.
	{ "REXYZ", return xyz },
	/// Like `RUXY_` with the first axis going back and forth.
	{ "REXY_", return xy },
	/// Set the number of repetitions used by `RXYZA`.
	{ "SWF_A", set repeat count },
	/// Run `RUXYZ` the configured number of times.
	{ "RXYZA", run xyz repeated },
	/// Pause a running waveform.
	{ "PAUSE", pause },
	/// Resume a paused waveform.
	{ "PLAYY", play },
	/// Stop a running waveform.
	{ "STOPP", stop },
	/// Allocate storage for arbitrary 3D locations.
	{ "ARB3D", allocate_3d },
	/// Run the stored 3D locations.
	{ "RUN3D", run_3d },
	/// Append a 3D location.
	{ "ADD3D", add_3d },
	/// Allocate storage for arbitrary per-axis waveforms.
	{ "ARBWF", allocate waveforms },
	/// Append a point to the X waveform.
	{ "ADDPX", add point x },
	/// Append a point to the Y waveform.
	{ "ADDPY", add point y },
	/// Append a point to the Z waveform.
	{ "ADDPZ", add point z },
	/// Set all DAC outputs to 0 V.
	{ "_RAZ_", reset outputs },
	/// Disable controller answers.
	{ "REOFF", responses off },
	/// Enable controller answers.
	{ "RE_ON", responses on },
	/// Print controller information.
	{ "INFOS", infos },
	/// Print the help menu.
	{ "HELP_", help },
	/// Leave the help menu.
	{ "QUITT", quit },
	/// Display the setup of a TTL port.
	{ "DISIO", display io },
	/// Configure a TTL port.
	{ "CHAIO", change io },
}

/// The last line of the `INFOS` reply of an LF2:100 stage.
pub const INFOS_TERMINATOR: &str = "Travel range Y : 100 m";

/// The last line of the `HELP_` reply.
pub const HELP_TERMINATOR: &str = "To exit the help menu please write QUITT";

/// The lines that end a `DISIO` reply, compared case-insensitively.
pub const DISIO_TERMINATORS: &[&str] = &["axis1", "axis2", "axis3"];

impl Mnemonic {
	/// The terminator that marks the end of this command's reply, if the
	/// command produces one.
	pub fn terminator(self) -> Option<Terminator> {
		match self {
			Mnemonic::GetX | Mnemonic::GetY => Some(Terminator::EndsWith('m')),
			Mnemonic::GetXyz => Some(Terminator::exact("Third Axis :")),
			Mnemonic::GetStepTime => Some(Terminator::EndsWith('s')),
			Mnemonic::Infos => Some(Terminator::exact(INFOS_TERMINATOR)),
			Mnemonic::Help => Some(Terminator::exact(HELP_TERMINATOR)),
			Mnemonic::DisplayIo => Some(Terminator::OneOfIgnoreCase(DISIO_TERMINATORS)),
			_ => None,
		}
	}
}

impl fmt::Display for Mnemonic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Mnemonic {
	type Err = crate::error::InvalidArgumentError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Mnemonic::from_name(s).ok_or_else(|| {
			crate::error::InvalidArgumentError::new(format!("unknown mnemonic {s:?}"))
		})
	}
}

/// An argument to a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
	/// A distance, written with its length unit suffix.
	Distance(Distance),
	/// A time, written with its time unit suffix.
	Time(Time),
	/// A unitless count, such as a number of steps.
	Count(u32),
	/// Pre-formatted text, written as is.
	Text(Cow<'static, str>),
}

impl Arg {
	/// Check that the argument renders as something the controller can parse.
	pub fn check(&self) -> Result<(), crate::error::InvalidArgumentError> {
		let finite = match self {
			Arg::Distance(d) => d.is_finite(),
			Arg::Time(t) => t.is_finite(),
			Arg::Count(_) | Arg::Text(_) => true,
		};
		if finite {
			Ok(())
		} else {
			Err(crate::error::InvalidArgumentError::new(format!(
				"{self} is not a finite value"
			)))
		}
	}
}

impl fmt::Display for Arg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Arg::Distance(d) => fmt::Display::fmt(d, f),
			Arg::Time(t) => fmt::Display::fmt(t, f),
			Arg::Count(n) => fmt::Display::fmt(n, f),
			Arg::Text(s) => f.write_str(s),
		}
	}
}

impl From<Distance> for Arg {
	fn from(other: Distance) -> Self {
		Arg::Distance(other)
	}
}

impl From<Time> for Arg {
	fn from(other: Time) -> Self {
		Arg::Time(other)
	}
}

impl From<u32> for Arg {
	fn from(other: u32) -> Self {
		Arg::Count(other)
	}
}

impl From<&'static str> for Arg {
	fn from(other: &'static str) -> Self {
		Arg::Text(Cow::Borrowed(other))
	}
}

impl From<String> for Arg {
	fn from(other: String) -> Self {
		Arg::Text(Cow::Owned(other))
	}
}

/// A builder for a controller command.
///
/// ## Example
///
/// Build the command `MRXYZ 1u 1u 0u`:
///
/// ```
/// # use pcproto::{CommandBuilder, Distance, Mnemonic};
/// let cmd = CommandBuilder::new(Mnemonic::MoveRelativeXyz)
///     .arg(Distance::um(1.0))
///     .arg(Distance::um(1.0))
///     .arg(Distance::um(0.0));
/// assert_eq!(cmd.to_string(), "MRXYZ 1u 1u 0u");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBuilder {
	/// The command mnemonic.
	mnemonic: Mnemonic,
	/// The arguments, in order.
	args: Vec<Arg>,
}

impl CommandBuilder {
	/// Create a command with no arguments.
	pub fn new(mnemonic: Mnemonic) -> CommandBuilder {
		CommandBuilder {
			mnemonic,
			args: Vec::new(),
		}
	}

	/// Append an argument.
	#[must_use]
	pub fn arg<A: Into<Arg>>(mut self, arg: A) -> CommandBuilder {
		self.args.push(arg.into());
		self
	}

	/// Get the mnemonic.
	pub fn mnemonic(&self) -> Mnemonic {
		self.mnemonic
	}

	/// Get the arguments.
	pub fn args(&self) -> &[Arg] {
		&self.args
	}
}

impl fmt::Display for CommandBuilder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.mnemonic.as_str())?;
		for arg in &self.args {
			write!(f, " {arg}")?;
		}
		Ok(())
	}
}

impl From<Mnemonic> for CommandBuilder {
	fn from(other: Mnemonic) -> Self {
		CommandBuilder::new(other)
	}
}

/// Any type that can be sent to the controller as a command.
pub trait Command {
	/// The command text, without the trailing line feed.
	fn data(&self) -> Cow<'_, str>;

	/// The command's name, used to label logs and errors.
	///
	/// By default this is the first word of [`data`](Command::data).
	fn name(&self) -> Cow<'_, str> {
		match self.data() {
			Cow::Borrowed(s) => Cow::Borrowed(s.split(' ').next().unwrap_or_default()),
			Cow::Owned(s) => Cow::Owned(s.split(' ').next().unwrap_or_default().to_string()),
		}
	}

	/// Check the command before it is written.
	///
	/// Plain text is always accepted.
	fn check(&self) -> Result<(), crate::error::InvalidArgumentError> {
		Ok(())
	}
}

impl Command for CommandBuilder {
	fn data(&self) -> Cow<'_, str> {
		Cow::Owned(self.to_string())
	}
	fn name(&self) -> Cow<'_, str> {
		Cow::Borrowed(self.mnemonic.as_str())
	}
	fn check(&self) -> Result<(), crate::error::InvalidArgumentError> {
		self.args.iter().try_for_each(Arg::check)
	}
}

impl Command for Mnemonic {
	fn data(&self) -> Cow<'_, str> {
		Cow::Borrowed(self.as_str())
	}
}

impl Command for str {
	fn data(&self) -> Cow<'_, str> {
		Cow::Borrowed(self)
	}
}

impl Command for String {
	fn data(&self) -> Cow<'_, str> {
		Cow::Borrowed(self.as_str())
	}
}

impl<T: Command + ?Sized> Command for &T {
	fn data(&self) -> Cow<'_, str> {
		(**self).data()
	}
	fn name(&self) -> Cow<'_, str> {
		(**self).name()
	}
	fn check(&self) -> Result<(), crate::error::InvalidArgumentError> {
		(**self).check()
	}
}

/// Write the full command line, including the trailing line feed, into `writer`.
///
/// Commands that fail [`Command::check`] or contain a carriage return or line
/// feed are rejected before anything is written.
pub(crate) fn write_line<C, W>(cmd: &C, writer: &mut W) -> Result<(), crate::error::Error>
where
	C: Command + ?Sized,
	W: io::Write + ?Sized,
{
	cmd.check()?;
	let data = cmd.data();
	if let Some(reserved) = data.bytes().find(|b| matches!(b, b'\r' | b'\n')) {
		return Err(ReservedCharacterError::new(data.into_owned(), reserved).into());
	}
	writer.write_all(data.as_bytes())?;
	writer.write_all(b"\n")?;
	Ok(())
}
