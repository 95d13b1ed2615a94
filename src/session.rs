//! Types for opening and using a session with a Piezo Concept controller.
//!
//! A [`Session`] owns the serial connection to one controller. Commands fall
//! into two groups:
//!
//!  * fire-and-forget commands, such as [`move_x`](Session::move_x), which
//!    write a command line and return without reading anything;
//!  * queries, such as [`position_x`](Session::position_x), which write a
//!    command line and then read lines until the line that ends the reply.
//!
//! Replies are read one byte at a time, so nothing after the last line of a
//! reply is consumed. Reading is bounded by the session's
//! [reply timeout](Session::set_reply_timeout): if the end of the reply is not
//! seen in time a [`ReplyTimeoutError`] is returned holding the lines read so
//! far.
//!
//! ```rust
//! # use pcproto::{Distance, Session};
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::open_serial("/dev/ttyUSB0")?;
//! session.move_x(Distance::um(90.0))?;
//! let reply = session.position_x()?;
//! println!("X is at {}", reply.last());
//! session.close()?;
//! # Ok(())
//! # }
//! ```

pub mod handlers;
mod options;
#[cfg(test)]
mod test;

#[cfg(any(test, feature = "mock"))]
use crate::backend::Mock;
use crate::backend::{Backend, Serial, UNKNOWN_BACKEND_NAME};
#[allow(clippy::wildcard_imports)]
use crate::error::*;
use crate::{
	command::{write_line, Arg, Command, CommandBuilder, Mnemonic},
	reply::{decode_lossy, Decoding, EndOfReply, Reply},
	timeout_guard::TimeoutGuard,
	ttl::{TtlMode, TtlPort},
	unit::{Distance, Time},
};
use handlers::{LineHandler, RejectionCheck};
pub use options::*;
use std::{
	io,
	time::{Duration, Instant},
};

/// The direction a line was sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
	/// The line was transmitted to the controller.
	Tx,
	/// The line was received from the controller.
	Recv,
}

/// The outcome of reading a single byte.
enum ReadByte {
	Byte(u8),
	TimedOut,
	EndOfStream,
}

/// A session with a Piezo Concept controller.
///
/// A session is parameterized by the type of [`Backend`] used to exchange
/// bytes. Use [`open_serial`](Session::open_serial) or the
/// [`OpenSerialOptions`] builder to open a serial session.
///
/// Every method takes `&mut self`, so there is never more than one command
/// in flight.
pub struct Session<'a, B = Serial> {
	/// The underlying backend. `None` once the session is closed.
	backend: Option<B>,
	/// How long a query waits for the end of its reply.
	reply_timeout: Duration,
	/// How undecodable reply bytes are handled.
	decoding: Decoding,
	/// Recognises lines in which the controller rejects a command.
	rejection_check: Option<RejectionCheck<'a>>,
	/// User supplied line callback.
	line_handler: Option<LineHandler<'a>>,
	/// If populated, the error that has "poisoned" the session. This error
	/// MUST be reported before the session is used for communication again.
	///
	/// For instance, if a [`TimeoutGuard`] cannot restore the original timeout
	/// in its Drop implementation it poisons the session rather than panicking.
	poison: Option<io::Error>,
	/// The last X and Y positions reported by the controller.
	position: (Option<Distance>, Option<Distance>),
}

impl<B: Backend> std::fmt::Debug for Session<'_, B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("name", &self.name())
			.field("reply_timeout", &self.reply_timeout)
			.field("decoding", &self.decoding)
			.finish_non_exhaustive()
	}
}

impl<'a> Session<'a, Serial> {
	/// Open the serial port at the specified path using the default options.
	///
	/// Alternatively, use [`Session::open_serial_options`] to customize how the port is opened.
	///
	/// ## Example
	///
	/// ```rust
	/// # use pcproto::Session;
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut session = Session::open_serial("/dev/ttyUSB0")?;
	/// // Or equivalently
	/// let mut session = Session::open_serial_options().open("/dev/ttyUSB0")?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn open_serial(path: &str) -> Result<Session<'a, Serial>, Error> {
		OpenSerialOptions::new().open(path)
	}

	/// Get an [`OpenSerialOptions`] to customize how a serial port is opened.
	pub fn open_serial_options() -> OpenSerialOptions {
		OpenSerialOptions::default()
	}
}

#[cfg(any(test, feature = "mock"))]
impl<'a> Session<'a, Mock> {
	/// Open a session on a [`Mock`] backend with the default options.
	pub fn open_mock() -> Session<'a, Mock> {
		Session::from_backend(
			Mock::new(),
			OpenSerialOptions::DEFAULT_REPLY_TIMEOUT,
			Decoding::default(),
		)
	}
}

impl<'a, B: Backend> Session<'a, B> {
	/// Create a `Session` from a [`Backend`] type.
	fn from_backend(backend: B, reply_timeout: Duration, decoding: Decoding) -> Self {
		let rejection_check: RejectionCheck<'a> = Box::new(handlers::is_error_line);
		Session {
			backend: Some(backend),
			reply_timeout,
			decoding,
			rejection_check: Some(rejection_check),
			line_handler: None,
			poison: None,
			position: (None, None),
		}
	}

	/// Poison the session. `e` is returned by the next operation.
	pub(crate) fn set_poison(&mut self, e: io::Error) {
		self.poison = Some(e);
	}

	/// Check if the session is poisoned and report the error if it exists.
	fn check_poisoned(&mut self) -> Result<(), io::Error> {
		if let Some(poison) = self.poison.take() {
			Err(poison)
		} else {
			Ok(())
		}
	}

	/// Get the backend for `operation`, failing if the session is closed or poisoned.
	fn usable_backend(&mut self, operation: &str) -> Result<&mut B, Error> {
		if self.backend.is_none() {
			return Err(SessionClosedError::new(operation).into());
		}
		self.check_poisoned()?;
		self.backend
			.as_mut()
			.ok_or_else(|| SessionClosedError::new(operation).into())
	}

	/// Transmit a command without reading anything back.
	///
	/// Any type implementing [`Command`] can be sent, including plain strings
	/// and [`CommandBuilder`]s. A command containing a carriage return or line
	/// feed is rejected with a [`ReservedCharacterError`] before anything is
	/// written.
	///
	/// ## Example
	///
	/// ```rust
	/// # use pcproto::{CommandBuilder, Distance, Mnemonic, Session, backend::Backend};
	/// # fn wrapper<B: Backend>(mut session: Session<B>) -> Result<(), Box<dyn std::error::Error>> {
	/// session.command("MOVEX 10u")?;
	/// session.command(CommandBuilder::new(Mnemonic::MoveY).arg(Distance::um(10.0)))?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn command<C: Command>(&mut self, cmd: C) -> Result<(), Error> {
		self.send(&cmd)
	}

	/// Write the command line for `cmd` to the backend.
	fn send<C: Command + ?Sized>(&mut self, cmd: &C) -> Result<(), Error> {
		let backend = self.usable_backend(&format!("send {}", cmd.name()))?;
		let mut buffer = Vec::new();
		write_line(cmd, &mut buffer)?;
		let data = cmd.data();
		log::debug!(
			"{} TX:   {}",
			backend
				.name()
				.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string()),
			data
		);
		backend.write_all(buffer.as_slice())?;
		backend.flush()?;
		if let Some(callback) = self.line_handler.as_mut() {
			(callback)(&*data, Direction::Tx);
		}
		Ok(())
	}

	/// Transmit a command and read its reply.
	///
	/// Lines are read until one satisfies `terminator`, which can be a
	/// [`Terminator`](crate::Terminator) or any `Fn(&str) -> bool`. Empty lines are skipped.
	///
	/// The read is bounded by the [reply timeout](Session::set_reply_timeout).
	/// If the channel closes first a [`ChannelClosedError`] is returned, and
	/// if a line matches the [rejection check](Session::set_rejection_check) a
	/// [`RemoteRejectionError`] is returned.
	///
	/// ## Example
	///
	/// ```rust
	/// # use pcproto::{Mnemonic, Session, Terminator, backend::Backend};
	/// # fn wrapper<B: Backend>(mut session: Session<B>) -> Result<(), Box<dyn std::error::Error>> {
	/// let reply = session.query("GEXYZ", Terminator::exact("Third Axis :"))?;
	/// let reply = session.query(Mnemonic::Infos, |line: &str| line.starts_with("Travel range Y"))?;
	/// for line in reply.lines() {
	///     println!("{line}");
	/// }
	/// # Ok(())
	/// # }
	/// ```
	pub fn query<C: Command, T: EndOfReply>(&mut self, cmd: C, terminator: T) -> Result<Reply, Error> {
		self.send(&cmd)?;
		self.read_reply(&cmd.name(), &terminator)
	}

	/// Send a query mnemonic (or a command built from one) and read the reply
	/// using the mnemonic's own terminator.
	fn known_query<C: Into<CommandBuilder>>(&mut self, cmd: C) -> Result<Reply, Error> {
		let cmd = cmd.into();
		let Some(terminator) = cmd.mnemonic().terminator() else {
			return Err(InvalidArgumentError::new(format!(
				"{} does not produce a reply",
				cmd.mnemonic()
			))
			.into());
		};
		self.query(&cmd, terminator)
	}

	/// Read one byte from the backend.
	fn read_byte(&mut self, operation: &str) -> Result<ReadByte, Error> {
		let backend = self.usable_backend(operation)?;
		let mut byte = [0_u8; 1];
		loop {
			match io::Read::read(backend, &mut byte) {
				Ok(0) => return Ok(ReadByte::EndOfStream),
				Ok(_) => return Ok(ReadByte::Byte(byte[0])),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
				Err(e)
					if matches!(
						e.kind(),
						io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
					) =>
				{
					return Ok(ReadByte::TimedOut);
				}
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// Decode and trim a raw line, then log it and hand it to the line handler.
	///
	/// Returns `None` for empty lines. Undecodable bytes dropped from the line
	/// are added to `dropped`. A line that fails strict decoding or matches the
	/// rejection check is still returned, and the first such error is kept in
	/// `fault` so the caller can finish reading the reply before reporting it.
	fn finish_line(
		&mut self,
		command: &str,
		raw: Vec<u8>,
		dropped: &mut usize,
		fault: &mut Option<Error>,
	) -> Option<String> {
		let name = self.name().unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string());
		let text = match self.decoding {
			Decoding::Strict => match String::from_utf8(raw) {
				Ok(text) => text,
				Err(e) => {
					let raw = e.into_bytes();
					let (text, _) = decode_lossy(&raw);
					if fault.is_none() {
						*fault = Some(DecodeError::new(raw).into());
					}
					text
				}
			},
			Decoding::Lossy => {
				let (text, count) = decode_lossy(&raw);
				if count > 0 {
					log::warn!(
						"{name} dropped {count} undecodable byte(s) from {:?}",
						String::from_utf8_lossy(&raw).trim()
					);
					*dropped += count;
				}
				text
			}
		};
		let line = text.trim();
		if line.is_empty() {
			return None;
		}
		log::debug!("{name} RECV: {line}");
		if let Some(callback) = self.line_handler.as_mut() {
			(callback)(line, Direction::Recv);
		}
		if fault.is_none() && self.rejection_check.as_ref().is_some_and(|check| (check)(line)) {
			*fault = Some(RemoteRejectionError::new(command, line).into());
		}
		Some(line.to_string())
	}

	/// Read lines until one satisfies `terminator`.
	///
	/// A rejected or undecodable line does not stop the read: the rest of the
	/// reply is consumed up to its terminator, the reply deadline, or the next
	/// read timeout, and then that error is returned.
	fn read_reply<T: EndOfReply + ?Sized>(
		&mut self,
		command: &str,
		terminator: &T,
	) -> Result<Reply, Error> {
		let operation = format!("read the reply to {command}");
		let deadline = Instant::now().checked_add(self.reply_timeout);
		let expired = || deadline.is_some_and(|deadline| Instant::now() >= deadline);
		let mut lines = Vec::new();
		let mut raw = Vec::new();
		let mut dropped = 0;
		let mut fault = None;
		loop {
			match self.read_byte(&operation)? {
				ReadByte::Byte(b'\n') => {
					let Some(line) =
						self.finish_line(command, std::mem::take(&mut raw), &mut dropped, &mut fault)
					else {
						continue;
					};
					let done = terminator.is_end(&line);
					lines.push(line);
					if done {
						return match fault {
							Some(fault) => Err(fault),
							None => Ok(Reply::new(command.to_string(), lines, dropped)),
						};
					}
					if expired() {
						return Err(fault.unwrap_or_else(|| ReplyTimeoutError::new(command, lines).into()));
					}
				}
				ReadByte::Byte(byte) => raw.push(byte),
				ReadByte::TimedOut => {
					if let Some(fault) = fault {
						return Err(fault);
					}
					if expired() {
						return Err(ReplyTimeoutError::new(command, lines).into());
					}
				}
				ReadByte::EndOfStream => {
					return Err(fault.unwrap_or_else(|| ChannelClosedError::new(command, lines).into()));
				}
			}
		}
	}

	/// Read and return every line the controller has already sent.
	///
	/// Reading stops at the first read timeout, at the end of the stream, or
	/// when the reply timeout elapses. This surfaces anything the controller
	/// printed in response to fire-and-forget commands. If a line matches the
	/// [rejection check](Session::set_rejection_check), the pending lines are
	/// still consumed and the first rejection is returned as a
	/// [`RemoteRejectionError`].
	pub fn drain(&mut self) -> Result<Vec<String>, Error> {
		const DRAIN: &str = "drain";
		let deadline = Instant::now().checked_add(self.reply_timeout);
		let mut lines = Vec::new();
		let mut raw = Vec::new();
		let mut dropped = 0;
		let mut fault = None;
		loop {
			let byte = match self.read_byte(DRAIN)? {
				ReadByte::Byte(byte) => byte,
				ReadByte::TimedOut | ReadByte::EndOfStream => break,
			};
			if byte == b'\n' {
				if let Some(line) =
					self.finish_line(DRAIN, std::mem::take(&mut raw), &mut dropped, &mut fault)
				{
					lines.push(line);
				}
				if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
					break;
				}
			} else {
				raw.push(byte);
			}
		}
		if !raw.is_empty() {
			if let Some(line) = self.finish_line(DRAIN, raw, &mut dropped, &mut fault) {
				lines.push(line);
			}
		}
		match fault {
			Some(fault) => Err(fault),
			None => Ok(lines),
		}
	}

	/// Send a command built from `mnemonic` and `args`.
	fn send_with<const N: usize>(&mut self, mnemonic: Mnemonic, args: [Arg; N]) -> Result<(), Error> {
		let cmd = args
			.into_iter()
			.fold(CommandBuilder::new(mnemonic), CommandBuilder::arg);
		self.send(&cmd)
	}

	/// Move the X axis by `distance` (`MOVRX`).
	pub fn move_relative_x(&mut self, distance: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::MoveRelativeX, [distance.into()])
	}

	/// Move the Y axis by `distance` (`MOVRY`).
	pub fn move_relative_y(&mut self, distance: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::MoveRelativeY, [distance.into()])
	}

	/// Move all three axes by the given distances (`MRXYZ`).
	pub fn move_relative_xyz(&mut self, x: Distance, y: Distance, z: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::MoveRelativeXyz, [x.into(), y.into(), z.into()])
	}

	/// Move the X axis to `position` (`MOVEX`).
	///
	/// The travel range is not checked locally. Out of range moves are
	/// rejected by the controller, which can be seen with [`drain`](Session::drain).
	pub fn move_x(&mut self, position: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::MoveX, [position.into()])
	}

	/// Move the Y axis to `position` (`MOVEY`).
	pub fn move_y(&mut self, position: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::MoveY, [position.into()])
	}

	/// Move all three axes to the given positions (`MOXYZ`).
	pub fn move_xyz(&mut self, x: Distance, y: Distance, z: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::MoveXyz, [x.into(), y.into(), z.into()])
	}

	/// Move X and Y to the middle of their travel, 50 µm, and read back both positions.
	///
	/// Returns the `GET_X` and `GET_Y` replies, in that order.
	pub fn recenter(&mut self) -> Result<(Reply, Reply), Error> {
		self.move_x(Distance::um(50.0))?;
		self.move_y(Distance::um(50.0))?;
		let x = self.position_x()?;
		let y = self.position_y()?;
		Ok((x, y))
	}

	/// Query the X position (`GET_X`).
	///
	/// The reply ends with the first line ending in `m`. If that line holds
	/// a distance, it is stored as the [cached position](Session::cached_position).
	pub fn position_x(&mut self) -> Result<Reply, Error> {
		let reply = self.known_query(Mnemonic::GetX)?;
		if let Some(distance) = reply.distance() {
			self.position.0 = Some(distance);
		}
		Ok(reply)
	}

	/// Query the Y position (`GET_Y`).
	///
	/// See [`position_x`](Session::position_x).
	pub fn position_y(&mut self) -> Result<Reply, Error> {
		let reply = self.known_query(Mnemonic::GetY)?;
		if let Some(distance) = reply.distance() {
			self.position.1 = Some(distance);
		}
		Ok(reply)
	}

	/// Query the position of all three axes (`GEXYZ`).
	pub fn position_xyz(&mut self) -> Result<Reply, Error> {
		self.known_query(Mnemonic::GetXyz)
	}

	/// The X and Y positions last parsed from a [`position_x`](Session::position_x)
	/// or [`position_y`](Session::position_y) reply.
	pub fn cached_position(&self) -> (Option<Distance>, Option<Distance>) {
		self.position
	}

	/// Set the time between two waveform points (`STIME`).
	pub fn set_step_time(&mut self, time: Time) -> Result<(), Error> {
		self.send_with(Mnemonic::SetStepTime, [time.into()])
	}

	/// Set the shooting time used to place TTL pulses (`SHTIM`).
	pub fn set_shooting_time(&mut self, time: Time) -> Result<(), Error> {
		self.send_with(Mnemonic::SetShootingTime, [time.into()])
	}

	/// Query the time between two waveform points (`GTIME`).
	pub fn step_time(&mut self) -> Result<Reply, Error> {
		self.known_query(Mnemonic::GetStepTime)
	}

	/// Load a ramp of `steps` points from `start` to `end` on the X axis (`SWF_X`).
	pub fn set_x_waveform(&mut self, steps: u32, start: Distance, end: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::SetWaveformX, [steps.into(), start.into(), end.into()])
	}

	/// Load a ramp of `steps` points from `start` to `end` on the Y axis (`SWF_Y`).
	pub fn set_y_waveform(&mut self, steps: u32, start: Distance, end: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::SetWaveformY, [steps.into(), start.into(), end.into()])
	}

	/// Load a ramp of `steps` points from `start` to `end` on the Z axis (`SWF_Z`).
	pub fn set_z_waveform(&mut self, steps: u32, start: Distance, end: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::SetWaveformZ, [steps.into(), start.into(), end.into()])
	}

	/// Run the loaded waveforms (`RUNWF`).
	pub fn run_waveform(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::RunWaveform)
	}

	/// Run the waveforms of all three axes in sequence (`RUXYZ`).
	pub fn run_xyz(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::RunXyz)
	}

	/// Run the X and Y waveforms in sequence (`RUXY_`).
	pub fn run_xy(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::RunXy)
	}

	/// Run the X waveform (`RUX__`).
	pub fn run_x(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::RunX)
	}

	/// Run the Y waveform (`RUY__`).
	pub fn run_y(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::RunY)
	}

	/// Run the Z waveform (`RUZ__`).
	pub fn run_z(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::RunZ)
	}

	/// Like [`run_xyz`](Session::run_xyz) with the first axis going back and forth (`REXYZ`).
	pub fn run_xyz_back_and_forth(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::ReturnXyz)
	}

	/// Like [`run_xy`](Session::run_xy) with the first axis going back and forth (`REXY_`).
	pub fn run_xy_back_and_forth(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::ReturnXy)
	}

	/// Set how many times [`run_xyz_repeated`](Session::run_xyz_repeated) runs (`SWF_A`).
	pub fn set_repeat_count(&mut self, count: u32) -> Result<(), Error> {
		self.send_with(Mnemonic::SetRepeatCount, [count.into()])
	}

	/// Run `RUXYZ` the configured number of times (`RXYZA`).
	pub fn run_xyz_repeated(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::RunXyzRepeated)
	}

	/// Pause a running waveform (`PAUSE`).
	pub fn pause(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::Pause)
	}

	/// Resume a paused waveform (`PLAYY`).
	pub fn play(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::Play)
	}

	/// Stop a running waveform (`STOPP`).
	pub fn stop(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::Stop)
	}

	/// Allocate storage for `points` arbitrary 3D locations (`ARB3D`).
	pub fn allocate_3d(&mut self, points: u32) -> Result<(), Error> {
		self.send_with(Mnemonic::Allocate3d, [points.into()])
	}

	/// Visit the stored 3D locations (`RUN3D`).
	pub fn run_3d(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::Run3d)
	}

	/// Append a 3D location (`ADD3D`).
	pub fn add_3d(&mut self, x: Distance, y: Distance, z: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::Add3d, [x.into(), y.into(), z.into()])
	}

	/// Allocate storage for arbitrary waveforms of `x`, `y`, and `z` points (`ARBWF`).
	pub fn allocate_waveforms(&mut self, x: u32, y: u32, z: u32) -> Result<(), Error> {
		self.send_with(Mnemonic::AllocateWaveforms, [x.into(), y.into(), z.into()])
	}

	/// Append a point to the X waveform (`ADDPX`).
	pub fn add_point_x(&mut self, position: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::AddPointX, [position.into()])
	}

	/// Append a point to the Y waveform (`ADDPY`).
	pub fn add_point_y(&mut self, position: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::AddPointY, [position.into()])
	}

	/// Append a point to the Z waveform (`ADDPZ`).
	pub fn add_point_z(&mut self, position: Distance) -> Result<(), Error> {
		self.send_with(Mnemonic::AddPointZ, [position.into()])
	}

	/// Set all DAC outputs to 0 V (`_RAZ_`).
	pub fn reset_outputs(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::ResetOutputs)
	}

	/// Stop the controller from answering commands (`REOFF`).
	///
	/// Queries wait for a reply, so they will time out while answers are off.
	pub fn responses_off(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::ResponsesOff)
	}

	/// Let the controller answer commands again (`RE_ON`).
	pub fn responses_on(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::ResponsesOn)
	}

	/// Read the controller information (`INFOS`).
	pub fn info(&mut self) -> Result<Reply, Error> {
		self.known_query(Mnemonic::Infos)
	}

	/// Read the help menu (`HELP_`).
	///
	/// Use [`quit_help`](Session::quit_help) to leave it.
	pub fn help(&mut self) -> Result<Reply, Error> {
		self.known_query(Mnemonic::Help)
	}

	/// Leave the help menu (`QUITT`).
	pub fn quit_help(&mut self) -> Result<(), Error> {
		self.send(&Mnemonic::Quit)
	}

	/// Display the setup of a TTL port (`DISIO`).
	pub fn ttl_status(&mut self, port: TtlPort) -> Result<Reply, Error> {
		self.known_query(CommandBuilder::new(Mnemonic::DisplayIo).arg(u32::from(port.get())))
	}

	/// Configure a TTL port (`CHAIO`).
	///
	/// ## Example
	///
	/// ```rust
	/// # use pcproto::{Axis, PulseAt, Session, TtlMode, TtlPort, backend::Backend};
	/// # fn wrapper<B: Backend>(mut session: Session<B>) -> Result<(), Box<dyn std::error::Error>> {
	/// // Sends "CHAIO 1o1s"
	/// session.configure_ttl(
	///     TtlPort::try_from(1_u8)?,
	///     TtlMode::Output { axis: Axis::X, at: PulseAt::Start },
	/// )?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn configure_ttl(&mut self, port: TtlPort, mode: TtlMode) -> Result<(), Error> {
		self.send_with(Mnemonic::ChangeIo, [format!("{port}{mode}").into()])
	}

	/// Configure a TTL port with a pre-formatted parameter, such as `1i1r` (`CHAIO`).
	pub fn configure_ttl_raw(&mut self, parameter: &str) -> Result<(), Error> {
		self.send_with(Mnemonic::ChangeIo, [parameter.to_string().into()])
	}

	/// Set the port timeout and return a "scope guard" that will reset the timeout when it goes out of scope.
	///
	/// If no timeout is specified, reads can block indefinitely.
	///
	/// While the guard is in scope, the session can only be accessed through the guard.
	/// However, because the guard implements [`Deref`](std::ops::Deref) and [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the session.
	///
	/// If the original timeout cannot be restored, the session is poisoned and
	/// the next operation reports the error.
	///
	/// ## Example
	/// ```rust
	/// # use pcproto::{error::Error, Session, backend::Backend};
	/// # use std::time::Duration;
	/// # fn helper<B: Backend>(mut session: Session<B>) -> Result<(), Error> {
	/// {
	///     let mut guard = session.timeout_guard(Some(Duration::from_millis(100)))?;
	///     // All reads within this scope will use a 100 ms timeout
	///     let chatter = guard.drain()?;
	///
	/// }  // The guard is dropped and the timeout is reset.
	///
	/// // This query uses the original timeout
	/// session.info()?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn timeout_guard(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<TimeoutGuard<'_, 'a, B>, Error> {
		self.usable_backend("set the read timeout")?;
		Ok(TimeoutGuard::new(self, timeout)?)
	}

	/// Set the read timeout and return the old timeout.
	///
	/// This bounds a single read of the backend. If timeout is `None`, reads
	/// will block indefinitely.
	pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<Duration>, Error> {
		let backend = self.usable_backend("set the read timeout")?;
		let old = backend.read_timeout()?;
		backend.set_read_timeout(timeout)?;
		Ok(old)
	}

	/// Get the read timeout.
	///
	/// If it is `None`, reads will block indefinitely.
	pub fn read_timeout(&self) -> Result<Option<Duration>, Error> {
		let backend = self
			.backend
			.as_ref()
			.ok_or_else(|| SessionClosedError::new("get the read timeout"))?;
		Ok(backend.read_timeout()?)
	}

	/// Set how long a query waits for the end of its reply and return the old value.
	pub fn set_reply_timeout(&mut self, timeout: Duration) -> Result<Duration, Error> {
		if self.backend.is_none() {
			return Err(SessionClosedError::new("set the reply timeout").into());
		}
		Ok(std::mem::replace(&mut self.reply_timeout, timeout))
	}

	/// Get how long a query waits for the end of its reply.
	pub fn reply_timeout(&self) -> Duration {
		self.reply_timeout
	}

	/// Set how bytes that are not valid UTF-8 are handled and return the old policy.
	pub fn set_decoding(&mut self, decoding: Decoding) -> Decoding {
		std::mem::replace(&mut self.decoding, decoding)
	}

	/// Get how bytes that are not valid UTF-8 are handled.
	pub fn decoding(&self) -> Decoding {
		self.decoding
	}

	/// Set the predicate recognising lines in which the controller rejects a
	/// command, returning the previous one.
	///
	/// By default, lines starting with `error` (ignoring case) are rejections.
	pub fn set_rejection_check<F>(&mut self, check: F) -> Option<RejectionCheck<'a>>
	where
		F: Fn(&str) -> bool + 'a,
	{
		let check: RejectionCheck<'a> = Box::new(check);
		std::mem::replace(&mut self.rejection_check, Some(check))
	}

	/// Stop checking received lines for rejections and return the previous check.
	pub fn clear_rejection_check(&mut self) -> Option<RejectionCheck<'a>> {
		self.rejection_check.take()
	}

	/// Set a callback that will be called whenever a line is transmitted or
	/// received.
	///
	/// If a previous callback was set, it is returned.
	///
	/// The session already logs every line via the [`log`] crate, so a callback
	/// is only needed when the lines are wanted directly, for instance to
	/// show them in an application.
	///
	/// ## Example
	///
	/// ```
	/// # use pcproto::{Direction, Session};
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut session = Session::open_serial("/dev/ttyUSB0")?;
	/// session.set_line_handler(|line, direction| {
	///     if direction == Direction::Recv {
	///         println!("{line}");
	///     }
	/// });
	/// session.info()?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn set_line_handler<F>(&mut self, callback: F) -> Option<LineHandler<'a>>
	where
		F: FnMut(&str, Direction) + 'a,
	{
		let callback: LineHandler<'a> = Box::new(callback);
		std::mem::replace(&mut self.line_handler, Some(callback))
	}

	/// Clear any callback registered via [`set_line_handler`](Session::set_line_handler) and return it.
	pub fn clear_line_handler(&mut self) -> Option<LineHandler<'a>> {
		self.line_handler.take()
	}

	/// Get the "name" of the session's backend, if it is open.
	///
	/// For serial sessions this is the path passed to [`Session::open_serial`].
	pub fn name(&self) -> Option<String> {
		self.backend.as_ref().and_then(Backend::name)
	}

	/// Get a reference to the backend, if the session is open.
	pub fn backend(&self) -> Option<&B> {
		self.backend.as_ref()
	}

	/// Get a mutable reference to the backend, if the session is open.
	pub fn backend_mut(&mut self) -> Option<&mut B> {
		self.backend.as_mut()
	}

	/// Whether the session is still open.
	pub fn is_open(&self) -> bool {
		self.backend.is_some()
	}

	/// Close the session, releasing the channel.
	///
	/// Closing an already closed session does nothing. Once closed, commands,
	/// queries, and timeout changes fail with a [`SessionClosedError`].
	pub fn close(&mut self) -> Result<(), Error> {
		let Some(mut backend) = self.backend.take() else {
			return Ok(());
		};
		let name = backend
			.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string());
		let flushed = backend.flush();
		drop(backend);
		log::info!("closed {name}");
		Ok(flushed?)
	}
}
