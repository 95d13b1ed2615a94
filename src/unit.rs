//! Typed quantities and the unit suffixes the controller understands.
//!
//! Every distance or time sent to the controller is written as a number
//! immediately followed by a one character unit suffix, e.g. `90u` or `500n`.
//! [`Distance`] and [`Time`] carry the value together with its unit so that a
//! malformed suffix can never be produced.
//!
//! ```
//! use pcproto::{Distance, LengthUnit};
//!
//! let d = Distance::um(90.0);
//! assert_eq!(d.to_string(), "90u");
//! assert_eq!(d.to_nanometers(), 90_000.0);
//! assert_eq!(d.to(LengthUnit::Nanometer).to_string(), "90000n");
//! ```

use std::fmt;
use std::time::Duration;

/// The length units accepted by the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum LengthUnit {
	/// Nanometres (`n`), the controller's default.
	#[default]
	Nanometer,
	/// Micrometres (`u`).
	Micrometer,
}

impl LengthUnit {
	/// The suffix appended to a value on the wire.
	pub const fn suffix(self) -> char {
		match self {
			LengthUnit::Nanometer => 'n',
			LengthUnit::Micrometer => 'u',
		}
	}

	/// How many nanometres one of this unit is.
	pub const fn nanometers(self) -> f64 {
		match self {
			LengthUnit::Nanometer => 1.0,
			LengthUnit::Micrometer => 1e3,
		}
	}

	/// Parse a unit as the controller prints it in replies.
	///
	/// The controller prints micrometres with a `µ` that is not valid UTF-8
	/// on the wire, so once it is dropped a bare `m` means micrometres.
	pub(crate) fn from_reply_text(text: &str) -> Option<LengthUnit> {
		match text {
			"nm" | "n" => Some(LengthUnit::Nanometer),
			"um" | "µm" | "u" | "m" => Some(LengthUnit::Micrometer),
			_ => None,
		}
	}
}

/// The time units accepted by the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum TimeUnit {
	/// Microseconds (`u`).
	Microsecond,
	/// Milliseconds (`m`), the controller's default.
	#[default]
	Millisecond,
}

impl TimeUnit {
	/// The suffix appended to a value on the wire.
	pub const fn suffix(self) -> char {
		match self {
			TimeUnit::Microsecond => 'u',
			TimeUnit::Millisecond => 'm',
		}
	}

	/// How many microseconds one of this unit is.
	pub const fn microseconds(self) -> f64 {
		match self {
			TimeUnit::Microsecond => 1.0,
			TimeUnit::Millisecond => 1e3,
		}
	}
}

/// A distance along an axis.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Distance {
	value: f64,
	unit: LengthUnit,
}

impl Distance {
	/// Create a distance with the given value and unit.
	pub const fn new(value: f64, unit: LengthUnit) -> Self {
		Distance { value, unit }
	}

	/// A distance in nanometres.
	pub const fn nm(value: f64) -> Self {
		Distance::new(value, LengthUnit::Nanometer)
	}

	/// A distance in micrometres.
	pub const fn um(value: f64) -> Self {
		Distance::new(value, LengthUnit::Micrometer)
	}

	/// The numeric value, in [`unit`](Self::unit)s.
	pub const fn value(self) -> f64 {
		self.value
	}

	/// The unit the value is expressed in.
	pub const fn unit(self) -> LengthUnit {
		self.unit
	}

	/// The distance in nanometres.
	pub fn to_nanometers(self) -> f64 {
		self.value * self.unit.nanometers()
	}

	/// Whether the value is a finite number the controller can parse.
	pub fn is_finite(self) -> bool {
		self.value.is_finite()
	}

	/// The same distance expressed in another unit.
	#[must_use]
	pub fn to(self, unit: LengthUnit) -> Distance {
		Distance::new(self.to_nanometers() / unit.nanometers(), unit)
	}
}

impl fmt::Display for Distance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.value, self.unit.suffix())
	}
}

/// A time interval, such as the time between two waveform points.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Time {
	value: f64,
	unit: TimeUnit,
}

impl Time {
	/// Create a time with the given value and unit.
	pub const fn new(value: f64, unit: TimeUnit) -> Self {
		Time { value, unit }
	}

	/// A time in microseconds.
	pub const fn us(value: f64) -> Self {
		Time::new(value, TimeUnit::Microsecond)
	}

	/// A time in milliseconds.
	pub const fn ms(value: f64) -> Self {
		Time::new(value, TimeUnit::Millisecond)
	}

	/// The numeric value, in [`unit`](Self::unit)s.
	pub const fn value(self) -> f64 {
		self.value
	}

	/// The unit the value is expressed in.
	pub const fn unit(self) -> TimeUnit {
		self.unit
	}

	/// The time in microseconds.
	pub fn to_microseconds(self) -> f64 {
		self.value * self.unit.microseconds()
	}

	/// Whether the value is a finite number the controller can parse.
	pub fn is_finite(self) -> bool {
		self.value.is_finite()
	}

	/// Convert to a [`Duration`]. Negative times saturate to zero.
	///
	/// Returns `None` if the time is not finite or does not fit in a `Duration`.
	pub fn to_duration(self) -> Option<Duration> {
		let seconds = self.to_microseconds() / 1e6;
		if seconds.is_nan() {
			return None;
		}
		Duration::try_from_secs_f64(seconds.max(0.0)).ok()
	}
}

impl From<Duration> for Time {
	/// Express a `Duration` in whole microseconds.
	#[allow(clippy::cast_precision_loss)]
	fn from(duration: Duration) -> Self {
		Time::us(duration.as_micros() as f64)
	}
}

impl fmt::Display for Time {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.value, self.unit.suffix())
	}
}
