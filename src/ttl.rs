//! Typed parameters for the controller's four TTL I/O ports.
//!
//! `CHAIO` takes a compact parameter made of the port number followed by a
//! mode, e.g. `1i1r` (port 1, input, axis 1, rising edge). [`TtlMode`] renders
//! the mode part:
//!
//! ```
//! use pcproto::{Axis, Edge, TtlMode, TtlPort};
//!
//! let port = TtlPort::try_from(1_u8)?;
//! let mode = TtlMode::Input { axis: Axis::X, edge: Edge::Rising };
//! assert_eq!(format!("{port}{mode}"), "1i1r");
//! # Ok::<(), pcproto::error::InvalidArgumentError>(())
//! ```

use crate::error::InvalidArgumentError;
use std::fmt;

/// One of the controller's TTL ports, numbered 1 to 4.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TtlPort(u8);

impl TtlPort {
	/// The lowest port number.
	pub const MIN: u8 = 1;
	/// The highest port number.
	pub const MAX: u8 = 4;

	/// The port number.
	pub const fn get(self) -> u8 {
		self.0
	}
}

impl TryFrom<u8> for TtlPort {
	type Error = InvalidArgumentError;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		if (TtlPort::MIN..=TtlPort::MAX).contains(&value) {
			Ok(TtlPort(value))
		} else {
			Err(InvalidArgumentError::new(format!(
				"TTL port {value} is not in the range {}-{}",
				TtlPort::MIN,
				TtlPort::MAX
			)))
		}
	}
}

impl fmt::Display for TtlPort {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A stage axis, as numbered by the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Axis {
	/// Axis 1.
	X,
	/// Axis 2.
	Y,
	/// Axis 3.
	Z,
}

impl Axis {
	/// The axis number used on the wire.
	pub const fn number(self) -> u8 {
		match self {
			Axis::X => 1,
			Axis::Y => 2,
			Axis::Z => 3,
		}
	}
}

impl fmt::Display for Axis {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.number())
	}
}

/// The edge of an input signal that triggers motion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Edge {
	/// Trigger on the rising edge (`r`).
	Rising,
	/// Trigger on the falling edge (`f`).
	Falling,
}

/// When an output pulse is generated relative to a motion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PulseAt {
	/// At the start of the motion (`s`).
	Start,
	/// At the end of the motion (`e`).
	End,
}

/// The configuration of a TTL port.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TtlMode {
	/// The port is not used.
	Disabled,
	/// The port is an input triggering motion of `axis`.
	Input {
		/// The axis to trigger.
		axis: Axis,
		/// The triggering edge.
		edge: Edge,
	},
	/// The port outputs a pulse for every motion of `axis`.
	Output {
		/// The axis generating pulses.
		axis: Axis,
		/// Whether pulses mark the start or the end of a motion.
		at: PulseAt,
	},
	/// The port outputs a pulse when `axis` reaches waveform step `step`.
	OutputAtStep {
		/// The axis generating pulses.
		axis: Axis,
		/// The zero based step number.
		step: u32,
	},
	/// The port is held high while `axis` is between steps `start` and `end`.
	Gate {
		/// The axis generating the gate.
		axis: Axis,
		/// The zero based first step of the gate.
		start: u32,
		/// The zero based last step of the gate.
		end: u32,
	},
}

impl fmt::Display for TtlMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			TtlMode::Disabled => f.write_str("d"),
			TtlMode::Input { axis, edge } => {
				let edge = match edge {
					Edge::Rising => 'r',
					Edge::Falling => 'f',
				};
				write!(f, "i{axis}{edge}")
			}
			TtlMode::Output { axis, at } => {
				let at = match at {
					PulseAt::Start => 's',
					PulseAt::End => 'e',
				};
				write!(f, "o{axis}{at}")
			}
			TtlMode::OutputAtStep { axis, step } => write!(f, "o{axis}n{step}"),
			TtlMode::Gate { axis, start, end } => write!(f, "o{axis}g{start}-{end}"),
		}
	}
}
