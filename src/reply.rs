//! Types for recognising and holding the controller's text replies.
//!
//! The controller does not frame its replies: a reply is simply a run of
//! lines, and the only way to know it has ended is to recognise its last
//! line. How the last line is recognised depends on the command, so it is
//! expressed as a strategy value implementing [`EndOfReply`]. The built-in
//! [`Terminator`] covers the controller's commands, and any
//! `Fn(&str) -> bool` closure can be used for anything else.
//!
//! ```
//! use pcproto::{EndOfReply, Terminator};
//!
//! assert!(Terminator::EndsWith('m').is_end("50.000 m"));
//! assert!(Terminator::exact("Third Axis :").is_end("Third Axis :"));
//! assert!(Terminator::OneOfIgnoreCase(&["axis1"]).is_end("AXIS1"));
//! assert!((|line: &str| line.starts_with("Done")).is_end("Done."));
//! ```

use crate::unit::{Distance, LengthUnit};
use std::borrow::Cow;

/// Decides whether a (trimmed, non-empty) line is the last line of a reply.
pub trait EndOfReply {
	/// Return `true` if `line` ends the reply.
	fn is_end(&self, line: &str) -> bool;
}

impl<F: Fn(&str) -> bool> EndOfReply for F {
	fn is_end(&self, line: &str) -> bool {
		(self)(line)
	}
}

/// The ways the controller's replies end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Terminator {
	/// The line's last character is the given character.
	EndsWith(char),
	/// The line equals the given text exactly (case sensitive).
	Exact(Cow<'static, str>),
	/// The line, lower-cased, is one of the given words.
	///
	/// The words themselves should be lower case.
	OneOfIgnoreCase(&'static [&'static str]),
}

impl Terminator {
	/// A terminator matching `text` exactly.
	pub fn exact<S: Into<Cow<'static, str>>>(text: S) -> Terminator {
		Terminator::Exact(text.into())
	}
}

impl EndOfReply for Terminator {
	fn is_end(&self, line: &str) -> bool {
		match self {
			Terminator::EndsWith(c) => line.ends_with(*c),
			Terminator::Exact(text) => line == &**text,
			Terminator::OneOfIgnoreCase(words) => {
				let lower = line.to_lowercase();
				words.iter().any(|word| *word == lower)
			}
		}
	}
}

/// How bytes that are not valid UTF-8 are handled when decoding a reply line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Decoding {
	/// Drop the invalid bytes and keep the rest of the line.
	///
	/// The number of dropped bytes is recorded in the [`Reply`] and logged.
	/// This is the default, as the controller sends the `µ` of `µm` as a
	/// single non-UTF-8 byte.
	#[default]
	Lossy,
	/// Fail with a [`DecodeError`](crate::error::DecodeError).
	Strict,
}

/// Decode a raw line leniently, returning the text and the number of bytes dropped.
pub(crate) fn decode_lossy(bytes: &[u8]) -> (String, usize) {
	let mut text = String::with_capacity(bytes.len());
	let mut dropped = 0;
	for chunk in bytes.utf8_chunks() {
		text.push_str(chunk.valid());
		dropped += chunk.invalid().len();
	}
	(text, dropped)
}

/// The lines of a reply to a query command.
///
/// Empty lines are not kept. The last line is the one that ended the reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reply {
	/// The command the reply answers.
	command: String,
	/// The non-empty, trimmed lines, in the order received.
	lines: Vec<String>,
	/// How many undecodable bytes were dropped across all lines.
	dropped_bytes: usize,
}

impl Reply {
	pub(crate) fn new(command: String, lines: Vec<String>, dropped_bytes: usize) -> Self {
		debug_assert!(!lines.is_empty());
		Reply {
			command,
			lines,
			dropped_bytes,
		}
	}

	/// The name of the command the reply answers.
	pub fn command(&self) -> &str {
		&self.command
	}

	/// All lines of the reply, including the last.
	pub fn lines(&self) -> &[String] {
		&self.lines
	}

	/// The line that ended the reply.
	pub fn last(&self) -> &str {
		self.lines.last().map_or("", String::as_str)
	}

	/// The lines received before the one that ended the reply.
	pub fn preceding(&self) -> &[String] {
		&self.lines[..self.lines.len().saturating_sub(1)]
	}

	/// How many undecodable bytes were dropped while decoding the reply.
	pub fn dropped_bytes(&self) -> usize {
		self.dropped_bytes
	}

	/// Consume the reply and return its lines.
	pub fn into_lines(self) -> Vec<String> {
		self.lines
	}

	/// Parse a distance from the line that ended the reply.
	///
	/// The distance is the last number on the line followed by its unit, e.g.
	/// `X position: 50.000 µm` or, with the `µ` dropped, `50.000 m`. Returns
	/// `None` if the line does not end with a number and a length unit.
	pub fn distance(&self) -> Option<Distance> {
		parse_distance(self.last())
	}
}

/// Find the last `<number> <unit>` pair on a line.
///
/// The unit may also be attached to the number (`50.000um`).
fn parse_distance(line: &str) -> Option<Distance> {
	let mut words = line.split_whitespace().rev();
	let last = words.next()?;
	if let Some(unit) = LengthUnit::from_reply_text(last) {
		let value = words.next()?.parse().ok()?;
		return Some(Distance::new(value, unit));
	}
	let split = last.find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))?;
	let (number, unit) = last.split_at(split);
	let unit = LengthUnit::from_reply_text(unit)?;
	Some(Distance::new(number.parse().ok()?, unit))
}
