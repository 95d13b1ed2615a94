//! Callbacks a session invokes while it exchanges lines with the controller.
#[cfg(doc)]
use super::Session;
use super::Direction;

/// A callback that is called after a line is either transmitted or received.
///
/// Received lines are passed trimmed. Empty lines are not passed.
///
/// See [`Session::set_line_handler`] for more details.
pub type LineHandler<'a> = Box<dyn FnMut(&str, Direction) + 'a>;

/// A predicate deciding whether a received line is the controller rejecting
/// the last command.
///
/// See [`Session::set_rejection_check`] for more details.
pub type RejectionCheck<'a> = Box<dyn Fn(&str) -> bool + 'a>;

/// The rejection check sessions start with: any line starting with `error`,
/// ignoring case.
pub fn is_error_line(line: &str) -> bool {
    line.get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("error"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_lines() {
        assert!(is_error_line("Error: out of range"));
        assert!(is_error_line("ERROR"));
        assert!(!is_error_line("X position: 50.000 m"));
        assert!(!is_error_line("err"));
        assert!(!is_error_line(""));
        // Multi-byte characters at the boundary must not panic.
        assert!(!is_error_line("erro\u{b5}"));
    }
}
