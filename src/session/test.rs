use std::{cell::RefCell, io, time::Duration};

use crate::{
	backend::{Backend, Mock},
	command::{CommandBuilder, Mnemonic, HELP_TERMINATOR, INFOS_TERMINATOR},
	error::Error,
	reply::{Decoding, Terminator},
	session::{Direction, Session},
	ttl::{Axis, Edge, PulseAt, TtlMode, TtlPort},
	unit::{Distance, Time},
};

/// Get the mock backend of an open session.
fn mock<'s>(session: &'s mut Session<'_, Mock>) -> &'s mut Mock {
	session.backend_mut().expect("session should be open")
}

/// Take everything written to the session's mock backend as a string.
fn written(session: &mut Session<'_, Mock>) -> String {
	String::from_utf8(mock(session).take_written()).unwrap()
}

/// Generate a test for each fire-and-forget method checking the exact line it writes.
///
/// The syntax is `<method>(<args>...) => <line>` where `<line>` excludes the
/// trailing line feed.
macro_rules! writes_line {
	($( $method:ident ( $($arg:expr),* ) => $line:literal ),+ $(,)?) => {
		paste::paste! {
			$(
				#[test]
				fn [< $method _writes_line >]() {
					let mut session = Session::open_mock();
					mock(&mut session).push_line("left alone");
					session.$method($($arg),*).unwrap();
					assert_eq!(written(&mut session), concat!($line, "\n"));
					// Nothing is read back.
					assert_eq!(session.drain().unwrap(), ["left alone"]);
				}
			)+
		}
	};
}

writes_line! {
	move_relative_x(Distance::um(-1.0)) => "MOVRX -1u",
	move_relative_y(Distance::nm(250.0)) => "MOVRY 250n",
	move_relative_xyz(Distance::um(1.0), Distance::um(1.0), Distance::um(0.0)) => "MRXYZ 1u 1u 0u",
	move_x(Distance::um(90.0)) => "MOVEX 90u",
	move_y(Distance::nm(1500.5)) => "MOVEY 1500.5n",
	move_xyz(Distance::um(10.0), Distance::um(20.0), Distance::um(30.0)) => "MOXYZ 10u 20u 30u",
	set_step_time(Time::ms(10.0)) => "STIME 10m",
	set_shooting_time(Time::us(500.0)) => "SHTIM 500u",
	set_x_waveform(100, Distance::um(0.0), Distance::um(100.0)) => "SWF_X 100 0u 100u",
	set_y_waveform(50, Distance::um(10.0), Distance::um(20.0)) => "SWF_Y 50 10u 20u",
	set_z_waveform(25, Distance::nm(0.0), Distance::nm(900.0)) => "SWF_Z 25 0n 900n",
	run_waveform() => "RUNWF",
	run_xyz() => "RUXYZ",
	run_xy() => "RUXY_",
	run_x() => "RUX__",
	run_y() => "RUY__",
	run_z() => "RUZ__",
	run_xyz_back_and_forth() => "REXYZ",
	run_xy_back_and_forth() => "REXY_",
	set_repeat_count(2) => "SWF_A 2",
	run_xyz_repeated() => "RXYZA",
	pause() => "PAUSE",
	play() => "PLAYY",
	stop() => "STOPP",
	allocate_3d(10) => "ARB3D 10",
	run_3d() => "RUN3D",
	add_3d(Distance::um(1.0), Distance::um(2.0), Distance::um(0.0)) => "ADD3D 1u 2u 0u",
	allocate_waveforms(10, 20, 0) => "ARBWF 10 20 0",
	add_point_x(Distance::um(5.0)) => "ADDPX 5u",
	add_point_y(Distance::um(6.0)) => "ADDPY 6u",
	add_point_z(Distance::um(7.0)) => "ADDPZ 7u",
	reset_outputs() => "_RAZ_",
	responses_off() => "REOFF",
	responses_on() => "RE_ON",
	quit_help() => "QUITT",
	configure_ttl_raw("1i1r") => "CHAIO 1i1r",
}

#[test]
fn configure_ttl_writes_port_and_mode() {
	let mut session = Session::open_mock();
	let port = TtlPort::try_from(2_u8).unwrap();
	let cases = [
		(TtlMode::Disabled, "CHAIO 2d\n"),
		(
			TtlMode::Input {
				axis: Axis::Y,
				edge: Edge::Falling,
			},
			"CHAIO 2i2f\n",
		),
		(
			TtlMode::Output {
				axis: Axis::X,
				at: PulseAt::Start,
			},
			"CHAIO 2o1s\n",
		),
		(
			TtlMode::Gate {
				axis: Axis::Z,
				start: 0,
				end: 49,
			},
			"CHAIO 2o3g0-49\n",
		),
	];
	for (mode, expected) in cases {
		session.configure_ttl(port, mode).unwrap();
		assert_eq!(written(&mut session), expected);
	}
}

#[test]
fn command_accepts_any_command_type() {
	let mut session = Session::open_mock();
	session.command("MOVEX 1u").unwrap();
	session.command(String::from("MOVEY 2u")).unwrap();
	session.command(Mnemonic::RunWaveform).unwrap();
	session
		.command(CommandBuilder::new(Mnemonic::MoveRelativeX).arg(Distance::nm(-5.0)))
		.unwrap();
	assert_eq!(
		written(&mut session),
		"MOVEX 1u\nMOVEY 2u\nRUNWF\nMOVRX -5n\n"
	);
}

#[test]
fn reserved_characters_are_never_written() {
	let mut session = Session::open_mock();
	let err = session.command("MOVEX 1u\nSTOPP").unwrap_err();
	assert!(matches!(err, Error::ReservedCharacter(_)), "{err:?}");
	let err = session.configure_ttl_raw("1d\r").unwrap_err();
	assert!(matches!(err, Error::ReservedCharacter(_)), "{err:?}");
	assert!(mock(&mut session).written().is_empty());
}

#[test]
fn position_x_stops_at_first_line_ending_in_m() {
	let mut session = Session::open_mock();
	{
		let backend = mock(&mut session);
		backend.push_line("moving...");
		backend.push_line("X position: 50.000 m");
		backend.push_line("not part of the reply");
	}
	let reply = session.position_x().unwrap();
	assert_eq!(written(&mut session), "GET_X\n");
	assert_eq!(reply.command(), "GET_X");
	assert_eq!(reply.lines(), ["moving...", "X position: 50.000 m"]);
	assert_eq!(reply.last(), "X position: 50.000 m");
	// The third line was not consumed.
	assert!(!mock(&mut session).is_empty());
	assert_eq!(session.drain().unwrap(), ["not part of the reply"]);
}

#[test]
fn position_y_stops_at_first_line_ending_in_m() {
	let mut session = Session::open_mock();
	{
		let backend = mock(&mut session);
		backend.push_line("moving...");
		backend.push_line("still moving...");
		backend.push_line("Y position: 20.000 m");
		backend.push_line("not part of the reply");
	}
	let reply = session.position_y().unwrap();
	assert_eq!(written(&mut session), "GET_Y\n");
	assert_eq!(
		reply.lines(),
		["moving...", "still moving...", "Y position: 20.000 m"]
	);
	assert_eq!(session.cached_position(), (None, Some(Distance::um(20.0))));
	assert_eq!(session.drain().unwrap(), ["not part of the reply"]);
}

#[test]
fn positions_are_cached() {
	let mut session = Session::open_mock();
	assert_eq!(session.cached_position(), (None, None));

	// The controller's µ is not valid UTF-8 and is dropped.
	mock(&mut session).append_data(b"12.500 \xb5m\r\n");
	let reply = session.position_x().unwrap();
	assert_eq!(reply.last(), "12.500 m");
	assert_eq!(reply.dropped_bytes(), 1);
	assert_eq!(session.cached_position(), (Some(Distance::um(12.5)), None));

	mock(&mut session).push_line("Y : 300 nm");
	session.position_y().unwrap();
	assert_eq!(
		session.cached_position(),
		(Some(Distance::um(12.5)), Some(Distance::nm(300.0)))
	);

	// A reply without a distance leaves the cache alone.
	mock(&mut session).push_line("out of range m");
	session.position_y().unwrap();
	assert_eq!(
		session.cached_position(),
		(Some(Distance::um(12.5)), Some(Distance::nm(300.0)))
	);
}

#[test]
fn empty_lines_are_skipped() {
	let mut session = Session::open_mock();
	mock(&mut session).append_data(b"\r\n  \r\n\nY position: 1.0 m\r\n");
	let reply = session.position_y().unwrap();
	assert_eq!(reply.lines(), ["Y position: 1.0 m"]);
}

#[test]
fn position_xyz_stops_at_third_axis() {
	let mut session = Session::open_mock();
	{
		let backend = mock(&mut session);
		backend.push_line("First Axis :");
		backend.push_line("50.000 m");
		backend.push_line("Second Axis :");
		backend.push_line("50.000 m");
		backend.push_line("Third Axis :");
		backend.push_line("0.000 m");
	}
	let reply = session.position_xyz().unwrap();
	assert_eq!(written(&mut session), "GEXYZ\n");
	assert_eq!(reply.lines().len(), 5);
	assert_eq!(reply.last(), "Third Axis :");
	assert_eq!(session.drain().unwrap(), ["0.000 m"]);
}

#[test]
fn step_time_stops_at_line_ending_in_s() {
	let mut session = Session::open_mock();
	mock(&mut session).push_line("Step time:");
	mock(&mut session).push_line("10 ms");
	let reply = session.step_time().unwrap();
	assert_eq!(written(&mut session), "GTIME\n");
	assert_eq!(reply.last(), "10 ms");
}

#[test]
fn info_terminator_is_case_sensitive() {
	let mut session = Session::open_mock();
	session.set_reply_timeout(Duration::from_millis(200)).unwrap();
	{
		let backend = mock(&mut session);
		backend.push_line("Piezo Concept LF2");
		backend.push_line("travel range y : 100 m");
	}
	let err = session.info().unwrap_err();
	match err {
		Error::ReplyTimeout(e) => {
			assert_eq!(e.command(), "INFOS");
			assert_eq!(e.lines(), ["Piezo Concept LF2", "travel range y : 100 m"]);
		}
		other => panic!("unexpected error {other:?}"),
	}

	mock(&mut session).push_line("Travel range X : 100 m");
	mock(&mut session).push_line(INFOS_TERMINATOR);
	let reply = session.info().unwrap();
	assert_eq!(reply.lines().len(), 2);
	assert_eq!(reply.last(), INFOS_TERMINATOR);
}

#[test]
fn help_terminator_is_case_sensitive() {
	let mut session = Session::open_mock();
	session.set_reply_timeout(Duration::from_millis(200)).unwrap();
	mock(&mut session).push_line("to exit the help menu please write quitt");
	assert!(session.help().unwrap_err().is_timeout());

	mock(&mut session).push_line("MOVEX: absolute move");
	mock(&mut session).push_line(HELP_TERMINATOR);
	let reply = session.help().unwrap();
	assert_eq!(reply.last(), HELP_TERMINATOR);
	assert_eq!(written(&mut session), "HELP_\nHELP_\n");
}

#[test]
fn ttl_status_terminator_ignores_case() {
	let mut session = Session::open_mock();
	{
		let backend = mock(&mut session);
		backend.push_line("TTL 3 : output on step 25");
		backend.push_line("AXIS2");
	}
	let reply = session.ttl_status(TtlPort::try_from(3_u8).unwrap()).unwrap();
	assert_eq!(written(&mut session), "DISIO 3\n");
	assert_eq!(reply.last(), "AXIS2");

	// A line merely containing an axis name does not end the reply.
	session.set_reply_timeout(Duration::ZERO).unwrap();
	mock(&mut session).push_line("axis1 rising");
	assert!(session.ttl_status(TtlPort::try_from(1_u8).unwrap()).is_err());
}

#[test]
fn query_with_custom_terminators() {
	let mut session = Session::open_mock();
	mock(&mut session).push_line("a");
	mock(&mut session).push_line("DONE");
	let reply = session
		.query("CUSTM", |line: &str| line == "DONE")
		.unwrap();
	assert_eq!(reply.command(), "CUSTM");
	assert_eq!(reply.lines(), ["a", "DONE"]);

	mock(&mut session).push_line("Third Axis :");
	let reply = session
		.query(Mnemonic::GetXyz, Terminator::exact("Third Axis :"))
		.unwrap();
	assert_eq!(reply.lines().len(), 1);
}

#[test]
fn known_query_rejects_commands_without_replies() {
	let mut session = Session::open_mock();
	let err = session.known_query(Mnemonic::MoveX).unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)), "{err:?}");
	assert!(mock(&mut session).written().is_empty());
}

#[test]
fn recenter() {
	let mut session = Session::open_mock();
	mock(&mut session).push_line("X position: 50.000 m");
	mock(&mut session).push_line("Y position: 49.998 m");
	let (x, y) = session.recenter().unwrap();
	assert_eq!(
		written(&mut session),
		"MOVEX 50u\nMOVEY 50u\nGET_X\nGET_Y\n"
	);
	assert_eq!(x.last(), "X position: 50.000 m");
	assert_eq!(y.last(), "Y position: 49.998 m");
	assert_eq!(
		session.cached_position(),
		(Some(Distance::um(50.0)), Some(Distance::um(49.998)))
	);
}

#[test]
fn reply_timeout_keeps_partial_reply() {
	let mut session = Session::open_mock();
	session.set_reply_timeout(Duration::ZERO).unwrap();
	mock(&mut session).push_line("moving...");
	let err = session.position_x().unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(err.partial_reply(), Some(&["moving...".to_string()][..]));
	// The session is still usable.
	mock(&mut session).push_line("X position: 1.0 m");
	assert!(session.position_x().is_ok());
}

#[test]
fn reply_timeout_bounds_a_stream_of_lines() {
	let mut session = Session::open_mock();
	session.set_reply_timeout(Duration::ZERO).unwrap();
	{
		let backend = mock(&mut session);
		for _ in 0..3 {
			backend.push_line("moving...");
		}
		backend.push_line("X position: 50.000 m");
	}
	let err = session.position_x().unwrap_err();
	assert!(err.is_timeout(), "{err:?}");
	assert_eq!(err.partial_reply(), Some(&["moving...".to_string()][..]));
	assert_eq!(session.cached_position(), (None, None));
	assert_eq!(
		session.drain().unwrap(),
		["moving...", "moving...", "X position: 50.000 m"]
	);
}

#[test]
fn channel_closed_before_end_of_reply() {
	let mut session = Session::open_mock();
	mock(&mut session).push_line("Piezo Concept");
	mock(&mut session).hang_up();
	let err = session.info().unwrap_err();
	match err {
		Error::ChannelClosed(e) => {
			assert_eq!(e.command(), "INFOS");
			assert_eq!(e.into_lines(), ["Piezo Concept"]);
		}
		other => panic!("unexpected error {other:?}"),
	}
}

#[test]
fn io_errors_are_propagated() {
	let mut session = Session::open_mock();
	mock(&mut session).write_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
	assert!(session.move_x(Distance::um(1.0)).unwrap_err().is_io());

	mock(&mut session).read_error(Some(io::Error::new(io::ErrorKind::Other, "bad")));
	let err = session.position_x().unwrap_err();
	assert!(err.is_io() && !err.is_timeout(), "{err:?}");
}

#[test]
fn strict_decoding_reports_invalid_bytes() {
	let mut session = Session::open_mock();
	assert_eq!(session.set_decoding(Decoding::Strict), Decoding::Lossy);
	mock(&mut session).append_data(b"50.000 \xb5m\r\n");
	let err = session.position_x().unwrap_err();
	match err {
		Error::Decode(e) => assert_eq!(e.as_bytes(), b"50.000 \xb5m\r"),
		other => panic!("unexpected error {other:?}"),
	}

	session.set_decoding(Decoding::Lossy);
	mock(&mut session).append_data(b"50.000 \xb5m\r\n");
	assert_eq!(session.position_x().unwrap().dropped_bytes(), 1);
}

#[test]
fn remote_rejections() {
	let mut session = Session::open_mock();
	session.move_x(Distance::um(150.0)).unwrap();
	mock(&mut session).push_line("Error: value out of range");
	let err = session.drain().unwrap_err();
	match err {
		Error::RemoteRejection(e) => {
			assert_eq!(e.command(), "drain");
			assert_eq!(e.line(), "Error: value out of range");
		}
		other => panic!("unexpected error {other:?}"),
	}

	mock(&mut session).push_line("ERROR unknown command");
	let err = session.position_x().unwrap_err();
	assert!(matches!(err, Error::RemoteRejection(_)), "{err:?}");

	// A custom check.
	session.set_rejection_check(|line| line.contains("out of range"));
	mock(&mut session).push_line("X out of range m");
	assert!(session.position_x().is_err());

	// No check at all.
	assert!(session.clear_rejection_check().is_some());
	mock(&mut session).push_line("Error m");
	assert_eq!(session.position_x().unwrap().last(), "Error m");
}

#[test]
fn rejected_reply_is_read_to_its_end() {
	let mut session = Session::open_mock();
	session.move_x(Distance::um(150.0)).unwrap();
	mock(&mut session).push_line("Error: value out of range");
	mock(&mut session).push_line("X position: 50.000 m");
	let err = session.position_x().unwrap_err();
	match err {
		Error::RemoteRejection(e) => {
			assert_eq!(e.command(), "GET_X");
			assert_eq!(e.line(), "Error: value out of range");
		}
		other => panic!("unexpected error {other:?}"),
	}
	assert!(mock(&mut session).is_empty());

	// The next query only sees its own reply.
	mock(&mut session).push_line("Y position: 20.000 m");
	let reply = session.position_y().unwrap();
	assert_eq!(reply.lines(), ["Y position: 20.000 m"]);
	assert_eq!(session.cached_position(), (None, Some(Distance::um(20.0))));
}

#[test]
fn undecodable_reply_is_read_to_its_end() {
	let mut session = Session::open_mock();
	session.set_decoding(Decoding::Strict);
	{
		let backend = mock(&mut session);
		backend.push_line("First Axis :");
		backend.append_data(b"50.000 \xb5m\r\n");
		backend.push_line("Second Axis :");
		backend.push_line("50.000 m");
		backend.push_line("Third Axis :");
	}
	let err = session.position_xyz().unwrap_err();
	assert!(matches!(err, Error::Decode(_)), "{err:?}");
	assert!(mock(&mut session).is_empty());

	mock(&mut session).push_line("Y position: 20.000 m");
	let reply = session.position_y().unwrap();
	assert_eq!(reply.lines(), ["Y position: 20.000 m"]);
}

#[test]
fn non_finite_arguments_are_never_written() {
	let mut session = Session::open_mock();
	let err = session.move_x(Distance::um(f64::NAN)).unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)), "{err:?}");
	let err = session.set_step_time(Time::ms(f64::INFINITY)).unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)), "{err:?}");
	assert!(mock(&mut session).written().is_empty());
}

#[test]
fn drain_returns_pending_lines() {
	let mut session = Session::open_mock();
	assert!(session.drain().unwrap().is_empty());
	mock(&mut session).push_line("ok");
	mock(&mut session).append_data(b"\r\npartial");
	assert_eq!(session.drain().unwrap(), ["ok", "partial"]);
	assert!(mock(&mut session).is_empty());
}

#[test]
fn line_handler_sees_every_line() {
	let seen = RefCell::new(Vec::new());
	let mut session = Session::open_mock();
	session.set_line_handler(|line, direction| {
		seen.borrow_mut().push((line.to_string(), direction));
	});
	mock(&mut session).push_line("");
	mock(&mut session).push_line("X position: 2.0 m");
	session.position_x().unwrap();
	assert!(session.clear_line_handler().is_some());
	session.stop().unwrap();
	drop(session);

	assert_eq!(
		seen.into_inner(),
		[
			("GET_X".to_string(), Direction::Tx),
			("X position: 2.0 m".to_string(), Direction::Recv),
		]
	);
}

#[test]
fn close_is_idempotent() {
	let mut session = Session::open_mock();
	assert!(session.is_open());
	session.close().unwrap();
	assert!(!session.is_open());
	session.close().unwrap();
	assert!(session.backend().is_none());
	assert!(session.name().is_none());
}

#[test]
fn operations_after_close_fail() {
	let mut session = Session::open_mock();
	session.close().unwrap();

	let err = session.move_x(Distance::um(90.0)).unwrap_err();
	match err {
		Error::SessionClosed(e) => assert_eq!(e.operation(), "send MOVEX"),
		other => panic!("unexpected error {other:?}"),
	}
	assert!(matches!(session.position_x(), Err(Error::SessionClosed(_))));
	assert!(matches!(session.drain(), Err(Error::SessionClosed(_))));
	assert!(matches!(
		session.set_read_timeout(None),
		Err(Error::SessionClosed(_))
	));
	assert!(matches!(session.read_timeout(), Err(Error::SessionClosed(_))));
	assert!(matches!(
		session.set_reply_timeout(Duration::ZERO),
		Err(Error::SessionClosed(_))
	));
	assert!(matches!(
		session.timeout_guard(None),
		Err(Error::SessionClosed(_))
	));
	// Nothing was disturbed by the failed calls.
	assert_eq!(session.reply_timeout(), Duration::from_secs(10));
	session.close().unwrap();
}

#[test]
fn read_timeout() {
	let mut session = Session::open_mock();
	let old = session.set_read_timeout(Some(Duration::from_millis(5))).unwrap();
	assert_eq!(old, Some(Duration::ZERO));
	assert_eq!(session.read_timeout().unwrap(), Some(Duration::from_millis(5)));
	assert_eq!(
		session.set_reply_timeout(Duration::from_secs(1)).unwrap(),
		Duration::from_secs(10)
	);
	assert_eq!(session.reply_timeout(), Duration::from_secs(1));
}

#[test]
fn timeout_guard_restores_timeout() {
	let mut session = Session::open_mock();
	session.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
	{
		let mut guard = session.timeout_guard(Some(Duration::from_millis(1))).unwrap();
		assert_eq!(guard.read_timeout().unwrap(), Some(Duration::from_millis(1)));
		guard.stop().unwrap();
	}
	assert_eq!(session.read_timeout().unwrap(), Some(Duration::from_secs(1)));
	assert_eq!(written(&mut session), "STOPP\n");
}

#[test]
fn timeout_guard_poisons_session_when_restore_fails() {
	let mut session = Session::open_mock();
	{
		let mut guard = session.timeout_guard(None).unwrap();
		mock(&mut guard).set_read_timeout_error(Some(io::Error::new(
			io::ErrorKind::Other,
			"cannot set timeout",
		)));
	}
	// The poison is reported once, by the next operation.
	let err = session.stop().unwrap_err();
	assert!(err.is_io(), "{err:?}");
	session.stop().unwrap();
	assert_eq!(written(&mut session), "STOPP\n");
}

#[test]
fn closing_inside_a_timeout_guard() {
	let mut session = Session::open_mock();
	{
		let mut guard = session.timeout_guard(None).unwrap();
		guard.close().unwrap();
	}
	assert!(!session.is_open());
}

#[test]
fn dyn_backend() {
	let mut session: Session<'_, Box<dyn Backend>> = Session::from_backend(
		Box::new(Mock::new()),
		Duration::ZERO,
		Decoding::Lossy,
	);
	session.play().unwrap();
	assert!(session.name().is_some_and(|name| name.starts_with("<mock")));
	let err = session.step_time().unwrap_err();
	assert!(err.is_timeout() || err.is_io(), "{err:?}");
}
