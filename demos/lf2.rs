//! Example program driving a Piezo Concept LF2 controller.
use pcproto::{Axis, Distance, PulseAt, Session, TtlMode, TtlPort};
use simple_logger::SimpleLogger;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let mut session = Session::open_serial(&path)?;

    // Print the controller information.
    for line in session.info()?.lines() {
        println!("{line}");
    }

    // Pulse TTL 1 at the end of every X motion and check the setup.
    let port = TtlPort::try_from(1_u8)?;
    session.configure_ttl(
        port,
        TtlMode::Output {
            axis: Axis::X,
            at: PulseAt::End,
        },
    )?;
    println!("{}", session.ttl_status(port)?.last());

    // Nudge X and report where it ended up.
    session.recenter()?;
    session.move_relative_x(Distance::um(-1.0))?;
    std::thread::sleep(std::time::Duration::from_secs(1));
    session.position_x()?;
    if let (Some(x), Some(y)) = session.cached_position() {
        println!("X: {x}, Y: {y}");
    }

    session.close()?;
    Ok(())
}
