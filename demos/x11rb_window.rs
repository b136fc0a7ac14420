use std::process;
use x11rb::connection::Connection;
use xscope::{x11rb::X11rbWindow, Error, LoggingHandler, WindowConfig};

fn run() -> Result<(), Error> {
    let config = WindowConfig::from_env()?;
    let (conn, screen_num) = xscope::x11rb::connect(&config)?;
    let screen = &conn.setup().roots[screen_num];

    let mut window = X11rbWindow::create(&conn, screen, &config)?;
    window.map()?;

    let mut handler = LoggingHandler::default();
    window.run(&mut handler)
}

fn main() {
    pretty_env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        eprintln!("x11rb_window: {}", e);
        process::exit(1);
    }
}
