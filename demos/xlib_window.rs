use std::process;
use x11_dl::xlib::Xlib;
use xscope::{
    xlib::{PlainLookup, XlibDisplay, XlibWindow},
    Error, LoggingHandler, WindowConfig,
};

fn run() -> Result<(), Error> {
    let config = WindowConfig::from_env()?;
    let xlib = Xlib::open()?;

    let display = XlibDisplay::open(&xlib, config.display.as_deref())?;
    let window = XlibWindow::create(&display, &config)?;
    window.map();

    let mut handler = LoggingHandler::default();
    window.run(&mut handler, &mut PlainLookup::new(&xlib));

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        eprintln!("xlib_window: {}", e);
        process::exit(1);
    }
}
