use std::process;
use x11_dl::xlib::Xlib;
use xscope::{
    xlib::{set_locale, InputContext, InputMethod, XlibDisplay, XlibWindow},
    Error, InputStyle, LoggingHandler, WindowConfig,
};

fn run() -> Result<(), Error> {
    let config = WindowConfig::from_env()?;
    let xlib = Xlib::open()?;

    set_locale(&xlib, &config.locale_modifiers)?;

    let display = XlibDisplay::open(&xlib, config.display.as_deref())?;
    let window = XlibWindow::create(&display, &config)?;

    let im = InputMethod::open(&display)?;
    let styles = im.supported_styles()?;
    let style = InputStyle::pick(&styles).ok_or(Error::OperationFailed("input style negotiation"))?;

    let mut ic = InputContext::create(&im, &window, style, LoggingHandler::default())?;
    window.map();

    let mut handler = LoggingHandler::default();
    window.run(&mut handler, &mut ic);

    log::info!("Last preedit: {:?}", ic.preedit().text());

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        eprintln!("xlib_ime: {}", e);
        process::exit(1);
    }
}
