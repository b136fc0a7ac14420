mod ime;

pub use self::ime::{set_locale, InputContext, InputMethod};

use crate::{
    atoms::Atoms,
    config::{ConfigError, WindowConfig},
    error::{check, Error},
    event::{EventDetail, EventKind, EventSummary, InputEvents, Modifiers},
    handler::{ComposedText, Flow, WindowHandler},
    ScopedHandle,
};
use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::mem::MaybeUninit;
use std::os::raw::{c_char, c_int, c_long, c_uchar, c_uint};
use std::ptr;
use x11_dl::xlib;

pub(crate) fn c_string(s: &str, what: &'static str) -> Result<CString, Error> {
    CString::new(s).map_err(|_| ConfigError::NulByte(what).into())
}

pub(crate) fn keysym_name(xlib: &xlib::Xlib, keysym: xlib::KeySym) -> Option<String> {
    if keysym == 0 {
        return None;
    }

    // Points into static Xlib tables, not freed.
    let name = unsafe { (xlib.XKeysymToString)(keysym) };
    if name.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
    }
}

/// A display connection closed with `XCloseDisplay` on drop.
pub struct XlibDisplay<'x> {
    xlib: &'x xlib::Xlib,
    display: ScopedHandle<'x, *mut xlib::Display>,
    screen: c_int,
    atoms: Atoms<xlib::Atom>,
}

impl<'x> XlibDisplay<'x> {
    pub fn open(xlib: &'x xlib::Xlib, name: Option<&str>) -> Result<Self, Error> {
        let name = name.map(|n| c_string(n, "display name")).transpose()?;
        let raw = unsafe { (xlib.XOpenDisplay)(name.as_ref().map_or(ptr::null(), |n| n.as_ptr())) };

        let display = ScopedHandle::new(raw, move |d: &mut *mut xlib::Display| {
            if !d.is_null() {
                log::trace!("Close display");
                // The return value carries no documented meaning.
                unsafe { (xlib.XCloseDisplay)(*d) };
            }
        });
        check(!display.is_null(), "XOpenDisplay")?;

        let screen = unsafe { (xlib.XDefaultScreen)(display.get()) };
        log::info!("Display opened, default screen {}", screen);

        let atoms = Atoms::new_null::<Error, _>(|name| {
            let atom =
                unsafe { (xlib.XInternAtom)(display.get(), name.as_ptr() as *const c_char, xlib::False) };
            check(atom != 0, "XInternAtom")?;
            Ok(atom)
        })?;

        Ok(Self {
            xlib,
            display,
            screen,
            atoms,
        })
    }

    #[inline]
    pub fn xlib(&self) -> &'x xlib::Xlib {
        self.xlib
    }

    #[inline]
    pub fn raw(&self) -> *mut xlib::Display {
        self.display.get()
    }

    #[inline]
    pub fn atoms(&self) -> &Atoms<xlib::Atom> {
        &self.atoms
    }

    pub fn root(&self) -> xlib::Window {
        unsafe { (self.xlib.XRootWindow)(self.raw(), self.screen) }
    }

    pub fn black_pixel(&self) -> std::os::raw::c_ulong {
        unsafe { (self.xlib.XBlackPixel)(self.raw(), self.screen) }
    }

    pub fn white_pixel(&self) -> std::os::raw::c_ulong {
        unsafe { (self.xlib.XWhitePixel)(self.raw(), self.screen) }
    }

    pub fn flush(&self) {
        unsafe { (self.xlib.XFlush)(self.raw()) };
    }

    /// Blocks until the server delivers the next event.
    pub fn next_event(&self) -> xlib::XEvent {
        let mut e = MaybeUninit::uninit();
        unsafe {
            (self.xlib.XNextEvent)(self.raw(), e.as_mut_ptr());
            e.assume_init()
        }
    }
}

/// Turns key presses into text.
pub trait TextInput {
    /// Returns `true` when the event was consumed by the input method.
    fn filter(&mut self, _event: &mut xlib::XEvent) -> bool {
        false
    }
    fn focus_in(&mut self) {}
    fn focus_out(&mut self) {}
    fn lookup(&mut self, key: &mut xlib::XKeyEvent) -> ComposedText;
}

/// `XLookupString` without any input method.
pub struct PlainLookup<'x> {
    xlib: &'x xlib::Xlib,
}

impl<'x> PlainLookup<'x> {
    pub fn new(xlib: &'x xlib::Xlib) -> Self {
        Self { xlib }
    }
}

impl<'x> TextInput for PlainLookup<'x> {
    fn lookup(&mut self, key: &mut xlib::XKeyEvent) -> ComposedText {
        let mut buf = [0u8; 32];
        let mut keysym: xlib::KeySym = 0;

        let len = unsafe {
            (self.xlib.XLookupString)(
                key,
                buf.as_mut_ptr() as *mut c_char,
                buf.len() as c_int,
                &mut keysym,
                ptr::null_mut(),
            )
        };

        let text = buf
            .get(..len.max(0) as usize)
            .filter(|b| !b.is_empty())
            .map(|b| String::from_utf8_lossy(b).into_owned());

        ComposedText {
            keysym: if keysym == 0 { None } else { Some(keysym as u64) },
            keysym_name: keysym_name(self.xlib, keysym),
            text,
        }
    }
}

/// A top-level window destroyed with `XDestroyWindow` on drop.
pub struct XlibWindow<'d> {
    display: &'d XlibDisplay<'d>,
    window: ScopedHandle<'d, xlib::Window>,
    mask: Cell<c_long>,
}

impl<'d> XlibWindow<'d> {
    pub fn create(display: &'d XlibDisplay<'d>, config: &WindowConfig) -> Result<Self, Error> {
        let xlib = display.xlib();
        let dpy = display.raw();
        let geometry = config.geometry;

        let raw = unsafe {
            (xlib.XCreateSimpleWindow)(
                dpy,
                display.root(),
                c_int::from(geometry.x),
                c_int::from(geometry.y),
                c_uint::from(geometry.width),
                c_uint::from(geometry.height),
                c_uint::from(config.border_width),
                display.black_pixel(),
                display.white_pixel(),
            )
        };

        let window = ScopedHandle::new(raw, move |w: &mut xlib::Window| {
            if *w != 0 {
                log::trace!("Destroy window {:#x}", w);
                unsafe { (xlib.XDestroyWindow)(dpy, *w) };
            }
        });
        check(window.get() != 0, "XCreateSimpleWindow")?;
        log::info!("Window {:#x} created", window.get());

        let mut protocols = [display.atoms().WM_DELETE_WINDOW];
        let status = unsafe {
            (xlib.XSetWMProtocols)(
                dpy,
                window.get(),
                protocols.as_mut_ptr(),
                protocols.len() as c_int,
            )
        };
        check(status != 0, "XSetWMProtocols")?;

        let title = c_string(&config.title, "title")?;
        unsafe {
            (xlib.XStoreName)(dpy, window.get(), title.as_ptr());
            (xlib.XChangeProperty)(
                dpy,
                window.get(),
                display.atoms()._NET_WM_NAME,
                display.atoms().UTF8_STRING,
                8,
                xlib::PropModeReplace,
                title.as_ptr() as *const c_uchar,
                title.as_bytes().len() as c_int,
            );
        }

        let this = Self {
            display,
            window,
            mask: Cell::new(0),
        };
        this.select_input(c_long::from(InputEvents::SUBSCRIBED.bits()));

        Ok(this)
    }

    #[inline]
    pub fn id(&self) -> xlib::Window {
        self.window.get()
    }

    #[inline]
    pub fn display(&self) -> &'d XlibDisplay<'d> {
        self.display
    }

    /// Adds `mask` to the events already selected on the window.
    pub fn select_input(&self, mask: c_long) {
        let mask = self.mask.get() | mask;
        self.mask.set(mask);
        unsafe { (self.display.xlib().XSelectInput)(self.display.raw(), self.id(), mask) };
    }

    pub fn map(&self) {
        unsafe { (self.display.xlib().XMapWindow)(self.display.raw(), self.id()) };
        self.display.flush();
    }

    /// Runs the blocking event loop until the window is closed or the handler exits.
    pub fn run(&self, handler: &mut impl WindowHandler, input: &mut impl TextInput) {
        let atoms = self.display.atoms();
        let wm_protocols = u64::from(atoms.WM_PROTOCOLS);
        let wm_delete_window = u64::from(atoms.WM_DELETE_WINDOW);

        log::info!("Start event loop");

        loop {
            let mut e = self.display.next_event();

            if input.filter(&mut e) {
                log::trace!("Event filtered by input method: {:?}", e);
                continue;
            }

            let summary = summarize(&e);

            match summary.kind {
                EventKind::FocusIn => input.focus_in(),
                EventKind::FocusOut => input.focus_out(),
                _ => {}
            }

            if summary.is_close_request(wm_protocols, wm_delete_window) {
                if handler.handle_close_request() == Flow::Exit {
                    break;
                }
                continue;
            }

            if handler.handle_event(&summary) == Flow::Exit {
                break;
            }

            if summary.kind == EventKind::KeyPress {
                let mut key = xlib::XKeyEvent::from(e);
                let text = input.lookup(&mut key);
                if !text.is_empty() {
                    handler.handle_text(&summary, &text);
                }
            }
        }

        log::info!("Event loop finished");
    }
}

/// Reduces an Xlib event to its loggable summary.
pub fn summarize(e: &xlib::XEvent) -> EventSummary {
    let kind = EventKind::from_code(e.get_type() as u8);

    // Every variant starts with the XAnyEvent header; the rest is read per type.
    let any = unsafe { e.any };

    let detail = unsafe {
        match e.get_type() {
            xlib::KeyPress | xlib::KeyRelease => EventDetail::Key {
                keycode: e.key.keycode as u8,
                state: Modifiers::from_bits_truncate(e.key.state as u16),
                x: e.key.x as i16,
                y: e.key.y as i16,
                time: e.key.time as u32,
            },
            xlib::ButtonPress | xlib::ButtonRelease => EventDetail::Button {
                button: e.button.button as u8,
                state: Modifiers::from_bits_truncate(e.button.state as u16),
                x: e.button.x as i16,
                y: e.button.y as i16,
                time: e.button.time as u32,
            },
            xlib::MotionNotify => EventDetail::Motion {
                state: Modifiers::from_bits_truncate(e.motion.state as u16),
                x: e.motion.x as i16,
                y: e.motion.y as i16,
            },
            xlib::EnterNotify | xlib::LeaveNotify => EventDetail::Crossing {
                x: e.crossing.x as i16,
                y: e.crossing.y as i16,
            },
            xlib::FocusIn | xlib::FocusOut => EventDetail::Focus {
                mode: e.focus_change.mode as u8,
            },
            xlib::Expose => EventDetail::Expose {
                x: e.expose.x as u16,
                y: e.expose.y as u16,
                width: e.expose.width as u16,
                height: e.expose.height as u16,
                count: e.expose.count as u16,
            },
            xlib::ConfigureNotify => EventDetail::Configure {
                x: e.configure.x as i16,
                y: e.configure.y as i16,
                width: e.configure.width as u16,
                height: e.configure.height as u16,
                border_width: e.configure.border_width as u16,
            },
            xlib::ClientMessage => {
                let data = &e.client_message.data;
                EventDetail::ClientMessage {
                    message_type: e.client_message.message_type as u64,
                    format: e.client_message.format as u8,
                    data: [
                        data.get_long(0) as u64,
                        data.get_long(1) as u64,
                        data.get_long(2) as u64,
                        data.get_long(3) as u64,
                        data.get_long(4) as u64,
                    ],
                }
            }
            _ => EventDetail::None,
        }
    };

    EventSummary {
        kind,
        window: any.window as u64,
        serial: any.serial as u64,
        send_event: any.send_event != 0,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn summarize_key_press() {
        let mut key: xlib::XKeyEvent = unsafe { std::mem::zeroed() };
        key.type_ = xlib::KeyPress;
        key.serial = 9;
        key.window = 0x400_0002;
        key.keycode = 38;
        key.state = xlib::ShiftMask | xlib::ControlMask;
        key.x = 3;
        key.y = 4;
        key.time = 77;

        let summary = summarize(&xlib::XEvent::from(key));
        assert_eq!(summary.kind, EventKind::KeyPress);
        assert_eq!(summary.window, 0x400_0002);
        assert_eq!(summary.serial, 9);
        assert_eq!(
            summary.detail,
            EventDetail::Key {
                keycode: 38,
                state: Modifiers::SHIFT | Modifiers::CONTROL,
                x: 3,
                y: 4,
                time: 77,
            }
        );
    }

    #[test]
    fn summarize_close_request() {
        let mut msg: xlib::XClientMessageEvent = unsafe { std::mem::zeroed() };
        msg.type_ = xlib::ClientMessage;
        msg.send_event = xlib::True;
        msg.window = 5;
        msg.message_type = 300;
        msg.format = 32;
        msg.data.set_long(0, 301);

        let summary = summarize(&xlib::XEvent::from(msg));
        assert_eq!(summary.kind, EventKind::ClientMessage);
        assert!(summary.send_event);
        assert!(summary.is_close_request(300, 301));
    }

    #[test]
    fn nul_in_title_is_a_config_error() {
        let err = c_string("a\0b", "title").unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: title contains a NUL byte");
    }
}
