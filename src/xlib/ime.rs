//! Input method and input context over Xlib's XIM client.

use super::{c_string, keysym_name, TextInput, XlibDisplay, XlibWindow};
use crate::{
    error::{check, Error},
    handler::{ComposedText, PreeditHandler},
    preedit::{CaretDirection, Feedback, InputStyle, PreeditBuffer, PreeditDraw},
    ScopedHandle,
};
use std::ffi::CStr;
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int, c_long, c_ulong, c_ushort, c_void};
use std::{ptr, slice};
use x11_dl::xlib;

const XN_QUERY_INPUT_STYLE: &[u8] = b"queryInputStyle\0";
const XN_INPUT_STYLE: &[u8] = b"inputStyle\0";
const XN_CLIENT_WINDOW: &[u8] = b"clientWindow\0";
const XN_FOCUS_WINDOW: &[u8] = b"focusWindow\0";
const XN_FILTER_EVENTS: &[u8] = b"filterEvents\0";
const XN_PREEDIT_ATTRIBUTES: &[u8] = b"preeditAttributes\0";
const XN_PREEDIT_START_CALLBACK: &[u8] = b"preeditStartCallback\0";
const XN_PREEDIT_DONE_CALLBACK: &[u8] = b"preeditDoneCallback\0";
const XN_PREEDIT_DRAW_CALLBACK: &[u8] = b"preeditDrawCallback\0";
const XN_PREEDIT_CARET_CALLBACK: &[u8] = b"preeditCaretCallback\0";

const X_BUFFER_OVERFLOW: c_int = -1;
const X_LOOKUP_NONE: c_int = 1;
const X_LOOKUP_CHARS: c_int = 2;
const X_LOOKUP_KEYSYM: c_int = 3;
const X_LOOKUP_BOTH: c_int = 4;

fn xn(name: &'static [u8]) -> *const c_char {
    name.as_ptr() as *const c_char
}

#[repr(C)]
struct RawImStyles {
    count_styles: c_ushort,
    supported_styles: *mut c_ulong,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct RawImCallback {
    client_data: xlib::XPointer,
    callback: *const c_void,
}

#[repr(C)]
struct RawImText {
    length: c_ushort,
    feedback: *mut c_ulong,
    encoding_is_wchar: xlib::Bool,
    string: *mut c_char,
}

#[repr(C)]
struct RawPreeditDraw {
    caret: c_int,
    chg_first: c_int,
    chg_length: c_int,
    text: *mut RawImText,
}

#[repr(C)]
struct RawPreeditCaret {
    position: c_int,
    direction: c_int,
    style: c_int,
}

/// Calls `setlocale(LC_ALL, "")` and hands `modifiers` to Xlib.
///
/// Must run before the display is opened.
pub fn set_locale(xlib: &xlib::Xlib, modifiers: &str) -> Result<(), Error> {
    let locale = unsafe { libc::setlocale(libc::LC_ALL, b"\0".as_ptr() as *const c_char) };
    check(!locale.is_null(), "setlocale")?;
    log::info!(
        "Locale: {}",
        unsafe { CStr::from_ptr(locale) }.to_string_lossy()
    );

    check(unsafe { (xlib.XSupportsLocale)() } != 0, "XSupportsLocale")?;

    let modifiers = c_string(modifiers, "locale modifiers")?;
    let applied = unsafe { (xlib.XSetLocaleModifiers)(modifiers.as_ptr()) };
    check(!applied.is_null(), "XSetLocaleModifiers")?;

    Ok(())
}

/// An `XIM`, closed with `XCloseIM` on drop.
pub struct InputMethod<'d> {
    display: &'d XlibDisplay<'d>,
    im: ScopedHandle<'d, xlib::XIM>,
}

impl<'d> InputMethod<'d> {
    pub fn open(display: &'d XlibDisplay<'d>) -> Result<Self, Error> {
        let xlib = display.xlib();
        let raw = unsafe {
            (xlib.XOpenIM)(
                display.raw(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };

        let im = ScopedHandle::new(raw, move |im: &mut xlib::XIM| {
            if !im.is_null() {
                log::trace!("Close input method");
                unsafe { (xlib.XCloseIM)(*im) };
            }
        });
        check(!im.is_null(), "XOpenIM")?;
        log::info!("Input method opened");

        Ok(Self { display, im })
    }

    pub fn supported_styles(&self) -> Result<Vec<InputStyle>, Error> {
        let xlib = self.display.xlib();
        let mut styles = ScopedHandle::new(
            ptr::null_mut::<RawImStyles>(),
            move |styles: &mut *mut RawImStyles| {
                if !styles.is_null() {
                    unsafe { (xlib.XFree)(*styles as *mut c_void) };
                }
            },
        );

        let failed = unsafe {
            (xlib.XGetIMValues)(
                self.im.get(),
                xn(XN_QUERY_INPUT_STYLE),
                styles.as_mut_ptr(),
                ptr::null_mut::<c_void>(),
            )
        };
        check(failed.is_null() && !styles.is_null(), "XGetIMValues")?;

        let list = unsafe { &*styles.get() };
        let raw = if list.supported_styles.is_null() {
            &[][..]
        } else {
            unsafe { slice::from_raw_parts(list.supported_styles, usize::from(list.count_styles)) }
        };

        let styles: Vec<InputStyle> = raw
            .iter()
            .map(|&s| InputStyle::from_bits_truncate(s as u64))
            .collect();
        log::debug!("Supported input styles: {:?}", styles);

        Ok(styles)
    }
}

struct PreeditState<H> {
    buffer: PreeditBuffer,
    handler: H,
    callbacks: [RawImCallback; 4],
}

/// An `XIC` bound to one window, destroyed with `XDestroyIC` on drop.
///
/// With [`InputStyle::PREEDIT_CALLBACKS`] the pre-edit callbacks land in `H`.
pub struct InputContext<'d, H: PreeditHandler> {
    xlib: &'d xlib::Xlib,
    ic: ScopedHandle<'d, xlib::XIC>,
    style: InputStyle,
    // Boxed; freed in Drop only after `ic` is destroyed.
    state: *mut PreeditState<H>,
    // The IC refers to the window by id.
    _window: PhantomData<&'d XlibWindow<'d>>,
}

impl<'d, H: PreeditHandler> InputContext<'d, H> {
    pub fn create(
        im: &'d InputMethod<'d>,
        window: &'d XlibWindow<'d>,
        style: InputStyle,
        handler: H,
    ) -> Result<Self, Error> {
        let xlib = im.display.xlib();

        let state = Box::into_raw(Box::new(PreeditState {
            buffer: PreeditBuffer::new(),
            handler,
            callbacks: [RawImCallback {
                client_data: ptr::null_mut(),
                callback: ptr::null(),
            }; 4],
        }));
        // From here on `this` owns `state`, an early return frees it.
        let mut this = Self {
            xlib,
            ic: ScopedHandle::unmanaged(ptr::null_mut()),
            style,
            state,
            _window: PhantomData,
        };

        let client_data = state as xlib::XPointer;
        let callbacks = unsafe { &mut (*state).callbacks };
        callbacks[0] = RawImCallback {
            client_data,
            callback: preedit_start::<H> as *const c_void,
        };
        callbacks[1] = RawImCallback {
            client_data,
            callback: preedit_done::<H> as *const c_void,
        };
        callbacks[2] = RawImCallback {
            client_data,
            callback: preedit_draw::<H> as *const c_void,
        };
        callbacks[3] = RawImCallback {
            client_data,
            callback: preedit_caret::<H> as *const c_void,
        };

        let window_id = window.id();
        let style_bits = style.bits() as c_ulong;

        let raw = if style.contains(InputStyle::PREEDIT_CALLBACKS) {
            let list = ScopedHandle::new(
                unsafe {
                    (xlib.XVaCreateNestedList)(
                        0,
                        xn(XN_PREEDIT_START_CALLBACK),
                        &mut callbacks[0] as *mut RawImCallback,
                        xn(XN_PREEDIT_DONE_CALLBACK),
                        &mut callbacks[1] as *mut RawImCallback,
                        xn(XN_PREEDIT_DRAW_CALLBACK),
                        &mut callbacks[2] as *mut RawImCallback,
                        xn(XN_PREEDIT_CARET_CALLBACK),
                        &mut callbacks[3] as *mut RawImCallback,
                        ptr::null_mut::<c_void>(),
                    )
                },
                move |list: &mut *mut c_void| {
                    if !list.is_null() {
                        unsafe { (xlib.XFree)(*list) };
                    }
                },
            );
            check(!list.is_null(), "XVaCreateNestedList")?;

            unsafe {
                (xlib.XCreateIC)(
                    im.im.get(),
                    xn(XN_INPUT_STYLE),
                    style_bits,
                    xn(XN_CLIENT_WINDOW),
                    window_id,
                    xn(XN_FOCUS_WINDOW),
                    window_id,
                    xn(XN_PREEDIT_ATTRIBUTES),
                    list.get(),
                    ptr::null_mut::<c_void>(),
                )
            }
        } else {
            unsafe {
                (xlib.XCreateIC)(
                    im.im.get(),
                    xn(XN_INPUT_STYLE),
                    style_bits,
                    xn(XN_CLIENT_WINDOW),
                    window_id,
                    xn(XN_FOCUS_WINDOW),
                    window_id,
                    ptr::null_mut::<c_void>(),
                )
            }
        };

        this.ic = ScopedHandle::new(raw, move |ic: &mut xlib::XIC| {
            if !ic.is_null() {
                log::trace!("Destroy input context");
                unsafe { (xlib.XDestroyIC)(*ic) };
            }
        });
        check(!this.ic.is_null(), "XCreateIC")?;
        log::info!("Input context created with style {:?}", style);

        let mut filter_events: c_ulong = 0;
        let failed = unsafe {
            (xlib.XGetICValues)(
                this.ic.get(),
                xn(XN_FILTER_EVENTS),
                &mut filter_events as *mut c_ulong,
                ptr::null_mut::<c_void>(),
            )
        };
        if failed.is_null() {
            window.select_input(filter_events as c_long);
        } else {
            log::warn!("Can't query the events the input method filters");
        }

        Ok(this)
    }

    pub fn style(&self) -> InputStyle {
        self.style
    }

    pub fn preedit(&self) -> &PreeditBuffer {
        unsafe { &(*self.state).buffer }
    }
}

impl<'d, H: PreeditHandler> TextInput for InputContext<'d, H> {
    fn filter(&mut self, event: &mut xlib::XEvent) -> bool {
        unsafe { (self.xlib.XFilterEvent)(event, 0) != 0 }
    }

    fn focus_in(&mut self) {
        log::debug!("Input context focused");
        unsafe { (self.xlib.XSetICFocus)(self.ic.get()) };
    }

    fn focus_out(&mut self) {
        log::debug!("Input context unfocused");
        unsafe { (self.xlib.XUnsetICFocus)(self.ic.get()) };
    }

    fn lookup(&mut self, key: &mut xlib::XKeyEvent) -> ComposedText {
        let mut buf = vec![0u8; 64];
        let mut keysym: xlib::KeySym = 0;
        let mut status: xlib::Status = 0;

        let len = loop {
            let len = unsafe {
                (self.xlib.Xutf8LookupString)(
                    self.ic.get(),
                    key,
                    buf.as_mut_ptr() as *mut c_char,
                    buf.len() as c_int,
                    &mut keysym,
                    &mut status,
                )
            };

            if status == X_BUFFER_OVERFLOW {
                log::trace!("Lookup buffer too small, need {} bytes", len);
                buf.resize(len.max(0) as usize + 1, 0);
                continue;
            }

            break len.max(0) as usize;
        };

        let text = || Some(String::from_utf8_lossy(&buf[..len]).into_owned());
        let sym = || Some(keysym as u64);

        match status {
            X_LOOKUP_CHARS => ComposedText {
                text: text(),
                ..ComposedText::default()
            },
            X_LOOKUP_KEYSYM => ComposedText {
                keysym: sym(),
                keysym_name: keysym_name(self.xlib, keysym),
                text: None,
            },
            X_LOOKUP_BOTH => ComposedText {
                keysym: sym(),
                keysym_name: keysym_name(self.xlib, keysym),
                text: text(),
            },
            X_LOOKUP_NONE => ComposedText::default(),
            other => {
                log::warn!("Unexpected lookup status {}", other);
                ComposedText::default()
            }
        }
    }
}

impl<'d, H: PreeditHandler> Drop for InputContext<'d, H> {
    fn drop(&mut self) {
        self.ic.reset();
        drop(unsafe { Box::from_raw(self.state) });
    }
}

unsafe fn callback_state<'a, H>(client_data: xlib::XPointer) -> &'a mut PreeditState<H> {
    &mut *(client_data as *mut PreeditState<H>)
}

unsafe fn read_text(text: &RawImText) -> (Option<String>, Vec<Feedback>) {
    let len = usize::from(text.length);

    let feedback = if text.feedback.is_null() {
        Vec::new()
    } else {
        slice::from_raw_parts(text.feedback, len)
            .iter()
            .map(|&f| Feedback::from_bits_truncate(f as u64))
            .collect()
    };

    let string = if text.string.is_null() {
        None
    } else if text.encoding_is_wchar != 0 {
        let wide = slice::from_raw_parts(text.string as *const libc::wchar_t, len);
        Some(wide.iter().filter_map(|&c| char::from_u32(c as u32)).collect())
    } else {
        Some(CStr::from_ptr(text.string).to_string_lossy().into_owned())
    };

    (string, feedback)
}

unsafe extern "C" fn preedit_start<H: PreeditHandler>(
    _ic: xlib::XIC,
    client_data: xlib::XPointer,
    _call_data: xlib::XPointer,
) -> c_int {
    let state = callback_state::<H>(client_data);
    state.buffer.start();
    state.handler.handle_preedit_start();
    // No length limit.
    -1
}

unsafe extern "C" fn preedit_done<H: PreeditHandler>(
    _ic: xlib::XIC,
    client_data: xlib::XPointer,
    _call_data: xlib::XPointer,
) {
    let state = callback_state::<H>(client_data);
    state.buffer.done();
    state.handler.handle_preedit_done();
}

unsafe extern "C" fn preedit_draw<H: PreeditHandler>(
    _ic: xlib::XIC,
    client_data: xlib::XPointer,
    call_data: xlib::XPointer,
) {
    let state = callback_state::<H>(client_data);
    let raw = &*(call_data as *const RawPreeditDraw);

    let mut chg_length = raw.chg_length;
    let (text, feedback) = match raw.text.as_ref() {
        Some(text) => match read_text(text) {
            (Some(string), feedback) => (Some(string), feedback),
            // Only the feedback of `length` chars changes, the text stays.
            (None, feedback) => {
                chg_length = c_int::from(text.length);
                (
                    Some(state.buffer.range_text(raw.chg_first, chg_length)),
                    feedback,
                )
            }
        },
        None => (None, Vec::new()),
    };

    state.buffer.draw(&PreeditDraw {
        caret: raw.caret,
        chg_first: raw.chg_first,
        chg_length,
        text,
        feedback,
    });
    state.handler.handle_preedit_draw(&state.buffer);
}

unsafe extern "C" fn preedit_caret<H: PreeditHandler>(
    _ic: xlib::XIC,
    client_data: xlib::XPointer,
    call_data: xlib::XPointer,
) {
    let state = callback_state::<H>(client_data);
    let raw = &mut *(call_data as *mut RawPreeditCaret);

    match CaretDirection::from_raw(raw.direction) {
        Some(direction) => {
            raw.position = state.buffer.move_caret(direction, raw.position) as c_int;
            state.handler.handle_preedit_caret(&state.buffer);
        }
        None => log::warn!(
            "Unknown caret direction {} (style {})",
            raw.direction,
            raw.style
        ),
    }
}
