//! Backend-neutral view of the events the demos log.

use bitflags::bitflags;
use std::fmt;

macro_rules! define_kinds {
    ($(($code:literal, $kind:ident),)+) => {
        /// Core protocol event types.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $($kind,)+
            Other(u8),
        }

        impl EventKind {
            /// Maps a response type to a kind, ignoring the send-event bit.
            pub const fn from_code(code: u8) -> Self {
                match code & !SEND_EVENT_BIT {
                    $($code => EventKind::$kind,)+
                    other => EventKind::Other(other),
                }
            }

            pub const fn code(self) -> u8 {
                match self {
                    $(EventKind::$kind => $code,)+
                    EventKind::Other(code) => code,
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(EventKind::$kind => stringify!($kind),)+
                    EventKind::Other(_) => "Unknown",
                }
            }
        }
    };
}

/// Set on events produced by `SendEvent` rather than by the server.
pub const SEND_EVENT_BIT: u8 = 0x80;

define_kinds! {
    (2, KeyPress),
    (3, KeyRelease),
    (4, ButtonPress),
    (5, ButtonRelease),
    (6, MotionNotify),
    (7, EnterNotify),
    (8, LeaveNotify),
    (9, FocusIn),
    (10, FocusOut),
    (11, KeymapNotify),
    (12, Expose),
    (13, GraphicsExpose),
    (14, NoExpose),
    (15, VisibilityNotify),
    (16, CreateNotify),
    (17, DestroyNotify),
    (18, UnmapNotify),
    (19, MapNotify),
    (20, MapRequest),
    (21, ReparentNotify),
    (22, ConfigureNotify),
    (23, ConfigureRequest),
    (24, GravityNotify),
    (25, ResizeRequest),
    (26, CirculateNotify),
    (27, CirculateRequest),
    (28, PropertyNotify),
    (29, SelectionClear),
    (30, SelectionRequest),
    (31, SelectionNotify),
    (32, ColormapNotify),
    (33, ClientMessage),
    (34, MappingNotify),
    (35, GenericEvent),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Other(code) => write!(f, "Unknown({})", code),
            kind => f.write_str(kind.name()),
        }
    }
}

bitflags! {
    /// Key and button state carried by input events.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
        const BUTTON1 = 1 << 8;
        const BUTTON2 = 1 << 9;
        const BUTTON3 = 1 << 10;
        const BUTTON4 = 1 << 11;
        const BUTTON5 = 1 << 12;
    }
}

const MODIFIER_NAMES: [(Modifiers, &str); 13] = [
    (Modifiers::SHIFT, "Shift"),
    (Modifiers::LOCK, "Lock"),
    (Modifiers::CONTROL, "Control"),
    (Modifiers::MOD1, "Mod1"),
    (Modifiers::MOD2, "Mod2"),
    (Modifiers::MOD3, "Mod3"),
    (Modifiers::MOD4, "Mod4"),
    (Modifiers::MOD5, "Mod5"),
    (Modifiers::BUTTON1, "Button1"),
    (Modifiers::BUTTON2, "Button2"),
    (Modifiers::BUTTON3, "Button3"),
    (Modifiers::BUTTON4, "Button4"),
    (Modifiers::BUTTON5, "Button5"),
];

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for (flag, name) in MODIFIER_NAMES.iter() {
            if self.contains(*flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        if first {
            f.write_str("none")?;
        }

        Ok(())
    }
}

bitflags! {
    /// Core event mask bits, shared by both backends.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct InputEvents: u32 {
        const KEY_PRESS = 1 << 0;
        const KEY_RELEASE = 1 << 1;
        const BUTTON_PRESS = 1 << 2;
        const BUTTON_RELEASE = 1 << 3;
        const ENTER_WINDOW = 1 << 4;
        const LEAVE_WINDOW = 1 << 5;
        const POINTER_MOTION = 1 << 6;
        const EXPOSURE = 1 << 15;
        const STRUCTURE_NOTIFY = 1 << 17;
        const FOCUS_CHANGE = 1 << 21;
        const PROPERTY_CHANGE = 1 << 22;

        /// Everything the demo windows listen to.
        const SUBSCRIBED = Self::KEY_PRESS.bits()
            | Self::KEY_RELEASE.bits()
            | Self::BUTTON_PRESS.bits()
            | Self::BUTTON_RELEASE.bits()
            | Self::ENTER_WINDOW.bits()
            | Self::LEAVE_WINDOW.bits()
            | Self::POINTER_MOTION.bits()
            | Self::EXPOSURE.bits()
            | Self::STRUCTURE_NOTIFY.bits()
            | Self::FOCUS_CHANGE.bits();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventDetail {
    Key {
        keycode: u8,
        state: Modifiers,
        x: i16,
        y: i16,
        time: u32,
    },
    Button {
        button: u8,
        state: Modifiers,
        x: i16,
        y: i16,
        time: u32,
    },
    Motion {
        state: Modifiers,
        x: i16,
        y: i16,
    },
    Crossing {
        x: i16,
        y: i16,
    },
    Focus {
        mode: u8,
    },
    Expose {
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        count: u16,
    },
    Configure {
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        border_width: u16,
    },
    ClientMessage {
        message_type: u64,
        format: u8,
        data: [u64; 5],
    },
    None,
}

/// One received event, reduced to what gets logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventSummary {
    pub kind: EventKind,
    pub window: u64,
    pub serial: u64,
    pub send_event: bool,
    pub detail: EventDetail,
}

impl EventSummary {
    pub fn new(kind: EventKind, window: u64, detail: EventDetail) -> Self {
        Self {
            kind,
            window,
            serial: 0,
            send_event: false,
            detail,
        }
    }

    /// `WM_PROTOCOLS` client message carrying `WM_DELETE_WINDOW`.
    pub fn is_close_request(&self, wm_protocols: u64, wm_delete_window: u64) -> bool {
        match self.detail {
            EventDetail::ClientMessage {
                message_type,
                format: 32,
                data,
            } => message_type == wm_protocols && data[0] == wm_delete_window,
            _ => false,
        }
    }
}

impl fmt::Display for EventSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} window={:#x}", self.kind, self.window)?;

        match self.detail {
            EventDetail::Key {
                keycode,
                state,
                x,
                y,
                time,
            } => write!(
                f,
                " keycode={} state={} at ({}, {}) time={}",
                keycode, state, x, y, time
            )?,
            EventDetail::Button {
                button,
                state,
                x,
                y,
                time,
            } => write!(
                f,
                " button={} state={} at ({}, {}) time={}",
                button, state, x, y, time
            )?,
            EventDetail::Motion { state, x, y } => {
                write!(f, " state={} at ({}, {})", state, x, y)?
            }
            EventDetail::Crossing { x, y } => write!(f, " at ({}, {})", x, y)?,
            EventDetail::Focus { mode } => write!(f, " mode={}", mode)?,
            EventDetail::Expose {
                x,
                y,
                width,
                height,
                count,
            } => write!(
                f,
                " area={}x{}+{}+{} count={}",
                width, height, x, y, count
            )?,
            EventDetail::Configure {
                x,
                y,
                width,
                height,
                border_width,
            } => write!(
                f,
                " geometry={}x{}+{}+{} border={}",
                width, height, x, y, border_width
            )?,
            EventDetail::ClientMessage {
                message_type,
                format,
                data,
            } => write!(
                f,
                " type={} format={} data={:?}",
                message_type, format, data
            )?,
            EventDetail::None => {}
        }

        if self.send_event {
            f.write_str(" (synthetic)")?;
        }

        Ok(())
    }
}
