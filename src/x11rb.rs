use crate::{
    atoms::Atoms,
    config::WindowConfig,
    error::Error,
    event::{EventDetail, EventKind, EventSummary, InputEvents, Modifiers, SEND_EVENT_BIT},
    handler::{ComposedText, Flow, WindowHandler},
    ScopedHandle,
};
use x11rb::{
    connection::Connection,
    protocol::{
        xproto::{
            Atom, AtomEnum, ConnectionExt, CreateWindowAux, EventMask, PropMode, Screen, Window,
            WindowClass,
        },
        Event,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT,
};
use xkeysym::Keysym;

/// Opens the connection named by the config, or `$DISPLAY`.
///
/// The connection closes itself when dropped.
pub fn connect(config: &WindowConfig) -> Result<(RustConnection, usize), Error> {
    let (conn, screen_num) = x11rb::connect(config.display.as_deref())?;
    log::info!("Connected, default screen {}", screen_num);
    Ok((conn, screen_num))
}

/// Keycode to keysym table fetched from the server.
#[derive(Debug, Default)]
pub struct Keymap {
    min_keycode: u8,
    per_keycode: u8,
    keysyms: Vec<u32>,
}

impl Keymap {
    pub fn load<C: Connection>(conn: &C) -> Result<Self, Error> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode - min_keycode + 1;
        let reply = conn.get_keyboard_mapping(min_keycode, count)?.reply()?;

        Ok(Self {
            min_keycode,
            per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    fn column(&self, keycode: u8, column: u8) -> Option<Keysym> {
        xkeysym::keysym(
            keycode.into(),
            column,
            self.min_keycode.into(),
            self.per_keycode,
            &self.keysyms,
        )
        .filter(|sym| sym.raw() != 0)
    }

    /// Core protocol column choice: Shift picks the second column, Lock alone
    /// only upper-cases letters.
    pub fn keysym(&self, keycode: u8, state: Modifiers) -> Option<Keysym> {
        let per_keycode = usize::from(self.per_keycode);
        let row = usize::from(keycode.checked_sub(self.min_keycode)?) * per_keycode;
        if per_keycode == 0 || row + per_keycode > self.keysyms.len() {
            return None;
        }

        let plain = self.column(keycode, 0);

        if state.contains(Modifiers::SHIFT) {
            return self.column(keycode, 1).or(plain);
        }

        let is_lowercase = plain
            .and_then(|sym| sym.key_char())
            .map_or(false, char::is_lowercase);

        if state.contains(Modifiers::LOCK) && is_lowercase {
            self.column(keycode, 1).or(plain)
        } else {
            plain
        }
    }

    pub fn lookup(&self, keycode: u8, state: Modifiers) -> ComposedText {
        match self.keysym(keycode, state) {
            Some(sym) => ComposedText {
                keysym: Some(u64::from(sym.raw())),
                keysym_name: sym
                    .name()
                    .map(|name| name.strip_prefix("XK_").unwrap_or(name).to_owned()),
                text: sym
                    .key_char()
                    .filter(|c| !c.is_control())
                    .map(String::from),
            },
            None => ComposedText::default(),
        }
    }
}

pub struct X11rbWindow<'c, C: Connection> {
    conn: &'c C,
    window: ScopedHandle<'c, Window>,
    atoms: Atoms<Atom>,
    keymap: Keymap,
}

impl<'c, C: Connection> X11rbWindow<'c, C> {
    pub fn create(conn: &'c C, screen: &Screen, config: &WindowConfig) -> Result<Self, Error> {
        let id = conn.generate_id()?;
        let geometry = config.geometry;

        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            id,
            screen.root,
            geometry.x,
            geometry.y,
            geometry.width,
            geometry.height,
            config.border_width,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .background_pixel(screen.white_pixel)
                .border_pixel(screen.black_pixel)
                .event_mask(EventMask::from(InputEvents::SUBSCRIBED.bits())),
        )?
        .check()?;

        let window = ScopedHandle::new(id, move |w: &mut Window| {
            log::trace!("Destroy window {:#x}", w);
            if let Err(e) = conn.destroy_window(*w).and_then(|_| conn.flush()) {
                log::warn!("Can't destroy window {:#x}: {}", w, e);
            }
        });

        log::info!("Window {:#x} created", window.get());

        let atoms = Atoms::new::<Error, _>(|name| {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        })?;

        conn.change_property32(
            PropMode::REPLACE,
            id,
            atoms.WM_PROTOCOLS,
            AtomEnum::ATOM,
            &[atoms.WM_DELETE_WINDOW],
        )?
        .check()?;

        conn.change_property8(
            PropMode::REPLACE,
            id,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            config.title.as_bytes(),
        )?;
        conn.change_property8(
            PropMode::REPLACE,
            id,
            atoms._NET_WM_NAME,
            atoms.UTF8_STRING,
            config.title.as_bytes(),
        )?;

        let keymap = Keymap::load(conn)?;

        Ok(Self {
            conn,
            window,
            atoms,
            keymap,
        })
    }

    pub fn id(&self) -> Window {
        self.window.get()
    }

    pub fn map(&self) -> Result<(), Error> {
        self.conn.map_window(self.id())?;
        self.conn.flush()?;
        Ok(())
    }

    /// Blocks on the connection until the window is closed or the handler exits.
    pub fn run(&mut self, handler: &mut impl WindowHandler) -> Result<(), Error> {
        log::info!("Start event loop");

        loop {
            let e = match self.conn.wait_for_event()? {
                Event::Error(err) => return Err(Error::X11(err)),
                e => e,
            };

            if let Event::MappingNotify(_) = e {
                self.keymap = Keymap::load(self.conn)?;
            }

            let summary = match summarize(&e) {
                Some(summary) => summary,
                None => {
                    log::trace!("Unhandled event: {:?}", e);
                    continue;
                }
            };

            if summary.is_close_request(
                u64::from(self.atoms.WM_PROTOCOLS),
                u64::from(self.atoms.WM_DELETE_WINDOW),
            ) {
                if handler.handle_close_request() == Flow::Exit {
                    break;
                }
                continue;
            }

            if handler.handle_event(&summary) == Flow::Exit {
                break;
            }

            if let EventDetail::Key { keycode, state, .. } = summary.detail {
                if summary.kind == EventKind::KeyPress {
                    let text = self.keymap.lookup(keycode, state);
                    if !text.is_empty() {
                        handler.handle_text(&summary, &text);
                    }
                }
            }
        }

        log::info!("Event loop finished");

        Ok(())
    }
}

fn summary(response_type: u8, sequence: u16, window: Window, detail: EventDetail) -> EventSummary {
    EventSummary {
        kind: EventKind::from_code(response_type),
        window: u64::from(window),
        serial: u64::from(sequence),
        send_event: response_type & SEND_EVENT_BIT != 0,
        detail,
    }
}

/// Reduces an x11rb event to its loggable summary.
pub fn summarize(e: &Event) -> Option<EventSummary> {
    Some(match e {
        Event::KeyPress(e) | Event::KeyRelease(e) => summary(
            e.response_type,
            e.sequence,
            e.event,
            EventDetail::Key {
                keycode: e.detail,
                state: Modifiers::from_bits_truncate(u16::from(e.state)),
                x: e.event_x,
                y: e.event_y,
                time: e.time,
            },
        ),
        Event::ButtonPress(e) | Event::ButtonRelease(e) => summary(
            e.response_type,
            e.sequence,
            e.event,
            EventDetail::Button {
                button: e.detail,
                state: Modifiers::from_bits_truncate(u16::from(e.state)),
                x: e.event_x,
                y: e.event_y,
                time: e.time,
            },
        ),
        Event::MotionNotify(e) => summary(
            e.response_type,
            e.sequence,
            e.event,
            EventDetail::Motion {
                state: Modifiers::from_bits_truncate(u16::from(e.state)),
                x: e.event_x,
                y: e.event_y,
            },
        ),
        Event::EnterNotify(e) | Event::LeaveNotify(e) => summary(
            e.response_type,
            e.sequence,
            e.event,
            EventDetail::Crossing {
                x: e.event_x,
                y: e.event_y,
            },
        ),
        Event::FocusIn(e) | Event::FocusOut(e) => summary(
            e.response_type,
            e.sequence,
            e.event,
            EventDetail::Focus {
                mode: u8::from(e.mode),
            },
        ),
        Event::Expose(e) => summary(
            e.response_type,
            e.sequence,
            e.window,
            EventDetail::Expose {
                x: e.x,
                y: e.y,
                width: e.width,
                height: e.height,
                count: e.count,
            },
        ),
        Event::ConfigureNotify(e) => summary(
            e.response_type,
            e.sequence,
            e.window,
            EventDetail::Configure {
                x: e.x,
                y: e.y,
                width: e.width,
                height: e.height,
                border_width: e.border_width,
            },
        ),
        Event::MapNotify(e) => summary(e.response_type, e.sequence, e.window, EventDetail::None),
        Event::UnmapNotify(e) => summary(e.response_type, e.sequence, e.window, EventDetail::None),
        Event::ReparentNotify(e) => {
            summary(e.response_type, e.sequence, e.window, EventDetail::None)
        }
        Event::DestroyNotify(e) => {
            summary(e.response_type, e.sequence, e.window, EventDetail::None)
        }
        Event::VisibilityNotify(e) => {
            summary(e.response_type, e.sequence, e.window, EventDetail::None)
        }
        Event::PropertyNotify(e) => {
            summary(e.response_type, e.sequence, e.window, EventDetail::None)
        }
        Event::MappingNotify(e) => summary(e.response_type, e.sequence, 0, EventDetail::None),
        Event::ClientMessage(e) => {
            let data = e.data.as_data32();
            summary(
                e.response_type,
                e.sequence,
                e.window,
                EventDetail::ClientMessage {
                    message_type: u64::from(e.type_),
                    format: e.format,
                    data: [
                        u64::from(data[0]),
                        u64::from(data[1]),
                        u64::from(data[2]),
                        u64::from(data[3]),
                        u64::from(data[4]),
                    ],
                },
            )
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use x11rb::protocol::xproto::{ClientMessageData, ClientMessageEvent, KeyPressEvent};

    #[test]
    fn key_press_summary() {
        let e = Event::KeyPress(KeyPressEvent {
            response_type: 2,
            detail: 38,
            sequence: 7,
            time: 1234,
            root: 1,
            event: 0x200_0001,
            child: 0,
            root_x: 100,
            root_y: 200,
            event_x: 10,
            event_y: 20,
            state: 0x0005u16.into(),
            same_screen: true,
        });

        let summary = summarize(&e).unwrap();
        assert_eq!(summary.kind, EventKind::KeyPress);
        assert_eq!(summary.window, 0x200_0001);
        assert_eq!(summary.serial, 7);
        assert!(!summary.send_event);
        assert_eq!(
            summary.detail,
            EventDetail::Key {
                keycode: 38,
                state: Modifiers::SHIFT | Modifiers::CONTROL,
                x: 10,
                y: 20,
                time: 1234,
            }
        );
    }

    #[test]
    fn close_message_summary() {
        let e = Event::ClientMessage(ClientMessageEvent {
            response_type: 33 | SEND_EVENT_BIT,
            format: 32,
            sequence: 0,
            window: 5,
            type_: 300,
            data: ClientMessageData::from([301u32, 0, 0, 0, 0]),
        });

        let summary = summarize(&e).unwrap();
        assert_eq!(summary.kind, EventKind::ClientMessage);
        assert!(summary.send_event);
        assert!(summary.is_close_request(300, 301));
    }

    fn keymap() -> Keymap {
        Keymap {
            min_keycode: 8,
            per_keycode: 2,
            // 8: a/A, 9: Return, 10: dead_acute, 11: 1/exclam, 12: q, 13: ą/Ą
            keysyms: vec![
                0x61, 0x41, 0xff0d, 0, 0xfe51, 0, 0x31, 0x21, 0x71, 0, 0x1b1, 0x1a1,
            ],
        }
    }

    fn raw(sym: Option<Keysym>) -> Option<u32> {
        sym.map(|sym| sym.raw())
    }

    #[test]
    fn keymap_columns() {
        let map = keymap();
        assert_eq!(raw(map.keysym(8, Modifiers::empty())), Some(0x61));
        assert_eq!(raw(map.keysym(8, Modifiers::SHIFT)), Some(0x41));
        assert_eq!(raw(map.keysym(9, Modifiers::SHIFT)), Some(0xff0d));
        assert_eq!(raw(map.keysym(7, Modifiers::empty())), None);
        assert_eq!(raw(map.keysym(14, Modifiers::empty())), None);
    }

    #[test]
    fn lock_uppercases_letters_only() {
        let map = keymap();
        assert_eq!(raw(map.keysym(8, Modifiers::LOCK)), Some(0x41));
        assert_eq!(raw(map.keysym(11, Modifiers::LOCK)), Some(0x31));
        assert_eq!(raw(map.keysym(11, Modifiers::SHIFT | Modifiers::LOCK)), Some(0x21));
    }

    #[test]
    fn single_column_letters_get_upper_case() {
        let map = keymap();
        assert_eq!(map.lookup(12, Modifiers::SHIFT).text.as_deref(), Some("Q"));
        assert_eq!(map.lookup(12, Modifiers::LOCK).text.as_deref(), Some("Q"));
        assert_eq!(map.lookup(12, Modifiers::empty()).text.as_deref(), Some("q"));
    }

    #[test]
    fn keymap_lookup() {
        let map = keymap();
        assert_eq!(
            map.lookup(8, Modifiers::SHIFT),
            ComposedText {
                keysym: Some(0x41),
                keysym_name: Some("A".into()),
                text: Some("A".into()),
            }
        );

        let enter = map.lookup(9, Modifiers::empty());
        assert_eq!(enter.keysym_name.as_deref(), Some("Return"));
        assert_eq!(enter.text, None);

        let dead = map.lookup(10, Modifiers::empty());
        assert_eq!(dead.keysym_name.as_deref(), Some("dead_acute"));

        assert_eq!(map.lookup(13, Modifiers::SHIFT).text.as_deref(), Some("Ą"));
        assert_eq!(map.lookup(13, Modifiers::empty()).text.as_deref(), Some("ą"));

        assert!(map.lookup(200, Modifiers::empty()).is_empty());
    }
}
