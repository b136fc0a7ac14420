use crate::event::EventSummary;
use crate::preedit::PreeditBuffer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Result of looking up a key press, with or without an input method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComposedText {
    pub keysym: Option<u64>,
    pub keysym_name: Option<String>,
    pub text: Option<String>,
}

impl ComposedText {
    pub fn is_empty(&self) -> bool {
        self.keysym.is_none() && self.text.is_none()
    }
}

pub trait WindowHandler {
    fn handle_event(&mut self, event: &EventSummary) -> Flow;

    /// Called for key presses after the lookup, only when something came out.
    fn handle_text(&mut self, event: &EventSummary, text: &ComposedText);

    fn handle_close_request(&mut self) -> Flow {
        Flow::Exit
    }
}

/// Receives the on-the-spot pre-edit callbacks of an input context.
pub trait PreeditHandler {
    fn handle_preedit_start(&mut self);
    fn handle_preedit_draw(&mut self, preedit: &PreeditBuffer);
    fn handle_preedit_caret(&mut self, preedit: &PreeditBuffer);
    fn handle_preedit_done(&mut self);
}

/// Logs everything it receives.
#[derive(Debug, Default)]
pub struct LoggingHandler {
    pub events: usize,
}

impl WindowHandler for LoggingHandler {
    fn handle_event(&mut self, event: &EventSummary) -> Flow {
        self.events += 1;
        log::debug!("#{} {}", self.events, event);
        Flow::Continue
    }

    fn handle_text(&mut self, event: &EventSummary, text: &ComposedText) {
        log::info!(
            "{} keysym={} ({}) text={:?}",
            event.kind,
            text.keysym.map_or_else(|| "-".to_string(), |k| format!("{:#x}", k)),
            text.keysym_name.as_deref().unwrap_or("-"),
            text.text.as_deref().unwrap_or(""),
        );
    }

    fn handle_close_request(&mut self) -> Flow {
        log::info!("Window closed after {} events", self.events);
        Flow::Exit
    }
}

impl PreeditHandler for LoggingHandler {
    fn handle_preedit_start(&mut self) {
        log::info!("Preedit start");
    }

    fn handle_preedit_draw(&mut self, preedit: &PreeditBuffer) {
        log::info!("Preedit {}({:?})", preedit, preedit.feedback());
    }

    fn handle_preedit_caret(&mut self, preedit: &PreeditBuffer) {
        log::info!("Preedit caret {}", preedit);
    }

    fn handle_preedit_done(&mut self) {
        log::info!("Preedit done");
    }
}
