//! Pre-edit (on-the-spot composition) state driven by input method callbacks.

use bitflags::bitflags;
use std::convert::TryFrom;
use std::fmt;
use std::ops::Range;

bitflags! {
    /// `XIMStyle` bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct InputStyle: u64 {
        const PREEDIT_AREA = 0x0001;
        const PREEDIT_CALLBACKS = 0x0002;
        const PREEDIT_POSITION = 0x0004;
        const PREEDIT_NOTHING = 0x0008;
        const PREEDIT_NONE = 0x0010;
        const STATUS_AREA = 0x0100;
        const STATUS_CALLBACKS = 0x0200;
        const STATUS_NOTHING = 0x0400;
        const STATUS_NONE = 0x0800;
    }
}

impl InputStyle {
    const PREFERRED: [InputStyle; 4] = [
        InputStyle::PREEDIT_CALLBACKS.union(InputStyle::STATUS_NOTHING),
        InputStyle::PREEDIT_CALLBACKS.union(InputStyle::STATUS_NONE),
        InputStyle::PREEDIT_NOTHING.union(InputStyle::STATUS_NOTHING),
        InputStyle::PREEDIT_NONE.union(InputStyle::STATUS_NONE),
    ];

    /// Picks the style to create an input context with, callbacks first.
    pub fn pick(supported: &[InputStyle]) -> Option<InputStyle> {
        Self::PREFERRED
            .iter()
            .copied()
            .find(|style| supported.contains(style))
    }
}

bitflags! {
    /// `XIMFeedback` bits, one value per pre-edit character.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Feedback: u64 {
        const REVERSE = 1;
        const UNDERLINE = 1 << 1;
        const HIGHLIGHT = 1 << 2;
        const PRIMARY = 1 << 5;
        const SECONDARY = 1 << 6;
        const TERTIARY = 1 << 7;
        const VISIBLE_TO_FORWARD = 1 << 8;
        const VISIBLE_TO_BACKWARD = 1 << 9;
        const VISIBLE_TO_CENTER = 1 << 10;
    }
}

/// `XIMCaretDirection`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaretDirection {
    ForwardChar,
    BackwardChar,
    ForwardWord,
    BackwardWord,
    CaretUp,
    CaretDown,
    NextLine,
    PreviousLine,
    LineStart,
    LineEnd,
    AbsolutePosition,
    DontChange,
}

impl CaretDirection {
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => CaretDirection::ForwardChar,
            1 => CaretDirection::BackwardChar,
            2 => CaretDirection::ForwardWord,
            3 => CaretDirection::BackwardWord,
            4 => CaretDirection::CaretUp,
            5 => CaretDirection::CaretDown,
            6 => CaretDirection::NextLine,
            7 => CaretDirection::PreviousLine,
            8 => CaretDirection::LineStart,
            9 => CaretDirection::LineEnd,
            10 => CaretDirection::AbsolutePosition,
            11 => CaretDirection::DontChange,
            _ => return None,
        })
    }
}

/// One draw request: replace `chg_length` chars at `chg_first` with `text`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreeditDraw {
    pub caret: i32,
    pub chg_first: i32,
    pub chg_length: i32,
    /// `None` deletes the changed range.
    pub text: Option<String>,
    pub feedback: Vec<Feedback>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreeditBuffer {
    chars: Vec<char>,
    feedback: Vec<Feedback>,
    caret: usize,
    active: bool,
}

fn clamp_index(value: i32, len: usize) -> usize {
    usize::try_from(value).unwrap_or(0).min(len)
}

impl PreeditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn feedback(&self) -> &[Feedback] {
        &self.feedback
    }

    fn range(&self, chg_first: i32, chg_length: i32) -> Range<usize> {
        let first = clamp_index(chg_first, self.chars.len());
        let end = first
            .saturating_add(clamp_index(chg_length, usize::MAX))
            .min(self.chars.len());
        first..end
    }

    /// The chars a draw request with these bounds would replace.
    pub fn range_text(&self, chg_first: i32, chg_length: i32) -> String {
        self.chars[self.range(chg_first, chg_length)].iter().collect()
    }

    pub fn start(&mut self) {
        self.clear();
        self.active = true;
    }

    pub fn done(&mut self) {
        self.clear();
        self.active = false;
    }

    fn clear(&mut self) {
        self.chars.clear();
        self.feedback.clear();
        self.caret = 0;
    }

    pub fn draw(&mut self, draw: &PreeditDraw) {
        let range = self.range(draw.chg_first, draw.chg_length);

        let new_chars: Vec<char> = draw
            .text
            .as_deref()
            .map(|t| t.chars().collect())
            .unwrap_or_default();
        let new_feedback = (0..new_chars.len())
            .map(|i| draw.feedback.get(i).copied().unwrap_or_default());

        self.feedback.splice(range.clone(), new_feedback);
        self.chars.splice(range, new_chars);
        self.caret = clamp_index(draw.caret, self.chars.len());
    }

    /// Moves the caret and returns its new position.
    ///
    /// The text is a single line, so line moves go to its ends.
    pub fn move_caret(&mut self, direction: CaretDirection, position: i32) -> usize {
        let len = self.chars.len();
        let is_space = |i: usize| self.chars[i].is_whitespace();

        let caret = match direction {
            CaretDirection::ForwardChar => (self.caret + 1).min(len),
            CaretDirection::BackwardChar => self.caret.saturating_sub(1),
            CaretDirection::ForwardWord => {
                let mut i = self.caret;
                while i < len && !is_space(i) {
                    i += 1;
                }
                while i < len && is_space(i) {
                    i += 1;
                }
                i
            }
            CaretDirection::BackwardWord => {
                let mut i = self.caret;
                while i > 0 && is_space(i - 1) {
                    i -= 1;
                }
                while i > 0 && !is_space(i - 1) {
                    i -= 1;
                }
                i
            }
            CaretDirection::LineStart | CaretDirection::PreviousLine => 0,
            CaretDirection::LineEnd | CaretDirection::NextLine => len,
            CaretDirection::AbsolutePosition => clamp_index(position, len),
            CaretDirection::CaretUp | CaretDirection::CaretDown | CaretDirection::DontChange => {
                self.caret
            }
        };

        self.caret = caret;
        caret
    }

    /// The text with `|` at the caret.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.chars.len() + 1);
        out.extend(&self.chars[..self.caret]);
        out.push('|');
        out.extend(&self.chars[self.caret..]);
        out
    }
}

impl fmt::Display for PreeditBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
