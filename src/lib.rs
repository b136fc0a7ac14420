//! Small X11 programs built on handles released when they leave scope.
//!
//! Two backends open a window and log what the server sends: the pure Rust
//! `x11rb` connection and the C Xlib loaded at runtime through `x11-dl`. The Xlib
//! backend can also attach an input method and report its pre-edit callbacks.

#![allow(clippy::uninlined_format_args)]

pub mod atoms;
pub mod config;
mod error;
pub mod event;
pub mod handler;
pub mod preedit;

#[cfg(feature = "x11rb-backend")]
pub mod x11rb;
#[cfg(feature = "xlib-backend")]
pub mod xlib;

pub use xscope_handle::ScopedHandle;

pub use crate::{
    config::{ConfigError, Geometry, WindowConfig},
    error::Error,
    handler::{ComposedText, Flow, LoggingHandler, PreeditHandler, WindowHandler},
    preedit::{InputStyle, PreeditBuffer},
};
