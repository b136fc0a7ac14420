//! Scope-bound ownership of opaque handles returned by C-style APIs.
//!
//! A [`ScopedHandle`] pairs a plain value (a pointer, a window id, an atom) with
//! the action that gives it back to whoever handed it out. The action runs
//! exactly once: when the handle is dropped, reset or overwritten. Moving the
//! handle moves the responsibility along with it.
//!
//! ```
//! use xscope_handle::ScopedHandle;
//!
//! let mut closed = Vec::new();
//! {
//!     let display = ScopedHandle::new(42u32, |id: &mut u32| closed.push(*id));
//!     assert_eq!(display.get(), 42);
//! }
//! assert_eq!(closed, [42]);
//! ```

#![allow(clippy::uninlined_format_args)]
#![forbid(unsafe_code, future_incompatible)]
#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

use alloc::boxed::Box;
use core::fmt;
use core::ops::Deref;
use num_traits::NumCast;

type Release<'a, T> = Box<dyn FnOnce(&mut T) + 'a>;

/// Exclusive owner of "when to release" for a copyable resource identifier.
///
/// The wrapped value is never validated. Callers that get a failure sentinel
/// back (a null pointer, a zero id) may still wrap it, log it through
/// [`get`](Self::get) and only then bail out.
pub struct ScopedHandle<'a, T: Copy> {
    value: T,
    release: Option<Release<'a, T>>,
}

impl<'a, T: Copy> ScopedHandle<'a, T> {
    /// Wraps `value`, arming `release` to run once when the handle goes away.
    pub fn new(value: T, release: impl FnOnce(&mut T) + 'a) -> Self {
        Self {
            value,
            release: Some(Box::new(release)),
        }
    }

    /// Wraps a value that needs no cleanup.
    pub const fn unmanaged(value: T) -> Self {
        Self {
            value,
            release: None,
        }
    }

    #[inline]
    pub fn get(&self) -> T {
        self.value
    }

    /// Mutable access for out-parameter style calls.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        &mut self.value
    }

    /// Whether dropping this handle would still run a release action.
    #[inline]
    pub fn is_owning(&self) -> bool {
        self.release.is_some()
    }

    /// Runs the release action if one is armed. Calling it again is a no-op.
    pub fn reset(&mut self) {
        if let Some(release) = self.release.take() {
            release(&mut self.value);
        }
    }

    /// Moves ownership out into a new handle and leaves `self` inert.
    ///
    /// `self` keeps a copy of the value so it can still be inspected, but it
    /// will never release it.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            value: self.value,
            release: self.release.take(),
        }
    }

    /// Gives the raw value back without releasing it.
    #[must_use]
    pub fn into_inner(mut self) -> T {
        self.release = None;
        self.value
    }
}

impl<'a, T: Copy + NumCast> ScopedHandle<'a, T> {
    /// Converts the stored value to another numeric width.
    ///
    /// Returns `None` when the value is not representable in `U`.
    #[inline]
    pub fn cast<U: NumCast>(&self) -> Option<U> {
        num_traits::cast(self.value)
    }
}

impl<'a, T: Copy> Drop for ScopedHandle<'a, T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<'a, T: Copy> Deref for ScopedHandle<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<'a, T: Copy> AsRef<T> for ScopedHandle<'a, T> {
    #[inline]
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<'a, T: Copy> From<T> for ScopedHandle<'a, T> {
    fn from(value: T) -> Self {
        Self::unmanaged(value)
    }
}

impl<'a, T: Copy + fmt::Debug> fmt::Debug for ScopedHandle<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedHandle")
            .field("value", &self.value)
            .field("owning", &self.is_owning())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ScopedHandle;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use pretty_assertions::assert_eq;

    type Log = Rc<RefCell<Vec<(&'static str, i32)>>>;

    fn recorder(log: &Log, tag: &'static str) -> impl FnOnce(&mut i32) + 'static {
        let log = log.clone();
        move |v: &mut i32| log.borrow_mut().push((tag, *v))
    }

    #[test]
    fn drop_releases_once() {
        let log = Log::default();
        {
            let h = ScopedHandle::new(5, recorder(&log, "a"));
            assert!(h.is_owning());
            assert!(log.borrow().is_empty());
        }
        assert_eq!(*log.borrow(), [("a", 5)]);
    }

    #[test]
    fn reset_is_idempotent() {
        let log = Log::default();
        let mut h = ScopedHandle::new(3, recorder(&log, "a"));
        h.reset();
        h.reset();
        assert!(!h.is_owning());
        drop(h);
        assert_eq!(*log.borrow(), [("a", 3)]);
    }

    #[test]
    fn moved_handle_releases_original_value() {
        let log = Log::default();
        let h1 = ScopedHandle::new(42, recorder(&log, "a"));
        let h2 = h1;
        assert!(log.borrow().is_empty());
        drop(h2);
        assert_eq!(*log.borrow(), [("a", 42)]);
    }

    #[test]
    fn take_leaves_source_inert() {
        let log = Log::default();
        let mut h1 = ScopedHandle::new(42, recorder(&log, "a"));
        let h2 = h1.take();

        assert!(!h1.is_owning());
        assert_eq!(h1.get(), 42);
        drop(h1);
        assert!(log.borrow().is_empty());

        assert!(h2.is_owning());
        drop(h2);
        assert_eq!(*log.borrow(), [("a", 42)]);
    }

    #[test]
    fn assignment_releases_previous_value_first() {
        let log = Log::default();
        let mut h = ScopedHandle::new(7, recorder(&log, "a"));
        h = ScopedHandle::new(9, recorder(&log, "b"));
        assert_eq!(*log.borrow(), [("a", 7)]);
        assert_eq!(h.get(), 9);
        drop(h);
        assert_eq!(*log.borrow(), [("a", 7), ("b", 9)]);
    }

    #[test]
    fn assignment_from_taken_handle() {
        let log = Log::default();
        let mut src = ScopedHandle::new(1, recorder(&log, "src"));
        let mut dst = ScopedHandle::new(2, recorder(&log, "dst"));
        dst = src.take();
        assert_eq!(*log.borrow(), [("dst", 2)]);
        drop(src);
        drop(dst);
        assert_eq!(*log.borrow(), [("dst", 2), ("src", 1)]);
    }

    #[test]
    fn unmanaged_does_nothing() {
        let mut h = ScopedHandle::unmanaged(11u64);
        assert!(!h.is_owning());
        h.reset();
        assert_eq!(h.get(), 11);
    }

    #[test]
    fn into_inner_disarms() {
        let log = Log::default();
        let h = ScopedHandle::new(8, recorder(&log, "a"));
        assert_eq!(h.into_inner(), 8);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn release_sees_mutations() {
        let log = Log::default();
        let mut h = ScopedHandle::new(0, recorder(&log, "a"));
        *h.get_mut() = 12;
        drop(h);
        assert_eq!(*log.borrow(), [("a", 12)]);
    }

    #[test]
    fn out_parameter_write() {
        fn query_atom(out: &mut u32) -> bool {
            *out = 77;
            true
        }

        let mut h = ScopedHandle::unmanaged(0u32);
        assert!(query_atom(h.get_mut()));
        assert_eq!(*h, 77);
        assert!(!h.as_mut_ptr().is_null());
    }

    #[test]
    fn cast_between_widths() {
        let window = ScopedHandle::unmanaged(0x1c0_0001u64);
        assert_eq!(window.cast::<u32>(), Some(0x1c0_0001u32));
        assert_eq!(window.cast::<i64>(), Some(0x1c0_0001i64));

        let wide = ScopedHandle::unmanaged(u64::MAX);
        assert_eq!(wide.cast::<u32>(), None);

        let negative = ScopedHandle::unmanaged(-1i64);
        assert_eq!(negative.cast::<u64>(), None);
    }

    #[test]
    fn release_order_follows_scope_unwind() {
        let log = Log::default();
        {
            let _display = ScopedHandle::new(1, recorder(&log, "display"));
            let _window = ScopedHandle::new(2, recorder(&log, "window"));
            let _ic = ScopedHandle::new(3, recorder(&log, "ic"));
        }
        assert_eq!(*log.borrow(), [("ic", 3), ("window", 2), ("display", 1)]);
    }

    #[test]
    fn early_error_still_releases() {
        fn acquire(log: &Log) -> Result<(), &'static str> {
            let _display = ScopedHandle::new(1, recorder(log, "display"));
            let window = ScopedHandle::new(0, recorder(log, "window"));
            if window.get() == 0 {
                return Err("XCreateSimpleWindow");
            }
            Ok(())
        }

        let log = Log::default();
        assert_eq!(acquire(&log), Err("XCreateSimpleWindow"));
        assert_eq!(*log.borrow(), [("window", 0), ("display", 1)]);
    }
}
