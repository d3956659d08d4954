//! Rendering of panic payloads caught in connection tasks.

use std::{any::Any, fmt};

/// A caught panic payload that renders its message when displayed.
///
/// `panic!` payloads are almost always a `String` or a `&'static str`; any
/// other payload type falls back to its `Debug` form.
///
/// ```
/// use stillframe::panic::format_panic;
///
/// assert_eq!(format_panic(Box::new("sink exploded")).to_string(), "sink exploded");
/// assert_eq!(format_panic(Box::new(String::from("boom"))).message(), Some("boom"));
/// assert!(format_panic(Box::new(7_u8)).message().is_none());
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    /// The panic message, when the payload is a string.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.0
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.0.downcast_ref::<&'static str>().copied())
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => f.write_str(msg),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// Wrap a payload returned by `catch_unwind`.
pub fn format_panic(payload: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(payload) }
