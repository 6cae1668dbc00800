//! Desktop-style notification sink.
//!
//! The engine only ever calls [`Notifier::notify`] and logs failures; a notification
//! problem never changes the outcome of the file operation that triggered it.

use crate::output::OutputFormatter;
use std::fmt;

#[derive(Debug, Clone)]
pub struct NotifyError(pub String);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

pub trait Notifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

/// Prints notifications to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        OutputFormatter::notification(title, message);
        Ok(())
    }
}

/// Discards notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _title: &str, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}
