pub mod formatter;
pub mod senders;
pub mod service;

pub use senders::SenderError;
pub use service::{NotificationService, Notifier};
