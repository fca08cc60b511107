//! Outbound service integrations.

pub mod mail;

pub use mail::{MailError, Mailer, SmtpMailer};
