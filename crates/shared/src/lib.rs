//! Shared configuration, errors, and email transport for Dossier.
//!
//! This crate provides common types used across all other crates:
//! - Process configuration management
//! - Application-wide error types
//! - SMTP settings and mail transport

pub mod config;
pub mod email;
pub mod error;

#[cfg(test)]
mod config_tests;

pub use config::AppConfig;
pub use email::{EmailAttachment, EmailError, MailTransport, OutgoingEmail, SmtpMailer, SmtpSettings};
pub use error::{AppError, AppResult};
