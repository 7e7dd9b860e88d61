//! Document notifications over SMTP.
//!
//! A local document goes out as an attachment read from its path; a remote one
//! as a link to its viewer URL. The branch follows the document's location, so
//! a remote document can never be attached.

mod error;
mod service;

pub use error::NotifyError;
pub use service::{Contact, LINK_PLACEHOLDER, NAME_PLACEHOLDER, Notifier, compose};
