//! Core document logic for Dossier.
//!
//! This crate has no web or database dependencies. The configuration record is
//! read through [`storage::ConfigProvider`]; HTTP and persistence live in the
//! `dossier-api` and `dossier-db` crates.
//!
//! # Modules
//!
//! - `storage` - Backend routing, local and remote backends, retrieval
//! - `notify` - Attachment-or-link email notifications
//! - `cancel` - Caller-driven cancellation of in-flight I/O

pub mod cancel;
pub mod notify;
pub mod storage;
