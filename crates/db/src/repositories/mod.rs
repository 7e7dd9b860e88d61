//! Repository implementations.

mod system_config;

pub use system_config::SystemConfigRepository;
