//! `SeaORM` entity definitions.

pub mod system_config;
