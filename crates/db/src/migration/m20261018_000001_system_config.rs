//! Configuration record table.
//!
//! A single row (`id = 1`) holds the storage mode, local root, remote
//! credentials and SMTP settings read on every operation.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(SYSTEM_CONFIG_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS system_config CASCADE;")
            .await?;
        Ok(())
    }
}

const SYSTEM_CONFIG_SQL: &str = r"
CREATE TABLE system_config (
    id INTEGER PRIMARY KEY DEFAULT 1,
    storage_mode VARCHAR(16) NOT NULL DEFAULT 'LOCAL',
    local_root TEXT,
    remote_credentials JSONB,
    remote_container_id VARCHAR(255),
    smtp_host VARCHAR(255),
    smtp_port INTEGER,
    smtp_secure BOOLEAN NOT NULL DEFAULT FALSE,
    smtp_user VARCHAR(255),
    smtp_password TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_system_config_singleton CHECK (id = 1),
    CONSTRAINT chk_storage_mode CHECK (storage_mode IN ('LOCAL', 'REMOTE')),
    CONSTRAINT chk_smtp_port CHECK (smtp_port IS NULL OR smtp_port BETWEEN 1 AND 65535)
);
";
