//! `SeaORM` Entity for the system_config table.

use sea_orm::entity::prelude::*;

/// Primary key of the single configuration row.
pub const SINGLETON_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "system_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub storage_mode: String,
    pub local_root: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub remote_credentials: Option<Json>,
    pub remote_container_id: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_secure: bool,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
