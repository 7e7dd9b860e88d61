//! Document storage: backend routing, the two backends, and retrieval.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       StorageRouter                          │
//! │         (reads StorageConfig, picks one backend)             │
//! ├─────────────────────────────┬────────────────────────────────┤
//! │ LocalBackend (OpenDAL fs)   │ RemoteBackend (Drive upload)   │
//! │ configured root → default   │ service account → folder id    │
//! ├─────────────────────────────┴────────────────────────────────┤
//! │ RetrievalGateway: /uploads/{filename} → configured → default │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod document;
mod error;
mod local;
mod remote;
mod retrieval;
mod router;

pub use config::{
    ConfigProvider, ConfigStore, MemoryConfigStore, REDACTED, RemoteCredentials, RemoteTarget,
    StorageConfig, StorageMode,
};
pub use document::{BackendType, InboundFile, StoredDocument, StoredLocation};
pub use error::StorageError;
pub use local::{
    LocalBackend, LocalWrite, ResolvedFile, TIMESTAMP_SEPARATOR, generate_filename,
    is_valid_stored_name, sanitize_filename,
};
pub use remote::{DRIVE_FILE_SCOPE, DriveEndpoints, RemoteBackend, RemoteUpload};
pub use retrieval::{RETRIEVAL_PATH, RetrievalGateway, RetrievedFile, content_type_for};
pub use router::{StorageRouter, retrieval_url};
