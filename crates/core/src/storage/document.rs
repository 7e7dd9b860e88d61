//! Inbound files and the normalized stored-document reference.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Which backend holds a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendType {
    /// Local filesystem.
    Local,
    /// Remote object provider.
    Remote,
}

impl BackendType {
    /// Wire/database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Remote => "REMOTE",
        }
    }
}

/// A file received in a single store request.
#[derive(Debug, Clone)]
pub struct InboundFile {
    /// Name the file had on the client.
    pub original_name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// File content.
    pub content: Bytes,
}

impl InboundFile {
    /// Fallback MIME type when the client sends none.
    pub const DEFAULT_MIME_TYPE: &'static str = "application/octet-stream";

    /// Create an inbound file.
    #[must_use]
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    /// Whether there is no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Where a stored document lives.
///
/// A local document always has a path; a remote one never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoredLocation {
    /// Written under a local root.
    Local {
        /// Generated filename.
        filename: String,
        /// Absolute path at write time.
        local_path: PathBuf,
        /// Retrieval gateway URL.
        access_url: String,
    },
    /// Uploaded to the remote provider.
    Remote {
        /// Provider-assigned object id.
        external_id: String,
        /// Provider viewer URL.
        access_url: String,
    },
}

/// Result of a successful store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Original client-side name.
    pub original_name: String,
    /// MIME type recorded at upload.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Backend-specific location.
    #[serde(flatten)]
    pub location: StoredLocation,
}

impl StoredDocument {
    /// Backend that holds the document.
    #[must_use]
    pub fn backend_type(&self) -> BackendType {
        match self.location {
            StoredLocation::Local { .. } => BackendType::Local,
            StoredLocation::Remote { .. } => BackendType::Remote,
        }
    }

    /// Dereferenceable URL.
    #[must_use]
    pub fn access_url(&self) -> &str {
        match &self.location {
            StoredLocation::Local { access_url, .. } | StoredLocation::Remote { access_url, .. } => {
                access_url
            }
        }
    }

    /// Backend identifier: generated filename for local, object id for remote.
    #[must_use]
    pub fn external_id(&self) -> &str {
        match &self.location {
            StoredLocation::Local { filename, .. } => filename,
            StoredLocation::Remote { external_id, .. } => external_id,
        }
    }

    /// Local path, present only for local documents.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            StoredLocation::Local { local_path, .. } => Some(local_path),
            StoredLocation::Remote { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote_document() -> StoredDocument {
        StoredDocument {
            original_name: "policy.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 10,
            location: StoredLocation::Remote {
                external_id: "1AbC".to_string(),
                access_url: "https://drive.google.com/file/d/1AbC/view".to_string(),
            },
        }
    }

    #[test]
    fn test_inbound_file_size() {
        let file = InboundFile::new("a.pdf", "application/pdf", vec![0u8; 2048]);
        assert_eq!(file.size_bytes(), 2048);
        assert!(!file.is_empty());
        assert!(InboundFile::new("a.pdf", "application/pdf", Vec::new()).is_empty());
    }

    #[test]
    fn test_remote_document_has_no_local_path() {
        let doc = remote_document();
        assert_eq!(doc.backend_type(), BackendType::Remote);
        assert!(doc.local_path().is_none());
        assert_eq!(doc.external_id(), "1AbC");
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(remote_document()).expect("serialize");
        assert_eq!(value["backend_type"], json!("REMOTE"));
        assert_eq!(value["external_id"], json!("1AbC"));
        assert!(value.get("local_path").is_none());
    }

    #[test]
    fn test_local_document_deserializes() {
        let doc: StoredDocument = serde_json::from_value(json!({
            "backend_type": "LOCAL",
            "original_name": "id.png",
            "mime_type": "image/png",
            "size_bytes": 3,
            "filename": "1700000000000-id.png",
            "local_path": "/data/uploads/1700000000000-id.png",
            "access_url": "http://localhost:3000/uploads/1700000000000-id.png"
        }))
        .expect("deserialize");

        assert_eq!(doc.backend_type(), BackendType::Local);
        assert_eq!(
            doc.local_path(),
            Some(Path::new("/data/uploads/1700000000000-id.png"))
        );
        assert_eq!(doc.external_id(), "1700000000000-id.png");
    }

    #[test]
    fn test_remote_document_cannot_carry_local_path() {
        let doc: StoredDocument = serde_json::from_value(json!({
            "backend_type": "REMOTE",
            "original_name": "a.pdf",
            "mime_type": "application/pdf",
            "size_bytes": 1,
            "external_id": "x",
            "access_url": "https://drive.google.com/x",
            "local_path": "/etc/passwd"
        }))
        .expect("unknown fields are ignored");

        assert!(doc.local_path().is_none());
    }
}
