//! Local filesystem backend: exclusive writes, reads through Apache OpenDAL.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use bytes::Bytes;
use chrono::Utc;
use opendal::{ErrorKind, Operator, services};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::document::InboundFile;
use super::error::StorageError;

/// Separator between the timestamp prefix and the sanitized original name.
pub const TIMESTAMP_SEPARATOR: char = '-';

/// Name used when sanitization leaves nothing.
const FALLBACK_NAME: &str = "file";

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Wall-clock milliseconds, strictly increasing within the process.
fn next_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1)
}

/// Replace every character outside `[A-Za-z0-9.]` with `_`.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect()
}

/// Build the stored filename: `{millis}-{sanitized original}`.
#[must_use]
pub fn generate_filename(original_name: &str, stamp_millis: i64) -> String {
    let sanitized = sanitize_filename(original_name);
    let name = if sanitized.is_empty() {
        FALLBACK_NAME
    } else {
        sanitized.as_str()
    };
    format!("{stamp_millis}{TIMESTAMP_SEPARATOR}{name}")
}

/// Whether `filename` could have come from [`generate_filename`].
///
/// Used to reject retrieval requests that would escape the root.
#[must_use]
pub fn is_valid_stored_name(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | TIMESTAMP_SEPARATOR))
}

/// Attempts at finding a free stored name before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

/// Suffix of the hidden file a write goes through before it is published.
const PARTIAL_SUFFIX: &str = ".partial";

/// A hidden in-progress file, removed when dropped.
///
/// Dropping the write future (cancellation) drops this too, so no partial
/// content is left under the root.
struct PartialFile {
    path: PathBuf,
}

impl PartialFile {
    /// Create a new hidden file next to `filename`; never opens an existing one.
    async fn create(root: &Path, filename: &str) -> std::io::Result<(Self, tokio::fs::File)> {
        let path = root.join(format!(
            ".{filename}.{}.{}{PARTIAL_SUFFIX}",
            std::process::id(),
            Utc::now().timestamp_subsec_nanos()
        ));
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok((Self { path }, file))
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        // Best effort; a published file keeps its own link to the content.
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Write `content` as `root/filename` unless that name already exists.
///
/// The bytes go to a hidden file first and are published with a hard link,
/// which fails instead of replacing an existing file. Returns `false` when the
/// name is taken; the existing file is left untouched.
async fn publish_new(root: &Path, filename: &str, content: &[u8]) -> Result<bool, StorageError> {
    let (partial, mut out) = PartialFile::create(root, filename).await?;
    out.write_all(content).await?;
    out.sync_all().await?;
    drop(out);

    match tokio::fs::hard_link(&partial.path, root.join(filename)).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// A file written by [`LocalBackend::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalWrite {
    /// Generated filename.
    pub filename: String,
    /// Absolute path of the written file.
    pub local_path: PathBuf,
}

/// A file located by [`LocalBackend::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    /// Absolute path the file was read from.
    pub path: PathBuf,
    /// File content.
    pub content: Bytes,
}

/// Local filesystem backend.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    default_root: PathBuf,
}

impl LocalBackend {
    /// Create a backend falling back to `default_root`.
    #[must_use]
    pub fn new(default_root: impl Into<PathBuf>) -> Self {
        Self {
            default_root: default_root.into(),
        }
    }

    /// The fixed default root.
    #[must_use]
    pub fn default_root(&self) -> &Path {
        &self.default_root
    }

    /// The configured root if set, else the default root.
    #[must_use]
    pub fn effective_root(&self, configured_root: Option<&str>) -> PathBuf {
        configured_root.map_or_else(|| self.default_root.clone(), PathBuf::from)
    }

    /// Write `file` under `root` with a freshly generated name.
    ///
    /// The root (and any parents) is created first; an existing directory is
    /// not an error, so concurrent first writes both succeed. The file is never
    /// written over an existing name: a taken name moves on to the next stamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or the write fails.
    pub async fn write(&self, file: &InboundFile, root: &Path) -> Result<LocalWrite, StorageError> {
        self.write_from(file, root, next_stamp()).await
    }

    async fn write_from(
        &self,
        file: &InboundFile,
        root: &Path,
        first_stamp: i64,
    ) -> Result<LocalWrite, StorageError> {
        tokio::fs::create_dir_all(root).await?;
        let root = std::path::absolute(root)?;

        let mut stamp = first_stamp;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = generate_filename(&file.original_name, stamp);
            if publish_new(&root, &filename, &file.content).await? {
                debug!(
                    root = %root.display(),
                    filename = %filename,
                    size = file.size_bytes(),
                    "Wrote local file"
                );
                return Ok(LocalWrite {
                    local_path: root.join(&filename),
                    filename,
                });
            }
            debug!(filename = %filename, "Stored name taken, trying next stamp");
            stamp = next_stamp().max(stamp + 1);
        }

        Err(StorageError::operation(format!(
            "no free name for '{}' under {}",
            file.original_name,
            root.display()
        )))
    }

    /// Write under the configured root, falling back to the default root if
    /// the configured one cannot be used.
    ///
    /// # Errors
    ///
    /// Returns an error if neither root accepts the write.
    pub async fn store(
        &self,
        file: &InboundFile,
        configured_root: Option<&str>,
    ) -> Result<LocalWrite, StorageError> {
        let Some(configured) = configured_root.map(PathBuf::from) else {
            return self.write(file, &self.default_root).await;
        };

        match self.write(file, &configured).await {
            Ok(written) => Ok(written),
            Err(e) if configured != self.default_root => {
                warn!(
                    configured_root = %configured.display(),
                    default_root = %self.default_root.display(),
                    error = %e,
                    "Configured root unavailable, writing to default root"
                );
                self.write(file, &self.default_root).await
            }
            Err(e) => Err(e),
        }
    }

    /// Read `filename` from the configured root, or from the default root if it
    /// is not there.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if neither root holds the file.
    pub async fn resolve(
        &self,
        filename: &str,
        configured_root: Option<&str>,
    ) -> Result<ResolvedFile, StorageError> {
        if !is_valid_stored_name(filename) {
            return Err(StorageError::InvalidFilename(filename.to_string()));
        }

        let configured = self.effective_root(configured_root);
        let mut candidates = vec![configured];
        if candidates[0] != self.default_root {
            candidates.push(self.default_root.clone());
        }

        for root in candidates {
            if let Some(content) = Self::read_if_present(&root, filename).await? {
                let root = std::path::absolute(&root)?;
                return Ok(ResolvedFile {
                    path: root.join(filename),
                    content,
                });
            }
            debug!(root = %root.display(), filename, "File not under root");
        }

        Err(StorageError::not_found(filename))
    }

    /// Read `filename` under `root`; `None` if the root or the file is absent.
    async fn read_if_present(root: &Path, filename: &str) -> Result<Option<Bytes>, StorageError> {
        if !tokio::fs::try_exists(root).await.unwrap_or(false) {
            return Ok(None);
        }

        let operator = Self::create_operator(root)?;
        match operator.stat(filename).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let buffer = operator.read(filename).await?;
        Ok(Some(buffer.to_bytes()))
    }

    /// Create OpenDAL operator rooted at `root`.
    fn create_operator(root: &Path) -> Result<Operator, StorageError> {
        let root = root
            .to_str()
            .ok_or_else(|| StorageError::configuration("invalid path"))?;

        Ok(Operator::new(services::Fs::default().root(root))
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pdf(name: &str, content: &[u8]) -> InboundFile {
        InboundFile::new(name, "application/pdf", content.to_vec())
    }

    #[rstest]
    #[case("invoice.pdf", "invoice.pdf")]
    #[case("report (final)!.pdf", "report__final__.pdf")]
    #[case("my-file_v2.pdf", "my_file_v2.pdf")]
    #[case("日本語.pdf", "___.pdf")]
    #[case("../../etc/passwd", ".._.._etc_passwd")]
    fn test_sanitize_filename(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_filename(input), expected);
    }

    #[test]
    fn test_generate_filename() {
        assert_eq!(
            generate_filename("report (final)!.pdf", 1_700_000_000_123),
            "1700000000123-report__final__.pdf"
        );
        assert_eq!(generate_filename("", 5), "5-file");
    }

    #[test]
    fn test_next_stamp_strictly_increases() {
        let stamps: Vec<i64> = (0..1000).map(|_| next_stamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[rstest]
    #[case("1700000000123-invoice.pdf", true)]
    #[case("1700000000123-report__final__.pdf", true)]
    #[case("../secret", false)]
    #[case("a/b.pdf", false)]
    #[case(".hidden", false)]
    #[case("", false)]
    fn test_is_valid_stored_name(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_valid_stored_name(name), expected);
    }

    #[test]
    fn test_effective_root() {
        let backend = LocalBackend::new("uploads");
        assert_eq!(backend.effective_root(None), PathBuf::from("uploads"));
        assert_eq!(
            backend.effective_root(Some("/data/a")),
            PathBuf::from("/data/a")
        );
    }

    #[tokio::test]
    async fn test_write_creates_root_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("nested").join("uploads");
        let backend = LocalBackend::new(dir.path().join("default"));

        let written = backend
            .write(&pdf("invoice.pdf", b"%PDF-1.4 body"), &root)
            .await
            .expect("write");

        assert!(written.filename.ends_with("-invoice.pdf"));
        assert!(written.local_path.is_absolute());
        assert_eq!(
            std::fs::read(&written.local_path).expect("read back"),
            b"%PDF-1.4 body"
        );

        let resolved = backend
            .resolve(&written.filename, root.to_str())
            .await
            .expect("resolve");
        assert_eq!(&resolved.content[..], b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_write_into_existing_root_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalBackend::new(dir.path());
        backend
            .write(&pdf("a.pdf", b"a"), dir.path())
            .await
            .expect("first write");
        backend
            .write(&pdf("a.pdf", b"b"), dir.path())
            .await
            .expect("second write");
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 2);
    }

    #[tokio::test]
    async fn test_write_never_replaces_existing_stored_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalBackend::new(dir.path());
        let taken: Vec<String> = (100..104).map(|stamp| generate_filename("a.pdf", stamp)).collect();
        for (i, name) in taken.iter().enumerate() {
            std::fs::write(dir.path().join(name), format!("existing-{i}")).expect("seed");
        }

        let written = backend
            .write_from(&pdf("a.pdf", b"new"), dir.path(), 100)
            .await
            .expect("write");

        assert!(!taken.contains(&written.filename));
        assert_eq!(std::fs::read(&written.local_path).expect("read"), b"new");
        for (i, name) in taken.iter().enumerate() {
            assert_eq!(
                std::fs::read_to_string(dir.path().join(name)).expect("read"),
                format!("existing-{i}")
            );
        }
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), taken.len() + 1);
    }

    #[tokio::test]
    async fn test_publish_refuses_taken_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("1-a.pdf"), b"first").expect("seed");

        let published = publish_new(dir.path(), "1-a.pdf", b"second")
            .await
            .expect("publish");

        assert!(!published);
        assert_eq!(std::fs::read(dir.path().join("1-a.pdf")).expect("read"), b"first");
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_partial_file_is_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (partial, mut out) = PartialFile::create(dir.path(), "1-a.pdf")
            .await
            .expect("create");
        out.write_all(b"half").await.expect("write");
        assert!(partial.path.exists());
        assert!(!is_valid_stored_name(
            partial.path.file_name().and_then(|n| n.to_str()).expect("name")
        ));

        drop(out);
        drop(partial);

        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_default_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_root = dir.path().join("default");
        let backend = LocalBackend::new(&default_root);

        let written = backend
            .store(&pdf("id.pdf", b"identity"), None)
            .await
            .expect("write to default");

        let other = dir.path().join("other");
        let resolved = backend
            .resolve(&written.filename, other.to_str())
            .await
            .expect("fallback resolve");
        assert_eq!(&resolved.content[..], b"identity");
        assert!(resolved.path.starts_with(std::path::absolute(&default_root).expect("abs")));
    }

    #[tokio::test]
    async fn test_resolve_missing_everywhere() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalBackend::new(dir.path().join("default"));
        let err = backend
            .resolve("1-missing.pdf", Some("/nonexistent/dossier/root"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let backend = LocalBackend::new("uploads");
        let err = backend.resolve("../Cargo.toml", None).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidFilename(_)));
    }

    #[tokio::test]
    async fn test_store_falls_back_when_configured_root_unusable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").expect("create blocker file");
        let configured = blocker.join("uploads");
        let backend = LocalBackend::new(dir.path().join("default"));

        let written = backend
            .store(&pdf("a.pdf", b"x"), configured.to_str())
            .await
            .expect("fallback write");
        assert!(written.local_path.starts_with(std::path::absolute(dir.path().join("default")).expect("abs")));
    }
}
