//! Retrieval of locally stored files.

use axum::{
    Router,
    extract::{Path, State},
    http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};

use dossier_core::cancel::CancellationToken;
use dossier_core::storage::RETRIEVAL_PATH;

use crate::{AppState, error::ApiError};

/// Creates the retrieval routes, mounted at the root rather than under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route(&format!("{RETRIEVAL_PATH}/{{filename}}"), get(retrieve))
}

/// GET `/uploads/{filename}`
/// Stream a stored file back, looking in the configured root then the default root.
async fn retrieve(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let config = state.config_store.load().await?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let file = state.retrieval.fetch(&filename, &config, &cancel).await?;

    Ok((
        [
            (CONTENT_TYPE, file.content_type.to_string()),
            (CONTENT_DISPOSITION, format!("inline; filename=\"{}\"", file.filename)),
            (CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        file.content,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use rstest::rstest;
    use tower::ServiceExt;

    use crate::create_router;
    use crate::test_support::state;
    use dossier_core::storage::{ConfigStore, StorageConfig};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn test_retrieve_from_default_root_after_root_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, store) = state(dir.path(), StorageConfig::local());
        std::fs::write(dir.path().join("1700000000000-policy.pdf"), b"%PDF-1.4").expect("write");
        store
            .save(StorageConfig::local().with_local_root(dir.path().join("elsewhere").to_string_lossy()))
            .await
            .expect("save");

        let response = create_router(state)
            .oneshot(get("/uploads/1700000000000-policy.pdf"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().expect("header"),
            "application/pdf"
        );
        let body = response.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_retrieve_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _) = state(dir.path(), StorageConfig::local());

        let response = create_router(state)
            .oneshot(get("/uploads/1700000000000-missing.pdf"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[case("/uploads/..%2F..%2Fetc%2Fpasswd")]
    #[case("/uploads/.env")]
    #[case("/uploads/name%20with%20space.pdf")]
    #[tokio::test]
    async fn test_retrieve_rejects_names_outside_alphabet(#[case] uri: &str) {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _) = state(dir.path(), StorageConfig::local());

        let response = create_router(state)
            .oneshot(get(uri))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
