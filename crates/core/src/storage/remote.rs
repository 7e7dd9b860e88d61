//! Remote object backend: Google Drive v3 with a service account.
//!
//! Authentication is the JWT bearer grant: a short-lived RS256 assertion signed
//! with the service account key is exchanged for an access token scoped to
//! `drive.file` (only files this app created). The upload is a single
//! `multipart/related` request whose media part is the inbound bytes.

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{
    Body, Client, StatusCode,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::RemoteCredentials;
use super::document::InboundFile;
use super::error::StorageError;

/// OAuth scope limited to files created by this app.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Grant type for the service account assertion flow.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime accepted by the token endpoint (max one hour).
const ASSERTION_TTL_SECS: i64 = 3600;

/// Provider endpoints.
#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    /// Token endpoint used when the credentials carry no `token_uri`.
    pub token_url: String,
    /// Media upload endpoint for file creation.
    pub upload_url: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            upload_url: "https://www.googleapis.com/upload/drive/v3/files".to_string(),
        }
    }
}

/// A confirmed remote upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUpload {
    /// Provider object id.
    pub external_id: String,
    /// Provider viewer URL.
    pub access_url: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: Option<String>,
    web_view_link: Option<String>,
}

/// Remote object backend.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    http: Client,
    endpoints: DriveEndpoints,
}

impl RemoteBackend {
    /// Create a backend with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoints: DriveEndpoints, timeout: Duration) -> Result<Self, StorageError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::configuration(e.to_string()))?;
        Ok(Self::with_client(http, endpoints))
    }

    /// Create a backend around an existing client.
    #[must_use]
    pub fn with_client(http: Client, endpoints: DriveEndpoints) -> Self {
        Self { http, endpoints }
    }

    /// Upload `file` into `container_id`.
    ///
    /// Returns only after the provider confirmed the object with both an id and
    /// a viewer URL.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] on authentication, permission, quota,
    /// not-found, or transport failures; `retryable` tells the caller whether a
    /// later attempt may succeed.
    pub async fn upload(
        &self,
        file: &InboundFile,
        container_id: &str,
        credentials: &RemoteCredentials,
    ) -> Result<RemoteUpload, StorageError> {
        let access_token = self.authenticate(credentials).await?;

        let boundary = format!(
            "dossier_{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let metadata = serde_json::json!({
            "name": file.original_name,
            "mimeType": file.mime_type,
            "parents": [container_id],
        });
        let head = Bytes::from(format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{boundary}\r\nContent-Type: {}\r\n\r\n",
            file.mime_type
        ));
        let tail = Bytes::from(format!("\r\n--{boundary}--\r\n"));
        let content_length = head.len() + file.content.len() + tail.len();

        let parts: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(head), Ok(file.content.clone()), Ok(tail)];

        let response = self
            .http
            .post(&self.endpoints.upload_url)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .bearer_auth(&access_token)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .header(CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(stream::iter(parts)))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(upload_status_error(status, container_id, &detail));
        }

        let created: DriveFile = response
            .json()
            .await
            .map_err(|e| StorageError::backend(format!("unreadable upload response: {e}"), false))?;

        let external_id = created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StorageError::backend("provider response missing object id", false))?;
        let access_url = created
            .web_view_link
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StorageError::backend("provider response missing viewer URL", false))?;

        info!(
            external_id = %external_id,
            container_id,
            size = file.size_bytes(),
            "Uploaded file to remote storage"
        );

        Ok(RemoteUpload {
            external_id,
            access_url,
        })
    }

    /// Exchange a signed assertion for an access token.
    async fn authenticate(&self, credentials: &RemoteCredentials) -> Result<String, StorageError> {
        let token_url = credentials
            .token_uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .unwrap_or(&self.endpoints.token_url);

        let assertion = sign_assertion(credentials, token_url, Utc::now().timestamp())?;

        let response = self
            .http
            .post(token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StorageError::backend(
                format!("authentication failed ({status}): {detail}"),
                is_retryable_status(status),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::backend(format!("unreadable token response: {e}"), false))?;

        debug!(client_email = %credentials.client_email, "Obtained remote access token");
        Ok(token.access_token)
    }
}

/// Sign the service account assertion.
fn sign_assertion(
    credentials: &RemoteCredentials,
    audience: &str,
    issued_at: i64,
) -> Result<String, StorageError> {
    // Keys pasted through forms often arrive with escaped newlines.
    let pem = credentials.private_key.replace("\\n", "\n");
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
        StorageError::backend(format!("invalid service account private key: {e}"), false)
    })?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid.clone_from(&credentials.private_key_id);

    let claims = AssertionClaims {
        iss: &credentials.client_email,
        scope: DRIVE_FILE_SCOPE,
        aud: audience,
        iat: issued_at,
        exp: issued_at + ASSERTION_TTL_SECS,
    };

    encode(&header, &claims, &key)
        .map_err(|e| StorageError::backend(format!("failed to sign assertion: {e}"), false))
}

/// 408, 429 and 5xx may succeed later; everything else will not.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn upload_status_error(status: StatusCode, container_id: &str, detail: &str) -> StorageError {
    let message = match status {
        StatusCode::UNAUTHORIZED => format!("credentials rejected ({status}): {detail}"),
        StatusCode::FORBIDDEN => format!("permission or quota denied ({status}): {detail}"),
        StatusCode::NOT_FOUND => format!("container '{container_id}' not found: {detail}"),
        _ => format!("upload failed ({status}): {detail}"),
    };
    StorageError::backend(message, is_retryable_status(status))
}

fn transport_error(err: reqwest::Error) -> StorageError {
    let retryable = !(err.is_builder() || err.is_decode() || err.is_redirect());
    StorageError::backend(format!("remote request failed: {err}"), retryable)
}
