//! Remote object-store backend over plain HTTP.
//!
//! One client covers both S3-compatible stores and the GCS XML API; the
//! two differ only in signing dialect and header prefixes, which come from
//! the [`SignScheme`]. Requests are path-style (`/{bucket}/{key}`) so the
//! same code talks to AWS, MinIO and storage.googleapis.com.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::ObjectStoreConfig;
use crate::error::{AppError, Result};
use crate::storage::sign::{self, SignScheme, Signer, EMPTY_PAYLOAD_SHA256};
use crate::storage::StorageBackend;

/// Error document returned by S3-compatible and GCS XML APIs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorDocument {
    code: String,
    message: String,
}

/// HTTP client for one configured bucket
pub struct ObjectStoreClient {
    http: reqwest::Client,
    signer: Signer,
    base_url: String,
    host: String,
    bucket: String,
    tag: &'static str,
}

impl ObjectStoreClient {
    pub fn new(
        scheme: SignScheme,
        service: &str,
        tag: &'static str,
        config: &ObjectStoreConfig,
    ) -> Result<Self> {
        let (base_url, host) = split_endpoint(&config.endpoint);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            signer: Signer::new(
                scheme,
                &config.access_key,
                &config.secret_key,
                &config.region,
                service,
            ),
            base_url,
            host,
            bucket: config.bucket.clone(),
            tag,
        })
    }

    /// Path-style object path, percent-encoded once and signed as-is
    fn object_path(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, sign::uri_encode(key, true))
    }

    async fn send(&self, method: Method, path: &str, body: Option<Bytes>) -> Result<reqwest::Response> {
        let payload_hash = match &body {
            Some(data) => sign::sha256_hex(data),
            None => EMPTY_PAYLOAD_SHA256.to_string(),
        };

        let headers = self.signer.sign_headers(
            method.as_str(),
            &self.host,
            path,
            &[],
            &payload_hash,
            Utc::now(),
        );

        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        for (name, value) in &headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(data) = body {
            req = req.body(data);
        }

        req.send().await.map_err(|e| {
            AppError::BackendUnavailable(format!("{} request failed: {}", self.tag, e))
        })
    }

    /// Map a non-success response onto the application error taxonomy
    async fn translate_error(&self, resp: reqwest::Response, key: &str) -> AppError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let detail = quick_xml::de::from_str::<ErrorDocument>(&body)
            .map(|doc| format!(" [{}: {}]", doc.code, doc.message))
            .unwrap_or_default();
        translate_status(self.tag, status, key, &detail)
    }

    pub async fn put_object(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.object_path(key);
        let resp = self.send(Method::PUT, &path, Some(data)).await?;
        if resp.status().is_success() {
            tracing::debug!("Stored object {} on {}", key, self.tag);
            return Ok(());
        }
        Err(self.translate_error(resp, key).await)
    }

    pub async fn get_object(&self, key: &str) -> Result<Bytes> {
        let path = self.object_path(key);
        let resp = self.send(Method::GET, &path, None).await?;
        if resp.status().is_success() {
            return resp.bytes().await.map_err(|e| {
                AppError::BackendUnavailable(format!("{} body read failed: {}", self.tag, e))
            });
        }
        Err(self.translate_error(resp, key).await)
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.object_path(key);
        let resp = self.send(Method::DELETE, &path, None).await?;
        // Deleting a missing object is success; clients retry deletes
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(self.translate_error(resp, key).await)
    }

    pub async fn head_object(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key);
        let resp = self.send(Method::HEAD, &path, None).await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(translate_status(self.tag, s, key, "")),
        }
    }

    pub fn presigned_get_url(&self, key: &str, expires: Duration) -> String {
        self.signer.presign_url(
            "GET",
            &self.base_url,
            &self.host,
            &self.object_path(key),
            expires.as_secs().max(1),
            Utc::now(),
        )
    }
}

/// Remote object-store backend adapter
pub struct ObjectStoreBackend {
    client: ObjectStoreClient,
    tag: &'static str,
}

impl ObjectStoreBackend {
    /// S3-compatible store (AWS, MinIO, ...)
    pub fn s3(config: &ObjectStoreConfig) -> Result<Self> {
        Ok(Self {
            client: ObjectStoreClient::new(SignScheme::Aws4, "s3", "s3", config)?,
            tag: "s3",
        })
    }

    /// GCS over the XML API with HMAC interoperability keys
    pub fn gcs(config: &ObjectStoreConfig) -> Result<Self> {
        Ok(Self {
            client: ObjectStoreClient::new(SignScheme::Goog4, "storage", "gcs", config)?,
            tag: "gcs",
        })
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.client.put_object(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.client.get_object(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client.delete_object(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.client.head_object(key).await
    }

    async fn download_url(&self, key: &str, expires: Duration) -> Result<Option<String>> {
        Ok(Some(self.client.presigned_get_url(key, expires)))
    }

    fn backend_type(&self) -> &'static str {
        self.tag
    }
}

/// Split a configured endpoint into base URL and host. A bare host gets
/// https; MinIO-style deployments may configure `http://host:9000`.
fn split_endpoint(endpoint: &str) -> (String, String) {
    if let Some((_, host)) = endpoint.split_once("://") {
        (
            endpoint.trim_end_matches('/').to_string(),
            host.trim_end_matches('/').to_string(),
        )
    } else {
        let host = endpoint.trim_end_matches('/');
        (format!("https://{}", host), host.to_string())
    }
}

fn translate_status(tag: &str, status: StatusCode, key: &str, detail: &str) -> AppError {
    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(format!("Object not found: {}", key)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::BackendUnavailable(format!(
            "{} rejected credentials ({}){}",
            tag, status, detail
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            AppError::BackendUnavailable(format!("{} throttled ({}){}", tag, status, detail))
        }
        s if s.is_server_error() => {
            AppError::BackendUnavailable(format!("{} error ({}){}", tag, status, detail))
        }
        s => AppError::Internal(format!(
            "{} returned unexpected status {} for {}{}",
            tag, s, key, detail
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ObjectStoreConfig {
        ObjectStoreConfig {
            endpoint: "minio.internal:9000".to_string(),
            bucket: "stratus".to_string(),
            region: "us-east-1".to_string(),
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
        }
    }

    #[test]
    fn test_split_endpoint() {
        assert_eq!(
            split_endpoint("minio.internal:9000"),
            (
                "https://minio.internal:9000".to_string(),
                "minio.internal:9000".to_string()
            )
        );
        assert_eq!(
            split_endpoint("http://localhost:9000/"),
            (
                "http://localhost:9000".to_string(),
                "localhost:9000".to_string()
            )
        );
        assert_eq!(
            split_endpoint("https://storage.googleapis.com"),
            (
                "https://storage.googleapis.com".to_string(),
                "storage.googleapis.com".to_string()
            )
        );
    }

    #[test]
    fn test_object_path_is_bucket_scoped_and_encoded() {
        let client = ObjectStoreClient::new(SignScheme::Aws4, "s3", "s3", &config()).unwrap();
        assert_eq!(client.object_path("ws1/f1/1"), "/stratus/ws1/f1/1");
        assert_eq!(client.object_path("a b"), "/stratus/a%20b");
    }

    #[test]
    fn test_status_translation() {
        let err = translate_status("s3", StatusCode::NOT_FOUND, "k", "");
        assert!(matches!(err, AppError::NotFound(_)));

        let err = translate_status("s3", StatusCode::FORBIDDEN, "k", "");
        assert!(matches!(err, AppError::BackendUnavailable(_)));

        let err = translate_status("gcs", StatusCode::SERVICE_UNAVAILABLE, "k", "");
        assert!(matches!(err, AppError::BackendUnavailable(_)));

        let err = translate_status("s3", StatusCode::IM_A_TEAPOT, "k", "");
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_error_document_decode() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
            <Error>
              <Code>NoSuchBucket</Code>
              <Message>The specified bucket does not exist</Message>
              <Resource>/stratus</Resource>
            </Error>"#;
        let doc: ErrorDocument = quick_xml::de::from_str(body).unwrap();
        assert_eq!(doc.code, "NoSuchBucket");
        assert_eq!(doc.message, "The specified bucket does not exist");
    }

    #[test]
    fn test_presigned_url_carries_signature_params() {
        let client = ObjectStoreClient::new(SignScheme::Aws4, "s3", "s3", &config()).unwrap();
        let url = client.presigned_get_url("ws1/f1/1", Duration::from_secs(600));
        assert!(url.starts_with("https://minio.internal:9000/stratus/ws1/f1/1?"));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Expires=600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[test]
    fn test_gcs_presigned_url_uses_goog_params() {
        let mut cfg = config();
        cfg.endpoint = "storage.googleapis.com".to_string();
        let client = ObjectStoreClient::new(SignScheme::Goog4, "storage", "gcs", &cfg).unwrap();
        let url = client.presigned_get_url("ws1/f1/1", Duration::from_secs(600));
        assert!(url.contains("X-Goog-Algorithm=GOOG4-HMAC-SHA256"));
        assert!(url.contains("X-Goog-Signature="));
    }
}
