//! Blob storage in a Google Cloud Storage bucket via the JSON API.

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;

use super::BlobStore;
use crate::errors::StateError;

const GCS_API_BASE: &str = "https://storage.googleapis.com";

/// Object names are a single path segment in the API, so `/` must be encoded.
const OBJECT_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Stores each blob as `<prefix>/<name>` in `bucket`.
///
/// Authentication is a pre-obtained OAuth bearer token; acquiring and refreshing
/// it is left to the environment (e.g. `gcloud auth print-access-token` in CI).
pub struct GcsBlobStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    prefix: String,
    token: String,
}

impl GcsBlobStore {
    pub fn new(bucket: String, prefix: String, token: String) -> Self {
        Self::with_base_url(GCS_API_BASE.to_string(), bucket, prefix, token)
    }

    pub fn with_base_url(base_url: String, bucket: String, prefix: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            prefix,
            token,
        }
    }

    fn object_name(&self, name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StateError> {
        let object = self.object_name(name);
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            utf8_percent_encode(&self.bucket, OBJECT_NAME),
            utf8_percent_encode(&object, OBJECT_NAME)
        );
        let read_err = |message: String| StateError::Read {
            name: object.clone(),
            message,
        };

        let resp = self
            .authorize(self.client.get(&url).query(&[("alt", "media")]))
            .send()
            .await
            .map_err(|e| read_err(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(read_err(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let bytes = resp.bytes().await.map_err(|e| read_err(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StateError> {
        let object = self.object_name(name);
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base_url,
            utf8_percent_encode(&self.bucket, OBJECT_NAME)
        );
        let write_err = |message: String| StateError::Write {
            name: object.clone(),
            message,
        };

        let resp = self
            .authorize(
                self.client
                    .post(&url)
                    .query(&[("uploadType", "media"), ("name", object.as_str())])
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(data),
            )
            .send()
            .await
            .map_err(|e| write_err(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(write_err(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.prefix.trim_matches('/'))
    }
}
