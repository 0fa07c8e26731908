// WarpSpeed Engine - transport.rs

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{header, Client, RequestBuilder, StatusCode};

use crate::error::TransportError;
use crate::metadata::{RemoteFileInfo, ResourceLocation};

/// Body of a fetch, delivered chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// The fetch capability the engine consumes. Implementations decide what a
/// [`ResourceLocation`] means (HTTP, FTP, a test fixture...).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolves size, range support and validators for a resource.
    async fn file_info(&self, location: &ResourceLocation) -> Result<RemoteFileInfo, TransportError>;

    /// Streams bytes `[start, end)` of the resource.
    async fn fetch_range(
        &self,
        location: &ResourceLocation,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, TransportError>;

    /// Streams the whole resource from byte 0, without range semantics.
    async fn fetch_whole(&self, location: &ResourceLocation) -> Result<ByteStream, TransportError>;
}

/// HTTP(S) transport backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        HttpTransport { client }
    }

    fn authorize(&self, builder: RequestBuilder, location: &ResourceLocation) -> RequestBuilder {
        match &location.login {
            Some(login) => builder.basic_auth(login, location.password.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Unsuccessful(response.status().as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn file_info(&self, location: &ResourceLocation) -> Result<RemoteFileInfo, TransportError> {
        let request = self.authorize(self.client.head(&location.url), location);
        let response = self.send(request).await?;
        let headers = response.headers();

        let file_size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|val| val.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| TransportError::NoContentLength(location.url.clone()))?;

        let supports_ranges = headers
            .get(header::ACCEPT_RANGES)
            .map_or(false, |val| val == "bytes");

        let etag = headers
            .get(header::ETAG)
            .and_then(|val| val.to_str().ok())
            .map(|s| s.to_string());

        let last_modified = headers
            .get(header::LAST_MODIFIED)
            .and_then(|val| val.to_str().ok())
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let mime_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .map(|s| s.to_string());

        Ok(RemoteFileInfo {
            file_size,
            supports_ranges,
            etag,
            last_modified,
            mime_type,
        })
    }

    async fn fetch_range(
        &self,
        location: &ResourceLocation,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, TransportError> {
        if start >= end {
            return Ok(stream::empty().boxed());
        }
        // HTTP ranges are inclusive on both ends.
        let range_header = format!("bytes={}-{}", start, end - 1);
        let request = self
            .authorize(self.client.get(&location.url), location)
            .header(header::RANGE, range_header);
        let response = self.send(request).await?;

        if response.status() != StatusCode::PARTIAL_CONTENT && start > 0 {
            return Err(TransportError::Unsupported(format!(
                "{} ignored the range request",
                location.url
            )));
        }
        Ok(response.bytes_stream().map_err(TransportError::from).boxed())
    }

    async fn fetch_whole(&self, location: &ResourceLocation) -> Result<ByteStream, TransportError> {
        let request = self.authorize(self.client.get(&location.url), location);
        let response = self.send(request).await?;
        Ok(response.bytes_stream().map_err(TransportError::from).boxed())
    }
}
