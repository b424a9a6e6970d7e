//! `reqwest`-backed transport.

use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, RequestBuilder};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::types::{MultipartUpload, ProgressCallback, Response, TransportConfig};

/// Joins a base URL and an API path with exactly one slash between them.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Async HTTP transport with per-request timeouts.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    config: TransportConfig,
}

impl Transport {
    /// Builds a transport from the given settings.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.request_timeout);

        if config.accept_invalid_certs {
            warn!("TLS certificate verification disabled; use only against local servers");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().map_err(TransportError::Build)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// GET with the short timeout.
    pub async fn get(&self, url: &str, bearer: Option<&str>) -> Result<Response, TransportError> {
        let req = authorize(self.http.get(url), bearer);
        self.execute(req, self.config.request_timeout).await
    }

    /// POST a JSON body with the short timeout.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        bearer: Option<&str>,
    ) -> Result<Response, TransportError> {
        let req = authorize(self.http.post(url), bearer).json(body);
        self.execute(req, self.config.request_timeout).await
    }

    /// PUT a JSON body with the short timeout.
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        bearer: Option<&str>,
    ) -> Result<Response, TransportError> {
        let req = authorize(self.http.put(url), bearer).json(body);
        self.execute(req, self.config.request_timeout).await
    }

    /// POST an `application/x-www-form-urlencoded` body with the short timeout.
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> Result<Response, TransportError> {
        let req = authorize(self.http.post(url), bearer).form(fields);
        self.execute(req, self.config.request_timeout).await
    }

    /// Sends a multipart form with the long upload timeout.
    ///
    /// The file part is streamed from disk rather than buffered. `progress`
    /// receives cumulative bytes read from the file. Cancelling `cancel`
    /// drops the in-flight request and returns [`TransportError::Cancelled`].
    pub async fn send_multipart(
        &self,
        method: Method,
        url: &str,
        upload: MultipartUpload,
        bearer: Option<&str>,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let MultipartUpload { fields, file } = upload;
        let io_err = |source: std::io::Error| TransportError::Io {
            path: file.path.clone(),
            source,
        };

        let handle = tokio::fs::File::open(&file.path).await.map_err(io_err)?;
        let total = handle.metadata().await.map_err(io_err)?.len();

        let mut sent: u64 = 0;
        let stream = ReaderStream::new(handle).inspect_ok(move |chunk| {
            sent += chunk.len() as u64;
            if let Some(cb) = &progress {
                cb(sent, total);
            }
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(TransportError::Build)?;

        let form = fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part(file.field_name.clone(), part);

        debug!(%method, url, bytes = total, file = %file.file_name, "sending multipart upload");

        let req = authorize(self.http.request(method, url), bearer).multipart(form);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            res = self.execute(req, self.config.upload_timeout) => res,
        }
    }

    /// Checks that `url` answers at all. Returns the HTTP status.
    pub async fn probe(&self, url: &str) -> Result<u16, TransportError> {
        let resp = self.get(url, None).await?;
        Ok(resp.status)
    }

    async fn execute(
        &self,
        req: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let resp = req
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        let status = resp.status().as_u16();
        let url = resp.url().path().to_string();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        debug!(status, path = %url, bytes = body.len(), "response received");
        Ok(Response { status, body })
    }
}

fn authorize(req: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => req.bearer_auth(token),
        None => req,
    }
}
