//! reqwest-backed transport
//!
//! Submissions are JSON POSTs to the endpoint, uploads are multipart POSTs
//! with a `temp_file` and an `image_height` part, option lookups are GETs
//! with `field` and `query` parameters. The session token is read from the
//! environment on every request and sent in the configured header.

use crate::config::ClientConfig;
use crate::error::ConfigError;
use crate::transport::{OptionsPage, Transport};
use formset_runtime::{
    FieldPath, FileHandle, FileSelection, SubmitResponse, TransportError, UploadError,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument, warn};

pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    upload_endpoint: Url,
    session_header: HeaderName,
    session_token_env: String,
    thumbnail_height: u32,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint_url()?,
            upload_endpoint: config.upload_url()?,
            session_header: config.header_name()?,
            session_token_env: config.session_token_env.clone(),
            thumbnail_height: config.thumbnail_height,
        })
    }

    fn session_headers(&self) -> Result<HeaderMap, TransportError> {
        let missing = || TransportError::MissingSessionToken(self.session_token_env.clone());
        let token = std::env::var(&self.session_token_env)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(missing)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            self.session_header.clone(),
            HeaderValue::from_str(&token).map_err(|_| missing())?,
        );
        Ok(headers)
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_decode() {
        TransportError::Decode(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, TransportError> {
    serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Map a submission response onto the runtime's verdict
pub fn interpret_submit(status: u16, body: &str) -> Result<SubmitResponse, TransportError> {
    match status {
        200 => {
            let payload: JsonValue = if body.trim().is_empty() {
                JsonValue::Null
            } else {
                decode(body)?
            };
            let success_url = payload
                .get("success_url")
                .and_then(JsonValue::as_str)
                .map(str::to_string);
            Ok(SubmitResponse::Accepted { success_url })
        }
        422 => Ok(SubmitResponse::Rejected {
            errors: decode(body)?,
        }),
        403 => Err(TransportError::SessionRejected),
        status => Err(TransportError::Status {
            status,
            body: body.to_string(),
        }),
    }
}

pub fn interpret_upload(status: u16, body: &str) -> Result<FileHandle, UploadError> {
    match status {
        200 | 201 => Ok(decode(body)?),
        403 => Err(TransportError::SessionRejected.into()),
        status => Err(UploadError::Refused(status)),
    }
}

pub fn interpret_options(status: u16, body: &str) -> Result<OptionsPage, TransportError> {
    match status {
        200 => decode(body),
        403 => Err(TransportError::SessionRejected),
        status => Err(TransportError::Status {
            status,
            body: body.to_string(),
        }),
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, body), fields(endpoint = %self.endpoint))]
    async fn submit(&self, body: &JsonValue) -> Result<SubmitResponse, TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.session_headers()?)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        debug!(status, bytes = text.len(), "submission response");

        let verdict = interpret_submit(status, &text);
        if let Err(error) = &verdict {
            warn!(%error, "submission transport error");
        }
        verdict
    }

    #[instrument(skip(self, file), fields(file = %file.name))]
    async fn upload(&self, field: &FieldPath, file: &FileSelection) -> Result<FileHandle, UploadError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| UploadError::Transfer(e.to_string()))?;
        let form = Form::new()
            .part("temp_file", part)
            .text("image_height", self.thumbnail_height.to_string());

        let response = self
            .client
            .post(self.upload_endpoint.clone())
            .headers(self.session_headers()?)
            .multipart(form)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        debug!(status, "upload response");
        interpret_upload(status, &text)
    }

    #[instrument(skip(self))]
    async fn fetch_options(&self, field: &str, query: &str) -> Result<OptionsPage, TransportError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .headers(self.session_headers()?)
            .query(&[("field", field), ("query", query)])
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        interpret_options(status, &text)
    }
}
