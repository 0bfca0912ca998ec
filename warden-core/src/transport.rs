//! HTTP seam
//!
//! Requests and responses are plain owned data so that a request can be
//! replayed once after a refresh. [`HttpTransport`] is the only place that
//! touches the network; production code uses [`ReqwestTransport`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use warden_config::ApiConfig;

use crate::error::{ClientError, TransportError};
use crate::token::Token;

const APPLICATION_JSON: &str = "application/json";

/// Request payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// JSON value, sent with `application/json`
    Json(serde_json::Value),
    /// Raw bytes, content type left to the caller
    Bytes(Vec<u8>),
    /// Sent as `multipart/form-data`; the transport picks the boundary.
    Multipart(Vec<MultipartField>),
}

/// One field of a multipart form
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartField {
    /// Form field name
    pub name: String,
    /// Field content
    pub value: MultipartValue,
}

/// Content of a multipart field
#[derive(Clone, PartialEq)]
pub enum MultipartValue {
    /// Plain text value
    Text(String),
    /// File part with an optional MIME type
    File {
        /// Name reported to the server
        file_name: String,
        /// Content type of the part
        mime: Option<String>,
        /// File contents
        data: Vec<u8>,
    },
}

impl fmt::Debug for MultipartValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            MultipartValue::File {
                file_name,
                mime,
                data,
            } => f
                .debug_struct("File")
                .field("file_name", file_name)
                .field("mime", mime)
                .field("len", &data.len())
                .finish(),
        }
    }
}

impl MultipartField {
    /// Text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::Text(value.into()),
        }
    }

    /// File field.
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::File {
                file_name: file_name.into(),
                mime: mime.map(str::to_string),
                data,
            },
        }
    }
}

/// An outbound API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Headers set so far
    pub headers: HeaderMap,
    /// Payload
    pub body: RequestBody,
}

impl ApiRequest {
    /// Request with no headers and an empty body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// `PUT` request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// `DELETE` request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Set a header, replacing any earlier value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(
        mut self,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Use `data` as a raw payload.
    pub fn bytes(mut self, data: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes(data);
        self
    }

    /// Send `fields` as `multipart/form-data`.
    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// True when the body is a multipart form.
    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }

    /// Fill in JSON content negotiation headers the caller did not set.
    /// Multipart requests are left alone.
    pub fn negotiated(mut self) -> Self {
        if self.is_multipart() {
            return self;
        }
        if matches!(self.body, RequestBody::Json(_))
            && !self.headers.contains_key(CONTENT_TYPE)
        {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }
        if !self.headers.contains_key(ACCEPT) {
            self.headers
                .insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        }
        self
    }

    /// Attach (or replace) the bearer credential.
    pub fn with_bearer(mut self, token: &Token) -> Result<Self, ClientError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|_| ClientError::InvalidHeader(AUTHORIZATION.to_string()))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// The bearer token currently attached, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    }
}

/// A response with its body fully read
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Whole response body
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request and reads the whole response
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Send `request` and read the full response. Non-2xx statuses are not errors here.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a client bounded by the configured request timeout.
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()?;

        log::info!(
            "[ReqwestTransport] Creating HTTP transport for base URL: {}",
            config.base_url
        );

        Ok(Self {
            client,
            timeout: config.request_timeout,
        })
    }

    fn into_form(fields: Vec<MultipartField>) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for field in fields {
            form = match field.value {
                MultipartValue::Text(text) => form.text(field.name, text),
                MultipartValue::File {
                    file_name,
                    mime,
                    data,
                } => {
                    let mut part = Part::bytes(data).file_name(file_name);
                    if let Some(mime) = mime {
                        part = part.mime_str(&mime).map_err(|e| {
                            TransportError::Request(format!(
                                "invalid multipart mime type '{mime}': {e}"
                            ))
                        })?;
                    }
                    form.part(field.name, part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Bytes(data) => builder.body(data),
            RequestBody::Multipart(fields) => {
                builder.multipart(Self::into_form(fields)?)
            }
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::from(e)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(TransportError::from)?;

        Ok(ApiResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
