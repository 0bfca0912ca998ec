//! Authenticated request pipeline
//!
//! Every protected call goes through [`RequestInterceptor::request`], which
//! attaches the stored bearer token and turns a 401 into one coordinated
//! refresh followed by exactly one retry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use url::Url;
use warden_config::ApiConfig;

use crate::error::{ClientError, ClientResult, TransportError};
use crate::refresh::RefreshCoordinator;
use crate::token::TokenKind;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, MultipartField};

/// Sends protected requests on behalf of one session
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    api: ApiConfig,
    transport: Arc<dyn HttpTransport>,
    coordinator: RefreshCoordinator,
    timeout: Duration,
}

impl RequestInterceptor {
    /// Interceptor refreshing through `coordinator`.
    pub fn new(
        api: &ApiConfig,
        transport: Arc<dyn HttpTransport>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            api: api.clone(),
            transport,
            coordinator,
            timeout: api.request_timeout,
        }
    }

    /// Base URL relative paths are joined onto.
    pub fn base_url(&self) -> &str {
        &self.api.base_url
    }

    /// Absolute URL for `path`, resolved against the configured base URL.
    pub fn url(&self, path: &str) -> ClientResult<String> {
        let url = self.api.url_for(path);
        Url::parse(&url).map_err(|_| ClientError::InvalidUrl(url.clone()))?;
        Ok(url)
    }

    /// Send `request`, refreshing and retrying once on a 401.
    ///
    /// Non-401 responses are returned untouched whatever their status. A 401
    /// on a request sent without a token is returned as is.
    pub async fn request(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let request = request.negotiated();
        let Some(access) = self.coordinator.store().get(TokenKind::Access) else {
            return self.send(request).await;
        };

        let response = self.send(request.clone().with_bearer(&access)?).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        log::info!(
            "[RequestInterceptor] {} {} returned 401, refreshing session",
            request.method,
            request.url
        );
        let fresh = self.coordinator.refresh().await?;

        log::debug!("[RequestInterceptor] Retrying with refreshed token");
        // Whatever the retry returns is final, including another 401.
        self.send(request.with_bearer(&fresh)?).await
    }

    /// Send without credentials and without the refresh path, as login and
    /// signup do.
    pub async fn send_anonymous(
        &self,
        request: ApiRequest,
    ) -> ClientResult<ApiResponse> {
        self.send(request.negotiated()).await
    }

    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(sent) => Ok(sent?),
            Err(_) => Err(TransportError::Timeout(self.timeout).into()),
        }
    }

    /// `GET` `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.request(ApiRequest::get(self.url(path)?)).await?;
        decode(response)
    }

    /// `POST` a JSON body and decode the JSON answer.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(self.url(path)?).json(body)?;
        decode(self.request(request).await?)
    }

    /// `PUT` a JSON body and decode the JSON answer.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::put(self.url(path)?).json(body)?;
        decode(self.request(request).await?)
    }

    /// `DELETE` `path`, ignoring any body.
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        let response = self.request(ApiRequest::delete(self.url(path)?)).await?;
        ensure_success(response).map(|_| ())
    }

    /// Upload a multipart form. The boundary header is left to the transport.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: Vec<MultipartField>,
    ) -> ClientResult<T> {
        let request = ApiRequest::post(self.url(path)?).multipart(fields);
        decode(self.request(request).await?)
    }
}

fn ensure_success(response: ApiResponse) -> ClientResult<ApiResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            status: response.status,
            body: response.text(),
        })
    }
}

fn decode<T: DeserializeOwned>(response: ApiResponse) -> ClientResult<T> {
    Ok(ensure_success(response)?.json()?)
}
