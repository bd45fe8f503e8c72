//! Authenticated request gateway
//!
//! Every backend call goes through [`ApiClient::send`]:
//!
//! 1. Protected paths get `Authorization: Bearer <token>` from the
//!    [`AccessTokenProvider`]; public paths are sent bare.
//! 2. A 401 on a protected call renews the token and replays the request
//!    exactly once. If renewal yields nothing, or the replay is rejected
//!    too, the caller gets a session-expired error. A failed refresh fires
//!    the logout signal once, however many requests were waiting on it.
//! 3. Everything else is normalized into a [`DomainError`]; transport
//!    errors never reach the caller as-is.

use std::fmt;
use std::sync::Arc;

use medool_common::auth::{LogoutSignal, Renewal};
use medool_domain::{DomainError, Page};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

use super::auth::AccessTokenProvider;
use super::endpoints::EndpointPolicy;
use super::errors::classify_response;
use super::multipart::MultipartBody;
use crate::errors::IntoDomainError;
use crate::http::HttpClient;

/// Request payload
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

/// A backend call that can be sent more than once
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: RequestBody::Empty }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn with_query<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query.extend(params.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// # Errors
    /// `Unknown` when `body` cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, DomainError> {
        let value = serde_json::to_value(body)
            .map_err(|err| DomainError::unknown(format!("failed to serialize body: {err}")))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    #[must_use]
    pub fn with_multipart(mut self, body: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(body);
        self
    }
}

/// Gateway to the Medool REST API
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    endpoints: EndpointPolicy,
    auth: Arc<dyn AccessTokenProvider>,
    logout: LogoutSignal,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        endpoints: EndpointPolicy,
        auth: Arc<dyn AccessTokenProvider>,
        logout: LogoutSignal,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url, endpoints, auth, logout }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn logout_signal(&self) -> &LogoutSignal {
        &self.logout
    }

    /// # Errors
    /// See [`Self::send`].
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, DomainError> {
        self.send(ApiRequest::get(path)).await
    }

    /// # Errors
    /// See [`Self::send`].
    pub async fn get_with_query<R, K, V>(
        &self,
        path: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Result<R, DomainError>
    where
        R: DeserializeOwned,
        K: Into<String>,
        V: Into<String>,
    {
        self.send(ApiRequest::get(path).with_query(params)).await
    }

    /// One page of a list endpoint.
    ///
    /// # Errors
    /// See [`Self::send`]; a body that is not exactly a [`Page`] is `Unknown`.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Page<T>, DomainError> {
        let params = [("offset", offset.to_string()), ("limit", limit.to_string())];
        self.get_with_query(path, params).await
    }

    /// # Errors
    /// See [`Self::send`].
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, DomainError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(ApiRequest::new(Method::POST, path).with_json(body)?).await
    }

    /// # Errors
    /// See [`Self::send`].
    pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R, DomainError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(ApiRequest::new(Method::PUT, path).with_json(body)?).await
    }

    /// # Errors
    /// See [`Self::send`].
    pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R, DomainError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(ApiRequest::new(Method::PATCH, path).with_json(body)?).await
    }

    /// # Errors
    /// See [`Self::send`].
    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, DomainError> {
        self.send(ApiRequest::new(Method::DELETE, path)).await
    }

    /// Send a multipart body with `POST`.
    ///
    /// # Errors
    /// See [`Self::send`].
    pub async fn send_multipart<R: DeserializeOwned>(
        &self,
        path: &str,
        body: MultipartBody,
    ) -> Result<R, DomainError> {
        self.send(ApiRequest::new(Method::POST, path).with_multipart(body)).await
    }

    /// Send `request` and decode the JSON response into `R`.
    ///
    /// 204/205 and empty bodies decode as JSON `null`, so `R` may be `()`,
    /// an `Option` or `serde_json::Value` for such endpoints.
    ///
    /// # Errors
    /// A normalized [`DomainError`]:
    /// - `Network` when no response arrived
    /// - `Authorization` with the session-expired message when the session
    ///   could not be restored after a 401
    /// - the envelope classification for any other non-2xx response
    /// - `Unknown` for a success body that does not decode into `R`
    pub async fn send<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, DomainError> {
        let request_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "api_request",
            %request_id,
            method = %request.method,
            path = %request.path,
        );
        self.send_inner(request).instrument(span).await
    }

    async fn send_inner<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, DomainError> {
        if !self.endpoints.is_protected(&request.path) {
            let response = self.dispatch(&request, None).await?;
            return decode(response).await;
        }

        let token = self.auth.access_token().await;
        if token.is_none() {
            debug!("no access token available; sending protected request without credentials");
        }

        let response = self.dispatch(&request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response).await;
        }

        self.replay_after_rejection(&request, token.as_deref()).await
    }

    #[instrument(skip_all)]
    async fn replay_after_rejection<R: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        rejected: Option<&str>,
    ) -> Result<R, DomainError> {
        info!("access token rejected; refreshing and replaying once");

        let fresh = match self.auth.renew_after_rejection(rejected).await {
            Renewal::Renewed(token) => token,
            Renewal::Expired { report } => {
                return Err(self.expire_session("refresh yielded no token", report));
            }
        };

        let replay = self.dispatch(request, Some(&fresh)).await?;
        if replay.status() == StatusCode::UNAUTHORIZED {
            return Err(self.expire_session("replay rejected after refresh", true));
        }

        decode(replay).await
    }

    /// Session-expired error for the caller; `raise` decides whether this
    /// caller also fires the logout signal.
    fn expire_session(&self, reason: &'static str, raise: bool) -> DomainError {
        if raise {
            warn!(reason, "session could not be restored; forcing logout");
            self.logout.raise();
        } else {
            debug!(reason, "session already reported lost");
        }
        DomainError::session_expired().with_technical(reason)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, DomainError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(body) => {
                if let Some(progress) = &body.progress {
                    progress.reset();
                }
                builder.multipart(body.to_form()?)
            }
        };

        self.http.send(builder).await
    }
}

async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, DomainError> {
    let status = response.status();
    let body = response.bytes().await.map_err(IntoDomainError::into_domain)?;

    if !status.is_success() {
        let error = classify_response(status.as_u16(), &body);
        warn!(
            status = status.as_u16(),
            kind = %error.kind,
            code = error.code.as_deref(),
            technical = error.technical.as_deref().unwrap_or_default(),
            "request failed"
        );
        return Err(error);
    }

    let no_content = status == StatusCode::NO_CONTENT
        || status == StatusCode::RESET_CONTENT
        || body.iter().all(u8::is_ascii_whitespace);

    let decoded = if no_content {
        serde_json::from_value(serde_json::Value::Null)
    } else {
        serde_json::from_slice(&body)
    };

    decoded.map_err(|err| {
        warn!(status = status.as_u16(), error = %err, "malformed response body");
        DomainError::unknown(format!("malformed response body: {err}")).with_status(status.as_u16())
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use medool_domain::ErrorKind;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct StaticToken(Option<&'static str>);

    #[async_trait]
    impl AccessTokenProvider for StaticToken {
        async fn access_token(&self) -> Option<String> {
            self.0.map(str::to_string)
        }

        async fn renew_after_rejection(&self, _rejected: Option<&str>) -> Renewal {
            Renewal::Expired { report: true }
        }
    }

    fn client(server: &MockServer, token: Option<&'static str>) -> ApiClient {
        ApiClient::new(
            HttpClient::new().unwrap(),
            server.uri(),
            EndpointPolicy::default(),
            Arc::new(StaticToken(token)),
            LogoutSignal::new(),
        )
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct City {
        name: String,
    }

    /// Validates bearer attachment by endpoint class.
    ///
    /// Assertions:
    /// - Public paths carry no `Authorization` header.
    /// - Protected paths carry the provider's token.
    #[tokio::test]
    async fn bearer_only_on_protected_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profiles"))
            .and(header("authorization", "Bearer a-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "Pune"}])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, Some("a-1"));

        let profiles: Vec<serde_json::Value> = api.get("/profiles").await.unwrap();
        assert!(profiles.is_empty());

        let cities: Vec<City> = api.get("/cities").await.unwrap();
        assert_eq!(cities, vec![City { name: "Pune".into() }]);

        let requests = server.received_requests().await.unwrap();
        let cities_request = requests.iter().find(|r| r.url.path() == "/cities").unwrap();
        assert!(!cities_request.headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn empty_and_no_content_bodies_decode_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let api = client(&server, Some("a-1"));

        let deleted: Option<serde_json::Value> = api.delete("/addresses/1").await.unwrap();
        assert!(deleted.is_none());
        let () = api.put("/addresses/1", &json!({"city": "Pune"})).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_success_body_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let error = client(&server, None).get::<Vec<City>>("/cities").await.unwrap_err();

        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(!error.user_message.contains("html"));
    }

    #[tokio::test]
    async fn get_page_sends_offset_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prescriptions"))
            .and(query_param("offset", "20"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "Pune"}],
                "total": 21,
                "limit": 10,
                "offset": 20,
                "has_more": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page: Page<City> =
            client(&server, Some("a-1")).get_page("/prescriptions", 20, 10).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_offset(), None);
    }

    /// Validates the public-endpoint 401 path.
    ///
    /// Assertions:
    /// - No refresh or replay is attempted.
    /// - The logout signal stays quiet.
    /// - The envelope code decides the message.
    #[tokio::test]
    async fn public_401_is_classified_without_logout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verify-otp"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": "invalid_otp", "message": "otp mismatch"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, None);
        let error = api
            .post::<_, serde_json::Value>("/auth/verify-otp", &json!({"phone": "1", "otp": "0"}))
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Authorization);
        assert_eq!(error.user_message, "Invalid OTP. Please try again.");
        assert_eq!(api.logout_signal().raised_count(), 0);
    }
}
