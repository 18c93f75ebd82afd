//! Outbound request pipeline.
//!
//! Every API call made on behalf of the user goes through [`RequestPipeline`]:
//! it attaches the bearer token and the active organization, and recovers a
//! 401 with one refresh and one retry. Calls to the credential endpoints pass
//! through untouched.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use findesk_core::{ApiResponse, PaginatedResponse};

use crate::config::endpoints;
use crate::error::{ClientError, ClientResult};
use crate::org_context::OrgContextManager;
use crate::session::SessionManager;
use crate::transport::{AUTHORIZATION, ApiRequest, ORGANIZATION_ID, RawResponse, Transport};

#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    session: Arc<SessionManager>,
    orgs: Arc<OrgContextManager>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionManager>,
        orgs: Arc<OrgContextManager>,
    ) -> Self {
        Self {
            transport,
            session,
            orgs,
        }
    }

    /// Send `request`, returning the response if it is 2xx.
    ///
    /// On a 401 with a refresh token available, the session is refreshed
    /// (shared with any concurrent caller) and the request is retried exactly
    /// once with the new token; that retry's outcome is final. If the refresh
    /// fails the session is gone and the original 401 is returned.
    pub async fn send(&self, request: ApiRequest) -> ClientResult<RawResponse> {
        if is_credential_endpoint(&request.path) {
            return into_result(self.transport.send(request).await?);
        }

        let access_token = self.session.access_token();
        let mut request = request;
        if let Some(token) = &access_token {
            request.set_header(AUTHORIZATION, bearer(token));
        }
        if let Some(org_id) = self.orgs.organization_id() {
            request.set_header(ORGANIZATION_ID, org_id.to_string());
        }

        let response = self.transport.send(request.clone()).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return into_result(response);
        }

        let rejected = ClientError::from_response(&response);
        if request.path.contains(endpoints::REFRESH) || self.session.refresh_token().is_none() {
            return Err(rejected);
        }

        tracing::debug!(path = %request.path, "401 received; attempting token refresh");
        let new_token = match self.session.refresh_if_stale(access_token.as_deref()).await {
            Ok(session) => session.access_token,
            Err(err) => {
                tracing::warn!(path = %request.path, "request unauthorized and refresh failed: {err}");
                return Err(rejected);
            }
        };
        let Some(new_token) = new_token else {
            self.session.force_logout();
            return Err(rejected);
        };

        request.set_header(AUTHORIZATION, bearer(&new_token));
        into_result(self.transport.send(request).await?)
    }

    /// Send and unwrap the `{ success, data }` envelope.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let envelope: ApiResponse<T> = self.send_envelope(request).await?;
        Ok(envelope.data)
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> ClientResult<ApiResponse<T>> {
        let response = self.send(request).await?;
        let envelope: ApiResponse<T> = decode(&response)?;
        if !envelope.success {
            return Err(ClientError::Api {
                status: response.status,
                message: envelope.failure_message(),
            });
        }
        Ok(envelope)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// `GET` with query parameters; `None` values are omitted.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, Option<String>)],
    ) -> ClientResult<T> {
        self.send_json(with_params(ApiRequest::get(path), params))
            .await
    }

    /// `GET` returning the whole envelope, for callers that need `message`.
    pub async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> ClientResult<ApiResponse<T>> {
        self.send_envelope(ApiRequest::get(path)).await
    }

    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        page: u32,
        page_size: u32,
        params: &[(&str, Option<String>)],
    ) -> ClientResult<PaginatedResponse<T>> {
        let request = with_params(ApiRequest::get(path), params)
            .with_query("page", page.to_string())
            .with_query("page_size", page_size.to_string());
        let response = self.send(request).await?;
        let page: PaginatedResponse<T> = decode(&response)?;
        if !page.success {
            return Err(ClientError::Api {
                status: response.status,
                message: "list request was not successful".to_string(),
            });
        }
        Ok(page)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send_json(with_json(Method::POST, path, body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send_json(with_json(Method::PUT, path, body)?).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send_json(with_json(Method::PATCH, path, body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(ApiRequest::new(Method::DELETE, path)).await
    }
}

impl core::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestPipeline").finish_non_exhaustive()
    }
}

fn is_credential_endpoint(path: &str) -> bool {
    path.contains(endpoints::LOGIN) || path.contains(endpoints::SIGNUP)
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn into_result(response: RawResponse) -> ClientResult<RawResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::from_response(&response))
    }
}

fn decode<T: DeserializeOwned>(response: &RawResponse) -> ClientResult<T> {
    response
        .json()
        .map_err(|e| ClientError::Decode(e.to_string()))
}

fn with_params(mut request: ApiRequest, params: &[(&str, Option<String>)]) -> ApiRequest {
    for (name, value) in params {
        if let Some(value) = value {
            request = request.with_query(*name, value.clone());
        }
    }
    request
}

fn with_json<B: Serialize>(method: Method, path: &str, body: &B) -> ClientResult<ApiRequest> {
    let body = serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
    Ok(ApiRequest::new(method, path).with_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_endpoints_are_recognized_anywhere_in_the_path() {
        assert!(is_credential_endpoint("/auth/login"));
        assert!(is_credential_endpoint("http://localhost:8000/api/v1/auth/signup"));
        assert!(!is_credential_endpoint("/auth/me"));
        assert!(!is_credential_endpoint("/auth/refresh"));
    }

    #[test]
    fn none_params_are_skipped() {
        let request = with_params(
            ApiRequest::get("/treasury/accounts"),
            &[
                ("currency", Some("EUR".to_string())),
                ("status", None),
            ],
        );
        assert_eq!(
            request.query,
            vec![("currency".to_string(), "EUR".to_string())]
        );
    }
}
