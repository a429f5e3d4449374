use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{
    AgentError, AttendanceApi, CheckInReply, CheckOutReply, NearestView, StatusView,
};
use crate::geo::Coordinate;
use crate::model::location::OfficeLocation;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`AttendanceApi`] over HTTP with a bearer token.
pub struct HttpAttendanceApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpAttendanceApi {
    /// `base_url` includes the API prefix, e.g. `http://127.0.0.1:3000/api`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, AgentError> {
        let resp = req.send().await?;
        Self::read(resp).await
    }

    async fn read<T: DeserializeOwned>(resp: Response) -> Result<T, AgentError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
        };
        Err(AgentError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AttendanceApi for HttpAttendanceApi {
    async fn office(&self) -> Result<OfficeLocation, AgentError> {
        Self::send(self.client.get(self.url("/office"))).await
    }

    async fn status(&self) -> Result<StatusView, AgentError> {
        Self::send(self.authed(self.client.get(self.url("/status")))).await
    }

    async fn check_in(&self, at: Coordinate) -> Result<CheckInReply, AgentError> {
        let req = self
            .client
            .post(self.url("/checkin"))
            .json(&json!({ "latitude": at.latitude, "longitude": at.longitude }));
        Self::send(self.authed(req)).await
    }

    async fn check_out(&self, at: Coordinate) -> Result<CheckOutReply, AgentError> {
        let req = self
            .client
            .post(self.url("/checkout"))
            .json(&json!({ "latitude": at.latitude, "longitude": at.longitude }));
        Self::send(self.authed(req)).await
    }

    async fn nearest(&self, at: Coordinate) -> Result<Option<NearestView>, AgentError> {
        let req = self.client.get(self.url("/locations/nearest")).query(&[
            ("lat", at.latitude.to_string()),
            ("lng", at.longitude.to_string()),
            ("limit", "1".to_string()),
        ]);
        let ranked: Vec<NearestView> = Self::send(self.authed(req)).await?;
        Ok(ranked.into_iter().next())
    }
}
