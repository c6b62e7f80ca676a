//! HTTP client for the backend REST surface

use self::models::*;
use chrono::{DateTime, Utc};
use reqwest::{
    header::CONTENT_TYPE,
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub mod models;

/// The HTTP header that carries the admin bearer token
const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Bound on a single request round trip so a hung connection can't
/// stall a caller indefinitely
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the backend REST endpoints. Public reads require no
/// authentication, admin writes take the token per call.
#[derive(Clone)]
pub struct ApiClient {
    /// Base URL of the backend without a trailing slash
    base_url: String,
    http: Client,
}

/// Error type for API request failures
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request failed to complete or the body failed to parse
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server responded with a non-success status
    #[error("unexpected status: {0}")]
    Status(StatusCode),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiClient {
    pub fn new(base_url: String) -> ApiResult<ApiClient> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(ApiClient { base_url, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and maps non-success statuses onto
    /// [ApiError::Status]
    async fn send(request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }
        Ok(response)
    }

    /// Requests the raw leaderboard snapshot
    pub async fn fetch_leaderboard(&self) -> ApiResult<Vec<RawPlayer>> {
        let response = Self::send(self.http.get(self.url("/api/leaderboard"))).await?;
        Ok(response.json().await?)
    }

    /// Requests the snapshot metadata
    pub async fn fetch_meta(&self) -> ApiResult<LeaderboardMeta> {
        let response = Self::send(self.http.get(self.url("/api/leaderboard/meta"))).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_countdown(&self) -> ApiResult<CountdownConfig> {
        let response = Self::send(self.http.get(self.url("/api/countdown"))).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_hero(&self) -> ApiResult<HeroConfig> {
        let response = Self::send(self.http.get(self.url("/api/hero"))).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_prizes(&self) -> ApiResult<PrizesResponse> {
        let response = Self::send(self.http.get(self.url("/api/prizes"))).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_announcement(&self) -> ApiResult<AnnouncementConfig> {
        let response = Self::send(self.http.get(self.url("/api/announcement"))).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_contest(&self) -> ApiResult<ContestWindow> {
        let response = Self::send(self.http.get(self.url("/api/contest"))).await?;
        Ok(response.json().await?)
    }

    /// Token validation probe used by the admin login flow
    pub async fn ping(&self, token: &str) -> ApiResult<()> {
        Self::send(
            self.http
                .get(self.url("/api/admin/ping"))
                .header(ADMIN_TOKEN_HEADER, token),
        )
        .await?;
        Ok(())
    }

    /// Authenticated JSON POST shared by the admin write endpoints
    async fn post_json<B: Serialize>(&self, path: &str, token: &str, body: &B) -> ApiResult<Response> {
        Self::send(
            self.http
                .post(self.url(path))
                .header(ADMIN_TOKEN_HEADER, token)
                .header(CONTENT_TYPE, "application/json")
                .json(body),
        )
        .await
    }

    /// Stores a new countdown end, responding with the stored value
    pub async fn post_countdown(
        &self,
        token: &str,
        end: DateTime<Utc>,
    ) -> ApiResult<CountdownConfig> {
        let body = CountdownConfig { end: Some(end) };
        let response = self.post_json("/api/countdown", token, &body).await?;
        Ok(response.json().await?)
    }

    pub async fn post_hero(&self, token: &str, hero: &HeroConfig) -> ApiResult<()> {
        self.post_json("/api/hero", token, hero).await?;
        Ok(())
    }

    pub async fn post_prizes(&self, token: &str, prizes: &PrizeTable) -> ApiResult<()> {
        #[derive(Serialize)]
        struct Body<'a> {
            prizes: &'a PrizeTable,
        }

        self.post_json("/api/prizes", token, &Body { prizes }).await?;
        Ok(())
    }

    pub async fn post_contest(&self, token: &str, window: &ContestWindow) -> ApiResult<()> {
        self.post_json("/api/contest", token, window).await?;
        Ok(())
    }

    /// Uploads a hero banner image, responding with the URL the image
    /// is now served from
    pub async fn upload_hero_image(
        &self,
        token: &str,
        file_name: String,
        bytes: Vec<u8>,
    ) -> ApiResult<UploadResponse> {
        let part = Part::bytes(bytes).file_name(file_name);
        let form = Form::new().part("image", part);

        let response = Self::send(
            self.http
                .post(self.url("/api/hero/image"))
                .header(ADMIN_TOKEN_HEADER, token)
                .multipart(form),
        )
        .await?;
        Ok(response.json().await?)
    }

    /// Downloads the affiliate ID export as text
    pub async fn export_ids(&self, token: &str) -> ApiResult<String> {
        let response = Self::send(
            self.http
                .get(self.url("/api/ids"))
                .header(ADMIN_TOKEN_HEADER, token),
        )
        .await?;
        Ok(response.text().await?)
    }
}
