use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

use super::{
    ApiError, ListQuery, NewsMappingDetail, NewsMappingListResponse, SavePayload, Stock,
};

/// Timeout for every backend request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stock search returns nothing below this many characters
pub const STOCK_SEARCH_MIN_LENGTH: usize = 2;

const USER_AGENT: &str = concat!("stocker-review/", env!("CARGO_PKG_VERSION"));

/// REST client for the admin mapping endpoints
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turn a non-success response into `ApiError::Status`
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn list(&self, query: &ListQuery) -> Result<NewsMappingListResponse, ApiError> {
        let url = self.url("/api/admin/news-mappings");
        tracing::debug!("GET {} {:?}", url, query);

        let response = self
            .authorize(self.client.get(&url).query(&query.params()))
            .send()
            .await?;
        let text = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn detail(&self, news_id: i64) -> Result<NewsMappingDetail, ApiError> {
        let url = self.url(&format!("/api/admin/news-mappings/{}", news_id));
        tracing::debug!("GET {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(news_id));
        }
        let text = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn search_stocks(&self, query: &str) -> Result<Vec<Stock>, ApiError> {
        let query = query.trim();
        if query.chars().count() < STOCK_SEARCH_MIN_LENGTH {
            return Ok(Vec::new());
        }

        let url = self.url("/api/stocks");
        tracing::debug!("GET {} query={}", url, query);

        let response = self
            .authorize(self.client.get(&url).query(&[("query", query)]))
            .send()
            .await?;
        let text = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn save(&self, payload: &SavePayload) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/admin/news-mappings/{}", payload.news_id));
        tracing::info!(
            "PUT {} ({} decisions)",
            url,
            payload.mappings.len()
        );

        let response = self
            .authorize(self.client.put(&url).json(payload))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(payload.news_id));
        }
        Self::check(response).await?;
        Ok(())
    }
}
