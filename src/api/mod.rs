pub mod fixtures;
pub mod http;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fixtures::FixtureBackend;
use http::HttpBackend;

/// Match type the upstream matcher assigns to exact automatic matches
pub const MATCH_TYPE_AUTO_EXACT: &str = "auto_exact";

/// Errors from the backend collaborator
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("요청 실패: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("서버 응답 {status}: {body}")]
    Status { status: u16, body: String },

    #[error("뉴스 {0}을(를) 찾을 수 없습니다")]
    NotFound(i64),

    #[error("응답 형식 오류: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One extracted company-name occurrence for a news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub id: Option<i64>,
    pub extracted_name: Option<String>,
    pub matched_stock_code: Option<String>,
    pub match_type: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsMappingDetail {
    pub news_id: i64,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub published_at: Option<NaiveDate>,
    pub collected_at: NaiveDateTime,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mappings: Vec<ExtractionRecord>,
}

/// Stock reference data, used for search and display only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub stock_code: String,
    pub name_kr: String,
    pub name_kr_short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
}

/// One reviewer decision in the save payload. `stock_code == None` means "no match".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMapping {
    pub extracted_name: String,
    pub stock_code: Option<String>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub news_id: i64,
    pub mappings: Vec<SaveMapping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ListFilter {
    #[default]
    All,
    Unmatched,
    Done,
}

impl ListFilter {
    pub const ALL: [ListFilter; 3] = [ListFilter::All, ListFilter::Unmatched, ListFilter::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListFilter::All => "all",
            ListFilter::Unmatched => "unmatched",
            ListFilter::Done => "done",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ListFilter::All => "전체",
            ListFilter::Unmatched => "미매칭있음",
            ListFilter::Done => "완료",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ListFilter::All => ListFilter::Unmatched,
            ListFilter::Unmatched => ListFilter::Done,
            ListFilter::Done => ListFilter::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: ListFilter,
    pub page: u32,
    pub size: u32,
    pub search: Option<String>,
}

impl ListQuery {
    /// Query-string pairs in the order the list endpoint documents them
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("filter", self.filter.as_str().to_string()),
            ("page", self.page.to_string()),
            ("size", self.size.to_string()),
        ];
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    NoMapping,
    Unmapped,
    AutoPending,
    Partial,
    Done,
}

impl MappingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MappingStatus::NoMapping => "매핑 없음",
            MappingStatus::Unmapped => "미매핑",
            MappingStatus::AutoPending => "자동매칭 대기",
            MappingStatus::Partial => "부분 완료",
            MappingStatus::Done => "완료",
        }
    }

    /// Derive the review status of a news item from its extraction records
    pub fn of(records: &[ExtractionRecord]) -> Self {
        if records.is_empty() {
            MappingStatus::NoMapping
        } else if records.iter().all(|r| r.verified) {
            MappingStatus::Done
        } else if records.iter().any(|r| r.verified) {
            MappingStatus::Partial
        } else if records.iter().any(|r| r.match_type == MATCH_TYPE_AUTO_EXACT) {
            MappingStatus::AutoPending
        } else {
            MappingStatus::Unmapped
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsMappingSummary {
    pub news_id: i64,
    pub title: String,
    #[serde(default)]
    pub extracted_names: Vec<String>,
    pub matched_count: u32,
    pub total_count: u32,
    pub status: MappingStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsMappingListResponse {
    pub items: Vec<NewsMappingSummary>,
    pub total_count: u64,
    pub page: u32,
    pub size: u32,
}

/// The backend the console talks to
#[derive(Debug, Clone)]
pub enum Backend {
    Http(HttpBackend),
    Fixtures(FixtureBackend),
}

impl Backend {
    /// Build the backend selected by config
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self, ApiError> {
        if config.offline {
            tracing::info!("Using offline fixture backend");
            return Ok(Backend::Fixtures(FixtureBackend::sample()));
        }
        tracing::info!("Using backend at {}", config.api_url);
        Ok(Backend::Http(HttpBackend::new(
            &config.api_url,
            config.auth_token.clone(),
        )?))
    }

    pub async fn list(&self, query: &ListQuery) -> Result<NewsMappingListResponse, ApiError> {
        match self {
            Backend::Http(b) => b.list(query).await,
            Backend::Fixtures(b) => b.list(query).await,
        }
    }

    pub async fn detail(&self, news_id: i64) -> Result<NewsMappingDetail, ApiError> {
        match self {
            Backend::Http(b) => b.detail(news_id).await,
            Backend::Fixtures(b) => b.detail(news_id).await,
        }
    }

    pub async fn search_stocks(&self, query: &str) -> Result<Vec<Stock>, ApiError> {
        match self {
            Backend::Http(b) => b.search_stocks(query).await,
            Backend::Fixtures(b) => b.search_stocks(query).await,
        }
    }

    pub async fn save(&self, payload: &SavePayload) -> Result<(), ApiError> {
        match self {
            Backend::Http(b) => b.save(payload).await,
            Backend::Fixtures(b) => b.save(payload).await,
        }
    }
}
