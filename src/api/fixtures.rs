//! Offline backend built from sample news and stock data.
//!
//! Mirrors what the admin list endpoint does server-side (status filter,
//! title/name search, newest-first paging) so the console can be used and
//! tested without a running API.

use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    ApiError, ExtractionRecord, ListFilter, ListQuery, MappingStatus, NewsMappingDetail,
    NewsMappingListResponse, NewsMappingSummary, SavePayload, Stock,
};
use crate::review::search;

const SAMPLE_DATA: &str = include_str!("sample_data.json");

/// Match type recorded for decisions saved through the console
const MATCH_TYPE_MANUAL: &str = "manual";

#[derive(Debug, Default, Deserialize)]
struct SampleData {
    details: Vec<NewsMappingDetail>,
    stocks: Vec<Stock>,
}

#[derive(Debug, Default)]
struct FixtureState {
    details: Vec<NewsMappingDetail>,
    stocks: Vec<Stock>,
    saved: Vec<SavePayload>,
}

#[derive(Debug, Clone, Default)]
pub struct FixtureBackend {
    state: Arc<Mutex<FixtureState>>,
}

impl FixtureBackend {
    pub fn new(details: Vec<NewsMappingDetail>, stocks: Vec<Stock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FixtureState {
                details,
                stocks,
                saved: Vec::new(),
            })),
        }
    }

    /// Backend loaded with the bundled sample data
    pub fn sample() -> Self {
        let data: SampleData = match serde_json::from_str(SAMPLE_DATA) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Bundled sample data is invalid: {}", e);
                SampleData::default()
            }
        };
        Self::new(data.details, data.stocks)
    }

    pub async fn list(&self, query: &ListQuery) -> Result<NewsMappingListResponse, ApiError> {
        let state = self.state.lock().await;

        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut matching: Vec<&NewsMappingDetail> = state
            .details
            .iter()
            .filter(|d| matches_filter(query.filter, &d.mappings))
            .filter(|d| match &needle {
                Some(q) => matches_search(d, q),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| b.news_id.cmp(&a.news_id));

        let total_count = matching.len() as u64;
        let offset = query.page as usize * query.size as usize;
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.size as usize)
            .map(summarize)
            .collect();

        Ok(NewsMappingListResponse {
            items,
            total_count,
            page: query.page,
            size: query.size,
        })
    }

    pub async fn detail(&self, news_id: i64) -> Result<NewsMappingDetail, ApiError> {
        let state = self.state.lock().await;
        state
            .details
            .iter()
            .find(|d| d.news_id == news_id)
            .cloned()
            .ok_or(ApiError::NotFound(news_id))
    }

    pub async fn search_stocks(&self, query: &str) -> Result<Vec<Stock>, ApiError> {
        let state = self.state.lock().await;
        Ok(search::search_stocks(&state.stocks, query)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Store the payload and replace the reviewed names' records with verified ones
    pub async fn save(&self, payload: &SavePayload) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;

        let next_id = state
            .details
            .iter()
            .flat_map(|d| d.mappings.iter())
            .filter_map(|r| r.id)
            .max()
            .unwrap_or(0)
            + 1;

        let detail = state
            .details
            .iter_mut()
            .find(|d| d.news_id == payload.news_id)
            .ok_or(ApiError::NotFound(payload.news_id))?;

        detail.mappings = apply_payload(&detail.mappings, payload, next_id);
        tracing::info!(
            "Saved {} decisions for news {} (offline)",
            payload.mappings.len(),
            payload.news_id
        );

        state.saved.push(payload.clone());
        Ok(())
    }

    /// Payloads saved so far, oldest first
    #[cfg(test)]
    pub async fn saved(&self) -> Vec<SavePayload> {
        self.state.lock().await.saved.clone()
    }
}

fn matches_filter(filter: ListFilter, records: &[ExtractionRecord]) -> bool {
    let all_verified = !records.is_empty() && records.iter().all(|r| r.verified);
    match filter {
        ListFilter::All => true,
        ListFilter::Done => all_verified,
        ListFilter::Unmatched => !all_verified,
    }
}

fn matches_search(detail: &NewsMappingDetail, needle: &str) -> bool {
    detail.title.to_lowercase().contains(needle)
        || detail
            .mappings
            .iter()
            .filter_map(|r| r.extracted_name.as_deref())
            .any(|name| name.to_lowercase().contains(needle))
}

/// Distinct extracted names in first-seen order
fn distinct_names(records: &[ExtractionRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in records.iter().map(|r| r.extracted_name.clone().unwrap_or_default()) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn summarize(detail: &NewsMappingDetail) -> NewsMappingSummary {
    let records = &detail.mappings;
    NewsMappingSummary {
        news_id: detail.news_id,
        title: detail.title.clone(),
        extracted_names: distinct_names(records),
        matched_count: records.iter().filter(|r| r.matched_stock_code.is_some()).count() as u32,
        total_count: records.len() as u32,
        status: MappingStatus::of(records),
    }
}

/// Names with decisions in the payload get fresh verified records; the rest keep theirs
fn apply_payload(
    records: &[ExtractionRecord],
    payload: &SavePayload,
    mut next_id: i64,
) -> Vec<ExtractionRecord> {
    let mut names = distinct_names(records);
    for m in &payload.mappings {
        if !names.contains(&m.extracted_name) {
            names.push(m.extracted_name.clone());
        }
    }

    let mut out = Vec::new();
    for name in names {
        let decisions: Vec<_> = payload
            .mappings
            .iter()
            .filter(|m| m.extracted_name == name)
            .collect();

        if decisions.is_empty() {
            out.extend(
                records
                    .iter()
                    .filter(|r| r.extracted_name.clone().unwrap_or_default() == name)
                    .cloned(),
            );
            continue;
        }

        for decision in decisions {
            out.push(ExtractionRecord {
                id: Some(next_id),
                extracted_name: Some(name.clone()),
                matched_stock_code: decision.stock_code.clone(),
                match_type: MATCH_TYPE_MANUAL.to_string(),
                verified: true,
                feedback: decision.feedback.clone(),
            });
            next_id += 1;
        }
    }
    out
}
