//! Mapping review state for one news item.
//!
//! Extraction records are grouped into one [`CompanyCard`] per extracted
//! name. The reviewer checks stocks on each card or marks it "no match";
//! the two are mutually exclusive, and activating "no match" keeps a copy
//! of the selections so deactivating it restores them exactly.

pub mod search;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{NewsMappingDetail, SaveMapping, SavePayload};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("회사 카드 {index}번이 없습니다 (총 {len}개)")]
    UnknownCard { index: usize, len: usize },
}

/// What unchecking an existing selection does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TogglePolicy {
    /// Keep the entry and its feedback, only clear `checked`
    #[default]
    Retain,
    /// Drop the entry and its feedback
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockSelection {
    pub stock_code: String,
    pub checked: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoMatchState {
    pub active: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyCard {
    pub extracted_name: String,
    /// Server id of the first record in the group, kept for traceability
    pub original_mapping_id: Option<i64>,
    pub selections: Vec<StockSelection>,
    pub no_match: NoMatchState,
    /// Selections as they were when "no match" was activated
    pub saved_selections: Option<Vec<StockSelection>>,
    pub stock_search: String,
}

impl CompanyCard {
    fn new(extracted_name: String, original_mapping_id: Option<i64>) -> Self {
        Self {
            extracted_name,
            original_mapping_id,
            selections: Vec::new(),
            no_match: NoMatchState::default(),
            saved_selections: None,
            stock_search: String::new(),
        }
    }

    pub fn selection(&self, stock_code: &str) -> Option<&StockSelection> {
        self.selections.iter().find(|s| s.stock_code == stock_code)
    }

    pub fn is_checked(&self, stock_code: &str) -> bool {
        self.selection(stock_code).map(|s| s.checked).unwrap_or(false)
    }

    /// Checked selections, plus one for an active "no match"
    pub fn checked_count(&self) -> usize {
        self.selections.iter().filter(|s| s.checked).count() + usize::from(self.no_match.active)
    }
}

/// Group extraction records into cards, one per distinct name in first-seen order
pub fn build_cards(detail: &NewsMappingDetail) -> Vec<CompanyCard> {
    let mut cards: Vec<CompanyCard> = Vec::new();

    for record in &detail.mappings {
        let name = record.extracted_name.clone().unwrap_or_default();
        let index = match cards.iter().position(|c| c.extracted_name == name) {
            Some(i) => i,
            None => {
                cards.push(CompanyCard::new(name, record.id));
                cards.len() - 1
            }
        };

        let card = &mut cards[index];
        if let Some(code) = &record.matched_stock_code {
            // One selection per code; a repeated mention keeps the first one's feedback
            if card.selection(code).is_none() {
                card.selections.push(StockSelection {
                    stock_code: code.clone(),
                    checked: true,
                    feedback: record.feedback.clone().unwrap_or_default(),
                });
            }
        }
    }

    cards
}

pub fn toggle_stock(card: &mut CompanyCard, stock_code: &str, policy: TogglePolicy) {
    match card.selections.iter().position(|s| s.stock_code == stock_code) {
        Some(i) => match policy {
            TogglePolicy::Retain => card.selections[i].checked = !card.selections[i].checked,
            TogglePolicy::Remove => {
                card.selections.remove(i);
            }
        },
        None => card.selections.push(StockSelection {
            stock_code: stock_code.to_string(),
            checked: true,
            feedback: String::new(),
        }),
    }
}

pub fn toggle_no_match(card: &mut CompanyCard) {
    if card.no_match.active {
        if let Some(saved) = card.saved_selections.take() {
            card.selections = saved;
        }
        card.no_match.active = false;
    } else {
        card.saved_selections = Some(card.selections.clone());
        for selection in &mut card.selections {
            selection.checked = false;
        }
        card.no_match.active = true;
    }
}

/// Set feedback on a selection, or on "no match" when `stock_code` is `None`.
/// An unknown code changes nothing. While "no match" is active the backed-up
/// selection gets the same text, so deactivating keeps the edit.
pub fn update_feedback(card: &mut CompanyCard, stock_code: Option<&str>, text: &str) {
    match stock_code {
        None => card.no_match.feedback = text.to_string(),
        Some(code) => {
            if let Some(selection) = card.selections.iter_mut().find(|s| s.stock_code == code) {
                selection.feedback = text.to_string();
            }
            if let Some(saved) = card.saved_selections.as_mut() {
                if let Some(selection) = saved.iter_mut().find(|s| s.stock_code == code) {
                    selection.feedback = text.to_string();
                }
            }
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

pub fn build_save_payload(news_id: i64, cards: &[CompanyCard]) -> SavePayload {
    let mut mappings = Vec::new();

    for card in cards {
        for selection in card.selections.iter().filter(|s| s.checked) {
            mappings.push(SaveMapping {
                extracted_name: card.extracted_name.clone(),
                stock_code: Some(selection.stock_code.clone()),
                feedback: non_empty(&selection.feedback),
            });
        }
        if card.no_match.active {
            mappings.push(SaveMapping {
                extracted_name: card.extracted_name.clone(),
                stock_code: None,
                feedback: non_empty(&card.no_match.feedback),
            });
        }
    }

    SavePayload { news_id, mappings }
}

/// A single reviewer action on one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewEvent {
    ToggleStock { card: usize, stock_code: String },
    ToggleNoMatch { card: usize },
    UpdateFeedback { card: usize, stock_code: Option<String>, text: String },
    SetSearch { card: usize, query: String },
}

impl ReviewEvent {
    pub fn card(&self) -> usize {
        match self {
            ReviewEvent::ToggleStock { card, .. }
            | ReviewEvent::ToggleNoMatch { card }
            | ReviewEvent::UpdateFeedback { card, .. }
            | ReviewEvent::SetSearch { card, .. } => *card,
        }
    }
}

/// Review state of one news item
#[derive(Debug, Clone, PartialEq)]
pub struct MappingReview {
    pub news_id: i64,
    pub cards: Vec<CompanyCard>,
    pub policy: TogglePolicy,
    initial: SavePayload,
}

impl MappingReview {
    pub fn new(detail: &NewsMappingDetail, policy: TogglePolicy) -> Self {
        let cards = build_cards(detail);
        let initial = build_save_payload(detail.news_id, &cards);
        Self {
            news_id: detail.news_id,
            cards,
            policy,
            initial,
        }
    }

    /// Apply an event to its card. Out-of-range indexes leave every card untouched.
    pub fn apply(&mut self, event: ReviewEvent) -> Result<(), ReviewError> {
        let len = self.cards.len();
        let index = event.card();
        let policy = self.policy;
        let card = self
            .cards
            .get_mut(index)
            .ok_or(ReviewError::UnknownCard { index, len })?;

        match event {
            ReviewEvent::ToggleStock { stock_code, .. } => toggle_stock(card, &stock_code, policy),
            ReviewEvent::ToggleNoMatch { .. } => toggle_no_match(card),
            ReviewEvent::UpdateFeedback { stock_code, text, .. } => {
                update_feedback(card, stock_code.as_deref(), &text)
            }
            ReviewEvent::SetSearch { query, .. } => card.stock_search = query,
        }
        Ok(())
    }

    pub fn payload(&self) -> SavePayload {
        build_save_payload(self.news_id, &self.cards)
    }

    /// Whether saving now would submit something other than the loaded state
    pub fn is_dirty(&self) -> bool {
        self.payload() != self.initial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExtractionRecord;

    fn record(id: i64, name: Option<&str>, code: Option<&str>, feedback: Option<&str>) -> ExtractionRecord {
        ExtractionRecord {
            id: Some(id),
            extracted_name: name.map(str::to_string),
            matched_stock_code: code.map(str::to_string),
            match_type: if code.is_some() { "auto_exact" } else { "none" }.to_string(),
            verified: false,
            feedback: feedback.map(str::to_string),
        }
    }

    fn detail(records: Vec<ExtractionRecord>) -> NewsMappingDetail {
        NewsMappingDetail {
            news_id: 1,
            title: "현대차그룹, 전기차 배터리 투자 확대 계획 발표".to_string(),
            content: None,
            published_at: None,
            collected_at: chrono::NaiveDate::from_ymd_opt(2026, 1, 15)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            url: None,
            mappings: records,
        }
    }

    fn card_with(codes: &[(&str, &str)]) -> CompanyCard {
        let mut card = CompanyCard::new("LG에너지솔루션".to_string(), Some(102));
        for (code, feedback) in codes {
            card.selections.push(StockSelection {
                stock_code: code.to_string(),
                checked: true,
                feedback: feedback.to_string(),
            });
        }
        card
    }

    #[test]
    fn test_duplicate_names_group_into_one_card() {
        let d = detail(vec![
            record(101, Some("현대차그룹"), None, None),
            record(102, Some("현대차그룹"), Some("373220"), None),
        ]);
        let cards = build_cards(&d);

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].extracted_name, "현대차그룹");
        assert_eq!(cards[0].original_mapping_id, Some(101));
        assert_eq!(
            cards[0].selections,
            vec![StockSelection {
                stock_code: "373220".to_string(),
                checked: true,
                feedback: String::new(),
            }]
        );
        assert!(!cards[0].no_match.active);
        assert!(cards[0].stock_search.is_empty());
    }

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let d = detail(vec![
            record(1, Some("삼성SDI"), None, None),
            record(2, None, Some("005380"), None),
            record(3, Some("LG에너지솔루션"), Some("373220"), Some("확인됨")),
            record(4, Some("삼성SDI"), Some("006400"), None),
        ]);
        let cards = build_cards(&d);

        let names: Vec<&str> = cards.iter().map(|c| c.extracted_name.as_str()).collect();
        assert_eq!(names, vec!["삼성SDI", "", "LG에너지솔루션"]);
        assert_eq!(cards[0].selections[0].stock_code, "006400");
        assert_eq!(cards[2].selections[0].feedback, "확인됨");

        // Every matched code ends up as a selection
        let mut codes: Vec<&str> = cards
            .iter()
            .flat_map(|c| c.selections.iter().map(|s| s.stock_code.as_str()))
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["005380", "006400", "373220"]);

        // Deterministic
        assert_eq!(build_cards(&d), cards);
    }

    #[test]
    fn test_repeated_code_in_group_yields_one_selection() {
        let d = detail(vec![
            record(1, Some("삼성전자"), Some("005930"), Some("첫 번째")),
            record(2, Some("삼성전자"), Some("005930"), Some("두 번째")),
        ]);
        let cards = build_cards(&d);
        assert_eq!(cards[0].selections.len(), 1);
        assert_eq!(cards[0].selections[0].feedback, "첫 번째");
    }

    #[test]
    fn test_toggle_twice_retain_keeps_unchecked_entry() {
        let mut card = card_with(&[]);
        toggle_stock(&mut card, "005930", TogglePolicy::Retain);
        toggle_stock(&mut card, "005930", TogglePolicy::Retain);

        assert_eq!(card.selections.len(), 1);
        assert!(!card.selections[0].checked);
    }

    #[test]
    fn test_toggle_twice_remove_drops_entry() {
        let mut card = card_with(&[]);
        toggle_stock(&mut card, "005930", TogglePolicy::Remove);
        assert!(card.is_checked("005930"));
        toggle_stock(&mut card, "005930", TogglePolicy::Remove);

        assert!(card.selections.is_empty());
    }

    #[test]
    fn test_retain_toggle_preserves_feedback() {
        let mut card = card_with(&[("373220", "배터리 사업")]);
        toggle_stock(&mut card, "373220", TogglePolicy::Retain);
        toggle_stock(&mut card, "373220", TogglePolicy::Retain);

        assert!(card.selections[0].checked);
        assert_eq!(card.selections[0].feedback, "배터리 사업");
    }

    #[test]
    fn test_toggle_stock_leaves_no_match_alone() {
        let mut card = card_with(&[]);
        card.no_match.active = true;
        toggle_stock(&mut card, "005930", TogglePolicy::Retain);
        assert!(card.no_match.active);
    }

    #[test]
    fn test_no_match_round_trip_restores_selections() {
        let mut card = card_with(&[("373220", "배터리"), ("006400", "")]);
        let before = card.clone();

        toggle_no_match(&mut card);
        assert!(card.no_match.active);
        assert_eq!(card.selections.len(), 2);
        assert!(card.selections.iter().all(|s| !s.checked));
        assert_eq!(card.selections[0].feedback, "배터리");

        toggle_no_match(&mut card);
        assert_eq!(card.selections, before.selections);
        assert!(!card.no_match.active);
        assert!(card.saved_selections.is_none());
    }

    #[test]
    fn test_no_match_keeps_its_feedback_across_toggles() {
        let mut card = card_with(&[]);
        toggle_no_match(&mut card);
        update_feedback(&mut card, None, "비상장");
        toggle_no_match(&mut card);
        toggle_no_match(&mut card);
        assert_eq!(card.no_match.feedback, "비상장");
    }

    #[test]
    fn test_deactivating_without_backup_keeps_selections() {
        let mut card = card_with(&[("005930", "")]);
        card.no_match.active = true;
        toggle_no_match(&mut card);
        assert!(!card.no_match.active);
        assert_eq!(card.selections.len(), 1);
    }

    #[test]
    fn test_update_feedback_touches_only_target() {
        let mut card = card_with(&[("373220", "a"), ("006400", "b")]);
        let before = card.clone();

        update_feedback(&mut card, Some("006400"), "삼성SDI 아님");
        assert_eq!(card.selections[0], before.selections[0]);
        assert_eq!(card.selections[1].feedback, "삼성SDI 아님");
        assert_eq!(card.selections[1].checked, before.selections[1].checked);
        assert_eq!(card.no_match, before.no_match);

        update_feedback(&mut card, None, "외국기업");
        assert_eq!(card.no_match.feedback, "외국기업");
        assert!(!card.no_match.active);
    }

    #[test]
    fn test_feedback_edited_under_no_match_survives_deactivation() {
        let mut card = card_with(&[("373220", "배터리"), ("006400", "")]);
        toggle_no_match(&mut card);
        update_feedback(&mut card, Some("006400"), "keep me");
        assert_eq!(card.selections[1].feedback, "keep me");

        toggle_no_match(&mut card);
        assert!(!card.no_match.active);
        assert_eq!(card.selections[0].feedback, "배터리");
        assert_eq!(card.selections[1].feedback, "keep me");
        assert!(card.selections.iter().all(|s| s.checked));
    }

    #[test]
    fn test_update_feedback_unknown_code_is_noop() {
        let mut card = card_with(&[("373220", "")]);
        let before = card.clone();
        update_feedback(&mut card, Some("999999"), "text");
        assert_eq!(card, before);
    }

    #[test]
    fn test_payload_entries() {
        let mut first = card_with(&[("373220", "배터리"), ("006400", "")]);
        first.selections[1].checked = false;
        let mut second = CompanyCard::new("테슬라".to_string(), Some(601));
        toggle_no_match(&mut second);
        update_feedback(&mut second, None, "외국기업");
        let third = CompanyCard::new("애플".to_string(), Some(301));

        let payload = build_save_payload(1, &[first, second, third]);
        assert_eq!(payload.news_id, 1);
        assert_eq!(
            payload.mappings,
            vec![
                SaveMapping {
                    extracted_name: "LG에너지솔루션".to_string(),
                    stock_code: Some("373220".to_string()),
                    feedback: Some("배터리".to_string()),
                },
                SaveMapping {
                    extracted_name: "테슬라".to_string(),
                    stock_code: None,
                    feedback: Some("외국기업".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_payload_empty_feedback_is_null() {
        let mut card = card_with(&[]);
        toggle_no_match(&mut card);
        let payload = build_save_payload(3, &[card]);
        assert_eq!(payload.mappings.len(), 1);
        assert_eq!(payload.mappings[0].feedback, None);
        assert_eq!(payload.mappings[0].stock_code, None);
    }

    #[test]
    fn test_apply_routes_events_to_card() {
        let d = detail(vec![
            record(101, Some("현대차그룹"), None, None),
            record(102, Some("LG에너지솔루션"), Some("373220"), None),
        ]);
        let mut review = MappingReview::new(&d, TogglePolicy::Retain);
        assert!(!review.is_dirty());

        review
            .apply(ReviewEvent::ToggleStock { card: 0, stock_code: "005380".to_string() })
            .unwrap();
        review.apply(ReviewEvent::ToggleNoMatch { card: 1 }).unwrap();
        review
            .apply(ReviewEvent::UpdateFeedback {
                card: 0,
                stock_code: Some("005380".to_string()),
                text: "현대자동차".to_string(),
            })
            .unwrap();
        review
            .apply(ReviewEvent::SetSearch { card: 0, query: "현대".to_string() })
            .unwrap();

        assert!(review.is_dirty());
        assert_eq!(review.cards[0].stock_search, "현대");
        assert_eq!(review.cards[1].checked_count(), 1);

        let payload = review.payload();
        assert_eq!(payload.mappings.len(), 2);
        assert_eq!(payload.mappings[0].feedback.as_deref(), Some("현대자동차"));
        assert_eq!(payload.mappings[1].stock_code, None);
    }

    #[test]
    fn test_apply_unknown_card_changes_nothing() {
        let d = detail(vec![record(101, Some("현대차그룹"), Some("005380"), None)]);
        let mut review = MappingReview::new(&d, TogglePolicy::Retain);
        let before = review.clone();

        let err = review.apply(ReviewEvent::ToggleNoMatch { card: 5 }).unwrap_err();
        assert_eq!(err, ReviewError::UnknownCard { index: 5, len: 1 });
        assert_eq!(review, before);
    }

    #[test]
    fn test_apply_with_remove_policy_drops_selection() {
        let d = detail(vec![
            record(102, Some("LG에너지솔루션"), Some("373220"), Some("배터리")),
            record(103, Some("LG에너지솔루션"), Some("006400"), None),
        ]);
        let mut review = MappingReview::new(&d, TogglePolicy::Remove);

        review
            .apply(ReviewEvent::ToggleStock { card: 0, stock_code: "373220".to_string() })
            .unwrap();
        let codes: Vec<&str> = review.cards[0]
            .selections
            .iter()
            .map(|s| s.stock_code.as_str())
            .collect();
        assert_eq!(codes, vec!["006400"]);
        assert!(review.is_dirty());

        review
            .apply(ReviewEvent::ToggleStock { card: 0, stock_code: "373220".to_string() })
            .unwrap();
        let readded = review.cards[0].selection("373220").unwrap();
        assert!(readded.checked);
        assert_eq!(readded.feedback, "");
    }

    #[test]
    fn test_search_edit_is_not_dirty() {
        let d = detail(vec![record(101, Some("현대차그룹"), None, None)]);
        let mut review = MappingReview::new(&d, TogglePolicy::Retain);
        review
            .apply(ReviewEvent::SetSearch { card: 0, query: "현대".to_string() })
            .unwrap();
        assert!(!review.is_dirty());
    }
}
