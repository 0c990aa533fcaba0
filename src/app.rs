use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::{
    ApiError, Backend, ListFilter, ListQuery, NewsMappingDetail, NewsMappingListResponse,
    NewsMappingSummary, Stock,
};
use crate::config::AppConfig;
use crate::review::search::StockCatalog;
use crate::review::{MappingReview, ReviewEvent, TogglePolicy};

/// How long a status message stays in the info line
const STATUS_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    List,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
    ConfirmDiscard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    ListSearch,
    StockSearch,
    /// Editing feedback of a selection, or of "no match" when `None`
    Feedback { stock_code: Option<String> },
}

/// A focusable row inside the focused company card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardRow {
    SearchResult(String),
    Selection(String),
    NoMatch,
}

/// Monotonic request ids; only the latest issued id is current
#[derive(Debug, Default)]
pub struct RequestSeq {
    latest: u64,
}

impl RequestSeq {
    pub fn next(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, id: u64) -> bool {
        id == self.latest
    }
}

/// Completion of a background backend call
#[derive(Debug)]
pub enum LoadResult {
    List {
        request_id: u64,
        result: Result<NewsMappingListResponse, ApiError>,
    },
    Detail {
        request_id: u64,
        result: Result<NewsMappingDetail, ApiError>,
    },
    Stocks {
        request_id: u64,
        news_id: i64,
        card: usize,
        result: Result<Vec<Stock>, ApiError>,
    },
    Catalog(Vec<Stock>),
    Saved {
        news_id: i64,
        result: Result<(), ApiError>,
    },
}

#[derive(Debug, Default)]
pub struct ListState {
    pub filter: ListFilter,
    pub search: String,
    pub page: u32,
    pub items: Vec<NewsMappingSummary>,
    pub total_count: u64,
    pub selected: usize,
    pub loading: bool,
}

pub struct DetailState {
    pub detail: NewsMappingDetail,
    pub review: MappingReview,
    pub focus_card: usize,
    pub focus_row: usize,
    /// Stock search results, one list per card
    pub search_results: Vec<Vec<Stock>>,
    /// Latest stock search request id issued for each card
    search_requests: Vec<Option<u64>>,
    pub saving: bool,
}

impl DetailState {
    fn new(detail: NewsMappingDetail, policy: TogglePolicy) -> Self {
        let review = MappingReview::new(&detail, policy);
        let search_results = vec![Vec::new(); review.cards.len()];
        let search_requests = vec![None; review.cards.len()];
        Self {
            detail,
            review,
            focus_card: 0,
            focus_row: 0,
            search_results,
            search_requests,
            saving: false,
        }
    }

    /// Rows of a card in display order. Search results are hidden while "no match" is active.
    pub fn rows(&self, card: usize) -> Vec<CardRow> {
        let Some(c) = self.review.cards.get(card) else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        if !c.no_match.active {
            if let Some(results) = self.search_results.get(card) {
                rows.extend(results.iter().map(|s| CardRow::SearchResult(s.stock_code.clone())));
            }
        }
        rows.extend(c.selections.iter().map(|s| CardRow::Selection(s.stock_code.clone())));
        rows.push(CardRow::NoMatch);
        rows
    }

    pub fn focused_row(&self) -> Option<CardRow> {
        self.rows(self.focus_card).into_iter().nth(self.focus_row)
    }

    fn is_current_search(&self, card: usize, request_id: u64) -> bool {
        self.search_requests.get(card) == Some(&Some(request_id))
    }

    fn clamp_focus(&mut self) {
        let len = self.rows(self.focus_card).len();
        if self.focus_row >= len {
            self.focus_row = len.saturating_sub(1);
        }
    }
}

pub struct App {
    pub screen: Screen,
    pub popup: Popup,
    pub input_mode: InputMode,
    pub input_buffer: String,

    pub list: ListState,
    pub detail: Option<DetailState>,
    pub catalog: StockCatalog,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    pub should_quit: bool,
    pub backend_label: String,

    backend: Backend,
    page_size: u32,
    policy: TogglePolicy,

    tx: UnboundedSender<LoadResult>,
    rx: UnboundedReceiver<LoadResult>,
    list_seq: RequestSeq,
    detail_seq: RequestSeq,
    /// Id source for stock searches; the latest id per card lives in `DetailState`
    stock_seq: RequestSeq,
}

impl App {
    pub fn new(config: &AppConfig, backend: Backend) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend_label = match &backend {
            Backend::Http(_) => config.api_url.clone(),
            Backend::Fixtures(_) => "offline".to_string(),
        };

        Self {
            screen: Screen::List,
            popup: Popup::None,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),

            list: ListState::default(),
            detail: None,
            catalog: StockCatalog::default(),

            status_message: None,
            status_message_time: None,

            should_quit: false,
            backend_label,

            backend,
            page_size: config.page_size,
            policy: config.toggle_policy,

            tx,
            rx,
            list_seq: RequestSeq::default(),
            detail_seq: RequestSeq::default(),
            stock_seq: RequestSeq::default(),
        }
    }

    /// Set a status message (auto-clears after a few seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub fn total_pages(&self) -> u32 {
        let pages = self.list.total_count.div_ceil(u64::from(self.page_size.max(1)));
        pages.max(1) as u32
    }

    /// Drain finished background calls and expire the status message
    pub fn tick(&mut self) {
        while let Ok(result) = self.rx.try_recv() {
            self.handle_result(result);
        }

        if let Some(at) = self.status_message_time {
            if at.elapsed() >= STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    // --- Background calls ---

    pub fn reload_list(&mut self) {
        let request_id = self.list_seq.next();
        let query = ListQuery {
            filter: self.list.filter,
            page: self.list.page,
            size: self.page_size,
            search: Some(self.list.search.clone()).filter(|s| !s.trim().is_empty()),
        };
        self.list.loading = true;

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.list(&query).await;
            let _ = tx.send(LoadResult::List { request_id, result });
        });
    }

    fn open_selected(&mut self) {
        let Some(item) = self.list.items.get(self.list.selected) else {
            return;
        };
        let news_id = item.news_id;
        let request_id = self.detail_seq.next();
        self.set_status(format!("뉴스 {} 불러오는 중...", news_id));

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.detail(news_id).await;
            let _ = tx.send(LoadResult::Detail { request_id, result });
        });
    }

    /// Look up the codes already selected so they can be shown by name
    fn prefetch_catalog(&mut self, codes: Vec<String>) {
        let codes: Vec<String> = codes
            .into_iter()
            .filter(|c| self.catalog.get(c).is_none())
            .collect();
        if codes.is_empty() {
            return;
        }

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut found = Vec::new();
            for code in codes {
                match backend.search_stocks(&code).await {
                    Ok(stocks) => found.extend(stocks.into_iter().filter(|s| s.stock_code == code)),
                    Err(e) => tracing::debug!("Catalog lookup for {} failed: {}", code, e),
                }
            }
            let _ = tx.send(LoadResult::Catalog(found));
        });
    }

    fn search_stocks(&mut self, card: usize, query: String) {
        let Some(state) = self.detail.as_mut() else {
            return;
        };
        let Some(slot) = state.search_requests.get_mut(card) else {
            return;
        };
        let request_id = self.stock_seq.next();
        *slot = Some(request_id);
        let news_id = state.review.news_id;

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.search_stocks(&query).await;
            let _ = tx.send(LoadResult::Stocks { request_id, news_id, card, result });
        });
    }

    fn save(&mut self) {
        let Some(state) = &mut self.detail else {
            return;
        };
        if state.saving {
            return;
        }
        state.saving = true;
        let payload = state.review.payload();
        let news_id = payload.news_id;
        self.set_status("저장 중...");

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.save(&payload).await;
            let _ = tx.send(LoadResult::Saved { news_id, result });
        });
    }

    pub fn handle_result(&mut self, result: LoadResult) {
        match result {
            LoadResult::List { request_id, result } => {
                if !self.list_seq.is_current(request_id) {
                    tracing::debug!("Dropping stale list response {}", request_id);
                    return;
                }
                self.list.loading = false;
                match result {
                    Ok(page) => {
                        self.list.items = page.items;
                        self.list.total_count = page.total_count;
                        if self.list.selected >= self.list.items.len() {
                            self.list.selected = self.list.items.len().saturating_sub(1);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("List fetch failed: {}", e);
                        self.list.items.clear();
                        self.list.total_count = 0;
                        self.list.selected = 0;
                        self.set_status(format!("목록 조회 실패: {}", e));
                    }
                }
            }

            LoadResult::Detail { request_id, result } => {
                if !self.detail_seq.is_current(request_id) || self.screen != Screen::List {
                    tracing::debug!("Dropping stale detail response {}", request_id);
                    return;
                }
                match result {
                    Ok(detail) => {
                        tracing::info!(
                            "Opened news {} ({} extraction records)",
                            detail.news_id,
                            detail.mappings.len()
                        );
                        let state = DetailState::new(detail, self.policy);
                        let codes = state
                            .review
                            .cards
                            .iter()
                            .flat_map(|c| c.selections.iter().map(|s| s.stock_code.clone()))
                            .collect();
                        self.detail = Some(state);
                        self.screen = Screen::Detail;
                        self.status_message = None;
                        self.prefetch_catalog(codes);
                    }
                    Err(ApiError::NotFound(_)) => self.set_status("뉴스를 찾을 수 없습니다."),
                    Err(e) => {
                        tracing::warn!("Detail fetch failed: {}", e);
                        self.set_status(format!("상세 조회 실패: {}", e));
                    }
                }
            }

            LoadResult::Stocks { request_id, news_id, card, result } => {
                let Some(state) = self
                    .detail
                    .as_mut()
                    .filter(|s| s.review.news_id == news_id && s.is_current_search(card, request_id))
                else {
                    tracing::debug!("Dropping stale stock search {}", request_id);
                    return;
                };
                match result {
                    Ok(stocks) => {
                        if let Some(slot) = state.search_results.get_mut(card) {
                            *slot = stocks.clone();
                        }
                        state.clamp_focus();
                        if stocks.is_empty() {
                            self.set_status("검색 결과 없음");
                        }
                        self.catalog.extend(stocks);
                    }
                    Err(e) => {
                        tracing::warn!("Stock search failed: {}", e);
                        self.set_status(format!("종목 검색 실패: {}", e));
                    }
                }
            }

            LoadResult::Catalog(stocks) => self.catalog.extend(stocks),

            LoadResult::Saved { news_id, result } => {
                let open = self.detail.as_ref().map(|s| s.review.news_id) == Some(news_id);
                match result {
                    Ok(()) => {
                        tracing::info!("Saved mapping review for news {}", news_id);
                        if open {
                            self.close_detail();
                        }
                        self.set_status("저장되었습니다.");
                        self.reload_list();
                    }
                    Err(e) => {
                        tracing::error!("Saving news {} failed: {}", news_id, e);
                        if let Some(state) = self.detail.as_mut().filter(|_| open) {
                            state.saving = false;
                        }
                        self.set_status(format!("저장 실패: {}", e));
                    }
                }
            }
        }
    }

    fn close_detail(&mut self) {
        self.detail = None;
        self.screen = Screen::List;
        self.input_mode = InputMode::Normal;
        self.popup = Popup::None;
    }

    // --- Keyboard ---

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Ok(());
        }

        // Handle popups first
        if self.popup != Popup::None {
            self.handle_popup_key(key);
            return Ok(());
        }

        if self.input_mode != InputMode::Normal {
            return self.handle_input_key(key);
        }

        match self.screen {
            Screen::List => {
                self.handle_list_key(key);
                Ok(())
            }
            Screen::Detail => self.handle_detail_key(key),
        }
    }

    fn handle_popup_key(&mut self, key: KeyEvent) {
        match self.popup {
            Popup::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter | KeyCode::Char('q')) {
                    self.popup = Popup::None;
                }
            }
            Popup::ConfirmDiscard => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    tracing::info!("Discarded unsaved review");
                    self.close_detail();
                }
                KeyCode::Char('n') | KeyCode::Esc => self.popup = Popup::None,
                _ => {}
            },
            Popup::None => {}
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => {
                self.list.filter = self.list.filter.next();
                self.list.page = 0;
                self.list.selected = 0;
                self.reload_list();
            }
            KeyCode::Char('/') => {
                self.input_buffer = self.list.search.clone();
                self.input_mode = InputMode::ListSearch;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if !self.list.items.is_empty() {
                    self.list.selected = (self.list.selected + 1) % self.list.items.len();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if !self.list.items.is_empty() {
                    self.list.selected = self
                        .list
                        .selected
                        .checked_sub(1)
                        .unwrap_or(self.list.items.len() - 1);
                }
            }
            KeyCode::Right | KeyCode::Char(']') => {
                if self.list.page + 1 < self.total_pages() {
                    self.list.page += 1;
                    self.list.selected = 0;
                    self.reload_list();
                }
            }
            KeyCode::Left | KeyCode::Char('[') => {
                if self.list.page > 0 {
                    self.list.page -= 1;
                    self.list.selected = 0;
                    self.reload_list();
                }
            }
            KeyCode::Enter => self.open_selected(),
            KeyCode::Char('R') => self.reload_list(),
            KeyCode::Char('?') => self.popup = Popup::Help,
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(state) = self.detail.as_mut() else {
            self.screen = Screen::List;
            return Ok(());
        };
        let card_count = state.review.cards.len();

        match key.code {
            KeyCode::Tab => {
                if card_count > 0 {
                    state.focus_card = (state.focus_card + 1) % card_count;
                    state.focus_row = 0;
                }
            }
            KeyCode::BackTab => {
                if card_count > 0 {
                    state.focus_card = state.focus_card.checked_sub(1).unwrap_or(card_count - 1);
                    state.focus_row = 0;
                }
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let rows = state.rows(state.focus_card).len();
                if rows > 0 {
                    state.focus_row = (state.focus_row + 1) % rows;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let rows = state.rows(state.focus_card).len();
                if rows > 0 {
                    state.focus_row = state.focus_row.checked_sub(1).unwrap_or(rows - 1);
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => return self.toggle_focused_row(),
            KeyCode::Char('/') => {
                let Some(card) = state.review.cards.get(state.focus_card) else {
                    return Ok(());
                };
                if card.no_match.active {
                    self.set_status("해당 없음 상태에서는 종목을 검색할 수 없습니다");
                } else {
                    self.input_buffer = card.stock_search.clone();
                    self.input_mode = InputMode::StockSearch;
                }
            }
            KeyCode::Char('f') => self.start_feedback_edit(),
            KeyCode::Char('s') => self.save(),
            KeyCode::Esc | KeyCode::Backspace => {
                if state.saving {
                    return Ok(());
                }
                if state.review.is_dirty() {
                    self.popup = Popup::ConfirmDiscard;
                } else {
                    self.close_detail();
                }
            }
            KeyCode::Char('?') => self.popup = Popup::Help,
            _ => {}
        }
        Ok(())
    }

    fn toggle_focused_row(&mut self) -> Result<()> {
        let Some(state) = self.detail.as_mut() else {
            return Ok(());
        };
        let card = state.focus_card;
        let no_match_active = state
            .review
            .cards
            .get(card)
            .map(|c| c.no_match.active)
            .unwrap_or(false);

        let event = match state.focused_row() {
            Some(CardRow::NoMatch) => ReviewEvent::ToggleNoMatch { card },
            Some(CardRow::SearchResult(code)) | Some(CardRow::Selection(code)) => {
                if no_match_active {
                    self.set_status("해당 없음을 해제한 뒤 종목을 선택하세요");
                    return Ok(());
                }
                ReviewEvent::ToggleStock { card, stock_code: code }
            }
            None => return Ok(()),
        };

        state.review.apply(event)?;
        state.clamp_focus();
        Ok(())
    }

    fn start_feedback_edit(&mut self) {
        let Some(state) = self.detail.as_ref() else {
            return;
        };
        let Some(card) = state.review.cards.get(state.focus_card) else {
            return;
        };

        match state.focused_row() {
            Some(CardRow::Selection(code)) => {
                self.input_buffer = card
                    .selection(&code)
                    .map(|s| s.feedback.clone())
                    .unwrap_or_default();
                self.input_mode = InputMode::Feedback { stock_code: Some(code) };
            }
            Some(CardRow::NoMatch) if card.no_match.active => {
                self.input_buffer = card.no_match.feedback.clone();
                self.input_mode = InputMode::Feedback { stock_code: None };
            }
            Some(CardRow::NoMatch) => self.set_status("해당 없음을 선택한 뒤 사유를 입력하세요"),
            Some(CardRow::SearchResult(_)) => self.set_status("선택된 종목에만 사유를 입력할 수 있습니다"),
            None => {}
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Enter => {
                let mode = std::mem::replace(&mut self.input_mode, InputMode::Normal);
                let text = std::mem::take(&mut self.input_buffer);
                self.commit_input(mode, text)?;
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            KeyCode::Char(c) => self.input_buffer.push(c),
            _ => {}
        }
        Ok(())
    }

    fn commit_input(&mut self, mode: InputMode, text: String) -> Result<()> {
        match mode {
            InputMode::Normal => {}
            InputMode::ListSearch => {
                self.list.search = text;
                self.list.page = 0;
                self.list.selected = 0;
                self.reload_list();
            }
            InputMode::StockSearch => {
                let Some(state) = self.detail.as_mut() else {
                    return Ok(());
                };
                let card = state.focus_card;
                state.review.apply(ReviewEvent::SetSearch { card, query: text.clone() })?;
                if text.trim().is_empty() {
                    if let Some(slot) = state.search_results.get_mut(card) {
                        slot.clear();
                    }
                    state.focus_row = 0;
                } else {
                    state.focus_row = 0;
                    self.search_stocks(card, text);
                }
            }
            InputMode::Feedback { stock_code } => {
                let Some(state) = self.detail.as_mut() else {
                    return Ok(());
                };
                let card = state.focus_card;
                state.review.apply(ReviewEvent::UpdateFeedback { card, stock_code, text })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fixtures::FixtureBackend;
    use crate::api::MappingStatus;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).unwrap();
        }
    }

    fn offline_app() -> App {
        let config = AppConfig {
            offline: true,
            ..AppConfig::default()
        };
        App::new(&config, Backend::Fixtures(FixtureBackend::sample()))
    }

    /// Apply results until the backend goes quiet
    async fn settle(app: &mut App) {
        while let Ok(Some(result)) =
            tokio::time::timeout(Duration::from_millis(100), app.rx.recv()).await
        {
            app.handle_result(result);
        }
    }

    fn summary(news_id: i64) -> NewsMappingSummary {
        NewsMappingSummary {
            news_id,
            title: format!("news {}", news_id),
            extracted_names: Vec::new(),
            matched_count: 0,
            total_count: 0,
            status: MappingStatus::NoMapping,
        }
    }

    async fn open_news(app: &mut App, news_id: i64) {
        app.reload_list();
        settle(app).await;
        app.list.selected = app
            .list
            .items
            .iter()
            .position(|i| i.news_id == news_id)
            .unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();
        settle(app).await;
        assert_eq!(app.screen, Screen::Detail);
    }

    #[test]
    fn test_request_seq_only_latest_is_current() {
        let mut seq = RequestSeq::default();
        let first = seq.next();
        let second = seq.next();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
    }

    #[tokio::test]
    async fn test_stale_list_response_is_dropped() {
        let mut app = offline_app();
        let stale = app.list_seq.next();
        let current = app.list_seq.next();

        app.handle_result(LoadResult::List {
            request_id: current,
            result: Ok(NewsMappingListResponse {
                items: vec![summary(2)],
                total_count: 1,
                page: 0,
                size: 10,
            }),
        });
        app.handle_result(LoadResult::List {
            request_id: stale,
            result: Ok(NewsMappingListResponse {
                items: vec![summary(1), summary(9)],
                total_count: 2,
                page: 0,
                size: 10,
            }),
        });

        assert_eq!(app.list.items.len(), 1);
        assert_eq!(app.list.items[0].news_id, 2);
    }

    #[tokio::test]
    async fn test_list_failure_resets_to_empty() {
        let mut app = offline_app();
        app.list.items = vec![summary(1)];
        app.list.total_count = 1;
        let id = app.list_seq.next();

        app.handle_result(LoadResult::List {
            request_id: id,
            result: Err(ApiError::Status { status: 500, body: String::new() }),
        });

        assert!(app.list.items.is_empty());
        assert_eq!(app.list.total_count, 0);
        assert!(app.status_message.is_some());
    }

    #[tokio::test]
    async fn test_filter_and_search_reload_list() {
        let mut app = offline_app();
        app.reload_list();
        settle(&mut app).await;
        assert_eq!(app.list.total_count, 7);

        app.handle_key(key(KeyCode::Tab)).unwrap();
        app.handle_key(key(KeyCode::Tab)).unwrap();
        settle(&mut app).await;
        assert_eq!(app.list.filter, ListFilter::Done);
        assert_eq!(app.list.total_count, 2);

        app.handle_key(key(KeyCode::Tab)).unwrap();
        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        type_text(&mut app, "카카오");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        settle(&mut app).await;
        assert_eq!(app.list.search, "카카오");
        let ids: Vec<i64> = app.list.items.iter().map(|i| i.news_id).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[tokio::test]
    async fn test_paging_stays_in_range() {
        let config = AppConfig {
            offline: true,
            page_size: 5,
            ..AppConfig::default()
        };
        let mut app = App::new(&config, Backend::Fixtures(FixtureBackend::sample()));
        app.reload_list();
        settle(&mut app).await;
        assert_eq!(app.total_pages(), 2);

        app.handle_key(key(KeyCode::Right)).unwrap();
        settle(&mut app).await;
        assert_eq!(app.list.page, 1);
        assert_eq!(app.list.items.len(), 2);

        app.handle_key(key(KeyCode::Right)).unwrap();
        assert_eq!(app.list.page, 1);
    }

    #[tokio::test]
    async fn test_open_detail_builds_cards_and_catalog() {
        let mut app = offline_app();
        open_news(&mut app, 1).await;

        let state = app.detail.as_ref().unwrap();
        assert_eq!(state.review.cards.len(), 3);
        assert_eq!(state.review.cards[1].extracted_name, "LG에너지솔루션");
        assert_eq!(app.catalog.label("373220"), "LG에너지솔루션 (373220)");
    }

    #[tokio::test]
    async fn test_search_select_and_save() {
        let mut app = offline_app();
        open_news(&mut app, 1).await;

        // Card 0 is 현대차그룹 with no selections
        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        type_text(&mut app, "현대차");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        settle(&mut app).await;

        let state = app.detail.as_ref().unwrap();
        assert_eq!(state.search_results[0].len(), 1);
        assert_eq!(state.focused_row(), Some(CardRow::SearchResult("005380".to_string())));

        app.handle_key(key(KeyCode::Char(' '))).unwrap();
        let state = app.detail.as_ref().unwrap();
        assert!(state.review.cards[0].is_checked("005380"));
        assert!(state.review.is_dirty());

        // Move to the new selection row and leave feedback
        app.handle_key(key(KeyCode::Down)).unwrap();
        app.handle_key(key(KeyCode::Char('f'))).unwrap();
        type_text(&mut app, "그룹 대표 종목");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        let state = app.detail.as_ref().unwrap();
        assert_eq!(
            state.review.cards[0].selection("005380").unwrap().feedback,
            "그룹 대표 종목"
        );

        app.handle_key(key(KeyCode::Char('s'))).unwrap();
        settle(&mut app).await;
        assert_eq!(app.screen, Screen::List);
        assert!(app.detail.is_none());

        let news1 = app.list.items.iter().find(|i| i.news_id == 1).unwrap();
        assert_eq!(news1.status, MappingStatus::Partial);
    }

    #[tokio::test]
    async fn test_no_match_blocks_stock_rows() {
        let mut app = offline_app();
        open_news(&mut app, 2).await;

        // Rows: Selection(005930), NoMatch
        app.handle_key(key(KeyCode::Down)).unwrap();
        app.handle_key(key(KeyCode::Char(' '))).unwrap();
        let state = app.detail.as_ref().unwrap();
        assert!(state.review.cards[0].no_match.active);
        assert!(!state.review.cards[0].is_checked("005930"));

        app.handle_key(key(KeyCode::Up)).unwrap();
        app.handle_key(key(KeyCode::Char(' '))).unwrap();
        let state = app.detail.as_ref().unwrap();
        assert!(!state.review.cards[0].is_checked("005930"));

        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);

        // Turning no-match off restores the automatic match
        app.handle_key(key(KeyCode::Down)).unwrap();
        app.handle_key(key(KeyCode::Char(' '))).unwrap();
        let state = app.detail.as_ref().unwrap();
        assert!(state.review.cards[0].is_checked("005930"));
        assert!(!state.review.is_dirty());
    }

    #[tokio::test]
    async fn test_feedback_typed_under_no_match_is_kept() {
        let mut app = offline_app();
        open_news(&mut app, 2).await;

        app.handle_key(key(KeyCode::Down)).unwrap();
        app.handle_key(key(KeyCode::Char(' '))).unwrap();
        app.handle_key(key(KeyCode::Up)).unwrap();
        app.handle_key(key(KeyCode::Char('f'))).unwrap();
        type_text(&mut app, "keep me");
        app.handle_key(key(KeyCode::Enter)).unwrap();

        app.handle_key(key(KeyCode::Down)).unwrap();
        app.handle_key(key(KeyCode::Char(' '))).unwrap();
        let state = app.detail.as_ref().unwrap();
        let card = &state.review.cards[0];
        assert!(!card.no_match.active);
        assert!(card.is_checked("005930"));
        assert_eq!(card.selection("005930").unwrap().feedback, "keep me");
        assert!(state.review.is_dirty());
    }

    #[tokio::test]
    async fn test_searches_on_different_cards_both_land() {
        let mut app = offline_app();
        open_news(&mut app, 1).await;

        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        type_text(&mut app, "현대차");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.handle_key(key(KeyCode::Tab)).unwrap();
        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        type_text(&mut app, "LG");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        settle(&mut app).await;

        let state = app.detail.as_ref().unwrap();
        let first: Vec<&str> = state.search_results[0].iter().map(|s| s.stock_code.as_str()).collect();
        let second: Vec<&str> = state.search_results[1].iter().map(|s| s.stock_code.as_str()).collect();
        assert_eq!(first, vec!["005380"]);
        assert_eq!(second, vec!["373220", "051910"]);
    }

    #[tokio::test]
    async fn test_older_search_on_same_card_is_dropped() {
        let mut app = offline_app();
        open_news(&mut app, 1).await;

        app.search_stocks(0, "현대".to_string());
        app.search_stocks(0, "현대차".to_string());
        settle(&mut app).await;

        // Id 1 belongs to the superseded "현대" search
        app.handle_result(LoadResult::Stocks {
            request_id: 1,
            news_id: 1,
            card: 0,
            result: Ok(Vec::new()),
        });

        let state = app.detail.as_ref().unwrap();
        assert_eq!(state.search_results[0].len(), 1);
        assert_eq!(state.search_results[0][0].stock_code, "005380");
    }

    #[tokio::test]
    async fn test_leaving_dirty_review_asks_first() {
        let mut app = offline_app();
        open_news(&mut app, 6).await;

        app.handle_key(key(KeyCode::Char(' '))).unwrap();
        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.popup, Popup::ConfirmDiscard);

        app.handle_key(key(KeyCode::Char('n'))).unwrap();
        assert_eq!(app.screen, Screen::Detail);

        app.handle_key(key(KeyCode::Esc)).unwrap();
        app.handle_key(key(KeyCode::Char('y'))).unwrap();
        assert_eq!(app.screen, Screen::List);
        assert!(app.detail.is_none());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_review_open() {
        let mut app = offline_app();
        open_news(&mut app, 6).await;
        app.detail.as_mut().unwrap().saving = true;

        app.handle_result(LoadResult::Saved {
            news_id: 6,
            result: Err(ApiError::Status { status: 503, body: "unavailable".to_string() }),
        });

        assert_eq!(app.screen, Screen::Detail);
        assert!(!app.detail.as_ref().unwrap().saving);
        assert!(app.status_message.as_deref().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_quit_only_from_list() {
        let mut app = offline_app();
        open_news(&mut app, 3).await;
        app.handle_key(key(KeyCode::Char('q'))).unwrap();
        assert!(!app.should_quit);

        app.handle_key(key(KeyCode::Esc)).unwrap();
        app.handle_key(key(KeyCode::Char('q'))).unwrap();
        assert!(app.should_quit);
    }
}
