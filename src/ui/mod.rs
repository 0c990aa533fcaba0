mod format;

use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::api::{ListFilter, MappingStatus};
use crate::app::{App, CardRow, DetailState, InputMode, Popup, Screen};
use crate::theme::Theme;

use format::{format_date, format_datetime, format_names, match_badge};

static THEME: OnceLock<Theme> = OnceLock::new();

/// Install the theme; later calls are ignored
pub fn init_theme(theme: Theme) {
    let _ = THEME.set(theme);
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn inactive() -> Color { theme().inactive }
fn success() -> Color { theme().success }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }

fn status_color(status: MappingStatus) -> Color {
    match status {
        MappingStatus::NoMapping => inactive(),
        MappingStatus::Unmapped => danger(),
        MappingStatus::AutoPending => warning(),
        MappingStatus::Partial => accent(),
        MappingStatus::Done => success(),
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let input_height = if app.input_mode == InputMode::Normal { 0 } else { 3 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // Info line
            Constraint::Min(6),               // Screen body
            Constraint::Length(input_height), // Text input
            Constraint::Length(1),            // Footer
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);
    match app.screen {
        Screen::List => draw_list_screen(f, app, chunks[1]),
        Screen::Detail => match &app.detail {
            Some(state) => draw_detail_screen(f, app, state, chunks[1]),
            None => draw_list_screen(f, app, chunks[1]),
        },
    }
    if input_height > 0 {
        draw_input(f, app, chunks[2]);
    }
    draw_footer(f, app, chunks[3]);

    // Draw popups on top
    match app.popup {
        Popup::None => {}
        Popup::Help => draw_help_popup(f),
        Popup::ConfirmDiscard => draw_confirm_popup(f),
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    // Priority: status message > loading > ready
    let line = if let Some(ref status) = app.status_message {
        Line::from(Span::styled(status.as_str(), Style::default().fg(warning())))
    } else if app.list.loading && app.screen == Screen::List {
        Line::from(Span::styled("불러오는 중...", Style::default().fg(text_dim())))
    } else {
        Line::from(vec![
            Span::styled("준비됨", Style::default().fg(text_dim())),
            Span::styled(" │ ", Style::default().fg(inactive())),
            Span::styled(app.backend_label.as_str(), Style::default().fg(text_dim())),
        ])
    };

    let info = Paragraph::new(line).alignment(Alignment::Center);
    f.render_widget(info, area);
}

fn draw_list_screen(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(area);

    // Filter tabs and current search
    let mut tabs: Vec<Span> = Vec::new();
    for filter in ListFilter::ALL {
        let style = if filter == app.list.filter {
            Style::default().fg(accent()).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(text_dim())
        };
        tabs.push(Span::styled(format!(" {} ", filter.label()), style));
        tabs.push(Span::styled("│", Style::default().fg(inactive())));
    }
    if !app.list.search.is_empty() {
        tabs.push(Span::styled(
            format!(" 검색: {}", app.list.search),
            Style::default().fg(text()),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(tabs)), chunks[0]);

    let title = format!(
        " 뉴스 매핑 ({}건, {}/{} 페이지) ",
        app.list.total_count,
        app.list.page + 1,
        app.total_pages()
    );
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(accent()).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));

    let header = Row::new(vec![
        Span::styled("상태", Style::default().fg(danger())),
        Span::styled("뉴스 제목", Style::default().fg(danger())),
        Span::styled("추출 기업명", Style::default().fg(danger())),
        Span::styled("매칭상태", Style::default().fg(danger())),
    ]);

    let rows: Vec<Row> = if app.list.items.is_empty() {
        let message = if app.list.loading { "  불러오는 중..." } else { "  결과가 없습니다" };
        vec![Row::new(vec![Span::styled(message, Style::default().fg(text_dim()))])]
    } else {
        app.list
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let row_style = if i == app.list.selected {
                    Style::default().bg(bg_selected()).fg(text())
                } else {
                    Style::default()
                };

                Row::new(vec![
                    Span::styled(
                        format!("● {}", item.status.label()),
                        Style::default().fg(status_color(item.status)),
                    ),
                    Span::styled(item.title.as_str(), Style::default().fg(text())),
                    Span::styled(format_names(&item.extracted_names), Style::default().fg(text_dim())),
                    Span::styled(
                        match_badge(item.matched_count, item.total_count),
                        Style::default().fg(if item.matched_count == 0 { danger() } else { text() }),
                    ),
                ])
                .style(row_style)
            })
            .collect()
    };

    let widths = [
        Constraint::Length(16),
        Constraint::Percentage(50),
        Constraint::Percentage(25),
        Constraint::Length(14),
    ];

    let table = Table::new(rows, widths).header(header).block(block);
    f.render_widget(table, chunks[1]);
}

fn draw_detail_screen(f: &mut Frame, app: &App, state: &DetailState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(6)])
        .split(area);

    draw_article(f, state, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(32), Constraint::Percentage(68)])
        .split(chunks[1]);

    draw_card_list(f, state, body[0]);
    draw_card(f, app, state, body[1]);
}

fn draw_article(f: &mut Frame, state: &DetailState, area: Rect) {
    let detail = &state.detail;
    let title = if state.review.is_dirty() { " 매핑 상세 (수정됨) " } else { " 매핑 상세 " };

    let mut lines = vec![
        Line::from(Span::styled(
            detail.title.as_str(),
            Style::default().fg(text()).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            detail.content.as_deref().unwrap_or(""),
            Style::default().fg(text_dim()),
        )),
    ];

    let mut meta = Vec::new();
    if let Some(published) = detail.published_at {
        meta.push(Span::styled(
            format!("발행일: {}  ", format_date(published)),
            Style::default().fg(text_dim()),
        ));
    }
    meta.push(Span::styled(
        format!("수집일: {}", format_datetime(detail.collected_at)),
        Style::default().fg(text_dim()),
    ));
    lines.push(Line::from(meta));
    if let Some(url) = &detail.url {
        lines.push(Line::from(Span::styled(url.as_str(), Style::default().fg(accent()))));
    }

    let article = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(Span::styled(title, Style::default().fg(accent()).add_modifier(Modifier::BOLD)))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(inactive())),
        );
    f.render_widget(article, area);
}

fn draw_card_list(f: &mut Frame, state: &DetailState, area: Rect) {
    let block = Block::default()
        .title(Span::styled(" 기업명 ", Style::default().fg(inactive())))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(inactive()));

    let rows: Vec<Row> = if state.review.cards.is_empty() {
        vec![Row::new(vec![Span::styled("  추출된 기업명 없음", Style::default().fg(text_dim()))])]
    } else {
        state
            .review
            .cards
            .iter()
            .enumerate()
            .map(|(i, card)| {
                let count = card.checked_count();
                let (badge, badge_color) = if card.no_match.active {
                    ("해당 없음".to_string(), warning())
                } else if count > 0 {
                    (format!("{}건 선택", count), success())
                } else {
                    ("-".to_string(), text_dim())
                };
                let row_style = if i == state.focus_card {
                    Style::default().bg(bg_selected()).fg(text())
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Span::styled(card.extracted_name.as_str(), Style::default().fg(text())),
                    Span::styled(badge, Style::default().fg(badge_color)),
                ])
                .style(row_style)
            })
            .collect()
    };

    let widths = [Constraint::Percentage(60), Constraint::Percentage(40)];
    f.render_widget(Table::new(rows, widths).block(block), area);
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn draw_card(f: &mut Frame, app: &App, state: &DetailState, area: Rect) {
    let Some(card) = state.review.cards.get(state.focus_card) else {
        let empty = Paragraph::new("검수할 기업명이 없습니다")
            .style(Style::default().fg(text_dim()))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(inactive())));
        f.render_widget(empty, area);
        return;
    };

    let block = Block::default()
        .title(Span::styled(
            format!(" 기업명: {} ", card.extracted_name),
            Style::default().fg(accent()).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));

    let focused = state.focused_row();
    let row_style = |row: &CardRow| {
        if focused.as_ref() == Some(row) {
            Style::default().bg(bg_selected())
        } else {
            Style::default()
        }
    };

    let mut lines: Vec<Line> = Vec::new();

    // Stock search (disabled while no-match is active)
    let search_style = if card.no_match.active { text_dim() } else { text() };
    let search_text = if card.stock_search.is_empty() { "종목 검색 (이름, 코드)" } else { card.stock_search.as_str() };
    lines.push(Line::from(vec![
        Span::styled("/ ", Style::default().fg(accent())),
        Span::styled(search_text, Style::default().fg(search_style)),
    ]));

    for row in state.rows(state.focus_card) {
        let style = row_style(&row);
        match &row {
            CardRow::SearchResult(code) => {
                lines.push(
                    Line::from(vec![
                        Span::styled(format!("  {} ", checkbox(card.is_checked(code))), Style::default().fg(accent())),
                        Span::styled(app.catalog.label(code), Style::default().fg(text())),
                    ])
                    .style(style),
                );
            }
            CardRow::Selection(code) => {
                let Some(sel) = card.selection(code) else {
                    continue;
                };
                let name_style = if sel.checked {
                    Style::default().fg(success()).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(text_dim())
                };
                lines.push(
                    Line::from(vec![
                        Span::styled(format!("{} ", checkbox(sel.checked)), Style::default().fg(accent())),
                        Span::styled(app.catalog.label(code), name_style),
                    ])
                    .style(style),
                );
                lines.push(feedback_line(&sel.feedback, "사유 입력"));
            }
            CardRow::NoMatch => {
                lines.push(Line::from(Span::styled("─".repeat(20), Style::default().fg(inactive()))));
                let label_style = if card.no_match.active {
                    Style::default().fg(warning()).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(text())
                };
                lines.push(
                    Line::from(vec![
                        Span::styled(format!("{} ", checkbox(card.no_match.active)), Style::default().fg(accent())),
                        Span::styled("해당 없음", label_style),
                    ])
                    .style(style),
                );
                if card.no_match.active {
                    lines.push(feedback_line(&card.no_match.feedback, "사유 (비상장, 외국기업 등)"));
                }
            }
        }
    }

    let content = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
    f.render_widget(content, area);
}

fn feedback_line<'a>(feedback: &'a str, placeholder: &'a str) -> Line<'a> {
    if feedback.is_empty() {
        Line::from(Span::styled(format!("    {}", placeholder), Style::default().fg(inactive())))
    } else {
        Line::from(Span::styled(format!("    {}", feedback), Style::default().fg(text_dim())))
    }
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let title = match &app.input_mode {
        InputMode::Normal => "",
        InputMode::ListSearch => " 뉴스 제목, 기업명 검색 ",
        InputMode::StockSearch => " 종목 검색 (이름, 코드) ",
        InputMode::Feedback { stock_code: Some(_) } => " 사유 입력 ",
        InputMode::Feedback { stock_code: None } => " 사유 (비상장, 외국기업 등) ",
    };

    let input = Paragraph::new(format!("{}_", app.input_buffer))
        .style(Style::default().fg(text()))
        .block(
            Block::default()
                .title(Span::styled(title, Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        );
    f.render_widget(input, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let hints: Vec<(&str, &str)> = if app.input_mode != InputMode::Normal {
        vec![("Enter", "적용"), ("Esc", "취소")]
    } else {
        match app.screen {
            Screen::List => vec![
                ("↑↓", "이동"),
                ("Enter", "열기"),
                ("Tab", "필터"),
                ("/", "검색"),
                ("←→", "페이지"),
                ("R", "새로고침"),
                ("?", "도움말"),
                ("q", "종료"),
            ],
            Screen::Detail => vec![
                ("Tab", "회사"),
                ("↑↓", "행"),
                ("Space", "선택"),
                ("/", "종목 검색"),
                ("f", "사유"),
                ("s", "저장"),
                ("Esc", "뒤로"),
            ],
        }
    };

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 80 { 5 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    let footer = Paragraph::new(Line::from(hint_spans)).alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn help_section(title: &str) -> Line<'_> {
    Line::from(Span::styled(
        format!("═══ {} ═══", title),
        Style::default().fg(danger()).add_modifier(Modifier::BOLD),
    ))
}

fn help_entry<'a>(key: &'a str, description: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("  {:<11}", key), Style::default().fg(accent())),
        Span::raw(description),
    ])
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 70 },
        if area.height < 40 { 95 } else { 80 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let help_text = vec![
        help_section("뉴스 목록"),
        help_entry("↑/↓ j/k", "선택 이동"),
        help_entry("Enter", "매핑 검토 열기"),
        help_entry("Tab", "필터 전환: 전체 → 미매칭있음 → 완료"),
        help_entry("/", "제목과 회사명 검색"),
        help_entry("←/→ [ ]", "이전 / 다음 페이지"),
        help_entry("R", "새로고침"),
        Line::from(""),
        help_section("매핑 검토"),
        help_entry("Tab", "다음 회사 (Shift-Tab: 이전 회사)"),
        help_entry("↑/↓ j/k", "회사 안에서 행 이동"),
        help_entry("Space", "종목 또는 해당 없음 선택/해제"),
        help_entry("/", "종목명이나 코드로 검색"),
        help_entry("f", "선택한 행의 사유 입력"),
        help_entry("s", "결정 저장"),
        help_entry("Esc", "목록으로"),
        Line::from(""),
        Line::from(vec![Span::raw(
            "  해당 없음을 선택하면 모든 종목이 해제되고, 다시 끄면 복원됩니다.",
        )]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  ", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" 키로 닫기", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" stocker-review 도움말 ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn draw_confirm_popup(f: &mut Frame) {
    let popup_area = centered_rect(40, 20, f.area());

    f.render_widget(Clear, popup_area);

    let confirm = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("저장하지 않은 변경이 있습니다. 나갈까요?", Style::default().fg(warning()))),
        Line::from(""),
        Line::from(vec![
            Span::styled("  y", Style::default().fg(success()).add_modifier(Modifier::BOLD)),
            Span::raw(" 예   "),
            Span::styled("n", Style::default().fg(danger()).add_modifier(Modifier::BOLD)),
            Span::raw(" 아니오"),
        ]),
    ])
    .block(
        Block::default()
            .title(Span::styled(" 확인 ", Style::default().fg(warning())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(warning())),
    )
    .alignment(Alignment::Center);

    f.render_widget(confirm, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
