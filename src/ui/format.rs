//! Display formatting for dates and list cells

use chrono::{NaiveDate, NaiveDateTime};

/// `2026년 01월 15일`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y년 %m월 %d일").to_string()
}

/// `2026년 01월 15일 10시 30분`
pub fn format_datetime(datetime: NaiveDateTime) -> String {
    datetime.format("%Y년 %m월 %d일 %H시 %M분").to_string()
}

/// First name, with `외 N` for the rest
pub fn format_names(names: &[String]) -> String {
    match names {
        [] => "-".to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{} 외 {}", first, rest.len()),
    }
}

pub fn match_badge(matched: u32, total: u32) -> String {
    if matched == total {
        format!("{}/{} 완료", matched, total)
    } else if matched == 0 {
        format!("0/{} 미매칭", total)
    } else {
        format!("{}/{} 매칭", matched, total)
    }
}
