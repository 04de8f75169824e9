//! Query-string contract shared by the list pages. Raw parameters are
//! deserialized as plain strings and normalized here: malformed values fall
//! back to documented defaults instead of failing the request, and
//! serialization emits only the dimensions that differ from those defaults.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::listing::ViewMode;
use crate::models::{AppointmentStatus, MessageStatus, STATUS_ALL};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgendaQuery {
    pub date: Option<String>,
    pub mode: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgendaFilter {
    pub date: NaiveDate,
    pub mode: ViewMode,
    pub status: String,
}

impl AgendaFilter {
    pub fn from_query(query: &AgendaQuery, today: NaiveDate) -> Self {
        Self {
            date: parse_date(query.date.as_deref(), today),
            mode: parse_mode(query.mode.as_deref()),
            status: normalize_status(query.status.as_deref(), |value| {
                AppointmentStatus::parse(value).is_some()
            }),
        }
    }

    /// Same filter pointed at another day. Used for calendar-day links,
    /// which are real navigation and therefore plain anchors.
    pub fn for_date(&self, date: NaiveDate) -> Self {
        Self {
            date,
            ..self.clone()
        }
    }

    pub fn query_string(&self, today: NaiveDate) -> String {
        let mut params = Vec::new();
        if self.date != today {
            params.push(format!("date={}", self.date.format("%Y-%m-%d")));
        }
        if self.mode == ViewMode::Month {
            params.push("mode=month".to_string());
        }
        if self.status != STATUS_ALL {
            params.push(format!("status={}", self.status));
        }
        join_params(params)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientsQuery {
    pub busca: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientsFilter {
    pub term: String,
}

impl ClientsFilter {
    pub fn from_query(query: &ClientsQuery) -> Self {
        Self {
            term: query.busca.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    pub busca: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "dateFrom")]
    pub date_from: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessagesFilter {
    pub term: String,
    pub status: String,
    pub date_from: Option<NaiveDate>,
    pub page: usize,
}

impl MessagesFilter {
    pub fn from_query(query: &MessagesQuery) -> Self {
        Self {
            term: query.busca.clone().unwrap_or_default(),
            status: normalize_status(query.status.as_deref(), |value| {
                MessageStatus::parse(value).is_some()
            }),
            date_from: parse_optional_date(query.date_from.as_deref()),
            page: parse_page(query.page.as_deref()),
        }
    }

    pub fn query_string_for_page(&self, page: usize) -> String {
        let mut params = Vec::new();
        if !self.term.trim().is_empty() {
            params.push(format!("busca={}", urlencoding::encode(self.term.trim())));
        }
        if self.status != STATUS_ALL {
            params.push(format!("status={}", self.status));
        }
        if let Some(date_from) = self.date_from {
            params.push(format!("dateFrom={}", date_from.format("%Y-%m-%d")));
        }
        if page > 1 {
            params.push(format!("page={page}"));
        }
        join_params(params)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportsQuery {
    pub period: Option<String>,
}

/// Reporting window: a month (`YYYY-MM`) or a whole year (`YYYY`), matched
/// against entry dates by string prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportPeriod {
    Month(String),
    Year(String),
}

impl ReportPeriod {
    pub fn from_query(query: &ReportsQuery, today: NaiveDate) -> Self {
        match query.period.as_deref() {
            Some(raw) if is_year_month_shape(raw) => ReportPeriod::Month(raw.to_string()),
            Some(raw) if is_year_shape(raw) => ReportPeriod::Year(raw.to_string()),
            _ => ReportPeriod::Month(today.format("%Y-%m").to_string()),
        }
    }

    pub fn prefix(&self) -> &str {
        match self {
            ReportPeriod::Month(prefix) | ReportPeriod::Year(prefix) => prefix,
        }
    }
}

/// Accepts only a full `YYYY-MM-DD` shape that is a real calendar date;
/// anything else falls back.
pub fn parse_date(raw: Option<&str>, fallback: NaiveDate) -> NaiveDate {
    raw.and_then(parse_strict_date).unwrap_or(fallback)
}

pub fn parse_optional_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(parse_strict_date)
}

fn parse_strict_date(raw: &str) -> Option<NaiveDate> {
    if !is_iso_date_shape(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_mode(raw: Option<&str>) -> ViewMode {
    match raw {
        Some("month") => ViewMode::Month,
        _ => ViewMode::Day,
    }
}

fn normalize_status<F>(raw: Option<&str>, recognized: F) -> String
where
    F: Fn(&str) -> bool,
{
    match raw {
        Some(value) if recognized(value) => value.to_string(),
        _ => STATUS_ALL.to_string(),
    }
}

fn parse_page(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}

fn is_iso_date_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

fn is_year_month_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 7
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

fn is_year_shape(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|byte| byte.is_ascii_digit())
}

fn join_params(params: Vec<String>) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!("?{}", params.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
    }

    #[test]
    fn invalid_date_falls_back_to_today() {
        let query = AgendaQuery {
            date: Some("2025-13-40".to_string()),
            ..AgendaQuery::default()
        };
        let filter = AgendaFilter::from_query(&query, today());
        assert_eq!(filter.date, today());
    }

    #[test]
    fn malformed_date_shapes_fall_back() {
        assert_eq!(parse_date(Some("20-11-2025"), today()), today());
        assert_eq!(parse_date(Some("2025-11-2"), today()), today());
        assert_eq!(parse_date(Some("not a date"), today()), today());
        assert_eq!(parse_date(None, today()), today());
        assert_eq!(
            parse_date(Some("2025-11-21"), today()),
            NaiveDate::from_ymd_opt(2025, 11, 21).unwrap()
        );
    }

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let filter = AgendaFilter::from_query(&AgendaQuery::default(), today());
        assert_eq!(filter.date, today());
        assert_eq!(filter.mode, ViewMode::Day);
        assert_eq!(filter.status, STATUS_ALL);
    }

    #[test]
    fn unknown_status_becomes_the_all_sentinel() {
        let query = AgendaQuery {
            status: Some("Whatever".to_string()),
            ..AgendaQuery::default()
        };
        let filter = AgendaFilter::from_query(&query, today());
        assert_eq!(filter.status, STATUS_ALL);
    }

    #[test]
    fn default_dimensions_are_omitted_from_the_query_string() {
        let filter = AgendaFilter::from_query(&AgendaQuery::default(), today());
        assert_eq!(filter.query_string(today()), "");

        let filter = AgendaFilter {
            date: NaiveDate::from_ymd_opt(2025, 11, 21).unwrap(),
            mode: ViewMode::Month,
            status: "Pendente".to_string(),
        };
        assert_eq!(
            filter.query_string(today()),
            "?date=2025-11-21&mode=month&status=Pendente"
        );
    }

    #[test]
    fn page_parse_clamps_to_one() {
        assert_eq!(parse_page(Some("3")), 3);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-2")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(None), 1);
    }

    #[test]
    fn messages_query_string_carries_non_defaults() {
        let filter = MessagesFilter {
            term: "ana silva".to_string(),
            status: "Erro".to_string(),
            date_from: NaiveDate::from_ymd_opt(2025, 10, 1),
            page: 1,
        };
        assert_eq!(
            filter.query_string_for_page(2),
            "?busca=ana%20silva&status=Erro&dateFrom=2025-10-01&page=2"
        );
        let default = MessagesFilter::from_query(&MessagesQuery::default());
        assert_eq!(default.query_string_for_page(1), "");
    }

    #[test]
    fn report_period_parses_month_year_and_default() {
        let month = ReportPeriod::from_query(
            &ReportsQuery {
                period: Some("2025-07".to_string()),
            },
            today(),
        );
        assert_eq!(month, ReportPeriod::Month("2025-07".to_string()));

        let year = ReportPeriod::from_query(
            &ReportsQuery {
                period: Some("2025".to_string()),
            },
            today(),
        );
        assert_eq!(year, ReportPeriod::Year("2025".to_string()));

        let fallback = ReportPeriod::from_query(
            &ReportsQuery {
                period: Some("last-week".to_string()),
            },
            today(),
        );
        assert_eq!(fallback, ReportPeriod::Month("2025-11".to_string()));
    }
}
