//! In-memory listing pipeline shared by the agenda, client, and message-log
//! pages: stable sort, view-mode and status predicates, multi-field text
//! search, and fixed-size pagination.

use crate::models::STATUS_ALL;

pub const PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Day,
    Month,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Day => "day",
            ViewMode::Month => "month",
        }
    }
}

/// Sorts and filters without touching the source list. The full list is
/// sorted first (case-insensitive, stable), then the predicate prunes it,
/// so ties keep their insertion order.
pub fn select<'a, T, K, P>(items: &'a [T], sort_key: K, keep: P) -> Vec<&'a T>
where
    K: Fn(&T) -> String,
    P: Fn(&T) -> bool,
{
    let mut selected: Vec<&T> = items.iter().collect();
    selected.sort_by_key(|item| sort_key(item).to_lowercase());
    selected.retain(|item| keep(item));
    selected
}

/// Day view matches the exact date; month view matches the `YYYY-MM` prefix.
pub fn date_matches(mode: ViewMode, record_date: &str, selected_date: &str) -> bool {
    match mode {
        ViewMode::Day => record_date == selected_date,
        ViewMode::Month => match (record_date.get(..7), selected_date.get(..7)) {
            (Some(record), Some(selected)) => record == selected,
            _ => false,
        },
    }
}

/// The `Todos` sentinel (and a blank filter) matches every record.
pub fn status_matches(record_status: &str, filter: &str) -> bool {
    filter.is_empty() || filter == STATUS_ALL || record_status == filter
}

/// Case-insensitive substring search: a record matches when any of its
/// searchable fields contains the term. An empty term disables the filter.
pub fn text_matches<'f>(term: &str, fields: impl IntoIterator<Item = &'f str>) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields
        .into_iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

pub fn page_count(total: usize) -> usize {
    if total == 0 {
        1
    } else {
        total.div_ceil(PAGE_SIZE)
    }
}

/// Clamps a 1-based page index into the valid range for `total` records.
pub fn clamp_page(page: usize, total: usize) -> usize {
    page.max(1).min(page_count(total))
}

/// Slices one page out of the filtered list. Pages beyond the last clamp to
/// the last valid page.
pub fn paginate<T>(items: &[T], page: usize) -> &[T] {
    let page = clamp_page(page, items.len());
    let start = (page - 1) * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(items.len());
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Record {
        name: String,
        date: String,
        time: String,
        status: String,
        contacts: Vec<String>,
    }

    fn record(name: &str, date: &str, time: &str, status: &str) -> Record {
        Record {
            name: name.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            status: status.to_string(),
            contacts: Vec::new(),
        }
    }

    fn names(selected: &[&Record]) -> Vec<String> {
        selected.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn filtering_is_idempotent_and_leaves_source_untouched() {
        let source = vec![
            record("Beatriz", "2025-11-21", "10:00", "Pendente"),
            record("Ana", "2025-11-20", "09:00", "Realizado"),
        ];
        let snapshot = source.clone();

        let keep = |r: &Record| status_matches(&r.status, "Realizado");
        let first = names(&select(&source, |r| r.name.clone(), keep));
        let second = names(&select(&source, |r| r.name.clone(), keep));

        assert_eq!(first, second);
        assert_eq!(source, snapshot);
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let mut ana = record("Ana Silva", "2025-11-20", "09:00", "Pendente");
        ana.contacts.push("ana@x.com".to_string());

        fn fields(r: &Record) -> Vec<&str> {
            let mut fields = vec![r.name.as_str()];
            fields.extend(r.contacts.iter().map(String::as_str));
            fields
        }

        assert!(text_matches("ana", fields(&ana)));
        assert!(text_matches("ANA", fields(&ana)));
        assert!(text_matches("x.com", fields(&ana)));
        assert!(!text_matches("zzz", fields(&ana)));
    }

    #[test]
    fn empty_search_term_disables_the_predicate() {
        assert!(text_matches("", ["anything"]));
        assert!(text_matches("   ", Vec::<&str>::new()));
    }

    #[test]
    fn status_all_keeps_full_membership() {
        let source = vec![
            record("Ana", "2025-11-20", "09:00", "Pendente"),
            record("Beatriz", "2025-11-21", "10:00", "Realizado"),
            record("Carla", "2025-11-22", "11:00", "Cancelado"),
        ];
        let selected = select(
            &source,
            |r| r.name.clone(),
            |r| status_matches(&r.status, STATUS_ALL),
        );
        assert_eq!(selected.len(), source.len());
    }

    #[test]
    fn stable_sort_keeps_insertion_order_among_ties() {
        let source = vec![
            record("second", "2025-11-20", "09:00", "Pendente"),
            record("first", "2025-11-19", "08:00", "Pendente"),
            record("third", "2025-11-20", "09:00", "Pendente"),
        ];
        let selected = select(
            &source,
            |r| format!("{} {}", r.date, r.time),
            |_| true,
        );
        assert_eq!(names(&selected), ["first", "second", "third"]);
    }

    #[test]
    fn pagination_slices_and_clamps() {
        let items: Vec<usize> = (0..120).collect();

        assert_eq!(paginate(&items, 1), &items[0..50]);
        assert_eq!(paginate(&items, 3), &items[100..120]);
        // past the end clamps to the last valid page
        assert_eq!(paginate(&items, 9), &items[100..120]);
        assert_eq!(paginate(&items, 0), &items[0..50]);

        assert_eq!(page_count(0), 1);
        assert_eq!(page_count(50), 1);
        assert_eq!(page_count(51), 2);
        let empty: Vec<usize> = Vec::new();
        assert!(paginate(&empty, 5).is_empty());
    }

    #[test]
    fn day_view_selects_only_the_chosen_date() {
        let source = vec![
            record("Beatriz", "2025-11-21", "10:00", "Pendente"),
            record("Ana", "2025-11-20", "09:00", "Pendente"),
        ];
        let selected = select(
            &source,
            |r| format!("{} {}", r.date, r.time),
            |r| date_matches(ViewMode::Day, &r.date, "2025-11-20"),
        );
        assert_eq!(names(&selected), ["Ana"]);
    }

    #[test]
    fn month_view_matches_by_prefix() {
        assert!(date_matches(ViewMode::Month, "2025-11-03", "2025-11-20"));
        assert!(!date_matches(ViewMode::Month, "2025-12-01", "2025-11-20"));
        assert!(!date_matches(ViewMode::Month, "bad", "2025-11-20"));
    }
}
