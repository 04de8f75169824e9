use actix_web::{http::header, web, HttpResponse, Result};
use askama::Template;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    auth::{new_id, AuthUser},
    db::{self, log_activity},
    filters,
    listing,
    models::{ChargeRow, EstablishmentRow, LedgerEntryRow, LedgerKind},
    query::{ReportPeriod, ReportsQuery},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct EntryView {
    kind: String,
    amount: String,
    entry_date: String,
    description: String,
}

#[derive(Clone, Debug)]
struct DelinquentView {
    client_name: String,
    amount: String,
    due_date: String,
    delay_days: i64,
}

#[derive(Clone, Debug, Default)]
struct EntryFormView {
    kind: String,
    amount: String,
    entry_date: String,
    description: String,
}

#[derive(Template)]
#[template(path = "reports.html")]
struct ReportsTemplate {
    period: String,
    period_label: String,
    receita: String,
    despesa: String,
    lucro: String,
    entries: Vec<EntryView>,
    delinquents: Vec<DelinquentView>,
    form: EntryFormView,
    errors: Vec<String>,
    fetch_error: String,
    has_fetch_error: bool,
}

#[derive(Deserialize)]
struct EntryForm {
    kind: String,
    amount: String,
    entry_date: String,
    description: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/reports").route(web::get().to(reports_page)))
        .service(web::resource("/reports/entries").route(web::post().to(create_entry)));
}

async fn reports_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<ReportsQuery>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let today = Utc::now().date_naive();
    let period = ReportPeriod::from_query(&query, today);
    Ok(render_reports(
        &state,
        &establishment,
        &period,
        Vec::new(),
        EntryFormView::default(),
    )
    .await)
}

async fn render_reports(
    state: &web::Data<AppState>,
    establishment: &EstablishmentRow,
    period: &ReportPeriod,
    errors: Vec<String>,
    form: EntryFormView,
) -> HttpResponse {
    let today = Utc::now().date_naive();

    let fetch = sqlx::query_as::<_, LedgerEntryRow>(
        r#"SELECT id, establishment_id, kind, amount, entry_date, description, created_at
           FROM ledger_entries
           WHERE establishment_id = ?"#,
    )
    .bind(&establishment.id)
    .fetch_all(&state.db)
    .await;

    let (rows, fetch_error) = match fetch {
        Ok(rows) => (rows, String::new()),
        Err(err) => {
            log::error!("Failed to load ledger entries: {err}");
            (
                Vec::new(),
                "Não foi possível carregar os lançamentos.".to_string(),
            )
        }
    };

    let selected = listing::select(
        &rows,
        |row| row.entry_date.clone(),
        |row| row.entry_date.starts_with(period.prefix()),
    );

    let receita = sum_amounts(&selected, LedgerKind::Receita);
    let despesa = sum_amounts(&selected, LedgerKind::Despesa);
    let lucro = receita - despesa;

    let entries = selected
        .into_iter()
        .map(|row| EntryView {
            kind: match LedgerKind::parse(&row.kind) {
                Some(LedgerKind::Receita) => "Receita".to_string(),
                Some(LedgerKind::Despesa) => "Despesa".to_string(),
                None => row.kind.clone(),
            },
            amount: row.amount.clone(),
            entry_date: row.entry_date.clone(),
            description: row.description.clone(),
        })
        .collect();

    let delinquents = fetch_delinquents(state, &establishment.id, today).await;

    render(ReportsTemplate {
        period: period.prefix().to_string(),
        period_label: period_label(period),
        receita: filters::brl(&receita.to_string()).unwrap_or_default(),
        despesa: filters::brl(&despesa.to_string()).unwrap_or_default(),
        lucro: filters::brl(&lucro.to_string()).unwrap_or_default(),
        entries,
        delinquents,
        form,
        errors,
        fetch_error: fetch_error.clone(),
        has_fetch_error: !fetch_error.is_empty(),
    })
}

/// Unparseable amounts count as zero so a single bad row cannot sink the
/// whole report.
fn sum_amounts(rows: &[&LedgerEntryRow], kind: LedgerKind) -> Decimal {
    rows.iter()
        .filter(|row| LedgerKind::parse(&row.kind) == Some(kind))
        .map(|row| row.amount.trim().parse::<Decimal>().unwrap_or_default())
        .sum()
}

fn period_label(period: &ReportPeriod) -> String {
    match period {
        ReportPeriod::Month(prefix) => match prefix.split_once('-') {
            Some((year, month)) => format!("{month}/{year}"),
            None => prefix.clone(),
        },
        ReportPeriod::Year(year) => year.clone(),
    }
}

async fn fetch_delinquents(
    state: &web::Data<AppState>,
    establishment_id: &str,
    today: NaiveDate,
) -> Vec<DelinquentView> {
    let rows = sqlx::query_as::<_, ChargeRow>(
        r#"SELECT ch.id, ch.establishment_id, ch.client_id, cl.name AS client_name,
                  cl.phone AS client_phone, ch.amount, ch.due_date, ch.settled, ch.created_at
           FROM charges ch
           JOIN clients cl ON cl.id = ch.client_id
           WHERE ch.establishment_id = ? AND ch.settled = 0"#,
    )
    .bind(establishment_id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let selected = listing::select(
        &rows,
        |row| format!("{} {}", row.due_date, row.client_name),
        |row| past_due(&row.due_date, today),
    );

    selected
        .into_iter()
        .map(|row| DelinquentView {
            client_name: row.client_name.clone(),
            amount: row.amount.clone(),
            due_date: row.due_date.clone(),
            delay_days: NaiveDate::parse_from_str(&row.due_date, "%Y-%m-%d")
                .map(|due| (today - due).num_days())
                .unwrap_or(0),
        })
        .collect()
}

fn past_due(due_date: &str, today: NaiveDate) -> bool {
    NaiveDate::parse_from_str(due_date, "%Y-%m-%d")
        .map(|due| due < today)
        .unwrap_or(false)
}

async fn create_entry(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<EntryForm>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let mut errors = Vec::new();

    let kind = match LedgerKind::parse(form.kind.trim()) {
        Some(kind) => kind,
        None => {
            errors.push("Informe o tipo do lançamento.".to_string());
            LedgerKind::Receita
        }
    };

    let amount = match form.amount.trim().parse::<Decimal>() {
        Ok(amount) if !amount.is_sign_negative() => amount,
        _ => {
            errors.push("Valor inválido.".to_string());
            Decimal::ZERO
        }
    };

    let entry_date = form.entry_date.trim().to_string();
    if crate::query::parse_optional_date(Some(&entry_date)).is_none() {
        errors.push("Data do lançamento inválida.".to_string());
    }

    let description = form.description.clone().unwrap_or_default().trim().to_string();

    let today = Utc::now().date_naive();
    let period = ReportPeriod::from_query(&ReportsQuery::default(), today);

    if !errors.is_empty() {
        let view = EntryFormView {
            kind: form.kind.trim().to_string(),
            amount: form.amount.trim().to_string(),
            entry_date,
            description,
        };
        return Ok(render_reports(&state, &establishment, &period, errors, view).await);
    }

    let insert = sqlx::query(
        r#"INSERT INTO ledger_entries (id, establishment_id, kind, amount, entry_date, description, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(&establishment.id)
    .bind(kind.as_str())
    .bind(amount.round_dp(2).to_string())
    .bind(&entry_date)
    .bind(&description)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        log::error!("Failed to create ledger entry: {err}");
        return Ok(render_reports(
            &state,
            &establishment,
            &period,
            vec!["Não foi possível salvar o lançamento.".to_string()],
            EntryFormView::default(),
        )
        .await);
    }

    log_activity(
        &state.db,
        "ledger_entry_created",
        &format!(
            "Lançamento de {} registrado.",
            filters::brl(&amount.to_string()).unwrap_or_default()
        ),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((
            header::LOCATION,
            format!("/dashboard/reports?period={}", entry_date.get(..7).unwrap_or("")),
        ))
        .finish())
}

async fn resolve_establishment(
    state: &web::Data<AppState>,
    auth: &AuthUser,
) -> Result<EstablishmentRow, HttpResponse> {
    match db::find_establishment(&state.db, &auth.id).await {
        Ok(Some(establishment)) => Ok(establishment),
        Ok(None) => Err(HttpResponse::SeeOther()
            .append_header((header::LOCATION, "/dashboard/profile"))
            .finish()),
        Err(err) => {
            log::error!("Failed to resolve establishment: {err}");
            Err(HttpResponse::InternalServerError().finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: &str, amount: &str, date: &str) -> LedgerEntryRow {
        LedgerEntryRow {
            id: new_id(),
            establishment_id: "e1".to_string(),
            kind: kind.to_string(),
            amount: amount.to_string(),
            entry_date: date.to_string(),
            description: String::new(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn sums_split_by_kind_and_ignore_bad_amounts() {
        let rows = vec![
            entry("receita", "100.50", "2025-11-01"),
            entry("receita", "49.50", "2025-11-02"),
            entry("despesa", "30.00", "2025-11-03"),
            entry("despesa", "not a number", "2025-11-04"),
        ];
        let refs: Vec<&LedgerEntryRow> = rows.iter().collect();
        assert_eq!(sum_amounts(&refs, LedgerKind::Receita), Decimal::new(150, 0));
        assert_eq!(sum_amounts(&refs, LedgerKind::Despesa), Decimal::new(30, 0));
    }

    #[test]
    fn month_prefix_narrows_the_window() {
        let rows = vec![
            entry("receita", "10", "2025-11-01"),
            entry("receita", "20", "2025-12-01"),
            entry("receita", "30", "2024-11-01"),
        ];
        let month = listing::select(
            &rows,
            |row| row.entry_date.clone(),
            |row| row.entry_date.starts_with("2025-11"),
        );
        assert_eq!(month.len(), 1);

        let year = listing::select(
            &rows,
            |row| row.entry_date.clone(),
            |row| row.entry_date.starts_with("2025"),
        );
        assert_eq!(year.len(), 2);
    }

    #[test]
    fn past_due_requires_a_date_before_today() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        assert!(past_due("2025-11-19", today));
        assert!(!past_due("2025-11-20", today));
        assert!(!past_due("2025-11-21", today));
        assert!(!past_due("garbage", today));
    }
}
