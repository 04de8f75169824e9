use actix_web::{http::header, web, HttpResponse, Result};
use askama::Template;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    auth::{new_id, AuthUser},
    db::{self, log_activity},
    filters,
    format::whatsapp_link,
    listing,
    models::{ChargeRow, EstablishmentRow, MessageLogRow, MessageStatus},
    query::{MessagesFilter, MessagesQuery},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct MessageView {
    client_name: String,
    channel: String,
    body: String,
    status: String,
    sent_at: String,
}

#[derive(Clone, Debug)]
struct StatusOption {
    value: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "messages.html")]
struct MessagesTemplate {
    term: String,
    status_filter: String,
    date_from: String,
    statuses: Vec<StatusOption>,
    messages: Vec<MessageView>,
    total: usize,
    page: usize,
    page_count: usize,
    prev_href: String,
    next_href: String,
    has_prev: bool,
    has_next: bool,
    fetch_error: String,
    has_fetch_error: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CollectionTier {
    M1,
    M3,
    M3Plus,
}

impl CollectionTier {
    fn for_delay(delay_days: i64) -> Self {
        if delay_days > 90 {
            CollectionTier::M3Plus
        } else if delay_days > 30 {
            CollectionTier::M3
        } else {
            CollectionTier::M1
        }
    }

    fn label(self) -> &'static str {
        match self {
            CollectionTier::M1 => "Até 30 dias",
            CollectionTier::M3 => "31 a 90 dias",
            CollectionTier::M3Plus => "Mais de 90 dias",
        }
    }

    fn message(self, client_name: &str, amount: &str, due_date: &str) -> String {
        let amount = filters::brl(amount).unwrap_or_else(|_| amount.to_string());
        let due = filters::br_date(due_date).unwrap_or_else(|_| due_date.to_string());
        match self {
            CollectionTier::M1 => format!(
                "Olá {client_name}, tudo bem? Passando para lembrar do pagamento de {amount} \
                 com vencimento em {due}. Qualquer dúvida estamos à disposição!"
            ),
            CollectionTier::M3 => format!(
                "Olá {client_name}, o pagamento de {amount}, vencido em {due}, ainda consta \
                 em aberto. Podemos combinar a regularização?"
            ),
            CollectionTier::M3Plus => format!(
                "Olá {client_name}, o pagamento de {amount}, vencido em {due}, está em aberto \
                 há mais de 90 dias. Por favor, entre em contato para regularizarmos."
            ),
        }
    }
}

#[derive(Clone, Debug)]
struct ChargeView {
    id: String,
    client_name: String,
    amount: String,
    due_date: String,
    delay_days: i64,
    tier: String,
    preview: String,
    has_phone: bool,
}

#[derive(Clone, Debug)]
struct CollectionBucket {
    label: String,
    charges: Vec<ChargeView>,
    total: usize,
}

#[derive(Clone, Debug)]
struct ClientOption {
    id: String,
    name: String,
}

#[derive(Clone, Debug, Default)]
struct ChargeFormView {
    client_id: String,
    amount: String,
    due_date: String,
}

#[derive(Template)]
#[template(path = "collections.html")]
struct CollectionsTemplate {
    buckets: Vec<CollectionBucket>,
    clients: Vec<ClientOption>,
    form: ChargeFormView,
    errors: Vec<String>,
    fetch_error: String,
    has_fetch_error: bool,
}

#[derive(Deserialize)]
struct ChargeForm {
    client_id: String,
    amount: String,
    due_date: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/messages/collections")
            .route(web::get().to(collections_page))
            .route(web::post().to(create_charge)),
    )
    .service(web::resource("/messages/collections/{id}/send").route(web::post().to(send_charge)))
    .service(
        web::resource("/messages/collections/{id}/settle").route(web::post().to(settle_charge)),
    )
    .service(web::resource("/messages").route(web::get().to(messages_page)));
}

async fn messages_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<MessagesQuery>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let filter = MessagesFilter::from_query(&query);

    let fetch = sqlx::query_as::<_, MessageLogRow>(
        r#"SELECT id, establishment_id, client_name, channel, body, status, created_at
           FROM message_log
           WHERE establishment_id = ?"#,
    )
    .bind(&establishment.id)
    .fetch_all(&state.db)
    .await;

    let (rows, fetch_error) = match fetch {
        Ok(rows) => (rows, String::new()),
        Err(err) => {
            log::error!("Failed to load message log: {err}");
            (
                Vec::new(),
                "Não foi possível carregar as mensagens.".to_string(),
            )
        }
    };

    let selected = listing::select(
        &rows,
        |row| row.created_at.clone(),
        |row| {
            listing::status_matches(&row.status, &filter.status)
                && listing::text_matches(&filter.term, [row.client_name.as_str(), row.body.as_str()])
                && sent_on_or_after(&row.created_at, filter.date_from)
        },
    );

    let total = selected.len();
    let page_count = listing::page_count(total);
    let page = listing::clamp_page(filter.page, total);
    let messages = listing::paginate(&selected, page)
        .iter()
        .map(|row| to_view(row))
        .collect();

    let statuses = MessageStatus::ALL
        .iter()
        .map(|status| StatusOption {
            value: status.as_str().to_string(),
            selected: filter.status == status.as_str(),
        })
        .collect();

    Ok(render(MessagesTemplate {
        term: filter.term.clone(),
        status_filter: filter.status.clone(),
        date_from: filter
            .date_from
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        statuses,
        messages,
        total,
        page,
        page_count,
        prev_href: format!(
            "/dashboard/messages{}",
            filter.query_string_for_page(page.saturating_sub(1).max(1))
        ),
        next_href: format!(
            "/dashboard/messages{}",
            filter.query_string_for_page((page + 1).min(page_count))
        ),
        has_prev: page > 1,
        has_next: page < page_count,
        fetch_error: fetch_error.clone(),
        has_fetch_error: !fetch_error.is_empty(),
    }))
}

/// Matches when the record's send date falls on or after the cutoff. Records
/// with an unreadable timestamp are kept rather than silently hidden.
fn sent_on_or_after(created_at: &str, cutoff: Option<NaiveDate>) -> bool {
    let Some(cutoff) = cutoff else {
        return true;
    };
    match DateTime::parse_from_rfc3339(created_at) {
        Ok(sent) => sent.date_naive() >= cutoff,
        Err(_) => true,
    }
}

fn to_view(row: &MessageLogRow) -> MessageView {
    let sent_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map(|sent| sent.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|_| row.created_at.clone());

    MessageView {
        client_name: row.client_name.clone(),
        channel: row.channel.clone(),
        body: row.body.clone(),
        status: row.status.clone(),
        sent_at,
    }
}

async fn collections_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    Ok(render_collections(&state, &establishment, Vec::new(), ChargeFormView::default()).await)
}

async fn render_collections(
    state: &web::Data<AppState>,
    establishment: &EstablishmentRow,
    errors: Vec<String>,
    form: ChargeFormView,
) -> HttpResponse {
    let (rows, fetch_error) = match fetch_open_charges(state, &establishment.id).await {
        Ok(rows) => (rows, String::new()),
        Err(err) => {
            log::error!("Failed to load charges: {err}");
            (
                Vec::new(),
                "Não foi possível carregar as cobranças.".to_string(),
            )
        }
    };

    let today = Utc::now().date_naive();
    let buckets = bucket_charges(&rows, today);

    let clients = sqlx::query_as::<_, (String, String)>(
        "SELECT id, name FROM clients WHERE establishment_id = ? ORDER BY name",
    )
    .bind(&establishment.id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default()
    .into_iter()
    .map(|(id, name)| ClientOption { id, name })
    .collect();

    render(CollectionsTemplate {
        buckets,
        clients,
        form,
        errors,
        fetch_error: fetch_error.clone(),
        has_fetch_error: !fetch_error.is_empty(),
    })
}

async fn create_charge(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ChargeForm>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let mut errors = Vec::new();

    let client = sqlx::query_as::<_, (String, String)>(
        "SELECT id, name FROM clients WHERE id = ? AND establishment_id = ? LIMIT 1",
    )
    .bind(form.client_id.trim())
    .bind(&establishment.id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);
    if client.is_none() {
        errors.push("Selecione um cliente.".to_string());
    }

    let amount = match form.amount.trim().parse::<Decimal>() {
        Ok(amount) if !amount.is_sign_negative() => amount,
        _ => {
            errors.push("Valor inválido.".to_string());
            Decimal::ZERO
        }
    };

    let due_date = form.due_date.trim().to_string();
    if crate::query::parse_optional_date(Some(&due_date)).is_none() {
        errors.push("Data de vencimento inválida.".to_string());
    }

    if !errors.is_empty() {
        let view = ChargeFormView {
            client_id: form.client_id.trim().to_string(),
            amount: form.amount.trim().to_string(),
            due_date,
        };
        return Ok(render_collections(&state, &establishment, errors, view).await);
    }

    let (client_id, client_name) = client.unwrap_or_default();

    let insert = sqlx::query(
        r#"INSERT INTO charges (id, establishment_id, client_id, amount, due_date, settled, created_at)
           VALUES (?, ?, ?, ?, ?, 0, ?)"#,
    )
    .bind(new_id())
    .bind(&establishment.id)
    .bind(&client_id)
    .bind(amount.round_dp(2).to_string())
    .bind(&due_date)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        log::error!("Failed to create charge: {err}");
        return Ok(render_collections(
            &state,
            &establishment,
            vec!["Não foi possível salvar a cobrança.".to_string()],
            ChargeFormView::default(),
        )
        .await);
    }

    log_activity(
        &state.db,
        "charge_created",
        &format!("Cobrança criada para {client_name}."),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    Ok(redirect_to_collections())
}

async fn settle_charge(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let charge_id = path.into_inner();
    let update = sqlx::query(
        "UPDATE charges SET settled = 1 WHERE id = ? AND establishment_id = ?",
    )
    .bind(&charge_id)
    .bind(&establishment.id)
    .execute(&state.db)
    .await;

    match update {
        Ok(_) => {
            log_activity(
                &state.db,
                "charge_settled",
                "Cobrança marcada como paga.",
                Some(&auth.id),
                Some(&establishment.id),
            )
            .await;
        }
        Err(err) => log::error!("Failed to settle charge: {err}"),
    }

    Ok(redirect_to_collections())
}

async fn fetch_open_charges(
    state: &web::Data<AppState>,
    establishment_id: &str,
) -> Result<Vec<ChargeRow>, sqlx::Error> {
    sqlx::query_as::<_, ChargeRow>(
        r#"SELECT ch.id, ch.establishment_id, ch.client_id, cl.name AS client_name,
                  cl.phone AS client_phone, ch.amount, ch.due_date, ch.settled, ch.created_at
           FROM charges ch
           JOIN clients cl ON cl.id = ch.client_id
           WHERE ch.establishment_id = ? AND ch.settled = 0"#,
    )
    .bind(establishment_id)
    .fetch_all(&state.db)
    .await
}

fn bucket_charges(rows: &[ChargeRow], today: NaiveDate) -> Vec<CollectionBucket> {
    let tiers = [
        CollectionTier::M1,
        CollectionTier::M3,
        CollectionTier::M3Plus,
    ];

    tiers
        .into_iter()
        .map(|tier| {
            let selected = listing::select(
                rows,
                |row| format!("{} {}", row.due_date, row.client_name),
                |row| match delay_days(&row.due_date, today) {
                    Some(delay) if delay > 0 => CollectionTier::for_delay(delay) == tier,
                    _ => false,
                },
            );
            let charges: Vec<ChargeView> = selected
                .into_iter()
                .map(|row| {
                    let delay = delay_days(&row.due_date, today).unwrap_or(0);
                    ChargeView {
                        id: row.id.clone(),
                        client_name: row.client_name.clone(),
                        amount: row.amount.clone(),
                        due_date: row.due_date.clone(),
                        delay_days: delay,
                        tier: tier.label().to_string(),
                        preview: tier.message(&row.client_name, &row.amount, &row.due_date),
                        has_phone: !crate::format::digits(&row.client_phone).is_empty(),
                    }
                })
                .collect();
            CollectionBucket {
                label: tier.label().to_string(),
                total: charges.len(),
                charges,
            }
        })
        .collect()
}

fn delay_days(due_date: &str, today: NaiveDate) -> Option<i64> {
    let due = NaiveDate::parse_from_str(due_date, "%Y-%m-%d").ok()?;
    Some((today - due).num_days())
}

async fn send_charge(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let charge_id = path.into_inner();
    let charge = sqlx::query_as::<_, ChargeRow>(
        r#"SELECT ch.id, ch.establishment_id, ch.client_id, cl.name AS client_name,
                  cl.phone AS client_phone, ch.amount, ch.due_date, ch.settled, ch.created_at
           FROM charges ch
           JOIN clients cl ON cl.id = ch.client_id
           WHERE ch.id = ? AND ch.establishment_id = ? AND ch.settled = 0
           LIMIT 1"#,
    )
    .bind(&charge_id)
    .bind(&establishment.id)
    .fetch_optional(&state.db)
    .await;

    let charge = match charge {
        Ok(Some(charge)) => charge,
        Ok(None) => return Ok(redirect_to_collections()),
        Err(err) => {
            log::error!("Failed to load charge: {err}");
            return Ok(redirect_to_collections());
        }
    };

    let today = Utc::now().date_naive();
    let tier = CollectionTier::for_delay(delay_days(&charge.due_date, today).unwrap_or(0));
    let body = tier.message(&charge.client_name, &charge.amount, &charge.due_date);

    let insert = sqlx::query(
        r#"INSERT INTO message_log (id, establishment_id, client_name, channel, body, status, created_at)
           VALUES (?, ?, ?, 'whatsapp', ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(&establishment.id)
    .bind(&charge.client_name)
    .bind(&body)
    .bind(MessageStatus::Enviado.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        log::error!("Failed to record outgoing message: {err}");
    }

    log_activity(
        &state.db,
        "charge_message_sent",
        &format!("Cobrança enviada para {}.", charge.client_name),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, whatsapp_link(&charge.client_phone, &body)))
        .finish())
}

fn redirect_to_collections() -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/dashboard/messages/collections"))
        .finish()
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

    fn charge(id: &str, due: &str) -> ChargeRow {
        ChargeRow {
            id: id.to_string(),
            establishment_id: "e1".to_string(),
            client_id: "c1".to_string(),
            client_name: "Ana Silva".to_string(),
            client_phone: "(11) 98765-4321".to_string(),
            amount: "150.00".to_string(),
            due_date: due.to_string(),
            settled: 0,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
    }

    #[test]
    fn tiers_split_on_thirty_and_ninety_days() {
        assert_eq!(CollectionTier::for_delay(1), CollectionTier::M1);
        assert_eq!(CollectionTier::for_delay(30), CollectionTier::M1);
        assert_eq!(CollectionTier::for_delay(31), CollectionTier::M3);
        assert_eq!(CollectionTier::for_delay(90), CollectionTier::M3);
        assert_eq!(CollectionTier::for_delay(91), CollectionTier::M3Plus);
    }

    #[test]
    fn buckets_skip_charges_not_yet_due() {
        let rows = vec![
            charge("a", "2025-11-25"),
            charge("b", "2025-11-10"),
            charge("c", "2025-08-01"),
            charge("d", "2025-01-01"),
        ];
        let buckets = bucket_charges(&rows, today());
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].total, 1);
        assert_eq!(buckets[0].charges[0].id, "b");
        assert_eq!(buckets[1].total, 1);
        assert_eq!(buckets[1].charges[0].id, "c");
        assert_eq!(buckets[2].total, 1);
        assert_eq!(buckets[2].charges[0].id, "d");
    }

    #[test]
    fn tier_message_carries_amount_and_date() {
        let body = CollectionTier::M1.message("Ana", "150.00", "2025-11-10");
        assert!(body.contains("R$ 150,00"));
        assert!(body.contains("10/11/2025"));
    }

    #[test]
    fn date_cutoff_keeps_later_and_unreadable_timestamps() {
        let cutoff = NaiveDate::from_ymd_opt(2025, 10, 1);
        assert!(sent_on_or_after("2025-10-01T08:00:00Z", cutoff));
        assert!(sent_on_or_after("2025-12-25T08:00:00Z", cutoff));
        assert!(!sent_on_or_after("2025-09-30T23:59:59Z", cutoff));
        assert!(sent_on_or_after("not a timestamp", cutoff));
        assert!(sent_on_or_after("2020-01-01T00:00:00Z", None));
    }
}
