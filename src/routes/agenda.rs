use actix_web::{http::header, web, HttpResponse, Result};
use askama::Template;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

use crate::{
    auth::{new_id, AuthUser},
    db::{self, fetch_appointment_event, log_activity},
    listing::{self, ViewMode},
    models::{AppointmentRow, AppointmentStatus, EstablishmentRow, STATUS_ALL},
    query::{AgendaFilter, AgendaQuery},
    state::{AppState, ServerEvent},
    templates::render,
};

#[derive(Clone, Debug)]
struct AppointmentView {
    id: String,
    title: String,
    date: String,
    time: String,
    status: String,
    description: String,
    has_description: bool,
    toggle_label: String,
}

#[derive(Clone, Debug)]
struct DayLink {
    day: u32,
    href: String,
    selected: bool,
}

#[derive(Clone, Debug)]
struct StatusOption {
    value: String,
    selected: bool,
}

#[derive(Clone, Debug, Default)]
struct AppointmentFormView {
    title: String,
    date: String,
    time: String,
    description: String,
}

#[derive(Template)]
#[template(path = "agenda.html")]
struct AgendaTemplate {
    date: String,
    today: String,
    mode: String,
    month_label: String,
    status_filter: String,
    filter_statuses: Vec<StatusOption>,
    form_statuses: Vec<StatusOption>,
    day_links: Vec<DayLink>,
    day_href: String,
    month_href: String,
    appointments: Vec<AppointmentView>,
    form: AppointmentFormView,
    errors: Vec<String>,
    fetch_error: String,
    has_fetch_error: bool,
}

#[derive(Deserialize)]
struct AppointmentCreateForm {
    title: String,
    date: String,
    time: String,
    status: Option<String>,
    description: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/agenda").route(web::get().to(agenda_page)))
        .service(web::resource("/agenda/appointments").route(web::post().to(create_appointment)))
        .service(
            web::resource("/agenda/appointments/{id}/toggle").route(web::post().to(toggle_status)),
        )
        .service(
            web::resource("/agenda/appointments/{id}/delete")
                .route(web::post().to(delete_appointment)),
        );
}

async fn agenda_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<AgendaQuery>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let today = Utc::now().date_naive();
    let filter = AgendaFilter::from_query(&query, today);
    Ok(render_agenda(
        &state,
        &establishment,
        &filter,
        Vec::new(),
        AppointmentFormView::default(),
    )
    .await)
}

async fn render_agenda(
    state: &web::Data<AppState>,
    establishment: &EstablishmentRow,
    filter: &AgendaFilter,
    errors: Vec<String>,
    form: AppointmentFormView,
) -> HttpResponse {
    let today = Utc::now().date_naive();

    let fetch = sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, establishment_id, title, date, time, status, description, created_at
           FROM appointments
           WHERE establishment_id = ?"#,
    )
    .bind(&establishment.id)
    .fetch_all(&state.db)
    .await;

    let (rows, fetch_error) = match fetch {
        Ok(rows) => (rows, String::new()),
        Err(err) => {
            log::error!("Failed to load appointments: {err}");
            (
                Vec::new(),
                "Não foi possível carregar os agendamentos.".to_string(),
            )
        }
    };

    let selected_date = filter.date.format("%Y-%m-%d").to_string();
    let selected = listing::select(
        &rows,
        |row| format!("{} {}", row.date, row.time),
        |row| {
            listing::date_matches(filter.mode, &row.date, &selected_date)
                && listing::status_matches(&row.status, &filter.status)
        },
    );

    let appointments = selected.into_iter().cloned().map(to_view).collect();

    let day_links = month_day_links(filter, today);
    let filter_statuses = status_options(&filter.status, true);
    let form_statuses = status_options(AppointmentStatus::Pendente.as_str(), false);

    let day_href = format!(
        "/dashboard/agenda{}",
        AgendaFilter {
            mode: ViewMode::Day,
            ..filter.clone()
        }
        .query_string(today)
    );
    let month_href = format!(
        "/dashboard/agenda{}",
        AgendaFilter {
            mode: ViewMode::Month,
            ..filter.clone()
        }
        .query_string(today)
    );

    render(AgendaTemplate {
        date: selected_date,
        today: today.format("%Y-%m-%d").to_string(),
        mode: filter.mode.as_str().to_string(),
        month_label: filter.date.format("%m/%Y").to_string(),
        status_filter: filter.status.clone(),
        filter_statuses,
        form_statuses,
        day_links,
        day_href,
        month_href,
        appointments,
        form,
        errors,
        has_fetch_error: !fetch_error.is_empty(),
        fetch_error,
    })
}

async fn create_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<AppointmentCreateForm>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let form = form.into_inner();
    let today = Utc::now().date_naive();

    let mut errors = Vec::new();
    if form.title.trim().is_empty() {
        errors.push("O título é obrigatório.".to_string());
    }
    let date = NaiveDate::parse_from_str(form.date.trim(), "%Y-%m-%d");
    if date.is_err() {
        errors.push("Informe uma data válida.".to_string());
    }
    if !is_valid_time(form.time.trim()) {
        errors.push("Informe um horário válido (HH:MM).".to_string());
    }
    let status = form
        .status
        .as_deref()
        .and_then(AppointmentStatus::parse)
        .unwrap_or(AppointmentStatus::Pendente);

    if !errors.is_empty() {
        let filter = AgendaFilter::from_query(&AgendaQuery::default(), today);
        return Ok(render_agenda(
            &state,
            &establishment,
            &filter,
            errors,
            AppointmentFormView {
                title: form.title,
                date: form.date,
                time: form.time,
                description: form.description.unwrap_or_default(),
            },
        )
        .await);
    }

    let appointment_id = new_id();
    let date = date.unwrap_or(today);
    let date_text = date.format("%Y-%m-%d").to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO appointments (id, establishment_id, title, date, time, status, description, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&appointment_id)
    .bind(&establishment.id)
    .bind(form.title.trim())
    .bind(&date_text)
    .bind(form.time.trim())
    .bind(status.as_str())
    .bind(form.description.as_deref().map(str::trim))
    .bind(now)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "appointment_created",
        &format!("{} criou o agendamento {}.", auth.display_name, form.title.trim()),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    if let Some(row) = fetch_appointment_event(&state.db, &appointment_id).await {
        let _ = state
            .events
            .send(ServerEvent::from_row("appointment_created", row));
    }

    Ok(redirect_to_day(date, today))
}

async fn toggle_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let appointment_id = path.into_inner();
    let current = sqlx::query_as::<_, (String, String)>(
        "SELECT status, date FROM appointments WHERE id = ? AND establishment_id = ?",
    )
    .bind(&appointment_id)
    .bind(&establishment.id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);

    let (status, date_text) = match current {
        Some(row) => row,
        None => return Ok(HttpResponse::NotFound().body("Agendamento não encontrado")),
    };

    let next = AppointmentStatus::parse(&status)
        .unwrap_or(AppointmentStatus::Pendente)
        .toggled();

    sqlx::query("UPDATE appointments SET status = ? WHERE id = ? AND establishment_id = ?")
        .bind(next.as_str())
        .bind(&appointment_id)
        .bind(&establishment.id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "appointment_toggled",
        &format!(
            "{} marcou o agendamento {} como {}.",
            auth.display_name,
            appointment_id,
            next.as_str()
        ),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    if let Some(row) = fetch_appointment_event(&state.db, &appointment_id).await {
        let _ = state
            .events
            .send(ServerEvent::from_row("appointment_updated", row));
    }

    let today = Utc::now().date_naive();
    let date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").unwrap_or(today);
    Ok(redirect_to_day(date, today))
}

async fn delete_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let appointment_id = path.into_inner();
    let existing = sqlx::query_as::<_, (String,)>(
        "SELECT date FROM appointments WHERE id = ? AND establishment_id = ?",
    )
    .bind(&appointment_id)
    .bind(&establishment.id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);

    let (date_text,) = match existing {
        Some(row) => row,
        None => return Ok(HttpResponse::NotFound().body("Agendamento não encontrado")),
    };

    sqlx::query("DELETE FROM appointments WHERE id = ? AND establishment_id = ?")
        .bind(&appointment_id)
        .bind(&establishment.id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "appointment_deleted",
        &format!("{} excluiu o agendamento {}.", auth.display_name, appointment_id),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    let _ = state.events.send(ServerEvent::deleted(&appointment_id));

    let today = Utc::now().date_naive();
    let date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").unwrap_or(today);
    Ok(redirect_to_day(date, today))
}

async fn resolve_establishment(
    state: &web::Data<AppState>,
    auth: &AuthUser,
) -> std::result::Result<EstablishmentRow, HttpResponse> {
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

fn redirect_to_day(date: NaiveDate, today: NaiveDate) -> HttpResponse {
    let filter = AgendaFilter {
        date,
        mode: ViewMode::Day,
        status: STATUS_ALL.to_string(),
    };
    HttpResponse::SeeOther()
        .append_header((
            header::LOCATION,
            format!("/dashboard/agenda{}", filter.query_string(today)),
        ))
        .finish()
}

/// One link per day of the selected month. These are plain anchors so a day
/// click lands in the browser history, unlike silent filter edits.
fn month_day_links(filter: &AgendaFilter, today: NaiveDate) -> Vec<DayLink> {
    let year = filter.date.year();
    let month = filter.date.month();
    let mut links = Vec::new();
    for day in 1..=31u32 {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            break;
        };
        let target = AgendaFilter {
            mode: ViewMode::Day,
            ..filter.for_date(date)
        };
        links.push(DayLink {
            day,
            href: format!("/dashboard/agenda{}", target.query_string(today)),
            selected: date == filter.date,
        });
    }
    links
}

fn status_options(selected: &str, include_all: bool) -> Vec<StatusOption> {
    let mut options = Vec::new();
    if include_all {
        options.push(StatusOption {
            value: STATUS_ALL.to_string(),
            selected: selected == STATUS_ALL,
        });
    }
    for status in AppointmentStatus::ALL {
        options.push(StatusOption {
            value: status.as_str().to_string(),
            selected: selected == status.as_str(),
        });
    }
    options
}

fn is_valid_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let (hour, minute) = (&value[0..2], &value[3..5]);
    let Ok(hour) = hour.parse::<u8>() else {
        return false;
    };
    let Ok(minute) = minute.parse::<u8>() else {
        return false;
    };
    hour < 24 && minute < 60
}

fn to_view(row: AppointmentRow) -> AppointmentView {
    let description = row.description.unwrap_or_default();
    let toggle_label = if row.status == AppointmentStatus::Realizado.as_str() {
        "Reabrir".to_string()
    } else {
        "Concluir".to_string()
    };
    AppointmentView {
        id: row.id,
        title: row.title,
        date: row.date,
        time: row.time,
        status: row.status,
        description: description.clone(),
        has_description: !description.trim().is_empty(),
        toggle_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_validation_accepts_only_hh_mm() {
        assert!(is_valid_time("09:30"));
        assert!(is_valid_time("23:59"));
        assert!(!is_valid_time("24:00"));
        assert!(!is_valid_time("9:30"));
        assert!(!is_valid_time("09-30"));
        assert!(!is_valid_time(""));
    }

    #[test]
    fn month_day_links_cover_the_whole_month() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        let filter = AgendaFilter {
            date: today,
            mode: ViewMode::Month,
            status: STATUS_ALL.to_string(),
        };
        let links = month_day_links(&filter, today);
        assert_eq!(links.len(), 30);
        assert!(links[19].selected);
        // today itself serializes to the bare path
        assert_eq!(links[19].href, "/dashboard/agenda");
        assert_eq!(links[20].href, "/dashboard/agenda?date=2025-11-21");
    }
}
