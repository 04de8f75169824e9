use actix_web::{http::header, web, HttpResponse, Result};
use askama::Template;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    auth::{new_id, AuthUser},
    db::{self, log_activity},
    filters,
    listing,
    models::{EstablishmentRow, ServiceRow},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct ServiceView {
    id: String,
    name: String,
    price: String,
    duration_minutes: i64,
    active: bool,
    toggle_label: String,
}

#[derive(Clone, Debug, Default)]
struct ServiceFormView {
    id: String,
    name: String,
    price: String,
    duration_minutes: String,
}

#[derive(Template)]
#[template(path = "services.html")]
struct ServicesTemplate {
    services: Vec<ServiceView>,
    form: ServiceFormView,
    errors: Vec<String>,
    fetch_error: String,
    has_fetch_error: bool,
}

#[derive(Template)]
#[template(path = "service_form.html")]
struct ServiceFormTemplate {
    form: ServiceFormView,
    errors: Vec<String>,
}

#[derive(Deserialize)]
struct ServiceForm {
    name: String,
    price: Option<String>,
    duration_minutes: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/services").route(web::get().to(services_page)))
        .service(web::resource("/services/new").route(web::post().to(create_service)))
        .service(web::resource("/services/{id}/toggle").route(web::post().to(toggle_service)))
        .service(web::resource("/services/{id}/delete").route(web::post().to(delete_service)))
        .service(
            web::resource("/services/{id}")
                .route(web::get().to(edit_service_page))
                .route(web::post().to(update_service)),
        );
}

async fn services_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    Ok(render_services(&state, &establishment, Vec::new(), ServiceFormView::default()).await)
}

async fn render_services(
    state: &web::Data<AppState>,
    establishment: &EstablishmentRow,
    errors: Vec<String>,
    form: ServiceFormView,
) -> HttpResponse {
    let fetch = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, establishment_id, name, price, duration_minutes, active, created_at
           FROM services
           WHERE establishment_id = ?"#,
    )
    .bind(&establishment.id)
    .fetch_all(&state.db)
    .await;

    let (rows, fetch_error) = match fetch {
        Ok(rows) => (rows, String::new()),
        Err(err) => {
            log::error!("Failed to load services: {err}");
            (
                Vec::new(),
                "Não foi possível carregar os serviços.".to_string(),
            )
        }
    };

    let selected = listing::select(&rows, |row| row.name.clone(), |_| true);
    let services = selected.into_iter().map(to_view).collect();

    render(ServicesTemplate {
        services,
        form,
        errors,
        fetch_error: fetch_error.clone(),
        has_fetch_error: !fetch_error.is_empty(),
    })
}

fn to_view(row: &ServiceRow) -> ServiceView {
    ServiceView {
        id: row.id.clone(),
        name: row.name.clone(),
        price: row.price.clone(),
        duration_minutes: row.duration_minutes,
        active: row.active != 0,
        toggle_label: if row.active != 0 {
            "Desativar".to_string()
        } else {
            "Ativar".to_string()
        },
    }
}

async fn create_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ServiceForm>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let mut errors = Vec::new();

    let name = form.name.trim().to_string();
    if name.is_empty() {
        errors.push("Informe o nome do serviço.".to_string());
    }

    let raw_price = form.price.clone().unwrap_or_default();
    let price = match parse_price(&raw_price) {
        Some(price) => price,
        None => {
            errors.push("Preço inválido.".to_string());
            Decimal::ZERO
        }
    };

    let raw_duration = form.duration_minutes.clone().unwrap_or_default();
    let duration_minutes = match parse_duration(&raw_duration) {
        Some(minutes) => minutes,
        None => {
            errors.push("Duração inválida.".to_string());
            0
        }
    };

    if !errors.is_empty() {
        let view = ServiceFormView {
            id: String::new(),
            name,
            price: raw_price.trim().to_string(),
            duration_minutes: raw_duration.trim().to_string(),
        };
        return Ok(render_services(&state, &establishment, errors, view).await);
    }

    let insert = sqlx::query(
        r#"INSERT INTO services (id, establishment_id, name, price, duration_minutes, active, created_at)
           VALUES (?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(&establishment.id)
    .bind(&name)
    .bind(price.round_dp(2).to_string())
    .bind(duration_minutes)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        log::error!("Failed to create service: {err}");
        return Ok(render_services(
            &state,
            &establishment,
            vec!["Não foi possível salvar o serviço.".to_string()],
            ServiceFormView {
                id: String::new(),
                name,
                price: raw_price,
                duration_minutes: raw_duration,
            },
        )
        .await);
    }

    log_activity(
        &state.db,
        "service_created",
        &format!("Serviço {name} cadastrado."),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    Ok(redirect_to_list())
}

async fn edit_service_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let service_id = path.into_inner();
    let Some(row) = fetch_service(&state, &establishment.id, &service_id).await else {
        return Ok(redirect_to_list());
    };

    Ok(render(ServiceFormTemplate {
        form: ServiceFormView {
            id: row.id,
            name: row.name,
            price: row.price,
            duration_minutes: row.duration_minutes.to_string(),
        },
        errors: Vec::new(),
    }))
}

async fn update_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<ServiceForm>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let service_id = path.into_inner();
    if fetch_service(&state, &establishment.id, &service_id)
        .await
        .is_none()
    {
        return Ok(redirect_to_list());
    }

    let mut errors = Vec::new();

    let name = form.name.trim().to_string();
    if name.is_empty() {
        errors.push("Informe o nome do serviço.".to_string());
    }

    let raw_price = form.price.clone().unwrap_or_default();
    let price = match parse_price(&raw_price) {
        Some(price) => price,
        None => {
            errors.push("Preço inválido.".to_string());
            Decimal::ZERO
        }
    };

    let raw_duration = form.duration_minutes.clone().unwrap_or_default();
    let duration_minutes = match parse_duration(&raw_duration) {
        Some(minutes) => minutes,
        None => {
            errors.push("Duração inválida.".to_string());
            0
        }
    };

    let view = ServiceFormView {
        id: service_id.clone(),
        name: name.clone(),
        price: raw_price.trim().to_string(),
        duration_minutes: raw_duration.trim().to_string(),
    };

    if !errors.is_empty() {
        return Ok(render(ServiceFormTemplate { form: view, errors }));
    }

    let update = sqlx::query(
        r#"UPDATE services
           SET name = ?, price = ?, duration_minutes = ?
           WHERE id = ? AND establishment_id = ?"#,
    )
    .bind(&name)
    .bind(price.round_dp(2).to_string())
    .bind(duration_minutes)
    .bind(&service_id)
    .bind(&establishment.id)
    .execute(&state.db)
    .await;

    if let Err(err) = update {
        log::error!("Failed to update service: {err}");
        return Ok(render(ServiceFormTemplate {
            form: view,
            errors: vec!["Não foi possível salvar o serviço.".to_string()],
        }));
    }

    log_activity(
        &state.db,
        "service_updated",
        &format!("Serviço {name} atualizado."),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    Ok(redirect_to_list())
}

async fn fetch_service(
    state: &web::Data<AppState>,
    establishment_id: &str,
    service_id: &str,
) -> Option<ServiceRow> {
    sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, establishment_id, name, price, duration_minutes, active, created_at
           FROM services
           WHERE id = ? AND establishment_id = ?"#,
    )
    .bind(service_id)
    .bind(establishment_id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None)
}

async fn toggle_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let service_id = path.into_inner();
    let result = sqlx::query(
        r#"UPDATE services
           SET active = CASE active WHEN 0 THEN 1 ELSE 0 END
           WHERE id = ? AND establishment_id = ?"#,
    )
    .bind(&service_id)
    .bind(&establishment.id)
    .execute(&state.db)
    .await;

    if let Err(err) = result {
        log::error!("Failed to toggle service: {err}");
    }

    Ok(redirect_to_list())
}

async fn delete_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let service_id = path.into_inner();
    let delete = sqlx::query("DELETE FROM services WHERE id = ? AND establishment_id = ?")
        .bind(&service_id)
        .bind(&establishment.id)
        .execute(&state.db)
        .await;

    match delete {
        Ok(_) => {
            log_activity(
                &state.db,
                "service_deleted",
                "Serviço removido.",
                Some(&auth.id),
                Some(&establishment.id),
            )
            .await;
        }
        Err(err) => log::error!("Failed to delete service: {err}"),
    }

    Ok(redirect_to_list())
}

/// Accepts both `12.50` and the Brazilian `12,50` shape.
fn parse_price(raw: &str) -> Option<Decimal> {
    let normalized = raw.trim().replace('.', "").replace(',', ".");
    let candidate = if raw.contains(',') {
        normalized
    } else {
        raw.trim().to_string()
    };
    if candidate.is_empty() {
        return Some(Decimal::ZERO);
    }
    candidate
        .parse::<Decimal>()
        .ok()
        .filter(|price| !price.is_sign_negative())
}

fn parse_duration(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    trimmed.parse::<i64>().ok().filter(|minutes| *minutes >= 0)
}

fn redirect_to_list() -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/dashboard/services"))
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

    #[test]
    fn price_accepts_both_decimal_separators() {
        assert_eq!(parse_price("12.50"), Some(Decimal::new(1250, 2)));
        assert_eq!(parse_price("12,50"), Some(Decimal::new(1250, 2)));
        assert_eq!(parse_price("1.234,50"), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_price(""), Some(Decimal::ZERO));
        assert_eq!(parse_price("-5"), None);
        assert_eq!(parse_price("abc"), None);
    }

    #[test]
    fn duration_rejects_negatives_and_garbage() {
        assert_eq!(parse_duration("45"), Some(45));
        assert_eq!(parse_duration(""), Some(0));
        assert_eq!(parse_duration("-10"), None);
        assert_eq!(parse_duration("uma hora"), None);
    }
}
