use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;

use crate::{
    auth::{logout_guard, owner_validator, AuthUser},
    db,
    models::ActivityRow,
    routes::{agenda, clients, messages, profile, reports, services},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct StatCard {
    label: String,
    value: i64,
}

#[derive(Clone, Debug)]
struct ActivityView {
    message: String,
    created_at: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    owner_name: String,
    stats: Vec<StatCard>,
    activities: Vec<ActivityView>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/dashboard")
            .wrap(HttpAuthentication::basic(owner_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(overview)))
            .service(web::resource("/").route(web::get().to(overview)))
            .configure(agenda::configure)
            .configure(clients::configure)
            .configure(services::configure)
            .configure(messages::configure)
            .configure(reports::configure)
            .configure(profile::configure),
    );
}

async fn overview(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let establishment = match db::find_establishment(&state.db, &auth.id).await {
        Ok(Some(establishment)) => establishment,
        Ok(None) => {
            return Ok(HttpResponse::SeeOther()
                .append_header((header::LOCATION, "/dashboard/profile"))
                .finish());
        }
        Err(err) => {
            log::error!("Failed to resolve establishment: {err}");
            return Ok(HttpResponse::InternalServerError().finish());
        }
    };

    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let clients = count("SELECT COUNT(*) FROM clients WHERE establishment_id = ?", &state)
        .bind(&establishment.id)
        .run()
        .await;
    let today_appointments = count(
        "SELECT COUNT(*) FROM appointments WHERE establishment_id = ? AND date = ?",
        &state,
    )
    .bind(&establishment.id)
    .bind(&today)
    .run()
    .await;
    let pending = count(
        "SELECT COUNT(*) FROM appointments WHERE establishment_id = ? AND status = 'Pendente'",
        &state,
    )
    .bind(&establishment.id)
    .run()
    .await;
    let open_charges = count(
        "SELECT COUNT(*) FROM charges WHERE establishment_id = ? AND settled = 0",
        &state,
    )
    .bind(&establishment.id)
    .run()
    .await;

    let stats = vec![
        StatCard {
            label: "Clientes".to_string(),
            value: clients,
        },
        StatCard {
            label: "Agendamentos hoje".to_string(),
            value: today_appointments,
        },
        StatCard {
            label: "Pendentes".to_string(),
            value: pending,
        },
        StatCard {
            label: "Cobranças em aberto".to_string(),
            value: open_charges,
        },
    ];

    let activity_rows = sqlx::query_as::<_, ActivityRow>(
        "SELECT message, created_at FROM activities WHERE establishment_id = ? ORDER BY created_at DESC LIMIT 10",
    )
    .bind(&establishment.id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let activities = activity_rows
        .into_iter()
        .map(|row| ActivityView {
            message: row.message,
            created_at: row.created_at,
        })
        .collect();

    Ok(render(DashboardTemplate {
        owner_name: auth.display_name.clone(),
        stats,
        activities,
    }))
}

fn count(query: &str, state: &web::Data<AppState>) -> CountQuery {
    CountQuery {
        query: query.to_string(),
        state: state.clone(),
        params: Vec::new(),
    }
}

struct CountQuery {
    query: String,
    state: web::Data<AppState>,
    params: Vec<String>,
}

impl CountQuery {
    fn bind(mut self, param: &str) -> Self {
        self.params.push(param.to_string());
        self
    }

    async fn run(self) -> i64 {
        let mut query = sqlx::query_scalar::<_, i64>(&self.query);
        for param in &self.params {
            query = query.bind(param);
        }
        query.fetch_one(&self.state.db).await.unwrap_or(0)
    }
}
