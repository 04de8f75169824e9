use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::models::AppointmentRow;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
    pub http: reqwest::Client,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub appointment_id: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
}

impl ServerEvent {
    pub fn from_row(kind: &str, row: AppointmentRow) -> Self {
        Self {
            kind: kind.to_string(),
            appointment_id: Some(row.id),
            title: Some(row.title),
            date: Some(row.date),
            time: Some(row.time),
            status: Some(row.status),
            description: row.description,
        }
    }

    pub fn deleted(appointment_id: &str) -> Self {
        Self {
            kind: "appointment_deleted".to_string(),
            appointment_id: Some(appointment_id.to_string()),
            title: None,
            date: None,
            time: None,
            status: None,
            description: None,
        }
    }
}
