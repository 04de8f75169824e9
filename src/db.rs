use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id, AuthUser},
    models::{AppointmentRow, EstablishmentRow},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_owner(pool).await
}

async fn seed_owner(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users LIMIT 1")
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("OWNER_EMAIL").unwrap_or_else(|_| "owner@atenda.local".to_string());
    let password = env::var("OWNER_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    let display_name = env::var("OWNER_DISPLAY_NAME").unwrap_or_else(|_| "Proprietário".to_string());

    if password == "change-me" {
        log::warn!("OWNER_PASSWORD not set. Using default password 'change-me'. Set OWNER_PASSWORD in production.");
    }

    let password_hash =
        hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO users (id, email, display_name, password_hash, active, created_at)
           VALUES (?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(email)
    .bind(display_name)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    establishment_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, establishment_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(establishment_id)
    .execute(pool)
    .await;
}

pub async fn find_establishment(
    pool: &SqlitePool,
    owner_id: &str,
) -> Result<Option<EstablishmentRow>, sqlx::Error> {
    sqlx::query_as::<_, EstablishmentRow>(
        r#"SELECT id, owner_id, name, legal_name, document, phone, postal_code, street,
                  street_number, city, state, created_at
           FROM establishments
           WHERE owner_id = ?
           LIMIT 1"#,
    )
    .bind(owner_id)
    .fetch_optional(pool)
    .await
}

/// Returns the owner's establishment, creating a blank one on first access.
pub async fn ensure_establishment(
    pool: &SqlitePool,
    owner: &AuthUser,
) -> Result<EstablishmentRow, sqlx::Error> {
    if let Some(existing) = find_establishment(pool, &owner.id).await? {
        return Ok(existing);
    }

    let id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO establishments (id, owner_id, name, created_at)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&owner.id)
    .bind("Novo Estabelecimento")
    .bind(&now)
    .execute(pool)
    .await?;

    log_activity(
        pool,
        "establishment_created",
        &format!("{} abriu o perfil pela primeira vez.", owner.display_name),
        Some(&owner.id),
        Some(&id),
    )
    .await;

    find_establishment(pool, &owner.id)
        .await?
        .ok_or_else(|| sqlx::Error::RowNotFound)
}

pub async fn fetch_appointment_event(
    pool: &SqlitePool,
    appointment_id: &str,
) -> Option<AppointmentRow> {
    sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, establishment_id, title, date, time, status, description, created_at
           FROM appointments
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(appointment_id)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}
