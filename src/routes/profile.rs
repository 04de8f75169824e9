use actix_web::{http::header, web, HttpResponse, Result};
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{hash_password, AuthUser},
    db::{self, log_activity},
    format::{digits, format_phone},
    models::EstablishmentRow,
    state::AppState,
    templates::render,
    viacep,
};

#[derive(Clone, Debug, Default)]
struct ProfileFormView {
    display_name: String,
    email: String,
    name: String,
    legal_name: String,
    document: String,
    phone: String,
    postal_code: String,
    street: String,
    street_number: String,
    city: String,
    state: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    form: ProfileFormView,
    errors: Vec<String>,
    saved: bool,
}

#[derive(Deserialize)]
struct ProfileForm {
    display_name: String,
    name: String,
    legal_name: Option<String>,
    document: Option<String>,
    phone: Option<String>,
    postal_code: Option<String>,
    street: Option<String>,
    street_number: Option<String>,
    city: Option<String>,
    state: Option<String>,
    new_password: Option<String>,
}

#[derive(Deserialize)]
struct CepForm {
    cep: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/profile")
            .route(web::get().to(profile_page))
            .route(web::post().to(save_profile)),
    )
    .service(web::resource("/profile/cep").route(web::post().to(lookup_cep)));
}

async fn profile_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<ProfileQuery>,
) -> Result<HttpResponse> {
    let establishment = match db::ensure_establishment(&state.db, &auth).await {
        Ok(establishment) => establishment,
        Err(err) => {
            log::error!("Failed to open establishment profile: {err}");
            return Ok(HttpResponse::InternalServerError().finish());
        }
    };

    Ok(render(ProfileTemplate {
        form: to_form(&auth, &establishment),
        errors: Vec::new(),
        saved: query.saved.is_some(),
    }))
}

#[derive(Deserialize)]
struct ProfileQuery {
    saved: Option<String>,
}

fn to_form(auth: &AuthUser, establishment: &EstablishmentRow) -> ProfileFormView {
    ProfileFormView {
        display_name: auth.display_name.clone(),
        email: auth.email.clone(),
        name: establishment.name.clone(),
        legal_name: establishment.legal_name.clone(),
        document: establishment.document.clone(),
        phone: establishment.phone.clone(),
        postal_code: establishment.postal_code.clone(),
        street: establishment.street.clone(),
        street_number: establishment.street_number.clone(),
        city: establishment.city.clone(),
        state: establishment.state.clone(),
    }
}

async fn save_profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse> {
    let establishment = match db::ensure_establishment(&state.db, &auth).await {
        Ok(establishment) => establishment,
        Err(err) => {
            log::error!("Failed to open establishment profile: {err}");
            return Ok(HttpResponse::InternalServerError().finish());
        }
    };

    let mut errors = Vec::new();

    let display_name = form.display_name.trim().to_string();
    if display_name.is_empty() {
        errors.push("Informe o seu nome.".to_string());
    }

    let name = form.name.trim().to_string();
    if name.is_empty() {
        errors.push("Informe o nome do estabelecimento.".to_string());
    }

    let view = ProfileFormView {
        display_name: display_name.clone(),
        email: auth.email.clone(),
        name: name.clone(),
        legal_name: trimmed(&form.legal_name),
        document: trimmed(&form.document),
        phone: format_phone(&trimmed(&form.phone)),
        postal_code: trimmed(&form.postal_code),
        street: trimmed(&form.street),
        street_number: trimmed(&form.street_number),
        city: trimmed(&form.city),
        state: trimmed(&form.state).to_uppercase(),
    };

    let new_password = trimmed(&form.new_password);
    if !new_password.is_empty() && new_password.len() < 8 {
        errors.push("A nova senha deve ter ao menos 8 caracteres.".to_string());
    }

    if !errors.is_empty() {
        return Ok(render(ProfileTemplate {
            form: view,
            errors,
            saved: false,
        }));
    }

    let update_user = sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
        .bind(&view.display_name)
        .bind(&auth.id)
        .execute(&state.db)
        .await;
    if let Err(err) = update_user {
        log::error!("Failed to update owner profile: {err}");
        return Ok(render(ProfileTemplate {
            form: view,
            errors: vec!["Não foi possível salvar o perfil.".to_string()],
            saved: false,
        }));
    }

    if !new_password.is_empty() {
        match hash_password(&new_password) {
            Ok(password_hash) => {
                let update = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
                    .bind(&password_hash)
                    .bind(&auth.id)
                    .execute(&state.db)
                    .await;
                if let Err(err) = update {
                    log::error!("Failed to update password: {err}");
                }
            }
            Err(err) => log::error!("Failed to hash new password: {err}"),
        }
    }

    let update = sqlx::query(
        r#"UPDATE establishments
           SET name = ?, legal_name = ?, document = ?, phone = ?, postal_code = ?,
               street = ?, street_number = ?, city = ?, state = ?
           WHERE id = ? AND owner_id = ?"#,
    )
    .bind(&view.name)
    .bind(&view.legal_name)
    .bind(&view.document)
    .bind(&view.phone)
    .bind(&view.postal_code)
    .bind(&view.street)
    .bind(&view.street_number)
    .bind(&view.city)
    .bind(&view.state)
    .bind(&establishment.id)
    .bind(&auth.id)
    .execute(&state.db)
    .await;

    if let Err(err) = update {
        log::error!("Failed to update establishment: {err}");
        return Ok(render(ProfileTemplate {
            form: view,
            errors: vec!["Não foi possível salvar o perfil.".to_string()],
            saved: false,
        }));
    }

    log_activity(
        &state.db,
        "profile_updated",
        &format!("Perfil de {} atualizado.", view.name),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/dashboard/profile?saved=1"))
        .finish())
}

/// Looks the postal code up and fills the address fields in. Codes that are
/// not exactly eight digits, and lookup failures, leave the address as it is.
async fn lookup_cep(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<CepForm>,
) -> Result<HttpResponse> {
    let establishment = match db::ensure_establishment(&state.db, &auth).await {
        Ok(establishment) => establishment,
        Err(err) => {
            log::error!("Failed to open establishment profile: {err}");
            return Ok(HttpResponse::InternalServerError().finish());
        }
    };

    let cep = digits(&form.cep);
    if let Some(address) = viacep::lookup(&state.http, &cep).await {
        let update = sqlx::query(
            r#"UPDATE establishments
               SET postal_code = ?, street = ?, city = ?, state = ?
               WHERE id = ? AND owner_id = ?"#,
        )
        .bind(&cep)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&establishment.id)
        .bind(&auth.id)
        .execute(&state.db)
        .await;

        if let Err(err) = update {
            log::error!("Failed to store looked-up address: {err}");
        }
    }

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/dashboard/profile"))
        .finish())
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimmed_handles_missing_and_padded_values() {
        assert_eq!(trimmed(&None), "");
        assert_eq!(trimmed(&Some("  SP  ".to_string())), "SP");
    }
}
