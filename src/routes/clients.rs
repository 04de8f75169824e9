use actix_web::{http::header, web, HttpResponse, Result};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::{new_id, AuthUser},
    db::{self, log_activity},
    format::{format_cpf, format_phone},
    listing,
    models::{ClientContactRow, ClientRow, ContactKind, EstablishmentRow},
    query::{ClientsFilter, ClientsQuery},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct ContactView {
    label: String,
    value: String,
}

#[derive(Clone, Debug)]
struct ClientView {
    id: String,
    name: String,
    document: String,
    phone: String,
    notes: String,
    has_notes: bool,
    contacts: Vec<ContactView>,
}

#[derive(Template)]
#[template(path = "clients.html")]
struct ClientsTemplate {
    term: String,
    clients: Vec<ClientView>,
    total: usize,
    fetch_error: String,
    has_fetch_error: bool,
}

#[derive(Clone, Debug, Default)]
struct ClientFormView {
    id: String,
    name: String,
    document: String,
    phone: String,
    birth_date: String,
    notes: String,
    contact_email: String,
    contact_telefone: String,
    contact_instagram: String,
    is_edit: bool,
}

#[derive(Template)]
#[template(path = "client_form.html")]
struct ClientFormTemplate {
    form: ClientFormView,
    errors: Vec<String>,
}

#[derive(Deserialize)]
struct ClientForm {
    name: String,
    document: Option<String>,
    phone: Option<String>,
    birth_date: Option<String>,
    notes: Option<String>,
    contact_email: Option<String>,
    contact_telefone: Option<String>,
    contact_instagram: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/clients").route(web::get().to(clients_page)))
        .service(
            web::resource("/clients/new")
                .route(web::get().to(new_client_page))
                .route(web::post().to(create_client)),
        )
        .service(
            web::resource("/clients/{id}")
                .route(web::get().to(edit_client_page))
                .route(web::post().to(update_client)),
        )
        .service(web::resource("/clients/{id}/delete").route(web::post().to(delete_client)));
}

async fn clients_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<ClientsQuery>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let filter = ClientsFilter::from_query(&query);

    let fetch = fetch_clients_with_contacts(&state, &establishment.id).await;
    let (entries, fetch_error) = match fetch {
        Ok(entries) => (entries, String::new()),
        Err(err) => {
            log::error!("Failed to load clients: {err}");
            (
                Vec::new(),
                "Não foi possível carregar os clientes.".to_string(),
            )
        }
    };

    let selected = listing::select(
        &entries,
        |entry| entry.row.name.clone(),
        |entry| {
            let mut fields = vec![
                entry.row.name.as_str(),
                entry.row.document.as_str(),
                entry.row.phone.as_str(),
            ];
            fields.extend(entry.contacts.iter().map(|contact| contact.value.as_str()));
            listing::text_matches(&filter.term, fields)
        },
    );

    let clients: Vec<ClientView> = selected.into_iter().map(to_view).collect();
    let total = clients.len();

    Ok(render(ClientsTemplate {
        term: filter.term,
        clients,
        total,
        fetch_error: fetch_error.clone(),
        has_fetch_error: !fetch_error.is_empty(),
    }))
}

struct ClientEntry {
    row: ClientRow,
    contacts: Vec<ClientContactRow>,
}

async fn fetch_clients_with_contacts(
    state: &web::Data<AppState>,
    establishment_id: &str,
) -> Result<Vec<ClientEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ClientRow>(
        r#"SELECT id, establishment_id, name, document, phone, birth_date, notes,
                  created_at, updated_at
           FROM clients
           WHERE establishment_id = ?"#,
    )
    .bind(establishment_id)
    .fetch_all(&state.db)
    .await?;

    let contacts = sqlx::query_as::<_, ClientContactRow>(
        r#"SELECT c.id, c.client_id, c.kind, c.value
           FROM client_contacts c
           JOIN clients cl ON cl.id = c.client_id
           WHERE cl.establishment_id = ?"#,
    )
    .bind(establishment_id)
    .fetch_all(&state.db)
    .await?;

    let entries = rows
        .into_iter()
        .map(|row| {
            let own_contacts = contacts
                .iter()
                .filter(|contact| contact.client_id == row.id)
                .cloned()
                .collect();
            ClientEntry {
                row,
                contacts: own_contacts,
            }
        })
        .collect();
    Ok(entries)
}

fn to_view(entry: &ClientEntry) -> ClientView {
    let contacts = entry
        .contacts
        .iter()
        .map(|contact| ContactView {
            label: ContactKind::parse(&contact.kind)
                .map(|kind| kind.label().to_string())
                .unwrap_or_else(|| contact.kind.clone()),
            value: contact.value.clone(),
        })
        .collect();
    let notes = entry.row.notes.clone().unwrap_or_default();

    ClientView {
        id: entry.row.id.clone(),
        name: entry.row.name.clone(),
        document: entry.row.document.clone(),
        phone: entry.row.phone.clone(),
        has_notes: !notes.trim().is_empty(),
        notes,
        contacts,
    }
}

async fn new_client_page() -> Result<HttpResponse> {
    Ok(render(ClientFormTemplate {
        form: ClientFormView::default(),
        errors: Vec::new(),
    }))
}

async fn create_client(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ClientForm>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let (view, errors) = validate_form(&form, String::new(), false);
    if !errors.is_empty() {
        return Ok(render(ClientFormTemplate { form: view, errors }));
    }

    let id = new_id();
    let now = Utc::now().to_rfc3339();
    let insert = sqlx::query(
        r#"INSERT INTO clients (id, establishment_id, name, document, phone, birth_date,
                                notes, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&establishment.id)
    .bind(&view.name)
    .bind(&view.document)
    .bind(&view.phone)
    .bind(optional(&view.birth_date))
    .bind(optional(&view.notes))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        log::error!("Failed to create client: {err}");
        return Ok(render(ClientFormTemplate {
            form: view,
            errors: vec!["Não foi possível salvar o cliente.".to_string()],
        }));
    }

    if let Err(err) = replace_contacts(&state, &id, &view).await {
        log::error!("Failed to store client contacts: {err}");
    }

    log_activity(
        &state.db,
        "client_created",
        &format!("Cliente {} cadastrado.", view.name),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    Ok(redirect_to_list())
}

async fn edit_client_page(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let client_id = path.into_inner();
    let Some(row) = fetch_client(&state, &establishment.id, &client_id).await else {
        return Ok(redirect_to_list());
    };

    let contacts = fetch_contacts(&state, &client_id).await;
    let mut form = ClientFormView {
        id: row.id,
        name: row.name,
        document: row.document,
        phone: row.phone,
        birth_date: row.birth_date.unwrap_or_default(),
        notes: row.notes.unwrap_or_default(),
        is_edit: true,
        ..ClientFormView::default()
    };
    for contact in contacts {
        match ContactKind::parse(&contact.kind) {
            Some(ContactKind::Email) => form.contact_email = contact.value,
            Some(ContactKind::Telefone) => form.contact_telefone = contact.value,
            Some(ContactKind::Instagram) => form.contact_instagram = contact.value,
            None => {}
        }
    }

    Ok(render(ClientFormTemplate {
        form,
        errors: Vec::new(),
    }))
}

async fn update_client(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<ClientForm>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let client_id = path.into_inner();
    if fetch_client(&state, &establishment.id, &client_id)
        .await
        .is_none()
    {
        return Ok(redirect_to_list());
    }

    let (view, errors) = validate_form(&form, client_id.clone(), true);
    if !errors.is_empty() {
        return Ok(render(ClientFormTemplate { form: view, errors }));
    }

    let update = sqlx::query(
        r#"UPDATE clients
           SET name = ?, document = ?, phone = ?, birth_date = ?, notes = ?, updated_at = ?
           WHERE id = ? AND establishment_id = ?"#,
    )
    .bind(&view.name)
    .bind(&view.document)
    .bind(&view.phone)
    .bind(optional(&view.birth_date))
    .bind(optional(&view.notes))
    .bind(Utc::now().to_rfc3339())
    .bind(&client_id)
    .bind(&establishment.id)
    .execute(&state.db)
    .await;

    if let Err(err) = update {
        log::error!("Failed to update client: {err}");
        return Ok(render(ClientFormTemplate {
            form: view,
            errors: vec!["Não foi possível salvar o cliente.".to_string()],
        }));
    }

    if let Err(err) = replace_contacts(&state, &client_id, &view).await {
        log::error!("Failed to store client contacts: {err}");
    }

    log_activity(
        &state.db,
        "client_updated",
        &format!("Cliente {} atualizado.", view.name),
        Some(&auth.id),
        Some(&establishment.id),
    )
    .await;

    Ok(redirect_to_list())
}

async fn delete_client(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let establishment = match resolve_establishment(&state, &auth).await {
        Ok(establishment) => establishment,
        Err(response) => return Ok(response),
    };

    let client_id = path.into_inner();
    let Some(row) = fetch_client(&state, &establishment.id, &client_id).await else {
        return Ok(redirect_to_list());
    };

    let _ = sqlx::query("DELETE FROM client_contacts WHERE client_id = ?")
        .bind(&client_id)
        .execute(&state.db)
        .await;
    let delete = sqlx::query("DELETE FROM clients WHERE id = ? AND establishment_id = ?")
        .bind(&client_id)
        .bind(&establishment.id)
        .execute(&state.db)
        .await;

    match delete {
        Ok(_) => {
            log_activity(
                &state.db,
                "client_deleted",
                &format!("Cliente {} removido.", row.name),
                Some(&auth.id),
                Some(&establishment.id),
            )
            .await;
        }
        Err(err) => log::error!("Failed to delete client: {err}"),
    }

    Ok(redirect_to_list())
}

fn validate_form(form: &ClientForm, id: String, is_edit: bool) -> (ClientFormView, Vec<String>) {
    let mut errors = Vec::new();

    let name = form.name.trim().to_string();
    if name.is_empty() {
        errors.push("Informe o nome do cliente.".to_string());
    }

    let birth_date = form.birth_date.clone().unwrap_or_default().trim().to_string();
    if !birth_date.is_empty() && crate::query::parse_optional_date(Some(&birth_date)).is_none() {
        errors.push("Data de nascimento inválida.".to_string());
    }

    let view = ClientFormView {
        id,
        name,
        document: format_cpf(form.document.as_deref().unwrap_or_default()),
        phone: format_phone(form.phone.as_deref().unwrap_or_default()),
        birth_date,
        notes: form.notes.clone().unwrap_or_default().trim().to_string(),
        contact_email: form.contact_email.clone().unwrap_or_default().trim().to_string(),
        contact_telefone: format_phone(form.contact_telefone.as_deref().unwrap_or_default()),
        contact_instagram: form
            .contact_instagram
            .clone()
            .unwrap_or_default()
            .trim()
            .to_string(),
        is_edit,
    };

    (view, errors)
}

/// Contacts are stored as one row per filled slot. Saving rewrites the full
/// set so cleared slots disappear.
async fn replace_contacts(
    state: &web::Data<AppState>,
    client_id: &str,
    view: &ClientFormView,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM client_contacts WHERE client_id = ?")
        .bind(client_id)
        .execute(&state.db)
        .await?;

    let slots = [
        (ContactKind::Email, &view.contact_email),
        (ContactKind::Telefone, &view.contact_telefone),
        (ContactKind::Instagram, &view.contact_instagram),
    ];
    for (kind, value) in slots {
        if value.trim().is_empty() {
            continue;
        }
        sqlx::query(
            r#"INSERT INTO client_contacts (id, client_id, kind, value)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(new_id())
        .bind(client_id)
        .bind(kind.as_str())
        .bind(value.trim())
        .execute(&state.db)
        .await?;
    }
    Ok(())
}

async fn fetch_client(
    state: &web::Data<AppState>,
    establishment_id: &str,
    client_id: &str,
) -> Option<ClientRow> {
    sqlx::query_as::<_, ClientRow>(
        r#"SELECT id, establishment_id, name, document, phone, birth_date, notes,
                  created_at, updated_at
           FROM clients
           WHERE id = ? AND establishment_id = ?
           LIMIT 1"#,
    )
    .bind(client_id)
    .bind(establishment_id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None)
}

async fn fetch_contacts(state: &web::Data<AppState>, client_id: &str) -> Vec<ClientContactRow> {
    sqlx::query_as::<_, ClientContactRow>(
        r#"SELECT id, client_id, kind, value
           FROM client_contacts
           WHERE client_id = ?
           ORDER BY kind"#,
    )
    .bind(client_id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default()
}

fn optional(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.trim())
    }
}

fn redirect_to_list() -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/dashboard/clients"))
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

    fn base_form() -> ClientForm {
        ClientForm {
            name: "Ana Silva".to_string(),
            document: Some("12345678901".to_string()),
            phone: Some("11987654321".to_string()),
            birth_date: Some("1990-05-10".to_string()),
            notes: None,
            contact_email: Some(" ana@example.com ".to_string()),
            contact_telefone: None,
            contact_instagram: Some("@ana".to_string()),
        }
    }

    #[test]
    fn validate_formats_document_and_phone() {
        let (view, errors) = validate_form(&base_form(), String::new(), false);
        assert!(errors.is_empty());
        assert_eq!(view.document, "123.456.789-01");
        assert_eq!(view.phone, "(11) 98765-4321");
        assert_eq!(view.contact_email, "ana@example.com");
    }

    #[test]
    fn validate_requires_a_name() {
        let form = ClientForm {
            name: "   ".to_string(),
            ..base_form()
        };
        let (_, errors) = validate_form(&form, String::new(), false);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn validate_rejects_malformed_birth_date() {
        let form = ClientForm {
            birth_date: Some("10/05/1990".to_string()),
            ..base_form()
        };
        let (_, errors) = validate_form(&form, String::new(), false);
        assert_eq!(errors, vec!["Data de nascimento inválida.".to_string()]);
    }
}
