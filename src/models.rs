use serde::Serialize;

/// Sentinel accepted by every status filter: matches all records.
pub const STATUS_ALL: &str = "Todos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AppointmentStatus {
    Pendente,
    Realizado,
    Cancelado,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 3] = [
        AppointmentStatus::Pendente,
        AppointmentStatus::Realizado,
        AppointmentStatus::Cancelado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pendente => "Pendente",
            AppointmentStatus::Realizado => "Realizado",
            AppointmentStatus::Cancelado => "Cancelado",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pendente" => Some(AppointmentStatus::Pendente),
            "Realizado" => Some(AppointmentStatus::Realizado),
            "Cancelado" => Some(AppointmentStatus::Cancelado),
            _ => None,
        }
    }

    /// The quick-action flip: anything not yet done becomes done.
    pub fn toggled(self) -> Self {
        match self {
            AppointmentStatus::Realizado => AppointmentStatus::Pendente,
            _ => AppointmentStatus::Realizado,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageStatus {
    Enviado,
    Lido,
    Erro,
    Pendente,
}

impl MessageStatus {
    pub const ALL: [MessageStatus; 4] = [
        MessageStatus::Enviado,
        MessageStatus::Lido,
        MessageStatus::Erro,
        MessageStatus::Pendente,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Enviado => "Enviado",
            MessageStatus::Lido => "Lido",
            MessageStatus::Erro => "Erro",
            MessageStatus::Pendente => "Pendente",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Enviado" => Some(MessageStatus::Enviado),
            "Lido" => Some(MessageStatus::Lido),
            "Erro" => Some(MessageStatus::Erro),
            "Pendente" => Some(MessageStatus::Pendente),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContactKind {
    Email,
    Telefone,
    Instagram,
}

impl ContactKind {
    pub const ALL: [ContactKind; 3] = [
        ContactKind::Email,
        ContactKind::Telefone,
        ContactKind::Instagram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContactKind::Email => "email",
            ContactKind::Telefone => "telefone",
            ContactKind::Instagram => "instagram",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContactKind::Email => "Email",
            ContactKind::Telefone => "Telefone",
            ContactKind::Instagram => "Instagram",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "email" => Some(ContactKind::Email),
            "telefone" => Some(ContactKind::Telefone),
            "instagram" => Some(ContactKind::Instagram),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    Receita,
    Despesa,
}

impl LedgerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerKind::Receita => "receita",
            LedgerKind::Despesa => "despesa",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "receita" => Some(LedgerKind::Receita),
            "despesa" => Some(LedgerKind::Despesa),
            _ => None,
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub active: i64,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EstablishmentRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub legal_name: String,
    pub document: String,
    pub phone: String,
    pub postal_code: String,
    pub street: String,
    pub street_number: String,
    pub city: String,
    pub state: String,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientRow {
    pub id: String,
    pub establishment_id: String,
    pub name: String,
    pub document: String,
    pub phone: String,
    pub birth_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientContactRow {
    pub id: String,
    pub client_id: String,
    pub kind: String,
    pub value: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub establishment_id: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub status: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub establishment_id: String,
    pub name: String,
    pub price: String,
    pub duration_minutes: i64,
    pub active: i64,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageLogRow {
    pub id: String,
    pub establishment_id: String,
    pub client_name: String,
    pub channel: String,
    pub body: String,
    pub status: String,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChargeRow {
    pub id: String,
    pub establishment_id: String,
    pub client_id: String,
    pub client_name: String,
    pub client_phone: String,
    pub amount: String,
    pub due_date: String,
    pub settled: i64,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerEntryRow {
    pub id: String,
    pub establishment_id: String,
    pub kind: String,
    pub amount: String,
    pub entry_date: String,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_status_round_trip() {
        for status in AppointmentStatus::ALL {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("Todos"), None);
        assert_eq!(AppointmentStatus::parse("pendente"), None);
    }

    #[test]
    fn toggle_flips_pending_and_done() {
        assert_eq!(
            AppointmentStatus::Pendente.toggled(),
            AppointmentStatus::Realizado
        );
        assert_eq!(
            AppointmentStatus::Realizado.toggled(),
            AppointmentStatus::Pendente
        );
        assert_eq!(
            AppointmentStatus::Cancelado.toggled(),
            AppointmentStatus::Realizado
        );
    }

    #[test]
    fn contact_kind_parse_ignores_case() {
        assert_eq!(ContactKind::parse("Email"), Some(ContactKind::Email));
        assert_eq!(ContactKind::parse("TELEFONE"), Some(ContactKind::Telefone));
        assert_eq!(ContactKind::parse("fax"), None);
    }
}
