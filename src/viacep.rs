//! Postal-code resolution against the public ViaCEP service. Lookups only
//! fire once a code has exactly 8 digits; failures are logged and leave the
//! address untouched.

use std::env;

use serde::Deserialize;

use crate::format::digits;

#[derive(Debug, Clone, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    erro: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CepAddress {
    pub street: String,
    pub city: String,
    pub state: String,
}

fn base_url() -> String {
    env::var("VIACEP_BASE_URL").unwrap_or_else(|_| "https://viacep.com.br".to_string())
}

pub async fn lookup(client: &reqwest::Client, raw_cep: &str) -> Option<CepAddress> {
    let cep = digits(raw_cep);
    if cep.len() != 8 {
        return None;
    }

    let url = format!("{}/ws/{}/json/", base_url(), cep);
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(err) => {
            log::warn!("CEP lookup request failed for {cep}: {err}");
            return None;
        }
    };

    let payload = match response.json::<ViaCepResponse>().await {
        Ok(payload) => payload,
        Err(err) => {
            log::warn!("CEP lookup returned an unreadable payload for {cep}: {err}");
            return None;
        }
    };

    if payload.erro {
        return None;
    }

    Some(CepAddress {
        street: payload.logradouro,
        city: payload.localidade,
        state: payload.uf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn short_codes_never_hit_the_network() {
        let client = reqwest::Client::new();
        assert_eq!(lookup(&client, "0130").await, None);
        assert_eq!(lookup(&client, "").await, None);
        assert_eq!(lookup(&client, "abc").await, None);
    }
}
