//! Custom askama filters used by the dashboard templates.

use rust_decimal::Decimal;

use crate::format;

/// `YYYY-MM-DD` to `DD/MM/YYYY`; anything else passes through unchanged.
pub fn br_date(value: &str) -> askama::Result<String> {
    let parts: Vec<&str> = value.split('-').collect();
    match parts.as_slice() {
        [year, month, day] if year.len() == 4 => Ok(format!("{day}/{month}/{year}")),
        _ => Ok(value.to_string()),
    }
}

/// Formats a decimal amount as Brazilian currency, e.g. `R$ 1.234,56`.
/// Unparseable amounts render as zero.
pub fn brl(value: &str) -> askama::Result<String> {
    let amount: Decimal = value.trim().parse().unwrap_or_default();
    let rounded = amount.round_dp(2);
    let text = format!("{rounded:.2}");
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let (sign, digits) = match integer.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer),
    };

    let mut grouped = String::new();
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    Ok(format!("R$ {sign}{grouped},{fraction}"))
}

pub fn cpf(value: &str) -> askama::Result<String> {
    Ok(format::format_cpf(value))
}

pub fn phone(value: &str) -> askama::Result<String> {
    Ok(format::format_phone(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn br_date_reverses_iso_dates() {
        assert_eq!(br_date("2025-11-20").unwrap(), "20/11/2025");
        assert_eq!(br_date("sem data").unwrap(), "sem data");
    }

    #[test]
    fn brl_groups_thousands_and_uses_comma() {
        assert_eq!(brl("1234.5").unwrap(), "R$ 1.234,50");
        assert_eq!(brl("0").unwrap(), "R$ 0,00");
        assert_eq!(brl("-987654.321").unwrap(), "R$ -987.654,32");
        assert_eq!(brl("not a number").unwrap(), "R$ 0,00");
    }
}
