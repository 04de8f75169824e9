/// String formatting helpers for Brazilian documents and phone numbers.

pub fn digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Formats an 11-digit CPF as `000.000.000-00`. Anything else is returned
/// trimmed and untouched.
pub fn format_cpf(value: &str) -> String {
    let d = digits(value);
    if d.len() != 11 {
        return value.trim().to_string();
    }
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
}

/// Formats a mobile number as `(XX) XXXXX-XXXX` (11 digits) or a landline as
/// `(XX) XXXX-XXXX` (10 digits). Anything else is returned trimmed.
pub fn format_phone(value: &str) -> String {
    let d = digits(value);
    match d.len() {
        11 => format!("({}) {}-{}", &d[0..2], &d[2..7], &d[7..11]),
        10 => format!("({}) {}-{}", &d[0..2], &d[2..6], &d[6..10]),
        _ => value.trim().to_string(),
    }
}

/// Deep link that opens a WhatsApp conversation with the message pre-filled.
/// The country code 55 is prepended to the bare digits of the phone number.
pub fn whatsapp_link(phone: &str, message: &str) -> String {
    format!(
        "https://api.whatsapp.com/send?phone=55{}&text={}",
        digits(phone),
        urlencoding::encode(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_formats_eleven_digits() {
        assert_eq!(format_cpf("12345678901"), "123.456.789-01");
        assert_eq!(format_cpf("123.456.789-01"), "123.456.789-01");
    }

    #[test]
    fn cpf_leaves_partial_input_alone() {
        assert_eq!(format_cpf("1234"), "1234");
        assert_eq!(format_cpf("  abc  "), "abc");
    }

    #[test]
    fn phone_formats_mobile_and_landline() {
        assert_eq!(format_phone("11987654321"), "(11) 98765-4321");
        assert_eq!(format_phone("1133334444"), "(11) 3333-4444");
        assert_eq!(format_phone("123"), "123");
    }

    #[test]
    fn whatsapp_link_encodes_message() {
        let link = whatsapp_link("(11) 98765-4321", "Olá, tudo bem?");
        assert_eq!(
            link,
            "https://api.whatsapp.com/send?phone=5511987654321&text=Ol%C3%A1%2C%20tudo%20bem%3F"
        );
    }
}
