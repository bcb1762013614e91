//! Colombian (DIAN) identification document types.
//!
//! Customers record their document type as a DIAN code (`31`, `13`, ...), a
//! common alias (`nit`, `cc`) or the Odoo technical name (`rut`,
//! `national_citizen_id`). All of them are normalized to the DIAN code,
//! which Odoo stores as `l10n_co_document_code`.

/// Code used when the recorded document type is missing or unrecognized.
pub const DEFAULT_IDENTIFICATION_CODE: &str = "13";

/// DIAN code to Odoo technical name.
const DIAN_CODES: &[(&str, &str)] = &[
    ("31", "rut"),
    ("13", "national_citizen_id"),
    ("22", "foreign_id_card"),
    ("41", "passport"),
];

const ALIASES: &[(&str, &str)] = &[("nit", "31"), ("rut", "31"), ("cc", "13")];

/// Translate a code, alias or Odoo name into a DIAN code.
#[must_use]
pub fn canonical_code(raw: &str) -> Option<&'static str> {
    let norm: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if let Some((_, code)) = ALIASES.iter().find(|(alias, _)| *alias == norm) {
        return Some(*code);
    }
    DIAN_CODES
        .iter()
        .find(|(code, name)| *code == norm || *name == norm)
        .map(|(code, _)| *code)
}

/// Like [`canonical_code`], falling back to `default` for unknown input.
#[must_use]
pub fn canonical_code_or(raw: &str, default: &str) -> String {
    canonical_code(raw).map_or_else(|| default.to_string(), str::to_string)
}

/// Odoo technical name of a DIAN code.
#[must_use]
pub fn odoo_name(code: &str) -> Option<&'static str> {
    DIAN_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Strip a tax id down to its alphanumeric characters.
#[must_use]
pub fn normalize_vat(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(canonical_code("NIT"), Some("31"));
        assert_eq!(canonical_code("rut"), Some("31"));
        assert_eq!(canonical_code(" c c "), Some("13"));
    }

    #[test]
    fn test_codes_and_names() {
        assert_eq!(canonical_code("22"), Some("22"));
        assert_eq!(canonical_code("passport"), Some("41"));
        assert_eq!(canonical_code("National_Citizen_ID"), Some("13"));
        assert_eq!(odoo_name("41"), Some("passport"));
    }

    #[test]
    fn test_unknown_falls_back_to_default() {
        assert_eq!(canonical_code("dni"), None);
        assert_eq!(canonical_code_or("dni", DEFAULT_IDENTIFICATION_CODE), "13");
        assert_eq!(canonical_code_or("", "31"), "31");
    }

    #[test]
    fn test_normalize_vat() {
        assert_eq!(normalize_vat("900.123.456-7"), "9001234567");
        assert_eq!(normalize_vat(" CC 1020 "), "CC1020");
    }
}
