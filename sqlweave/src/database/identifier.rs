//! Identifier validation and quoting
//!
//! Identifiers (database, table and column names) cannot be bound as
//! parameters, so they are the one thing concatenated into SQL text. Every
//! identifier passes through [`quote_with`] first:
//!
//! 1. A name already wrapped in the quote character, with every inner quote
//!    doubled, is returned unchanged. Quoting twice is a no-op.
//! 2. A bare name may contain the quote character only as doubled pairs.
//!    A lone quote character is rejected rather than silently escaped.
//! 3. Empty names, NUL bytes and overlong names are rejected.

use crate::{Error, Result};

/// Conservative limit across backends (PostgreSQL 63 bytes, MySQL 64 characters)
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Reject identifiers that are empty, contain NUL, or exceed the length limit
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidIdentifier("identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(Error::InvalidIdentifier(format!(
            "identifier contains a NUL byte: {name:?}"
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(Error::InvalidIdentifier(format!(
            "identifier exceeds {MAX_IDENTIFIER_LENGTH} bytes (got {}): {name:?}",
            name.len()
        )));
    }

    Ok(())
}

/// Quote `name` with `quote`, leaving already-quoted names untouched
pub fn quote_with(name: &str, quote: char) -> Result<String> {
    let width = quote.len_utf8();

    if name.len() >= 2 * width && name.starts_with(quote) && name.ends_with(quote) {
        let inner = &name[width..name.len() - width];
        if escapes_are_paired(inner, quote) {
            validate_identifier(inner)?;
            return Ok(name.to_string());
        }
    }

    if !escapes_are_paired(name, quote) {
        return Err(Error::InvalidIdentifier(format!(
            "identifier contains an unescaped {quote} character: {name:?}"
        )));
    }

    validate_identifier(name)?;
    Ok(format!("{quote}{name}{quote}"))
}

/// Remove one level of quoting, if present, and collapse doubled quote characters
pub fn unquote(name: &str, quote: char) -> String {
    let width = quote.len_utf8();
    let inner = if name.len() >= 2 * width && name.starts_with(quote) && name.ends_with(quote) {
        &name[width..name.len() - width]
    } else {
        name
    };
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// Every occurrence of `quote` in `text` is part of a doubled pair
fn escapes_are_paired(text: &str, quote: char) -> bool {
    let mut characters = text.chars();
    while let Some(character) = characters.next() {
        if character == quote && characters.next() != Some(quote) {
            return false;
        }
    }
    true
}

/// Reject free-form DDL fragments (type names, default expressions) that
/// could terminate the statement or open a comment
pub fn validate_fragment(kind: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::InvalidRequest(format!("{kind} cannot be empty")));
    }
    if text.contains(';') || text.contains("--") || text.contains("/*") || text.contains('\0') {
        return Err(Error::InvalidRequest(format!(
            "{kind} contains a statement terminator or comment: {text:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain_names() {
        assert_eq!(quote_with("users", '"').unwrap(), "\"users\"");
        assert_eq!(quote_with("order", '`').unwrap(), "`order`");
        assert_eq!(quote_with("first name", '"').unwrap(), "\"first name\"");
    }

    #[test]
    fn test_quote_is_idempotent() {
        let once = quote_with("select", '"').unwrap();
        let twice = quote_with(&once, '"').unwrap();
        assert_eq!(once, twice);

        let once = quote_with("we``ird", '`').unwrap();
        assert_eq!(once, "`we``ird`");
        assert_eq!(quote_with(&once, '`').unwrap(), once);
    }

    #[test]
    fn test_quote_rejects_unescaped_quote_character() {
        assert!(matches!(quote_with("bad\"name", '"'), Err(Error::InvalidIdentifier(_))));
        assert!(matches!(quote_with("`half", '`'), Err(Error::InvalidIdentifier(_))));
        assert!(matches!(quote_with("\"a\"b\"", '"'), Err(Error::InvalidIdentifier(_))));
    }

    #[test]
    fn test_quote_accepts_foreign_quote_characters() {
        assert_eq!(quote_with("it's", '"').unwrap(), "\"it's\"");
        assert_eq!(quote_with("say \"hi\"", '`').unwrap(), "`say \"hi\"`");
    }

    #[test]
    fn test_validate_identifier_limits() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a\0b").is_err());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
        assert!(quote_with("\"\"", '"').is_err());
    }

    #[test]
    fn test_unquote_reverses_quote() {
        assert_eq!(unquote("\"a\"\"b\"", '"'), "a\"b");
        assert_eq!(unquote("plain", '"'), "plain");
    }

    #[test]
    fn test_validate_fragment() {
        assert!(validate_fragment("type", "VARCHAR(255)").is_ok());
        assert!(validate_fragment("default", "'n/a'").is_ok());
        assert!(validate_fragment("type", "INT; DROP TABLE users").is_err());
        assert!(validate_fragment("type", "INT -- comment").is_err());
        assert!(validate_fragment("type", "  ").is_err());
    }
}
