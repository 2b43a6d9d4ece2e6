//! Identifier validation and quoting.
//!
//! Table, column, and schema names come from configuration files and from
//! the live catalog; they cannot be passed as statement parameters, so
//! every identifier that ends up in generated SQL goes through this module.
//! Validation rejects obviously hostile input, quoting handles the rest.

use crate::error::{OpsError, Result};

/// Maximum identifier length. The columnar engine caps names at 127 bytes,
/// stricter than the conventional engine's 63.
const MAX_IDENTIFIER_LENGTH: usize = 127;

/// Validate an identifier before it is quoted into a statement.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(OpsError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(OpsError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(OpsError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier for either engine (both use double-quote quoting).
///
/// Escapes embedded double quotes by doubling them.
pub fn quote(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a table name with its schema, quoting both parts.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote(schema)?, quote(table)?))
}

/// Quote a string literal (single quotes doubled). Used for JSON path
/// segments, which are values inside an expression rather than identifiers.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("events").is_ok());
        assert!(validate_identifier("unextracted_production").is_ok());
        assert!(validate_identifier("Column123").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("events\0name");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_rejects_too_long() {
        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let result = validate_identifier(&long_name);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    #[test]
    fn test_validate_identifier_accepts_max_length() {
        let max_name = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_identifier(&max_name).is_ok());
    }

    #[test]
    fn test_quote_normal() {
        assert_eq!(quote("events").unwrap(), "\"events\"");
        assert_eq!(quote("user_id").unwrap(), "\"user_id\"");
    }

    #[test]
    fn test_quote_escapes_double_quote() {
        assert_eq!(quote("a\"b").unwrap(), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_injection_safely_quoted() {
        let result = quote("events\"; DROP TABLE logs.events;--");
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "\"events\"\"; DROP TABLE logs.events;--\"");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("logs", "events").unwrap(), "\"logs\".\"events\"");
    }

    #[test]
    fn test_qualify_rejects_invalid_parts() {
        assert!(qualify("", "events").is_err());
        assert!(qualify("logs", "a\0b").is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("path"), "'path'");
        assert_eq!(quote_literal("o'clock"), "'o''clock'");
    }
}
