//! Field mappings for payload extraction.
//!
//! One mapping per intake table, loaded from versioned YAML rather than
//! compiled in: each entry names the intake table, the target table, the
//! business key used for deduplication and merging, and the ordered list
//! of payload paths to project into typed columns. The field order must
//! match the target table's physical column order; the extractor verifies
//! that against the live catalog before running.

use crate::error::{OpsError, Result};
use crate::ident;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Target type a payload field is cast to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExtractType {
    Varchar(Option<u32>),
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl ExtractType {
    /// Rendered SQL cast target.
    pub fn sql(&self) -> String {
        match self {
            ExtractType::Varchar(Some(n)) => format!("VARCHAR({})", n),
            ExtractType::Varchar(None) => "VARCHAR".to_string(),
            ExtractType::Integer => "INTEGER".to_string(),
            ExtractType::Float => "FLOAT".to_string(),
            ExtractType::Boolean => "BOOLEAN".to_string(),
            ExtractType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    /// Whether the conventional engine must unwrap the extracted value to
    /// text before the cast. True for VARCHAR targets and for TIMESTAMP,
    /// which only casts cleanly from its text form.
    pub fn extracted_as_text(&self) -> bool {
        matches!(self, ExtractType::Varchar(_) | ExtractType::Timestamp)
    }
}

impl TryFrom<String> for ExtractType {
    type Error = OpsError;

    fn try_from(value: String) -> Result<Self> {
        let normalized = value.trim().to_lowercase();
        if let Some(rest) = normalized.strip_prefix("varchar") {
            let rest = rest.trim();
            if rest.is_empty() {
                return Ok(ExtractType::Varchar(None));
            }
            if let Some(inner) = rest.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
                let limit: u32 = inner.trim().parse().map_err(|_| {
                    OpsError::Config(format!("Invalid varchar limit in type: {}", value))
                })?;
                return Ok(ExtractType::Varchar(Some(limit)));
            }
            return Err(OpsError::Config(format!("Invalid extract type: {}", value)));
        }
        match normalized.as_str() {
            "integer" => Ok(ExtractType::Integer),
            "float" => Ok(ExtractType::Float),
            "boolean" => Ok(ExtractType::Boolean),
            "timestamp" => Ok(ExtractType::Timestamp),
            _ => Err(OpsError::Config(format!("Invalid extract type: {}", value))),
        }
    }
}

impl From<ExtractType> for String {
    fn from(t: ExtractType) -> Self {
        t.sql()
    }
}

/// One payload path projected into one target column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Target column name.
    pub column: String,

    /// Dot-separated path within the payload.
    pub path: String,

    /// Type the extracted value is cast to.
    pub datatype: ExtractType,
}

/// A full intake-to-target mapping for one table pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMapping {
    /// Intake table holding unextracted payload rows.
    pub source_table: String,

    /// Target table receiving typed rows.
    pub target_table: String,

    /// Column uniquely identifying a logical record, used for
    /// deduplication and merge. Must be one of the mapped columns.
    pub business_key: String,

    /// Ordered field list; order must match the target table's physical
    /// column order after the payload and ingestion-timestamp columns.
    pub fields: Vec<FieldMapping>,
}

impl TableMapping {
    pub fn validate(&self) -> Result<()> {
        ident::validate_identifier(&self.source_table)?;
        ident::validate_identifier(&self.target_table)?;

        if self.fields.is_empty() {
            return Err(OpsError::Config(format!(
                "Mapping for {} declares no fields",
                self.source_table
            )));
        }

        for field in &self.fields {
            ident::validate_identifier(&field.column)?;
            if field.path.is_empty() || field.path.split('.').any(|seg| seg.is_empty()) {
                return Err(OpsError::Config(format!(
                    "Mapping for {} has an invalid path for column {}: {:?}",
                    self.source_table, field.column, field.path
                )));
            }
        }

        if !self.fields.iter().any(|f| f.column == self.business_key) {
            return Err(OpsError::Config(format!(
                "Mapping for {} names business key {} but no such mapped column",
                self.source_table, self.business_key
            )));
        }

        Ok(())
    }
}

/// The loaded set of table mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMappings {
    mappings: Vec<TableMapping>,
}

impl ExtractionMappings {
    pub fn new(mappings: Vec<TableMapping>) -> Result<Self> {
        for mapping in &mappings {
            mapping.validate()?;
        }
        Ok(Self { mappings })
    }

    /// Load mappings from a YAML file. Unlike the reconciler's spec file,
    /// a missing mapping file is a hard configuration error: the
    /// extractor cannot do anything without one.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OpsError::Config(format!(
                "Cannot read extraction mappings {}: {}",
                path.display(),
                e
            ))
        })?;
        let mappings: Vec<TableMapping> = serde_yaml::from_str(&content)?;
        Self::new(mappings)
    }

    /// Look up the mapping for an intake table, failing fast on an
    /// unknown identifier before any SQL is built.
    pub fn for_source(&self, source_table: &str) -> Result<&TableMapping> {
        self.mappings
            .iter()
            .find(|m| m.source_table == source_table)
            .ok_or_else(|| OpsError::InvalidSourceTable(source_table.to_string()))
    }

    pub fn tables(&self) -> &[TableMapping] {
        &self.mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const SAMPLE_MAPPINGS: &str = r#"
- source_table: unextracted_production
  target_table: production
  business_key: uuid
  fields:
    - { column: uuid, path: uuid, datatype: VARCHAR }
    - { column: method, path: method, datatype: VARCHAR }
    - { column: path, path: path, datatype: VARCHAR(12000) }
    - { column: status, path: status, datatype: INTEGER }
    - { column: duration, path: duration, datatype: FLOAT }
    - { column: timestamp, path: timestamp, datatype: TIMESTAMP }
- source_table: unextracted_events
  target_table: events
  business_key: id
  fields:
    - { column: id, path: id, datatype: VARCHAR }
    - { column: name, path: name, datatype: VARCHAR }
    - { column: new_event, path: properties.new_event, datatype: BOOLEAN }
    - { column: success, path: properties.event_properties.success, datatype: BOOLEAN }
"#;

    #[test]
    fn test_extract_type_parsing() {
        assert_eq!(
            ExtractType::try_from("VARCHAR".to_string()).unwrap(),
            ExtractType::Varchar(None)
        );
        assert_eq!(
            ExtractType::try_from("varchar(12000)".to_string()).unwrap(),
            ExtractType::Varchar(Some(12000))
        );
        assert_eq!(
            ExtractType::try_from("INTEGER".to_string()).unwrap(),
            ExtractType::Integer
        );
        assert!(ExtractType::try_from("decimal".to_string()).is_err());
        assert!(ExtractType::try_from("varchar(abc)".to_string()).is_err());
    }

    #[test]
    fn test_extract_type_sql_round_trip() {
        assert_eq!(ExtractType::Varchar(Some(12000)).sql(), "VARCHAR(12000)");
        assert_eq!(ExtractType::Varchar(None).sql(), "VARCHAR");
        assert_eq!(ExtractType::Float.sql(), "FLOAT");
    }

    #[test]
    fn test_extracted_as_text() {
        assert!(ExtractType::Varchar(None).extracted_as_text());
        assert!(ExtractType::Varchar(Some(100)).extracted_as_text());
        assert!(ExtractType::Timestamp.extracted_as_text());
        assert!(!ExtractType::Boolean.extracted_as_text());
        assert!(!ExtractType::Integer.extracted_as_text());
        assert!(!ExtractType::Float.extracted_as_text());
    }

    #[test]
    fn test_parse_sample_mappings() {
        let mappings: Vec<TableMapping> = serde_yaml::from_str(SAMPLE_MAPPINGS).unwrap();
        let mappings = ExtractionMappings::new(mappings).unwrap();

        let production = mappings.for_source("unextracted_production").unwrap();
        assert_eq!(production.target_table, "production");
        assert_eq!(production.business_key, "uuid");
        assert_eq!(production.fields[2].datatype, ExtractType::Varchar(Some(12000)));

        let events = mappings.for_source("unextracted_events").unwrap();
        assert_eq!(events.fields[3].path, "properties.event_properties.success");
    }

    #[test]
    fn test_unknown_source_table_fails_fast() {
        let mappings: Vec<TableMapping> = serde_yaml::from_str(SAMPLE_MAPPINGS).unwrap();
        let mappings = ExtractionMappings::new(mappings).unwrap();
        let err = mappings.for_source("unextracted_nonsense").unwrap_err();
        assert!(matches!(err, OpsError::InvalidSourceTable(_)));
    }

    #[test]
    fn test_business_key_must_be_mapped() {
        let mapping = TableMapping {
            source_table: "unextracted_production".into(),
            target_table: "production".into(),
            business_key: "uuid".into(),
            fields: vec![FieldMapping {
                column: "method".into(),
                path: "method".into(),
                datatype: ExtractType::Varchar(None),
            }],
        };
        assert!(mapping.validate().is_err());
    }

    #[test]
    fn test_empty_path_segment_rejected() {
        let mapping = TableMapping {
            source_table: "unextracted_events".into(),
            target_table: "events".into(),
            business_key: "id".into(),
            fields: vec![FieldMapping {
                column: "id".into(),
                path: "properties..id".into(),
                datatype: ExtractType::Varchar(None),
            }],
        };
        assert!(mapping.validate().is_err());
    }
}
