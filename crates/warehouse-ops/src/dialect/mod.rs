//! Engine dialect capabilities.
//!
//! The warehouse runs one of two engines that both speak the PostgreSQL
//! wire protocol: the columnar production engine (Redshift) and the
//! conventional row-store engine used in development and test. The handful
//! of behavioral differences between them live here as one capability
//! object; no other module branches on engine identity.

use crate::ident;
use serde::{Deserialize, Serialize};

/// Which engine the warehouse connection points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Columnar analytics engine (production).
    Redshift,
    /// Conventional row-store engine (development/test stand-in).
    Postgres,
}

/// How a deduplicated staging table is folded into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStrategy {
    /// Native `MERGE INTO ... REMOVE DUPLICATES`.
    Merge,
    /// `INSERT ... ON CONFLICT (key) DO UPDATE SET`.
    InsertOnConflict,
}

impl Dialect {
    /// Concrete storage type for the logical `json` datatype.
    pub fn json_storage_type(&self) -> &'static str {
        match self {
            Dialect::Redshift => "SUPER",
            Dialect::Postgres => "JSONB",
        }
    }

    /// Default length applied to unsized string/text columns, if any.
    pub fn default_string_limit(&self) -> Option<u32> {
        match self {
            Dialect::Redshift => Some(256),
            Dialect::Postgres => None,
        }
    }

    /// Whether `ALTER TABLE ... ALTER COLUMN ... TYPE` works for arbitrary
    /// retyping. The columnar engine only allows it for VARCHAR length
    /// changes; everything else needs a rebuild-and-backfill.
    pub fn supports_in_place_retype(&self) -> bool {
        match self {
            Dialect::Redshift => false,
            Dialect::Postgres => true,
        }
    }

    /// Whether ADD PRIMARY KEY / ADD UNIQUE take an explicit constraint
    /// name. The columnar engine names its constraints itself.
    pub fn supports_named_key_constraints(&self) -> bool {
        match self {
            Dialect::Redshift => false,
            Dialect::Postgres => true,
        }
    }

    /// How staged rows are merged into a target table.
    pub fn upsert_strategy(&self) -> UpsertStrategy {
        match self {
            Dialect::Redshift => UpsertStrategy::Merge,
            Dialect::Postgres => UpsertStrategy::InsertOnConflict,
        }
    }

    /// Render an expression extracting `path` from a semi-structured
    /// `column`. `path` is a dot-separated key chain.
    ///
    /// The columnar engine navigates SUPER values with dot-chained
    /// accessors and returns native types. The conventional engine chains
    /// `->` operators over quoted segments, unwrapping to text with `->>`
    /// on the last segment when the declared target type is textual.
    /// Either form yields SQL NULL when the path is absent from a payload.
    pub fn json_path_expr(&self, column: &str, path: &str, as_text: bool) -> String {
        match self {
            Dialect::Redshift => format!("{}.{}", column, path),
            Dialect::Postgres => {
                let segments: Vec<String> =
                    path.split('.').map(ident::quote_literal).collect();
                if as_text {
                    if segments.len() == 1 {
                        format!("({}->>{})", column, segments[0])
                    } else {
                        let last = &segments[segments.len() - 1];
                        let init = &segments[..segments.len() - 1];
                        format!("({}->{}->>{})", column, init.join("->"), last)
                    }
                } else {
                    format!("({}->{})", column, segments.join("->"))
                }
            }
        }
    }

    /// Catalog probe verifying that a column carries NOT NULL, with
    /// parameters `$1 = schema`, `$2 = table`, `$3 = column`. The columnar
    /// engine's information_schema view of nullability is unreliable, so
    /// it is probed through pg_catalog instead.
    pub fn not_null_probe_sql(&self) -> &'static str {
        match self {
            Dialect::Redshift => {
                "SELECT a.attname AS column_name \
                 FROM pg_catalog.pg_namespace n \
                 JOIN pg_catalog.pg_class c ON n.oid = c.relnamespace \
                 JOIN pg_catalog.pg_attribute a ON c.oid = a.attrelid \
                 WHERE n.nspname = $1 \
                   AND c.relname = $2 \
                   AND a.attname = $3 \
                   AND a.attnotnull = true \
                   AND a.attnum > 0"
            }
            Dialect::Postgres => {
                "SELECT column_name \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 \
                   AND table_name = $2 \
                   AND column_name = $3 \
                   AND is_nullable = 'NO'"
            }
        }
    }
}
