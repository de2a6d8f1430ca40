// Data models for the flight store
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One imported flight log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub name: String,
    pub table_name: String,
    pub created_at: DateTime<Utc>,
    pub source_path: String,
    pub source_sha256: String,
    pub row_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub row_count: i64,
    pub column_count: i64,
    pub analyzed: bool,
}

/// Storage type of a column, inferred from the first data row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Numeric,
    Text,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Numeric => "numeric",
            ParamType::Text => "text",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "numeric" => ParamType::Numeric,
            _ => ParamType::Text,
        }
    }

    /// SQLite column type used in the flight's data table
    pub fn sql_type(&self) -> &'static str {
        match self {
            ParamType::Numeric => "NUMERIC",
            ParamType::Text => "VARCHAR(255)",
        }
    }
}

/// One column of an imported flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Position in the source header
    pub ordinal: usize,

    /// Header text as it appeared in the file
    pub raw_name: String,

    /// Name with spaces, commas, slashes, hyphens and asterisks removed
    pub name: String,

    pub param_type: ParamType,

    /// False for duplicate or empty names; such columns are not stored
    pub good: bool,
}
