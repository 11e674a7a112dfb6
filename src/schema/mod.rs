//! JSON structure analysis, SQL-vs-JSONB storage decisions, and DDL generation.

pub mod analyzer;
pub mod ddl;
pub mod decider;

pub use analyzer::{detect_json_type, flatten_json, FieldStats, JsonSchemaAnalyzer, JsonType};
pub use ddl::DdlGenerator;
pub use decider::{DeciderConfig, SchemaDecider, SchemaDecision, StorageChoice};
