//! Postgres DDL generation from a schema decision: `CREATE TABLE`, indexes,
//! and an insert-statement template.

use std::collections::HashSet;

use super::analyzer::JsonType;
use super::decider::SchemaDecision;

const RESERVED_WORDS: &[&str] = &["user", "group", "order", "table", "index", "key", "value", "default"];

pub struct DdlGenerator {
    include_fallback_jsonb: bool,
}

impl Default for DdlGenerator {
    fn default() -> Self {
        Self {
            include_fallback_jsonb: true,
        }
    }
}

impl DdlGenerator {
    pub fn new(include_fallback_jsonb: bool) -> Self {
        Self { include_fallback_jsonb }
    }

    fn map_json_type_to_sql(&self, json_type: JsonType, max_length: usize) -> String {
        match json_type {
            JsonType::Null => "TEXT".to_string(),
            JsonType::Boolean => "BOOLEAN".to_string(),
            JsonType::Integer => "BIGINT".to_string(),
            JsonType::Float => "DOUBLE PRECISION".to_string(),
            JsonType::String => string_sql_type(max_length),
            JsonType::Array | JsonType::Object => "JSONB".to_string(),
        }
    }

    /// Sanitizes a flattened field path into a valid, non-reserved column
    /// identifier: dots and `[]` become underscores, lowercased, any other
    /// non-alphanumeric becomes `_`, a leading digit gets a `col_` prefix,
    /// and reserved words get a `_col` suffix.
    pub fn sanitize_column_name(&self, name: &str) -> String {
        let mut name = name.replace('.', "_").replace("[]", "_array").to_lowercase();
        name = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect();

        if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            name = format!("col_{name}");
        }

        if RESERVED_WORDS.contains(&name.as_str()) {
            name = format!("{name}_col");
        }

        name
    }

    /// Generates `CREATE TABLE` DDL for an SQL-backed schema: a UUID
    /// primary key, one column per top-level field, an optional fallback
    /// `extra JSONB` column, and audit columns.
    pub fn generate_table_ddl(
        &self,
        table_name: &str,
        decision: &SchemaDecision,
        include_audit_columns: bool,
    ) -> String {
        let mut columns = vec!["    id UUID PRIMARY KEY DEFAULT gen_random_uuid()".to_string()];
        let (field_columns, indexes) = self.generate_column_definitions(table_name, decision);
        columns.extend(field_columns);

        if self.include_fallback_jsonb {
            columns.push("    extra JSONB".to_string());
        }

        if include_audit_columns {
            columns.push("    created_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW()".to_string());
            columns.push("    updated_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW()".to_string());
        }

        let mut lines = vec![
            format!("CREATE TABLE IF NOT EXISTS {table_name} ("),
            columns.join(",\n"),
            ");".to_string(),
        ];

        if !indexes.is_empty() {
            lines.push(String::new());
            lines.push(format!("-- Indexes for {table_name}"));
            lines.extend(indexes);
        }

        if self.include_fallback_jsonb {
            lines.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{table_name}_extra ON {table_name} USING GIN (extra);"
            ));
        }

        lines.join("\n")
    }

    fn generate_column_definitions(
        &self,
        table_name: &str,
        decision: &SchemaDecision,
    ) -> (Vec<String>, Vec<String>) {
        let mut columns = Vec::new();
        let mut indexes = Vec::new();
        let mut seen = HashSet::new();

        for (field_path, field) in &decision.fields {
            if field_path.contains('.') || field_path.ends_with("[]") {
                continue;
            }

            let mut col_name = self.sanitize_column_name(field_path);
            if seen.contains(&col_name) {
                col_name = format!("{col_name}_{}", seen.len());
            }
            seen.insert(col_name.clone());

            let sql_type = self.map_json_type_to_sql(field.dominant_type, field.max_length);
            let is_nullable = field.presence < 0.95;
            let nullable_clause = if is_nullable { "" } else { " NOT NULL" };
            columns.push(format!("    {col_name} {sql_type}{nullable_clause}"));

            let should_index = field.is_likely_fk
                || (field.presence > 0.8
                    && field.type_stability > 0.9
                    && matches!(field.dominant_type, JsonType::Integer | JsonType::String));

            if should_index {
                let index_sql = if sql_type == "JSONB" {
                    format!("CREATE INDEX IF NOT EXISTS idx_{col_name}_gin ON {table_name} USING GIN ({col_name});")
                } else {
                    format!("CREATE INDEX IF NOT EXISTS idx_{col_name} ON {table_name} ({col_name});")
                };
                indexes.push(index_sql);
            }
        }

        (columns, indexes)
    }

    /// Generates DDL for a JSONB document collection: a single `doc JSONB`
    /// payload column plus a GIN index for containment queries.
    pub fn generate_jsonb_collection_ddl(&self, collection_name: &str, include_audit_columns: bool) -> String {
        let mut lines = vec![
            format!("CREATE TABLE IF NOT EXISTS {collection_name} ("),
            "    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),".to_string(),
            "    doc JSONB NOT NULL".to_string(),
        ];

        if include_audit_columns {
            lines.push("    ,created_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW()".to_string());
            lines.push("    ,updated_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW()".to_string());
        }

        lines.push(");".to_string());
        lines.push(String::new());
        lines.push("-- GIN index for JSONB queries".to_string());
        lines.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{collection_name}_doc ON {collection_name} USING GIN (doc);"
        ));

        lines.join("\n")
    }

    /// Generates a named-placeholder `INSERT` template for the table.
    pub fn generate_insert_statement(&self, table_name: &str, decision: &SchemaDecision) -> String {
        let mut columns: Vec<String> = decision
            .fields
            .keys()
            .filter(|path| !path.contains('.') && !path.ends_with("[]"))
            .map(|path| self.sanitize_column_name(path))
            .collect();

        if self.include_fallback_jsonb {
            columns.push("extra".to_string());
        }

        let placeholders: Vec<String> = columns.iter().map(|c| format!(":{c}")).collect();
        format!(
            "INSERT INTO {table_name} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        )
    }
}

fn string_sql_type(max_length: usize) -> String {
    if max_length == 0 {
        "TEXT".to_string()
    } else if max_length <= 255 {
        format!("VARCHAR({max_length})")
    } else if max_length <= 1000 {
        "VARCHAR(1000)".to_string()
    } else {
        "TEXT".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::decider::{DeciderConfig, SchemaDecider};
    use serde_json::json;

    #[test]
    fn sanitizes_nested_and_array_paths() {
        let gen = DdlGenerator::default();
        assert_eq!(gen.sanitize_column_name("user.profile.name"), "user_profile_name");
        assert_eq!(gen.sanitize_column_name("tags[]"), "tags_array");
        assert_eq!(gen.sanitize_column_name("order"), "order_col");
        assert_eq!(gen.sanitize_column_name("1st"), "col_1st");
    }

    #[test]
    fn generates_table_ddl_with_extra_and_audit_columns() {
        let decider = SchemaDecider::new(DeciderConfig::default());
        let docs: Vec<_> = (0..10).map(|i| json!({"id": i, "name": format!("n{i}")})).collect();
        let decision = decider.decide(&docs);
        let ddl = DdlGenerator::default().generate_table_ddl("events", &decision, true);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS events"));
        assert!(ddl.contains("id UUID PRIMARY KEY"));
        assert!(ddl.contains("extra JSONB"));
        assert!(ddl.contains("created_at TIMESTAMP"));
    }

    #[test]
    fn indexes_likely_foreign_keys() {
        let decider = SchemaDecider::new(DeciderConfig::default());
        let docs: Vec<_> = (0..10).map(|i| json!({"user_id": i, "note": "x"})).collect();
        let decision = decider.decide(&docs);
        let ddl = DdlGenerator::default().generate_table_ddl("events", &decision, true);
        assert!(ddl.contains("idx_user_id"));
    }
}
