//! SQL-vs-JSONB storage decision for a batch of JSON documents.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::analyzer::{FieldSummary, JsonSchemaAnalyzer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageChoice {
    Sql,
    Jsonb,
}

impl fmt::Display for StorageChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageChoice::Sql => f.write_str("sql"),
            StorageChoice::Jsonb => f.write_str("jsonb"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeciderConfig {
    pub sample_size: usize,
    pub stability_threshold: f64,
    pub max_top_level_keys: usize,
    pub max_depth: usize,
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self {
            sample_size: 128,
            stability_threshold: 0.6,
            max_top_level_keys: 20,
            max_depth: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaDecision {
    pub storage_choice: StorageChoice,
    pub confidence: f64,
    pub reason: String,
    pub documents_analyzed: usize,
    pub top_level_keys: usize,
    pub max_depth: usize,
    pub field_stability: f64,
    pub type_stability: f64,
    pub has_array_of_objects: bool,
    pub structure_hash: String,
    pub fields: BTreeMap<String, FieldSummary>,
}

pub struct SchemaDecider {
    config: DeciderConfig,
}

impl SchemaDecider {
    pub fn new(config: DeciderConfig) -> Self {
        Self { config }
    }

    /// Analyzes `documents` and returns the storage decision. Analyzes at a
    /// depth deeper than the decision threshold so the decider can tell
    /// "shallow and stable" apart from "shallow because we stopped looking".
    pub fn decide(&self, documents: &[Value]) -> SchemaDecision {
        let analysis_depth = (self.config.max_depth + 3).max(5);
        let mut analyzer = JsonSchemaAnalyzer::new(analysis_depth, self.config.sample_size);
        analyzer.analyze_batch(documents);
        let summary = analyzer.summary();

        let mut sql_score = 0.0;
        let mut reasons = Vec::new();

        if summary.top_level_keys <= self.config.max_top_level_keys {
            sql_score += 0.25;
            reasons.push(format!(
                "manageable number of top-level keys ({} <= {})",
                summary.top_level_keys, self.config.max_top_level_keys
            ));
        } else {
            reasons.push(format!(
                "too many top-level keys ({} > {})",
                summary.top_level_keys, self.config.max_top_level_keys
            ));
        }

        if summary.max_depth <= self.config.max_depth {
            sql_score += 0.25;
            reasons.push(format!(
                "shallow nesting depth ({} <= {})",
                summary.max_depth, self.config.max_depth
            ));
        } else {
            reasons.push(format!(
                "deep nesting detected ({} > {})",
                summary.max_depth, self.config.max_depth
            ));
        }

        if summary.field_stability >= self.config.stability_threshold {
            sql_score += 0.25;
            reasons.push(format!(
                "high field stability ({:.2} >= {:.2})",
                summary.field_stability, self.config.stability_threshold
            ));
        } else {
            reasons.push(format!(
                "low field stability ({:.2} < {:.2})",
                summary.field_stability, self.config.stability_threshold
            ));
        }

        if summary.type_stability >= 0.9 {
            sql_score += 0.15;
            reasons.push(format!("consistent field types ({:.2})", summary.type_stability));
        } else {
            reasons.push(format!("inconsistent field types ({:.2})", summary.type_stability));
        }

        if !summary.has_array_of_objects {
            sql_score += 0.10;
            reasons.push("no complex nested arrays".to_string());
        } else {
            reasons.push("contains arrays of objects (requires child tables)".to_string());
        }

        let joined = reasons.join("; ");
        let (storage_choice, confidence, reason) = if summary.has_array_of_objects {
            (StorageChoice::Jsonb, 0.95, format!("JSONB storage required: {joined}"))
        } else if summary.top_level_keys > self.config.max_top_level_keys {
            (StorageChoice::Jsonb, 0.90, format!("JSONB storage required: {joined}"))
        } else if summary.max_depth > self.config.max_depth {
            (StorageChoice::Jsonb, 0.90, format!("JSONB storage required: {joined}"))
        } else if sql_score >= 0.85 {
            (StorageChoice::Sql, sql_score, format!("SQL storage recommended: {joined}"))
        } else {
            (
                StorageChoice::Jsonb,
                1.0 - sql_score,
                format!("JSONB storage recommended: {joined}"),
            )
        };

        SchemaDecision {
            storage_choice,
            confidence,
            reason,
            documents_analyzed: summary.documents_analyzed,
            top_level_keys: summary.top_level_keys,
            max_depth: summary.max_depth,
            field_stability: summary.field_stability,
            type_stability: summary.type_stability,
            has_array_of_objects: summary.has_array_of_objects,
            structure_hash: summary.structure_hash,
            fields: summary.fields,
        }
    }

    /// Derives a collection/table name, preferring a sanitized hint over
    /// the hash-based fallback.
    pub fn generate_collection_name(&self, decision: &SchemaDecision, hint: Option<&str>) -> String {
        let hash_prefix = &decision.structure_hash[..8.min(decision.structure_hash.len())];

        if let Some(hint) = hint {
            let mut name: String = hint
                .to_lowercase()
                .replace(' ', "_")
                .replace('-', "_")
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if let Some(first) = name.chars().next() {
                if first.is_alphabetic() || first == '_' {
                    return std::mem::take(&mut name);
                }
            }
        }

        match decision.storage_choice {
            StorageChoice::Sql => format!("table_{hash_prefix}"),
            StorageChoice::Jsonb => format!("docs_{hash_prefix}"),
        }
    }
}

impl fmt::Display for SchemaDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "SCHEMA DECISION ANALYSIS")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Storage Choice: {}", self.storage_choice.to_string().to_uppercase())?;
        writeln!(f, "Confidence: {:.1}%", self.confidence * 100.0)?;
        writeln!(f)?;
        writeln!(f, "Analysis Results:")?;
        writeln!(f, "  - Documents Analyzed: {}", self.documents_analyzed)?;
        writeln!(f, "  - Top-Level Keys: {}", self.top_level_keys)?;
        writeln!(f, "  - Maximum Depth: {}", self.max_depth)?;
        writeln!(f, "  - Field Stability: {:.2}%", self.field_stability * 100.0)?;
        writeln!(f, "  - Type Stability: {:.2}%", self.type_stability * 100.0)?;
        writeln!(f, "  - Has Array of Objects: {}", self.has_array_of_objects)?;
        writeln!(f)?;
        writeln!(f, "Decision Rationale:")?;
        writeln!(f, "{}", self.reason)?;
        write!(f, "{}", "=".repeat(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stable_docs(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"id": i, "name": format!("item-{i}"), "active": true}))
            .collect()
    }

    #[test]
    fn stable_shallow_documents_choose_sql() {
        let decider = SchemaDecider::new(DeciderConfig::default());
        let decision = decider.decide(&stable_docs(20));
        assert_eq!(decision.storage_choice, StorageChoice::Sql);
        assert!(decision.confidence >= 0.85);
    }

    #[test]
    fn array_of_objects_forces_jsonb() {
        let decider = SchemaDecider::new(DeciderConfig::default());
        let docs: Vec<Value> = (0..10)
            .map(|i| json!({"id": i, "items": [{"x": 1}, {"x": 2}]}))
            .collect();
        let decision = decider.decide(&docs);
        assert_eq!(decision.storage_choice, StorageChoice::Jsonb);
        assert_eq!(decision.confidence, 0.95);
    }

    #[test]
    fn too_many_top_level_keys_forces_jsonb() {
        let config = DeciderConfig {
            max_top_level_keys: 2,
            ..Default::default()
        };
        let decider = SchemaDecider::new(config);
        let docs = vec![json!({"a": 1, "b": 2, "c": 3, "d": 4})];
        let decision = decider.decide(&docs);
        assert_eq!(decision.storage_choice, StorageChoice::Jsonb);
        assert_eq!(decision.confidence, 0.90);
    }

    #[test]
    fn collection_name_prefers_sanitized_hint() {
        let decider = SchemaDecider::new(DeciderConfig::default());
        let decision = decider.decide(&stable_docs(5));
        let name = decider.generate_collection_name(&decision, Some("User Events"));
        assert_eq!(name, "user_events");
    }

    #[test]
    fn collection_name_falls_back_to_hash() {
        let decider = SchemaDecider::new(DeciderConfig::default());
        let decision = decider.decide(&stable_docs(5));
        let name = decider.generate_collection_name(&decision, None);
        assert!(name.starts_with("table_"));
    }
}
