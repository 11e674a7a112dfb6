//! JSON structure analysis: type detection, field-presence statistics,
//! and flattening of nested documents into `(path, type, depth)` triples.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Float => "float",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        };
        f.write_str(s)
    }
}

pub fn detect_json_type(value: &Value) -> JsonType {
    match value {
        Value::Null => JsonType::Null,
        Value::Bool(_) => JsonType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
        Value::Number(_) => JsonType::Float,
        Value::String(_) => JsonType::String,
        Value::Array(_) => JsonType::Array,
        Value::Object(_) => JsonType::Object,
    }
}

/// One flattened field observation: value, detected type, nesting depth.
#[derive(Debug, Clone)]
pub struct FlatField {
    pub value: Value,
    pub json_type: JsonType,
    pub depth: usize,
}

/// Flattens a JSON object into dotted-path fields up to `max_depth`.
///
/// Arrays whose first element is an object are additionally recorded under
/// `path[]` so the decider can veto them without descending into them.
pub fn flatten_json(obj: &Value, max_depth: usize) -> BTreeMap<String, FlatField> {
    let mut result = BTreeMap::new();
    flatten_into(obj, max_depth, "", 0, &mut result);
    result
}

fn flatten_into(
    obj: &Value,
    max_depth: usize,
    parent_path: &str,
    current_depth: usize,
    result: &mut BTreeMap<String, FlatField>,
) {
    let Value::Object(map) = obj else { return };

    for (key, value) in map {
        let path = if parent_path.is_empty() {
            key.clone()
        } else {
            format!("{parent_path}.{key}")
        };
        let depth = current_depth + 1;
        let json_type = detect_json_type(value);

        result.insert(
            path.clone(),
            FlatField {
                value: value.clone(),
                json_type,
                depth,
            },
        );

        if json_type == JsonType::Object && depth < max_depth {
            flatten_into(value, max_depth, &path, depth, result);
        } else if json_type == JsonType::Array && depth < max_depth {
            if let Some(Value::Object(_)) = value.as_array().and_then(|a| a.first()) {
                result.insert(
                    format!("{path}[]"),
                    FlatField {
                        value: value.clone(),
                        json_type: JsonType::Array,
                        depth,
                    },
                );
            }
        }
    }
}

/// Per-field statistics accumulated across a batch of documents.
#[derive(Debug, Clone, Default)]
pub struct FieldStats {
    pub path: String,
    pub type_counts: HashMap<JsonType, usize>,
    pub presence_count: usize,
    pub null_count: usize,
    pub max_value_length: usize,
}

impl FieldStats {
    fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    fn add_value(&mut self, value: &Value, json_type: JsonType) {
        self.presence_count += 1;
        *self.type_counts.entry(json_type).or_insert(0) += 1;

        if value.is_null() {
            self.null_count += 1;
        }

        if json_type == JsonType::String {
            if let Some(s) = value.as_str() {
                self.max_value_length = self.max_value_length.max(s.len());
            }
        }
    }

    /// Returns the most commonly observed type and the fraction of
    /// observations it accounts for.
    pub fn dominant_type(&self) -> (JsonType, f64) {
        let Some((dominant, count)) = self.type_counts.iter().max_by_key(|(_, c)| **c) else {
            return (JsonType::Null, 1.0);
        };
        let total: usize = self.type_counts.values().sum();
        let stability = if total > 0 {
            *count as f64 / total as f64
        } else {
            0.0
        };
        (*dominant, stability)
    }

    pub fn presence_fraction(&self, total_docs: usize) -> f64 {
        if total_docs == 0 {
            0.0
        } else {
            self.presence_count as f64 / total_docs as f64
        }
    }

    pub fn is_likely_foreign_key(&self) -> bool {
        let lower = self.path.to_lowercase();
        lower.ends_with("_id") || lower.ends_with("_key") || lower.contains("id")
    }
}

/// Summary of one field, as surfaced in `AnalysisSummary`.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    pub dominant_type: JsonType,
    pub type_stability: f64,
    pub presence: f64,
    pub null_fraction: f64,
    pub max_length: usize,
    pub is_likely_fk: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub documents_analyzed: usize,
    pub total_fields: usize,
    pub top_level_keys: usize,
    pub max_depth: usize,
    pub field_stability: f64,
    pub type_stability: f64,
    pub has_array_of_objects: bool,
    pub structure_hash: String,
    pub fields: BTreeMap<String, FieldSummary>,
}

/// Analyzes a bounded sample of JSON documents, accumulating per-field
/// statistics used by the storage decider and DDL generator.
pub struct JsonSchemaAnalyzer {
    max_depth: usize,
    max_sample_size: usize,
    field_stats: BTreeMap<String, FieldStats>,
    documents_analyzed: usize,
    max_observed_depth: usize,
    top_level_keys: HashSet<String>,
}

impl JsonSchemaAnalyzer {
    pub fn new(max_depth: usize, max_sample_size: usize) -> Self {
        Self {
            max_depth,
            max_sample_size,
            field_stats: BTreeMap::new(),
            documents_analyzed: 0,
            max_observed_depth: 0,
            top_level_keys: HashSet::new(),
        }
    }

    pub fn analyze_document(&mut self, doc: &Value) {
        if self.documents_analyzed >= self.max_sample_size {
            return;
        }
        self.documents_analyzed += 1;

        if let Value::Object(map) = doc {
            self.top_level_keys.extend(map.keys().cloned());
        }

        for (path, field) in flatten_json(doc, self.max_depth) {
            self.max_observed_depth = self.max_observed_depth.max(field.depth);
            self.field_stats
                .entry(path.clone())
                .or_insert_with(|| FieldStats::new(path))
                .add_value(&field.value, field.json_type);
        }
    }

    /// Analyzes a batch, truncating to `max_sample_size` documents. The
    /// analyzer does not reshuffle the batch — callers that want a random
    /// sample should shuffle before calling, matching how callers upstream
    /// already control document ordering.
    pub fn analyze_batch(&mut self, documents: &[Value]) {
        for doc in documents.iter().take(self.max_sample_size) {
            self.analyze_document(doc);
        }
    }

    pub fn field_stability(&self) -> f64 {
        let top_level: Vec<&FieldStats> = self
            .field_stats
            .values()
            .filter(|s| !s.path.contains('.') && !s.path.ends_with("[]"))
            .collect();

        if top_level.is_empty() {
            return 0.0;
        }

        let total: f64 = top_level
            .iter()
            .map(|s| s.presence_fraction(self.documents_analyzed))
            .sum();
        total / top_level.len() as f64
    }

    pub fn type_stability(&self) -> f64 {
        if self.field_stats.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .field_stats
            .values()
            .map(|s| s.dominant_type().1)
            .sum();
        total / self.field_stats.len() as f64
    }

    pub fn has_array_of_objects(&self) -> bool {
        self.field_stats.keys().any(|p| p.ends_with("[]"))
    }

    /// SHA-256 over the sorted `{path: dominant_type}` map, stable across
    /// runs given the same observed field set.
    pub fn structure_hash(&self) -> String {
        let schema_repr: BTreeMap<&str, String> = self
            .field_stats
            .iter()
            .map(|(path, stats)| (path.as_str(), stats.dominant_type().0.to_string()))
            .collect();
        let schema_str = serde_json::to_string(&schema_repr).expect("map of strings always serializes");
        let digest = Sha256::digest(schema_str.as_bytes());
        format!("{digest:x}")
    }

    pub fn summary(&self) -> AnalysisSummary {
        let fields = self
            .field_stats
            .iter()
            .map(|(path, stats)| {
                let (dominant_type, type_stability) = stats.dominant_type();
                let null_fraction = if stats.presence_count > 0 {
                    stats.null_count as f64 / stats.presence_count as f64
                } else {
                    0.0
                };
                (
                    path.clone(),
                    FieldSummary {
                        dominant_type,
                        type_stability,
                        presence: stats.presence_fraction(self.documents_analyzed),
                        null_fraction,
                        max_length: stats.max_value_length,
                        is_likely_fk: stats.is_likely_foreign_key(),
                    },
                )
            })
            .collect();

        AnalysisSummary {
            documents_analyzed: self.documents_analyzed,
            total_fields: self.field_stats.len(),
            top_level_keys: self.top_level_keys.len(),
            max_depth: self.max_observed_depth,
            field_stability: self.field_stability(),
            type_stability: self.type_stability(),
            has_array_of_objects: self.has_array_of_objects(),
            structure_hash: self.structure_hash(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_objects_up_to_depth() {
        let doc = json!({"a": 1, "b": {"c": "x", "d": {"e": true}}});
        let flat = flatten_json(&doc, 3);
        assert!(flat.contains_key("a"));
        assert!(flat.contains_key("b"));
        assert!(flat.contains_key("b.c"));
        assert!(flat.contains_key("b.d"));
        assert!(!flat.contains_key("b.d.e"));
    }

    #[test]
    fn marks_arrays_of_objects() {
        let doc = json!({"items": [{"x": 1}, {"x": 2}]});
        let flat = flatten_json(&doc, 3);
        assert!(flat.contains_key("items[]"));
    }

    #[test]
    fn structure_hash_is_stable_for_same_shape() {
        let mut a = JsonSchemaAnalyzer::new(5, 128);
        a.analyze_document(&json!({"name": "alice", "age": 30}));
        let mut b = JsonSchemaAnalyzer::new(5, 128);
        b.analyze_document(&json!({"name": "bob", "age": 40}));
        assert_eq!(a.structure_hash(), b.structure_hash());
    }

    #[test]
    fn type_stability_drops_when_types_vary() {
        let mut analyzer = JsonSchemaAnalyzer::new(5, 128);
        analyzer.analyze_document(&json!({"x": 1}));
        analyzer.analyze_document(&json!({"x": "one"}));
        assert!(analyzer.type_stability() < 1.0);
    }

    #[test]
    fn sample_size_caps_documents_analyzed() {
        let mut analyzer = JsonSchemaAnalyzer::new(5, 2);
        for i in 0..5 {
            analyzer.analyze_document(&json!({"n": i}));
        }
        assert_eq!(analyzer.summary().documents_analyzed, 2);
    }
}
