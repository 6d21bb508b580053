//! Built-in schema steps
//!
//! Each step reads the collections it changes into the shape that version
//! stored, converts them to the next shape and writes them back. Fields a
//! step does not know travel through `rest` untouched.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::{Migration, TransformError};

pub(super) fn builtin() -> Vec<Migration> {
    vec![
        Migration::new(1, "normalize_paper_status", normalize_paper_status),
        Migration::new(2, "embedded_entity_ids", embedded_entity_ids),
        Migration::new(3, "archive_and_suggestions", archive_and_suggestions),
        Migration::new(4, "analytical_collections", analytical_collections),
    ]
}

/// Rewrite every element of the array under `key` through a typed conversion.
/// A missing collection is left missing.
fn map_collection<In, Out, F>(mut state: Value, key: &str, mut convert: F) -> Result<Value, TransformError>
where
    In: DeserializeOwned,
    Out: Serialize,
    F: FnMut(In) -> Result<Out, TransformError>,
{
    let object = state
        .as_object_mut()
        .ok_or("stored state is not an object")?;
    let Some(items) = object.get_mut(key) else {
        return Ok(state);
    };
    let items = items
        .as_array_mut()
        .ok_or_else(|| format!("'{}' is not an array", key))?;

    for (index, item) in items.iter_mut().enumerate() {
        let typed: In = serde_json::from_value(item.take())
            .map_err(|e| format!("{}[{}]: {}", key, index, e))?;
        *item = serde_json::to_value(convert(typed)?)?;
    }
    Ok(state)
}

/// Fill in `createdAt` / `updatedAt` on entities written before they existed
fn stamp_timestamps(rest: &mut Map<String, Value>, now: &str) {
    let created = rest
        .entry("createdAt")
        .or_insert_with(|| Value::from(now))
        .clone();
    rest.entry("updatedAt").or_insert(created);
}

// ============================================================================
// v1: paper status fields
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperV0 {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reading_status: Option<String>,
    #[serde(default)]
    screening_decision: Option<String>,
    #[serde(default)]
    thesis_role: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaperV1 {
    reading_status: String,
    screening_decision: String,
    thesis_role: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Deserialize, Serialize)]
struct Stamped {
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn legacy_reading_status(status: &str) -> Result<&'static str, TransformError> {
    match status {
        "unread" | "to-read" | "toread" | "new" => Ok("unread"),
        "reading" | "in-progress" | "skimming" => Ok("reading"),
        "read" | "done" | "finished" => Ok("read"),
        other => Err(format!("unknown legacy reading status '{}'", other).into()),
    }
}

fn normalize_paper_status(state: Value) -> Result<Value, TransformError> {
    let now = Utc::now().to_rfc3339();

    let state = map_collection(state, "papers", |paper: PaperV0| {
        let reading_status = match (paper.reading_status, paper.status) {
            (Some(current), _) => current,
            (None, Some(legacy)) => legacy_reading_status(&legacy)?.to_string(),
            (None, None) => "unread".to_string(),
        };
        let thesis_role = match paper.thesis_role.as_deref() {
            None | Some("neutral") => "background".to_string(),
            Some(role) => role.to_string(),
        };
        let mut rest = paper.rest;
        stamp_timestamps(&mut rest, &now);
        Ok(PaperV1 {
            reading_status,
            screening_decision: paper
                .screening_decision
                .unwrap_or_else(|| "pending".to_string()),
            thesis_role,
            rest,
        })
    })?;

    let stamp = |mut entity: Stamped| -> Result<Stamped, TransformError> {
        stamp_timestamps(&mut entity.rest, &now);
        Ok(entity)
    };
    let state = map_collection(state, "theses", stamp)?;
    map_collection(state, "connections", stamp)
}

// ============================================================================
// v2: embedded argument and evidence ids
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperV1Embedded {
    #[serde(default)]
    arguments: Vec<ArgumentV1>,
    #[serde(default)]
    evidence: Vec<EvidenceV1>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Early blobs stored arguments as bare claim strings
#[derive(Deserialize)]
#[serde(untagged)]
enum ArgumentV1 {
    Claim(String),
    Record {
        #[serde(default)]
        id: Option<String>,
        #[serde(flatten)]
        rest: Map<String, Value>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvidenceV1 {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    linked_argument_index: Option<i64>,
    #[serde(default)]
    linked_argument_id: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaperV2 {
    arguments: Vec<ArgumentV2>,
    evidence: Vec<EvidenceV2>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Serialize)]
struct ArgumentV2 {
    id: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvidenceV2 {
    id: String,
    linked_argument_id: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn mint_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

const TOP_LEVEL_COLLECTIONS: [&str; 8] = [
    "theses",
    "papers",
    "connections",
    "themes",
    "gaps",
    "sections",
    "evidenceSyntheses",
    "clusters",
];

/// Ids of every top-level entity in a raw state
fn top_level_ids(state: &Value) -> HashSet<String> {
    TOP_LEVEL_COLLECTIONS
        .iter()
        .filter_map(|key| state.get(*key)?.as_array())
        .flatten()
        .filter_map(|entity| entity.get("id")?.as_str())
        .map(str::to_string)
        .collect()
}

/// Keep a carried-over id unless it is blank or already used; mint otherwise
fn claim_id(used: &mut HashSet<String>, carried: Option<&str>) -> String {
    if let Some(id) = carried.filter(|id| !id.is_empty()) {
        if used.insert(id.to_string()) {
            return id.to_string();
        }
        warn!(id, "Re-minting repeated embedded id");
    }
    loop {
        let id = mint_id();
        if used.insert(id.clone()) {
            return id;
        }
    }
}

fn embedded_entity_ids(state: Value) -> Result<Value, TransformError> {
    let mut used = top_level_ids(&state);

    map_collection(state, "papers", |paper: PaperV1Embedded| {
        let mut renamed: HashMap<String, String> = HashMap::new();
        let arguments: Vec<ArgumentV2> = paper
            .arguments
            .into_iter()
            .map(|argument| match argument {
                ArgumentV1::Claim(claim) => {
                    let mut rest = Map::new();
                    rest.insert("claim".to_string(), Value::from(claim));
                    ArgumentV2 {
                        id: claim_id(&mut used, None),
                        rest,
                    }
                }
                ArgumentV1::Record { id: carried, rest } => {
                    let id = claim_id(&mut used, carried.as_deref());
                    if let Some(old) = carried.filter(|old| !old.is_empty() && *old != id) {
                        renamed.entry(old).or_insert_with(|| id.clone());
                    }
                    ArgumentV2 { id, rest }
                }
            })
            .collect();
        let own: HashSet<&str> = arguments.iter().map(|a| a.id.as_str()).collect();

        let evidence = paper
            .evidence
            .into_iter()
            .map(|item| {
                let linked_argument_id = match item.linked_argument_id {
                    Some(link) if own.contains(link.as_str()) => Some(link),
                    Some(link) => Some(renamed.get(&link).cloned().unwrap_or(link)),
                    None => {
                        let index = item.linked_argument_index;
                        let found = index
                            .and_then(|i| usize::try_from(i).ok())
                            .and_then(|i| arguments.get(i))
                            .map(|a| a.id.clone());
                        if let (Some(index), None) = (index, &found) {
                            warn!(index, "Dropping evidence link to a missing argument");
                        }
                        found
                    }
                };
                EvidenceV2 {
                    id: claim_id(&mut used, item.id.as_deref()),
                    linked_argument_id,
                    rest: item.rest,
                }
            })
            .collect();

        Ok(PaperV2 {
            arguments,
            evidence,
            rest: paper.rest,
        })
    })
}

// ============================================================================
// v3: archiving and assistant suggestions
// ============================================================================

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThesisV3 {
    #[serde(default)]
    is_archived: bool,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionV3 {
    #[serde(rename = "type")]
    connection_type: String,
    #[serde(default)]
    ai_suggested: bool,
    #[serde(default)]
    ai_confidence: Option<f64>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn archive_and_suggestions(state: Value) -> Result<Value, TransformError> {
    let state = map_collection(state, "theses", |thesis: ThesisV3| Ok(thesis))?;
    map_collection(state, "connections", |mut connection: ConnectionV3| {
        // v2 wrote snake_case connection types
        connection.connection_type = connection.connection_type.replace('_', "-");
        Ok(connection)
    })
}

// ============================================================================
// v4: analytical collections
// ============================================================================

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateV4 {
    #[serde(default)]
    themes: Vec<Value>,
    #[serde(default)]
    gaps: Vec<Value>,
    #[serde(default)]
    sections: Vec<Value>,
    #[serde(default)]
    evidence_syntheses: Vec<Value>,
    #[serde(default)]
    clusters: Vec<Value>,
    #[serde(default)]
    applied_migrations: Vec<u32>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn analytical_collections(state: Value) -> Result<Value, TransformError> {
    let typed: StateV4 = serde_json::from_value(state)?;
    Ok(serde_json::to_value(typed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_v1_normalizes_legacy_paper() {
        let state = json!({
            "papers": [{
                "id": "p1",
                "title": "Sleep spindles",
                "status": "done",
                "thesisRole": "neutral",
                "doi": "10.1/x"
            }]
        });
        let out = normalize_paper_status(state).unwrap();
        let paper = &out["papers"][0];

        assert_eq!(paper["readingStatus"], json!("read"));
        assert_eq!(paper["screeningDecision"], json!("pending"));
        assert_eq!(paper["thesisRole"], json!("background"));
        assert!(paper.get("status").is_none());
        assert_eq!(paper["doi"], json!("10.1/x"));
        assert_eq!(paper["createdAt"], paper["updatedAt"]);
    }

    #[test]
    fn test_v1_rejects_unknown_status() {
        let state = json!({ "papers": [{ "id": "p1", "status": "lost" }] });
        assert!(normalize_paper_status(state).is_err());
    }

    #[test]
    fn test_v1_keeps_existing_timestamps() {
        let state = json!({
            "theses": [{ "id": "t1", "createdAt": "2020-01-01T00:00:00Z" }]
        });
        let out = normalize_paper_status(state).unwrap();
        assert_eq!(out["theses"][0]["updatedAt"], json!("2020-01-01T00:00:00Z"));
    }

    #[test]
    fn test_v2_reassigns_repeated_carried_ids() {
        let state = json!({
            "theses": [{ "id": "t1" }],
            "papers": [
                { "id": "p1", "arguments": [{ "id": "a1", "claim": "A" }, { "id": "t1", "claim": "B" }] },
                {
                    "id": "p2",
                    "arguments": [{ "id": "a1", "claim": "A again" }],
                    "evidence": [{ "id": "a1", "description": "EEG", "linkedArgumentId": "a1" }]
                }
            ]
        });
        let out = embedded_entity_ids(state).unwrap();
        let p1 = &out["papers"][0];
        let p2 = &out["papers"][1];

        assert_eq!(p1["arguments"][0]["id"], json!("a1"));
        assert_ne!(p1["arguments"][1]["id"], json!("t1"));
        let moved = p2["arguments"][0]["id"].clone();
        assert_ne!(moved, json!("a1"));
        assert_eq!(p2["evidence"][0]["linkedArgumentId"], moved);
        assert_ne!(p2["evidence"][0]["id"], json!("a1"));
        assert_ne!(p2["evidence"][0]["id"], moved);
    }

    #[test]
    fn test_v2_resolves_argument_indexes() {
        let state = json!({
            "papers": [{
                "id": "p1",
                "arguments": ["Spindles predict recall", { "claim": "REM matters", "id": "a2" }],
                "evidence": [
                    { "description": "EEG", "linkedArgumentIndex": 1 },
                    { "description": "Survey", "linkedArgumentIndex": 7 }
                ]
            }]
        });
        let out = embedded_entity_ids(state).unwrap();
        let paper = &out["papers"][0];

        assert_eq!(paper["arguments"][0]["claim"], json!("Spindles predict recall"));
        assert!(paper["arguments"][0]["id"].as_str().is_some());
        assert_eq!(paper["evidence"][0]["linkedArgumentId"], json!("a2"));
        assert_eq!(paper["evidence"][1]["linkedArgumentId"], Value::Null);
        assert!(paper["evidence"][0].get("linkedArgumentIndex").is_none());
    }

    #[test]
    fn test_v3_defaults_and_renames() {
        let state = json!({
            "theses": [{ "id": "t1" }],
            "connections": [{ "id": "c1", "type": "uses_method" }]
        });
        let out = archive_and_suggestions(state).unwrap();

        assert_eq!(out["theses"][0]["isArchived"], json!(false));
        assert_eq!(out["connections"][0]["type"], json!("uses-method"));
        assert_eq!(out["connections"][0]["aiSuggested"], json!(false));
    }

    #[test]
    fn test_v4_adds_collections() {
        let out = analytical_collections(json!({ "theses": [] })).unwrap();
        for key in ["themes", "gaps", "sections", "evidenceSyntheses", "clusters"] {
            assert_eq!(out[key], json!([]), "{}", key);
        }
        assert_eq!(out["theses"], json!([]));
    }

    #[test]
    fn test_collection_must_be_array() {
        let state = json!({ "papers": { "p1": {} } });
        assert!(embedded_entity_ids(state).is_err());
    }
}
