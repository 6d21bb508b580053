//! Stored blobs as earlier builds wrote them

use serde_json::{json, Value};

/// A blob from before schema versioning: no `schemaVersion`, legacy paper
/// status, bare-string arguments, index-linked evidence, snake_case
/// connection types and no analytical collections.
pub fn legacy_v0_blob() -> Value {
    json!({
        "theses": [{
            "id": "t1",
            "title": "Sleep and memory consolidation",
            "paperIds": ["p1", "p2"]
        }],
        "papers": [
            {
                "id": "p1",
                "thesisId": "t1",
                "title": "Spindles and recall",
                "status": "done",
                "thesisRole": "neutral",
                "arguments": ["Spindle density predicts recall"],
                "evidence": [{
                    "description": "EEG study, n=40",
                    "type": "empirical",
                    "linkedArgumentIndex": 0
                }]
            },
            {
                "id": "p2",
                "thesisId": "t1",
                "title": "Replay in rodents",
                "thesisRole": "supports"
            }
        ],
        "connections": [{
            "id": "c1",
            "thesisId": "t1",
            "fromPaperId": "p2",
            "toPaperId": "p1",
            "type": "uses_method"
        }]
    })
}

/// A blob stamped by a build newer than this one
pub fn future_blob(version: u32) -> Value {
    json!({
        "schemaVersion": version,
        "theses": [],
        "papers": [],
        "hologramIndex": {"enabled": true}
    })
}
