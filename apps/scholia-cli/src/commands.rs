//! Command implementations
//!
//! Each command opens the store, which loads and migrates it, and writes
//! JSON or plain lines to `out`. The returned flag is false when the exit
//! code should signal a problem.

use std::io::Write;

use anyhow::Context;
use serde_json::{json, Value};

use scholia_domain::ThesisId;
use scholia_store::{EntityStore, StoreConfig};

fn open(config: &StoreConfig) -> anyhow::Result<EntityStore> {
    EntityStore::open(config).with_context(|| {
        format!(
            "opening {:?} store in {}",
            config.backend,
            config.resolved_data_dir().display()
        )
    })
}

fn print_json(out: &mut impl Write, value: &impl serde::Serialize, pretty: bool) -> anyhow::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn status(config: &StoreConfig, out: &mut impl Write) -> anyhow::Result<bool> {
    let store = open(config)?;
    let snapshot = store.snapshot();
    let index = store.index();

    let theses: Vec<Value> = snapshot
        .theses
        .iter()
        .map(|thesis| json!(index.thesis_overview(&thesis.id)))
        .collect();
    let attachments = store
        .attachments()
        .owners()
        .context("listing attachments")?;
    let report = json!({
        "namespace": config.namespace,
        "backend": config.backend,
        "dataDir": config.resolved_data_dir(),
        "mode": store.mode(),
        "schemaVersion": snapshot.schema_version,
        "appliedMigrations": snapshot.applied_migrations,
        "migration": store.migration_report(),
        "loadError": store.load_error(),
        "repairs": store.repairs().iter().map(ToString::to_string).collect::<Vec<_>>(),
        "activeThesisId": snapshot.active_thesis_id,
        "theses": theses,
        "attachments": attachments,
    });
    print_json(out, &report, true)?;

    Ok(store.migration_report().success && store.load_error().is_none())
}

pub fn migrate(config: &StoreConfig, out: &mut impl Write) -> anyhow::Result<bool> {
    let store = open(config)?;
    let report = store.migration_report();
    print_json(out, report, true)?;
    Ok(report.success)
}

/// Violations repaired at load plus any left in the reconciled state
pub fn verify(config: &StoreConfig, out: &mut impl Write) -> anyhow::Result<bool> {
    let store = open(config)?;
    let remaining = store.verify_integrity();
    let found: Vec<_> = store.repairs().iter().chain(remaining.iter()).collect();

    for violation in &found {
        writeln!(out, "{}", violation)?;
    }
    if found.is_empty() {
        writeln!(out, "ok: {} theses, {} papers", store.list_theses().len(), store.list_papers(None).len())?;
    } else {
        writeln!(out, "{} violation(s)", found.len())?;
    }
    Ok(found.is_empty())
}

pub fn stats(config: &StoreConfig, thesis: &str, out: &mut impl Write) -> anyhow::Result<bool> {
    let store = open(config)?;
    let id = ThesisId::from(thesis);
    if store.get_thesis(&id).is_none() {
        anyhow::bail!("no thesis with id '{}'", thesis);
    }

    let index = store.index();
    let roles: serde_json::Map<String, Value> = index
        .role_distribution(&id)
        .into_iter()
        .map(|(role, count)| (role.to_string(), json!(count)))
        .collect();
    let stats = json!({
        "overview": index.thesis_overview(&id),
        "roles": roles,
        "tags": index.tag_counts(&id),
    });
    print_json(out, &stats, true)?;
    Ok(true)
}

pub fn export(config: &StoreConfig, pretty: bool, out: &mut impl Write) -> anyhow::Result<bool> {
    let store = open(config)?;
    print_json(out, store.snapshot(), pretty)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholia_domain::{NewPaper, NewThesis};
    use scholia_store::BackendKind;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> StoreConfig {
        StoreConfig {
            data_dir: Some(dir.path().to_path_buf()),
            backend: BackendKind::File,
            ..StoreConfig::default()
        }
    }

    fn seeded(dir: &TempDir) -> ThesisId {
        let mut store = EntityStore::open(&config(dir)).unwrap();
        let thesis = store.create_thesis(NewThesis::new("T1")).unwrap();
        store.attach_pending_file("upload-1", b"%PDF").unwrap();
        store
            .add_paper_with_attachment(
                NewPaper::new(thesis.id.clone(), "P1").with_tags(["eeg"]),
                "upload-1",
            )
            .unwrap();
        thesis.id
    }

    #[test]
    fn test_status_lists_theses() {
        let dir = TempDir::new().unwrap();
        seeded(&dir);
        let mut out = Vec::new();

        assert!(status(&config(&dir), &mut out).unwrap());
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["mode"], json!("readwrite"));
        assert_eq!(value["theses"][0]["papers"], json!(1));
        assert_eq!(value["attachments"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_verify_clean_store() {
        let dir = TempDir::new().unwrap();
        seeded(&dir);
        let mut out = Vec::new();

        assert!(verify(&config(&dir), &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("ok: 1 theses"));
    }

    #[test]
    fn test_stats_unknown_thesis() {
        let dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        assert!(stats(&config(&dir), "missing", &mut out).is_err());
    }

    #[test]
    fn test_stats_and_export() {
        let dir = TempDir::new().unwrap();
        let thesis = seeded(&dir);

        let mut out = Vec::new();
        assert!(stats(&config(&dir), thesis.as_str(), &mut out).unwrap());
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["tags"], json!([["eeg", 1]]));
        assert_eq!(value["roles"]["background"], json!(1));

        let mut out = Vec::new();
        assert!(export(&config(&dir), false, &mut out).unwrap());
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["papers"][0]["title"], json!("P1"));
    }
}
