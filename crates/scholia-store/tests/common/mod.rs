//! Shared helpers for scholia-store integration tests

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use scholia_domain::{ConnectionType, NewConnection, NewPaper, NewThesis, Paper, Thesis};
use scholia_store::{
    EntityStore, MemoryStorage, MigrationRegistry, PersistenceAdapter, StoreOptions,
    DEFAULT_NAMESPACE,
};

/// A store over `storage`, with the built-in migrations
pub fn open_store(storage: &MemoryStorage) -> EntityStore {
    open_store_with(storage, &MigrationRegistry::builtin(), StoreOptions::default())
}

pub fn open_store_with(
    storage: &MemoryStorage,
    registry: &MigrationRegistry,
    options: StoreOptions,
) -> EntityStore {
    EntityStore::init(adapter(storage), registry, options)
}

pub fn adapter(storage: &MemoryStorage) -> PersistenceAdapter {
    PersistenceAdapter::new(Arc::new(storage.clone()), DEFAULT_NAMESPACE)
}

/// A thesis "T1" owning papers "P1" and "P2" joined by an `extends` connection
pub struct Seeded {
    pub thesis: Thesis,
    pub p1: Paper,
    pub p2: Paper,
}

pub fn seed(store: &mut EntityStore) -> Seeded {
    let thesis = store.create_thesis(NewThesis::new("T1")).unwrap();
    let p1 = store.add_paper(NewPaper::new(thesis.id.clone(), "P1")).unwrap();
    let p2 = store.add_paper(NewPaper::new(thesis.id.clone(), "P2")).unwrap();
    store
        .create_connection(NewConnection::new(
            thesis.id.clone(),
            p1.id.clone(),
            p2.id.clone(),
            ConnectionType::Extends,
        ))
        .unwrap();
    let thesis = store.get_thesis(&thesis.id).unwrap().clone();
    Seeded { thesis, p1, p2 }
}
