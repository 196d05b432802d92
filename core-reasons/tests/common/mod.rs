//! Shared fixtures for the repository integration tests

#![allow(dead_code)]

use core_reasons::{
    CommandReasonRepository, MappedReasonRepository, Reason, ReasonRepository,
    TrackedReasonRepository,
};
use tempfile::TempDir;

/// A migrated SQLite file that lives as long as the value.
pub struct TestDatabase {
    _dir: TempDir,
    pub url: String,
}

impl TestDatabase {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("reasons.db").display());
        core_reasons::db::migrate(&url).await.unwrap();
        Self { _dir: dir, url }
    }

    /// One repository per backend, all on this database.
    pub fn backends(&self) -> Vec<Box<dyn ReasonRepository>> {
        vec![
            Box::new(CommandReasonRepository::new(&self.url)),
            Box::new(MappedReasonRepository::new(&self.url)),
            Box::new(TrackedReasonRepository::new(&self.url)),
        ]
    }
}

/// Each backend on its own fresh database.
pub async fn fresh_backends() -> Vec<(TestDatabase, Box<dyn ReasonRepository>)> {
    let mut pairs = Vec::new();
    for index in 0..3 {
        let db = TestDatabase::new().await;
        let repository = db.backends().swap_remove(index);
        pairs.push((db, repository));
    }
    pairs
}

/// Insert `names` in order through `repository`.
pub async fn seed(repository: &dyn ReasonRepository, names: &[&str]) -> Vec<Reason> {
    let mut saved = Vec::with_capacity(names.len());
    for name in names {
        saved.push(repository.add(Reason::new(*name), None).await.unwrap());
    }
    saved
}

pub fn names(reasons: &[Reason]) -> Vec<&str> {
    reasons.iter().filter_map(|r| r.name.as_deref()).collect()
}
