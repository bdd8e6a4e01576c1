//! In-memory `PrototypeStore`.
//!
//! Keeps records in a `tokio::sync::RwLock`ed map. All queries clone out of
//! the map so no lock is held across an await point. Suitable for a single
//! process; the port boundary is where a database-backed store would slot in.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sprout_common::PrototypeStatus;
use tokio::sync::RwLock;

use crate::application::ports::PrototypeStore;
use crate::domain::Prototype;

#[derive(Default)]
pub struct InMemoryPrototypeStore {
    records: RwLock<HashMap<String, Prototype>>,
}

impl InMemoryPrototypeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrototypeStore for InMemoryPrototypeStore {
    async fn insert(&self, prototype: Prototype) -> Result<()> {
        let mut records = self.records.write().await;
        anyhow::ensure!(
            !records.contains_key(&prototype.id),
            "duplicate prototype id {}",
            prototype.id
        );
        records.insert(prototype.id.clone(), prototype);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Prototype>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update(&self, prototype: &Prototype) -> Result<()> {
        let mut records = self.records.write().await;
        anyhow::ensure!(
            records.contains_key(&prototype.id),
            "unknown prototype id {}",
            prototype.id
        );
        records.insert(prototype.id.clone(), prototype.clone());
        Ok(())
    }

    async fn find_by_agent_project(&self, project_id: &str) -> Result<Option<Prototype>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|p| p.agent_project_id == project_id)
            .cloned())
    }

    async fn find_by_change_request(&self, number: u64) -> Result<Option<Prototype>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|p| p.change_request_number == Some(number))
            .cloned())
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        status: Option<PrototypeStatus>,
        search: Option<&str>,
    ) -> Result<Vec<Prototype>> {
        let needle = search.map(str::to_lowercase);
        let mut matches: Vec<Prototype> = self
            .records
            .read()
            .await
            .values()
            .filter(|p| p.owner_id == owner_id)
            .filter(|p| status.is_none_or(|s| p.status == s))
            .filter(|p| {
                needle
                    .as_deref()
                    .is_none_or(|n| p.description.to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matches)
    }
}
