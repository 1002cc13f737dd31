//! Machine record manager
//!
//! CRUD over per-machine fact bags. Writes always replace the whole record,
//! so every mutation reads the current record, edits the bag and writes the
//! full bag back. There is no concurrency token: two invocations editing the
//! same machine at once can lose one of the edits.

use crate::core::{Entity, FactBag, FactError, Partition, Result};
use crate::registry::FactRegistry;
use crate::storage::{EntityStore, Filter, query_stream};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct MachineManager {
    store: Arc<dyn EntityStore>,
    registry: FactRegistry,
}

impl MachineManager {
    pub fn new(store: Arc<dyn EntityStore>, registry: FactRegistry) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &FactRegistry {
        &self.registry
    }

    async fn record(&self, name: &str) -> Result<Entity> {
        self.store
            .get(Partition::MachineFacts.as_str(), name)
            .await?
            .ok_or_else(|| FactError::NotFound(format!("Machine {}", name)))
    }

    pub async fn machine_exists(&self, name: &str) -> Result<bool> {
        Ok(self.store.get(Partition::MachineFacts.as_str(), name).await?.is_some())
    }

    pub async fn add_machine(&self, name: &str) -> Result<()> {
        let entity = FactBag::new().into_entity(name);
        self.store.create(entity).await.map_err(|err| match err {
            FactError::AlreadyExists(_) => FactError::AlreadyExists(format!("Machine {}", name)),
            other => other,
        })?;
        info!(machine = name, "machine added");
        Ok(())
    }

    pub async fn delete_machine(&self, name: &str) -> Result<()> {
        self.record(name).await?;
        self.store.delete(Partition::MachineFacts.as_str(), name).await?;
        info!(machine = name, "machine deleted");
        Ok(())
    }

    pub async fn get_facts(&self, name: &str) -> Result<FactBag> {
        let entity = self.record(name).await?;
        Ok(FactBag::from_entity(&entity))
    }

    /// Set `fact` to `value` on `machine`, enforcing the registry: the fact
    /// must be registered, and if it has enumerated values `value` must be
    /// one of them.
    pub async fn set_fact(&self, machine: &str, fact: &str, value: &str) -> Result<()> {
        let entity = self.record(machine).await?;

        if FactBag::is_bookkeeping(fact) || !self.registry.fact_exists(fact).await? {
            return Err(FactError::InvalidFact(fact.to_string()));
        }
        if self.registry.fact_has_enumerated_values(fact).await?
            && !self.registry.value_is_valid(fact, value).await?
        {
            return Err(FactError::InvalidValue {
                fact: fact.to_string(),
                value: value.to_string(),
            });
        }

        let mut bag = FactBag::from_entity(&entity);
        bag.insert(fact, value);
        self.store.update(bag.into_entity(machine)).await?;

        info!(machine, fact, value, "fact set");
        Ok(())
    }

    pub async fn delete_fact(&self, machine: &str, fact: &str) -> Result<()> {
        let entity = self.record(machine).await?;

        let mut bag = FactBag::from_entity(&entity);
        if bag.remove(fact).is_none() {
            return Err(FactError::FactNotSet {
                machine: machine.to_string(),
                fact: fact.to_string(),
            });
        }
        self.store.update(bag.into_entity(machine)).await?;

        info!(machine, fact, "fact deleted");
        Ok(())
    }

    /// Lazily list every machine name in store order.
    pub fn list_machines(&self) -> BoxStream<'_, Result<String>> {
        query_stream(self.store.as_ref(), Filter::partition(Partition::MachineFacts))
            .map_ok(|entity| entity.row_key)
            .boxed()
    }

    /// Lazily list every machine record as `(name, facts)`.
    pub fn list_records(&self) -> BoxStream<'_, Result<(String, FactBag)>> {
        query_stream(self.store.as_ref(), Filter::partition(Partition::MachineFacts))
            .map_ok(|entity| {
                let bag = FactBag::from_entity(&entity);
                (entity.row_key, bag)
            })
            .boxed()
    }

    /// Machines holding `fact`, optionally with exactly `value`.
    ///
    /// Facts are arbitrary properties the store does not index, so this scans
    /// the whole machine partition and filters client-side.
    pub fn list_machines_with_fact<'a>(
        &'a self,
        fact: &'a str,
        value: Option<&'a str>,
    ) -> BoxStream<'a, Result<String>> {
        self.list_records()
            .try_filter_map(move |(name, bag)| async move {
                let hit = match (bag.get(fact), value) {
                    (Some(actual), Some(wanted)) => actual == wanted,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                Ok(hit.then_some(name))
            })
            .boxed()
    }
}
