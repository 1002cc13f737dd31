//! Fact metadata registry
//!
//! Tracks which fact names are valid and, per fact, an optional enumerated
//! set of valid values. The `ValidValues` flag on a fact row mirrors whether
//! any value rows reference it and is flipped as values come and go.
//!
//! Deleting a fact does not cascade: value rows for the fact and machines
//! already holding it are left untouched.

use crate::core::types::{VALID_VALUES_PROPERTY, VALUE_FACT_PROPERTY, VALUE_PROPERTY};
use crate::core::{Entity, FactBag, FactError, Partition, Result, RunContext};
use crate::storage::{EntityStore, Filter, query_all, query_stream};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const FLAG_YES: &str = "yes";
const FLAG_NO: &str = "no";

/// A registered fact name and whether it carries an enumerated value set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFact {
    pub name: String,
    pub has_values: bool,
}

impl ValidFact {
    fn from_entity(entity: Entity) -> Self {
        let has_values = entity.property(VALID_VALUES_PROPERTY) == Some(FLAG_YES);
        Self {
            name: entity.row_key,
            has_values,
        }
    }
}

#[derive(Clone)]
pub struct FactRegistry {
    store: Arc<dyn EntityStore>,
    ctx: RunContext,
}

impl FactRegistry {
    pub fn new(store: Arc<dyn EntityStore>, ctx: RunContext) -> Self {
        Self { store, ctx }
    }

    pub fn context(&self) -> RunContext {
        self.ctx
    }

    fn values_filter(fact: &str) -> Filter {
        Filter::partition(Partition::ValidFactValues).and(Filter::property(VALUE_FACT_PROPERTY, fact))
    }

    fn value_filter(fact: &str, value: &str) -> Filter {
        Self::values_filter(fact).and(Filter::property(VALUE_PROPERTY, value))
    }

    async fn fact_entity(&self, name: &str) -> Result<Entity> {
        self.store
            .get(Partition::ValidFacts.as_str(), name)
            .await?
            .ok_or_else(|| FactError::NotFound(format!("Valid Fact {}", name)))
    }

    async fn set_flag(&self, name: &str, has_values: bool) -> Result<()> {
        let mut entity = self.fact_entity(name).await?;
        let flag = if has_values { FLAG_YES } else { FLAG_NO };
        entity
            .properties
            .insert(VALID_VALUES_PROPERTY.to_string(), flag.to_string());
        self.store.update(entity).await?;
        debug!(fact = name, flag, "updated enumerated-values flag");
        Ok(())
    }

    pub async fn fact_exists(&self, name: &str) -> Result<bool> {
        Ok(self.store.get(Partition::ValidFacts.as_str(), name).await?.is_some())
    }

    /// Register `name` as a valid fact. Names that collide with store
    /// bookkeeping fields are rejected with `InvalidFact`.
    pub async fn add_fact(&self, name: &str) -> Result<()> {
        if FactBag::is_bookkeeping(name) {
            return Err(FactError::InvalidFact(name.to_string()));
        }
        let entity = Entity::new(Partition::ValidFacts, name).with_property(VALID_VALUES_PROPERTY, FLAG_NO);
        self.store.create(entity).await.map_err(|err| match err {
            FactError::AlreadyExists(_) => FactError::AlreadyExists(format!("Valid Fact {}", name)),
            other => other,
        })?;
        info!(fact = name, "valid fact added");
        Ok(())
    }

    pub async fn delete_fact(&self, name: &str) -> Result<()> {
        self.fact_entity(name).await?;
        self.store.delete(Partition::ValidFacts.as_str(), name).await?;
        info!(fact = name, "valid fact deleted");
        Ok(())
    }

    pub async fn fact_has_enumerated_values(&self, name: &str) -> Result<bool> {
        let entity = self.fact_entity(name).await?;
        Ok(ValidFact::from_entity(entity).has_values)
    }

    pub async fn value_is_valid(&self, fact: &str, value: &str) -> Result<bool> {
        let mut matches = query_stream(self.store.as_ref(), Self::value_filter(fact, value));
        Ok(matches.try_next().await?.is_some())
    }

    pub async fn add_fact_value(&self, fact: &str, value: &str) -> Result<()> {
        if !self.fact_exists(fact).await? {
            return Err(FactError::NotFound(format!("Fact {}", fact)));
        }
        if self.value_is_valid(fact, value).await? {
            return Err(FactError::AlreadyExists(format!("Value {} for fact {}", value, fact)));
        }

        let entity = Entity::new(Partition::ValidFactValues, Uuid::new_v4().to_string())
            .with_property(VALUE_FACT_PROPERTY, fact)
            .with_property(VALUE_PROPERTY, value);
        self.store.create(entity).await?;
        self.set_flag(fact, true).await?;

        info!(fact, value, "valid fact value added");
        Ok(())
    }

    /// Remove every row registering `value` for `fact`. Clears the fact's
    /// enumerated-values flag once no values remain.
    pub async fn delete_fact_value(&self, fact: &str, value: &str) -> Result<()> {
        let rows = query_all(self.store.as_ref(), &Self::value_filter(fact, value)).await?;
        if rows.is_empty() {
            return Err(FactError::NotFound(format!("Value {} for fact {}", value, fact)));
        }

        for row in rows {
            self.store.delete(&row.partition_key, &row.row_key).await?;
        }

        if self.count_fact_values(fact).await? == 0 && self.fact_exists(fact).await? {
            self.set_flag(fact, false).await?;
        }

        info!(fact, value, "valid fact value deleted");
        Ok(())
    }

    pub async fn count_fact_values(&self, fact: &str) -> Result<usize> {
        query_stream(self.store.as_ref(), Self::values_filter(fact))
            .try_fold(0usize, |count, _| async move { Ok(count + 1) })
            .await
    }

    /// Lazily list every valid fact in store order.
    pub fn list_facts(&self) -> BoxStream<'_, Result<ValidFact>> {
        query_stream(self.store.as_ref(), Filter::partition(Partition::ValidFacts))
            .map_ok(ValidFact::from_entity)
            .boxed()
    }

    /// Lazily list the enumerated values registered for `fact`.
    pub fn list_fact_values(&self, fact: &str) -> BoxStream<'_, Result<String>> {
        query_stream(self.store.as_ref(), Self::values_filter(fact))
            .try_filter_map(|entity| async move {
                Ok(entity.property(VALUE_PROPERTY).map(str::to_string))
            })
            .boxed()
    }
}
