use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Property carrying the "has enumerated values" flag on a valid fact row.
pub const VALID_VALUES_PROPERTY: &str = "ValidValues";

/// Property naming the owning fact on a valid fact value row.
pub const VALUE_FACT_PROPERTY: &str = "VFVFact";

/// Property carrying the permitted value on a valid fact value row.
pub const VALUE_PROPERTY: &str = "VFVValue";

/// Store bookkeeping fields that never appear in a fact bag.
pub const EXCLUDED_KEYS: [&str; 4] = ["PartitionKey", "RowKey", "Timestamp", "etag"];

/// Fixed partition values that separate the three kinds of rows sharing one
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    MachineFacts,
    ValidFacts,
    ValidFactValues,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::MachineFacts => "PuppetCfg",
            Partition::ValidFacts => "PuppetCfgValidFact",
            Partition::ValidFactValues => "PuppetCfgValidFactValue",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row in the entity store: partition key, row key and string properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Entity {
    pub fn new(partition: Partition, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition.as_str().to_string(),
            row_key: row_key.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn key(&self) -> (String, String) {
        (self.partition_key.clone(), self.row_key.clone())
    }
}

/// Ordered fact-name to value mapping of one machine.
///
/// Built from an [`Entity`] with the bookkeeping fields stripped, so the bag
/// only ever holds facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactBag(BTreeMap<String, String>);

impl FactBag {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Store-owned property names: never facts, never writable as facts.
    pub fn is_bookkeeping(key: &str) -> bool {
        EXCLUDED_KEYS.contains(&key) || key.starts_with("odata.") || key.contains("@odata.")
    }

    pub fn from_entity(entity: &Entity) -> Self {
        Self(
            entity
                .properties
                .iter()
                .filter(|(key, _)| !Self::is_bookkeeping(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// Full record for `machine` carrying exactly this bag.
    pub fn into_entity(self, machine: &str) -> Entity {
        Entity {
            partition_key: Partition::MachineFacts.as_str().to_string(),
            row_key: machine.to_string(),
            properties: self.0,
        }
    }

    pub fn get(&self, fact: &str) -> Option<&str> {
        self.0.get(fact).map(String::as_str)
    }

    pub fn contains(&self, fact: &str) -> bool {
        self.0.contains_key(fact)
    }

    pub fn insert(&mut self, fact: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(fact.into(), value.into())
    }

    pub fn remove(&mut self, fact: &str) -> Option<String> {
        self.0.remove(fact)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for FactBag {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FactBag {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
