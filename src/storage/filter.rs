//! Filter expressions for entity queries
//!
//! A filter is evaluated in-process by the memory and file stores and
//! rendered to an OData `$filter` string for the table service.

use crate::core::{Entity, Partition};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `PartitionKey eq '<value>'`
    PartitionEq(String),
    /// `<property> eq '<value>'`
    PropertyEq { name: String, value: String },
    And(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn partition(partition: Partition) -> Self {
        Filter::PartitionEq(partition.as_str().to_string())
    }

    pub fn property(name: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::PropertyEq {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Filter::PartitionEq(pk) => entity.partition_key == *pk,
            Filter::PropertyEq { name, value } => match name.as_str() {
                "PartitionKey" => entity.partition_key == *value,
                "RowKey" => entity.row_key == *value,
                _ => entity.property(name) == Some(value.as_str()),
            },
            Filter::And(left, right) => left.matches(entity) && right.matches(entity),
        }
    }

    /// Partition this filter is pinned to, if any.
    pub fn pinned_partition(&self) -> Option<&str> {
        match self {
            Filter::PartitionEq(pk) => Some(pk),
            Filter::PropertyEq { .. } => None,
            Filter::And(left, right) => left.pinned_partition().or_else(|| right.pinned_partition()),
        }
    }

    /// Render as an OData filter expression.
    pub fn to_odata(&self) -> String {
        match self {
            Filter::PartitionEq(pk) => format!("PartitionKey eq {}", quote(pk)),
            Filter::PropertyEq { name, value } => format!("{} eq {}", name, quote(value)),
            Filter::And(left, right) => format!("{} and {}", left.to_odata(), right.to_odata()),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_odata())
    }
}

// Single quotes inside OData string literals are doubled.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
