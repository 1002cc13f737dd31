use crate::core::{FactBag, FactError, Result};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;

/// Top-level key the Puppet side looks machines up under.
pub const FACTS_SECTION: &str = "server::facts";

/// Generated facts document: section -> machine -> facts.
///
/// A generated document has exactly one section, [`FACTS_SECTION`]. Loaded
/// documents may carry others and every section is validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactsDocument {
    sections: BTreeMap<String, BTreeMap<String, FactBag>>,
}

impl FactsDocument {
    pub fn new() -> Self {
        let mut sections = BTreeMap::new();
        sections.insert(FACTS_SECTION.to_string(), BTreeMap::new());
        Self { sections }
    }

    pub fn insert_machine(&mut self, machine: impl Into<String>, facts: FactBag) {
        self.sections
            .entry(FACTS_SECTION.to_string())
            .or_default()
            .insert(machine.into(), facts);
    }

    pub fn machine(&self, name: &str) -> Option<&FactBag> {
        self.sections.get(FACTS_SECTION).and_then(|machines| machines.get(name))
    }

    pub fn machine_count(&self) -> usize {
        self.sections.values().map(BTreeMap::len).sum()
    }

    /// Every `(section, machine, facts)` triple in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &FactBag)> {
        self.sections.iter().flat_map(|(section, machines)| {
            machines
                .iter()
                .map(move |(machine, facts)| (section.as_str(), machine.as_str(), facts))
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.sections)
            .map_err(|e| FactError::Infrastructure(format!("Failed to render facts document: {}", e)))
    }

    /// Parse a facts document. Scalar fact values of any YAML type are read
    /// back as strings; a machine mapped to nothing has no facts.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut sections = BTreeMap::new();
        if text.trim().is_empty() {
            return Ok(Self { sections });
        }

        let root: YamlValue = serde_yaml::from_str(text)
            .map_err(|e| FactError::Infrastructure(format!("Malformed facts document: {}", e)))?;
        let root = match root {
            YamlValue::Mapping(root) => root,
            YamlValue::Null => return Ok(Self { sections }),
            _ => return Err(malformed("top level is not a mapping")),
        };

        for (section, machines) in root {
            let section = scalar(&section).ok_or_else(|| malformed("section key is not a scalar"))?;
            let mut parsed = BTreeMap::new();

            match machines {
                YamlValue::Mapping(machines) => {
                    for (machine, facts) in machines {
                        let machine = scalar(&machine)
                            .ok_or_else(|| malformed(&format!("machine key in {} is not a scalar", section)))?;
                        let bag = parse_facts(&machine, facts)?;
                        parsed.insert(machine, bag);
                    }
                }
                YamlValue::Null => {}
                _ => return Err(malformed(&format!("section {} is not a mapping", section))),
            }

            sections.insert(section, parsed);
        }

        Ok(Self { sections })
    }
}

fn parse_facts(machine: &str, facts: YamlValue) -> Result<FactBag> {
    match facts {
        YamlValue::Null => Ok(FactBag::new()),
        YamlValue::Mapping(facts) => facts
            .into_iter()
            .map(|(fact, value)| -> Result<(String, String)> {
                let fact = scalar(&fact)
                    .ok_or_else(|| malformed(&format!("fact key on {} is not a scalar", machine)))?;
                let value = scalar(&value)
                    .ok_or_else(|| malformed(&format!("fact {} on {} is not a scalar", fact, machine)))?;
                Ok((fact, value))
            })
            .collect(),
        _ => Err(malformed(&format!("facts for {} are not a mapping", machine))),
    }
}

fn scalar(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Null => Some(String::new()),
        _ => None,
    }
}

fn malformed(reason: &str) -> FactError {
    FactError::Infrastructure(format!("Malformed facts document: {}", reason))
}
