//! File-backed rule catalog.
//!
//! A catalog is one YAML document listing rules, rule groups and head groups.
//! It is validated for id/name uniqueness and loaded into a [`MemoryStore`].
//! References to unknown rules or groups are kept (and logged) because the
//! resolver tolerates stale ids the same way it does for the database store.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::schema::{ConditionType, HeadGroup, Rule, RuleGroup};
use crate::store::{check_group_name, MemoryStore};

/// Errors that can occur while loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Duplicate ids or names, or a reserved group name.
    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub rule_groups: Vec<RuleGroup>,
    #[serde(default)]
    pub head_groups: Vec<HeadGroup>,
}

impl Catalog {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let yaml = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&yaml)?;
        info!(
            path = %path.display(),
            rules = catalog.rules.len(),
            rule_groups = catalog.rule_groups.len(),
            head_groups = catalog.head_groups.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Check uniqueness constraints; warn about dangling references.
    pub fn validate(&self) -> Result<(), CatalogError> {
        unique("rule id", self.rules.iter().map(|r| r.id.to_string()))?;
        unique("rule group id", self.rule_groups.iter().map(|g| g.id.to_string()))?;
        unique("rule group name", self.rule_groups.iter().map(|g| g.name.clone()))?;
        for group in &self.rule_groups {
            check_group_name(&group.name).map_err(|e| CatalogError::Validation(e.to_string()))?;
        }
        unique("head group id", self.head_groups.iter().map(|g| g.id.to_string()))?;
        unique("head group name", self.head_groups.iter().map(|g| g.name.clone()))?;

        let rule_ids: HashSet<_> = self.rules.iter().map(|r| r.id).collect();
        let group_ids: HashSet<_> = self.rule_groups.iter().map(|g| g.id).collect();

        for rule in &self.rules {
            if let ConditionType::Unsupported(raw) = &rule.condition.condition_type {
                warn!(rule_id = rule.id, condition_type = %raw, "rule uses an unsupported condition type");
            }
        }
        for group in &self.rule_groups {
            for id in group.rule_ids.iter().filter(|id| !rule_ids.contains(*id)) {
                warn!(group = %group.name, rule_id = id, "rule group references unknown rule");
            }
        }
        for hg in &self.head_groups {
            for id in hg.rule_group_ids.iter().filter(|id| !group_ids.contains(*id)) {
                warn!(head_group = %hg.name, group_id = id, "head group references unknown rule group");
            }
            for id in hg.rule_ids.iter().filter(|id| !rule_ids.contains(*id)) {
                warn!(head_group = %hg.name, rule_id = id, "head group references unknown rule");
            }
        }
        Ok(())
    }

    pub fn into_store(self) -> MemoryStore {
        MemoryStore::from_parts(self.rules, self.rule_groups, self.head_groups)
    }
}

fn unique(what: &str, values: impl Iterator<Item = String>) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for v in values {
        if !seen.insert(v.clone()) {
            return Err(CatalogError::Validation(format!("duplicate {what}: {v}")));
        }
    }
    Ok(())
}
