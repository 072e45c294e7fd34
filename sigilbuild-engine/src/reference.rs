//! User-authored sub-builds (companions, weapons, beasts, vehicles).
//!
//! Each entry is keyed by the name the user gave it and carries its own
//! selections plus the amount it spent when it was built. The ledger only
//! reads the spent amounts.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::snapshot::pairs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Companions,
    Weapons,
    Beasts,
    Vehicles,
}

impl ReferenceKind {
    pub const ALL: [Self; 4] = [Self::Companions, Self::Weapons, Self::Beasts, Self::Vehicles];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Companions => "companions",
            Self::Weapons => "weapons",
            Self::Beasts => "beasts",
            Self::Vehicles => "vehicles",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved sub-build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceBuild {
    pub selections: Vec<String>,
    pub spent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceCatalogue {
    #[serde(with = "pairs")]
    pub companions: BTreeMap<String, ReferenceBuild>,
    #[serde(with = "pairs")]
    pub weapons: BTreeMap<String, ReferenceBuild>,
    #[serde(with = "pairs")]
    pub beasts: BTreeMap<String, ReferenceBuild>,
    #[serde(with = "pairs")]
    pub vehicles: BTreeMap<String, ReferenceBuild>,
}

impl ReferenceCatalogue {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn section(&self, kind: ReferenceKind) -> &BTreeMap<String, ReferenceBuild> {
        match kind {
            ReferenceKind::Companions => &self.companions,
            ReferenceKind::Weapons => &self.weapons,
            ReferenceKind::Beasts => &self.beasts,
            ReferenceKind::Vehicles => &self.vehicles,
        }
    }

    pub const fn section_mut(
        &mut self,
        kind: ReferenceKind,
    ) -> &mut BTreeMap<String, ReferenceBuild> {
        match kind {
            ReferenceKind::Companions => &mut self.companions,
            ReferenceKind::Weapons => &mut self.weapons,
            ReferenceKind::Beasts => &mut self.beasts,
            ReferenceKind::Vehicles => &mut self.vehicles,
        }
    }

    /// Spent amount of a saved item, if it exists.
    #[must_use]
    pub fn spent(&self, kind: ReferenceKind, name: &str) -> Option<i64> {
        self.section(kind).get(name).map(|item| item.spent)
    }

    /// Insert or replace an item, returning `self` for chaining in fixtures.
    #[must_use]
    pub fn with_item(mut self, kind: ReferenceKind, name: &str, spent: i64) -> Self {
        self.section_mut(kind).insert(
            name.to_string(),
            ReferenceBuild {
                selections: Vec::new(),
                spent,
            },
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_by_kind_and_name() {
        let reference = ReferenceCatalogue::empty()
            .with_item(ReferenceKind::Weapons, "Moonblade", 24)
            .with_item(ReferenceKind::Beasts, "Grey Hound", 9);
        assert_eq!(reference.spent(ReferenceKind::Weapons, "Moonblade"), Some(24));
        assert_eq!(reference.spent(ReferenceKind::Weapons, "Grey Hound"), None);
        assert_eq!(reference.spent(ReferenceKind::Beasts, "Grey Hound"), Some(9));
    }

    #[test]
    fn sections_serialize_as_name_pairs() {
        let reference = ReferenceCatalogue::empty().with_item(ReferenceKind::Vehicles, "Skiff", 12);
        let value = serde_json::to_value(&reference).unwrap();
        assert_eq!(
            value["vehicles"],
            serde_json::json!([["Skiff", { "selections": [], "spent": 12 }]])
        );
        assert_eq!(value["weapons"], serde_json::json!([]));
    }
}
