//! The serializable build state: every user selection, no derived values.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::catalogue::Family;
use crate::constants::{PACT_BLOOD_COST, PACT_KURI_COST, PACT_SMITH_COST};
use crate::cost::Currency;
use crate::sigil::SigilKind;

/// Build-wide toggles that rewrite pricing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pact {
    /// Unlocks Kuri Points and KP-paid overrides.
    Kuri,
    /// Doubles sigil-tree prices and voids drawback grants and companion fees.
    Blood,
    /// Turns the weapon import fee into a refund scaled by each weapon's spend.
    Smith,
}

impl Pact {
    pub const ALL: [Self; 3] = [Self::Kuri, Self::Blood, Self::Smith];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kuri => "kuri",
            Self::Blood => "blood",
            Self::Smith => "smith",
        }
    }

    /// Cost descriptor charged for taking the pact.
    #[must_use]
    pub const fn descriptor(self) -> &'static str {
        match self {
            Self::Kuri => PACT_KURI_COST,
            Self::Blood => PACT_BLOOD_COST,
            Self::Smith => PACT_SMITH_COST,
        }
    }
}

impl fmt::Display for Pact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pact {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|pact| pact.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelicPayment {
    Fortune,
    Sigil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AscensionPayment {
    Sigil,
    Kuri,
}

/// Complete selection state for one character build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSnapshot {
    pub origins: BTreeSet<String>,
    pub perks: BTreeSet<String>,
    pub powers: BTreeSet<String>,
    pub blessing_nodes: BTreeSet<String>,
    pub special_sigils: BTreeSet<String>,
    pub companions: BTreeSet<String>,
    pub drawbacks: BTreeSet<String>,
    /// Sigils bought through the common purchase counter.
    #[serde(with = "pairs")]
    pub common_sigils: BTreeMap<SigilKind, u32>,
    pub bonus_sigil: bool,
    /// Categories whose pick cap is raised by a boost.
    pub boosts: BTreeSet<String>,
    pub home_region: Option<String>,
    pub pacts: BTreeSet<Pact>,
    pub trials: BTreeSet<String>,
    pub masteries: BTreeSet<String>,
    /// Override map: blessing nodes paid in KP, with the sigil each consumed.
    #[serde(with = "pairs")]
    pub kp_nodes: BTreeMap<String, SigilKind>,
    pub familiar_upgrade: bool,
    pub familiar_currency: Currency,
    pub extra_retinue: u32,
    pub relic: Option<RelicPayment>,
    pub ascension: Option<AscensionPayment>,
    pub imported_weapons: BTreeSet<String>,
}

impl BuildSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn family_set(&self, family: Family) -> &BTreeSet<String> {
        match family {
            Family::Origin => &self.origins,
            Family::Perk => &self.perks,
            Family::Power => &self.powers,
            Family::BlessingNode => &self.blessing_nodes,
            Family::SpecialSigil => &self.special_sigils,
            Family::Companion => &self.companions,
            Family::Drawback => &self.drawbacks,
        }
    }

    pub const fn family_set_mut(&mut self, family: Family) -> &mut BTreeSet<String> {
        match family {
            Family::Origin => &mut self.origins,
            Family::Perk => &mut self.perks,
            Family::Power => &mut self.powers,
            Family::BlessingNode => &mut self.blessing_nodes,
            Family::SpecialSigil => &mut self.special_sigils,
            Family::Companion => &mut self.companions,
            Family::Drawback => &mut self.drawbacks,
        }
    }

    /// Whether `id` is selected in any option family.
    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        Family::ALL
            .into_iter()
            .any(|family| self.family_set(family).contains(id))
    }

    /// Every selected option id with its family, in family then id order.
    pub fn selections(&self) -> impl Iterator<Item = (Family, &str)> + '_ {
        Family::ALL.into_iter().flat_map(move |family| {
            self.family_set(family)
                .iter()
                .map(move |id| (family, id.as_str()))
        })
    }

    #[must_use]
    pub fn has_pact(&self, pact: Pact) -> bool {
        self.pacts.contains(&pact)
    }

    #[must_use]
    pub fn is_kp_paid(&self, node: &str) -> bool {
        self.kp_nodes.contains_key(node)
    }

    #[must_use]
    pub fn common_count(&self, kind: SigilKind) -> u32 {
        self.common_sigils.get(&kind).copied().unwrap_or(0)
    }
}

/// Serde helper storing a map as an explicit list of `[key, value]` pairs.
pub mod pairs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    /// # Errors
    ///
    /// Returns an error when the input is not a list of two-element pairs.
    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let entries = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
