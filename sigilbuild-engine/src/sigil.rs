//! Sigil inventory: kinds, grades, and the acquired/consumed tally.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::catalogue::{Catalogue, Family};
use crate::constants::SIGIL_BASE_PRICES;
use crate::snapshot::{AscensionPayment, BuildSnapshot, RelicPayment};

/// Sigil granted by the bonus unlock flag.
pub const BONUS_SIGIL: SigilKind = SigilKind::Ti;
/// Sigil spent when the relic is paid with a sigil.
pub const RELIC_SIGIL: SigilKind = SigilKind::Sowel;
/// Sigil spent by ascension unless it is paid in KP.
pub const ASCENSION_SIGIL: SigilKind = SigilKind::Odal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigilKind {
    Kisin,
    Lif,
    Sowel,
    Ti,
    Dagaz,
    Odal,
}

impl SigilKind {
    pub const ALL: [Self; 6] = [
        Self::Kisin,
        Self::Lif,
        Self::Sowel,
        Self::Ti,
        Self::Dagaz,
        Self::Odal,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Kisin => 0,
            Self::Lif => 1,
            Self::Sowel => 2,
            Self::Ti => 3,
            Self::Dagaz => 4,
            Self::Odal => 5,
        }
    }

    /// Base currency price of one sigil of this kind.
    #[must_use]
    pub const fn base_price(self) -> i64 {
        SIGIL_BASE_PRICES[self.index()]
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kisin => "kisin",
            Self::Lif => "lif",
            Self::Sowel => "sowel",
            Self::Ti => "ti",
            Self::Dagaz => "dagaz",
            Self::Odal => "odal",
        }
    }

    #[must_use]
    pub const fn grade(self) -> Grade {
        match self {
            Self::Kisin => Grade::Common,
            Self::Lif => Grade::Uncommon,
            Self::Sowel => Grade::Rare,
            Self::Ti => Grade::Epic,
            Self::Dagaz => Grade::Legendary,
            Self::Odal => Grade::Mythic,
        }
    }
}

impl fmt::Display for SigilKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigilKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// Visual tier of an option. Each grade is paid with exactly one sigil kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl Grade {
    #[must_use]
    pub const fn sigil(self) -> SigilKind {
        match self {
            Self::Common => SigilKind::Kisin,
            Self::Uncommon => SigilKind::Lif,
            Self::Rare => SigilKind::Sowel,
            Self::Epic => SigilKind::Ti,
            Self::Legendary => SigilKind::Dagaz,
            Self::Mythic => SigilKind::Odal,
        }
    }
}

/// Raw acquisition and consumption counts per sigil kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigilTotals {
    pub acquired: BTreeMap<SigilKind, u32>,
    pub consumed: BTreeMap<SigilKind, u32>,
}

impl SigilTotals {
    #[must_use]
    pub fn acquired(&self, kind: SigilKind) -> u32 {
        self.acquired.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn consumed(&self, kind: SigilKind) -> u32 {
        self.consumed.get(&kind).copied().unwrap_or(0)
    }

    fn acquire(&mut self, kind: SigilKind, count: u32) {
        let entry = self.acquired.entry(kind).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    fn consume(&mut self, kind: SigilKind) {
        let entry = self.consumed.entry(kind).or_insert(0);
        *entry = entry.saturating_add(1);
    }
}

/// Spare sigils per kind. Negative values mean the build is overdrawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigilAvailability(BTreeMap<SigilKind, i64>);

impl SigilAvailability {
    #[must_use]
    pub fn get(&self, kind: SigilKind) -> i64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn has_spare(&self, kind: SigilKind) -> bool {
        self.get(kind) >= 1
    }

    /// Kinds currently below zero.
    #[must_use]
    pub fn overdrawn(&self) -> Vec<SigilKind> {
        self.0
            .iter()
            .filter(|(_, count)| **count < 0)
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SigilKind, i64)> + '_ {
        self.0.iter().map(|(kind, count)| (*kind, *count))
    }
}

impl FromIterator<(SigilKind, i64)> for SigilAvailability {
    fn from_iter<T: IntoIterator<Item = (SigilKind, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Count every sigil the build has acquired and every sigil it spends.
#[must_use]
pub fn compute_totals(snapshot: &BuildSnapshot, catalogue: &Catalogue) -> SigilTotals {
    let mut totals = SigilTotals::default();
    for kind in SigilKind::ALL {
        totals.acquire(kind, 0);
        totals.consumed.insert(kind, 0);
    }

    for (kind, count) in &snapshot.common_sigils {
        totals.acquire(*kind, *count);
    }
    for id in snapshot.family_set(Family::SpecialSigil) {
        if let Some(kind) = catalogue.option(id).and_then(|opt| opt.sigil) {
            totals.acquire(kind, 1);
        }
    }
    if snapshot.bonus_sigil {
        totals.acquire(BONUS_SIGIL, 1);
    }

    // KP-paid nodes still spend their sigil.
    for id in snapshot.family_set(Family::BlessingNode) {
        if let Some(kind) = catalogue.option(id).and_then(|opt| opt.sigil_cost()) {
            totals.consume(kind);
        }
    }
    for category in &snapshot.boosts {
        if let Some(boost) = catalogue.category(category).and_then(|cat| cat.boost.as_ref()) {
            totals.consume(boost.sigil);
        }
    }
    if snapshot.relic == Some(RelicPayment::Sigil) {
        totals.consume(RELIC_SIGIL);
    }
    if snapshot.ascension == Some(AscensionPayment::Sigil) {
        totals.consume(ASCENSION_SIGIL);
    }

    totals
}

/// Spare sigils: acquired minus consumed. The override map never changes
/// this value; it only reroutes which currency paid for a node.
#[must_use]
pub fn compute_available(totals: &SigilTotals) -> SigilAvailability {
    SigilKind::ALL
        .into_iter()
        .map(|kind| {
            let spare = i64::from(totals.acquired(kind)) - i64::from(totals.consumed(kind));
            (kind, spare)
        })
        .collect()
}

/// Shorthand for `compute_available(&compute_totals(..))`.
#[must_use]
pub fn available_for(snapshot: &BuildSnapshot, catalogue: &Catalogue) -> SigilAvailability {
    compute_available(&compute_totals(snapshot, catalogue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Pact;

    fn catalogue() -> &'static Catalogue {
        Catalogue::builtin()
    }

    #[test]
    fn grades_and_kinds_are_one_to_one() {
        for kind in SigilKind::ALL {
            assert_eq!(kind.grade().sigil(), kind);
            assert_eq!(kind.as_str().parse::<SigilKind>(), Ok(kind));
        }
        assert_eq!(SigilKind::Sowel.base_price(), 3);
        assert_eq!(SigilKind::Odal.base_price(), 8);
    }

    #[test]
    fn empty_build_has_zero_everywhere() {
        let avail = available_for(&BuildSnapshot::default(), catalogue());
        for kind in SigilKind::ALL {
            assert_eq!(avail.get(kind), 0);
        }
        assert!(avail.overdrawn().is_empty());
    }

    #[test]
    fn acquisitions_sum_every_mechanism() {
        let mut snap = BuildSnapshot::default();
        snap.common_sigils.insert(SigilKind::Ti, 2);
        snap.bonus_sigil = true;
        snap.special_sigils.insert("sigil.ember_ti".to_string());
        let totals = compute_totals(&snap, catalogue());
        assert_eq!(totals.acquired(SigilKind::Ti), 4);
        assert_eq!(totals.acquired(SigilKind::Kisin), 0);
    }

    #[test]
    fn consumption_counts_nodes_boosts_and_incidentals() {
        let mut snap = BuildSnapshot::default();
        snap.common_sigils.insert(SigilKind::Kisin, 3);
        snap.common_sigils.insert(SigilKind::Sowel, 2);
        snap.common_sigils.insert(SigilKind::Odal, 1);
        snap.blessing_nodes.insert("tide.1".to_string());
        snap.boosts.insert("telekinetics".to_string());
        snap.relic = Some(RelicPayment::Sigil);
        snap.ascension = Some(AscensionPayment::Sigil);
        let totals = compute_totals(&snap, catalogue());
        assert_eq!(totals.consumed(SigilKind::Kisin), 2);
        assert_eq!(totals.consumed(SigilKind::Sowel), 1);
        assert_eq!(totals.consumed(SigilKind::Odal), 1);

        let avail = compute_available(&totals);
        assert_eq!(avail.get(SigilKind::Kisin), 1);
        assert_eq!(avail.get(SigilKind::Sowel), 1);
        assert_eq!(avail.get(SigilKind::Odal), 0);
    }

    #[test]
    fn kuri_ascension_skips_sigil_consumption() {
        let mut snap = BuildSnapshot::default();
        snap.pacts.insert(Pact::Kuri);
        snap.ascension = Some(AscensionPayment::Kuri);
        let totals = compute_totals(&snap, catalogue());
        assert_eq!(totals.consumed(ASCENSION_SIGIL), 0);
    }

    #[test]
    fn overrides_do_not_restore_inventory() {
        let mut snap = BuildSnapshot::default();
        snap.common_sigils.insert(SigilKind::Kisin, 1);
        snap.blessing_nodes.insert("tide.1".to_string());
        let before = available_for(&snap, catalogue());
        snap.pacts.insert(Pact::Kuri);
        snap.kp_nodes.insert("tide.1".to_string(), SigilKind::Kisin);
        let after = available_for(&snap, catalogue());
        assert_eq!(before, after);
        assert_eq!(after.get(SigilKind::Kisin), 0);
    }

    #[test]
    fn missing_catalogue_entries_contribute_nothing() {
        let mut snap = BuildSnapshot::default();
        snap.blessing_nodes.insert("ghost.node".to_string());
        snap.special_sigils.insert("ghost.sigil".to_string());
        snap.boosts.insert("ghost-category".to_string());
        let totals = compute_totals(&snap, catalogue());
        assert!(totals.consumed.values().all(|count| *count == 0));
        assert!(totals.acquired.values().all(|count| *count == 0));
    }
}
