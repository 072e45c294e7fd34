//! Single entry point for every derived value of a build.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalogue::Catalogue;
use crate::ledger::{Ledger, compute_balances};
use crate::reference::ReferenceCatalogue;
use crate::sigil::{SigilAvailability, SigilTotals, compute_available, compute_totals};
use crate::snapshot::BuildSnapshot;
use crate::validator::{Availability, availability_map, unmet_requirements};

/// Everything a front end shows for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recomputed {
    pub sigils: SigilTotals,
    pub available: SigilAvailability,
    pub ledger: Ledger,
    pub availability: BTreeMap<String, Availability>,
    /// Selected options whose requirements no longer hold.
    pub unmet: Vec<String>,
}

impl Recomputed {
    /// True when every currency balance and sigil count is non-negative and
    /// every selected option still meets its requirements.
    #[must_use]
    pub fn is_legal(&self) -> bool {
        self.ledger.is_affordable()
            && self.available.overdrawn().is_empty()
            && self.unmet.is_empty()
    }
}

/// Derive sigils, ledger and availability from scratch. Pure: equal inputs
/// always produce equal output.
#[must_use]
pub fn recompute(
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    reference: &ReferenceCatalogue,
) -> Recomputed {
    let sigils = compute_totals(snapshot, catalogue);
    let available = compute_available(&sigils);
    let ledger = compute_balances(snapshot, catalogue, reference);
    let availability = availability_map(snapshot, catalogue, &available);
    let unmet = unmet_requirements(snapshot, catalogue)
        .into_iter()
        .map(|(_, id)| id)
        .collect();
    Recomputed {
        sigils,
        available,
        ledger,
        availability,
        unmet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigil::SigilKind;

    #[test]
    fn empty_build_is_legal() {
        let result = recompute(
            &BuildSnapshot::default(),
            Catalogue::builtin(),
            &ReferenceCatalogue::empty(),
        );
        assert!(result.is_legal());
        assert_eq!(result.availability.len(), Catalogue::builtin().options.len());
    }

    #[test]
    fn overdrawn_sigils_make_a_build_illegal() {
        let mut snap = BuildSnapshot::default();
        snap.blessing_nodes.insert("tide.1".to_string());
        let result = recompute(&snap, Catalogue::builtin(), &ReferenceCatalogue::empty());
        assert_eq!(result.available.get(SigilKind::Kisin), -1);
        assert!(!result.is_legal());
        assert_eq!(result.availability["tide.1"], Availability::Selected);
    }

    #[test]
    fn stranded_requirements_make_a_build_illegal() {
        let mut snap = BuildSnapshot::default();
        snap.special_sigils.insert("sigil.grave_odal".to_string());
        let result = recompute(&snap, Catalogue::builtin(), &ReferenceCatalogue::empty());
        assert_eq!(result.unmet, vec!["sigil.grave_odal".to_string()]);
        assert!(!result.is_legal());

        snap.origins.insert("origin.witchborn".to_string());
        let result = recompute(&snap, Catalogue::builtin(), &ReferenceCatalogue::empty());
        assert!(result.unmet.is_empty());
    }
}
