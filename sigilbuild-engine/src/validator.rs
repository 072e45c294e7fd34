//! Prerequisite and availability checks.
//!
//! Every check reads an immutable snapshot plus the sigil availability derived
//! from it; nothing here mutates state. Deselection is always legal, so the
//! gates only apply to new selections and toggles being switched on.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::catalogue::{Catalogue, CategoryDef, Family, OptionDef};
use crate::constants::{MAX_TRIALS, RETINUE_CATEGORY};
use crate::numbers::count_to_u32;
use crate::reference::{ReferenceCatalogue, ReferenceKind};
use crate::sigil::{ASCENSION_SIGIL, RELIC_SIGIL, SigilAvailability, SigilKind};
use crate::snapshot::{AscensionPayment, BuildSnapshot, Pact, RelicPayment};

/// Why an option or toggle cannot be switched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    MissingRequirement { requires: String },
    RequirementCount { family: Family, needed: u32, have: u32 },
    CategoryFull { category: String, cap: u32 },
    ChainIncomplete { missing: String },
    SigilShortfall { sigil: SigilKind },
    Excluded { by: String },
    NoBoost { category: String },
    TrialCap { cap: usize },
    TrialMissing { blessing: String },
    RootMissing { blessing: String },
    UnknownBlessing { blessing: String },
    PactRequired { pact: Pact },
    NotSelected { id: String },
    NotTreeNode { id: String },
    UnknownRegion { region: String },
    UnknownReference { name: String },
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequirement { requires } => write!(f, "requires {requires}"),
            Self::RequirementCount {
                family,
                needed,
                have,
            } => write!(f, "requires {needed} {family} selections (have {have})"),
            Self::CategoryFull { category, cap } => write!(f, "{category} is full ({cap} picks)"),
            Self::ChainIncomplete { missing } => write!(f, "unlock {missing} first"),
            Self::SigilShortfall { sigil } => write!(f, "no spare {sigil} sigil"),
            Self::Excluded { by } => write!(f, "excluded by {by}"),
            Self::NoBoost { category } => write!(f, "{category} has no boost"),
            Self::TrialCap { cap } => write!(f, "trial limit of {cap} reached"),
            Self::TrialMissing { blessing } => write!(f, "take the {blessing} trial first"),
            Self::RootMissing { blessing } => write!(f, "unlock the {blessing} root first"),
            Self::UnknownBlessing { blessing } => write!(f, "unknown blessing {blessing}"),
            Self::PactRequired { pact } => write!(f, "requires the {pact} pact"),
            Self::NotSelected { id } => write!(f, "{id} is not selected"),
            Self::NotTreeNode { id } => write!(f, "{id} is not a sigil tree node"),
            Self::UnknownRegion { region } => write!(f, "unknown region {region}"),
            Self::UnknownReference { name } => write!(f, "no saved item named {name}"),
        }
    }
}

/// Interaction state of one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    /// Already selected; deselection is always legal.
    Selected,
    Selectable,
    Locked { reason: LockReason },
}

impl Availability {
    #[must_use]
    pub const fn can_interact(&self) -> bool {
        !matches!(self, Self::Locked { .. })
    }

    #[must_use]
    pub const fn lock_reason(&self) -> Option<&LockReason> {
        match self {
            Self::Locked { reason } => Some(reason),
            _ => None,
        }
    }
}

fn locked(reason: LockReason) -> Availability {
    Availability::Locked { reason }
}

/// Pick cap of a category after boosts and the retinue counter.
#[must_use]
pub fn effective_cap(category: &CategoryDef, snapshot: &BuildSnapshot) -> u32 {
    let mut cap = category.cap;
    if let Some(boost) = &category.boost
        && snapshot.boosts.contains(&category.id)
    {
        cap = cap.saturating_add(boost.extra_picks);
    }
    if category.id == RETINUE_CATEGORY {
        cap = cap.saturating_add(snapshot.extra_retinue);
    }
    cap
}

/// Number of selected options filed under `category`.
#[must_use]
pub fn category_count(category: &str, snapshot: &BuildSnapshot, catalogue: &Catalogue) -> u32 {
    let count = snapshot
        .selections()
        .filter_map(|(_, id)| catalogue.option(id))
        .filter(|opt| opt.category.as_deref() == Some(category))
        .count();
    count_to_u32(count)
}

/// Decide whether `option_id` can be interacted with right now.
#[must_use]
pub fn availability(
    option_id: &str,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    available: &SigilAvailability,
    overrides: &BTreeMap<String, SigilKind>,
) -> Availability {
    let Some(option) = catalogue.option(option_id) else {
        if snapshot.is_selected(option_id) {
            return Availability::Selected;
        }
        return Availability::Selectable;
    };
    if snapshot.family_set(option.family).contains(option_id) {
        return Availability::Selected;
    }

    if let Err(reason) = check_requirements(option, snapshot) {
        return locked(reason);
    }
    if let Err(reason) = check_category(option, snapshot, catalogue) {
        return locked(reason);
    }
    if option.family == Family::BlessingNode
        && let Err(reason) = check_tree(option, snapshot, catalogue, available, overrides)
    {
        return locked(reason);
    }
    if let Err(reason) = check_exclusive(option, snapshot, catalogue) {
        return locked(reason);
    }
    Availability::Selectable
}

/// True when the option is selected (and so can be deselected) or can be
/// newly selected.
#[must_use]
pub fn is_selectable(
    option_id: &str,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    available: &SigilAvailability,
    overrides: &BTreeMap<String, SigilKind>,
) -> bool {
    availability(option_id, snapshot, catalogue, available, overrides).can_interact()
}

/// Availability of every catalogue option against the snapshot's own
/// override map.
#[must_use]
pub fn availability_map(
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    available: &SigilAvailability,
) -> BTreeMap<String, Availability> {
    catalogue
        .options
        .iter()
        .map(|opt| {
            let state = availability(&opt.id, snapshot, catalogue, available, &snapshot.kp_nodes);
            (opt.id.clone(), state)
        })
        .collect()
}

/// Selected options whose `requires` or `requires_count` no longer holds,
/// with the family set each sits in.
#[must_use]
pub fn unmet_requirements(
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
) -> Vec<(Family, String)> {
    snapshot
        .selections()
        .filter(|(_, id)| {
            catalogue
                .option(id)
                .is_some_and(|opt| check_requirements(opt, snapshot).is_err())
        })
        .map(|(family, id)| (family, id.to_string()))
        .collect()
}

fn check_requirements(option: &OptionDef, snapshot: &BuildSnapshot) -> Result<(), LockReason> {
    if let Some(missing) = option.requires.iter().find(|req| !snapshot.is_selected(req)) {
        return Err(LockReason::MissingRequirement {
            requires: missing.clone(),
        });
    }
    if let Some(req) = &option.requires_count {
        let have = count_to_u32(snapshot.family_set(req.family).len());
        if have < req.count {
            return Err(LockReason::RequirementCount {
                family: req.family,
                needed: req.count,
                have,
            });
        }
    }
    Ok(())
}

fn check_category(
    option: &OptionDef,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
) -> Result<(), LockReason> {
    let Some(category) = option.category.as_deref().and_then(|id| catalogue.category(id)) else {
        return Ok(());
    };
    let cap = effective_cap(category, snapshot);
    if category_count(&category.id, snapshot, catalogue) >= cap {
        return Err(LockReason::CategoryFull {
            category: category.id.clone(),
            cap,
        });
    }
    Ok(())
}

fn check_tree(
    option: &OptionDef,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    available: &SigilAvailability,
    overrides: &BTreeMap<String, SigilKind>,
) -> Result<(), LockReason> {
    let position = option.position.unwrap_or(0);
    if let Some(blessing) = option.blessing.as_deref() {
        let missing = catalogue
            .tree(blessing)
            .into_iter()
            .take_while(|node| node.position.unwrap_or(u8::MAX) < position)
            .find(|node| !snapshot.blessing_nodes.contains(&node.id));
        if let Some(node) = missing {
            return Err(LockReason::ChainIncomplete {
                missing: node.id.clone(),
            });
        }
    }

    // A pre-paid node is not gated on inventory again.
    if overrides.contains_key(&option.id) {
        return Ok(());
    }
    if let Some(kind) = option.sigil_cost()
        && !available.has_spare(kind)
    {
        return Err(LockReason::SigilShortfall { sigil: kind });
    }
    Ok(())
}

fn check_exclusive(
    option: &OptionDef,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
) -> Result<(), LockReason> {
    let Some(group) = option.exclusive.as_deref() else {
        return Ok(());
    };
    let blocker = snapshot
        .selections()
        .filter(|(_, id)| *id != option.id)
        .filter_map(|(_, id)| catalogue.option(id))
        .find(|other| other.exclusive.as_deref() == Some(group));
    match blocker {
        Some(other) => Err(LockReason::Excluded {
            by: other.id.clone(),
        }),
        None => Ok(()),
    }
}

/// Gate for switching a category boost on.
///
/// # Errors
///
/// Returns the lock reason when the category has no boost or no spare sigil.
pub fn check_boost(
    category: &str,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    available: &SigilAvailability,
) -> Result<(), LockReason> {
    let boost = catalogue
        .category(category)
        .and_then(|cat| cat.boost.as_ref())
        .ok_or_else(|| LockReason::NoBoost {
            category: category.to_string(),
        })?;
    if snapshot.boosts.contains(category) {
        return Ok(());
    }
    if !available.has_spare(boost.sigil) {
        return Err(LockReason::SigilShortfall { sigil: boost.sigil });
    }
    Ok(())
}

/// Gate for taking a blessing trial.
///
/// # Errors
///
/// Returns the lock reason for unknown blessings or when the trial cap is hit.
pub fn check_trial(
    blessing: &str,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
) -> Result<(), LockReason> {
    if catalogue.blessing(blessing).is_none() {
        return Err(LockReason::UnknownBlessing {
            blessing: blessing.to_string(),
        });
    }
    if snapshot.trials.contains(blessing) {
        return Ok(());
    }
    if snapshot.trials.len() >= MAX_TRIALS {
        return Err(LockReason::TrialCap { cap: MAX_TRIALS });
    }
    Ok(())
}

/// Gate for the mastery unlock, which is never granted implicitly.
///
/// # Errors
///
/// Returns the lock reason when the trial or the tree root is missing.
pub fn check_mastery(
    blessing: &str,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
) -> Result<(), LockReason> {
    let root = catalogue
        .tree_root(blessing)
        .ok_or_else(|| LockReason::UnknownBlessing {
            blessing: blessing.to_string(),
        })?;
    if !snapshot.trials.contains(blessing) {
        return Err(LockReason::TrialMissing {
            blessing: blessing.to_string(),
        });
    }
    if !snapshot.blessing_nodes.contains(&root.id) {
        return Err(LockReason::RootMissing {
            blessing: blessing.to_string(),
        });
    }
    Ok(())
}

/// Gate for paying a selected tree node with KP.
///
/// # Errors
///
/// Returns the lock reason without the Kuri pact or for unselected nodes.
pub fn check_kp_override(
    node: &str,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
) -> Result<SigilKind, LockReason> {
    if !snapshot.has_pact(Pact::Kuri) {
        return Err(LockReason::PactRequired { pact: Pact::Kuri });
    }
    let kind = catalogue
        .option(node)
        .and_then(OptionDef::sigil_cost)
        .ok_or_else(|| LockReason::NotTreeNode {
            id: node.to_string(),
        })?;
    if !snapshot.blessing_nodes.contains(node) {
        return Err(LockReason::NotSelected {
            id: node.to_string(),
        });
    }
    Ok(kind)
}

/// Gate for forging the relic.
///
/// # Errors
///
/// Returns a shortfall when paying by sigil without a spare one.
pub fn check_relic(
    payment: RelicPayment,
    snapshot: &BuildSnapshot,
    available: &SigilAvailability,
) -> Result<(), LockReason> {
    if payment == RelicPayment::Sigil
        && snapshot.relic != Some(RelicPayment::Sigil)
        && !available.has_spare(RELIC_SIGIL)
    {
        return Err(LockReason::SigilShortfall { sigil: RELIC_SIGIL });
    }
    Ok(())
}

/// Gate for ascension.
///
/// # Errors
///
/// Returns the lock reason without a spare sigil or without the Kuri pact.
pub fn check_ascension(
    payment: AscensionPayment,
    snapshot: &BuildSnapshot,
    available: &SigilAvailability,
) -> Result<(), LockReason> {
    match payment {
        AscensionPayment::Kuri if !snapshot.has_pact(Pact::Kuri) => {
            Err(LockReason::PactRequired { pact: Pact::Kuri })
        }
        AscensionPayment::Sigil
            if snapshot.ascension != Some(AscensionPayment::Sigil)
                && !available.has_spare(ASCENSION_SIGIL) =>
        {
            Err(LockReason::SigilShortfall {
                sigil: ASCENSION_SIGIL,
            })
        }
        _ => Ok(()),
    }
}

/// Gate for the home region field.
///
/// # Errors
///
/// Returns the lock reason for regions missing from the catalogue.
pub fn check_region(region: &str, catalogue: &Catalogue) -> Result<(), LockReason> {
    if catalogue.has_region(region) {
        Ok(())
    } else {
        Err(LockReason::UnknownRegion {
            region: region.to_string(),
        })
    }
}

/// Gate for importing a saved weapon.
///
/// # Errors
///
/// Returns the lock reason when no saved weapon has that name.
pub fn check_weapon(name: &str, reference: &ReferenceCatalogue) -> Result<(), LockReason> {
    if reference.spent(ReferenceKind::Weapons, name).is_some() {
        Ok(())
    } else {
        Err(LockReason::UnknownReference {
            name: name.to_string(),
        })
    }
}
