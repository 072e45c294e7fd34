//! Command handler: the only way a build snapshot changes.
//!
//! [`apply`] computes the next snapshot from the current one. The input is
//! never touched, so a rejected command leaves the build exactly as it was.
//! Every accepted command ends with the override purge, which keeps the
//! override map a subset of the selected tree nodes.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalogue::{Catalogue, Family};
use crate::constants::{LOG_CASCADE, LOG_OVERRIDE_PURGED, LOG_REQUIREMENT_RELEASE};
use crate::cost::Currency;
use crate::reference::ReferenceCatalogue;
use crate::sigil::{SigilKind, available_for};
use crate::snapshot::{AscensionPayment, BuildSnapshot, Pact, RelicPayment};
use crate::validator::{self, Availability, LockReason};

/// A single user intent against the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BuildCommand {
    Select { id: String },
    Deselect { id: String },
    AdjustSigils { kind: SigilKind, delta: i32 },
    SetBonusSigil { active: bool },
    SetBoost { category: String, active: bool },
    SetPact { pact: Pact, active: bool },
    SetOverride { node: String, kp_paid: bool },
    SetHomeRegion { region: Option<String> },
    SetTrial { blessing: String, active: bool },
    SetMastery { blessing: String, active: bool },
    SetFamiliar { upgraded: bool, currency: Currency },
    SetExtraRetinue { count: u32 },
    SetRelic { payment: Option<RelicPayment> },
    SetAscension { payment: Option<AscensionPayment> },
    ImportWeapon { name: String },
    RemoveWeapon { name: String },
}

/// What happens to picks above the cap when a boost is switched off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostRelease {
    /// Existing picks persist; only new picks are blocked.
    #[default]
    Retain,
    /// Lexicographically last picks are dropped until the cap holds.
    Trim,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPolicy {
    pub boost_release: BoostRelease,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("{id} is locked: {reason}")]
    Locked { id: String, reason: LockReason },
    #[error("command would overdraw {0} sigils")]
    Overdraw(SigilKind),
    #[error("{kind} purchase count cannot go below zero")]
    NegativeCount { kind: SigilKind },
    #[error("{kind} purchase count is too large")]
    CountOverflow { kind: SigilKind },
    #[error("the familiar upgrade cannot be paid in {0}")]
    InvalidCurrency(Currency),
}

fn locked(id: &str, reason: LockReason) -> CommandError {
    CommandError::Locked {
        id: id.to_string(),
        reason,
    }
}

/// Compute the snapshot that results from `command`.
///
/// # Errors
///
/// Returns a [`CommandError`] when a gate rejects the command or when it would
/// push a non-negative sigil balance below zero.
pub fn apply(
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    reference: &ReferenceCatalogue,
    command: &BuildCommand,
    policy: CommandPolicy,
) -> Result<BuildSnapshot, CommandError> {
    let mut next = snapshot.clone();
    match command {
        BuildCommand::Select { id } => select(&mut next, catalogue, id)?,
        BuildCommand::Deselect { id } => {
            deselect(&mut next, catalogue, id);
            release_unmet_requirements(&mut next, catalogue);
        }
        BuildCommand::AdjustSigils { kind, delta } => {
            let current = i64::from(next.common_count(*kind));
            let target = current + i64::from(*delta);
            let count = u32::try_from(target).map_err(|_| {
                if target < 0 {
                    CommandError::NegativeCount { kind: *kind }
                } else {
                    CommandError::CountOverflow { kind: *kind }
                }
            })?;
            if count == 0 {
                next.common_sigils.remove(kind);
            } else {
                next.common_sigils.insert(*kind, count);
            }
        }
        BuildCommand::SetBonusSigil { active } => next.bonus_sigil = *active,
        BuildCommand::SetBoost { category, active } => {
            set_boost(&mut next, catalogue, category, *active, policy)?;
        }
        BuildCommand::SetPact { pact, active } => set_pact(&mut next, *pact, *active),
        BuildCommand::SetOverride { node, kp_paid } => {
            if *kp_paid {
                let kind = validator::check_kp_override(node, &next, catalogue)
                    .map_err(|reason| locked(node, reason))?;
                next.kp_nodes.insert(node.clone(), kind);
            } else {
                next.kp_nodes.remove(node);
            }
        }
        BuildCommand::SetHomeRegion { region } => {
            if let Some(region) = region {
                validator::check_region(region, catalogue)
                    .map_err(|reason| locked(region, reason))?;
            }
            next.home_region.clone_from(region);
        }
        BuildCommand::SetTrial { blessing, active } => {
            if *active {
                validator::check_trial(blessing, &next, catalogue)
                    .map_err(|reason| locked(blessing, reason))?;
                next.trials.insert(blessing.clone());
            } else {
                next.trials.remove(blessing);
                next.masteries.remove(blessing);
            }
        }
        BuildCommand::SetMastery { blessing, active } => {
            if *active {
                validator::check_mastery(blessing, &next, catalogue)
                    .map_err(|reason| locked(blessing, reason))?;
                next.masteries.insert(blessing.clone());
            } else {
                next.masteries.remove(blessing);
            }
        }
        BuildCommand::SetFamiliar { upgraded, currency } => {
            if *currency == Currency::Kp {
                return Err(CommandError::InvalidCurrency(*currency));
            }
            next.familiar_upgrade = *upgraded;
            next.familiar_currency = *currency;
        }
        BuildCommand::SetExtraRetinue { count } => next.extra_retinue = *count,
        BuildCommand::SetRelic { payment } => {
            if let Some(payment) = payment {
                let available = available_for(&next, catalogue);
                validator::check_relic(*payment, &next, &available)
                    .map_err(|reason| locked("relic", reason))?;
            }
            next.relic = *payment;
        }
        BuildCommand::SetAscension { payment } => {
            if let Some(payment) = payment {
                let available = available_for(&next, catalogue);
                validator::check_ascension(*payment, &next, &available)
                    .map_err(|reason| locked("ascension", reason))?;
            }
            next.ascension = *payment;
        }
        BuildCommand::ImportWeapon { name } => {
            validator::check_weapon(name, reference).map_err(|reason| locked(name, reason))?;
            next.imported_weapons.insert(name.clone());
        }
        BuildCommand::RemoveWeapon { name } => {
            next.imported_weapons.remove(name);
        }
    }

    purge_orphaned_overrides(&mut next);
    reject_overdraw(snapshot, &next, catalogue)?;
    Ok(next)
}

fn select(next: &mut BuildSnapshot, catalogue: &Catalogue, id: &str) -> Result<(), CommandError> {
    let Some(option) = catalogue.option(id) else {
        log::warn!("select ignored: {id} is not in the catalogue");
        return Ok(());
    };
    let available = available_for(next, catalogue);
    match validator::availability(id, next, catalogue, &available, &next.kp_nodes) {
        Availability::Selected => Ok(()),
        Availability::Selectable => {
            next.family_set_mut(option.family).insert(id.to_string());
            Ok(())
        }
        Availability::Locked { reason } => Err(locked(id, reason)),
    }
}

fn deselect(next: &mut BuildSnapshot, catalogue: &Catalogue, id: &str) {
    let family = catalogue
        .option(id)
        .map(|opt| opt.family)
        .or_else(|| Family::ALL.into_iter().find(|f| next.family_set(*f).contains(id)));
    if let Some(family) = family {
        remove_selection(next, catalogue, family, id);
    }
}

fn remove_selection(
    snapshot: &mut BuildSnapshot,
    catalogue: &Catalogue,
    family: Family,
    id: &str,
) {
    if family == Family::BlessingNode {
        cascade_deselect(snapshot, catalogue, id);
    } else {
        snapshot.family_set_mut(family).remove(id);
    }
}

/// Deselect every option whose `requires` or `requires_count` no longer
/// holds, repeating until the selection is stable. Returns the removed ids in
/// removal order.
pub fn release_unmet_requirements(
    snapshot: &mut BuildSnapshot,
    catalogue: &Catalogue,
) -> Vec<String> {
    let mut removed = Vec::new();
    loop {
        let unmet = validator::unmet_requirements(snapshot, catalogue);
        if unmet.is_empty() {
            break;
        }
        for (family, id) in unmet {
            // An earlier tree cascade in this pass may already have taken it.
            if snapshot.family_set(family).contains(&id) {
                remove_selection(snapshot, catalogue, family, &id);
                removed.push(id);
            }
        }
    }
    if !removed.is_empty() {
        log::debug!("{LOG_REQUIREMENT_RELEASE}: {removed:?}");
    }
    removed
}

/// Remove a tree node and every selected node after it in the same tree.
///
/// Returns the removed ids, root side first. Removed nodes also leave the
/// override map, and removing a root drops the blessing's mastery.
pub fn cascade_deselect(
    snapshot: &mut BuildSnapshot,
    catalogue: &Catalogue,
    node: &str,
) -> Vec<String> {
    let mut removed = Vec::new();
    let Some(option) = catalogue.option(node) else {
        if snapshot.blessing_nodes.remove(node) {
            snapshot.kp_nodes.remove(node);
            removed.push(node.to_string());
        }
        return removed;
    };
    let position = option.position.unwrap_or(0);

    let mut targets = vec![option.id.clone()];
    if let Some(blessing) = option.blessing.as_deref() {
        targets.extend(
            catalogue
                .tree(blessing)
                .into_iter()
                .filter(|n| n.position.is_some_and(|p| p > position))
                .map(|n| n.id.clone()),
        );
        if option.is_tree_root() {
            snapshot.masteries.remove(blessing);
        }
    }

    for target in targets {
        if snapshot.blessing_nodes.remove(&target) {
            snapshot.kp_nodes.remove(&target);
            removed.push(target);
        }
    }
    if removed.len() > 1 {
        log::debug!("{LOG_CASCADE}: {node} removed {removed:?}");
    }
    removed
}

/// Drop override entries whose node is no longer selected. Returns how many
/// entries were removed.
pub fn purge_orphaned_overrides(snapshot: &mut BuildSnapshot) -> usize {
    let before = snapshot.kp_nodes.len();
    let selected = &snapshot.blessing_nodes;
    snapshot.kp_nodes.retain(|node, _| selected.contains(node));
    let purged = before - snapshot.kp_nodes.len();
    if purged > 0 {
        log::debug!("{LOG_OVERRIDE_PURGED}: {purged} entries");
    }
    purged
}

fn set_boost(
    next: &mut BuildSnapshot,
    catalogue: &Catalogue,
    category: &str,
    active: bool,
    policy: CommandPolicy,
) -> Result<(), CommandError> {
    if active {
        let available = available_for(next, catalogue);
        validator::check_boost(category, next, catalogue, &available)
            .map_err(|reason| locked(category, reason))?;
        next.boosts.insert(category.to_string());
        return Ok(());
    }
    if next.boosts.remove(category) && policy.boost_release == BoostRelease::Trim {
        trim_over_cap(next, catalogue, category);
        release_unmet_requirements(next, catalogue);
    }
    Ok(())
}

/// Drop the lexicographically last picks of `category` until it is within
/// its effective cap. Returns the removed ids.
pub fn trim_over_cap(
    snapshot: &mut BuildSnapshot,
    catalogue: &Catalogue,
    category: &str,
) -> Vec<String> {
    let Some(def) = catalogue.category(category) else {
        return Vec::new();
    };
    let cap = usize::try_from(validator::effective_cap(def, snapshot)).unwrap_or(usize::MAX);
    let mut picks: Vec<(Family, String)> = snapshot
        .selections()
        .filter(|(_, id)| {
            catalogue
                .option(id)
                .is_some_and(|opt| opt.category.as_deref() == Some(category))
        })
        .map(|(family, id)| (family, id.to_string()))
        .collect();
    picks.sort_by(|a, b| a.1.cmp(&b.1));

    let mut removed = Vec::new();
    while picks.len() > cap {
        let Some((family, id)) = picks.pop() else {
            break;
        };
        snapshot.family_set_mut(family).remove(&id);
        removed.push(id);
    }
    removed
}

fn set_pact(next: &mut BuildSnapshot, pact: Pact, active: bool) {
    if active {
        next.pacts.insert(pact);
        return;
    }
    next.pacts.remove(&pact);
    if pact == Pact::Kuri {
        release_kuri_state(next);
    }
}

/// Clear every KP payment: the override map and a KP-paid ascension.
pub(crate) fn release_kuri_state(snapshot: &mut BuildSnapshot) {
    snapshot.kp_nodes.clear();
    if snapshot.ascension == Some(AscensionPayment::Kuri) {
        snapshot.ascension = None;
    }
}

fn reject_overdraw(
    before: &BuildSnapshot,
    after: &BuildSnapshot,
    catalogue: &Catalogue,
) -> Result<(), CommandError> {
    let was = available_for(before, catalogue);
    let now = available_for(after, catalogue);
    match SigilKind::ALL
        .into_iter()
        .find(|kind| was.get(*kind) >= 0 && now.get(*kind) < 0)
    {
        Some(kind) => Err(CommandError::Overdraw(kind)),
        None => Ok(()),
    }
}
