//! Seeded random playthroughs that hammer the command handler and check the
//! engine invariants after every accepted step.
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

use sigilbuild_engine::codec::{self, BuildDocument};
use sigilbuild_engine::sigil::available_for;
use sigilbuild_engine::validator::unmet_requirements;
use sigilbuild_engine::{
    AscensionPayment, BuildCommand, BuildSnapshot, Catalogue, CommandPolicy, Currency, Family,
    Pact, ReferenceCatalogue, RelicPayment, SigilKind, apply, compute_balances, node_price,
};

use super::CheckResult;

#[derive(Debug, Clone, Copy)]
pub struct PlaythroughPlan {
    pub seed: u64,
    pub steps: usize,
    pub policy: CommandPolicy,
}

/// Failures stop collecting after this many per seed.
const MAX_REPORTED_FAILURES: usize = 20;

#[must_use]
pub fn run_playthrough(
    catalogue: &Catalogue,
    reference: &ReferenceCatalogue,
    plan: PlaythroughPlan,
    verbose: bool,
) -> CheckResult {
    let start = Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(plan.seed);
    let mut snapshot = BuildSnapshot::default();
    let mut accepted = 0_usize;
    let mut rejected = 0_usize;
    let mut failures = Vec::new();

    for step in 0..plan.steps {
        let command = random_command(&mut rng, &snapshot, catalogue, reference);
        match apply(&snapshot, catalogue, reference, &command, plan.policy) {
            Ok(next) => {
                for failure in check_step(&snapshot, &command, &next, catalogue, reference) {
                    failures.push(format!("step {step}: {failure}"));
                }
                snapshot = next;
                accepted += 1;
            }
            Err(err) => {
                log::debug!("playthrough {} step {step}: {command:?} rejected: {err}", plan.seed);
                if verbose {
                    println!("   {} step {step}: {err}", "↩".dimmed());
                }
                rejected += 1;
            }
        }
        if failures.len() >= MAX_REPORTED_FAILURES {
            break;
        }
    }

    let document = BuildDocument::new(snapshot, reference.clone());
    let ledger = compute_balances(&document.character, catalogue, reference);
    let details = vec![
        format!("accepted: {accepted}"),
        format!("rejected: {rejected}"),
        format!(
            "final balances: {} BP, {} FP, {} KP",
            ledger.bp.balance, ledger.fp.balance, ledger.kp.balance
        ),
        format!("final digest: {}", codec::document_digest(&document)),
    ];
    CheckResult::new(
        format!("playthrough:{}", plan.seed),
        details,
        failures,
        start.elapsed(),
    )
}

fn random_command(
    rng: &mut ChaCha8Rng,
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    reference: &ReferenceCatalogue,
) -> BuildCommand {
    fn pick(rng: &mut ChaCha8Rng, items: &[&str]) -> String {
        items.choose(rng).map_or_else(String::new, |s| (*s).to_string())
    }
    let kind = SigilKind::ALL.choose(rng).copied().unwrap_or(SigilKind::Kisin);

    match rng.gen_range(0..16) {
        0..=4 => BuildCommand::Select {
            id: catalogue.options.choose(rng).map(|o| o.id.clone()).unwrap_or_default(),
        },
        5 | 6 => {
            let selected: Vec<&str> = snapshot.selections().map(|(_, id)| id).collect();
            BuildCommand::Deselect {
                id: pick(rng, &selected),
            }
        }
        7 => BuildCommand::AdjustSigils {
            kind,
            delta: rng.gen_range(-1..=2),
        },
        8 => {
            let categories: Vec<&str> =
                catalogue.categories.iter().map(|c| c.id.as_str()).collect();
            BuildCommand::SetBoost {
                category: pick(rng, &categories),
                active: rng.gen_bool(0.6),
            }
        }
        9 => BuildCommand::SetPact {
            pact: Pact::ALL.choose(rng).copied().unwrap_or(Pact::Kuri),
            active: rng.gen_bool(0.6),
        },
        10 => {
            let nodes: Vec<&str> = snapshot.blessing_nodes.iter().map(String::as_str).collect();
            BuildCommand::SetOverride {
                node: pick(rng, &nodes),
                kp_paid: rng.gen_bool(0.7),
            }
        }
        11 | 12 => {
            let blessings: Vec<&str> = catalogue.blessings.iter().map(|b| b.id.as_str()).collect();
            let blessing = pick(rng, &blessings);
            let active = rng.gen_bool(0.7);
            if rng.gen_bool(0.5) {
                BuildCommand::SetTrial { blessing, active }
            } else {
                BuildCommand::SetMastery { blessing, active }
            }
        }
        13 => {
            let regions: Vec<&str> = catalogue.regions.iter().map(|r| r.id.as_str()).collect();
            BuildCommand::SetHomeRegion {
                region: rng.gen_bool(0.8).then(|| pick(rng, &regions)),
            }
        }
        14 => match rng.gen_range(0..4) {
            0 => BuildCommand::SetRelic {
                payment: [None, Some(RelicPayment::Fortune), Some(RelicPayment::Sigil)]
                    .choose(rng)
                    .copied()
                    .flatten(),
            },
            1 => BuildCommand::SetAscension {
                payment: [None, Some(AscensionPayment::Sigil), Some(AscensionPayment::Kuri)]
                    .choose(rng)
                    .copied()
                    .flatten(),
            },
            2 => BuildCommand::SetFamiliar {
                upgraded: rng.gen_bool(0.5),
                currency: if rng.gen_bool(0.5) { Currency::Bp } else { Currency::Fp },
            },
            _ => BuildCommand::SetExtraRetinue {
                count: rng.gen_range(0..3),
            },
        },
        _ => {
            let weapons: Vec<&str> = reference.weapons.keys().map(String::as_str).collect();
            match rng.gen_range(0..3) {
                0 => BuildCommand::SetBonusSigil {
                    active: rng.gen_bool(0.5),
                },
                1 => BuildCommand::ImportWeapon {
                    name: pick(rng, &weapons),
                },
                _ => BuildCommand::RemoveWeapon {
                    name: pick(rng, &weapons),
                },
            }
        }
    }
}

/// Invariant checks for one accepted transition.
fn check_step(
    before: &BuildSnapshot,
    command: &BuildCommand,
    after: &BuildSnapshot,
    catalogue: &Catalogue,
    reference: &ReferenceCatalogue,
) -> Vec<String> {
    let mut failures = Vec::new();

    let available = available_for(after, catalogue);
    for (kind, count) in available.iter() {
        if count < 0 {
            failures.push(format!("{kind} availability went negative ({count})"));
        }
    }

    for (_, id) in unmet_requirements(after, catalogue) {
        failures.push(format!("{id} is selected without its requirements"));
    }

    let ledger = compute_balances(after, catalogue, reference);
    if ledger != compute_balances(after, catalogue, reference) {
        failures.push("ledger is not deterministic".to_string());
    }

    for node in after.kp_nodes.keys() {
        let Some(option) = catalogue
            .option(node)
            .filter(|_| after.blessing_nodes.contains(node))
        else {
            failures.push(format!("override {node} survived without its node"));
            continue;
        };
        let price = node_price(option, after, catalogue);
        let mut unpaid = after.clone();
        unpaid.kp_nodes.remove(node);
        let plain = compute_balances(&unpaid, catalogue, reference);
        if plain.bp.spent - ledger.bp.spent != price || ledger.kp.spent - plain.kp.spent != price {
            failures.push(format!("override {node} does not move exactly {price}"));
        }
    }

    if let BuildCommand::Deselect { id } = command
        && before.blessing_nodes.contains(id)
        && let Some(option) = catalogue.option(id)
        && option.family == Family::BlessingNode
    {
        let position = option.position.unwrap_or(0);
        let survivors: Vec<&str> = catalogue
            .tree(option.blessing.as_deref().unwrap_or_default())
            .into_iter()
            .filter(|n| n.position.is_some_and(|p| p >= position))
            .filter(|n| after.blessing_nodes.contains(&n.id) || after.kp_nodes.contains_key(&n.id))
            .map(|n| n.id.as_str())
            .collect();
        if !survivors.is_empty() {
            failures.push(format!("deselecting {id} left {survivors:?}"));
        }
    }

    let document = BuildDocument::new(after.clone(), reference.clone());
    if codec::deserialize(&codec::serialize(&document)) != document {
        failures.push("codec round trip changed the build".to_string());
    }

    failures
}
