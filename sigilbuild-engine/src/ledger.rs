//! Resource ledger: gained, spent and balance per currency.
//!
//! Every family of selections contributes its own list of [`LedgerLine`]s.
//! The lines are sorted before they are totalled, so the result never depends
//! on the order in which the snapshot was assembled.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalogue::{Catalogue, Family, OptionDef};
use crate::constants::{
    BLOOD_PACT_NODE_MULTIPLIER, FAMILIAR_UPGRADE_COST, LOG_OVERRIDE_ORPHAN,
    REGION_COMPANION_DISCOUNT, REGION_NODE_DISCOUNT, RELIC_FP_COST, RETINUE_STEP_COST,
    SMITH_REFUND_DIVISOR, STARTING_BP, STARTING_FP, STARTING_KP_WITH_PACT, WEAPON_IMPORT_FEE,
};
use crate::cost::{self, CostRecord, Currency};
use crate::numbers::{priced, refund_share};
use crate::reference::{ReferenceCatalogue, ReferenceKind};
use crate::sigil::ASCENSION_SIGIL;
use crate::snapshot::{AscensionPayment, BuildSnapshot, Pact, RelicPayment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Spend,
    Grant,
    /// Reverses an earlier spend in the same currency.
    Refund,
}

/// One priced contribution. `amount` is never negative; the kind carries the
/// direction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerLine {
    pub source: String,
    pub currency: Currency,
    pub kind: EntryKind,
    pub amount: i64,
}

impl fmt::Display for LedgerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            EntryKind::Spend => "spends",
            EntryKind::Grant => "grants",
            EntryKind::Refund => "refunds",
        };
        write!(f, "{} {verb} {} {}", self.source, self.amount, self.currency)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyBalance {
    pub allowance: i64,
    pub gained: i64,
    pub spent: i64,
    pub balance: i64,
}

impl CurrencyBalance {
    #[must_use]
    pub const fn is_overspent(&self) -> bool {
        self.balance < 0
    }
}

/// Totals for all three currencies plus the sorted lines behind them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub bp: CurrencyBalance,
    pub fp: CurrencyBalance,
    pub kp: CurrencyBalance,
    pub lines: Vec<LedgerLine>,
}

impl Ledger {
    #[must_use]
    pub const fn balance(&self, currency: Currency) -> &CurrencyBalance {
        match currency {
            Currency::Bp => &self.bp,
            Currency::Fp => &self.fp,
            Currency::Kp => &self.kp,
        }
    }

    /// True when no currency is below zero.
    #[must_use]
    pub const fn is_affordable(&self) -> bool {
        !self.bp.is_overspent() && !self.fp.is_overspent() && !self.kp.is_overspent()
    }

    pub fn lines_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a LedgerLine> + 'a {
        self.lines.iter().filter(move |line| line.source == source)
    }
}

/// Starting allowance of a currency for this snapshot.
#[must_use]
pub fn allowance(currency: Currency, snapshot: &BuildSnapshot) -> i64 {
    match currency {
        Currency::Bp => STARTING_BP,
        Currency::Fp => STARTING_FP,
        Currency::Kp if snapshot.has_pact(Pact::Kuri) => STARTING_KP_WITH_PACT,
        Currency::Kp => 0,
    }
}

fn scaled_node_price(node: &OptionDef, snapshot: &BuildSnapshot) -> i64 {
    let base = node.sigil_cost().map_or(0, |kind| kind.base_price());
    if snapshot.has_pact(Pact::Blood) {
        base.saturating_mul(BLOOD_PACT_NODE_MULTIPLIER)
    } else {
        base
    }
}

/// BP price of unlocking a blessing node with every active modifier applied.
///
/// The KP override refund uses exactly this value.
#[must_use]
pub fn node_price(node: &OptionDef, snapshot: &BuildSnapshot, catalogue: &Catalogue) -> i64 {
    let scaled = scaled_node_price(node, snapshot);
    let blessing = node.blessing.as_deref();

    let trial = match blessing {
        Some(id) if node.is_tree_root() && snapshot.trials.contains(id) => scaled / 2,
        _ => 0,
    };
    let home = snapshot.home_region.as_deref();
    let region = match blessing.and_then(|id| catalogue.blessing(id)) {
        Some(def) if home.is_some() && def.region.as_deref() == home => REGION_NODE_DISCOUNT,
        _ => 0,
    };
    (scaled - trial - region).max(0)
}

/// Mastery fee: the pact-scaled root price without trial or region discounts.
#[must_use]
pub fn mastery_price(blessing: &str, snapshot: &BuildSnapshot, catalogue: &Catalogue) -> i64 {
    catalogue
        .tree_root(blessing)
        .map_or(0, |root| scaled_node_price(root, snapshot))
}

#[derive(Default)]
struct LineSink {
    lines: Vec<LedgerLine>,
}

impl LineSink {
    fn push(&mut self, source: &str, currency: Currency, kind: EntryKind, amount: i64) {
        if amount <= 0 {
            return;
        }
        self.lines.push(LedgerLine {
            source: source.to_string(),
            currency,
            kind,
            amount,
        });
    }

    fn record(&mut self, source: &str, record: CostRecord) {
        for currency in [Currency::Bp, Currency::Fp] {
            let amount = record.get(currency);
            if amount > 0 {
                self.push(source, currency, EntryKind::Spend, amount);
            } else if amount < 0 {
                self.push(source, currency, EntryKind::Grant, amount.saturating_neg());
            }
        }
    }
}

fn option_record(option: &OptionDef, snapshot: &BuildSnapshot) -> CostRecord {
    let mut record = option.cost_record();
    let blood = snapshot.has_pact(Pact::Blood);
    match option.family {
        Family::Companion if blood => CostRecord::ZERO,
        Family::Companion => {
            let home = snapshot.home_region.as_deref();
            if home.is_some() && option.birthplace.as_deref() == home && record.fp > 0 {
                record.fp = (record.fp - REGION_COMPANION_DISCOUNT).max(0);
            }
            record
        }
        Family::Drawback if blood => CostRecord::new(record.fp.max(0), record.bp.max(0)),
        _ => record,
    }
}

fn option_lines(sink: &mut LineSink, snapshot: &BuildSnapshot, catalogue: &Catalogue) {
    for (family, id) in snapshot.selections() {
        let Some(option) = catalogue.option(id) else {
            continue;
        };
        if family == Family::BlessingNode {
            sink.push(
                id,
                Currency::Bp,
                EntryKind::Spend,
                node_price(option, snapshot, catalogue),
            );
        } else {
            sink.record(id, option_record(option, snapshot));
        }
    }
}

fn override_lines(sink: &mut LineSink, snapshot: &BuildSnapshot, catalogue: &Catalogue) {
    for node in snapshot.kp_nodes.keys() {
        let option = catalogue
            .option(node)
            .filter(|_| snapshot.blessing_nodes.contains(node));
        let Some(option) = option else {
            log::warn!("{LOG_OVERRIDE_ORPHAN}: {node} is not a selected node");
            continue;
        };
        let price = node_price(option, snapshot, catalogue);
        let source = format!("override:{node}");
        sink.push(&source, Currency::Bp, EntryKind::Refund, price);
        sink.push(&source, Currency::Kp, EntryKind::Spend, price);
    }
}

fn sigil_lines(sink: &mut LineSink, snapshot: &BuildSnapshot) {
    for (kind, count) in &snapshot.common_sigils {
        let source = format!("sigils:{kind}");
        sink.push(&source, Currency::Fp, EntryKind::Spend, priced(*count, kind.base_price()));
    }
}

fn blessing_lines(sink: &mut LineSink, snapshot: &BuildSnapshot, catalogue: &Catalogue) {
    for blessing in &snapshot.masteries {
        let source = format!("mastery:{blessing}");
        sink.push(
            &source,
            Currency::Bp,
            EntryKind::Spend,
            mastery_price(blessing, snapshot, catalogue),
        );
    }
}

fn extras_lines(sink: &mut LineSink, snapshot: &BuildSnapshot, reference: &ReferenceCatalogue) {
    if snapshot.familiar_upgrade {
        let fee = cost::parse(FAMILIAR_UPGRADE_COST).bp;
        sink.push("familiar", snapshot.familiar_currency, EntryKind::Spend, fee);
    }
    sink.push(
        "retinue",
        Currency::Fp,
        EntryKind::Spend,
        priced(snapshot.extra_retinue, RETINUE_STEP_COST),
    );
    if snapshot.relic == Some(RelicPayment::Fortune) {
        sink.push("relic", Currency::Fp, EntryKind::Spend, RELIC_FP_COST);
    }
    if snapshot.ascension == Some(AscensionPayment::Kuri) {
        sink.push(
            "ascension",
            Currency::Kp,
            EntryKind::Spend,
            ASCENSION_SIGIL.base_price(),
        );
    }
    for pact in &snapshot.pacts {
        let source = format!("pact:{pact}");
        sink.record(&source, cost::parse(pact.descriptor()));
    }

    let smith = snapshot.has_pact(Pact::Smith);
    for name in &snapshot.imported_weapons {
        let source = format!("weapon:{name}");
        if smith {
            let spent = reference.spent(ReferenceKind::Weapons, name).unwrap_or(0);
            let share = refund_share(spent, SMITH_REFUND_DIVISOR);
            sink.push(&source, Currency::Fp, EntryKind::Grant, share);
        } else {
            sink.push(&source, Currency::Fp, EntryKind::Spend, WEAPON_IMPORT_FEE);
        }
    }
}

fn total(lines: &[LedgerLine], currency: Currency, allowance: i64) -> CurrencyBalance {
    let mut gained = 0_i64;
    let mut spent = 0_i64;
    for line in lines.iter().filter(|line| line.currency == currency) {
        match line.kind {
            EntryKind::Spend => spent = spent.saturating_add(line.amount),
            EntryKind::Refund => spent = spent.saturating_sub(line.amount),
            EntryKind::Grant => gained = gained.saturating_add(line.amount),
        }
    }
    CurrencyBalance {
        allowance,
        gained,
        spent,
        balance: allowance.saturating_add(gained).saturating_sub(spent),
    }
}

/// Price the whole snapshot.
///
/// Never fails: unknown ids price as zero and overdrawn builds still total.
#[must_use]
pub fn compute_balances(
    snapshot: &BuildSnapshot,
    catalogue: &Catalogue,
    reference: &ReferenceCatalogue,
) -> Ledger {
    let mut sink = LineSink::default();
    option_lines(&mut sink, snapshot, catalogue);
    override_lines(&mut sink, snapshot, catalogue);
    sigil_lines(&mut sink, snapshot);
    blessing_lines(&mut sink, snapshot, catalogue);
    extras_lines(&mut sink, snapshot, reference);

    let mut lines = sink.lines;
    lines.sort();

    Ledger {
        bp: total(&lines, Currency::Bp, allowance(Currency::Bp, snapshot)),
        fp: total(&lines, Currency::Fp, allowance(Currency::Fp, snapshot)),
        kp: total(&lines, Currency::Kp, allowance(Currency::Kp, snapshot)),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> &'static Catalogue {
        Catalogue::builtin()
    }

    fn ledger(snap: &BuildSnapshot) -> Ledger {
        compute_balances(snap, catalogue(), &ReferenceCatalogue::empty())
    }

    fn node(id: &str) -> &'static OptionDef {
        catalogue().option(id).unwrap()
    }

    #[test]
    fn empty_build_has_full_allowances() {
        let ledger = ledger(&BuildSnapshot::default());
        assert_eq!(ledger.bp.balance, STARTING_BP);
        assert_eq!(ledger.fp.balance, STARTING_FP);
        assert_eq!(ledger.kp.allowance, 0);
        assert!(ledger.lines.is_empty());
        assert!(ledger.is_affordable());
    }

    #[test]
    fn kuri_pact_unlocks_kp_allowance() {
        let mut snap = BuildSnapshot::default();
        snap.pacts.insert(Pact::Kuri);
        assert_eq!(ledger(&snap).kp.allowance, STARTING_KP_WITH_PACT);
    }

    #[test]
    fn option_costs_and_grants_split_by_sign() {
        let mut snap = BuildSnapshot::default();
        snap.origins.insert("origin.noble".to_string());
        snap.drawbacks.insert("drawback.hunted".to_string());
        let ledger = ledger(&snap);
        assert_eq!(ledger.bp.spent, 5);
        assert_eq!(ledger.fp.spent, 5);
        assert_eq!(ledger.bp.gained, 4);
        assert_eq!(ledger.fp.gained, 2);
        assert_eq!(ledger.bp.balance, 99);
    }

    #[test]
    fn node_price_applies_trial_and_region() {
        let mut snap = BuildSnapshot::default();
        let frost = node("frost.1");
        assert_eq!(node_price(frost, &snap, catalogue()), 3);
        snap.trials.insert("frost".to_string());
        assert_eq!(node_price(frost, &snap, catalogue()), 2);
        snap.home_region = Some("frosthollow".to_string());
        assert_eq!(node_price(frost, &snap, catalogue()), 1);
        snap.pacts.insert(Pact::Blood);
        assert_eq!(node_price(frost, &snap, catalogue()), 2);
        // Trial discount only applies to the root.
        assert_eq!(node_price(node("frost.2"), &snap, catalogue()), 7);
    }

    #[test]
    fn node_price_never_goes_negative() {
        let mut snap = BuildSnapshot::default();
        snap.trials.insert("tide".to_string());
        snap.home_region = Some("saltmarsh".to_string());
        assert_eq!(node_price(node("tide.1"), &snap, catalogue()), 0);
    }

    #[test]
    fn override_moves_exact_price_from_bp_to_kp() {
        let mut snap = BuildSnapshot::default();
        snap.pacts.insert(Pact::Kuri);
        snap.trials.insert("frost".to_string());
        let before_select = ledger(&snap);

        snap.blessing_nodes.insert("frost.1".to_string());
        let selected = ledger(&snap);
        let price = node_price(node("frost.1"), &snap, catalogue());
        assert_eq!(selected.bp.spent - before_select.bp.spent, price);

        snap.kp_nodes
            .insert("frost.1".to_string(), crate::sigil::SigilKind::Sowel);
        let paid = ledger(&snap);
        assert_eq!(paid.bp.spent, selected.bp.spent - price);
        assert_eq!(paid.kp.spent, selected.kp.spent + price);
        assert_eq!(paid.bp.spent, before_select.bp.spent);

        snap.kp_nodes.clear();
        assert_eq!(ledger(&snap), selected);
    }

    #[test]
    fn orphaned_overrides_are_ignored() {
        let mut snap = BuildSnapshot::default();
        snap.pacts.insert(Pact::Kuri);
        let clean = ledger(&snap);
        snap.kp_nodes
            .insert("tide.2".to_string(), crate::sigil::SigilKind::Lif);
        assert_eq!(ledger(&snap), clean);
    }

    #[test]
    fn companion_region_discount_is_scoped() {
        let mut snap = BuildSnapshot::default();
        snap.companions.insert("comp.mira".to_string());
        snap.home_region = Some("saltmarsh".to_string());
        assert_eq!(ledger(&snap).fp.spent, 3);
        snap.home_region = Some("amberreach".to_string());
        assert_eq!(ledger(&snap).fp.spent, 5);
    }

    #[test]
    fn blood_pact_voids_companions_and_drawback_grants() {
        let mut snap = BuildSnapshot::default();
        snap.companions.insert("comp.vell".to_string());
        snap.drawbacks.insert("drawback.hexed".to_string());
        snap.pacts.insert(Pact::Blood);
        let ledger = ledger(&snap);
        assert_eq!(ledger.fp.spent, 0);
        // Only the pact's own grant remains.
        assert_eq!(ledger.bp.gained, 20);
    }

    #[test]
    fn trial_discount_and_mastery_fee_are_independent() {
        let mut snap = BuildSnapshot::default();
        snap.blessing_nodes.insert("frost.1".to_string());
        snap.trials.insert("frost".to_string());
        assert_eq!(ledger(&snap).bp.spent, 2);
        snap.masteries.insert("frost".to_string());
        assert_eq!(ledger(&snap).bp.spent, 5);
        snap.trials.clear();
        assert_eq!(ledger(&snap).bp.spent, 6);
    }

    #[test]
    fn incidental_fees() {
        let mut snap = BuildSnapshot::default();
        snap.pacts.insert(Pact::Kuri);
        snap.common_sigils.insert(crate::sigil::SigilKind::Dagaz, 2);
        snap.familiar_upgrade = true;
        snap.familiar_currency = Currency::Fp;
        snap.extra_retinue = 2;
        snap.relic = Some(RelicPayment::Fortune);
        snap.ascension = Some(AscensionPayment::Kuri);
        let ledger = ledger(&snap);
        assert_eq!(ledger.fp.spent, 12 + 4 + 6 + 6);
        assert_eq!(ledger.kp.spent, 8);
        assert_eq!(ledger.bp.spent, 0);
    }

    #[test]
    fn smith_pact_turns_import_fee_into_refund() {
        let reference =
            ReferenceCatalogue::empty().with_item(ReferenceKind::Weapons, "Moonblade", 22);
        let mut snap = BuildSnapshot::default();
        snap.imported_weapons.insert("Moonblade".to_string());
        snap.imported_weapons.insert("Lost Axe".to_string());
        let plain = compute_balances(&snap, catalogue(), &reference);
        assert_eq!(plain.fp.spent, 2 * WEAPON_IMPORT_FEE);

        snap.pacts.insert(Pact::Smith);
        let smith = compute_balances(&snap, catalogue(), &reference);
        assert_eq!(smith.fp.spent, 5);
        assert_eq!(smith.fp.gained, 5);
    }

    #[test]
    fn overdrawn_builds_still_total() {
        let mut snap = BuildSnapshot::default();
        snap.common_sigils.insert(crate::sigil::SigilKind::Odal, 20);
        snap.blessing_nodes.insert("frost.3".to_string());
        let ledger = ledger(&snap);
        assert_eq!(ledger.fp.balance, STARTING_FP - 160);
        assert!(!ledger.is_affordable());
    }

    #[test]
    fn lines_are_sorted_and_labelled() {
        let mut snap = BuildSnapshot::default();
        snap.perks.insert("perk.keen_eye".to_string());
        snap.perks.insert("perk.iron_will".to_string());
        let ledger = ledger(&snap);
        let mut sorted = ledger.lines.clone();
        sorted.sort();
        assert_eq!(ledger.lines, sorted);
        let line = ledger.lines_from("perk.keen_eye").next().unwrap();
        assert_eq!(line.to_string(), "perk.keen_eye spends 3 FP");
    }
}
