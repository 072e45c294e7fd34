use std::time::Instant;

use sigilbuild_engine::{BuildDocument, Catalogue, Currency, document_digest, recompute};

use super::CheckResult;

/// Run the catalogue content checks. Every diagnostic is a failure.
#[must_use]
pub fn validate_catalogue(catalogue: &Catalogue) -> CheckResult {
    let start = Instant::now();
    let diagnostics = catalogue.validate();
    let details = vec![
        format!("options: {}", catalogue.options.len()),
        format!("categories: {}", catalogue.categories.len()),
        format!("blessings: {}", catalogue.blessings.len()),
        format!("regions: {}", catalogue.regions.len()),
    ];
    let failures = diagnostics.iter().map(ToString::to_string).collect();
    CheckResult::new("catalogue", details, failures, start.elapsed())
}

/// Price a saved build. Overspent currencies, overdrawn sigils and picks
/// whose requirements are missing fail.
#[must_use]
pub fn price_build(
    name: &str,
    document: &BuildDocument,
    catalogue: &Catalogue,
    verbose: bool,
) -> CheckResult {
    let start = Instant::now();
    let result = recompute(&document.character, catalogue, &document.reference);

    let mut details = vec![format!("digest: {}", document_digest(document))];
    let mut failures = Vec::new();
    for currency in Currency::ALL {
        let balance = result.ledger.balance(currency);
        details.push(format!(
            "{currency}: allowance {} + gained {} - spent {} = {}",
            balance.allowance, balance.gained, balance.spent, balance.balance
        ));
        if balance.is_overspent() {
            failures.push(format!("{currency} overspent by {}", -balance.balance));
        }
    }
    for kind in result.available.overdrawn() {
        failures.push(format!("{kind} sigils overdrawn ({})", result.available.get(kind)));
    }
    for id in &result.unmet {
        failures.push(format!("{id} is selected without its requirements"));
    }
    for node in document.character.kp_nodes.keys() {
        if !document.character.blessing_nodes.contains(node) {
            failures.push(format!("override {node} has no selected node"));
        }
    }
    log::debug!("priced {name}: {} failures", failures.len());
    if verbose {
        details.extend(result.ledger.lines.iter().map(ToString::to_string));
    }
    CheckResult::new(format!("balance:{name}"), details, failures, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigilbuild_engine::{BuildSnapshot, ReferenceCatalogue};

    #[test]
    fn builtin_catalogue_passes() {
        let result = validate_catalogue(Catalogue::builtin());
        assert!(result.passed, "{:?}", result.failures);
        assert!(result.details.iter().any(|d| d.starts_with("options:")));
    }

    #[test]
    fn overspent_builds_fail_with_reasons() {
        let mut character = BuildSnapshot::default();
        character.common_sigils.insert(sigilbuild_engine::SigilKind::Odal, 20);
        let document = BuildDocument::new(character, ReferenceCatalogue::empty());
        let result = price_build("greedy", &document, Catalogue::builtin(), false);
        assert!(!result.passed);
        assert!(result.failures.iter().any(|f| f.starts_with("FP overspent")));
        assert_eq!(result.name, "balance:greedy");
    }

    #[test]
    fn stranded_picks_fail_pricing() {
        let mut character = BuildSnapshot::default();
        character.powers.insert("pyro.inferno".to_string());
        let document = BuildDocument::new(character, ReferenceCatalogue::empty());
        let result = price_build("stranded", &document, Catalogue::builtin(), false);
        assert!(!result.passed);
        assert_eq!(
            result.failures,
            vec!["pyro.inferno is selected without its requirements".to_string()]
        );
    }

    #[test]
    fn verbose_pricing_lists_ledger_lines() {
        let mut character = BuildSnapshot::default();
        character.perks.insert("perk.keen_eye".to_string());
        let document = BuildDocument::new(character, ReferenceCatalogue::empty());
        let result = price_build("small", &document, Catalogue::builtin(), true);
        assert!(result.passed);
        assert!(result.details.iter().any(|d| d == "perk.keen_eye spends 3 FP"));
    }
}
