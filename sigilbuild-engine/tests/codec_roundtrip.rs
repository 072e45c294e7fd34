use std::hash::Hasher;

use serde_json::{Map, Value};
use sigilbuild_engine::codec::{self, BuildDocument};
use sigilbuild_engine::{
    AscensionPayment, BuildSnapshot, Currency, Pact, ReferenceCatalogue, ReferenceKind,
    RelicPayment, SigilKind,
};
use twox_hash::XxHash64;

fn every_family_snapshot() -> BuildSnapshot {
    let mut snap = BuildSnapshot::default();
    snap.origins.insert("origin.witchborn".to_string());
    snap.perks.insert("perk.keen_eye".to_string());
    snap.perks.insert("perk.silver_tongue".to_string());
    snap.powers.insert("tk.push".to_string());
    snap.powers.insert("pyro.spark".to_string());
    snap.blessing_nodes.insert("ember.1".to_string());
    snap.special_sigils.insert("sigil.grave_odal".to_string());
    snap.companions.insert("comp.oren".to_string());
    snap.drawbacks.insert("drawback.cursed".to_string());
    snap.common_sigils.insert(SigilKind::Lif, 2);
    snap.common_sigils.insert(SigilKind::Kisin, 1);
    snap.bonus_sigil = true;
    snap.boosts.insert("telekinetics".to_string());
    snap.home_region = Some("amberreach".to_string());
    snap.pacts.insert(Pact::Smith);
    snap.trials.insert("ember".to_string());
    snap.masteries.insert("ember".to_string());
    snap.familiar_upgrade = true;
    snap.familiar_currency = Currency::Fp;
    snap.extra_retinue = 1;
    snap.relic = Some(RelicPayment::Fortune);
    snap.ascension = Some(AscensionPayment::Sigil);
    snap.imported_weapons.insert("Moonblade".to_string());
    snap
}

fn override_snapshot() -> BuildSnapshot {
    let mut snap = BuildSnapshot::default();
    snap.pacts.insert(Pact::Kuri);
    snap.common_sigils.insert(SigilKind::Kisin, 1);
    snap.common_sigils.insert(SigilKind::Lif, 1);
    snap.blessing_nodes.insert("tide.1".to_string());
    snap.blessing_nodes.insert("tide.2".to_string());
    snap.kp_nodes.insert("tide.1".to_string(), SigilKind::Kisin);
    snap.kp_nodes.insert("tide.2".to_string(), SigilKind::Lif);
    snap.ascension = Some(AscensionPayment::Kuri);
    snap
}

fn reference() -> ReferenceCatalogue {
    ReferenceCatalogue::empty()
        .with_item(ReferenceKind::Weapons, "Moonblade", 24)
        .with_item(ReferenceKind::Companions, "Old Tam", 11)
        .with_item(ReferenceKind::Vehicles, "Skiff", 9)
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize_value).collect()),
        Value::Object(map) => {
            let mut result = Map::with_capacity(map.len());
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, value) in entries {
                result.insert(key, canonicalize_value(value));
            }
            Value::Object(result)
        }
        other => other,
    }
}

fn snapshot_hash(document: &BuildDocument) -> u64 {
    let canonical = canonicalize_value(codec::serialize(document));
    let text = serde_json::to_string(&canonical).unwrap();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(text.as_bytes());
    hasher.finish()
}

fn assert_round_trip(document: &BuildDocument) {
    let restored = codec::deserialize(&codec::serialize(document));
    assert_eq!(&restored, document);
    assert_eq!(snapshot_hash(&restored), snapshot_hash(document));
    assert_eq!(
        codec::document_digest(&restored),
        codec::document_digest(document)
    );

    let text = codec::to_json_string(document);
    let reparsed = codec::from_json_str(&text).unwrap();
    assert_eq!(&reparsed, document);
}

#[test]
fn empty_snapshot_round_trips() {
    assert_round_trip(&BuildDocument::default());
}

#[test]
fn every_family_round_trips() {
    assert_round_trip(&BuildDocument::new(every_family_snapshot(), reference()));
}

#[test]
fn override_map_round_trips() {
    let document = BuildDocument::new(override_snapshot(), ReferenceCatalogue::empty());
    assert_round_trip(&document);
    let value = codec::serialize(&document);
    assert_eq!(
        value["character"]["kp_nodes"],
        serde_json::json!([["tide.1", "kisin"], ["tide.2", "lif"]])
    );
}

#[test]
fn distinct_documents_hash_differently() {
    let a = BuildDocument::new(every_family_snapshot(), reference());
    let b = BuildDocument::new(override_snapshot(), reference());
    assert_ne!(snapshot_hash(&a), snapshot_hash(&b));
    assert_ne!(codec::document_digest(&a), codec::document_digest(&b));
}

#[test]
fn keyed_collections_are_pair_lists() {
    let value = codec::serialize(&BuildDocument::new(every_family_snapshot(), reference()));
    assert_eq!(
        value["character"]["common_sigils"],
        serde_json::json!([["kisin", 1], ["lif", 2]])
    );
    assert_eq!(value["reference"]["weapons"][0][0], "Moonblade");
    assert!(value["character"]["perks"].is_array());
}
