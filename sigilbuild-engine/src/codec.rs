//! Persistence codec for build documents.
//!
//! Encoding is plain serde. Decoding is deliberately field-by-field: a saved
//! document from an older or damaged save still loads, with each bad field
//! falling back to its empty value instead of rejecting the whole build.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

use crate::commands::{purge_orphaned_overrides, release_kuri_state};
use crate::constants::{DOCUMENT_VERSION, LOG_CODEC_FIELD_DEFAULTED};
use crate::reference::{ReferenceBuild, ReferenceCatalogue};
use crate::sigil::SigilKind;
use crate::snapshot::{BuildSnapshot, Pact};

/// The persisted unit: one character build plus the user's saved sub-builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDocument {
    pub version: u32,
    pub character: BuildSnapshot,
    pub reference: ReferenceCatalogue,
}

impl Default for BuildDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            character: BuildSnapshot::default(),
            reference: ReferenceCatalogue::default(),
        }
    }
}

impl BuildDocument {
    #[must_use]
    pub fn new(character: BuildSnapshot, reference: ReferenceCatalogue) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            character,
            reference,
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("build document is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a document as a JSON value.
#[must_use]
pub fn serialize(document: &BuildDocument) -> Value {
    // Every map in the document is written as pairs, so this cannot fail on
    // key types; the default only guards the signature.
    serde_json::to_value(document).unwrap_or_default()
}

#[must_use]
pub fn to_json_string(document: &BuildDocument) -> String {
    serde_json::to_string_pretty(&serialize(document)).unwrap_or_default()
}

/// Decode a document from any JSON value. Never fails.
#[must_use]
pub fn deserialize(value: &Value) -> BuildDocument {
    let Some(root) = value.as_object() else {
        log::warn!("{LOG_CODEC_FIELD_DEFAULTED}: document is not an object");
        return BuildDocument::default();
    };

    let version = root
        .get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or_else(|| {
            log::warn!("{LOG_CODEC_FIELD_DEFAULTED}: version");
            DOCUMENT_VERSION
        });
    let mut character =
        section(root, "character").map_or_else(BuildSnapshot::default, decode_snapshot);
    let reference =
        section(root, "reference").map_or_else(ReferenceCatalogue::default, decode_reference);

    if !character.has_pact(Pact::Kuri) {
        release_kuri_state(&mut character);
    }
    purge_orphaned_overrides(&mut character);
    BuildDocument {
        version,
        character,
        reference,
    }
}

/// Parse document text.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] only when the text is not JSON at all.
pub fn from_json_str(text: &str) -> Result<BuildDocument, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    Ok(deserialize(&value))
}

/// Hex SHA-256 of the canonical encoding. Object keys are sorted by
/// `serde_json`, so equal documents always hash equal.
#[must_use]
pub fn document_digest(document: &BuildDocument) -> String {
    let canonical = serde_json::to_string(&serialize(document)).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn section<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    match root.get(key) {
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            log::warn!("{LOG_CODEC_FIELD_DEFAULTED}: {key} is not an object");
            None
        }
        None => {
            log::warn!("{LOG_CODEC_FIELD_DEFAULTED}: {key}");
            None
        }
    }
}

struct Fields<'a> {
    section: &'static str,
    map: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn get<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(raw) = self.map.get(key) else {
            log::warn!("{LOG_CODEC_FIELD_DEFAULTED}: {}.{key} missing", self.section);
            return T::default();
        };
        T::deserialize(raw).unwrap_or_else(|err| {
            log::warn!("{LOG_CODEC_FIELD_DEFAULTED}: {}.{key}: {err}", self.section);
            T::default()
        })
    }

    fn pairs<K, V>(&self, key: &str) -> BTreeMap<K, V>
    where
        K: DeserializeOwned + Ord,
        V: DeserializeOwned,
    {
        self.get::<Vec<(K, V)>>(key).into_iter().collect()
    }
}

fn decode_snapshot(map: &Map<String, Value>) -> BuildSnapshot {
    let fields = Fields {
        section: "character",
        map,
    };
    BuildSnapshot {
        origins: fields.get("origins"),
        perks: fields.get("perks"),
        powers: fields.get("powers"),
        blessing_nodes: fields.get("blessing_nodes"),
        special_sigils: fields.get("special_sigils"),
        companions: fields.get("companions"),
        drawbacks: fields.get("drawbacks"),
        common_sigils: fields.pairs::<SigilKind, u32>("common_sigils"),
        bonus_sigil: fields.get("bonus_sigil"),
        boosts: fields.get("boosts"),
        home_region: fields.get("home_region"),
        pacts: fields.get("pacts"),
        trials: fields.get("trials"),
        masteries: fields.get("masteries"),
        kp_nodes: fields.pairs::<String, SigilKind>("kp_nodes"),
        familiar_upgrade: fields.get("familiar_upgrade"),
        familiar_currency: fields.get("familiar_currency"),
        extra_retinue: fields.get("extra_retinue"),
        relic: fields.get("relic"),
        ascension: fields.get("ascension"),
        imported_weapons: fields.get("imported_weapons"),
    }
}

fn decode_reference(map: &Map<String, Value>) -> ReferenceCatalogue {
    let fields = Fields {
        section: "reference",
        map,
    };
    ReferenceCatalogue {
        companions: fields.pairs::<String, ReferenceBuild>("companions"),
        weapons: fields.pairs::<String, ReferenceBuild>("weapons"),
        beasts: fields.pairs::<String, ReferenceBuild>("beasts"),
        vehicles: fields.pairs::<String, ReferenceBuild>("vehicles"),
    }
}
