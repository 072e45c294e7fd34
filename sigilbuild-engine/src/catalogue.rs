//! Option catalogue: immutable definitions loaded from JSON content.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::cost::{self, CostRecord};
use crate::sigil::{Grade, SigilKind};

const DEFAULT_CATALOGUE_DATA: &str = include_str!("../data/catalogue.json");

/// Option families. Each has its own selection set in the build snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Origin,
    Perk,
    Power,
    BlessingNode,
    SpecialSigil,
    Companion,
    Drawback,
}

impl Family {
    pub const ALL: [Self; 7] = [
        Self::Origin,
        Self::Perk,
        Self::Power,
        Self::BlessingNode,
        Self::SpecialSigil,
        Self::Companion,
        Self::Drawback,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Perk => "perk",
            Self::Power => "power",
            Self::BlessingNode => "blessing_node",
            Self::SpecialSigil => "special_sigil",
            Self::Companion => "companion",
            Self::Drawback => "drawback",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "At least `count` selections of `family`" gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRequirement {
    pub family: Family,
    pub count: u32,
}

/// A single catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub family: Family,
    /// Human-readable cost descriptor, e.g. `"Costs 5 FP"`.
    #[serde(default)]
    pub cost: String,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub requires: SmallVec<[String; 2]>,
    #[serde(default)]
    pub requires_count: Option<CountRequirement>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub exclusive: Option<String>,
    #[serde(default)]
    pub blessing: Option<String>,
    #[serde(default)]
    pub position: Option<u8>,
    #[serde(default)]
    pub birthplace: Option<String>,
    /// Sigil granted by a special-sigil option.
    #[serde(default)]
    pub sigil: Option<SigilKind>,
}

impl OptionDef {
    #[must_use]
    pub fn cost_record(&self) -> CostRecord {
        cost::parse(&self.cost)
    }

    /// Sigil a blessing node spends when unlocked.
    #[must_use]
    pub fn sigil_cost(&self) -> Option<SigilKind> {
        if self.family != Family::BlessingNode {
            return None;
        }
        self.grade.map(Grade::sigil)
    }

    #[must_use]
    pub fn is_tree_root(&self) -> bool {
        self.family == Family::BlessingNode && self.position == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostDef {
    pub sigil: SigilKind,
    #[serde(default = "default_extra_picks")]
    pub extra_picks: u32,
}

const fn default_extra_picks() -> u32 {
    1
}

/// Capped pick-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub cap: u32,
    #[serde(default)]
    pub boost: Option<BoostDef>,
}

/// A sigil tree. Its nodes are the blessing-node options naming it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlessingDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogueData {
    #[serde(default)]
    regions: Vec<RegionDef>,
    #[serde(default)]
    categories: Vec<CategoryDef>,
    #[serde(default)]
    blessings: Vec<BlessingDef>,
    #[serde(default)]
    options: Vec<OptionDef>,
}

/// The full option catalogue with id lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CatalogueData")]
pub struct Catalogue {
    pub regions: Vec<RegionDef>,
    pub categories: Vec<CategoryDef>,
    pub blessings: Vec<BlessingDef>,
    pub options: Vec<OptionDef>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

impl From<CatalogueData> for Catalogue {
    fn from(data: CatalogueData) -> Self {
        Self::new(data.regions, data.categories, data.blessings, data.options)
    }
}

/// Errors raised while loading catalogue content.
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("catalogue JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// Data-quality findings from [`Catalogue::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogueDiagnostic {
    UnparseableCost { id: String, reason: String },
    DuplicateId { id: String },
    DanglingRequirement { id: String, requires: String },
    UnknownCategory { id: String, category: String },
    UnknownBlessing { id: String, blessing: String },
    UnknownRegion { owner: String, region: String },
    UngradedNode { id: String },
    TreeGap { blessing: String, expected: u8, found: Option<u8> },
    MissingSigil { id: String },
}

impl fmt::Display for CatalogueDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableCost { id, reason } => write!(f, "{id}: {reason}"),
            Self::DuplicateId { id } => write!(f, "{id}: duplicate option id"),
            Self::DanglingRequirement { id, requires } => {
                write!(f, "{id}: requires unknown option {requires}")
            }
            Self::UnknownCategory { id, category } => {
                write!(f, "{id}: unknown category {category}")
            }
            Self::UnknownBlessing { id, blessing } => {
                write!(f, "{id}: unknown blessing {blessing}")
            }
            Self::UnknownRegion { owner, region } => write!(f, "{owner}: unknown region {region}"),
            Self::UngradedNode { id } => write!(f, "{id}: blessing node has no grade"),
            Self::TreeGap {
                blessing,
                expected,
                found,
            } => match found {
                Some(pos) => write!(f, "{blessing}: expected position {expected}, found {pos}"),
                None => write!(f, "{blessing}: node without position (expected {expected})"),
            },
            Self::MissingSigil { id } => write!(f, "{id}: special sigil grants no sigil kind"),
        }
    }
}

impl Catalogue {
    #[must_use]
    pub fn new(
        regions: Vec<RegionDef>,
        categories: Vec<CategoryDef>,
        blessings: Vec<BlessingDef>,
        options: Vec<OptionDef>,
    ) -> Self {
        let mut index = BTreeMap::new();
        for (i, option) in options.iter().enumerate() {
            index.entry(option.id.clone()).or_insert(i);
        }
        Self {
            regions,
            categories,
            blessings,
            options,
            index,
        }
    }

    /// Load a catalogue from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into catalogue data.
    pub fn from_json(json: &str) -> Result<Self, CatalogueError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_CATALOGUE_DATA).unwrap_or_default()
    }

    /// The catalogue shipped with the engine.
    #[must_use]
    pub fn builtin() -> &'static Self {
        static CATALOGUE: OnceLock<Catalogue> = OnceLock::new();
        CATALOGUE.get_or_init(Self::load_from_static)
    }

    #[must_use]
    pub fn option(&self, id: &str) -> Option<&OptionDef> {
        self.index.get(id).and_then(|i| self.options.get(*i))
    }

    #[must_use]
    pub fn category(&self, id: &str) -> Option<&CategoryDef> {
        self.categories.iter().find(|cat| cat.id == id)
    }

    #[must_use]
    pub fn blessing(&self, id: &str) -> Option<&BlessingDef> {
        self.blessings.iter().find(|b| b.id == id)
    }

    #[must_use]
    pub fn has_region(&self, id: &str) -> bool {
        self.regions.iter().any(|r| r.id == id)
    }

    pub fn options_in(&self, family: Family) -> impl Iterator<Item = &OptionDef> + '_ {
        self.options.iter().filter(move |opt| opt.family == family)
    }

    /// Nodes of a blessing tree, root first.
    #[must_use]
    pub fn tree(&self, blessing: &str) -> Vec<&OptionDef> {
        let mut nodes: Vec<&OptionDef> = self
            .options_in(Family::BlessingNode)
            .filter(|opt| opt.blessing.as_deref() == Some(blessing))
            .collect();
        nodes.sort_by_key(|opt| (opt.position.unwrap_or(u8::MAX), opt.id.clone()));
        nodes
    }

    #[must_use]
    pub fn tree_root(&self, blessing: &str) -> Option<&OptionDef> {
        self.tree(blessing).into_iter().find(|opt| opt.is_tree_root())
    }

    /// Check every entry for content errors that would otherwise only
    /// surface as silent zero costs or unreachable options at runtime.
    #[must_use]
    pub fn validate(&self) -> Vec<CatalogueDiagnostic> {
        let mut diagnostics = Vec::new();
        let mut seen = BTreeSet::new();

        for option in &self.options {
            if !seen.insert(option.id.as_str()) {
                diagnostics.push(CatalogueDiagnostic::DuplicateId {
                    id: option.id.clone(),
                });
            }
            if let Err(err) = cost::parse_strict(&option.cost) {
                diagnostics.push(CatalogueDiagnostic::UnparseableCost {
                    id: option.id.clone(),
                    reason: err.to_string(),
                });
            }
            for req in &option.requires {
                if self.option(req).is_none() {
                    diagnostics.push(CatalogueDiagnostic::DanglingRequirement {
                        id: option.id.clone(),
                        requires: req.clone(),
                    });
                }
            }
            if let Some(category) = &option.category
                && self.category(category).is_none()
            {
                diagnostics.push(CatalogueDiagnostic::UnknownCategory {
                    id: option.id.clone(),
                    category: category.clone(),
                });
            }
            if let Some(region) = &option.birthplace
                && !self.has_region(region)
            {
                diagnostics.push(CatalogueDiagnostic::UnknownRegion {
                    owner: option.id.clone(),
                    region: region.clone(),
                });
            }
            self.validate_family_shape(option, &mut diagnostics);
        }

        for blessing in &self.blessings {
            if let Some(region) = &blessing.region
                && !self.has_region(region)
            {
                diagnostics.push(CatalogueDiagnostic::UnknownRegion {
                    owner: blessing.id.clone(),
                    region: region.clone(),
                });
            }
            for (expected, node) in self.tree(&blessing.id).into_iter().enumerate() {
                let expected = u8::try_from(expected).unwrap_or(u8::MAX);
                if node.position != Some(expected) {
                    diagnostics.push(CatalogueDiagnostic::TreeGap {
                        blessing: blessing.id.clone(),
                        expected,
                        found: node.position,
                    });
                    break;
                }
            }
        }

        diagnostics
    }

    fn validate_family_shape(
        &self,
        option: &OptionDef,
        diagnostics: &mut Vec<CatalogueDiagnostic>,
    ) {
        match option.family {
            Family::BlessingNode => {
                if option.grade.is_none() {
                    diagnostics.push(CatalogueDiagnostic::UngradedNode {
                        id: option.id.clone(),
                    });
                }
                match &option.blessing {
                    Some(blessing) if self.blessing(blessing).is_some() => {}
                    Some(blessing) => diagnostics.push(CatalogueDiagnostic::UnknownBlessing {
                        id: option.id.clone(),
                        blessing: blessing.clone(),
                    }),
                    None => diagnostics.push(CatalogueDiagnostic::UnknownBlessing {
                        id: option.id.clone(),
                        blessing: String::new(),
                    }),
                }
            }
            Family::SpecialSigil => {
                if option.sigil.is_none() {
                    diagnostics.push(CatalogueDiagnostic::MissingSigil {
                        id: option.id.clone(),
                    });
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogue_loads_and_validates_clean() {
        let catalogue = Catalogue::builtin();
        assert!(!catalogue.options.is_empty());
        let diagnostics = catalogue.validate();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn trees_are_ordered_root_first() {
        let catalogue = Catalogue::builtin();
        let ids: Vec<_> = catalogue.tree("tide").iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["tide.1", "tide.2", "tide.3", "tide.4"]);
        assert_eq!(catalogue.tree_root("tide").map(|o| o.id.as_str()), Some("tide.1"));
        assert!(catalogue.tree("nowhere").is_empty());
    }

    #[test]
    fn node_sigil_cost_follows_grade() {
        let catalogue = Catalogue::builtin();
        let node = catalogue.option("frost.1").unwrap();
        assert_eq!(node.sigil_cost(), Some(SigilKind::Sowel));
        let perk = catalogue.option("perk.keen_eye").unwrap();
        assert_eq!(perk.sigil_cost(), None);
    }

    #[test]
    fn validation_flags_content_errors() {
        let json = r#"{
            "regions": [{ "id": "north" }],
            "categories": [],
            "blessings": [{ "id": "storm", "region": "south" }],
            "options": [
                { "id": "a", "family": "perk", "cost": "a fistful of dollars" },
                { "id": "a", "family": "perk", "cost": "Costs 1 BP" },
                { "id": "b", "family": "perk", "requires": ["zzz"], "category": "nope" },
                { "id": "storm.1", "family": "blessing_node", "blessing": "storm", "position": 0 },
                {
                    "id": "storm.3",
                    "family": "blessing_node",
                    "blessing": "storm",
                    "position": 2,
                    "grade": "rare"
                },
                { "id": "s", "family": "special_sigil" },
                { "id": "c", "family": "companion", "birthplace": "west" }
            ]
        }"#;
        let catalogue = Catalogue::from_json(json).unwrap();
        let diagnostics = catalogue.validate();
        let has = |pred: &dyn Fn(&CatalogueDiagnostic) -> bool| diagnostics.iter().any(pred);
        assert!(has(&|d| matches!(
            d,
            CatalogueDiagnostic::UnparseableCost { id, .. } if id == "a"
        )));
        assert!(has(&|d| matches!(d, CatalogueDiagnostic::DuplicateId { id } if id == "a")));
        assert!(has(&|d| matches!(
            d,
            CatalogueDiagnostic::DanglingRequirement { requires, .. } if requires == "zzz"
        )));
        assert!(has(&|d| matches!(d, CatalogueDiagnostic::UnknownCategory { .. })));
        assert!(has(&|d| matches!(d, CatalogueDiagnostic::UngradedNode { id } if id == "storm.1")));
        assert!(has(&|d| matches!(d, CatalogueDiagnostic::TreeGap { expected: 1, .. })));
        assert!(has(&|d| matches!(d, CatalogueDiagnostic::MissingSigil { .. })));
        for expected in ["south", "west"] {
            assert!(has(&|d| matches!(
                d,
                CatalogueDiagnostic::UnknownRegion { region, .. } if region == expected
            )));
        }
    }

    #[test]
    fn duplicate_ids_resolve_to_first_entry() {
        let json = r#"{ "options": [
            { "id": "x", "family": "perk", "cost": "Costs 1 BP" },
            { "id": "x", "family": "perk", "cost": "Costs 9 BP" }
        ] }"#;
        let catalogue = Catalogue::from_json(json).unwrap();
        assert_eq!(catalogue.option("x").unwrap().cost, "Costs 1 BP");
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Catalogue::from_json("{ not json").is_err());
    }
}
