//! Centralized pricing and tuning constants for the Sigilbuild economy.
//!
//! These values define the deterministic math of the ledger. Keeping them
//! together ensures that the economy can only be adjusted via reviewed code
//! changes, while content (options, categories, blessings) lives in the JSON
//! catalogue.

// Starting allowances ------------------------------------------------------
pub const STARTING_BP: i64 = 100;
pub const STARTING_FP: i64 = 100;
/// KP allowance while the Kuri pact is active; zero otherwise.
pub const STARTING_KP_WITH_PACT: i64 = 100;

// Sigil prices (index order matches `SigilKind::ALL`) -----------------------
pub(crate) const SIGIL_BASE_PRICES: [i64; 6] = [1, 2, 3, 4, 6, 8];

// Discounts ----------------------------------------------------------------
pub(crate) const REGION_COMPANION_DISCOUNT: i64 = 2;
pub(crate) const REGION_NODE_DISCOUNT: i64 = 1;
pub(crate) const BLOOD_PACT_NODE_MULTIPLIER: i64 = 2;

// Fees ---------------------------------------------------------------------
pub(crate) const FAMILIAR_UPGRADE_COST: &str = "Costs 4 BP or 4 FP";
pub(crate) const RETINUE_STEP_COST: i64 = 3;
pub(crate) const RELIC_FP_COST: i64 = 6;
pub(crate) const WEAPON_IMPORT_FEE: i64 = 5;
pub(crate) const SMITH_REFUND_DIVISOR: i64 = 4;

// Pact descriptors ---------------------------------------------------------
pub(crate) const PACT_KURI_COST: &str = "Free";
pub(crate) const PACT_BLOOD_COST: &str = "Grants 20 BP";
pub(crate) const PACT_SMITH_COST: &str = "Costs 5 FP";

// Caps ---------------------------------------------------------------------
pub const MAX_TRIALS: usize = 2;
pub(crate) const RETINUE_CATEGORY: &str = "retinue";

// Persistence --------------------------------------------------------------
pub const DOCUMENT_VERSION: u32 = 1;

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_COST_UNRECOGNIZED: &str = "cost.unrecognized";
pub(crate) const LOG_OVERRIDE_ORPHAN: &str = "ledger.override.orphan";
pub(crate) const LOG_OVERRIDE_PURGED: &str = "commands.override.purged";
pub(crate) const LOG_CASCADE: &str = "commands.cascade";
pub(crate) const LOG_REQUIREMENT_RELEASE: &str = "commands.requirement.release";
pub(crate) const LOG_CODEC_FIELD_DEFAULTED: &str = "codec.field.defaulted";
