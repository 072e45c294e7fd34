//! Sigilbuild Engine
//!
//! Platform-agnostic core of a point-buy character-build configurator: cost
//! parsing, sigil inventory, prerequisite checks and the three-currency
//! ledger. This crate carries no UI or storage transport; front ends drive it
//! through [`commands::apply`] and read [`recompute::recompute`].

pub mod catalogue;
pub mod codec;
pub mod commands;
pub mod constants;
pub mod cost;
pub mod ledger;
pub mod numbers;
pub mod recompute;
pub mod reference;
pub mod sigil;
pub mod snapshot;
pub mod validator;

// Re-export commonly used types
pub use catalogue::{
    BlessingDef, BoostDef, Catalogue, CatalogueDiagnostic, CatalogueError, CategoryDef,
    CountRequirement, Family, OptionDef, RegionDef,
};
pub use codec::{BuildDocument, CodecError, document_digest, from_json_str, to_json_string};
pub use commands::{BoostRelease, BuildCommand, CommandError, CommandPolicy, apply};
pub use cost::{CostParseError, CostRecord, Currency};
pub use ledger::{CurrencyBalance, EntryKind, Ledger, LedgerLine, compute_balances, node_price};
pub use recompute::{Recomputed, recompute};
pub use reference::{ReferenceBuild, ReferenceCatalogue, ReferenceKind};
pub use sigil::{Grade, SigilAvailability, SigilKind, SigilTotals};
pub use snapshot::{AscensionPayment, BuildSnapshot, Pact, RelicPayment};
pub use validator::{Availability, LockReason};

use serde_json::Value;

/// Source of catalogue content.
/// Platform-specific implementations should provide this
pub trait CatalogueLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the option catalogue
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue cannot be read or parsed.
    fn load_catalogue(&self) -> Result<Catalogue, Self::Error>;
}

/// Storage for encoded build documents. Decoding stays in the engine so a
/// damaged save still loads field by field.
pub trait BuildStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save an encoded document
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    fn save_build(&self, name: &str, document: &Value) -> Result<(), Self::Error>;

    /// Load an encoded document
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    fn load_build(&self, name: &str) -> Result<Option<Value>, Self::Error>;

    /// Delete a saved document
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_build(&self, name: &str) -> Result<(), Self::Error>;
}

/// Loader for the catalogue compiled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalogue;

impl CatalogueLoader for BuiltinCatalogue {
    type Error = std::convert::Infallible;

    fn load_catalogue(&self) -> Result<Catalogue, Self::Error> {
        Ok(Catalogue::builtin().clone())
    }
}

/// Facade owning one catalogue and a storage backend.
pub struct Configurator<L, S>
where
    L: CatalogueLoader,
    S: BuildStorage,
{
    loader: L,
    storage: S,
    catalogue: Catalogue,
}

impl<L, S> Configurator<L, S>
where
    L: CatalogueLoader,
    S: BuildStorage,
{
    /// Create a configurator, loading the catalogue once.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue cannot be loaded.
    pub fn new(loader: L, storage: S) -> Result<Self, L::Error> {
        let catalogue = loader.load_catalogue()?;
        Ok(Self {
            loader,
            storage,
            catalogue,
        })
    }

    #[must_use]
    pub const fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Reload catalogue content, keeping the previous catalogue on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue cannot be loaded.
    pub fn reload_catalogue(&mut self) -> Result<(), L::Error> {
        self.catalogue = self.loader.load_catalogue()?;
        Ok(())
    }

    #[must_use]
    pub fn new_document(&self) -> BuildDocument {
        BuildDocument::default()
    }

    #[must_use]
    pub fn recompute(&self, document: &BuildDocument) -> Recomputed {
        recompute(&document.character, &self.catalogue, &document.reference)
    }

    /// Apply a command to the document's character build.
    ///
    /// # Errors
    ///
    /// Returns the command handler's rejection; the input is never changed.
    pub fn apply(
        &self,
        document: &BuildDocument,
        command: &BuildCommand,
        policy: CommandPolicy,
    ) -> Result<BuildDocument, CommandError> {
        let character = apply(
            &document.character,
            &self.catalogue,
            &document.reference,
            command,
            policy,
        )?;
        Ok(BuildDocument {
            character,
            ..document.clone()
        })
    }

    /// Save a document
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend rejects the write.
    pub fn save_build(&self, name: &str, document: &BuildDocument) -> Result<(), S::Error> {
        self.storage.save_build(name, &codec::serialize(document))
    }

    /// Load and decode a document
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot be read.
    pub fn load_build(&self, name: &str) -> Result<Option<BuildDocument>, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let raw = self.storage.load_build(name).map_err(Into::into)?;
        Ok(raw.as_ref().map(codec::deserialize))
    }

    /// Delete a saved document
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend rejects the delete.
    pub fn delete_build(&self, name: &str) -> Result<(), S::Error> {
        self.storage.delete_build(name)
    }
}
