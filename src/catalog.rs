//! Per-language collection cache with load generations.
//!
//! Every load gets a ticket. Only the newest ticket for a language may install
//! its result; a slower, older load that finishes later is dropped.

use crate::data::Language;
use crate::source::{Collection, EntryLoader};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub language: Language,
    pub generation: u64,
}

#[derive(Default)]
struct Slot {
    issued: u64,
    current: Option<Arc<Collection>>,
}

pub struct Catalog {
    loader: EntryLoader,
    slots: RwLock<HashMap<Language, Slot>>,
}

impl Catalog {
    pub fn new(loader: EntryLoader) -> Self {
        Self {
            loader,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &EntryLoader {
        &self.loader
    }

    pub fn begin(&self, language: Language) -> LoadTicket {
        let mut slots = self.slots.write();
        let slot = slots.entry(language).or_default();
        slot.issued += 1;
        LoadTicket {
            language,
            generation: slot.issued,
        }
    }

    /// Installs `collection` if `ticket` is still the latest one issued for
    /// its language. Returns the installed collection, or `None` when the
    /// ticket was superseded.
    pub fn complete(&self, ticket: LoadTicket, collection: Collection) -> Option<Arc<Collection>> {
        self.install(ticket, collection).ok()
    }

    /// Like [`Catalog::complete`], but hands a superseded collection back.
    fn install(
        &self,
        ticket: LoadTicket,
        collection: Collection,
    ) -> Result<Arc<Collection>, Collection> {
        let collection = collection.with_generation(ticket.generation);
        let mut slots = self.slots.write();
        let slot = slots.entry(ticket.language).or_default();
        if ticket.generation != slot.issued {
            warn!(
                language = %ticket.language,
                generation = ticket.generation,
                latest = slot.issued,
                "discarding superseded load"
            );
            return Err(collection);
        }
        let collection = Arc::new(collection);
        debug!(
            language = %ticket.language,
            generation = ticket.generation,
            origin = %collection.origin(),
            entries = collection.len(),
            "collection installed"
        );
        slot.current = Some(Arc::clone(&collection));
        Ok(collection)
    }

    pub fn installed(&self, language: Language) -> Option<Arc<Collection>> {
        self.slots
            .read()
            .get(&language)
            .and_then(|slot| slot.current.clone())
    }

    /// The installed collection, loading it first if nothing is installed.
    pub async fn collection(&self, language: Language) -> Arc<Collection> {
        match self.installed(language) {
            Some(collection) => collection,
            None => self.refresh(language).await,
        }
    }

    /// Loads `language` again. If a newer load overtakes this one, the newer
    /// result is returned instead.
    pub async fn refresh(&self, language: Language) -> Arc<Collection> {
        let ticket = self.begin(language);
        let collection = self.loader.load(language).await;
        self.settle(ticket, collection)
    }

    /// Installs `collection`, or returns what a newer load installed. When the
    /// newer load has not finished yet, this load's own result is returned
    /// without being installed.
    fn settle(&self, ticket: LoadTicket, collection: Collection) -> Arc<Collection> {
        match self.install(ticket, collection) {
            Ok(installed) => installed,
            Err(own) => self.installed(ticket.language).unwrap_or_else(|| Arc::new(own)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DataSource, Origin};

    fn catalog() -> Catalog {
        Catalog::new(EntryLoader::new(DataSource::Bundled))
    }

    #[test]
    fn late_stale_load_is_discarded() {
        let catalog = catalog();
        let first = catalog.begin(Language::Egyptian);
        let second = catalog.begin(Language::Egyptian);
        let newer = Collection::new(Language::Egyptian, Origin::Remote, Vec::new());
        let installed = catalog.complete(second, newer).unwrap();
        assert_eq!(installed.generation(), 2);

        let older = Collection::bundled(Language::Egyptian);
        assert!(catalog.complete(first, older).is_none());
        let current = catalog.installed(Language::Egyptian).unwrap();
        assert_eq!(current.origin(), Origin::Remote);
        assert_eq!(current.generation(), 2);
    }

    #[test]
    fn overtaken_load_keeps_its_own_result_until_the_newer_one_lands() {
        let catalog = catalog();
        let first = catalog.begin(Language::Egyptian);
        let second = catalog.begin(Language::Egyptian);
        let remote = Collection::new(Language::Egyptian, Origin::Remote, Vec::new());
        let own = catalog.settle(first, remote);
        assert_eq!(own.origin(), Origin::Remote);
        assert_eq!(own.generation(), 1);
        assert!(catalog.installed(Language::Egyptian).is_none());

        let newer = Collection::new(Language::Egyptian, Origin::Directory, Vec::new());
        assert_eq!(catalog.settle(second, newer).generation(), 2);
        let third = catalog.begin(Language::Egyptian);
        let late = catalog.settle(first, Collection::bundled(Language::Egyptian));
        assert_eq!(late.origin(), Origin::Directory);
        assert!(catalog.complete(third, Collection::bundled(Language::Egyptian)).is_some());
    }

    #[test]
    fn languages_have_independent_generations() {
        let catalog = catalog();
        let egyptian = catalog.begin(Language::Egyptian);
        let sumerian = catalog.begin(Language::Sumerian);
        assert_eq!(egyptian.generation, 1);
        assert_eq!(sumerian.generation, 1);
        assert!(
            catalog
                .complete(sumerian, Collection::bundled(Language::Sumerian))
                .is_some()
        );
        assert!(catalog.installed(Language::Egyptian).is_none());
    }

    #[tokio::test]
    async fn collection_loads_once_then_caches() {
        let catalog = catalog();
        let first = catalog.collection(Language::Sumerian).await;
        let second = catalog.collection(Language::Sumerian).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.origin(), Origin::Bundled);
        let refreshed = catalog.refresh(Language::Sumerian).await;
        assert_eq!(refreshed.generation(), 2);
    }
}
