use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::dataset::{LocalDataset, TieBreak};
use crate::domain::{Identifier, ResourceKind, SENTINEL};
use crate::error::HomopairError;
use crate::fetch::SequenceFetcher;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", content = "value", rename_all = "kebab-case")]
pub enum Resolution {
    Cached(String),
    Local(String),
    Fetched(String),
    Unresolved,
    Skipped,
}

impl Resolution {
    pub fn value(&self) -> Option<&str> {
        match self {
            Resolution::Cached(value) | Resolution::Local(value) | Resolution::Fetched(value) => {
                Some(value)
            }
            Resolution::Unresolved => Some(SENTINEL),
            Resolution::Skipped => None,
        }
    }

    pub fn tier(&self) -> &'static str {
        match self {
            Resolution::Cached(_) => "cache",
            Resolution::Local(_) => "local",
            Resolution::Fetched(_) => "fetched",
            Resolution::Unresolved => "unresolved",
            Resolution::Skipped => "skipped",
        }
    }
}

pub struct Resolver {
    store: Store,
    fetchers: BTreeMap<ResourceKind, Box<dyn SequenceFetcher>>,
    tie_break: TieBreak,
}

impl Resolver {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            fetchers: BTreeMap::new(),
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_fetcher(
        mut self,
        kind: ResourceKind,
        fetcher: impl SequenceFetcher + 'static,
    ) -> Self {
        self.fetchers.insert(kind, Box::new(fetcher));
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn record_key(id: &Identifier, kind: ResourceKind) -> Result<String, HomopairError> {
        kind.record_suffix()
            .map(|suffix| id.record_key(suffix))
            .ok_or(HomopairError::UnsupportedKind(kind))
    }

    pub fn resolve(
        &self,
        id: &Identifier,
        kind: ResourceKind,
        datasets: &[&LocalDataset],
    ) -> Result<Resolution, HomopairError> {
        let key = Self::record_key(id, kind)?;
        if !kind.admits(id) {
            debug!(identifier = %id, %kind, "identifier outside naming convention, skipped");
            return Ok(Resolution::Skipped);
        }

        let namespace = self.store.namespace(kind);
        if let Some(value) = namespace.get(&key)? {
            debug!(identifier = %id, %kind, "cache hit");
            return Ok(Resolution::Cached(value));
        }

        let resolution = match self.lookup_local(id, datasets) {
            Some(value) => Resolution::Local(value),
            None => self.fetch(id, kind)?,
        };

        let value = resolution.value().unwrap_or(SENTINEL);
        if !namespace.set_if_absent(&key, value)? {
            // Another writer got there first; its value is the record.
            if let Some(existing) = namespace.get(&key)? {
                return Ok(Resolution::Cached(existing));
            }
        }
        Ok(resolution)
    }

    pub fn cached(
        &self,
        id: &Identifier,
        kind: ResourceKind,
    ) -> Result<Option<String>, HomopairError> {
        let key = Self::record_key(id, kind)?;
        self.store.namespace(kind).get(&key)
    }

    fn lookup_local(&self, id: &Identifier, datasets: &[&LocalDataset]) -> Option<String> {
        datasets.iter().find_map(|dataset| {
            dataset.lookup(id, self.tie_break).map(|value| {
                debug!(identifier = %id, dataset = dataset.name(), "resolved from local dataset");
                value.to_string()
            })
        })
    }

    fn fetch(&self, id: &Identifier, kind: ResourceKind) -> Result<Resolution, HomopairError> {
        let fetcher = self
            .fetchers
            .get(&kind)
            .ok_or(HomopairError::MissingFetcher(kind))?;
        match fetcher.fetch(id) {
            Ok(Some(value)) if !value.trim().is_empty() => Ok(Resolution::Fetched(value)),
            Ok(_) => Ok(Resolution::Unresolved),
            Err(err) if err.is_not_found() => {
                warn!(identifier = %id, source = fetcher.source(), %err, "treating fetch failure as not found");
                Ok(Resolution::Unresolved)
            }
            Err(err) => Err(err),
        }
    }
}
