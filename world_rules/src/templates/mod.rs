//! Template registries - read-only archetype lookup shared by the generator and the systems.
//!
//! A [`TemplateStore`] is built once at startup, either programmatically or
//! from a TOML document, and then passed by reference to everything that
//! needs archetype data.

mod archetypes;

pub use archetypes::*;

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{Result, WorldError};

/// Archetypes of one kind, keyed by definition id.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    items: BTreeMap<String, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<T: Archetype> Registry<T> {
    /// Insert or replace an archetype under its own id.
    pub fn register(&mut self, item: T) {
        self.items.insert(item.id().to_string(), item);
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.get(id)
    }

    /// Like [`Registry::get`], but reports a missing id as an error.
    pub fn require(&self, id: &str) -> Result<&T> {
        self.get(id).ok_or_else(|| WorldError::TemplateNotFound {
            kind: T::KIND,
            id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// All archetypes in id order.
    pub fn all(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Every archetype registry of a world.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    pub biomes: Registry<BiomeTemplate>,
    pub locations: Registry<LocationTemplate>,
    pub factions: Registry<FactionTemplate>,
    pub resources: Registry<ResourceTemplate>,
    pub beliefs: Registry<BeliefTemplate>,
    pub traits: Registry<TraitTemplate>,
    pub bosses: Registry<BossTemplate>,
    pub transformations: Registry<TransformationRule>,
}

/// On-disk layout of a template document: one array of tables per kind.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TemplateDocument {
    biomes: Vec<BiomeTemplate>,
    locations: Vec<LocationTemplate>,
    factions: Vec<FactionTemplate>,
    resources: Vec<ResourceTemplate>,
    beliefs: Vec<BeliefTemplate>,
    traits: Vec<TraitTemplate>,
    bosses: Vec<BossTemplate>,
    transformations: Vec<TransformationRule>,
}

impl TemplateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML template document and register everything in it.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let mut store = Self::new();
        store.load_toml_str(source)?;
        Ok(store)
    }

    /// Merge a TOML template document into this store, replacing ids already present.
    pub fn load_toml_str(&mut self, source: &str) -> Result<()> {
        let document: TemplateDocument = toml::from_str(source)?;

        document.biomes.into_iter().for_each(|t| self.biomes.register(t));
        document.locations.into_iter().for_each(|t| self.locations.register(t));
        document.factions.into_iter().for_each(|t| self.factions.register(t));
        document.resources.into_iter().for_each(|t| self.resources.register(t));
        document.beliefs.into_iter().for_each(|t| self.beliefs.register(t));
        document.traits.into_iter().for_each(|t| self.traits.register(t));
        document.bosses.into_iter().for_each(|t| self.bosses.register(t));
        document
            .transformations
            .into_iter()
            .for_each(|t| self.transformations.register(t));

        Ok(())
    }
}
