use std::{
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use ahash::AHashSet;
use arc_swap::ArcSwapOption;
use tracing::debug;

use super::{parse_countries, parse_geoname_ids};
use crate::settings::{ObservesSettings, SettingKey, Settings, SettingsStore};

/// Lazily built set that is dropped on invalidation.
///
/// The generation counter protects against a rebuild that read the old
/// settings being installed after an invalidation: the builder checks the
/// generation after storing and clears its own result if it changed.
struct Slot<T> {
    value: ArcSwapOption<AHashSet<T>>,
    generation: AtomicU64,
}

impl<T: Eq + Hash> Slot<T> {
    fn new() -> Self {
        Self {
            value: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
        }
    }

    fn get_or_build(&self, build: impl FnOnce() -> AHashSet<T>) -> Arc<AHashSet<T>> {
        if let Some(v) = self.value.load_full() {
            return v;
        }

        // Must be read before the settings are loaded by the builder
        let generation = self.generation.load(Ordering::Acquire);
        let set = Arc::new(build());
        self.value.store(Some(set.clone()));

        if self.generation.load(Ordering::Acquire) != generation {
            self.value.store(None);
        }

        set
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.value.store(None);
    }

    fn is_cached(&self) -> bool {
        self.value.load().is_some()
    }
}

/// Memoizes the parsed policy sets, see `ObservesSettings` impl for invalidation
pub struct PolicyCache {
    settings: Arc<SettingsStore>,
    allowed_countries: Slot<String>,
    allowed_geoname_ids: Slot<u32>,
    blocked_countries: Slot<String>,
    blocked_geoname_ids: Slot<u32>,
}

impl PolicyCache {
    /// Creates the cache and subscribes it to the changes in the settings store
    pub fn new(settings: Arc<SettingsStore>) -> Arc<Self> {
        let cache = Arc::new(Self {
            settings: settings.clone(),
            allowed_countries: Slot::new(),
            allowed_geoname_ids: Slot::new(),
            blocked_countries: Slot::new(),
            blocked_geoname_ids: Slot::new(),
        });

        settings.subscribe(Arc::downgrade(
            &(cache.clone() as Arc<dyn ObservesSettings>),
        ));

        cache
    }

    fn build_countries(&self, key: SettingKey) -> AHashSet<String> {
        let settings: Arc<Settings> = self.settings.load();
        let set = parse_countries(settings.list(key));
        debug!("PolicyCache: {key} rebuilt: {} entries", set.len());
        set
    }

    fn build_geoname_ids(&self, key: SettingKey) -> AHashSet<u32> {
        let settings = self.settings.load();
        let set = parse_geoname_ids(settings.list(key));
        debug!("PolicyCache: {key} rebuilt: {} entries", set.len());
        set
    }

    pub fn allowed_countries(&self) -> Arc<AHashSet<String>> {
        self.allowed_countries
            .get_or_build(|| self.build_countries(SettingKey::AllowedCountries))
    }

    pub fn allowed_geoname_ids(&self) -> Arc<AHashSet<u32>> {
        self.allowed_geoname_ids
            .get_or_build(|| self.build_geoname_ids(SettingKey::AllowedGeonameIds))
    }

    pub fn blocked_countries(&self) -> Arc<AHashSet<String>> {
        self.blocked_countries
            .get_or_build(|| self.build_countries(SettingKey::BlockedCountries))
    }

    pub fn blocked_geoname_ids(&self) -> Arc<AHashSet<u32>> {
        self.blocked_geoname_ids
            .get_or_build(|| self.build_geoname_ids(SettingKey::BlockedGeonameIds))
    }

    /// Whether the set backing the given setting is currently built
    pub fn is_cached(&self, key: SettingKey) -> bool {
        match key {
            SettingKey::AllowedCountries => self.allowed_countries.is_cached(),
            SettingKey::AllowedGeonameIds => self.allowed_geoname_ids.is_cached(),
            SettingKey::BlockedCountries => self.blocked_countries.is_cached(),
            SettingKey::BlockedGeonameIds => self.blocked_geoname_ids.is_cached(),
            _ => false,
        }
    }
}

impl ObservesSettings for PolicyCache {
    fn setting_changed(&self, key: SettingKey) {
        match key {
            SettingKey::AllowedCountries => self.allowed_countries.invalidate(),
            SettingKey::AllowedGeonameIds => self.allowed_geoname_ids.invalidate(),
            SettingKey::BlockedCountries => self.blocked_countries.invalidate(),
            SettingKey::BlockedGeonameIds => self.blocked_geoname_ids.invalidate(),
            _ => return,
        }

        debug!("PolicyCache: {key} invalidated");
    }
}
