pub mod file;

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use serde::Deserialize;
use strum::{Display, IntoStaticStr};
use tracing::warn;

/// Names of the runtime settings, used in change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SettingKey {
    Enabled,
    AllowedCountries,
    AllowedGeonameIds,
    BlockedCountries,
    BlockedGeonameIds,
    AllowedPaths,
    BlockedRedirect,
}

/// Geoblocking settings as they're stored, lists are kept pipe-delimited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub enabled: bool,
    pub allowed_countries: String,
    pub allowed_geoname_ids: String,
    pub blocked_countries: String,
    pub blocked_geoname_ids: String,
    pub allowed_paths: String,
    pub blocked_redirect: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_countries: String::new(),
            allowed_geoname_ids: String::new(),
            blocked_countries: String::new(),
            blocked_geoname_ids: String::new(),
            allowed_paths: String::new(),
            blocked_redirect: None,
        }
    }
}

impl Settings {
    /// Raw value of one of the list settings
    pub fn list(&self, key: SettingKey) -> &str {
        match key {
            SettingKey::AllowedCountries => &self.allowed_countries,
            SettingKey::AllowedGeonameIds => &self.allowed_geoname_ids,
            SettingKey::BlockedCountries => &self.blocked_countries,
            SettingKey::BlockedGeonameIds => &self.blocked_geoname_ids,
            SettingKey::AllowedPaths => &self.allowed_paths,
            SettingKey::Enabled | SettingKey::BlockedRedirect => "",
        }
    }

    /// Redirect target, blank values count as unset
    pub fn redirect(&self) -> Option<&str> {
        self.blocked_redirect
            .as_deref()
            .map(str::trim)
            .filter(|x| !x.is_empty())
    }

    /// Lists the settings that differ between `self` and `other`
    pub fn changed_keys(&self, other: &Self) -> Vec<SettingKey> {
        let mut keys = vec![];

        if self.enabled != other.enabled {
            keys.push(SettingKey::Enabled);
        }
        if self.allowed_countries != other.allowed_countries {
            keys.push(SettingKey::AllowedCountries);
        }
        if self.allowed_geoname_ids != other.allowed_geoname_ids {
            keys.push(SettingKey::AllowedGeonameIds);
        }
        if self.blocked_countries != other.blocked_countries {
            keys.push(SettingKey::BlockedCountries);
        }
        if self.blocked_geoname_ids != other.blocked_geoname_ids {
            keys.push(SettingKey::BlockedGeonameIds);
        }
        if self.allowed_paths != other.allowed_paths {
            keys.push(SettingKey::AllowedPaths);
        }
        if self.blocked_redirect != other.blocked_redirect {
            keys.push(SettingKey::BlockedRedirect);
        }

        keys
    }
}

/// Partial settings, e.g. from a settings file.
/// Keys that are absent leave the base value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsOverride {
    pub enabled: Option<bool>,
    #[serde(alias = "whitelist")]
    pub allowed_countries: Option<String>,
    pub allowed_geoname_ids: Option<String>,
    #[serde(alias = "countries")]
    pub blocked_countries: Option<String>,
    pub blocked_geoname_ids: Option<String>,
    pub allowed_paths: Option<String>,
    pub blocked_redirect: Option<String>,
}

impl SettingsOverride {
    pub fn apply(&self, base: &Settings) -> Settings {
        let pick = |v: &Option<String>, b: &String| v.clone().unwrap_or_else(|| b.clone());

        Settings {
            enabled: self.enabled.unwrap_or(base.enabled),
            allowed_countries: pick(&self.allowed_countries, &base.allowed_countries),
            allowed_geoname_ids: pick(&self.allowed_geoname_ids, &base.allowed_geoname_ids),
            blocked_countries: pick(&self.blocked_countries, &base.blocked_countries),
            blocked_geoname_ids: pick(&self.blocked_geoname_ids, &base.blocked_geoname_ids),
            allowed_paths: pick(&self.allowed_paths, &base.allowed_paths),
            blocked_redirect: self
                .blocked_redirect
                .clone()
                .or_else(|| base.blocked_redirect.clone()),
        }
    }
}

/// Gets told about every setting that changes
pub trait ObservesSettings: Send + Sync {
    fn setting_changed(&self, key: SettingKey);
}

/// Holds the current settings snapshot and fans out change notifications.
/// Observers are held weakly so that they can own a handle to the store.
pub struct SettingsStore {
    current: ArcSwap<Settings>,
    observers: ArcSwap<Vec<Weak<dyn ObservesSettings>>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: ArcSwap::from_pointee(settings),
            observers: ArcSwap::from_pointee(vec![]),
        }
    }

    pub fn load(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn subscribe(&self, observer: Weak<dyn ObservesSettings>) {
        self.observers.rcu(|list| {
            let mut list = list.iter().cloned().collect::<Vec<_>>();
            list.retain(|x| x.strong_count() > 0);
            list.push(observer.clone());
            list
        });
    }

    /// Installs new settings and notifies observers about each changed key.
    /// The snapshot is stored before notifying so that observers reading
    /// the store see the new values.
    pub fn replace(&self, settings: Settings) -> Vec<SettingKey> {
        let new = Arc::new(settings);
        let old = self.current.swap(new.clone());
        let changed = old.changed_keys(&new);

        if changed.is_empty() {
            return changed;
        }

        warn!(
            "Settings: changed: {}",
            changed
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let observers = self.observers.load();
        for key in &changed {
            for observer in observers.iter().filter_map(Weak::upgrade) {
                observer.setting_changed(*key);
            }
        }

        changed
    }

    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> Vec<SettingKey> {
        let mut settings = Settings::clone(&self.load());
        f(&mut settings);
        self.replace(settings)
    }
}
