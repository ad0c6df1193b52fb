//! Core types for the path index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// NodeId: Identifier of a node in the authoritative site tree
pub type NodeId = u64;

/// LocaleId: Raw numeric locale identifier; `0` is the default locale
pub type LocaleId = u32;

/// Locale a path or name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Locale {
    Default,
    Named(LocaleId),
}

impl Locale {
    /// Map a raw locale id onto the enum; `0` is always the default locale.
    pub fn from_id(id: LocaleId) -> Self {
        if id == 0 {
            Locale::Default
        } else {
            Locale::Named(id)
        }
    }

    /// Raw id as persisted in the store.
    pub fn id(self) -> LocaleId {
        match self {
            Locale::Default => 0,
            Locale::Named(id) => id,
        }
    }

    pub fn is_default(self) -> bool {
        matches!(self, Locale::Default) || self.id() == 0
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::Default
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::Default => write!(f, "default"),
            Locale::Named(id) => write!(f, "{}", id),
        }
    }
}

/// A string value per locale with explicit default-locale fallback.
///
/// Used for both node names and node paths. Lookups through [`PerLocale::resolve`] fall
/// back to the default-locale value when no locale-specific value is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerLocale {
    values: BTreeMap<Locale, String>,
}

impl PerLocale {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map holding only a default-locale value.
    pub fn with_default(value: impl Into<String>) -> Self {
        let mut map = Self::new();
        map.insert(Locale::Default, value);
        map
    }

    pub fn insert(&mut self, locale: Locale, value: impl Into<String>) {
        self.values.insert(Locale::from_id(locale.id()), value.into());
    }

    /// Exact lookup without fallback.
    pub fn get(&self, locale: Locale) -> Option<&str> {
        self.values.get(&Locale::from_id(locale.id())).map(String::as_str)
    }

    /// Lookup with fallback to the default locale.
    ///
    /// Empty locale-specific values count as unset.
    pub fn resolve(&self, locale: Locale) -> Option<&str> {
        match self.get(locale) {
            Some(value) if !value.is_empty() => Some(value),
            _ => self.default_value(),
        }
    }

    pub fn default_value(&self) -> Option<&str> {
        self.get(Locale::Default)
    }

    pub fn contains(&self, locale: Locale) -> bool {
        self.get(locale).is_some()
    }

    /// Locales present, default first.
    pub fn locales(&self) -> impl Iterator<Item = Locale> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Locale, &str)> {
        self.values.iter().map(|(l, v)| (*l, v.as_str()))
    }

    pub fn remove(&mut self, locale: Locale) -> Option<String> {
        self.values.remove(&Locale::from_id(locale.id()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Locale, String)> for PerLocale {
    fn from_iter<I: IntoIterator<Item = (Locale, String)>>(iter: I) -> Self {
        let mut map = PerLocale::new();
        for (locale, value) in iter {
            map.insert(locale, value);
        }
        map
    }
}
