//! Tour catalog
//!
//! Discovers tour JSON files in a directory tree and indexes them by the
//! `id` and `language` fields inside each file, not by file name, so files can
//! be organised freely.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use waypoint_core::language::FALLBACK_LANGUAGE;
use waypoint_core::{CoreError, Result, StorageError, Tour, TourId};

/// Tours indexed as `{ tour_id: { language: Tour } }`
#[derive(Debug, Clone, Default)]
pub struct TourCatalog {
    tours: BTreeMap<TourId, BTreeMap<String, Tour>>,
}

impl TourCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from already loaded tours
    pub fn from_tours(tours: impl IntoIterator<Item = Tour>) -> Self {
        let mut catalog = Self::new();
        for tour in tours {
            catalog.insert(tour);
        }
        catalog
    }

    /// Recursively load every `*.json` file under `dir`
    ///
    /// `index.json` files and `-original` backups are skipped, as are files
    /// that fail to parse or validate (logged, not fatal).
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CoreError::not_found("tour directory", dir.display().to_string()));
        }

        let mut catalog = Self::new();
        catalog.scan(dir)?;
        info!(
            "Tour catalog loaded from {}: {} tours",
            dir.display(),
            catalog.tours.len()
        );
        Ok(catalog)
    }

    fn scan(&mut self, dir: &Path) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(dir)
            .map_err(StorageError::from)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.scan(&path)?;
                continue;
            }

            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !name.ends_with(".json") || name == "index.json" || name.contains("-original") {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(|e| CoreError::Storage(StorageError::Io(e)))
                .and_then(|raw| Tour::from_json(&raw));

            match parsed {
                Ok(tour) => {
                    debug!("Registered tour {} ({}) from {}", tour.id, tour.language, path.display());
                    self.insert(tour);
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        Ok(())
    }

    /// Add or replace a tour version
    pub fn insert(&mut self, tour: Tour) {
        self.tours
            .entry(tour.id.clone())
            .or_default()
            .insert(tour.language.clone(), tour);
    }

    /// Tour in the requested language, falling back to English, then to any
    /// available language
    pub fn tour(&self, id: &TourId, language: &str) -> Option<&Tour> {
        let versions = self.tours.get(id)?;
        versions
            .get(language)
            .or_else(|| versions.get(FALLBACK_LANGUAGE))
            .or_else(|| versions.values().next())
    }

    /// First tour (by id) available in `language`
    pub fn any_tour_in_language(&self, language: &str) -> Option<&Tour> {
        self.tours.values().find_map(|versions| versions.get(language))
    }

    pub fn tour_ids(&self) -> Vec<&TourId> {
        self.tours.keys().collect()
    }

    /// Languages a tour ships in
    pub fn languages_for(&self, id: &TourId) -> Vec<&str> {
        self.tours
            .get(id)
            .map(|versions| versions.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Languages across all tours, deduplicated and sorted
    pub fn all_languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self
            .tours
            .values()
            .flat_map(|versions| versions.keys().map(String::as_str))
            .collect();
        langs.sort_unstable();
        langs.dedup();
        langs
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour(id: &str, language: &str) -> Tour {
        Tour {
            id: TourId::new(id),
            language: language.to_string(),
            title: format!("{id} ({language})"),
            description: None,
            stops: Vec::new(),
            transition_audio: None,
        }
    }

    #[test]
    fn language_fallback_order() {
        let catalog = TourCatalog::from_tours([tour("rome", "de"), tour("rome", "en")]);
        let id = TourId::new("rome");

        assert_eq!(catalog.tour(&id, "de").unwrap().language, "de");
        assert_eq!(catalog.tour(&id, "cs").unwrap().language, "en");
        assert!(catalog.tour(&TourId::new("paris"), "en").is_none());
    }

    #[test]
    fn falls_back_to_any_language_without_english() {
        let catalog = TourCatalog::from_tours([tour("prague", "cs")]);
        let found = catalog.tour(&TourId::new("prague"), "de").unwrap();
        assert_eq!(found.language, "cs");
    }

    #[test]
    fn language_listing() {
        let catalog = TourCatalog::from_tours([
            tour("rome", "de"),
            tour("rome", "en"),
            tour("prague", "cs"),
            tour("prague", "en"),
        ]);
        assert_eq!(catalog.all_languages(), vec!["cs", "de", "en"]);
        assert_eq!(catalog.languages_for(&TourId::new("rome")), vec!["de", "en"]);
        assert_eq!(catalog.any_tour_in_language("cs").unwrap().id.as_str(), "prague");
    }
}
