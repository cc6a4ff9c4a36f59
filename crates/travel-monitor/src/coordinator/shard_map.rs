//! Static country to worker assignment.

use std::collections::BTreeMap;
use std::path::Path;

use travel_common::TravelError;

/// Country -> owning worker index.
///
/// Built once at bootstrap by dealing alphabetically sorted countries
/// round-robin over the workers. Worker replacement reuses the index, so the
/// map never changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct ShardMap {
    owners: BTreeMap<String, usize>,
    workers: usize,
}

impl ShardMap {
    pub fn round_robin(countries: impl IntoIterator<Item = String>, workers: usize) -> Self {
        let mut sorted: Vec<String> = countries.into_iter().collect();
        sorted.sort();
        sorted.dedup();

        let owners = sorted
            .into_iter()
            .enumerate()
            .map(|(i, country)| (country, i % workers.max(1)))
            .collect();

        Self { owners, workers }
    }

    /// Worker index owning `country`
    pub fn owner(&self, country: &str) -> Option<usize> {
        self.owners.get(country).copied()
    }

    /// Countries of one worker, alphabetical
    pub fn countries_of(&self, worker: usize) -> impl Iterator<Item = &str> {
        self.owners
            .iter()
            .filter(move |(_, owner)| **owner == worker)
            .map(|(country, _)| country.as_str())
    }

    /// All known countries, alphabetical
    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Country names: the subdirectories of the input root.
pub fn discover_countries(input_dir: &Path) -> Result<Vec<String>, TravelError> {
    let entries = std::fs::read_dir(input_dir).map_err(|e| {
        TravelError::Resource(format!("cannot open input directory {}: {}", input_dir.display(), e))
    })?;

    let mut countries = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => countries.push(name),
            Err(name) => tracing::warn!(name = ?name, "Skipping non UTF-8 country directory"),
        }
    }
    countries.sort();
    Ok(countries)
}
