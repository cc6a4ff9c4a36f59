//! Per-worker shard indices.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use travel_common::dates;
use travel_common::{
    BloomFilter, Citizen, CitizenId, OrderedIndex, RecordError, RecordLine, Tally,
    VaccinationStatus,
};

/// Indices for one virus
#[derive(Debug, Clone)]
pub struct VirusIndex {
    /// Vaccinated ids only
    pub bloom: BloomFilter,
    pub vaccinated: OrderedIndex<NaiveDate>,
    pub not_vaccinated: OrderedIndex<()>,
}

impl VirusIndex {
    fn new(bloom_size: usize) -> Self {
        Self {
            bloom: BloomFilter::new(bloom_size),
            vaccinated: OrderedIndex::new(),
            not_vaccinated: OrderedIndex::new(),
        }
    }

    /// Lookup across both lists; `None` if the id is in neither.
    pub fn status_of(&self, id: &CitizenId) -> Option<VaccinationStatus> {
        if let Some(date) = self.vaccinated.get(id) {
            return Some(VaccinationStatus::Vaccinated(*date));
        }
        self.not_vaccinated
            .contains(id)
            .then_some(VaccinationStatus::NotVaccinated)
    }
}

/// Everything one worker owns: citizens, per-virus indices, the countries
/// assigned to it with their ingested files, and its travel tally.
#[derive(Debug)]
pub struct ShardStore {
    bloom_size: usize,
    citizens: HashMap<CitizenId, Citizen>,
    viruses: BTreeMap<String, VirusIndex>,
    /// Owned country -> file names already ingested
    countries: BTreeMap<String, BTreeSet<String>>,
    tally: Tally,
}

impl ShardStore {
    pub fn new(bloom_size: usize) -> Self {
        Self {
            bloom_size,
            citizens: HashMap::new(),
            viruses: BTreeMap::new(),
            countries: BTreeMap::new(),
            tally: Tally::default(),
        }
    }

    /// Validate and insert one record.
    ///
    /// Checks run in order and the first violation wins: identity conflict,
    /// duplicate (id, virus), then form.
    pub fn insert(&mut self, record: RecordLine) -> Result<(), RecordError> {
        if let Some(known) = self.citizens.get(&record.citizen_id) {
            if *known != record.citizen {
                return Err(RecordError::InconsistentIdentity);
            }
            if let Some(index) = self.viruses.get(&record.virus) {
                if index.status_of(&record.citizen_id).is_some() {
                    return Err(RecordError::Duplicate);
                }
            }
        }

        let date = match (record.vaccinated, record.date.as_deref()) {
            (true, Some(raw)) => Some(dates::parse(raw).map_err(|_| RecordError::InvalidForm)?),
            (false, None) => None,
            _ => return Err(RecordError::InvalidForm),
        };

        self.citizens
            .entry(record.citizen_id.clone())
            .or_insert(record.citizen);

        let bloom_size = self.bloom_size;
        let index = self
            .viruses
            .entry(record.virus)
            .or_insert_with(|| VirusIndex::new(bloom_size));

        match date {
            Some(date) => {
                index.bloom.insert(record.citizen_id.as_str());
                index.vaccinated.insert(record.citizen_id, date);
            }
            None => {
                index.not_vaccinated.insert(record.citizen_id, ());
            }
        }

        Ok(())
    }

    /// Authoritative answer for a VACC_QUERY. Unknown citizens or viruses
    /// are not vaccinated.
    pub fn vaccination_status(&self, id: &CitizenId, virus: &str) -> VaccinationStatus {
        self.viruses
            .get(virus)
            .and_then(|index| index.vaccinated.get(id))
            .map(|date| VaccinationStatus::Vaccinated(*date))
            .unwrap_or(VaccinationStatus::NotVaccinated)
    }

    pub fn citizen(&self, id: &CitizenId) -> Option<&Citizen> {
        self.citizens.get(id)
    }

    /// Every virus the id appears under, in virus-name order
    pub fn vaccinations_of(&self, id: &CitizenId) -> Vec<(&str, VaccinationStatus)> {
        self.viruses
            .iter()
            .filter_map(|(virus, index)| index.status_of(id).map(|s| (virus.as_str(), s)))
            .collect()
    }

    pub fn virus(&self, name: &str) -> Option<&VirusIndex> {
        self.viruses.get(name)
    }

    /// (virus, bloom) pairs for snapshot streaming
    pub fn blooms(&self) -> impl Iterator<Item = (&str, &BloomFilter)> {
        self.viruses
            .iter()
            .map(|(name, index)| (name.as_str(), &index.bloom))
    }

    /// Register a country as owned by this shard
    pub fn claim_country(&mut self, country: &str) {
        self.countries.entry(country.to_string()).or_default();
    }

    pub fn owns(&self, country: &str) -> bool {
        self.countries.contains_key(country)
    }

    /// Owned countries in alphabetical order
    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.countries.keys().map(String::as_str)
    }

    pub fn is_file_ingested(&self, country: &str, file: &str) -> bool {
        self.countries
            .get(country)
            .is_some_and(|files| files.contains(file))
    }

    pub fn mark_file_ingested(&mut self, country: &str, file: &str) {
        self.countries
            .entry(country.to_string())
            .or_default()
            .insert(file.to_string());
    }

    /// Count an OUTCOME_NOTICE
    pub fn record_outcome(&mut self, accepted: bool) {
        self.tally.record(accepted);
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn bloom_size(&self) -> usize {
        self.bloom_size
    }
}
