//! Travel request statistics, kept by the coordinator.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use travel_common::Tally;

/// Outcomes per destination country, per virus, per travel date
#[derive(Debug, Default)]
pub struct TravelStats {
    by_country: HashMap<String, HashMap<String, BTreeMap<NaiveDate, Tally>>>,
}

impl TravelStats {
    pub fn record(&mut self, country: &str, virus: &str, date: NaiveDate, accepted: bool) {
        self.by_country
            .entry(country.to_string())
            .or_default()
            .entry(virus.to_string())
            .or_default()
            .entry(date)
            .or_default()
            .record(accepted);
    }

    /// Outcomes for one country with `from <= date <= to`
    pub fn country_range(&self, country: &str, virus: &str, from: NaiveDate, to: NaiveDate) -> Tally {
        let mut tally = Tally::default();
        if from > to {
            return tally;
        }
        if let Some(days) = self.by_country.get(country).and_then(|v| v.get(virus)) {
            for (_, day) in days.range(from..=to) {
                tally += *day;
            }
        }
        tally
    }

    /// Outcomes summed across every country
    pub fn total_range(&self, virus: &str, from: NaiveDate, to: NaiveDate) -> Tally {
        let mut tally = Tally::default();
        for country in self.by_country.keys() {
            tally += self.country_range(country, virus, from, to);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_range_is_inclusive() {
        let mut stats = TravelStats::default();
        stats.record("Greece", "COVID19", day("2021-01-01"), true);
        stats.record("Greece", "COVID19", day("2021-06-15"), false);
        stats.record("Greece", "COVID19", day("2021-12-31"), true);
        stats.record("Greece", "COVID19", day("2022-01-01"), true);

        let tally = stats.country_range("Greece", "COVID19", day("2021-01-01"), day("2021-12-31"));
        assert_eq!(tally, Tally { accepted: 2, rejected: 1 });
    }

    #[test]
    fn test_total_sums_countries() {
        let mut stats = TravelStats::default();
        stats.record("Greece", "COVID19", day("2021-03-01"), true);
        stats.record("Italy", "COVID19", day("2021-04-01"), false);
        stats.record("Italy", "H1N1", day("2021-04-01"), true);

        let total = stats.total_range("COVID19", day("2021-01-01"), day("2021-12-31"));
        let greece = stats.country_range("Greece", "COVID19", day("2021-01-01"), day("2021-12-31"));
        let italy = stats.country_range("Italy", "COVID19", day("2021-01-01"), day("2021-12-31"));

        assert_eq!(total.total(), 2);
        assert_eq!(total.total(), greece.total() + italy.total());
        assert_eq!(
            stats.country_range("Spain", "COVID19", day("2021-01-01"), day("2021-12-31")),
            Tally::default()
        );
    }
}
