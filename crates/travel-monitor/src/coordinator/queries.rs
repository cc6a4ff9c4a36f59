//! The interactive queries.

use chrono::NaiveDate;
use nix::sys::signal::Signal;
use travel_common::dates::{self, Window};
use travel_common::{
    Citizen, CitizenId, RejectReason, Tally, TravelError, TravelOutcome, VaccinationStatus,
};

use super::{Coordinator, country_dir, gather, harvest_snapshot};
use crate::protocol::{ChannelError, Message};

/// Everything the workers know about one citizen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub citizen_id: CitizenId,
    pub citizen: Citizen,
    /// (virus, status) in arrival order
    pub vaccinations: Vec<(String, VaccinationStatus)>,
}

impl Coordinator {
    /// Decide a travel request and record it against the destination.
    ///
    /// The source country's cached bloom filter is checked first; only a
    /// "maybe" costs a VACC_QUERY round trip to the owning worker.
    pub async fn travel_request(
        &mut self,
        citizen_id: &str,
        date: &str,
        country_from: &str,
        country_to: &str,
        virus: &str,
    ) -> Result<TravelOutcome, TravelError> {
        let id = CitizenId::parse(citizen_id)?;
        let travel_date = dates::parse(date)?;
        let from_worker = self.owner(country_from)?;
        let to_worker = self.owner(country_to)?;

        let handle = &mut self.workers[from_worker];
        let bloom = handle.bloom(virus).ok_or_else(|| TravelError::VirusNotTracked {
            virus: virus.to_string(),
            country: country_from.to_string(),
        })?;

        let outcome = if !bloom.may_contain(id.as_str()) {
            TravelOutcome::Rejected(RejectReason::NotVaccinated)
        } else {
            handle.vacc_queries += 1;
            handle
                .send(&Message::VaccQuery {
                    citizen_id: id.to_string(),
                    virus: virus.to_string(),
                })
                .await?;
            match handle.recv().await? {
                Message::VaccAnswer { status } => classify(status, travel_date),
                other => return Err(ChannelError::Unexpected(other.kind()).for_worker(from_worker)),
            }
        };

        let accepted = outcome.is_accepted();
        self.stats.record(country_to, virus, travel_date, accepted);
        self.totals.record(accepted);
        self.notify_outcome(to_worker, accepted).await?;

        tracing::debug!(
            citizen = %id,
            from = %country_from,
            to = %country_to,
            virus = %virus,
            outcome = ?outcome,
            "Travel request decided"
        );

        Ok(outcome)
    }

    /// Outcome counts for a virus over an inclusive date range, for one
    /// country or all of them.
    pub fn travel_stats(
        &self,
        virus: &str,
        date_from: &str,
        date_to: &str,
        country: Option<&str>,
    ) -> Result<Tally, TravelError> {
        let (from, to) = date_range(date_from, date_to)?;
        match country {
            Some(country) => {
                self.owner(country)?;
                Ok(self.stats.country_range(country, virus, from, to))
            }
            None => Ok(self.stats.total_range(virus, from, to)),
        }
    }

    /// Ingest new files for a country and refresh the cached filters of its
    /// worker. Returns the number of filters received.
    pub async fn add_vaccination_records(&mut self, country: &str) -> Result<usize, TravelError> {
        let index = self.owner(country)?;
        let country_dir = country_dir(&self.config, country);
        let handle = &mut self.workers[index];

        handle.send(&Message::Assign { country_dir }).await?;
        handle.expect_done().await?;

        handle.signal(Signal::SIGUSR1)?;

        let mut received = 0;
        loop {
            match handle.recv().await? {
                Message::Done => break,
                message => {
                    harvest_snapshot(handle, message)?;
                    received += 1;
                }
            }
        }

        tracing::info!(worker = index, country = %country, filters = received, "Bloom filters refreshed");
        Ok(received)
    }

    /// Ask every worker about a citizen. `None` if no worker knows the id.
    pub async fn search_vaccination_status(
        &mut self,
        citizen_id: &str,
    ) -> Result<Option<StatusReport>, TravelError> {
        let id = CitizenId::parse(citizen_id)?;
        let query = Message::StatusQuery {
            citizen_id: id.to_string(),
        };

        let mut first_error = None;
        let mut reachable = Vec::with_capacity(self.workers.len());
        for handle in self.workers.iter_mut() {
            match handle.send(&query).await {
                Ok(()) => reachable.push(handle),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let mut citizen = None;
        let mut vaccinations = Vec::new();
        let gathered = gather(reachable, |handle, message| match message {
            Message::PersonInfo {
                first_name,
                last_name,
                country,
                age,
            } => {
                citizen.get_or_insert(Citizen {
                    first_name,
                    last_name,
                    country,
                    age,
                });
                Ok(())
            }
            Message::PersonVacc { virus, status } => {
                vaccinations.push((virus, status));
                Ok(())
            }
            other => Err(ChannelError::Unexpected(other.kind()).for_worker(handle.index)),
        })
        .await;

        if let Some(e) = first_error {
            return Err(e);
        }
        gathered?;

        Ok(citizen.map(|citizen| StatusReport {
            citizen_id: id,
            citizen,
            vaccinations,
        }))
    }

    /// OUTCOME_NOTICE to the destination worker.
    ///
    /// The outcome is already counted by the coordinator, so a worker that
    /// is gone only loses its local tally; that is logged, not returned.
    async fn notify_outcome(&mut self, index: usize, accepted: bool) -> Result<(), TravelError> {
        let handle = &mut self.workers[index];
        let delivered = async {
            handle.send(&Message::OutcomeNotice { accepted }).await?;
            handle.expect_done().await
        }
        .await;

        match delivered {
            Err(TravelError::WorkerUnavailable(worker)) => {
                tracing::warn!(worker, "Outcome notice not delivered, worker unavailable");
                Ok(())
            }
            other => other,
        }
    }
}

/// Map a worker's answer and the travel date to an outcome
pub(crate) fn classify(status: VaccinationStatus, travel: NaiveDate) -> TravelOutcome {
    match status {
        VaccinationStatus::NotVaccinated => TravelOutcome::Rejected(RejectReason::NotVaccinated),
        VaccinationStatus::Vaccinated(vaccinated) => match dates::within_half_year(vaccinated, travel) {
            Window::Within => TravelOutcome::Accepted,
            Window::Expired => TravelOutcome::Rejected(RejectReason::VaccinationExpired),
            Window::BeforeVaccination => TravelOutcome::Rejected(RejectReason::VaccinatedAfterTravel),
        },
    }
}

fn date_range(from: &str, to: &str) -> Result<(NaiveDate, NaiveDate), TravelError> {
    let (start, end) = (dates::parse(from)?, dates::parse(to)?);
    if start > end {
        return Err(TravelError::InvalidDateRange {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok((start, end))
}
