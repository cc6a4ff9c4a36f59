//! Interactive session: one command per stdin line, triggers in between.

use std::fmt::Write as _;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use travel_common::{RejectReason, Tally, TravelError, TravelOutcome, VaccinationStatus};

use crate::command::Command;
use crate::coordinator::{Coordinator, StatusReport};
use crate::triggers::{Trigger, Triggers};

/// Run one command and render its output.
pub async fn execute(coordinator: &mut Coordinator, command: Command) -> Result<String, TravelError> {
    let output = match command {
        Command::TravelRequest {
            citizen_id,
            date,
            country_from,
            country_to,
            virus,
        } => {
            let outcome = coordinator
                .travel_request(&citizen_id, &date, &country_from, &country_to, &virus)
                .await?;
            render_outcome(outcome).to_string()
        }
        Command::TravelStats {
            virus,
            date_from,
            date_to,
            country,
        } => {
            let tally = coordinator.travel_stats(&virus, &date_from, &date_to, country.as_deref())?;
            render_stats(tally)
        }
        Command::AddVaccinationRecords { country } => {
            let filters = coordinator.add_vaccination_records(&country).await?;
            format!("Bloom filters have been updated ({} viruses)", filters)
        }
        Command::SearchVaccinationStatus { citizen_id } => {
            match coordinator.search_vaccination_status(&citizen_id).await? {
                Some(report) => render_status(&report),
                None => format!("CitizenID : {} does not exist in database", citizen_id),
            }
        }
        Command::Exit => String::new(),
    };
    Ok(output)
}

/// Read and run commands until `/exit`, end of input, or a terminate
/// trigger. Child-exit triggers are handled between commands.
///
/// Only fatal errors end the session with `Err`; everything else is printed
/// and the session continues.
pub async fn run(coordinator: &mut Coordinator, triggers: &mut Triggers) -> Result<(), TravelError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            biased;
            trigger = triggers.next() => {
                match trigger {
                    Trigger::Terminate => {
                        tracing::info!("🛑 Terminate signal received");
                        return Ok(());
                    }
                    Trigger::ChildExited => {
                        coordinator.replace_exited_workers().await;
                    }
                    Trigger::Refresh => {}
                }
                continue;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            tracing::info!("End of input");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let output = match line.parse::<Command>() {
            Ok(Command::Exit) => return Ok(()),
            Ok(command) => match execute(coordinator, command).await {
                Ok(output) => output,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => format!("Error : {}", e),
            },
            Err(e) => format!("Error : {}", e),
        };

        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
}

pub fn render_outcome(outcome: TravelOutcome) -> &'static str {
    match outcome {
        TravelOutcome::Accepted => "REQUEST ACCEPTED - HAPPY TRAVELS",
        TravelOutcome::Rejected(RejectReason::NotVaccinated) => "REQUEST REJECTED - YOU ARE NOT VACCINATED",
        TravelOutcome::Rejected(RejectReason::VaccinationExpired) => {
            "REQUEST REJECTED - YOU WILL NEED ANOTHER VACCINATION BEFORE TRAVEL DATE"
        }
        TravelOutcome::Rejected(RejectReason::VaccinatedAfterTravel) => {
            "REQUEST REJECTED - YOU ARE NOT VACCINATED (VACCINATION FOUND BUT IS AFTER THE TRAVEL DATE)"
        }
    }
}

pub fn render_stats(tally: Tally) -> String {
    format!(
        "TOTAL REQUESTS {}\nACCEPTED {}\nREJECTED {}",
        tally.total(),
        tally.accepted,
        tally.rejected
    )
}

pub fn render_status(report: &StatusReport) -> String {
    let citizen = &report.citizen;
    let mut out = format!(
        "{} {} {} {}\nAGE {}",
        report.citizen_id, citizen.first_name, citizen.last_name, citizen.country, citizen.age
    );
    for (virus, status) in &report.vaccinations {
        let _ = match status {
            VaccinationStatus::Vaccinated(date) => write!(out, "\n{} VACCINATED ON {}", virus, date),
            VaccinationStatus::NotVaccinated => write!(out, "\n{} NOT YET VACCINATED", virus),
        };
    }
    out
}
