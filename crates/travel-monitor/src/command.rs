//! Interactive command parsing.

use std::str::FromStr;

use thiserror::Error;

/// Any line that is not one of the known commands with the right arity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown or invalid command")]
pub struct UsageError;

/// One interactive command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/travelRequest citizenId date countryFrom countryTo virus`
    TravelRequest {
        citizen_id: String,
        date: String,
        country_from: String,
        country_to: String,
        virus: String,
    },
    /// `/travelStats virus date1 date2 [country]`
    TravelStats {
        virus: String,
        date_from: String,
        date_to: String,
        country: Option<String>,
    },
    /// `/addVaccinationRecords country`
    AddVaccinationRecords { country: String },
    /// `/searchVaccinationStatus citizenId`
    SearchVaccinationStatus { citizen_id: String },
    /// `/exit`
    Exit,
}

impl FromStr for Command {
    type Err = UsageError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(UsageError)?;
        let args: Vec<String> = words.map(str::to_string).collect();

        let command = match (name, args.as_slice()) {
            ("/travelRequest", [citizen_id, date, country_from, country_to, virus]) => {
                Self::TravelRequest {
                    citizen_id: citizen_id.clone(),
                    date: date.clone(),
                    country_from: country_from.clone(),
                    country_to: country_to.clone(),
                    virus: virus.clone(),
                }
            }
            ("/travelStats", [virus, date_from, date_to]) => Self::TravelStats {
                virus: virus.clone(),
                date_from: date_from.clone(),
                date_to: date_to.clone(),
                country: None,
            },
            ("/travelStats", [virus, date_from, date_to, country]) => Self::TravelStats {
                virus: virus.clone(),
                date_from: date_from.clone(),
                date_to: date_to.clone(),
                country: Some(country.clone()),
            },
            ("/addVaccinationRecords", [country]) => Self::AddVaccinationRecords {
                country: country.clone(),
            },
            ("/searchVaccinationStatus", [citizen_id]) => Self::SearchVaccinationStatus {
                citizen_id: citizen_id.clone(),
            },
            ("/exit", []) => Self::Exit,
            _ => return Err(UsageError),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "/travelRequest 00001 2021-09-01 Greece Italy COVID19".parse(),
            Ok(Command::TravelRequest {
                citizen_id: "00001".into(),
                date: "2021-09-01".into(),
                country_from: "Greece".into(),
                country_to: "Italy".into(),
                virus: "COVID19".into(),
            })
        );
        assert_eq!(
            "/travelStats COVID19 2021-01-01 2021-12-31".parse(),
            Ok(Command::TravelStats {
                virus: "COVID19".into(),
                date_from: "2021-01-01".into(),
                date_to: "2021-12-31".into(),
                country: None,
            })
        );
        assert!(matches!(
            "/travelStats COVID19 2021-01-01 2021-12-31 Greece".parse::<Command>(),
            Ok(Command::TravelStats { country: Some(_), .. })
        ));
        assert_eq!("  /exit  ".parse(), Ok(Command::Exit));
    }

    #[test]
    fn test_usage_errors() {
        for line in [
            "",
            "/travelRequest 00001 2021-09-01 Greece",
            "/travelStats COVID19",
            "/addVaccinationRecords",
            "/searchVaccinationStatus 1 2",
            "/exit now",
            "/listCountries",
            "travelRequest 00001 2021-09-01 Greece Italy COVID19",
        ] {
            assert_eq!(line.parse::<Command>(), Err(UsageError), "{:?}", line);
        }
    }
}
