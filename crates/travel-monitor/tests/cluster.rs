//! Coordinator against real worker processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tempfile::TempDir;
use travel_common::{RejectReason, TravelError, TravelOutcome, VaccinationStatus};
use travel_monitor::session::execute;
use travel_monitor::{AppConfig, Command, Coordinator};

fn input_tree() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("input");

    let greece = input.join("Greece");
    fs::create_dir_all(&greece).unwrap();
    fs::write(
        greece.join("a.txt"),
        "00001 Jane Doe Greece 30 COVID19 YES 2021-05-01\n\
         00002 John Roe Greece 52 COVID19 NO\n\
         00003 Mary Major Greece 44 H1N1 YES 15-03-2021\n",
    )
    .unwrap();
    fs::write(
        greece.join("b.txt"),
        "00001 Jane Doe Greece 31 H1N1 NO\n\
         00002 John Roe Greece 52 COVID19 YES 2021-06-01\n",
    )
    .unwrap();

    let italy = input.join("Italy");
    fs::create_dir_all(&italy).unwrap();
    fs::write(italy.join("a.txt"), "00010 Luca Rossi Italy 28 COVID19 YES 2021-08-10\n").unwrap();

    let spain = input.join("Spain");
    fs::create_dir_all(&spain).unwrap();
    fs::write(spain.join("a.txt"), "00020 Ana Ruiz Spain 35 COVID19 NO\n").unwrap();

    root
}

fn config(root: &Path, workers: usize) -> AppConfig {
    AppConfig {
        num_workers: workers,
        buffer_size: 64,
        bloom_size: 1024,
        input_dir: root.join("input"),
        log_dir: root.join("logs"),
        worker_program: Some(PathBuf::from(env!("CARGO_BIN_EXE_travel-monitor"))),
        shutdown_grace_ms: 5000,
        log_level: "warn".to_string(),
        json_logs: false,
    }
}

async fn start(root: &Path, workers: usize) -> Coordinator {
    Coordinator::start(config(root, workers)).await.unwrap()
}

#[tokio::test]
async fn test_travel_request_window() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 2).await;

    let accepted = coordinator
        .travel_request("00001", "2021-09-01", "Greece", "Greece", "COVID19")
        .await
        .unwrap();
    assert_eq!(accepted, TravelOutcome::Accepted);

    let expired = coordinator
        .travel_request("00001", "2022-01-01", "Greece", "Greece", "COVID19")
        .await
        .unwrap();
    assert_eq!(expired, TravelOutcome::Rejected(RejectReason::VaccinationExpired));

    let early = coordinator
        .travel_request("00001", "2021-04-01", "Greece", "Greece", "COVID19")
        .await
        .unwrap();
    assert_eq!(early, TravelOutcome::Rejected(RejectReason::VaccinatedAfterTravel));

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_bloom_negative_skips_worker() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 2).await;
    let owner = coordinator.shard_map().owner("Greece").unwrap();

    let outcome = coordinator
        .travel_request("00002", "2021-09-01", "Greece", "Italy", "COVID19")
        .await
        .unwrap();
    assert_eq!(outcome, TravelOutcome::Rejected(RejectReason::NotVaccinated));
    assert_eq!(coordinator.worker(owner).unwrap().vacc_queries(), 0);

    coordinator
        .travel_request("00001", "2021-09-01", "Greece", "Italy", "COVID19")
        .await
        .unwrap();
    assert_eq!(coordinator.worker(owner).unwrap().vacc_queries(), 1);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_outcome_recorded_against_destination() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 2).await;

    coordinator
        .travel_request("00001", "2021-09-01", "Greece", "Italy", "COVID19")
        .await
        .unwrap();
    coordinator
        .travel_request("00010", "2021-09-01", "Italy", "Spain", "COVID19")
        .await
        .unwrap();
    coordinator
        .travel_request("00020", "2021-10-01", "Spain", "Spain", "COVID19")
        .await
        .unwrap();

    let range = ("2021-01-01", "2021-12-31");
    let italy = coordinator.travel_stats("COVID19", range.0, range.1, Some("Italy")).unwrap();
    let spain = coordinator.travel_stats("COVID19", range.0, range.1, Some("Spain")).unwrap();
    let greece = coordinator.travel_stats("COVID19", range.0, range.1, Some("Greece")).unwrap();
    let all = coordinator.travel_stats("COVID19", range.0, range.1, None).unwrap();

    assert_eq!(italy.total(), 1);
    assert_eq!(italy.accepted, 1);
    assert_eq!(spain.total(), 2);
    assert_eq!(spain.rejected, 1);
    assert_eq!(greece.total(), 0);
    assert_eq!(all.total(), italy.total() + spain.total() + greece.total());
    assert_eq!(coordinator.totals().total(), 3);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_argument_errors_have_no_side_effects() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 2).await;

    let err = coordinator
        .travel_request("00001", "2021-09-01", "Atlantis", "Greece", "COVID19")
        .await
        .unwrap_err();
    assert!(matches!(err, TravelError::UnknownCountry(_)));

    let err = coordinator
        .travel_request("00001", "2021-09-01", "Greece", "Greece", "EBOLA")
        .await
        .unwrap_err();
    assert!(matches!(err, TravelError::VirusNotTracked { .. }));

    let err = coordinator
        .travel_request("1234567", "2021-09-01", "Greece", "Greece", "COVID19")
        .await
        .unwrap_err();
    assert!(matches!(err, TravelError::InvalidCitizenId(_)));

    let err = coordinator
        .travel_request("00001", "2021-02-30", "Greece", "Greece", "COVID19")
        .await
        .unwrap_err();
    assert!(matches!(err, TravelError::InvalidDate(_)));

    let err = coordinator
        .travel_stats("COVID19", "2021-12-31", "2021-01-01", None)
        .unwrap_err();
    assert!(matches!(err, TravelError::InvalidDateRange { .. }));

    assert_eq!(coordinator.totals().total(), 0);
    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_search_vaccination_status() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 3).await;

    assert!(coordinator.search_vaccination_status("99999").await.unwrap().is_none());

    // The conflicting line with age 31 was rejected at ingestion
    let report = coordinator.search_vaccination_status("00001").await.unwrap().unwrap();
    assert_eq!(report.citizen.age, 30);
    assert_eq!(report.citizen.country, "Greece");
    assert_eq!(report.vaccinations.len(), 1);
    assert_eq!(report.vaccinations[0].0, "COVID19");

    // The duplicate YES line was rejected; the original NO stands
    let report = coordinator.search_vaccination_status("00002").await.unwrap().unwrap();
    assert_eq!(
        report.vaccinations,
        vec![("COVID19".to_string(), VaccinationStatus::NotVaccinated)]
    );

    let text = execute(
        &mut coordinator,
        Command::SearchVaccinationStatus {
            citizen_id: "99999".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(text, "CitizenID : 99999 does not exist in database");

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_add_vaccination_records_refreshes_filters() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 2).await;
    let owner = coordinator.shard_map().owner("Spain").unwrap();

    let err = coordinator
        .travel_request("00021", "2021-09-01", "Spain", "Spain", "SARS")
        .await
        .unwrap_err();
    assert!(matches!(err, TravelError::VirusNotTracked { .. }));

    fs::write(
        root.path().join("input/Spain/b.txt"),
        "00021 Pablo Gil Spain 61 SARS YES 2021-08-01\n",
    )
    .unwrap();

    let filters = coordinator.add_vaccination_records("Spain").await.unwrap();
    assert!(filters >= 2);
    assert!(coordinator.worker(owner).unwrap().bloom("SARS").is_some());

    let outcome = coordinator
        .travel_request("00021", "2021-09-01", "Spain", "Spain", "SARS")
        .await
        .unwrap();
    assert_eq!(outcome, TravelOutcome::Accepted);

    // Nothing new: same filters, no duplicates ingested
    assert_eq!(coordinator.add_vaccination_records("Spain").await.unwrap(), filters);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_fewer_countries_than_workers() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 8).await;

    assert_eq!(coordinator.workers().len(), 3);
    for country in ["Greece", "Italy", "Spain"] {
        assert!(coordinator.shard_map().owner(country).is_some());
    }

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_killed_worker_is_replaced() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 2).await;
    let owner = coordinator.shard_map().owner("Greece").unwrap();
    let old_pid = coordinator.worker(owner).unwrap().pid().unwrap();

    kill(Pid::from_raw(old_pid as i32), Signal::SIGKILL).unwrap();

    let mut replaced = 0;
    for _ in 0..100 {
        replaced += coordinator.replace_exited_workers().await;
        if replaced > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(replaced, 1);

    let handle = coordinator.worker(owner).unwrap();
    assert_ne!(handle.pid(), Some(old_pid));
    assert!(handle.bloom("COVID19").is_some());

    // Same answers from the rebuilt shard
    let outcome = coordinator
        .travel_request("00001", "2021-09-01", "Greece", "Greece", "COVID19")
        .await
        .unwrap();
    assert_eq!(outcome, TravelOutcome::Accepted);

    let report = coordinator.search_vaccination_status("00003").await.unwrap().unwrap();
    assert!(report.vaccinations[0].1.is_vaccinated());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_writes_summaries() {
    let root = input_tree();
    let mut coordinator = start(root.path(), 2).await;

    coordinator
        .travel_request("00001", "2021-09-01", "Greece", "Italy", "COVID19")
        .await
        .unwrap();
    coordinator
        .travel_request("00002", "2021-09-01", "Greece", "Italy", "COVID19")
        .await
        .unwrap();

    let path = coordinator.shutdown().await.unwrap();
    let text = fs::read_to_string(path).unwrap();
    assert_eq!(
        text,
        "Greece\nItaly\nSpain\nTOTAL TRAVEL REQUESTS 2\nACCEPTED 1\nREJECTED 1\n"
    );

    let summaries = fs::read_dir(root.path().join("logs"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("log_file."))
        .count();
    assert_eq!(summaries, 3);
}

#[tokio::test]
async fn test_failed_bootstrap_still_writes_summary() {
    let root = input_tree();
    let config = AppConfig {
        worker_program: Some(root.path().join("no-such-worker")),
        ..config(root.path(), 2)
    };

    assert!(Coordinator::start(config).await.is_err());

    let path = root.path().join(format!("logs/log_file.{}.txt", std::process::id()));
    let text = fs::read_to_string(path).unwrap();
    assert_eq!(
        text,
        "Greece\nItaly\nSpain\nTOTAL TRAVEL REQUESTS 0\nACCEPTED 0\nREJECTED 0\n"
    );
}
