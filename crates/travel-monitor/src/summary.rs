//! Plain-text exit summaries.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use travel_common::Tally;
use travel_common::constants::SUMMARY_FILE_PREFIX;

/// Render a summary: one country per line, then the travel totals.
pub fn render<'a>(countries: impl IntoIterator<Item = &'a str>, tally: Tally) -> String {
    let mut countries: Vec<&str> = countries.into_iter().collect();
    countries.sort_unstable();
    countries.dedup();

    let mut out = String::new();
    for country in countries {
        let _ = writeln!(out, "{}", country);
    }
    let _ = writeln!(out, "TOTAL TRAVEL REQUESTS {}", tally.total());
    let _ = writeln!(out, "ACCEPTED {}", tally.accepted);
    let _ = writeln!(out, "REJECTED {}", tally.rejected);
    out
}

/// Path of the summary file for a process
pub fn summary_path(log_dir: &Path, pid: u32) -> PathBuf {
    log_dir.join(format!("{}.{}.txt", SUMMARY_FILE_PREFIX, pid))
}

/// Write `log_file.<pid>.txt` into `log_dir`, creating the directory if needed.
pub async fn write<'a>(
    log_dir: &Path,
    pid: u32,
    countries: impl IntoIterator<Item = &'a str>,
    tally: Tally,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(log_dir).await?;
    let path = summary_path(log_dir, pid);
    tokio::fs::write(&path, render(countries, tally)).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sorts_countries() {
        let text = render(
            ["Spain", "Greece", "Italy"],
            Tally {
                accepted: 2,
                rejected: 1,
            },
        );
        assert_eq!(
            text,
            "Greece\nItaly\nSpain\nTOTAL TRAVEL REQUESTS 3\nACCEPTED 2\nREJECTED 1\n"
        );
    }

    #[tokio::test]
    async fn test_write_creates_log_dir() {
        let root = tempfile::tempdir().unwrap();
        let log_dir = root.path().join("logs");

        let path = write(&log_dir, 4242, ["Greece"], Tally::default()).await.unwrap();

        assert_eq!(path, log_dir.join("log_file.4242.txt"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("Greece\nTOTAL TRAVEL REQUESTS 0\n"));
    }
}
