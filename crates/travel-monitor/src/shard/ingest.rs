//! Country directory ingestion.

use std::fs;
use std::path::Path;

use travel_common::{RecordError, RecordLine, TravelError};

use super::ShardStore;

/// What one directory scan did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Ingest every not-yet-seen file in a country directory.
///
/// The directory name is the country name. Files are read in alphabetical
/// order; files already recorded for the country are skipped, as are empty
/// files (left unrecorded so they are picked up once they have content).
/// Rejected lines, including ones that are not valid UTF-8, are logged and
/// dropped. A file that cannot be read is logged and left for a later scan.
pub fn ingest_country_dir(store: &mut ShardStore, dir: &Path) -> Result<IngestReport, TravelError> {
    let country = dir
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| TravelError::Resource(format!("invalid country directory {}", dir.display())))?
        .to_string();

    let entries = fs::read_dir(dir)
        .map_err(|e| TravelError::Resource(format!("cannot open {}: {}", dir.display(), e)))?;

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    files.sort();

    store.claim_country(&country);
    let mut report = IngestReport::default();

    for file in files {
        if store.is_file_ingested(&country, &file) {
            continue;
        }

        let contents = match fs::read(dir.join(&file)) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(country = %country, file = %file, error = %e, "Cannot read record file, skipping");
                continue;
            }
        };
        if contents.iter().all(u8::is_ascii_whitespace) {
            tracing::debug!(country = %country, file = %file, "Skipping empty file");
            continue;
        }

        for raw in contents.split(|&b| b == b'\n') {
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let line = String::from_utf8_lossy(raw);
            let outcome = std::str::from_utf8(raw)
                .map_err(|e| RecordError::Malformed(format!("invalid UTF-8: {}", e)))
                .and_then(RecordLine::parse)
                .and_then(|record| store.insert(record));
            match outcome {
                Ok(()) => report.accepted += 1,
                Err(e) => {
                    report.rejected += 1;
                    tracing::warn!(country = %country, file = %file, "ERROR IN RECORD {}: {}", line.trim(), e);
                }
            }
        }

        store.mark_file_ingested(&country, &file);
        report.files += 1;
    }

    tracing::debug!(
        country = %country,
        files = report.files,
        accepted = report.accepted,
        rejected = report.rejected,
        "Country ingested"
    );

    Ok(report)
}
