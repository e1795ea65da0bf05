use std::fs::{File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

/// Number of tries to open a CSV file before giving up.
pub const MAX_CSV_FILE_OPEN_TRIES: u32 = 10;

/// Cap on a single wait between open attempts, in seconds.
pub const MAX_FILE_OPEN_SLEEP_SECS: u64 = 30;

/// Append data rows to a CSV file, writing the header first if the file is
/// empty. The header is never repeated on subsequent appends.
pub fn append_csv_rows(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let file = open_with_retry(path)?;
    let needs_header = file
        .metadata()
        .context(format!("Unable to stat CSV file {:?}", path))?
        .len()
        == 0;

    let mut writer = csv::Writer::from_writer(file);
    if needs_header {
        writer
            .write_record(header)
            .context(format!("Failed to write CSV header to {:?}", path))?;
    }
    for row in rows {
        writer
            .write_record(row)
            .context(format!("Failed to write CSV row to {:?}", path))?;
    }
    writer
        .flush()
        .context(format!("Failed to flush CSV file {:?}", path))?;

    Ok(())
}

/// Open for append with a bounded, doubling backoff capped at
/// `MAX_FILE_OPEN_SLEEP_SECS`.
fn open_with_retry(path: &Path) -> Result<File> {
    let mut backoff = Duration::from_secs(1);
    let mut last_error: Option<std::io::Error> = None;

    for attempt in 0..MAX_CSV_FILE_OPEN_TRIES {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => return Ok(file),
            Err(err) => {
                last_error = Some(err);
                if attempt + 1 < MAX_CSV_FILE_OPEN_TRIES {
                    info!(
                        "Sleeping for {:?} before trying to open CSV file again",
                        backoff
                    );
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_secs(MAX_FILE_OPEN_SLEEP_SECS));
                }
            }
        }
    }

    let error = last_error
        .map(anyhow::Error::new)
        .unwrap_or_else(|| anyhow::anyhow!("no open attempt was made"));
    Err(error.context(format!("Unable to open CSV file for writing: {:?}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_exactly_once_across_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let header = ["site", "value"];

        append_csv_rows(
            &path,
            &header,
            &[vec!["plot_1".to_string(), "10".to_string()]],
        )
        .unwrap();
        append_csv_rows(
            &path,
            &header,
            &[
                vec!["plot_2".to_string(), "20".to_string()],
                vec!["plot_3".to_string(), "30".to_string()],
            ],
        )
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "site,value");
        assert_eq!(lines[1], "plot_1,10");
        assert_eq!(lines[3], "plot_3,30");
        assert_eq!(contents.matches("site,value").count(), 1);
    }

    #[test]
    fn test_empty_row_set_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        append_csv_rows(&path, &["a"], &[]).unwrap();
        assert!(!path.exists());
    }
}
