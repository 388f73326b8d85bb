use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::errors::{AppError, AppResult};
use crate::listing::{ListController, Mutation};
use crate::models::{ImportResult, Participant};

pub const IMPORT_PATH: &str = "/api/confirmands/import";

const EMAIL_COLUMN: usize = 3;
const BIRTH_DATE_COLUMN: usize = 2;
const BIRTH_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Idle,
    FileSelected,
    Importing,
}

#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub new_participants_imported: u64,
    pub rows_skipped: u64,
    /// Records that were not already in the list.
    pub merged: usize,
    pub message: String,
    #[serde(rename = "close_after_ms", serialize_with = "serialize_millis")]
    pub close_after: Duration,
}

fn serialize_millis<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
}

/// Bulk import dialog: `Idle -> FileSelected -> Importing`, back to `Idle`
/// on success or to `FileSelected` (file kept for a retry) on failure.
#[derive(Debug)]
pub struct ImportWidget {
    phase: ImportPhase,
    file: Option<SelectedFile>,
    error: Option<String>,
    success: Option<String>,
    close_delay: Duration,
}

impl ImportWidget {
    pub fn new(close_delay: Duration) -> Self {
        Self {
            phase: ImportPhase::Idle,
            file: None,
            error: None,
            success: None,
            close_delay,
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    pub fn can_submit(&self) -> bool {
        self.phase == ImportPhase::FileSelected
    }

    pub fn select(&mut self, name: impl Into<String>, content: String) -> AppResult<()> {
        if self.phase == ImportPhase::Importing {
            return Err(AppError::Validation("An import is already in progress.".into()));
        }
        self.file = Some(SelectedFile {
            name: name.into(),
            content,
        });
        self.error = None;
        self.success = None;
        self.phase = ImportPhase::FileSelected;
        Ok(())
    }

    /// Reads the whole file into memory and selects it.
    pub async fn select_path(&mut self, path: &Path) -> AppResult<()> {
        let content = tokio::fs::read_to_string(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        self.select(name, content)
    }

    /// Sends the selected file as one request and merges the created
    /// records into `list`. On failure `list` is left untouched.
    pub async fn submit(
        &mut self,
        api: &ApiClient,
        list: &mut ListController<Participant>,
    ) -> AppResult<ImportOutcome> {
        if !self.can_submit() {
            return Err(AppError::Validation("Please select a file to import.".into()));
        }
        let content = match &self.file {
            Some(file) => file.content.clone(),
            None => return Err(AppError::Validation("Please select a file to import.".into())),
        };

        self.phase = ImportPhase::Importing;
        self.error = None;
        self.success = None;

        match api.post_text::<ImportResult>(IMPORT_PATH, content).await {
            Ok(result) => {
                let before = list.len();
                list.settle(Ok(Mutation::Imported(result.imported_records)))?;
                let merged = list.len() - before;
                let message = format!(
                    "Import successful! {} new participants added. {} rows skipped.",
                    result.new_participants_imported, result.rows_skipped
                );
                info!(
                    target: "import",
                    imported = result.new_participants_imported,
                    skipped = result.rows_skipped,
                    merged,
                    "import finished"
                );
                self.success = Some(message.clone());
                self.file = None;
                self.phase = ImportPhase::Idle;
                Ok(ImportOutcome {
                    new_participants_imported: result.new_participants_imported,
                    rows_skipped: result.rows_skipped,
                    merged,
                    message,
                    close_after: self.close_delay,
                })
            }
            Err(err) => {
                let message = err.display_message();
                warn!(target: "import", %message, "import rejected");
                self.error = Some(message);
                self.phase = ImportPhase::FileSelected;
                Err(err)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// 1-based line number in the file, header included.
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TsvPreview {
    pub data_rows: usize,
    pub likely_importable: usize,
    pub issues: Vec<RowIssue>,
}

/// Local dry run of a tab-separated export: header row, birth date in the
/// third column as `DD/MM/YYYY`, email in the fourth. Advisory only; the
/// server makes the final call on every row.
pub fn preview_tsv(content: &str) -> AppResult<TsvPreview> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(content.as_bytes());
    reader
        .headers()
        .map_err(|err| AppError::Parse(format!("unreadable header row: {err}")))?;

    let mut preview = TsvPreview {
        data_rows: 0,
        likely_importable: 0,
        issues: Vec::new(),
    };
    for (index, record) in reader.records().enumerate() {
        preview.data_rows += 1;
        let line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                preview.issues.push(RowIssue {
                    line,
                    reason: format!("unreadable row: {err}"),
                });
                continue;
            }
        };

        let email = record.get(EMAIL_COLUMN).unwrap_or_default().trim();
        if email.is_empty() {
            preview.issues.push(RowIssue {
                line,
                reason: "missing email".into(),
            });
            continue;
        }
        let birth_date = record.get(BIRTH_DATE_COLUMN).unwrap_or_default().trim();
        if NaiveDate::parse_from_str(birth_date, BIRTH_DATE_FORMAT).is_err() {
            preview.issues.push(RowIssue {
                line,
                reason: format!("birth date \"{birth_date}\" is not DD/MM/YYYY"),
            });
            continue;
        }
        preview.likely_importable += 1;
    }
    Ok(preview)
}
