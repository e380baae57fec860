use crate::error::Result;
use crate::vcard::{Record, VcardParser};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use walkdir::WalkDir;

const NOTE_PREVIEW_LEN: usize = 100;
const SEPARATOR_WIDTH: usize = 30;

const CONTACT_PREFIX: &str = "contact_";
const CALL_HISTORY_PREFIX: &str = "callhist_";

#[derive(Debug, Default)]
pub struct MergeSummary {
    pub records_written: usize,
    pub files_deleted: usize,
    pub errors: Vec<String>,
}

impl MergeSummary {
    pub fn any_written(&self) -> bool {
        self.records_written > 0
    }
}

/// Consumes the class-tagged working files in lexicographic name order,
/// parses each one and appends a rendered block to a single report file,
/// then deletes the consumed inputs.
///
/// Files that cannot be read are skipped with a recorded error and left
/// on disk for a later run.
pub struct ReportMerger {
    working_dir: PathBuf,
    report_name: String,
    parser: VcardParser,
}

impl ReportMerger {
    pub fn new(working_dir: PathBuf, report_name: String) -> Self {
        Self {
            working_dir,
            report_name,
            parser: VcardParser::new(),
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.working_dir.join(&self.report_name)
    }

    /// Merges all working files into the report. With no working files
    /// present this is a no-op: no report is written or touched.
    pub fn merge(&self) -> Result<MergeSummary> {
        let mut summary = MergeSummary::default();

        let working_files = self.collect_working_files();
        if working_files.is_empty() {
            return Ok(summary);
        }

        let report_file = fs::File::create(self.report_path())?;
        let mut out = BufWriter::new(report_file);

        let mut rendered: Vec<PathBuf> = Vec::new();

        for path in &working_files {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    summary
                        .errors
                        .push(format!("Error reading {}: {}", file_name, e));
                    continue;
                }
            };

            let record = self.parser.parse(&content);
            let is_call_history = file_name.starts_with(CALL_HISTORY_PREFIX);

            render_block(
                &mut out,
                summary.records_written + 1,
                &file_name,
                &record,
                is_call_history,
            )?;

            summary.records_written += 1;
            rendered.push(path.clone());
        }

        out.flush()?;

        for path in rendered {
            match fs::remove_file(&path) {
                Ok(()) => summary.files_deleted += 1,
                Err(e) => summary
                    .errors
                    .push(format!("Error deleting {}: {}", path.display(), e)),
            }
        }

        Ok(summary)
    }

    /// Working files of either class, sorted lexicographically by name.
    /// Block order in the report equals this order.
    fn collect_working_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.working_dir)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(is_working_file_name)
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect();

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        files
    }
}

fn is_working_file_name(name: &str) -> bool {
    name.ends_with(".vcf")
        && (name.starts_with(CONTACT_PREFIX) || name.starts_with(CALL_HISTORY_PREFIX))
}

fn render_block<W: Write>(
    out: &mut W,
    ordinal: usize,
    file_name: &str,
    record: &Record,
    is_call_history: bool,
) -> std::io::Result<()> {
    let class_label = if is_call_history {
        "CALL HISTORY"
    } else {
        "CONTACT"
    };
    writeln!(out, "*** {} {} ({}) ***", class_label, ordinal, file_name)?;

    if is_call_history {
        writeln!(
            out,
            "TYPE D'APPEL : {}",
            record.call_type.as_deref().unwrap_or("N/A")
        )?;
        writeln!(
            out,
            "DATE D'APPEL : {}",
            record.call_date.as_deref().unwrap_or("N/A")
        )?;
    }

    writeln!(out, "NOM : {}", record.name)?;
    writeln!(out, "TÉLÉPHONES : {}", join_or_na(&record.phones))?;
    writeln!(out, "EMAILS : {}", join_or_na(&record.emails))?;

    let mut secondary: Vec<String> = Vec::new();
    if let Some(ref organization) = record.organization {
        secondary.push(format!("Organisation: {}", organization));
    }
    if let Some(ref title) = record.title {
        secondary.push(format!("Titre/Poste: {}", title));
    }
    if let Some(ref birthday) = record.birthday {
        secondary.push(format!("Date de Naissance: {}", birthday));
    }
    if !record.addresses.is_empty() {
        secondary.push(format!("Adresse(s): {}", record.addresses.join("; ")));
    }
    if let Some(ref note) = record.note {
        secondary.push(format!("Note: {}", preview_note(note)));
    }

    if secondary.is_empty() {
        writeln!(out, "AUTRES INFOS : N/A")?;
    } else {
        writeln!(out, "AUTRES INFOS :")?;
        for info in secondary {
            writeln!(out, "  - {}", info)?;
        }
    }

    writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))?;
    writeln!(out)?;

    Ok(())
}

fn join_or_na(values: &[String]) -> String {
    if values.is_empty() {
        "N/A".to_string()
    } else {
        values.join(", ")
    }
}

/// Note text flattened to one line and truncated to a bounded preview.
fn preview_note(note: &str) -> String {
    let flattened = note.replace(['\r', '\n'], " ").trim().to_string();

    if flattened.chars().count() > NOTE_PREVIEW_LEN {
        let prefix: String = flattened.chars().take(NOTE_PREVIEW_LEN).collect();
        format!("{}...", prefix)
    } else {
        flattened
    }
}
