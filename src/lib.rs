pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod session;
pub mod staging;
pub mod ui;
pub mod vcard;

pub use config::Config;
pub use error::{PbapDumpError, Result, UserFriendlyError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use session::{ObexChannel, RecordClass, SessionController, SessionReport};
use staging::TransferRelocator;
use std::path::PathBuf;
use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

/// Outcome of a full extraction run, suitable for JSON output.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub target_address: String,
    pub attempts_used: u32,
    pub contacts_copied: usize,
    pub call_history_copied: usize,
    pub files_relocated: usize,
    pub records_merged: usize,
    pub report_path: PathBuf,
    pub finished_at: DateTime<Utc>,
    pub errors: Vec<String>,
}

/// Top-level pipeline: drive OBEX sessions for both record classes,
/// gather the staged transfers into the working directory, then merge
/// everything into the final report.
pub struct PbapDump {
    config: Config,
    output: OutputFormatter,
    progress: ProgressManager,
    shutdown: GracefulShutdown,
}

impl PbapDump {
    pub fn new(config: Config, mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let progress_enabled = matches!(mode, OutputMode::Human) && !quiet;

        Ok(Self {
            config,
            output: OutputFormatter::new(mode, verbose, quiet),
            progress: ProgressManager::new(progress_enabled),
            shutdown: GracefulShutdown::new()?,
        })
    }

    /// No signal handler; used by tests that construct the pipeline
    /// without touching global process state.
    pub fn new_for_test(config: Config) -> Self {
        Self {
            config,
            output: OutputFormatter::new(OutputMode::Plain, 0, true),
            progress: ProgressManager::new(false),
            shutdown: GracefulShutdown::new_for_test(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output(&self) -> &OutputFormatter {
        &self.output
    }

    /// Runs the whole pipeline against one device. An attempt runs the
    /// contacts session and then the call-history session; the first
    /// attempt in which either class produces files ends the retry loop
    /// and moves on to relocation and merging. The run fails outright
    /// only when every attempt leaves both classes empty.
    pub fn extract_all(&self, target_address: &str) -> Result<RunReport> {
        let mut contacts: Option<SessionReport> = None;
        let mut call_history: Option<SessionReport> = None;
        let mut errors: Vec<String> = Vec::new();
        let mut attempts_used = 0;

        let max_retries = self.config.session.max_retries;

        for attempt in 1..=max_retries {
            self.shutdown.check_shutdown()?;
            attempts_used = attempt;
            self.output.attempt_header(attempt, max_retries);

            match self.run_session(target_address, RecordClass::Contacts) {
                Ok(report) => {
                    self.output.print_session_summary(&report);
                    contacts = Some(report);
                }
                Err(PbapDumpError::Cancelled) => return Err(PbapDumpError::Cancelled),
                Err(e) => {
                    self.output
                        .warning(&format!("Contacts session failed: {}", e));
                    errors.push(format!("attempt {}: contacts: {}", attempt, e));
                }
            }

            self.shutdown.check_shutdown()?;

            match self.run_session(target_address, RecordClass::CallHistory) {
                Ok(report) => {
                    self.output.print_session_summary(&report);
                    call_history = Some(report);
                }
                Err(PbapDumpError::Cancelled) => return Err(PbapDumpError::Cancelled),
                Err(e) => {
                    self.output
                        .warning(&format!("Call history session failed: {}", e));
                    errors.push(format!("attempt {}: call history: {}", attempt, e));
                }
            }

            // One successful class is enough to produce a report.
            if contacts.is_some() || call_history.is_some() {
                break;
            }

            if attempt < max_retries {
                self.output.info(&format!(
                    "Retrying in {} second(s)...",
                    self.config.session.retry_delay
                ));
                std::thread::sleep(self.config.session.retry_delay_duration());
            }
        }

        if contacts.is_none() && call_history.is_none() {
            return Err(PbapDumpError::NoRecordsExtracted {
                attempts: attempts_used,
            });
        }

        self.shutdown.check_shutdown()?;
        self.finalize(target_address, attempts_used, contacts, call_history, errors)
    }

    fn run_session(&self, target_address: &str, class: RecordClass) -> Result<SessionReport> {
        self.output
            .start_operation(&format!("Downloading {} from /{}", class.label(), class.remote_dir()));

        let channel = ObexChannel::spawn(&self.config.session.control_program)?;
        let mut controller = SessionController::new(
            channel,
            &self.config.session,
            target_address,
            &self.config.staging.staging_subdir,
        );

        let bar = self
            .progress
            .create_copy_progress(class.index_bound(&self.config.session) as u64, class.label());
        let callback = |index: usize, _copied: bool| {
            self.progress.update_progress(&bar, index as u64);
        };

        let result = controller.run(class, Some(&callback));

        match &result {
            Ok(report) => self.progress.finish_with_message(
                bar,
                &format!("{}: {} file(s)", class.label(), report.units_copied),
            ),
            Err(_) => self
                .progress
                .abandon_with_message(bar, &format!("{}: failed", class.label())),
        }

        result
    }

    fn finalize(
        &self,
        target_address: &str,
        attempts_used: u32,
        contacts: Option<SessionReport>,
        call_history: Option<SessionReport>,
        mut errors: Vec<String>,
    ) -> Result<RunReport> {
        self.output.start_operation("Gathering downloaded files");

        let spinner = self.progress.create_spinner("Scanning staging directories...");
        let relocator = TransferRelocator::new(
            &self.config.staging,
            self.config.output.working_dir.clone(),
            self.config.session.max_contacts,
            self.config.session.max_call_history,
        );
        let relocation = relocator.relocate();
        self.progress.finish_with_message(
            spinner,
            &format!("{} file(s) gathered", relocation.files_moved),
        );
        self.output.print_relocation_summary(&relocation);
        errors.extend(relocation.errors.iter().cloned());

        self.output.start_operation("Merging records into report");

        let merger = report::ReportMerger::new(
            self.config.output.working_dir.clone(),
            self.config.output.report_name.clone(),
        );
        let merge = merger.merge()?;
        self.output
            .print_merge_summary(&merge, &self.config.output.report_name);
        errors.extend(merge.errors.iter().cloned());

        Ok(RunReport {
            target_address: target_address.to_string(),
            attempts_used,
            contacts_copied: contacts.map(|r| r.units_copied).unwrap_or(0),
            call_history_copied: call_history.map(|r| r.units_copied).unwrap_or(0),
            files_relocated: relocation.files_moved,
            records_merged: merge.records_written,
            report_path: merger.report_path(),
            finished_at: Utc::now(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_construction_for_test() {
        let pipeline = PbapDump::new_for_test(Config::default());
        assert_eq!(pipeline.config().session.control_program, "obexctl");
        assert_eq!(pipeline.config().session.max_retries, 5);
    }

    #[test]
    fn test_no_successful_class_exhausts_retries() {
        let working = tempfile::TempDir::new().unwrap();

        let mut config = Config::default();
        config.session.control_program = "definitely-not-a-real-program-1234".to_string();
        config.session.max_retries = 2;
        config.session.retry_delay = 0;
        config.output.working_dir = working.path().to_path_buf();
        config.staging.candidate_bases = vec![working.path().join("staging")];

        let pipeline = PbapDump::new_for_test(config);
        let result = pipeline.extract_all("12:34:56:78:90:AB");

        assert!(matches!(
            result,
            Err(PbapDumpError::NoRecordsExtracted { attempts: 2 })
        ));
    }

    /// Control-program stand-in: the phonebook listing yields files but
    /// every call-history pull fails.
    #[cfg(unix)]
    fn write_contacts_only_script(dir: &std::path::Path) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-obexctl.sh");
        std::fs::write(
            &path,
            "#!/bin/sh\n\
             echo '#'\n\
             while read line; do\n\
               case \"$line\" in\n\
                 connect*) echo 'Connection successful'; echo '#' ;;\n\
                 cd*) echo 'Select successful'; echo '#' ;;\n\
                 *uio/CALL_*) echo 'Failed to copy'; echo '#' ;;\n\
                 cp*) echo 'Pull successful'; echo 'Status: complete'; echo '#' ;;\n\
                 quit) exit 0 ;;\n\
               esac\n\
             done\n",
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    #[cfg(unix)]
    fn test_one_successful_class_finalizes_on_first_attempt() {
        let working = tempfile::TempDir::new().unwrap();
        let script = write_contacts_only_script(working.path());

        let mut config = Config::default();
        config.session.control_program = script.to_string_lossy().into_owned();
        config.session.max_retries = 3;
        config.session.retry_delay = 0;
        config.session.quit_delay_ms = 0;
        config.session.max_contacts = 2;
        config.output.working_dir = working.path().to_path_buf();
        config.staging.candidate_bases = vec![working.path().join("staging")];

        let pipeline = PbapDump::new_for_test(config);
        let report = pipeline.extract_all("12:34:56:78:90:AB").unwrap();

        // Contacts alone succeeding ends the retry loop: the failing
        // call-history class is not retried on later attempts.
        assert_eq!(report.attempts_used, 1);
        assert_eq!(report.contacts_copied, 2);
        assert_eq!(report.call_history_copied, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("attempt 1"));
    }

    #[test]
    fn test_run_report_serializes() {
        let report = RunReport {
            target_address: "12:34:56:78:90:AB".to_string(),
            attempts_used: 1,
            contacts_copied: 3,
            call_history_copied: 2,
            files_relocated: 5,
            records_merged: 5,
            report_path: PathBuf::from("/tmp/contacts_and_calls_parsed_merged.txt"),
            finished_at: Utc::now(),
            errors: vec![],
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"contacts_copied\":3"));
        assert!(json.contains("12:34:56:78:90:AB"));
    }
}
