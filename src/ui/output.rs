use crate::error::{PbapDumpError, UserFriendlyError};
use crate::report::MergeSummary;
use crate::session::SessionReport;
use crate::staging::RelocationSummary;
use crate::RunReport;
use console::{style, Emoji, Term};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ANTENNA: Emoji = Emoji("📡 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

pub struct OutputFormatter {
    #[allow(dead_code)]
    term: Term,
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let term = Term::stdout();
        let use_colors = match mode {
            OutputMode::Human => term.features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            term,
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ANTENNA, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn attempt_header(&self, attempt: u32, max_attempts: u32) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{}", style("─".repeat(55)).blue());
                    println!(
                        "{}",
                        style(format!("  ATTEMPT {}/{}", attempt, max_attempts))
                            .blue()
                            .bold()
                    );
                    println!("{}", style("─".repeat(55)).blue());
                } else {
                    println!("=== ATTEMPT {}/{} ===", attempt, max_attempts);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "attempt",
                    "attempt": attempt,
                    "max_attempts": max_attempts
                }));
            }
            OutputMode::Plain => {
                println!("=== ATTEMPT {}/{} ===", attempt, max_attempts);
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &PbapDumpError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    println!();
                    if self.use_colors {
                        println!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        println!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    println!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    pub fn print_session_summary(&self, report: &SessionReport) {
        match self.mode {
            OutputMode::Human => {
                self.success(&format!(
                    "Download complete - {} file(s) copied from /{}",
                    report.units_copied,
                    report.class.remote_dir()
                ));
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "session_summary",
                    "class": report.class.label(),
                    "units_attempted": report.units_attempted,
                    "units_copied": report.units_copied,
                }));
            }
            OutputMode::Plain => {
                println!(
                    "SESSION: {} copied {} of {} attempted",
                    report.class.label(),
                    report.units_copied,
                    report.units_attempted
                );
            }
        }
    }

    pub fn print_relocation_summary(&self, summary: &RelocationSummary) {
        for error in &summary.errors {
            self.warning(error);
        }

        if summary.anything_moved() {
            self.success(&format!("Total files moved: {}", summary.files_moved));
            for destination in &summary.moved {
                self.debug(&format!("Relocated: {}", destination.display()));
            }
        } else {
            self.warning("No files found in staging directories");
        }
    }

    pub fn print_merge_summary(&self, summary: &MergeSummary, report_name: &str) {
        for error in &summary.errors {
            self.warning(error);
        }

        if summary.any_written() {
            self.success(&format!(
                "File generated: {} ({} records)",
                report_name, summary.records_written
            ));
        } else {
            self.warning("No working files found for merging");
        }
    }

    pub fn print_run_report(&self, report: &RunReport) {
        match self.mode {
            OutputMode::Human => self.print_human_report(report),
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_report(report),
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_report(&self, report: &RunReport) {
        self.print_header("Extraction Report");

        println!("Target device: {}", report.target_address);
        println!(
            "Completed at: {}",
            report.finished_at.format("%Y-%m-%d %H:%M UTC")
        );
        println!("Attempts used: {}", report.attempts_used);
        println!();
        println!("  Contacts copied:     {}", report.contacts_copied);
        println!("  Call records copied: {}", report.call_history_copied);
        println!("  Files relocated:     {}", report.files_relocated);
        println!("  Records merged:      {}", report.records_merged);
        println!("  Report file:         {}", report.report_path.display());

        if !report.errors.is_empty() {
            println!();
            println!("Issues encountered:");
            for error in &report.errors {
                println!("  - {}", error);
            }
        }
    }

    fn print_plain_report(&self, report: &RunReport) {
        println!("REPORT: Extraction completed");
        println!("Target: {}", report.target_address);
        println!("Contacts: {}", report.contacts_copied);
        println!("Call history: {}", report.call_history_copied);
        println!("Relocated: {}", report.files_relocated);
        println!("Merged: {}", report.records_merged);
        println!("Output: {}", report.report_path.display());

        if !report.errors.is_empty() {
            println!("Errors: {}", report.errors.len());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatter_creation() {
        let formatter = OutputFormatter::new(OutputMode::Human, 1, false);
        assert_eq!(formatter.mode, OutputMode::Human);
        assert_eq!(formatter.verbose_level, 1);
        assert!(!formatter.quiet);
    }

    #[test]
    fn test_quiet_mode_zeroes_verbosity() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(formatter.quiet);
    }

    #[test]
    fn test_json_mode_disables_colors() {
        let formatter = OutputFormatter::new(OutputMode::Json, 0, false);
        assert!(!formatter.use_colors);
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(2));
        assert!(!formatter.should_show_message(3));

        let quiet_formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert!(!quiet_formatter.should_show_message(0));
    }
}
