use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    /// Spinner for open-ended phases (connecting, selecting a phonebook).
    pub fn create_spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }

        let spinner = self.multi_progress.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    }

    /// Bounded bar for the sequential copy loop.
    pub fn create_copy_progress(&self, total: u64, label: &str) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }

        let bar = self.multi_progress.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_message(label.to_string());
        Some(bar)
    }

    pub fn update_progress(&self, bar: &Option<ProgressBar>, position: u64) {
        if let Some(bar) = bar {
            bar.set_position(position);
        }
    }

    pub fn finish_with_message(&self, bar: Option<ProgressBar>, message: &str) {
        if let Some(bar) = bar {
            bar.finish_with_message(message.to_string());
        }
    }

    pub fn abandon_with_message(&self, bar: Option<ProgressBar>, message: &str) {
        if let Some(bar) = bar {
            bar.abandon_with_message(message.to_string());
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
