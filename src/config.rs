use crate::error::{PbapDumpError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    pub session: SessionConfig,
    pub staging: StagingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Interactive control program driven over stdin/stdout.
    pub control_program: String,
    /// OBEX service profile passed to the connect command.
    pub profile: String,
    pub connect_timeout: u64,
    pub select_timeout: u64,
    /// Per-stage wait for the two-stage transfer acknowledgement.
    pub transfer_timeout: u64,
    pub prompt_timeout: u64,
    pub max_retries: u32,
    /// Hard cap on retained call-history entries pulled from the device.
    pub max_call_history: usize,
    /// Safety limit for the contacts copy loop.
    pub max_contacts: usize,
    /// Grace period between the quit command and force-closing the channel.
    pub quit_delay_ms: u64,
    /// Pause between whole-pipeline retry attempts.
    pub retry_delay: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingConfig {
    /// Subdirectory the control program deposits completed transfers into.
    pub staging_subdir: String,
    /// Base locations probed for the staging subdirectory.
    pub candidate_bases: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub report_name: String,
    pub working_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_program: "obexctl".to_string(),
            profile: "pbap".to_string(),
            connect_timeout: 30,
            select_timeout: 10,
            transfer_timeout: 10,
            prompt_timeout: 5,
            max_retries: 5,
            max_call_history: 20,
            max_contacts: 1000,
            quit_delay_ms: 500,
            retry_delay: 2,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn select_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.select_timeout)
    }

    pub fn transfer_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout)
    }

    pub fn prompt_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout)
    }

    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    pub fn quit_delay_duration(&self) -> Duration {
        Duration::from_millis(self.quit_delay_ms)
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        let mut bases = Vec::new();
        if let Ok(home) = std::env::var("HOME") {
            bases.push(PathBuf::from(home));
        }
        bases.push(PathBuf::from("/var/bluetooth"));
        bases.push(PathBuf::from("/root"));
        bases.push(PathBuf::from("/tmp"));

        Self {
            staging_subdir: "uio".to_string(),
            candidate_bases: bases,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_name: "contacts_and_calls_parsed_merged.txt".to_string(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PbapDumpError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| PbapDumpError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| PbapDumpError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["pbapdump.toml", ".pbapdump.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref program) = cli_args.control_program {
            self.session.control_program = program.clone();
        }

        if let Some(retries) = cli_args.max_retries {
            self.session.max_retries = retries;
        }

        if let Some(max_calls) = cli_args.max_call_history {
            self.session.max_call_history = max_calls;
        }

        if let Some(timeout) = cli_args.transfer_timeout {
            self.session.transfer_timeout = timeout;
        }

        if let Some(timeout) = cli_args.connect_timeout {
            self.session.connect_timeout = timeout;
        }

        if let Some(ref working_dir) = cli_args.working_dir {
            self.output.working_dir = working_dir.clone();
        }

        if let Some(ref report) = cli_args.report_name {
            self.output.report_name = report.clone();
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| PbapDumpError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| PbapDumpError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.control_program.trim().is_empty() {
            return Err(PbapDumpError::Config {
                message: "Control program must not be empty".to_string(),
            });
        }

        if self.session.max_retries == 0 {
            return Err(PbapDumpError::Config {
                message: "Maximum retry count must be greater than 0".to_string(),
            });
        }

        if self.session.max_call_history == 0 || self.session.max_contacts == 0 {
            return Err(PbapDumpError::Config {
                message: "Record-class limits must be greater than 0".to_string(),
            });
        }

        if self.session.connect_timeout == 0 || self.session.transfer_timeout == 0 {
            return Err(PbapDumpError::Config {
                message: "Timeouts must be greater than 0".to_string(),
            });
        }

        if self.staging.candidate_bases.is_empty() {
            return Err(PbapDumpError::Config {
                message: "At least one candidate staging base must be configured".to_string(),
            });
        }

        if self.output.report_name.trim().is_empty() {
            return Err(PbapDumpError::Config {
                message: "Report name must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub control_program: Option<String>,
    pub max_retries: Option<u32>,
    pub max_call_history: Option<usize>,
    pub transfer_timeout: Option<u64>,
    pub connect_timeout: Option<u64>,
    pub working_dir: Option<PathBuf>,
    pub report_name: Option<String>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control_program(mut self, program: Option<String>) -> Self {
        self.control_program = program;
        self
    }

    pub fn with_max_retries(mut self, retries: Option<u32>) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_max_call_history(mut self, max_calls: Option<usize>) -> Self {
        self.max_call_history = max_calls;
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Option<u64>) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<u64>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, working_dir: Option<PathBuf>) -> Self {
        self.working_dir = working_dir;
        self
    }

    pub fn with_report_name(mut self, report_name: Option<String>) -> Self {
        self.report_name = report_name;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.control_program, "obexctl");
        assert_eq!(config.session.profile, "pbap");
        assert_eq!(config.session.max_retries, 5);
        assert_eq!(config.session.max_call_history, 20);
        assert_eq!(config.session.max_contacts, 1000);
        assert_eq!(config.staging.staging_subdir, "uio");
        assert_eq!(
            config.output.report_name,
            "contacts_and_calls_parsed_merged.txt"
        );
    }

    #[test]
    fn test_candidate_bases_include_system_paths() {
        let config = Config::default();
        let bases = &config.staging.candidate_bases;
        assert!(bases.contains(&PathBuf::from("/var/bluetooth")));
        assert!(bases.contains(&PathBuf::from("/tmp")));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.session.max_retries = 0;
        assert!(config.validate().is_err());

        config.session.max_retries = 5;
        config.staging.candidate_bases.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let config = Config::default();
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(
            config.session.connect_timeout,
            loaded_config.session.connect_timeout
        );
        assert_eq!(config.staging.staging_subdir, loaded_config.staging.staging_subdir);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_max_retries(Some(3))
            .with_max_call_history(Some(50))
            .with_control_program(Some("/usr/local/bin/obexctl".to_string()));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.session.max_retries, 3);
        assert_eq!(config.session.max_call_history, 50);
        assert_eq!(config.session.control_program, "/usr/local/bin/obexctl");
    }

    #[test]
    fn test_session_duration_accessors() {
        let session = SessionConfig {
            connect_timeout: 30,
            retry_delay: 2,
            quit_delay_ms: 500,
            ..SessionConfig::default()
        };

        assert_eq!(session.connect_timeout_duration(), Duration::from_secs(30));
        assert_eq!(session.retry_delay_duration(), Duration::from_secs(2));
        assert_eq!(session.quit_delay_duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(!sample.is_empty());
        assert!(sample.contains("[session]"));
        assert!(sample.contains("[staging]"));
        assert!(sample.contains("[output]"));
    }
}
