use crate::config::{CliOverrides, Config};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pbapdump")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract phonebook and call-history records over Bluetooth OBEX/PBAP")]
#[command(
    long_about = "pbapdump drives an obexctl session against a paired Bluetooth device, \
                  pulls the phonebook (pb) and incoming-call history (ich) listings, and \
                  merges the retrieved vCards into a single text report.\n\n\
                  Only use this tool against devices you own or are explicitly authorized \
                  to assess."
)]
#[command(after_help = "EXAMPLES:\n  \
    pbapdump 12:34:56:78:90:AB\n  \
    pbapdump 12-34-56-78-90-ab --retries 3 --verbose\n  \
    pbapdump 12:34:56:78:90:AB --max-calls 50 --report calls.txt\n  \
    pbapdump 12:34:56:78:90:AB --config my-config.toml --output-format json")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Target device address (e.g. 12:34:56:78:90:AB)
    #[arg(value_parser = validate_device_address, required_unless_present = "generate_config")]
    pub target_address: Option<String>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Control program to drive (defaults to obexctl)
    #[arg(long)]
    pub control_program: Option<String>,

    /// Maximum whole-pipeline retry attempts
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Maximum call-history entries to pull
    #[arg(long, help = "Upper bound on retained call-history records")]
    pub max_calls: Option<usize>,

    /// Connection acknowledgement timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Per-stage transfer acknowledgement timeout in seconds
    #[arg(long)]
    pub transfer_timeout: Option<u64>,

    /// Directory where working files and the report are placed
    #[arg(short, long)]
    pub working_dir: Option<PathBuf>,

    /// Report file name
    #[arg(long, help = "Name of the merged report file")]
    pub report: Option<String>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be done without spawning a session)
    #[arg(long, help = "Validate the target and show the plan without connecting")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_control_program(self.control_program.clone())
            .with_max_retries(self.retries)
            .with_max_call_history(self.max_calls)
            .with_connect_timeout(self.connect_timeout)
            .with_transfer_timeout(self.transfer_timeout)
            .with_working_dir(self.working_dir.clone())
            .with_report_name(self.report.clone())
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose > 0 && !self.quiet
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

/// Validates a six-octet hexadecimal device address and normalizes it to
/// colon-separated uppercase form.
pub fn validate_device_address(s: &str) -> std::result::Result<String, String> {
    let trimmed = s.trim();

    let separator = if trimmed.contains(':') {
        ':'
    } else if trimmed.contains('-') {
        '-'
    } else {
        return Err(
            "Address must use ':' or '-' separators (e.g. 12:34:56:78:90:AB)".to_string(),
        );
    };

    let octets: Vec<&str> = trimmed.split(separator).collect();
    if octets.len() != 6 {
        return Err(format!(
            "Address must contain exactly 6 octets, found {}",
            octets.len()
        ));
    }

    for octet in &octets {
        if octet.len() != 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "Invalid octet '{}': each octet must be two hexadecimal digits",
                octet
            ));
        }
    }

    Ok(octets
        .iter()
        .map(|o| o.to_uppercase())
        .collect::<Vec<_>>()
        .join(":"))
}
