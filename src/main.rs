use clap::Parser;
use pbapdump::cli::{Cli, OutputFormat};
use pbapdump::ui::{OutputFormatter, OutputMode};
use pbapdump::{Config, PbapDump, PbapDumpError, Result};
use std::process;

fn main() {
    let cli = Cli::parse();

    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
            formatter.print_user_friendly_error(&e);
            exit_code_for_error(&e)
        }
    };

    process::exit(exit_code);
}

fn run(cli: Cli) -> Result<()> {
    if cli.generate_config {
        return generate_sample_config();
    }

    let config = cli.load_config()?;
    let mode = output_mode(&cli.output_format);

    let target_address = cli
        .target_address
        .clone()
        .ok_or_else(|| PbapDumpError::Config {
            message: "A target device address is required".to_string(),
        })?;

    if cli.dry_run {
        return dry_run(&config, &target_address, mode, cli.verbosity_level(), cli.quiet);
    }

    let pipeline = PbapDump::new(config, mode, cli.verbosity_level(), cli.quiet)?;

    pipeline.output().print_header("PBAP Extraction");
    pipeline
        .output()
        .info(&format!("Target device: {}", target_address));

    let report = pipeline.extract_all(&target_address)?;
    pipeline.output().print_run_report(&report);

    Ok(())
}

fn generate_sample_config() -> Result<()> {
    let path = "pbapdump.toml";

    if std::path::Path::new(path).exists() {
        return Err(PbapDumpError::Config {
            message: format!("{} already exists, refusing to overwrite", path),
        });
    }

    std::fs::write(path, Config::create_sample_config())?;

    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.success(&format!("Sample configuration written to {}", path));
    Ok(())
}

/// Shows the resolved plan without spawning a control session.
fn dry_run(
    config: &Config,
    target_address: &str,
    mode: OutputMode,
    verbose: u8,
    quiet: bool,
) -> Result<()> {
    let formatter = OutputFormatter::new(mode, verbose.max(1), quiet);

    formatter.print_header("Dry Run");
    formatter.info(&format!("Target device: {}", target_address));
    formatter.info(&format!(
        "Control program: {}",
        config.session.control_program
    ));
    formatter.info(&format!("Profile: {}", config.session.profile));
    formatter.info(&format!(
        "Contacts directory: /pb (up to {} records)",
        config.session.max_contacts
    ));
    formatter.info(&format!(
        "Call history directory: /ich (up to {} records)",
        config.session.max_call_history
    ));
    formatter.info(&format!("Retry attempts: {}", config.session.max_retries));
    formatter.info(&format!(
        "Working directory: {}",
        config.output.working_dir.display()
    ));
    formatter.info(&format!("Report file: {}", config.output.report_name));

    formatter.print_separator();
    formatter.info("Staging directories that would be scanned:");
    for base in &config.staging.candidate_bases {
        let staging_dir = base.join(&config.staging.staging_subdir);
        let status = if staging_dir.is_dir() {
            "present"
        } else {
            "absent"
        };
        formatter.info(&format!("  {} ({})", staging_dir.display(), status));
    }

    formatter.success("Dry run complete, no session was started");
    Ok(())
}

fn output_mode(format: &OutputFormat) -> OutputMode {
    match format {
        OutputFormat::Human => OutputMode::Human,
        OutputFormat::Json => OutputMode::Json,
        OutputFormat::Plain => OutputMode::Plain,
    }
}

fn exit_code_for_error(error: &PbapDumpError) -> i32 {
    match error {
        PbapDumpError::Config { .. } | PbapDumpError::InvalidAddress { .. } => 2,
        PbapDumpError::Spawn { .. } => 3,
        PbapDumpError::ConnectionFailed { .. } => 4,
        PbapDumpError::DirectorySelectFailed { .. } => 5,
        PbapDumpError::Timeout { .. } => 6,
        PbapDumpError::ChannelClosed => 7,
        PbapDumpError::EmptySession { .. } | PbapDumpError::NoRecordsExtracted { .. } => 8,
        PbapDumpError::Io(_) => 9,
        PbapDumpError::Cancelled => 130,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for_error(&PbapDumpError::Cancelled), 130);
        assert_eq!(
            exit_code_for_error(&PbapDumpError::ConnectionFailed {
                address: "12:34:56:78:90:AB".to_string()
            }),
            4
        );
        assert_eq!(
            exit_code_for_error(&PbapDumpError::NoRecordsExtracted { attempts: 5 }),
            8
        );
        assert_eq!(exit_code_for_error(&PbapDumpError::ChannelClosed), 7);
    }

    #[test]
    fn test_output_mode_mapping() {
        assert!(matches!(
            output_mode(&OutputFormat::Human),
            OutputMode::Human
        ));
        assert!(matches!(output_mode(&OutputFormat::Json), OutputMode::Json));
        assert!(matches!(
            output_mode(&OutputFormat::Plain),
            OutputMode::Plain
        ));
    }
}
