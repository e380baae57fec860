use crate::config::SessionConfig;
use crate::error::{PbapDumpError, Result};
use crate::session::channel::{ControlChannel, MarkerSet, MatchOutcome};

// Response markers emitted by the control program, matched as literal
// case-sensitive substrings.
const PROMPT: &str = "#";
const CONNECT_SUCCESS: &str = "Connection successful";
const CONNECT_FAILURE: &str = "Failed to connect";
const SELECT_SUCCESS: &str = "Select successful";
const PULL_SUCCESS: &str = "Pull successful";
const PULL_FAILURE: &str = "Failed to copy";
const GENERIC_ERROR: &str = "Error";
const STATUS_COMPLETE: &str = "Status: complete";
const STATUS_ERROR: &str = "Status: error";

/// The two remote listings this tool knows how to pull. Class-specific
/// behavior (remote directory, bounds, staged naming) lives here so a
/// third record class only needs a new variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    Contacts,
    CallHistory,
}

impl RecordClass {
    pub fn remote_dir(&self) -> &'static str {
        match self {
            RecordClass::Contacts => "pb",
            RecordClass::CallHistory => "ich",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordClass::Contacts => "contacts",
            RecordClass::CallHistory => "call history",
        }
    }

    pub fn index_bound(&self, config: &SessionConfig) -> usize {
        match self {
            RecordClass::Contacts => config.max_contacts,
            RecordClass::CallHistory => config.max_call_history,
        }
    }

    pub fn safety_limit(&self, config: &SessionConfig) -> usize {
        self.index_bound(config)
    }

    /// Remote source name for one numbered record.
    pub fn source_name(&self, index: usize) -> String {
        format!("{}.vcf", index)
    }

    /// Staged destination name. Call-history files get a distinguishing
    /// prefix so they cannot collide with contact files in the shared
    /// staging area.
    pub fn staged_destination(&self, staging_subdir: &str, index: usize) -> String {
        match self {
            RecordClass::Contacts => format!("{}/{}.vcf", staging_subdir, index),
            RecordClass::CallHistory => format!("{}/CALL_{}.vcf", staging_subdir, index),
        }
    }

    /// Working-file prefix the relocator renames staged files to.
    pub fn working_prefix(&self) -> &'static str {
        match self {
            RecordClass::Contacts => "contact",
            RecordClass::CallHistory => "callhist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    SelectingDirectory,
    DirectorySelected,
    Copying,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub class: RecordClass,
    pub units_attempted: usize,
    pub units_copied: usize,
}

/// Drives one interactive control-channel session end-to-end for one
/// record class: connect, select the remote directory, then pull numbered
/// records sequentially until the listing ends or a bound is hit.
///
/// The controller never touches the staging filesystem; it only trusts
/// the protocol-level completion markers.
pub struct SessionController<'a, C: ControlChannel> {
    channel: C,
    config: &'a SessionConfig,
    target_address: &'a str,
    staging_subdir: &'a str,
    state: SessionState,
}

impl<'a, C: ControlChannel> SessionController<'a, C> {
    pub fn new(
        channel: C,
        config: &'a SessionConfig,
        target_address: &'a str,
        staging_subdir: &'a str,
    ) -> Self {
        Self {
            channel,
            config,
            target_address,
            staging_subdir,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the full session. Returns the report on success (at least one
    /// unit copied); any terminal failure tears the channel down first.
    pub fn run(
        &mut self,
        class: RecordClass,
        progress_callback: Option<&dyn Fn(usize, bool)>,
    ) -> Result<SessionReport> {
        let result = self.run_inner(class, progress_callback);

        match result {
            Ok(report) => {
                self.state = SessionState::Completed;
                Ok(report)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                self.channel.close();
                Err(e)
            }
        }
    }

    fn run_inner(
        &mut self,
        class: RecordClass,
        progress_callback: Option<&dyn Fn(usize, bool)>,
    ) -> Result<SessionReport> {
        self.connect()?;
        self.select_directory(class)?;

        self.state = SessionState::Copying;
        let report = self.copy_sequential(class, progress_callback);

        if report.units_copied > 0 {
            // Polite teardown; the channel may already be gone, which is
            // fine at this point.
            let _ = self.channel.send_line("quit");
            std::thread::sleep(self.config.quit_delay_duration());
            self.channel.close();
            Ok(report)
        } else {
            self.channel.close();
            Err(PbapDumpError::EmptySession {
                directory: class.remote_dir().to_string(),
            })
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.state = SessionState::Connecting;

        let prompt = MarkerSet::new(&[PROMPT]);
        match self.channel.expect(&prompt, self.config.connect_timeout_duration()) {
            MatchOutcome::Marker(_) => {}
            MatchOutcome::Timeout => {
                return Err(PbapDumpError::Timeout {
                    seconds: self.config.connect_timeout,
                })
            }
            MatchOutcome::Closed => return Err(PbapDumpError::ChannelClosed),
        }

        self.channel.send_line(&format!(
            "connect {} {}",
            self.target_address, self.config.profile
        ))?;

        let outcomes = MarkerSet::new(&[CONNECT_SUCCESS, CONNECT_FAILURE]);
        match self.channel.expect(&outcomes, self.config.connect_timeout_duration()) {
            MatchOutcome::Marker(0) => {}
            MatchOutcome::Marker(_) | MatchOutcome::Timeout => {
                return Err(PbapDumpError::ConnectionFailed {
                    address: self.target_address.to_string(),
                });
            }
            MatchOutcome::Closed => return Err(PbapDumpError::ChannelClosed),
        }

        self.state = SessionState::Connected;
        self.expect_prompt_strict()?;
        Ok(())
    }

    fn select_directory(&mut self, class: RecordClass) -> Result<()> {
        self.state = SessionState::SelectingDirectory;

        self.channel
            .send_line(&format!("cd {}", class.remote_dir()))?;

        let outcomes = MarkerSet::new(&[SELECT_SUCCESS]);
        match self.channel.expect(&outcomes, self.config.select_timeout_duration()) {
            MatchOutcome::Marker(_) => {}
            MatchOutcome::Timeout => {
                return Err(PbapDumpError::DirectorySelectFailed {
                    directory: class.remote_dir().to_string(),
                });
            }
            MatchOutcome::Closed => return Err(PbapDumpError::ChannelClosed),
        }

        self.expect_prompt_strict()?;
        self.state = SessionState::DirectorySelected;
        Ok(())
    }

    /// Sequential copy loop. A failed unit means end-of-listing, not a
    /// hard error; the loop also stops at the class safety limit.
    fn copy_sequential(
        &mut self,
        class: RecordClass,
        progress_callback: Option<&dyn Fn(usize, bool)>,
    ) -> SessionReport {
        let index_bound = class.index_bound(self.config);
        let safety_limit = class.safety_limit(self.config);
        let staging_subdir = self.staging_subdir;

        let mut units_attempted = 0;
        let mut units_copied = 0;

        for index in 1..=index_bound {
            let source = class.source_name(index);
            let destination = class.staged_destination(staging_subdir, index);

            units_attempted += 1;

            if self
                .channel
                .send_line(&format!("cp {} {}", source, destination))
                .is_err()
            {
                // Channel died mid-loop; whatever was copied so far still
                // counts.
                break;
            }

            let copied = self.wait_transfer();
            if let Some(callback) = progress_callback {
                callback(index, copied);
            }

            if copied {
                units_copied += 1;
            } else {
                // Remote listings are contiguous: the first failed pull
                // marks the end of the listing.
                break;
            }

            self.resync_prompt();

            if units_copied >= safety_limit {
                break;
            }
        }

        SessionReport {
            class,
            units_attempted,
            units_copied,
        }
    }

    /// Two-stage completion wait: a pull-outcome marker, then a status
    /// marker. Both stages must signal success for the unit to count;
    /// timeout at either stage fails the unit.
    fn wait_transfer(&mut self) -> bool {
        let pull = MarkerSet::new(&[PULL_SUCCESS, PULL_FAILURE, GENERIC_ERROR]);
        if !self
            .channel
            .expect(&pull, self.config.transfer_timeout_duration())
            .is_marker(0)
        {
            return false;
        }

        let status = MarkerSet::new(&[STATUS_COMPLETE, STATUS_ERROR]);
        self.channel
            .expect(&status, self.config.transfer_timeout_duration())
            .is_marker(0)
    }

    /// Prompt resynchronization between copy attempts. A missing prompt
    /// alone never fails the unit.
    fn resync_prompt(&mut self) {
        let prompt = MarkerSet::new(&[PROMPT]);
        let _ = self.channel.expect(&prompt, self.config.prompt_timeout_duration());
    }

    fn expect_prompt_strict(&mut self) -> Result<()> {
        let prompt = MarkerSet::new(&[PROMPT]);
        match self.channel.expect(&prompt, self.config.prompt_timeout_duration()) {
            MatchOutcome::Marker(_) => Ok(()),
            MatchOutcome::Timeout => Err(PbapDumpError::Timeout {
                seconds: self.config.prompt_timeout,
            }),
            MatchOutcome::Closed => Err(PbapDumpError::ChannelClosed),
        }
    }
}
