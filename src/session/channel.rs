use crate::error::{PbapDumpError, Result};
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Ordered list of literal response markers to wait for.
///
/// The state machine only ever deals in marker indices, so the matching
/// strategy (currently exact substrings) can change without touching it.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    markers: Vec<String>,
}

impl MarkerSet {
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Self {
        Self {
            markers: markers.iter().map(|m| m.as_ref().to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Finds the marker matching earliest in `haystack`. Ties between
    /// markers at the same position go to the lower index.
    pub fn find(&self, haystack: &str) -> Option<MarkerHit> {
        let mut best: Option<MarkerHit> = None;

        for (index, marker) in self.markers.iter().enumerate() {
            if let Some(start) = haystack.find(marker.as_str()) {
                let hit = MarkerHit {
                    index,
                    end: start + marker.len(),
                    start,
                };
                match best {
                    Some(ref b) if b.start <= hit.start => {}
                    _ => best = Some(hit),
                }
            }
        }

        best
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarkerHit {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

/// Result of one bounded wait on the channel. Timeout is an outcome, not
/// an error: the caller classifies it against the current protocol stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Index into the supplied `MarkerSet`.
    Marker(usize),
    Timeout,
    Closed,
}

impl MatchOutcome {
    pub fn is_marker(&self, index: usize) -> bool {
        matches!(self, MatchOutcome::Marker(i) if *i == index)
    }
}

/// Line-oriented interactive channel to the external control program.
pub trait ControlChannel {
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Waits until one of `markers` appears in the output stream, the
    /// timeout elapses, or the channel closes. Consumed output up to and
    /// including the matched marker is discarded.
    fn expect(&mut self, markers: &MarkerSet, timeout: Duration) -> MatchOutcome;

    /// Force-closes the channel. Safe to call more than once.
    fn close(&mut self);
}

/// Real channel implementation spawning the control program with piped
/// stdio. A reader thread drains stdout into an mpsc queue so waits can
/// be bounded with `recv_timeout`.
pub struct ObexChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    receiver: Receiver<String>,
    pending: String,
    reader: Option<JoinHandle<()>>,
}

impl ObexChannel {
    pub fn spawn(program: &str) -> Result<Self> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PbapDumpError::Spawn {
                program: program.to_string(),
                source: e,
            })?;

        let stdin = child.stdin.take().ok_or(PbapDumpError::ChannelClosed)?;
        let mut stdout = child.stdout.take().ok_or(PbapDumpError::ChannelClosed)?;

        let (sender, receiver) = mpsc::channel();
        let reader = thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            loop {
                match stdout.read(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buffer[..n]).into_owned();
                        if sender.send(chunk).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            receiver,
            pending: String::new(),
            reader: Some(reader),
        })
    }
}

impl ControlChannel for ObexChannel {
    fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(PbapDumpError::ChannelClosed)?;
        stdin
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|_| PbapDumpError::ChannelClosed)
    }

    fn expect(&mut self, markers: &MarkerSet, timeout: Duration) -> MatchOutcome {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(hit) = markers.find(&self.pending) {
                self.pending.drain(..hit.end);
                return MatchOutcome::Marker(hit.index);
            }

            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => return MatchOutcome::Timeout,
            };

            match self.receiver.recv_timeout(remaining) {
                Ok(chunk) => self.pending.push_str(&chunk),
                Err(RecvTimeoutError::Timeout) => return MatchOutcome::Timeout,
                Err(RecvTimeoutError::Disconnected) => return MatchOutcome::Closed,
            }
        }
    }

    fn close(&mut self) {
        // Dropping stdin signals EOF to the child before the kill.
        self.stdin.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for ObexChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_set_earliest_match_wins() {
        let markers = MarkerSet::new(&["beta", "alpha"]);
        let hit = markers.find("...alpha...beta...").unwrap();
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn test_marker_set_tie_goes_to_lower_index() {
        let markers = MarkerSet::new(&["Error", "Err"]);
        let hit = markers.find("xx Error yy").unwrap();
        assert_eq!(hit.index, 0);
    }

    #[test]
    fn test_marker_set_no_match() {
        let markers = MarkerSet::new(&["Connection successful"]);
        assert!(markers.find("Failed to connect").is_none());
    }

    #[test]
    fn test_obex_channel_echo_roundtrip() {
        let mut channel = ObexChannel::spawn("cat").unwrap();
        channel.send_line("Pull successful").unwrap();

        let markers = MarkerSet::new(&["Pull successful", "Failed to copy"]);
        let outcome = channel.expect(&markers, Duration::from_secs(5));
        assert_eq!(outcome, MatchOutcome::Marker(0));

        channel.close();
    }

    #[test]
    fn test_obex_channel_consumes_matched_output() {
        let mut channel = ObexChannel::spawn("cat").unwrap();
        channel.send_line("first second").unwrap();

        let markers = MarkerSet::new(&["first"]);
        assert_eq!(
            channel.expect(&markers, Duration::from_secs(5)),
            MatchOutcome::Marker(0)
        );

        // "first" was drained; only "second" remains in the buffer.
        let markers = MarkerSet::new(&["first", "second"]);
        assert_eq!(
            channel.expect(&markers, Duration::from_secs(5)),
            MatchOutcome::Marker(1)
        );

        channel.close();
    }

    #[test]
    fn test_obex_channel_timeout() {
        let mut channel = ObexChannel::spawn("cat").unwrap();

        let markers = MarkerSet::new(&["never appears"]);
        let outcome = channel.expect(&markers, Duration::from_millis(100));
        assert_eq!(outcome, MatchOutcome::Timeout);

        channel.close();
    }

    #[test]
    fn test_obex_channel_detects_exit() {
        let mut channel = ObexChannel::spawn("true").unwrap();

        let markers = MarkerSet::new(&["#"]);
        let outcome = channel.expect(&markers, Duration::from_secs(5));
        assert_eq!(outcome, MatchOutcome::Closed);
    }

    #[test]
    fn test_spawn_missing_program() {
        let result = ObexChannel::spawn("definitely-not-a-real-program-1234");
        assert!(matches!(result, Err(PbapDumpError::Spawn { .. })));
    }

    #[test]
    fn test_match_outcome_helpers() {
        assert!(MatchOutcome::Marker(0).is_marker(0));
        assert!(!MatchOutcome::Marker(1).is_marker(0));
        assert!(!MatchOutcome::Timeout.is_marker(0));
    }
}
