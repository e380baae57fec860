pub mod channel;
pub mod controller;

pub use channel::{ControlChannel, MarkerSet, MatchOutcome, ObexChannel};
pub use controller::{RecordClass, SessionController, SessionReport, SessionState};
