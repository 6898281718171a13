use serde::{Deserialize, Serialize};

/// A key released since the previous poll.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub name: String,
    /// Release time in seconds on the same clock the session is ticked with.
    pub time: f64,
    /// How long the key was held, when the input source knows it.
    pub duration: Option<f64>,
}

impl KeyEvent {
    pub fn new(name: impl Into<String>, time: f64) -> Self {
        Self {
            name: name.into(),
            time,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// One appended row of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub event_type: String,
    pub trial_nr: u32,
    /// Seconds since the experiment clock was reset.
    pub onset: f64,
    /// Seconds between trial onset and the response.
    pub reaction_time: Option<f64>,
    pub key_duration: Option<f64>,
    pub phase: usize,
    pub response: String,
    pub response_button: String,
    pub nr_frames: u32,
    pub block_type: String,
    pub trial_type: String,
    #[serde(rename = "block_ID")]
    pub block_id: u32,
    pub color_comb: String,
    pub phase_length: usize,
}
