use crate::error::SessionError;
use bistable_core::{BlockType, LogRow};
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Which stimulus name the upper response button stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseButton {
    UpperStim1,
    UpperStim2,
}

impl ResponseButton {
    /// Fair coin, drawn once per session.
    pub fn draw<R: Rng>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            ResponseButton::UpperStim1
        } else {
            ResponseButton::UpperStim2
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseButton::UpperStim1 => "upper_stim1",
            ResponseButton::UpperStim2 => "upper_stim2",
        }
    }

    pub fn instructions(&self, names: &[String; 2]) -> String {
        let (upper, lower) = match self {
            ResponseButton::UpperStim1 => (&names[0], &names[1]),
            ResponseButton::UpperStim2 => (&names[1], &names[0]),
        };
        format!("Upper - {upper}\n Lower - {lower}")
    }
}

impl fmt::Display for ResponseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResponseCounters {
    pub ambiguous_responses: u64,
    pub unambiguous_responses: u64,
    pub total_responses: u64,
}

impl ResponseCounters {
    pub fn record(&mut self, block_type: BlockType) {
        match block_type {
            BlockType::Ambiguous => {
                self.ambiguous_responses += 1;
                self.total_responses += 1;
            }
            BlockType::Unambiguous => self.unambiguous_responses += 1,
            BlockType::Break => {}
        }
    }
}

/// Append-only table of response events.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    rows: Vec<LogRow>,
}

impl RunLog {
    pub fn append(&mut self, row: LogRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn save_json(&self, path: &Path) -> Result<(), SessionError> {
        let file = File::create(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.rows)?;
        writer.flush().map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(rows = self.rows.len(), path = %path.display(), "run log saved");
        Ok(())
    }
}

/// Mutable state shared by every trial of a session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub log: RunLog,
    pub counters: ResponseCounters,
    pub response_button: ResponseButton,
}

impl SessionState {
    pub fn new(response_button: ResponseButton) -> Self {
        Self {
            log: RunLog::default(),
            counters: ResponseCounters::default(),
            response_button,
        }
    }
}
