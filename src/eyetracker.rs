use bistable_experiment::{CollaboratorError, EyeTracker};
use bistable_timing::{HighPrecisionTimer, Timer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Eye-tracker stand-in that writes every marker, timestamped, to a message file.
/// Recording state changes are written too, so the file lines up with a real
/// tracker's EDF message stream.
pub struct MessageFileTracker {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    timer: HighPrecisionTimer,
}

impl MessageFileTracker {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            out: None,
            timer: HighPrecisionTimer::new(),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), CollaboratorError> {
        let ms = self.timer.now() / 1_000_000;
        let out = match self.out.take() {
            Some(out) => out,
            None => BufWriter::new(File::create(&self.path)?),
        };
        let out = self.out.insert(out);
        writeln!(out, "MSG\t{ms}\t{line}")?;
        Ok(())
    }
}

impl EyeTracker for MessageFileTracker {
    fn calibrate(&mut self) -> Result<(), CollaboratorError> {
        info!(path = %self.path.display(), "eye tracker calibration requested");
        self.write_line("calibration")
    }

    fn start_recording(&mut self) -> Result<(), CollaboratorError> {
        self.timer.reset();
        self.write_line("start_recording")
    }

    fn send_message(&mut self, message: &str) -> Result<(), CollaboratorError> {
        self.write_line(message)
    }

    fn stop_recording(&mut self) -> Result<(), CollaboratorError> {
        self.write_line("stop_recording")?;
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        info!(path = %self.path.display(), "eye tracker messages saved");
        Ok(())
    }
}
