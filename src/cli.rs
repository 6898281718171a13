use bistable_experiment::Task;
use clap::Parser;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "bistable-perception")]
#[command(about = "Binocular rivalry and rotating sphere perception experiments")]
#[command(version)]
pub struct Args {
    /// Subject label, e.g. `sub-02`; the digits after the first `-` are the subject ID
    pub subject: String,
    /// Session number, part of every output file name
    pub session: String,
    /// `task-BR` (rivalry) or `task-RS` (rotating sphere)
    pub task: String,
    /// `True` to calibrate and record with the eye tracker
    #[arg(value_parser = parse_flag, action = clap::ArgAction::Set)]
    pub eyetracker: bool,
}

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("subject `{0}` has no `-<digits>` ID")]
    SubjectId(String),
    #[error("unknown task `{0}`")]
    UnknownTask(String),
}

/// Everything the app needs from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub subject_id: u32,
    pub output_str: String,
    pub task: Task,
    pub eyetracker: bool,
}

impl Args {
    pub fn resolve(&self) -> Result<Run, ArgsError> {
        let task = self
            .task
            .parse::<Task>()
            .map_err(|_| ArgsError::UnknownTask(self.task.clone()))?;
        Ok(Run {
            subject_id: subject_id(&self.subject)?,
            output_str: format!("{}_{}", self.subject, self.session),
            task,
            eyetracker: self.eyetracker,
        })
    }
}

fn subject_id(subject: &str) -> Result<u32, ArgsError> {
    subject
        .split_once('-')
        .map(|(_, rest)| {
            rest.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| ArgsError::SubjectId(subject.to_string()))
}

/// Only the literal `True` switches the flag on.
fn parse_flag(s: &str) -> Result<bool, String> {
    Ok(s == "True")
}
