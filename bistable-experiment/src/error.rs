use crate::config::Task;
use bistable_core::TrialShapeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("`{key}` is required in `{section}` for the {task} task")]
    Missing {
        section: &'static str,
        key: &'static str,
        task: Task,
    },
    #[error("`{key}` = {value} does not give a whole number of ticks")]
    NotWholeTicks { key: &'static str, value: f64 },
    #[error("`{key}` must be positive, got {value}")]
    NotPositive { key: &'static str, value: f64 },
    #[error("`{key}` = {value} ticks is not a multiple of {step} ticks per frame")]
    Indivisible {
        key: &'static str,
        value: u32,
        step: u32,
    },
    #[error("jitter of {jitter_ticks} ticks must stay below the percept duration of {percept_ticks} ticks")]
    JitterTooLarge { percept_ticks: u32, jitter_ticks: u32 },
    #[error("`{key}` of {ticks} ticks is shorter than one frame of {step} ticks")]
    ShorterThanFrame {
        key: &'static str,
        ticks: u32,
        step: u32,
    },
    #[error("percepts as short as {shortest_ticks} ticks cannot give up a {transition_ticks}-tick fading transition")]
    TransitionTooLong {
        shortest_ticks: u32,
        transition_ticks: u32,
    },
    #[error("{images} fading images per transition cannot be drawn from {nr_fading} fading stimuli")]
    FadingImages { images: u32, nr_fading: u32 },
    #[error("unknown task `{0}`")]
    UnknownTask(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("stimulus `{0}` is declared twice")]
    Duplicate(String),
    #[error("stimulus `{0}` is not in the catalog")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Shape(#[from] TrialShapeError),
    #[error("trial {trial_nr}: percept of {percept_ticks} ticks is too short for a {cut_ticks}-tick transition cut")]
    TransitionTooLong {
        trial_nr: u32,
        percept_ticks: u32,
        cut_ticks: u32,
    },
    #[error("percept duration {ticks} ticks is negative or too large")]
    TickOverflow { ticks: i64 },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialise run log: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{what} failed: {source}")]
    Collaborator {
        what: &'static str,
        #[source]
        source: crate::session::CollaboratorError,
    },
}
