pub mod builder;
pub mod catalog;
pub mod config;
pub mod durations;
pub mod error;
pub mod log;
pub mod output;
pub mod runtime;
pub mod session;

pub use builder::{build_trial_list, RotationCursor};
pub use catalog::StimulusCatalog;
pub use config::{ExperimentConfig, FadingLength, KeyBindings, Settings, Task};
pub use durations::PerceptPlan;
pub use error::{BuildError, CatalogError, ConfigError, SessionError};
pub use log::{ResponseButton, ResponseCounters, RunLog, SessionState};
pub use output::OutputPaths;
pub use runtime::{advance, Action, RuntimeContext, Step, TrialCursor};
pub use session::{CollaboratorError, EyeTracker, InputSource, Session, SessionStatus, Surface};
