//! Settings file layout and the validated, tick-based configuration built from it.

use crate::catalog::TRACKING_TARGETS;
use crate::durations::PerceptPlan;
use crate::error::ConfigError;
use bistable_core::BlockType;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const STIMULUS_SECTION: &str = "Stimulus settings";

/// Raw settings as they appear in `settings_<TASK>.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(rename = "Task settings")]
    pub task: TaskSettings,
    #[serde(rename = "Stimulus settings")]
    pub stimulus: StimulusSettings,
    #[serde(rename = "Window settings", default)]
    pub window: WindowSettings,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskSettings {
    #[serde(rename = "Stimulus names")]
    pub stimulus_names: [String; 2],
    #[serde(rename = "Previous percept duration")]
    pub previous_percept_duration: PerceptDuration,
    #[serde(rename = "Percept duration jitter")]
    pub percept_duration_jitter: f64,
    #[serde(rename = "Stimulus duration ambiguous")]
    pub stimulus_duration_ambiguous: f64,
    #[serde(rename = "Blocks")]
    pub blocks: u32,
    #[serde(rename = "Break duration")]
    pub break_duration: f64,
    #[serde(rename = "Exit key")]
    pub exit_key: String,
    #[serde(rename = "Break buttons")]
    pub break_buttons: Vec<String>,
    #[serde(rename = "Monitor refreshrate")]
    pub monitor_refreshrate: f64,
    #[serde(rename = "Screentick conversion")]
    pub screentick_conversion: f64,
    #[serde(rename = "Test eyetracker")]
    pub test_eyetracker: bool,
    #[serde(rename = "Screenshot")]
    pub screenshot: bool,
    #[serde(rename = "Screenshot key", default = "default_screenshot_key")]
    pub screenshot_key: String,
    #[serde(rename = "Pause key", default)]
    pub pause_key: Option<String>,
    #[serde(rename = "Resume key", default = "default_resume_key")]
    pub resume_key: String,
    #[serde(rename = "Start key", default = "default_start_key")]
    pub start_key: String,
    #[serde(rename = "Seed", default)]
    pub seed: Option<u64>,
}

fn default_screenshot_key() -> String {
    "s".to_string()
}

fn default_resume_key() -> String {
    "return".to_string()
}

fn default_start_key() -> String {
    "space".to_string()
}

/// Either a mean percept duration in seconds or an explicit list of durations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PerceptDuration {
    Seconds(f64),
    Predefined(Vec<f64>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StimulusSettings {
    #[serde(rename = "Stimulus path")]
    pub stimulus_path: PathBuf,
    #[serde(rename = "Stimulus size")]
    pub stimulus_size: f32,
    #[serde(rename = "Break stimulus name")]
    pub break_stimulus_name: String,

    #[serde(rename = "Nr fading stimuli", default)]
    pub nr_fading_stimuli: Option<u32>,
    #[serde(rename = "Transition length", default)]
    pub transition_length: Option<u32>,
    #[serde(rename = "Fading length", default)]
    pub fading_length: Option<FadingLength>,

    #[serde(rename = "Number frames", default)]
    pub number_frames: Option<usize>,
    #[serde(rename = "Stimulus resolution", default)]
    pub stimulus_resolution: Option<FileToken>,
    #[serde(rename = "Dot size", default)]
    pub dot_size: Option<FileToken>,
    #[serde(rename = "Number dots", default)]
    pub number_dots: Option<FileToken>,
    #[serde(rename = "Sphere number ambiguous", default)]
    pub sphere_number_ambiguous: Option<FileToken>,
    #[serde(rename = "Sphere number unambiguous", default)]
    pub sphere_number_unambiguous: Option<FileToken>,
    #[serde(rename = "Black at back", default)]
    pub black_at_back: Option<FileToken>,
    #[serde(rename = "White at back", default)]
    pub white_at_back: Option<FileToken>,
    #[serde(rename = "Black at front", default)]
    pub black_at_front: Option<FileToken>,
    #[serde(rename = "White at front", default)]
    pub white_at_front: Option<FileToken>,
    #[serde(rename = "Dot size min", default)]
    pub dot_size_min: Option<FileToken>,
    #[serde(rename = "Dot size max", default)]
    pub dot_size_max: Option<FileToken>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowSettings {
    #[serde(rename = "Pixels per degree", default)]
    pub pixels_per_degree: Option<f32>,
    #[serde(rename = "Font path", default)]
    pub font_path: Option<PathBuf>,
    #[serde(rename = "Fullscreen", default)]
    pub fullscreen: Option<bool>,
}

/// A settings value that only ends up inside generated file names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FileToken {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FileToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileToken::Int(v) => write!(f, "{v}"),
            // whole floats keep their trailing `.0`, as the asset files are named
            FileToken::Float(v) if v.fract() == 0.0 => write!(f, "{v:.1}"),
            FileToken::Float(v) => write!(f, "{v}"),
            FileToken::Text(v) => f.write_str(v),
        }
    }
}

/// How many images a rivalry fading transition is made of.
///
/// The two known stimulus loaders disagree here, so the settings must say which one is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadingLength {
    /// `transition_length / screenticks_per_frame` images, one per animation frame.
    PerFrame,
    /// `transition_length` images, one per tick.
    Ticks,
}

impl FadingLength {
    pub fn images(&self, transition_length: u32, screenticks_per_frame: u32) -> u32 {
        match self {
            FadingLength::PerFrame => transition_length / screenticks_per_frame,
            FadingLength::Ticks => transition_length,
        }
    }

    pub fn phase_ticks(&self, screenticks_per_frame: u32) -> u32 {
        match self {
            FadingLength::PerFrame => screenticks_per_frame,
            FadingLength::Ticks => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Binocular rivalry between a face and a house image.
    Rivalry,
    /// Structure-from-motion rotating sphere.
    RotatingSphere,
}

impl Task {
    pub fn code(&self) -> &'static str {
        match self {
            Task::Rivalry => "BR",
            Task::RotatingSphere => "RS",
        }
    }

    pub fn settings_file(&self) -> PathBuf {
        PathBuf::from(format!("settings_{}.yml", self.code()))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Task {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.strip_prefix("task-").unwrap_or(s);
        match code {
            "BR" => Ok(Task::Rivalry),
            "RS" => Ok(Task::RotatingSphere),
            _ => Err(ConfigError::UnknownTask(s.to_string())),
        }
    }
}

/// Key names as reported by the input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    pub exit: String,
    pub advance: Vec<String>,
    pub screenshot: String,
    pub pause: Option<String>,
    pub resume: String,
    pub start: String,
}

impl KeyBindings {
    pub fn advances(&self, key: &str) -> bool {
        self.advance.iter().any(|k| k == key)
    }

    pub fn pauses(&self, key: &str) -> bool {
        self.pause.as_deref() == Some(key)
    }
}

/// All durations of the run, in display ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingPlan {
    pub refresh_rate: f64,
    pub screenticks_per_frame: u32,
    pub break_ticks: u32,
    pub ambiguous_ticks: u32,
    pub percept: PerceptPlan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RivalryStimuli {
    pub nr_fading_stimuli: u32,
    pub transition_length: u32,
    pub fading_length: FadingLength,
}

impl RivalryStimuli {
    pub fn fading_enabled(&self) -> bool {
        self.nr_fading_stimuli != 0
    }

    pub fn fading_images(&self, screenticks_per_frame: u32) -> u32 {
        if !self.fading_enabled() {
            return 0;
        }
        self.fading_length
            .images(self.transition_length, screenticks_per_frame)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphereStimuli {
    pub nr_frames: usize,
    pub resolution: String,
    pub dot_size: String,
    pub nr_dots: String,
    pub sphere_ambiguous: String,
    pub sphere_unambiguous: String,
    pub black_at_back: String,
    pub white_at_back: String,
    pub black_at_front: String,
    pub white_at_front: String,
    pub dot_size_min: String,
    pub dot_size_max: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskStimuli {
    Rivalry(RivalryStimuli),
    Sphere(SphereStimuli),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StimulusConfig {
    pub path: PathBuf,
    pub size_deg: f32,
    pub break_name: String,
    pub task: TaskStimuli,
}

/// Validated configuration for one run. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub task: Task,
    pub subject_id: u32,
    pub n_blocks: u32,
    pub stimulus_names: [String; 2],
    pub timing: TimingPlan,
    pub keys: KeyBindings,
    pub screenshots: bool,
    pub test_eyetracker: bool,
    pub seed: Option<u64>,
    pub stimuli: StimulusConfig,
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>, task: Task, subject_id: u32) -> Result<Self, ConfigError> {
        Self::from_settings(&Settings::load(path)?, task, subject_id)
    }

    pub fn from_settings(
        settings: &Settings,
        task: Task,
        subject_id: u32,
    ) -> Result<Self, ConfigError> {
        let ts = &settings.task;
        let refresh = ts.monitor_refreshrate;
        positive("Monitor refreshrate", refresh)?;
        positive("Screentick conversion", ts.screentick_conversion)?;

        let screenticks_per_frame = whole_ticks(
            "Screentick conversion",
            refresh / ts.screentick_conversion,
        )?;
        let screenticks_per_frame = nonzero("Screentick conversion", screenticks_per_frame)?;
        let break_ticks = nonzero(
            "Break duration",
            whole_ticks("Break duration", ts.break_duration * refresh)?,
        )?;
        let ambiguous_ticks = nonzero(
            "Stimulus duration ambiguous",
            whole_ticks(
                "Stimulus duration ambiguous",
                ts.stimulus_duration_ambiguous * refresh,
            )?,
        )?;

        at_least_one_frame("Break duration", break_ticks, screenticks_per_frame)?;
        at_least_one_frame(
            "Stimulus duration ambiguous",
            ambiguous_ticks,
            screenticks_per_frame,
        )?;
        // the sphere catalog carries the tracking targets, each shown for a quarter break
        if ts.test_eyetracker && task == Task::RotatingSphere {
            at_least_one_frame(
                "Break duration",
                break_ticks / TRACKING_TARGETS.len() as u32,
                screenticks_per_frame,
            )?;
        }

        let percept = match &ts.previous_percept_duration {
            PerceptDuration::Predefined(list) => {
                let ticks = list
                    .iter()
                    .map(|&d| {
                        let t = whole_ticks(
                            "Previous percept duration",
                            d * screenticks_per_frame as f64,
                        )?;
                        nonzero("Previous percept duration", t)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                PerceptPlan::Predefined(ticks)
            }
            PerceptDuration::Seconds(secs) => {
                let percept_ticks = nonzero(
                    "Previous percept duration",
                    whole_ticks("Previous percept duration", secs * refresh)?,
                )?;
                let jitter_ticks = whole_ticks(
                    "Percept duration jitter",
                    ts.percept_duration_jitter * refresh,
                )?;
                if jitter_ticks >= percept_ticks {
                    return Err(ConfigError::JitterTooLarge {
                        percept_ticks,
                        jitter_ticks,
                    });
                }
                PerceptPlan::Jittered {
                    percept_ticks,
                    jitter_ticks,
                    budget_ticks: ambiguous_ticks,
                }
            }
        };

        let stimuli = StimulusConfig {
            path: settings.stimulus.stimulus_path.clone(),
            size_deg: settings.stimulus.stimulus_size,
            break_name: settings.stimulus.break_stimulus_name.clone(),
            task: match task {
                Task::Rivalry => TaskStimuli::Rivalry(rivalry_stimuli(
                    &settings.stimulus,
                    screenticks_per_frame,
                )?),
                Task::RotatingSphere => TaskStimuli::Sphere(sphere_stimuli(&settings.stimulus)?),
            },
        };

        if let TaskStimuli::Rivalry(rivalry) = &stimuli.task {
            if rivalry.fading_enabled() {
                let shortest = match &percept {
                    PerceptPlan::Predefined(ticks) => ticks.iter().copied().min(),
                    PerceptPlan::Jittered {
                        percept_ticks,
                        jitter_ticks,
                        ..
                    } => Some(percept_ticks - jitter_ticks),
                };
                if let Some(shortest_ticks) = shortest {
                    if shortest_ticks <= rivalry.transition_length {
                        return Err(ConfigError::TransitionTooLong {
                            shortest_ticks,
                            transition_ticks: rivalry.transition_length,
                        });
                    }
                }
            }
        }

        Ok(Self {
            task,
            subject_id,
            n_blocks: ts.blocks,
            stimulus_names: ts.stimulus_names.clone(),
            timing: TimingPlan {
                refresh_rate: refresh,
                screenticks_per_frame,
                break_ticks,
                ambiguous_ticks,
                percept,
            },
            keys: KeyBindings {
                exit: ts.exit_key.clone(),
                advance: ts.break_buttons.clone(),
                screenshot: ts.screenshot_key.clone(),
                pause: ts.pause_key.clone(),
                resume: ts.resume_key.clone(),
                start: ts.start_key.clone(),
            },
            screenshots: ts.screenshot,
            test_eyetracker: ts.test_eyetracker,
            seed: ts.seed,
            stimuli,
        })
    }

    /// Even subjects start with an ambiguous block, odd ones with an unambiguous block.
    pub fn start_condition(&self) -> u32 {
        self.subject_id % 2
    }

    /// Block types alternate from the first numbered block (`block_id == 1`) on.
    pub fn block_type(&self, block_id: u32) -> BlockType {
        if (block_id.saturating_sub(1) + self.start_condition()) % 2 == 0 {
            BlockType::Ambiguous
        } else {
            BlockType::Unambiguous
        }
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

fn positive(key: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { key, value })
    }
}

fn at_least_one_frame(key: &'static str, ticks: u32, step: u32) -> Result<(), ConfigError> {
    if ticks < step {
        Err(ConfigError::ShorterThanFrame { key, ticks, step })
    } else {
        Ok(())
    }
}

fn nonzero(key: &'static str, ticks: u32) -> Result<u32, ConfigError> {
    if ticks == 0 {
        Err(ConfigError::NotPositive { key, value: 0.0 })
    } else {
        Ok(ticks)
    }
}

/// Converts a product of settings values into ticks, refusing fractional results.
pub(crate) fn whole_ticks(key: &'static str, value: f64) -> Result<u32, ConfigError> {
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(ConfigError::NotPositive { key, value });
    }
    let rounded = value.round();
    if (value - rounded).abs() > 1e-6 {
        return Err(ConfigError::NotWholeTicks { key, value });
    }
    Ok(rounded as u32)
}

fn required<T: Clone>(
    value: &Option<T>,
    key: &'static str,
    task: Task,
) -> Result<T, ConfigError> {
    value.clone().ok_or(ConfigError::Missing {
        section: STIMULUS_SECTION,
        key,
        task,
    })
}

fn rivalry_stimuli(
    s: &StimulusSettings,
    screenticks_per_frame: u32,
) -> Result<RivalryStimuli, ConfigError> {
    let task = Task::Rivalry;
    let stimuli = RivalryStimuli {
        nr_fading_stimuli: required(&s.nr_fading_stimuli, "Nr fading stimuli", task)?,
        transition_length: required(&s.transition_length, "Transition length", task)?,
        fading_length: required(&s.fading_length, "Fading length", task)?,
    };
    if stimuli.fading_enabled() {
        if stimuli.fading_length == FadingLength::PerFrame
            && stimuli.transition_length % screenticks_per_frame != 0
        {
            return Err(ConfigError::Indivisible {
                key: "Transition length",
                value: stimuli.transition_length,
                step: screenticks_per_frame,
            });
        }
        let images = stimuli.fading_images(screenticks_per_frame);
        if images == 0 || images > stimuli.nr_fading_stimuli {
            return Err(ConfigError::FadingImages {
                images,
                nr_fading: stimuli.nr_fading_stimuli,
            });
        }
    }
    Ok(stimuli)
}

fn sphere_stimuli(s: &StimulusSettings) -> Result<SphereStimuli, ConfigError> {
    let task = Task::RotatingSphere;
    let token = |v: &Option<FileToken>, key| required(v, key, task).map(|t| t.to_string());
    let nr_frames = required(&s.number_frames, "Number frames", task)?;
    if nr_frames == 0 {
        return Err(ConfigError::NotPositive {
            key: "Number frames",
            value: 0.0,
        });
    }
    Ok(SphereStimuli {
        nr_frames,
        resolution: token(&s.stimulus_resolution, "Stimulus resolution")?,
        dot_size: token(&s.dot_size, "Dot size")?,
        nr_dots: token(&s.number_dots, "Number dots")?,
        sphere_ambiguous: token(&s.sphere_number_ambiguous, "Sphere number ambiguous")?,
        sphere_unambiguous: token(&s.sphere_number_unambiguous, "Sphere number unambiguous")?,
        black_at_back: token(&s.black_at_back, "Black at back")?,
        white_at_back: token(&s.white_at_back, "White at back")?,
        black_at_front: token(&s.black_at_front, "Black at front")?,
        white_at_front: token(&s.white_at_front, "White at front")?,
        dot_size_min: token(&s.dot_size_min, "Dot size min")?,
        dot_size_max: token(&s.dot_size_max, "Dot size max")?,
    })
}
