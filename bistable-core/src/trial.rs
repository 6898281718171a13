use crate::stimulus::StimulusIndex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Break,
    Ambiguous,
    Unambiguous,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Break => "break",
            BlockType::Ambiguous => "ambiguous",
            BlockType::Unambiguous => "unambiguous",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the subject sees during a trial. Breaks and tracking tests carry no percept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialType {
    Break,
    TrackingTest,
    Ambiguous,
    House,
    Face,
    Left,
    Right,
}

impl TrialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialType::Break => "break",
            TrialType::TrackingTest => "tracking_test",
            TrialType::Ambiguous => "ambiguous",
            TrialType::House => "house",
            TrialType::Face => "face",
            TrialType::Left => "left",
            TrialType::Right => "right",
        }
    }
}

impl fmt::Display for TrialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which eye receives the red image in a rivalry block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColorCombination {
    RedFace,
    RedHouse,
}

impl ColorCombination {
    pub const ALL: [ColorCombination; 2] = [ColorCombination::RedFace, ColorCombination::RedHouse];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorCombination::RedFace => "redface",
            ColorCombination::RedHouse => "redhouse",
        }
    }

    /// Catalog name of the dichoptic composite.
    pub fn rivalry_name(&self) -> String {
        format!("rivalry_{}", self.as_str())
    }

    /// Catalog name of the single image shown for an unambiguous `percept`.
    ///
    /// `redface` pairs a red face with a blue house, `redhouse` the reverse.
    pub fn static_name(&self, percept: TrialType) -> Option<&'static str> {
        match (self, percept) {
            (ColorCombination::RedFace, TrialType::Face) => Some("face_red"),
            (ColorCombination::RedFace, TrialType::House) => Some("house_blue"),
            (ColorCombination::RedHouse, TrialType::House) => Some("house_red"),
            (ColorCombination::RedHouse, TrialType::Face) => Some("face_blue"),
            _ => None,
        }
    }

    /// Fading sequence that leaves `percept` towards the other image.
    pub fn fading_from(&self, percept: TrialType) -> Option<FadingDirection> {
        match (self, percept) {
            (ColorCombination::RedFace, TrialType::House) => Some(FadingDirection::HouseBlueToFaceRed),
            (ColorCombination::RedFace, TrialType::Face) => Some(FadingDirection::FaceRedToHouseBlue),
            (ColorCombination::RedHouse, TrialType::House) => Some(FadingDirection::HouseRedToFaceBlue),
            (ColorCombination::RedHouse, TrialType::Face) => Some(FadingDirection::FaceBlueToHouseRed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FadingDirection {
    HouseBlueToFaceRed,
    HouseRedToFaceBlue,
    FaceRedToHouseBlue,
    FaceBlueToHouseRed,
}

impl FadingDirection {
    pub const ALL: [FadingDirection; 4] = [
        FadingDirection::HouseBlueToFaceRed,
        FadingDirection::HouseRedToFaceBlue,
        FadingDirection::FaceRedToHouseBlue,
        FadingDirection::FaceBlueToHouseRed,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            FadingDirection::HouseBlueToFaceRed => "hb2fr",
            FadingDirection::HouseRedToFaceBlue => "hr2fb",
            FadingDirection::FaceRedToHouseBlue => "fr2hb",
            FadingDirection::FaceBlueToHouseRed => "fb2hr",
        }
    }

    pub fn step_name(&self, step: usize) -> String {
        format!("{}_{}", self.prefix(), step)
    }
}

/// Task-specific tag carried into every log row as `color_comb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrialLabel {
    #[default]
    None,
    Break,
    Rivalry(ColorCombination),
    Color(ColorCombination),
    Fading(FadingDirection),
}

impl fmt::Display for TrialLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialLabel::None => f.write_str("none"),
            TrialLabel::Break => f.write_str("break"),
            TrialLabel::Rivalry(c) => write!(f, "rivalry_{}", c.as_str()),
            TrialLabel::Color(c) => f.write_str(c.as_str()),
            TrialLabel::Fading(d) => f.write_str(d.prefix()),
        }
    }
}

/// Tick counts of consecutive phases.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct PhaseDurations(Vec<u32>);

impl PhaseDurations {
    pub fn new(ticks: Vec<u32>) -> Self {
        Self(ticks)
    }

    /// `count` phases of `step` ticks each.
    pub fn repeat(step: u32, count: usize) -> Self {
        Self(vec![step; count])
    }

    pub fn ticks(&self) -> &[u32] {
        &self.0
    }

    pub fn get(&self, phase: usize) -> Option<u32> {
        self.0.get(phase).copied()
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|&t| t as u64).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, ticks: u32) {
        self.0.push(ticks);
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn into_inner(self) -> Vec<u32> {
        self.0
    }
}

impl From<Vec<u32>> for PhaseDurations {
    fn from(ticks: Vec<u32>) -> Self {
        Self(ticks)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrialShapeError {
    #[error("trial {trial_nr}: {durations} phase durations but {indices} stimulus indices")]
    LengthMismatch {
        trial_nr: u32,
        durations: usize,
        indices: usize,
    },
    #[error("trial {trial_nr} has no phases")]
    Empty { trial_nr: u32 },
    #[error("trial {trial_nr}: phase {phase} lasts zero ticks")]
    ZeroDuration { trial_nr: u32, phase: usize },
}

/// One scheduled unit of the run. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub trial_nr: u32,
    pub block_id: u32,
    pub block_type: BlockType,
    pub trial_type: TrialType,
    pub label: TrialLabel,
    phase_durations: PhaseDurations,
    stimulus_indices: Vec<StimulusIndex>,
}

impl Trial {
    pub fn new(
        trial_nr: u32,
        block_id: u32,
        block_type: BlockType,
        trial_type: TrialType,
        label: TrialLabel,
        phase_durations: PhaseDurations,
        stimulus_indices: Vec<StimulusIndex>,
    ) -> Result<Self, TrialShapeError> {
        if phase_durations.is_empty() {
            return Err(TrialShapeError::Empty { trial_nr });
        }
        if phase_durations.len() != stimulus_indices.len() {
            return Err(TrialShapeError::LengthMismatch {
                trial_nr,
                durations: phase_durations.len(),
                indices: stimulus_indices.len(),
            });
        }
        if let Some(phase) = phase_durations.iter().position(|t| t == 0) {
            return Err(TrialShapeError::ZeroDuration { trial_nr, phase });
        }
        Ok(Self {
            trial_nr,
            block_id,
            block_type,
            trial_type,
            label,
            phase_durations,
            stimulus_indices,
        })
    }

    pub fn phase_durations(&self) -> &PhaseDurations {
        &self.phase_durations
    }

    pub fn stimulus_indices(&self) -> &[StimulusIndex] {
        &self.stimulus_indices
    }

    pub fn phase_count(&self) -> usize {
        self.phase_durations.len()
    }

    pub fn stimulus_at(&self, phase: usize) -> Option<StimulusIndex> {
        self.stimulus_indices.get(phase).copied()
    }

    pub fn total_ticks(&self) -> u64 {
        self.phase_durations.total()
    }
}
