pub mod event;
pub mod stage;
pub mod stimulus;
pub mod trial;

pub use event::{KeyEvent, LogRow};
pub use stage::SessionStage;
pub use stimulus::{StimulusAsset, StimulusIndex, StimulusName};
pub use trial::{
    BlockType, ColorCombination, FadingDirection, PhaseDurations, Trial, TrialLabel,
    TrialShapeError, TrialType,
};
