/// Top-level stages a session walks through, in order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStage {
    #[default]
    Calibration,
    Instructions,
    Trials,
    Debrief,
    Closed,
}

impl SessionStage {
    pub fn next(&self) -> Option<Self> {
        use SessionStage::*;
        Some(match self {
            Calibration => Instructions,
            Instructions => Trials,
            Trials => Debrief,
            Debrief => Closed,
            Closed => return None,
        })
    }

    pub fn requires_calibration(&self) -> bool {
        matches!(self, Self::Calibration)
    }

    /// Stages that sit on a text screen until the start key is released.
    pub fn waits_for_start_key(&self) -> bool {
        matches!(self, Self::Instructions | Self::Debrief)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Trials)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
