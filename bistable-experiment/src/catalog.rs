//! Name -> index table over every stimulus a task can show.

use crate::config::{ExperimentConfig, RivalryStimuli, SphereStimuli, StimulusConfig, TaskStimuli};
use crate::error::CatalogError;
use bistable_core::{FadingDirection, StimulusAsset, StimulusIndex, StimulusName};
use std::collections::HashMap;
use tracing::info;

pub const TRACKING_TARGETS: [(f32, f32); 4] = [
    (-250.0, -250.0),
    (250.0, -250.0),
    (250.0, 250.0),
    (-250.0, 250.0),
];

pub fn tracking_test_name(i: usize) -> String {
    format!("tracking_test_{i}")
}

#[derive(Debug, Clone, Default)]
pub struct StimulusCatalog {
    stimuli: Vec<StimulusAsset>,
    names: Vec<StimulusName>,
    lookup: HashMap<StimulusName, StimulusIndex>,
}

impl StimulusCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_config(config: &ExperimentConfig) -> Result<Self, CatalogError> {
        let catalog = match &config.stimuli.task {
            TaskStimuli::Rivalry(r) => {
                Self::rivalry(&config.stimuli, r, config.timing.screenticks_per_frame)?
            }
            TaskStimuli::Sphere(s) => Self::sphere(&config.stimuli, s)?,
        };
        let images = catalog.stimuli.iter().filter(|asset| asset.is_image()).count();
        info!(
            task = %config.task,
            stimuli = catalog.len(),
            images,
            "stimulus catalog built"
        );
        Ok(catalog)
    }

    /// House/face images, the two rivalry composites, the break screen and four fading sequences.
    pub fn rivalry(
        stim: &StimulusConfig,
        rivalry: &RivalryStimuli,
        screenticks_per_frame: u32,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        let image = |file: String| StimulusAsset::image(stim.path.join(file), stim.size_deg);

        for name in [
            "house_red",
            "house_blue",
            "face_red",
            "face_blue",
            "rivalry_redface",
            "rivalry_redhouse",
        ] {
            catalog.insert(name, image(format!("{name}.bmp")))?;
        }
        catalog.insert(&stim.break_name, image("fixation_screen.bmp".to_string()))?;

        let images = rivalry.fading_images(screenticks_per_frame);
        if images > 0 {
            let nr = rivalry.nr_fading_stimuli;
            let stride = nr / images;
            for direction in FadingDirection::ALL {
                for i in 0..images {
                    let step = i * stride;
                    let reversed = nr - 1 - step;
                    let file = match direction {
                        FadingDirection::HouseBlueToFaceRed => format!("fading_hb2fr_{step}.bmp"),
                        FadingDirection::HouseRedToFaceBlue => format!("fading_hr2fb_{reversed}.bmp"),
                        FadingDirection::FaceRedToHouseBlue => format!("fading_hb2fr_{reversed}.bmp"),
                        FadingDirection::FaceBlueToHouseRed => format!("fading_hr2fb_{step}.bmp"),
                    };
                    catalog.insert(
                        &direction.step_name(i as usize),
                        image(format!("fading/{file}")),
                    )?;
                }
            }
        }
        Ok(catalog)
    }

    /// Ambiguous, left and right sphere animations, the fixation dot and eye-tracking targets.
    pub fn sphere(stim: &StimulusConfig, sphere: &SphereStimuli) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        let n = sphere.nr_frames;
        let image = |file: String| StimulusAsset::image(stim.path.join(file), stim.size_deg);
        let geometry = format!(
            "{res}x{res}-{n}frames-{dots}dots(size={size})",
            res = sphere.resolution,
            dots = sphere.nr_dots,
            size = sphere.dot_size,
        );
        let contrast = format!(
            "Contr_Unamb_{}BB_{}WB_{}BF_{}WF_{}-{}DS",
            sphere.black_at_back,
            sphere.white_at_back,
            sphere.black_at_front,
            sphere.white_at_front,
            sphere.dot_size_min,
            sphere.dot_size_max,
        );
        let ambiguous = |frame: usize| {
            format!("Amb_{geometry}_{}.{frame}.bmp", sphere.sphere_ambiguous)
        };
        let unambiguous = |frame: usize| {
            format!("{contrast}_{geometry}_{}.{frame}.bmp", sphere.sphere_unambiguous)
        };

        for i in 0..n {
            catalog.insert(&format!("ambiguous_{i}"), image(ambiguous(i + 1)))?;
        }
        // the left list plays the right-rotation files backwards
        for i in 0..n {
            catalog.insert(&format!("unambiguous_left_{i}"), image(unambiguous(n - i)))?;
        }
        for i in 0..n {
            catalog.insert(&format!("unambiguous_right_{i}"), image(unambiguous(i + 1)))?;
        }
        catalog.insert(&stim.break_name, image("FixDot.bmp".to_string()))?;
        for (i, offset) in TRACKING_TARGETS.iter().enumerate() {
            catalog.insert(
                &tracking_test_name(i),
                StimulusAsset::Ring {
                    offset_px: *offset,
                    diameter_px: 70.0,
                    color: [255, 0, 0, 255],
                },
            )?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, name: &str, asset: StimulusAsset) -> Result<StimulusIndex, CatalogError> {
        let atom = StimulusName::from(name);
        if self.lookup.contains_key(&atom) {
            return Err(CatalogError::Duplicate(name.to_string()));
        }
        let index = StimulusIndex(self.stimuli.len());
        self.stimuli.push(asset);
        self.names.push(atom.clone());
        self.lookup.insert(atom, index);
        Ok(index)
    }

    pub fn index(&self, name: &str) -> Result<StimulusIndex, CatalogError> {
        self.lookup
            .get(&StimulusName::from(name))
            .copied()
            .ok_or_else(|| CatalogError::Unknown(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(&StimulusName::from(name))
    }

    pub fn asset(&self, index: StimulusIndex) -> Option<&StimulusAsset> {
        self.stimuli.get(index.get())
    }

    pub fn name(&self, index: StimulusIndex) -> Option<&str> {
        self.names.get(index.get()).map(|a| a.as_ref())
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StimulusIndex, &str, &StimulusAsset)> {
        self.names
            .iter()
            .zip(&self.stimuli)
            .enumerate()
            .map(|(i, (name, asset))| (StimulusIndex(i), name.as_ref(), asset))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FadingLength;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn stim(break_name: &str) -> StimulusConfig {
        StimulusConfig {
            path: PathBuf::from("stim"),
            size_deg: 6.0,
            break_name: break_name.to_string(),
            task: TaskStimuli::Rivalry(rivalry(0)),
        }
    }

    fn rivalry(nr_fading: u32) -> RivalryStimuli {
        RivalryStimuli {
            nr_fading_stimuli: nr_fading,
            transition_length: 10,
            fading_length: FadingLength::PerFrame,
        }
    }

    fn sphere(n: usize) -> SphereStimuli {
        SphereStimuli {
            nr_frames: n,
            resolution: "800".into(),
            dot_size: "4".into(),
            nr_dots: "200".into(),
            sphere_ambiguous: "1".into(),
            sphere_unambiguous: "2".into(),
            black_at_back: "0".into(),
            white_at_back: "1".into(),
            black_at_front: "1".into(),
            white_at_front: "0".into(),
            dot_size_min: "3.0".into(),
            dot_size_max: "5.5".into(),
        }
    }

    fn assert_bijection(catalog: &StimulusCatalog) {
        let mut seen = HashSet::new();
        for (index, name, _) in catalog.iter() {
            assert_eq!(catalog.index(name).unwrap(), index);
            assert!(seen.insert(name.to_string()));
        }
        assert_eq!(seen.len(), catalog.len());
    }

    #[test]
    fn rivalry_catalog_layout() {
        let catalog = StimulusCatalog::rivalry(&stim("fixation_screen"), &rivalry(40), 2).unwrap();
        // 7 static images + 4 directions * (10 / 2) fading steps
        assert_eq!(catalog.len(), 7 + 4 * 5);
        assert_eq!(catalog.index("house_red").unwrap(), StimulusIndex(0));
        assert_eq!(catalog.index("fixation_screen").unwrap(), StimulusIndex(6));
        assert_eq!(catalog.index("hb2fr_0").unwrap(), StimulusIndex(7));
        assert_eq!(catalog.index("fb2hr_4").unwrap(), StimulusIndex(26));
        assert_bijection(&catalog);

        let path = |name: &str| match catalog.asset(catalog.index(name).unwrap()).unwrap() {
            StimulusAsset::Image { path, .. } => path.clone(),
            other => panic!("unexpected asset {other:?}"),
        };
        // 40 stimuli over 5 images: steps 0, 8, 16, 24, 32
        assert_eq!(path("hb2fr_1"), PathBuf::from("stim/fading/fading_hb2fr_8.bmp"));
        assert_eq!(path("hr2fb_1"), PathBuf::from("stim/fading/fading_hr2fb_31.bmp"));
        assert_eq!(path("fr2hb_0"), PathBuf::from("stim/fading/fading_hb2fr_39.bmp"));
        assert_eq!(path("fb2hr_4"), PathBuf::from("stim/fading/fading_hr2fb_32.bmp"));
    }

    #[test]
    fn rivalry_without_fading_declares_no_fading_images() {
        let catalog = StimulusCatalog::rivalry(&stim("fixation_screen"), &rivalry(0), 1).unwrap();
        assert_eq!(catalog.len(), 7);
        assert!(!catalog.contains("hb2fr_0"));
    }

    #[test]
    fn sphere_catalog_layout_and_file_names() {
        let catalog = StimulusCatalog::sphere(&stim("fixation_dot"), &sphere(190)).unwrap();
        assert_eq!(catalog.len(), 3 * 190 + 1 + 4);
        assert_eq!(catalog.index("ambiguous_0").unwrap(), StimulusIndex(0));
        assert_eq!(catalog.index("unambiguous_left_0").unwrap(), StimulusIndex(190));
        assert_eq!(catalog.index("unambiguous_right_0").unwrap(), StimulusIndex(380));
        assert_eq!(catalog.index("fixation_dot").unwrap(), StimulusIndex(570));
        assert_eq!(catalog.index("tracking_test_3").unwrap(), StimulusIndex(574));
        assert_bijection(&catalog);

        let left0 = catalog.asset(catalog.index("unambiguous_left_0").unwrap()).unwrap();
        assert_eq!(
            left0,
            &StimulusAsset::image(
                "stim/Contr_Unamb_0BB_1WB_1BF_0WF_3.0-5.5DS_800x800-190frames-200dots(size=4)_2.190.bmp",
                6.0
            )
        );
        let amb = catalog.asset(StimulusIndex(0)).unwrap();
        assert_eq!(
            amb,
            &StimulusAsset::image("stim/Amb_800x800-190frames-200dots(size=4)_1.1.bmp", 6.0)
        );
        assert_eq!(
            catalog.iter().filter(|(_, _, asset)| asset.is_image()).count(),
            3 * 190 + 1
        );
    }

    #[test]
    fn duplicate_and_unknown_names_are_errors() {
        // break stimulus colliding with a base image name
        let err = StimulusCatalog::rivalry(&stim("house_red"), &rivalry(0), 1).unwrap_err();
        assert_eq!(err, CatalogError::Duplicate("house_red".into()));

        let catalog = StimulusCatalog::rivalry(&stim("fixation_screen"), &rivalry(0), 1).unwrap();
        assert_eq!(
            catalog.index("rivalry_bluehouse").unwrap_err(),
            CatalogError::Unknown("rivalry_bluehouse".into())
        );
    }
}
