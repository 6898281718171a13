use bistable_core::{BlockType, KeyEvent, SessionStage, StimulusIndex, Trial, TrialLabel, TrialType};
use bistable_experiment::{
    build_trial_list, CollaboratorError, ExperimentConfig, EyeTracker, InputSource, OutputPaths,
    Session, SessionStatus, Settings, StimulusCatalog, Surface, Task,
};
use bistable_timing::{ManualTimer, Timer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

const SPHERE: &str = r#"
Task settings:
  Stimulus names: [left, right]
  Previous percept duration: 0.5
  Percept duration jitter: 0.1
  Stimulus duration ambiguous: 2
  Blocks: 2
  Break duration: 1
  Exit key: q
  Break buttons: [n]
  Monitor refreshrate: 60
  Screentick conversion: 60
  Test eyetracker: false
  Screenshot: false
  Pause key: p
  Seed: 3
Stimulus settings:
  Stimulus path: stimuli/sphere/
  Stimulus size: 8
  Break stimulus name: fixation_dot
  Number frames: 10
  Stimulus resolution: 800
  Dot size: 4
  Number dots: 200
  Sphere number ambiguous: 1
  Sphere number unambiguous: 2
  Black at back: 0
  White at back: 1
  Black at front: 1
  White at front: 0
  Dot size min: 3.0
  Dot size max: 5.5
"#;

const RIVALRY: &str = r#"
Task settings:
  Stimulus names: [face, house]
  Previous percept duration: 2.0
  Percept duration jitter: 0.5
  Stimulus duration ambiguous: 12
  Blocks: 4
  Break duration: 2
  Exit key: q
  Break buttons: [n]
  Monitor refreshrate: 120
  Screentick conversion: 60
  Test eyetracker: false
  Screenshot: false
Stimulus settings:
  Stimulus path: stimuli/rivalry/
  Stimulus size: 6
  Break stimulus name: fixation_screen
  Nr fading stimuli: 40
  Transition length: 20
  Fading length: per_frame
"#;

fn config(yaml: &str, task: Task, subject: u32) -> ExperimentConfig {
    let settings = Settings::from_yaml(yaml).unwrap();
    ExperimentConfig::from_settings(&settings, task, subject).unwrap()
}

fn trial_list(config: &ExperimentConfig, seed: u64) -> (StimulusCatalog, Vec<Trial>) {
    let catalog = StimulusCatalog::for_config(config).unwrap();
    let trials = build_trial_list(config, &catalog, &mut StdRng::seed_from_u64(seed)).unwrap();
    (catalog, trials)
}

fn names<'a>(catalog: &'a StimulusCatalog, trial: &Trial) -> Vec<&'a str> {
    trial
        .stimulus_indices()
        .iter()
        .map(|&i| catalog.name(i).unwrap())
        .collect()
}

/// Physical animation frame behind a sphere stimulus name.
fn sphere_frame(name: &str, frames: usize) -> usize {
    if let Some(k) = name.strip_prefix("unambiguous_right_") {
        k.parse().unwrap()
    } else if let Some(k) = name.strip_prefix("unambiguous_left_") {
        frames - 1 - k.parse::<usize>().unwrap()
    } else {
        panic!("not a rotation frame: {name}")
    }
}

#[test]
fn sphere_subject_two_starts_ambiguous() {
    let config = config(SPHERE, Task::RotatingSphere, 2);
    assert_eq!(config.timing.screenticks_per_frame, 1);
    let (catalog, trials) = trial_list(&config, 1);

    assert_eq!(trials[0].trial_type, TrialType::Break);
    assert_eq!(trials[0].total_ticks(), 60);

    let ambiguous = &trials[1];
    assert_eq!((ambiguous.block_id, ambiguous.block_type), (1, BlockType::Ambiguous));
    assert_eq!(ambiguous.trial_nr, 1);
    assert_eq!(ambiguous.total_ticks(), 120);
    for (phase, name) in names(&catalog, ambiguous).into_iter().enumerate() {
        assert_eq!(name, format!("ambiguous_{}", (phase + 1) % 10));
    }

    assert_eq!(trials[2].trial_type, TrialType::Break);

    let block: Vec<&Trial> = trials[3..].iter().collect();
    assert!(block.len() >= 2);
    let mut ticks = 0;
    for (i, trial) in block.iter().enumerate() {
        assert_eq!((trial.block_id, trial.block_type), (2, BlockType::Unambiguous));
        assert_eq!(trial.trial_nr, 2 + i as u32);
        let expected = if trial.trial_nr % 2 == 0 { TrialType::Right } else { TrialType::Left };
        assert_eq!(trial.trial_type, expected);
        ticks += trial.total_ticks();
    }
    assert_eq!(ticks, 120);
}

#[test]
fn sphere_rotation_stays_continuous_across_trials() {
    let config = config(SPHERE, Task::RotatingSphere, 2);
    for seed in 0..10 {
        let (catalog, trials) = trial_list(&config, seed);
        let mut previous = 0usize;
        for trial in trials.iter().filter(|t| t.block_type == BlockType::Unambiguous) {
            let step: isize = if trial.trial_type == TrialType::Right { 1 } else { 9 };
            for name in names(&catalog, trial) {
                let frame = sphere_frame(name, 10);
                assert_eq!(
                    frame as isize,
                    (previous as isize + step) % 10,
                    "seed {seed}, trial {}",
                    trial.trial_nr
                );
                previous = frame;
            }
        }
    }
}

#[test]
fn rivalry_without_fading_emits_one_static_trial_per_percept() {
    let yaml = RIVALRY.replace("Nr fading stimuli: 40", "Nr fading stimuli: 0");
    let config = config(&yaml, Task::Rivalry, 1);
    let (catalog, trials) = trial_list(&config, 4);
    assert!(!catalog.contains("hb2fr_0"));

    let unambiguous: Vec<&Trial> = trials
        .iter()
        .filter(|t| t.block_type == BlockType::Unambiguous)
        .collect();
    assert!(!unambiguous.is_empty());
    let mut numbers: Vec<u32> = unambiguous.iter().map(|t| t.trial_nr).collect();
    numbers.dedup();
    assert_eq!(numbers.len(), unambiguous.len());
    for trial in unambiguous {
        assert!(matches!(trial.label, TrialLabel::Color(_)));
        let names = names(&catalog, trial);
        assert!(names.iter().all(|n| *n == names[0]));
    }
}

#[test]
fn rivalry_fading_keeps_block_durations() {
    let config = config(RIVALRY, Task::Rivalry, 1);
    let (catalog, trials) = trial_list(&config, 8);
    for block_id in 1..=config.n_blocks {
        let block: Vec<&Trial> = trials.iter().filter(|t| t.block_id == block_id).collect();
        let total: u64 = block.iter().map(|t| t.total_ticks()).sum();
        assert_eq!(total, config.timing.ambiguous_ticks as u64, "block {block_id}");

        if block[0].block_type != BlockType::Unambiguous {
            assert_eq!(block.len(), 1);
            assert!(matches!(block[0].label, TrialLabel::Rivalry(_)));
            continue;
        }
        // static, fading, static, fading, ..., static
        assert_eq!(block.len() % 2, 1);
        for pair in block.chunks(2) {
            assert!(matches!(pair[0].label, TrialLabel::Color(_)));
            if let Some(fading) = pair.get(1) {
                assert_eq!(fading.trial_nr, pair[0].trial_nr);
                assert_eq!(fading.trial_type, pair[0].trial_type);
                let TrialLabel::Fading(direction) = fading.label else {
                    panic!("expected a fading trial, got {:?}", fading.label);
                };
                let names = names(&catalog, fading);
                // 20 ticks at 2 ticks per frame
                assert_eq!(names.len(), 10);
                assert_eq!(names[0], format!("{}_0", direction.prefix()));
                assert_eq!(fading.total_ticks(), 20);
            }
        }
    }
}

#[test]
fn rivalry_fading_in_ticks_shows_one_image_per_tick() {
    let yaml = RIVALRY.replace("Fading length: per_frame", "Fading length: ticks");
    let config = config(&yaml, Task::Rivalry, 1);
    for seed in 0..5 {
        let (catalog, trials) = trial_list(&config, seed);
        for block_id in 1..=config.n_blocks {
            let block: Vec<&Trial> = trials.iter().filter(|t| t.block_id == block_id).collect();
            let total: u64 = block.iter().map(|t| t.total_ticks()).sum();
            assert_eq!(total, config.timing.ambiguous_ticks as u64, "seed {seed}, block {block_id}");
        }

        let fading: Vec<&Trial> = trials
            .iter()
            .filter(|t| matches!(t.label, TrialLabel::Fading(_)))
            .collect();
        assert!(!fading.is_empty());
        for trial in fading {
            assert_eq!(trial.phase_durations().ticks(), &[1; 20]);
            let TrialLabel::Fading(direction) = trial.label else {
                unreachable!()
            };
            assert_eq!(names(&catalog, trial)[19], format!("{}_19", direction.prefix()));
        }
    }
}

#[test]
fn short_percepts_just_above_the_transition_always_build() {
    // 30 +- 6 ticks against a 20-tick transition
    let yaml = RIVALRY
        .replace("Previous percept duration: 2.0", "Previous percept duration: 0.25")
        .replace("Percept duration jitter: 0.5", "Percept duration jitter: 0.05");
    let config = config(&yaml, Task::Rivalry, 2);
    let catalog = StimulusCatalog::for_config(&config).unwrap();
    for seed in 0..20 {
        let trials = build_trial_list(&config, &catalog, &mut StdRng::seed_from_u64(seed))
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
        let unambiguous: u64 = trials
            .iter()
            .filter(|t| t.block_type == BlockType::Unambiguous)
            .map(|t| t.total_ticks())
            .sum();
        assert_eq!(unambiguous, 2 * config.timing.ambiguous_ticks as u64);
    }
}

#[test]
fn predefined_durations_are_permuted_not_changed() {
    let yaml = SPHERE
        .replace("Previous percept duration: 0.5", "Previous percept duration: [1.0, 2.0]")
        .replace("Screentick conversion: 60", "Screentick conversion: 1")
        .replace("Blocks: 2", "Blocks: 1");
    let config = config(&yaml, Task::RotatingSphere, 1);
    assert_eq!(config.timing.screenticks_per_frame, 60);
    for seed in 0..8 {
        let (_, trials) = trial_list(&config, seed);
        let mut ticks: Vec<u64> = trials
            .iter()
            .filter(|t| t.block_type == BlockType::Unambiguous)
            .map(|t| t.total_ticks())
            .collect();
        ticks.sort_unstable();
        assert_eq!(ticks, vec![60, 120]);
    }
}

#[test]
fn same_seed_same_trial_list() {
    for (yaml, task) in [(SPHERE, Task::RotatingSphere), (RIVALRY, Task::Rivalry)] {
        let config = config(yaml, task, 5);
        assert_eq!(trial_list(&config, 42).1, trial_list(&config, 42).1);
    }
}

#[derive(Default)]
struct RecordingSurface {
    draws: Vec<StimulusIndex>,
    texts: Vec<String>,
    saved: Vec<PathBuf>,
    flips: usize,
    timer: ManualTimer,
}

impl Surface for RecordingSurface {
    fn draw_stimulus(&mut self, index: StimulusIndex) -> Result<(), CollaboratorError> {
        self.draws.push(index);
        Ok(())
    }

    fn draw_text(&mut self, text: &str) -> Result<(), CollaboratorError> {
        self.texts.push(text.to_string());
        Ok(())
    }

    fn flip(&mut self) -> Result<(), CollaboratorError> {
        self.flips += 1;
        self.timer.advance(Duration::from_millis(10));
        Ok(())
    }

    fn save_frame(&mut self, path: &Path) -> Result<(), CollaboratorError> {
        self.saved.push(path.to_path_buf());
        Ok(())
    }
}

/// Releases the scripted keys on the given poll number.
struct ScriptedInput {
    script: HashMap<usize, Vec<&'static str>>,
    polls: usize,
    timer: ManualTimer,
}

impl InputSource for ScriptedInput {
    fn released_keys(&mut self) -> Vec<KeyEvent> {
        let now = self.timer.now_secs();
        let keys = self.script.remove(&self.polls).unwrap_or_default();
        self.polls += 1;
        keys.into_iter()
            .map(|k| KeyEvent::new(k, now).with_duration(0.05))
            .collect()
    }
}

#[derive(Clone, Default)]
struct RecordingTracker(Rc<RefCell<Vec<String>>>);

impl EyeTracker for RecordingTracker {
    fn calibrate(&mut self) -> Result<(), CollaboratorError> {
        self.0.borrow_mut().push("calibrate".into());
        Ok(())
    }

    fn start_recording(&mut self) -> Result<(), CollaboratorError> {
        self.0.borrow_mut().push("start".into());
        Ok(())
    }

    fn send_message(&mut self, message: &str) -> Result<(), CollaboratorError> {
        self.0.borrow_mut().push(message.to_string());
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), CollaboratorError> {
        self.0.borrow_mut().push("stop".into());
        Ok(())
    }
}

/// Break 3 ticks, ambiguous 6 ticks, two 3-tick rotations: 18 trial ticks.
fn short_sphere(screenshots: bool) -> ExperimentConfig {
    let yaml = SPHERE
        .replace("Previous percept duration: 0.5", "Previous percept duration: 0.05")
        .replace("Percept duration jitter: 0.1", "Percept duration jitter: 0")
        .replace("Stimulus duration ambiguous: 2", "Stimulus duration ambiguous: 0.1")
        .replace("Break duration: 1", "Break duration: 0.05")
        .replace("Screenshot: false", &format!("Screenshot: {screenshots}"));
    config(&yaml, Task::RotatingSphere, 2)
}

struct Run {
    session: Session,
    surface: RecordingSurface,
    status: SessionStatus,
    _dir: tempfile::TempDir,
}

fn run(
    config: ExperimentConfig,
    script: &[(usize, &'static str)],
    tracker: Option<RecordingTracker>,
) -> Run {
    let dir = tempfile::tempdir().unwrap();
    let output =
        OutputPaths::prepare(dir.path(), "sub-02_1", config.task, config.screenshots).unwrap();
    let tracker = tracker.map(|t| Box::new(t) as Box<dyn EyeTracker>);
    let mut session = Session::new(config, output, tracker, &mut StdRng::seed_from_u64(1)).unwrap();

    let mut timer = ManualTimer::new();
    let mut surface = RecordingSurface {
        timer: timer.clone(),
        ..Default::default()
    };
    let mut script_map: HashMap<usize, Vec<&'static str>> = HashMap::new();
    for &(poll, key) in script {
        script_map.entry(poll).or_default().push(key);
    }
    let mut input = ScriptedInput {
        script: script_map,
        polls: 0,
        timer: timer.clone(),
    };
    let status = session.run(&mut surface, &mut input, &mut timer).unwrap();
    Run {
        session,
        surface,
        status,
        _dir: dir,
    }
}

#[test]
fn full_session_logs_responses_and_finishes() {
    let tracker = RecordingTracker::default();
    let messages = tracker.0.clone();
    // poll 1 dismisses the instructions; trials run on polls 2..=19
    let run = run(
        short_sphere(false),
        &[(1, "space"), (6, "up"), (15, "down"), (21, "space")],
        Some(tracker),
    );
    assert_eq!(run.status, SessionStatus::Finished);
    assert_eq!(run.session.stage(), SessionStage::Closed);
    assert_eq!(run.surface.draws.len(), 18);
    assert_eq!(run.surface.flips, 21);
    assert_eq!(run.surface.texts.last().map(String::as_str), Some("End. \n Well done!:)"));
    assert_eq!(run.surface.texts[0], run.session.instructions());

    let counters = run.session.counters();
    assert_eq!(counters.ambiguous_responses, 1);
    assert_eq!(counters.unambiguous_responses, 1);
    assert_eq!(counters.total_responses, 1);

    let rows = run.session.log().rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].event_type, "ambiguous");
    assert_eq!(rows[0].trial_nr, 1);
    assert_eq!(rows[0].phase, 1);
    assert!((rows[0].onset - 0.05).abs() < 1e-9);
    assert!((rows[0].reaction_time.unwrap() - 0.01).abs() < 1e-9);
    assert_eq!(rows[1].event_type, "right");
    assert_eq!(rows[1].block_id, 2);

    let saved = std::fs::read_to_string(run.session.output().events_file()).unwrap();
    let parsed: Vec<bistable_core::LogRow> = serde_json::from_str(&saved).unwrap();
    assert_eq!(parsed, rows);

    let messages = messages.borrow();
    assert_eq!(&messages[..2], ["calibrate", "start"]);
    assert_eq!(messages[2], "start_type-break_trial-0_phase-0");
    assert!(messages.iter().any(|m| m.starts_with("start_type-ambiguous_trial-1_phase-1_key-up_time-")
        && m.ends_with("_duration-0.05")));
    assert_eq!(messages.last().map(String::as_str), Some("stop"));
}

#[test]
fn advance_key_cuts_the_trial_short() {
    let run = run(
        short_sphere(false),
        &[(1, "space"), (6, "n"), (40, "space")],
        None,
    );
    assert_eq!(run.status, SessionStatus::Finished);
    // the ambiguous trial shows two of its six phases
    assert_eq!(run.surface.draws.len(), 18 - 4);
    assert_eq!(run.session.log().rows()[0].response, "n");
}

#[test]
fn exit_key_aborts_and_saves_the_log() {
    let run = run(short_sphere(true), &[(1, "space"), (6, "up"), (8, "q")], None);
    assert_eq!(run.status, SessionStatus::Aborted);
    assert_eq!(run.session.stage(), SessionStage::Closed);
    assert_eq!(run.session.log().len(), 1);
    assert!(run.session.output().events_file().is_file());
    assert_eq!(run.surface.saved.len(), 1);
    assert!(run.surface.saved[0].ends_with("sub-02_1_Screenshots/sub-02_1_Screenshot.png"));
}

#[test]
fn exit_key_works_on_the_instruction_screen() {
    let run = run(short_sphere(false), &[(2, "q")], None);
    assert_eq!(run.status, SessionStatus::Aborted);
    assert!(run.surface.draws.is_empty());
    assert!(run.session.output().events_file().is_file());
}

#[test]
fn pause_holds_the_frame_until_resume() {
    let run = run(
        short_sphere(false),
        &[(1, "space"), (6, "p"), (9, "return"), (40, "space")],
        None,
    );
    assert_eq!(run.status, SessionStatus::Finished);
    // polls 7, 8 and 9 repeat the frame drawn on poll 6
    assert_eq!(run.surface.draws.len(), 18 + 3);
    let held = &run.surface.draws[4..8];
    assert!(held.iter().all(|&i| i == held[0]));
    assert_eq!(run.session.log().rows()[0].response, "p");
}

#[test]
fn screenshot_key_saves_a_trial_frame() {
    let run = run(
        short_sphere(true),
        &[(1, "space"), (3, "s"), (40, "space")],
        None,
    );
    assert_eq!(run.status, SessionStatus::Finished);
    assert!(run.session.log().is_empty());
    assert_eq!(run.surface.saved.len(), 1);
    assert!(run.surface.saved[0].ends_with("sub-02_1_Screenshots/sub-02_1_Screenshot_break.png"));
}
