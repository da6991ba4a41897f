use super::*;
use crate::constants::{PHYSICS_TIMESTEP, SPAWN_TOLERANCE};
use crate::skeleton::BODY_SPECS;

fn new_loop() -> SimulationLoop {
    SimulationLoop::new(SimConfig::default(), 0xA57E_0001).expect("default config is valid")
}

fn run_ticks(sim: &mut SimulationLoop, ticks: usize) {
    for _ in 0..ticks {
        sim.update(PHYSICS_TIMESTEP);
    }
}

/// Holds O until the runner folds onto the track.
fn knee_drop_until_ended(sim: &mut SimulationLoop) -> usize {
    sim.key_down('o');
    for tick in 1..=150 {
        sim.update(PHYSICS_TIMESTEP);
        if sim.is_ended() {
            return tick;
        }
    }
    panic!("runner still standing after 150 ticks of O");
}

fn all_states(sim: &SimulationLoop) -> Vec<BodyState> {
    BodyPart::OBSERVATION_ORDER
        .iter()
        .map(|part| sim.body_state(*part))
        .collect()
}

fn assert_spawn_pose(sim: &SimulationLoop) {
    for spec in BODY_SPECS {
        let state = sim.body_state(spec.part);
        assert!((state.x - spec.position.0).abs() <= SPAWN_TOLERANCE, "{}", spec.part.name());
        assert!((state.y - spec.position.1).abs() <= SPAWN_TOLERANCE, "{}", spec.part.name());
        assert!((state.angle - spec.angle).abs() <= SPAWN_TOLERANCE, "{}", spec.part.name());
    }
}

#[test]
fn physics_waits_for_start() {
    let mut sim = new_loop();
    let before = all_states(&sim);
    run_ticks(&mut sim, 5);

    assert_eq!(sim.phase(), EpisodePhase::NotStarted);
    assert!((sim.score_time() - 5.0 * PHYSICS_TIMESTEP).abs() < 1e-12);
    assert_eq!(all_states(&sim), before);
    assert_eq!(sim.camera(), Camera::default());
    assert_eq!(sim.ticks(), 5);
}

#[test]
fn spawn_parity_after_start() {
    let mut sim = new_loop();
    sim.start();
    assert_eq!(sim.phase(), EpisodePhase::Running);
    assert_spawn_pose(&sim);
}

#[test]
fn first_control_key_starts_episode() {
    let mut sim = new_loop();
    assert!(!sim.key_down('x'));
    assert!(!sim.is_started());
    assert!(sim.key_down('W'));
    assert!(sim.is_started());
    assert!(sim.controls().w);
    assert!(sim.key_up('w'));
    assert!(!sim.controls().any());
}

#[test]
fn idle_runner_keeps_spawn_stance() {
    let mut sim = new_loop();
    sim.start();
    run_ticks(&mut sim, 50);

    let state = sim.game_state();
    assert!(!state.fallen);
    assert!(!state.game_ended);
    assert_eq!(sim.phase(), EpisodePhase::Running);
}

#[test]
fn held_knee_key_topples_runner() {
    let mut sim = new_loop();
    let ticks = knee_drop_until_ended(&mut sim);
    assert!(ticks > 10, "fell after {ticks} ticks");

    let state = sim.game_state();
    assert!(state.fallen);
    assert!(state.game_ended);
    assert!(state.impact_speed > 0.0);
    assert!(!state.jump_landed);
    assert_eq!(sim.phase(), EpisodePhase::Ended);
}

#[test]
fn score_is_frozen_once_ended() {
    let mut sim = new_loop();
    knee_drop_until_ended(&mut sim);

    let score = sim.game_state().score;
    let time = sim.score_time();
    sim.set_controls(ControlState::new(true, false, true, false));
    run_ticks(&mut sim, 20);
    assert_eq!(sim.game_state().score, score);
    assert_eq!(sim.score_time(), time);
    assert_eq!(sim.phase(), EpisodePhase::Ended);
}

#[test]
fn paused_loop_keeps_pose_and_clock() {
    let mut sim = new_loop();
    sim.start();
    run_ticks(&mut sim, 3);
    sim.toggle_pause();
    assert_eq!(sim.phase(), EpisodePhase::Paused);

    let before = all_states(&sim);
    let time = sim.score_time();
    run_ticks(&mut sim, 4);
    assert_eq!(all_states(&sim), before);
    assert_eq!(sim.score_time(), time);

    sim.toggle_pause();
    assert_eq!(sim.phase(), EpisodePhase::Running);
    run_ticks(&mut sim, 1);
    assert!(sim.score_time() > time);
}

#[test]
fn end_game_is_idempotent() {
    let mut sim = new_loop();
    sim.start();
    assert!(sim.end_game());
    assert!(!sim.end_game());
    assert_eq!(sim.phase(), EpisodePhase::Ended);
    sim.toggle_pause();
    assert_eq!(sim.phase(), EpisodePhase::Ended);
}

#[test]
fn reset_restores_spawn_and_keeps_high_score() {
    let mut sim = new_loop();
    knee_drop_until_ended(&mut sim);
    let high_score = sim.game_state().high_score;

    sim.key_down('q');
    sim.reset(Some(7));

    assert_eq!(sim.phase(), EpisodePhase::NotStarted);
    assert_eq!(sim.seed(), 7);
    assert!(!sim.controls().any());
    assert_eq!(sim.score_time(), 0.0);
    assert_eq!(sim.camera(), Camera::default());
    let state = sim.game_state();
    assert!(!state.fallen && !state.jumped && !state.jump_landed && !state.game_ended);
    assert_eq!(state.high_score, high_score);
    assert_spawn_pose(&sim);

    knee_drop_until_ended(&mut sim);
    assert!(sim.game_state().high_score >= high_score);
}

#[test]
fn identical_inputs_give_identical_trajectories() {
    let pattern = ['q', 'o', 'w', 'p'];
    let mut a = new_loop();
    let mut b = new_loop();
    for sim in [&mut a, &mut b] {
        sim.start();
    }

    for tick in 0..60 {
        let key = pattern[(tick / 5) % pattern.len()];
        for sim in [&mut a, &mut b] {
            sim.set_controls(ControlState::default());
            sim.key_down(key);
            sim.update(PHYSICS_TIMESTEP);
        }
        assert_eq!(all_states(&a), all_states(&b), "tick {tick}");
        assert_eq!(a.game_state(), b.game_state());
    }
}

#[test]
fn camera_follows_torso_after_start() {
    let mut sim = new_loop();
    sim.start();
    run_ticks(&mut sim, 2);
    let (torso_x, _) = sim.world().world_center(BodyPart::Torso);
    let camera = sim.camera();
    assert!((camera.x - (torso_x + CAMERA_HORIZONTAL_OFFSET) * WORLD_SCALE).abs() < 1e-9);
    assert_eq!(camera.y, INITIAL_CAMERA_Y_PX);
}

#[test]
fn apply_action_rejects_out_of_range() {
    let mut sim = new_loop();
    let mapper = ActionMapper::new(true);
    assert!(sim.apply_action(&mapper, 9).is_err());
    assert!(!sim.is_started());
    sim.apply_action(&mapper, 6).expect("QP is in the reduced set");
    assert!(sim.is_started());
    assert_eq!(sim.controls(), ControlState::new(true, false, false, true));
}

#[test]
fn snapshot_reports_loop_state() {
    let mut sim = new_loop();
    sim.start();
    run_ticks(&mut sim, 4);
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.phase, EpisodePhase::Running);
    assert_eq!(snapshot.ticks, 4);
    assert!((snapshot.score_time - 4.0 * PHYSICS_TIMESTEP).abs() < 1e-12);
    assert!(snapshot.average_speed.is_finite());
}

#[test]
fn invalid_config_is_rejected() {
    let config = SimConfig {
        timestep: 0.0,
        ..SimConfig::default()
    };
    assert_eq!(
        SimulationLoop::new(config, 1).err(),
        Some(SimError::InvalidTimestep { timestep: 0.0 })
    );
}
