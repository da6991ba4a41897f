use qwop_core::constants::{MAX_STEPS_DEFAULT, PHYSICS_TIMESTEP, SPAWN_TOLERANCE};
use qwop_core::skeleton::{BodyPart, BODY_SPECS};
use qwop_core::trace::parse_trace;
use qwop_core::{
    record_trace, verify_trace, ActionMapper, ControlState, EnvConfig, QwopEnv, SimConfig,
    SimulationLoop, TraceError,
};

fn started_loop(seed: u32) -> SimulationLoop {
    let mut sim = SimulationLoop::new(SimConfig::default(), seed).expect("default config");
    sim.start();
    sim
}

#[test]
fn spawn_pose_matches_table_after_start() {
    let sim = started_loop(1);
    for spec in BODY_SPECS {
        let state = sim.body_state(spec.part);
        assert!((state.x - spec.position.0).abs() <= SPAWN_TOLERANCE);
        assert!((state.y - spec.position.1).abs() <= SPAWN_TOLERANCE);
        assert!((state.angle - spec.angle).abs() <= SPAWN_TOLERANCE);
    }
}

#[test]
fn idle_fifty_ticks_stays_upright() {
    let mut sim = started_loop(1);
    for _ in 0..50 {
        sim.update(PHYSICS_TIMESTEP);
    }
    let state = sim.game_state();
    assert!(!state.fallen);
    assert!(!state.game_ended);
}

#[test]
fn held_o_falls_within_a_few_seconds() {
    let mut sim = started_loop(1);
    sim.key_down('o');
    for _ in 0..150 {
        sim.update(PHYSICS_TIMESTEP);
        if sim.is_ended() {
            break;
        }
    }
    let state = sim.game_state();
    assert!(state.fallen);
    assert!(state.game_ended);
    assert!(state.impact_speed > 0.0);
}

#[test]
fn reduced_action_zero_releases_every_key() {
    let mapper = ActionMapper::new(true);
    assert_eq!(mapper.keys_for(0).unwrap(), ControlState::default());
}

#[test]
fn two_envs_with_same_actions_agree() {
    let config = EnvConfig {
        seed: 5,
        frames_per_step: 2,
        ..EnvConfig::default()
    };
    let mut a = QwopEnv::new(config.clone()).unwrap();
    let mut b = QwopEnv::new(config).unwrap();
    a.reset(5);
    b.reset(5);

    for step in 0..40usize {
        let action = (step / 3) % 16;
        let (left, right) = match (a.step(action), b.step(action)) {
            (Ok(left), Ok(right)) => (left, right),
            (Err(left), Err(right)) => {
                assert_eq!(left, right);
                break;
            }
            other => panic!("envs disagree at step {step}: {other:?}"),
        };
        assert_eq!(left, right);
        for part in BodyPart::ALL {
            let (sa, sb) = (a.sim().body_state(part), b.sim().body_state(part));
            assert!((sa.x - sb.x).abs() <= 1e-6 && (sa.y - sb.y).abs() <= 1e-6);
        }
    }
}

#[test]
fn recorded_trace_round_trips_through_verification() {
    let config = EnvConfig {
        seed: 0xBEEF,
        frames_per_step: 4,
        reduced_action_set: true,
        ..EnvConfig::default()
    };
    let actions: Vec<u8> = [1u8, 1, 7, 7, 2, 2, 6, 6].repeat(10);
    let bytes = record_trace(&config, &actions).unwrap();

    let view = parse_trace(&bytes, MAX_STEPS_DEFAULT).unwrap();
    assert_eq!(view.header.seed, 0xBEEF);
    assert!(view.header.reduced_action_set());

    let report = verify_trace(&bytes, MAX_STEPS_DEFAULT).unwrap();
    assert_eq!(report.step_count, view.header.step_count);
    assert_eq!(report.outcome_flags, view.footer.outcome_flags);
}

#[test]
fn corrupted_trace_is_rejected() {
    let config = EnvConfig {
        seed: 3,
        ..EnvConfig::default()
    };
    let mut bytes = record_trace(&config, &[0u8; 10]).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(matches!(
        verify_trace(&bytes, MAX_STEPS_DEFAULT),
        Err(TraceError::CrcMismatch { .. })
    ));
}

#[test]
fn high_score_survives_reset() {
    let mut sim = started_loop(9);
    for _ in 0..60 {
        sim.update(PHYSICS_TIMESTEP);
    }
    let before = sim.game_state().high_score;
    sim.reset(None);
    assert!(sim.game_state().high_score >= before);
    assert_eq!(sim.seed(), 9);
}
