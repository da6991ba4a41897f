pub mod actions;
pub mod config;
pub mod constants;
pub mod contact;
pub mod controls;
pub mod env;
pub mod error;
pub mod observation;
pub mod rng;
pub mod sim;
pub mod skeleton;
pub mod trace;
pub mod verify;
pub mod world;

pub use actions::ActionMapper;
pub use config::SimConfig;
pub use contact::GameState;
pub use controls::ControlState;
pub use env::{EnvConfig, QwopEnv, StepInfo, StepOutcome};
pub use error::{SimError, TraceError};
pub use sim::{replay, replay_with_checkpoints, EpisodePhase, SimulationLoop};
pub use verify::{record_trace, verify_trace, TraceReport};
pub use world::RigidBodyWorld;
