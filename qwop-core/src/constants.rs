// Constants for the QWOP ragdoll simulation.
// Lengths are metres unless suffixed _PX; world y grows downward.

// Trace format constants
pub const TRACE_MAGIC: u32 = 0x5254_5751; // "QWTR"
pub const TRACE_VERSION: u8 = 1;
pub const TRACE_HEADER_SIZE: usize = 16;
pub const TRACE_FOOTER_SIZE: usize = 12;
pub const TRACE_FLAG_REDUCED_ACTIONS: u8 = 0x01;
pub const MAX_STEPS_DEFAULT: u32 = 20_000;

pub const OUTCOME_FALLEN: u8 = 0x01;
pub const OUTCOME_JUMPED: u8 = 0x02;
pub const OUTCOME_JUMP_LANDED: u8 = 0x04;
pub const OUTCOME_GAME_ENDED: u8 = 0x08;

// World
pub const WORLD_SCALE: f64 = 20.0; // pixels per metre
pub const GRAVITY_X: f64 = 0.0;
pub const GRAVITY_Y: f64 = 10.0;
pub const PHYSICS_TIMESTEP: f64 = 0.04;
pub const VELOCITY_ITERATIONS: i32 = 5;
pub const POSITION_ITERATIONS: i32 = 5;

// Course
pub const SAND_PIT_AT_PX: f64 = 20_000.0;
pub const JUMP_TRIGGER_OFFSET_PX: f64 = 220.0;
pub const LEVEL_SIZE_PX: f64 = 21_000.0;
pub const SCREEN_WIDTH_PX: f64 = 640.0;

// Track (static ground segments)
pub const GROUND_SEGMENTS: usize = 3;
pub const TRACK_Y: f64 = 10.74275;
pub const TRACK_HALF_HEIGHT: f64 = 1.6;
pub const TRACK_FRICTION: f64 = 0.2;
pub const TRACK_DENSITY: f64 = 30.0;
pub const GROUND_MOVE_EPSILON: f64 = 0.001;

// Collision filtering
pub const CATEGORY_GROUND: u16 = 0x0001;
pub const CATEGORY_PLAYER: u16 = 0x0002;
pub const MASK_ALL: u16 = 0xFFFF;
pub const MASK_NO_SELF: u16 = 0xFFFD;

// Balance / loop bookkeeping
pub const HEAD_TORQUE_FACTOR: f64 = -4.0;
pub const HEAD_TORQUE_OFFSET: f64 = 0.2;
pub const SPEED_WINDOW_CAPACITY: usize = 30;
pub const IMPACT_SOUND_THRESHOLD: f64 = 5.0;
pub const CONTACT_SCAN_FLOOR: f64 = -100_000.0;

// Camera (pixels, except the thresholds noted)
pub const CAMERA_VERTICAL_THRESHOLD: f64 = -5.0; // metres
pub const CAMERA_VERTICAL_OFFSET_PX: f64 = -210.0;
pub const CAMERA_HORIZONTAL_OFFSET: f64 = -14.0; // metres
pub const INITIAL_CAMERA_X_PX: f64 = -200.0;
pub const INITIAL_CAMERA_Y_PX: f64 = -200.0;

// Motor commands (rad/s)
pub const HIP_SPEED: f64 = 2.5;
pub const SHOULDER_SPEED: f64 = 2.0;
pub const ELBOW_SPEED: f64 = 10.0;
pub const KNEE_SPEED: f64 = 2.5;

// Hip limit pairs (lower, upper) selected by the o/p axis
pub const LEFT_HIP_LIMITS_DEFAULT: (f64, f64) = (-1.5, 0.5);
pub const RIGHT_HIP_LIMITS_DEFAULT: (f64, f64) = (-1.3, 0.7);
pub const LEFT_HIP_LIMITS_O: (f64, f64) = (-1.0, 1.0);
pub const RIGHT_HIP_LIMITS_O: (f64, f64) = (-1.3, 0.7);
pub const LEFT_HIP_LIMITS_P: (f64, f64) = (-1.5, 0.5);
pub const RIGHT_HIP_LIMITS_P: (f64, f64) = (-0.8, 1.2);

// Observation
pub const OBSERVATION_LEN: usize = 60;
pub const OBS_POS_X_RANGE: (f64, f64) = (-10.0, 1050.0);
pub const OBS_POS_Y_RANGE: (f64, f64) = (-10.0, 10.0);
pub const OBS_ANGLE_RANGE: (f64, f64) = (-6.0, 6.0);
pub const OBS_VEL_X_RANGE: (f64, f64) = (-20.0, 60.0);
pub const OBS_VEL_Y_RANGE: (f64, f64) = (-25.0, 60.0);

// Episode reward defaults
pub const DEFAULT_FAILURE_COST: f64 = 10.0;
pub const DEFAULT_SUCCESS_REWARD: f64 = 50.0;
pub const DEFAULT_TIME_COST_MULT: f64 = 10.0;
pub const DEFAULT_SPEED_REW_MULT: f64 = 0.01;
pub const MIN_REWARD_DT: f64 = 1e-8;
pub const PROTOCOL_CLOCK_HZ: f64 = 30.0;

pub const SPAWN_TOLERANCE: f64 = 1e-6;
