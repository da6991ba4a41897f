use core::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum SimError {
    ActionOutOfRange { index: usize, action_count: usize },
    BodyTableSize { expected: usize, actual: usize },
    JointTableSize { expected: usize, actual: usize },
    TableOrder { entry: &'static str },
    InvalidTimestep { timestep: f64 },
    InvalidFramesPerStep { frames_per_step: u32 },
    EpisodeEnded,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActionOutOfRange {
                index,
                action_count,
            } => write!(
                f,
                "action index out of range: {index} (allowed 0..{action_count})"
            ),
            Self::BodyTableSize { expected, actual } => {
                write!(f, "body table has {actual} entries, expected {expected}")
            }
            Self::JointTableSize { expected, actual } => {
                write!(f, "joint table has {actual} entries, expected {expected}")
            }
            Self::TableOrder { entry } => write!(f, "table entry out of order: {entry}"),
            Self::InvalidTimestep { timestep } => {
                write!(f, "timestep must be positive, got {timestep}")
            }
            Self::InvalidFramesPerStep { frames_per_step } => write!(
                f,
                "frames_per_step must be in 1..=255, got {frames_per_step}"
            ),
            Self::EpisodeEnded => write!(f, "episode has ended; call reset before stepping"),
        }
    }
}

impl std::error::Error for SimError {}

#[derive(Clone, Debug, PartialEq)]
pub enum TraceError {
    TraceTooShort { actual: usize, min: usize },
    InvalidMagic { found: u32 },
    UnsupportedVersion { found: u8 },
    UnknownFlags { found: u8 },
    HeaderReservedNonZero,
    FramesPerStepZero,
    StepCountOutOfRange { step_count: u32, max_steps: u32 },
    TraceLengthMismatch { expected: usize, actual: usize },
    ActionOutOfRange { step: u32, action: u8, action_count: u8 },
    FooterReservedNonZero,
    CrcMismatch { stored: u32, computed: u32 },
    StepCountMismatch { claimed: u32, computed: u32 },
    ScoreMismatch { claimed: i32, computed: i32 },
    OutcomeMismatch { claimed: u8, computed: u8 },
    Replay(SimError),
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TraceTooShort { actual, min } => {
                write!(f, "trace too short: got {actual} bytes, need at least {min}")
            }
            Self::InvalidMagic { found } => write!(f, "invalid trace magic: 0x{found:08x}"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported trace version: {found}")
            }
            Self::UnknownFlags { found } => write!(f, "unknown trace flags: 0x{found:02x}"),
            Self::HeaderReservedNonZero => write!(f, "header reserved byte is non-zero"),
            Self::FramesPerStepZero => write!(f, "frames_per_step must be at least 1"),
            Self::StepCountOutOfRange {
                step_count,
                max_steps,
            } => write!(
                f,
                "step count out of range: {step_count} (allowed 1..={max_steps})"
            ),
            Self::TraceLengthMismatch { expected, actual } => write!(
                f,
                "trace length mismatch: expected {expected} bytes, got {actual}"
            ),
            Self::ActionOutOfRange {
                step,
                action,
                action_count,
            } => write!(
                f,
                "action {action} at step {step} out of range (allowed 0..{action_count})"
            ),
            Self::FooterReservedNonZero => write!(f, "footer reserved bytes are non-zero"),
            Self::CrcMismatch { stored, computed } => write!(
                f,
                "crc mismatch: stored=0x{stored:08x}, computed=0x{computed:08x}"
            ),
            Self::StepCountMismatch { claimed, computed } => {
                write!(f, "step-count mismatch: claimed={claimed}, computed={computed}")
            }
            Self::ScoreMismatch { claimed, computed } => {
                write!(f, "score mismatch: claimed={claimed}, computed={computed}")
            }
            Self::OutcomeMismatch { claimed, computed } => write!(
                f,
                "outcome mismatch: claimed=0x{claimed:02x}, computed=0x{computed:02x}"
            ),
            Self::Replay(err) => write!(f, "replay failed: {err}"),
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Replay(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SimError> for TraceError {
    fn from(err: SimError) -> Self {
        Self::Replay(err)
    }
}
