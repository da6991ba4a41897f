use serde::{Deserialize, Serialize};

use crate::actions::{FULL_ACTIONS, REDUCED_ACTIONS};
use crate::constants::{
    TRACE_FLAG_REDUCED_ACTIONS, TRACE_FOOTER_SIZE, TRACE_HEADER_SIZE, TRACE_MAGIC, TRACE_VERSION,
};
use crate::error::TraceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceHeader {
    pub magic: u32,
    pub version: u8,
    pub flags: u8,
    pub frames_per_step: u8,
    pub seed: u32,
    pub step_count: u32,
}

impl TraceHeader {
    #[inline]
    pub fn reduced_action_set(&self) -> bool {
        (self.flags & TRACE_FLAG_REDUCED_ACTIONS) != 0
    }

    #[inline]
    pub fn action_count(&self) -> u8 {
        action_count(self.reduced_action_set())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFooter {
    pub score_decimetres: i32,
    pub outcome_flags: u8,
    pub checksum: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceView<'a> {
    pub header: TraceHeader,
    pub actions: &'a [u8],
    pub footer: TraceFooter,
}

/// Everything needed to write a trace besides the action bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceSummary {
    pub seed: u32,
    pub frames_per_step: u8,
    pub reduced_action_set: bool,
    pub score_decimetres: i32,
    pub outcome_flags: u8,
}

#[inline]
fn action_count(reduced: bool) -> u8 {
    if reduced {
        REDUCED_ACTIONS.len() as u8
    } else {
        FULL_ACTIONS.len() as u8
    }
}

pub fn parse_trace(bytes: &[u8], max_steps: u32) -> Result<TraceView<'_>, TraceError> {
    let min_len = TRACE_HEADER_SIZE + TRACE_FOOTER_SIZE;
    if bytes.len() < min_len {
        return Err(TraceError::TraceTooShort {
            actual: bytes.len(),
            min: min_len,
        });
    }

    let magic = read_u32_le(bytes, 0);
    if magic != TRACE_MAGIC {
        return Err(TraceError::InvalidMagic { found: magic });
    }

    let version = bytes[4];
    if version != TRACE_VERSION {
        return Err(TraceError::UnsupportedVersion { found: version });
    }

    let flags = bytes[5];
    if (flags & !TRACE_FLAG_REDUCED_ACTIONS) != 0 {
        return Err(TraceError::UnknownFlags { found: flags });
    }

    let frames_per_step = bytes[6];
    if frames_per_step == 0 {
        return Err(TraceError::FramesPerStepZero);
    }
    if bytes[7] != 0 {
        return Err(TraceError::HeaderReservedNonZero);
    }

    let seed = read_u32_le(bytes, 8);
    let step_count = read_u32_le(bytes, 12);
    if step_count == 0 || step_count > max_steps {
        return Err(TraceError::StepCountOutOfRange {
            step_count,
            max_steps,
        });
    }

    let expected_len = TRACE_HEADER_SIZE + step_count as usize + TRACE_FOOTER_SIZE;
    if bytes.len() != expected_len {
        return Err(TraceError::TraceLengthMismatch {
            expected: expected_len,
            actual: bytes.len(),
        });
    }

    let header = TraceHeader {
        magic,
        version,
        flags,
        frames_per_step,
        seed,
        step_count,
    };

    let actions_start = TRACE_HEADER_SIZE;
    let actions_end = actions_start + step_count as usize;
    let actions = &bytes[actions_start..actions_end];

    let score_decimetres = read_u32_le(bytes, actions_end) as i32;
    let outcome_flags = bytes[actions_end + 4];
    if bytes[actions_end + 5..actions_end + 8].iter().any(|b| *b != 0) {
        return Err(TraceError::FooterReservedNonZero);
    }
    let checksum_offset = actions_end + 8;
    let checksum = read_u32_le(bytes, checksum_offset);

    let computed = crc32_and_validate_actions(
        &bytes[..checksum_offset],
        actions_start,
        actions_end,
        header.action_count(),
    )?;
    if checksum != computed {
        return Err(TraceError::CrcMismatch {
            stored: checksum,
            computed,
        });
    }

    Ok(TraceView {
        header,
        actions,
        footer: TraceFooter {
            score_decimetres,
            outcome_flags,
            checksum,
        },
    })
}

pub fn serialize_trace(summary: &TraceSummary, actions: &[u8]) -> Vec<u8> {
    let total_len = TRACE_HEADER_SIZE + actions.len() + TRACE_FOOTER_SIZE;
    let mut data = vec![0u8; total_len];

    write_u32_le(&mut data, 0, TRACE_MAGIC);
    data[4] = TRACE_VERSION;
    data[5] = if summary.reduced_action_set {
        TRACE_FLAG_REDUCED_ACTIONS
    } else {
        0
    };
    data[6] = summary.frames_per_step;
    data[7] = 0;
    write_u32_le(&mut data, 8, summary.seed);
    write_u32_le(&mut data, 12, actions.len() as u32);

    let body_start = TRACE_HEADER_SIZE;
    let body_end = body_start + actions.len();
    data[body_start..body_end].copy_from_slice(actions);

    write_u32_le(&mut data, body_end, summary.score_decimetres as u32);
    data[body_end + 4] = summary.outcome_flags;

    let checksum = crc32(&data[..body_end + 8]);
    write_u32_le(&mut data, body_end + 8, checksum);

    data
}

#[inline]
fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
fn write_u32_le(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut c = i as u32;
        let mut j = 0;

        while j < 8 {
            c = if (c & 1) != 0 {
                0xEDB8_8320u32 ^ (c >> 1)
            } else {
                c >> 1
            };
            j += 1;
        }

        table[i] = c;
        i += 1;
    }

    table
}

#[inline]
fn crc_update(crc: u32, byte: u8) -> u32 {
    CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// CRC-32 (IEEE).
pub fn crc32(data: &[u8]) -> u32 {
    data.iter().fold(0xFFFF_FFFFu32, |crc, byte| crc_update(crc, *byte)) ^ 0xFFFF_FFFF
}

/// CRC over all of `bytes`, rejecting action bytes outside the set on the way.
fn crc32_and_validate_actions(
    bytes: &[u8],
    actions_start: usize,
    actions_end: usize,
    action_count: u8,
) -> Result<u32, TraceError> {
    let mut crc = 0xFFFF_FFFFu32;

    for (i, byte) in bytes.iter().enumerate() {
        if i >= actions_start && i < actions_end && *byte >= action_count {
            return Err(TraceError::ActionOutOfRange {
                step: (i - actions_start) as u32,
                action: *byte,
                action_count,
            });
        }
        crc = crc_update(crc, *byte);
    }

    Ok(crc ^ 0xFFFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(reduced: bool) -> TraceSummary {
        TraceSummary {
            seed: 0xABCD_1234,
            frames_per_step: 4,
            reduced_action_set: reduced,
            score_decimetres: -37,
            outcome_flags: 0x09,
        }
    }

    fn footer_offset(step_count: usize) -> usize {
        TRACE_HEADER_SIZE + step_count
    }

    fn rewrite_crc(bytes: &mut [u8], step_count: usize) {
        let offset = footer_offset(step_count) + 8;
        let checksum = crc32(&bytes[..offset]);
        write_u32_le(bytes, offset, checksum);
    }

    #[test]
    fn crc_matches_known_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn parses_what_it_writes() {
        let actions = [0u8, 8, 3, 5];
        let bytes = serialize_trace(&summary(true), &actions);
        let trace = parse_trace(&bytes, 100).unwrap();

        assert_eq!(trace.header.seed, 0xABCD_1234);
        assert_eq!(trace.header.step_count, 4);
        assert_eq!(trace.header.frames_per_step, 4);
        assert!(trace.header.reduced_action_set());
        assert_eq!(trace.actions, actions);
        assert_eq!(trace.footer.score_decimetres, -37);
        assert_eq!(trace.footer.outcome_flags, 0x09);
    }

    #[test]
    fn rejects_trace_too_short() {
        let bytes = [0u8; TRACE_HEADER_SIZE + TRACE_FOOTER_SIZE - 1];
        assert!(matches!(
            parse_trace(&bytes, 100),
            Err(TraceError::TraceTooShort { .. })
        ));
    }

    #[test]
    fn rejects_invalid_magic() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        bytes[0] ^= 0x01;
        assert!(matches!(
            parse_trace(&bytes, 100),
            Err(TraceError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        bytes[4] = TRACE_VERSION + 1;
        assert_eq!(
            parse_trace(&bytes, 100),
            Err(TraceError::UnsupportedVersion {
                found: TRACE_VERSION + 1
            })
        );
    }

    #[test]
    fn rejects_unknown_flags() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        bytes[5] = 0x02;
        assert_eq!(
            parse_trace(&bytes, 100),
            Err(TraceError::UnknownFlags { found: 0x02 })
        );
    }

    #[test]
    fn rejects_zero_frames_per_step() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        bytes[6] = 0;
        assert_eq!(parse_trace(&bytes, 100), Err(TraceError::FramesPerStepZero));
    }

    #[test]
    fn rejects_nonzero_header_reserved_byte() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        bytes[7] = 1;
        assert_eq!(
            parse_trace(&bytes, 100),
            Err(TraceError::HeaderReservedNonZero)
        );
    }

    #[test]
    fn rejects_step_count_out_of_range() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        assert_eq!(
            parse_trace(&bytes, 0),
            Err(TraceError::StepCountOutOfRange {
                step_count: 1,
                max_steps: 0
            })
        );
        bytes[12..16].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            parse_trace(&bytes, 100),
            Err(TraceError::StepCountOutOfRange {
                step_count: 0,
                max_steps: 100
            })
        );
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = serialize_trace(&summary(false), &[0, 1]);
        bytes.push(0);
        assert!(matches!(
            parse_trace(&bytes, 100),
            Err(TraceError::TraceLengthMismatch { .. })
        ));
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            parse_trace(&bytes, 100),
            Err(TraceError::TraceLengthMismatch { .. })
        ));
    }

    #[test]
    fn rejects_actions_outside_the_set() {
        let mut bytes = serialize_trace(&summary(true), &[0, 8, 0]);
        bytes[TRACE_HEADER_SIZE + 2] = 9;
        rewrite_crc(&mut bytes, 3);
        assert_eq!(
            parse_trace(&bytes, 100),
            Err(TraceError::ActionOutOfRange {
                step: 2,
                action: 9,
                action_count: 9
            })
        );

        let full = serialize_trace(&summary(false), &[15]);
        assert!(parse_trace(&full, 100).is_ok());
    }

    #[test]
    fn rejects_nonzero_footer_reserved_bytes() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        bytes[footer_offset(1) + 6] = 1;
        assert_eq!(
            parse_trace(&bytes, 100),
            Err(TraceError::FooterReservedNonZero)
        );
    }

    #[test]
    fn rejects_crc_mismatch() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        bytes[footer_offset(1) + 8] ^= 0x01;
        assert!(matches!(
            parse_trace(&bytes, 100),
            Err(TraceError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn footer_claims_are_covered_by_crc() {
        let mut bytes = serialize_trace(&summary(false), &[0]);
        bytes[footer_offset(1)] ^= 0x01; // score
        assert!(matches!(
            parse_trace(&bytes, 100),
            Err(TraceError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn header_corruption_breaks_crc() {
        let mut bytes = serialize_trace(&summary(false), &[0, 1, 2]);
        bytes[8] ^= 0x10; // seed
        assert!(matches!(
            parse_trace(&bytes, 100),
            Err(TraceError::CrcMismatch { .. })
        ));
    }
}
