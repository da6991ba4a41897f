use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    CONTACT_SCAN_FLOOR, IMPACT_SOUND_THRESHOLD, JUMP_TRIGGER_OFFSET_PX, SAND_PIT_AT_PX,
    WORLD_SCALE,
};
use crate::world::BodyTag;

/// Episode flags and score; the four flags only ever go false -> true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub fallen: bool,
    pub jumped: bool,
    pub jump_landed: bool,
    pub game_ended: bool,
    /// Metres.
    pub score: f64,
    pub high_score: f64,
    pub impact_speed: f64,
}

impl GameState {
    pub fn with_high_score(high_score: f64) -> Self {
        Self {
            high_score,
            ..Self::default()
        }
    }

    pub fn raise_high_score(&mut self) -> bool {
        if self.score > self.high_score {
            self.high_score = self.score;
            true
        } else {
            false
        }
    }

    /// Latches `game_ended`; returns false if it was already set.
    pub fn end_game(&mut self) -> bool {
        if self.game_ended {
            return false;
        }
        self.game_ended = true;
        self.raise_high_score();
        true
    }

    pub fn is_success(&self) -> bool {
        self.game_ended && self.jump_landed && !self.fallen
    }
}

/// Browser `Math.round`: halves go toward positive infinity.
#[inline]
pub fn js_round(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Score in metres for a distance in world units.
#[inline]
pub fn score_for(x: f64) -> f64 {
    js_round(x) / 10.0
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContactEvent {
    pub tag_a: BodyTag,
    pub tag_b: BodyTag,
    /// World manifold points, including unused slots.
    pub points: Vec<(f64, f64)>,
    pub velocity_a: (f64, f64),
    pub velocity_b: (f64, f64),
}

impl ContactEvent {
    pub fn max_x(&self) -> f64 {
        self.points
            .iter()
            .fold(CONTACT_SCAN_FLOOR, |max, point| if point.0 > max { point.0 } else { max })
    }

    pub fn first_y(&self) -> f64 {
        self.points.first().map(|point| point.1).unwrap_or(0.0)
    }

    pub fn relative_speed(&self) -> f64 {
        let dx = self.velocity_a.0 - self.velocity_b.0;
        let dy = self.velocity_a.1 - self.velocity_b.1;
        (dx * dx + dy * dy).sqrt()
    }
}

pub trait ContactHandler {
    fn begin_contact(&mut self, event: &ContactEvent);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImpactSound {
    Crunch,
    Ehh,
}

impl ImpactSound {
    pub fn classify(impact_speed: f64) -> Self {
        if impact_speed > IMPACT_SOUND_THRESHOLD {
            Self::Crunch
        } else {
            Self::Ehh
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crunch => "crunch",
            Self::Ehh => "ehh",
        }
    }
}

/// What a single contact changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContactOutcome {
    pub jumped: bool,
    pub landed: bool,
    pub fell: bool,
}

impl ContactOutcome {
    pub fn is_empty(&self) -> bool {
        !self.jumped && !self.landed && !self.fell
    }
}

/// Applies the track contact rules to `state`.
///
/// Only the ordering with the track as the first participant is evaluated.
pub fn apply_contact(state: &mut GameState, event: &ContactEvent) -> ContactOutcome {
    let mut outcome = ContactOutcome::default();

    if event.tag_a == BodyTag::Untagged || event.tag_b == BodyTag::Untagged {
        return outcome;
    }
    if event.tag_a != BodyTag::Track {
        return outcome;
    }
    let BodyTag::Part(part) = event.tag_b else {
        return outcome;
    };

    let max_x = event.max_x();

    if part.is_foot() {
        if state.game_ended || state.fallen {
            return outcome;
        }
        if !state.jumped && max_x * WORLD_SCALE > SAND_PIT_AT_PX - JUMP_TRIGGER_OFFSET_PX {
            state.jumped = true;
            outcome.jumped = true;
        }
        if state.jumped && !state.jump_landed && max_x * WORLD_SCALE > SAND_PIT_AT_PX {
            state.jump_landed = true;
            outcome.landed = true;
            state.score = score_for(max_x);
            state.raise_high_score();
        }
    } else if part.is_upper_body() {
        if state.fallen {
            return outcome;
        }
        state.fallen = true;
        outcome.fell = true;
        state.impact_speed = event.relative_speed();
        if state.jumped && !state.jump_landed {
            state.jump_landed = true;
            outcome.landed = true;
        }
        state.score = score_for(max_x);
        state.raise_high_score();
    }

    outcome
}

/// Contact handler sharing the loop's `GameState`.
pub struct ContactStateMachine {
    state: Rc<RefCell<GameState>>,
}

impl ContactStateMachine {
    pub fn new(state: Rc<RefCell<GameState>>) -> Self {
        Self { state }
    }
}

impl ContactHandler for ContactStateMachine {
    fn begin_contact(&mut self, event: &ContactEvent) {
        let mut state = self.state.borrow_mut();
        let outcome = apply_contact(&mut state, event);
        if outcome.is_empty() {
            return;
        }

        let max_x_px = event.max_x() * WORLD_SCALE;
        if outcome.jumped {
            debug!(x_px = max_x_px, "jump triggered");
        }
        if outcome.fell {
            debug!(
                x_px = max_x_px,
                contact_y = event.first_y(),
                impact_speed = state.impact_speed,
                sound = ImpactSound::classify(state.impact_speed).as_str(),
                "player fell"
            );
        }
        if outcome.landed {
            debug!(x_px = max_x_px, score = state.score, "jump landed");
        }
    }
}
