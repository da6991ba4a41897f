use super::*;

/// Fixed-step loop that sequences controls, physics, contacts, camera and scoring.
pub struct SimulationLoop {
    world: RigidBodyWorld,
    state: Rc<RefCell<GameState>>,
    controls: ControlState,
    phase: EpisodePhase,
    // Set when a landing ends the game; the ragdoll stops stepping.
    frozen: bool,
    camera: Camera,
    score_time: f64,
    speed_window: VecDeque<f64>,
    seed: u32,
    ticks: u64,
}

impl SimulationLoop {
    pub fn new(config: SimConfig, seed: u32) -> Result<Self, SimError> {
        config.validate()?;

        let state = Rc::new(RefCell::new(GameState::default()));
        let mut world = RigidBodyWorld::new(config);
        world.set_contact_handler(Rc::new(RefCell::new(ContactStateMachine::new(
            state.clone(),
        ))));
        world.initialize();

        Ok(Self {
            world,
            state,
            controls: ControlState::default(),
            phase: EpisodePhase::NotStarted,
            frozen: false,
            camera: Camera::default(),
            score_time: 0.0,
            speed_window: VecDeque::with_capacity(SPEED_WINDOW_CAPACITY),
            seed,
            ticks: 0,
        })
    }

    pub fn update(&mut self, dt: f64) {
        if !matches!(self.phase, EpisodePhase::Paused | EpisodePhase::Ended) {
            self.score_time += dt;
        }

        self.world.reposition_ground(self.camera.x);

        if !self.state.borrow().fallen {
            let angle = self.world.body_state(BodyPart::Head).angle;
            self.world.apply_torque(
                BodyPart::Head,
                HEAD_TORQUE_FACTOR * (angle + HEAD_TORQUE_OFFSET),
            );
        }

        let head_vx = self.world.body_state(BodyPart::Head).vx;
        if self.speed_window.len() == SPEED_WINDOW_CAPACITY {
            self.speed_window.pop_front();
        }
        self.speed_window.push_back(head_vx);

        self.controls.apply(&mut self.world);

        if self.physics_active() {
            let timestep = self.world.config().timestep;
            self.world.step(timestep);
        }

        self.update_camera();

        let (landed, ended) = {
            let state = self.state.borrow();
            (state.jump_landed, state.game_ended)
        };
        if !landed && !ended {
            let (torso_x, _) = self.world.world_center(BodyPart::Torso);
            self.state.borrow_mut().score = score_for(torso_x);
        }

        self.check_termination();
        self.ticks += 1;
    }

    fn physics_active(&self) -> bool {
        match self.phase {
            EpisodePhase::Running => true,
            EpisodePhase::Ended => !self.frozen,
            EpisodePhase::NotStarted | EpisodePhase::Paused => false,
        }
    }

    fn update_camera(&mut self) {
        if self.phase == EpisodePhase::NotStarted {
            return;
        }

        let (x, y) = self.world.world_center(BodyPart::Torso);
        if y < CAMERA_VERTICAL_THRESHOLD {
            self.camera.y = y * WORLD_SCALE + CAMERA_VERTICAL_OFFSET_PX;
        } else if !self.state.borrow().fallen {
            self.camera.x = (x + CAMERA_HORIZONTAL_OFFSET) * WORLD_SCALE;
        }
    }

    fn check_termination(&mut self) {
        let (landed, fallen, ended) = {
            let state = self.state.borrow();
            (state.jump_landed, state.fallen, state.game_ended)
        };
        if ended {
            return;
        }
        if landed {
            self.frozen = true;
            self.end_game();
        } else if fallen {
            self.end_game();
        }
    }

    /// NotStarted -> Running; any other phase is left alone.
    pub fn start(&mut self) {
        if self.phase == EpisodePhase::NotStarted {
            self.phase = EpisodePhase::Running;
            debug!(seed = self.seed, "episode started");
        }
    }

    pub fn toggle_pause(&mut self) {
        self.phase = match self.phase {
            EpisodePhase::Running => EpisodePhase::Paused,
            EpisodePhase::Paused => EpisodePhase::Running,
            other => other,
        };
    }

    /// Latches the end of the episode. Repeated calls are no-ops.
    pub fn end_game(&mut self) -> bool {
        let ended = self.state.borrow_mut().end_game();
        if ended {
            self.phase = EpisodePhase::Ended;
            let state = *self.state.borrow();
            debug!(
                score = state.score,
                high_score = state.high_score,
                success = state.is_success(),
                time = self.score_time,
                "episode ended"
            );
        }
        ended
    }

    /// Back to the spawn pose; only the high score survives.
    pub fn reset(&mut self, seed: Option<u32>) {
        if let Some(seed) = seed {
            self.seed = seed;
        }

        self.controls.reset();
        self.world.reset();

        let high_score = self.state.borrow().high_score;
        *self.state.borrow_mut() = GameState::with_high_score(high_score);

        self.phase = EpisodePhase::NotStarted;
        self.frozen = false;
        self.camera = Camera::default();
        self.score_time = 0.0;
        self.speed_window.clear();
        self.ticks = 0;
        debug!(seed = self.seed, high_score, "simulation reset");
    }

    /// Returns true for q/w/o/p. The first control key starts the episode.
    pub fn key_down(&mut self, key: char) -> bool {
        let handled = self.controls.key_down(key);
        if handled {
            self.start();
        }
        handled
    }

    pub fn key_up(&mut self, key: char) -> bool {
        self.controls.key_up(key)
    }

    pub fn set_controls(&mut self, controls: ControlState) {
        self.controls = controls;
    }

    pub fn apply_action(&mut self, mapper: &ActionMapper, index: usize) -> Result<(), SimError> {
        mapper.apply_action(index, &mut self.controls)?;
        self.start();
        Ok(())
    }

    pub fn controls(&self) -> ControlState {
        self.controls
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase != EpisodePhase::NotStarted
    }

    pub fn is_ended(&self) -> bool {
        self.state.borrow().game_ended
    }

    pub fn game_state(&self) -> GameState {
        *self.state.borrow()
    }

    pub fn world(&self) -> &RigidBodyWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut RigidBodyWorld {
        &mut self.world
    }

    pub fn body_state(&self, part: BodyPart) -> BodyState {
        self.world.body_state(part)
    }

    pub fn raw_observation(&self) -> Observation {
        extract_raw(&self.world)
    }

    pub fn score_time(&self) -> f64 {
        self.score_time
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Mean head x velocity over the last few ticks.
    pub fn average_speed(&self) -> f64 {
        if self.speed_window.is_empty() {
            return 0.0;
        }
        self.speed_window.iter().sum::<f64>() / self.speed_window.len() as f64
    }

    pub fn snapshot(&self) -> LoopSnapshot {
        LoopSnapshot {
            phase: self.phase,
            game: self.game_state(),
            score_time: self.score_time,
            camera: self.camera,
            average_speed: self.average_speed(),
            ticks: self.ticks,
        }
    }
}

#[cfg(test)]
mod tests;
