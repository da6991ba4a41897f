use std::cell::RefCell;
use std::rc::Rc;

use box2d_rs::b2_body::*;
use box2d_rs::b2_collision::*;
use box2d_rs::b2_contact::*;
use box2d_rs::b2_fixture::*;
use box2d_rs::b2_joint::*;
use box2d_rs::b2_math::*;
use box2d_rs::b2_world::*;
use box2d_rs::b2_world_callbacks::*;
use box2d_rs::b2rs_common::UserDataType;
use box2d_rs::joints::b2_revolute_joint::*;
use box2d_rs::shapes::b2_polygon_shape::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SimConfig;
use crate::constants::GROUND_MOVE_EPSILON;
use crate::contact::{ContactEvent, ContactHandler};
use crate::skeleton::{BodyPart, JointName, BODY_COUNT, JOINT_COUNT};

/// Identity attached to every physics body; contacts are classified by it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BodyTag {
    #[default]
    Untagged,
    Track,
    Part(BodyPart),
}

#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct QwopUserData;

impl UserDataType for QwopUserData {
    type Fixture = ();
    type Body = BodyTag;
    type Joint = ();
}

pub type QwopBody = BodyPtr<QwopUserData>;
pub type QwopJoint = B2jointPtr<QwopUserData>;

/// Pose and velocity of one body: position, angle and linear velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub vx: f64,
    pub vy: f64,
}

pub struct RigidBodyWorld {
    config: SimConfig,
    world: Option<B2worldPtr<QwopUserData>>,
    ground: Vec<QwopBody>,
    bodies: [Option<QwopBody>; BODY_COUNT],
    joints: [Option<QwopJoint>; JOINT_COUNT],
    contact_handler: Option<Rc<RefCell<dyn ContactHandler>>>,
}

impl RigidBodyWorld {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            world: None,
            ground: Vec::new(),
            bodies: std::array::from_fn(|_| None),
            joints: std::array::from_fn(|_| None),
            contact_handler: None,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.world.is_some()
    }

    /// Builds the world, the ground and the ragdoll. Calling it again is a no-op.
    pub fn initialize(&mut self) {
        if self.world.is_some() {
            return;
        }

        let (gx, gy) = self.config.gravity;
        let world = B2world::<QwopUserData>::new(vec2(gx, gy));
        if let Some(handler) = &self.contact_handler {
            install_listener(&world, handler.clone());
        }
        self.world = Some(world);

        self.create_ground();
        self.create_player();
        debug!(
            ground_segments = self.ground.len(),
            bodies = BODY_COUNT,
            joints = JOINT_COUNT,
            "physics world initialized"
        );
    }

    /// Routes contact-begin events to `handler` from inside `step`.
    pub fn set_contact_handler(&mut self, handler: Rc<RefCell<dyn ContactHandler>>) {
        if let Some(world) = &self.world {
            install_listener(world, handler.clone());
        }
        self.contact_handler = Some(handler);
    }

    pub fn step(&mut self, dt: f64) {
        self.world()
            .borrow_mut()
            .step(
                dt as f32,
                self.config.velocity_iterations,
                self.config.position_iterations,
            );
    }

    /// Destroys and recreates the ragdoll; the ground is kept.
    pub fn reset(&mut self) {
        let world = self.world().clone();

        for slot in self.joints.iter_mut() {
            if let Some(joint) = slot.take() {
                world.borrow_mut().destroy_joint(joint);
            }
        }
        for slot in self.bodies.iter_mut() {
            if let Some(body) = slot.take() {
                world.borrow_mut().destroy_body(body);
            }
        }

        self.create_player();
        debug!("ragdoll recreated at spawn pose");
    }

    /// Keeps the ground tiles under the camera. Returns how many segments moved.
    pub fn reposition_ground(&mut self, camera_x: f64) -> usize {
        let screen_width = self.config.screen_width;
        let world_scale = self.config.world_scale;
        let first_tile = (camera_x / screen_width).floor();
        let mut moved = 0;

        for (i, segment) in self.ground.iter().enumerate() {
            let target_x = (first_tile + i as f64) * screen_width / world_scale;
            let (position, angle) = {
                let body = segment.borrow();
                (body.get_position(), body.get_angle())
            };
            if (target_x - position.x as f64).abs() > GROUND_MOVE_EPSILON {
                segment
                    .borrow_mut()
                    .set_transform(B2vec2::new(target_x as f32, position.y), angle);
                moved += 1;
            }
        }

        moved
    }

    pub fn get_body(&self, part: BodyPart) -> Option<QwopBody> {
        self.bodies[part.index()].clone()
    }

    pub fn get_body_by_name(&self, name: &str) -> Option<QwopBody> {
        BodyPart::from_name(name).and_then(|part| self.get_body(part))
    }

    pub fn get_joint(&self, joint: JointName) -> Option<QwopJoint> {
        self.joints[joint.index()].clone()
    }

    pub fn get_joint_by_name(&self, name: &str) -> Option<QwopJoint> {
        JointName::from_name(name).and_then(|joint| self.get_joint(joint))
    }

    pub fn body_state(&self, part: BodyPart) -> BodyState {
        read_state(&self.body(part))
    }

    pub fn try_body_state(&self, part: BodyPart) -> Option<BodyState> {
        self.bodies[part.index()].as_ref().map(read_state)
    }

    pub fn world_center(&self, part: BodyPart) -> (f64, f64) {
        let center = self.body(part).borrow().get_world_center();
        (center.x as f64, center.y as f64)
    }

    pub fn apply_torque(&mut self, part: BodyPart, torque: f64) {
        self.body(part)
            .borrow_mut()
            .apply_torque(torque as f32, true);
    }

    pub fn set_motor_speed(&mut self, joint: JointName, speed: f64) {
        with_revolute_mut(&self.joint(joint), |revolute| {
            revolute.set_motor_speed(speed as f32)
        });
    }

    pub fn motor_speed(&self, joint: JointName) -> f64 {
        with_revolute(&self.joint(joint), |revolute| revolute.get_motor_speed() as f64)
            .unwrap_or_default()
    }

    pub fn set_limits(&mut self, joint: JointName, lower: f64, upper: f64) {
        with_revolute_mut(&self.joint(joint), |revolute| {
            revolute.set_limits(lower as f32, upper as f32)
        });
    }

    pub fn limits(&self, joint: JointName) -> (f64, f64) {
        with_revolute(&self.joint(joint), |revolute| {
            (
                revolute.get_lower_limit() as f64,
                revolute.get_upper_limit() as f64,
            )
        })
        .unwrap_or_default()
    }

    pub fn joint_angle(&self, joint: JointName) -> f64 {
        with_revolute(&self.joint(joint), |revolute| revolute.get_joint_angle() as f64)
            .unwrap_or_default()
    }

    pub fn ground_positions(&self) -> Vec<(f64, f64)> {
        self.ground
            .iter()
            .map(|segment| {
                let position = segment.borrow().get_position();
                (position.x as f64, position.y as f64)
            })
            .collect()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.iter().filter(|slot| slot.is_some()).count()
    }

    fn world(&self) -> &B2worldPtr<QwopUserData> {
        match &self.world {
            Some(world) => world,
            None => panic!("RigidBodyWorld used before initialize()"),
        }
    }

    fn body(&self, part: BodyPart) -> QwopBody {
        match &self.bodies[part.index()] {
            Some(body) => body.clone(),
            None => panic!("body {} does not exist", part.name()),
        }
    }

    fn joint(&self, joint: JointName) -> QwopJoint {
        match &self.joints[joint.index()] {
            Some(handle) => handle.clone(),
            None => panic!("joint {} does not exist", joint.name()),
        }
    }

    fn create_ground(&mut self) {
        let world = self.world().clone();
        let track = self.config.track;
        let segment_width = self.config.segment_width();

        for i in 0..track.segments {
            let mut body_def = B2bodyDef::default();
            body_def.body_type = B2bodyType::B2StaticBody;
            body_def
                .position
                .set((i as f64 * segment_width) as f32, track.y as f32);
            body_def.angle = 0.0;
            body_def.user_data = Some(BodyTag::Track);
            let body = B2world::create_body(world.clone(), &body_def);

            let mut shape = B2polygonShape::default();
            shape.set_as_box((segment_width / 2.0) as f32, track.half_height as f32);

            let mut fixture_def = B2fixtureDef::default();
            fixture_def.shape = Some(Rc::new(RefCell::new(shape)));
            fixture_def.friction = track.friction as f32;
            fixture_def.restitution = 0.0;
            fixture_def.density = track.density as f32;
            fixture_def.filter.category_bits = track.category_bits;
            fixture_def.filter.mask_bits = track.mask_bits;
            B2body::create_fixture(body.clone(), &fixture_def);

            self.ground.push(body);
        }
    }

    fn create_player(&mut self) {
        let world = self.world().clone();

        for part in BodyPart::CREATION_ORDER {
            let spec = self.config.bodies[part.index()];

            let mut body_def = B2bodyDef::default();
            body_def.body_type = B2bodyType::B2DynamicBody;
            body_def
                .position
                .set(spec.position.0 as f32, spec.position.1 as f32);
            body_def.angle = spec.angle as f32;
            body_def.user_data = Some(BodyTag::Part(part));
            let body = B2world::create_body(world.clone(), &body_def);

            let mut shape = B2polygonShape::default();
            shape.set_as_box(spec.half_width as f32, spec.half_height as f32);

            let mut fixture_def = B2fixtureDef::default();
            fixture_def.shape = Some(Rc::new(RefCell::new(shape)));
            fixture_def.friction = spec.friction as f32;
            fixture_def.restitution = 0.0;
            fixture_def.density = spec.density as f32;
            fixture_def.filter.category_bits = self.config.player_category_bits;
            fixture_def.filter.mask_bits = self.config.player_mask_bits;
            B2body::create_fixture(body.clone(), &fixture_def);

            self.bodies[part.index()] = Some(body);
        }

        for joint in JointName::ALL {
            let spec = self.config.joints[joint.index()];
            let body_a = self.body(spec.body_a);
            let body_b = self.body(spec.body_b);

            let mut joint_def = B2revoluteJointDef::default();
            joint_def.local_anchor_a = body_a
                .borrow()
                .get_local_point(vec2(spec.anchor_a.0, spec.anchor_a.1));
            joint_def.local_anchor_b = body_b
                .borrow()
                .get_local_point(vec2(spec.anchor_b.0, spec.anchor_b.1));
            joint_def.base.body_a = Some(body_a);
            joint_def.base.body_b = Some(body_b);
            joint_def.reference_angle = spec.reference_angle as f32;
            joint_def.enable_limit = true;
            joint_def.lower_angle = spec.lower_angle as f32;
            joint_def.upper_angle = spec.upper_angle as f32;
            joint_def.enable_motor = spec.enable_motor;
            joint_def.max_motor_torque = spec.max_motor_torque as f32;
            joint_def.motor_speed = 0.0;

            let handle = world
                .borrow_mut()
                .create_joint(&B2JointDefEnum::RevoluteJoint(joint_def));
            self.joints[joint.index()] = Some(handle);
        }
    }
}

#[inline]
fn vec2(x: f64, y: f64) -> B2vec2 {
    B2vec2::new(x as f32, y as f32)
}

fn read_state(body: &QwopBody) -> BodyState {
    let body = body.borrow();
    let position = body.get_position();
    let velocity = body.get_linear_velocity();
    BodyState {
        x: position.x as f64,
        y: position.y as f64,
        angle: body.get_angle() as f64,
        vx: velocity.x as f64,
        vy: velocity.y as f64,
    }
}

fn with_revolute<R>(
    joint: &QwopJoint,
    f: impl FnOnce(&B2revoluteJoint<QwopUserData>) -> R,
) -> Option<R> {
    let joint = joint.borrow();
    match joint.as_derived() {
        JointAsDerived::ERevoluteJoint(revolute) => Some(f(revolute)),
        _ => None,
    }
}

fn with_revolute_mut<R>(
    joint: &QwopJoint,
    f: impl FnOnce(&mut B2revoluteJoint<QwopUserData>) -> R,
) -> Option<R> {
    let mut joint = joint.borrow_mut();
    match joint.as_derived_mut() {
        JointAsDerivedMut::ERevoluteJoint(revolute) => Some(f(revolute)),
        _ => None,
    }
}

fn install_listener(world: &B2worldPtr<QwopUserData>, handler: Rc<RefCell<dyn ContactHandler>>) {
    let bridge = Rc::new(RefCell::new(ContactBridge { handler }));
    world.borrow_mut().set_contact_listener(bridge);
}

/// Adapts box2d callbacks into `ContactEvent`s.
struct ContactBridge {
    handler: Rc<RefCell<dyn ContactHandler>>,
}

impl B2contactListener<QwopUserData> for ContactBridge {
    fn begin_contact(&mut self, contact: &mut dyn B2contactDynTrait<QwopUserData>) {
        let base = contact.get_base();
        let body_a = base.get_fixture_a().borrow().get_body();
        let body_b = base.get_fixture_b().borrow().get_body();

        // A fresh manifold keeps unused point slots at the origin.
        let mut manifold = B2worldManifold::default();
        base.get_world_manifold(&mut manifold);

        let (tag_a, velocity_a) = {
            let body = body_a.borrow();
            let v = body.get_linear_velocity();
            (body.get_user_data().unwrap_or_default(), (v.x as f64, v.y as f64))
        };
        let (tag_b, velocity_b) = {
            let body = body_b.borrow();
            let v = body.get_linear_velocity();
            (body.get_user_data().unwrap_or_default(), (v.x as f64, v.y as f64))
        };

        let event = ContactEvent {
            tag_a,
            tag_b,
            points: manifold
                .points
                .iter()
                .map(|point| (point.x as f64, point.y as f64))
                .collect(),
            velocity_a,
            velocity_b,
        };
        self.handler.borrow_mut().begin_contact(&event);
    }

    fn end_contact(&mut self, _contact: &mut dyn B2contactDynTrait<QwopUserData>) {}

    fn pre_solve(
        &mut self,
        _contact: &mut dyn B2contactDynTrait<QwopUserData>,
        _old_manifold: &B2manifold,
    ) {
    }

    fn post_solve(
        &mut self,
        _contact: &mut dyn B2contactDynTrait<QwopUserData>,
        _impulse: &B2contactImpulse,
    ) {
    }
}
