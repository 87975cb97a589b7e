// Rigidbody component: passive, kinematic and PD-driven dynamic bodies

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use rapier3d::prelude::{ColliderBuilder, Group, InteractionGroups, RigidBody, RigidBodyBuilder};

use super::transform::TransformComponent;
use crate::core::math::{
    from_isometry, from_rotation, from_vector, project_on_plane, to_isometry, to_vector, WORLD_FORWARD, WORLD_UP,
};
use crate::engine::fetch::Fetched;
use crate::engine::physics::{
    ColliderHandle, CollisionGroup, Contact, PhysicsWorld, RaycastHit, RigidBodyHandle, Shape, MAX_LAYER,
};
use crate::fatal;

/// How far below the shape the ground probe reaches
const GROUND_PROBE: f32 = 0.5;

/// Cast down from `center` against ground colliders
fn probe_ground(physics: &PhysicsWorld, center: Vec3, half_height: f32) -> Option<RaycastHit> {
    let to = center - WORLD_UP * (half_height + GROUND_PROBE);
    physics.raycast_groups(center, to, CollisionGroup::Ground.bits())
}

/// Proportional-derivative gains with a force limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdGains {
    pub kp: f32,
    pub kd: f32,
    pub max: f32,
}

/// Pose a dynamic body is driven toward this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTargets {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// Position-driven body that reports what it touches
#[derive(Debug, Clone)]
pub struct KinematicBody {
    collide_grounds: bool,
    collide_walls: bool,
    /// Bit n set when layer n is sensed
    layers: u32,
    regroup: bool,
    ground: Option<Contact>,
    walls: Vec<Contact>,
    layer_contacts: HashMap<u8, Vec<Contact>>,
    linear_speed: f32,
}

impl KinematicBody {
    fn new() -> Self {
        Self {
            collide_grounds: true,
            collide_walls: true,
            layers: 0,
            regroup: false,
            ground: None,
            walls: Vec::new(),
            layer_contacts: HashMap::new(),
            linear_speed: 0.0,
        }
    }

    pub fn set_collide_grounds(&mut self, enable: bool) -> &mut Self {
        if self.collide_grounds != enable {
            self.collide_grounds = enable;
            self.regroup = true;
        }
        self
    }

    pub fn set_collide_walls(&mut self, enable: bool) -> &mut Self {
        if self.collide_walls != enable {
            self.collide_walls = enable;
            self.regroup = true;
        }
        self
    }

    pub fn set_collide_layer(&mut self, layer: u8, enable: bool) -> &mut Self {
        if layer > MAX_LAYER {
            fatal!("Collision layer {} out of range (max {})", layer, MAX_LAYER);
        }
        let layers = if enable {
            self.layers | (1 << layer)
        } else {
            self.layers & !(1 << layer)
        };
        if layers != self.layers {
            self.layers = layers;
            self.regroup = true;
        }
        self
    }

    /// Ground below the body from the last physics pass
    pub fn ground(&self) -> Option<&Contact> {
        self.ground.as_ref()
    }

    pub fn walls(&self) -> &[Contact] {
        &self.walls
    }

    pub fn layer_contacts(&self, layer: u8) -> &[Contact] {
        self.layer_contacts.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_grounded(&self) -> bool {
        self.ground.is_some()
    }

    pub fn linear_speed(&self) -> f32 {
        self.linear_speed
    }

    /// Every contact, for the debug overlay
    pub(crate) fn all_contacts(&self) -> impl Iterator<Item = &Contact> {
        self.ground
            .iter()
            .chain(self.walls.iter())
            .chain(self.layer_contacts.values().flatten())
    }

    /// Static groups whose contacts are collected
    fn sensed(&self) -> Group {
        let mut groups = Group::NONE;
        if self.collide_walls {
            groups |= CollisionGroup::Wall.bits();
        }
        for layer in 0..=MAX_LAYER {
            if self.layers & (1 << layer) != 0 {
                groups |= CollisionGroup::Layer(layer).bits();
            }
        }
        groups
    }

    fn groups(&self) -> InteractionGroups {
        let mut filter = self.sensed();
        if self.collide_grounds {
            filter |= CollisionGroup::Ground.bits();
        }
        InteractionGroups::new(CollisionGroup::Kinematic.bits(), filter)
    }

    fn collect(&mut self, physics: &PhysicsWorld, collider: ColliderHandle, center: Vec3, half_height: f32) {
        self.ground = None;
        self.walls.clear();
        self.layer_contacts.clear();

        if self.collide_grounds {
            self.ground = probe_ground(physics, center, half_height).map(|hit| Contact {
                position: hit.position,
                normal: hit.normal,
                distance: (center - hit.position).length() - half_height,
            });
        }
        for (group, contact) in physics.contacts(collider, self.sensed()) {
            match group {
                CollisionGroup::Wall => self.walls.push(contact),
                CollisionGroup::Layer(n) => self.layer_contacts.entry(n).or_default().push(contact),
                _ => {}
            }
        }
    }
}

/// Simulated body steered toward motion targets
#[derive(Debug, Clone)]
pub struct DynamicBody {
    mass: f32,
    friction: f32,
    /// Free rotation axes (x, y, z)
    rotations: [bool; 3],
    linear: PdGains,
    angular: PdGains,
    /// Angular gain multiplier while off the ground
    airborne_scale: f32,
    props_dirty: bool,

    targets: Option<MotionTargets>,
    teleport_pending: bool,
    /// Feet position written back by the last physics pass
    last_position: Option<Vec3>,

    force: Vec3,
    torque: Vec3,
    impulse: Vec3,
    torque_impulse: Vec3,

    linear_speed: f32,
    angular_speed: f32,
}

impl DynamicBody {
    fn new() -> Self {
        Self {
            mass: 70.0,
            friction: 1.0,
            rotations: [false, true, false],
            linear: PdGains {
                kp: 1800.0,
                kd: 0.0,
                max: 6000.0,
            },
            angular: PdGains {
                kp: 400.0,
                kd: 0.0,
                max: 1200.0,
            },
            airborne_scale: 0.35,
            props_dirty: false,
            targets: None,
            teleport_pending: false,
            last_position: None,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            impulse: Vec3::ZERO,
            torque_impulse: Vec3::ZERO,
            linear_speed: 0.0,
            angular_speed: 0.0,
        }
    }

    pub fn add_linear_force(&mut self, force: Vec3) -> &mut Self {
        self.force += force;
        self
    }

    pub fn add_angular_force(&mut self, torque: Vec3) -> &mut Self {
        self.torque += torque;
        self
    }

    pub fn add_linear_impulse(&mut self, impulse: Vec3) -> &mut Self {
        self.impulse += impulse;
        self
    }

    pub fn add_angular_impulse(&mut self, impulse: Vec3) -> &mut Self {
        self.torque_impulse += impulse;
        self
    }

    pub fn set_mass(&mut self, mass: f32) -> &mut Self {
        self.mass = mass.max(f32::EPSILON);
        self.props_dirty = true;
        self
    }

    pub fn set_friction(&mut self, friction: f32) -> &mut Self {
        self.friction = friction.max(0.0);
        self.props_dirty = true;
        self
    }

    /// Which rotation axes the solver may turn; only yaw by default
    pub fn set_angular_axes(&mut self, x: bool, y: bool, z: bool) -> &mut Self {
        self.rotations = [x, y, z];
        self.props_dirty = true;
        self
    }

    pub fn set_linear_pd(&mut self, gains: PdGains) -> &mut Self {
        self.linear = gains;
        self
    }

    pub fn set_angular_pd(&mut self, gains: PdGains) -> &mut Self {
        self.angular = gains;
        self
    }

    pub fn set_airborne_scale(&mut self, scale: f32) -> &mut Self {
        self.airborne_scale = scale;
        self
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn linear_pd(&self) -> PdGains {
        self.linear
    }

    pub fn angular_pd(&self) -> PdGains {
        self.angular
    }

    pub fn targets(&self) -> Option<&MotionTargets> {
        self.targets.as_ref()
    }

    pub fn linear_speed(&self) -> f32 {
        self.linear_speed
    }

    pub fn angular_speed(&self) -> f32 {
        self.angular_speed
    }

    /// True when the transform no longer sits where physics left it
    pub(crate) fn moved_externally(&self, feet_position: Vec3) -> bool {
        match self.last_position {
            Some(last) => !last.abs_diff_eq(feet_position, 1e-5),
            None => true,
        }
    }

    fn hold(&mut self, center: Mat4) {
        let (_, rotation, position) = center.to_scale_rotation_translation();
        self.targets = Some(MotionTargets {
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        });
    }

    /// Turn weighted root-motion deltas into targets for this frame.
    ///
    /// `feet` is the entity transform and `deltas` the motion of each track
    /// already scaled by its weight. A transform moved outside physics is a
    /// teleport: the body is snapped there and holds still.
    pub(crate) fn follow_motion(&mut self, feet: Mat4, feet_to_center: Mat4, deltas: &[Mat4], dt: f32) {
        let center = feet * feet_to_center;
        if self.moved_externally(feet.w_axis.truncate()) {
            self.hold(center);
            self.teleport_pending = true;
            return;
        }
        if deltas.is_empty() || dt <= 0.0 {
            self.hold(center);
            return;
        }

        let (_, rotation, position) = center.to_scale_rotation_translation();
        let mut offset = Vec3::ZERO;
        let mut yaw_rate = 0.0;
        for delta in deltas {
            let (_, turn, step) = delta.to_scale_rotation_translation();
            offset += project_on_plane(rotation * step, WORLD_UP);

            let facing = project_on_plane(turn * WORLD_FORWARD, WORLD_UP);
            if facing.length_squared() > f32::EPSILON {
                let yaw = WORLD_FORWARD.cross(facing).dot(WORLD_UP).atan2(WORLD_FORWARD.dot(facing));
                yaw_rate += yaw / dt;
            }
        }
        let count = deltas.len() as f32;
        offset /= count;
        yaw_rate /= count;

        self.targets = Some(MotionTargets {
            position: position + offset,
            rotation: Quat::from_axis_angle(WORLD_UP, yaw_rate * dt) * rotation,
            linear_velocity: offset / dt,
            angular_velocity: WORLD_UP * yaw_rate,
        });
    }

    /// Ground-plane force toward the target position and velocity
    fn linear_force(&self, body: &RigidBody, targets: &MotionTargets) -> Vec3 {
        let position = from_vector(body.translation());
        let velocity = from_vector(body.linvel());
        let force = self.linear.kp * project_on_plane(targets.position - position, WORLD_UP)
            + self.linear.kd * project_on_plane(targets.linear_velocity - velocity, WORLD_UP);
        force.clamp_length_max(self.linear.max)
    }

    /// Yaw torque toward the target facing
    fn angular_force(&self, body: &RigidBody, targets: &MotionTargets, grounded: bool) -> Vec3 {
        let rotation = from_rotation(body.rotation());
        let facing = project_on_plane(rotation * WORLD_FORWARD, WORLD_UP).normalize_or_zero();
        let wanted = project_on_plane(targets.rotation * WORLD_FORWARD, WORLD_UP).normalize_or_zero();
        let yaw_error = facing.cross(wanted).dot(WORLD_UP).atan2(facing.dot(wanted));

        let yaw_rate = from_vector(body.angvel()).dot(WORLD_UP);
        let wanted_rate = targets.angular_velocity.dot(WORLD_UP);
        let scale = if grounded { 1.0 } else { self.airborne_scale };

        let torque = WORLD_UP
            * (self.angular.kp * scale * yaw_error + self.angular.kd * scale * (wanted_rate - yaw_rate));
        torque.clamp_length_max(self.angular.max)
    }

    /// Replace last frame's forces with PD and queued ones, then apply impulses
    fn drive(&mut self, body: &mut RigidBody, grounded: bool) {
        let mut force = self.force;
        let mut torque = self.torque;
        if let Some(targets) = self.targets.take() {
            force += self.linear_force(body, &targets);
            torque += self.angular_force(body, &targets, grounded);
        }

        body.reset_forces(true);
        body.reset_torques(true);
        body.add_force(to_vector(force), true);
        body.add_torque(to_vector(torque), true);
        if self.impulse != Vec3::ZERO {
            body.apply_impulse(to_vector(self.impulse), true);
        }
        if self.torque_impulse != Vec3::ZERO {
            body.apply_torque_impulse(to_vector(self.torque_impulse), true);
        }

        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
        self.impulse = Vec3::ZERO;
        self.torque_impulse = Vec3::ZERO;
    }

    fn groups() -> InteractionGroups {
        InteractionGroups::new(
            CollisionGroup::Dynamic.bits(),
            CollisionGroup::Ground.bits()
                | CollisionGroup::Wall.bits()
                | CollisionGroup::Dynamic.bits()
                | CollisionGroup::Kinematic.bits(),
        )
    }
}

/// Which simulation a rigidbody takes part in
#[derive(Debug, Clone)]
pub enum RigidbodyKind {
    /// Fixed body that blocks others and never moves on its own
    Passive,
    Kinematic(KinematicBody),
    Dynamic(DynamicBody),
}

/// A body in the physics world following or driving an entity transform
#[derive(Debug)]
pub struct RigidbodyComponent {
    shape: Fetched<Shape>,
    kind: RigidbodyKind,
    pub(crate) instance: Option<(RigidBodyHandle, ColliderHandle)>,
}

impl RigidbodyComponent {
    fn with_kind(kind: RigidbodyKind) -> Self {
        Self {
            shape: Fetched::empty(),
            kind,
            instance: None,
        }
    }

    pub fn passive() -> Self {
        Self::with_kind(RigidbodyKind::Passive)
    }

    pub fn kinematic() -> Self {
        Self::with_kind(RigidbodyKind::Kinematic(KinematicBody::new()))
    }

    pub fn dynamic() -> Self {
        Self::with_kind(RigidbodyKind::Dynamic(DynamicBody::new()))
    }

    pub fn use_shape(&mut self, shape: &Fetched<Shape>) -> &mut Self {
        self.shape = shape.clone();
        self
    }

    pub fn kind(&self) -> &RigidbodyKind {
        &self.kind
    }

    pub fn as_kinematic(&self) -> Option<&KinematicBody> {
        match &self.kind {
            RigidbodyKind::Kinematic(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_kinematic_mut(&mut self) -> Option<&mut KinematicBody> {
        match &mut self.kind {
            RigidbodyKind::Kinematic(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynamicBody> {
        match &self.kind {
            RigidbodyKind::Dynamic(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_dynamic_mut(&mut self) -> Option<&mut DynamicBody> {
        match &mut self.kind {
            RigidbodyKind::Dynamic(body) => Some(body),
            _ => None,
        }
    }

    pub fn is_instanced(&self) -> bool {
        self.instance.is_some()
    }

    pub(crate) fn shape(&self) -> &Fetched<Shape> {
        &self.shape
    }

    /// Create the body once the shape is ready, then keep its groups and
    /// material in step with the component
    pub(crate) fn sync(&mut self, physics: &mut PhysicsWorld, transform: Mat4) {
        let Some(shape) = self.shape.try_value() else {
            return;
        };
        let Some((body, collider)) = self.instance else {
            self.instance = Some(self.instantiate(physics, &shape, transform));
            return;
        };

        match &mut self.kind {
            RigidbodyKind::Passive => {}
            RigidbodyKind::Kinematic(kinematic) => {
                if kinematic.regroup {
                    physics.set_collision_groups(collider, kinematic.groups());
                    kinematic.regroup = false;
                }
            }
            RigidbodyKind::Dynamic(dynamic) => {
                if dynamic.props_dirty {
                    if let Some(c) = physics.collider_mut(collider) {
                        c.set_mass(dynamic.mass);
                        c.set_friction(dynamic.friction);
                    }
                    if let Some(b) = physics.rigid_body_mut(body) {
                        let [x, y, z] = dynamic.rotations;
                        b.set_enabled_rotations(x, y, z, true);
                    }
                    dynamic.props_dirty = false;
                }
            }
        }
    }

    fn instantiate(
        &mut self,
        physics: &mut PhysicsWorld,
        shape: &Shape,
        transform: Mat4,
    ) -> (RigidBodyHandle, ColliderHandle) {
        let position = to_isometry(transform * shape.feet_to_center());
        let collider = ColliderBuilder::new(shape.shared().clone());
        let (body, collider) = match &mut self.kind {
            RigidbodyKind::Passive => (
                RigidBodyBuilder::fixed().position(position).build(),
                collider
                    .collision_groups(CollisionGroup::Wall.collider_groups())
                    .build(),
            ),
            RigidbodyKind::Kinematic(kinematic) => {
                kinematic.regroup = false;
                (
                    RigidBodyBuilder::kinematic_position_based().position(position).build(),
                    collider.sensor(true).collision_groups(kinematic.groups()).build(),
                )
            }
            RigidbodyKind::Dynamic(dynamic) => {
                let [x, y, z] = dynamic.rotations;
                dynamic.props_dirty = false;
                // seed the targets so the first frame holds still
                dynamic.teleport_pending = true;
                (
                    RigidBodyBuilder::dynamic()
                        .position(position)
                        .enabled_rotations(x, y, z)
                        .build(),
                    collider
                        .mass(dynamic.mass)
                        .friction(dynamic.friction)
                        .collision_groups(DynamicBody::groups())
                        .build(),
                )
            }
        };
        let body = physics.add_rigid_body(body);
        let collider = physics.add_collider(collider, body);
        (body, collider)
    }

    /// Before the step: push entity transforms into passive and kinematic
    /// bodies, and steer dynamic ones
    pub(crate) fn push(&mut self, physics: &mut PhysicsWorld, transform: Mat4) {
        let (Some((body, _)), Some(shape)) = (self.instance, self.shape.try_value()) else {
            return;
        };
        let center = transform * shape.feet_to_center();

        match &mut self.kind {
            RigidbodyKind::Passive | RigidbodyKind::Kinematic(_) => {
                physics.set_body_transform(body, center);
            }
            RigidbodyKind::Dynamic(dynamic) => {
                if dynamic.teleport_pending || dynamic.moved_externally(transform.w_axis.truncate()) {
                    physics.set_body_transform(body, center);
                    if let Some(b) = physics.rigid_body_mut(body) {
                        b.set_linvel(to_vector(Vec3::ZERO), true);
                        b.set_angvel(to_vector(Vec3::ZERO), true);
                    }
                    dynamic.hold(center);
                    dynamic.teleport_pending = false;
                }
                let grounded =
                    probe_ground(physics, center.w_axis.truncate(), shape.half_height()).is_some();
                if let Some(b) = physics.rigid_body_mut(body) {
                    dynamic.drive(b, grounded);
                }
            }
        }
    }

    /// After the step: collect kinematic contacts and write dynamic bodies
    /// back to their transforms
    pub(crate) fn collect(&mut self, physics: &PhysicsWorld, transform: &mut TransformComponent) {
        let (Some((body, collider)), Some(shape)) = (self.instance, self.shape.try_value()) else {
            return;
        };
        let Some(rigid_body) = physics.rigid_body(body) else {
            return;
        };

        match &mut self.kind {
            RigidbodyKind::Passive => {}
            RigidbodyKind::Kinematic(kinematic) => {
                let center = from_vector(rigid_body.translation());
                kinematic.collect(physics, collider, center, shape.half_height());
                kinematic.linear_speed = rigid_body.linvel().norm();
            }
            RigidbodyKind::Dynamic(dynamic) => {
                let feet = from_isometry(rigid_body.position()) * shape.center_to_feet();
                transform.set_transform_warp(feet);
                dynamic.last_position = Some(transform.position());
                dynamic.linear_speed = rigid_body.linvel().norm();
                dynamic.angular_speed = rigid_body.angvel().norm();
            }
        }
    }

    pub(crate) fn remove(&mut self, physics: &mut PhysicsWorld) {
        if let Some((body, _)) = self.instance.take() {
            physics.remove_rigid_body(body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::GeometryData;
    use crate::engine::physics::ShapeKind;
    use approx::assert_relative_eq;

    fn unit_box() -> Fetched<Shape> {
        Fetched::ready(Shape::new(&GeometryData::cube(), ShapeKind::Box).unwrap())
    }

    fn floor(physics: &mut PhysicsWorld) {
        let body = physics.add_rigid_body(RigidBodyBuilder::fixed().build());
        physics.add_collider(
            ColliderBuilder::cuboid(20.0, 0.5, 20.0)
                .translation(rapier3d::na::Vector3::new(0.0, -0.5, 0.0))
                .collision_groups(CollisionGroup::Ground.collider_groups())
                .build(),
            body,
        );
    }

    fn step(rigidbody: &mut RigidbodyComponent, physics: &mut PhysicsWorld, transform: &mut TransformComponent) {
        rigidbody.sync(physics, transform.matrix());
        rigidbody.push(physics, transform.matrix());
        physics.step(physics.timestep());
        rigidbody.collect(physics, transform);
    }

    #[test]
    fn test_dynamic_defaults() {
        let rigidbody = RigidbodyComponent::dynamic();
        let dynamic = rigidbody.as_dynamic().unwrap();
        assert_eq!(dynamic.mass(), 70.0);
        assert_eq!(dynamic.linear_pd().kp, 1800.0);
        assert_eq!(dynamic.linear_pd().max, 6000.0);
        assert_eq!(dynamic.angular_pd().kp, 400.0);
        assert_eq!(dynamic.angular_pd().max, 1200.0);
        assert!(rigidbody.as_kinematic().is_none());
    }

    #[test]
    fn test_kinematic_reports_ground() {
        let mut physics = PhysicsWorld::default();
        floor(&mut physics);
        let mut transform = TransformComponent::from_position(Vec3::new(0.0, 0.05, 0.0));
        let mut rigidbody = RigidbodyComponent::kinematic();
        rigidbody.use_shape(&unit_box());

        step(&mut rigidbody, &mut physics, &mut transform);
        step(&mut rigidbody, &mut physics, &mut transform);

        let kinematic = rigidbody.as_kinematic().unwrap();
        assert!(kinematic.is_grounded());
        assert_relative_eq!(kinematic.ground().unwrap().normal.y, 1.0, epsilon = 1e-4);
        assert!(kinematic.walls().is_empty());
        assert!(kinematic.layer_contacts(3).is_empty());

        rigidbody.as_kinematic_mut().unwrap().set_collide_grounds(false);
        step(&mut rigidbody, &mut physics, &mut transform);
        assert!(!rigidbody.as_kinematic().unwrap().is_grounded());
    }

    #[test]
    fn test_kinematic_layer_toggle_is_idempotent() {
        let mut kinematic = KinematicBody::new();
        kinematic.set_collide_layer(2, true);
        assert!(kinematic.regroup);
        kinematic.regroup = false;
        kinematic.set_collide_layer(2, true).set_collide_walls(true);
        assert!(!kinematic.regroup);
        assert!(kinematic.sensed().contains(CollisionGroup::Layer(2).bits()));
    }

    #[test]
    fn test_dynamic_writes_back_transform() {
        let mut physics = PhysicsWorld::default();
        let mut transform = TransformComponent::from_position(Vec3::new(0.0, 10.0, 0.0));
        let mut rigidbody = RigidbodyComponent::dynamic();
        rigidbody.use_shape(&unit_box());

        for _ in 0..10 {
            step(&mut rigidbody, &mut physics, &mut transform);
        }
        assert!(transform.position().y < 10.0);
        assert!(rigidbody.as_dynamic().unwrap().linear_speed() > 0.0);
        assert!(!rigidbody.as_dynamic().unwrap().moved_externally(transform.position()));
    }

    #[test]
    fn test_teleport_resets_velocity() {
        let mut physics = PhysicsWorld::default();
        let mut transform = TransformComponent::from_position(Vec3::new(0.0, 10.0, 0.0));
        let mut rigidbody = RigidbodyComponent::dynamic();
        rigidbody.use_shape(&unit_box());
        for _ in 0..10 {
            step(&mut rigidbody, &mut physics, &mut transform);
        }

        transform.set_position_warp(Vec3::new(5.0, 20.0, 0.0));
        rigidbody.push(&mut physics, transform.matrix());
        let (body, _) = rigidbody.instance.unwrap();
        let b = physics.rigid_body(body).unwrap();
        assert_relative_eq!(b.linvel().norm(), 0.0);
        assert_relative_eq!(b.translation().x, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_motion_targets_pull_body() {
        let mut physics = PhysicsWorld::new(Vec3::ZERO, 1.0 / 60.0, 5);
        let mut transform = TransformComponent::new();
        let mut rigidbody = RigidbodyComponent::dynamic();
        rigidbody.use_shape(&unit_box());
        step(&mut rigidbody, &mut physics, &mut transform);

        let dt = 1.0 / 60.0;
        for _ in 0..30 {
            let feet = transform.matrix();
            let delta = Mat4::from_translation(Vec3::new(0.0, 0.0, 0.2));
            rigidbody
                .as_dynamic_mut()
                .unwrap()
                .follow_motion(feet, Mat4::IDENTITY, &[delta], dt);
            step(&mut rigidbody, &mut physics, &mut transform);
        }
        assert!(transform.position().z > 0.1);
        assert_relative_eq!(transform.position().x, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_follow_motion_averages_yaw() {
        let mut dynamic = DynamicBody::new();
        dynamic.last_position = Some(Vec3::ZERO);
        let turn = Mat4::from_rotation_y(0.1);
        dynamic.follow_motion(Mat4::IDENTITY, Mat4::IDENTITY, &[turn, Mat4::IDENTITY], 0.1);

        let targets = dynamic.targets().unwrap();
        assert_relative_eq!(targets.angular_velocity.y, 0.5, epsilon = 1e-4);
        assert!(!dynamic.teleport_pending);
    }
}
