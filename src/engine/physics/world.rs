// Physics world: rapier sets, fixed-step simulation and queries

use glam::{Mat4, Vec3};
use log::info;
use rapier3d::parry::query;
use rapier3d::prelude::*;

use super::collision::{CollisionGroup, Contact, RaycastHit};
use crate::core::config::RuntimeConfig;
use crate::core::math::{from_isometry, from_vector, to_isometry, to_point, to_vector};

/// Rigid-body simulation shared by every scene
pub struct PhysicsWorld {
    /// Gravity vector (default: -9.81 m/s² in y-axis)
    gravity: Vector<Real>,

    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,

    /// Query pipeline for raycasts and shape overlaps
    query_pipeline: QueryPipeline,

    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,

    /// Unsimulated time carried to the next frame
    accumulator: f32,
    max_substeps: u32,
}

impl PhysicsWorld {
    /// Create a world stepping at `timestep` with at most `max_substeps` per frame
    pub fn new(gravity: Vec3, timestep: f32, max_substeps: u32) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = timestep;

        info!(
            "Physics world created (gravity {:?}, timestep {:.4}s)",
            gravity, timestep
        );
        Self {
            gravity: to_vector(gravity),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            accumulator: 0.0,
            max_substeps: max_substeps.max(1),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            Vec3::from_array(config.gravity),
            config.physics_timestep,
            config.max_substeps,
        )
    }

    /// Advance by `dt` seconds of real time in fixed steps.
    ///
    /// Returns the number of steps taken. Time beyond `max_substeps` steps is
    /// dropped rather than carried over.
    pub fn step(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.max(0.0);
        let timestep = self.integration_parameters.dt;
        let mut steps = 0;
        while self.accumulator >= timestep && steps < self.max_substeps {
            self.step_once();
            self.accumulator -= timestep;
            steps += 1;
        }
        if steps == self.max_substeps {
            self.accumulator = self.accumulator.min(timestep);
        }
        steps
    }

    fn step_once(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Refresh the query structures after moving colliders outside a step
    pub fn update_queries(&mut self) {
        self.query_pipeline.update(&self.rigid_body_set, &self.collider_set);
    }

    pub fn add_rigid_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(body)
    }

    /// Add a collider attached to a rigid body
    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Remove a rigid body and all its attached colliders
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub fn rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    pub fn rigid_body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.collider_set.get(handle)
    }

    pub fn collider_mut(&mut self, handle: ColliderHandle) -> Option<&mut Collider> {
        self.collider_set.get_mut(handle)
    }

    pub fn colliders(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> {
        self.collider_set.iter()
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Re-register a collider with new groups
    pub fn set_collision_groups(&mut self, handle: ColliderHandle, groups: InteractionGroups) {
        if let Some(collider) = self.collider_set.get_mut(handle) {
            collider.set_collision_groups(groups);
        }
    }

    /// Place a body, moving kinematic bodies through their next position
    pub fn set_body_transform(&mut self, handle: RigidBodyHandle, transform: Mat4) {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return;
        };
        let isometry = to_isometry(transform);
        if body.is_kinematic() {
            body.set_next_kinematic_position(isometry);
        } else {
            body.set_position(isometry, true);
        }
    }

    pub fn body_transform(&self, handle: RigidBodyHandle) -> Option<Mat4> {
        self.rigid_body_set
            .get(handle)
            .map(|body| from_isometry(body.position()))
    }

    /// Closest hit on the segment from `from` to `to`
    pub fn raycast(&self, from: Vec3, to: Vec3) -> Option<RaycastHit> {
        self.raycast_filtered(from, to, QueryFilter::default())
    }

    /// Closest hit on the segment against colliders in `groups`
    pub fn raycast_groups(&self, from: Vec3, to: Vec3, groups: Group) -> Option<RaycastHit> {
        let filter = QueryFilter::default().groups(InteractionGroups::new(Group::ALL, groups));
        self.raycast_filtered(from, to, filter)
    }

    fn raycast_filtered(&self, from: Vec3, to: Vec3, filter: QueryFilter) -> Option<RaycastHit> {
        let direction = to - from;
        if direction.length_squared() <= f32::EPSILON {
            return None;
        }
        let ray = Ray::new(to_point(from), to_vector(direction));
        // time_of_impact is a fraction of the segment with an unnormalized direction
        let (collider, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            1.0,
            true,
            filter,
        )?;
        Some(RaycastHit {
            position: from + direction * hit.time_of_impact,
            normal: from_vector(&hit.normal).normalize_or_zero(),
            collider,
        })
    }

    /// Contacts between `handle` and every overlapping collider in `groups`,
    /// tagged with the group of the other collider
    pub fn contacts(&self, handle: ColliderHandle, groups: Group) -> Vec<(CollisionGroup, Contact)> {
        let Some(collider) = self.collider_set.get(handle) else {
            return Vec::new();
        };
        let position = *collider.position();
        let shape = collider.shape();
        let filter = QueryFilter::default()
            .exclude_collider(handle)
            .groups(InteractionGroups::new(Group::ALL, groups));

        let mut found = Vec::new();
        self.query_pipeline.intersections_with_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &position,
            shape,
            filter,
            |other| {
                let Some(other_collider) = self.collider_set.get(other) else {
                    return true;
                };
                let Some(group) = CollisionGroup::from_bits(other_collider.collision_groups().memberships) else {
                    return true;
                };
                if let Ok(Some(contact)) =
                    query::contact(&position, shape, other_collider.position(), other_collider.shape(), 0.0)
                {
                    found.push((
                        group,
                        Contact {
                            position: from_vector(&contact.point2.coords),
                            normal: from_vector(&contact.normal2),
                            distance: contact.dist,
                        },
                    ));
                }
                true
            },
        );
        found
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    pub fn gravity(&self) -> Vec3 {
        from_vector(&self.gravity)
    }

    pub fn timestep(&self) -> f32 {
        self.integration_parameters.dt
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}
