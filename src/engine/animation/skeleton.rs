// Runtime skeleton: joint hierarchy, rest pose and local-to-model

use anyhow::Result;
use glam::{Mat4, Quat, Vec3};

use crate::engine::assets::SkeletonData;
use crate::engine::fetch::Resource;

/// Local transform of one joint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPose {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl JointPose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for JointPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Joint hierarchy with parents before children
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    names: Vec<String>,
    parents: Vec<Option<usize>>,
    rest_pose: Vec<JointPose>,
}

impl Skeleton {
    pub fn new(data: &SkeletonData) -> Result<Self> {
        data.validate()?;
        let names = data.joints.iter().map(|joint| joint.name.clone()).collect();
        let parents = data
            .joints
            .iter()
            .map(|joint| usize::try_from(joint.parent).ok())
            .collect();
        let rest_pose = data
            .joints
            .iter()
            .map(|joint| JointPose {
                translation: Vec3::from_array(joint.translation),
                rotation: Quat::from_array(joint.rotation).normalize(),
                scale: Vec3::from_array(joint.scale),
            })
            .collect();
        Ok(Self {
            names,
            parents,
            rest_pose,
        })
    }

    /// Move the joints out, leaving an empty skeleton
    pub fn transfer(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_owning(&self) -> bool {
        !self.names.is_empty()
    }

    pub fn joint_count(&self) -> usize {
        self.names.len()
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn joint_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    pub fn rest_pose(&self) -> &[JointPose] {
        &self.rest_pose
    }

    /// Compose local poses down the hierarchy into model-space matrices
    pub fn local_to_model(&self, locals: &[JointPose]) -> Vec<Mat4> {
        let mut models: Vec<Mat4> = Vec::with_capacity(locals.len());
        for (index, local) in locals.iter().enumerate().take(self.joint_count()) {
            let local = local.to_mat4();
            let model = match self.parent(index) {
                Some(parent) => models[parent] * local,
                None => local,
            };
            models.push(model);
        }
        models
    }
}

impl Resource for Skeleton {
    type Context = ();
}
