// Animator component: named clips, their controllers and tracks

use std::collections::BTreeMap;

use glam::Mat4;

use crate::core::math::interpolate;
use crate::engine::animation::{blend, Animation, AnimationController, EventTrack, MotionTrack, Skeleton};
use crate::engine::fetch::Fetched;
use crate::fatal;

/// Skeletal animation state of an entity
///
/// Every clip is registered under a name; motion and event tracks attach to
/// an existing clip name and follow its controller.
#[derive(Debug, Default)]
pub struct AnimatorComponent {
    skeleton: Fetched<Skeleton>,
    animations: BTreeMap<String, Fetched<Animation>>,
    motion_tracks: BTreeMap<String, Fetched<MotionTrack>>,
    event_tracks: BTreeMap<String, Fetched<EventTrack>>,
    controllers: BTreeMap<String, AnimationController>,
    /// Model-space joint matrices from the last motion pass
    model_transforms: Vec<Mat4>,
}

impl AnimatorComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_skeleton(&mut self, skeleton: &Fetched<Skeleton>) -> &mut Self {
        self.skeleton = skeleton.clone();
        self
    }

    /// Register a clip; a new name gets a stopped controller
    pub fn use_animation(&mut self, name: &str, animation: &Fetched<Animation>) -> &mut Self {
        self.animations.insert(name.to_string(), animation.clone());
        self.controllers.entry(name.to_string()).or_default();
        self
    }

    /// Root motion for the clip `name`
    pub fn use_motion_track(&mut self, name: &str, track: &Fetched<MotionTrack>) -> &mut Self {
        self.require(name, "motion track");
        self.motion_tracks.insert(name.to_string(), track.clone());
        self
    }

    /// Events for the clip `name`
    pub fn use_event_track(&mut self, name: &str, track: &Fetched<EventTrack>) -> &mut Self {
        self.require(name, "event track");
        self.event_tracks.insert(name.to_string(), track.clone());
        self
    }

    fn require(&self, name: &str, what: &str) {
        if !self.animations.contains_key(name) {
            fatal!("Cannot attach a {} to unknown animation '{}'", what, name);
        }
    }

    pub fn controller(&mut self, name: &str) -> &mut AnimationController {
        match self.controllers.get_mut(name) {
            Some(controller) => controller,
            None => fatal!("Unknown animation '{}'", name),
        }
    }

    pub fn has_animation(&self, name: &str) -> bool {
        self.animations.contains_key(name)
    }

    pub fn skeleton(&self) -> &Fetched<Skeleton> {
        &self.skeleton
    }

    pub fn model_transforms(&self) -> &[Mat4] {
        &self.model_transforms
    }

    /// Model-space transform of the joint `name`, once a pose was computed
    pub fn bone_transform(&self, name: &str) -> Option<Mat4> {
        let skeleton = self.skeleton.try_value()?;
        let index = skeleton.joint_index(name)?;
        self.model_transforms.get(index).copied()
    }

    /// Realize whatever has arrived
    pub(crate) fn poll(&self) {
        self.skeleton.poll(&mut ());
        for animation in self.animations.values() {
            animation.poll(&mut ());
        }
        for track in self.motion_tracks.values() {
            track.poll(&mut ());
        }
        for track in self.event_tracks.values() {
            track.poll(&mut ());
        }
    }

    /// Step every controller and fire the events it crossed
    pub(crate) fn advance(&mut self, dt: f32) {
        for (name, controller) in self.controllers.iter_mut() {
            controller.advance(dt);
            if let Some(track) = self.event_tracks.get(name).and_then(Fetched::try_value) {
                controller.fire_events(&track);
            }
        }
    }

    /// Blend the ready clips into a pose and store it in model space
    pub(crate) fn animate(&mut self) {
        let Some(skeleton) = self.skeleton.try_value() else {
            return;
        };
        let rest = skeleton.rest_pose();

        let mut layers = Vec::new();
        for (name, animation) in &self.animations {
            let Some(animation) = animation.try_value() else {
                continue;
            };
            if animation.track_count() != skeleton.joint_count() {
                fatal!(
                    "Animation '{}' has {} tracks but the skeleton has {} joints",
                    name,
                    animation.track_count(),
                    skeleton.joint_count()
                );
            }
            let Some(controller) = self.controllers.get(name) else {
                continue;
            };
            if controller.computed_weight() > 0.0 {
                layers.push((
                    animation.sample(controller.time_ratio(), rest),
                    controller.computed_weight(),
                ));
            }
        }
        self.model_transforms = skeleton.local_to_model(&blend(&layers, rest));
    }

    /// Root motion of this frame per weighted track, each already scaled
    /// by its controller weight
    pub(crate) fn root_motion(&self) -> Vec<Mat4> {
        self.motion_tracks
            .iter()
            .filter_map(|(name, track)| {
                let controller = self.controllers.get(name)?;
                let weight = controller.computed_weight();
                if weight <= 0.0 || !controller.stepped() {
                    return None;
                }
                let track = track.try_value()?;
                let delta = track.delta(
                    controller.last_time_ratio(),
                    controller.time_ratio(),
                    controller.has_looped(),
                );
                Some(interpolate(Mat4::IDENTITY, delta, weight.min(1.0)))
            })
            .collect()
    }
}
