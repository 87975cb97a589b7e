// Mixer pass: listener pose and speaker playback

use glam::Vec3;
use log::{info, warn};

use crate::core::math::WORLD_UP;
use crate::engine::audio::{AudioDevice, ListenerPose};
use crate::engine::ecs::{ListenerComponent, SpeakerComponent, TransformComponent};
use crate::engine::scene::Scene;

/// Listener pose from a transform, with `up` made orthogonal to `forward`
fn listener_pose(transform: &TransformComponent) -> ListenerPose {
    let forward = transform.forward().normalize_or_zero();
    let up = transform.up();
    let mut up = (up - forward * up.dot(forward)).normalize_or_zero();
    if up == Vec3::ZERO {
        up = WORLD_UP;
    }
    ListenerPose {
        position: transform.position(),
        forward,
        up,
    }
}

fn find_listener(scenes: &[Scene]) -> Option<ListenerPose> {
    scenes.iter().find_map(|scene| {
        let mut query = scene.world().query::<(&ListenerComponent, &TransformComponent)>();
        let pose = query.iter().next().map(|(_, (_, transform))| listener_pose(transform));
        pose
    })
}

/// Update the listener, then every speaker in every scene.
///
/// Without a listener entity no speaker is driven. `listener` keeps the pose
/// last sent to the device so it is only updated on change.
pub(crate) fn run(scenes: &mut [Scene], device: &mut (dyn AudioDevice + 'static), listener: &mut Option<ListenerPose>) {
    let Some(pose) = find_listener(scenes) else {
        if listener.take().is_some() {
            info!("Audio listener removed");
        }
        return;
    };
    if *listener != Some(pose) {
        if listener.is_none() {
            info!("Audio listener set at {:?}", pose.position);
        }
        device.set_listener(pose);
        *listener = Some(pose);
    }

    for scene in scenes.iter_mut() {
        let speakers = scene
            .world_mut()
            .query_mut::<(&mut SpeakerComponent, Option<&TransformComponent>)>();
        for (entity, (speaker, transform)) in speakers {
            let (position, forward) = match transform {
                Some(transform) => (transform.position(), transform.forward()),
                None => (Vec3::ZERO, Vec3::Z),
            };
            if let Err(e) = speaker.mix(device, position, forward) {
                warn!("Speaker {:?} failed to mix: {:#}", entity, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::AudioData;
    use crate::engine::audio::{HeadlessAudio, Sound};
    use crate::engine::fetch::Fetched;
    use approx::assert_relative_eq;

    fn speaker(device: &mut HeadlessAudio) -> SpeakerComponent {
        let sound = Fetched::ready(Sound::new(device, &AudioData::new(8, vec![0.0; 8])).unwrap());
        let mut speaker = SpeakerComponent::new();
        speaker.use_sound(&sound).set_play(true);
        speaker
    }

    #[test]
    fn test_speakers_wait_for_listener() {
        let mut device = HeadlessAudio::new();
        let mut scene = Scene::new("audio");
        let speaker = speaker(&mut device);
        scene.spawn((TransformComponent::from_position(Vec3::X), speaker));
        let mut scenes = vec![scene];
        let mut listener = None;

        run(&mut scenes, &mut device, &mut listener);
        assert_eq!(device.voices().count(), 0);
        assert!(device.listener().is_none());

        scenes[0].spawn((TransformComponent::new(), ListenerComponent));
        run(&mut scenes, &mut device, &mut listener);
        let (_, state) = device.voices().next().unwrap();
        assert!(state.playing);
        assert_eq!(state.position, Vec3::X);
        assert!(listener.is_some());
    }

    #[test]
    fn test_listener_up_is_orthogonal() {
        let mut device = HeadlessAudio::new();
        let mut scene = Scene::new("audio");
        // sheared basis: up leans toward forward
        let transform = glam::Mat4::from_cols(
            glam::Vec4::X,
            glam::Vec4::new(0.0, 1.0, 0.5, 0.0),
            glam::Vec4::Z,
            glam::Vec4::new(1.0, 2.0, 3.0, 1.0),
        );
        scene.spawn((TransformComponent::from_matrix(transform), ListenerComponent));
        let mut scenes = vec![scene];

        run(&mut scenes, &mut device, &mut None);
        let pose = device.listener().unwrap();
        assert_relative_eq!(pose.up.dot(pose.forward), 0.0, epsilon = 1e-5);
        assert_relative_eq!(pose.up.length(), 1.0, epsilon = 1e-5);
        assert_eq!(pose.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
