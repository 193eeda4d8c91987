//! Render system - animation clocks and pose output.
//!
//! Transforms are pushed by the physics systems as entities move; this
//! system owns the animation side of the renderable.

use bevy_ecs::prelude::*;

use super::DeltaTime;
use crate::components::*;

/// Advance animation and sway, then write clip, pose and scale to renderables.
pub fn render_system(
    dt: Res<DeltaTime>,
    mut animated: Query<(&mut AppearanceComponent, Option<&mut Renderable>)>,
    mut plants: Query<(&mut GreeneryComponent, Option<&mut Renderable>), Without<AppearanceComponent>>,
) {
    let delta = dt.0;
    for (mut appearance, renderable) in animated.iter_mut() {
        appearance.update(delta);
        let Some(mut renderable) = renderable else {
            continue;
        };
        let (animation, pose) = (appearance.animation_state(), appearance.pose());
        if renderable.animation != animation || renderable.pose != pose || renderable.scale != appearance.scale {
            renderable.animation = animation;
            renderable.pose = pose;
            renderable.scale = appearance.scale;
            renderable.dirty = true;
        }
    }

    for (mut greenery, renderable) in plants.iter_mut() {
        greenery.update(delta);
        let Some(mut renderable) = renderable else {
            continue;
        };
        let pose = Pose {
            sway: greenery.sway(),
            ..Pose::default()
        };
        if renderable.pose != pose {
            renderable.pose = pose;
            renderable.dirty = true;
        }
    }
}
