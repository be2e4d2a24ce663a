//! Declarative uniform sets shared between passes.
//!
//! A pass lists the sets it consumes; each binding pulls its value out of the
//! [`FrameState`] when the pass starts, so passes that share camera or time
//! uniforms cannot drift apart.

use crate::gpu::UniformValue;

use super::frame::FrameState;
use super::shader::ShaderProgram;

/// Texture units with a fixed meaning across passes. Mesh textures use the
/// low units, counting up from 0.
pub const SKYBOX_UNIT: u32 = 7;
pub const SHADOW_MAP_UNIT: u32 = 8;
pub const DEPTH_MAP_UNIT: u32 = 9;

#[derive(Clone, Copy)]
pub struct UniformBinding {
    pub name: &'static str,
    pub source: fn(&FrameState) -> UniformValue,
}

pub type UniformSet = &'static [UniformBinding];

const fn bind(name: &'static str, source: fn(&FrameState) -> UniformValue) -> UniformBinding {
    UniformBinding { name, source }
}

fn view(f: &FrameState) -> UniformValue {
    f.view.into()
}

fn rotation_only_view(f: &FrameState) -> UniformValue {
    f.rotation_only_view().into()
}

fn projection(f: &FrameState) -> UniformValue {
    f.projection.into()
}

fn camera_position(f: &FrameState) -> UniformValue {
    f.camera_position.into()
}

fn inv_view(f: &FrameState) -> UniformValue {
    f.inv_view.into()
}

fn inv_projection(f: &FrameState) -> UniformValue {
    f.inv_projection.into()
}

fn near(f: &FrameState) -> UniformValue {
    f.near.into()
}

fn far(f: &FrameState) -> UniformValue {
    f.far.into()
}

fn light_space(f: &FrameState) -> UniformValue {
    f.light_space.into()
}

fn use_shadows(f: &FrameState) -> UniformValue {
    f.use_shadows.into()
}

fn elapsed(f: &FrameState) -> UniformValue {
    f.elapsed.into()
}

fn mouse(f: &FrameState) -> UniformValue {
    f.mouse.into()
}

fn resolution(f: &FrameState) -> UniformValue {
    f.resolution.into()
}

fn shadow_map_unit(_: &FrameState) -> UniformValue {
    SHADOW_MAP_UNIT.into()
}

fn depth_map_unit(_: &FrameState) -> UniformValue {
    DEPTH_MAP_UNIT.into()
}

fn skybox_unit(_: &FrameState) -> UniformValue {
    SKYBOX_UNIT.into()
}

pub const CAMERA: UniformSet = &[
    bind("view", view),
    bind("projection", projection),
    bind("viewPos", camera_position),
];

pub const TIME: UniformSet = &[bind("time", elapsed)];

/// Read by every pass that samples the shadow map.
pub const SHADOW_SAMPLING: UniformSet = &[
    bind("lightSpaceMatrix", light_space),
    bind("useShadows", use_shadows),
    bind("shadowMap", shadow_map_unit),
];

pub const SHADOW_CASTING: UniformSet = &[bind("lightSpaceMatrix", light_space)];

pub const SKYBOX: UniformSet = &[
    bind("view", rotation_only_view),
    bind("projection", projection),
];

/// Ray reconstruction and scene-depth occlusion for full-screen raymarching.
pub const RAYMARCH: UniformSet = &[
    bind("invView", inv_view),
    bind("invProjection", inv_projection),
    bind("near", near),
    bind("far", far),
    bind("mouse", mouse),
    bind("resolution", resolution),
    bind("depthMap", depth_map_unit),
    bind("skybox", skybox_unit),
];

pub const SCREEN: UniformSet = &[bind("resolution", resolution)];

/// Pushes each binding of each set onto `program`, which must be bound.
pub fn apply(program: &ShaderProgram, sets: &[UniformSet], frame: &FrameState) {
    for set in sets {
        for binding in set.iter() {
            program.set_uniform(binding.name, (binding.source)(frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn no_set_binds_a_name_twice() {
        for set in [CAMERA, TIME, SHADOW_SAMPLING, SHADOW_CASTING, SKYBOX, RAYMARCH, SCREEN] {
            let names: HashSet<_> = set.iter().map(|b| b.name).collect();
            assert_eq!(names.len(), set.len());
        }
    }

    #[test]
    fn sampler_units_do_not_collide() {
        let units: HashSet<_> = [SKYBOX_UNIT, SHADOW_MAP_UNIT, DEPTH_MAP_UNIT]
            .into_iter()
            .collect();
        assert_eq!(units.len(), 3);
    }
}
