use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::ShaderError;
use crate::gpu::{
    GpuProgram, GpuRef, GpuShader, ProgramId, ShaderStage, UniformLocation, UniformValue,
};

use super::registry::ProgramKind;

/// A linked program plus its lazily filled uniform location cache.
///
/// Programs are never relinked, so a cached location (or a cached miss)
/// stays valid for the program's lifetime.
pub struct ShaderProgram {
    kind: ProgramKind,
    program: GpuProgram,
    locations: RefCell<HashMap<String, Option<UniformLocation>>>,
}

impl ShaderProgram {
    pub fn compile(
        gpu: &GpuRef,
        kind: ProgramKind,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = compile_stage(gpu, kind, ShaderStage::Vertex, vertex_src)?;
        let fragment = compile_stage(gpu, kind, ShaderStage::Fragment, fragment_src)?;

        let id = gpu
            .link_program(&[vertex.id(), fragment.id()])
            .map_err(|log| ShaderError::Link { program: kind, log })?;
        log::debug!("Linked {kind} program");

        Ok(Self {
            kind,
            program: GpuProgram::from_raw(gpu, id),
            locations: RefCell::new(HashMap::new()),
        })
    }

    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub fn id(&self) -> ProgramId {
        self.program.id()
    }

    pub fn gpu(&self) -> &GpuRef {
        self.program.gpu()
    }

    pub fn bind(&self) {
        self.gpu().use_program(Some(self.id()));
    }

    /// Cached location of `name`; queried from the driver on first use only.
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        if let Some(cached) = self.locations.borrow().get(name) {
            return *cached;
        }
        let location = self.gpu().uniform_location(self.id(), name);
        if location.is_none() {
            log::trace!("{} program has no uniform {name:?}", self.kind);
        }
        self.locations.borrow_mut().insert(name.to_owned(), location);
        location
    }

    /// Writes a uniform on this program, which must be bound. Names the
    /// compiled program does not use are ignored.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) {
        if let Some(location) = self.location(name) {
            self.gpu().set_uniform(location, &value.into());
        }
    }
}

fn compile_stage(
    gpu: &GpuRef,
    program: ProgramKind,
    stage: ShaderStage,
    source: &str,
) -> Result<GpuShader, ShaderError> {
    let id = gpu
        .compile_shader(stage, source)
        .map_err(|log| ShaderError::Compile {
            program,
            stage,
            log,
        })?;
    Ok(GpuShader::from_raw(gpu, id))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::gpu::recording::RecordingContext;

    fn program(recorder: &Rc<RecordingContext>) -> ShaderProgram {
        let gpu: GpuRef = recorder.clone();
        ShaderProgram::compile(&gpu, ProgramKind::Mesh, "", "").unwrap()
    }

    #[test]
    fn repeated_uniform_writes_query_location_once() {
        let recorder = Rc::new(RecordingContext::new());
        let program = program(&recorder);
        program.bind();

        program.set_uniform("shininess", 32.0f32);
        program.set_uniform("shininess", 64.0f32);

        assert_eq!(recorder.location_queries(), 1);
        assert_eq!(
            recorder.uniform_writes("shininess"),
            vec![UniformValue::Float(32.0), UniformValue::Float(64.0)]
        );
    }

    #[test]
    fn unknown_uniform_is_ignored_and_cached() {
        let recorder = Rc::new(RecordingContext::new());
        recorder.hide_uniform("unused");
        let program = program(&recorder);

        program.set_uniform("unused", 1);
        program.set_uniform("unused", 2);

        assert_eq!(recorder.location_queries(), 1);
        assert!(recorder.uniform_writes("unused").is_empty());
    }

    #[test]
    fn compile_failure_reports_stage_and_log() {
        let recorder = Rc::new(RecordingContext::new());
        recorder.fail_compilation(ShaderStage::Vertex, "0:1: syntax error");
        let gpu: GpuRef = recorder.clone();

        let err = ShaderProgram::compile(&gpu, ProgramKind::Skybox, "", "")
            .err()
            .unwrap();
        match err {
            ShaderError::Compile { stage, log, .. } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert_eq!(log, "0:1: syntax error");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(recorder.live_objects(), 0);
    }

    #[test]
    fn stages_are_released_after_linking() {
        let recorder = Rc::new(RecordingContext::new());
        let program = program(&recorder);
        assert_eq!(recorder.live_objects(), 1);
        drop(program);
        assert_eq!(recorder.live_objects(), 0);
    }
}
