use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ShaderError;
use crate::gpu::GpuRef;

use super::shader::ShaderProgram;

/// The closed set of programs the frame pipeline uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Mesh,
    Shadow,
    Skybox,
    Raymarch,
    Surface,
    Textured,
    Blend,
}

impl ProgramKind {
    pub const COUNT: usize = 7;
    pub const ALL: [ProgramKind; Self::COUNT] = [
        ProgramKind::Mesh,
        ProgramKind::Shadow,
        ProgramKind::Skybox,
        ProgramKind::Raymarch,
        ProgramKind::Surface,
        ProgramKind::Textured,
        ProgramKind::Blend,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgramKind::Mesh => "mesh",
            ProgramKind::Shadow => "shadow",
            ProgramKind::Skybox => "skybox",
            ProgramKind::Raymarch => "raymarch",
            ProgramKind::Surface => "surface",
            ProgramKind::Textured => "textured",
            ProgramKind::Blend => "blend",
        }
    }

    /// `<dir>/<name>.vert` and `<dir>/<name>.frag`.
    pub fn source_paths(self, dir: &Path) -> (PathBuf, PathBuf) {
        (
            dir.join(format!("{}.vert", self.name())),
            dir.join(format!("{}.frag", self.name())),
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProgramKind {
    type Err = ShaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ShaderError::UnknownName(s.to_owned()))
    }
}

/// Compiled programs in a fixed table indexed by [`ProgramKind`].
pub struct ShaderRegistry {
    programs: [Option<ShaderProgram>; ProgramKind::COUNT],
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self {
            programs: std::array::from_fn(|_| None),
        }
    }

    /// Compiles every kind in `kinds` from `<dir>/<name>.{vert,frag}`.
    pub fn load(gpu: &GpuRef, dir: &Path, kinds: &[ProgramKind]) -> Result<Self, ShaderError> {
        let mut registry = Self::new();
        for &kind in kinds {
            let (vert_path, frag_path) = kind.source_paths(dir);
            let vertex = read_source(&vert_path)?;
            let fragment = read_source(&frag_path)?;
            registry.compile(gpu, kind, &vertex, &fragment)?;
        }
        log::info!("Compiled {} shader programs from {:?}", kinds.len(), dir);
        Ok(registry)
    }

    pub fn compile(
        &mut self,
        gpu: &GpuRef,
        kind: ProgramKind,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<(), ShaderError> {
        let program = ShaderProgram::compile(gpu, kind, vertex_src, fragment_src)?;
        self.register(program);
        Ok(())
    }

    /// Stores `program` under its kind, returning any program it replaces.
    pub fn register(&mut self, program: ShaderProgram) -> Option<ShaderProgram> {
        self.programs[program.kind().index()].replace(program)
    }

    pub fn get(&self, kind: ProgramKind) -> Result<&ShaderProgram, ShaderError> {
        self.programs[kind.index()]
            .as_ref()
            .ok_or(ShaderError::NotRegistered(kind))
    }

    pub fn get_by_name(&self, name: &str) -> Result<&ShaderProgram, ShaderError> {
        self.get(name.parse()?)
    }

    pub fn contains(&self, kind: ProgramKind) -> bool {
        self.programs[kind.index()].is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShaderProgram> {
        self.programs.iter().flatten()
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Source {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::gpu::recording::RecordingContext;

    #[test]
    fn names_round_trip() {
        for kind in ProgramKind::ALL {
            assert_eq!(kind.name().parse::<ProgramKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = ShaderRegistry::new();
        assert!(matches!(
            registry.get_by_name("default"),
            Err(ShaderError::UnknownName(name)) if name == "default"
        ));
    }

    #[test]
    fn unregistered_kind_is_an_error() {
        let gpu: GpuRef = Rc::new(RecordingContext::new());
        let mut registry = ShaderRegistry::new();
        registry.compile(&gpu, ProgramKind::Mesh, "", "").unwrap();

        assert!(registry.get(ProgramKind::Mesh).is_ok());
        assert!(matches!(
            registry.get(ProgramKind::Blend),
            Err(ShaderError::NotRegistered(ProgramKind::Blend))
        ));
    }

    #[test]
    fn missing_source_file_is_reported() {
        let gpu: GpuRef = Rc::new(RecordingContext::new());
        let result = ShaderRegistry::load(&gpu, Path::new("no/such/dir"), &[ProgramKind::Mesh]);
        assert!(matches!(result, Err(ShaderError::Source { .. })));
    }
}
