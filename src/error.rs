use std::path::PathBuf;

use thiserror::Error;

use crate::gpu::{FramebufferStatus, ShaderStage};
use crate::renderer::ProgramKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level failure raised during startup or while driving frames.
///
/// Every variant is fatal for the current design: errors propagate to the
/// driver in [`crate::run`], which logs them and terminates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("InitError: {0}")]
    Init(String),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("RuntimeError: {0}")]
    Runtime(String),
}

impl Error {
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("SHADER::{stage}::COMPILATION_FAILED ({program}): {log}")]
    Compile {
        program: ProgramKind,
        stage: ShaderStage,
        log: String,
    },
    #[error("SHADER::PROGRAM::LINK_FAILED ({program}): {log}")]
    Link { program: ProgramKind, log: String },
    #[error("shader program {0} was requested but never registered")]
    NotRegistered(ProgramKind),
    #[error("unknown shader program name {0:?}")]
    UnknownName(String),
    #[error("failed to read shader source {path:?}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("framebuffer {label} is incomplete ({status:?})")]
    IncompleteFramebuffer {
        label: &'static str,
        status: FramebufferStatus,
    },
    #[error("failed to decode texture {path:?}: {source}")]
    TextureDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("a cubemap needs exactly 6 faces, got {0}")]
    CubemapFaces(usize),
    #[error("cubemap face {path:?} is {width}x{height}, expected {expected}x{expected}")]
    CubemapFaceSize {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error("failed to import model {path:?}: {source}")]
    ModelImport {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("model {path:?} has a malformed mesh: {reason}")]
    MalformedMesh { path: PathBuf, reason: String },
    #[error("model {0:?} contains no triangle meshes")]
    EmptyModel(PathBuf),
    #[error("GPU allocation of {what} failed: {reason}")]
    Allocation { what: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_stage_and_diagnostic() {
        let err: Error = ShaderError::Compile {
            program: ProgramKind::Mesh,
            stage: ShaderStage::Fragment,
            log: "0:12: 'foo' : undeclared identifier".into(),
        }
        .into();

        let message = err.to_string();
        assert!(message.contains("FRAGMENT"), "{message}");
        assert!(message.contains("undeclared identifier"), "{message}");
    }

    #[test]
    fn init_error_keeps_prefix() {
        assert_eq!(
            Error::init("no OpenGL config matched").to_string(),
            "InitError: no OpenGL config matched"
        );
    }
}
