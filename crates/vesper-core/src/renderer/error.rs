// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! Backends report failures synchronously at the call site. Factory calls return
//! [`ResourceError`], shader compilation returns [`ShaderError`], pipeline
//! resolution reports [`PipelineError`] and frame-level operations return
//! [`RenderError`], which wraps the others.

use super::api::{ProgramId, ShaderStage};
use std::fmt;

/// An error related to the compilation of a shader stage.
#[derive(Debug)]
pub enum ShaderError {
    /// The shader source failed to compile.
    CompilationError {
        /// The stage being compiled.
        stage: ShaderStage,
        /// Diagnostics reported by the compiler.
        details: String,
    },
    /// The source does not define the expected `main` entry point.
    MissingEntryPoint {
        /// The stage being compiled.
        stage: ShaderStage,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { stage, details } => {
                write!(f, "Shader compilation failed for {stage:?} stage: {details}")
            }
            ShaderError::MissingEntryPoint { stage } => {
                write!(f, "Missing entry point 'main' in {stage:?} shader")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error raised while resolving a root signature or pipeline state object.
#[derive(Debug)]
pub enum PipelineError {
    /// The binding layout derived from the program could not be created.
    RootSignatureCreationFailed(String),
    /// The backend refused the full pipeline state.
    CompilationFailed {
        /// Detailed error messages from the backend.
        details: String,
    },
    /// The program referenced by the pipeline does not exist.
    InvalidProgram {
        /// The ID of the missing program.
        id: ProgramId,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::RootSignatureCreationFailed(msg) => {
                write!(f, "Root signature creation failed: {msg}")
            }
            PipelineError::CompilationFailed { details } => {
                write!(f, "Pipeline compilation failed: {details}")
            }
            PipelineError::InvalidProgram { id } => {
                write!(f, "Invalid program ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource (buffers, textures, etc.).
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
    /// The pixel format cannot be created on this device.
    UnsupportedFormat(String),
    /// A non-growable descriptor heap or registry is exhausted.
    OutOfDescriptors {
        /// The name of the exhausted heap.
        heap: &'static str,
    },
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::UnsupportedFormat(format) => {
                write!(f, "Unsupported pixel format: {format}")
            }
            ResourceError::OutOfDescriptors { heap } => {
                write!(f, "Out of descriptors in the {heap} heap")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A high-level error raised by the frame driver or the device.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the rendering system was initialized.
    NotInitialized,
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// A shader error surfaced at frame level.
    Shader(ShaderError),
    /// A pipeline error surfaced at frame level.
    Pipeline(PipelineError),
    /// The graphics device was removed. There is no recovery path.
    DeviceLost {
        /// The removal reason reported by the driver.
        reason: String,
    },
    /// The presentation surface is gone or has a zero size.
    SurfaceLost,
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The rendering system is not initialized.")
            }
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::Shader(err) => write!(f, "Shader error: {err}"),
            RenderError::Pipeline(err) => write!(f, "Pipeline error: {err}"),
            RenderError::DeviceLost { reason } => {
                write!(f, "The graphics device was removed: {reason}")
            }
            RenderError::SurfaceLost => write!(f, "The presentation surface was lost."),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            RenderError::Shader(err) => Some(err),
            RenderError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::Shader(err)
    }
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::Pipeline(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationError {
            stage: ShaderStage::Fragment,
            details: "error X3000: syntax error".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for Fragment stage: error X3000: syntax error"
        );
    }

    #[test]
    fn resource_error_display_wrapping_pipeline_error() {
        let res_err: ResourceError = PipelineError::InvalidProgram { id: ProgramId(42) }.into();
        assert_eq!(
            format!("{res_err}"),
            "Pipeline resource error: Invalid program ID: ProgramId(42)"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let res_err = ResourceError::OutOfDescriptors { heap: "sampler" };
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Out of descriptors in the sampler heap"
        );
        assert!(render_err.source().is_some());
        assert!(render_err.source().unwrap().source().is_none());
    }

    #[test]
    fn device_lost_carries_reason() {
        let err = RenderError::DeviceLost {
            reason: "DXGI_ERROR_DEVICE_HUNG".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "The graphics device was removed: DXGI_ERROR_DEVICE_HUNG"
        );
    }
}
