//! Render requests and their outcomes as seen by callers of the client.

use std::collections::BTreeMap;

use rackforge_core::RackConfig;

use crate::protocol::{InvokePayload, OutputFormat, RequestId, ResultPayload, VariableValue};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub program: String,
    pub output_format: OutputFormat,
    pub variables: BTreeMap<String, VariableValue>,
}

impl RenderRequest {
    pub fn new(program: impl Into<String>, output_format: OutputFormat) -> Self {
        Self {
            program: program.into(),
            output_format,
            variables: BTreeMap::new(),
        }
    }

    /// Request for the whole panel of `config`.
    pub fn for_scene(config: &RackConfig, output_format: OutputFormat) -> Self {
        Self::new(rackforge_io::serialize(config), output_format)
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: VariableValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub(crate) fn into_payload(self) -> InvokePayload {
        InvokePayload {
            program: self.program,
            output_format: self.output_format,
            variables: self.variables,
        }
    }
}

/// Mesh bytes produced by a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMesh {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub render_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The kernel ran and reported an error (bad program, CSG failure).
    Kernel,
    /// No result arrived before the invoke timeout.
    Timeout,
    /// The worker could not be started or went away mid-request.
    WorkerUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFailure {
    pub kind: FailureKind,
    pub message: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Success(RenderedMesh),
    Failure(RenderFailure),
}

impl RenderOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        RenderOutcome::Failure(RenderFailure {
            kind,
            message: message.into(),
            stdout: None,
            stderr: None,
        })
    }

    pub(crate) fn from_payload(payload: ResultPayload, format: OutputFormat) -> Self {
        match (payload.success, payload.output) {
            (true, Some(data)) => RenderOutcome::Success(RenderedMesh {
                data,
                format,
                stdout: payload.stdout,
                stderr: payload.stderr,
                render_time_ms: payload.render_time_ms,
            }),
            (true, None) => RenderOutcome::Failure(RenderFailure {
                kind: FailureKind::Kernel,
                message: "Kernel reported success without output".to_string(),
                stdout: payload.stdout,
                stderr: payload.stderr,
            }),
            (false, _) => RenderOutcome::Failure(RenderFailure {
                kind: FailureKind::Kernel,
                message: payload
                    .error
                    .unwrap_or_else(|| "Kernel reported failure".to_string()),
                stdout: payload.stdout,
                stderr: payload.stderr,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RenderOutcome::Success(_))
    }

    pub fn mesh(&self) -> Option<&RenderedMesh> {
        match self {
            RenderOutcome::Success(mesh) => Some(mesh),
            RenderOutcome::Failure(_) => None,
        }
    }

    pub fn failure_ref(&self) -> Option<&RenderFailure> {
        match self {
            RenderOutcome::Success(_) => None,
            RenderOutcome::Failure(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderResponse {
    pub id: RequestId,
    pub outcome: RenderOutcome,
}

impl RenderResponse {
    pub fn failed(id: RequestId, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: RenderOutcome::failure(kind, message),
        }
    }
}
