//! # Rackforge Kernel
//!
//! Bridge between the scene model and the solid-modeling kernel that turns
//! panel programs into printable meshes.
//!
//! - [`protocol`]: worker message envelopes (JSON, correlated by request id)
//! - [`client`]: lazily started worker link with per-request timeouts
//! - [`scheduler`]: debounced, single-flight rendering of the live scene
//! - [`host`] / [`openscad`]: the worker side, backed by the OpenSCAD CLI

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod openscad;
pub mod protocol;
pub mod render;
pub mod scheduler;
pub mod transport;

pub use client::{KernelClient, KernelStatus};
pub use config::{KernelConfig, OpenScadConfig};
pub use error::KernelError;
pub use host::{serve, serve_lines, KernelHost, ProgressSink};
pub use openscad::OpenScadHost;
pub use protocol::{OutputFormat, RequestId, VariableValue, WorkerRequest, WorkerResponse};
pub use render::{FailureKind, RenderFailure, RenderOutcome, RenderRequest, RenderResponse, RenderedMesh};
pub use scheduler::{Phase, RenderBackend, RenderReport, RenderScheduler};
pub use transport::{InProcessSpawner, ProcessSpawner, WorkerChannel, WorkerSpawner};
