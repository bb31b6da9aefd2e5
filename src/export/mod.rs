//! Model persistence
//!
//! Fitted models are written as self-describing JSON artifacts.

mod artifact;

pub use artifact::{ArtifactPayload, ModelArtifact, PayloadKind};
