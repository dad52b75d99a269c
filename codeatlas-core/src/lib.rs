// codeatlas-core/src/lib.rs

#![allow(missing_docs)] // documentation pass tracked separately
#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports (Interfaces / Traits)
// The contracts every collaborator must satisfy: RelStore, Queue,
// LLMClient, GraphStore, Clock, Metrics.
pub mod ports;

// 2. Domain (core data model)
// POIs, relationships, evidence, confidence scoring, outbox, manifest.
// Depends on nothing else (no infra, no app).
pub mod domain;

// 3. Infrastructure (Adapters)
// Technical implementations (sqlite RelStore, in-memory Queue/GraphStore,
// HTTP LLM client, sanitizer, config loading, filesystem helpers).
pub mod infrastructure;

// 4. Application (Use cases / pipeline stages)
// EntityScout, the workers, the validator/reconciler, the outbox
// publisher, the graph builder, the self cleaner, and the orchestrator.
pub mod application;

// --- TOP-LEVEL ERROR ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
pub use error::AtlasError;
pub use application::pipeline::{Pipeline, PipelineContext, RunOptions, RunResult};
