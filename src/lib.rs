//! # swarmthink
//!
//! Coordinator for a small pool of independently-running agent processes that
//! collaborate on a shared problem through a durable, file-backed workspace
//! instead of direct process-to-process calls.
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │        SwarmOrchestrator         │
//!        │  (task lifecycle, phase barrier) │
//!        └───────┬──────────────────┬───────┘
//!                │                  │
//!                ▼                  ▼
//!     ┌───────────────────┐  ┌───────────────────┐
//!     │  ThinkingAgent ×N │  │ ProcessSupervisor │
//!     │  (two-phase       │  │ (launch, monitor, │
//!     │   protocol)       │  │  timeout, kill)   │
//!     └─────────┬─────────┘  └─────────┬─────────┘
//!               │                      │
//!               ▼                      ▼
//!        ┌──────────────────────────────────┐
//!        │          WorkspaceStore          │
//!        │  (tasks / messages / thinking)   │
//!        └──────────────────────────────────┘
//! ```
//!
//! ## Task Flow
//! 1. Orchestrator creates a task in the store and announces it
//! 2. Every non-coordinator agent runs phase 1 (individual sequential
//!    analysis); all results are collected before phase 2 begins
//! 3. Every non-coordinator agent runs phase 2 (collaborative ultrathink)
//!    over its peers' phase-1 outputs
//! 4. A synthesizer instance, if present, integrates the phase-2 outputs;
//!    the bundle is attached and the task moves to completed
//!
//! ## Modules
//! - `orchestrator`: top-level phase sequencing
//! - `engine`: per-agent two-phase thinking protocol
//! - `supervisor`: external process launch/monitor/cleanup
//! - `workspace`: durable file-backed store

pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod supervisor;
pub mod task;
pub mod thinking;
pub mod workspace;

pub use config::Config;
pub use error::{Result, SwarmError};
pub use orchestrator::SwarmOrchestrator;
pub use registry::{AgentRegistry, Role};
pub use supervisor::ProcessSupervisor;
pub use workspace::WorkspaceStore;
