//! # tracelens - Capture Ingestion and Timeline Indexing
//!
//! tracelens is the consumer-side core of an instrumented-capture
//! profiler: it folds the ordered event stream of a remote capture
//! service into queryable timeline structures, aggregates per-function
//! statistics and callstack samples, and persists finished captures.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Remote Capture Service                     │
//! │   (instrumented timers, callstack samples, tracepoints)     │
//! └───────────────────────┬─────────────────────────────────────┘
//!                         │ ordered event stream
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  tracelens (This Crate)                     │
//! │                                                             │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐    │
//! │  │   Capture    │──▶│   Timeline   │──▶│   Sampling   │    │
//! │  │   (client)   │   │  (tracks)    │   │  (reports)   │    │
//! │  └──────────────┘   └──────────────┘   └──────────────┘    │
//! │         │                                      │            │
//! │         ▼                                      ▼            │
//! │  ┌──────────────┐                      ┌──────────────┐    │
//! │  │    Events    │                      │    Export    │    │
//! │  │ (callstacks) │                      │   (JSON)     │    │
//! │  └──────────────┘                      └──────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`capture`]: ingestion protocol and session state
//!   - `listener`: `CaptureEvent` stream folded by `CaptureSession`
//!   - `client`: control worker and ingestion thread
//!   - `data`: per-capture process, function and callstack metadata
//!   - `resolver`: target-process and symbol resolution boundary
//!   - `replay`: recorded stream files driven through the client path
//!
//! - [`timeline`]: time-ordered storage and queries
//!   - `chain`: chunked append-only timer storage
//!   - `track`: per-thread/GPU/scheduler timer streams
//!   - `time_graph`: track registry, time window, sorting, navigation
//!
//! - [`events`]: callstack sample buffer with per-thread indexes
//!
//! - [`sampling`]: exclusive/inclusive sample-count reports
//!
//! - [`export`]: whole-or-nothing JSON capture files
//!
//! - [`strings`]: capture-scoped interned string table
//!
//! - [`domain`]: core identifier and error types (Pid, Tid, ticks)
//!
//! ## Key Concepts
//!
//! - **Tick**: integer capture timestamp; 1000 ticks per microsecond
//! - **Track**: one lane of the timeline (thread, GPU timeline, scheduler)
//! - **Chain**: append-only timer storage whose reads never invalidate
//! - **Exclusive/Inclusive**: top-of-stack vs anywhere-on-stack samples

pub mod capture;
pub mod cli;
pub mod domain;
pub mod events;
pub mod export;
pub mod sampling;
pub mod strings;
pub mod timeline;
