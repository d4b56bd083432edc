//! # Tunnelgraph
//!
//! Orchestration core for media playback graphs built from asynchronous,
//! tunneled components.
//!
//! A graph is a short chain (source, decoder, renderer) of components that
//! run on their own threads and report back through callbacks. Tunnelgraph
//! drives such a chain through its lifecycle, negotiates formats between
//! neighbours, recovers from format errors with alternate components, and
//! walks a playlist.
//!
//! ## Features
//!
//! - **Blocking commands over async components**: every step registers the
//!   events it expects and waits for them, with a timeout
//! - **Format strategies**: FLAC with alternate demuxers, MP3, and HTTP
//!   streams whose decoder is chosen at runtime
//! - **Recovery**: recoverable errors retry the entry with the next
//!   alternate, bounded per entry
//! - **Notifications**: graph events on a broadcast channel, as a
//!   [`futures::Stream`], or through a [`notify::NotificationSink`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tunnelgraph::prelude::*;
//!
//! # fn main() -> tunnelgraph::Result<()> {
//! let runtime = Arc::new(LocalRuntime::new());
//! let probe = Arc::new(StaticProbe::new().with(ProbeResult::flac("/music/a.flac", 44_100, 2, 16)));
//!
//! let uri = "/music/a.flac";
//! let mut graph = GraphController::new(runtime, probe, tunnelgraph::ops::for_uri(uri)?);
//! graph.load()?;
//! graph.configure(PlaybackConfig::new([uri]))?;
//! graph.execute()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod component;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod notify;
pub mod ops;
pub mod probe;
pub mod runtime;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::component::{ComponentRuntime, GraphState, LifecycleState, Parameter};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::graph::{GraphConfig, GraphController, PlaybackConfig};
    pub use crate::notify::{EventReceiver, GraphEvent, NotificationSink};
    pub use crate::ops::{FlacOps, GraphOps, HttpClientOps, Mp3Ops};
    pub use crate::probe::{Probe, ProbeResult, StaticProbe};
    pub use crate::runtime::{LocalRuntime, StubComponent};
}

pub use error::{Error, Result};
