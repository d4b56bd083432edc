//! Graph controller, component chain and playlist.
//!
//! - [`GraphController`]: the public command surface
//! - [`GraphCore`]: transition, port and tunnel machinery shared with the
//!   format strategies
//! - [`ComponentChain`]: ordered components and the tunnels between them
//! - [`Playlist`]: entries, cursor and continuous playback
//!
//! Error recovery and end-of-stream handling live with the controller; see
//! [`GraphController::on_error`] and [`GraphController::on_end_of_stream`].

mod chain;
mod config;
mod controller;
mod core;
mod playlist;
mod recovery;

pub use chain::{
    ChainRole, ComponentChain, ComponentDescriptor, ComponentSpec, Endpoint, Tunnel, TunnelId,
};
pub use config::{GraphConfig, PlaybackConfig};
pub use controller::GraphController;
pub use self::core::GraphCore;
pub use playlist::Playlist;
