//! cmdlet-replay - recorded-session HTTP mock for cloud management cmdlets
//!
//! Cmdlets issue requests through a [`transport::Transport`]. During tests the
//! transport is swapped for a replay of a recorded [`recording::HttpSession`],
//! either in-process or behind a loopback [`network::MockHttpServer`].

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::multiple_crate_versions
)]

pub mod cmdlet;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod message;
pub mod network;
pub mod recording;
pub mod replay;
pub mod scenario;
pub mod storage;
pub mod transport;

pub use error::{ReplayError, Result};
