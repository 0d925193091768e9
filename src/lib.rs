#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # wlrsetroot: root window patterns for wlroots compositors
//!
//! This crate paints the classic `xsetroot` wallpapers (a solid color, the gray
//! checkerboard, the plaid-like `-mod` grid or a tiled X bitmap) into the
//! background layer of every output of a compositor implementing
//! `wlr-layer-shell`.
//!
//! ## Structure of the crate
//!
//! The pure parts do not need a compositor:
//!
//! - [`pattern`] classifies device pixels for the selected [`Pattern`](pattern::Pattern),
//! - [`render`] paints a [`PatternConfig`](pattern::PatternConfig) into any [`Canvas`](render::Canvas),
//! - [`session`] is the per-output state machine, turning server events into commands,
//! - [`xbm`] and [`color`] parse what the user hands us.
//!
//! The [`shm`] module allocates shared memory buffers and the [`wayland`]
//! module ties everything to a live connection, see [`wayland::run`].
//!
//! ### Logging
//!
//! Everything is logged through [`tracing`]; the binary installs a
//! `tracing-subscriber` formatter honouring `RUST_LOG`.

pub mod cli;
pub mod color;
pub mod pattern;
pub mod render;
pub mod session;
pub mod shm;
pub mod utils;
pub mod wayland;
pub mod xbm;
