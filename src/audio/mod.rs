//! # Audio Module
//!
//! The playback queue engine: the ordered track queue plus the single
//! streaming loop that feeds the voice transport.
//!
//! ## Architecture
//!
//! ### [`queue`] - Track Queue
//! - Thread-safe ordered queue shared between callers and the loop
//! - 1-based removal as presented to users, head-aware shuffle
//!
//! ### [`controller`] - Playback Controller
//! - Exactly one streaming loop at a time
//! - Pause/resume/skip as rendezvous signals observed per frame
//! - Load/sink failure semantics (no silent retries, no auto-skip)
//!
//! ### [`track`] / [`frames`] - Track Model & Frame Cache
//! - Lazily loaded per-track Opus frame buffers
//! - Length-prefixed frame cache file format
//!
//! ### [`player`] - Facade
//! - The API the command layer talks to

pub mod controller;
pub mod frames;
pub mod player;
pub mod queue;
pub mod track;
