//! lumen-core — the transfer protocol for moving text over a one-way optical
//! channel: a screen showing a loop of symbols and a camera scanning them.
//!
//! Sender: [`session::build_session`] turns a payload into a Header frame
//! and N Data frames; [`session::FrameCarousel`] cycles them for display.
//! Receiver: [`reassembly::ReassemblyState`] ingests scanned strings in any
//! order and yields the verified payload.

pub mod chunker;
pub mod config;
pub mod integrity;
pub mod reassembly;
pub mod session;
pub mod wire;

pub use integrity::{byte_length, fragment_checksum, payload_hash, Checksum, PayloadHash};
pub use reassembly::{Ingested, Phase, Progress, ReassemblyError, ReassemblyState};
pub use session::{build_session, FrameCarousel, SessionBuilder, SessionError, TransferSession};
pub use wire::{DataFrame, Frame, FrameError, Header};
