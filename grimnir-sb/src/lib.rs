//! # Grimnir Smart Blocks (grimnir-sb)
//!
//! Rule-driven sequencing engine for radio automation. A smart block is a
//! stored rule set that produces an ordered list of tracks and interstitials
//! filling a target duration on demand.
//!
//! **Pipeline:**
//! 1. [`normalize`] - loosely-typed rule/sequence documents to [`PreviewConfig`]
//! 2. [`pool`] - candidate pools fetched once from a [`Catalog`]
//! 3. [`sequence`] - greedy, seeded, single-threaded sequence builder
//! 4. [`trim`] - single-removal overshoot correction
//!
//! [`preview`] wraps the pipeline for callers and renders or materializes
//! the resulting [`SequenceResult`]. [`form`] validates dashboard
//! submissions before they are stored.

pub mod catalog;
pub mod error;
pub mod form;
pub mod normalize;
pub mod pool;
pub mod preview;
pub mod rules;
pub mod sequence;
pub mod trim;

pub use catalog::{Catalog, RuleSetResolver, SmartBlockDefinition};
pub use error::{Result, SmartBlockError};
pub use normalize::{normalize, normalize_at, PreviewConfig};
pub use preview::{materialize_slot, render_preview, PreviewRequest, PreviewService, ScheduledItem};
pub use rules::{RuleDocument, SequenceDocument};
pub use sequence::{build_sequence, CandidatePools, Placement, SequenceResult, SequenceWarning};
