//! Wan2.2 model catalogue and the `generate.py` command line built from a
//! [`GenerationRequest`] once the scheduler has granted GPUs.
//!
//! `animate-14B` requests may carry a preprocessing step, which runs through
//! the same queue on one GPU before generation is queued.

pub mod command;
pub mod models;
pub mod pipeline;
pub mod preprocess;
pub mod request;
pub mod tiers;

pub use command::GenerationCommand;
pub use models::{frame_num_for_duration, ModelSpec, TaskKind};
pub use pipeline::run_generation;
pub use preprocess::{PreprocessCommand, PreprocessMode, PreprocessOptions, DEFAULT_PREPROCESS_TIMEOUT};
pub use request::{AnimateOptions, GenerationRequest, SampleSolver, SpeechOptions};
pub use tiers::{PerfTier, TierFeatures, DEFAULT_TEACACHE_THRESHOLD};
