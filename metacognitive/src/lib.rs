//! The Metacognitive Loop: a perpetual, self-regulating
//! background agent whose sleep interval is partly chosen by itself via a
//! tool call, with randomized "supervisor" elevation to a higher-quality
//! model.

mod config;
mod duration_parse;
mod run_loop;
mod sleep;
mod state_file;
mod tools;

pub use config::{ConfigError, MetacognitiveConfig};
pub use duration_parse::parse_duration;
pub use run_loop::MetacognitiveLoop;
pub use sleep::{clamp, compute_sleep, roll_dice};
pub use state_file::StateFileError;
pub use tools::{MetacognitiveTools, NextSleepRegister, SetNextSleepError};
