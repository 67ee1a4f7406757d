//! Process bootstrap helpers.

mod tracing_init;

pub use tracing_init::{default_filter, init_tracing, DEBUG_FILTER, DEFAULT_FILTER};
