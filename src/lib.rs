pub mod canon;
pub mod error;
pub mod fs;
pub mod graph;
pub mod load;
mod logging;
pub mod progress;
pub mod queue;
pub mod rng;
pub mod rules;
pub mod run;
pub mod task;
pub mod trace;
pub mod work;

#[cfg(not(any(windows, target_arch = "wasm32")))]
use jemallocator::Jemalloc;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
