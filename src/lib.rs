pub mod command;
pub mod densemap;
pub mod eval;
pub mod fs;
pub mod graph;
pub mod hash;
pub mod load;
pub mod mode;
pub mod parse;
pub mod plan;
pub mod process;
pub mod progress;
pub mod require;
pub mod run;
pub mod scanner;
mod signal;
pub mod smallmap;
pub mod status;
pub mod task;
pub mod trace;
pub mod work;

#[cfg(not(any(windows, target_arch = "wasm32")))]
use jemallocator::Jemalloc;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
