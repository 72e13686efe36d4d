//! tensorfuse: a tensor-expression fusing JIT kernel compiler.
//!
//! Given a typed dataflow subgraph, binds its inputs and constants, lowers
//! each operator node into a scalar loop nest, restrides outputs to the
//! layout a caller declared, runs the loop-nest transformer (fusion,
//! parallelization, vectorization, GPU flatten+split), and hands the result
//! to a backend — a tree-walking interpreter built in, or an injected
//! external LLVM/CUDA/Block codegen.

pub mod arg;
pub mod backend;
pub mod binder;
pub mod config;
pub mod error;
pub mod fallback;
pub mod graph;
pub mod ir;
pub mod kernel;
pub mod lowering;
pub mod restride;
pub mod stack;
pub mod transform;

pub use error::{KernelError, Result};
pub use kernel::Kernel;

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
