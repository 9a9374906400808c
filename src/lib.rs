//! # xtu-build
//!
//! First pass of cross-translation-unit (XTU) static analysis.
//!
//! Given a JSON compilation database, xtu-build dumps one AST per source with
//! an external clang toolchain, asks `clang-func-mapping` which translation unit
//! defines which function, and merges the results into `externalFnMap.txt` for
//! the second analysis pass.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use xtu_build::{load_compilation_database, ClangToolchain, XtuBuild, XtuConfig, XtuLayout};
//!
//! let config = XtuConfig::default();
//! let db = load_compilation_database(Path::new("compile_commands.json"), &config.sources.extensions).unwrap();
//! let toolchain = ClangToolchain::new(Path::new("/usr/lib/llvm/bin"), config.tools, false);
//!
//! let xtu = XtuBuild::new(db, XtuLayout::new(".xtu"), toolchain, config.sources.extensions, 8);
//! let summary = xtu.run().unwrap();
//! println!("{}", summary);
//! ```

pub mod args;
pub mod compdb;
pub mod config;
pub mod error;
pub mod fnmap;
pub mod layout;
pub mod pipeline;
pub mod toolchain;

// Re-exports for convenience
pub use compdb::{load_compilation_database, BuildStep, CompilationDatabase};
pub use config::XtuConfig;
pub use error::{Result, XtuError};
pub use layout::XtuLayout;
pub use pipeline::{default_threads, RunSummary, XtuBuild};
pub use toolchain::{ClangToolchain, ToolStatus, Toolchain};
