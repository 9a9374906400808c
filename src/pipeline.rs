//! First-pass XTU build: AST generation, function mapping, map merge.
//!
//! Two rayon pools run back to back. Workers share nothing but failure counters
//! and write to disjoint paths. External tool failures are logged and counted
//! but never abort the run: a broken tool leaves a missing or partial artifact
//! that the second analysis pass will simply not find.

use rayon::prelude::*;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::compdb::CompilationDatabase;
use crate::error::Result;
use crate::fnmap::write_external_function_map;
use crate::layout::{ensure_parent, XtuLayout};
use crate::toolchain::{ToolStatus, Toolchain};

/// Worker count used when none is given: 1.5x the available CPUs.
pub fn default_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus * 3 / 2).max(1)
}

/// Outcome of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: usize,
    pub commands: usize,
    pub ast_failures: usize,
    pub mapping_failures: usize,
    pub mapped_functions: usize,
    pub time_ms: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources ({} AST failures), {} commands ({} mapping failures), {} external functions mapped in {}ms",
            self.sources,
            self.ast_failures,
            self.commands,
            self.mapping_failures,
            self.mapped_functions,
            self.time_ms
        )
    }
}

/// A configured first-pass build over one compilation database.
pub struct XtuBuild<T: Toolchain> {
    db: CompilationDatabase,
    layout: XtuLayout,
    toolchain: T,
    extensions: Vec<String>,
    threads: usize,
}

impl<T: Toolchain> XtuBuild<T> {
    pub fn new(
        db: CompilationDatabase,
        layout: XtuLayout,
        toolchain: T,
        extensions: Vec<String>,
        threads: usize,
    ) -> Self {
        Self {
            db,
            layout,
            toolchain,
            extensions,
            threads: threads.max(1),
        }
    }

    pub fn layout(&self) -> &XtuLayout {
        &self.layout
    }

    /// Generate the AST for one source. Returns whether it succeeded.
    pub fn generate_ast(&self, source: &str) -> bool {
        match self.try_generate_ast(source) {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!(source, %status, "AST generation failed");
                false
            }
            Err(e) => {
                warn!(source, error = %e, "AST generation failed");
                false
            }
        }
    }

    fn try_generate_ast(&self, source: &str) -> Result<ToolStatus> {
        let command = self.db.command_for(source).unwrap_or_default();
        let args = self.db.arguments_for(command, &self.extensions);

        let arch = self.toolchain.detect_arch(&args, source)?;
        let ast_path = self.layout.ast_path(&arch, Path::new(source));
        ensure_parent(&ast_path)?;

        debug!(source, arch = %arch, ast = %ast_path.display(), "emitting AST");
        self.toolchain.emit_ast(&args, source, &ast_path)
    }

    /// Map the functions of every source built with `command`.
    pub fn map_functions(&self, command: &str) -> bool {
        let args = self.db.arguments_for(command, &self.extensions);
        let sources = self.db.sources_for(command);

        match self
            .toolchain
            .map_functions(self.layout.root(), sources, &args)
        {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!(command, %status, "function mapping failed");
                false
            }
            Err(e) => {
                warn!(command, error = %e, "function mapping failed");
                false
            }
        }
    }

    /// Run both pools, then merge the listings into the external function map.
    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();

        self.layout.init()?;
        self.layout.clear_listings()?;

        info!(
            sources = self.db.sources().len(),
            threads = self.threads,
            "generating ASTs"
        );
        let ast_failures = self.dispatch(self.db.sources(), |source| self.generate_ast(source))?;

        // Mapping starts only once every AST task has finished.
        info!(commands = self.db.commands().len(), "mapping functions");
        let mapping_failures =
            self.dispatch(self.db.commands(), |command| self.map_functions(command))?;

        // A clean mapping pass may legitimately list nothing, leaving no file.
        let mapped_functions =
            write_external_function_map(&self.layout, mapping_failures == 0)?;

        let summary = RunSummary {
            sources: self.db.sources().len(),
            commands: self.db.commands().len(),
            ast_failures,
            mapping_failures,
            mapped_functions,
            time_ms: start.elapsed().as_millis() as u64,
        };
        info!(%summary, "first pass complete");
        Ok(summary)
    }

    /// Run `task` over `items` on a fresh pool; returns the failure count.
    fn dispatch<F>(&self, items: &[String], task: F) -> Result<usize>
    where
        F: Fn(&str) -> bool + Sync,
    {
        let failures = AtomicUsize::new(0);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()?;

        pool.install(|| {
            items.par_iter().for_each(|item| {
                if !task(item.as_str()) {
                    failures.fetch_add(1, Ordering::Relaxed);
                }
            });
        });

        Ok(failures.into_inner())
    }
}
