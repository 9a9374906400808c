//! JSON compilation database loading and indexing.
//!
//! Builds two deduplicated indexes over the recognized source entries:
//! - source → first-seen build command
//! - build command → every source compiled with it
//!
//! Both keep first-appearance order so dispatch is reproducible.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;

use crate::args::{derive_arguments, derive_arguments_from_tokens, is_source_file};
use crate::error::{Result, XtuError};

/// One `{file, command}` record of the compilation database.
///
/// Entries in the `arguments` form keep their argv in `arguments`; `command`
/// is then the space-joined argv, used only as the index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub file: String,
    pub command: String,
    pub arguments: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawBuildStep {
    file: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<String>>,
}

impl<'de> Deserialize<'de> for BuildStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawBuildStep::deserialize(deserializer)?;
        let (command, arguments) = match (raw.command, raw.arguments) {
            (Some(command), _) => (command, None),
            (None, Some(arguments)) => (arguments.join(" "), Some(arguments)),
            (None, None) => {
                return Err(serde::de::Error::custom(format!(
                    "entry for {} has neither `command` nor `arguments`",
                    raw.file
                )))
            }
        };
        Ok(Self {
            file: raw.file,
            command,
            arguments,
        })
    }
}

impl BuildStep {
    pub fn new(file: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            command: command.into(),
            arguments: None,
        }
    }

    /// A step given as an argv vector instead of a command string.
    pub fn with_arguments(file: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            file: file.into(),
            command: arguments.join(" "),
            arguments: Some(arguments),
        }
    }
}

/// Source and command indexes over a compilation database.
#[derive(Debug, Default)]
pub struct CompilationDatabase {
    src_to_cmd: HashMap<String, String>,
    src_order: Vec<String>,
    cmd_to_src: HashMap<String, Vec<String>>,
    cmd_order: Vec<String>,
    cmd_argv: HashMap<String, Vec<String>>,
}

/// Read and index a compilation database file.
pub fn load_compilation_database(path: &Path, extensions: &[String]) -> Result<CompilationDatabase> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            XtuError::DatabaseNotFound(path.to_path_buf())
        } else {
            XtuError::Io(e)
        }
    })?;

    let steps: Vec<BuildStep> =
        serde_json::from_str(&content).map_err(|source| XtuError::InvalidDatabase {
            path: path.to_path_buf(),
            source,
        })?;

    let db = CompilationDatabase::from_steps(steps, extensions);
    tracing::info!(
        path = %path.display(),
        sources = db.sources().len(),
        commands = db.commands().len(),
        "loaded compilation database"
    );
    Ok(db)
}

impl CompilationDatabase {
    /// Index build steps, ignoring entries whose file is not a recognized source.
    pub fn from_steps(steps: impl IntoIterator<Item = BuildStep>, extensions: &[String]) -> Self {
        let mut db = Self::default();

        for step in steps {
            if !is_source_file(&step.file, extensions) {
                tracing::debug!(file = %step.file, "skipping non-source entry");
                continue;
            }

            if !db.src_to_cmd.contains_key(&step.file) {
                db.src_to_cmd.insert(step.file.clone(), step.command.clone());
                db.src_order.push(step.file.clone());
            }

            if let Some(argv) = step.arguments {
                db.cmd_argv.entry(step.command.clone()).or_insert(argv);
            }

            match db.cmd_to_src.get_mut(&step.command) {
                Some(sources) => sources.push(step.file),
                None => {
                    db.cmd_order.push(step.command.clone());
                    db.cmd_to_src.insert(step.command, vec![step.file]);
                }
            }
        }

        db
    }

    /// Unique sources, in first-seen order.
    pub fn sources(&self) -> &[String] {
        &self.src_order
    }

    /// Unique commands, in first-seen order.
    pub fn commands(&self) -> &[String] {
        &self.cmd_order
    }

    /// The first command recorded for `source`.
    pub fn command_for(&self, source: &str) -> Option<&str> {
        self.src_to_cmd.get(source).map(String::as_str)
    }

    /// All sources compiled with `command`.
    pub fn sources_for(&self, command: &str) -> &[String] {
        self.cmd_to_src
            .get(command)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Compiler arguments to replay for `command`.
    ///
    /// Uses the recorded argv when the command came in `arguments` form, so
    /// tokens with embedded spaces survive.
    pub fn arguments_for(&self, command: &str, extensions: &[String]) -> Vec<String> {
        match self.cmd_argv.get(command) {
            Some(argv) => derive_arguments_from_tokens(argv.iter().map(String::as_str), extensions),
            None => derive_arguments(command, extensions),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.src_order.is_empty()
    }
}
