//
//  config.rs
//  xtu-build
//

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, XtuError};

/// Name of the optional config file inside the XTU directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level xtu-build configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XtuConfig {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Names of the external binaries, resolved against the toolchain directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Prints the target triple for a command line after an `@` marker.
    #[serde(default = "default_arch_extractor")]
    pub arch_extractor: String,
    /// Compiler invoked with `-emit-ast`.
    #[serde(default = "default_compiler")]
    pub compiler: String,
    /// Writes definedFns.txt / externalFns.txt into the XTU directory.
    #[serde(default = "default_func_mapping")]
    pub func_mapping: String,
}

/// Which compilation database entries count as sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// File extensions, matched case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_arch_extractor() -> String {
    "clang-cmdline-arch-extractor".to_string()
}

fn default_compiler() -> String {
    "clang".to_string()
}

fn default_func_mapping() -> String {
    "clang-func-mapping".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![
        "cc".to_string(),
        "c".to_string(),
        "cxx".to_string(),
        "cpp".to_string(),
    ]
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            arch_extractor: default_arch_extractor(),
            compiler: default_compiler(),
            func_mapping: default_func_mapping(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

impl XtuConfig {
    /// Load config from a TOML file. A missing file yields defaults; a file
    /// that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|e| XtuError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load an explicit config path, or fall back to `<xtu_dir>/config.toml`.
    pub fn resolve(explicit: Option<&Path>, xtu_dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) if !path.exists() => Err(XtuError::Config {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            }),
            Some(path) => Self::load(path),
            None => Self::load(&Self::default_path(xtu_dir)),
        }
    }

    pub fn default_path(xtu_dir: &Path) -> PathBuf {
        xtu_dir.join(CONFIG_FILE)
    }
}
