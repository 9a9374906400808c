//! On-disk layout of the XTU directory.
//!
//! ```text
//! .xtu/
//! ├── ast/<arch>/<absolute source path>.ast
//! ├── cfg.txt
//! ├── definedFns.txt
//! ├── externalFns.txt
//! └── externalFnMap.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const CFG_FILE: &str = "cfg.txt";
pub const DEFINED_FNS_FILE: &str = "definedFns.txt";
pub const EXTERNAL_FNS_FILE: &str = "externalFns.txt";
pub const EXTERNAL_FN_MAP_FILE: &str = "externalFnMap.txt";

/// Paths inside an XTU output directory.
#[derive(Debug, Clone)]
pub struct XtuLayout {
    root: PathBuf,
}

impl XtuLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it doesn't exist.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// `<root>/ast/<arch>/<absolute source path>.ast`
    pub fn ast_path(&self, arch: &str, source: &Path) -> PathBuf {
        let absolute = absolute_path(source);
        let relative = absolute.strip_prefix("/").unwrap_or(absolute.as_path());

        let mut file_name = relative.as_os_str().to_os_string();
        file_name.push(".ast");

        self.root.join("ast").join(arch).join(file_name)
    }

    pub fn cfg(&self) -> PathBuf {
        self.root.join(CFG_FILE)
    }

    pub fn defined_fns(&self) -> PathBuf {
        self.root.join(DEFINED_FNS_FILE)
    }

    pub fn external_fns(&self) -> PathBuf {
        self.root.join(EXTERNAL_FNS_FILE)
    }

    pub fn external_fn_map(&self) -> PathBuf {
        self.root.join(EXTERNAL_FN_MAP_FILE)
    }

    /// Remove listings left over from a previous run.
    ///
    /// The mapping tool appends to its listings, so they must start empty.
    pub fn clear_listings(&self) -> Result<()> {
        for path in [
            self.cfg(),
            self.defined_fns(),
            self.external_fns(),
            self.external_fn_map(),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "cleared listing"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Create the parent directory of `path`; existing directories are fine.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Resolve symlinks when the file exists, otherwise join it onto the cwd.
fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
