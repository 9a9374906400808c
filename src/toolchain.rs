//! External toolchain invocation.
//!
//! Everything that actually parses C/C++ lives behind [`Toolchain`]; the rest of
//! the crate is bookkeeping around these three calls.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::ToolsConfig;
use crate::error::{Result, XtuError};

/// Marker preceding the architecture in the arch extractor's output.
pub const ARCH_MARKER: char = '@';

/// Exit state of an external tool that was successfully launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    /// Non-zero exit; `None` when terminated by a signal.
    Failed(Option<i32>),
}

impl ToolStatus {
    pub fn success(&self) -> bool {
        matches!(self, ToolStatus::Success)
    }
}

impl From<std::process::ExitStatus> for ToolStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            ToolStatus::Success
        } else {
            ToolStatus::Failed(status.code())
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Success => write!(f, "success"),
            ToolStatus::Failed(Some(code)) => write!(f, "exit code {}", code),
            ToolStatus::Failed(None) => write!(f, "terminated by signal"),
        }
    }
}

/// The external programs an XTU build drives.
pub trait Toolchain: Send + Sync {
    /// Target architecture string for compiling `source` with `args`.
    fn detect_arch(&self, args: &[String], source: &str) -> Result<String>;

    /// Emit the AST of `source` to `output`.
    fn emit_ast(&self, args: &[String], source: &str, output: &Path) -> Result<ToolStatus>;

    /// Record defined and external functions of `sources` into `xtu_dir`.
    fn map_functions(&self, xtu_dir: &Path, sources: &[String], args: &[String])
        -> Result<ToolStatus>;
}

/// Clang binaries found in one directory.
#[derive(Debug, Clone)]
pub struct ClangToolchain {
    bin_dir: PathBuf,
    tools: ToolsConfig,
    verbose: bool,
}

impl ClangToolchain {
    /// `bin_dir` is made absolute so tool paths survive directory changes.
    pub fn new(bin_dir: &Path, tools: ToolsConfig, verbose: bool) -> Self {
        let bin_dir = bin_dir.canonicalize().unwrap_or_else(|_| {
            std::env::current_dir()
                .map(|cwd| cwd.join(bin_dir))
                .unwrap_or_else(|_| bin_dir.to_path_buf())
        });
        Self {
            bin_dir,
            tools,
            verbose,
        }
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    fn tool(&self, name: &str) -> PathBuf {
        self.bin_dir.join(name)
    }

    fn echo(&self, cmd: &Command) {
        let line = render_command(cmd);
        if self.verbose {
            println!("{}", line);
        }
        tracing::debug!(command = %line, "running external tool");
    }

    fn status(&self, mut cmd: Command, tool: &str) -> Result<ToolStatus> {
        self.echo(&cmd);
        let status = cmd.status().map_err(|source| XtuError::Spawn {
            tool: tool.to_string(),
            source,
        })?;
        Ok(status.into())
    }

    /// `<arch-extractor> <args..> <source>`
    pub fn arch_command(&self, args: &[String], source: &str) -> Command {
        let mut cmd = Command::new(self.tool(&self.tools.arch_extractor));
        cmd.args(args).arg(source);
        cmd
    }

    /// `<compiler> -emit-ast <args..> -w <source> -o <output>`
    pub fn emit_ast_command(&self, args: &[String], source: &str, output: &Path) -> Command {
        let mut cmd = Command::new(self.tool(&self.tools.compiler));
        cmd.arg("-emit-ast")
            .args(args)
            .arg("-w")
            .arg(source)
            .arg("-o")
            .arg(output);
        cmd
    }

    /// `<func-mapping> --xtu-dir <dir> <sources..> -- <args..>`
    pub fn map_command(&self, xtu_dir: &Path, sources: &[String], args: &[String]) -> Command {
        let mut cmd = Command::new(self.tool(&self.tools.func_mapping));
        cmd.arg("--xtu-dir")
            .arg(xtu_dir)
            .args(sources)
            .arg("--")
            .args(args);
        cmd
    }
}

impl Toolchain for ClangToolchain {
    fn detect_arch(&self, args: &[String], source: &str) -> Result<String> {
        let tool = &self.tools.arch_extractor;
        let mut cmd = self.arch_command(args, source);
        cmd.stdout(Stdio::piped());
        self.echo(&cmd);

        let output = cmd.output().map_err(|source| XtuError::Spawn {
            tool: tool.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(XtuError::ArchDetection {
                source_file: source.to_string(),
                message: ToolStatus::from(output.status).to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let arch = parse_arch(&stdout);
        validate_arch(arch).map_err(|message| XtuError::ArchDetection {
            source_file: source.to_string(),
            message,
        })?;
        Ok(arch.to_string())
    }

    fn emit_ast(&self, args: &[String], source: &str, output: &Path) -> Result<ToolStatus> {
        let cmd = self.emit_ast_command(args, source, output);
        self.status(cmd, &self.tools.compiler)
    }

    fn map_functions(
        &self,
        xtu_dir: &Path,
        sources: &[String],
        args: &[String],
    ) -> Result<ToolStatus> {
        let cmd = self.map_command(xtu_dir, sources, args);
        self.status(cmd, &self.tools.func_mapping)
    }
}

/// Text after the last `@` marker, trimmed. Without a marker, the whole output.
pub fn parse_arch(output: &str) -> &str {
    match output.rfind(ARCH_MARKER) {
        Some(pos) => output[pos + ARCH_MARKER.len_utf8()..].trim(),
        None => output.trim(),
    }
}

/// The arch becomes one directory under `<root>/ast/`, so it must be a single
/// plain path component.
pub fn validate_arch(arch: &str) -> std::result::Result<(), String> {
    if arch.is_empty() {
        return Err("empty architecture".to_string());
    }
    if arch.contains('/') || arch.contains('\\') || arch == "." || arch == ".." {
        return Err(format!("architecture {:?} is not a single path component", arch));
    }
    Ok(())
}

/// Shell-like rendering of a command for echoing.
fn render_command(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arch_takes_text_after_last_marker() {
        assert_eq!(parse_arch("target@x86_64\n"), "x86_64");
        assert_eq!(parse_arch("a@b@armv7 \n"), "armv7");
        assert_eq!(parse_arch("  i386\n"), "i386");
        assert_eq!(parse_arch("trailing@\n"), "");
    }

    #[test]
    fn test_render_command() {
        let mut cmd = Command::new("/opt/llvm/bin/clang");
        cmd.arg("-emit-ast").args(["-O2", "-w"]).arg("a.c");
        assert_eq!(render_command(&cmd), "/opt/llvm/bin/clang -emit-ast -O2 -w a.c");
    }

    #[test]
    fn test_tool_paths_are_absolute() {
        let toolchain = ClangToolchain::new(Path::new("relative/bin"), ToolsConfig::default(), false);
        assert!(toolchain.bin_dir().is_absolute());
        assert!(toolchain.tool("clang").ends_with("relative/bin/clang"));
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = ClangToolchain::new(dir.path(), ToolsConfig::default(), false);

        let result = toolchain.emit_ast(&[], "a.c", &dir.path().join("a.c.ast"));
        assert!(matches!(result, Err(XtuError::Spawn { .. })));
    }

    #[test]
    fn test_validate_arch() {
        assert!(validate_arch("x86_64").is_ok());
        assert!(validate_arch("armv7-unknown-linux").is_ok());
        assert!(validate_arch("").is_err());
        assert!(validate_arch("/tmp/x").is_err());
        assert!(validate_arch("a/../b").is_err());
        assert!(validate_arch("..").is_err());
    }

    #[test]
    fn test_verbose_echo_matches_command_lines() {
        let toolchain = ClangToolchain::new(Path::new("/opt/llvm/bin"), ToolsConfig::default(), true);
        let args = vec!["-O2".to_string()];

        assert_eq!(
            render_command(&toolchain.arch_command(&args, "a.c")),
            "/opt/llvm/bin/clang-cmdline-arch-extractor -O2 a.c"
        );
        assert_eq!(
            render_command(&toolchain.emit_ast_command(&args, "a.c", Path::new(".xtu/ast/x86_64/a.c.ast"))),
            "/opt/llvm/bin/clang -emit-ast -O2 -w a.c -o .xtu/ast/x86_64/a.c.ast"
        );
        assert_eq!(
            render_command(&toolchain.map_command(
                Path::new(".xtu"),
                &["a.c".to_string(), "b.c".to_string()],
                &args
            )),
            "/opt/llvm/bin/clang-func-mapping --xtu-dir .xtu a.c b.c -- -O2"
        );
    }

    #[test]
    fn test_tool_status_display() {
        assert_eq!(ToolStatus::Failed(Some(2)).to_string(), "exit code 2");
        assert!(ToolStatus::Success.success());
        assert!(!ToolStatus::Failed(None).success());
    }

    /// Real subprocesses: each tool is a shell script that records its argv.
    #[cfg(unix)]
    mod scripts {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        const ETXTBSY: i32 = 26;

        /// Write `<dir>/<name>`; it stores its argv in `<name>.argv`, one per line.
        fn install(dir: &Path, name: &str, body: &str) {
            let path = dir.join(name);
            let script = format!(
                "#!/bin/sh\nfor a in \"$@\"; do printf '%s\\n' \"$a\"; done > \"$0.argv\"\n{}\n",
                body
            );
            fs::write(&path, script).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        fn argv(dir: &Path, name: &str) -> Vec<String> {
            fs::read_to_string(dir.join(format!("{}.argv", name)))
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        /// A freshly written script can be briefly busy while another test
        /// thread forks; retry those spawns.
        fn retry_busy<T>(f: impl Fn() -> Result<T>) -> Result<T> {
            for _ in 0..50 {
                match f() {
                    Err(XtuError::Spawn { source, .. }) if source.raw_os_error() == Some(ETXTBSY) => {
                        std::thread::sleep(std::time::Duration::from_millis(20));
                    }
                    other => return other,
                }
            }
            f()
        }

        fn toolchain(dir: &TempDir) -> ClangToolchain {
            ClangToolchain::new(dir.path(), ToolsConfig::default(), false)
        }

        fn args() -> Vec<String> {
            vec!["-O2".to_string(), "-DMSG=hello world".to_string()]
        }

        #[test]
        fn test_detect_arch_reads_text_after_marker() {
            let dir = tempfile::tempdir().unwrap();
            install(dir.path(), "clang-cmdline-arch-extractor", "echo 'x86_64-linux@armv7'");

            let arch = retry_busy(|| toolchain(&dir).detect_arch(&args(), "src/a.c")).unwrap();

            assert_eq!(arch, "armv7");
            assert_eq!(
                argv(dir.path(), "clang-cmdline-arch-extractor"),
                vec!["-O2", "-DMSG=hello world", "src/a.c"]
            );
        }

        #[test]
        fn test_detect_arch_nonzero_exit_is_error() {
            let dir = tempfile::tempdir().unwrap();
            install(dir.path(), "clang-cmdline-arch-extractor", "echo 'x@armv7'\nexit 3");

            let result = retry_busy(|| toolchain(&dir).detect_arch(&args(), "a.c"));

            match result {
                Err(XtuError::ArchDetection { source_file, message }) => {
                    assert_eq!(source_file, "a.c");
                    assert_eq!(message, "exit code 3");
                }
                other => panic!("expected arch detection error, got {:?}", other),
            }
        }

        #[test]
        fn test_detect_arch_empty_is_error() {
            let dir = tempfile::tempdir().unwrap();
            install(dir.path(), "clang-cmdline-arch-extractor", "echo 'triple@'");

            let result = retry_busy(|| toolchain(&dir).detect_arch(&args(), "a.c"));
            assert!(matches!(result, Err(XtuError::ArchDetection { .. })));
        }

        #[test]
        fn test_detect_arch_rejects_absolute_path() {
            let dir = tempfile::tempdir().unwrap();
            install(dir.path(), "clang-cmdline-arch-extractor", "echo 'x@/tmp/evil'");

            let result = retry_busy(|| toolchain(&dir).detect_arch(&args(), "a.c"));
            assert!(matches!(result, Err(XtuError::ArchDetection { .. })));
        }

        #[test]
        fn test_emit_ast_argv() {
            let dir = tempfile::tempdir().unwrap();
            install(dir.path(), "clang", "exit 0");
            let out = dir.path().join("ast/armv7/a.c.ast");

            let status = retry_busy(|| toolchain(&dir).emit_ast(&args(), "a.c", &out)).unwrap();

            assert_eq!(status, ToolStatus::Success);
            assert_eq!(
                argv(dir.path(), "clang"),
                vec![
                    "-emit-ast".to_string(),
                    "-O2".to_string(),
                    "-DMSG=hello world".to_string(),
                    "-w".to_string(),
                    "a.c".to_string(),
                    "-o".to_string(),
                    out.to_string_lossy().to_string(),
                ]
            );
        }

        #[test]
        fn test_emit_ast_nonzero_exit_is_status_not_error() {
            let dir = tempfile::tempdir().unwrap();
            install(dir.path(), "clang", "exit 1");

            let status = retry_busy(|| {
                toolchain(&dir).emit_ast(&[], "a.c", &dir.path().join("a.c.ast"))
            })
            .unwrap();

            assert_eq!(status, ToolStatus::Failed(Some(1)));
        }

        #[test]
        fn test_map_functions_argv() {
            let dir = tempfile::tempdir().unwrap();
            install(dir.path(), "clang-func-mapping", "exit 0");
            let xtu_dir = dir.path().join(".xtu");
            let sources = vec!["a.c".to_string(), "b.c".to_string()];

            let status =
                retry_busy(|| toolchain(&dir).map_functions(&xtu_dir, &sources, &args())).unwrap();

            assert!(status.success());
            assert_eq!(
                argv(dir.path(), "clang-func-mapping"),
                vec![
                    "--xtu-dir".to_string(),
                    xtu_dir.to_string_lossy().to_string(),
                    "a.c".to_string(),
                    "b.c".to_string(),
                    "--".to_string(),
                    "-O2".to_string(),
                    "-DMSG=hello world".to_string(),
                ]
            );
        }
    }
}
