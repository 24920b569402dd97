//! External command description and output filtering.
//!
//! [`Invocation`] is a builder describing one child process. The dispatcher
//! turns it into a running `tokio::process::Child`; nothing here spawns.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Invocation;
//!
//! let inv = Invocation::new("npx")
//!     .args(["grunt", "page", "--page", "home/v2"])
//!     .cwd(root)
//!     .envs(&vars);
//! dispatcher.run(inv).await;
//! ```

use regex::Regex;
use std::{
    ffi::OsStr,
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    sync::OnceLock,
};

// ============================================================================
// Builder API
// ============================================================================

/// Description of one external process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Invocation {
    /// Create a new invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["grunt"]` or `["npx", "grunt"]`).
    ///
    /// Returns `None` for an empty slice.
    pub fn from_slice<S: AsRef<str>>(cmd: &[S]) -> Option<Self> {
        let (program, rest) = cmd.split_first()?;
        Some(Self::new(program.as_ref()).args(rest))
    }

    /// Add a single argument. Empty arguments are dropped.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments. Empty arguments are dropped.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if !arg.is_empty() {
                self.args.push(arg.to_owned());
            }
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set environment variables for the subprocess.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs.push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Build a piped `tokio` command: stdin closed, stdout/stderr captured.
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (OsStr::new(k), OsStr::new(v))))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Output Filtering
// ============================================================================

/// Filter rule for captured child output.
///
/// Used to reduce noise by skipping known trailer lines such as a builder's
/// own "Done, without errors." banner.
#[derive(Debug, Clone, Default)]
pub struct FilterRule {
    /// Prefixes to skip when relaying output.
    pub skip_prefixes: Vec<String>,
}

impl FilterRule {
    /// Create a new filter rule.
    pub fn new<I, S>(skip_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip_prefixes: skip_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a (plain, trimmed) line should be skipped.
    fn should_skip(&self, line: &str) -> bool {
        line.is_empty() || self.skip_prefixes.iter().any(|p| line.starts_with(p.as_str()))
    }

    /// Lines of `output` that pass the filter, original formatting kept.
    pub fn apply(&self, output: &str) -> String {
        output
            .lines()
            .filter(|line| {
                let plain = strip_ansi(line);
                !self.should_skip(plain.trim())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Strip ANSI escape codes from string.
pub fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

// ============================================================================
// Tests
// ============================================================================
