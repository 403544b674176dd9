//! Process exit status and captured output

/// Exit code the POSIX shell reports when a command cannot be found
pub const COMMAND_NOT_FOUND: i32 = 127;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Status for a process that exited normally with `code`
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns true if the process was terminated by a signal
    pub fn terminated_by_signal(&self) -> bool {
        self.signal.is_some()
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Result of running a command to completion: `{stdout, exit status, success}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitResult {
    /// Exit status of the process
    pub status: ExitStatus,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExitResult {
    /// Build a result from an exit code and captured stdout
    pub fn new(code: i32, stdout: impl Into<String>) -> Self {
        Self {
            status: ExitStatus::from_code(code),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Whether the command exited with code 0
    pub fn succeeded(&self) -> bool {
        self.status.success()
    }

    /// Whether the command exited with anything other than 0
    pub fn failed(&self) -> bool {
        !self.succeeded()
    }

    /// The exit code, if the process exited normally
    pub fn code(&self) -> Option<i32> {
        self.status.code
    }

    /// Stdout with surrounding whitespace removed
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Non-empty stdout lines, with trailing carriage returns stripped
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
    }
}
