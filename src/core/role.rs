//! Process role resolution.

use std::fmt;

/// Role of this process, fixed at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// No pool: the process is its own master and worker.
    Standalone,
    /// Coordinating process; owns the worker registry.
    Master,
    /// Pool member spawned by a master.
    Worker,
}

impl ProcessRole {
    /// Resolves the role from the desired pool size and whether this process is the
    /// primary one (the process that began the run).
    ///
    /// ```
    /// use procvisor::ProcessRole;
    ///
    /// assert_eq!(ProcessRole::resolve(0, true), ProcessRole::Standalone);
    /// assert_eq!(ProcessRole::resolve(0, false), ProcessRole::Standalone);
    /// assert_eq!(ProcessRole::resolve(4, true), ProcessRole::Master);
    /// assert_eq!(ProcessRole::resolve(4, false), ProcessRole::Worker);
    /// ```
    pub fn resolve(workers: usize, primary: bool) -> Self {
        match (workers, primary) {
            (0, _) => ProcessRole::Standalone,
            (_, true) => ProcessRole::Master,
            (_, false) => ProcessRole::Worker,
        }
    }

    /// Lowercase label used in log spans.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Standalone => "standalone",
            ProcessRole::Master => "master",
            ProcessRole::Worker => "worker",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
