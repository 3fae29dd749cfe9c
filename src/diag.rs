//! Human-readable exit descriptions for log lines.
//!
//! Nothing in the runtime branches on these strings.

/// Returns the conventional name of a POSIX signal number.
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        5 => "SIGTRAP",
        6 => "SIGABRT",
        7 => "SIGBUS",
        8 => "SIGFPE",
        9 => "SIGKILL",
        10 => "SIGUSR1",
        11 => "SIGSEGV",
        12 => "SIGUSR2",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        _ => "unknown signal",
    }
}

/// Returns a short meaning for common exit codes.
pub fn exit_code_name(code: i32) -> &'static str {
    match code {
        0 => "success",
        1 => "general error",
        2 => "misuse of shell builtin",
        126 => "command not executable",
        127 => "command not found",
        130 => "interrupted",
        n if n > 128 && n < 160 => "terminated by signal",
        _ => "application error",
    }
}

/// Describes how a process ended.
///
/// ```
/// use procvisor::diag::describe_exit;
///
/// assert_eq!(describe_exit(Some(0), None), "exited with code 0 (success)");
/// assert_eq!(describe_exit(None, Some(9)), "killed by SIGKILL");
/// ```
pub fn describe_exit(code: Option<i32>, signal: Option<i32>) -> String {
    match (code, signal) {
        (_, Some(sig)) => format!("killed by {}", signal_name(sig)),
        (Some(code), None) => format!("exited with code {code} ({})", exit_code_name(code)),
        (None, None) => "exited with unknown status".to_string(),
    }
}
