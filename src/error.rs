//! Exit codes for the linkdedup process.

/// Process exit codes.
///
/// - 0: Success (run completed, including "nothing to do")
/// - 1: General error (bad configuration, unexpected failure)
/// - 3: Rollback failure (a file's authoritative location is ambiguous)
/// - 130: Interrupted by the operator (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Run completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// A move could not be rolled back after a failed symlink; the
    /// affected file's location is no longer known with certainty.
    RollbackFailed = 3,
    /// The run was interrupted by the operator.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit code for `std::process::exit`.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::GeneralError.as_i32(), 1);
        assert_eq!(ExitCode::RollbackFailed.as_i32(), 3);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
    }
}
