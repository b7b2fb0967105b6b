//! Error types for forge-host

use thiserror::Error;

/// Errors that can occur while talking to the host
#[derive(Error, Debug)]
pub enum HostError {
    /// Executable could not be spawned because it is not on PATH
    #[error("{program} is not installed or not in PATH")]
    NotFound { program: String },

    /// Executable exists but could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Command ran and exited unsuccessfully
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_program() {
        let err = HostError::NotFound {
            program: "mono".to_string(),
        };
        assert_eq!(err.to_string(), "mono is not installed or not in PATH");
    }

    #[test]
    fn test_command_failed_surfaces_stderr() {
        let err = HostError::CommandFailed {
            command: "git checkout 3.x".to_string(),
            status: "exit code 1".to_string(),
            stderr: "pathspec '3.x' did not match".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("git checkout 3.x"));
        assert!(msg.contains("did not match"));
    }
}
