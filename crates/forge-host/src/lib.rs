//! Forge-Host: host tooling layer for engine-forge
//!
//! Everything that touches the host outside of the engine tree itself lives
//! here: spawning external commands, locating executables on `PATH`,
//! identifying the operating system, parsing tool version banners and
//! fingerprinting directory trees.
//!
//! ## Key Components
//!
//! - `CommandRunner`: the seam every external invocation goes through
//! - `SystemRunner`: blocking `std::process` implementation
//! - `fakes::ScriptedRunner`: scripted runner for tests
//! - `HostPlatform`: the three platform branches the toolchain checks care about

pub mod command;
pub mod digest;
mod error;
pub mod fakes;
pub mod platform;
pub mod version;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use digest::{hash_directory, DirDigest};
pub use error::HostError;
pub use platform::{find_executable, HostPlatform};
pub use version::Version;

/// Result type for forge-host operations
pub type Result<T> = std::result::Result<T, HostError>;
