pub mod core;
pub mod orchestration;
pub mod security;

pub use core::*;
pub use orchestration::{run_bump, BumpSummary, GitCli};
pub use security::{CommandRunner, RedactingWriter, RunnerError, SecretSet, SecretStore, CENSORED};
