pub mod command_runner;
pub mod redacting_writer;
pub mod secret_store;

pub use command_runner::{CommandRunner, RunnerError};
pub use redacting_writer::{CENSORED, RedactingWriter, SecretSet};
pub use secret_store::{SecretStore, SecretStoreError};
