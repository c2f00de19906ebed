pub mod error;
pub mod options;

pub use error::*;
pub use options::*;
