//! External process execution
//!
//! The deploy stage shells out to the deployment tool through the
//! [`ProcessRunner`] trait so tests can substitute [`MockProcessRunner`].

pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;


pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner};
