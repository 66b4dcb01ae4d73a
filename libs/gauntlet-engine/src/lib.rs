//! Sandboxed execution of learner submissions.
//!
//! A request flows validate -> stage -> build -> invoke -> unstage -> normalize.
//! [`TestExecutor::execute_test`] is the only entry point callers need.

pub mod command;
pub mod engine;
pub mod error;
pub mod executor;
pub mod normalizer;
pub mod validator;
pub mod workspace;

pub use command::ContainerCommand;
pub use engine::{CommandInvoker, ProcessInvoker};
pub use error::ExecutorError;
pub use executor::TestExecutor;
pub use workspace::{LocalScratch, NameSource, ScratchFs, UuidNames, Workspace};
