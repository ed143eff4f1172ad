pub mod message;
pub(crate) mod process;
pub mod script;
pub mod step;
pub mod steps;
pub mod task;

pub use message::{guess_level, MessageLevel};
pub use script::{expand_variables, split_args};
pub use step::{LaunchStep, StepContext, StepOutcome, StepState};
pub use task::{LaunchEvent, LaunchHandle, LaunchTask, TaskOutcome, TaskState};
