mod job;
mod stage;
mod state;

pub use job::{JobOutcome, JobPlan, JobReport};
pub use stage::{Stage, StageQueue};
pub use state::{JobEvent, JobState, Rejection};
