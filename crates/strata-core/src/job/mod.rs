//! Fire-and-forget extraction jobs.
//!
//! The enqueuing side ([`queue`]) never waits for a job; the consuming side
//! ([`worker`]) runs jobs on a bounded pool and owns the retry policy.

pub mod queue;
pub mod worker;
