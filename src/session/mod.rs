//! Preview session: state snapshot, transitions, and the pipeline driver.

mod driver;
mod state;

pub use driver::{Session, SessionConfig, DEFAULT_DEADLINE};
pub use state::{Event, Outcome, Rejection, RequestId, SessionState, Status};
