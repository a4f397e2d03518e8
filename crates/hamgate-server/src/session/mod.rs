//! Login sessions

mod housekeeping;
mod table;

pub use housekeeping::{run_housekeeping, HOUSEKEEPING_INTERVAL};
pub use table::{Session, SessionInfo, SessionTable};
