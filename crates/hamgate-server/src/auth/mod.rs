//! Callsign authentication
//!
//! Codes are standard six-digit, 30-second TOTP. Each callsign has its own
//! failure log and replay cache; the secret store itself is an immutable
//! snapshot replaced wholesale on reload.

mod authenticator;
mod failures;
mod replay;
mod store;

pub use authenticator::{Authenticator, Verification};
pub use failures::{FailureLog, FAILURE_WINDOW, MAX_FAILURES};
pub use replay::{ReplayCache, ReplayCheck, REPLAY_WINDOW};
pub use store::{
    build_generator, generate_secret, is_code_format, IdentityStore, CODE_DIGITS, CODE_SKEW_STEPS,
    CODE_STEP_SECS, ISSUER,
};
