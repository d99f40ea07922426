//! `RestOC` Core: result envelope, error codes, path rules, and internal keys.
//!
//! Everything in this crate is free of I/O. The dispatch layer that routes
//! calls to local or remote services lives in `restoc-services`.

pub mod action;
pub mod clock;
pub mod envelope;
pub mod errors;
pub mod internal_key;
pub mod session;

pub use action::{method_name, path_to_method, Action, PathError, UnknownAction};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use envelope::{Envelope, EnvelopeArgError, EnvelopeError, ErrorInput, Interrupt};
pub use internal_key::{InternalKeys, INTERNAL_FIELD};
pub use session::{Credential, SessionId};
