//! Receive-side session state.
//!
//! A session collects the frames of one image from one transmitter. The
//! [`SessionReassembler`] owns the slot map for a single session and the
//! [`SessionRegistry`] keeps at most one open session per [`TransmitterId`].

pub mod error;
pub mod finalized;
pub mod id;
pub mod reassembler;
pub mod registry;

pub use error::ReassemblyError;
pub use finalized::{FinalizeReason, FinalizedImage, SessionStats};
pub use id::{MAX_TRANSMITTER_ID_LEN, TransmitterId, TransmitterIdError};
pub use reassembler::{AcceptStatus, SessionReassembler, SessionState};
pub use registry::{SessionHandle, SessionRegistry};
