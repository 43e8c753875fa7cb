pub mod address;
pub mod candidate;
pub mod election;
pub mod event;
pub mod snapshot;
pub mod vote_record;

pub use address::*;
pub use candidate::*;
pub use election::*;
pub use event::*;
pub use snapshot::*;
pub use vote_record::*;

pub type ElectionId = u64;
pub type CandidateId = u64;
/// Unix timestamp in seconds.
pub type Timestamp = u64;
