pub mod calendar;
pub mod config;
pub mod engine;
pub mod model;
pub mod observability;
pub mod parser;
pub mod seed;
pub mod store;
pub mod sweeper;

pub use calendar::ValidationError;
pub use config::{Config, RetryPolicy};
pub use engine::{Engine, EngineError};
pub use model::{
    EventKind, EventRecord, Proposal, ProposalStrategy, Reservation, ReserveOutcome, ResourceGroup,
    ResourceId, Slot, Status,
};
pub use parser::{ParseError, ParsedRequest, RequestParser, StrictDateParser};
pub use store::{CommitError, StorageError, Store};
