//! Transport-agnostic reservation engine: parsing, validation, conflict
//! arbitration and queries over one shared store.

pub mod alternatives;
pub mod conflict;
mod error;
mod mutations;
mod queries;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use error::EngineError;
pub use queries::{Period, ResourceSchedule, ScheduleView};

use crate::config::Config;
use crate::parser::{RequestParser, StrictDateParser};
use crate::store::Store;

pub struct Engine {
    store: Arc<Store>,
    parser: Box<dyn RequestParser>,
}

impl Engine {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_parser(store, Box::new(StrictDateParser::new()))
    }

    pub fn with_parser(store: Arc<Store>, parser: Box<dyn RequestParser>) -> Self {
        Self { store, parser }
    }

    pub fn config(&self) -> &Config {
        self.store.config()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}
