//! Raw processor: identity.

use super::{Processor, ProcessorError};
use crate::events::Event;
use async_trait::async_trait;

/// Returns events unchanged.
pub struct RawProcessor;

#[async_trait]
impl Processor for RawProcessor {
    async fn process(&self, events: &[Event]) -> Result<Vec<Event>, ProcessorError> {
        Ok(events.to_vec())
    }
}
