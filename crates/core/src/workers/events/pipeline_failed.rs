use std::sync::Arc;

use serde::Serialize;

use crate::events::{Event, EventHeader};

/// A worker's handler returned an error while processing `parent_ids`.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineFailed {
    pub header: EventHeader,
    pub stage: &'static str,
    pub message: String,
}

impl PipelineFailed {
    pub const EVENT_TYPE: &'static str = "pipeline.failed";

    pub fn new(parent: &Arc<dyn Event>, stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            header: EventHeader::child_of(parent.event_id()),
            stage,
            message: message.into(),
        }
    }
}

crate::impl_event!(PipelineFailed);
