use std::{sync::Arc, time::Duration};

use insightcast_core::{events::EventBus, playback::MediaEvent};
use tokio::sync::broadcast;

use crate::workers::events::media_event;

/// Emit `timeUpdate` ticks, the way an audio element does while playing.
pub async fn run_media_clock(
    bus: Arc<EventBus>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = ticks.tick() => bus.publish(media_event(MediaEvent::TimeUpdate)),
        }
    }
}
