//! Shared admit/resolve/load pipeline.
//!
//! Both producers start items the same way: re-point the access gate,
//! check the play decision, resolve candidate sources at the current
//! link's fan-out, then hand the list to the controller. The stream
//! additionally seeks to the live offset before starting.

use std::sync::Arc;
use std::time::Duration;

use player_bridge::{ActiveMedia, ConnectionMonitor, ProducerKind};
use player_runtime::{EventBus, PlayerEvent, SourceEvent};
use player_sources::SourceResolver;
use tracing::{debug, instrument};

use crate::error::{PlaybackError, Result};
use crate::PlaybackController;
use player_access::AccessGate;

/// Starts items on the controller after gating and source resolution.
#[derive(Clone)]
pub(crate) struct Launcher {
    gate: AccessGate,
    resolver: SourceResolver,
    monitor: Arc<dyn ConnectionMonitor>,
    controller: PlaybackController,
    events: EventBus,
}

impl Launcher {
    pub(crate) fn new(
        gate: AccessGate,
        resolver: SourceResolver,
        monitor: Arc<dyn ConnectionMonitor>,
        controller: PlaybackController,
        events: EventBus,
    ) -> Self {
        Self {
            gate,
            resolver,
            monitor,
            controller,
            events,
        }
    }

    /// Admits `media`, resolves its sources, and loads it.
    ///
    /// `start_at` seeks before playback starts (the stream's live offset);
    /// `autoplay` issues play once loaded. A denied decision aborts before
    /// the engine is touched.
    #[instrument(skip(self, media), fields(media = %media.media_id(), producer = %producer))]
    pub(crate) async fn launch(
        &self,
        media: ActiveMedia,
        producer: ProducerKind,
        start_at: Option<Duration>,
        autoplay: bool,
    ) -> Result<()> {
        self.gate.media_changed(Some(&media)).await;

        let decision = self.gate.authorize(&media);
        if !decision.is_allowed() {
            debug!(?decision, "playback refused by access gate");
            return Err(PlaybackError::AccessDenied { reason: decision });
        }

        let fan_out = self.monitor.alternate_gateway_count().await;
        let sources = self.resolver.resolve(media.audio_content_id(), fan_out);
        if sources.is_empty() {
            return Err(PlaybackError::NoSources);
        }

        self.events
            .emit(PlayerEvent::Source(SourceEvent::Resolved {
                media_id: media.media_id(),
                candidate_count: sources.len(),
            }))
            .ok();

        self.controller.load(media, producer, sources).await?;

        if let Some(position) = start_at {
            self.controller.seek(position).await?;
        }
        if autoplay {
            self.controller.play().await?;
        }
        Ok(())
    }
}
