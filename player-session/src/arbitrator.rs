//! Producer arbitration.
//!
//! The continuous stream and the on-demand queue both want the single
//! playback slot. The arbitrator guarantees at most one holds it: a
//! switch fully stops the previous producer (pause and clear, with its
//! `Stopped` event) strictly before the new one is announced and started.
//! Positions do not survive a switch; returning to a producer starts it
//! fresh.

use std::sync::Arc;

use parking_lot::Mutex;
use player_bridge::ProducerKind;
use player_runtime::{EventBus, PlaybackEvent, PlayerEvent};
use tracing::{info, instrument};

use crate::controller::PlaybackController;
use crate::error::Result;
use crate::stream::StreamProducer;

/// Grants the playback slot to one producer at a time.
#[derive(Clone)]
pub struct SourceArbitrator {
    inner: Arc<ArbitratorInner>,
}

struct ArbitratorInner {
    controller: PlaybackController,
    stream: StreamProducer,
    events: EventBus,
    active: Mutex<Option<ProducerKind>>,
    /// Serializes switches so stop-then-start never interleaves.
    switch: tokio::sync::Mutex<()>,
}

impl SourceArbitrator {
    pub(crate) fn new(
        controller: PlaybackController,
        stream: StreamProducer,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(ArbitratorInner {
                controller,
                stream,
                events,
                active: Mutex::new(None),
                switch: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The producer currently holding the slot.
    pub fn active(&self) -> Option<ProducerKind> {
        *self.inner.active.lock()
    }

    /// Hands the slot to `producer`, stopping the previous holder first.
    ///
    /// Re-activating the current holder is a no-op; the stream keeps
    /// broadcasting rather than rejoining.
    #[instrument(skip(self), fields(producer = %producer))]
    pub(crate) async fn activate(&self, producer: ProducerKind) -> Result<()> {
        let _switch = self.inner.switch.lock().await;

        let previous = *self.inner.active.lock();
        if previous == Some(producer) {
            return Ok(());
        }

        if let Some(previous) = previous {
            info!(from = %previous, to = %producer, "switching producer");
            if previous == ProducerKind::Stream {
                self.inner.stream.stop();
            }
            self.inner.controller.stop().await?;
        }

        *self.inner.active.lock() = Some(producer);
        self.inner
            .events
            .emit(PlayerEvent::Playback(PlaybackEvent::ProducerActivated {
                producer,
            }))
            .ok();

        if producer == ProducerKind::Stream {
            if let Err(error) = self.inner.stream.start().await {
                *self.inner.active.lock() = None;
                return Err(error);
            }
        }
        Ok(())
    }

    /// Stops whichever producer holds the slot and clears it.
    pub(crate) async fn release(&self) -> Result<()> {
        let _switch = self.inner.switch.lock().await;

        if self.inner.active.lock().take().is_none() {
            return Ok(());
        }
        self.inner.stream.stop();
        self.inner.controller.stop().await
    }
}

impl std::fmt::Debug for SourceArbitrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceArbitrator")
            .field("active", &self.active())
            .finish()
    }
}
