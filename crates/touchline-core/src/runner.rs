//! The session driver task.
//!
//! [`drive`] owns the [`Pipeline`] for as long as the session runs. It waits
//! on the armed [`Tickers`](crate::clock::Tickers) and the shutdown signal,
//! runs exactly one tick handler per wake-up, and hands the pipeline back
//! when asked to stop. A stop request always wins over a due tick.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::info;

use crate::clock::{ClockSet, ClockTick};
use crate::hub::FeedHub;
use crate::pipeline::Pipeline;

/// Number of handled ticks per stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounts {
    /// Frame ticks handled.
    pub frames: u64,
    /// Emotion ticks handled.
    pub emotions: u64,
    /// Fusion ticks handled.
    pub fusions: u64,
}

impl TickCounts {
    const fn record(&mut self, tick: ClockTick) {
        match tick {
            ClockTick::Frame => self.frames = self.frames.saturating_add(1),
            ClockTick::Emotion => self.emotions = self.emotions.saturating_add(1),
            ClockTick::Fusion => self.fusions = self.fusions.saturating_add(1),
        }
    }
}

/// What the driver returns when it stops.
#[derive(Debug)]
pub struct DriveResult {
    /// The pipeline, ready to be restarted.
    pub pipeline: Pipeline,
    /// Ticks handled during this run.
    pub ticks: TickCounts,
}

/// Run ticks until `shutdown` is notified.
///
/// Must be spawned on a Tokio runtime. The hub should be closed before
/// `shutdown` is notified so that a tick already in progress cannot publish.
pub async fn drive(
    mut pipeline: Pipeline,
    clocks: ClockSet,
    hub: FeedHub,
    shutdown: Arc<Notify>,
) -> DriveResult {
    let mut tickers = clocks.start();
    let mut ticks = TickCounts::default();
    pipeline.restart_clock(Instant::now());

    info!(
        frame_ms = clocks.frame_period().as_millis(),
        emotion_ms = clocks.emotion_period().as_millis(),
        fusion_ms = clocks.fusion_period().as_millis(),
        "Session driver starting"
    );

    loop {
        tokio::select! {
            biased;
            () = shutdown.notified() => break,
            tick = tickers.next() => {
                pipeline.handle(tick, &hub);
                ticks.record(tick);
            }
        }
    }

    info!(
        frames = ticks.frames,
        emotions = ticks.emotions,
        fusions = ticks.fusions,
        "Session driver stopped"
    );
    DriveResult { pipeline, ticks }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use touchline_types::{Mode, SessionId};

    use super::*;
    use crate::config::TouchlineConfig;
    use crate::hub::SessionEvent;

    #[tokio::test(start_paused = true)]
    async fn driver_runs_until_notified() {
        let config = TouchlineConfig::default();
        let clocks = ClockSet::from_config(&config.session).unwrap();
        let mut pipeline = Pipeline::new(SessionId::new(), &config, &clocks, 8);
        pipeline.initialize(Mode::Deaf);
        pipeline.start_fusion().unwrap();

        let hub = FeedHub::new(pipeline.snapshot());
        hub.open();
        let mut rx = hub.events();
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(drive(pipeline, clocks, hub.clone(), Arc::clone(&shutdown)));

        tokio::time::sleep(Duration::from_millis(500)).await;
        hub.close();
        shutdown.notify_one();
        let result = task.await.unwrap();

        assert!(result.ticks.frames >= 30, "frames = {}", result.ticks.frames);
        assert!(result.ticks.fusions >= 10, "fusions = {}", result.ticks.fusions);
        assert_eq!(result.ticks.emotions, 1);

        let mut feeds = 0_u32;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::Feed(feed) = event {
                assert_eq!(feed.fusion.mode(), Mode::Deaf);
                feeds = feeds.saturating_add(1);
            }
        }
        assert!(feeds >= 10, "feeds = {feeds}");
    }
}
