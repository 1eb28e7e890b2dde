//! Session subscriber that writes the feed to the log.
//!
//! Goals are logged at `info`, every fusion publish at `debug` with the
//! mode-specific cue a presentation layer would render, and the full JSON
//! payload at `trace`.

use touchline_core::hub::SessionEvent;
use touchline_types::{FeedEvent, FusionOutput};
use tracing::{debug, info, trace};

/// Log one session event.
pub fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Goal(goal) => info!(
            frame = goal.frame,
            tally = goal.score.goals(goal.scoring_team),
            team_a = goal.score.team_a,
            team_b = goal.score.team_b,
            "{}",
            goal.announcement()
        ),
        SessionEvent::Feed(feed) => log_feed(feed),
    }
}

fn log_feed(feed: &FeedEvent) {
    match feed.fusion {
        FusionOutput::Deaf(out) => debug!(
            frame = feed.frame,
            match_time = %feed.match_time,
            direction = ?out.direction(),
            intensity = out.emotional_intensity,
            "Deaf feed"
        ),
        FusionOutput::Blind(out) => debug!(
            frame = feed.frame,
            match_time = %feed.match_time,
            distance = out.distance,
            angle = out.angle,
            volume = out.volume,
            pitch = out.pitch,
            "Blind feed"
        ),
    }
    if tracing::enabled!(tracing::Level::TRACE) {
        match serde_json::to_string(feed) {
            Ok(payload) => trace!(%payload, "Feed payload"),
            Err(e) => debug!(error = %e, "Feed payload not serializable"),
        }
    }
}
