//! Structured observability hooks for generation episodes.
//!
//! Every function emits one event with a stable `event` field so log
//! pipelines can filter on it. Set `RUST_LOG` to adjust verbosity.

use tracing::{info, warn};

use crate::domain::OrchestrationError;
use crate::orchestrator::EpisodePhase;

/// Span covering one episode. Attach it with `tracing::Instrument` so it
/// follows the future across await points.
pub fn episode_span(episode_id: &str, selector: &str) -> tracing::Span {
    tracing::info_span!("musika.episode", episode_id = %episode_id, selector = %selector)
}

/// Emit event: a trigger was accepted and an episode began.
pub fn emit_episode_started(episode_id: &str, selector: &str, seconds: f32, truncation: f32) {
    info!(
        event = "episode.started",
        episode_id = %episode_id,
        selector = %selector,
        seconds = seconds,
        truncation = truncation,
    );
}

pub fn emit_phase(phase: EpisodePhase) {
    tracing::debug!(event = "episode.phase", phase = %phase);
}

/// Emit event: a trigger was turned away without environment cost.
pub fn emit_episode_rejected(selector: &str, reason: &dyn std::fmt::Display) {
    info!(event = "episode.rejected", selector = %selector, reason = %reason);
}

/// Emit event: an episode reached a terminal report.
///
/// Failures inside the environment log at `warn`; turned-away triggers and
/// successes at `info`.
pub fn emit_episode_finished(
    episode_id: &str,
    duration_ms: u64,
    outcome: Result<(), &OrchestrationError>,
) {
    match outcome {
        Ok(()) => info!(
            event = "episode.finished",
            episode_id = %episode_id,
            duration_ms = duration_ms,
            success = true,
        ),
        Err(err) if err.is_rejection() => info!(
            event = "episode.finished",
            episode_id = %episode_id,
            duration_ms = duration_ms,
            success = false,
            reason = %err,
        ),
        Err(err) => warn!(
            event = "episode.finished",
            episode_id = %episode_id,
            duration_ms = duration_ms,
            success = false,
            error = %err,
        ),
    }
}

/// Emit event: best-effort stop failed after an episode (warning level).
pub fn emit_stop_failed(environment: &str, error: &dyn std::fmt::Display) {
    warn!(event = "environment.stop_failed", environment = %environment, error = %error);
}
