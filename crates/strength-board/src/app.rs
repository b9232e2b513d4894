// Board loop: refresh the snapshot, score it, render it.
//
// With polling enabled the loop wakes on a fixed interval and re-renders only
// when the snapshot cache actually reloaded. Ctrl+C (or any shutdown future)
// ends the loop.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use strength_core::config::OutputFormat;
use strength_core::scoring::{compute_scores, ScoreRequest};
use strength_core::snapshot::{Refresh, SnapshotCache};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::render::{self, Caption};

/// Owns the snapshot cache and the request it is scored with.
pub struct Board {
    cache: SnapshotCache,
    request: ScoreRequest,
    format: OutputFormat,
}

impl Board {
    pub fn new(cache: SnapshotCache, request: ScoreRequest, format: OutputFormat) -> Self {
        Board {
            cache,
            request,
            format,
        }
    }

    /// Refresh the snapshot and render it if it is new or changed.
    pub fn update(&mut self, out: &mut impl Write) -> anyhow::Result<Refresh> {
        let refresh = self.cache.refresh().with_context(|| {
            format!("failed to load {}", self.cache.source().path.display())
        })?;
        if refresh == Refresh::Unchanged {
            return Ok(refresh);
        }
        self.render(out)?;
        Ok(refresh)
    }

    /// Score the current snapshot and write it to `out`.
    pub fn render(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let Some(snapshot) = self.cache.snapshot() else {
            debug!("nothing loaded yet; skipping render");
            return Ok(());
        };
        let rows = compute_scores(&snapshot.dataset, &self.request)
            .context("failed to compute scores")?;
        info!(
            "rendering {} rows from snapshot loaded at {}",
            rows.len(),
            snapshot.loaded_at.to_rfc3339()
        );

        let caption = Caption {
            request: &self.request,
            loaded_at: Some(snapshot.loaded_at),
        };
        render::render(out, self.format, &caption, &rows).context("failed to write output")?;
        out.flush().context("failed to flush output")?;
        Ok(())
    }
}

/// Render once, then keep polling every `poll_interval` until `shutdown`
/// resolves. Without an interval this returns after the first render.
///
/// The first load must succeed. Later failures are logged and the previous
/// snapshot stays on screen.
pub async fn run<W, F>(
    board: &mut Board,
    out: &mut W,
    poll_interval: Option<Duration>,
    shutdown: F,
) -> anyhow::Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    board.update(out)?;

    let Some(period) = poll_interval else {
        return Ok(());
    };

    info!("watching for changes every {:?}; press Ctrl+C to exit", period);
    let mut poll = tokio::time::interval(period);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    poll.tick().await;

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = poll.tick() => {
                match board.update(out) {
                    Ok(Refresh::Unchanged) => {}
                    Ok(refresh) => info!("data source changed ({:?})", refresh),
                    Err(e) => warn!("refresh failed, keeping previous snapshot: {:#}", e),
                }
            }
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }
    Ok(())
}
