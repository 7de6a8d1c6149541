//! Live trend feed for one client connection.
//!
//! [`TrendTicker`] is a small state machine: `Open` emits the `hello` event
//! and arms three timers (trend cadence, keep-alive, lifetime), `Ticking`
//! waits on them plus the shutdown token, and any terminating transition
//! drops all timers at once by leaving `Ticking`. Dropping the ticker (client
//! disconnect) releases them the same way. Nothing is buffered; a tick the
//! consumer is too slow for is skipped.

use std::time::Duration;

use futures_util::Stream;
use rand::Rng;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{sample_trend, TrendEvent};
use crate::config::Config;

/// Timer settings for a stream.
#[derive(Debug, Clone, Copy)]
pub struct StreamCadence {
    pub trend_interval: Duration,
    pub keep_alive_interval: Duration,
    pub lifetime: Duration,
}

impl From<&Config> for StreamCadence {
    fn from(config: &Config) -> Self {
        Self {
            trend_interval: config.trend_interval,
            keep_alive_interval: config.keep_alive_interval,
            lifetime: config.stream_lifetime,
        }
    }
}

/// One unit written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum TrendFrame {
    Event(TrendEvent),
    /// Payload-free comment that keeps idle proxies from closing the connection.
    KeepAlive,
}

struct Timers {
    trend: Interval,
    keep_alive: Interval,
    deadline: std::pin::Pin<Box<Sleep>>,
}

impl Timers {
    fn start(cadence: &StreamCadence) -> Self {
        let now = Instant::now();

        let mut trend = interval_at(now + cadence.trend_interval, cadence.trend_interval);
        trend.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut keep_alive =
            interval_at(now + cadence.keep_alive_interval, cadence.keep_alive_interval);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            trend,
            keep_alive,
            deadline: Box::pin(sleep_until(now + cadence.lifetime)),
        }
    }
}

enum Phase {
    Open,
    Ticking(Timers),
    Closed,
}

enum Tick {
    Trend,
    KeepAlive,
    Expired,
    Cancelled,
}

pub struct TrendTicker<R> {
    phase: Phase,
    cadence: StreamCadence,
    shutdown: CancellationToken,
    rng: R,
}

impl<R: Rng> TrendTicker<R> {
    #[must_use]
    pub fn new(cadence: StreamCadence, shutdown: CancellationToken, rng: R) -> Self {
        Self {
            phase: Phase::Open,
            cadence,
            shutdown,
            rng,
        }
    }

    /// Wait for the next frame. `None` once the stream has closed.
    pub async fn next_frame(&mut self) -> Option<TrendFrame> {
        if matches!(self.phase, Phase::Open) {
            self.phase = Phase::Ticking(Timers::start(&self.cadence));
            return Some(TrendFrame::Event(TrendEvent::hello(now_millis())));
        }

        let Phase::Ticking(timers) = &mut self.phase else {
            return None;
        };

        let tick = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Tick::Cancelled,
            () = &mut timers.deadline => Tick::Expired,
            _ = timers.trend.tick() => Tick::Trend,
            _ = timers.keep_alive.tick() => Tick::KeepAlive,
        };

        match tick {
            Tick::Trend => {
                let trend = sample_trend(&mut self.rng);
                Some(TrendFrame::Event(TrendEvent::update(now_millis(), trend)))
            }
            Tick::KeepAlive => Some(TrendFrame::KeepAlive),
            Tick::Expired => {
                debug!("Trend stream reached its lifetime");
                self.phase = Phase::Closed;
                None
            }
            Tick::Cancelled => {
                debug!("Trend stream cancelled by shutdown");
                self.phase = Phase::Closed;
                None
            }
        }
    }
}

impl<R: Rng + Send + 'static> TrendTicker<R> {
    /// Frames as a stream, ending when the ticker closes.
    pub fn into_stream(mut self) -> impl Stream<Item = TrendFrame> + Send {
        async_stream::stream! {
            while let Some(frame) = self.next_frame().await {
                yield frame;
            }
        }
    }
}

impl<R> Drop for TrendTicker<R> {
    fn drop(&mut self) {
        if matches!(self.phase, Phase::Ticking(_)) {
            debug!("Trend stream client disconnected");
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
