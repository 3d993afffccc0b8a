//! The fixed-rate, round-robin dispatch loop.

use std::{num::NonZeroU32, time::Duration};

use rand::{SeedableRng, rngs::StdRng};
use spigot_payload::{IdPool, MessageGenerator, TemplateStore};
use tokio::{task::JoinSet, time::sleep};
use tracing::{debug, error, info};

use crate::{
    config::{self, Config},
    connection::{self, Connection},
};

/// Errors produced by [`Dispatcher`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// See [`crate::config::Error`] for details.
    #[error(transparent)]
    Config(#[from] config::Error),
    /// See [`spigot_payload::Error`] for details.
    #[error(transparent)]
    Payload(#[from] spigot_payload::Error),
}

/// Interval between dispatch ticks for the given global rate.
///
/// Integer division: rates that do not evenly divide one million
/// microseconds run marginally slow, `3/sec` becomes one tick per 333,333us.
/// Accepted approximation, kept from the outset of this tool's design.
#[must_use]
pub fn tick_delay(requests_per_second: NonZeroU32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(requests_per_second.get()))
}

/// Advance the round-robin cursor by one slot.
#[inline]
fn next_cursor(cursor: usize, connections: usize) -> usize {
    (cursor + 1) % connections
}

/// The dispatch loop.
///
/// Once per tick: draw one message, hand it to the next connection in the
/// cycle, spawn the send without waiting on it and advance the cursor. The
/// cursor is owned by the loop alone; spawned sends share only the
/// read-only template store and id pools.
#[derive(Debug)]
pub struct Dispatcher {
    connections: Vec<Connection>,
    cursor: usize,
    delay: Duration,
    generator: MessageGenerator,
    rng: StdRng,
    shutdown: spigot_signal::Watcher,
}

impl Dispatcher {
    /// Assemble a dispatcher from configuration.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or unparseable template and id-pool sources, or
    /// when the template weights do not form a distribution.
    pub fn new(config: &Config, shutdown: spigot_signal::Watcher) -> Result<Self, Error> {
        let templates = TemplateStore::new(config.template_weights()?)?;
        let pools = IdPool::new(config.id_pools()?);
        for (name, count) in pools.counts() {
            debug!(name, count, "id pool loaded");
        }

        let headers = config::parse_headers(&config.headers);
        let connections =
            connection::pool(config.parallel_connections, &config.target_uri, &headers);

        Ok(Self {
            connections,
            cursor: 0,
            delay: tick_delay(config.requests_per_second),
            generator: MessageGenerator::new(templates, pools),
            rng: StdRng::from_seed(config.seed),
            shutdown,
        })
    }

    /// Run the dispatch loop until the shutdown signal fires.
    ///
    /// In-flight sends are tracked and joined at shutdown rather than
    /// orphaned; completed ones are reaped opportunistically each tick so
    /// the set stays bounded.
    ///
    /// # Errors
    ///
    /// None currently. The signature leaves room for the loop to fail.
    pub async fn spin(self) -> Result<(), Error> {
        let Self {
            connections,
            mut cursor,
            delay,
            generator,
            mut rng,
            shutdown,
        } = self;

        let mut sends: JoinSet<()> = JoinSet::new();
        let shutdown_wait = shutdown.recv();
        tokio::pin!(shutdown_wait);
        loop {
            tokio::select! {
                () = sleep(delay) => {
                    let body = generator.generate(&mut rng);
                    let connection = connections[cursor].clone();
                    sends.spawn(async move {
                        let id = connection.id();
                        match connection.send(body.clone()).await {
                            Ok((status, response)) => {
                                info!(
                                    connection = id,
                                    status = status.as_u16(),
                                    body = %String::from_utf8_lossy(&body),
                                    response = %String::from_utf8_lossy(&response),
                                    "request complete"
                                );
                            }
                            Err(err) => {
                                error!(connection = id, error = %err, "request failed");
                            }
                        }
                    });
                    // Cursor advances before the send resolves; the spawned
                    // task never touches it.
                    cursor = next_cursor(cursor, connections.len());
                    while sends.try_join_next().is_some() {}
                }
                () = &mut shutdown_wait => {
                    info!("shutdown signal received");
                    while sends.join_next().await.is_some() {}
                    return Ok(());
                }
            }
        }
    }
}
