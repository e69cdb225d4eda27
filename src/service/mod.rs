//! Map service: serialized rebuilds and periodic publication.
//!
//! One thread owns the [`GridBuilder`] and the world handle. Rebuild requests
//! and periodic ticks are handled on that thread in arrival order:
//!
//! ```text
//! RebuildTrigger ──┐
//! RebuildTrigger ──┼─► command channel ─► service thread ─► MapPublisher (Arc swap)
//!   periodic tick ─┘                                    └─► MapSinks
//! ```
//!
//! A rebuild requested while a build is running queues behind it and the
//! caller blocks until its own build has been published, or until the
//! response timeout elapses.
//!
//! Builds cannot be cancelled. A world that never answers stalls the service
//! thread, and callers see [`ServiceError::Timeout`].

mod commands;
mod worker;

pub use commands::{
    CommandResponse, CommandResult, CommandWithResponse, MapCommand, RebuildTrigger,
    send_command_sync,
};

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::GridBuilder;
use crate::error::BuildError;
use crate::grid::CellCounts;
use crate::publish::{MapPublisher, MapSink};
use crate::world::RayIntersectionProvider;

use worker::{MIN_UPDATE_INTERVAL, ServiceWorker};

/// What the service does on each periodic tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodicMode {
    /// Rebuild the grid, then emit it.
    Rebuild,
    /// Re-emit the latest map without rebuilding.
    #[default]
    Republish,
    /// Only on-demand rebuilds.
    Disabled,
}

/// Map service settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    /// Time between periodic ticks.
    pub update_interval: Duration,
    /// What a periodic tick does.
    pub periodic: PeriodicMode,
    /// How long a trigger caller waits for its rebuild.
    pub response_timeout: Duration,
    /// Build once as soon as the thread starts.
    pub build_on_start: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(5),
            periodic: PeriodicMode::Republish,
            response_timeout: Duration::from_secs(60),
            build_on_start: true,
        }
    }
}

/// Map service errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The rebuild itself failed; the previous map stays published.
    #[error("rebuild failed: {0}")]
    Build(#[from] BuildError),

    /// The service thread has stopped.
    #[error("map service is not running")]
    NotRunning,

    /// No answer within the response timeout.
    #[error("no response from map service within {0:?}")]
    Timeout(Duration),

    /// The service thread could not be started.
    #[error("failed to spawn map service thread: {0}")]
    Spawn(String),

    /// The service thread panicked.
    #[error("map service thread panicked")]
    ThreadPanicked,
}

/// Outcome of one successful rebuild.
#[derive(Clone, Debug, PartialEq)]
pub struct RebuildSummary {
    /// Publication sequence number of the new map.
    pub sequence: u64,
    /// Cells per state in the new map.
    pub counts: CellCounts,
    /// Cells probed.
    pub probed: usize,
    /// Cells left Unknown by unanswered queries.
    pub inconclusive: usize,
    /// Build time.
    pub duration: Duration,
}

/// Handle to the running map service thread.
///
/// Dropping the handle shuts the thread down and waits for it.
pub struct MapService {
    publisher: Arc<MapPublisher>,
    trigger: RebuildTrigger,
    handle: Option<JoinHandle<()>>,
}

impl MapService {
    /// Start the service thread.
    pub fn spawn(
        builder: GridBuilder,
        world: Arc<dyn RayIntersectionProvider>,
        publisher: Arc<MapPublisher>,
        sinks: Vec<Box<dyn MapSink>>,
        mut config: ServiceConfig,
    ) -> Result<Self, ServiceError> {
        config.update_interval = config.update_interval.max(MIN_UPDATE_INTERVAL);

        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let trigger = RebuildTrigger::new(command_tx, config.response_timeout);

        let mut worker = ServiceWorker::new(
            builder,
            world,
            Arc::clone(&publisher),
            sinks,
            config,
            command_rx,
        );
        let handle = std::thread::Builder::new()
            .name("map-service".to_string())
            .spawn(move || worker.run())
            .map_err(|e| ServiceError::Spawn(e.to_string()))?;

        Ok(Self {
            publisher,
            trigger,
            handle: Some(handle),
        })
    }

    /// A new trigger for on-demand rebuilds.
    pub fn trigger(&self) -> RebuildTrigger {
        self.trigger.clone()
    }

    /// Where rebuilt maps are published.
    pub fn publisher(&self) -> &Arc<MapPublisher> {
        &self.publisher
    }

    /// Stop the service thread and wait for it to exit.
    ///
    /// A build in progress finishes first.
    pub fn shutdown(mut self) -> Result<(), ServiceError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), ServiceError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let (response_tx, _response_rx) = crossbeam_channel::bounded(1);
        let sent = self.trigger.sender().send(CommandWithResponse {
            command: MapCommand::Shutdown,
            response_tx,
        });
        if sent.is_err() {
            log::debug!("Map service already gone");
        }

        handle.join().map_err(|_| ServiceError::ThreadPanicked)
    }
}

impl Drop for MapService {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Map service shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildConfig, ProbeMode};
    use crate::core::CellState;
    use crate::grid::GridMetadata;
    use crate::publish::{ChannelSink, PublishedMap};
    use crate::world::test_utils::{Rect, ScriptedWorld};

    fn builder() -> GridBuilder {
        let metadata = GridMetadata::new(1.0, 10, 10, 0.5).unwrap();
        GridBuilder::new(
            metadata,
            BuildConfig {
                probe: ProbeMode::Vertical { half_length: 0.05 },
                ..BuildConfig::default()
            },
        )
    }

    fn on_demand() -> ServiceConfig {
        ServiceConfig {
            periodic: PeriodicMode::Disabled,
            build_on_start: false,
            response_timeout: Duration::from_secs(10),
            ..ServiceConfig::default()
        }
    }

    fn spawn(world: Arc<ScriptedWorld>, config: ServiceConfig) -> MapService {
        let publisher = Arc::new(MapPublisher::new("map"));
        MapService::spawn(builder(), world, publisher, Vec::new(), config).unwrap()
    }

    #[test]
    fn test_rebuild_publishes() {
        let world = Arc::new(ScriptedWorld::new().with_occupied(Rect::new(0.0, 0.0, 5.0, 5.0)));
        let service = spawn(world, on_demand());
        assert!(service.publisher().latest().is_none());

        let summary = service.trigger().rebuild().unwrap();
        assert_eq!(summary.sequence, 1);
        assert_eq!(summary.counts.occupied, 25);
        assert_eq!(summary.counts.unknown, 0);
        assert_eq!(summary.probed, 100);

        let latest = service.publisher().latest().unwrap();
        assert_eq!(latest.sequence, 1);
        assert_eq!(latest.grid.counts(), summary.counts);

        service.shutdown().unwrap();
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_map() {
        let world = Arc::new(ScriptedWorld::new().with_occupied(Rect::new(-5.0, -5.0, 0.0, 5.0)));
        let service = spawn(Arc::clone(&world), on_demand());
        let trigger = service.trigger();

        trigger.rebuild().unwrap();
        let before = service.publisher().latest().unwrap();

        world.set_unavailable(true);
        let result = trigger.rebuild();
        assert!(matches!(
            result,
            Err(ServiceError::Build(BuildError::WorldUnavailable(_)))
        ));

        let after = service.publisher().latest().unwrap();
        assert_eq!(after.sequence, before.sequence);
        assert_eq!(after.grid, before.grid);
        assert_eq!(after.grid.counts().occupied, 50);

        // Recovers once the world is back
        world.set_unavailable(false);
        assert_eq!(trigger.rebuild().unwrap().sequence, 2);
    }

    #[test]
    fn test_concurrent_requests_queue() {
        let world = Arc::new(ScriptedWorld::new());
        let service = spawn(world, on_demand());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let trigger = service.trigger();
                std::thread::spawn(move || trigger.rebuild())
            })
            .collect();

        let mut sequences: Vec<u64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap().sequence)
            .collect();
        sequences.sort_unstable();

        // Every caller got its own build
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert_eq!(service.publisher().sequence(), 4);
    }

    #[test]
    fn test_build_on_start() {
        let world = Arc::new(ScriptedWorld::new());
        let service = spawn(
            world,
            ServiceConfig {
                build_on_start: true,
                ..on_demand()
            },
        );

        // Commands are served after the initial build
        let summary = service.trigger().rebuild().unwrap();
        assert_eq!(summary.sequence, 2);
    }

    #[test]
    fn test_periodic_republish_reaches_sinks() {
        let world = Arc::new(ScriptedWorld::new());
        let (tx, rx) = crossbeam_channel::unbounded::<Arc<PublishedMap>>();
        let sinks: Vec<Box<dyn MapSink>> = vec![Box::new(ChannelSink::new(tx))];

        let config = ServiceConfig {
            update_interval: Duration::from_millis(20),
            periodic: PeriodicMode::Republish,
            build_on_start: true,
            response_timeout: Duration::from_secs(10),
        };
        let publisher = Arc::new(MapPublisher::new("map"));
        let service = MapService::spawn(builder(), world, publisher, sinks, config).unwrap();

        // Initial build, then at least two republications of the same map
        for _ in 0..3 {
            let map = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(map.sequence, 1);
            assert!(map.grid.cells().iter().all(|s| *s == CellState::Free));
        }

        service.shutdown().unwrap();
    }

    #[test]
    fn test_trigger_after_shutdown() {
        let world = Arc::new(ScriptedWorld::new());
        let service = spawn(world, on_demand());
        let trigger = service.trigger();
        service.shutdown().unwrap();

        assert_eq!(trigger.rebuild(), Err(ServiceError::NotRunning));
    }
}
