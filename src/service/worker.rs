//! Map service thread: owns the builder and world, serves commands and ticks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;

use crate::builder::GridBuilder;
use crate::publish::{MapPublisher, MapSink, PublishedMap};
use crate::world::RayIntersectionProvider;

use super::commands::{CommandReceiver, CommandResponse, CommandResult, MapCommand};
use super::{PeriodicMode, RebuildSummary, ServiceConfig, ServiceError};

/// Shortest tick interval; anything smaller would busy-loop.
pub(super) const MIN_UPDATE_INTERVAL: Duration = Duration::from_millis(10);

pub(super) struct ServiceWorker {
    builder: GridBuilder,
    world: Arc<dyn RayIntersectionProvider>,
    publisher: Arc<MapPublisher>,
    sinks: Vec<Box<dyn MapSink>>,
    config: ServiceConfig,
    command_rx: CommandReceiver,
    next_tick: Instant,
}

impl ServiceWorker {
    pub(super) fn new(
        builder: GridBuilder,
        world: Arc<dyn RayIntersectionProvider>,
        publisher: Arc<MapPublisher>,
        sinks: Vec<Box<dyn MapSink>>,
        config: ServiceConfig,
        command_rx: CommandReceiver,
    ) -> Self {
        let next_tick = Instant::now() + config.update_interval;
        Self {
            builder,
            world,
            publisher,
            sinks,
            config,
            command_rx,
            next_tick,
        }
    }

    /// Run until a shutdown command arrives or every sender is dropped.
    pub(super) fn run(&mut self) {
        log::info!(
            "Map service started (periodic: {:?}, interval {:.1}s)",
            self.config.periodic,
            self.config.update_interval.as_secs_f64()
        );

        if self.config.build_on_start
            && let Err(e) = self.rebuild()
        {
            log::error!("Initial build failed: {}", e);
        }

        loop {
            let received = if self.config.periodic == PeriodicMode::Disabled {
                self.command_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                let wait = self.next_tick.saturating_duration_since(Instant::now());
                self.command_rx.recv_timeout(wait)
            };

            match received {
                Ok(cmd) => {
                    let shutdown = cmd.command == MapCommand::Shutdown;
                    let result = self.handle_command(cmd.command);
                    // Caller may have timed out and gone away
                    let _ = cmd.response_tx.send(result);
                    if shutdown {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.tick();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Command channel disconnected, map service exiting");
                    break;
                }
            }
        }

        log::info!("Map service stopped");
    }

    fn handle_command(&mut self, command: MapCommand) -> CommandResult {
        match command {
            MapCommand::Rebuild => self.rebuild().map(CommandResponse::Rebuilt),
            MapCommand::Shutdown => Ok(CommandResponse::ShuttingDown),
        }
    }

    /// Periodic work, then schedule the next tick.
    fn tick(&mut self) {
        match self.config.periodic {
            PeriodicMode::Rebuild => {
                log::debug!("Periodic rebuild");
                if let Err(e) = self.rebuild() {
                    log::error!("Periodic rebuild failed: {}", e);
                }
            }
            PeriodicMode::Republish => {
                if let Some(map) = self.publisher.latest() {
                    log::debug!("Republishing map #{}", map.sequence);
                    self.emit(&map);
                }
            }
            PeriodicMode::Disabled => {}
        }
        self.schedule_next_tick();
    }

    fn schedule_next_tick(&mut self) {
        self.next_tick += self.config.update_interval;
        // Skip missed ticks after a long build
        let now = Instant::now();
        if self.next_tick <= now {
            self.next_tick = now + self.config.update_interval;
        }
    }

    /// Build and publish a fresh grid. A failed build leaves the published map alone.
    fn rebuild(&mut self) -> Result<RebuildSummary, ServiceError> {
        let output = self.builder.build(self.world.as_ref())?;
        let report = output.report;
        let map = self.publisher.publish(output.grid);

        log::info!(
            "Published map #{} ({} occupied, {} unknown)",
            map.sequence,
            report.counts.occupied,
            report.counts.unknown
        );
        self.emit(&map);

        Ok(RebuildSummary {
            sequence: map.sequence,
            counts: report.counts,
            probed: report.probed,
            inconclusive: report.inconclusive.len(),
            duration: report.duration,
        })
    }

    fn emit(&mut self, map: &PublishedMap) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.emit(map) {
                log::error!("Sink {} failed for map #{}: {}", sink.name(), map.sequence, e);
            }
        }
    }
}
