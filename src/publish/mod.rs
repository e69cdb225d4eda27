//! Grid publication.
//!
//! [`MapPublisher`] holds the latest finished grid behind an `Arc`. A rebuild
//! hands it a whole new grid which is swapped in under a short write lock;
//! readers clone the `Arc` and keep a consistent snapshot for as long as they
//! need it.
//!
//! [`MapSink`]s receive published maps (file export, channels).

mod message;
pub mod ros_map;

pub use message::{Header, MapInfo, OccupancyGridMsg, Orientation, Pose, Position, Stamp};
pub use ros_map::RosMapWriter;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;

use crate::error::{MapError, Result};
use crate::grid::OccupancyGrid;

/// One published grid with its publication metadata.
#[derive(Clone, Debug)]
pub struct PublishedMap {
    /// The published grid.
    pub grid: OccupancyGrid,
    /// Increments by one per publication, starting at 1.
    pub sequence: u64,
    /// Publication time.
    pub stamp: SystemTime,
    /// Coordinate frame of the map.
    pub frame_id: String,
}

impl PublishedMap {
    /// Stamp `grid` with the current time.
    pub fn new(grid: OccupancyGrid, sequence: u64, frame_id: &str) -> Self {
        Self {
            grid,
            sequence,
            stamp: SystemTime::now(),
            frame_id: frame_id.to_string(),
        }
    }

    /// Wire representation.
    pub fn to_message(&self) -> OccupancyGridMsg {
        OccupancyGridMsg::from_grid(
            &self.grid,
            self.sequence,
            Stamp::from(self.stamp),
            &self.frame_id,
        )
    }
}

/// Consumer of published maps.
pub trait MapSink: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Deliver a map. Errors are reported by the caller and never affect
    /// the published map.
    fn emit(&mut self, map: &PublishedMap) -> Result<()>;
}

/// Forwards maps to a channel subscriber.
///
/// A full bounded channel drops the map (the subscriber is behind and will
/// get the next one); a disconnected receiver is an error.
pub struct ChannelSink {
    tx: Sender<Arc<PublishedMap>>,
}

impl ChannelSink {
    /// Sink sending to `tx`.
    pub fn new(tx: Sender<Arc<PublishedMap>>) -> Self {
        Self { tx }
    }
}

impl MapSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    fn emit(&mut self, map: &PublishedMap) -> Result<()> {
        match self.tx.try_send(Arc::new(map.clone())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                log::debug!("Subscriber behind, dropped map #{}", map.sequence);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(MapError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "map subscriber disconnected",
            ))),
        }
    }
}

/// Latest-map holder shared between the map service and readers.
#[derive(Debug)]
pub struct MapPublisher {
    frame_id: String,
    current: RwLock<Option<Arc<PublishedMap>>>,
    sequence: AtomicU64,
}

impl MapPublisher {
    /// Publisher with nothing published yet.
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            current: RwLock::new(None),
            sequence: AtomicU64::new(0),
        }
    }

    /// Frame stamped on every published map.
    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Replace the published map with `grid`.
    ///
    /// The sequence number is assigned under the write lock, so the latest
    /// map always carries the highest sequence.
    pub fn publish(&self, grid: OccupancyGrid) -> Arc<PublishedMap> {
        let mut current = self.current.write();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let map = Arc::new(PublishedMap::new(grid, sequence, &self.frame_id));
        *current = Some(Arc::clone(&map));
        map
    }

    /// Latest published map, if any build has succeeded.
    pub fn latest(&self) -> Option<Arc<PublishedMap>> {
        self.current.read().clone()
    }

    /// Latest published map as a message.
    pub fn latest_message(&self) -> Option<OccupancyGridMsg> {
        self.latest().map(|m| m.to_message())
    }

    /// Sequence number of the latest publication (0 = nothing published).
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
