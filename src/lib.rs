//! Route and split reconstruction for orienteering events.
//!
//! Splitview combines three published artifacts of an event, the control point
//! coordinates, the group definitions and the timing software's HTML splits export,
//! into per-competitor routes drawn over the base map and split tables.
//!
//! # Features
//!
//! - **Coordinate registry**: sheet millimeters projected onto base map pixels
//! - **Lenient results parsing**: malformed rows and cells are skipped, never fatal
//! - **Route geometry**: polylines trimmed to marker boundaries, ready for SVG
//! - **Splits**: cumulative times and leg distances with a derived finish leg
//! - **Live reload**: a snapshot cache rebuilt when any source changes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use splitview::{CompetitorView, Splitview};
//!
//! fn main() -> splitview::Result<()> {
//!     let cache = Splitview::open("event/splitview.yaml")?;
//!     let snapshot = cache.current();
//!
//!     let view = CompetitorView::find(&snapshot, "М21", "Иванов")?;
//!     println!("{}", view.path_data);
//!     for row in &view.splits {
//!         println!("{:>4} {:>8} {:>6} m", row.control, row.elapsed, row.cumulative_distance_m);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Source parsing
pub mod groups;
pub mod registry;
pub mod results;

// Derived views
pub mod export;
pub mod geometry;
pub mod splits;

// Reload machinery
pub mod cache;
pub mod watch;

// Core exports
pub use config::Config;
pub use error::*;

pub use groups::{Group, GroupRegistry};
pub use registry::{ControlPoint, CoordinateRegistry, Role};
pub use results::{CompetitorRecord, ParsedResults, ResultsParser};

pub use export::{CompetitorView, EventExport};
pub use geometry::{RouteGeometry, RouteSegment, trimmed_segment};
pub use splits::{LegTime, SplitRow, SplitsCalculator};

pub use cache::{Snapshot, SnapshotCache};
pub use watch::{CacheWatcher, WatcherChannels};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Unified entry point for loading an event.
///
/// # Examples
///
/// ## One-shot load
/// ```rust,no_run
/// use splitview::Splitview;
///
/// fn main() -> splitview::Result<()> {
///     let cache = Splitview::open("splitview.yaml")?;
///     println!("{} competitors", cache.current().results.competitor_count());
///     Ok(())
/// }
/// ```
///
/// ## Live reload
/// ```rust,no_run
/// use futures::StreamExt;
/// use splitview::Splitview;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> splitview::Result<()> {
///     let channels = Splitview::watch("splitview.yaml", Duration::from_secs(5)).await?;
///     let mut updates = Box::pin(channels.snapshot_updates());
///     while let Some(snapshot) = updates.next().await {
///         println!("generation {}", snapshot.generation);
///     }
///     Ok(())
/// }
/// ```
pub struct Splitview;

impl Splitview {
    /// Load the configuration at `path` and every source it names.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is unreadable or invalid
    /// - The coordinate source or results document is missing
    /// - The base map size cannot be determined
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SnapshotCache> {
        SnapshotCache::load(Config::load(path)?)
    }

    /// Load an event and keep it current by polling its sources every `interval`.
    ///
    /// The initial load runs on the blocking pool.
    pub async fn watch<P: AsRef<Path>>(path: P, interval: Duration) -> Result<WatcherChannels> {
        let path = path.as_ref().to_path_buf();
        let cache = tokio::task::spawn_blocking(move || Self::open(path))
            .await
            .map_err(|e| SplitviewError::no_data(format!("initial load task failed: {e}")))??;
        Ok(CacheWatcher::spawn(Arc::new(cache), interval))
    }
}
