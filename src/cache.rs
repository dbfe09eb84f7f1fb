//! Loaded-state cache keyed on source modification times
//!
//! A [`Snapshot`] bundles everything derived from the configured sources: the
//! coordinate registry, the group registry and the parsed results. The
//! [`SnapshotCache`] hands out `Arc<Snapshot>` clones and replaces the whole
//! snapshot when a source file changes, so a reader never sees a registry from one
//! load next to results from another.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::config::Config;
use crate::geometry::RouteGeometry;
use crate::groups::GroupRegistry;
use crate::registry::{CoordinateRegistry, SheetScale};
use crate::results::{ParsedResults, ResultsParser};
use crate::splits::SplitsCalculator;
use crate::Result;

/// Modification time of one source, `None` when the file is absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStamp {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl SourceStamp {
    fn read(path: &Path) -> Self {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        Self { path: path.to_path_buf(), modified }
    }
}

fn source_stamps(config: &Config) -> Vec<SourceStamp> {
    let sources = &config.sources;
    std::iter::once(sources.coordinates.as_path())
        .chain(std::iter::once(sources.results.as_path()))
        .chain(sources.groups.as_deref())
        .chain(config.map.image.as_deref())
        .map(SourceStamp::read)
        .collect()
}

/// Everything loaded from one consistent read of the sources
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub config: Config,
    pub registry: CoordinateRegistry,
    pub groups: GroupRegistry,
    pub results: ParsedResults,
    /// Source modification times observed before loading
    pub sources: Vec<SourceStamp>,
    pub loaded_at: SystemTime,
    /// Increments with every rebuild of a cache
    pub generation: u64,
}

impl Snapshot {
    /// Load every configured source.
    pub fn load(config: &Config) -> Result<Self> {
        let sources = source_stamps(config);

        let (width, height) = config.map.pixel_size()?;
        let scale = SheetScale::new(config.sheet, width, height);
        let registry =
            CoordinateRegistry::load(
                &config.sources.coordinates,
                scale,
                &config.markers,
                &config.tokens,
            )?;

        let groups = match &config.sources.groups {
            Some(path) => GroupRegistry::load(path, &config.tokens)?,
            None => GroupRegistry::open(),
        };

        let results = ResultsParser::new(&groups, &config.results, &config.tokens)
            .load(&config.sources.results, &config.sources.encoding)?;

        Ok(Self {
            config: config.clone(),
            registry,
            groups,
            results,
            sources,
            loaded_at: SystemTime::now(),
            generation: 0,
        })
    }

    pub fn geometry(&self) -> RouteGeometry<'_> {
        RouteGeometry::new(
            &self.registry,
            self.config.route,
            self.config.markers.terminal_radius_multiplier,
        )
    }

    pub fn splits(&self) -> SplitsCalculator<'_> {
        SplitsCalculator::new(&self.registry, self.config.distance.meters_per_mm)
    }

    /// Whether the sources on disk differ from the ones this snapshot was built from
    pub fn is_stale(&self) -> bool {
        source_stamps(&self.config) != self.sources
    }
}

/// Holds the current snapshot and rebuilds it when sources change
#[derive(Debug)]
pub struct SnapshotCache {
    config: Config,
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotCache {
    /// Build the cache with an initial load.
    pub fn load(config: Config) -> Result<Self> {
        let snapshot = Snapshot::load(&config)?;
        Ok(Self { config, current: RwLock::new(Arc::new(snapshot)) })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Rebuild the snapshot if any source changed.
    ///
    /// Returns the new snapshot after a rebuild and `None` when nothing changed. A
    /// failed rebuild leaves the current snapshot in place.
    pub fn refresh(&self) -> Result<Option<Arc<Snapshot>>> {
        let current = self.current();
        if !current.is_stale() {
            debug!(generation = current.generation, "Sources unchanged");
            return Ok(None);
        }

        let mut snapshot = Snapshot::load(&self.config)?;
        snapshot.generation = current.generation + 1;
        let snapshot = Arc::new(snapshot);

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        info!(
            generation = snapshot.generation,
            groups = snapshot.results.iter().count(),
            competitors = snapshot.results.competitor_count(),
            "Reloaded sources"
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_event, write_results, EventFiles, RESULTS_HTML};
    use crate::SplitviewError;
    use std::time::Duration;

    fn bump_mtime(path: &Path) {
        let file = std::fs::File::options().write(true).open(path).expect("open source");
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).expect("set mtime");
    }

    #[test]
    fn unchanged_sources_keep_the_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let EventFiles { config, .. } = write_event(dir.path()).expect("fixture event");

        let cache = SnapshotCache::load(config).expect("initial load");
        let before = cache.current();
        assert!(cache.refresh().expect("refresh").is_none());
        assert!(Arc::ptr_eq(&before, &cache.current()));
    }

    #[test]
    fn changed_results_swap_the_whole_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let EventFiles { config, results, .. } = write_event(dir.path()).expect("fixture event");

        let cache = SnapshotCache::load(config).expect("initial load");
        let before = cache.current();
        let competitors = before.results.competitor_count();

        write_results(&results, &RESULTS_HTML.replacen("Петров", "", 1)).expect("rewrite results");
        bump_mtime(&results);

        let after = cache.refresh().expect("refresh").expect("rebuilt");
        assert_eq!(after.generation, 1);
        assert_eq!(after.results.competitor_count(), competitors - 1);
        // Readers holding the old Arc still see the old state
        assert_eq!(before.results.competitor_count(), competitors);
    }

    #[test]
    fn failed_rebuild_keeps_current_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let EventFiles { config, coordinates, .. } =
            write_event(dir.path()).expect("fixture event");

        let cache = SnapshotCache::load(config).expect("initial load");
        std::fs::remove_file(&coordinates).expect("remove");

        assert!(matches!(cache.refresh(), Err(SplitviewError::NoData { .. })));
        assert_eq!(cache.current().generation, 0);
    }
}
