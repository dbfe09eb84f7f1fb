//! Fixture event used by unit tests and benchmarks
//!
//! A small two-group event on an A4 sheet rendered at 10 px/mm. Sources are written
//! to a caller-provided directory; the results document is stored in windows-1251
//! like real timing-software exports.

#![cfg(any(test, feature = "benchmark"))]

use std::path::{Path, PathBuf};

use crate::config::{Config, MapConfig, Sources};

pub const COORDINATES: &str = "\
С1: (20.0, 30.0)
31: (60.0, 80.0)
32: (120.5, 150.0)
33: (150.0, 60.0)
45: (100.0, 200.0)
Ф1: (30.0, 40.0)
not a coordinate line
";

pub const GROUPS: &str = "\
# name: start controls finish
М21: С1 31 32 45 Ф1
Ж21: С1 31 33 Ф1
";

pub const RESULTS_HTML: &str = r#"<html><head><title>Протокол результатов</title></head><body>
<h1>Протокол результатов</h1>
<a name="М21"></a><h2>М21, 3 км</h2>
<table class="rezult">
<tr><td>Место</td><td>№</td><td>Фамилия</td><td>Результат</td><td>#1 [31]</td><td>#2 [32]</td><td>#3 [45]</td></tr>
<tr><td>1.</td><td>101</td><td>Иванов</td><td>0:45:12</td><td>[31] 10:15<br>10:15</td><td>[32] 22:45<br>12:30</td><td>[45] 37:47<br>15:02</td></tr>
<tr><td>2.</td><td>102</td><td>Петров</td><td>0:52:40</td><td>[31]<br>11:00</td><td>[32]<br>-</td><td>[45]<br>16:20</td></tr>
<tr><td></td><td>103</td><td>Сидоров</td><td>снят</td><td>[31]<br>12:00</td><td></td><td></td></tr>
</table>
<a name="Ж21"></a><h2>Ж21, 2 км</h2>
<table class="rezult">
<tr><td>Место</td><td>№</td><td>Фамилия</td><td>Результат</td><td>#1 [31]</td><td>#2 [33]</td></tr>
<tr><td>1.</td><td>201</td><td>Смирнова</td><td>0:40:00</td><td>[31]<br>9:00</td><td>[33]<br>14:00</td></tr>
</table>
</body></html>
"#;

/// Paths of a fixture event written to disk
#[derive(Debug, Clone)]
pub struct EventFiles {
    /// Configuration with absolute source paths
    pub config: Config,
    pub config_path: PathBuf,
    pub coordinates: PathBuf,
    pub groups: PathBuf,
    pub results: PathBuf,
}

/// Write a results document in windows-1251.
pub fn write_results(path: &Path, html: &str) -> std::io::Result<()> {
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(html);
    std::fs::write(path, bytes)
}

/// Write the fixture event into `dir`.
pub fn write_event(dir: &Path) -> std::io::Result<EventFiles> {
    let coordinates = dir.join("coordinates.txt");
    let groups = dir.join("groups.txt");
    let results = dir.join("splits.htm");
    let config_path = dir.join("splitview.yaml");

    std::fs::write(&coordinates, COORDINATES)?;
    std::fs::write(&groups, GROUPS)?;
    write_results(&results, RESULTS_HTML)?;

    let config = Config {
        sources: Sources {
            coordinates: coordinates.clone(),
            results: results.clone(),
            groups: Some(groups.clone()),
            ..Sources::default()
        },
        map: MapConfig { width_px: Some(2100), height_px: Some(2970), image: None },
        ..Config::default()
    };

    let yaml = serde_yaml_ng::to_string(&config).map_err(std::io::Error::other)?;
    std::fs::write(&config_path, yaml)?;

    Ok(EventFiles { config, config_path, coordinates, groups, results })
}
