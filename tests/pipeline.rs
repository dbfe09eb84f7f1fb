//! End-to-end tests over on-disk sources: config loading, the full snapshot and the
//! command line front end.

use std::path::Path;
use std::process::Command;

use splitview::splits::{LegTime, SplitKind};
use splitview::{CompetitorView, EventExport, Role, Splitview, SplitviewError};

const COORDINATES: &str = "\
С1: (100.0, 50.0)
31: (120.5, 80.0)
32: (200.0, 150.0)
Ф1: (110.0, 60.0)
garbage
";

const GROUPS: &str = "\
М12: С1 31 32 Ф1
Ж12: С1 32 Ф1
";

const RESULTS: &str = r#"<html><body>
<a name="М12"></a><h2>М12</h2>
<table class="rezult">
<tr><th>Место</th><th>№</th><th>Фамилия, имя</th><th>Результат</th><th>#1 (31)</th><th>#2 (32)</th></tr>
<tr><td>1.</td><td>11</td><td>Орлов Игорь</td><td>1:10:00</td><td>[31]<br>3:15</td><td>[32]<br>-</td></tr>
<tr><td>2.</td><td>12</td><td>Соколов&nbsp;Илья</td><td>1:00:00</td><td>[31]<br>3:15</td><td>[32]<br>1:02:00</td></tr>
<tr><td></td><td>13</td><td></td><td></td><td></td><td></td></tr>
</table>
<a name="Ж12"></a><h2>Ж12</h2>
<table class="rezult">
<tr><th>Место</th><th>№</th><th>Фамилия, имя</th><th>Результат</th><th>#1 (32)</th></tr>
</table>
</body></html>
"#;

const CONFIG: &str = "\
sources:
  coordinates: coordinates.txt
  results: splits.htm
  groups: groups.txt
  encoding: utf-8
map:
  width_px: 2100
  height_px: 1487
sheet:
  width_mm: 420
  height_mm: 297
";

fn write_event(dir: &Path) -> std::path::PathBuf {
    std::fs::write(dir.join("coordinates.txt"), COORDINATES).expect("write coordinates");
    std::fs::write(dir.join("groups.txt"), GROUPS).expect("write groups");
    std::fs::write(dir.join("splits.htm"), RESULTS).expect("write results");
    let config = dir.join("splitview.yaml");
    std::fs::write(&config, CONFIG).expect("write config");
    config
}

#[test]
fn loads_event_with_relative_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_event(dir.path());

    let cache = Splitview::open(&config).expect("event loads");
    let snapshot = cache.current();

    assert_eq!(snapshot.registry.len(), 4);
    assert_eq!(snapshot.registry.skipped(), 1);

    let point = snapshot.registry.get("31").expect("control 31");
    assert_eq!(point.role, Role::Control);
    assert!((point.pixel.x - 602.5).abs() < 1e-9);
    assert!((point.pixel.y - 1087.0).abs() < 1.0);
    assert_eq!(snapshot.registry.get("Ф1").map(|p| p.role), Some(Role::Finish));

    let groups: Vec<_> = snapshot.results.iter().map(|g| g.group.name.as_str()).collect();
    assert_eq!(groups, ["М12", "Ж12"]);
    assert!(snapshot.results.get("Ж12").expect("empty group listed").competitors.is_empty());
    assert_eq!(snapshot.results.stats().rows_skipped, 1);
}

#[test]
fn derives_finish_leg_from_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = Splitview::open(write_event(dir.path())).expect("event loads");
    let snapshot = cache.current();

    let record = snapshot.results.find("М12", "Орлов Игорь").expect("competitor");
    assert_eq!(record.path, ["С1", "31", "32", "Ф1"]);
    assert_eq!(record.leg_times, ["3:15", "-"]);

    // Entities are resolved in names
    let second = snapshot.results.find("М12", "2. Соколов Илья").expect("competitor");
    let rows = snapshot.splits().rows(second);
    assert_eq!(rows[2].elapsed, "1:05:15");
    // Result is shorter than the accumulated legs
    assert_eq!(rows[3].leg_time, LegTime::Undetermined);

    let view = CompetitorView::find(&snapshot, "М12", "Орлов Игорь").expect("view");
    let finish = view.splits.last().expect("finish row");
    assert_eq!(finish.kind, SplitKind::Finish);
    assert_eq!(finish.leg_time, LegTime::Derived(70 * 60 - 195));
    assert_eq!(finish.leg_time.to_string(), "1:06:45");

    let legs: u32 = view.splits.iter().filter_map(|r| r.leg_distance_m).sum();
    assert_eq!(finish.cumulative_distance_m, legs);
    assert_eq!(view.taken, ["31", "32"]);
}

#[test]
fn missing_sources_are_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_event(dir.path());
    std::fs::remove_file(dir.path().join("splits.htm")).expect("remove results");

    let error = Splitview::open(&config).expect_err("results missing");
    assert!(matches!(error, SplitviewError::NoData { .. }));
    assert!(error.is_fatal());

    let error = Splitview::open(dir.path().join("absent.yaml")).expect_err("config missing");
    assert!(matches!(error, SplitviewError::Config { .. }));
}

#[test]
fn map_size_comes_from_image_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_event(dir.path());
    image::RgbImage::new(420, 297).save(dir.path().join("map.png")).expect("write map");

    let config = dir.path().join("image.yaml");
    let yaml = CONFIG.replace("  width_px: 2100\n  height_px: 1487\n", "  image: map.png\n");
    std::fs::write(&config, yaml).expect("write config");

    let snapshot = Splitview::open(&config).expect("event loads").current();
    let point = snapshot.registry.get("31").expect("control 31");
    assert!((point.pixel.x - 120.5).abs() < 1e-9);
    assert!((point.pixel.y - 217.0).abs() < 1e-9);
}

#[test]
fn export_serializes_whole_event() {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot = Splitview::open(write_event(dir.path())).expect("event loads").current();

    let json = serde_json::to_value(EventExport::from_snapshot(&snapshot)).expect("serializes");
    assert_eq!(json["points"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["groups"][0]["competitors"][0]["result"], "1:10:00");
    assert_eq!(json["stats"]["rows_accepted"], 2);
}

#[test]
fn cli_prints_competitor_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_event(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_splitview"))
        .arg("--config")
        .arg(&config)
        .args(["competitor", "--group", "М12", "--name", "Орлов Игорь"])
        .output()
        .expect("run splitview");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(json["record"]["display_name"], "1. Орлов Игорь");
    assert_eq!(json["splits"].as_array().map(Vec::len), Some(4));

    let output = Command::new(env!("CARGO_BIN_EXE_splitview"))
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg("summary")
        .output()
        .expect("run splitview");
    assert!(!output.status.success());
}
