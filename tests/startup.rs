use std::fs;

use cropcast::{config::ServiceConfig, web::AppState};
use tempfile::tempdir;

fn config_for(dir: &std::path::Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.datasets.storm_path = dir.join("historical-storm-dataset.csv");
    config.datasets.yield_path = dir.join("yield.csv");
    config
}

#[test]
fn loads_both_datasets() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("historical-storm-dataset.csv"),
        "name,year,wind_kph\nYolanda,2013,315\nRai,2021,195\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("yield.csv"),
        "year,area,yield\n2021,Bohol,2400\n",
    )
    .unwrap();

    let state = AppState::load(&config_for(temp.path())).expect("state should load");
    assert_eq!(state.storms.rows, 2);
    assert_eq!(state.storms.columns, vec!["name", "year", "wind_kph"]);
    assert_eq!(state.yields.len(), 1);
    assert_eq!(state.model.name(), "placeholder");
}

#[test]
fn tolerates_missing_yield_table() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("historical-storm-dataset.csv"),
        "name,year,wind_kph\n",
    )
    .unwrap();

    let state = AppState::load(&config_for(temp.path())).expect("state should load");
    assert!(state.yields.is_empty());
    assert_eq!(state.storms.rows, 0);
}

#[test]
fn missing_storm_archive_is_fatal() {
    let temp = tempdir().expect("tempdir");
    let err = match AppState::load(&config_for(temp.path())) {
        Ok(_) => panic!("load should fail without a storm archive"),
        Err(err) => err,
    };
    assert!(format!("{err:#}").contains("historical-storm-dataset.csv"));
}

#[test]
fn bundled_config_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/cropcast.yaml");
    let config = ServiceConfig::load(path).expect("bundled config parses");
    assert_eq!(config.grouping.fallback_years, vec![2020, 2021]);
}
