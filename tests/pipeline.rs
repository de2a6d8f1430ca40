// End-to-end: CSV log -> store -> normalize -> detect
use glidepath_lib::commands;
use glidepath_lib::config::AppConfig;
use glidepath_lib::events::{EventDetector, EventKind, DETECTION_ATTRIBUTES};
use glidepath_lib::normalize::{Normalizer, Processor};
use glidepath_lib::state::{self, AttributeStore, DbConnection, MemoryStore};
use tempfile::TempDir;

/// Approach at one sample per second, hours on the time axis
fn approach_csv() -> String {
    let mut csv = String::from(
        "Time,Vel_Indicated_kts,Altitude_FtAgl,Flaps_Handle,RunwayThreshold,Gear,Tail Number\n",
    );
    for second in 0..60u32 {
        let hours = f64::from(second) / 3600.0;
        let ias = 130.0 - f64::from(second);
        let (alt, flap, runway, gear) = match second {
            0..=9 => (1500.0, 0.0, 0.0, 0.0),
            10..=19 => (1000.0, 0.6, 0.0, 0.0),
            20..=29 => (600.0, 0.6, 0.0, 1.0),
            30..=34 => (200.0, 1.0, 0.0, 1.0),
            35..=37 => (40.0, 1.0, 1.0, 1.0),
            _ => (0.0, 1.0, 1.0, 1.0),
        };
        csv.push_str(&format!(
            "{},{},{},{},{},{},N123\n",
            hours, ias, alt, flap, runway, gear
        ));
    }
    csv
}

/// Raw rows of a CSV text, header excluded
fn csv_rows(csv: &str) -> Vec<Vec<String>> {
    csv.lines()
        .skip(1)
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

#[tokio::test]
async fn test_full_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("approach.csv");
    std::fs::write(&path, approach_csv()).unwrap();

    let db = DbConnection::open(&temp_dir.path().join("flights.db")).unwrap();
    let config = AppConfig::default();

    let summary = commands::load_flight(&db, &config, &path, Some("approach"))
        .await
        .unwrap();
    assert_eq!(summary.rows_written, 60);
    assert_eq!(summary.rows_with_nulls, 0);
    assert_eq!(summary.columns[6].name, "TailNumber");

    // Raw series and statistics
    let raw = db
        .get_data_attributes("approach", &DETECTION_ATTRIBUTES)
        .unwrap();
    assert_eq!(raw.len(), 60);
    assert_eq!(raw.metadata()[0].min, 71.0);
    assert_eq!(raw.metadata()[0].max, 130.0);
    assert_eq!(raw.points()[1].time, 10_000);

    // Normalized copy stays within the unit interval
    let normalized = Normalizer::new().process(&raw);
    for point in normalized.points() {
        assert!(point.values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
    assert_eq!(raw.metadata()[0].max, 130.0);

    // Detection reads the stored flight and persists its events
    let events = commands::detect_events(&db, &config, "approach").unwrap();
    assert_eq!(events.found_count(), 6);
    assert_eq!(
        commands::get_events(&db, &config, "approach").unwrap(),
        Some(events.clone())
    );

    let fe40 = events.get(EventKind::VFe40);
    assert_eq!((fe40.time, fe40.raw_value), (100_000, 120.0));

    let gear = events.get(EventKind::VLg);
    assert_eq!((gear.time, gear.raw_value), (200_000, 110.0));

    let fe100 = events.get(EventKind::VFe100);
    assert_eq!((fe100.time, fe100.raw_value), (300_000, 100.0));

    let threshold = events.get(EventKind::VThrshld);
    assert_eq!((threshold.time, threshold.raw_value), (350_000, 95.0));
    let alt = events.get(EventKind::AltThrshld);
    assert_eq!((alt.time, alt.raw_value), (350_001, 40.0));

    // On the ground from 38 s; confirmed once 15 s have passed
    let touchdown = events.get(EventKind::VTouchdown);
    assert_eq!((touchdown.time, touchdown.raw_value), (380_000, 92.0));

    for event in events.iter() {
        assert!(event.time >= raw.points()[0].time);
        assert!(event.time <= raw.points()[59].time + 1);
    }

    // The same log held in memory gives the same events
    let store = MemoryStore::new();
    let csv = approach_csv();
    let header: Vec<&str> = csv.lines().next().unwrap().split(',').collect();
    store.insert("approach", &header, csv_rows(&csv));
    let from_memory = EventDetector::default()
        .detect_flight(&store, "approach")
        .unwrap();
    assert_eq!(from_memory, events);

    state::delete_flight(&db, "approach").unwrap();
    assert!(db
        .get_data_attributes("approach", &DETECTION_ATTRIBUTES)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_touchdown_needs_sustained_contact() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bounce.csv");

    // Wheels touch at 10 s but the aircraft climbs away after 10 s on the ground
    let mut csv = String::from("Time,Vel_Indicated_kts,Altitude_FtAgl,Flaps_Handle,RunwayThreshold,Gear\n");
    for second in 0..40u32 {
        let alt = if (10..20).contains(&second) { 0.0 } else { 50.0 };
        csv.push_str(&format!("{},80,{},0,0,1\n", f64::from(second) / 3600.0, alt));
    }
    std::fs::write(&path, csv).unwrap();

    let db = DbConnection::open_in_memory().unwrap();
    let config = AppConfig::default();
    commands::load_flight(&db, &config, &path, None).await.unwrap();

    let events = commands::detect_events(&db, &config, "bounce").unwrap();
    assert!(!events.is_found(EventKind::VTouchdown));
    assert!(events.is_found(EventKind::VLg));
    assert_eq!(events.found_count(), 1);
}

#[tokio::test]
async fn test_missing_detection_column_finds_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("no_runway.csv");

    // Same approach, but the recorder did not log RunwayThreshold
    let csv: String = approach_csv()
        .lines()
        .map(|line| {
            let mut fields: Vec<&str> = line.split(',').collect();
            fields.remove(4);
            fields.join(",") + "\n"
        })
        .collect();
    std::fs::write(&path, &csv).unwrap();

    let db = DbConnection::open_in_memory().unwrap();
    let config = AppConfig::default();
    commands::load_flight(&db, &config, &path, None).await.unwrap();

    let raw = db
        .get_data_attributes("no_runway", &DETECTION_ATTRIBUTES)
        .unwrap();
    assert!(raw.is_empty());
    assert_eq!(raw.metadata().len(), 5);
    assert!(raw
        .conversion_errors()
        .iter()
        .all(|e| e.column == "RunwayThreshold"));
    assert_eq!(raw.conversion_errors().len(), 60);

    let events = commands::detect_events(&db, &config, "no_runway").unwrap();
    assert_eq!(events.len(), 6);
    assert_eq!(events.found_count(), 0);
    assert!(events.iter().all(|e| !e.found));

    let store = MemoryStore::new();
    let header: Vec<&str> = csv.lines().next().unwrap().split(',').collect();
    store.insert("no_runway", &header, csv_rows(&csv));
    let from_memory = EventDetector::default()
        .detect_flight(&store, "no_runway")
        .unwrap();
    assert_eq!(from_memory.found_count(), 0);
}
