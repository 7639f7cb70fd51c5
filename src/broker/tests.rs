use std::sync::{Arc, Mutex};

use super::*;
use crate::gateway::{ElevationGrid, InMemoryEngine};
use crate::source::MockSource;
use crate::test_util::{BERLIN_OSM_JSON, temp_dir};
use crate::{BoundingBox, MapDataKind};

const STYLE: &str = "styles/default.mapcss";

struct Fixture {
    engine: Arc<InMemoryEngine>,
    broker: MapDataBroker,
    dir: PathBuf,
}

fn fixture_with(name: &str, engine: InMemoryEngine, source: Option<Arc<dyn TileDataSource>>) -> Fixture {
    let dir = temp_dir(name);
    std::fs::create_dir_all(dir.join("index")).unwrap();
    std::fs::write(dir.join("berlin.json"), BERLIN_OSM_JSON).unwrap();

    let engine = Arc::new(engine);
    let mut broker = MapDataBroker::new(engine.clone());
    if let Some(source) = source {
        broker = broker.with_data_source(source);
    }
    broker
        .configure(
            BrokerConfig::new(dir.join("index"))
                .with_asset_path(&dir)
                .with_mesh_cache(false),
        )
        .unwrap();

    Fixture {
        engine,
        broker,
        dir,
    }
}

fn fixture(name: &str) -> Fixture {
    fixture_with(name, InMemoryEngine::new(), None)
}

fn berlin_tile() -> QuadKey {
    QuadKey::new(8800, 5373, 14)
}

fn mock_tile() -> QuadKey {
    QuadKey::from_coordinate(GeoCoordinate::new(52.5015, 13.4015), 14)
}

fn stylesheet() -> Stylesheet {
    Stylesheet::new(STYLE)
}

fn import_berlin(fixture: &Fixture) {
    fixture
        .broker
        .add_data(
            DEFAULT_STORAGE,
            Path::new("berlin.json"),
            &stylesheet(),
            DataTarget::Range(LodRange::new(1, 16)),
            &CancellationToken::new(),
        )
        .unwrap();
}

const DEFAULT_STORAGE: &str = crate::DEFAULT_DOWNLOAD_STORAGE;

/// Collects a description of every map data push
fn record_map_data(broker: &MapDataBroker) -> (Arc<Mutex<Vec<String>>>, Subscription) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = log.clone();
    let subscription = broker.subscribe_map_data(move |data: &MapData| {
        let entry = match &data.kind {
            MapDataKind::Mesh(mesh) => format!("mesh:{}", mesh.name),
            MapDataKind::Element(element) => format!("element:{}", element.id()),
        };
        log_clone.lock().unwrap().push(entry);
    });
    (log, subscription)
}

#[test]
fn test_configure_twice_connects_once() {
    let fixture = fixture("broker-configure-twice");
    fixture
        .broker
        .configure(BrokerConfig::new(fixture.dir.join("index")))
        .unwrap();

    let stats = fixture.engine.stats();
    assert_eq!(stats.connects, 1);
    assert!(!stats.mesh_cache);
    assert!(fixture.broker.is_configured());
    assert_eq!(
        fixture.broker.config().unwrap().asset_path,
        fixture.dir
    );
}

#[test]
fn test_missing_index_directory_fails_before_engine_call() {
    let engine = Arc::new(InMemoryEngine::new());
    let broker = MapDataBroker::new(engine.clone());

    let result = broker.configure(BrokerConfig::new("/definitely/not/an/index"));
    assert!(matches!(result, Err(MapDataError::Config(_))));
    assert_eq!(engine.stats().connects, 0);
    assert!(!broker.is_configured());
}

#[tokio::test]
async fn test_operations_require_configuration() {
    let broker = MapDataBroker::new(Arc::new(InMemoryEngine::new()));
    let cancel = CancellationToken::new();

    assert!(matches!(
        broker.load_tile(Tile::new(berlin_tile(), stylesheet())).await,
        Err(MapDataError::Config(_))
    ));
    assert!(matches!(
        broker.register_in_memory_storage("default"),
        Err(MapDataError::Config(_))
    ));
    assert!(matches!(
        broker.submit_query(
            &MapQuery::new(BoundingBox::new(52.0, 13.0, 53.0, 14.0), LodRange::single(14)),
            &cancel
        ),
        Err(MapDataError::Config(_))
    ));
    assert!(matches!(
        broker.elevation_at(ElevationDataType::Flat, berlin_tile(), GeoCoordinate::new(0.0, 0.0)),
        Err(MapDataError::Config(_))
    ));
    assert!(!broker.has_data(berlin_tile()));
}

#[tokio::test]
async fn test_stylesheet_registered_once() {
    let fixture = fixture("broker-stylesheet-once");
    import_berlin(&fixture);

    fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), stylesheet()))
        .await
        .unwrap();
    fixture
        .broker
        .load_tile(Tile::new(QuadKey::new(8801, 5373, 14), stylesheet()))
        .await
        .unwrap();

    // Same file through an absolute path
    let absolute = Stylesheet::new(fixture.dir.join(STYLE));
    fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), absolute))
        .await
        .unwrap();

    assert_eq!(fixture.engine.stats().stylesheet_registrations, 1);
}

#[test]
fn test_add_to_present_quad_key_skips_import() {
    let fixture = fixture("broker-present-quad-key");
    let cancel = CancellationToken::new();
    let add = || {
        fixture.broker.add_data(
            DEFAULT_STORAGE,
            Path::new("berlin.json"),
            &stylesheet(),
            DataTarget::QuadKey(berlin_tile()),
            &cancel,
        )
    };

    assert!(add().unwrap().is_complete());
    assert_eq!(fixture.engine.stats().quad_key_imports, 1);

    let progress = add().unwrap();
    assert!(progress.is_complete());
    assert_eq!(progress.progress, 1.0);
    assert_eq!(fixture.engine.stats().quad_key_imports, 1);
}

#[test]
fn test_unregistered_storage_is_rejected() {
    let fixture = fixture("broker-unregistered-storage");
    let cancel = CancellationToken::new();

    let result = fixture.broker.add_data(
        "berlin",
        Path::new("berlin.json"),
        &stylesheet(),
        DataTarget::Range(LodRange::single(14)),
        &cancel,
    );
    assert!(matches!(
        result,
        Err(MapDataError::UnregisteredStorage { ref key }) if key == "berlin"
    ));

    let element = Element::flat(1, vec![GeoCoordinate::new(52.5, 13.4)], Default::default());
    let result = fixture
        .broker
        .add_element("berlin", &element, &stylesheet(), LodRange::single(14), &cancel);
    assert!(matches!(result, Err(MapDataError::UnregisteredStorage { .. })));

    assert_eq!(fixture.engine.stats().range_imports, 0);
    assert_eq!(fixture.engine.stats().element_imports, 0);

    fixture.broker.register_in_memory_storage("berlin").unwrap();
    fixture
        .broker
        .add_element("berlin", &element, &stylesheet(), LodRange::single(14), &cancel)
        .unwrap();
    assert_eq!(fixture.engine.stats().element_imports, 1);
}

#[tokio::test]
async fn test_load_tile_pushes_payloads_in_arrival_order() {
    let fixture = fixture("broker-load-tile");
    import_berlin(&fixture);

    let (log, _data_subscription) = record_map_data(&fixture.broker);
    let tiles = Arc::new(Mutex::new(Vec::new()));
    let tiles_clone = tiles.clone();
    let _tile_subscription = fixture.broker.subscribe_tiles(move |tile: &Tile| {
        tiles_clone.lock().unwrap().push(tile.quad_key);
    });

    let progress = fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), stylesheet()))
        .await
        .unwrap();

    assert!(progress.is_complete());
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "mesh:terrain_12021023322202",
            "element:100",
            "element:200",
            "element:300"
        ]
    );
    assert_eq!(*tiles.lock().unwrap(), vec![berlin_tile()]);
}

#[tokio::test]
async fn test_listeners_called_in_order_exactly_once() {
    let fixture = fixture("broker-listener-order");
    import_berlin(&fixture);

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut subscriptions = Vec::new();
    for name in ["first", "second"] {
        let log = log.clone();
        subscriptions.push(fixture.broker.subscribe_map_data(move |data: &MapData| {
            let id = data.element().map(Element::id).unwrap_or(0);
            log.lock().unwrap().push(format!("{}:{}", name, id));
        }));
    }

    fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), stylesheet()))
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first:0", "second:0", "first:100", "second:100", "first:200", "second:200",
            "first:300", "second:300"
        ]
    );

    // Disposed listeners receive nothing more
    subscriptions.remove(0).dispose();
    log.lock().unwrap().clear();
    fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), stylesheet()))
        .await
        .unwrap();
    assert_eq!(log.lock().unwrap().len(), 4);
    assert!(log.lock().unwrap().iter().all(|entry| entry.starts_with("second")));
}

#[tokio::test]
async fn test_download_completes_before_any_notification() {
    let source_dir = temp_dir("broker-download-cache");
    let fixture = fixture_with(
        "broker-download",
        InMemoryEngine::new(),
        Some(Arc::new(MockSource::new(&source_dir))),
    );

    let imports_seen = Arc::new(Mutex::new(Vec::new()));
    let engine = fixture.engine.clone();
    let seen = imports_seen.clone();
    let _data_subscription = fixture.broker.subscribe_map_data(move |_: &MapData| {
        seen.lock().unwrap().push(engine.stats().quad_key_imports);
    });

    let stages = Arc::new(Mutex::new(Vec::new()));
    let stages_clone = stages.clone();
    let _progress_subscription = fixture.broker.subscribe_progress(move |update: &TileProgress| {
        stages_clone.lock().unwrap().push(update.progress.stage);
    });

    assert!(!fixture.broker.has_data(mock_tile()));
    fixture
        .broker
        .load_tile(Tile::new(mock_tile(), stylesheet()))
        .await
        .unwrap();

    // Terrain mesh plus the four mock elements, all after the import
    assert_eq!(*imports_seen.lock().unwrap(), vec![1; 5]);
    assert!(fixture.broker.has_data(mock_tile()));
    assert!(source_dir.join(format!("{}.json", mock_tile())).is_file());
    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            LoadingStage::Downloading,
            LoadingStage::Importing,
            LoadingStage::Loading,
            LoadingStage::Complete
        ]
    );

    // Data is present now, no second download
    stages.lock().unwrap().clear();
    fixture
        .broker
        .load_tile(Tile::new(mock_tile(), stylesheet()))
        .await
        .unwrap();
    assert_eq!(fixture.engine.stats().quad_key_imports, 1);
    assert_eq!(
        *stages.lock().unwrap(),
        vec![LoadingStage::Loading, LoadingStage::Complete]
    );
}

#[tokio::test]
async fn test_failed_download_notifies_nothing() {
    let fixture = fixture_with(
        "broker-download-failure",
        InMemoryEngine::new(),
        Some(Arc::new(MockSource::new(temp_dir("broker-download-failure-cache")).with_failure())),
    );
    let (log, _subscription) = record_map_data(&fixture.broker);

    let result = fixture
        .broker
        .load_tile(Tile::new(mock_tile(), stylesheet()))
        .await;

    assert!(matches!(result, Err(MapDataError::Network(_))));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(fixture.engine.stats().tile_requests, 0);
}

#[tokio::test]
async fn test_engine_failure_surfaces_as_error() {
    let fixture = fixture_with("broker-engine-failure", InMemoryEngine::new().with_failure(), None);
    let (log, _subscription) = record_map_data(&fixture.broker);

    let result = fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), stylesheet()))
        .await;
    assert!(matches!(result, Err(MapDataError::Engine(_))));
    assert!(log.lock().unwrap().is_empty());

    let result = fixture.broker.elevation_at(
        ElevationDataType::Flat,
        berlin_tile(),
        GeoCoordinate::new(52.5, 13.4),
    );
    assert!(matches!(result, Err(MapDataError::Engine(_))));
}

#[tokio::test]
async fn test_cancelled_requests() {
    let fixture = fixture("broker-cancelled");
    import_berlin(&fixture);
    let (log, _subscription) = record_map_data(&fixture.broker);

    let token = CancellationToken::new();
    token.cancel();

    let result = fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), stylesheet()).with_cancellation(token.clone()))
        .await;
    assert!(matches!(result, Err(MapDataError::Cancelled)));
    assert!(log.lock().unwrap().is_empty());

    let query = MapQuery::new(BoundingBox::new(52.51, 13.36, 52.53, 13.39), LodRange::new(1, 16));
    assert!(matches!(
        fixture.broker.submit_query(&query, &token),
        Err(MapDataError::Cancelled)
    ));

    let result = fixture.broker.add_data(
        DEFAULT_STORAGE,
        Path::new("berlin.json"),
        &stylesheet(),
        DataTarget::Range(LodRange::single(15)),
        &token,
    );
    assert!(matches!(result, Err(MapDataError::Cancelled)));
    assert_eq!(fixture.engine.stats().range_imports, 1);
}

#[test]
fn test_submit_query_pushes_elements() {
    let fixture = fixture("broker-query");
    import_berlin(&fixture);

    let found = Arc::new(Mutex::new(Vec::new()));
    let found_clone = found.clone();
    let _subscription = fixture.broker.subscribe_elements(move |element: &Element| {
        found_clone.lock().unwrap().push(element.id());
    });

    let query = MapQuery::new(BoundingBox::new(52.51, 13.36, 52.53, 13.39), LodRange::new(1, 16))
        .with_and_terms("Unter den Linden");
    let count = fixture
        .broker
        .submit_query(&query, &CancellationToken::new())
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(*found.lock().unwrap(), vec![100, 200]);
}

#[tokio::test]
async fn test_added_element_appears_in_tile() {
    let fixture = fixture("broker-add-element");
    let mut tags = std::collections::HashMap::new();
    tags.insert("amenity".to_string(), "cafe".to_string());
    tags.insert("name".to_string(), "Einstein".to_string());
    let element = Element::flat(77, vec![GeoCoordinate::new(52.5164, 13.3779)], tags);

    fixture
        .broker
        .add_element(
            DEFAULT_STORAGE,
            &element,
            &stylesheet(),
            LodRange::single(14),
            &CancellationToken::new(),
        )
        .unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    let _subscription = fixture.broker.subscribe_map_data(move |data: &MapData| {
        if let Some(element) = data.element() {
            received_clone.lock().unwrap().push(element.clone());
        }
    });

    fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), stylesheet()))
        .await
        .unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].id(), 77);
    assert_eq!(received[0].tag("name"), Some("Einstein"));
    assert_eq!(received[0].styles().get("kind"), Some(&"amenity".to_string()));
}

#[tokio::test]
async fn test_elevation() {
    let grid = ElevationGrid::new(
        BoundingBox::new(52.0, 13.0, 53.0, 14.0),
        2,
        vec![100.0, 100.0, 0.0, 0.0],
    )
    .unwrap();
    let fixture = fixture_with(
        "broker-elevation",
        InMemoryEngine::new().with_elevation_grid(ElevationDataType::Srtm, grid),
        None,
    );

    let height = fixture
        .broker
        .elevation_at(ElevationDataType::Srtm, berlin_tile(), GeoCoordinate::new(52.5, 13.5))
        .unwrap();
    assert!((height - 50.0).abs() < 1e-9);

    import_berlin(&fixture);
    let heights = Arc::new(Mutex::new(Vec::new()));
    let heights_clone = heights.clone();
    let _subscription = fixture.broker.subscribe_map_data(move |data: &MapData| {
        if let Some(element) = data.element() {
            heights_clone.lock().unwrap().extend_from_slice(element.heights());
        }
    });
    fixture
        .broker
        .load_tile(Tile::new(berlin_tile(), stylesheet()).with_elevation(ElevationDataType::Srtm))
        .await
        .unwrap();

    let heights = heights.lock().unwrap();
    assert!(!heights.is_empty());
    assert!(heights.iter().all(|h| *h > 50.0 && *h < 52.0));
}

#[test]
fn test_persistent_storage_resolves_against_asset_root() {
    let fixture = fixture("broker-persistent");
    fixture
        .broker
        .register_persistent_storage("berlin", Path::new("stores/berlin"))
        .unwrap();

    assert!(fixture.dir.join("stores").join("berlin").is_dir());
    fixture
        .broker
        .add_data(
            "berlin",
            Path::new("berlin.json"),
            &stylesheet(),
            DataTarget::QuadKey(berlin_tile()),
            &CancellationToken::new(),
        )
        .unwrap();
    assert!(fixture.broker.has_data(berlin_tile()));
}

#[test]
fn test_disconnect_resets_session() {
    let fixture = fixture("broker-disconnect");
    fixture.broker.disconnect();

    assert!(!fixture.broker.is_configured());
    assert!(fixture.broker.config().is_none());
    assert_eq!(fixture.engine.stats().disconnects, 1);

    fixture
        .broker
        .configure(BrokerConfig::new(fixture.dir.join("index")))
        .unwrap();
    assert_eq!(fixture.engine.stats().connects, 2);
}

#[tokio::test]
async fn test_out_of_range_levels_are_rejected() {
    let fixture = fixture("broker-invalid-levels");
    import_berlin(&fixture);
    let cancel = CancellationToken::new();
    let (log, _subscription) = record_map_data(&fixture.broker);

    let result = fixture
        .broker
        .load_tile(Tile::new(QuadKey::new(0, 0, 40), stylesheet()))
        .await;
    assert!(matches!(result, Err(MapDataError::Geographic(_))));

    let result = fixture
        .broker
        .load_tile(Tile::new(QuadKey::new(16384, 0, 14), stylesheet()))
        .await;
    assert!(matches!(result, Err(MapDataError::Geographic(_))));

    let result = fixture.broker.add_data(
        DEFAULT_STORAGE,
        Path::new("berlin.json"),
        &stylesheet(),
        DataTarget::Range(LodRange::new(30, 32)),
        &cancel,
    );
    assert!(matches!(result, Err(MapDataError::Geographic(_))));

    let result = fixture.broker.add_data(
        DEFAULT_STORAGE,
        Path::new("berlin.json"),
        &stylesheet(),
        DataTarget::QuadKey(QuadKey::new(0, 0, 40)),
        &cancel,
    );
    assert!(matches!(result, Err(MapDataError::Geographic(_))));

    let element = Element::flat(5, vec![GeoCoordinate::new(52.5, 13.4)], Default::default());
    let result = fixture.broker.add_element(
        DEFAULT_STORAGE,
        &element,
        &stylesheet(),
        LodRange::new(30, 32),
        &cancel,
    );
    assert!(matches!(result, Err(MapDataError::Geographic(_))));

    let result = fixture.broker.elevation_at(
        ElevationDataType::Flat,
        QuadKey::new(0, 0, 40),
        GeoCoordinate::new(52.5, 13.4),
    );
    assert!(matches!(result, Err(MapDataError::Geographic(_))));

    let query = MapQuery::new(BoundingBox::new(52.0, 13.0, 53.0, 14.0), LodRange::new(30, 32));
    assert!(matches!(
        fixture.broker.submit_query(&query, &cancel),
        Err(MapDataError::Geographic(_))
    ));

    assert!(!fixture.broker.has_data(QuadKey::new(0, 0, 40)));
    assert!(log.lock().unwrap().is_empty());

    let stats = fixture.engine.stats();
    assert_eq!(stats.range_imports, 1);
    assert_eq!(stats.quad_key_imports, 0);
    assert_eq!(stats.element_imports, 0);
    assert_eq!(stats.tile_requests, 0);
}

#[tokio::test]
async fn test_stylesheet_spellings_register_once() {
    let fixture = fixture("broker-stylesheet-spellings");
    import_berlin(&fixture);

    for path in [
        "styles/default.mapcss",
        "styles/../styles/default.mapcss",
        "./styles/./default.mapcss",
    ] {
        fixture
            .broker
            .load_tile(Tile::new(berlin_tile(), Stylesheet::new(path)))
            .await
            .unwrap();
    }

    assert_eq!(fixture.engine.stats().stylesheet_registrations, 1);
    assert_eq!(fixture.engine.stats().tile_requests, 3);
}
