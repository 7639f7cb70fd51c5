use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use osm_map_broker::{
    BrokerConfig, CancellationToken, GeoCoordinate, Geocoder, GeocoderRequest, GeocoderResult,
    InMemoryEngine, MapData, MapDataBroker, MapDataKind, QuadKey, SourceFactory, Stylesheet, Tile,
    TileProgress,
};

#[derive(Parser)]
#[command(name = "osm-tile-loader")]
#[command(about = "Load one OpenStreetMap tile through the map data broker and geocode inside it")]
struct Args {
    /// Latitude of a point inside the tile
    #[arg(long, default_value = "52.5163")]
    lat: f64,

    /// Longitude of a point inside the tile
    #[arg(long, default_value = "13.3777")]
    lon: f64,

    /// Level of detail of the tile
    #[arg(short, long, default_value = "14")]
    lod: u8,

    /// Data source: overpass, mock, file
    #[arg(short, long, default_value = "mock")]
    source: String,

    /// Directory holding the index, downloaded files and stylesheets
    #[arg(short, long, default_value = "map-data")]
    data_dir: PathBuf,

    /// Stylesheet, relative to the data directory
    #[arg(long, default_value = "default.mapcss")]
    stylesheet: PathBuf,

    /// Search the tile for elements mentioning these words
    #[arg(long)]
    search: Option<String>,

    /// List addressed elements within this many kilometers of the point
    #[arg(long)]
    radius_km: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Test source availability only
    #[arg(short, long)]
    test: bool,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let center = GeoCoordinate::new(args.lat, args.lon);
    let quad_key = QuadKey::from_coordinate(center, args.lod);
    info!("🌍 OSM Tile Loader starting...");
    info!("📍 Tile {} around {:.4}, {:.4}", quad_key, args.lat, args.lon);
    info!("🔌 Source: {}", args.source);

    let index_dir = args.data_dir.join("index");
    std::fs::create_dir_all(&index_dir).map_err(|e| e.to_string())?;

    let source = SourceFactory::create_source(&args.source, args.data_dir.join("cache"))
        .map_err(|e| e.to_string())?;

    let capabilities = source.capabilities();
    info!("🔧 Source capabilities:");
    info!("  - Requires network: {}", capabilities.requires_network);
    info!("  - WASM compatible: {}", capabilities.wasm_compatible);
    if let Some(max_area) = capabilities.max_area_km2 {
        info!("  - Max area: {:.1} km²", max_area);
    }
    if let Some(notes) = &capabilities.notes {
        info!("  - Notes: {}", notes);
    }

    if args.test {
        info!("🔍 Testing source availability...");
        return match source.test_availability().await {
            Ok(()) => {
                info!("✅ Source is available!");
                Ok(())
            }
            Err(e) => {
                error!("❌ Source is not available: {}", e);
                Err(e.to_string())
            }
        };
    }

    let broker = Arc::new(
        MapDataBroker::new(Arc::new(InMemoryEngine::new())).with_data_source(Arc::from(source)),
    );
    broker
        .configure(BrokerConfig::new(&index_dir).with_asset_path(&args.data_dir))
        .map_err(|e| e.to_string())?;

    let meshes = Arc::new(AtomicUsize::new(0));
    let elements = Arc::new(AtomicUsize::new(0));
    let (mesh_count, element_count) = (meshes.clone(), elements.clone());
    let _data = broker.subscribe_map_data(move |data: &MapData| match &data.kind {
        MapDataKind::Mesh(mesh) => {
            mesh_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Mesh '{}' with {} triangles", mesh.name, mesh.triangle_count());
        }
        MapDataKind::Element(element) => {
            element_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Element {} {:?}", element.id(), element.styles().get("kind"));
        }
    });
    let _progress = broker.subscribe_progress(|update: &TileProgress| {
        info!(
            "⏳ {:?} ({:.0}%)",
            update.progress.stage,
            update.progress.progress * 100.0
        );
    });

    let tile = Tile::new(quad_key, Stylesheet::new(&args.stylesheet));
    if let Err(e) = broker.load_tile(tile).await {
        error!("❌ Failed to load tile {}: {}", quad_key, e);
        return Err(e.to_string());
    }
    info!(
        "✅ Loaded {} meshes and {} elements",
        meshes.load(Ordering::Relaxed),
        elements.load(Ordering::Relaxed)
    );

    let request = match (args.search, args.radius_km) {
        (Some(name), _) => Some(GeocoderRequest::Text {
            name,
            bounding_box: quad_key.bounding_box(),
        }),
        (None, Some(radius_km)) => Some(GeocoderRequest::Radius { center, radius_km }),
        (None, None) => None,
    };

    if let Some(request) = request {
        let geocoder = Geocoder::new(broker.clone());
        let _results = geocoder.subscribe(|result: &GeocoderResult| {
            if !result.display_name.is_empty() {
                info!("  📫 {}: {}", result.element.id(), result.display_name);
            }
        });

        info!("🔎 Geocoding {:?}", request);
        let found = geocoder
            .search(&request, &CancellationToken::new())
            .map_err(|e| e.to_string())?;
        info!("Found {} elements", found);
    }

    broker.disconnect();
    Ok(())
}
