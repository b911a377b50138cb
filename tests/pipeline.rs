use std::sync::Arc;
use std::time::Duration;

use floodmap::geojson::polygons_to_features;
use floodmap::grid::{DEFAULT_NO_DATA, Interpolation};
use floodmap::terrain_rgb::{decode, encode};
use floodmap::{
    Edge, ElevationGrid, FloodMapParams, FloodWorker, GeographicBounds, OutlineMode,
    ReachabilityStrategy, SeedSet, TerrainFeature, compute_flooded, flood_levels,
};
use serde_json::Value;

fn params_with_basin() -> FloodMapParams {
    let mut params = FloodMapParams {
        resolution: 30,
        water_levels: vec![0.5, 1.0, 2.0],
        ..FloodMapParams::default()
    };
    params.terrain.features.push(TerrainFeature {
        name: "Harbor Basin".into(),
        center: [0.1, 0.5],
        peak: -6.0,
        radius: 0.1,
    });
    params
}

#[test]
fn config_to_geojson() {
    let params: FloodMapParams = toml::from_str(
        r#"
        resolution = 30
        water_levels = [0.5, 1.0, 2.0]

        [[terrain.features]]
        name = "Harbor Basin"
        center = [0.1, 0.5]
        peak = -6.0
        radius = 0.1
        "#,
    )
    .unwrap();
    assert_eq!(params, params_with_basin());

    let ctx = params.build_context().unwrap();
    let results = flood_levels(&ctx, &params.water_levels, params.strategy).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_subset_of(&results[1]));
    assert!(results[1].is_subset_of(&results[2]));

    let polygons: Vec<_> = results
        .iter()
        .flat_map(|flooded| ctx.polygons(flooded, OutlineMode::Traced))
        .collect();
    assert!(!polygons.is_empty());

    let json = polygons_to_features(&polygons).to_json().unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    let features = value["features"].as_array().unwrap();
    assert_eq!(features.len(), polygons.len());

    let bounds = params.bounds;
    for feature in features {
        assert!(feature["properties"]["waterLevel"].is_f64());
        let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.first(), ring.last());
        for point in ring {
            let lng = point[0].as_f64().unwrap();
            let lat = point[1].as_f64().unwrap();
            assert!(lng >= bounds.west - 1e-9 && lng <= bounds.east + 1e-9);
            assert!(lat >= bounds.south - 1e-9 && lat <= bounds.north + 1e-9);
        }
    }

    // затопленная котловина у берега подписана своим названием
    assert!(
        features
            .iter()
            .any(|f| f["properties"]["name"] == "Harbor Basin")
    );
}

#[test]
fn terrain_rgb_export_round_trips_through_grid() {
    let params = FloodMapParams {
        resolution: 16,
        ..FloodMapParams::default()
    };
    let ctx = params.build_context().unwrap();
    let grid = ctx.grid();

    let image = grid.to_terrain_rgb().unwrap();
    let decoded = ElevationGrid::from_terrain_rgb(&image, grid.bounds()).unwrap();
    for (a, b) in grid.data().iter().zip(decoded.data()) {
        assert!((a - b).abs() <= 0.05 + 1e-3);
    }

    let lat = (grid.bounds().north + grid.bounds().south) / 2.0;
    let lng = grid.bounds().west;
    let near = decoded.sample(lat, lng, Interpolation::Nearest).unwrap();
    assert!(near.is_some());
    assert!(decoded.sample(lat + 1.0, lng, Interpolation::Bilinear).is_err());
}

#[test]
fn exported_no_data_stays_dry_after_reimport() {
    let bounds = GeographicBounds::new(40.76, 40.70, -73.97, -74.03).unwrap();
    let grid = ElevationGrid::from_samples(bounds, 1, 3, vec![0.0, DEFAULT_NO_DATA, 0.0]).unwrap();
    let seeds = SeedSet::from_edges(&grid, &[Edge::West]);
    let before = compute_flooded(&grid, 5.0, &seeds);
    assert_eq!(before.len(), 1);

    let reimported = ElevationGrid::from_terrain_rgb(&grid.to_terrain_rgb().unwrap(), bounds).unwrap();
    assert_eq!(reimported.elevation(0, 1), None);
    let after = compute_flooded(&reimported, 5.0, &seeds);
    assert_eq!(after, before);
}

#[test]
fn codec_round_trip_over_range() {
    let mut e = -10_000.0;
    while e <= 1_000_000.0 {
        let decoded = decode(encode(e).unwrap());
        assert!((decoded - e).abs() <= 0.05 + 1e-6, "{e} decoded as {decoded}");
        e += 997.3;
    }
    // плотный проход с шагом 0.1 м вокруг уровня моря
    for k in -5_000..=5_000 {
        let e = f64::from(k) * 0.1;
        let decoded = decode(encode(e).unwrap());
        assert!((decoded - e).abs() <= 0.05 + 1e-6, "{e} decoded as {decoded}");
    }
    assert!(encode(-20_000.0).is_err());
}

#[test]
fn background_worker_serves_latest_level() {
    let ctx = Arc::new(params_with_basin().build_context().unwrap());
    let expected = ctx.flood(2.0, ReachabilityStrategy::Exact).unwrap();

    let mut worker = FloodWorker::spawn(Arc::clone(&ctx)).unwrap();
    for level in [0.5, 1.0, 1.5] {
        worker.request(level, ReachabilityStrategy::Exact).unwrap();
    }
    let generation = worker.request(2.0, ReachabilityStrategy::Exact).unwrap();

    let update = worker.wait_latest(Duration::from_secs(10)).unwrap().unwrap();
    assert_eq!(update.generation, generation);
    assert_eq!(update.flooded, expected);

    // аппроксимация доступна: контекст построен из процедурной модели
    worker
        .request(2.0, ReachabilityStrategy::LineSample { samples: 20 })
        .unwrap();
    let approx = worker.wait_latest(Duration::from_secs(10)).unwrap().unwrap();
    assert_eq!(approx.flooded.water_level(), 2.0);
}
