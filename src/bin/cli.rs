use clap::Parser;
use floodmap::geojson::{contours_to_features, polygons_to_features};
use floodmap::render::FloodPreview;
use floodmap::{FloodMapParams, flood_levels};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Расчёт зон затопления при подъёме уровня моря
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML (без него используются параметры по умолчанию)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Каталог для результатов
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Уровни воды в метрах вместо указанных в конфигурации
    #[arg(short, long = "level")]
    levels: Vec<f32>,

    /// Сохранить PNG-превью для каждого уровня
    #[arg(long)]
    preview: bool,

    /// Сохранить сетку высот в Terrain-RGB
    #[arg(long)]
    export_terrain_rgb: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let mut params = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            FloodMapParams::from_toml_file(&path.to_string_lossy())?
        }
        None => FloodMapParams::default(),
    };
    if !cli.levels.is_empty() {
        params.water_levels.clone_from(&cli.levels);
    }

    fs::create_dir_all(&cli.output)?;
    let ctx = params.build_context()?;

    if cli.export_terrain_rgb {
        let path = cli.output.join("terrain_rgb.png");
        ctx.grid().to_terrain_rgb()?.save(&path)?;
        info!(path = %path.display(), "Terrain-RGB saved");
    }

    let results = flood_levels(&ctx, &params.water_levels, params.strategy)?;

    let mut polygons = Vec::new();
    let mut contours = Vec::new();
    let preview = FloodPreview::new(ctx.grid(), params.preview_scale);
    for flooded in &results {
        let level_polygons = ctx.polygons(flooded, params.outline);
        let level_contours = if params.contours {
            ctx.contours(flooded.water_level())
        } else {
            Vec::new()
        };

        if cli.preview {
            let path = cli.output.join(format!("flood_{}.png", flooded.water_level()));
            preview.save_as_png(flooded, &level_polygons, &level_contours, &path.to_string_lossy())?;
        }

        polygons.extend(level_polygons);
        contours.extend(level_contours);
    }

    polygons_to_features(&polygons).write(&cli.output.join("flood.geojson"))?;
    if params.contours {
        contours_to_features(&contours).write(&cli.output.join("contours.geojson"))?;
    }

    info!(levels = results.len(), polygons = polygons.len(), "done");
    Ok(())
}
