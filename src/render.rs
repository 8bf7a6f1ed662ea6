use crate::config::AppConfig;
use crate::legend;
use crate::processing::{FitTransform, Scene, ThresholdScale, NEUTRAL_FILL};
use crate::types::MapData;
use anyhow::{Context, Result};
use geo::MultiPolygon;
use std::fmt::Write as _;
use std::fs;
use tracing::info;

/// SVG path data for a multipolygon run through the fitted transform, one
/// M..Z subpath per ring.
pub fn path_data(geometry: &MultiPolygon<f64>, transform: &FitTransform) -> String {
    let mut d = String::new();
    for polygon in &geometry.0 {
        ring_path(&mut d, polygon.exterior(), transform);
        for interior in polygon.interiors() {
            ring_path(&mut d, interior, transform);
        }
    }
    d
}

fn ring_path(d: &mut String, ring: &geo::LineString<f64>, transform: &FitTransform) {
    // rings are closed; the final point repeats the first and is covered by Z
    let points = &ring.0;
    let coords = if points.len() > 1 && points.first() == points.last() {
        &points[..points.len() - 1]
    } else {
        &points[..]
    };
    for (i, coord) in coords.iter().enumerate() {
        let (x, y) = transform.apply(coord.x, coord.y);
        let _ = write!(d, "{}{:.2},{:.2}", if i == 0 { "M" } else { "L" }, x, y);
    }
    d.push('Z');
}

/// The choropleth document: counties filled by bin color, then state and
/// nation outlines with increasing stroke weight.
pub fn map_svg(map: &MapData, scale: &ThresholdScale, transform: &FitTransform, width: f64, height: f64) -> String {
    let mut counties = String::new();
    for county in &map.counties {
        let d = path_data(&county.geometry, transform);
        match &county.stat {
            Some(stat) => {
                let _ = writeln!(
                    counties,
                    r#"    <path class="county" data-fips="{}" data-education="{}" d="{}" fill="{}" stroke="white" stroke-width="0.15"/>"#,
                    county.fips,
                    stat.bachelors_or_higher,
                    d,
                    scale.color_for(stat.bachelors_or_higher),
                );
            }
            None => {
                let _ = writeln!(
                    counties,
                    r#"    <path class="county" data-fips="{}" d="{}" fill="{}" stroke="white" stroke-width="0.15"/>"#,
                    county.fips, d, NEUTRAL_FILL,
                );
            }
        }
    }

    let mut states = String::new();
    for boundary in &map.states {
        let _ = writeln!(
            states,
            r#"    <path d="{}" fill="none" stroke="white" stroke-width="0.5"/>"#,
            path_data(boundary, transform),
        );
    }

    let nation = format!(
        r#"    <path d="{}" fill="none" stroke="white" stroke-width="1.5"/>"#,
        path_data(&map.nation, transform),
    );

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" id=\"choropleth\" width=\"{width}\" height=\"{height}\">\n  <g>\n{counties}  </g>\n  <g>\n{states}  </g>\n  <g>\n{nation}\n  </g>\n</svg>\n"
    )
}

/// Write `choropleth.svg` and `legend.svg` under the configured directory.
pub fn write_outputs(config: &AppConfig, scene: &Scene) -> Result<()> {
    fs::create_dir_all(&config.output.dir)
        .with_context(|| format!("Failed to create output directory: {:?}", config.output.dir))?;

    let map_path = config.output.dir.join("choropleth.svg");
    let map = map_svg(
        &scene.map,
        &scene.scale,
        &scene.transform,
        config.map.width,
        config.map.height,
    );
    fs::write(&map_path, map)
        .with_context(|| format!("Failed to write map SVG: {:?}", map_path))?;

    let legend_path = config.output.dir.join("legend.svg");
    let legend = legend::legend_svg(&scene.scale, scene.extent, &config.legend);
    fs::write(&legend_path, legend)
        .with_context(|| format!("Failed to write legend SVG: {:?}", legend_path))?;

    info!(dir = ?config.output.dir, "wrote choropleth and legend");
    Ok(())
}
