use crate::config::MapConfig;
use crate::topo::{self, Topology};
use crate::types::{County, CountyStat, MapData};
use anyhow::{anyhow, Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::{MultiPolygon, Rect};
use geojson::{feature::Id, Feature, FeatureCollection};
use std::collections::HashMap;
use tracing::{info, warn};

/// Sequential blues, lightest to darkest, one per bin.
pub const BLUES: [&str; 9] = [
    "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c",
    "#08306b",
];

/// Fill for counties whose FIPS code has no education record.
pub const NEUTRAL_FILL: &str = "#d9d9d9";

/// Everything the renderer and server need, computed once per run.
pub struct Scene {
    pub map: MapData,
    pub scale: ThresholdScale,
    pub transform: FitTransform,
    pub extent: (f64, f64),
}

impl Scene {
    /// Run the full pipeline: decode the three topology layers, join the
    /// education records onto the counties, derive the color scale from the
    /// joined distribution, and fit the projection to the pixel rectangle.
    pub fn build(config: &MapConfig, stats: &[CountyStat], topology: &Topology) -> Result<Self> {
        let nation = nation_layer(topo::feature(topology, "nation")?)?;
        let states = boundary_layer(topo::feature(topology, "states")?)?;

        let county_features = topo::feature(topology, "counties")?;
        let source_count = topology
            .objects
            .get("counties")
            .map(|object| object.geometry_count())
            .unwrap_or(0);
        if county_features.features.len() != source_count {
            return Err(anyhow!(
                "county decode lost geometries: {} of {}",
                county_features.features.len(),
                source_count
            ));
        }
        let counties = join_counties(county_features, stats)?;

        let extent = stat_extent(&counties)?;
        info!(min = extent.0, max = extent.1, "education data extent");
        let scale = ThresholdScale::equal_width(extent.0, extent.1, config.bins)?;

        let bounds = nation
            .bounding_rect()
            .ok_or_else(|| anyhow!("nation geometry is empty"))?;
        let transform = FitTransform::fit_extent(&bounds, config.width, config.height, config.padding);

        Ok(Scene {
            map: MapData {
                counties,
                states,
                nation,
            },
            scale,
            transform,
            extent,
        })
    }
}

/// Attach to each county feature the education record sharing its FIPS code.
/// First record wins on duplicate keys; counties without a match keep `None`.
pub fn join_counties(counties: FeatureCollection, stats: &[CountyStat]) -> Result<Vec<County>> {
    let mut by_fips: HashMap<u32, &CountyStat> = HashMap::new();
    for stat in stats {
        by_fips.entry(stat.fips).or_insert(stat);
    }

    let mut joined = Vec::with_capacity(counties.features.len());
    let mut misses = 0usize;

    for feature in counties.features {
        let fips = match feature_fips(&feature) {
            Some(fips) => fips,
            None => continue, // county geometries always carry a FIPS id
        };
        let geometry = feature_geometry(feature)?;
        let stat = by_fips.get(&fips).map(|s| (*s).clone());
        if stat.is_none() {
            misses += 1;
        }
        joined.push(County {
            fips,
            geometry,
            stat,
        });
    }

    if misses > 0 {
        warn!(misses, "counties without a matching education record");
    }
    info!(counties = joined.len(), "joined education data onto counties");
    Ok(joined)
}

/// All geometries of a decoded layer, as independent multipolygons.
pub fn boundary_layer(collection: FeatureCollection) -> Result<Vec<MultiPolygon<f64>>> {
    collection
        .features
        .into_iter()
        .map(feature_geometry)
        .collect()
}

/// The nation layer folded into a single multipolygon, for the fit bounds.
pub fn nation_layer(collection: FeatureCollection) -> Result<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    for feature in collection.features {
        polygons.extend(feature_geometry(feature)?.0);
    }
    if polygons.is_empty() {
        return Err(anyhow!("topology 'nation' object decoded to no polygons"));
    }
    Ok(MultiPolygon::new(polygons))
}

fn feature_fips(feature: &Feature) -> Option<u32> {
    match &feature.id {
        Some(Id::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Id::String(s)) => s.parse().ok(),
        None => None,
    }
}

fn feature_geometry(feature: Feature) -> Result<MultiPolygon<f64>> {
    let geometry = feature
        .geometry
        .ok_or_else(|| anyhow!("feature has no geometry"))?;
    let converted: geo::Geometry<f64> = geometry
        .value
        .try_into()
        .map_err(|e| anyhow!("Failed to convert geometry: {:?}", e))?;
    match converted {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        other => Err(anyhow!("expected polygonal geometry, got {:?}", other)),
    }
}

/// Observed min/max of the joined statistic. Counties without a record
/// contribute nothing; no joined records at all is a fatal error.
pub fn stat_extent(counties: &[County]) -> Result<(f64, f64)> {
    let mut extent: Option<(f64, f64)> = None;
    for stat in counties.iter().filter_map(|c| c.stat.as_ref()) {
        let value = stat.bachelors_or_higher;
        extent = Some(match extent {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }
    extent.context("no education records joined to any county; cannot derive a color domain")
}

/// Monotonic step function from statistic value to bin color. Thresholds are
/// derived once from the full observed distribution; a value equal to a
/// threshold always resolves to the higher bin.
#[derive(Debug, Clone)]
pub struct ThresholdScale {
    thresholds: Vec<f64>,
    colors: Vec<&'static str>,
}

impl ThresholdScale {
    /// Equal-width binning: `bins` sub-ranges of identical width over
    /// `[min, max]`, each interior boundary floored to a whole percent.
    pub fn equal_width(min: f64, max: f64, bins: usize) -> Result<Self> {
        if bins == 0 || bins > BLUES.len() {
            return Err(anyhow!("bin count must be between 1 and {}", BLUES.len()));
        }
        if !(max >= min) {
            return Err(anyhow!("invalid extent: [{}, {}]", min, max));
        }
        let interval = (max - min) / bins as f64;
        let thresholds = (1..bins)
            .map(|i| (min + interval * i as f64).floor())
            .collect();
        Ok(Self {
            thresholds,
            colors: BLUES[..bins].to_vec(),
        })
    }

    pub fn color_for(&self, value: f64) -> &'static str {
        let bin = self.thresholds.partition_point(|t| *t <= value);
        self.colors[bin]
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn colors(&self) -> &[&'static str] {
        &self.colors
    }
}

/// Uniform scale-and-translate fitting the pre-projected geometry into the
/// padded pixel rectangle. The source geodata is already planar (Albers USA
/// pre-projection), so this is a fitted identity, never a re-projection.
#[derive(Debug, Clone, Copy)]
pub struct FitTransform {
    pub scale: f64,
    pub translate: (f64, f64),
}

impl FitTransform {
    pub fn fit_extent(bounds: &Rect<f64>, width: f64, height: f64, padding: f64) -> Self {
        let dx = width - 2.0 * padding;
        let dy = height - 2.0 * padding;
        let k = (dx / bounds.width()).min(dy / bounds.height());
        let tx = padding + (dx - k * bounds.width()) / 2.0 - k * bounds.min().x;
        let ty = padding + (dy - k * bounds.height()) / 2.0 - k * bounds.min().y;
        Self {
            scale: k,
            translate: (tx, ty),
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.scale * x + self.translate.0,
            self.scale * y + self.translate.1,
        )
    }

    /// Pixel coordinates back to map coordinates, for hit testing.
    pub fn invert(&self, px: f64, py: f64) -> (f64, f64) {
        (
            (px - self.translate.0) / self.scale,
            (py - self.translate.1) / self.scale,
        )
    }

    /// A geometry's screen-space bounding box.
    pub fn project_bounds(&self, bounds: &Rect<f64>) -> Rect<f64> {
        let (x0, y0) = self.apply(bounds.min().x, bounds.min().y);
        let (x1, y1) = self.apply(bounds.max().x, bounds.max().y);
        Rect::new(geo::Coord { x: x0, y: y0 }, geo::Coord { x: x1, y: y1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Geometry, Value};

    fn square(origin: (f64, f64)) -> Value {
        let (x, y) = origin;
        Value::Polygon(vec![vec![
            vec![x, y],
            vec![x + 1.0, y],
            vec![x + 1.0, y + 1.0],
            vec![x, y + 1.0],
            vec![x, y],
        ]])
    }

    fn county_feature(fips: u32, origin: (f64, f64)) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(square(origin))),
            id: Some(Id::Number(fips.into())),
            properties: None,
            foreign_members: None,
        }
    }

    fn stat(fips: u32, value: f64) -> CountyStat {
        CountyStat {
            fips,
            state: "TX".to_string(),
            area_name: format!("County {}", fips),
            bachelors_or_higher: value,
        }
    }

    #[test]
    fn equal_width_thresholds_are_floored() {
        // extent observed in the real dataset
        let scale = ThresholdScale::equal_width(7.5, 66.9, 9).unwrap();
        assert_eq!(
            scale.thresholds(),
            &[14.0, 20.0, 27.0, 33.0, 40.0, 47.0, 53.0, 60.0]
        );
        assert_eq!(scale.colors().len(), 9);
    }

    #[test]
    fn extremes_land_in_bottom_and_top_bins() {
        let scale = ThresholdScale::equal_width(7.5, 66.9, 9).unwrap();
        assert_eq!(scale.color_for(7.5), "#f7fbff");
        assert_eq!(scale.color_for(66.9), "#08306b");
    }

    #[test]
    fn threshold_boundary_resolves_to_the_higher_bin_idempotently() {
        let scale = ThresholdScale::equal_width(7.5, 66.9, 9).unwrap();
        // 14.0 is the first threshold: it belongs to the second bin
        assert_eq!(scale.color_for(13.999), "#f7fbff");
        for _ in 0..3 {
            assert_eq!(scale.color_for(14.0), "#deebf7");
        }
    }

    #[test]
    fn join_attaches_matching_stat_and_leaves_misses_none() {
        let collection = FeatureCollection {
            bbox: None,
            features: vec![county_feature(1001, (0.0, 0.0)), county_feature(1003, (2.0, 0.0))],
            foreign_members: None,
        };
        let stats = vec![stat(1001, 21.9)];
        let counties = join_counties(collection, &stats).unwrap();
        assert_eq!(counties.len(), 2);
        assert_eq!(
            counties[0].stat.as_ref().unwrap().bachelors_or_higher,
            21.9
        );
        assert!(counties[1].stat.is_none());
    }

    #[test]
    fn first_record_wins_on_duplicate_fips() {
        let collection = FeatureCollection {
            bbox: None,
            features: vec![county_feature(1001, (0.0, 0.0))],
            foreign_members: None,
        };
        let stats = vec![stat(1001, 21.9), stat(1001, 99.9)];
        let counties = join_counties(collection, &stats).unwrap();
        assert_eq!(
            counties[0].stat.as_ref().unwrap().bachelors_or_higher,
            21.9
        );
    }

    #[test]
    fn extent_skips_unjoined_counties_and_fails_when_empty() {
        let collection = FeatureCollection {
            bbox: None,
            features: vec![county_feature(1001, (0.0, 0.0)), county_feature(1003, (2.0, 0.0))],
            foreign_members: None,
        };
        let stats = vec![stat(1001, 21.9)];
        let counties = join_counties(collection, &stats).unwrap();
        assert_eq!(stat_extent(&counties).unwrap(), (21.9, 21.9));

        let unjoined = join_counties(
            FeatureCollection {
                bbox: None,
                features: vec![county_feature(1005, (4.0, 0.0))],
                foreign_members: None,
            },
            &[],
        )
        .unwrap();
        assert!(stat_extent(&unjoined).is_err());
    }

    #[test]
    fn fit_extent_centers_inside_the_padded_rectangle() {
        let bounds = Rect::new(geo::Coord { x: 0.0, y: 0.0 }, geo::Coord { x: 10.0, y: 5.0 });
        let t = FitTransform::fit_extent(&bounds, 1000.0, 600.0, 5.0);
        // width-limited: scale = 990 / 10
        assert!((t.scale - 99.0).abs() < 1e-9);
        assert_eq!(t.apply(0.0, 0.0), (5.0, 52.5));
        assert_eq!(t.apply(10.0, 5.0), (995.0, 547.5));
    }

    #[test]
    fn invert_round_trips() {
        let bounds = Rect::new(geo::Coord { x: 3.0, y: 7.0 }, geo::Coord { x: 13.0, y: 12.0 });
        let t = FitTransform::fit_extent(&bounds, 1000.0, 600.0, 5.0);
        let (px, py) = t.apply(4.2, 8.4);
        let (x, y) = t.invert(px, py);
        assert!((x - 4.2).abs() < 1e-9);
        assert!((y - 8.4).abs() < 1e-9);
    }
}
