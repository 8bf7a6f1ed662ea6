use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// One record from the education dataset, keyed by FIPS code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountyStat {
    pub fips: u32,
    pub state: String,
    pub area_name: String,
    #[serde(rename = "bachelorsOrHigher")]
    pub bachelors_or_higher: f64,
}

/// A county boundary with its joined statistic. `stat` is `None` when no
/// education record shares the county's FIPS code; such counties render with
/// the neutral fill and are excluded from hover lookups.
#[derive(Debug, Clone)]
pub struct County {
    pub fips: u32,
    pub geometry: MultiPolygon<f64>,
    pub stat: Option<CountyStat>,
}

/// The three decoded boundary layers, counties already joined.
#[derive(Debug, Clone)]
pub struct MapData {
    pub counties: Vec<County>,
    pub states: Vec<MultiPolygon<f64>>,
    pub nation: MultiPolygon<f64>,
}
