use crate::config::AppConfig;
use crate::overlay::{self, Overlay, OverlayContent};
use crate::processing::{FitTransform, Scene};
use crate::types::County;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{Point, Rect};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

// Wrapper for RTree indexing
struct CountyIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for CountyIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    counties: Vec<County>,
    tree: RTree<CountyIndex>,
    transform: FitTransform,
    overlay: Mutex<Overlay>,
}

/// Pointer position in map pixels.
#[derive(Deserialize)]
pub struct QueryParams {
    x: f64,
    y: f64,
}

/// Tooltip payload for a hovered county.
#[derive(Serialize)]
pub struct QueryResponse {
    fips: u32,
    #[serde(flatten)]
    content: OverlayContent,
    top: f64,
    left: f64,
}

pub async fn start_server(config: AppConfig, scene: Scene) -> Result<()> {
    info!("building spatial index for hover queries");
    let tree_items: Vec<CountyIndex> = scene
        .map
        .counties
        .iter()
        .enumerate()
        .map(|(i, county)| {
            let rect = county.geometry.bounding_rect().unwrap_or(Rect::new(
                geo::Coord { x: 0.0, y: 0.0 },
                geo::Coord { x: 0.0, y: 0.0 },
            ));
            CountyIndex {
                index: i,
                aabb: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            }
        })
        .collect();
    let tree = RTree::bulk_load(tree_items);

    let state = Arc::new(AppState {
        counties: scene.map.counties,
        tree,
        transform: scene.transform,
        overlay: Mutex::new(Overlay::default()),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("starting server on http://{}", addr);

    let app = Router::new()
        .route("/api/county", get(county_handler))
        .fallback_service(ServeDir::new(&config.output.dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Resolve a pointer position to the county under it. Counties without a
/// joined statistic never answer; a miss hides the shared overlay.
async fn county_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    if let Some(response) = hit_test(&state, params.x, params.y) {
        if let Ok(mut overlay) = state.overlay.lock() {
            overlay.update(
                response.content.clone(),
                overlay::OverlayPlacement {
                    top: response.top,
                    left: response.left,
                },
            );
        }
        return Json(Some(response));
    }

    if let Ok(mut overlay) = state.overlay.lock() {
        overlay.hide();
    }
    Json(None)
}

fn hit_test(state: &AppState, px: f64, py: f64) -> Option<QueryResponse> {
    let (x, y) = state.transform.invert(px, py);
    let point = Point::new(x, y);
    let envelope = AABB::from_point([x, y]);

    for candidate in state.tree.locate_in_envelope_intersecting(&envelope) {
        let county = state.counties.get(candidate.index)?;
        if !county.geometry.contains(&point) {
            continue;
        }
        let stat = county.stat.as_ref()?;

        // screen box recomputed on every hover; layout may have shifted
        let bounds = county.geometry.bounding_rect()?;
        let screen_box = state.transform.project_bounds(&bounds);
        let placement = overlay::place(&screen_box, overlay::NOMINAL_HEIGHT);

        return Some(QueryResponse {
            fips: county.fips,
            content: OverlayContent::from(stat),
            top: placement.top,
            left: placement.left,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CountyStat;
    use geo::polygon;

    fn test_state() -> AppState {
        let matched = County {
            fips: 1001,
            geometry: geo::MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 2.0, y: 0.0),
                (x: 2.0, y: 2.0),
                (x: 0.0, y: 2.0),
                (x: 0.0, y: 0.0),
            ]]),
            stat: Some(CountyStat {
                fips: 1001,
                state: "AL".to_string(),
                area_name: "Autauga County".to_string(),
                bachelors_or_higher: 21.9,
            }),
        };
        let unmatched = County {
            fips: 1003,
            geometry: geo::MultiPolygon::new(vec![polygon![
                (x: 3.0, y: 0.0),
                (x: 5.0, y: 0.0),
                (x: 5.0, y: 2.0),
                (x: 3.0, y: 2.0),
                (x: 3.0, y: 0.0),
            ]]),
            stat: None,
        };
        let counties = vec![matched, unmatched];

        let tree_items: Vec<CountyIndex> = counties
            .iter()
            .enumerate()
            .map(|(i, county)| {
                let rect = county.geometry.bounding_rect().unwrap();
                CountyIndex {
                    index: i,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                }
            })
            .collect();

        AppState {
            counties,
            tree: RTree::bulk_load(tree_items),
            // identity: geometry is already in pixel space for these tests
            transform: FitTransform {
                scale: 1.0,
                translate: (0.0, 0.0),
            },
            overlay: Mutex::new(Overlay::default()),
        }
    }

    #[test]
    fn hit_inside_a_matched_county_returns_its_tooltip() {
        let state = test_state();
        let response = hit_test(&state, 1.0, 1.0).expect("hit");
        assert_eq!(response.fips, 1001);
        assert_eq!(response.content.bachelors_or_higher, 21.9);
        // right of the 2x2 box at x=2, centered on its top edge
        assert_eq!(response.left, 2.0 + overlay::GAP);
        assert_eq!(response.top, -overlay::NOMINAL_HEIGHT / 2.0);
    }

    #[test]
    fn unmatched_county_is_not_interactive() {
        let state = test_state();
        assert!(hit_test(&state, 4.0, 1.0).is_none());
    }

    #[test]
    fn miss_outside_every_county_returns_none() {
        let state = test_state();
        assert!(hit_test(&state, 10.0, 10.0).is_none());
    }
}
