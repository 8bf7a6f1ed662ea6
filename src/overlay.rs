use crate::types::CountyStat;
use geo::Rect;
use serde::Serialize;

/// Horizontal gap between a county's screen box and the overlay.
pub const GAP: f64 = 8.0;

/// The overlay's rendered height is not known server-side, so placement
/// assumes a nominal box.
pub const NOMINAL_HEIGHT: f64 = 48.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayContent {
    pub area_name: String,
    pub state: String,
    pub bachelors_or_higher: f64,
}

impl From<&CountyStat> for OverlayContent {
    fn from(stat: &CountyStat) -> Self {
        Self {
            area_name: stat.area_name.clone(),
            state: stat.state.clone(),
            bachelors_or_higher: stat.bachelors_or_higher,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayPlacement {
    pub top: f64,
    pub left: f64,
}

/// Where the overlay goes for a hovered county: just right of the county's
/// screen bounding box, vertically centered on the box's top edge. Pure;
/// called on every hover event so layout shifts are always picked up.
pub fn place(county_box: &Rect<f64>, overlay_height: f64) -> OverlayPlacement {
    OverlayPlacement {
        top: county_box.min().y - overlay_height / 2.0,
        left: county_box.max().x + GAP,
    }
}

/// The single shared tooltip element. Every hover callback fully overwrites
/// it; hiding clears the content as well as the position.
#[derive(Debug, Default)]
pub struct Overlay {
    current: Option<(OverlayContent, OverlayPlacement)>,
}

impl Overlay {
    pub fn update(&mut self, content: OverlayContent, placement: OverlayPlacement) {
        self.current = Some((content, placement));
    }

    pub fn hide(&mut self) {
        self.current = None;
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&(OverlayContent, OverlayPlacement)> {
        self.current.as_ref()
    }
}
