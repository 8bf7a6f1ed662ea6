use crate::config::LegendConfig;
use crate::processing::ThresholdScale;
use std::fmt::Write as _;

/// Percentage label rounded to two decimal places, trailing zeros dropped.
fn format_percent(value: f64) -> String {
    format!("{}%", (value * 100.0).round() / 100.0)
}

/// The legend document: a linear axis over the statistic extent, one colored
/// segment per bin, and a tick with label at every threshold. Segments and
/// ticks come straight from the scale that fills the map, never recomputed.
pub fn legend_svg(scale: &ThresholdScale, extent: (f64, f64), config: &LegendConfig) -> String {
    let (min, max) = extent;
    let span = max - min;
    let inner = config.width - 2.0 * config.pad_hor;
    let axis = |value: f64| -> f64 {
        if span > 0.0 {
            config.pad_hor + (value - min) / span * inner
        } else {
            config.pad_hor
        }
    };

    // segment boundaries: [min, thresholds.., max]
    let mut boundaries = Vec::with_capacity(scale.thresholds().len() + 2);
    boundaries.push(min);
    boundaries.extend_from_slice(scale.thresholds());
    boundaries.push(max);

    let mut body = String::new();
    for (i, color) in scale.colors().iter().enumerate() {
        let x = axis(boundaries[i]);
        let width = axis(boundaries[i + 1]) - x;
        let _ = writeln!(
            body,
            r#"  <rect class="color" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
            x, config.pad_ver, width, config.pad_ver, color,
        );
    }

    for &threshold in scale.thresholds() {
        let x = axis(threshold);
        let _ = writeln!(
            body,
            r#"  <line class="tick" data-percentile="{t}" x1="{x:.2}" x2="{x:.2}" y1="{y1:.2}" y2="{y2:.2}" stroke="gray" stroke-width="1.5"/>"#,
            t = threshold,
            x = x,
            y1 = config.pad_ver,
            y2 = config.pad_ver * 2.5,
        );
        let _ = writeln!(
            body,
            r#"  <text class="tick-value" data-percentile="{t}" x="{x:.2}" y="{y:.2}" font-size="{size}px">{label}</text>"#,
            t = threshold,
            x = x - 7.0,
            y = config.pad_ver * 4.0,
            size = config.height / 5.0,
            label = format_percent(threshold),
        );
    }

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" id=\"legend\" width=\"{}\" height=\"{}\">\n{}</svg>\n",
        config.width, config.height, body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LegendConfig;

    #[test]
    fn one_segment_per_bin_and_one_tick_per_threshold() {
        let scale = ThresholdScale::equal_width(7.5, 66.9, 9).unwrap();
        let svg = legend_svg(&scale, (7.5, 66.9), &LegendConfig::default());
        assert_eq!(svg.matches(r#"class="color""#).count(), 9);
        assert_eq!(svg.matches(r#"class="tick""#).count(), 8);
        assert_eq!(svg.matches(r#"class="tick-value""#).count(), 8);
    }

    #[test]
    fn tick_labels_are_the_scale_thresholds_in_order() {
        let scale = ThresholdScale::equal_width(7.5, 66.9, 9).unwrap();
        let svg = legend_svg(&scale, (7.5, 66.9), &LegendConfig::default());
        let labels: Vec<&str> = svg
            .lines()
            .filter(|l| l.contains("tick-value"))
            .map(|l| {
                let start = l.find('>').unwrap() + 1;
                let end = l.rfind("</text>").unwrap();
                &l[start..end]
            })
            .collect();
        assert_eq!(
            labels,
            vec!["14%", "20%", "27%", "33%", "40%", "47%", "53%", "60%"]
        );
    }

    #[test]
    fn fractional_thresholds_round_to_two_decimals() {
        assert_eq!(format_percent(13.256), "13.26%");
        assert_eq!(format_percent(13.0), "13%");
    }

    #[test]
    fn segment_fills_follow_the_palette_order() {
        let scale = ThresholdScale::equal_width(7.5, 66.9, 9).unwrap();
        let svg = legend_svg(&scale, (7.5, 66.9), &LegendConfig::default());
        let fills: Vec<&str> = svg
            .lines()
            .filter(|l| l.contains(r#"class="color""#))
            .map(|l| {
                let start = l.find("fill=\"").unwrap() + 6;
                &l[start..start + 7]
            })
            .collect();
        assert_eq!(fills, scale.colors());
    }
}
