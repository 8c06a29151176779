//! Line charts of comment count over time, written as standalone SVG.

use std::fmt::Write;

use chrono::{DateTime, Duration, Utc};

use super::escape;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 480.0;
const LEFT: f64 = 70.0;
const RIGHT: f64 = 230.0;
const TOP: f64 = 48.0;
const BOTTOM: f64 = 70.0;
const Y_TICKS: i64 = 5;
const X_TICKS: i64 = 5;
const LEGEND_ROW: f64 = 18.0;

const PALETTE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    /// (observation time, comment count), oldest first.
    pub points: Vec<(DateTime<Utc>, i64)>,
}

/// Render one chart. Every observation gets a marker, so a single-point
/// series stays visible; series with no points are left out.
pub fn render_svg(title: &str, series: &[Series]) -> String {
    let series: Vec<&Series> = series.iter().filter(|s| !s.points.is_empty()).collect();

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="system-ui, Arial, sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="26" font-size="16" text-anchor="middle">{}</text>"#,
        (LEFT + (WIDTH - RIGHT)) / 2.0,
        escape(title)
    );

    let plot_w = WIDTH - LEFT - RIGHT;
    let plot_h = HEIGHT - TOP - BOTTOM;

    if series.is_empty() {
        let _ = writeln!(
            svg,
            r##"<text x="{}" y="{}" text-anchor="middle" fill="#666">No data yet</text>"##,
            LEFT + plot_w / 2.0,
            TOP + plot_h / 2.0
        );
        svg.push_str("</svg>\n");
        return svg;
    }

    let (t_min, t_max) = time_range(&series);
    let y_max = nice_ceiling(series.iter().flat_map(|s| s.points.iter().map(|p| p.1)).max().unwrap_or(0));
    let span_secs = (t_max - t_min).num_seconds().max(1) as f64;

    let x_of = |t: DateTime<Utc>| LEFT + (t - t_min).num_seconds() as f64 / span_secs * plot_w;
    let y_of = |v: i64| TOP + plot_h - (v.max(0) as f64 / y_max as f64) * plot_h;

    // axes and grid
    for i in 0..=Y_TICKS {
        let v = y_max / Y_TICKS * i;
        let y = y_of(v);
        let _ = writeln!(
            svg,
            r##"<line x1="{LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#e5e5e5"/>"##,
            LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{v}</text>"#,
            LEFT - 8.0,
            y + 4.0
        );
    }
    for i in 0..=X_TICKS {
        let t = t_min + Duration::seconds((span_secs as i64) * i / X_TICKS);
        let x = x_of(t);
        let _ = writeln!(
            svg,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="end" transform="rotate(-30 {x:.1} {:.1})">{}</text>"#,
            TOP + plot_h + 18.0,
            TOP + plot_h + 18.0,
            t.format("%m-%d %H:%M")
        );
    }
    let _ = writeln!(
        svg,
        r##"<line x1="{LEFT}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#333"/>"##,
        TOP + plot_h,
        LEFT + plot_w,
        TOP + plot_h
    );
    let _ = writeln!(
        svg,
        r##"<line x1="{LEFT}" y1="{TOP}" x2="{LEFT}" y2="{:.1}" stroke="#333"/>"##,
        TOP + plot_h
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">Snapshot time (UTC)</text>"#,
        LEFT + plot_w / 2.0,
        HEIGHT - 8.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="16" y="{:.1}" text-anchor="middle" transform="rotate(-90 16 {:.1})">Comments</text>"#,
        TOP + plot_h / 2.0,
        TOP + plot_h / 2.0
    );

    let legend_rows = legend_capacity();
    let overflow = series.len() > legend_rows;
    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let coords: Vec<(f64, f64)> = s.points.iter().map(|&(t, v)| (x_of(t), y_of(v))).collect();

        if coords.len() > 1 {
            let pts: Vec<String> = coords.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect();
            let _ = writeln!(
                svg,
                r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{}"/>"#,
                pts.join(" ")
            );
        }
        for (x, y) in &coords {
            let _ = writeln!(svg, r#"<circle cx="{x:.1}" cy="{y:.1}" r="3" fill="{color}"/>"#);
        }

        // last legend row is kept for the "+N more" note
        if overflow && i + 1 >= legend_rows {
            continue;
        }
        let ly = TOP + 10.0 + i as f64 * LEGEND_ROW;
        let lx = WIDTH - RIGHT + 16.0;
        let _ = writeln!(
            svg,
            r#"<rect x="{lx:.1}" y="{:.1}" width="12" height="12" fill="{color}"/>"#,
            ly - 10.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{ly:.1}">{}</text>"#,
            lx + 18.0,
            escape(&s.label)
        );
    }

    if overflow {
        let hidden = series.len() + 1 - legend_rows;
        let _ = writeln!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" fill="#666">+{hidden} more</text>"##,
            WIDTH - RIGHT + 16.0,
            TOP + 10.0 + (legend_rows - 1) as f64 * LEGEND_ROW
        );
    }

    svg.push_str("</svg>\n");
    svg
}

/// Legend rows that fit between the top margin and the bottom of the canvas.
fn legend_capacity() -> usize {
    ((HEIGHT - TOP - 10.0) / LEGEND_ROW) as usize
}

fn time_range(series: &[&Series]) -> (DateTime<Utc>, DateTime<Utc>) {
    let mut times = series.iter().flat_map(|s| s.points.iter().map(|p| p.0));
    let first = times.next().unwrap_or_else(Utc::now);
    let (min, max) = times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    if min == max {
        // a single instant still needs a visible x span
        (min - Duration::hours(1), max + Duration::hours(1))
    } else {
        (min, max)
    }
}

/// Round up to a value divisible by the tick count with a 1/2/5 leading step.
/// Saturates instead of overflowing for counts near `i64::MAX`.
fn nice_ceiling(max: i64) -> i64 {
    if max <= 0 {
        return Y_TICKS;
    }
    let raw_step = max / Y_TICKS + i64::from(max % Y_TICKS != 0);
    let mut magnitude: i64 = 1;
    while magnitude <= raw_step / 10 {
        magnitude *= 10;
    }
    let step = [1, 2, 5, 10]
        .iter()
        .filter_map(|m| magnitude.checked_mul(*m))
        .find(|s| *s >= raw_step)
        .unwrap_or(raw_step);
    step.saturating_mul(Y_TICKS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn single_observation_is_one_point() {
        let svg = render_svg(
            "Episode discussions",
            &[Series {
                label: "S01E03".into(),
                points: vec![(at(6), 41)],
            }],
        );
        assert_eq!(svg.matches("<circle").count(), 1);
        assert!(!svg.contains("<polyline"));
        assert!(svg.contains("S01E03"));
    }

    #[test]
    fn multi_point_series_draws_line_and_markers() {
        let svg = render_svg(
            "t",
            &[
                Series {
                    label: "a".into(),
                    points: vec![(at(0), 1), (at(6), 20), (at(12), 35)],
                },
                Series {
                    label: "b".into(),
                    points: vec![(at(3), 7)],
                },
            ],
        );
        assert_eq!(svg.matches("<polyline").count(), 1);
        assert_eq!(svg.matches("<circle").count(), 4);
    }

    #[test]
    fn empty_series_are_excluded() {
        let svg = render_svg(
            "t",
            &[Series {
                label: "nothing".into(),
                points: vec![],
            }],
        );
        assert!(svg.contains("No data yet"));
        assert!(!svg.contains("nothing"));
    }

    #[test]
    fn labels_are_escaped() {
        let svg = render_svg(
            "Q&A <live>",
            &[Series {
                label: "\"quotes\" & <tags>".into(),
                points: vec![(at(1), 1)],
            }],
        );
        assert!(svg.contains("Q&amp;A &lt;live&gt;"));
        assert!(svg.contains("&quot;quotes&quot; &amp; &lt;tags&gt;"));
    }

    #[test]
    fn nice_ceiling_steps() {
        assert_eq!(nice_ceiling(0), 5);
        assert_eq!(nice_ceiling(3), 5);
        assert_eq!(nice_ceiling(41), 50);
        assert_eq!(nice_ceiling(812), 1000);
        assert_eq!(nice_ceiling(1430), 2500);
    }

    #[test]
    fn huge_counts_saturate() {
        assert_eq!(nice_ceiling(i64::MAX), i64::MAX);
        assert!(nice_ceiling(i64::MAX - 7) >= i64::MAX - 7);

        let svg = render_svg(
            "t",
            &[Series {
                label: "runaway".into(),
                points: vec![(at(1), i64::MAX), (at(2), 3)],
            }],
        );
        assert_eq!(svg.matches("<circle").count(), 2);
    }

    #[test]
    fn legend_is_capped_to_canvas() {
        let series: Vec<Series> = (0..40)
            .map(|i| Series {
                label: format!("post-{i:02}"),
                points: vec![(at(1), i)],
            })
            .collect();
        let svg = render_svg("t", &series);
        let rows = legend_capacity();
        assert_eq!(svg.matches("<rect x=").count(), rows - 1);
        assert!(svg.contains(&format!("+{} more", 40 - (rows - 1))));
        // every series is still plotted
        assert_eq!(svg.matches("<circle").count(), 40);
        assert!(TOP + 10.0 + (rows - 1) as f64 * LEGEND_ROW < HEIGHT);
    }
}
