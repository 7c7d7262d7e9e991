use chrono::{DateTime, Utc};
use maud::{Markup, html};

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 220.0;
const MARGIN_LEFT: f64 = 48.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 16.0;
const MARGIN_BOTTOM: f64 = 28.0;

const TEXT_STYLE: &str = "fill: var(--foreground); font-family: inherit";
const SVG_CONTAINER_STYLE: &str = "width:100%;height:auto";

fn format_time(ts: DateTime<Utc>, span_secs: i64) -> String {
    if span_secs > 86400 {
        ts.format("%d.%m %H:%M").to_string()
    } else {
        ts.format("%H:%M").to_string()
    }
}

fn format_value(v: f64) -> String {
    if v == v.floor() && v.abs() < 1_000_000.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

pub fn render_line_chart(points: &[(DateTime<Utc>, f64)], label: &str) -> Markup {
    if points.is_empty() {
        return empty_chart(label);
    }

    let max_val = points.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let min_val = points
        .iter()
        .map(|(_, v)| *v)
        .fold(f64::INFINITY, f64::min);
    let range = if (max_val - min_val).abs() < f64::EPSILON {
        1.0
    } else {
        max_val - min_val
    };

    let chart_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let chart_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let span_secs = (points[points.len() - 1].0 - points[0].0).num_seconds();

    let position = |i: usize, val: f64| -> (f64, f64) {
        let x = MARGIN_LEFT + (i as f64 / (points.len() - 1).max(1) as f64) * chart_w;
        let y = MARGIN_TOP + chart_h - ((val - min_val) / range) * chart_h;
        (x, y)
    };

    let mut polyline = String::new();
    for (i, (_, val)) in points.iter().enumerate() {
        let (x, y) = position(i, *val);
        if !polyline.is_empty() {
            polyline.push(' ');
        }
        use std::fmt::Write;
        let _ = write!(polyline, "{x},{y}");
    }

    html! {
        svg viewBox=(format!("0 0 {WIDTH} {HEIGHT}")) xmlns="http://www.w3.org/2000/svg" style=(SVG_CONTAINER_STYLE) {
            rect width=(WIDTH) height=(HEIGHT) style="fill: var(--background)" {}
            text x=(MARGIN_LEFT - 5.0) y=(MARGIN_TOP + 10.0) font-size="10" text-anchor="end" style=(TEXT_STYLE) {
                (format_value(max_val))
            }
            text x=(MARGIN_LEFT - 5.0) y=(MARGIN_TOP + chart_h) font-size="10" text-anchor="end" style=(TEXT_STYLE) {
                (format_value(min_val))
            }
            polyline points=(polyline) fill="none" stroke-width="2" style="stroke: var(--accent)" {}
            @for (i, (ts, val)) in points.iter().enumerate() {
                @let (x, y) = position(i, *val);
                circle cx=(x) cy=(y) r="2.5" style="fill: var(--accent)" {
                    title { (format_time(*ts, span_secs)) ": " (format_value(*val)) }
                }
            }
            (x_axis(points, chart_w, span_secs))
        }
    }
}

fn x_axis(points: &[(DateTime<Utc>, f64)], chart_w: f64, span_secs: i64) -> Markup {
    let label_y = HEIGHT - 5.0;
    html! {
        @if let Some((ts, _)) = points.first() {
            text x=(MARGIN_LEFT) y=(label_y) font-size="11" text-anchor="start" style=(TEXT_STYLE) {
                (format_time(*ts, span_secs))
            }
        }
        @if points.len() > 2 {
            @let mid = points.len() / 2;
            @let mid_x = MARGIN_LEFT + chart_w / 2.0;
            text x=(mid_x) y=(label_y) font-size="11" text-anchor="middle" style=(TEXT_STYLE) {
                (format_time(points[mid].0, span_secs))
            }
        }
        @if let Some((ts, _)) = points.last() {
            @let end_x = MARGIN_LEFT + chart_w;
            text x=(end_x) y=(label_y) font-size="11" text-anchor="end" style=(TEXT_STYLE) {
                (format_time(*ts, span_secs))
            }
        }
    }
}

pub fn empty_chart(label: &str) -> Markup {
    html! {
        svg viewBox=(format!("0 0 {WIDTH} {HEIGHT}")) xmlns="http://www.w3.org/2000/svg" style=(SVG_CONTAINER_STYLE) {
            rect width=(WIDTH) height=(HEIGHT) style="fill: var(--background)" {}
            text x=(WIDTH / 2.0) y=(HEIGHT / 2.0) font-size="14" text-anchor="middle" style=(TEXT_STYLE) {
                (label) " — no data"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn empty_series_renders_placeholder() {
        let markup = render_line_chart(&[], "Wien").into_string();
        assert!(markup.contains("no data"));
    }

    #[test]
    fn line_chart_contains_polyline_and_labels() {
        let start = Utc::now();
        let points = vec![
            (start, 20.0),
            (start + Duration::minutes(5), 40.0),
            (start + Duration::minutes(10), 30.0),
        ];
        let markup = render_line_chart(&points, "Wien").into_string();
        assert!(markup.contains("<polyline"));
        assert!(markup.contains("40")); // max y-label
        assert!(markup.contains("20")); // min y-label
    }
}
