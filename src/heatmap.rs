// src/heatmap.rs

use anyhow::{anyhow, Context, Result};
use plotters::{
    prelude::*,
    style::{
        text_anchor::{HPos, Pos, VPos},
        FontTransform,
    },
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::align::AlignedFrame;
use crate::correlation::{correlation_matrix, CorrelationMatrix, Method};

const CELL: i32 = 72;
const TITLE_HEIGHT: i32 = 56;
const LEGEND_WIDTH: i32 = 120;
const LABEL_FONT: u32 = 13;
const CHAR_WIDTH: i32 = 7;
const MIN_GRID: i32 = 220;

const NEGATIVE: (f64, f64, f64) = (33.0, 102.0, 172.0);
const NEUTRAL: (f64, f64, f64) = (247.0, 247.0, 247.0);
const POSITIVE: (f64, f64, f64) = (178.0, 24.0, 43.0);
const UNDEFINED: RGBColor = RGBColor(200, 200, 200);

/// Diverging scale: -1 is blue, 0 the neutral midpoint, +1 red.
pub fn diverging_color(value: f64) -> RGBColor {
    let v = value.clamp(-1.0, 1.0);
    let (target, t) = if v < 0.0 { (NEGATIVE, -v) } else { (POSITIVE, v) };
    let mix = |from: f64, to: f64| (from + (to - from) * t).round() as u8;
    RGBColor(
        mix(NEUTRAL.0, target.0),
        mix(NEUTRAL.1, target.1),
        mix(NEUTRAL.2, target.2),
    )
}

/// `<out_dir>/<method>_correlation_heatmap.svg`
pub fn heatmap_path(out_dir: &Path, method: Method) -> PathBuf {
    out_dir.join(format!(
        "{}_correlation_heatmap.svg",
        method.as_str().to_lowercase()
    ))
}

/// Widest rendered label in pixels.
///
/// Uses the font's own measurement, never less than `CHAR_WIDTH` per
/// character, since font-less builds only approximate glyph widths.
fn label_extent(labels: &[String]) -> i32 {
    let font = ("sans-serif", LABEL_FONT).into_font();
    labels
        .iter()
        .map(|label| {
            let floor = label.chars().count() as i32 * CHAR_WIDTH;
            font.box_size(label)
                .map(|(w, _)| (w as i32).max(floor))
                .unwrap_or(floor)
        })
        .max()
        .unwrap_or(0)
}

fn draw_err<E: std::fmt::Debug>(err: E) -> anyhow::Error {
    anyhow!("drawing heatmap: {:?}", err)
}

/// Draw `matrix` as a labelled color grid with a legend bar.
pub fn draw_matrix_svg(matrix: &CorrelationMatrix, path: &Path) -> Result<()> {
    let n = matrix.size() as i32;
    let label_px = label_extent(&matrix.labels) + 24;
    let grid = (n * CELL).max(MIN_GRID);
    let cell = if n > 0 { grid / n } else { CELL };
    let width = (label_px + grid + LEGEND_WIDTH) as u32;
    let height = (TITLE_HEIGHT + grid + label_px) as u32;

    let root = SVGBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let centered = Pos::new(HPos::Center, VPos::Center);
    root.draw(&Text::new(
        format!("{} Correlation Heatmap", matrix.method),
        (width as i32 / 2, TITLE_HEIGHT / 2),
        ("sans-serif", 20).into_font().color(&BLACK).pos(centered),
    ))
    .map_err(draw_err)?;

    for i in 0..n {
        let y0 = TITLE_HEIGHT + i * cell;
        root.draw(&Text::new(
            matrix.labels[i as usize].clone(),
            (label_px - 8, y0 + cell / 2),
            ("sans-serif", LABEL_FONT)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Right, VPos::Center)),
        ))
        .map_err(draw_err)?;

        for j in 0..n {
            let x0 = label_px + j * cell;
            let value = matrix.get(i as usize, j as usize);
            let fill = value.map(diverging_color).unwrap_or(UNDEFINED);
            root.draw(&Rectangle::new(
                [(x0, y0), (x0 + cell, y0 + cell)],
                fill.filled(),
            ))
            .map_err(draw_err)?;
            root.draw(&Rectangle::new(
                [(x0, y0), (x0 + cell, y0 + cell)],
                WHITE.stroke_width(1),
            ))
            .map_err(draw_err)?;

            let (text, ink) = match value {
                Some(v) if v.abs() >= 0.6 => (format!("{:.2}", v), WHITE),
                Some(v) => (format!("{:.2}", v), BLACK),
                None => ("n/a".to_string(), BLACK),
            };
            root.draw(&Text::new(
                text,
                (x0 + cell / 2, y0 + cell / 2),
                ("sans-serif", LABEL_FONT).into_font().color(&ink).pos(centered),
            ))
            .map_err(draw_err)?;
        }
    }

    // column labels run downwards under the grid
    for j in 0..n {
        root.draw(&Text::new(
            matrix.labels[j as usize].clone(),
            (label_px + j * cell + cell / 2, TITLE_HEIGHT + grid + 8),
            ("sans-serif", LABEL_FONT)
                .into_font()
                .transform(FontTransform::Rotate90)
                .color(&BLACK)
                .pos(Pos::new(HPos::Left, VPos::Center)),
        ))
        .map_err(draw_err)?;
    }

    // legend: +1 at the top, -1 at the bottom
    let bar_x = label_px + grid + 30;
    let steps = 100;
    for s in 0..steps {
        let y0 = TITLE_HEIGHT + grid * s / steps;
        let y1 = TITLE_HEIGHT + grid * (s + 1) / steps;
        let value = 1.0 - 2.0 * (s as f64 + 0.5) / steps as f64;
        root.draw(&Rectangle::new(
            [(bar_x, y0), (bar_x + 20, y1)],
            diverging_color(value).filled(),
        ))
        .map_err(draw_err)?;
    }
    for (value, y) in [
        (1.0, TITLE_HEIGHT),
        (0.0, TITLE_HEIGHT + grid / 2),
        (-1.0, TITLE_HEIGHT + grid),
    ] {
        root.draw(&Text::new(
            format!("{:.1}", value),
            (bar_x + 26, y),
            ("sans-serif", 12)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Left, VPos::Center)),
        ))
        .map_err(draw_err)?;
    }

    root.present().map_err(draw_err)?;
    Ok(())
}

/// Compute the `method` matrix of `frame` and write it as an SVG heatmap.
#[tracing::instrument(level = "info", skip(frame, out_dir), fields(dir = %out_dir.as_ref().display()))]
pub fn render_heatmap<P: AsRef<Path>>(
    frame: &AlignedFrame,
    method: Method,
    out_dir: P,
) -> Result<(CorrelationMatrix, PathBuf)> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating heatmap directory {}", out_dir.display()))?;

    let matrix = correlation_matrix(frame, method);
    let undefined = (0..matrix.size())
        .flat_map(|i| (0..matrix.size()).map(move |j| (i, j)))
        .filter(|&(i, j)| i != j && matrix.get(i, j).is_none())
        .count();
    if undefined > 0 {
        warn!(%method, undefined, rows = frame.len(), "insufficient data for some pairs");
    }

    let path = heatmap_path(out_dir, method);
    draw_matrix_svg(&matrix, &path)
        .with_context(|| format!("writing heatmap {}", path.display()))?;
    info!(%method, path = %path.display(), "wrote heatmap");
    Ok((matrix, path))
}

/// One heatmap per correlation method.
pub fn render_heatmaps<P: AsRef<Path>>(
    frame: &AlignedFrame,
    out_dir: P,
) -> Result<Vec<(CorrelationMatrix, PathBuf)>> {
    Method::ALL
        .iter()
        .map(|method| render_heatmap(frame, *method, out_dir.as_ref()))
        .collect()
}
