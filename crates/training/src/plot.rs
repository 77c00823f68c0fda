//! Raster charts for the training report, drawn straight into `image` buffers.

use crate::classifier::History;
use crate::report::ConfusionMatrix;
use image::{Rgb, RgbImage};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);

/// History series in legend order, with their line colors.
pub const SERIES: [(&str, Rgb<u8>); 4] = [
    ("loss", Rgb([31, 119, 180])),
    ("accuracy", Rgb([255, 127, 14])),
    ("val_loss", Rgb([44, 160, 44])),
    ("val_accuracy", Rgb([214, 39, 40])),
];

/// Per-class key colors, cycled when there are more classes.
pub const CLASS_COLORS: [Rgb<u8>; 10] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([127, 127, 127]),
    Rgb([188, 189, 34]),
    Rgb([23, 190, 207]),
];

const CURVE_WIDTH: u32 = 800;
const CURVE_HEIGHT: u32 = 500;
const MARGIN: u32 = 40;
const SWATCH: u32 = 12;
const LEGEND_SLOT: u32 = 40;
const SCALE_SPACE: u32 = 40;

/// Light and dark end of the confusion-matrix color ramp.
const RAMP_LOW: [f32; 3] = [247.0, 251.0, 255.0];
const RAMP_HIGH: [f32; 3] = [8.0, 48.0, 107.0];

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line, clipped to the image.
pub fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Fill the half-open rectangle `[x0, x1) x [y0, y1)`.
pub fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for y in y0..y1.min(h) {
        for x in x0..x1.min(w) {
            img.put_pixel(x, y, color);
        }
    }
}

fn series_slot(name: &str) -> Option<usize> {
    SERIES.iter().position(|(n, _)| *n == name)
}

pub fn class_color(code: usize) -> Rgb<u8> {
    CLASS_COLORS[code % CLASS_COLORS.len()]
}

/// Top-left corner of the legend swatch for slot `slot` of [`SERIES`].
pub fn legend_swatch_origin(slot: usize) -> (u32, u32) {
    (MARGIN + slot as u32 * LEGEND_SLOT, (MARGIN - SWATCH) / 2)
}

/// Training curves over epochs, y axis fixed to [0, 1].
///
/// The top margin holds one color swatch per series, in the fixed [`SERIES`] slots
/// (loss, accuracy, val_loss, val_accuracy from left to right); absent validation
/// series leave their slot empty. The numbers are also in `history.tsv`.
pub fn render_history(history: &History) -> RgbImage {
    let mut img = RgbImage::from_pixel(CURVE_WIDTH, CURVE_HEIGHT, WHITE);
    let left = MARGIN as i64;
    let right = (CURVE_WIDTH - MARGIN) as i64;
    let top = MARGIN as i64;
    let bottom = (CURVE_HEIGHT - MARGIN) as i64;

    for tick in 0..=5 {
        let y = bottom - (bottom - top) * tick / 5;
        draw_line(&mut img, (left, y), (right, y), GRID);
    }
    let epochs = history.epochs.len();
    for tick in 0..epochs {
        let x = x_position(tick, epochs, left, right);
        draw_line(&mut img, (x, top), (x, bottom), GRID);
    }
    draw_line(&mut img, (left, bottom), (right, bottom), AXIS);
    draw_line(&mut img, (left, top), (left, bottom), AXIS);

    for (name, values) in history.series() {
        let Some(slot) = series_slot(name) else {
            continue;
        };
        let color = SERIES[slot].1;
        let (sx, sy) = legend_swatch_origin(slot);
        fill_rect(&mut img, sx, sy, sx + 2 * SWATCH, sy + SWATCH, color);
        let points: Vec<(i64, i64)> = values
            .iter()
            .enumerate()
            .map(|(epoch, v)| {
                let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 1.0 };
                let y = bottom - ((bottom - top) as f32 * v).round() as i64;
                (x_position(epoch, values.len(), left, right), y)
            })
            .collect();
        for pair in points.windows(2) {
            draw_line(&mut img, pair[0], pair[1], color);
        }
        for &(x, y) in &points {
            for dx in -2..=2 {
                for dy in -2..=2 {
                    put(&mut img, x + dx, y + dy, color);
                }
            }
        }
    }
    img
}

fn x_position(index: usize, count: usize, left: i64, right: i64) -> i64 {
    if count <= 1 {
        return (left + right) / 2;
    }
    left + (right - left) * index as i64 / (count as i64 - 1)
}

fn ramp(fraction: f32) -> Rgb<u8> {
    let t = fraction.clamp(0.0, 1.0);
    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        *slot = (RAMP_LOW[c] + (RAMP_HIGH[c] - RAMP_LOW[c]) * t).round() as u8;
    }
    Rgb(out)
}

/// Heatmap cell edge for a matrix of `classes` classes.
pub fn confusion_cell(classes: usize) -> u32 {
    (480 / classes.max(1) as u32).max(8)
}

/// Heatmap of the confusion matrix.
///
/// Rows are true classes top to bottom, columns predicted classes left to right, both in
/// category-table (lexical) order, the same order as `confusion_matrix.tsv`. A
/// [`class_color`] swatch keys each row in the left margin and each column in the top
/// margin. The bar right of the grid is the count scale, zero at the bottom and the
/// largest cell count at the top.
pub fn render_confusion(matrix: &ConfusionMatrix) -> RgbImage {
    let classes = matrix.classes().max(1) as u32;
    let cell = confusion_cell(matrix.classes());
    let size = classes * cell + 2 * MARGIN;
    let mut img = RgbImage::from_pixel(size + SCALE_SPACE, size, WHITE);
    let max = matrix.max_count().max(1) as f32;

    let key_near = MARGIN - SWATCH - 4;
    for code in 0..matrix.classes() as u32 {
        let color = class_color(code as usize);
        let start = MARGIN + code * cell + (cell.saturating_sub(SWATCH)) / 2;
        let end = start + SWATCH.min(cell);
        fill_rect(&mut img, key_near, start, key_near + SWATCH, end, color);
        fill_rect(&mut img, start, key_near, end, key_near + SWATCH, color);
    }

    for (row, counts) in matrix.rows().iter().enumerate() {
        for (col, &count) in counts.iter().enumerate() {
            let x0 = MARGIN + col as u32 * cell;
            let y0 = MARGIN + row as u32 * cell;
            fill_rect(&mut img, x0, y0, x0 + cell, y0 + cell, ramp(count as f32 / max));
        }
    }
    let edge = (MARGIN + classes * cell) as i64;
    for i in 0..=classes {
        let p = (MARGIN + i * cell) as i64;
        draw_line(&mut img, (MARGIN as i64, p), (edge, p), GRID);
        draw_line(&mut img, (p, MARGIN as i64), (p, edge), GRID);
    }

    let bar_left = size;
    let bar_top = MARGIN;
    let bar_bottom = MARGIN + classes * cell;
    let span = (bar_bottom - bar_top).max(1);
    for y in bar_top..bar_bottom {
        let fraction = (bar_bottom - 1 - y) as f32 / (span - 1).max(1) as f32;
        fill_rect(&mut img, bar_left, y, bar_left + SWATCH, y + 1, ramp(fraction));
    }
    img
}
