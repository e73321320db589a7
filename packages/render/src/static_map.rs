//! Static raster choropleth.
//!
//! Region outlines are projected to spherical Web Mercator, fitted to the
//! canvas above a legend strip, filled with their bin colour, and stroked.
//! The legend carries the metric name and the same bin labels as the web
//! map, set in the bundled DejaVu Sans.

use geo::{LineString, Polygon};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut,
    draw_text_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use region_map_regions_models::RegionCollection;
use rusttype::{Font, Scale};

use crate::scale::{Color, ColorScale};

/// 12 x 8 inches at 150 DPI.
pub const IMAGE_WIDTH: u32 = 1800;
pub const IMAGE_HEIGHT: u32 = 1200;

const MARGIN: f64 = 40.0;
const LEGEND_HEIGHT: u32 = 150;
const LEGEND_LEFT: i32 = 40;
const TITLE_OFFSET: u32 = 12;
const TITLE_SIZE: f32 = 28.0;
const SWATCH_OFFSET: u32 = 52;
const SWATCH_WIDTH: u32 = 200;
const SWATCH_HEIGHT: u32 = 36;
const SWATCH_GAP: u32 = 20;
const LABEL_GAP: u32 = 8;
const LABEL_SIZE: f32 = 20.0;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE: Rgba<u8> = Rgba([64, 64, 64, 255]);
const TEXT: Rgba<u8> = Rgba([33, 33, 33, 255]);

static FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Forward spherical Web Mercator, in metres.
#[must_use]
pub fn project(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
    (x, y)
}

/// Maps projected metres to pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Viewport {
    min_x: f64,
    max_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    fn fit(collection: &RegionCollection) -> Option<Self> {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);

        for region in collection {
            for polygon in &region.geometry {
                for coord in polygon.exterior() {
                    let (x, y) = project(coord.x, coord.y);
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if !min_x.is_finite() || !max_x.is_finite() {
            return None;
        }

        let available_w = f64::from(IMAGE_WIDTH) - 2.0 * MARGIN;
        let available_h = f64::from(IMAGE_HEIGHT - LEGEND_HEIGHT) - 2.0 * MARGIN;
        let span_x = (max_x - min_x).max(f64::EPSILON);
        let span_y = (max_y - min_y).max(f64::EPSILON);
        let scale = (available_w / span_x).min(available_h / span_y);

        Some(Self {
            min_x,
            max_y,
            scale,
            offset_x: MARGIN + (available_w - span_x * scale) / 2.0,
            offset_y: MARGIN + (available_h - span_y * scale) / 2.0,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn to_pixel(&self, lon: f64, lat: f64) -> (f32, f32) {
        let (x, y) = project(lon, lat);
        (
            (self.offset_x + (x - self.min_x) * self.scale) as f32,
            (self.offset_y + (self.max_y - y) * self.scale) as f32,
        )
    }

    /// Pixel ring suitable for `draw_polygon_mut`: no repeated neighbours
    /// and not explicitly closed.
    #[allow(clippy::cast_possible_truncation)]
    fn ring(&self, ring: &LineString<f64>) -> Option<Vec<Point<i32>>> {
        let mut points: Vec<Point<i32>> = Vec::with_capacity(ring.0.len());
        for coord in ring {
            let (x, y) = self.to_pixel(coord.x, coord.y);
            let point = Point::new(x.round() as i32, y.round() as i32);
            if points.last() != Some(&point) {
                points.push(point);
            }
        }
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        (points.len() >= 3).then_some(points)
    }
}

const fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}

/// Renders the choropleth for `metric` onto a fresh canvas.
#[must_use]
pub fn render_static(collection: &RegionCollection, metric: &str, scale: &ColorScale) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(IMAGE_WIDTH, IMAGE_HEIGHT, BACKGROUND);

    if let Some(viewport) = Viewport::fit(collection) {
        for region in collection {
            let fill = rgba(scale.color_for(region.number(metric)));
            for polygon in &region.geometry {
                fill_polygon(&mut canvas, &viewport, polygon, fill);
            }
        }
        for region in collection {
            for polygon in &region.geometry {
                stroke_ring(&mut canvas, &viewport, polygon.exterior());
                for hole in polygon.interiors() {
                    stroke_ring(&mut canvas, &viewport, hole);
                }
            }
        }
    } else {
        log::warn!("No drawable geometry; static map contains only the legend");
    }

    draw_legend(&mut canvas, metric, scale);

    canvas
}

fn fill_polygon(canvas: &mut RgbaImage, viewport: &Viewport, polygon: &Polygon<f64>, fill: Rgba<u8>) {
    if let Some(exterior) = viewport.ring(polygon.exterior()) {
        draw_polygon_mut(canvas, &exterior, fill);
        for hole in polygon.interiors() {
            if let Some(hole) = viewport.ring(hole) {
                draw_polygon_mut(canvas, &hole, BACKGROUND);
            }
        }
    }
}

fn stroke_ring(canvas: &mut RgbaImage, viewport: &Viewport, ring: &LineString<f64>) {
    for line in ring.lines() {
        let start = viewport.to_pixel(line.start.x, line.start.y);
        let end = viewport.to_pixel(line.end.x, line.end.y);
        draw_line_segment_mut(canvas, start, end, OUTLINE);
    }
}

fn legend_font() -> Option<Font<'static>> {
    let font = Font::try_from_bytes(FONT_DATA);
    if font.is_none() {
        log::warn!("Bundled legend font could not be parsed; legend drawn without text");
    }
    font
}

/// Metric title, then one labelled swatch per bin and the no-value swatch.
#[allow(clippy::cast_possible_wrap)]
fn draw_legend(canvas: &mut RgbaImage, metric: &str, scale: &ColorScale) {
    let top = IMAGE_HEIGHT - LEGEND_HEIGHT;
    let swatch_top = (top + SWATCH_OFFSET) as i32;
    let label_top = swatch_top + (SWATCH_HEIGHT + LABEL_GAP) as i32;
    let font = legend_font();

    if let Some(font) = &font {
        draw_text_mut(
            canvas,
            TEXT,
            LEGEND_LEFT,
            (top + TITLE_OFFSET) as i32,
            Scale::uniform(TITLE_SIZE),
            font,
            metric,
        );
    }

    let mut left = LEGEND_LEFT;
    for (label, color) in scale.legend_entries() {
        let rect = Rect::at(left, swatch_top).of_size(SWATCH_WIDTH, SWATCH_HEIGHT);
        draw_filled_rect_mut(canvas, rect, rgba(color));
        draw_hollow_rect_mut(canvas, rect, OUTLINE);

        if let Some(font) = &font {
            draw_text_mut(
                canvas,
                TEXT,
                left,
                label_top,
                Scale::uniform(LABEL_SIZE),
                font,
                &label,
            );
        }

        left += (SWATCH_WIDTH + SWATCH_GAP) as i32;
    }
}
