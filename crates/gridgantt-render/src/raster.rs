//! Raster composer
//!
//! Builds one color-indexed [`RasterGrid`] (raster rows × month columns) from
//! a [`Layout`] and turns it into an image with a single composition pass.
//! Bars and bands are never drawn as individual primitives: the grid is
//! expanded to pixels in one `from_fn` call, and the SVG chart embeds that
//! bitmap as one `<image>` element.
//!
//! Everything that is not a cell (gridlines, tick labels, row labels and
//! milestone markers) is overlaid on top of the raster.

use crate::color::Color;
use crate::layout::{Layout, RowKind};
use crate::style::{OutputFormat, StyleConfig};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use gridgantt_core::RenderError;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use svg::node::element::{Group, Image, Line, Polygon, Rectangle, Text};
use svg::Document;

/// Palette index of an empty cell, rendered as background
pub const EMPTY: u16 = 0;

/// Color-indexed cells, one row per raster layout row, one column per month
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterGrid {
    rows: usize,
    columns: usize,
    cells: Vec<u16>,
    /// Palette entry 0 is the background
    palette: Vec<Color>,
}

impl RasterGrid {
    /// Paint every raster row of the layout into a fresh grid.
    ///
    /// A layout without raster rows still yields one blank row so the image
    /// never has an empty dimension.
    pub fn compose(layout: &Layout, style: &StyleConfig) -> Self {
        let columns = layout.axis.columns().max(1);
        let rows = layout.raster_row_count().max(1);
        let mut grid = Self {
            rows,
            columns,
            cells: vec![EMPTY; rows * columns],
            palette: vec![style.background_color],
        };

        for (r, row) in layout.raster_rows().enumerate() {
            let color = match row.kind {
                RowKind::PhaseBand { phase_number } => style.band_color_for(phase_number),
                RowKind::Package { phase_number, .. } => style.package_color_for(phase_number),
                RowKind::MilestoneTrack { .. } => continue,
            };
            let index = grid.palette_index(color);
            let end = row.span.end.min(columns);
            let start = row.span.start.min(end);
            grid.cells[r * columns + start..r * columns + end].fill(index);
        }

        grid
    }

    fn palette_index(&mut self, color: Color) -> u16 {
        // Entry 0 is reserved for the background, even if a bar shares its color.
        if let Some(pos) = self.palette.iter().skip(1).position(|c| *c == color) {
            return (pos + 1) as u16;
        }
        self.palette.push(color);
        (self.palette.len() - 1) as u16
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cell(&self, row: usize, column: usize) -> u16 {
        self.cells[row * self.columns + column]
    }

    pub fn row(&self, row: usize) -> &[u16] {
        &self.cells[row * self.columns..(row + 1) * self.columns]
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    /// Color of a cell, background for [`EMPTY`]
    pub fn color_at(&self, row: usize, column: usize) -> Color {
        self.palette[usize::from(self.cell(row, column))]
    }
}

/// Largest plot raster that is composed, in pixels
pub const MAX_RASTER_PIXELS: u64 = 64 * 1024 * 1024;

/// Pixel geometry of the plot area
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterGeometry {
    pub column_width: u32,
    pub plot_width: u32,
    pub plot_height: u32,
    /// Top edge of each raster row plus the bottom edge of the last one
    row_edges: Vec<u32>,
}

impl RasterGeometry {
    /// Pixel geometry for a layout, sized before any cell is allocated.
    ///
    /// Fails with [`RenderError::InvalidData`] when the plot would exceed
    /// [`MAX_RASTER_PIXELS`].
    pub fn new(layout: &Layout, style: &StyleConfig) -> Result<Self, RenderError> {
        let columns = u32::try_from(layout.axis.columns().max(1))
            .map_err(|_| RenderError::InvalidData("time axis has too many columns".into()))?;
        let column_width = (style.figure_size / columns).max(1);
        let plot_width = column_width.saturating_mul(columns);

        let mut natural: Vec<u64> = layout.raster_rows().map(|r| u64::from(r.height.max(1))).collect();
        if natural.is_empty() {
            natural.push(u64::from(style.row_height.max(1)));
        }
        let natural_total: u64 = natural.iter().sum();

        // `as u64` saturates for huge or infinite quotients
        let target_total = match style.figure_ratio {
            Some(ratio) => ((f64::from(plot_width) / ratio).round() as u64).max(natural.len() as u64),
            None => natural_total,
        };

        let pixels = u64::from(plot_width).saturating_mul(target_total);
        if pixels > MAX_RASTER_PIXELS {
            return Err(RenderError::InvalidData(format!(
                "plot of {}x{} pixels exceeds the limit of {} pixels",
                plot_width, target_total, MAX_RASTER_PIXELS
            )));
        }

        let mut row_edges = Vec::with_capacity(natural.len() + 1);
        row_edges.push(0);
        let mut cumulative = 0u64;
        for height in &natural {
            cumulative += height;
            let edge = (cumulative * target_total + natural_total / 2) / natural_total;
            row_edges.push(pixel(edge)?);
        }
        let plot_height = row_edges.last().copied().unwrap_or_default().max(1);

        Ok(Self {
            column_width,
            plot_width,
            plot_height,
            row_edges,
        })
    }

    pub fn row_top(&self, row: usize) -> u32 {
        self.row_edges[row]
    }

    pub fn row_bottom(&self, row: usize) -> u32 {
        self.row_edges[row + 1]
    }

    /// x offset of a column boundary inside the plot
    pub fn column_x(&self, column: usize) -> u32 {
        (column as u32).saturating_mul(self.column_width)
    }

    /// Raster row covering pixel line `y`
    fn row_at(&self, y: u32) -> usize {
        let last = self.row_edges.len().saturating_sub(2);
        self.row_edges[1..].partition_point(|edge| *edge <= y).min(last)
    }
}

fn pixel(value: u64) -> Result<u32, RenderError> {
    u32::try_from(value)
        .map_err(|_| RenderError::InvalidData(format!("pixel offset {} is out of range", value)))
}

/// Expand the grid to pixels in one composition pass
pub fn rasterize(grid: &RasterGrid, geometry: &RasterGeometry) -> RgbaImage {
    let palette: Vec<Rgba<u8>> = grid.palette().iter().map(|c| c.to_rgba()).collect();
    let last_column = grid.columns() - 1;

    RgbaImage::from_fn(geometry.plot_width, geometry.plot_height, |x, y| {
        let row = geometry.row_at(y);
        let column = ((x / geometry.column_width) as usize).min(last_column);
        palette[usize::from(grid.cell(row, column))]
    })
}

fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(raster.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| RenderError::Format(format!("Failed to encode PNG: {}", e)))?;
    Ok(buf)
}

/// A rendered chart, ready for the export step
#[derive(Clone, Debug)]
pub struct ChartImage {
    format: OutputFormat,
    grid: RasterGrid,
    geometry: RasterGeometry,
    raster: RgbaImage,
    document: Document,
    marker_columns: Vec<usize>,
    milestone_color: Color,
    milestone_line_width: u32,
}

impl ChartImage {
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    pub fn geometry(&self) -> &RasterGeometry {
        &self.geometry
    }

    /// Plot raster without overlays
    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Column boundaries carrying a milestone marker, one entry per milestone
    pub fn marker_columns(&self) -> &[usize] {
        &self.marker_columns
    }

    pub fn milestone_color(&self) -> Color {
        self.milestone_color
    }

    /// Complete chart as SVG text
    pub fn to_svg_string(&self) -> Result<String, RenderError> {
        let mut output = Vec::new();
        svg::write(&mut output, &self.document)
            .map_err(|e| RenderError::Format(format!("Failed to write SVG: {}", e)))?;
        String::from_utf8(output).map_err(|e| RenderError::Format(format!("Invalid UTF-8: {}", e)))
    }

    /// Plot raster with milestones burned in as vertical strokes
    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut raster = self.raster.clone();
        let (width, height) = raster.dimensions();
        let color = self.milestone_color.to_rgba();
        let stroke = self.milestone_line_width.max(1);

        for column in &self.marker_columns {
            let center = self.geometry.column_x(*column).min(width - 1);
            let left = center.saturating_sub(stroke / 2);
            for x in left..(left + stroke).min(width) {
                for y in 0..height {
                    raster.put_pixel(x, y, color);
                }
            }
        }
        encode_png(&raster)
    }

    /// Bytes in the configured output format
    pub fn encode(&self) -> Result<Vec<u8>, RenderError> {
        match self.format {
            OutputFormat::Png => self.to_png(),
            OutputFormat::Svg => self.to_svg_string().map(String::into_bytes),
        }
    }
}

/// Composes the raster grid and the chart image for one layout
#[derive(Clone, Copy, Debug)]
pub struct RasterComposer<'a> {
    style: &'a StyleConfig,
}

impl<'a> RasterComposer<'a> {
    pub fn new(style: &'a StyleConfig) -> Self {
        Self { style }
    }

    fn header_height(&self) -> u32 {
        self.style.font_size.saturating_mul(2).saturating_add(8)
    }

    fn footer_height(&self) -> u32 {
        self.style.font_size.saturating_mul(3).saturating_add(8)
    }

    pub fn render(&self, layout: &Layout) -> Result<ChartImage, RenderError> {
        self.style.validate()?;

        let geometry = RasterGeometry::new(layout, self.style)?;
        let grid = RasterGrid::compose(layout, self.style);
        let raster = rasterize(&grid, &geometry);
        tracing::debug!(
            rows = grid.rows(),
            columns = grid.columns(),
            width = geometry.plot_width,
            height = geometry.plot_height,
            "composed raster grid"
        );

        let document = self.render_document(layout, &geometry, &raster)?;
        let marker_columns = layout.markers().iter().map(|m| m.column).collect();

        Ok(ChartImage {
            format: self.style.output_format,
            grid,
            geometry,
            raster,
            document,
            marker_columns,
            milestone_color: self.style.milestone_color,
            milestone_line_width: self.style.milestone_line_width.round() as u32,
        })
    }

    fn plot_origin(&self) -> (u32, u32) {
        (
            self.style.padding.saturating_add(self.style.label_width),
            self.style.padding.saturating_add(self.header_height()),
        )
    }

    fn render_document(
        &self,
        layout: &Layout,
        geometry: &RasterGeometry,
        raster: &RgbaImage,
    ) -> Result<Document, RenderError> {
        let (plot_x, plot_y) = self.plot_origin();
        let width = plot_x
            .saturating_add(geometry.plot_width)
            .saturating_add(self.style.padding);
        let height = plot_y
            .saturating_add(geometry.plot_height)
            .saturating_add(self.footer_height())
            .saturating_add(self.style.padding);

        let mut document = Document::new()
            .set("width", width)
            .set("height", height)
            .set("viewBox", (0, 0, width, height))
            .set("xmlns", "http://www.w3.org/2000/svg");

        let background = Rectangle::new()
            .set("width", "100%")
            .set("height", "100%")
            .set("fill", self.style.background_color.to_hex());
        document = document.add(background);

        let href = format!("data:image/png;base64,{}", BASE64.encode(encode_png(raster)?));
        let plot = Image::new()
            .set("x", plot_x)
            .set("y", plot_y)
            .set("width", geometry.plot_width)
            .set("height", geometry.plot_height)
            .set("preserveAspectRatio", "none")
            .set("style", "image-rendering:pixelated")
            .set("href", href);
        document = document.add(plot);

        document = document.add(self.render_grid(layout, geometry));
        document = document.add(self.render_row_labels(layout, geometry));
        document = document.add(self.render_axis(layout, geometry));
        document = document.add(self.render_milestones(layout, geometry));

        Ok(document)
    }

    fn text(&self, content: impl Into<String>, x: f64, y: f64) -> Text {
        Text::new(content)
            .set("x", x)
            .set("y", y)
            .set("font-family", self.style.font.as_str())
            .set("font-size", self.style.font_size)
            .set("fill", self.style.text_color.to_hex())
    }

    /// Minor gridlines on every column and row boundary
    fn render_grid(&self, layout: &Layout, geometry: &RasterGeometry) -> Group {
        let mut group = Group::new().set("class", "grid");
        let (plot_x, plot_y) = self.plot_origin();
        let stroke = self.style.grid_color.to_hex();

        for column in 0..=layout.axis.columns() {
            let x = plot_x + geometry.column_x(column);
            let line = Line::new()
                .set("x1", x)
                .set("y1", plot_y)
                .set("x2", x)
                .set("y2", plot_y + geometry.plot_height)
                .set("stroke", stroke.as_str())
                .set("stroke-width", 1);
            group = group.add(line);
        }

        let rows = geometry.row_edges.len() - 1;
        for row in 0..=rows {
            let y = plot_y + geometry.row_edges[row];
            let line = Line::new()
                .set("x1", plot_x)
                .set("y1", y)
                .set("x2", plot_x + geometry.plot_width)
                .set("y2", y)
                .set("stroke", stroke.as_str())
                .set("stroke-width", 1);
            group = group.add(line);
        }

        group
    }

    fn render_row_labels(&self, layout: &Layout, geometry: &RasterGeometry) -> Group {
        let mut group = Group::new().set("class", "row-labels");
        let (_, plot_y) = self.plot_origin();
        let max_chars = (self.style.label_width as f64 / (self.style.font_size as f64 * 0.6)) as usize;

        for (r, row) in layout.raster_rows().enumerate() {
            let middle = f64::from(plot_y) + f64::from(geometry.row_top(r) + geometry.row_bottom(r)) / 2.0;
            let mut label = self
                .text(
                    truncate(&row.label, max_chars),
                    f64::from(self.style.padding),
                    middle + f64::from(self.style.font_size) / 3.0,
                )
                .set("class", if row.is_band() { "band-label" } else { "package-label" });
            if row.is_band() {
                label = label.set("font-weight", "bold");
            }
            group = group.add(label);
        }

        group
    }

    /// Tick labels below the plot and the axis caption
    fn render_axis(&self, layout: &Layout, geometry: &RasterGeometry) -> Group {
        let mut group = Group::new().set("class", "axis");
        let (plot_x, plot_y) = self.plot_origin();
        let bottom = plot_y + geometry.plot_height;
        let font_size = f64::from(self.style.font_size);

        for month in layout.axis.ticks(self.style.tick_interval) {
            let x = plot_x + geometry.column_x(layout.axis.column_of(month));
            let tick = Line::new()
                .set("x1", x)
                .set("y1", bottom)
                .set("x2", x)
                .set("y2", bottom + 5)
                .set("stroke", self.style.text_color.to_hex())
                .set("stroke-width", 1);
            group = group.add(tick);

            let label = self
                .text(month.to_string(), f64::from(x), f64::from(bottom) + 5.0 + font_size)
                .set("text-anchor", "middle")
                .set("class", "tick");
            group = group.add(label);
        }

        let caption = self
            .text(
                self.style.x_label.as_str(),
                f64::from(plot_x) + f64::from(geometry.plot_width) / 2.0,
                f64::from(bottom) + 10.0 + font_size * 2.5,
            )
            .set("text-anchor", "middle")
            .set("class", "axis-label");
        group = group.add(caption);

        group
    }

    /// Vertical marker line with a diamond glyph per milestone
    fn render_milestones(&self, layout: &Layout, geometry: &RasterGeometry) -> Group {
        let mut group = Group::new().set("class", "milestones");
        let (plot_x, plot_y) = self.plot_origin();
        let color = self.style.milestone_color.to_hex();
        let size = f64::from(self.style.font_size) / 2.0;

        for marker in layout.markers() {
            let x = f64::from(plot_x + geometry.column_x(marker.column));
            let top = f64::from(plot_y);

            let line = Line::new()
                .set("x1", x)
                .set("y1", top)
                .set("x2", x)
                .set("y2", top + f64::from(geometry.plot_height))
                .set("stroke", color.as_str())
                .set("stroke-width", self.style.milestone_line_width);
            group = group.add(line);

            let cy = top - size;
            let diamond = Polygon::new()
                .set(
                    "points",
                    format!(
                        "{},{} {},{} {},{} {},{}",
                        x,
                        cy - size,
                        x + size,
                        cy,
                        x,
                        cy + size,
                        x - size,
                        cy
                    ),
                )
                .set("fill", color.as_str())
                .set("class", "milestone");
            group = group.add(diamond);

            let label = self
                .text(marker.label.as_str(), x + size + 2.0, cy - size)
                .set("fill", color.as_str())
                .set("class", "milestone-label");
            group = group.add(label);
        }

        group
    }
}

/// Truncate a string to a maximum length with ellipsis
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
