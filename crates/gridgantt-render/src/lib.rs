//! # gridgantt-render
//!
//! Layout and raster rendering for gridgantt schedules.
//!
//! This crate provides:
//! - Style configuration with typed, defaulted options
//! - The layout engine mapping packages, phases and milestones to rows
//! - The raster composer turning the layout into one indexed-color image
//! - `RasterGanttRenderer`, the `Renderer` tying the stages together
//!
//! ## Example
//!
//! ```rust
//! use gridgantt_core::{Cell, Milestone, RecordSet};
//! use gridgantt_render::{render_records, Strictness};
//!
//! let mut records = RecordSet::new(["start", "duration", "phase_number"]);
//! records.push_row([
//!     ("start", Cell::text("0")),
//!     ("duration", Cell::text("3")),
//!     ("phase_number", Cell::text("1")),
//! ]);
//! records.push_row([
//!     ("start", Cell::text("3")),
//!     ("duration", Cell::text("4")),
//!     ("phase_number", Cell::text("2")),
//! ]);
//!
//! let config = serde_json::Map::new();
//! let chart = render_records(&records, [Milestone::new(6)], &config, Strictness::Lenient).unwrap();
//! let svg = chart.to_svg_string().unwrap();
//! assert!(svg.contains("<image"));
//! ```

pub mod color;
pub mod layout;
pub mod raster;
pub mod style;

pub use color::Color;
pub use layout::{
    ColumnSpan, Layout, LayoutEngine, LayoutRow, MilestoneMarker, RowKind, TimeAxis, MAX_AXIS_MONTHS,
};
pub use raster::{
    rasterize, ChartImage, RasterComposer, RasterGeometry, RasterGrid, EMPTY, MAX_RASTER_PIXELS,
};
pub use style::{ColorSpec, OutputFormat, StyleConfig, Strictness};

use gridgantt_core::{validate_records, Error, Milestone, RecordSet, RenderError, Renderer, ScheduleModel};
use serde_json::{Map, Value};

/// Gantt chart renderer producing a single raster-backed image
#[derive(Clone, Debug, Default)]
pub struct RasterGanttRenderer {
    pub style: StyleConfig,
}

impl RasterGanttRenderer {
    pub fn new(style: StyleConfig) -> Self {
        Self { style }
    }

    /// Renderer configured from a raw option mapping
    pub fn from_mapping(mapping: &Map<String, Value>, strictness: Strictness) -> Result<Self, Error> {
        Ok(Self::new(StyleConfig::from_mapping(mapping, strictness)?))
    }

    /// Layout stage only
    pub fn layout(&self, model: &ScheduleModel) -> Result<Layout, RenderError> {
        LayoutEngine::new(&self.style).layout(model)
    }
}

impl Renderer for RasterGanttRenderer {
    type Output = ChartImage;

    fn render(&self, model: &ScheduleModel) -> Result<ChartImage, RenderError> {
        self.style.validate()?;

        let layout = if self.style.filter_milestones {
            let mut filtered = model.clone();
            filtered.filter_milestones();
            self.layout(&filtered)?
        } else {
            self.layout(model)?
        };
        RasterComposer::new(&self.style).render(&layout)
    }
}

/// Run the whole pipeline: configuration, validation, layout and composition.
///
/// Configuration and validation errors abort before any layout work starts.
pub fn render_records<I>(
    records: &RecordSet,
    milestones: I,
    config: &Map<String, Value>,
    strictness: Strictness,
) -> Result<ChartImage, Error>
where
    I: IntoIterator<Item = Milestone>,
{
    let renderer = RasterGanttRenderer::from_mapping(config, strictness)?;
    let model = validate_records(records)?.with_milestones(milestones);
    Ok(renderer.render(&model)?)
}
