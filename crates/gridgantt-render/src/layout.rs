//! Layout engine
//!
//! Maps a [`ScheduleModel`] onto an ordered list of [`LayoutRow`]s and a
//! month-based [`TimeAxis`].
//!
//! Row order:
//! - with phases: one band row per phase (ascending phase number), followed
//!   by that phase's packages ordered by start month, ties in input order;
//!   packages without a phase come last, in input order, without a band
//! - without phases: packages in input order
//!
//! Milestones share a single overlay track that does not occupy a raster
//! row. Coincident milestones are all kept.

use crate::style::StyleConfig;
use gridgantt_core::{Month, RenderError, ScheduleModel, MAX_MONTH};
use serde::Serialize;

/// Widest axis that is laid out; covers every range of validated packages
pub const MAX_AXIS_MONTHS: Month = 2 * MAX_MONTH;

/// Month range covered by the chart, `end` exclusive for cells and
/// inclusive for boundaries (ticks, milestones)
///
/// Always at least one and at most [`MAX_AXIS_MONTHS`] months long.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeAxis {
    start: Month,
    end: Month,
}

impl TimeAxis {
    /// Create an axis; a zero-length range is widened to one month
    pub fn new(start: Month, end: Month) -> Result<Self, RenderError> {
        let length = end
            .checked_sub(start)
            .filter(|length| *length <= MAX_AXIS_MONTHS)
            .ok_or_else(|| {
                RenderError::InvalidData(format!(
                    "time axis [{}, {}] is longer than {} months",
                    start, end, MAX_AXIS_MONTHS
                ))
            })?;
        let end = if length < 1 {
            start.checked_add(1).ok_or_else(|| {
                RenderError::InvalidData(format!("time axis cannot start at month {}", start))
            })?
        } else {
            end
        };
        Ok(Self { start, end })
    }

    /// Axis for a model, falling back to `[0, empty_span]` without data
    pub fn for_model(model: &ScheduleModel, empty_span: u32) -> Result<Self, RenderError> {
        match model.bounds() {
            Some((start, end)) => Self::new(start, end),
            None => Self::new(0, Month::from(empty_span.max(1))),
        }
    }

    pub fn start(&self) -> Month {
        self.start
    }

    pub fn end(&self) -> Month {
        self.end
    }

    /// Number of month cells
    pub fn columns(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Column boundary index of a month, clamped to the axis
    pub fn column_of(&self, month: Month) -> usize {
        (month.clamp(self.start, self.end) - self.start) as usize
    }

    /// Relative position of a month boundary in `[0, 1]`
    pub fn fraction_of(&self, month: Month) -> f64 {
        self.column_of(month) as f64 / self.columns() as f64
    }

    /// Labelled months from the axis start, every `interval` months
    pub fn ticks(&self, interval: u32) -> Vec<Month> {
        let step = Month::from(interval.max(1));
        (0..)
            .map_while(|i: Month| i.checked_mul(step).and_then(|offset| self.start.checked_add(offset)))
            .take_while(|m| *m <= self.end)
            .collect()
    }
}

/// Half-open column range `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnSpan {
    pub start: usize,
    pub end: usize,
}

impl ColumnSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, column: usize) -> bool {
        self.start <= column && column < self.end
    }
}

/// A milestone placed on a column boundary
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MilestoneMarker {
    pub month: Month,
    pub column: usize,
    pub label: String,
}

/// What a layout row shows
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowKind {
    PhaseBand {
        phase_number: u32,
    },
    Package {
        /// Index into the model's package list
        package: usize,
        phase_number: Option<u32>,
    },
    MilestoneTrack {
        markers: Vec<MilestoneMarker>,
    },
}

/// One vertical slot of the chart
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayoutRow {
    pub index: usize,
    pub kind: RowKind,
    pub span: ColumnSpan,
    /// Natural pixel height; zero for the overlay track
    pub height: u32,
    pub label: String,
}

impl LayoutRow {
    /// Whether the row occupies cells in the raster grid
    pub fn is_raster_row(&self) -> bool {
        !matches!(self.kind, RowKind::MilestoneTrack { .. })
    }

    pub fn is_band(&self) -> bool {
        matches!(self.kind, RowKind::PhaseBand { .. })
    }
}

/// Result of the layout pass
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Layout {
    pub axis: TimeAxis,
    pub rows: Vec<LayoutRow>,
}

impl Layout {
    pub fn raster_rows(&self) -> impl Iterator<Item = &LayoutRow> {
        self.rows.iter().filter(|r| r.is_raster_row())
    }

    pub fn raster_row_count(&self) -> usize {
        self.raster_rows().count()
    }

    pub fn milestone_track(&self) -> Option<&LayoutRow> {
        self.rows.iter().find(|r| !r.is_raster_row())
    }

    /// Milestone markers in model order; empty without a track
    pub fn markers(&self) -> &[MilestoneMarker] {
        match self.milestone_track().map(|r| &r.kind) {
            Some(RowKind::MilestoneTrack { markers }) => markers.as_slice(),
            _ => &[],
        }
    }
}

/// Computes layouts using the row geometry and labels of a style
#[derive(Clone, Copy, Debug)]
pub struct LayoutEngine<'a> {
    style: &'a StyleConfig,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(style: &'a StyleConfig) -> Self {
        Self { style }
    }

    pub fn layout(&self, model: &ScheduleModel) -> Result<Layout, RenderError> {
        let axis = TimeAxis::for_model(model, self.style.empty_span)?;
        let mut rows = Vec::new();

        if model.has_phases() {
            for phase in model.phases() {
                rows.push(LayoutRow {
                    index: rows.len(),
                    kind: RowKind::PhaseBand {
                        phase_number: phase.phase_number,
                    },
                    span: self.span(&axis, phase.start, phase.end),
                    height: self.style.band_height,
                    label: format!("{}{}", self.style.phase_prefix, phase.phase_number),
                });
                for idx in phase.members {
                    rows.push(self.package_row(model, &axis, idx, rows.len()));
                }
            }
            for idx in model.ungrouped_packages() {
                rows.push(self.package_row(model, &axis, idx, rows.len()));
            }
        } else {
            for idx in 0..model.packages().len() {
                rows.push(self.package_row(model, &axis, idx, rows.len()));
            }
        }

        if !model.milestones().is_empty() {
            let markers = model
                .milestones()
                .iter()
                .enumerate()
                .map(|(i, m)| MilestoneMarker {
                    month: m.month,
                    column: axis.column_of(m.month),
                    label: m
                        .label
                        .clone()
                        .unwrap_or_else(|| format!("{} {}", self.style.milestone_prefix, i + 1)),
                })
                .collect();
            rows.push(LayoutRow {
                index: rows.len(),
                kind: RowKind::MilestoneTrack { markers },
                span: ColumnSpan::new(0, axis.columns()),
                height: 0,
                label: self.style.milestone_prefix.clone(),
            });
        }

        tracing::debug!(
            rows = rows.len(),
            columns = axis.columns(),
            axis_start = axis.start,
            axis_end = axis.end,
            "computed chart layout"
        );
        Ok(Layout { axis, rows })
    }

    fn span(&self, axis: &TimeAxis, start: Month, end: Month) -> ColumnSpan {
        ColumnSpan::new(axis.column_of(start), axis.column_of(end))
    }

    fn package_row(&self, model: &ScheduleModel, axis: &TimeAxis, idx: usize, index: usize) -> LayoutRow {
        let package = &model.packages()[idx];
        let label = package
            .display_label()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", self.style.package_prefix, idx + 1));
        LayoutRow {
            index,
            kind: RowKind::Package {
                package: idx,
                phase_number: package.phase_number(),
            },
            span: self.span(axis, package.start(), package.end()),
            height: self.style.row_height,
            label,
        }
    }
}
