//! # gridgantt-core
//!
//! Core domain model for the gridgantt chart engine.
//!
//! This crate provides:
//! - Raw tabular input: `Cell`, `Record`, `RecordSet`
//! - Domain types: `WorkPackage`, `Phase`, `Milestone`, `ScheduleModel`
//! - The record validator turning raw rows into a `ScheduleModel`
//! - The `Renderer` trait and error types
//!
//! ## Example
//!
//! ```rust
//! use gridgantt_core::{validate_records, Cell, RecordSet};
//!
//! let mut records = RecordSet::new(["start", "duration", "phase_number"]);
//! records.push_row([
//!     ("start", Cell::text("0")),
//!     ("duration", Cell::text("3")),
//!     ("phase_number", Cell::text("1")),
//! ]);
//! records.push_row([("start", Cell::Empty), ("duration", Cell::text("2"))]);
//!
//! let model = validate_records(&records).unwrap();
//! assert_eq!(model.packages().len(), 1);
//! assert_eq!(model.project_end(), 3);
//! ```

pub mod validate;

pub use validate::{
    validate_records, RecordValidator, DURATION_COLUMN, LABEL_COLUMN, MANDATORY_COLUMNS,
    PHASE_COLUMN, START_COLUMN,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Offset in months from the project origin
pub type Month = i64;

/// Largest accepted package start and duration (1000 years).
///
/// Keeps every package end, and so every derived bound, far away from
/// integer overflow and from axes too wide to rasterize.
pub const MAX_MONTH: Month = 12_000;

/// One raw input row: column name to cell value
pub type Record = BTreeMap<String, Cell>;

// ============================================================================
// Raw Input
// ============================================================================

/// A single cell of a spreadsheet export
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// True for absent content: no value, whitespace-only text, or NaN
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Integer(_) => false,
            Cell::Float(f) => f.is_nan(),
            Cell::Text(s) => s.trim().is_empty(),
        }
    }

    /// Interpret the cell as a whole number.
    ///
    /// Spreadsheet exports frequently write integers as `3.0`, so integral
    /// floats (numeric or textual) are accepted as well.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Empty => None,
            Cell::Integer(v) => Some(*v),
            Cell::Float(f) => integral_float(*f),
            Cell::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral_float))
            }
        }
    }
}

fn integral_float(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Integer(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// A table of raw records with a fixed, case-sensitive header
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl RecordSet {
    /// Create an empty table with the given header
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for column in columns {
            set.add_column(column.into());
        }
        set
    }

    /// Build a table from rows, deriving the header from the cells present
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let mut set = Self::default();
        for row in rows {
            set.push_record(row);
        }
        set
    }

    /// Append a row; columns not yet in the header are added to it
    pub fn push_row<I, K>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (K, Cell)>,
        K: Into<String>,
    {
        let record = cells.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.push_record(record);
    }

    pub fn push_record(&mut self, record: Record) {
        for key in record.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(record);
    }

    fn add_column(&mut self, column: String) {
        if !self.has_column(&column) {
            self.columns.push(column);
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Schedule Model
// ============================================================================

/// A single schedule entry occupying `[start, start + duration)` months
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkPackage {
    start: Month,
    duration: Month,
    phase_number: Option<u32>,
    label: Option<String>,
    attributes: BTreeMap<String, Cell>,
}

impl WorkPackage {
    /// Create a package; `start` must lie in `0..=MAX_MONTH` and `duration` in `1..=MAX_MONTH`
    pub fn new(start: Month, duration: Month) -> Result<Self, ValidationError> {
        if !START_RANGE.contains(&start) {
            return Err(ValidationError::InvalidPackage(InvalidValue::new(
                None,
                START_COLUMN,
                start.to_string(),
                START_REASON,
            )));
        }
        if !DURATION_RANGE.contains(&duration) {
            return Err(ValidationError::InvalidPackage(InvalidValue::new(
                None,
                DURATION_COLUMN,
                duration.to_string(),
                DURATION_REASON,
            )));
        }
        Ok(Self {
            start,
            duration,
            phase_number: None,
            label: None,
            attributes: BTreeMap::new(),
        })
    }

    /// Assign a phase; phase 0 leaves the package ungrouped
    pub fn phase(mut self, phase_number: u32) -> Self {
        self.phase_number = (phase_number > 0).then_some(phase_number);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach an uninterpreted passthrough column
    pub fn attribute(mut self, key: impl Into<String>, value: Cell) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn start(&self) -> Month {
        self.start
    }

    pub fn duration(&self) -> Month {
        self.duration
    }

    /// Exclusive end month, at most `2 * MAX_MONTH`
    pub fn end(&self) -> Month {
        self.start + self.duration
    }

    pub fn phase_number(&self) -> Option<u32> {
        self.phase_number
    }

    pub fn display_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, Cell> {
        &self.attributes
    }
}

/// Packages sharing a phase number, derived from the package list
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Phase {
    pub phase_number: u32,
    /// Earliest start among members
    pub start: Month,
    /// Latest exclusive end among members
    pub end: Month,
    /// Position among all phases, ascending by phase number
    pub ordinal: usize,
    /// Member package indices, ordered by start then input order
    pub members: Vec<usize>,
}

impl Phase {
    pub fn span(&self) -> (Month, Month) {
        (self.start, self.end)
    }
}

/// A zero-duration event on the time axis
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub month: Month,
    pub label: Option<String>,
}

impl Milestone {
    pub fn new(month: Month) -> Self {
        Self { month, label: None }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Validated work packages plus milestones, with derived project bounds
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScheduleModel {
    packages: Vec<WorkPackage>,
    milestones: Vec<Milestone>,
}

impl ScheduleModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_packages(packages: Vec<WorkPackage>) -> Self {
        Self {
            packages,
            milestones: Vec::new(),
        }
    }

    /// Append milestones, keeping their order
    pub fn with_milestones<I>(mut self, milestones: I) -> Self
    where
        I: IntoIterator<Item = Milestone>,
    {
        self.milestones.extend(milestones);
        self
    }

    /// Append unlabelled milestones at the given months
    pub fn with_milestone_months<I>(self, months: I) -> Self
    where
        I: IntoIterator<Item = Month>,
    {
        self.with_milestones(months.into_iter().map(Milestone::new))
    }

    pub fn push_package(&mut self, package: WorkPackage) {
        self.packages.push(package);
    }

    pub fn push_milestone(&mut self, milestone: Milestone) {
        self.milestones.push(milestone);
    }

    pub fn packages(&self) -> &[WorkPackage] {
        &self.packages
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    /// No packages and no milestones
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.milestones.is_empty()
    }

    /// Phase grouping is active as soon as one package carries a phase number
    pub fn has_phases(&self) -> bool {
        self.packages.iter().any(|p| p.phase_number.is_some())
    }

    /// Derive phases in ascending phase-number order.
    ///
    /// Members are sorted by start month; equal starts keep input order.
    pub fn phases(&self) -> Vec<Phase> {
        let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (idx, package) in self.packages.iter().enumerate() {
            if let Some(number) = package.phase_number {
                groups.entry(number).or_default().push(idx);
            }
        }

        groups
            .into_iter()
            .enumerate()
            .map(|(ordinal, (phase_number, mut members))| {
                members.sort_by_key(|&i| self.packages[i].start);
                let start = members
                    .iter()
                    .map(|&i| self.packages[i].start)
                    .min()
                    .unwrap_or_default();
                let end = members
                    .iter()
                    .map(|&i| self.packages[i].end())
                    .max()
                    .unwrap_or(start);
                Phase {
                    phase_number,
                    start,
                    end,
                    ordinal,
                    members,
                }
            })
            .collect()
    }

    /// Indices of packages without a phase number, in input order
    pub fn ungrouped_packages(&self) -> Vec<usize> {
        self.packages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.phase_number.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Latest package end, if there are packages
    pub fn packages_end(&self) -> Option<Month> {
        self.packages.iter().map(WorkPackage::end).max()
    }

    /// `(start, end)` over all package spans and milestone months
    pub fn bounds(&self) -> Option<(Month, Month)> {
        let starts = self.packages.iter().map(|p| p.start);
        let ends = self.packages.iter().map(WorkPackage::end);
        let months = self.milestones.iter().map(|m| m.month);

        let start = starts.chain(months.clone()).min()?;
        let end = ends.chain(months).max()?;
        Some((start, end.max(start)))
    }

    /// Project start; zero for an empty model
    pub fn project_start(&self) -> Month {
        self.bounds().map_or(0, |(start, _)| start)
    }

    /// Project end; equals the start for an empty model
    pub fn project_end(&self) -> Month {
        self.bounds().map_or(0, |(_, end)| end)
    }

    /// Drop milestones that are negative or lie past the last package end.
    ///
    /// Returns the removed milestones. Without packages only negative
    /// months are removed.
    pub fn filter_milestones(&mut self) -> Vec<Milestone> {
        let limit = self.packages_end();
        let (kept, removed): (Vec<_>, Vec<_>) = self
            .milestones
            .drain(..)
            .partition(|m| m.month >= 0 && limit.map_or(true, |end| m.month <= end));

        for milestone in &removed {
            tracing::warn!(
                month = milestone.month,
                project_end = ?limit,
                "milestone lies outside the project and is filtered"
            );
        }
        self.milestones = kept;
        removed
    }
}

pub(crate) const START_RANGE: std::ops::RangeInclusive<Month> = 0..=MAX_MONTH;
pub(crate) const DURATION_RANGE: std::ops::RangeInclusive<Month> = 1..=MAX_MONTH;
pub(crate) const START_REASON: &str = "start must be an integer between 0 and 12000";
pub(crate) const DURATION_REASON: &str = "duration must be an integer between 1 and 12000";

// ============================================================================
// Traits
// ============================================================================

/// Renderer for schedule visualization
pub trait Renderer {
    type Output;

    fn render(&self, model: &ScheduleModel) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Errors
// ============================================================================

/// One offending value, with enough context to fix the spreadsheet export
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvalidValue {
    /// 1-based data row, counted before empty rows are dropped
    pub row: Option<usize>,
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl InvalidValue {
    pub fn new(
        row: Option<usize>,
        column: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            row,
            column: column.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(row) = self.row {
            write!(f, "row {}, ", row)?;
        }
        write!(
            f,
            "column '{}': '{}' ({})",
            self.column, self.value, self.reason
        )
    }
}

fn join_values(values: &[InvalidValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while turning raw records into a schedule model
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing mandatory column: '{0}'")]
    MissingColumn(String),

    #[error("{} invalid value(s): {}", .0.len(), join_values(.0))]
    InvalidValues(Vec<InvalidValue>),

    #[error("Invalid work package: {0}")]
    InvalidPackage(InvalidValue),
}

/// Errors raised while resolving the style configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown style option: '{0}'")]
    UnknownOption(String),

    #[error("Invalid value for style option '{option}': '{value}' ({reason})")]
    InvalidOption {
        option: String,
        value: String,
        reason: String,
    },
}

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Any failure of the records-to-image pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Render(RenderError::Config(err))
    }
}

// ============================================================================
// Tests
// ============================================================================
