//! Style configuration
//!
//! Typed, defaulted access to the externally authored style mapping. The
//! mapping is expected as a `serde_json` object; whatever format the user
//! writes (YAML, JSON, TOML) is decoded into that shape by the caller.
//!
//! Unknown keys are ignored with a warning unless [`Strictness::Strict`] is
//! requested. Out-of-range values always fail with
//! [`ConfigError::InvalidOption`].

use crate::color::Color;
use gridgantt_core::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Every option name understood by [`StyleConfig::from_mapping`]
pub const RECOGNIZED_OPTIONS: &[&str] = &[
    "figure_size",
    "figure_ratio",
    "row_height",
    "band_height",
    "package_color",
    "band_color",
    "milestone_color",
    "background_color",
    "grid_color",
    "text_color",
    "tick_interval",
    "font",
    "font_size",
    "output_format",
    "label_width",
    "padding",
    "milestone_line_width",
    "package_prefix",
    "phase_prefix",
    "milestone_prefix",
    "x_label",
    "empty_span",
    "filter_milestones",
];

/// Inclusive `(min, max)` accepted for each integer option
fn int_bounds(option: &str) -> (u32, u32) {
    match option {
        "figure_size" => (1, 16_384),
        "row_height" | "band_height" => (1, 1_024),
        "font_size" => (1, 256),
        "label_width" | "padding" => (0, 4_096),
        "tick_interval" => (1, 24_000),
        "empty_span" => (1, 12_000),
        _ => (0, u32::MAX),
    }
}

/// Accepted width/height ratios of the plot area
pub const FIGURE_RATIO_RANGE: (f64, f64) = (0.01, 100.0);

/// Accepted milestone stroke widths, in pixels
pub const MILESTONE_LINE_WIDTH_RANGE: (f64, f64) = (0.1, 64.0);

/// Saturation factor applied to package colors to derive band colors
pub const BAND_SATURATION: f64 = 0.45;

/// Channel scale for bands whose package color is already at full lightness
pub const BAND_SHADE: f64 = 0.85;

/// How unrecognized option names are treated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Ignore unknown keys (forward-compatible configuration)
    #[default]
    Lenient,
    /// Fail on the first unknown key
    Strict,
}

/// Image format handed to the export step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plot raster only
    Png,
    /// Full chart: embedded raster plus vector labels
    #[default]
    Svg,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "svg" => Some(OutputFormat::Svg),
            _ => None,
        }
    }
}

/// Package color used when nothing else applies
pub const DEFAULT_PACKAGE_COLOR: Color = Color::rgb(70, 130, 180);

/// A single color or one color per phase number
#[derive(Clone, Debug, PartialEq)]
pub enum ColorSpec {
    Uniform(Color),
    PerPhase(BTreeMap<u32, Color>),
}

impl ColorSpec {
    /// Explicitly configured color for a phase, if any
    pub fn lookup(&self, phase: Option<u32>) -> Option<Color> {
        match self {
            ColorSpec::Uniform(color) => Some(*color),
            ColorSpec::PerPhase(colors) => phase.and_then(|p| colors.get(&p).copied()),
        }
    }
}

/// Resolved style options
#[derive(Clone, Debug, PartialEq)]
pub struct StyleConfig {
    /// Width of the plot area in pixels
    pub figure_size: u32,
    /// Width/height ratio of the plot area; `None` keeps natural row heights
    pub figure_ratio: Option<f64>,
    /// Pixel height of a package row
    pub row_height: u32,
    /// Pixel height of a phase band row
    pub band_height: u32,
    pub package_color: ColorSpec,
    /// `None` derives each band color from its package color
    pub band_color: Option<ColorSpec>,
    pub milestone_color: Color,
    pub background_color: Color,
    pub grid_color: Color,
    pub text_color: Color,
    /// Months between time-axis labels
    pub tick_interval: u32,
    pub font: String,
    pub font_size: u32,
    pub output_format: OutputFormat,
    /// Width of the row-label column in pixels
    pub label_width: u32,
    pub padding: u32,
    pub milestone_line_width: f64,
    pub package_prefix: String,
    pub phase_prefix: String,
    pub milestone_prefix: String,
    pub x_label: String,
    /// Axis length in months when the model holds no data
    pub empty_span: u32,
    /// Drop milestones outside the package range before layout
    pub filter_milestones: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            figure_size: 1200,
            figure_ratio: None,
            row_height: 24,
            band_height: 16,
            package_color: ColorSpec::Uniform(DEFAULT_PACKAGE_COLOR),
            band_color: None,
            milestone_color: Color::rgb(139, 0, 0),
            background_color: Color::WHITE,
            grid_color: Color::rgb(211, 211, 211),
            text_color: Color::rgb(0x2c, 0x3e, 0x50),
            tick_interval: 1,
            font: "sans-serif".into(),
            font_size: 14,
            output_format: OutputFormat::Svg,
            label_width: 160,
            padding: 20,
            milestone_line_width: 2.5,
            package_prefix: "WP".into(),
            phase_prefix: "P".into(),
            milestone_prefix: "MS".into(),
            x_label: "Months".into(),
            empty_span: 12,
            filter_milestones: false,
        }
    }
}

impl StyleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a raw option mapping on top of the defaults
    pub fn from_mapping(
        mapping: &Map<String, Value>,
        strictness: Strictness,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (key, value) in mapping {
            if value.is_null() {
                // `key:` without a value in YAML means "use the default"
                continue;
            }
            match key.as_str() {
                "figure_size" => config.figure_size = int_option(key, value)?,
                "figure_ratio" => {
                    let (min, max) = FIGURE_RATIO_RANGE;
                    config.figure_ratio = Some(float_option(key, value, min, max)?)
                }
                "row_height" => config.row_height = int_option(key, value)?,
                "band_height" => config.band_height = int_option(key, value)?,
                "package_color" => {
                    if let Some(spec) = color_spec_option(key, value)? {
                        config.package_color = spec;
                    }
                }
                "band_color" => config.band_color = color_spec_option(key, value)?,
                "milestone_color" => config.milestone_color = color_option(key, value, config.milestone_color),
                "background_color" => {
                    config.background_color = color_option(key, value, config.background_color)
                }
                "grid_color" => config.grid_color = color_option(key, value, config.grid_color),
                "text_color" => config.text_color = color_option(key, value, config.text_color),
                "tick_interval" => config.tick_interval = int_option(key, value)?,
                "font" => config.font = string_option(key, value)?,
                "font_size" => config.font_size = int_option(key, value)?,
                "output_format" => {
                    let raw = string_option(key, value)?;
                    config.output_format = OutputFormat::parse(&raw)
                        .ok_or_else(|| invalid(key, value, "expected 'png' or 'svg'"))?;
                }
                "label_width" => config.label_width = int_option(key, value)?,
                "padding" => config.padding = int_option(key, value)?,
                "milestone_line_width" => {
                    let (min, max) = MILESTONE_LINE_WIDTH_RANGE;
                    config.milestone_line_width = float_option(key, value, min, max)?
                }
                "package_prefix" => config.package_prefix = string_option(key, value)?,
                "phase_prefix" => config.phase_prefix = string_option(key, value)?,
                "milestone_prefix" => config.milestone_prefix = string_option(key, value)?,
                "x_label" => config.x_label = string_option(key, value)?,
                "empty_span" => config.empty_span = int_option(key, value)?,
                "filter_milestones" => {
                    config.filter_milestones = value
                        .as_bool()
                        .ok_or_else(|| invalid(key, value, "expected true or false"))?
                }
                _ => match strictness {
                    Strictness::Strict => return Err(ConfigError::UnknownOption(key.clone())),
                    Strictness::Lenient => {
                        tracing::warn!(option = %key, "unrecognized style option is ignored")
                    }
                },
            }
        }

        Ok(config)
    }

    /// Re-check ranges, for configurations assembled through the setters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let integers = [
            ("figure_size", self.figure_size),
            ("row_height", self.row_height),
            ("band_height", self.band_height),
            ("tick_interval", self.tick_interval),
            ("font_size", self.font_size),
            ("label_width", self.label_width),
            ("padding", self.padding),
            ("empty_span", self.empty_span),
        ];
        for (option, value) in integers {
            let (min, max) = int_bounds(option);
            if !(min..=max).contains(&value) {
                return Err(out_of_range(option, value.to_string(), min, max));
            }
        }
        if let Some(ratio) = self.figure_ratio {
            let (min, max) = FIGURE_RATIO_RANGE;
            check_float("figure_ratio", ratio, min, max)?;
        }
        let (min, max) = MILESTONE_LINE_WIDTH_RANGE;
        check_float("milestone_line_width", self.milestone_line_width, min, max)
    }

    /// Color of a package in the given phase
    pub fn package_color_for(&self, phase: Option<u32>) -> Color {
        self.package_color.lookup(phase).unwrap_or(DEFAULT_PACKAGE_COLOR)
    }

    /// Color of a phase band: configured, or a paler version of its package color.
    ///
    /// A package color that cannot get paler (white) yields a darker tint
    /// instead, so a derived band never matches its packages.
    pub fn band_color_for(&self, phase: u32) -> Color {
        if let Some(color) = self.band_color.as_ref().and_then(|spec| spec.lookup(Some(phase))) {
            return color;
        }
        let package = self.package_color_for(Some(phase));
        let band = package.desaturate(BAND_SATURATION);
        if band == package {
            package.shade(BAND_SHADE)
        } else {
            band
        }
    }

    pub fn figure_size(mut self, width: u32) -> Self {
        self.figure_size = width;
        self
    }

    pub fn figure_ratio(mut self, ratio: f64) -> Self {
        self.figure_ratio = Some(ratio);
        self
    }

    pub fn row_height(mut self, height: u32) -> Self {
        self.row_height = height;
        self
    }

    pub fn band_height(mut self, height: u32) -> Self {
        self.band_height = height;
        self
    }

    pub fn tick_interval(mut self, months: u32) -> Self {
        self.tick_interval = months;
        self
    }

    pub fn package_color(mut self, spec: ColorSpec) -> Self {
        self.package_color = spec;
        self
    }

    pub fn band_color(mut self, spec: ColorSpec) -> Self {
        self.band_color = Some(spec);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn filter_milestones(mut self, enabled: bool) -> Self {
        self.filter_milestones = enabled;
        self
    }
}

fn invalid(option: &str, value: &Value, reason: &str) -> ConfigError {
    ConfigError::InvalidOption {
        option: option.into(),
        value: display_value(value),
        reason: reason.into(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn out_of_range(
    option: &str,
    value: String,
    min: impl fmt::Display,
    max: impl fmt::Display,
) -> ConfigError {
    ConfigError::InvalidOption {
        option: option.into(),
        value,
        reason: format!("must be between {} and {}", min, max),
    }
}

fn check_float(option: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(out_of_range(option, value.to_string(), min, max))
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn int_option(option: &str, value: &Value) -> Result<u32, ConfigError> {
    let n = number(value)
        .filter(|n| n.fract() == 0.0)
        .ok_or_else(|| invalid(option, value, "expected an integer"))?;
    let (min, max) = int_bounds(option);
    if n < f64::from(min) || n > f64::from(max) {
        return Err(out_of_range(option, display_value(value), min, max));
    }
    Ok(n as u32)
}

fn float_option(option: &str, value: &Value, min: f64, max: f64) -> Result<f64, ConfigError> {
    let n = number(value).ok_or_else(|| invalid(option, value, "expected a number"))?;
    if !(n.is_finite() && (min..=max).contains(&n)) {
        return Err(out_of_range(option, display_value(value), min, max));
    }
    Ok(n)
}

fn string_option(option: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(invalid(option, value, "expected text")),
    }
}

/// Unrecognized colors keep the previous value, mirroring how users
/// iterate on configuration files.
fn color_option(option: &str, value: &Value, current: Color) -> Color {
    match value.as_str().and_then(Color::parse) {
        Some(color) => color,
        None => {
            tracing::warn!(
                option,
                value = %display_value(value),
                fallback = %current,
                "color does not exist; keeping the previous color"
            );
            current
        }
    }
}

/// `None` when a single color is given but not recognized
fn color_spec_option(option: &str, value: &Value) -> Result<Option<ColorSpec>, ConfigError> {
    let Value::Object(entries) = value else {
        let parsed = value.as_str().and_then(Color::parse);
        if parsed.is_none() {
            tracing::warn!(
                option,
                value = %display_value(value),
                "color does not exist; keeping the default color"
            );
        }
        return Ok(parsed.map(ColorSpec::Uniform));
    };

    let mut colors = BTreeMap::new();
    for (phase, color) in entries {
        let phase_number = phase
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| invalid(option, value, "per-phase keys must be positive phase numbers"))?;
        match color.as_str().and_then(Color::parse) {
            Some(parsed) => {
                colors.insert(phase_number, parsed);
            }
            None => tracing::warn!(
                option,
                phase = phase_number,
                value = %display_value(color),
                "color does not exist; phase keeps the default color"
            ),
        }
    }
    Ok(Some(ColorSpec::PerPhase(colors)))
}
