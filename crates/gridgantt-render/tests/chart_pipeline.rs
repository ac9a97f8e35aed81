//! End-to-end tests: records and configuration in, chart image out

use gridgantt_core::{
    Cell, Error, Milestone, RecordSet, RenderError, Renderer, ScheduleModel, ValidationError,
    WorkPackage,
};
use gridgantt_render::{
    render_records, ColumnSpan, RasterGanttRenderer, RowKind, StyleConfig, Strictness, EMPTY,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

fn records(rows: &[(&str, &str, &str)]) -> RecordSet {
    let mut set = RecordSet::new(["start", "duration", "phase_number"]);
    for (start, duration, phase) in rows {
        set.push_row([
            ("start", Cell::text(*start)),
            ("duration", Cell::text(*duration)),
            ("phase_number", Cell::text(*phase)),
        ]);
    }
    set
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("gridgantt_core=debug,gridgantt_render=debug"))
        .with_test_writer()
        .try_init();
}

fn config(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("configuration must be an object"),
    }
}

#[test]
fn three_packages_two_phases() {
    let input = records(&[("0", "3", "1"), ("2", "4", "1"), ("6", "2", "2")]);
    let model = gridgantt_core::validate_records(&input).unwrap();
    let renderer = RasterGanttRenderer::default();
    let layout = renderer.layout(&model).unwrap();

    let bands: Vec<_> = layout
        .rows
        .iter()
        .filter(|r| r.is_band())
        .map(|r| r.span)
        .collect();
    assert_eq!(bands, vec![ColumnSpan::new(0, 6), ColumnSpan::new(6, 8)]);

    assert_eq!(
        layout.rows.iter().map(|r| r.kind.clone()).collect::<Vec<_>>(),
        vec![
            RowKind::PhaseBand { phase_number: 1 },
            RowKind::Package { package: 0, phase_number: Some(1) },
            RowKind::Package { package: 1, phase_number: Some(1) },
            RowKind::PhaseBand { phase_number: 2 },
            RowKind::Package { package: 2, phase_number: Some(2) },
        ]
    );

    let chart = renderer.render(&model).unwrap();
    let grid = chart.grid();
    assert_eq!(grid.rows(), 5);
    assert_eq!(grid.columns(), 8);
    // second package occupies months 2..6 only
    let painted: Vec<bool> = grid.row(2).iter().map(|c| *c != EMPTY).collect();
    assert_eq!(painted, vec![false, false, true, true, true, true, false, false]);
}

#[test]
fn phase_order_is_deterministic() {
    let input = records(&[("5", "1", "2"), ("1", "1", "1"), ("2", "1", "2"), ("0", "1", "1")]);
    let model = gridgantt_core::validate_records(&input).unwrap();
    let layout = RasterGanttRenderer::default().layout(&model).unwrap();

    let package_rows: Vec<(Option<u32>, i64)> = layout
        .rows
        .iter()
        .filter_map(|r| match r.kind {
            RowKind::Package { package, phase_number } => {
                Some((phase_number, model.packages()[package].start()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        package_rows,
        vec![(Some(1), 0), (Some(1), 1), (Some(2), 2), (Some(2), 5)]
    );
}

#[test]
fn rendering_is_idempotent() {
    let model = ScheduleModel::from_packages(vec![
        WorkPackage::new(0, 3).unwrap().phase(1),
        WorkPackage::new(3, 5).unwrap().phase(2),
        WorkPackage::new(1, 1).unwrap(),
    ])
    .with_milestone_months([4, 4, 8]);
    let renderer = RasterGanttRenderer::default();

    let first = renderer.render(&model).unwrap();
    let second = renderer.render(&model).unwrap();
    assert_eq!(first.grid(), second.grid());
    assert_eq!(first.raster().as_raw(), second.raster().as_raw());
    assert_eq!(first.to_svg_string().unwrap(), second.to_svg_string().unwrap());
}

#[test]
fn empty_model_renders_valid_image() {
    init_tracing();
    let chart = RasterGanttRenderer::default().render(&ScheduleModel::new()).unwrap();

    assert_eq!(chart.grid().rows(), 1);
    assert_eq!(chart.grid().columns(), 12);
    assert!(chart.grid().row(0).iter().all(|c| *c == EMPTY));
    let (width, height) = chart.raster().dimensions();
    assert!(width > 0 && height > 0);
    assert!(chart.to_svg_string().unwrap().contains("<image"));
}

#[test]
fn milestone_placed_proportionally() {
    for packages in [1, 5] {
        let model = ScheduleModel::from_packages(
            (0..packages).map(|_| WorkPackage::new(0, 12).unwrap()).collect(),
        )
        .with_milestones([Milestone::new(6)]);
        let renderer = RasterGanttRenderer::new(StyleConfig::default().figure_size(1200));
        let layout = renderer.layout(&model).unwrap();
        let chart = renderer.render(&model).unwrap();

        let marker = &layout.markers()[0];
        assert_eq!(layout.axis.fraction_of(marker.month), 0.5);
        let x = chart.geometry().column_x(marker.column);
        assert_eq!(x * 2, chart.geometry().plot_width);
    }
}

#[test]
fn missing_duration_column_is_fatal() {
    let mut input = RecordSet::new(["start", "phase_number"]);
    input.push_row([("start", Cell::text("not even looked at"))]);

    let err = render_records(&input, Vec::new(), &Map::new(), Strictness::Lenient).unwrap_err();
    match err {
        Error::Validation(ValidationError::MissingColumn(column)) => assert_eq!(column, "duration"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_start_rows_do_not_render() {
    init_tracing();
    let input = records(&[("0", "2", ""), ("", "3", ""), ("1", "1", "")]);
    let chart = render_records(&input, Vec::new(), &Map::new(), Strictness::Lenient).unwrap();
    assert_eq!(chart.grid().rows(), 2);
}

#[test]
fn configured_colors_reach_the_raster() {
    let input = records(&[("0", "2", "1"), ("2", "2", "2")]);
    let style = config(json!({
        "package_color": {"1": "#ff0000", "2": "#0000ff"},
        "band_color": "#cccccc",
        "output_format": "png",
    }));
    let chart = render_records(&input, Vec::new(), &style, Strictness::Strict).unwrap();
    let grid = chart.grid();

    let hex = |row: usize, column: usize| grid.color_at(row, column).to_hex();
    assert_eq!(hex(0, 0), "#cccccc");
    assert_eq!(hex(1, 0), "#ff0000");
    assert_eq!(hex(3, 2), "#0000ff");
    assert!(chart.encode().unwrap().starts_with(b"\x89PNG"));
}

#[test]
fn lenient_config_tolerates_unknown_options_and_filters_milestones() {
    init_tracing();
    let input = records(&[("0", "4", "1"), ("4", "4", "1")]);
    let style = config(json!({
        "figure_width": 800,
        "milestone_color": "not-a-color",
        "filter_milestones": true,
    }));
    let milestones = vec![Milestone::new(-1), Milestone::new(5), Milestone::new(30)];

    let chart = render_records(&input, milestones, &style, Strictness::Lenient).unwrap();
    assert_eq!(chart.grid().columns(), 8);
    assert_eq!(chart.marker_columns(), &[5]);
    assert_eq!(chart.milestone_color().to_hex(), "#8b0000");
}

#[test]
fn invalid_tick_interval_is_a_configuration_error() {
    let input = records(&[("0", "2", "1")]);
    let style = config(json!({"tick_interval": -2}));
    let err = render_records(&input, Vec::new(), &style, Strictness::Lenient).unwrap_err();
    assert!(matches!(err, Error::Render(_)));
}

#[test]
fn month_overflow_is_a_validation_error() {
    let input = records(&[("9223372036854775807", "1", ""), ("5000000000", "2", "")]);
    let err = render_records(&input, Vec::new(), &Map::new(), Strictness::Lenient).unwrap_err();
    match err {
        Error::Validation(ValidationError::InvalidValues(values)) => {
            let rows: Vec<_> = values.iter().map(|v| (v.row, v.column.clone())).collect();
            assert_eq!(rows, vec![(Some(1), "start".to_string()), (Some(2), "start".to_string())]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn largest_accepted_schedule_renders() {
    let input = records(&[("12000", "12000", "1")]);
    let chart = render_records(&input, Vec::new(), &Map::new(), Strictness::Lenient).unwrap();
    assert_eq!(chart.grid().columns(), 12_000);
    assert_eq!(chart.geometry().plot_width, 12_000);
}

#[test]
fn unbounded_milestone_is_invalid_data() {
    let model = ScheduleModel::from_packages(vec![WorkPackage::new(0, 4).unwrap()])
        .with_milestone_months([i64::MIN, i64::MAX]);
    let err = RasterGanttRenderer::default().render(&model).unwrap_err();
    assert!(matches!(err, RenderError::InvalidData(_)));

    let filtered = RasterGanttRenderer::new(StyleConfig::default().filter_milestones(true));
    assert_eq!(filtered.render(&model).unwrap().grid().columns(), 4);
}

#[test]
fn extreme_style_values_are_configuration_errors() {
    let input = records(&[("0", "2", "1"), ("2", "2", "2")]);
    for style in [
        json!({"font_size": 3_000_000_000u64}),
        json!({"padding": 4_000_000_000u64, "label_width": 4_000_000_000u64}),
        json!({"figure_ratio": 1e-7, "figure_size": 100}),
        json!({"milestone_line_width": 1e12}),
    ] {
        let err = render_records(&input, Vec::new(), &config(style.clone()), Strictness::Strict)
            .unwrap_err();
        assert!(
            matches!(err, Error::Render(RenderError::Config(_))),
            "{style} gave {err}"
        );
    }
}

#[test]
fn setter_built_extremes_fail_without_panicking() {
    let model = ScheduleModel::from_packages(vec![WorkPackage::new(0, 3).unwrap().phase(1)]);
    let styles = [
        StyleConfig { font_size: u32::MAX, ..StyleConfig::default() },
        StyleConfig { padding: u32::MAX, label_width: u32::MAX, ..StyleConfig::default() },
        StyleConfig::default().figure_size(100).figure_ratio(1e-7),
    ];
    for style in styles {
        let result = RasterGanttRenderer::new(style).render(&model);
        assert!(matches!(result, Err(RenderError::Config(_))));
    }
}
