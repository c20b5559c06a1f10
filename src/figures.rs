use log::{debug, info};
use plotters::style::BLACK;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    error::{FigureError, Result},
    parse::{read_samples, Table},
    phases::{Column, Phase, PhaseTimings, ROUND_PHASES},
    plot::{self, CategoricalChart, CdfChart, Chart, Layer, Secondary, SecondaryLine, YScale},
    series,
};

/// False positive rate the report's Bloom filters are sized for.
pub const DEFAULT_FP_RATE: f64 = 0.01;

const LEAF_COUNTS: [&str; 6] = ["64", "128", "256", "512", "1024", "2048"];
const HOST_COUNTS: [&str; 4] = ["7", "16", "32", "64"];
const HOST_EVOLUTION_COUNTS: [&str; 5] = ["3", "5", "10", "15", "20"];
const WEBPAGES: usize = 7;

const GROUPED_WIDTH: f64 = 0.15;
const STACKED_WIDTH: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Figure {
    LeavesCdf,
    Bloom,
    BloomEvolution,
    Hosts,
    HostsEvolution,
    Leaves,
    Real,
}

pub const ALL_FIGURES: [Figure; 7] = [
    Figure::LeavesCdf,
    Figure::Bloom,
    Figure::BloomEvolution,
    Figure::Hosts,
    Figure::HostsEvolution,
    Figure::Leaves,
    Figure::Real,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Whitespace separated numbers.
    Samples,
    /// Benchmark CSV with per-phase timing columns.
    Table,
    None,
}

impl Figure {
    pub fn name(self) -> &'static str {
        match self {
            Figure::LeavesCdf => "leaves-cdf",
            Figure::Bloom => "bloom",
            Figure::BloomEvolution => "bloom-evolution",
            Figure::Hosts => "hosts",
            Figure::HostsEvolution => "hosts-evolution",
            Figure::Leaves => "leaves",
            Figure::Real => "real",
        }
    }

    pub fn output_name(self) -> String {
        format!("{}.svg", self.name().replace('-', "_"))
    }

    pub fn input(self) -> InputKind {
        match self {
            Figure::LeavesCdf => InputKind::Samples,
            Figure::Bloom => InputKind::None,
            _ => InputKind::Table,
        }
    }

    pub fn phases(self) -> Vec<Phase> {
        match self {
            Figure::Hosts => {
                let mut phases = ROUND_PHASES.to_vec();
                phases.push(Phase::CompleteRound);
                phases
            }
            Figure::Real => {
                let mut phases = ROUND_PHASES.to_vec();
                phases.push(Phase::AdditionalData);
                phases
            }
            Figure::BloomEvolution | Figure::HostsEvolution | Figure::Leaves => ROUND_PHASES.to_vec(),
            Figure::LeavesCdf | Figure::Bloom => Vec::new(),
        }
    }

    pub fn default_ticks(self) -> Vec<String> {
        match self {
            Figure::Hosts => HOST_COUNTS.iter().map(|s| s.to_string()).collect(),
            Figure::HostsEvolution => HOST_EVOLUTION_COUNTS.iter().map(|s| s.to_string()).collect(),
            Figure::Real => (1..=WEBPAGES).map(|i| i.to_string()).collect(),
            Figure::LeavesCdf => Vec::new(),
            Figure::Bloom | Figure::BloomEvolution | Figure::Leaves => {
                LEAF_COUNTS.iter().map(|s| s.to_string()).collect()
            }
        }
    }
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Figure {
    type Err = FigureError;

    fn from_str(s: &str) -> Result<Figure> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        ALL_FIGURES
            .iter()
            .copied()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| FigureError::UnknownFigure(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub ticks: Option<Vec<String>>,
    pub column: Column,
    pub fp_rate: f64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            ticks: None,
            column: Column::default(),
            fp_rate: DEFAULT_FP_RATE,
        }
    }
}

/// Loads the input of `figure` and builds its chart.
pub fn build(figure: Figure, input: Option<&Path>, options: &Options) -> Result<Chart> {
    let _guard = flame::start_guard("build");
    let ticks = options
        .ticks
        .clone()
        .unwrap_or_else(|| figure.default_ticks());

    let chart = match figure.input() {
        InputKind::None => bloom(&ticks, options.fp_rate)?,
        InputKind::Samples => {
            let path = input.ok_or(FigureError::MissingInput(figure.name()))?;
            leaves_cdf(&read_samples(path)?)?
        }
        InputKind::Table => {
            let path = input.ok_or(FigureError::MissingInput(figure.name()))?;
            let table = Table::from_path(path)?;
            let timings = PhaseTimings::load(&table, &figure.phases(), options.column)?;
            from_timings(figure, &timings, &ticks, options.fp_rate)?
        }
    };
    debug!("built {}", figure);
    Ok(chart)
}

/// Builds the chart and writes it to `output`.
pub fn generate(
    figure: Figure,
    input: Option<&Path>,
    output: &Path,
    options: &Options,
    size: (u32, u32),
) -> Result<PathBuf> {
    let chart = build(figure, input, options)?;
    let written = plot::render(&chart, output, size)?;
    info!("{} -> {}", figure, written.display());
    Ok(written)
}

pub fn from_timings(
    figure: Figure,
    timings: &PhaseTimings,
    ticks: &[String],
    fp_rate: f64,
) -> Result<Chart> {
    match figure {
        Figure::BloomEvolution => bloom_evolution(timings, ticks, fp_rate),
        Figure::Hosts => hosts(timings, ticks),
        Figure::HostsEvolution => hosts_evolution(timings, ticks),
        Figure::Leaves => leaves(timings, ticks),
        Figure::Real => real(timings, ticks),
        Figure::LeavesCdf | Figure::Bloom => Err(FigureError::MissingInput(figure.name())),
    }
}

pub fn leaves_cdf(samples: &[f64]) -> Result<Chart> {
    Ok(Chart::Cdf(CdfChart {
        x_desc: "Number of unique leaves".to_string(),
        y_desc: "Cumulative probability".to_string(),
        points: series::cdf(samples)?,
        x_guides: vec![512.0, 1000.0, 2000.0, 3000.0, 4000.0, 5000.0],
        y_guides: vec![0.2, 0.4, 0.6, 0.8, 0.96, 1.0],
    }))
}

fn bloom_sizes(ticks: &[String], fp_rate: f64) -> Result<Vec<f64>> {
    ticks
        .iter()
        .map(|t| -> Result<f64> {
            let n = t
                .trim()
                .parse::<u64>()
                .map_err(|_| FigureError::BadTick(t.clone()))?;
            Ok(series::bloom_filter_bits(n, fp_rate)? as f64)
        })
        .collect()
}

pub fn bloom(ticks: &[String], fp_rate: f64) -> Result<Chart> {
    Ok(Chart::Categorical(CategoricalChart {
        x_desc: "Number of leaves".to_string(),
        y_desc: "Bloom filter size".to_string(),
        ticks: ticks.to_vec(),
        y_scale: YScale::Log,
        bar_width: GROUPED_WIDTH,
        layers: vec![Layer::Line {
            label: Some("Bloom filter size".to_string()),
            color: BLACK,
            values: bloom_sizes(ticks, fp_rate)?,
            markers: false,
        }],
        secondary: None,
    }))
}

fn phase_lines(timings: &PhaseTimings, phases: &[Phase]) -> Result<Vec<Layer>> {
    phases
        .iter()
        .zip(plot::PALETTE.iter())
        .map(|(&phase, &color)| {
            Ok(Layer::Line {
                label: Some(phase.label().to_string()),
                color,
                values: timings.get(phase)?.to_vec(),
                markers: false,
            })
        })
        .collect()
}

fn phase_bars(timings: &PhaseTimings, phases: &[Phase]) -> Result<Vec<Layer>> {
    phases
        .iter()
        .zip(plot::PALETTE.iter())
        .map(|(&phase, &color)| {
            Ok(Layer::Bars {
                label: phase.label().to_string(),
                color,
                values: timings.get(phase)?.to_vec(),
                base: None,
            })
        })
        .collect()
}

pub fn bloom_evolution(timings: &PhaseTimings, ticks: &[String], fp_rate: f64) -> Result<Chart> {
    timings.expect_rows(ticks.len())?;
    Ok(Chart::Categorical(CategoricalChart {
        x_desc: "Number of leaves".to_string(),
        y_desc: "Time [s]".to_string(),
        ticks: ticks.to_vec(),
        y_scale: YScale::Log,
        bar_width: GROUPED_WIDTH,
        layers: phase_lines(timings, &ROUND_PHASES)?,
        secondary: Some(Secondary {
            y_desc: "Bloom filter size".to_string(),
            lines: vec![SecondaryLine {
                label: "Bloom filter size".to_string(),
                color: BLACK,
                values: bloom_sizes(ticks, fp_rate)?,
            }],
        }),
    }))
}

pub fn hosts(timings: &PhaseTimings, ticks: &[String]) -> Result<Chart> {
    timings.expect_rows(ticks.len())?;
    let complete = timings.get(Phase::CompleteRound)?.to_vec();

    let mut layers = phase_bars(timings, &ROUND_PHASES)?;
    layers.push(Layer::Line {
        label: Some(Phase::CompleteRound.label().to_string()),
        color: BLACK,
        values: complete.clone(),
        markers: true,
    });
    layers.push(Layer::Annotations { values: complete });

    Ok(Chart::Categorical(CategoricalChart {
        x_desc: "Number of hosts".to_string(),
        y_desc: "Time [s]".to_string(),
        ticks: ticks.to_vec(),
        y_scale: YScale::Log,
        bar_width: GROUPED_WIDTH,
        layers,
        secondary: None,
    }))
}

pub fn hosts_evolution(timings: &PhaseTimings, ticks: &[String]) -> Result<Chart> {
    timings.expect_rows(ticks.len())?;
    let mut layers = phase_lines(timings, &ROUND_PHASES)?;
    layers.push(Layer::Line {
        label: Some("Total".to_string()),
        color: plot::PALETTE[4],
        values: timings.total(&ROUND_PHASES)?,
        markers: false,
    });

    Ok(Chart::Categorical(CategoricalChart {
        x_desc: "Number of hosts".to_string(),
        y_desc: "Time [s]".to_string(),
        ticks: ticks.to_vec(),
        y_scale: YScale::Log,
        bar_width: GROUPED_WIDTH,
        layers,
        secondary: None,
    }))
}

pub fn leaves(timings: &PhaseTimings, ticks: &[String]) -> Result<Chart> {
    timings.expect_rows(ticks.len())?;
    let columns = ROUND_PHASES
        .iter()
        .map(|&p| timings.get(p))
        .collect::<Result<Vec<_>>>()?;
    let bases = series::cumulative(&columns);

    let mut layers: Vec<Layer> = ROUND_PHASES
        .iter()
        .zip(columns.iter())
        .zip(bases)
        .zip(plot::STACK_PALETTE.iter())
        .map(|(((phase, values), base), &color)| Layer::Bars {
            label: phase.label().to_string(),
            color,
            values: values.to_vec(),
            base: Some(base),
        })
        .collect();
    layers.push(Layer::Line {
        label: None,
        color: BLACK,
        values: series::sum(&columns),
        markers: true,
    });

    Ok(Chart::Categorical(CategoricalChart {
        x_desc: "Number of leaves".to_string(),
        y_desc: "Time [s]".to_string(),
        ticks: ticks.to_vec(),
        y_scale: YScale::Linear,
        bar_width: STACKED_WIDTH,
        layers,
        secondary: None,
    }))
}

pub fn real(timings: &PhaseTimings, ticks: &[String]) -> Result<Chart> {
    timings.expect_rows(ticks.len())?;
    let minutes = timings.in_minutes();
    let mut phases = ROUND_PHASES.to_vec();
    phases.push(Phase::AdditionalData);

    let total = minutes.total(&phases)?;
    let mean = series::mean(&total).ok_or(FigureError::Empty)?;
    debug!("real: mean round {:.2} min", mean);

    let mut layers = phase_bars(&minutes, &phases)?;
    layers.push(Layer::HLine {
        label: "Mean".to_string(),
        color: plot::PALETTE[5],
        value: mean,
    });

    Ok(Chart::Categorical(CategoricalChart {
        x_desc: "Webpage ID".to_string(),
        y_desc: "Time [m]".to_string(),
        ticks: ticks.to_vec(),
        y_scale: YScale::Log,
        bar_width: GROUPED_WIDTH,
        layers,
        secondary: None,
    }))
}

#[cfg(test)]
fn timings(rows: usize, phases: &[Phase]) -> PhaseTimings {
    PhaseTimings::from_columns(
        phases
            .iter()
            .enumerate()
            .map(|(p, &phase)| (phase, (0..rows).map(|r| ((p + 1) * (r + 1)) as f64 * 6.0).collect()))
            .collect(),
    )
}

#[cfg(test)]
fn categorical(chart: Chart) -> CategoricalChart {
    match chart {
        Chart::Categorical(chart) => chart,
        Chart::Cdf(_) => panic!("expected a categorical chart"),
    }
}

#[test]
fn figure_names_round_trip() {
    for figure in ALL_FIGURES {
        assert_eq!(figure.name().parse::<Figure>().unwrap(), figure);
    }
    assert_eq!("leaves_cdf".parse::<Figure>().unwrap(), Figure::LeavesCdf);
    assert_eq!("Hosts".parse::<Figure>().unwrap(), Figure::Hosts);
    assert!(matches!("pie".parse::<Figure>(), Err(FigureError::UnknownFigure(_))));
}

#[test]
fn output_names() {
    assert_eq!(Figure::LeavesCdf.output_name(), "leaves_cdf.svg");
    assert_eq!(Figure::HostsEvolution.output_name(), "hosts_evolution.svg");
    assert_eq!(Figure::Real.output_name(), "real.svg");
}

#[test]
fn bloom_plots_filter_sizes() {
    let chart = categorical(bloom(&Figure::Bloom.default_ticks(), DEFAULT_FP_RATE).unwrap());
    match &chart.layers[0] {
        Layer::Line { values, .. } => {
            assert_eq!(values, &vec![614.0, 1227.0, 2454.0, 4908.0, 9816.0, 19631.0])
        }
        other => panic!("unexpected layer {:?}", other),
    }
}

#[test]
fn bloom_rejects_non_numeric_ticks() {
    let ticks = vec!["64".to_string(), "many".to_string()];
    assert!(matches!(bloom(&ticks, DEFAULT_FP_RATE), Err(FigureError::BadTick(t)) if t == "many"));
}

#[test]
fn hosts_evolution_total_sums_every_phase() {
    let timings = timings(5, &ROUND_PHASES);
    let chart = categorical(hosts_evolution(&timings, &Figure::HostsEvolution.default_ticks()).unwrap());
    assert_eq!(chart.layers.len(), 5);
    match chart.layers.last() {
        Some(Layer::Line { label, values, .. }) => {
            assert_eq!(label.as_deref(), Some("Total"));
            // (1 + 2 + 3 + 4) * 6 on the first row
            assert_eq!(values[0], 60.0);
            assert_eq!(values[4], 300.0);
        }
        other => panic!("unexpected layer {:?}", other),
    }
}

#[test]
fn leaves_stack_in_phase_order() {
    let timings = timings(6, &ROUND_PHASES);
    let chart = categorical(leaves(&timings, &Figure::Leaves.default_ticks()).unwrap());
    assert_eq!(chart.y_scale, YScale::Linear);
    let bases: Vec<f64> = chart
        .layers
        .iter()
        .filter_map(|l| match l {
            Layer::Bars { base: Some(base), .. } => Some(base[0]),
            _ => None,
        })
        .collect();
    assert_eq!(bases, vec![0.0, 6.0, 18.0, 36.0]);
}

#[test]
fn real_converts_to_minutes_and_adds_mean() {
    let mut phases = ROUND_PHASES.to_vec();
    phases.push(Phase::AdditionalData);
    let timings = timings(7, &phases);
    let chart = categorical(real(&timings, &Figure::Real.default_ticks()).unwrap());

    match &chart.layers[0] {
        Layer::Bars { label, values, .. } => {
            assert_eq!(label, "Consensus structured");
            assert!((values[0] - 0.1).abs() < 1e-12);
        }
        other => panic!("unexpected layer {:?}", other),
    }
    match chart.layers.last() {
        // rows sum to (1+2+3+4+5) * 6 * r seconds, r = 1..=7, mean r = 4
        Some(Layer::HLine { value, .. }) => assert!((value - 6.0).abs() < 1e-9),
        other => panic!("unexpected layer {:?}", other),
    }
}

#[test]
fn hosts_annotate_the_total() {
    let mut phases = ROUND_PHASES.to_vec();
    phases.push(Phase::CompleteRound);
    let timings = timings(4, &phases);
    let chart = categorical(hosts(&timings, &Figure::Hosts.default_ticks()).unwrap());
    assert!(matches!(chart.layers.last(), Some(Layer::Annotations { values }) if values[0] == 30.0));
    match &chart.layers[4] {
        Layer::Line { label, markers, values, .. } => {
            assert_eq!(label.as_deref(), Some("Total"));
            assert!(*markers);
            assert_eq!(values, &vec![30.0, 60.0, 90.0, 120.0]);
        }
        other => panic!("unexpected layer {:?}", other),
    }
}

#[test]
fn bloom_evolution_puts_filter_sizes_on_second_axis() {
    let timings = timings(6, &ROUND_PHASES);
    let chart = categorical(
        bloom_evolution(&timings, &Figure::BloomEvolution.default_ticks(), DEFAULT_FP_RATE).unwrap(),
    );
    assert_eq!(chart.y_scale, YScale::Log);

    let labels: Vec<&str> = chart
        .layers
        .iter()
        .filter_map(|l| match l {
            Layer::Line { label, .. } => label.as_deref(),
            _ => None,
        })
        .collect();
    assert_eq!(labels, vec!["Consensus structured", "Decrypt", "Reconstruct", "Signature"]);

    let secondary = chart.secondary.expect("bloom evolution has a second axis");
    assert_eq!(secondary.lines.len(), 1);
    assert_eq!(
        secondary.lines[0].values,
        vec![614.0, 1227.0, 2454.0, 4908.0, 9816.0, 19631.0]
    );
}

#[test]
fn leaves_cdf_has_guides() {
    let chart = match leaves_cdf(&[900.0, 12.0, 4100.0, 512.0]).unwrap() {
        Chart::Cdf(chart) => chart,
        Chart::Categorical(_) => panic!("expected a cdf chart"),
    };
    assert_eq!(chart.x_guides, vec![512.0, 1000.0, 2000.0, 3000.0, 4000.0, 5000.0]);
    assert_eq!(chart.y_guides, vec![0.2, 0.4, 0.6, 0.8, 0.96, 1.0]);
    assert_eq!(chart.points[0], (12.0, 0.0));
    assert_eq!(chart.points[3], (4100.0, 0.75));
}

#[test]
fn bloom_rejects_rate_outside_unit_interval() {
    let ticks = Figure::Bloom.default_ticks();
    for rate in [0.0, 1.0, 2.0, -0.5] {
        assert!(matches!(bloom(&ticks, rate), Err(FigureError::BadFpRate(_))));
    }

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bloom.svg");
    let options = Options {
        fp_rate: 2.0,
        ..Options::default()
    };
    assert!(matches!(
        generate(Figure::Bloom, None, &output, &options, plot::DEFAULT_SIZE),
        Err(FigureError::BadFpRate(_))
    ));
    assert!(!output.exists());
}

#[test]
fn row_count_mismatch_fails() {
    let timings = timings(3, &ROUND_PHASES);
    assert!(matches!(
        leaves(&timings, &Figure::Leaves.default_ticks()),
        Err(FigureError::RowCount { expected: 6, found: 3 })
    ));
}

#[test]
fn every_figure_renders_svg() {
    let dir = tempfile::tempdir().unwrap();
    let samples = dir.path().join("leaves_cdf.txt");
    std::fs::write(&samples, "12\n512\n900\n4100\n").unwrap();

    let csv = dir.path().join("timings.csv");
    let mut body = String::from(
        "hosts,consensus_structured_wall_avg,decrypt_wall_avg,reconstruct_wall_avg,sign_wall_avg,additional_data_wall_avg,Complete round_wall_avg\n",
    );
    for row in 1..=4 {
        let r = row as f64;
        body.push_str(&format!("{},{},{},{},{},{},{}\n", row, r, 2.0 * r, 3.0 * r, 4.0 * r, 5.0 * r, 11.0 * r));
    }
    std::fs::write(&csv, body).unwrap();

    let options = Options {
        ticks: Some(vec!["64".into(), "128".into(), "256".into(), "512".into()]),
        ..Options::default()
    };
    for figure in ALL_FIGURES {
        let input = match figure.input() {
            InputKind::Samples => Some(samples.as_path()),
            InputKind::Table => Some(csv.as_path()),
            InputKind::None => None,
        };
        let output = dir.path().join("out").join(figure.output_name());
        let written = generate(figure, input, &output, &options, plot::DEFAULT_SIZE).unwrap();
        assert_eq!(written, output);
        let svg = std::fs::read_to_string(&written).unwrap();
        assert!(svg.contains("<svg"), "{} is not an svg", figure);
    }
}

#[test]
fn table_figure_without_input_fails() {
    assert!(matches!(
        build(Figure::Hosts, None, &Options::default()),
        Err(FigureError::MissingInput("hosts"))
    ));
}
