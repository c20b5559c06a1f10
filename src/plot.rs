use log::info;
use plotters::{
    coord::{types::RangedCoordf64, CoordTranslate, Shift},
    prelude::*,
    series::DashedLineSeries,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::{FigureError, Result},
    series,
};

pub const DEFAULT_SIZE: (u32, u32) = (640, 480);

const FONT: &str = "sans-serif";
const FONT_SIZE: u32 = 16;

pub const PALETTE: [RGBColor; 6] = [
    RGBColor(0x4D, 0x4D, 0x4D),
    RGBColor(0x5D, 0xA5, 0xDA),
    RGBColor(0xFA, 0xA4, 0x3A),
    RGBColor(0x60, 0xBD, 0x68),
    RGBColor(0xF1, 0x7C, 0xB0),
    RGBColor(0xB2, 0x91, 0x2F),
];

/// Orange, light blue, light green and red, bottom to top.
pub const STACK_PALETTE: [RGBColor; 4] = [
    RGBColor(0xFF, 0xA5, 0x00),
    RGBColor(0xAD, 0xD8, 0xE6),
    RGBColor(0x90, 0xEE, 0x90),
    RGBColor(0xFF, 0x00, 0x00),
];

const GUIDE: RGBColor = RGBColor(0xB0, 0xB0, 0xB0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YScale {
    Linear,
    Log,
}

/// Something drawn over the categories of a chart. Values are indexed by
/// category.
#[derive(Debug, Clone)]
pub enum Layer {
    Line {
        label: Option<String>,
        color: RGBColor,
        values: Vec<f64>,
        markers: bool,
    },
    /// Bars without a base are laid out side by side within a category;
    /// bars with a base are stacked on it.
    Bars {
        label: String,
        color: RGBColor,
        values: Vec<f64>,
        base: Option<Vec<f64>>,
    },
    /// Integer value printed just above each point.
    Annotations { values: Vec<f64> },
    HLine {
        label: String,
        color: RGBColor,
        value: f64,
    },
}

#[derive(Debug, Clone)]
pub struct SecondaryLine {
    pub label: String,
    pub color: RGBColor,
    pub values: Vec<f64>,
}

/// A log-scaled right-hand axis.
#[derive(Debug, Clone)]
pub struct Secondary {
    pub y_desc: String,
    pub lines: Vec<SecondaryLine>,
}

#[derive(Debug, Clone)]
pub struct CategoricalChart {
    pub x_desc: String,
    pub y_desc: String,
    pub ticks: Vec<String>,
    pub y_scale: YScale,
    pub bar_width: f64,
    pub layers: Vec<Layer>,
    pub secondary: Option<Secondary>,
}

#[derive(Debug, Clone)]
pub struct CdfChart {
    pub x_desc: String,
    pub y_desc: String,
    pub points: Vec<(f64, f64)>,
    pub x_guides: Vec<f64>,
    pub y_guides: Vec<f64>,
}

#[derive(Debug, Clone)]
pub enum Chart {
    Categorical(CategoricalChart),
    Cdf(CdfChart),
}

impl CategoricalChart {
    pub fn y_range(&self) -> (f64, f64) {
        let mut values = Vec::new();
        for layer in &self.layers {
            match layer {
                Layer::Line { values: v, .. } | Layer::Annotations { values: v } => {
                    values.extend_from_slice(v)
                }
                Layer::Bars {
                    values: v, base, ..
                } => match base {
                    Some(base) => values.extend(series::sum(&[v.as_slice(), base.as_slice()])),
                    None => values.extend_from_slice(v),
                },
                Layer::HLine { value, .. } => values.push(*value),
            }
        }

        match self.y_scale {
            YScale::Log => series::log_bounds(&values),
            YScale::Linear => {
                let max = values.iter().copied().fold(0.0, f64::max);
                (0.0, if max > 0.0 { max * 1.1 } else { 1.0 })
            }
        }
    }

    fn grouped_bars(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| matches!(l, Layer::Bars { base: None, .. }))
            .count()
    }
}

impl Secondary {
    pub fn y_range(&self) -> (f64, f64) {
        let values: Vec<f64> = self.lines.iter().flat_map(|l| l.values.iter().copied()).collect();
        series::log_bounds(&values)
    }
}

impl CdfChart {
    pub fn x_range(&self) -> (f64, f64) {
        let xs = self.points.iter().map(|p| p.0).chain(self.x_guides.iter().copied());
        let (min, max) = xs.fold((0.0f64, 0.0f64), |(lo, hi), x| (lo.min(x), hi.max(x)));
        if max <= min {
            return (min, min + 1.0);
        }
        (min, max + (max - min) * 0.05)
    }
}

/// Horizontal offset of each of `count` side-by-side bars, centered on the
/// category.
pub fn group_offsets(count: usize, width: f64) -> Vec<f64> {
    let center = (count as f64 - 1.0) / 2.0;
    (0..count).map(|i| (i as f64 - center) * width).collect()
}

fn tick_label(ticks: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    ticks.get(idx as usize).cloned().unwrap_or_default()
}

fn format_tick(value: &f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", (value * 1000.0).round() / 1000.0)
    }
}

/// Only SVG is written. A path without an extension gets `.svg`.
pub fn svg_path(path: &Path) -> Result<PathBuf> {
    match path.extension().and_then(|e| e.to_str()) {
        None => Ok(path.with_extension("svg")),
        Some(ext) if ext.eq_ignore_ascii_case("svg") => Ok(path.to_path_buf()),
        Some(ext) => Err(FigureError::UnsupportedFormat(ext.to_string())),
    }
}

pub fn render(chart: &Chart, path: &Path, size: (u32, u32)) -> Result<PathBuf> {
    let path = svg_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| FigureError::io(parent, err))?;
    }

    let _guard = flame::start_guard("render");
    {
        let root = SVGBackend::new(&path, size).into_drawing_area();
        draw(&root, chart)?;
        root.present()?;
    }
    info!("wrote {}", path.display());
    Ok(path)
}

pub fn render_svg(chart: &Chart, size: (u32, u32)) -> Result<String> {
    let mut buffer = String::new();
    {
        let root = SVGBackend::with_string(&mut buffer, size).into_drawing_area();
        draw(&root, chart)?;
        root.present()?;
    }
    Ok(buffer)
}

fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &Chart) -> Result<()> {
    root.fill(&WHITE)?;
    match chart {
        Chart::Categorical(chart) => draw_categorical(root, chart),
        Chart::Cdf(chart) => draw_cdf(root, chart),
    }
}

fn draw_categorical<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &CategoricalChart,
) -> Result<()> {
    let n = chart.ticks.len().max(1);
    let x_range = -0.5..(n as f64 - 0.5);
    let (y_lo, y_hi) = chart.y_range();
    let x_fmt = |x: &f64| tick_label(&chart.ticks, *x);

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60);
    if chart.secondary.is_some() {
        builder.right_y_label_area_size(70);
    }

    match chart.y_scale {
        YScale::Linear => {
            let mut ctx = builder.build_cartesian_2d(x_range, y_lo..y_hi)?;
            ctx.configure_mesh()
                .disable_x_mesh()
                .x_labels(n * 2 + 1)
                .x_label_formatter(&x_fmt)
                .y_label_formatter(&format_tick)
                .x_desc(chart.x_desc.as_str())
                .y_desc(chart.y_desc.as_str())
                .label_style((FONT, FONT_SIZE).into_font())
                .draw()?;
            draw_layers(&mut ctx, chart, y_lo)?;
            draw_legend(&mut ctx)
        }
        YScale::Log => {
            let mut ctx = builder.build_cartesian_2d(x_range.clone(), (y_lo..y_hi).log_scale())?;
            ctx.configure_mesh()
                .disable_x_mesh()
                .x_labels(n * 2 + 1)
                .x_label_formatter(&x_fmt)
                .y_label_formatter(&format_tick)
                .x_desc(chart.x_desc.as_str())
                .y_desc(chart.y_desc.as_str())
                .label_style((FONT, FONT_SIZE).into_font())
                .draw()?;

            let secondary = match &chart.secondary {
                Some(secondary) => secondary,
                None => {
                    draw_layers(&mut ctx, chart, y_lo)?;
                    return draw_legend(&mut ctx);
                }
            };

            let (s_lo, s_hi) = secondary.y_range();
            let mut ctx = ctx.set_secondary_coord(x_range, (s_lo..s_hi).log_scale());
            ctx.configure_secondary_axes()
                .y_desc(secondary.y_desc.as_str())
                .y_label_formatter(&format_tick)
                .label_style((FONT, FONT_SIZE).into_font())
                .draw()?;

            draw_layers(&mut *ctx, chart, y_lo)?;
            for line in &secondary.lines {
                let color = line.color;
                ctx.draw_secondary_series(LineSeries::new(
                    line.values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                    color.stroke_width(2),
                ))?
                .label(line.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            }
            draw_legend(&mut *ctx)
        }
    }
}

fn draw_layers<'a, DB, Y>(
    ctx: &mut ChartContext<'a, DB, Cartesian2d<RangedCoordf64, Y>>,
    chart: &CategoricalChart,
    floor: f64,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    Y: Ranged<ValueType = f64>,
{
    let offsets = group_offsets(chart.grouped_bars(), chart.bar_width);
    let mut slot = 0;
    let half = chart.bar_width / 2.0;
    let right = chart.ticks.len() as f64 - 0.5;

    for layer in &chart.layers {
        match layer {
            Layer::Bars {
                label,
                color,
                values,
                base,
            } => {
                let color = *color;
                let offset = match base {
                    Some(_) => 0.0,
                    None => {
                        slot += 1;
                        offsets[slot - 1]
                    }
                };
                ctx.draw_series(values.iter().enumerate().map(|(i, v)| {
                    let (bottom, top) = match base.as_ref().and_then(|b| b.get(i)) {
                        Some(b) => (*b, b + v),
                        None => (floor, *v),
                    };
                    let x = i as f64 + offset;
                    Rectangle::new([(x - half, bottom.max(floor)), (x + half, top)], color.filled())
                }))?
                .label(label.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
            }
            Layer::Line {
                label,
                color,
                values,
                markers,
            } => {
                let color = *color;
                let points: Vec<(f64, f64)> =
                    values.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect();
                let anno = ctx.draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?;
                if let Some(label) = label {
                    anno.label(label.as_str()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                    });
                }
                if *markers {
                    ctx.draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
                }
            }
            Layer::Annotations { values } => {
                ctx.draw_series(values.iter().enumerate().map(|(i, v)| {
                    EmptyElement::at((i as f64, *v))
                        + Text::new(format!("{}", *v as i64), (-10, -18), (FONT, FONT_SIZE).into_font())
                }))?;
            }
            Layer::HLine {
                label,
                color,
                value,
            } => {
                let color = *color;
                ctx.draw_series(LineSeries::new(
                    vec![(-0.5, *value), (right, *value)],
                    color.stroke_width(2),
                ))?
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            }
        }
    }
    Ok(())
}

fn draw_legend<'a, DB, CT>(ctx: &mut ChartContext<'a, DB, CT>) -> Result<()>
where
    DB: DrawingBackend + 'a,
    CT: CoordTranslate,
{
    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font((FONT, FONT_SIZE).into_font())
        .draw()?;
    Ok(())
}

fn draw_cdf<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &CdfChart) -> Result<()> {
    let (x_lo, x_hi) = chart.x_range();
    let y_hi = 1.05;

    let mut ctx = ChartBuilder::on(root)
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, 0f64..y_hi)?;

    ctx.configure_mesh()
        .disable_mesh()
        .x_desc(chart.x_desc.as_str())
        .y_desc(chart.y_desc.as_str())
        .x_label_formatter(&format_tick)
        .y_label_formatter(&format_tick)
        .label_style((FONT, FONT_SIZE).into_font())
        .draw()?;

    for &x in &chart.x_guides {
        ctx.draw_series(DashedLineSeries::new(
            vec![(x, 0.0), (x, y_hi)],
            4,
            4,
            GUIDE.stroke_width(1),
        ))?;
    }
    for &y in &chart.y_guides {
        ctx.draw_series(DashedLineSeries::new(
            vec![(x_lo, y), (x_hi, y)],
            4,
            4,
            GUIDE.stroke_width(1),
        ))?;
    }

    ctx.draw_series(LineSeries::new(
        chart.points.iter().copied(),
        PALETTE[1].stroke_width(2),
    ))?;
    Ok(())
}

#[test]
fn offsets_center_the_group() {
    assert_eq!(group_offsets(1, 0.15), vec![0.0]);
    let offsets = group_offsets(4, 0.2);
    assert_eq!(offsets.len(), 4);
    assert!((offsets[0] + 0.3).abs() < 1e-9);
    assert!((offsets[3] - 0.3).abs() < 1e-9);
    assert!((offsets.iter().sum::<f64>()).abs() < 1e-9);
}

#[test]
fn tick_labels_only_on_categories() {
    let ticks = vec!["64".to_string(), "128".to_string()];
    assert_eq!(tick_label(&ticks, 0.0), "64");
    assert_eq!(tick_label(&ticks, 1.0), "128");
    assert_eq!(tick_label(&ticks, 0.5), "");
    assert_eq!(tick_label(&ticks, -0.5), "");
    assert_eq!(tick_label(&ticks, 2.0), "");
}

#[test]
fn svg_extension_is_enforced() {
    assert_eq!(svg_path(Path::new("out/hosts")).unwrap(), PathBuf::from("out/hosts.svg"));
    assert_eq!(svg_path(Path::new("hosts.SVG")).unwrap(), PathBuf::from("hosts.SVG"));
    assert!(matches!(
        svg_path(Path::new("hosts.pdf")),
        Err(FigureError::UnsupportedFormat(ext)) if ext == "pdf"
    ));
}

#[test]
fn stacked_range_covers_the_top() {
    let chart = CategoricalChart {
        x_desc: String::new(),
        y_desc: String::new(),
        ticks: vec!["a".to_string()],
        y_scale: YScale::Linear,
        bar_width: 0.35,
        layers: vec![
            Layer::Bars {
                label: "low".to_string(),
                color: PALETTE[0],
                values: vec![4.0],
                base: Some(vec![0.0]),
            },
            Layer::Bars {
                label: "high".to_string(),
                color: PALETTE[1],
                values: vec![6.0],
                base: Some(vec![4.0]),
            },
        ],
        secondary: None,
    };
    let (lo, hi) = chart.y_range();
    assert_eq!(lo, 0.0);
    assert!((hi - 11.0).abs() < 1e-9);
}

#[test]
fn renders_cdf_to_string() {
    let chart = Chart::Cdf(CdfChart {
        x_desc: "Number of unique leaves".to_string(),
        y_desc: "Cumulative probability".to_string(),
        points: series::cdf(&[10.0, 400.0, 900.0]).unwrap(),
        x_guides: vec![512.0],
        y_guides: vec![0.5],
    });
    let svg = render_svg(&chart, DEFAULT_SIZE).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("Cumulative probability"));
}
