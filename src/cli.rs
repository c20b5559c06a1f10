use clap::{command, error::ErrorKind, value_parser, Arg, ArgAction, ArgMatches, Command};
use std::{ffi::OsString, path::PathBuf, str::FromStr};

use crate::{
    figures::{Figure, InputKind, Options, DEFAULT_FP_RATE},
    phases::{Column, Stat, Timer},
    plot::DEFAULT_SIZE,
};

#[derive(Debug)]
pub struct CliArgs {
    pub figure: Figure,
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub out_dir: PathBuf,
    pub options: Options,
    pub size: (u32, u32),
    pub flamegraph: bool,
}

#[derive(Debug)]
pub struct ReportArgs {
    pub input_dir: PathBuf,
    pub out_dir: PathBuf,
    pub jobs: usize,
    pub options: Options,
    pub size: (u32, u32),
}

fn figure_command() -> Command {
    command!()
        .about("Renders one figure of the report. Give the figure as first argument, the input file as second argument.")
        .arg(
            Arg::new("figure")
                .help("Figure to render: leaves-cdf, bloom, bloom-evolution, hosts, hosts-evolution, leaves, real")
                .required(true)
                .value_parser(Figure::from_str)
                .index(1),
        )
        .arg(
            Arg::new("input")
                .help("Benchmark CSV, or the leaf count samples for leaves-cdf. bloom takes none.")
                .required(false)
                .value_parser(value_parser!(PathBuf))
                .index(2),
        )
        .arg(
            Arg::new("output")
                .help("Specify the output file. Defaults to the figure's name in the output directory.")
                .required(false)
                .value_parser(value_parser!(PathBuf))
                .index(3),
        )
        .arg(
            Arg::new("ticks")
                .help("Comma separated x tick labels, one per CSV row")
                .long("ticks")
                .short('t')
                .value_delimiter(','),
        )
        .arg(
            Arg::new("flamegraph")
                .help("Specify whether to create a flamegraph")
                .long("flamegraph")
                .short('f')
                .action(ArgAction::SetTrue),
        )
        .args(shared_args())
}

fn report_command() -> Command {
    command!("report")
        .about("Renders every figure whose input is found in a directory. Inputs are named after the figure, e.g. hosts.csv or leaves_cdf.txt.")
        .arg(
            Arg::new("input")
                .help("Directory holding the benchmark files")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("jobs")
                .help("Number of figures rendered at once")
                .long("jobs")
                .short('j')
                .value_parser(value_parser!(usize))
                .default_value("4"),
        )
        .args(shared_args())
}

fn shared_args() -> Vec<Arg> {
    vec![
        Arg::new("out_dir")
            .help("Directory figures are written to")
            .long("out-dir")
            .short('o')
            .value_parser(value_parser!(PathBuf))
            .default_value("images"),
        Arg::new("timer")
            .help("Timer column to plot: wall, user or system")
            .long("timer")
            .value_parser(Timer::from_str)
            .default_value("wall"),
        Arg::new("stat")
            .help("Statistic column to plot: avg, min, max, dev or sum")
            .long("stat")
            .value_parser(Stat::from_str)
            .default_value("avg"),
        Arg::new("fp_rate")
            .help("False positive rate the Bloom filter sizes are computed for")
            .long("fp-rate")
            .value_parser(fp_rate)
            .default_value("0.01"),
        Arg::new("width")
            .help("Image width in pixels")
            .long("width")
            .value_parser(value_parser!(u32))
            .default_value("640"),
        Arg::new("height")
            .help("Image height in pixels")
            .long("height")
            .value_parser(value_parser!(u32))
            .default_value("480"),
    ]
}

fn fp_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    if rate > 0.0 && rate < 1.0 {
        Ok(rate)
    } else {
        Err(format!("{} is not between 0 and 1", rate))
    }
}

fn options(arguments: &ArgMatches, ticks: Option<Vec<String>>) -> Options {
    let column = Column {
        timer: arguments.get_one::<Timer>("timer").copied().unwrap_or_default(),
        stat: arguments.get_one::<Stat>("stat").copied().unwrap_or_default(),
    };
    Options {
        ticks,
        column,
        fp_rate: arguments
            .get_one::<f64>("fp_rate")
            .copied()
            .unwrap_or(DEFAULT_FP_RATE),
    }
}

fn size(arguments: &ArgMatches) -> (u32, u32) {
    (
        arguments.get_one::<u32>("width").copied().unwrap_or(DEFAULT_SIZE.0),
        arguments.get_one::<u32>("height").copied().unwrap_or(DEFAULT_SIZE.1),
    )
}

fn out_dir(arguments: &ArgMatches) -> PathBuf {
    arguments
        .get_one::<PathBuf>("out_dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("images"))
}

pub fn cli() -> CliArgs {
    match from_matches(figure_command().get_matches()) {
        Ok(args) => args,
        Err(err) => err.exit(),
    }
}

pub fn try_cli_from<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    from_matches(figure_command().try_get_matches_from(args)?)
}

fn from_matches(arguments: ArgMatches) -> Result<CliArgs, clap::Error> {
    let figure = match arguments.get_one::<Figure>("figure") {
        Some(figure) => *figure,
        None => panic!("Figure is required"),
    };

    let mut input = arguments.get_one::<PathBuf>("input").cloned();
    let mut output = arguments.get_one::<PathBuf>("output").cloned();
    // bloom has no input, so a lone path is where to write it
    if figure.input() == InputKind::None {
        if output.is_some() {
            return Err(figure_command().error(
                ErrorKind::TooManyValues,
                format!("{} takes no input, only an output path", figure),
            ));
        }
        output = input.take();
    }

    let ticks = arguments
        .get_many::<String>("ticks")
        .map(|ticks| ticks.map(|t| t.trim().to_string()).collect());
    let out_dir = out_dir(&arguments);
    let output = output.unwrap_or_else(|| out_dir.join(figure.output_name()));

    Ok(CliArgs {
        figure,
        input,
        output,
        options: options(&arguments, ticks),
        size: size(&arguments),
        out_dir,
        flamegraph: arguments.get_flag("flamegraph"),
    })
}

pub fn report_cli() -> ReportArgs {
    report_from_matches(report_command().get_matches())
}

pub fn try_report_cli_from<I, T>(args: I) -> Result<ReportArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Ok(report_from_matches(report_command().try_get_matches_from(args)?))
}

fn report_from_matches(arguments: ArgMatches) -> ReportArgs {
    let input_dir = match arguments.get_one::<PathBuf>("input") {
        Some(path) => path.clone(),
        None => panic!("Input directory is required"),
    };

    ReportArgs {
        input_dir,
        out_dir: out_dir(&arguments),
        jobs: arguments.get_one::<usize>("jobs").copied().unwrap_or(4).max(1),
        options: options(&arguments, None),
        size: size(&arguments),
    }
}

#[test]
fn figure_and_input_are_positional() {
    let args = try_cli_from(["figure", "hosts", "hosts.csv"]).unwrap();
    assert_eq!(args.figure, Figure::Hosts);
    assert_eq!(args.input, Some(PathBuf::from("hosts.csv")));
    assert_eq!(args.output, PathBuf::from("images/hosts.svg"));
    assert_eq!(args.size, DEFAULT_SIZE);
    assert!(!args.flamegraph);
}

#[test]
fn bloom_takes_output_as_only_path() {
    let args = try_cli_from(["figure", "bloom", "out/bloom.svg"]).unwrap();
    assert_eq!(args.input, None);
    assert_eq!(args.output, PathBuf::from("out/bloom.svg"));
}

#[test]
fn bloom_rejects_two_paths() {
    let err = try_cli_from(["figure", "bloom", "a.svg", "b.svg"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooManyValues);
}

#[test]
fn fp_rate_must_be_a_probability() {
    let args = try_cli_from(["figure", "bloom", "--fp-rate", "0.05"]).unwrap();
    assert_eq!(args.options.fp_rate, 0.05);
    for rate in ["0", "1", "1.5", "often"] {
        let err = try_cli_from(["figure", "bloom", "--fp-rate", rate]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation, "{} was accepted", rate);
    }
    assert!(try_report_cli_from(["report", "bench", "--fp-rate", "0"]).is_err());
}

#[test]
fn options_are_parsed() {
    let args = try_cli_from([
        "figure", "real", "real.csv", "--ticks", "a, b,c", "--stat", "max", "--timer", "user",
        "--out-dir", "figs", "--width", "800",
    ])
    .unwrap();
    assert_eq!(
        args.options.ticks,
        Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
    assert_eq!(args.options.column.stat, Stat::Max);
    assert_eq!(args.options.column.timer, Timer::User);
    assert_eq!(args.output, PathBuf::from("figs/real.svg"));
    assert_eq!(args.size, (800, DEFAULT_SIZE.1));
}

#[test]
fn unknown_figure_is_rejected() {
    assert!(try_cli_from(["figure", "pie", "x.csv"]).is_err());
}

#[test]
fn missing_figure_is_a_usage_error() {
    assert!(try_cli_from(["figure"]).is_err());
}

#[test]
fn report_defaults() {
    let args = try_report_cli_from(["report", "bench"]).unwrap();
    assert_eq!(args.input_dir, PathBuf::from("bench"));
    assert_eq!(args.out_dir, PathBuf::from("images"));
    assert_eq!(args.jobs, 4);
}
