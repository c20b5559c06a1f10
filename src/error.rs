use std::{io, path::PathBuf};

use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FigureError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("column `{0}` not found")]
    MissingColumn(String),
    #[error("row {row}: `{value}` in column `{column}` is not a number")]
    NotANumber {
        row: usize,
        column: String,
        value: String,
    },
    #[error("line {line}: `{value}` is not a number")]
    BadSample { line: usize, value: String },
    #[error("input contains no values")]
    Empty,
    #[error("expected {expected} rows (one per x tick) but found {found}")]
    RowCount { expected: usize, found: usize },
    #[error("x tick `{0}` is not a leaf count")]
    BadTick(String),
    #[error("false positive rate {0} is not between 0 and 1")]
    BadFpRate(f64),
    #[error("`{0}` is not a known figure")]
    UnknownFigure(String),
    #[error("figure `{0}` needs an input file")]
    MissingInput(&'static str),
    #[error("unsupported output format `{0}`, only .svg is written")]
    UnsupportedFormat(String),
    #[error("rendering failed: {0}")]
    Render(String),
    #[error("worker rendering `{0}` stopped without a result")]
    Abandoned(&'static str),
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for FigureError {
    fn from(err: DrawingAreaErrorKind<E>) -> FigureError {
        FigureError::Render(err.to_string())
    }
}

impl FigureError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> FigureError {
        FigureError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FigureError>;
