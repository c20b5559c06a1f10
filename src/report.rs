use glob::{glob, Pattern};
use log::{debug, error, warn};
use std::{
    path::{Path, PathBuf},
    sync::{mpsc::channel, Arc},
};
use threadpool::ThreadPool;

use crate::{
    error::{FigureError, Result},
    figures::{self, Figure, InputKind, Options},
};

const INPUT_PATTERNS: [&str; 2] = ["*.csv", "*.txt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub figure: Figure,
    pub input: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Outcome {
    pub figure: Figure,
    pub input: Option<PathBuf>,
    pub result: Result<PathBuf>,
}

/// Finds one input per figure in `dir`, matched by file stem. bloom needs no
/// input and is always part of the report.
pub fn discover(dir: &Path) -> Result<Vec<Job>> {
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let mut jobs: Vec<Job> = Vec::new();

    for pattern in INPUT_PATTERNS.iter() {
        for entry in glob(&format!("{}/{}", escaped, pattern))? {
            let path = entry?;
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem,
                None => continue,
            };
            let figure = match stem.parse::<Figure>() {
                Ok(figure) if figure.input() != InputKind::None => figure,
                _ => {
                    warn!("skipping {}: not the input of any figure", path.display());
                    continue;
                }
            };
            if jobs.iter().any(|j| j.figure == figure) {
                warn!("skipping {}: {} already has an input", path.display(), figure);
                continue;
            }
            debug!("{} <- {}", figure, path.display());
            jobs.push(Job {
                figure,
                input: Some(path),
            });
        }
    }

    jobs.push(Job {
        figure: Figure::Bloom,
        input: None,
    });
    jobs.sort_by_key(|j| j.figure);
    Ok(jobs)
}

/// Renders every job on a pool of `workers` threads. Outcomes come back in
/// figure order, one per job.
pub fn run(
    jobs: Vec<Job>,
    out_dir: &Path,
    options: &Options,
    size: (u32, u32),
    workers: usize,
) -> Vec<Outcome> {
    let out_dir = out_dir.to_path_buf();
    let options = options.clone();
    run_with(jobs, workers, move |job| {
        let output = out_dir.join(job.figure.output_name());
        figures::generate(job.figure, job.input.as_deref(), &output, &options, size)
    })
}

fn run_with<F>(jobs: Vec<Job>, workers: usize, render: F) -> Vec<Outcome>
where
    F: Fn(&Job) -> Result<PathBuf> + Send + Sync + 'static,
{
    let pool = ThreadPool::new(workers.max(1));
    let render = Arc::new(render);
    let (tx, rx) = channel();

    for (index, job) in jobs.iter().cloned().enumerate() {
        let tx = tx.clone();
        let render = Arc::clone(&render);
        pool.execute(move || {
            let result = render(&job);
            // The receiver outlives the pool.
            let _ = tx.send((index, result));
        });
    }
    drop(tx);

    // A worker that panics drops its sender without a result.
    let mut results: Vec<Option<Result<PathBuf>>> = jobs.iter().map(|_| None).collect();
    for (index, result) in rx.iter() {
        results[index] = Some(result);
    }

    let mut outcomes: Vec<Outcome> = jobs
        .into_iter()
        .zip(results)
        .map(|(job, result)| {
            let result = match result {
                Some(result) => result,
                None => {
                    error!("{} produced no result", job.figure);
                    Err(FigureError::Abandoned(job.figure.name()))
                }
            };
            Outcome {
                figure: job.figure,
                input: job.input,
                result,
            }
        })
        .collect();
    outcomes.sort_by_key(|o| o.figure);
    outcomes
}

#[test]
fn discovers_inputs_by_stem() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hosts.csv"), "a\n1\n").unwrap();
    std::fs::write(dir.path().join("leaves_cdf.txt"), "1\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
    std::fs::write(dir.path().join("bloom.csv"), "a\n1\n").unwrap();

    let jobs = discover(dir.path()).unwrap();
    let figures: Vec<Figure> = jobs.iter().map(|j| j.figure).collect();
    assert_eq!(figures, vec![Figure::LeavesCdf, Figure::Bloom, Figure::Hosts]);
    assert_eq!(jobs[1].input, None);
    assert_eq!(jobs[2].input, Some(dir.path().join("hosts.csv")));
}

#[test]
fn runs_jobs_and_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("images");
    std::fs::write(dir.path().join("leaves_cdf.txt"), "10\n20\n30\n").unwrap();
    // Missing the sign column
    std::fs::write(
        dir.path().join("leaves.csv"),
        "consensus_structured_wall_avg,decrypt_wall_avg,reconstruct_wall_avg\n1,2,3\n",
    )
    .unwrap();

    let jobs = discover(dir.path()).unwrap();
    let outcomes = run(jobs, &out, &Options::default(), crate::plot::DEFAULT_SIZE, 2);
    assert_eq!(outcomes.len(), 3);

    for outcome in &outcomes {
        match outcome.figure {
            Figure::Leaves => assert!(outcome.result.is_err()),
            _ => {
                let written = outcome.result.as_ref().unwrap();
                assert!(written.starts_with(&out));
                assert!(std::fs::metadata(written).unwrap().len() > 0);
            }
        }
    }
}

#[test]
fn panicking_worker_counts_as_failure() {
    let jobs = vec![
        Job {
            figure: Figure::Bloom,
            input: None,
        },
        Job {
            figure: Figure::Hosts,
            input: Some(PathBuf::from("hosts.csv")),
        },
    ];
    let outcomes = run_with(jobs, 2, |job| match job.figure {
        Figure::Hosts => panic!("renderer crashed"),
        _ => Ok(PathBuf::from("bloom.svg")),
    });

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].result.is_ok());
    assert_eq!(outcomes[1].figure, Figure::Hosts);
    assert!(matches!(outcomes[1].result, Err(FigureError::Abandoned("hosts"))));
}
