use log::info;
use report_figures::{cli, report};
use std::process::ExitCode;

fn main() -> ExitCode {
    pretty_env_logger::init();
    let arguments = cli::report_cli();

    let jobs = match report::discover(&arguments.input_dir) {
        Ok(jobs) => jobs,
        Err(err) => {
            eprintln!("{}: {}", arguments.input_dir.display(), err);
            return ExitCode::FAILURE;
        }
    };
    info!("rendering {} figures on {} threads", jobs.len(), arguments.jobs);

    let outcomes = report::run(
        jobs,
        &arguments.out_dir,
        &arguments.options,
        arguments.size,
        arguments.jobs,
    );

    let mut failed = 0;
    for outcome in &outcomes {
        let input = outcome
            .input
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        match &outcome.result {
            Ok(path) => println!("Figure: {}, Input: {}, Output: {}", outcome.figure, input, path.display()),
            Err(err) => {
                failed += 1;
                println!("Figure: {}, Input: {}, Error: {}", outcome.figure, input, err);
            }
        }
    }

    println!("Rendered: {}", outcomes.len() - failed);
    println!("Failed: {}", failed);

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
