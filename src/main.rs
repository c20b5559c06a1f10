use report_figures::{cli, error::FigureError, figures};
use std::{fs, process::ExitCode};

fn main() -> ExitCode {
    pretty_env_logger::init();
    let arguments = cli::cli();

    if arguments.flamegraph {
        flame::start("main");
    }

    let result = figures::generate(
        arguments.figure,
        arguments.input.as_deref(),
        &arguments.output,
        &arguments.options,
        arguments.size,
    );

    if arguments.flamegraph {
        flame::end("main");
        if let Err(err) = dump_flamegraph(&arguments.out_dir) {
            eprintln!("{}", err);
        }
    }

    match result {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {}", arguments.figure, err);
            ExitCode::FAILURE
        }
    }
}

fn dump_flamegraph(out_dir: &std::path::Path) -> Result<(), FigureError> {
    fs::create_dir_all(out_dir).map_err(|err| FigureError::io(out_dir, err))?;
    let path = out_dir.join("flamegraph.html");
    let file = fs::File::create(&path).map_err(|err| FigureError::io(&path, err))?;
    flame::dump_html(file).map_err(|err| FigureError::io(&path, err))?;
    log::info!("flamegraph written to {}", path.display());
    Ok(())
}
