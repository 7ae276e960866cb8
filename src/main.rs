use std::process::ExitCode;

fn main() -> ExitCode {
    match refsync::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            refsync::ui::output::error(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
