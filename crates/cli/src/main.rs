use std::process::ExitCode;

fn main() -> ExitCode {
    steps_cli::run()
}
