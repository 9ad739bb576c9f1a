use std::process::ExitCode;

fn main() -> ExitCode {
    paygate_cli::run()
}
