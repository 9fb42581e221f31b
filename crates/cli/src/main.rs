use std::process::ExitCode;

fn main() -> ExitCode {
    smartshop_cli::run()
}
