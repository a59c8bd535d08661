use std::process::ExitCode;

fn main() -> ExitCode {
    breakreel::run()
}
