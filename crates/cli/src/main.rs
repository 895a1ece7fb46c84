use std::process::ExitCode;

fn main() -> ExitCode {
    staffchat_cli::run()
}
