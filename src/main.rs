use std::process::ExitCode;

fn main() -> ExitCode {
    match cmdtag::cli::run() {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            cmdtag::ui::output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
