mod cli;
mod commands;
mod control;
mod framebuffer;
mod grab;
mod overlay;
mod paths;
mod render_loop;
mod run;
mod signals;
mod state;
mod subscribers;
#[cfg(test)]
mod testing;

use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::parse();
    match run::run(args) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
