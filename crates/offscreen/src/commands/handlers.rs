use std::fs::File;
use std::path::{Path, PathBuf};

use renderer::{Colorspace, GraphicsBackend};
use settings::{check_fps, MAX_FPS, MIN_FPS};

use super::{Command, CommandError};
use crate::state::RenderState;
use crate::subscribers::parse_pid;

pub struct FpsCommand;

impl<B: GraphicsBackend> Command<B> for FpsCommand {
    fn name(&self) -> &'static str {
        "fps"
    }

    fn usage(&self) -> &'static str {
        "fps [n]"
    }

    fn summary(&self) -> &'static str {
        "show or set the target frame rate (1-99)"
    }

    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        match args {
            [] => Ok(state.fps.to_string()),
            [value] => {
                let requested: i64 = value.parse().map_err(|_| {
                    CommandError::Invalid(format!("fps must be an integer, got '{value}'"))
                })?;
                let fps = check_fps(requested).map_err(|_| {
                    CommandError::Invalid(format!(
                        "fps ({requested}) out of range [{MIN_FPS}-{MAX_FPS}]"
                    ))
                })?;
                tracing::debug!(from = state.fps, to = fps, "frame rate changed");
                state.fps = fps;
                Ok(String::new())
            }
            _ => Err(CommandError::Usage(Command::<B>::usage(self))),
        }
    }
}

pub struct ColorspaceCommand;

impl<B: GraphicsBackend> Command<B> for ColorspaceCommand {
    fn name(&self) -> &'static str {
        "colorspace"
    }

    fn usage(&self) -> &'static str {
        "colorspace [rgb|yuv]"
    }

    fn summary(&self) -> &'static str {
        "show or set the output encoding"
    }

    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        match args {
            [] => Ok(state.colorspace.to_string()),
            [value] => {
                let colorspace: Colorspace = value
                    .parse()
                    .map_err(|err: renderer::ParseColorspaceError| {
                        CommandError::Invalid(err.to_string())
                    })?;
                state.colorspace = colorspace;
                state.overlay.set_colorspace(colorspace);
                tracing::debug!(%colorspace, "colorspace changed");
                Ok(String::new())
            }
            _ => Err(CommandError::Usage(Command::<B>::usage(self))),
        }
    }
}

pub struct MouseCommand;

impl<B: GraphicsBackend> Command<B> for MouseCommand {
    fn name(&self) -> &'static str {
        "mouse"
    }

    fn usage(&self) -> &'static str {
        "mouse [x y]"
    }

    fn summary(&self) -> &'static str {
        "show or set the pointer position passed to the shader"
    }

    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        match args {
            [] => Ok(format!("{} {}", state.mouse.0, state.mouse.1)),
            [x, y] => {
                state.mouse = (parse_coordinate(x)?, parse_coordinate(y)?);
                Ok(String::new())
            }
            _ => Err(CommandError::Usage(Command::<B>::usage(self))),
        }
    }
}

fn parse_coordinate(value: &str) -> Result<i32, CommandError> {
    value
        .parse()
        .map_err(|_| CommandError::Invalid(format!("coordinate must be an integer, got '{value}'")))
}

pub struct ShaderCommand;

impl<B: GraphicsBackend> Command<B> for ShaderCommand {
    fn name(&self) -> &'static str {
        "shader"
    }

    fn usage(&self) -> &'static str {
        "shader [path]"
    }

    fn summary(&self) -> &'static str {
        "show the fragment shader or switch to another one"
    }

    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        let path = match args {
            [] => return Ok(state.shader_path().display().to_string()),
            [path] => PathBuf::from(path),
            _ => return Err(CommandError::Usage(Command::<B>::usage(self))),
        };
        if path == state.shader_path() {
            return Ok(String::new());
        }
        check_readable(&path)?;

        state.replace_program(path).map_err(|err| {
            if err.is_recoverable() {
                tracing::warn!(%err, "keeping the current shader");
            }
            CommandError::from(err)
        })?;
        Ok(String::new())
    }
}

fn check_readable(path: &Path) -> Result<(), CommandError> {
    let file = File::open(path)
        .map_err(|err| CommandError::Invalid(format!("cannot read {}: {err}", path.display())))?;
    let metadata = file
        .metadata()
        .map_err(|err| CommandError::Invalid(format!("cannot read {}: {err}", path.display())))?;
    if !metadata.is_file() {
        return Err(CommandError::Invalid(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    Ok(())
}

pub struct MessageCommand;

impl<B: GraphicsBackend> Command<B> for MessageCommand {
    fn name(&self) -> &'static str {
        "message"
    }

    fn usage(&self) -> &'static str {
        "message [text...]"
    }

    fn summary(&self) -> &'static str {
        "show or replace the overlay text"
    }

    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        if args.is_empty() {
            return Ok(state.overlay.text().to_string());
        }
        state.overlay.set_text(args.join(" "));
        Ok(String::new())
    }
}

pub struct KillCommand;

impl<B: GraphicsBackend> Command<B> for KillCommand {
    fn name(&self) -> &'static str {
        "kill"
    }

    fn usage(&self) -> &'static str {
        "kill add|rm <pid>"
    }

    fn summary(&self) -> &'static str {
        "register or drop a process to signal after each frame"
    }

    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        match args {
            ["add", pid] => {
                let pid = parse_pid(pid)?;
                state.subscribers.add(pid)?;
            }
            ["rm", pid] => {
                let pid = parse_pid(pid)?;
                state.subscribers.remove(pid);
            }
            _ => return Err(CommandError::Usage(Command::<B>::usage(self))),
        }
        Ok(String::new())
    }
}

pub struct QuitCommand;

impl<B: GraphicsBackend> Command<B> for QuitCommand {
    fn name(&self) -> &'static str {
        "quit"
    }

    fn usage(&self) -> &'static str {
        "quit [status]"
    }

    fn summary(&self) -> &'static str {
        "tear down and exit with the given status (default 0)"
    }

    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        let status = match args {
            [] => 0,
            [value] => value.parse::<u8>().map_err(|_| {
                CommandError::Invalid(format!("exit status must be 0-255, got '{value}'"))
            })?,
            _ => return Err(CommandError::Usage(Command::<B>::usage(self))),
        };
        tracing::info!(status, "quit requested");
        state.exit = Some(status);
        Ok(String::new())
    }
}

pub struct StatsCommand;

impl<B: GraphicsBackend> Command<B> for StatsCommand {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn usage(&self) -> &'static str {
        "stats"
    }

    fn summary(&self) -> &'static str {
        "show the frame count and average frame time"
    }

    fn execute(&self, state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        if !args.is_empty() {
            return Err(CommandError::Usage(Command::<B>::usage(self)));
        }
        Ok(format!(
            "frames={} avg_ms={}",
            state.stats.frames(),
            state.stats.average()
        ))
    }
}

/// Help text for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

pub struct HelpCommand {
    topics: Vec<Topic>,
}

impl HelpCommand {
    const USAGE: &'static str = "help [topic]";
    const SUMMARY: &'static str = "list commands or describe one";

    pub fn new(mut topics: Vec<Topic>) -> Self {
        topics.push(Topic {
            name: "help",
            usage: Self::USAGE,
            summary: Self::SUMMARY,
        });
        topics.sort_by_key(|topic| topic.name);
        Self { topics }
    }
}

impl<B: GraphicsBackend> Command<B> for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn usage(&self) -> &'static str {
        Self::USAGE
    }

    fn summary(&self) -> &'static str {
        Self::SUMMARY
    }

    fn execute(&self, _state: &mut RenderState<B>, args: &[&str]) -> Result<String, CommandError> {
        match args {
            [] => {
                let names: Vec<&str> = self.topics.iter().map(|topic| topic.name).collect();
                Ok(format!("commands: {}", names.join(" ")))
            }
            [topic] => self
                .topics
                .iter()
                .find(|candidate| candidate.name == *topic)
                .map(|found| format!("{}: {}", found.usage, found.summary))
                .ok_or_else(|| CommandError::UnknownTopic(topic.to_string())),
            _ => Err(CommandError::Usage(Self::USAGE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Dispatcher;
    use super::*;
    use crate::testing::{shader_file, test_state, FakeBackend, FakeLog, FakeSignaller};
    use tempfile::TempDir;

    struct Harness {
        state: RenderState<FakeBackend>,
        dispatcher: Dispatcher<FakeBackend>,
        log: FakeLog,
        signaller: FakeSignaller,
        dir: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let (state, log, signaller) = test_state(&dir);
            Self {
                state,
                dispatcher: Dispatcher::standard(),
                log,
                signaller,
                dir,
            }
        }

        fn send(&mut self, line: &str) -> Result<String, CommandError> {
            self.dispatcher.dispatch(&mut self.state, line)
        }
    }

    #[test]
    fn fps_round_trips_every_valid_value() {
        let mut harness = Harness::new();
        for n in 1..=99 {
            assert_eq!(harness.send(&format!("fps {n}")).unwrap(), "");
            assert_eq!(harness.send("fps").unwrap(), n.to_string());
        }
    }

    #[test]
    fn fps_rejects_out_of_range_values() {
        let mut harness = Harness::new();
        harness.send("fps 42").unwrap();
        for bad in ["0", "100", "-1", "1000", "abc", "2.5"] {
            assert!(harness.send(&format!("fps {bad}")).is_err(), "accepted {bad}");
            assert_eq!(harness.state.fps, 42);
        }
        assert!(matches!(harness.send("fps 1 2"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn colorspace_updates_state_and_overlay() {
        let mut harness = Harness::new();
        harness.send("colorspace yuv").unwrap();
        assert_eq!(harness.send("colorspace").unwrap(), "yuv");
        assert_eq!(harness.state.overlay.colorspace(), Colorspace::Yuv);

        harness.send("colorspace rgb").unwrap();
        assert_eq!(harness.send("colorspace").unwrap(), "rgb");

        assert!(harness.send("colorspace cmyk").is_err());
        assert!(harness.send("colorspace YUV").is_err());
        assert_eq!(harness.send("colorspace").unwrap(), "rgb");
        assert_eq!(harness.state.overlay.colorspace(), Colorspace::Rgb);
    }

    #[test]
    fn mouse_stores_pair_verbatim() {
        let mut harness = Harness::new();
        assert_eq!(harness.send("mouse").unwrap(), "0 0");
        harness.send("mouse -50 99999").unwrap();
        assert_eq!(harness.send("mouse").unwrap(), "-50 99999");
        assert!(harness.send("mouse 1").is_err());
        assert!(harness.send("mouse a b").is_err());
        assert_eq!(harness.state.mouse, (-50, 99999));
    }

    #[test]
    fn shader_with_missing_path_changes_nothing() {
        let mut harness = Harness::new();
        let before = harness.state.shader_path().to_path_buf();
        let missing = harness.dir.path().join("missing.frag");

        let err = harness
            .send(&format!("shader {}", missing.display()))
            .unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(harness.state.shader_path(), before);
        assert_eq!(
            harness.send("shader").unwrap(),
            before.display().to_string()
        );
    }

    #[test]
    fn shader_compile_failure_keeps_running_program() {
        let mut harness = Harness::new();
        let before = harness.state.shader_path().to_path_buf();
        let broken = shader_file(&harness.dir, "broken.frag", "#error broken");

        let err = harness
            .send(&format!("shader {}", broken.display()))
            .unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(harness.state.shader_path(), before);
        assert_eq!(harness.log.entries().len(), 1);
    }

    #[test]
    fn shader_switch_and_same_path_noop() {
        let mut harness = Harness::new();
        let next = shader_file(&harness.dir, "next.frag", "void main() {}");
        let line = format!("shader {}", next.display());

        assert_eq!(harness.send(&line).unwrap(), "");
        assert_eq!(harness.send("shader").unwrap(), next.display().to_string());
        let entries = harness.log.entries().len();

        assert_eq!(harness.send(&line).unwrap(), "");
        assert_eq!(harness.log.entries().len(), entries);
    }

    #[test]
    fn shader_rejects_directories() {
        let mut harness = Harness::new();
        let dir = harness.dir.path().display().to_string();
        assert!(harness.send(&format!("shader {dir}")).is_err());
    }

    #[test]
    fn message_joins_tokens() {
        let mut harness = Harness::new();
        assert_eq!(harness.send("message").unwrap(), "");
        harness.send("message  hello   overlay world").unwrap();
        assert_eq!(harness.send("message").unwrap(), "hello overlay world");
    }

    #[test]
    fn kill_add_rm_round_trip() {
        let mut harness = Harness::new();
        let pid = std::process::id();
        harness.send(&format!("kill add {pid}")).unwrap();
        assert_eq!(harness.state.subscribers.len(), 1);
        harness.send(&format!("kill rm {pid}")).unwrap();
        assert!(harness.state.subscribers.is_empty());
        harness.send(&format!("kill rm {pid}")).unwrap();
    }

    #[test]
    fn kill_validates_arguments() {
        let mut harness = Harness::new();
        assert!(matches!(harness.send("kill"), Err(CommandError::Usage(_))));
        assert!(matches!(harness.send("kill list 1"), Err(CommandError::Usage(_))));
        assert!(harness.send("kill add 0").is_err());
        assert!(harness.send("kill add nope").is_err());
        assert!(harness.send("kill add 424242").is_err());
        assert!(harness.state.subscribers.is_empty());
    }

    #[test]
    fn kill_rejects_fifth_subscriber() {
        let mut harness = Harness::new();
        for pid in 100..105 {
            harness.signaller.spawn(pid);
        }
        for pid in 100..104 {
            harness.send(&format!("kill add {pid}")).unwrap();
        }
        let err = harness.send("kill add 104").unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(
            harness.state.subscribers.pids().collect::<Vec<_>>(),
            vec![100, 101, 102, 103]
        );
    }

    #[test]
    fn quit_sets_exit_status() {
        let mut harness = Harness::new();
        assert!(harness.send("quit 256").is_err());
        assert!(harness.send("quit -1").is_err());
        assert_eq!(harness.state.exit, None);

        harness.send("quit 3").unwrap();
        assert_eq!(harness.state.exit, Some(3));
    }

    #[test]
    fn quit_defaults_to_zero() {
        let mut harness = Harness::new();
        harness.send("quit").unwrap();
        assert_eq!(harness.state.exit, Some(0));
    }

    #[test]
    fn stats_reports_count_and_average() {
        let mut harness = Harness::new();
        for _ in 0..16 {
            harness.state.stats.record(8);
        }
        assert_eq!(harness.send("stats").unwrap(), "frames=16 avg_ms=8");
        assert!(harness.send("stats now").is_err());
    }

    #[test]
    fn help_lists_and_describes_commands() {
        let mut harness = Harness::new();
        assert_eq!(
            harness.send("help").unwrap(),
            "commands: colorspace fps help kill message mouse quit shader stats"
        );
        assert_eq!(
            harness.send("help fps").unwrap(),
            "fps [n]: show or set the target frame rate (1-99)"
        );
        assert!(matches!(
            harness.send("help nothing"),
            Err(CommandError::UnknownTopic(_))
        ));
    }
}
