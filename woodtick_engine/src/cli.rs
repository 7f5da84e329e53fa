use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use woodtick_formats::{parse_verb, VerbId};

#[derive(Parser, Debug)]
#[command(
    about = "Runs a scene's Lua scripts against the cooperative scheduler and verb pipeline",
    version
)]
pub struct Args {
    /// Scene JSON describing the room, actors, objects and verb table
    #[arg(long)]
    pub scene: PathBuf,

    /// Lua script whose main chunk (and `boot()`, if defined) runs first
    #[arg(long)]
    pub script: PathBuf,

    /// Number of frames to tick after boot
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Frames per second used to derive the per-frame elapsed time
    #[arg(long, default_value_t = 60.0)]
    pub fps: f64,

    /// Verb sentence to push after boot, as verb:target[:second]
    #[arg(long, value_name = "VERB:TARGET[:SECOND]")]
    pub sentence: Option<String>,

    /// Stop ticking as soon as nothing is left to run
    #[arg(long)]
    pub until_idle: bool,

    /// Path to write the engine event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the end-of-run summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Path to write the sound play/stop log as JSON
    #[arg(long)]
    pub audio_log_json: Option<PathBuf>,

    /// Mirror engine events to the info log as they happen
    #[arg(long)]
    pub verbose: bool,
}

/// A sentence requested from the command line; `verb` is `None` for the
/// target's default verb (`default:rope`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceArg {
    pub verb: Option<VerbId>,
    pub target: String,
    pub second: Option<String>,
}

impl SentenceArg {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split(':').map(str::trim);
        let verb_part = parts.next().unwrap_or_default();
        let target = parts
            .next()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("sentence `{raw}` needs a target (verb:target[:second])"))?;
        let second = parts
            .next()
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        if parts.next().is_some() {
            bail!("sentence `{raw}` has more than two targets");
        }
        let verb = match verb_part {
            "" | "default" => None,
            other => Some(parse_verb(other).ok_or_else(|| anyhow!("unknown verb `{other}`"))?),
        };
        Ok(SentenceArg {
            verb,
            target: target.to_string(),
            second,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    pub frame: Duration,
    pub frames: u64,
    pub until_idle: bool,
}

#[derive(Debug)]
pub struct RunArgs {
    pub scene: PathBuf,
    pub script: PathBuf,
    pub options: EngineOptions,
    pub sentence: Option<SentenceArg>,
    pub event_log_json: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
    pub audio_log_json: Option<PathBuf>,
    pub verbose: bool,
}

pub fn parse() -> Result<RunArgs> {
    Args::parse().into_run_args()
}

impl Args {
    fn into_run_args(self) -> Result<RunArgs> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            bail!("--fps must be a positive number");
        }
        let sentence = self.sentence.as_deref().map(SentenceArg::parse).transpose()?;
        Ok(RunArgs {
            scene: self.scene,
            script: self.script,
            options: EngineOptions {
                frame: Duration::from_secs_f64(1.0 / self.fps),
                frames: self.frames,
                until_idle: self.until_idle,
            },
            sentence,
            event_log_json: self.event_log_json,
            summary_json: self.summary_json,
            audio_log_json: self.audio_log_json,
            verbose: self.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use woodtick_formats::verbs::{VERB_GIVE, VERB_PICKUP};

    #[test]
    fn sentence_arg_accepts_names_and_numbers() {
        assert_eq!(
            SentenceArg::parse("pickup:rope").unwrap(),
            SentenceArg {
                verb: Some(VERB_PICKUP),
                target: "rope".into(),
                second: None,
            }
        );
        assert_eq!(
            SentenceArg::parse("9:map:largo").unwrap(),
            SentenceArg {
                verb: Some(VERB_GIVE),
                target: "map".into(),
                second: Some("largo".into()),
            }
        );
        assert_eq!(SentenceArg::parse("default:rope").unwrap().verb, None);
    }

    #[test]
    fn sentence_arg_rejects_bad_input() {
        assert!(SentenceArg::parse("pickup").is_err());
        assert!(SentenceArg::parse("dance:rope").is_err());
        assert!(SentenceArg::parse("use:a:b:c").is_err());
    }

    #[test]
    fn fps_sets_the_frame_length() {
        let args = Args::parse_from([
            "woodtick_engine",
            "--scene",
            "dock.json",
            "--script",
            "dock.lua",
            "--fps",
            "10",
        ]);
        let run = args.into_run_args().unwrap();
        assert_eq!(run.options.frame, Duration::from_millis(100));
        assert_eq!(run.options.frames, 600);
        assert!(!run.options.until_idle);
    }

    #[test]
    fn zero_fps_is_rejected() {
        let args = Args::parse_from([
            "woodtick_engine",
            "--scene",
            "a.json",
            "--script",
            "a.lua",
            "--fps",
            "0",
        ]);
        assert!(args.into_run_args().is_err());
    }
}
