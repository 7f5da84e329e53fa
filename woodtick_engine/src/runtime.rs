use std::{fs, path::Path, rc::Rc};

use anyhow::{Context, Result};
use serde::Serialize;
use woodtick_formats::SceneFile;

use crate::audio_bridge::RecordingAudioCallback;
use crate::cli::{EngineOptions, RunArgs, SentenceArg};
use crate::lua_host::{self, RunSummary, ScriptHost, SentenceOutcome};
use crate::world::AudioCallback;

pub fn execute(args: RunArgs) -> Result<()> {
    let RunArgs {
        scene,
        script,
        options,
        sentence,
        event_log_json,
        summary_json,
        audio_log_json,
        verbose,
    } = args;

    if let Some(path) = audio_log_json.as_ref() {
        log::info!("capturing sound events to {}", path.display());
    }
    let audio_recorder = audio_log_json
        .as_ref()
        .map(|_| Rc::new(RecordingAudioCallback::new()));
    let audio_callback = audio_recorder
        .as_ref()
        .map(|recorder| recorder.clone() as Rc<dyn AudioCallback>);

    let scene = SceneFile::from_json_file(&scene)?;
    let host = ScriptHost::new(&scene, audio_callback, verbose)?;
    host.load_script(&script)?;
    if !host.call_boot()? {
        log::debug!("{} defines no boot()", script.display());
    }

    if let Some(request) = sentence.as_ref() {
        push_requested_sentence(&host, request)?;
    }

    let ticked = run_frames(&host, &options);
    log::debug!("ticked {ticked} frames");

    let summary = host.summary();
    lua_host::dump_runtime_summary(&summary);

    if let Some(path) = event_log_json.as_ref() {
        write_json(path, &summary.events, "event log")?;
    }
    if let Some(path) = summary_json.as_ref() {
        write_json(path, &summary, "run summary")?;
    }
    if let (Some(path), Some(recorder)) = (audio_log_json.as_ref(), audio_recorder) {
        write_json(path, &recorder.events(), "audio event log")?;
    }

    Ok(())
}

fn push_requested_sentence(host: &ScriptHost, request: &SentenceArg) -> Result<()> {
    let outcome = host
        .push_sentence(request.verb, &request.target, request.second.as_deref())
        .with_context(|| format!("pushing sentence for {}", request.target))?;
    match outcome {
        SentenceOutcome::Started => println!("Sentence started on {}", request.target),
        SentenceOutcome::UseMode(flag) => {
            println!("Waiting for a second object ({})", flag.as_str())
        }
        SentenceOutcome::DialogChoice(choice) => println!("Dialog choice {choice} recorded"),
        SentenceOutcome::Aborted(reason) => println!("Sentence aborted: {reason}"),
    }
    Ok(())
}

/// Ticks up to the frame budget and returns how many frames ran.
fn run_frames(host: &ScriptHost, options: &EngineOptions) -> u64 {
    for frame in 0..options.frames {
        if options.until_idle && host.is_idle() {
            return frame;
        }
        host.tick(options.frame);
    }
    options.frames
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, label: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(value).with_context(|| format!("serializing {label} to JSON"))?;
    fs::write(path, json).with_context(|| format!("writing {label} to {}", path.display()))?;
    println!("Saved {label} to {}", path.display());
    Ok(())
}

/// Convenience for callers that only want the final state.
pub fn run_to_summary(host: &ScriptHost, options: &EngineOptions) -> RunSummary {
    run_frames(host, options);
    host.summary()
}
