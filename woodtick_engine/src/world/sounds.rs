use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;

use crate::handles::{HandlePool, SOUND_IDS};

pub type SoundId = u32;

/// Observer for sound lifecycle, so a real mixer (or a recorder) can follow
/// what scripts play.
pub trait AudioCallback {
    fn sound_play(&self, _id: SoundId, _name: &str, _length: Option<Duration>) {}
    fn sound_stop(&self, _id: SoundId) {}
    fn sound_finished(&self, _id: SoundId) {}
}

impl fmt::Debug for dyn AudioCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AudioCallback")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayingSound {
    pub id: SoundId,
    pub name: String,
    /// `None` loops until stopped.
    pub remaining: Option<Duration>,
}

/// Sounds currently playing, keyed by handle. Finished sounds are dropped
/// and their handle released.
#[derive(Debug)]
pub struct SoundMixer {
    handles: HandlePool,
    playing: BTreeMap<SoundId, PlayingSound>,
    callback: Option<Rc<dyn AudioCallback>>,
}

impl Default for SoundMixer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SoundMixer {
    pub fn new(callback: Option<Rc<dyn AudioCallback>>) -> Self {
        Self {
            handles: HandlePool::new(SOUND_IDS),
            playing: BTreeMap::new(),
            callback,
        }
    }

    pub fn owns(&self, id: u32) -> bool {
        self.handles.owns(id)
    }

    pub fn play(&mut self, name: &str, length: Option<Duration>) -> Option<SoundId> {
        let id = self.handles.allocate()?;
        self.playing.insert(
            id,
            PlayingSound {
                id,
                name: name.to_string(),
                remaining: length,
            },
        );
        if let Some(callback) = self.callback.as_ref() {
            callback.sound_play(id, name, length);
        }
        Some(id)
    }

    pub fn stop(&mut self, id: SoundId) -> bool {
        if self.playing.remove(&id).is_none() {
            return false;
        }
        self.handles.release(id);
        if let Some(callback) = self.callback.as_ref() {
            callback.sound_stop(id);
        }
        true
    }

    pub fn is_playing(&self, id: SoundId) -> bool {
        self.playing.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayingSound> {
        self.playing.values()
    }

    /// Advances every sound, returning the ones that finished.
    pub fn update(&mut self, elapsed: Duration) -> Vec<SoundId> {
        let finished: Vec<SoundId> = self
            .playing
            .values_mut()
            .filter_map(|sound| {
                let remaining = sound.remaining.as_mut()?;
                *remaining = remaining.saturating_sub(elapsed);
                remaining.is_zero().then_some(sound.id)
            })
            .collect();
        for id in &finished {
            self.playing.remove(id);
            self.handles.release(*id);
            if let Some(callback) = self.callback.as_ref() {
                callback.sound_finished(*id);
            }
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Log(RefCell<Vec<String>>);

    impl AudioCallback for Log {
        fn sound_play(&self, id: SoundId, name: &str, _length: Option<Duration>) {
            self.0.borrow_mut().push(format!("play {name} {id}"));
        }

        fn sound_finished(&self, id: SoundId) {
            self.0.borrow_mut().push(format!("done {id}"));
        }
    }

    #[test]
    fn timed_sounds_finish_and_release_their_handle() {
        let log = Rc::new(Log::default());
        let mut mixer = SoundMixer::new(Some(log.clone()));
        let id = mixer
            .play("splash", Some(Duration::from_millis(30)))
            .expect("sound id");
        assert!(mixer.owns(id));
        assert!(mixer.is_playing(id));
        assert!(mixer.update(Duration::from_millis(20)).is_empty());
        assert_eq!(mixer.update(Duration::from_millis(20)), vec![id]);
        assert!(!mixer.is_playing(id));
        assert_eq!(
            log.0.borrow().as_slice(),
            [format!("play splash {id}"), format!("done {id}")]
        );
    }

    #[test]
    fn looping_sounds_play_until_stopped() {
        let mut mixer = SoundMixer::default();
        let id = mixer.play("music", None).expect("sound id");
        mixer.update(Duration::from_secs(60));
        assert!(mixer.is_playing(id));
        assert!(mixer.stop(id));
        assert!(!mixer.stop(id));
    }
}
