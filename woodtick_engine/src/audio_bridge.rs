use std::{cell::RefCell, rc::Rc, time::Duration};

use serde::Serialize;

use crate::world::{AudioCallback, SoundId};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoundEvent {
    Play {
        id: SoundId,
        name: String,
        length_seconds: Option<f64>,
    },
    Stop {
        id: SoundId,
    },
    Finished {
        id: SoundId,
    },
}

#[derive(Clone, Default)]
pub struct RecordingAudioCallback {
    events: Rc<RefCell<Vec<SoundEvent>>>,
}

impl RecordingAudioCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SoundEvent> {
        self.events.borrow().clone()
    }
}

impl AudioCallback for RecordingAudioCallback {
    fn sound_play(&self, id: SoundId, name: &str, length: Option<Duration>) {
        self.events.borrow_mut().push(SoundEvent::Play {
            id,
            name: name.to_string(),
            length_seconds: length.map(|value| value.as_secs_f64()),
        });
    }

    fn sound_stop(&self, id: SoundId) {
        self.events.borrow_mut().push(SoundEvent::Stop { id });
    }

    fn sound_finished(&self, id: SoundId) {
        self.events.borrow_mut().push(SoundEvent::Finished { id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_callback_tracks_sound_lifecycle() {
        let callback = RecordingAudioCallback::new();
        callback.sound_play(10_001, "splash", Some(Duration::from_millis(500)));
        callback.sound_play(10_002, "gulls", None);
        callback.sound_finished(10_001);
        callback.sound_stop(10_002);

        assert_eq!(
            callback.events(),
            vec![
                SoundEvent::Play {
                    id: 10_001,
                    name: "splash".to_string(),
                    length_seconds: Some(0.5),
                },
                SoundEvent::Play {
                    id: 10_002,
                    name: "gulls".to_string(),
                    length_seconds: None,
                },
                SoundEvent::Finished { id: 10_001 },
                SoundEvent::Stop { id: 10_002 },
            ]
        );
    }

    #[test]
    fn sound_events_serialize_with_a_kind_tag() {
        let json = serde_json::to_value(SoundEvent::Stop { id: 7 }).expect("json");
        assert_eq!(json, serde_json::json!({ "kind": "stop", "id": 7 }));
    }
}
