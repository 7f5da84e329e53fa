//! In-memory stand-in for the rendering, audio and room collaborators: just
//! enough state (positions, walking, talking, animation and sound timers,
//! camera, dialog, cutscene and input flags) for completion predicates and
//! verb handlers to observe.

mod actors;
mod entity;
mod objects;
mod sounds;

pub use actors::{
    say_line_duration, ActorState, ActorUpdate, Animation, DEFAULT_WALK_SPEED, IDLE_ANIMATION,
    TALK_ANIMATION, WALK_ANIMATION,
};
pub use entity::{EntityInfo, EntityKind, EntityRef, HookNames};
pub use objects::ObjectState;
pub use sounds::{AudioCallback, PlayingSound, SoundId, SoundMixer};

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use woodtick_formats::{Facing, SceneFile, UseFlag, Vec2, VerbId, VerbTable};

#[derive(Debug, Clone, Serialize)]
pub struct CameraPan {
    pub from: Vec2,
    pub to: Vec2,
    pub length: Duration,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Camera {
    pub position: Vec2,
    pub pan: Option<CameraPan>,
}

impl Camera {
    fn update(&mut self, elapsed: Duration) {
        let Some(pan) = self.pan.as_mut() else {
            return;
        };
        pan.elapsed += elapsed;
        if pan.elapsed >= pan.length {
            self.position = pan.to;
            self.pan = None;
            return;
        }
        let t = pan.elapsed.as_secs_f32() / pan.length.as_secs_f32();
        self.position = Vec2::new(
            pan.from.x + (pan.to.x - pan.from.x) * t,
            pan.from.y + (pan.to.y - pan.from.y) * t,
        );
    }
}

/// Second-object selection the verb UI was asked to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UseRequest {
    pub flag: UseFlag,
    pub entity: EntityRef,
}

#[derive(Debug)]
pub struct World {
    room: String,
    frame: u64,
    clock: Duration,
    actors: BTreeMap<String, ActorState>,
    objects: BTreeMap<String, ObjectState>,
    selected_actor: Option<String>,
    sounds: SoundMixer,
    camera: Camera,
    dialog: Option<String>,
    dialog_choices: Vec<i64>,
    cutscene_depth: u32,
    input_active: bool,
    verbs: VerbTable,
    active_verb: VerbId,
    use_request: Option<UseRequest>,
    events: Vec<String>,
}

impl World {
    pub fn from_scene(scene: &SceneFile, audio: Option<Rc<dyn AudioCallback>>) -> Self {
        let actors = scene
            .actors
            .iter()
            .map(|def| (def.id.clone(), ActorState::from_def(def)))
            .collect();
        let objects = scene
            .objects
            .iter()
            .map(|def| (def.id.clone(), ObjectState::from_def(def)))
            .collect();
        let verbs = scene.verb_table();
        let active_verb = verbs.default_verb();
        World {
            room: scene.room.clone(),
            frame: 0,
            clock: Duration::ZERO,
            actors,
            objects,
            selected_actor: scene.selected_actor.clone(),
            sounds: SoundMixer::new(audio),
            camera: Camera::default(),
            dialog: None,
            dialog_choices: Vec::new(),
            cutscene_depth: 0,
            input_active: true,
            verbs,
            active_verb,
            use_request: None,
            events: Vec::new(),
        }
    }

    pub fn log_event(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn set_room(&mut self, room: &str) {
        self.room = room.to_string();
        self.log_event(format!("room.enter {room}"));
    }

    pub fn actor(&self, id: &str) -> Option<&ActorState> {
        self.actors.get(id)
    }

    pub fn object(&self, id: &str) -> Option<&ObjectState> {
        self.objects.get(id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorState> {
        self.actors.values()
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectState> {
        self.objects.values()
    }

    pub fn entity(&self, id: &str) -> Option<EntityRef> {
        if self.actors.contains_key(id) {
            Some(EntityRef::actor(id))
        } else if self.objects.contains_key(id) {
            Some(EntityRef::object(id))
        } else {
            None
        }
    }

    pub fn entity_info(&self, entity: &EntityRef) -> Option<EntityInfo> {
        match entity.kind {
            EntityKind::Actor => {
                let actor = self.actors.get(&entity.id)?;
                Some(EntityInfo {
                    entity: entity.clone(),
                    position: actor.position,
                    use_offset: actor.use_offset,
                    flags: actor.flags,
                    default_verb: actor.default_verb,
                    use_direction: None,
                    facing: Some(actor.facing),
                    in_inventory: false,
                })
            }
            EntityKind::Object => {
                let object = self.objects.get(&entity.id)?;
                Some(EntityInfo {
                    entity: entity.clone(),
                    position: object.position,
                    use_offset: object.use_offset,
                    flags: object.flags,
                    default_verb: object.default_verb,
                    use_direction: Some(object.use_direction),
                    facing: None,
                    in_inventory: object.in_inventory(),
                })
            }
        }
    }

    pub fn selected_actor(&self) -> Option<&str> {
        self.selected_actor.as_deref()
    }

    pub fn select_actor(&mut self, id: &str) -> bool {
        if !self.actors.contains_key(id) {
            return false;
        }
        self.selected_actor = Some(id.to_string());
        self.log_event(format!("actor.select {id}"));
        true
    }

    pub fn actor_walking(&self, id: &str) -> Option<bool> {
        self.actors.get(id).map(ActorState::is_walking)
    }

    pub fn actor_talking(&self, id: &str) -> Option<bool> {
        self.actors.get(id).map(ActorState::is_talking)
    }

    pub fn any_actor_talking(&self) -> bool {
        self.actors.values().any(ActorState::is_talking)
    }

    pub fn actor_animation(&self, id: &str) -> Option<&str> {
        self.actors.get(id)?.current_animation()
    }

    pub fn object_animating(&self, id: &str) -> Option<bool> {
        self.objects.get(id).map(ObjectState::is_animating)
    }

    pub fn actor_facing(&self, id: &str) -> Option<Facing> {
        self.actors.get(id).map(|actor| actor.facing)
    }

    pub fn walk_actor_to(&mut self, id: &str, destination: Vec2, facing: Option<Facing>) -> bool {
        let Some(actor) = self.actors.get_mut(id) else {
            return false;
        };
        actor.start_walk(destination, facing);
        self.log_event(format!(
            "actor.walk {id} -> ({:.1}, {:.1})",
            destination.x, destination.y
        ));
        true
    }

    pub fn say_line(&mut self, id: &str, line: &str) -> bool {
        let Some(actor) = self.actors.get_mut(id) else {
            return false;
        };
        actor.say(line);
        self.log_event(format!("actor.say {id} \"{line}\""));
        true
    }

    pub fn stop_talking(&mut self, id: Option<&str>) {
        let stopped: Vec<String> = self
            .actors
            .values_mut()
            .filter(|actor| id.map_or(true, |wanted| actor.id == wanted))
            .filter_map(|actor| actor.stop_talking().then(|| actor.id.clone()))
            .collect();
        for actor in stopped {
            self.log_event(format!("actor.stop_talking {actor}"));
        }
    }

    pub fn play_actor_animation(&mut self, id: &str, name: &str, length: Option<Duration>) -> bool {
        let Some(actor) = self.actors.get_mut(id) else {
            return false;
        };
        actor.play(name, length);
        self.log_event(format!("actor.anim {id} {name}"));
        true
    }

    pub fn play_object_animation(
        &mut self,
        id: &str,
        name: &str,
        length: Option<Duration>,
    ) -> bool {
        let Some(object) = self.objects.get_mut(id) else {
            return false;
        };
        object.play(name, length);
        self.log_event(format!("object.anim {id} {name}"));
        true
    }

    pub fn play_sound(&mut self, name: &str, length: Option<Duration>) -> Option<SoundId> {
        let id = self.sounds.play(name, length)?;
        self.log_event(format!("sound.play {name} (#{id})"));
        Some(id)
    }

    pub fn stop_sound(&mut self, id: SoundId) -> bool {
        let stopped = self.sounds.stop(id);
        if stopped {
            self.log_event(format!("sound.stop #{id}"));
        }
        stopped
    }

    pub fn sound_playing(&self, id: SoundId) -> Option<bool> {
        self.sounds.is_playing(id).then_some(true)
    }

    /// Whether `id` lies in the sound handle range.
    pub fn is_sound_handle(&self, id: u32) -> bool {
        self.sounds.owns(id)
    }

    pub fn sounds(&self) -> &SoundMixer {
        &self.sounds
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_moving(&self) -> bool {
        self.camera.pan.is_some()
    }

    pub fn pan_camera(&mut self, to: Vec2, length: Duration) {
        if length.is_zero() {
            self.camera.position = to;
            self.camera.pan = None;
        } else {
            self.camera.pan = Some(CameraPan {
                from: self.camera.position,
                to,
                length,
                elapsed: Duration::ZERO,
            });
        }
        self.log_event(format!("camera.pan ({:.1}, {:.1})", to.x, to.y));
    }

    pub fn dialog_active(&self) -> bool {
        self.dialog.is_some()
    }

    pub fn start_dialog(&mut self, name: &str) {
        self.dialog = Some(name.to_string());
        self.log_event(format!("dialog.start {name}"));
    }

    pub fn end_dialog(&mut self) {
        if let Some(name) = self.dialog.take() {
            self.log_event(format!("dialog.end {name}"));
        }
    }

    pub fn choose_dialog(&mut self, choice: i64) {
        self.dialog_choices.push(choice);
        self.log_event(format!("dialog.choose {choice}"));
    }

    pub fn dialog_choices(&self) -> &[i64] {
        &self.dialog_choices
    }

    pub fn cutscene_active(&self) -> bool {
        self.cutscene_depth > 0
    }

    pub fn begin_cutscene(&mut self) {
        self.cutscene_depth += 1;
        self.log_event(format!("cutscene.begin depth={}", self.cutscene_depth));
    }

    pub fn end_cutscene(&mut self) {
        if self.cutscene_depth == 0 {
            return;
        }
        self.cutscene_depth -= 1;
        self.log_event(format!("cutscene.end depth={}", self.cutscene_depth));
    }

    pub fn input_active(&self) -> bool {
        self.input_active
    }

    pub fn set_input_active(&mut self, active: bool) {
        if self.input_active != active {
            self.input_active = active;
            let state = if active { "on" } else { "off" };
            self.log_event(format!("input.{state}"));
        }
    }

    pub fn verbs(&self) -> &VerbTable {
        &self.verbs
    }

    pub fn active_verb(&self) -> VerbId {
        self.active_verb
    }

    pub fn set_verb(&mut self, verb: VerbId) {
        self.active_verb = verb;
        self.log_event(format!("verb.set {verb}"));
    }

    /// Back to the table's default verb; ends any pending use-mode request.
    pub fn reset_verb(&mut self) {
        self.active_verb = self.verbs.default_verb();
        self.use_request = None;
        self.log_event(format!("verb.reset {}", self.active_verb));
    }

    pub fn request_use_mode(&mut self, flag: UseFlag, entity: EntityRef) {
        self.log_event(format!("verb.use_mode {} {}", flag.as_str(), entity.id));
        self.use_request = Some(UseRequest { flag, entity });
    }

    pub fn use_request(&self) -> Option<&UseRequest> {
        self.use_request.as_ref()
    }

    pub fn object_owner(&self, id: &str) -> Option<&str> {
        self.objects.get(id)?.owner.as_deref()
    }

    /// Moves an object into `receiver`'s inventory.
    pub fn give_object(&mut self, object: &str, receiver: &str) -> bool {
        if !self.actors.contains_key(receiver) {
            return false;
        }
        let Some(state) = self.objects.get_mut(object) else {
            return false;
        };
        state.owner = Some(receiver.to_string());
        self.log_event(format!("object.give {object} -> {receiver}"));
        true
    }

    pub fn set_object_flags(&mut self, id: &str, flags: u32) -> bool {
        let Some(object) = self.objects.get_mut(id) else {
            return false;
        };
        object.flags = flags;
        true
    }

    /// Advances the clock by one frame and every timer by `elapsed`.
    pub fn update(&mut self, elapsed: Duration) {
        self.frame += 1;
        self.clock += elapsed;
        let mut notes = Vec::new();
        for actor in self.actors.values_mut() {
            let update = actor.update(elapsed);
            if update.arrived {
                notes.push(format!("actor.arrived {}", actor.id));
            }
            if update.finished_talking {
                notes.push(format!("actor.talk_done {}", actor.id));
            }
        }
        for object in self.objects.values_mut() {
            if let Some(animation) = object.update(elapsed) {
                notes.push(format!("object.anim_done {} {animation}", object.id));
            }
        }
        for id in self.sounds.update(elapsed) {
            notes.push(format!("sound.done #{id}"));
        }
        self.camera.update(elapsed);
        self.events.extend(notes);
    }
}

#[cfg(test)]
mod tests {
    use woodtick_formats::{object_flags, SceneFile};

    use super::*;

    const SCENE: &str = r#"{
        "room": "dock",
        "selected_actor": "guybrush",
        "actors": [
            { "id": "guybrush", "position": [0, 0], "walk_speed": 100 },
            { "id": "largo", "position": [50, 0], "facing": "left" }
        ],
        "objects": [
            { "id": "rope", "position": [20, 0], "flags": 32768 },
            { "id": "map", "owner": "guybrush" }
        ]
    }"#;

    fn world() -> World {
        let scene = SceneFile::parse(SCENE).expect("scene");
        World::from_scene(&scene, None)
    }

    #[test]
    fn entity_lookup_tags_kind() {
        let world = world();
        assert_eq!(world.entity("largo"), Some(EntityRef::actor("largo")));
        assert_eq!(world.entity("rope"), Some(EntityRef::object("rope")));
        assert_eq!(world.entity("ghost"), None);
        let rope = world
            .entity_info(&EntityRef::object("rope"))
            .expect("rope info");
        assert_eq!(rope.flags, object_flags::REACH_HIGH);
        let map = world.entity_info(&EntityRef::object("map")).expect("map");
        assert!(map.in_inventory);
    }

    #[test]
    fn update_moves_frame_clock_and_walkers() {
        let mut world = world();
        assert!(world.walk_actor_to("guybrush", Vec2::new(10.0, 0.0), Some(Facing::Back)));
        assert_eq!(world.actor_walking("guybrush"), Some(true));
        world.update(Duration::from_millis(100));
        assert_eq!(world.frame(), 1);
        assert_eq!(world.clock(), Duration::from_millis(100));
        assert_eq!(world.actor_walking("guybrush"), Some(false));
        assert_eq!(world.actor_facing("guybrush"), Some(Facing::Back));
        assert!(world.events().iter().any(|e| e == "actor.arrived guybrush"));
    }

    #[test]
    fn give_moves_object_into_inventory() {
        let mut world = world();
        assert!(world.give_object("rope", "largo"));
        assert_eq!(world.object_owner("rope"), Some("largo"));
        assert!(!world.give_object("rope", "ghost"));
    }

    #[test]
    fn camera_pan_reports_motion_until_done() {
        let mut world = world();
        world.pan_camera(Vec2::new(100.0, 0.0), Duration::from_millis(200));
        assert!(world.camera_moving());
        world.update(Duration::from_millis(100));
        assert!(world.camera_moving());
        assert!((world.camera().position.x - 50.0).abs() < 0.01);
        world.update(Duration::from_millis(100));
        assert!(!world.camera_moving());
    }

    #[test]
    fn cutscenes_nest_and_input_toggles_once() {
        let mut world = world();
        world.begin_cutscene();
        world.begin_cutscene();
        world.end_cutscene();
        assert!(world.cutscene_active());
        world.end_cutscene();
        world.end_cutscene();
        assert!(!world.cutscene_active());

        world.set_input_active(false);
        world.set_input_active(false);
        assert!(!world.input_active());
        let toggles = world.events().iter().filter(|e| *e == "input.off").count();
        assert_eq!(toggles, 1);
    }
}
