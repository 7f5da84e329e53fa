use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flags::{Facing, UseDirection};
use crate::verbs::{VerbDescriptor, VerbId, VerbTable};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl From<[f32; 2]> for Vec2 {
    fn from(value: [f32; 2]) -> Self {
        Vec2::new(value[0], value[1])
    }
}

impl From<Vec2> for [f32; 2] {
    fn from(value: Vec2) -> Self {
        [value.x, value.y]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default)]
    pub facing: Facing,
    /// Room units per second.
    #[serde(default)]
    pub walk_speed: Option<f32>,
    #[serde(default, alias = "use_pos")]
    pub use_offset: Vec2,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub default_verb: Option<VerbId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default, alias = "use_pos")]
    pub use_offset: Vec2,
    #[serde(default)]
    pub use_direction: UseDirection,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub default_verb: Option<VerbId>,
    /// Actor carrying the object; owned objects are inventory items.
    #[serde(default)]
    pub owner: Option<String>,
}

/// One room worth of entities plus the verb table scripts run against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    pub room: String,
    #[serde(default)]
    pub actors: Vec<ActorDef>,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
    #[serde(default)]
    pub selected_actor: Option<String>,
    #[serde(default)]
    pub verbs: Option<Vec<VerbDescriptor>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("entity id `{0}` is declared more than once")]
    DuplicateEntity(String),
    #[error("object `{object}` is owned by unknown actor `{owner}`")]
    UnknownOwner { object: String, owner: String },
    #[error("selected actor `{0}` is not declared")]
    UnknownSelectedActor(String),
}

impl SceneFile {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene file: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("failed to load scene: {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let scene: SceneFile = serde_json::from_str(raw).context("parsing scene json")?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        let mut seen = BTreeSet::new();
        let ids = self
            .actors
            .iter()
            .map(|actor| &actor.id)
            .chain(self.objects.iter().map(|object| &object.id));
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(SceneError::DuplicateEntity(id.clone()));
            }
        }
        let is_actor = |id: &str| self.actors.iter().any(|actor| actor.id == id);
        for object in &self.objects {
            if let Some(owner) = object.owner.as_deref() {
                if !is_actor(owner) {
                    return Err(SceneError::UnknownOwner {
                        object: object.id.clone(),
                        owner: owner.to_string(),
                    });
                }
            }
        }
        if let Some(selected) = self.selected_actor.as_deref() {
            if !is_actor(selected) {
                return Err(SceneError::UnknownSelectedActor(selected.to_string()));
            }
        }
        Ok(())
    }

    pub fn verb_table(&self) -> VerbTable {
        match &self.verbs {
            Some(verbs) => VerbTable::from_descriptors(verbs.iter().cloned()),
            None => VerbTable::default(),
        }
    }
}
