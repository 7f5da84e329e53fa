use serde::{Deserialize, Serialize};

/// Bits stored in an entity's `flags` attribute.
pub mod object_flags {
    pub const USE_WITH: u32 = 0x2;
    pub const USE_ON: u32 = 0x4;
    pub const USE_IN: u32 = 0x8;
    /// Shares its bit with `USE_IN`; look-at only tests it when no walk is wanted.
    pub const FAR_LOOK: u32 = 0x8;
    pub const DOOR: u32 = 0x40;
    pub const GIVEABLE: u32 = 0x1000;
    pub const TALKABLE: u32 = 0x2000;
    pub const IMMEDIATE: u32 = 0x4000;
    pub const REACH_HIGH: u32 = 0x8000;
    pub const REACH_MED: u32 = 0x10000;
    pub const REACH_LOW: u32 = 0x20000;
    pub const REACH_NONE: u32 = 0x40000;
    pub const FEMALE: u32 = 0x80000;
    pub const MALE: u32 = 0x100000;
    pub const PERSON: u32 = 0x200000;
}

/// Second-object selection mode requested from the verb UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseFlag {
    UseWith,
    UseOn,
    UseIn,
    GiveTo,
}

impl UseFlag {
    /// Maps a raw flags value onto a use mode. Only an exact match counts:
    /// a value with several use bits set selects nothing.
    pub fn from_exact_flags(flags: u32) -> Option<Self> {
        match flags {
            object_flags::USE_WITH => Some(UseFlag::UseWith),
            object_flags::USE_ON => Some(UseFlag::UseOn),
            object_flags::USE_IN => Some(UseFlag::UseIn),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UseFlag::UseWith => "use_with",
            UseFlag::UseOn => "use_on",
            UseFlag::UseIn => "use_in",
            UseFlag::GiveTo => "give_to",
        }
    }
}

/// Pose an actor strikes before manipulating an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReachPose {
    High,
    Medium,
    Low,
}

impl ReachPose {
    pub fn from_flags(flags: u32) -> Option<Self> {
        if flags & object_flags::REACH_HIGH == object_flags::REACH_HIGH {
            Some(ReachPose::High)
        } else if flags & object_flags::REACH_MED == object_flags::REACH_MED {
            Some(ReachPose::Medium)
        } else if flags & object_flags::REACH_LOW == object_flags::REACH_LOW {
            Some(ReachPose::Low)
        } else {
            None
        }
    }

    pub fn animation(self) -> &'static str {
        match self {
            ReachPose::High => "reach_high",
            ReachPose::Medium => "reach_med",
            ReachPose::Low => "reach_low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    #[default]
    Front,
    Back,
    Left,
    Right,
}

impl Facing {
    pub fn opposite(self) -> Self {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Front => "front",
            Facing::Back => "back",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "front" => Some(Facing::Front),
            "back" => Some(Facing::Back),
            "left" => Some(Facing::Left),
            "right" => Some(Facing::Right),
            _ => None,
        }
    }
}

/// Side of an object the acting actor stands on when using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseDirection {
    #[default]
    Front,
    Back,
    Left,
    Right,
}

impl From<UseDirection> for Facing {
    fn from(direction: UseDirection) -> Self {
        match direction {
            UseDirection::Front => Facing::Front,
            UseDirection::Back => Facing::Back,
            UseDirection::Left => Facing::Left,
            UseDirection::Right => Facing::Right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_flag_requires_exact_value() {
        assert_eq!(
            UseFlag::from_exact_flags(object_flags::USE_WITH),
            Some(UseFlag::UseWith)
        );
        assert_eq!(
            UseFlag::from_exact_flags(object_flags::USE_IN),
            Some(UseFlag::UseIn)
        );
        assert_eq!(
            UseFlag::from_exact_flags(object_flags::USE_WITH | object_flags::USE_ON),
            None
        );
        assert_eq!(
            UseFlag::from_exact_flags(object_flags::USE_WITH | object_flags::REACH_LOW),
            None
        );
    }

    #[test]
    fn reach_pose_prefers_highest_flag() {
        let flags = object_flags::REACH_LOW | object_flags::REACH_HIGH;
        assert_eq!(ReachPose::from_flags(flags), Some(ReachPose::High));
        assert_eq!(
            ReachPose::from_flags(object_flags::REACH_MED),
            Some(ReachPose::Medium)
        );
        assert_eq!(ReachPose::from_flags(object_flags::REACH_NONE), None);
        assert_eq!(ReachPose::Low.animation(), "reach_low");
    }

    #[test]
    fn facing_opposites_pair_up() {
        assert_eq!(Facing::Left.opposite(), Facing::Right);
        assert_eq!(Facing::Front.opposite(), Facing::Back);
        assert_eq!(Facing::from(UseDirection::Back), Facing::Back);
        assert_eq!(Facing::parse("RIGHT"), Some(Facing::Right));
    }
}
