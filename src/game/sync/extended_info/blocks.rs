//! Extended info state blocks
//!
//! Plain data describing what an avatar is doing this tick. Encoders in
//! `encoders` turn these into client-variant specific bytes.

/// Face index meaning "stop facing"
pub const FACE_RESET: u16 = u16::MAX;

/// Sequence id meaning "stop animating"
pub const SEQUENCE_RESET: u16 = u16::MAX;

/// Face another entity (players are offset by 32768 on the client)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceEntity {
    pub target: u16,
}

impl Default for FaceEntity {
    fn default() -> Self {
        Self { target: FACE_RESET }
    }
}

/// Face a coordinate, stored doubled so the client can face tile centres
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceCoord {
    pub x: u16,
    pub z: u16,
}

impl FaceCoord {
    /// Create from tile coordinates (doubled for the client)
    pub fn from_tile(x: u16, z: u16) -> Self {
        Self {
            x: x * 2 + 1,
            z: z * 2 + 1,
        }
    }
}

/// Overhead text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Say {
    pub text: String,
}

/// Animation sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub id: u16,
    pub delay: u8,
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            id: SEQUENCE_RESET,
            delay: 0,
        }
    }
}

/// Graphics effect played on the avatar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpotAnim {
    pub id: u16,
    pub height: u16,
    pub delay: u16,
}

/// Public chat; `message` is the already compressed payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chat {
    pub effects: u16,
    pub rights: u8,
    pub message: Vec<u8>,
}

/// Hit splat. The splat type shown depends on who is looking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hit {
    /// Player index of whoever dealt the hit
    pub source: Option<u16>,
    pub damage: u16,
    /// Type shown to the source and the victim
    pub self_type: u8,
    /// Type shown to everyone else
    pub other_type: u8,
    pub current_hp: u16,
    pub max_hp: u16,
}

impl Hit {
    /// Health bar fill in 1/255ths
    pub fn health_ratio(&self) -> u8 {
        if self.max_hp == 0 {
            return 0;
        }
        let ratio = (self.current_hp.min(self.max_hp) as u32 * 255) / self.max_hp as u32;
        ratio as u8
    }

    /// Splat type for an observer
    pub fn type_for(&self, observer_is_party: bool) -> u8 {
        if observer_is_party {
            self.self_type
        } else {
            self.other_type
        }
    }
}

/// Number of worn/body slots in an appearance
pub const APPEARANCE_SLOTS: usize = 12;

/// Offset of body-part ids in appearance slots
pub const BODY_PART_OFFSET: u16 = 256;

/// Player appearance (for model rendering)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appearance {
    /// Gender (0 = male, 1 = female)
    pub gender: u8,
    /// Skull icon (-1 = none)
    pub skull_icon: i8,
    /// Prayer icon (-1 = none)
    pub prayer_icon: i8,
    /// Worn items (512+) and body parts (256+), 0 for empty
    pub slots: [u16; APPEARANCE_SLOTS],
    /// Hair, torso, legs, feet, skin
    pub colors: [u8; 5],
    /// Stand, stand turn, walk, turn 180, turn 90 cw, turn 90 ccw, run
    pub render_animations: [u16; 7],
    pub name: String,
    pub combat_level: u8,
    pub skill_level: u16,
    pub hidden: bool,
}

impl Appearance {
    /// Create default male appearance
    pub fn default_male(name: impl Into<String>) -> Self {
        let body = |part: u16| BODY_PART_OFFSET + part;
        Self {
            gender: 0,
            skull_icon: -1,
            prayer_icon: -1,
            slots: [
                0,
                0,
                0,
                0,
                body(18),
                0,
                body(26),
                body(36),
                body(0),
                body(33),
                body(42),
                body(10),
            ],
            colors: [0; 5],
            render_animations: [808, 823, 819, 820, 821, 822, 824],
            name: name.into(),
            combat_level: 3,
            skill_level: 0,
            hidden: false,
        }
    }
}

impl Default for Appearance {
    fn default() -> Self {
        Self::default_male("")
    }
}
