//! Extended info encoders
//!
//! One plain function per (category, client variant). Encoders must be
//! deterministic: the same state always produces the same bytes for a given
//! variant, which is what lets precomputed buffers be shared by every
//! observer on that variant.
//!
//! The registry is a fixed table per category indexed by `ClientVariant`.
//! It is validated once when the protocol is built; a hole for a supported
//! variant is a startup error.

use crate::error::EncoderError;
use crate::net::buffer::PacketBuffer;
use crate::protocol::ClientVariant;

use super::blocks::{
    Appearance, Chat, FaceCoord, FaceEntity, Hit, Say, Sequence, SpotAnim,
};
use super::ExtendedInfoKind;

/// Largest payload a single length byte can describe
pub const MAX_BYTE_PAYLOAD: usize = u8::MAX as usize;

/// Encoder for a precomputed category
pub type Encoder<T> = fn(&T, &mut PacketBuffer) -> Result<(), EncoderError>;

/// Encoder for hits; `observer_is_party` is set when the observer dealt or
/// received the hit
pub type HitEncoder = fn(&Hit, bool, &mut PacketBuffer) -> Result<(), EncoderError>;

/// Per-variant encoders of one category
#[derive(Debug, Clone, Copy)]
pub struct EncoderTable<F: Copy> {
    kind: ExtendedInfoKind,
    slots: [Option<F>; ClientVariant::COUNT],
}

impl<F: Copy> EncoderTable<F> {
    pub fn new(kind: ExtendedInfoKind) -> Self {
        Self {
            kind,
            slots: [None; ClientVariant::COUNT],
        }
    }

    pub fn kind(&self) -> ExtendedInfoKind {
        self.kind
    }

    /// Install an encoder, replacing any previous one for the variant
    pub fn register(&mut self, variant: ClientVariant, encoder: F) {
        self.slots[variant.id()] = Some(encoder);
    }

    pub fn get(&self, variant: ClientVariant) -> Result<F, EncoderError> {
        self.slots[variant.id()].ok_or(EncoderError::MissingEncoder {
            kind: self.kind,
            variant,
        })
    }
}

/// Every category's encoder table
#[derive(Debug, Clone)]
pub struct EncoderRegistry {
    pub face_entity: EncoderTable<Encoder<FaceEntity>>,
    pub face_coord: EncoderTable<Encoder<FaceCoord>>,
    pub say: EncoderTable<Encoder<Say>>,
    pub sequence: EncoderTable<Encoder<Sequence>>,
    pub appearance: EncoderTable<Encoder<Appearance>>,
    pub chat: EncoderTable<Encoder<Chat>>,
    pub spot_anim: EncoderTable<Encoder<SpotAnim>>,
    pub hit: EncoderTable<HitEncoder>,
}

impl EncoderRegistry {
    /// Registry with no encoders installed
    pub fn empty() -> Self {
        Self {
            face_entity: EncoderTable::new(ExtendedInfoKind::FaceEntity),
            face_coord: EncoderTable::new(ExtendedInfoKind::FaceCoord),
            say: EncoderTable::new(ExtendedInfoKind::Say),
            sequence: EncoderTable::new(ExtendedInfoKind::Sequence),
            appearance: EncoderTable::new(ExtendedInfoKind::Appearance),
            chat: EncoderTable::new(ExtendedInfoKind::Chat),
            spot_anim: EncoderTable::new(ExtendedInfoKind::SpotAnim),
            hit: EncoderTable::new(ExtendedInfoKind::Hit),
        }
    }

    /// Registry with the built-in encoders for every client variant
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for variant in ClientVariant::ALL {
            match variant {
                ClientVariant::Legacy => registry.register_legacy(variant),
                ClientVariant::Native | ClientVariant::Mobile => registry.register_native(variant),
            }
        }
        registry
    }

    fn register_legacy(&mut self, variant: ClientVariant) {
        self.face_entity.register(variant, legacy::face_entity);
        self.face_coord.register(variant, legacy::face_coord);
        self.say.register(variant, legacy::say);
        self.sequence.register(variant, legacy::sequence);
        self.appearance.register(variant, legacy::appearance);
        self.chat.register(variant, legacy::chat);
        self.spot_anim.register(variant, legacy::spot_anim);
        self.hit.register(variant, legacy::hit);
    }

    fn register_native(&mut self, variant: ClientVariant) {
        self.face_entity.register(variant, native::face_entity);
        self.face_coord.register(variant, native::face_coord);
        self.say.register(variant, native::say);
        self.sequence.register(variant, native::sequence);
        self.appearance.register(variant, native::appearance);
        self.chat.register(variant, native::chat);
        self.spot_anim.register(variant, native::spot_anim);
        self.hit.register(variant, native::hit);
    }

    /// Check every category has an encoder for every variant in `variants`
    pub fn validate(&self, variants: &[ClientVariant]) -> Result<(), EncoderError> {
        for &variant in variants {
            self.face_entity.get(variant)?;
            self.face_coord.get(variant)?;
            self.say.get(variant)?;
            self.sequence.get(variant)?;
            self.appearance.get(variant)?;
            self.chat.get(variant)?;
            self.spot_anim.get(variant)?;
            self.hit.get(variant)?;
        }
        Ok(())
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn check_len(kind: ExtendedInfoKind, size: usize) -> Result<(), EncoderError> {
    if size > MAX_BYTE_PAYLOAD {
        return Err(EncoderError::PayloadTooLarge {
            kind,
            size,
            max: MAX_BYTE_PAYLOAD,
        });
    }
    Ok(())
}

/// Length of the appearance body written after the placeholder at `start`;
/// an oversized body is dropped from the buffer
fn finish_appearance(buffer: &mut PacketBuffer, start: usize) -> Result<u8, EncoderError> {
    let len = buffer.len() - start - 1;
    if let Err(e) = check_len(ExtendedInfoKind::Appearance, len) {
        buffer.truncate(start);
        return Err(e);
    }
    Ok(len as u8)
}

/// Body of the appearance block shared by both variants, minus the name
fn write_appearance_body(appearance: &Appearance, buffer: &mut PacketBuffer) {
    buffer.write_ubyte(appearance.gender);
    buffer.write_byte(appearance.skull_icon);
    buffer.write_byte(appearance.prayer_icon);

    for &slot in &appearance.slots {
        if slot == 0 {
            buffer.write_ubyte(0);
        } else {
            buffer.write_ushort(slot);
        }
    }

    for &color in &appearance.colors {
        buffer.write_ubyte(color);
    }

    for &animation in &appearance.render_animations {
        buffer.write_ushort(animation);
    }
}

/// Convert a display name to its base-37 long form
pub fn string_to_long(s: &str) -> i64 {
    let mut result: i64 = 0;

    for c in s.chars().take(12) {
        result *= 37;
        match c {
            'A'..='Z' => result += (c as i64) - 64,
            'a'..='z' => result += (c as i64) - 96,
            '0'..='9' => result += (c as i64) - 21,
            _ => {}
        }
    }

    while result % 37 == 0 && result != 0 {
        result /= 37;
    }

    result
}

pub mod legacy {
    //! Encoders for the legacy client

    use super::*;

    pub fn face_entity(state: &FaceEntity, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        buffer.write_ushort_le(state.target);
        Ok(())
    }

    pub fn face_coord(state: &FaceCoord, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        buffer.write_ushort_le(state.x);
        buffer.write_ushort_le(state.z);
        Ok(())
    }

    pub fn say(state: &Say, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        check_len(ExtendedInfoKind::Say, state.text.len())?;
        buffer.write_string(&state.text);
        Ok(())
    }

    pub fn sequence(state: &Sequence, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        buffer.write_ushort_le(state.id);
        buffer.write_ubyte(state.delay);
        Ok(())
    }

    pub fn spot_anim(state: &SpotAnim, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        buffer.write_ushort_le(state.id);
        let settings = ((state.height as u32) << 16) | (state.delay as u32);
        buffer.write_int(settings as i32);
        Ok(())
    }

    pub fn chat(state: &Chat, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        check_len(ExtendedInfoKind::Chat, state.message.len())?;
        buffer.write_ushort_le(state.effects);
        buffer.write_ubyte(state.rights);
        buffer.write_ubyte(state.message.len() as u8);
        buffer.write_bytes_reversed(&state.message);
        Ok(())
    }

    pub fn appearance(state: &Appearance, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        let start = buffer.len();
        buffer.write_ubyte(0);
        write_appearance_body(state, buffer);
        buffer.write_long(string_to_long(&state.name));
        buffer.write_ubyte(state.combat_level);
        buffer.write_ushort(state.skill_level);
        buffer.write_ubyte(state.hidden as u8);

        let len = finish_appearance(buffer, start)?;
        buffer.reverse_from(start + 1);
        buffer.set_byte(start, len);
        Ok(())
    }

    pub fn hit(
        state: &Hit,
        observer_is_party: bool,
        buffer: &mut PacketBuffer,
    ) -> Result<(), EncoderError> {
        buffer.write_smart(state.damage.min(32767));
        buffer.write_ubyte(state.type_for(observer_is_party));
        buffer.write_ubyte(state.health_ratio());
        Ok(())
    }
}

pub mod native {
    //! Encoders for the native (desktop and mobile) clients

    use super::*;

    pub fn face_entity(state: &FaceEntity, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        buffer.write_short_a(state.target);
        Ok(())
    }

    pub fn face_coord(state: &FaceCoord, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        buffer.write_short_le_a(state.x);
        buffer.write_ushort(state.z);
        Ok(())
    }

    pub fn say(state: &Say, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        check_len(ExtendedInfoKind::Say, state.text.len())?;
        buffer.write_ubyte(state.text.len() as u8);
        buffer.write_bytes(state.text.as_bytes());
        Ok(())
    }

    pub fn sequence(state: &Sequence, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        buffer.write_short_a(state.id);
        buffer.write_byte_s(state.delay);
        Ok(())
    }

    pub fn spot_anim(state: &SpotAnim, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        buffer.write_short_le_a(state.id);
        let settings = ((state.height as u32) << 16) | (state.delay as u32);
        buffer.write_int_v1(settings as i32);
        Ok(())
    }

    pub fn chat(state: &Chat, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        check_len(ExtendedInfoKind::Chat, state.message.len())?;
        buffer.write_short_a(state.effects);
        buffer.write_byte_s(state.rights);
        buffer.write_byte_a(state.message.len() as u8);
        buffer.write_bytes(&state.message);
        Ok(())
    }

    pub fn appearance(state: &Appearance, buffer: &mut PacketBuffer) -> Result<(), EncoderError> {
        let start = buffer.len();
        buffer.write_ubyte(0);
        write_appearance_body(state, buffer);
        buffer.write_string(&state.name);
        buffer.write_ubyte(state.combat_level);
        buffer.write_ushort(state.skill_level);
        buffer.write_ubyte(state.hidden as u8);

        let len = finish_appearance(buffer, start)?;
        buffer.set_byte(start, len.wrapping_add(128));
        Ok(())
    }

    pub fn hit(
        state: &Hit,
        observer_is_party: bool,
        buffer: &mut PacketBuffer,
    ) -> Result<(), EncoderError> {
        buffer.write_smart(state.damage.min(32767));
        buffer.write_byte_a(state.type_for(observer_is_party));
        buffer.write_byte_s(state.health_ratio());
        Ok(())
    }
}
