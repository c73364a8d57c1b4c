//! Extended info framework
//!
//! Every non-positional attribute of an avatar (appearance, animation,
//! chat, ...) lives in an `ExtendedInfo<T>` container. Once per tick, for
//! each flagged category, the state is serialized for every supported
//! client variant into an exact-size `SharedBuffer`. Packet assembly then
//! copies those bytes into each observer's packet without re-encoding.
//!
//! Hits are the exception: the splat type depends on the observer, so they
//! are encoded into each packet at assembly time.

pub mod blocks;
pub mod encoders;

use std::fmt;

use crate::error::EncoderError;
use crate::game::sync::update_flags::UpdateFlags;
use crate::net::buffer::PacketBuffer;
use crate::net::shared::SharedBuffer;
use crate::protocol::ClientVariant;

pub use blocks::{Appearance, Chat, FaceCoord, FaceEntity, Hit, Say, Sequence, SpotAnim};
pub use encoders::{Encoder, EncoderRegistry, EncoderTable, HitEncoder};

/// Extended info categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedInfoKind {
    FaceEntity,
    FaceCoord,
    Say,
    Sequence,
    Appearance,
    Hit,
    Chat,
    SpotAnim,
}

impl ExtendedInfoKind {
    /// Order categories appear in within a block
    pub const WRITE_ORDER: [ExtendedInfoKind; 8] = [
        ExtendedInfoKind::SpotAnim,
        ExtendedInfoKind::Sequence,
        ExtendedInfoKind::Say,
        ExtendedInfoKind::Chat,
        ExtendedInfoKind::FaceEntity,
        ExtendedInfoKind::Appearance,
        ExtendedInfoKind::FaceCoord,
        ExtendedInfoKind::Hit,
    ];

    /// Mask flag of the category
    pub fn flag(self) -> UpdateFlags {
        match self {
            ExtendedInfoKind::FaceEntity => UpdateFlags::FACE_ENTITY,
            ExtendedInfoKind::FaceCoord => UpdateFlags::FACE_COORD,
            ExtendedInfoKind::Say => UpdateFlags::SAY,
            ExtendedInfoKind::Sequence => UpdateFlags::SEQUENCE,
            ExtendedInfoKind::Appearance => UpdateFlags::APPEARANCE,
            ExtendedInfoKind::Hit => UpdateFlags::HIT,
            ExtendedInfoKind::Chat => UpdateFlags::CHAT,
            ExtendedInfoKind::SpotAnim => UpdateFlags::SPOT_ANIM,
        }
    }
}

impl fmt::Display for ExtendedInfoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One category's state plus its precomputed buffer per client variant.
///
/// Each buffer slot is either empty or holds the only reference this
/// container owns; a slot is released before it is overwritten.
#[derive(Debug, Clone)]
pub struct ExtendedInfo<T> {
    state: T,
    flagged: bool,
    /// State and buffers survive post-update
    persistent: bool,
    buffers: [SharedBuffer; ClientVariant::COUNT],
}

impl<T: Default> ExtendedInfo<T> {
    pub fn new(persistent: bool) -> Self {
        Self {
            state: T::default(),
            flagged: false,
            persistent,
            buffers: Default::default(),
        }
    }

    /// Replace the state and flag it for this tick
    pub fn set(&mut self, state: T) {
        self.state = state;
        self.flagged = true;
    }

    /// Flag the current state again without changing it
    pub fn flag(&mut self) {
        self.flagged = true;
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged
    }

    /// Precomputed bytes for a variant
    pub fn buffer(&self, variant: ClientVariant) -> Option<&SharedBuffer> {
        let buffer = &self.buffers[variant.id()];
        (!buffer.is_released()).then_some(buffer)
    }

    /// Serialize the state once per variant into exact-size shared buffers
    pub fn precompute(
        &mut self,
        table: &EncoderTable<Encoder<T>>,
        variants: &[ClientVariant],
        scratch: &mut PacketBuffer,
    ) -> Result<(), EncoderError> {
        for &variant in variants {
            let encode = table.get(variant)?;
            let slot = &mut self.buffers[variant.id()];
            slot.release();
            scratch.clear();
            encode(&self.state, scratch)?;
            *slot = SharedBuffer::from_packet(scratch);
        }
        Ok(())
    }

    /// Release every buffer slot
    pub fn release_buffers(&mut self) {
        for buffer in &mut self.buffers {
            buffer.release();
        }
    }

    /// End of tick: drop the flag, and transient state with its buffers
    pub fn post_update(&mut self) {
        self.flagged = false;
        if !self.persistent {
            self.state = T::default();
            self.release_buffers();
        }
    }

    /// Back to a fresh state, releasing buffers
    pub fn reset(&mut self) {
        self.state = T::default();
        self.flagged = false;
        self.release_buffers();
    }
}

/// How one observer sees one avatar's block
#[derive(Debug, Clone, Copy)]
pub struct BlockContext {
    pub variant: ClientVariant,
    /// Send appearance even if it was not flagged this tick
    pub force_appearance: bool,
    /// The observer is looking at its own avatar
    pub self_view: bool,
    /// Player index of the observer, if any
    pub observer: Option<u16>,
    /// Player index of the avatar, for players
    pub subject: Option<u16>,
}

/// All extended info of one avatar
#[derive(Debug, Clone)]
pub struct ExtendedInfoSet {
    pub face_entity: ExtendedInfo<FaceEntity>,
    pub face_coord: ExtendedInfo<FaceCoord>,
    pub say: ExtendedInfo<Say>,
    pub sequence: ExtendedInfo<Sequence>,
    pub appearance: ExtendedInfo<Appearance>,
    pub chat: ExtendedInfo<Chat>,
    pub spot_anim: ExtendedInfo<SpotAnim>,
    /// Encoded per observer, never precomputed
    pub hit: Option<Hit>,
}

impl ExtendedInfoSet {
    pub fn new() -> Self {
        Self {
            face_entity: ExtendedInfo::new(false),
            face_coord: ExtendedInfo::new(false),
            say: ExtendedInfo::new(false),
            sequence: ExtendedInfo::new(false),
            appearance: ExtendedInfo::new(true),
            chat: ExtendedInfo::new(false),
            spot_anim: ExtendedInfo::new(false),
            hit: None,
        }
    }

    /// Categories flagged this tick
    pub fn flags(&self) -> UpdateFlags {
        let mut flags = UpdateFlags::NONE;
        flags.set(UpdateFlags::FACE_ENTITY, self.face_entity.is_flagged());
        flags.set(UpdateFlags::FACE_COORD, self.face_coord.is_flagged());
        flags.set(UpdateFlags::SAY, self.say.is_flagged());
        flags.set(UpdateFlags::SEQUENCE, self.sequence.is_flagged());
        flags.set(UpdateFlags::APPEARANCE, self.appearance.is_flagged());
        flags.set(UpdateFlags::CHAT, self.chat.is_flagged());
        flags.set(UpdateFlags::SPOT_ANIM, self.spot_anim.is_flagged());
        flags.set(UpdateFlags::HIT, self.hit.is_some());
        flags
    }

    /// Precompute every flagged category for `variants`
    pub fn precompute(
        &mut self,
        registry: &EncoderRegistry,
        variants: &[ClientVariant],
        scratch: &mut PacketBuffer,
    ) -> Result<(), EncoderError> {
        if self.face_entity.is_flagged() {
            self.face_entity
                .precompute(&registry.face_entity, variants, scratch)?;
        }
        if self.face_coord.is_flagged() {
            self.face_coord
                .precompute(&registry.face_coord, variants, scratch)?;
        }
        if self.say.is_flagged() {
            self.say.precompute(&registry.say, variants, scratch)?;
        }
        if self.sequence.is_flagged() {
            self.sequence
                .precompute(&registry.sequence, variants, scratch)?;
        }
        if self.appearance.is_flagged() {
            self.appearance
                .precompute(&registry.appearance, variants, scratch)?;
        }
        if self.chat.is_flagged() {
            self.chat.precompute(&registry.chat, variants, scratch)?;
        }
        if self.spot_anim.is_flagged() {
            self.spot_anim
                .precompute(&registry.spot_anim, variants, scratch)?;
        }
        Ok(())
    }

    /// Categories one observer receives for this avatar
    pub fn block_flags(&self, ctx: &BlockContext) -> UpdateFlags {
        let mut flags = self.flags();
        if ctx.force_appearance && self.appearance.buffer(ctx.variant).is_some() {
            flags |= UpdateFlags::APPEARANCE;
        }
        if ctx.self_view {
            flags.remove(UpdateFlags::CHAT);
        }
        flags
    }

    /// Write the mask and each category in `flags` for one observer
    pub fn write_block(
        &self,
        flags: UpdateFlags,
        ctx: &BlockContext,
        registry: &EncoderRegistry,
        out: &mut PacketBuffer,
    ) -> Result<(), EncoderError> {
        flags.write(out);
        for kind in ExtendedInfoKind::WRITE_ORDER {
            if !flags.contains(kind.flag()) {
                continue;
            }
            let precomputed = match kind {
                ExtendedInfoKind::SpotAnim => self.spot_anim.buffer(ctx.variant),
                ExtendedInfoKind::Sequence => self.sequence.buffer(ctx.variant),
                ExtendedInfoKind::Say => self.say.buffer(ctx.variant),
                ExtendedInfoKind::Chat => self.chat.buffer(ctx.variant),
                ExtendedInfoKind::FaceEntity => self.face_entity.buffer(ctx.variant),
                ExtendedInfoKind::Appearance => self.appearance.buffer(ctx.variant),
                ExtendedInfoKind::FaceCoord => self.face_coord.buffer(ctx.variant),
                ExtendedInfoKind::Hit => {
                    if let Some(hit) = &self.hit {
                        let encode = registry.hit.get(ctx.variant)?;
                        let party = ctx.observer.is_some()
                            && (ctx.observer == ctx.subject || hit.source == ctx.observer);
                        encode(hit, party, out)?;
                    }
                    continue;
                }
            };
            match precomputed {
                Some(buffer) => out.write_bytes(buffer.as_bytes()),
                None => return Err(EncoderError::UnsupportedVariant(ctx.variant)),
            }
        }
        Ok(())
    }

    /// End of tick for every category
    pub fn post_update(&mut self) {
        self.face_entity.post_update();
        self.face_coord.post_update();
        self.say.post_update();
        self.sequence.post_update();
        self.appearance.post_update();
        self.chat.post_update();
        self.spot_anim.post_update();
        self.hit = None;
    }

    /// Release every precomputed buffer
    pub fn release_buffers(&mut self) {
        self.face_entity.release_buffers();
        self.face_coord.release_buffers();
        self.say.release_buffers();
        self.sequence.release_buffers();
        self.appearance.release_buffers();
        self.chat.release_buffers();
        self.spot_anim.release_buffers();
    }

    /// Fresh state for a newly allocated avatar
    pub fn reset(&mut self) {
        self.face_entity.reset();
        self.face_coord.reset();
        self.say.reset();
        self.sequence.reset();
        self.appearance.reset();
        self.chat.reset();
        self.spot_anim.reset();
        self.hit = None;
    }
}

impl Default for ExtendedInfoSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(variant: ClientVariant) -> BlockContext {
        BlockContext {
            variant,
            force_appearance: false,
            self_view: false,
            observer: Some(1),
            subject: Some(2),
        }
    }

    #[test]
    fn test_precompute_idempotent_and_releases_old() {
        let registry = EncoderRegistry::standard();
        let mut info: ExtendedInfo<Sequence> = ExtendedInfo::new(false);
        let mut scratch = PacketBuffer::new();
        info.set(Sequence { id: 808, delay: 0 });

        info.precompute(&registry.sequence, &ClientVariant::ALL, &mut scratch)
            .unwrap();
        let first = info.buffer(ClientVariant::Legacy).unwrap();
        let first_bytes = first.as_bytes().to_vec();
        let first_weak = first.downgrade().unwrap();

        info.precompute(&registry.sequence, &ClientVariant::ALL, &mut scratch)
            .unwrap();
        assert!(first_weak.upgrade().is_none());

        let second = info.buffer(ClientVariant::Legacy).unwrap();
        assert_eq!(second.as_bytes(), first_bytes.as_slice());
        assert_eq!(second.ref_count(), 1);
    }

    #[test]
    fn test_precompute_exact_size() {
        let registry = EncoderRegistry::standard();
        let mut info: ExtendedInfo<SpotAnim> = ExtendedInfo::new(false);
        let mut scratch = PacketBuffer::with_capacity(256);
        info.set(SpotAnim {
            id: 5,
            height: 100,
            delay: 0,
        });
        info.precompute(&registry.spot_anim, &[ClientVariant::Native], &mut scratch)
            .unwrap();
        assert_eq!(info.buffer(ClientVariant::Native).unwrap().len(), 6);
        assert!(info.buffer(ClientVariant::Legacy).is_none());
    }

    #[test]
    fn test_post_update_keeps_persistent_buffers() {
        let registry = EncoderRegistry::standard();
        let mut set = ExtendedInfoSet::new();
        let mut scratch = PacketBuffer::new();
        set.appearance.set(Appearance::default_male("Alice"));
        set.say.set(Say {
            text: "hi".to_string(),
        });
        set.precompute(&registry, &ClientVariant::ALL, &mut scratch)
            .unwrap();

        let say_weak = set.say.buffer(ClientVariant::Legacy).unwrap().downgrade().unwrap();
        set.post_update();

        assert!(set.flags().is_empty());
        assert!(set.appearance.buffer(ClientVariant::Legacy).is_some());
        assert!(set.say.buffer(ClientVariant::Legacy).is_none());
        assert!(say_weak.upgrade().is_none());
        assert_eq!(set.appearance.state().name, "Alice");
    }

    #[test]
    fn test_block_write_order_and_chat_self_view() {
        let registry = EncoderRegistry::standard();
        let mut set = ExtendedInfoSet::new();
        let mut scratch = PacketBuffer::new();
        set.sequence.set(Sequence { id: 1, delay: 0 });
        set.face_entity.set(FaceEntity { target: 9 });
        set.chat.set(Chat {
            effects: 0,
            rights: 0,
            message: vec![7],
        });
        set.precompute(&registry, &[ClientVariant::Legacy], &mut scratch)
            .unwrap();

        let mut context = ctx(ClientVariant::Legacy);
        let flags = set.block_flags(&context);
        let mut out = PacketBuffer::new();
        set.write_block(flags, &context, &registry, &mut out).unwrap();
        // mask, sequence, chat, face entity
        assert_eq!(
            out.as_bytes(),
            &[0x89, 1, 0, 0, 0, 0, 0, 1, 7, 9, 0]
        );

        context.self_view = true;
        let flags = set.block_flags(&context);
        assert!(!flags.contains(UpdateFlags::CHAT));
    }

    #[test]
    fn test_hit_encoded_per_observer() {
        let registry = EncoderRegistry::standard();
        let mut set = ExtendedInfoSet::new();
        set.hit = Some(Hit {
            source: Some(1),
            damage: 3,
            self_type: 1,
            other_type: 2,
            current_hp: 0,
            max_hp: 0,
        });

        let source_view = ctx(ClientVariant::Legacy);
        let mut out = PacketBuffer::new();
        set.write_block(set.block_flags(&source_view), &source_view, &registry, &mut out)
            .unwrap();
        assert_eq!(out.as_bytes(), &[0x20, 3, 1, 0]);

        let bystander = BlockContext {
            observer: Some(7),
            ..source_view
        };
        let mut out = PacketBuffer::new();
        set.write_block(set.block_flags(&bystander), &bystander, &registry, &mut out)
            .unwrap();
        assert_eq!(out.as_bytes(), &[0x20, 3, 2, 0]);
    }

    #[test]
    fn test_missing_precompute_is_error() {
        let registry = EncoderRegistry::standard();
        let mut set = ExtendedInfoSet::new();
        set.sequence.set(Sequence { id: 1, delay: 0 });
        let context = ctx(ClientVariant::Native);
        let mut out = PacketBuffer::new();
        assert_eq!(
            set.write_block(set.block_flags(&context), &context, &registry, &mut out),
            Err(EncoderError::UnsupportedVariant(ClientVariant::Native))
        );
    }
}
