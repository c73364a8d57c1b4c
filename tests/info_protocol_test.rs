//! Integration tests for the info protocol
//!
//! These tests drive whole ticks through the public API and decode the
//! published packets:
//! - View changes (additions, removals) and movement encoding
//! - Low resolution entries and their terminators
//! - Appearance resend rules on re-entry
//! - Failure and panic isolation, pooled object reuse
//! - Determinism of parallel packet assembly

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use rustscape_info::config::InfoConfig;
use rustscape_info::error::{EncoderError, InfoError};
use rustscape_info::game::coord::CoordGrid;
use rustscape_info::game::sync::extended_info::{EncoderRegistry, Hit};
use rustscape_info::game::sync::InfoProtocol;
use rustscape_info::net::PacketBuffer;
use rustscape_info::protocol::ClientVariant;

fn config(workers: usize) -> InfoConfig {
    InfoConfig {
        player_capacity: 64,
        npc_capacity: 64,
        worker_threads: workers,
        view_distance: 5,
        low_resolution_distance: 0,
        ..InfoConfig::default()
    }
}

/// Payload of a framed packet, positioned for bit reads
fn payload(bytes: &[u8], opcode: u8) -> PacketBuffer {
    assert_eq!(bytes[0], opcode);
    let len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
    assert_eq!(len, bytes.len() - 3);
    let mut buffer = PacketBuffer::from_bytes(&bytes[3..]);
    buffer.start_bit_read();
    buffer
}

fn player_info(protocol: &InfoProtocol, observer: u16) -> PacketBuffer {
    let packet = protocol
        .packets(observer)
        .and_then(|p| p.player_info.as_ref())
        .expect("player info published");
    payload(packet.as_bytes(), 81)
}

fn npc_info(protocol: &InfoProtocol, observer: u16) -> PacketBuffer {
    let packet = protocol
        .packets(observer)
        .and_then(|p| p.npc_info.as_ref())
        .expect("npc info published");
    payload(packet.as_bytes(), 65)
}

/// Entity A leaves observer B's view distance and is removed
#[test]
fn test_entity_leaving_range_is_removed() {
    let mut protocol = InfoProtocol::new(config(2)).unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 100, 100))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Legacy, CoordGrid::new(0, 100, 101))
        .unwrap();

    protocol.update();
    let observer = protocol.observer(2).unwrap();
    assert_eq!(observer.players().high(), &[2, 1]);

    protocol
        .player_mut(1)
        .unwrap()
        .set_coord(CoordGrid::new(0, 100, 108));
    protocol.update();

    let mut buffer = player_info(&protocol, 2);
    assert_eq!(buffer.read_bits(8), 2);
    // Own entry, unchanged
    assert_eq!(buffer.read_bits(1), 0);
    // A: removed
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 3);
    assert_eq!(buffer.read_bits(1), 0);
    // No additions, no low resolution entries
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(buffer.read_bits(11), 0);
    assert_eq!(buffer.read_bits(11), 2047);

    assert_eq!(protocol.observer(2).unwrap().players().high(), &[2]);
}

/// Zone-scale move: A leaves the zones around B, then comes back as an
/// addition
#[test]
fn test_entity_crossing_zones_is_removed_and_re_added() {
    let mut config = config(2);
    config.view_distance = 8;
    let mut protocol = InfoProtocol::new(config).unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 800, 800))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Legacy, CoordGrid::new(0, 800, 808))
        .unwrap();
    protocol.update();
    assert_eq!(protocol.observer(2).unwrap().players().high(), &[2, 1]);

    // Zone (100, 100) to zone (100, 108)
    protocol
        .player_mut(1)
        .unwrap()
        .set_coord(CoordGrid::new(0, 800, 864));
    protocol.update();

    let mut buffer = player_info(&protocol, 2);
    assert_eq!(buffer.read_bits(8), 2);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 3);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(buffer.read_bits(11), 0);
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(protocol.observer(2).unwrap().players().high(), &[2]);
    assert_eq!(protocol.player_index().get(0, 100, 108), &[1]);
    assert!(protocol.player_index().get(0, 100, 100).is_empty());

    protocol
        .player_mut(1)
        .unwrap()
        .set_coord(CoordGrid::new(0, 800, 800));
    protocol.update();

    let mut buffer = player_info(&protocol, 2);
    assert_eq!(buffer.read_bits(8), 1);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 1);
    // Appearance already known
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(2), 0);
    assert_eq!(buffer.read_bits(1), 1);
    // B's build area starts at tile (752, 760)
    assert_eq!(buffer.read_bits(7), 48);
    assert_eq!(buffer.read_bits(7), 40);
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(protocol.observer(2).unwrap().players().high(), &[2, 1]);
}

/// A one tile diagonal step is a walk with the north-east opcode
#[test]
fn test_diagonal_step_is_walk() {
    let mut protocol = InfoProtocol::new(config(2)).unwrap();
    protocol
        .alloc_player(1, ClientVariant::Native, CoordGrid::new(0, 3200, 3200))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Native, CoordGrid::new(0, 3202, 3200))
        .unwrap();
    protocol.update();

    protocol
        .player_mut(1)
        .unwrap()
        .set_coord(CoordGrid::new(0, 3201, 3201));
    protocol.update();

    let mut buffer = player_info(&protocol, 2);
    assert_eq!(buffer.read_bits(8), 2);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 1);
    assert_eq!(buffer.read_bits(3), 7);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 2047);
}

/// A two tile step is a run with the dual-cell opcode
#[test]
fn test_two_tile_step_is_run() {
    let mut protocol = InfoProtocol::new(config(2)).unwrap();
    protocol
        .alloc_player(1, ClientVariant::Native, CoordGrid::new(0, 3200, 3200))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Native, CoordGrid::new(0, 3202, 3200))
        .unwrap();
    protocol.update();

    protocol
        .player_mut(1)
        .unwrap()
        .set_coord(CoordGrid::new(0, 3200, 3202));
    protocol.update();

    let mut buffer = player_info(&protocol, 2);
    assert_eq!(buffer.read_bits(8), 2);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 2);
    assert_eq!(buffer.read_bits(4), 13);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(buffer.read_bits(11), 0);
    assert_eq!(buffer.read_bits(11), 2047);
}

/// A teleport inside the view carries absolute coordinates, next to a
/// removal in the same packet
#[test]
fn test_teleport_and_removal_in_one_packet() {
    let mut protocol = InfoProtocol::new(config(2)).unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 3201, 3200))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Legacy, CoordGrid::new(0, 3202, 3200))
        .unwrap();
    protocol
        .alloc_player(3, ClientVariant::Legacy, CoordGrid::new(0, 3200, 3200))
        .unwrap();
    protocol.update();
    assert_eq!(protocol.observer(3).unwrap().players().high(), &[3, 1, 2]);

    protocol
        .player_mut(1)
        .unwrap()
        .teleport(CoordGrid::new(0, 3203, 3203));
    protocol
        .player_mut(2)
        .unwrap()
        .set_coord(CoordGrid::new(0, 3220, 3200));
    protocol.update();

    let mut buffer = player_info(&protocol, 3);
    assert_eq!(buffer.read_bits(8), 3);
    assert_eq!(buffer.read_bits(1), 0);
    // 1: teleport without extended info
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 3);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(2), 0);
    assert_eq!(buffer.read_bits(14), 3203);
    assert_eq!(buffer.read_bits(14), 3203);
    // 2: removed
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 3);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(buffer.read_bits(11), 0);
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(protocol.observer(3).unwrap().players().high(), &[3, 1]);
}

/// Own entry unchanged, no additions
fn skip_idle_high(buffer: &mut PacketBuffer) {
    assert_eq!(buffer.read_bits(8), 1);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 2047);
}

fn coarse(level: u32, mapsquare_x: u32, mapsquare_z: u32) -> u32 {
    level << 16 | mapsquare_x << 8 | mapsquare_z
}

/// Tracks player 2 through every low resolution entry kind
#[test]
fn test_low_resolution_entries() {
    let mut config = config(1);
    config.low_resolution_distance = 100;
    // Keeps low resolution members across level changes
    let any_level = |observer: CoordGrid, candidate: CoordGrid, distance: u32, _level: u8| {
        let (dx, dz) = observer.delta_to(&candidate);
        dx.unsigned_abs() <= distance && dz.unsigned_abs() <= distance
    };
    let mut protocol = InfoProtocol::builder(config)
        .visibility(any_level)
        .build()
        .unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 3200, 3200))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Legacy, CoordGrid::new(0, 3263, 3200))
        .unwrap();
    protocol.update();

    // Tick 1: own addition, then 2 added at low resolution
    let mut buffer = player_info(&protocol, 1);
    assert_eq!(buffer.read_bits(8), 0);
    assert_eq!(buffer.read_bits(11), 1);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 0);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(7), 48);
    assert_eq!(buffer.read_bits(7), 48);
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(buffer.read_bits(11), 0);
    assert_eq!(buffer.read_bits(11), 2);
    assert_eq!(buffer.read_bits(18), coarse(0, 50, 50));
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(protocol.observer(1).unwrap().players().low(), &[2]);

    // One step east into the next mapsquare
    protocol
        .player_mut(2)
        .unwrap()
        .set_coord(CoordGrid::new(0, 3264, 3200));
    protocol.update();
    let mut buffer = player_info(&protocol, 1);
    skip_idle_high(&mut buffer);
    assert_eq!(buffer.read_bits(11), 1);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 2);
    assert_eq!(buffer.read_bits(2), 0);
    assert_eq!(buffer.read_bits(3), 4);
    assert_eq!(buffer.read_bits(11), 2047);

    // Level change only
    protocol
        .player_mut(2)
        .unwrap()
        .teleport(CoordGrid::new(1, 3264, 3200));
    protocol.update();
    let mut buffer = player_info(&protocol, 1);
    skip_idle_high(&mut buffer);
    assert_eq!(buffer.read_bits(11), 1);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 1);
    assert_eq!(buffer.read_bits(2), 1);
    assert_eq!(buffer.read_bits(11), 2047);

    // Two mapsquares west: full coarse coordinate
    protocol
        .player_mut(2)
        .unwrap()
        .teleport(CoordGrid::new(1, 3150, 3200));
    protocol.update();
    let mut buffer = player_info(&protocol, 1);
    skip_idle_high(&mut buffer);
    assert_eq!(buffer.read_bits(11), 1);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 3);
    assert_eq!(buffer.read_bits(18), coarse(1, 49, 50));
    assert_eq!(buffer.read_bits(11), 2047);

    // Idle
    protocol.update();
    let mut buffer = player_info(&protocol, 1);
    skip_idle_high(&mut buffer);
    assert_eq!(buffer.read_bits(11), 1);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 2047);

    // Out of low resolution range
    protocol
        .player_mut(2)
        .unwrap()
        .teleport(CoordGrid::new(1, 3320, 3200));
    protocol.update();
    let mut buffer = player_info(&protocol, 1);
    skip_idle_high(&mut buffer);
    assert_eq!(buffer.read_bits(11), 1);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 0);
    assert_eq!(buffer.read_bits(11), 2047);
    assert!(protocol.observer(1).unwrap().players().low().is_empty());
}

/// Re-entering players only carry appearance when it changed while away
#[test]
fn test_appearance_resent_only_when_changed() {
    let mut protocol = InfoProtocol::new(config(1)).unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 3200, 3200))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Legacy, CoordGrid::new(0, 3201, 3200))
        .unwrap();
    protocol.update();

    let away = CoordGrid::new(0, 3220, 3200);
    let back = CoordGrid::new(0, 3200, 3201);

    protocol.player_mut(1).unwrap().set_coord(away);
    protocol.update();
    protocol.player_mut(1).unwrap().set_coord(back);
    protocol.update();

    let mut buffer = player_info(&protocol, 2);
    assert_eq!(buffer.read_bits(8), 1);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 1);
    // Appearance unchanged: no extended block
    assert_eq!(buffer.read_bits(1), 0);

    protocol.player_mut(1).unwrap().set_coord(away);
    let mut appearance = protocol
        .player(1)
        .unwrap()
        .extended_info
        .appearance
        .state()
        .clone();
    appearance.combat_level = 99;
    protocol.player_mut(1).unwrap().set_appearance(appearance);
    protocol.update();

    protocol.player_mut(1).unwrap().set_coord(back);
    protocol.update();

    let mut buffer = player_info(&protocol, 2);
    assert_eq!(buffer.read_bits(8), 1);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(11), 1);
    assert_eq!(buffer.read_bits(1), 1);
    assert_eq!(buffer.read_bits(2), 0);
    assert_eq!(buffer.read_bits(1), 1);
    buffer.read_bits(7);
    buffer.read_bits(7);
    assert_eq!(buffer.read_bits(11), 2047);
    assert_eq!(buffer.read_bits(11), 0);
    assert_eq!(buffer.read_bits(11), 2047);
    buffer.end_bit_read();
    assert_eq!(buffer.read_ubyte(), 0x10);
}

/// NPC additions carry their type and a build-area-relative position
#[test]
fn test_npc_addition_layout() {
    let mut protocol = InfoProtocol::new(config(1)).unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 3200, 3200))
        .unwrap();
    protocol
        .alloc_npc(5, 1234, CoordGrid::new(0, 3201, 3200))
        .unwrap();
    protocol.update();

    let mut buffer = npc_info(&protocol, 1);
    assert_eq!(buffer.read_bits(8), 0);
    assert_eq!(buffer.read_bits(16), 5);
    assert_eq!(buffer.read_bits(1), 0);
    assert_eq!(buffer.read_bits(14), 1234);
    assert_eq!(buffer.read_bits(2), 0);
    assert_eq!(buffer.read_bits(1), 1);
    // Build area starts at zone 394 (tile 3152)
    assert_eq!(buffer.read_bits(7), 49);
    assert_eq!(buffer.read_bits(7), 48);
    assert_eq!(buffer.read_bits(16), 65535);
}

/// A rebuild is sent on the first tick only, centred on the observer
#[test]
fn test_rebuild_on_first_tick() {
    let mut protocol = InfoProtocol::new(config(1)).unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 3200, 3200))
        .unwrap();

    protocol.update();
    let rebuild = protocol
        .packets(1)
        .and_then(|p| p.rebuild.as_ref())
        .expect("rebuild published");
    let bytes = rebuild.as_bytes();
    assert_eq!(bytes[0], 162);
    assert_eq!(u16::from_be_bytes([bytes[3], bytes[4]]), 400);
    assert_eq!(u16::from_be_bytes([bytes[5], bytes[6]]), 400);

    protocol.update();
    assert!(protocol.packets(1).unwrap().rebuild.is_none());
}

/// One observer's encoder failure does not affect the others
#[test]
fn test_observer_failure_is_isolated() {
    let failed = Arc::new(Mutex::new(Vec::new()));
    let seen = failed.clone();

    let mut registry = EncoderRegistry::standard();
    registry.hit.register(ClientVariant::Native, |_, _, _| {
        Err(EncoderError::Failed("native hit".to_string()))
    });

    let mut protocol = InfoProtocol::builder(config(2))
        .registry(registry)
        .exception_handler(move |index, _| seen.lock().push(index))
        .build()
        .unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 3200, 3200))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Native, CoordGrid::new(0, 3201, 3200))
        .unwrap();
    protocol.update();

    protocol.player_mut(1).unwrap().hit(Hit {
        source: Some(2),
        damage: 3,
        self_type: 1,
        other_type: 2,
        current_hp: 7,
        max_hp: 10,
    });
    let report = protocol.update();

    assert_eq!(report.failures, 1);
    assert_eq!(report.observers, 1);
    assert_eq!(*failed.lock(), vec![2]);
    assert!(protocol.packets(1).is_some());
    assert!(protocol.packets(2).is_none());
    assert!(protocol.player(2).unwrap().is_destroyed());
    assert!(!protocol.player(1).unwrap().is_destroyed());

    protocol.update();
    assert!(protocol.observer(2).is_none());
    assert_eq!(protocol.observer(1).unwrap().players().high(), &[1]);

    protocol.dealloc_player(2).unwrap();
    let (avatars, observers) = protocol.pool_stats();
    assert_eq!(avatars.discarded, 1);
    assert_eq!(observers.discarded, 1);
}

/// A panicking encoder destroys only the avatar it was encoding
#[test]
fn test_encoder_panic_is_contained_to_avatar() {
    let failed = Arc::new(Mutex::new(Vec::new()));
    let seen = failed.clone();

    let mut registry = EncoderRegistry::standard();
    registry
        .sequence
        .register(ClientVariant::Native, |_, _| panic!("sequence encoder bug"));

    let mut protocol = InfoProtocol::builder(config(2))
        .registry(registry)
        .exception_handler(move |index, error: &InfoError| {
            seen.lock().push((index, error.to_string()))
        })
        .build()
        .unwrap();
    for (index, x) in [(1u16, 3200u32), (2, 3201), (3, 3202)] {
        protocol
            .alloc_player(index, ClientVariant::Legacy, CoordGrid::new(0, x, 3200))
            .unwrap();
    }
    protocol.update();

    protocol.player_mut(2).unwrap().set_sequence(855, 0);
    protocol.update();

    assert_eq!(
        *failed.lock(),
        vec![(2, "Panicked: sequence encoder bug".to_string())]
    );
    assert!(protocol.player(2).unwrap().is_destroyed());
    assert!(!protocol.player(1).unwrap().is_destroyed());
    assert!(!protocol.player(3).unwrap().is_destroyed());
    assert!(protocol.packets(1).is_some());
    assert!(protocol.packets(3).is_some());

    protocol.update();
    assert!(protocol.observer(2).is_none());
    assert_eq!(protocol.observer(1).unwrap().players().high(), &[1, 3]);
}

/// A panic while building one observer's packets fails only that observer
#[test]
fn test_assembly_panic_is_contained_to_observer() {
    let failed = Arc::new(Mutex::new(Vec::new()));
    let seen = failed.clone();

    let mut registry = EncoderRegistry::standard();
    registry
        .hit
        .register(ClientVariant::Native, |_, _, _| panic!("native hit bug"));

    let mut protocol = InfoProtocol::builder(config(2))
        .registry(registry)
        .exception_handler(move |index, error: &InfoError| {
            seen.lock().push((index, error.to_string()))
        })
        .build()
        .unwrap();
    protocol
        .alloc_player(1, ClientVariant::Legacy, CoordGrid::new(0, 3200, 3200))
        .unwrap();
    protocol
        .alloc_player(2, ClientVariant::Native, CoordGrid::new(0, 3201, 3200))
        .unwrap();
    protocol
        .alloc_player(3, ClientVariant::Legacy, CoordGrid::new(0, 3202, 3200))
        .unwrap();
    protocol.update();

    protocol.player_mut(1).unwrap().hit(Hit {
        source: Some(2),
        damage: 3,
        self_type: 1,
        other_type: 2,
        current_hp: 7,
        max_hp: 10,
    });
    let report = protocol.update();

    assert_eq!(report.failures, 1);
    assert_eq!(report.observers, 2);
    assert_eq!(
        *failed.lock(),
        vec![(2, "Panicked: native hit bug".to_string())]
    );
    assert!(protocol.packets(1).is_some());
    assert!(protocol.packets(3).is_some());
    assert!(protocol.packets(2).is_none());
}

/// Tens of thousands of NPCs in distinct zones fit the default index
#[test]
fn test_default_capacity_indexes_one_npc_per_zone() {
    let mut protocol = InfoProtocol::new(InfoConfig::default()).unwrap();
    for i in 0..40_000u32 {
        let coord = CoordGrid::new(0, (i % 1500) * 8, (i / 1500) * 8);
        protocol.alloc_npc(i as u16, 1, coord).unwrap();
    }
    protocol.update();

    assert_eq!(protocol.npc_index().zone_count(), 40_000);
    assert_eq!(protocol.npc_index().get(0, 999, 26), &[39_999]);
}

/// Deallocated avatars and observers are reused by the next allocation
#[test]
fn test_pooled_reuse() {
    let mut protocol = InfoProtocol::new(config(1)).unwrap();
    let coord = CoordGrid::new(0, 3200, 3200);

    protocol.alloc_player(3, ClientVariant::Mobile, coord).unwrap();
    protocol.update();
    protocol.dealloc_player(3).unwrap();
    protocol.update();
    protocol.alloc_player(3, ClientVariant::Legacy, coord).unwrap();

    let (avatars, observers) = protocol.pool_stats();
    assert_eq!(avatars.created, 1);
    assert_eq!(avatars.reused, 1);
    assert_eq!(observers.reused, 1);
    assert_eq!(
        protocol.observer(3).unwrap().variant(),
        ClientVariant::Legacy
    );
    assert!(protocol.observer(3).unwrap().players().high().is_empty());
}

fn crowd(protocol: &mut InfoProtocol) {
    for i in 0..20u16 {
        let variant = ClientVariant::ALL[i as usize % ClientVariant::COUNT];
        let coord = CoordGrid::new(0, 3200 + (i as u32 % 5) * 2, 3200 + (i as u32 / 5) * 2);
        protocol.alloc_player(i, variant, coord).unwrap();
    }
    for i in 0..30u16 {
        let coord = CoordGrid::new(0, 3196 + (i as u32 % 6) * 3, 3196 + (i as u32 / 6) * 3);
        protocol.alloc_npc(i, 100 + i, coord).unwrap();
    }
}

fn script(protocol: &mut InfoProtocol, tick: u32) {
    for i in 0..20u16 {
        let player = protocol.player_mut(i).unwrap();
        let step = (i as u32 + tick) % 4;
        let coord = player.coord();
        match step {
            0 => player.set_coord(coord.translate(1, 0)),
            1 => player.set_coord(coord.translate(0, -2)),
            2 => player.say(format!("tick {}", tick)),
            _ => player.hit(Hit {
                source: Some((i + 1) % 20),
                damage: i,
                self_type: 1,
                other_type: 2,
                current_hp: 10,
                max_hp: 10,
            }),
        }
        if (i as u32 + tick) % 7 == 0 {
            player.set_sequence(800 + i, 0);
        }
    }
    for i in 0..30u16 {
        let npc = protocol.npc_mut(i).unwrap();
        let coord = npc.coord();
        if (i as u32 + tick) % 3 == 0 {
            npc.set_coord(coord.translate(-1, 1));
        }
    }
}

fn run(workers: usize) -> Vec<Vec<(u16, Vec<u8>)>> {
    let mut config = config(workers);
    config.view_distance = 15;
    config.low_resolution_distance = 32;
    let mut protocol = InfoProtocol::new(config).unwrap();
    crowd(&mut protocol);

    let mut ticks = Vec::new();
    for tick in 0..5 {
        if tick > 0 {
            script(&mut protocol, tick);
        }
        protocol.update();

        let mut snapshot = Vec::new();
        for observer in 0..20u16 {
            let packets = protocol.packets(observer).expect("published");
            let bytes: Vec<u8> = packets
                .iter()
                .flat_map(|b| b.as_bytes().iter().copied())
                .collect();
            snapshot.push((observer, bytes));
        }
        ticks.push(snapshot);
    }
    ticks
}

/// One worker and many workers produce byte-identical packets
#[test]
fn test_parallel_assembly_is_deterministic() {
    let single = run(1);
    let parallel = run(4);
    assert_eq!(single, parallel);
}
