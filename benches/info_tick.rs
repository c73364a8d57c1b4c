use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use rustscape_info::config::InfoConfig;
use rustscape_info::game::coord::CoordGrid;
use rustscape_info::game::sync::cell_opcodes::{dual_cell_opcode, single_cell_opcode};
use rustscape_info::game::sync::InfoProtocol;
use rustscape_info::protocol::ClientVariant;

/// Players and NPCs packed into a 64x64 tile square
fn crowded(players: u16, npcs: u16, workers: usize) -> InfoProtocol {
    let config = InfoConfig {
        player_capacity: 2047,
        npc_capacity: 4096,
        worker_threads: workers,
        ..InfoConfig::default()
    };
    let mut protocol = InfoProtocol::new(config).unwrap();
    for i in 0..players {
        let coord = CoordGrid::new(0, 3200 + (i as u32 * 7) % 64, 3200 + (i as u32 * 13) % 64);
        let variant = ClientVariant::ALL[i as usize % ClientVariant::COUNT];
        protocol.alloc_player(i, variant, coord).unwrap();
    }
    for i in 0..npcs {
        let coord = CoordGrid::new(0, 3200 + (i as u32 * 11) % 64, 3200 + (i as u32 * 5) % 64);
        protocol.alloc_npc(i, i % 2000, coord).unwrap();
    }
    protocol.update();
    protocol
}

fn churn(protocol: &mut InfoProtocol, players: u16, tick: u32) {
    for i in 0..players {
        if let Some(player) = protocol.player_mut(i) {
            let dx = if (i as u32 + tick) % 2 == 0 { 1 } else { -1 };
            let coord = player.coord().translate(dx, 0);
            player.set_coord(coord);
            if (i as u32 + tick) % 10 == 0 {
                player.say("bench");
            }
        }
    }
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("info_tick");
    group.sample_size(20);

    for &(players, npcs) in &[(100u16, 500u16), (500, 2000)] {
        group.throughput(Throughput::Elements(players as u64));
        group.bench_with_input(
            BenchmarkId::new("crowded", format!("{}p_{}n", players, npcs)),
            &(players, npcs),
            |b, &(players, npcs)| {
                let mut protocol = crowded(players, npcs, 0);
                let mut tick = 0u32;
                b.iter(|| {
                    tick += 1;
                    churn(&mut protocol, players, tick);
                    black_box(protocol.update());
                });
            },
        );
    }

    group.finish();
}

fn bench_cell_opcodes(c: &mut Criterion) {
    c.bench_function("cell_opcodes", |b| {
        b.iter(|| {
            let mut sum = 0u32;
            for dx in -2..=2 {
                for dz in -2..=2 {
                    sum += single_cell_opcode(black_box(dx), black_box(dz)).unwrap_or(0) as u32;
                    sum += dual_cell_opcode(black_box(dx), black_box(dz)).unwrap_or(0) as u32;
                }
            }
            black_box(sum)
        });
    });
}

criterion_group!(benches, bench_tick, bench_cell_opcodes);
criterion_main!(benches);
