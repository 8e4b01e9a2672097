//! Benchmarks for floor-field computation
//!
//! Measures performance of:
//! - Single-target field relaxation at different room sizes
//! - Full-table precomputation
//! - Field lookups

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use evac_topology::{FieldTable, FloorField, GridCoord, Room, Tile};

/// Walled room with a row of pillars every fourth column.
fn pillared_room(size: i32) -> Room {
    let mut room = Room::walled(size, size, GridCoord::new(size - 1, size / 2))
        .expect("bench room dimensions are valid");
    for x in (3..size - 3).step_by(4) {
        for y in (2..size - 2).filter(|y| y % 3 != 0) {
            room.set_tile(GridCoord::new(x, y), Tile::Obstacle);
        }
    }
    room
}

/// Benchmark one field computation toward the exit
fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_compute");

    for &size in &[16i32, 32, 64, 128] {
        let room = pillared_room(size);
        let exit = GridCoord::new(size - 1, size / 2);
        group.throughput(Throughput::Elements(room.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &room, |b, room| {
            b.iter(|| FloorField::compute(black_box(room), black_box(exit)))
        });
    }
    group.finish();
}

/// Benchmark precomputing every target of a room
fn bench_precompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_precompute_all");
    group.sample_size(10);

    for &size in &[8i32, 16, 24] {
        let room = pillared_room(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &room, |b, room| {
            b.iter(|| {
                let mut table = FieldTable::new(room);
                table.precompute_all(black_box(room))
            })
        });
    }
    group.finish();
}

/// Benchmark a Moore-neighborhood sweep of lookups
fn bench_lookup(c: &mut Criterion) {
    let room = pillared_room(64);
    let field = FloorField::compute(&room, GridCoord::new(63, 32)).expect("exit is passable");

    c.bench_function("field_lookup_sweep", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for c in room.passable_cells() {
                acc += black_box(field.get(c)).min(1e6);
            }
            acc
        })
    });
}

criterion_group!(benches, bench_compute, bench_precompute, bench_lookup);
criterion_main!(benches);
