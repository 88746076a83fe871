#![allow(missing_docs)]

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use swaparena::storage::HANDLE_FIELD_WIDTH;
use swaparena::types::Result;
use swaparena::{ArenaOptions, EvictionController, Handle, ObjectArena, PagingOptions};
use tempfile::tempdir;

const RECORDS: usize = 1_500;
const OPS: usize = 20_000;
const SEED: u64 = 0x5eed_cafe;

/// Shadow copy of one record's bytes.
struct Shadow {
    handle: Handle,
    bytes: Vec<u8>,
}

fn verify(arena: &ObjectArena, model: &[Shadow]) -> Result<()> {
    for rec in model {
        for (offset, &expected) in rec.bytes.iter().enumerate() {
            assert_eq!(
                arena.get_byte(rec.handle, offset as u32)?,
                expected,
                "record {} byte {offset}",
                rec.handle
            );
        }
    }
    Ok(())
}

#[test]
fn randomized_fields_match_shadow_model_under_pressure() -> Result<()> {
    let dir = tempdir()?;
    let controller = EvictionController::new(
        PagingOptions::default()
            .page_shift(9)
            .resident_page_budget(6)
            .swap_dir(dir.path()),
    )?;
    let mut arena = ObjectArena::new(&controller, ArenaOptions::default())?;
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);

    let mut model: Vec<Shadow> = Vec::with_capacity(RECORDS);
    for _ in 0..RECORDS {
        let size = rng.gen_range(1..=64u32);
        let handle = arena.new_object(size)?;
        model.push(Shadow {
            handle,
            bytes: vec![0; size as usize],
        });
    }

    for op in 0..OPS {
        let idx = rng.gen_range(0..model.len());
        let len = model[idx].bytes.len();
        match rng.gen_range(0..3) {
            0 => {
                let offset = rng.gen_range(0..len);
                let value: u8 = rng.gen();
                arena.set_byte(model[idx].handle, offset as u32, value)?;
                model[idx].bytes[offset] = value;
            }
            1 => {
                let width = rng.gen_range(1..=8usize.min(len));
                let offset = rng.gen_range(0..=len - width);
                let value: u64 = rng.gen();
                arena.set_integer(model[idx].handle, offset as u32, width, value)?;
                model[idx].bytes[offset..offset + width]
                    .copy_from_slice(&value.to_le_bytes()[..width]);
            }
            _ if len >= HANDLE_FIELD_WIDTH => {
                let offset = rng.gen_range(0..=len - HANDLE_FIELD_WIDTH);
                let target = model[rng.gen_range(0..model.len())].handle;
                arena.set_object_handle(model[idx].handle, offset as u32, target)?;
                model[idx].bytes[offset..offset + HANDLE_FIELD_WIDTH]
                    .copy_from_slice(&target.get().to_le_bytes()[..HANDLE_FIELD_WIDTH]);
                assert_eq!(
                    arena.get_object_handle(model[idx].handle, offset as u32)?,
                    target
                );
            }
            _ => {}
        }
        if op % 5_000 == 4_999 {
            controller.run_housekeeping();
            verify(&arena, &model)?;
        }
    }

    controller.run_housekeeping();
    assert!(controller.resident_pages() <= 6);
    verify(&arena, &model)?;
    let stats = arena.stats().store;
    assert!(stats.evictions > 0);
    assert!(stats.reloads > 0);
    Ok(())
}

#[test]
fn compact_after_growth_keeps_every_record() -> Result<()> {
    let dir = tempdir()?;
    let controller = EvictionController::new(
        PagingOptions::default()
            .page_shift(8)
            .resident_page_budget(3)
            .swap_dir(dir.path()),
    )?;
    let mut arena = ObjectArena::new(&controller, ArenaOptions::default())?;
    let mut rng = ChaCha8Rng::seed_from_u64(SEED ^ 1);
    let mut records = Vec::new();
    for i in 0..500u64 {
        let rec = arena.new_object(rng.gen_range(8..=40))?;
        arena.set_integer(rec, 0, 8, i * 7919)?;
        records.push(rec);
    }
    arena.compact();
    let stats = arena.stats();
    assert!(stats.capacity >= stats.size);
    assert!(stats.capacity - stats.size < 256);
    for (i, rec) in records.iter().enumerate() {
        assert_eq!(arena.get_integer(*rec, 0, 8)?, i as u64 * 7919);
    }
    Ok(())
}
