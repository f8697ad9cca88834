// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! End-to-end allocation sequences over a 4 GiB opaque region.

use alloc_core::{AllocError, Allocation, Allocator, AllocatorExt, Strategy};
use best_fit::{BestFitAllocator, ChunkView};
use leaf_memory::OpaqueAllocator;

const REGION: usize = 4 << 30;

type Handle<'b, 'a> = Allocation<'b, BestFitAllocator<'a, OpaqueAllocator>>;

fn offset(alloc: &BestFitAllocator<'_, OpaqueAllocator>, handle: &Handle<'_, '_>) -> usize {
    let view = alloc.chunk_of(&handle.ticket()).expect("handle is live");
    assert!(!view.is_free);
    assert_eq!(view.size, handle.size());
    view.offset
}

#[test]
fn test_first_allocation_lands_at_zero() {
    let leaf = OpaqueAllocator::new(0);
    let alloc = BestFitAllocator::new(leaf.allocate(REGION, Strategy::Default).unwrap()).unwrap();

    {
        let a = alloc.allocate(64, Strategy::Default).unwrap();
        assert_eq!(offset(&alloc, &a), 0);
        assert_eq!(a.size(), 64);
    }

    // The 64-byte chunk coalesced back, so the next request starts at 0 too.
    let b = alloc.allocate(80, Strategy::Default).unwrap();
    assert_eq!(offset(&alloc, &b), 0);
    assert_eq!(b.size(), 80);
    assert!(b.ptr().is_null());
    assert_eq!(alloc.num_free_chunks(), 1);
}

#[test]
fn test_reference_sequence() {
    let leaf = OpaqueAllocator::new(0);
    let alloc = BestFitAllocator::new(leaf.allocate(REGION, Strategy::Default).unwrap()).unwrap();

    let a = alloc.allocate(80, Strategy::Default).unwrap();
    let b = alloc.allocate(60, Strategy::Default).unwrap();
    let c = alloc.allocate(90, Strategy::Default).unwrap();
    assert_eq!(offset(&alloc, &a), 0);
    assert_eq!(offset(&alloc, &b), 80);
    assert_eq!(offset(&alloc, &c), 140);

    // A 60-byte hole between two live chunks; 30 fits best there.
    drop(b);
    let b = alloc.allocate(30, Strategy::Default).unwrap();
    assert_eq!(offset(&alloc, &b), 80);
    assert_eq!(alloc.num_free_chunks(), 2);

    // Releasing the 30 restores the 60-byte hole, reused without a split.
    drop(b);
    let chunks = alloc.chunks().len();
    let exact_fits = alloc.stats().exact_fits;
    let b = alloc.allocate(60, Strategy::Default).unwrap();
    assert_eq!(offset(&alloc, &b), 80);
    assert_eq!(alloc.chunks().len(), chunks);
    assert_eq!(alloc.stats().exact_fits, exact_fits + 1);

    // 80 and 60 coalesce into one 140-byte chunk at the front.
    drop(a);
    drop(b);
    assert_eq!(
        alloc.chunks()[0],
        ChunkView {
            offset: 0,
            size: 140,
            is_free: true
        }
    );
    let a = alloc.allocate(140, Strategy::Default).unwrap();
    assert_eq!(offset(&alloc, &a), 0);
    drop(a);

    let a = alloc.allocate(80, Strategy::Default).unwrap();
    let b = alloc.allocate(60, Strategy::Default).unwrap();
    drop(a);
    drop(b);
    drop(c);

    assert_eq!(alloc.num_free_chunks(), 1);
    assert_eq!(
        alloc.chunks(),
        vec![ChunkView {
            offset: 0,
            size: REGION,
            is_free: true
        }]
    );
    alloc.validate().unwrap();
}

#[test]
fn test_fragmented_free_space_does_not_satisfy_large_request() {
    let leaf = OpaqueAllocator::new(0);
    let alloc = BestFitAllocator::new(leaf.allocate(1000, Strategy::Default).unwrap()).unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| alloc.allocate(100, Strategy::Default).unwrap())
        .collect();
    // Free every other chunk: 500 bytes free in five 100-byte holes.
    let mut kept = Vec::new();
    for (i, h) in handles.into_iter().enumerate() {
        if i % 2 == 1 {
            kept.push(h);
        }
    }
    assert_eq!(alloc.free_bytes(), 500);
    assert_eq!(alloc.num_free_chunks(), 5);

    match alloc.allocate(101, Strategy::Default) {
        Err(AllocError::OutOfMemory {
            requested,
            largest_free,
        }) => {
            assert_eq!(requested, 101);
            assert_eq!(largest_free, 100);
        }
        other => panic!("expected OutOfMemory, got {other:?}"),
    }
    // Nothing moved.
    assert_eq!(alloc.num_free_chunks(), 5);
    alloc.validate().unwrap();

    drop(kept);
    assert_eq!(alloc.num_free_chunks(), 1);
    assert_eq!(alloc.largest_free_chunk(), 1000);
}

#[test]
fn test_equal_holes_fill_lowest_offset_first() {
    let leaf = OpaqueAllocator::new(0);
    let alloc = BestFitAllocator::new(leaf.allocate(1000, Strategy::Default).unwrap()).unwrap();

    let hole1 = alloc.allocate(50, Strategy::Default).unwrap();
    let _g1 = alloc.allocate(10, Strategy::Default).unwrap();
    let hole2 = alloc.allocate(50, Strategy::Default).unwrap();
    let _g2 = alloc.allocate(10, Strategy::Default).unwrap();
    drop(hole2);
    drop(hole1);

    let a = alloc.allocate(50, Strategy::Default).unwrap();
    let b = alloc.allocate(50, Strategy::Default).unwrap();
    assert_eq!(offset(&alloc, &a), 0);
    assert_eq!(offset(&alloc, &b), 60);
}

#[test]
fn test_release_all_in_any_order_restores_single_chunk() {
    let leaf = OpaqueAllocator::new(0);
    const SIZE: usize = 1 << 20;
    let alloc = BestFitAllocator::new(leaf.allocate(SIZE, Strategy::Default).unwrap()).unwrap();

    for seed in 0..16u64 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut live = Vec::new();

        for _ in 0..200 {
            // Interleave releases with allocations to build real fragmentation.
            if !live.is_empty() && rng.u8(0..4) == 0 {
                let victim = rng.usize(0..live.len());
                live.swap_remove(victim);
            }
            match alloc.allocate(rng.usize(1..=4096), Strategy::Default) {
                Ok(handle) => live.push(handle),
                Err(err) => assert!(err.is_out_of_memory(), "unexpected {err}"),
            }
            alloc.validate().unwrap();
        }

        // Live ranges never overlap.
        let mut ranges: Vec<_> = live
            .iter()
            .map(|h| {
                let start = offset(&alloc, h);
                (start, start + h.size())
            })
            .collect();
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlap: {pair:?}");
        }

        rng.shuffle(&mut live);
        while let Some(handle) = live.pop() {
            handle.release().unwrap();
            alloc.validate().unwrap();
        }

        assert_eq!(alloc.num_free_chunks(), 1, "seed {seed}");
        assert_eq!(alloc.largest_free_chunk(), SIZE);
        assert_eq!(alloc.allocated_bytes(), 0);
    }
}

#[test]
fn test_stale_handle_release_leaves_state_untouched() {
    let leaf = OpaqueAllocator::new(0);
    let alloc = BestFitAllocator::new(leaf.allocate(1000, Strategy::Default).unwrap()).unwrap();

    let raw = alloc.allocate_raw(100, Strategy::Default).unwrap();
    let ticket = raw.ticket();
    let place = raw.place();
    alloc.release_raw(raw).unwrap();
    let before = alloc.chunks();

    // Forge a second release of the same chunk.
    let forged = unsafe { alloc_core::RawAllocation::new(None, 100, place, ticket) };
    let err = alloc.release_raw(forged).unwrap_err();
    assert!(matches!(err, AllocError::InvalidHandle(_)));
    assert_eq!(alloc.chunks(), before);
    assert_eq!(alloc.stats().total_releases, 1);
    alloc.validate().unwrap();
}
