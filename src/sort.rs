//! Rank sorting
//!
//! Conflict analysis sorts small slices most of the time (bumped
//! variables, learned-clause literals), where a stable comparison sort
//! wins. Above `radix_limit` elements an LSD radix sort over the 64-bit
//! rank is used instead.

/// Sort `items` ascending by `rank`, stably.
pub fn sort_by_rank<T: Copy, F: Fn(&T) -> u64>(items: &mut Vec<T>, rank: F, radix_limit: usize) {
    if items.len() <= 1 {
        return;
    }
    if items.len() < radix_limit {
        items.sort_by_key(|item| rank(item));
        return;
    }
    radix_sort(items, rank);
}

fn radix_sort<T: Copy, F: Fn(&T) -> u64>(items: &mut Vec<T>, rank: F) {
    let mut src = std::mem::take(items);
    let mut dst: Vec<T> = Vec::with_capacity(src.len());

    for pass in 0..8 {
        let shift = pass * 8;
        let mut counts = [0usize; 256];
        for item in &src {
            counts[((rank(item) >> shift) & 0xff) as usize] += 1;
        }
        // All keys share this byte, nothing to move.
        if counts.iter().any(|&c| c == src.len()) {
            continue;
        }
        let mut starts = [0usize; 256];
        let mut acc = 0;
        for (start, count) in starts.iter_mut().zip(counts.iter()) {
            *start = acc;
            acc += count;
        }
        dst.clear();
        dst.resize(src.len(), src[0]);
        for item in &src {
            let bucket = ((rank(item) >> shift) & 0xff) as usize;
            dst[starts[bucket]] = *item;
            starts[bucket] += 1;
        }
        std::mem::swap(&mut src, &mut dst);
    }

    *items = src;
}
