//! The partition hash every map and reduce worker must agree on.
//!
//! FNV-1a over the key's UTF-8 bytes, sign bit cleared, matching
//! `original_source/mr/worker.go`'s `ihash`. Any stable deterministic hash
//! would satisfy `spec.md` §4.4, but the hash is a coordination point
//! between map and reduce workers, so it is pinned here rather than left
//! pluggable (`spec.md` §9's open question, resolved in `DESIGN.md`).

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

/// 32-bit FNV-1a hash with the sign bit cleared.
pub fn fnv1a32(key: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash & 0x7fff_ffff
}

/// The reduce partition `p` in `[0, n_reduce)` a key routes to.
pub fn partition(key: &str, n_reduce: usize) -> usize {
    assert!(n_reduce > 0, "n_reduce must be positive");
    (fnv1a32(key) as usize) % n_reduce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_deterministic() {
        let p1 = partition("foo", 7);
        let p2 = partition("foo", 7);
        assert_eq!(p1, p2);
        assert!(p1 < 7);
    }

    #[test]
    fn partition_is_stable_across_n_reduce_values_for_same_hash() {
        let h = fnv1a32("bar");
        assert_eq!(partition("bar", 4), (h as usize) % 4);
    }

    #[test]
    fn single_reduce_task_collapses_everything_to_zero() {
        for key in ["a", "b", "zzz", ""] {
            assert_eq!(partition(key, 1), 0);
        }
    }
}
