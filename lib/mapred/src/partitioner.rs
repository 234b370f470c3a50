//! Key → partition strategies.
//!
//! A partitioner is called concurrently from every mapper thread with no extra
//! synchronization, so implementations must be pure functions of their arguments.

use crate::error::MrResult;
use tracing::warn;

const HASH_SEED: u64 = 5381;
const HASH_MULTIPLIER: u64 = 33;
/// Width of the integer the sorted partitioner slices its index from.
const WORD_BITS: u32 = 32;

pub trait Partitioner: Sync {
    /// Maps `key` to an index that must lie in `[0, num_partitions)`.
    fn partition(&self, key: &str, num_partitions: usize) -> usize;

    /// Called once before the map phase with the run's partition count.
    fn prepare(&self, _num_partitions: usize) -> MrResult<()> {
        Ok(())
    }
}

impl<F> Partitioner for F
where
    F: Fn(&str, usize) -> usize + Sync,
{
    fn partition(&self, key: &str, num_partitions: usize) -> usize {
        self(key, num_partitions)
    }
}

/// djb2 over the key's bytes, reduced modulo the partition count.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashPartitioner;

impl Partitioner for HashPartitioner {
    fn partition(&self, key: &str, num_partitions: usize) -> usize {
        hash_partition(key, num_partitions)
    }
}

/// djb2 with wrapping 64-bit arithmetic. Bytes are taken as unsigned, so a non-ASCII key
/// hashes differently from an implementation that sign-extends bytes of 0x80 and above.
/// A zero partition count yields 0.
pub fn hash_partition(key: &str, num_partitions: usize) -> usize {
    let hash = key
        .bytes()
        .fold(HASH_SEED, |h, c| h.wrapping_mul(HASH_MULTIPLIER).wrapping_add(c as u64));
    hash.checked_rem(num_partitions as u64).unwrap_or(0) as usize
}

/// Range partitioning for numeric keys: the top `log2(num_partitions)` bits of the key's
/// 32-bit value select the partition, so partition order follows numeric key order.
///
/// Only spreads keys when `num_partitions` is a power of two and keys are roughly uniform
/// over the 32-bit range. Small numbers all land in partition 0, and a partition count that
/// is not a power of two leaves the upper partitions unused.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedPartitioner;

impl Partitioner for SortedPartitioner {
    fn partition(&self, key: &str, num_partitions: usize) -> usize {
        sorted_partition(key, num_partitions)
    }

    fn prepare(&self, num_partitions: usize) -> MrResult<()> {
        if !num_partitions.is_power_of_two() {
            warn!(
                num_partitions,
                used = 1usize << bits_needed(num_partitions),
                "sorted partitioning with a partition count that is not a power of two leaves partitions empty"
            );
        }
        Ok(())
    }
}

pub fn sorted_partition(key: &str, num_partitions: usize) -> usize {
    let number = u32::try_from(parse_unsigned(key)).unwrap_or(u32::MAX);
    let bits = bits_needed(num_partitions);
    number.checked_shr(WORD_BITS.saturating_sub(bits)).unwrap_or(0) as usize
}

/// How many times `n` can be halved before reaching 1.
fn bits_needed(n: usize) -> u32 {
    n.checked_ilog2().unwrap_or(0)
}

/// Parses `text` the way C's `strtoul(text, NULL, 0)` does.
///
/// Leading whitespace and one sign are skipped, the base is picked from the prefix
/// (`0x` hex, leading `0` octal, else decimal) and the longest valid digit run is read.
/// No digits yields 0, overflow saturates at `u64::MAX`, and a minus sign negates modulo 2^64.
pub fn parse_unsigned(text: &str) -> u64 {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c) {
        i += 1;
    }
    let negative = match bytes.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };
    let rest = &bytes[i..];
    let hex_prefix = rest.len() > 2
        && rest[0] == b'0'
        && (rest[1] == b'x' || rest[1] == b'X')
        && rest[2].is_ascii_hexdigit();
    let (radix, digits) = if hex_prefix {
        (16, &rest[2..])
    } else if rest.first() == Some(&b'0') {
        (8, rest)
    } else {
        (10, rest)
    };

    let mut value: u64 = 0;
    let mut overflow = false;
    for &b in digits {
        let Some(d) = (b as char).to_digit(radix) else { break };
        match value.checked_mul(radix as u64).and_then(|v| v.checked_add(d as u64)) {
            Some(v) => value = v,
            None => overflow = true,
        }
    }
    if overflow {
        u64::MAX
    } else if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_djb2() {
        // 5381 * 33 + 'a'
        assert_eq!(hash_partition("a", 1_000_000), 177_670);
        assert_eq!(hash_partition("", 7), (5381 % 7) as usize);
        // "é" is 0xC3 0xA9, folded in as unsigned bytes
        let expected = (5381u64 * 33 + 0xC3) * 33 + 0xA9;
        assert_eq!(hash_partition("é", 1 << 30), (expected % (1 << 30)) as usize);
        for n in 1..20 {
            assert!(hash_partition("some key", n) < n);
        }
    }

    #[test]
    fn hash_is_deterministic_across_instances() {
        let a = HashPartitioner.partition("dog", 13);
        let b = HashPartitioner.partition("dog", 13);
        assert_eq!(a, b);
    }

    #[test]
    fn strtoul_bases_and_prefixes() {
        assert_eq!(parse_unsigned("42"), 42);
        assert_eq!(parse_unsigned("  +42abc"), 42);
        assert_eq!(parse_unsigned("0x1F"), 31);
        assert_eq!(parse_unsigned("0X1f"), 31);
        assert_eq!(parse_unsigned("017"), 15);
        assert_eq!(parse_unsigned("09"), 0);
        assert_eq!(parse_unsigned("0x"), 0);
        assert_eq!(parse_unsigned("0xg"), 0);
        assert_eq!(parse_unsigned("cat"), 0);
        assert_eq!(parse_unsigned(""), 0);
        assert_eq!(parse_unsigned("-1"), u64::MAX);
        assert_eq!(parse_unsigned("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn sorted_partition_takes_top_bits() {
        // 4 partitions -> top 2 bits of a 32-bit word
        assert_eq!(sorted_partition("0", 4), 0);
        assert_eq!(sorted_partition("0x3FFFFFFF", 4), 0);
        assert_eq!(sorted_partition("0x40000000", 4), 1);
        assert_eq!(sorted_partition("0x80000000", 4), 2);
        assert_eq!(sorted_partition("0xFFFFFFFF", 4), 3);
        assert_eq!(sorted_partition("3221225472", 4), 3);
    }

    #[test]
    fn sorted_partition_saturates_and_handles_one_partition() {
        assert_eq!(sorted_partition("0x1FFFFFFFF", 8), 7);
        assert_eq!(sorted_partition("0xFFFFFFFF", 1), 0);
        assert_eq!(sorted_partition("12345", 0), 0);
    }

    #[test]
    fn sorted_partition_preserves_numeric_order() {
        let keys = [0u32, 1 << 20, 1 << 29, 1 << 30, 3 << 29, 1 << 31, u32::MAX];
        let parts: Vec<usize> = keys.iter().map(|k| sorted_partition(&k.to_string(), 8)).collect();
        assert!(parts.windows(2).all(|w| w[0] <= w[1]), "{parts:?}");
    }

    #[test]
    fn non_power_of_two_stays_in_range() {
        for key in ["0", "0xFFFFFFFF", "0x80000000", "123456789"] {
            assert!(sorted_partition(key, 6) < 4);
        }
        assert!(SortedPartitioner.prepare(6).is_ok());
    }

    #[test]
    fn closures_are_partitioners() {
        let first_byte = |key: &str, n: usize| key.bytes().next().map_or(0, |b| b as usize % n);
        assert_eq!(Partitioner::partition(&first_byte, "b", 2), 0);
        assert_eq!(Partitioner::partition(&first_byte, "c", 2), 1);
    }
}
