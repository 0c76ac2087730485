//! # Snowflake Identifiers
//!
//! 63-bit identifiers laid out as
//!
//! ```text
//! | 41 bits unix millis | 10 bits machine | 12 bits sequence |
//! ```
//!
//! The sequence is a single atomic counter per generator and wraps within its
//! 12-bit field. Uniqueness across processes depends on each process being
//! given a distinct machine index; the generator does not coordinate that.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SnowflakeError;
use crate::identity::{PackId, ResourceId};

/// Width of the millisecond timestamp field.
pub const TIMESTAMP_BITS: u32 = 41;
/// Width of the machine index field.
pub const MACHINE_BITS: u32 = 10;
/// Width of the per-process sequence field.
pub const SEQUENCE_BITS: u32 = 12;

const MACHINE_LIMIT: u64 = 1 << MACHINE_BITS;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_MASK: i64 = (1 << TIMESTAMP_BITS) - 1;

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Thread-safe Snowflake id generator.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    machine_bits: i64,
    sequence: AtomicI64,
    clock: fn() -> i64,
}

impl SnowflakeGenerator {
    /// Create a generator for the given machine index.
    ///
    /// # Errors
    ///
    /// [`SnowflakeError::MachineIndexOutOfRange`] when `machine >= 1024`.
    pub fn new(machine: u16) -> Result<Self, SnowflakeError> {
        Self::with_clock(machine, unix_millis)
    }

    /// Create a generator that reads time from `clock` (unix milliseconds).
    pub fn with_clock(machine: u16, clock: fn() -> i64) -> Result<Self, SnowflakeError> {
        if u64::from(machine) >= MACHINE_LIMIT {
            return Err(SnowflakeError::MachineIndexOutOfRange {
                index: u64::from(machine),
                limit: MACHINE_LIMIT,
            });
        }
        Ok(Self {
            machine_bits: i64::from(machine) << SEQUENCE_BITS,
            sequence: AtomicI64::new(0),
            clock,
        })
    }

    /// The machine index this generator was built with.
    pub fn machine_index(&self) -> u16 {
        (self.machine_bits >> SEQUENCE_BITS) as u16
    }

    /// Produce the next raw identifier.
    pub fn next_id(&self) -> i64 {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) & SEQUENCE_MASK;
        let millis = (self.clock)() & TIMESTAMP_MASK;
        (millis << (MACHINE_BITS + SEQUENCE_BITS)) | self.machine_bits | seq
    }

    /// Mint a pack id.
    pub fn next_pack_id(&self) -> PackId {
        PackId::from_generated(self.next_id())
    }

    /// Mint a resource id.
    pub fn next_resource_id(&self) -> ResourceId {
        ResourceId::from_generated(self.next_id())
    }
}

/// Derive a machine index from a stateful-set style hostname
/// (`<prefix>-<ordinal>`).
pub fn machine_index_from_hostname(hostname: &str, prefix: &str) -> Result<u16, SnowflakeError> {
    let mismatch = || SnowflakeError::HostnameMismatch {
        hostname: hostname.to_string(),
        prefix: prefix.to_string(),
    };
    let ordinal = hostname
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(mismatch)?;
    let index: u64 = ordinal.parse().map_err(|_| mismatch())?;
    if index >= MACHINE_LIMIT {
        return Err(SnowflakeError::MachineIndexOutOfRange {
            index,
            limit: MACHINE_LIMIT,
        });
    }
    Ok(index as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn fixed_clock() -> i64 {
        1_700_000_000_000
    }

    #[test]
    fn machine_index_bound() {
        assert!(SnowflakeGenerator::new(0).is_ok());
        assert!(SnowflakeGenerator::new(1023).is_ok());
        assert_eq!(
            SnowflakeGenerator::new(1024).unwrap_err(),
            SnowflakeError::MachineIndexOutOfRange {
                index: 1024,
                limit: 1024
            }
        );
    }

    #[test]
    fn layout_places_fields() {
        let gen = SnowflakeGenerator::with_clock(5, fixed_clock).unwrap();
        let id = gen.next_id();
        assert_eq!(id >> 22, fixed_clock());
        assert_eq!((id >> 12) & 0x3ff, 5);
        assert_eq!(id & 0xfff, 0);
        assert_eq!(gen.next_id() & 0xfff, 1);
    }

    #[test]
    fn sequence_wraps_within_field() {
        let gen = SnowflakeGenerator::with_clock(1023, fixed_clock).unwrap();
        let first = gen.next_id();
        for _ in 0..4095 {
            gen.next_id();
        }
        let wrapped = gen.next_id();
        assert_eq!(wrapped, first);
        assert_eq!((wrapped >> 12) & 0x3ff, 1023);
    }

    #[test]
    fn ids_are_non_negative() {
        let gen = SnowflakeGenerator::new(7).unwrap();
        for _ in 0..100 {
            assert!(gen.next_pack_id().get() >= 0);
            assert!(gen.next_resource_id().get() >= 0);
        }
    }

    #[test]
    fn concurrent_ids_unique() {
        let gen = Arc::new(SnowflakeGenerator::with_clock(3, fixed_clock).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = Arc::clone(&gen);
                std::thread::spawn(move || (0..1000).map(|_| gen.next_id()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn hostname_ordinal() {
        assert_eq!(
            machine_index_from_hostname("fwends-backend-3", "fwends-backend").unwrap(),
            3
        );
        assert_eq!(
            machine_index_from_hostname("fwends-backend-0", "fwends-backend").unwrap(),
            0
        );
    }

    #[test]
    fn hostname_mismatch() {
        for host in ["fwends-backend", "fwends-backend-", "other-3", "fwends-backend-x1"] {
            assert!(matches!(
                machine_index_from_hostname(host, "fwends-backend"),
                Err(SnowflakeError::HostnameMismatch { .. })
            ));
        }
        assert!(matches!(
            machine_index_from_hostname("fwends-backend-2048", "fwends-backend"),
            Err(SnowflakeError::MachineIndexOutOfRange { index: 2048, .. })
        ));
    }
}
