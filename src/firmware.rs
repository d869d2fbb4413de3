use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Shape of a memory-map snapshot taken with [`Firmware::memory_map`].
///
/// `descriptor_size` is the stride between descriptors in the snapshot
/// buffer. The platform may report descriptors larger than the fields
/// this crate knows about; consumers must step by the reported stride,
/// never by their own struct size.
#[derive(Clone, Copy, Debug)]
pub struct MapMeta {
    /// Bytes of descriptor data written into the snapshot buffer.
    pub map_size: usize,

    /// Stride of one descriptor within the snapshot buffer.
    pub descriptor_size: usize,
}

/// A disk partition on the user logical unit, resolved by label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// First logical block of the partition.
    pub starting_lba: u64,

    /// Last logical block of the partition (inclusive).
    pub ending_lba: u64,

    /// Block size of the backing device in bytes.
    pub block_size: u64,
}

impl Partition {
    /// Absolute byte offset of the partition on its device.
    pub fn byte_offset(&self) -> u64 {
        self.starting_lba * self.block_size
    }

    /// Byte extent of the partition.
    pub fn byte_len(&self) -> u64 {
        (self.ending_lba + 1 - self.starting_lba) * self.block_size
    }
}

/// Base trait for the platform a reader runs against.
///
/// Every firmware service the sources need goes through this seam: the
/// memory-map snapshot and physical-range access for `ram`, block-device
/// reads for `part`, and the table and variable services. On a firmware
/// target physical and flat addresses coincide and [`physical`] is a
/// cast; hosted implementations (including the test fake) back it with a
/// mapping of their own.
///
/// [`physical`]: Firmware::physical
pub trait Firmware {
    /// Snapshots the platform memory map into `buf` and reports how many
    /// bytes were written and at which descriptor stride.
    fn memory_map(&self, buf: &mut [u8]) -> Result<MapMeta>;

    /// Exposes a byte slice of the physical range `[start, start + len)`.
    fn physical(&self, start: u64, len: usize) -> Result<&[u8]>;

    /// Resolves a partition by its label on the user logical unit.
    fn partition_by_label(&self, label: &str) -> Result<Partition>;

    /// One synchronous block-device read at an absolute byte offset of
    /// the device backing `partition`.
    fn read_disk(&self, partition: &Partition, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Resolves a firmware descriptor table by its 4-byte signature to
    /// the table's resident bytes, declared length included.
    fn table(&self, signature: [u8; 4]) -> Result<&[u8]>;

    /// Enumerates all firmware variables as (name, vendor GUID) pairs.
    fn variables(&self) -> Result<Vec<(String, Guid)>>;

    /// Fetches the value of one firmware variable.
    fn variable(&self, name: &str, vendor: &Guid) -> Result<Vec<u8>>;
}

/// A vendor GUID, written in the canonical 8-4-4-4-12 textual form.
///
/// # Examples
///
/// ```rust
/// use fwdump::Guid;
///
/// let guid: Guid = "8be4df61-93ca-11d2-aa0d-00e098032b8c".parse().unwrap();
/// assert_eq!(guid.to_string(), "8be4df61-93ca-11d2-aa0d-00e098032b8c");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !s.bytes().all(|b| b == b'-' || b.is_ascii_hexdigit()) {
            return Err(Error::InvalidArg);
        }

        let groups: Vec<&str> = s.split('-').collect();
        let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        if lengths != [8, 4, 4, 4, 12] {
            return Err(Error::InvalidArg);
        }

        let data1 = u32::from_str_radix(groups[0], 16).map_err(|_| Error::InvalidArg)?;
        let data2 = u16::from_str_radix(groups[1], 16).map_err(|_| Error::InvalidArg)?;
        let data3 = u16::from_str_radix(groups[2], 16).map_err(|_| Error::InvalidArg)?;

        let tail = format!("{}{}", groups[3], groups[4]);
        let mut data4 = [0u8; 8];
        for (i, byte) in data4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&tail[2 * i..2 * i + 2], 16)
                .map_err(|_| Error::InvalidArg)?;
        }

        Ok(Self {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn guid_round_trips_through_text() {
        let text = "8be4df61-93ca-11d2-aa0d-00e098032b8c";
        let guid: Guid = text.parse().unwrap();
        assert_eq!(guid.to_string(), text);
    }

    #[test]
    fn guid_accepts_uppercase_digits() {
        let guid: Guid = "8BE4DF61-93CA-11D2-AA0D-00E098032B8C".parse().unwrap();
        assert_eq!(guid.to_string(), "8be4df61-93ca-11d2-aa0d-00e098032b8c");
    }

    #[test]
    fn guid_rejects_malformed_text() {
        for text in [
            "",
            "8be4df61",
            "8be4df61-93ca-11d2-aa0d",
            "8be4df6-193ca-11d2-aa0d-00e098032b8c",
            "8be4df61-93ca-11d2-aa0d-00e098032b8",
            "8be4dg61-93ca-11d2-aa0d-00e098032b8c",
            "+be4df61-93ca-11d2-aa0d-00e098032b8c",
        ] {
            assert_eq!(text.parse::<Guid>(), Err(Error::InvalidArg), "{:?}", text);
        }
    }

    #[test]
    fn partition_byte_geometry() {
        let partition = Partition {
            starting_lba: 2,
            ending_lba: 25,
            block_size: 512,
        };
        assert_eq!(partition.byte_offset(), 0x400);
        assert_eq!(partition.byte_len(), 0x3000);
    }
}
