//! In-memory firmware fake backing the unit tests.

use std::sync::{Mutex, MutexGuard};

use zerocopy::AsBytes;

use crate::error::{Error, Result};
use crate::firmware::{Firmware, Guid, MapMeta, Partition};
use crate::memmap::{MemoryDescriptor, PAGE_SIZE};

/// The RAM source owns one process-wide working set; tests that open it
/// serialize here so parallel test threads do not trip the in-use flag.
static RAM_TEST_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn ram_test_guard() -> MutexGuard<'static, ()> {
    RAM_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A fake platform: a memory map with an arena of physical memory
/// starting at address 0, a disk with labeled partitions, resident
/// tables and variables.
pub(crate) struct FakeFirmware {
    pub(crate) descriptor_size: usize,
    pub(crate) regions: Vec<MemoryDescriptor>,
    pub(crate) ram: Vec<u8>,
    pub(crate) partitions: Vec<(String, Partition)>,
    pub(crate) disk: Vec<u8>,
    pub(crate) tables: Vec<([u8; 4], Vec<u8>)>,
    pub(crate) variables: Vec<(String, Guid, Vec<u8>)>,
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

impl FakeFirmware {
    pub(crate) fn new() -> Self {
        Self {
            descriptor_size: core::mem::size_of::<MemoryDescriptor>(),
            regions: Vec::new(),
            ram: Vec::new(),
            partitions: Vec::new(),
            disk: Vec::new(),
            tables: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Adds a map region of `pages` pages at `physical_start`, in the
    /// order given (the snapshot is reported unsorted on purpose).
    pub(crate) fn region(mut self, kind: u32, physical_start: u64, pages: u64) -> Self {
        self.regions
            .push(MemoryDescriptor::new(kind, physical_start, pages));
        self
    }

    /// Backs physical addresses `[0, pages * 4096)` with a deterministic
    /// byte pattern.
    pub(crate) fn arena(mut self, pages: u64) -> Self {
        self.ram = pattern((pages * PAGE_SIZE) as usize);
        self
    }

    /// Reports descriptors at a stride larger than the known fields.
    pub(crate) fn stride(mut self, descriptor_size: usize) -> Self {
        self.descriptor_size = descriptor_size;
        self
    }

    pub(crate) fn partition(mut self, label: &str, partition: Partition) -> Self {
        self.partitions.push((label.to_string(), partition));
        self
    }

    /// Backs the disk with `len` bytes of a deterministic pattern.
    pub(crate) fn disk(mut self, len: usize) -> Self {
        self.disk = pattern(len);
        self
    }

    pub(crate) fn table(mut self, signature: [u8; 4], data: Vec<u8>) -> Self {
        self.tables.push((signature, data));
        self
    }

    pub(crate) fn variable(mut self, name: &str, vendor: &str, value: Vec<u8>) -> Self {
        self.variables
            .push((name.to_string(), vendor.parse().unwrap(), value));
        self
    }
}

impl Firmware for FakeFirmware {
    fn memory_map(&self, buf: &mut [u8]) -> Result<MapMeta> {
        let map_size = self.regions.len() * self.descriptor_size;
        if map_size > buf.len() {
            return Err(Error::OutOfResources);
        }
        for (i, descriptor) in self.regions.iter().enumerate() {
            let at = i * self.descriptor_size;
            buf[at..at + self.descriptor_size].fill(0);
            descriptor.write_to_prefix(&mut buf[at..]).unwrap();
        }
        Ok(MapMeta {
            map_size,
            descriptor_size: self.descriptor_size,
        })
    }

    fn physical(&self, start: u64, len: usize) -> Result<&[u8]> {
        let start = usize::try_from(start).map_err(|_| Error::Io)?;
        let end = start.checked_add(len).ok_or(Error::Io)?;
        self.ram.get(start..end).ok_or(Error::Io)
    }

    fn partition_by_label(&self, label: &str) -> Result<Partition> {
        self.partitions
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, partition)| partition.clone())
            .ok_or(Error::NotFound)
    }

    fn read_disk(&self, _partition: &Partition, offset: u64, buf: &mut [u8]) -> Result<()> {
        let offset = usize::try_from(offset).map_err(|_| Error::Io)?;
        let end = offset.checked_add(buf.len()).ok_or(Error::Io)?;
        let src = self.disk.get(offset..end).ok_or(Error::Io)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn table(&self, signature: [u8; 4]) -> Result<&[u8]> {
        self.tables
            .iter()
            .find(|(sig, _)| *sig == signature)
            .map(|(_, data)| data.as_slice())
            .ok_or(Error::NotFound)
    }

    fn variables(&self) -> Result<Vec<(String, Guid)>> {
        Ok(self
            .variables
            .iter()
            .map(|(name, vendor, _)| (name.clone(), *vendor))
            .collect())
    }

    fn variable(&self, name: &str, vendor: &Guid) -> Result<Vec<u8>> {
        self.variables
            .iter()
            .find(|(n, g, _)| n == name && g == vendor)
            .map(|(_, _, value)| value.clone())
            .ok_or(Error::NotFound)
    }
}
