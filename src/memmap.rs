use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Fundamental block size of the memory map and of the sparse stream.
pub const PAGE_SIZE: u64 = 4096;

/// Descriptor type designating ordinary RAM, safe to read and dump.
pub const CONVENTIONAL_MEMORY: u32 = 7;

/// One record of the firmware memory map.
///
/// The platform hands descriptors back as raw bytes at an opaque stride
/// that may exceed this struct; only the leading fields below are
/// interpreted, everything past them is carried along untouched.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct MemoryDescriptor {
    /// Region type; [`CONVENTIONAL_MEMORY`] is the only one dumped raw.
    pub kind: u32,
    _reserved: u32,
    /// Physical address of the first byte of the region.
    pub physical_start: u64,
    /// Region length in pages of [`PAGE_SIZE`] bytes.
    pub pages: u64,
}

impl MemoryDescriptor {
    pub fn new(kind: u32, physical_start: u64, pages: u64) -> Self {
        Self {
            kind,
            _reserved: 0,
            physical_start,
            pages,
        }
    }

    /// Length of the described region in bytes. Saturates rather than
    /// wrap on a hostile page count.
    pub fn byte_len(&self) -> u64 {
        self.pages.saturating_mul(PAGE_SIZE)
    }

    /// First address past the described region.
    pub fn end(&self) -> u64 {
        self.physical_start.saturating_add(self.byte_len())
    }

    pub fn is_conventional(&self) -> bool {
        self.kind == CONVENTIONAL_MEMORY
    }
}

/// Reads the descriptor at `index` out of a raw snapshot.
///
/// Stride and bounds are validated when the snapshot is taken, so the
/// read itself cannot come up short.
pub(crate) fn descriptor_at(map: &[u8], index: usize, stride: usize) -> MemoryDescriptor {
    MemoryDescriptor::read_from_prefix(&map[index * stride..]).unwrap()
}

/// Sorts a raw descriptor snapshot in place by ascending `physical_start`.
///
/// Bubble sort over the raw bytes: firmware maps are small and usually
/// already nearly sorted, and swapping whole stride-sized records needs
/// no scratch storage. Equal start addresses are left alone; the plan
/// walk rejects them as overlapping regions.
pub(crate) fn sort_memory_map(map: &mut [u8], stride: usize) {
    let mut unsorted = map.len() / stride;
    while unsorted > 1 {
        let mut swapped = false;
        for i in 1..unsorted {
            let prev = descriptor_at(map, i - 1, stride);
            let cur = descriptor_at(map, i, stride);
            if prev.physical_start > cur.physical_start {
                let (head, tail) = map.split_at_mut(i * stride);
                head[(i - 1) * stride..].swap_with_slice(&mut tail[..stride]);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
        unsorted -= 1;
    }
}
