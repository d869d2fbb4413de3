use std::sync::{Mutex, MutexGuard};

use log::{debug, error};
use once_cell::sync::Lazy;
use zerocopy::{AsBytes, FromZeroes};

use crate::error::{Error, Result};
use crate::firmware::Firmware;
use crate::memmap::{descriptor_at, sort_memory_map, MemoryDescriptor, PAGE_SIZE};
use crate::reader::parse_hex;
use crate::sparse::{
    ChunkHeader, SparseHeader, CHUNK_HEADER_SIZE, CHUNK_TYPE_DONT_CARE, CHUNK_TYPE_RAW,
    SPARSE_HEADER_SIZE,
};

/// Upper bound on memory-map descriptors and on planned chunks.
/// Realistic firmware maps stay well below this even with one hole per
/// region.
const MAX_MEMORY_REGIONS: usize = 256;

/// Worst-case descriptor stride the snapshot buffer must accommodate.
const MAX_DESCRIPTOR_SIZE: usize = 48;

/// Working set of the RAM source.
///
/// The pages being streamed include this very state, so it must not
/// move, grow or be reallocated while a dump is running: everything
/// lives in one process-wide static sized at compile time, and the mutex
/// around it doubles as the in-use flag. Open acquires, dropping the
/// source releases. The chunk plan is embedded here and is never freed.
struct RamPriv {
    /// Raw memory-map snapshot, stride-addressed.
    memmap: [u8; MAX_MEMORY_REGIONS * MAX_DESCRIPTOR_SIZE],

    /// Requested window.
    start: u64,
    end: u64,

    /// Physical range of the chunk currently streaming.
    cur: u64,
    cur_end: u64,

    /// Sparse plan.
    chunk_count: usize,
    cur_chunk: usize,
    header: SparseHeader,
    chunks: [ChunkHeader; MAX_MEMORY_REGIONS],
}

static RAM_STATE: Lazy<Mutex<RamPriv>> = Lazy::new(|| Mutex::new(RamPriv::empty()));

impl RamPriv {
    fn empty() -> Self {
        Self {
            memmap: [0; MAX_MEMORY_REGIONS * MAX_DESCRIPTOR_SIZE],
            start: 0,
            end: 0,
            cur: 0,
            cur_end: 0,
            chunk_count: 0,
            cur_chunk: 0,
            header: SparseHeader::new(PAGE_SIZE as u32),
            chunks: [ChunkHeader::new_zeroed(); MAX_MEMORY_REGIONS],
        }
    }

    /// Forgets the previous dump. The snapshot buffer and the chunk
    /// array need no clearing; all access is bounded by the counts
    /// rebuilt below.
    fn reset(&mut self) {
        self.start = 0;
        self.end = 0;
        self.cur = 0;
        self.cur_end = 0;
        self.chunk_count = 0;
        self.cur_chunk = 0;
        self.header = SparseHeader::new(PAGE_SIZE as u32);
    }

    fn add_chunk(&mut self, chunk_type: u16, size: u64) -> Result<()> {
        if size % PAGE_SIZE != 0 {
            error!(
                "chunk size {:#x} is not a multiple of the {} byte block size",
                size, PAGE_SIZE
            );
            return Err(Error::InvalidArg);
        }

        if self.chunk_count == self.chunks.len() {
            error!("chunk plan exceeds {} entries", self.chunks.len());
            return Err(Error::OutOfResources);
        }

        let blocks = (size / PAGE_SIZE) as u32;
        let mut total_sz = CHUNK_HEADER_SIZE as u32;
        if chunk_type == CHUNK_TYPE_RAW {
            total_sz += size as u32;
        }

        self.chunks[self.chunk_count] = ChunkHeader::new(chunk_type, blocks, total_sz);
        self.chunk_count += 1;

        self.header
            .total_chunks
            .set(self.header.total_chunks.get() + 1);
        self.header
            .total_blks
            .set(self.header.total_blks.get() + blocks);

        Ok(())
    }

    /// Walks the sorted snapshot once and plans one chunk per memory
    /// region or hole intersecting the window. Raw chunks may only come
    /// from conventional memory; everything else is elided as don't-care.
    fn build_chunks(&mut self, descriptors: usize, stride: usize) -> Result<()> {
        let mut prev_end: u64 = 0;
        let mut reached_end = false;

        for i in 0..descriptors {
            let descriptor = descriptor_at(&self.memmap, i, stride);
            let region_start = descriptor.physical_start;
            let region_end = descriptor.end();

            // Window entirely past this region
            if self.start >= region_end {
                prev_end = region_end;
                continue;
            }

            if prev_end != region_start {
                if prev_end > region_start {
                    error!("memory map overlap at {:#x}, aborting", region_start);
                    return Err(Error::InvalidArg);
                }

                // Hole between two regions, clipped to the window
                let from = prev_end.max(self.start);
                let to = if self.end != 0 {
                    region_start.min(self.end)
                } else {
                    region_start
                };
                if from < to {
                    self.add_chunk(CHUNK_TYPE_DONT_CARE, to - from)?;
                }

                if self.end != 0 && self.end <= region_start {
                    reached_end = true;
                    break;
                }
            }

            let from = region_start.max(self.start);
            let to = if self.end != 0 {
                region_end.min(self.end)
            } else {
                region_end
            };
            let chunk_type = if descriptor.is_conventional() {
                CHUNK_TYPE_RAW
            } else {
                CHUNK_TYPE_DONT_CARE
            };
            if from < to {
                self.add_chunk(chunk_type, to - from)?;
            }

            if self.end != 0 && self.end <= region_end {
                reached_end = true;
                break;
            }

            prev_end = region_end;
        }

        if self.end != 0 && !reached_end {
            error!("end boundary is in unreachable memory (>= {:#x})", prev_end);
            return Err(Error::InvalidArg);
        }

        if self.chunk_count == 0 {
            error!("start boundary {:#x} is in unreachable memory", self.start);
            return Err(Error::InvalidArg);
        }

        if self.end == 0 {
            self.end = prev_end;
        }

        Ok(())
    }

    /// Bytes the stream will carry: file header, chunk headers and raw
    /// payloads.
    fn stream_len(&self) -> u64 {
        SPARSE_HEADER_SIZE as u64
            + self.chunks[..self.chunk_count]
                .iter()
                .map(|chunk| u64::from(chunk.total_sz.get()))
                .sum::<u64>()
    }
}

/// Streams a window of physical RAM as a sparse image.
pub(crate) struct RamSource<'f, F: Firmware> {
    firmware: &'f F,
    state: MutexGuard<'static, RamPriv>,
}

impl<'f, F: Firmware> RamSource<'f, F> {
    /// Opens the RAM source. Arguments are up to two page-aligned hex
    /// tokens, window start (default 0) and window length (default: to
    /// the end of the memory map).
    pub(crate) fn open(firmware: &'f F, argv: &[&str]) -> Result<(u64, Self)> {
        if argv.len() > 2 {
            return Err(Error::InvalidArg);
        }

        // Single working set; a second open while a dump is running must
        // not disturb it. Every error path below releases the guard.
        let mut state = RAM_STATE.try_lock().map_err(|_| Error::Unsupported)?;
        state.reset();

        if let Some(token) = argv.first() {
            state.start = parse_hex(token)?;
        }
        if let Some(token) = argv.get(1) {
            let length = parse_hex(token)?;
            if length == 0 {
                error!("window length must not be zero");
                return Err(Error::InvalidArg);
            }
            state.end = state.start.saturating_add(length);
        }

        if state.start % PAGE_SIZE != 0 || state.end % PAGE_SIZE != 0 {
            error!("window boundaries must be multiples of {} bytes", PAGE_SIZE);
            return Err(Error::InvalidArg);
        }

        let meta = firmware.memory_map(&mut state.memmap).map_err(|err| {
            error!("failed to snapshot the memory map");
            err
        })?;
        if meta.descriptor_size < core::mem::size_of::<MemoryDescriptor>()
            || meta.map_size > state.memmap.len()
        {
            error!(
                "malformed memory map snapshot: {} bytes at stride {}",
                meta.map_size, meta.descriptor_size
            );
            return Err(Error::Io);
        }

        let descriptors = meta.map_size / meta.descriptor_size;
        sort_memory_map(
            &mut state.memmap[..descriptors * meta.descriptor_size],
            meta.descriptor_size,
        );

        state.build_chunks(descriptors, meta.descriptor_size)?;

        let len = state.stream_len();
        debug!(
            "planned {} chunks, {} blocks, {} stream bytes",
            state.chunk_count,
            state.header.total_blks.get(),
            len
        );

        Ok((len, Self { firmware, state }))
    }

    pub(crate) fn read(&mut self, cur: u64, budget: usize) -> Result<&[u8]> {
        let state = &mut *self.state;

        // First byte of the stream: the sparse file header
        if cur == 0 {
            if budget < SPARSE_HEADER_SIZE {
                return Err(Error::InvalidArg);
            }
            state.cur = state.start;
            state.cur_end = state.start;
            return Ok(state.header.as_bytes());
        }

        // Chunk boundary: emit the next chunk header
        if state.cur == state.cur_end {
            if state.cur_chunk == state.chunk_count || budget < CHUNK_HEADER_SIZE {
                return Err(Error::InvalidArg);
            }
            let chunk = state.chunks[state.cur_chunk];
            state.cur_chunk += 1;
            state.cur_end = state.cur + u64::from(chunk.chunk_sz.get()) * PAGE_SIZE;
            if chunk.chunk_type.get() != CHUNK_TYPE_RAW {
                // No payload follows; the next read emits another header
                state.cur = state.cur_end;
            }
            return Ok(state.chunks[state.cur_chunk - 1].as_bytes());
        }

        // Continue the current raw chunk. The physical memory itself is
        // the buffer; nothing is copied or allocated.
        let len = budget.min((state.cur_end - state.cur) as usize);
        let buf = self.firmware.physical(state.cur, len)?;
        state.cur += len as u64;
        Ok(buf)
    }
}
