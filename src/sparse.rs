//! Bit-exact sparse image wire format.
//!
//! A sparse stream is one [`SparseHeader`] followed by `total_chunks`
//! chunks, each a [`ChunkHeader`] optionally followed by payload. All
//! fields are little-endian on the wire regardless of the host.

use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Magic number opening every sparse image.
pub const SPARSE_HEADER_MAGIC: u32 = 0xed26_ff3a;

/// Chunk payload is `chunk_sz` raw blocks.
pub const CHUNK_TYPE_RAW: u16 = 0xcac1;
/// Chunk payload is one 4-byte fill pattern (never emitted here).
pub const CHUNK_TYPE_FILL: u16 = 0xcac2;
/// Chunk has no payload; the consumer skips `chunk_sz` blocks.
pub const CHUNK_TYPE_DONT_CARE: u16 = 0xcac3;
/// Chunk payload is a CRC32 of the image so far (never emitted here).
pub const CHUNK_TYPE_CRC32: u16 = 0xcac4;

/// File header of a sparse image.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct SparseHeader {
    pub magic: U32<LittleEndian>,
    pub major_version: U16<LittleEndian>,
    pub minor_version: U16<LittleEndian>,
    /// Size of this header on the wire, 28.
    pub file_hdr_sz: U16<LittleEndian>,
    /// Size of a chunk header on the wire, 12.
    pub chunk_hdr_sz: U16<LittleEndian>,
    /// Block size in bytes, a multiple of 4.
    pub blk_sz: U32<LittleEndian>,
    /// Blocks of the expanded image, over all chunks.
    pub total_blks: U32<LittleEndian>,
    pub total_chunks: U32<LittleEndian>,
    /// CRC32 of the original data; 0 stands for unused.
    pub image_checksum: U32<LittleEndian>,
}

/// Header of one chunk of a sparse image.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct ChunkHeader {
    pub chunk_type: U16<LittleEndian>,
    pub reserved: U16<LittleEndian>,
    /// Chunk size in blocks of the expanded image.
    pub chunk_sz: U32<LittleEndian>,
    /// Bytes of the chunk on the wire: this header plus payload.
    pub total_sz: U32<LittleEndian>,
}

pub const SPARSE_HEADER_SIZE: usize = core::mem::size_of::<SparseHeader>();
pub const CHUNK_HEADER_SIZE: usize = core::mem::size_of::<ChunkHeader>();

impl SparseHeader {
    /// Header of an empty version 1.0 image of `blk_sz`-byte blocks; the
    /// chunk and block totals count up as chunks are planned.
    pub fn new(blk_sz: u32) -> Self {
        Self {
            magic: U32::new(SPARSE_HEADER_MAGIC),
            major_version: U16::new(1),
            minor_version: U16::new(0),
            file_hdr_sz: U16::new(SPARSE_HEADER_SIZE as u16),
            chunk_hdr_sz: U16::new(CHUNK_HEADER_SIZE as u16),
            blk_sz: U32::new(blk_sz),
            total_blks: U32::new(0),
            total_chunks: U32::new(0),
            image_checksum: U32::new(0),
        }
    }
}

impl ChunkHeader {
    pub fn new(chunk_type: u16, blocks: u32, total_sz: u32) -> Self {
        Self {
            chunk_type: U16::new(chunk_type),
            reserved: U16::new(0),
            chunk_sz: U32::new(blocks),
            total_sz: U32::new(total_sz),
        }
    }

    /// Payload bytes following this header on the wire.
    pub fn payload_len(&self) -> usize {
        self.total_sz.get() as usize - CHUNK_HEADER_SIZE
    }
}
