use crate::error::{Error, Result};
use crate::firmware::Firmware;
use crate::part::PartSource;
use crate::ram::RamSource;
use crate::table::TableSource;
use crate::var::VarSource;

/// Token separator of the reader argument string.
const DELIMITER: char = ':';

/// Upper bound on tokens in the argument string: the source name plus up
/// to seven source arguments.
const MAX_TOKENS: usize = 8;

/// A pull-based byte stream over one firmware data source.
///
/// A reader is opened from an argument string naming the source and its
/// arguments, then pulled with [`read`] until it returns an empty
/// buffer. Bytes come out in strict stream order; there is no seeking
/// and no re-reading. Dropping the reader closes it and releases
/// whatever the source held.
///
/// [`read`]: Reader::read
pub struct Reader<'f, F: Firmware> {
    cur: u64,
    len: u64,
    source: Source<'f, F>,
}

enum Source<'f, F: Firmware> {
    Ram(RamSource<'f, F>),
    Part(PartSource<'f, F>),
    Table(TableSource<'f>),
    Var(VarSource),
}

impl<'f, F: Firmware> Reader<'f, F> {
    /// Opens the source named by `args`, a colon-delimited ASCII string
    /// `name(:arg){0,7}`:
    ///
    /// * `ram[:start[:length]]`: sparse image of a physical window,
    ///   both bounds page-aligned hex, defaulting to the whole map.
    /// * `part:label[:offset[:length]]`: byte range of a partition.
    /// * `table:XSDT`: a firmware table by its 4-character signature.
    /// * `var:name[:vendor-guid]`: a firmware variable's value.
    ///
    /// Unknown names fail with [`Error::Unsupported`]; malformed
    /// argument strings with [`Error::InvalidArg`].
    pub fn open(firmware: &'f F, args: &str) -> Result<Self> {
        if args.is_empty() || !args.is_ascii() {
            return Err(Error::InvalidArg);
        }

        let mut tokens = args.split(DELIMITER);
        let name = tokens.next().unwrap_or("");
        let argv: Vec<&str> = tokens.collect();
        if name.is_empty() || argv.len() > MAX_TOKENS - 1 || argv.iter().any(|arg| arg.is_empty())
        {
            return Err(Error::InvalidArg);
        }

        let (len, source) = match name {
            "ram" => {
                let (len, source) = RamSource::open(firmware, &argv)?;
                (len, Source::Ram(source))
            }
            "part" => {
                let (len, source) = PartSource::open(firmware, &argv)?;
                (len, Source::Part(source))
            }
            "table" => {
                let (len, source) = TableSource::open(firmware, &argv)?;
                (len, Source::Table(source))
            }
            "var" => {
                let (len, source) = VarSource::open(firmware, &argv)?;
                (len, Source::Var(source))
            }
            _ => return Err(Error::Unsupported),
        };

        Ok(Self {
            cur: 0,
            len,
            source,
        })
    }

    /// Pulls the next buffer of the stream, at most `max_len` bytes.
    ///
    /// The returned slice is valid until the next call; it may be
    /// shorter than `max_len` when the source lands on a natural chunk
    /// boundary. An empty slice means the stream is exhausted, never an
    /// error. `max_len` of zero is rejected, as are boundary reads that
    /// offer the RAM source less than one header of buffer space; the
    /// stream position is unchanged by a failed read.
    pub fn read(&mut self, max_len: usize) -> Result<&[u8]> {
        if max_len == 0 {
            return Err(Error::InvalidArg);
        }

        let remaining = usize::try_from(self.len - self.cur).unwrap_or(usize::MAX);
        let budget = max_len.min(remaining);
        if budget == 0 {
            return Ok(&[]);
        }

        let buf = match &mut self.source {
            Source::Ram(source) => source.read(self.cur, budget)?,
            Source::Part(source) => source.read(self.cur, budget)?,
            Source::Table(source) => source.read(self.cur, budget),
            Source::Var(source) => source.read(self.cur, budget),
        };
        self.cur += buf.len() as u64;
        Ok(buf)
    }

    /// Total bytes this stream will emit.
    pub fn total(&self) -> u64 {
        self.len
    }

    /// Bytes emitted so far.
    pub fn position(&self) -> u64 {
        self.cur
    }

    /// Bytes still to be emitted.
    pub fn remaining(&self) -> u64 {
        self.len - self.cur
    }

    /// Closes the reader. Equivalent to dropping it; whatever the source
    /// held (the RAM working set, a fetched variable value) is released.
    pub fn close(self) {}
}

/// Parses a hex token. No `0x` prefix is required, one is accepted; any
/// other non-hex character is an error.
pub(crate) fn parse_hex(token: &str) -> Result<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidArg);
    }
    u64::from_str_radix(digits, 16).map_err(|_| Error::InvalidArg)
}
