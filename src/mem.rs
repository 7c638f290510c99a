use thiserror::Error;

/// Default store size in bytes (4000 words).
pub const DEFAULT_SIZE: usize = 16_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum MemFault {
    #[error("misaligned {width}-byte access at address {addr:#x}")]
    Misaligned { addr: u64, width: u8 },
    #[error("out-of-bounds {width}-byte access at address {addr:#x}")]
    OutOfBounds { addr: u64, width: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("line {line}: expected at least 8 hex characters, got '{text}'")]
    ShortLine { line: usize, text: String },
    #[error("line {line}: invalid hex word '{text}'")]
    BadHex { line: usize, text: String },
    #[error("image overflows memory at line {line}")]
    TooLarge { line: usize },
}

/// Flat byte-addressed store, accessed in aligned words and doublewords.
/// A doubleword lives low word first: bits [31:0] at `addr`, bits [63:32]
/// at `addr + 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    mem: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self::with_size(DEFAULT_SIZE)
    }

    pub fn with_size(bytes: usize) -> Self {
        Self {
            mem: vec![0; bytes],
        }
    }

    pub fn size(&self) -> usize {
        self.mem.len()
    }

    fn check(&self, addr: u64, width: u8) -> Result<usize, MemFault> {
        if addr % u64::from(width) != 0 {
            return Err(MemFault::Misaligned { addr, width });
        }

        let end = addr.checked_add(u64::from(width));
        match (usize::try_from(addr), end) {
            (Ok(a), Some(end)) if end <= self.mem.len() as u64 => Ok(a),
            _ => Err(MemFault::OutOfBounds { addr, width }),
        }
    }

    pub fn read_word(&self, addr: u64) -> Result<u32, MemFault> {
        let a = self.check(addr, 4)?;

        Ok(u32::from_le_bytes([
            self.mem[a],
            self.mem[a + 1],
            self.mem[a + 2],
            self.mem[a + 3],
        ]))
    }

    pub fn read_doubleword(&self, addr: u64) -> Result<u64, MemFault> {
        let a = self.check(addr, 8)?;

        let mut bytes = [0; 8];
        bytes.copy_from_slice(&self.mem[a..a + 8]);
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn write_doubleword(&mut self, addr: u64, val: u64) -> Result<(), MemFault> {
        let a = self.check(addr, 8)?;

        self.mem[a..a + 8].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    fn write_word(&mut self, addr: u64, val: u32) -> Result<(), MemFault> {
        let a = self.check(addr, 4)?;

        self.mem[a..a + 4].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    /// Word at index `idx`, for report rendering. An out-of-range index is a
    /// programming fault.
    pub fn word(&self, idx: usize) -> u32 {
        let a = idx * 4;
        u32::from_le_bytes([
            self.mem[a],
            self.mem[a + 1],
            self.mem[a + 2],
            self.mem[a + 3],
        ])
    }

    pub fn word_count(&self) -> usize {
        self.mem.len() / 4
    }

    /// Bulk-load a program image: one 32-bit word per line, hex encoded,
    /// loaded sequentially from address 0. Only the first 8 characters of
    /// each line are read. Returns the number of words loaded.
    pub fn load_image(&mut self, src: &str) -> Result<usize, ImageError> {
        let mut addr = 0u64;
        let mut count = 0;

        for (i, line) in src.lines().enumerate() {
            let line_no = i + 1;
            let text = line.get(0..8).ok_or_else(|| ImageError::ShortLine {
                line: line_no,
                text: line.to_owned(),
            })?;
            let word = u32::from_str_radix(text, 16).map_err(|_| ImageError::BadHex {
                line: line_no,
                text: text.to_owned(),
            })?;

            self.write_word(addr, word)
                .map_err(|_| ImageError::TooLarge { line: line_no })?;
            addr += 4;
            count += 1;
        }

        Ok(count)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_alignment() {
        let mem = Memory::new();
        assert_eq!(mem.read_word(0), Ok(0));
        assert_eq!(mem.read_word(4), Ok(0));
        assert_eq!(
            mem.read_word(2),
            Err(MemFault::Misaligned { addr: 2, width: 4 })
        );
    }

    #[test]
    fn test_doubleword_alignment() {
        let mut mem = Memory::new();
        assert_eq!(
            mem.read_doubleword(4),
            Err(MemFault::Misaligned { addr: 4, width: 8 })
        );
        assert_eq!(
            mem.write_doubleword(12, 1),
            Err(MemFault::Misaligned { addr: 12, width: 8 })
        );
        assert!(mem.write_doubleword(16, 1).is_ok());
    }

    #[test]
    fn test_bounds() {
        let mut mem = Memory::with_size(32);
        assert!(mem.read_word(28).is_ok());
        assert_eq!(
            mem.read_word(32),
            Err(MemFault::OutOfBounds { addr: 32, width: 4 })
        );
        assert!(mem.write_doubleword(24, 7).is_ok());
        assert_eq!(
            mem.write_doubleword(32, 7),
            Err(MemFault::OutOfBounds { addr: 32, width: 8 })
        );

        // A wrapped-negative effective address stays a bounds fault.
        let top = u64::MAX - 7;
        assert_eq!(
            mem.read_doubleword(top),
            Err(MemFault::OutOfBounds { addr: top, width: 8 })
        );
    }

    #[test]
    fn test_doubleword_layout() {
        let mut mem = Memory::new();
        mem.write_doubleword(8, 0x1122_3344_5566_7788).unwrap();

        // Low word at the lower address.
        assert_eq!(mem.read_word(8), Ok(0x5566_7788));
        assert_eq!(mem.read_word(12), Ok(0x1122_3344));
        assert_eq!(mem.read_doubleword(8), Ok(0x1122_3344_5566_7788));
    }

    #[test]
    fn test_load_image() {
        let mut mem = Memory::new();
        let n = mem.load_image("20010005\n64000000\n").unwrap();
        assert_eq!(n, 2);
        assert_eq!(mem.read_word(0), Ok(0x2001_0005));
        assert_eq!(mem.read_word(4), Ok(0x6400_0000));
        assert_eq!(mem.read_word(8), Ok(0));
    }

    #[test]
    fn test_load_image_reads_first_eight_chars() {
        let mut mem = Memory::new();
        mem.load_image("20010005 ; trailing text is ignored").unwrap();
        assert_eq!(mem.read_word(0), Ok(0x2001_0005));
    }

    #[test]
    fn test_load_image_errors() {
        let mut mem = Memory::new();
        assert_eq!(
            mem.load_image("2001"),
            Err(ImageError::ShortLine {
                line: 1,
                text: "2001".to_owned()
            })
        );
        assert_eq!(
            mem.load_image("20010005\nxyzw!!!!"),
            Err(ImageError::BadHex {
                line: 2,
                text: "xyzw!!!!".to_owned()
            })
        );

        let mut tiny = Memory::with_size(4);
        assert_eq!(
            tiny.load_image("20010005\n64000000"),
            Err(ImageError::TooLarge { line: 2 })
        );
    }
}
