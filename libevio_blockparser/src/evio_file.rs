use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::constants::{
    EVIO_BLOCK_HEADER_WORDS, EVIO_LAST_BLOCK_BIT, EVIO_MAGIC, EVIO_MAGIC_WORD, EVIO_VERSION_MASK,
};
use super::error::EvioFileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOrder {
    Little,
    Big,
}

/// The 8-word header opening every block of an EVIO v4 file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvioBlockHeader {
    /// Words in the block, header included
    pub length: usize,
    pub number: u32,
    pub header_length: usize,
    pub event_count: u32,
    pub version: u32,
    pub is_last: bool,
}

impl EvioBlockHeader {
    fn from_words(words: &[u32; EVIO_BLOCK_HEADER_WORDS]) -> Self {
        Self {
            length: words[0] as usize,
            number: words[1],
            header_length: words[2] as usize,
            event_count: words[3],
            version: words[5] & EVIO_VERSION_MASK,
            is_last: words[5] & EVIO_LAST_BLOCK_BIT != 0,
        }
    }
}

/// An EVIO v4 file, read one event buffer at a time.
///
/// The byte order of the file is taken from the magic word of each block header, and
/// every event is handed out as host-order words.
#[derive(Debug)]
pub struct EvioFile<R: Read> {
    reader: R,
    order: Option<FileOrder>,
    block: Vec<u32>,
    position: usize,
    header: EvioBlockHeader,
    size_bytes: u64,
    bytes_read: u64,
    is_eof: bool,
}

impl EvioFile<BufReader<File>> {
    /// Open an EVIO file on disk
    pub fn new(path: &Path) -> Result<Self, EvioFileError> {
        if !path.exists() {
            return Err(EvioFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Ok(Self::from_reader(BufReader::new(file), size_bytes))
    }
}

impl<R: Read> EvioFile<R> {
    /// Read from any stream of `size_bytes` bytes. Blocks claiming more than what is
    /// left of the stream are rejected.
    pub fn from_reader(reader: R, size_bytes: u64) -> Self {
        Self {
            reader,
            order: None,
            block: Vec::new(),
            position: 0,
            header: EvioBlockHeader::default(),
            size_bytes,
            bytes_read: 0,
            is_eof: false,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn is_eof(&self) -> bool {
        self.is_eof
    }

    /// The file was written with the opposite byte order of this host
    pub fn is_swapped(&self) -> bool {
        match self.order {
            Some(FileOrder::Little) => cfg!(target_endian = "big"),
            Some(FileOrder::Big) => cfg!(target_endian = "little"),
            None => false,
        }
    }

    /// Header of the block currently being read
    pub fn block_header(&self) -> &EvioBlockHeader {
        &self.header
    }

    /// Get the next event (a complete top-level bank, length word included)
    ///
    /// Returns `EvioFileError::EndOfFile` once the file holds no more events
    pub fn get_next_event(&mut self) -> Result<Vec<u32>, EvioFileError> {
        loop {
            if self.position < self.block.len() {
                let length = self.block[self.position] as usize;
                let end = self.position + 1 + length;
                if end > self.block.len() {
                    return Err(EvioFileError::TruncatedEvent {
                        index: self.position + self.header.header_length,
                        length,
                    });
                }
                let event = self.block[self.position..end].to_vec();
                self.position = end;
                return Ok(event);
            }

            if self.is_eof || self.header.is_last {
                self.is_eof = true;
                return Err(EvioFileError::EndOfFile);
            }
            self.read_block()?;
        }
    }

    fn read_block(&mut self) -> Result<(), EvioFileError> {
        let mut raw = [0u8; EVIO_BLOCK_HEADER_WORDS * 4];
        match self.reader.read_exact(&mut raw) {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.is_eof = true;
                return Err(EvioFileError::EndOfFile);
            }
            Err(e) => return Err(EvioFileError::IOError(e)),
        }

        let order = Self::detect_order(&raw)?;
        let mut words = [0u32; EVIO_BLOCK_HEADER_WORDS];
        let mut cursor = &raw[..];
        match order {
            FileOrder::Little => cursor.read_u32_into::<LittleEndian>(&mut words)?,
            FileOrder::Big => cursor.read_u32_into::<BigEndian>(&mut words)?,
        }
        let header = EvioBlockHeader::from_words(&words);
        if header.length < EVIO_BLOCK_HEADER_WORDS || header.header_length < EVIO_BLOCK_HEADER_WORDS
        {
            return Err(EvioFileError::BadBlockLength(header.length));
        }
        // The block must fit in what is left of the file
        let remaining = self.size_bytes.saturating_sub(self.bytes_read);
        if header.length as u64 * 4 > remaining {
            return Err(EvioFileError::BadBlockLength(header.length));
        }

        // Any header words past the standard 8 are skipped
        let mut skip = vec![0u8; (header.header_length - EVIO_BLOCK_HEADER_WORDS) * 4];
        self.reader.read_exact(&mut skip)?;

        let n_words = header.length.saturating_sub(header.header_length);
        self.block.resize(n_words, 0);
        match order {
            FileOrder::Little => self.reader.read_u32_into::<LittleEndian>(&mut self.block)?,
            FileOrder::Big => self.reader.read_u32_into::<BigEndian>(&mut self.block)?,
        }
        self.bytes_read += header.length as u64 * 4;
        self.position = 0;
        self.order = Some(order);
        self.header = header;
        log::debug!(
            "EVIO block {}: {} words, {} events, version {}",
            header.number,
            header.length,
            header.event_count,
            header.version
        );
        Ok(())
    }

    fn detect_order(raw: &[u8]) -> Result<FileOrder, EvioFileError> {
        let at = EVIO_MAGIC_WORD * 4;
        let mut magic = &raw[at..at + 4];
        let little = magic.read_u32::<LittleEndian>()?;
        if little == EVIO_MAGIC {
            Ok(FileOrder::Little)
        } else if little.swap_bytes() == EVIO_MAGIC {
            Ok(FileOrder::Big)
        } else {
            Err(EvioFileError::BadMagic(little))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::evio_block;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    fn file_bytes(words: &[u32], big_endian: bool) -> Vec<u8> {
        let mut bytes = Vec::new();
        for word in words {
            if big_endian {
                bytes.write_u32::<BigEndian>(*word).unwrap();
            } else {
                bytes.write_u32::<LittleEndian>(*word).unwrap();
            }
        }
        bytes
    }

    fn events() -> Vec<Vec<u32>> {
        vec![
            vec![3, 0xFF50_1001, 1, 2],
            vec![1, 0xFFD2_0100],
            vec![2, 0xFF50_1001, 0xABCD_EF01],
        ]
    }

    fn read_all<R: Read>(file: &mut EvioFile<R>) -> Vec<Vec<u32>> {
        let mut found = Vec::new();
        loop {
            match file.get_next_event() {
                Ok(event) => found.push(event),
                Err(EvioFileError::EndOfFile) => break,
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        found
    }

    #[test]
    fn test_read_both_byte_orders() {
        let evts = events();
        let mut words = evio_block(1, &evts[..2], false);
        words.extend(evio_block(2, &evts[2..], true));

        for big_endian in [false, true] {
            let bytes = file_bytes(&words, big_endian);
            let size = bytes.len() as u64;
            let mut file = EvioFile::from_reader(Cursor::new(bytes), size);
            assert_eq!(read_all(&mut file), evts);
            assert!(file.is_eof());
            assert_eq!(file.bytes_read(), size);
            assert_eq!(file.block_header().number, 2);
            assert_eq!(
                file.is_swapped(),
                big_endian == cfg!(target_endian = "little")
            );
        }
    }

    #[test]
    fn test_end_without_last_block_flag() {
        let words = evio_block(1, &events(), false);
        let bytes = file_bytes(&words, false);
        let size = bytes.len() as u64;
        let mut file = EvioFile::from_reader(Cursor::new(bytes), size);
        assert_eq!(read_all(&mut file).len(), 3);
        assert!(matches!(
            file.get_next_event(),
            Err(EvioFileError::EndOfFile)
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut words = evio_block(1, &events(), true);
        words[EVIO_MAGIC_WORD] = 0x1234_5678;
        let mut file = EvioFile::from_reader(Cursor::new(file_bytes(&words, false)), 0);
        assert!(matches!(
            file.get_next_event(),
            Err(EvioFileError::BadMagic(0x1234_5678))
        ));
    }

    #[test]
    fn test_truncated_event() {
        let mut words = evio_block(1, &[vec![3, 0xFF50_1001, 1, 2]], true);
        words[EVIO_BLOCK_HEADER_WORDS] = 10;
        let bytes = file_bytes(&words, true);
        let size = bytes.len() as u64;
        let mut file = EvioFile::from_reader(Cursor::new(bytes), size);
        assert!(matches!(
            file.get_next_event(),
            Err(EvioFileError::TruncatedEvent { index: 8, length: 10 })
        ));
    }

    #[test]
    fn test_block_longer_than_file() {
        let mut words = evio_block(1, &events(), true);
        words[0] = 0x4000_0000;
        let bytes = file_bytes(&words, false);
        let size = bytes.len() as u64;
        let mut file = EvioFile::from_reader(Cursor::new(bytes), size);
        assert!(matches!(
            file.get_next_event(),
            Err(EvioFileError::BadBlockLength(0x4000_0000))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EvioFile::new(Path::new("/not/a/file.evio")),
            Err(EvioFileError::BadFilePath(_))
        ));
    }
}
