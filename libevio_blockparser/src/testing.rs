// Synthetic buffer construction for unit tests
use crate::constants::{EVIO_BLOCK_HEADER_WORDS, EVIO_LAST_BLOCK_BIT, EVIO_MAGIC};
use crate::words::*;

#[derive(Debug, Clone, Copy)]
enum Open {
    Bank(usize),
    Segment(usize),
}

/// Builds nested EVIO containers, backfilling lengths on close
#[derive(Debug, Default)]
pub struct EvioBuilder {
    buffer: Vec<u32>,
    open: Vec<Open>,
}

impl EvioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_bank(&mut self, tag: u16, content: ContentType, num: u8) -> &mut Self {
        self.open.push(Open::Bank(self.buffer.len()));
        self.buffer.push(0);
        self.buffer.push(BankHeader::new(tag, content, num).0);
        self
    }

    pub fn open_segment(&mut self, tag: u8, content: ContentType) -> &mut Self {
        self.open_segment_padded(tag, content, 0)
    }

    pub fn open_segment_padded(&mut self, tag: u8, content: ContentType, padding: u8) -> &mut Self {
        self.open.push(Open::Segment(self.buffer.len()));
        self.buffer
            .push(SegmentHeader::new(tag, content, 0).0 | ((padding as u32 & 0x3) << 22));
        self
    }

    pub fn words(&mut self, words: &[u32]) -> &mut Self {
        self.buffer.extend_from_slice(words);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        match self.open.pop() {
            Some(Open::Bank(start)) => {
                self.buffer[start] = (self.buffer.len() - start - 1) as u32;
            }
            Some(Open::Segment(start)) => {
                self.buffer[start] |= (self.buffer.len() - start - 1) as u32;
            }
            None => panic!("close without open"),
        }
        self
    }

    pub fn finish(&mut self) -> Vec<u32> {
        assert!(self.open.is_empty(), "unclosed containers");
        std::mem::take(&mut self.buffer)
    }
}

/// One JLab-format block: header, events (header + data words), trailer
pub fn jlab_block(slot: u8, module_id: u8, block_number: u16, events: &[&[u32]]) -> Vec<u32> {
    let mut words = vec![BlockHeader::new(slot, module_id, block_number, events.len() as u8).0];
    for (i, data) in events.iter().enumerate() {
        words.push(EventHeader::new(slot, i as u32 + 1).0);
        words.extend_from_slice(data);
    }
    let total = words.len() as u32 + 1;
    words.push(BlockTrailer::new(slot, total).0);
    words
}

/// One TI-format block: header, header 2, (type, event number, extra words) records, trailer
pub fn ti_block(slot: u8, block_number: u16, events: &[(u8, u32, &[u32])]) -> Vec<u32> {
    let mut words = vec![
        BlockHeader::new(slot, 0, block_number, events.len() as u8).0,
        TriggerHeader2::new(true, events.len() as u8).0,
    ];
    for (event_type, event_number, extra) in events {
        words.push(TriggerEventHeader::new(*event_type, 1 + extra.len() as u16).0);
        words.push(*event_number);
        words.extend_from_slice(extra);
    }
    let total = words.len() as u32 + 1;
    words.push(BlockTrailer::new(slot, total).0);
    words
}

/// One block of an EVIO v4 file (version 4) holding whole event banks
pub fn evio_block(number: u32, events: &[Vec<u32>], last: bool) -> Vec<u32> {
    let body: Vec<u32> = events.iter().flatten().copied().collect();
    let bits = (if last { EVIO_LAST_BLOCK_BIT } else { 0 }) | 4;
    let mut words = vec![
        (EVIO_BLOCK_HEADER_WORDS + body.len()) as u32,
        number,
        EVIO_BLOCK_HEADER_WORDS as u32,
        events.len() as u32,
        0,
        bits,
        0,
        EVIO_MAGIC,
    ];
    words.extend(body);
    words
}
