//! Decoders for the fixed-layout 32-bit words found in CODA/EVIO buffers.
//!
//! Every word kind is a thin wrapper around the raw `u32` with explicit shift/mask
//! accessors. Nothing here depends on the platform bit-field layout, so the same
//! decoders work for buffers that were byte-swapped before interpretation.
use super::constants::*;

/// Reverse the byte order of a word when `swap` is set
#[inline]
pub fn swap_word(word: u32, swap: bool) -> u32 {
    if swap {
        word.swap_bytes()
    } else {
        word
    }
}

/// EVIO content types, as found in the type field of bank, segment and tagsegment headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Unknown32,
    UInt32,
    Float32,
    CharStar8,
    Short16,
    UShort16,
    Char8,
    UChar8,
    Double64,
    Long64,
    ULong64,
    Int32,
    TagSegment,
    AlsoSegment,
    AlsoBank,
    Composite,
    Bank,
    Segment,
    Invalid(u8),
}

/// The three flavours of EVIO container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Bank,
    Segment,
    TagSegment,
}

impl ContentType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x0 => Self::Unknown32,
            0x1 => Self::UInt32,
            0x2 => Self::Float32,
            0x3 => Self::CharStar8,
            0x4 => Self::Short16,
            0x5 => Self::UShort16,
            0x6 => Self::Char8,
            0x7 => Self::UChar8,
            0x8 => Self::Double64,
            0x9 => Self::Long64,
            0xa => Self::ULong64,
            0xb => Self::Int32,
            0xc => Self::TagSegment,
            0xd => Self::AlsoSegment,
            0xe => Self::AlsoBank,
            0xf => Self::Composite,
            0x10 => Self::Bank,
            0x20 => Self::Segment,
            other => Self::Invalid(other),
        }
    }

    pub fn as_raw(&self) -> u8 {
        match self {
            Self::Unknown32 => 0x0,
            Self::UInt32 => 0x1,
            Self::Float32 => 0x2,
            Self::CharStar8 => 0x3,
            Self::Short16 => 0x4,
            Self::UShort16 => 0x5,
            Self::Char8 => 0x6,
            Self::UChar8 => 0x7,
            Self::Double64 => 0x8,
            Self::Long64 => 0x9,
            Self::ULong64 => 0xa,
            Self::Int32 => 0xb,
            Self::TagSegment => 0xc,
            Self::AlsoSegment => 0xd,
            Self::AlsoBank => 0xe,
            Self::Composite => 0xf,
            Self::Bank => 0x10,
            Self::Segment => 0x20,
            Self::Invalid(raw) => *raw,
        }
    }

    /// If this content type is itself made of containers, which kind of container
    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self {
            Self::Bank | Self::AlsoBank => Some(ContainerKind::Bank),
            Self::Segment | Self::AlsoSegment => Some(ContainerKind::Segment),
            Self::TagSegment => Some(ContainerKind::TagSegment),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.container_kind().is_some()
    }

    /// Payload is 32-bit words
    pub fn is_word32(&self) -> bool {
        matches!(
            self,
            Self::Unknown32 | Self::UInt32 | Self::Int32 | Self::Float32
        )
    }

    /// Payload is 16-bit values
    pub fn is_short16(&self) -> bool {
        matches!(self, Self::Short16 | Self::UShort16)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}(0x{:x})", self.as_raw())
    }
}

/// Second word of an EVIO bank: tag, padding, content type, num
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankHeader(pub u32);

impl BankHeader {
    pub fn new(tag: u16, content: ContentType, num: u8) -> Self {
        Self(
            ((tag as u32) << BANK_TAG_SHIFT)
                | (((content.as_raw() as u32) << BANK_TYPE_SHIFT) & BANK_TYPE_MASK)
                | num as u32,
        )
    }

    pub fn tag(&self) -> u16 {
        (self.0 >> BANK_TAG_SHIFT) as u16
    }

    pub fn padding(&self) -> u8 {
        ((self.0 & BANK_PAD_MASK) >> BANK_PAD_SHIFT) as u8
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::from_raw(((self.0 & BANK_TYPE_MASK) >> BANK_TYPE_SHIFT) as u8)
    }

    pub fn num(&self) -> u8 {
        (self.0 & BANK_NUM_MASK) as u8
    }
}

/// EVIO segment header: tag, padding, content type, length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader(pub u32);

impl SegmentHeader {
    pub fn new(tag: u8, content: ContentType, length: u16) -> Self {
        Self(
            ((tag as u32) << SEGMENT_TAG_SHIFT)
                | (((content.as_raw() as u32) << SEGMENT_TYPE_SHIFT) & SEGMENT_TYPE_MASK)
                | length as u32,
        )
    }

    pub fn tag(&self) -> u8 {
        (self.0 >> SEGMENT_TAG_SHIFT) as u8
    }

    pub fn padding(&self) -> u8 {
        ((self.0 & SEGMENT_PAD_MASK) >> SEGMENT_PAD_SHIFT) as u8
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::from_raw(((self.0 & SEGMENT_TYPE_MASK) >> SEGMENT_TYPE_SHIFT) as u8)
    }

    /// Number of payload words following this header
    pub fn length(&self) -> usize {
        (self.0 & SEGMENT_LENGTH_MASK) as usize
    }
}

/// EVIO tagsegment header: 12-bit tag, 4-bit content type, length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSegmentHeader(pub u32);

impl TagSegmentHeader {
    pub fn tag(&self) -> u16 {
        (self.0 >> TAGSEGMENT_TAG_SHIFT) as u16
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::from_raw(((self.0 & TAGSEGMENT_TYPE_MASK) >> TAGSEGMENT_TYPE_SHIFT) as u8)
    }

    pub fn length(&self) -> usize {
        (self.0 & TAGSEGMENT_LENGTH_MASK) as usize
    }
}

/// The 4-bit data type tag of a JLab data-type-defining word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    BlockHeader,
    BlockTrailer,
    EventHeader,
    TriggerTime,
    ScalerHeader,
    DataNotValid,
    Filler,
    Other(u8),
}

impl From<u8> for DataType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::BlockHeader,
            1 => Self::BlockTrailer,
            2 => Self::EventHeader,
            3 => Self::TriggerTime,
            12 => Self::ScalerHeader,
            14 => Self::DataNotValid,
            15 => Self::Filler,
            other => Self::Other(other),
        }
    }
}

impl DataType {
    pub fn as_raw(&self) -> u8 {
        match self {
            Self::BlockHeader => 0,
            Self::BlockTrailer => 1,
            Self::EventHeader => 2,
            Self::TriggerTime => 3,
            Self::ScalerHeader => 12,
            Self::DataNotValid => 14,
            Self::Filler => 15,
            Self::Other(raw) => *raw,
        }
    }
}

/// Module identifiers carried in the JLab block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleId {
    Ti,
    Fa250,
    Fa125,
    F1TdcV2,
    F1TdcV3,
    Ts,
    Td,
    Ssp,
    JLabDisc,
    Unknown(u8),
}

impl From<u8> for ModuleId {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Ti,
            1 => Self::Fa250,
            2 => Self::Fa125,
            3 => Self::F1TdcV2,
            4 => Self::F1TdcV3,
            5 => Self::Ts,
            6 => Self::Td,
            7 => Self::Ssp,
            8 => Self::JLabDisc,
            other => Self::Unknown(other),
        }
    }
}

/// Any word of JLab module data. Only data-type-defining words carry a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataWord(pub u32);

impl DataWord {
    pub fn is_type_defining(&self) -> bool {
        self.0 & DATA_TYPE_DEFINING_MASK != 0
    }

    /// The data type, or None for continuation words
    pub fn data_type(&self) -> Option<DataType> {
        if self.is_type_defining() {
            Some(DataType::from(
                ((self.0 & DATA_TYPE_MASK) >> DATA_TYPE_SHIFT) as u8,
            ))
        } else {
            None
        }
    }
}

fn defining(data_type: DataType) -> u32 {
    DATA_TYPE_DEFINING_MASK | ((data_type.as_raw() as u32) << DATA_TYPE_SHIFT)
}

fn slot_bits(slot: u8) -> u32 {
    ((slot as u32) << SLOT_SHIFT) & SLOT_MASK
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader(pub u32);

impl BlockHeader {
    pub fn new(slot: u8, module_id: u8, block_number: u16, number_of_events: u8) -> Self {
        Self(
            defining(DataType::BlockHeader)
                | slot_bits(slot)
                | (((module_id as u32) << BLOCK_HEADER_MODID_SHIFT) & BLOCK_HEADER_MODID_MASK)
                | (((block_number as u32) << BLOCK_HEADER_BLK_NUM_SHIFT)
                    & BLOCK_HEADER_BLK_NUM_MASK)
                | number_of_events as u32,
        )
    }

    pub fn slot_number(&self) -> u8 {
        ((self.0 & SLOT_MASK) >> SLOT_SHIFT) as u8
    }

    pub fn module_id(&self) -> ModuleId {
        ModuleId::from(((self.0 & BLOCK_HEADER_MODID_MASK) >> BLOCK_HEADER_MODID_SHIFT) as u8)
    }

    pub fn event_block_number(&self) -> u16 {
        ((self.0 & BLOCK_HEADER_BLK_NUM_MASK) >> BLOCK_HEADER_BLK_NUM_SHIFT) as u16
    }

    pub fn number_of_events_in_block(&self) -> u8 {
        (self.0 & BLOCK_HEADER_BLK_LVL_MASK) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTrailer(pub u32);

impl BlockTrailer {
    pub fn new(slot: u8, words_in_block: u32) -> Self {
        Self(
            defining(DataType::BlockTrailer)
                | slot_bits(slot)
                | (words_in_block & BLOCK_TRAILER_NWORDS_MASK),
        )
    }

    pub fn slot_number(&self) -> u8 {
        ((self.0 & SLOT_MASK) >> SLOT_SHIFT) as u8
    }

    /// Words in the block, counting both the header and this trailer
    pub fn words_in_block(&self) -> usize {
        (self.0 & BLOCK_TRAILER_NWORDS_MASK) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader(pub u32);

impl EventHeader {
    pub fn new(slot: u8, event_number: u32) -> Self {
        Self(
            defining(DataType::EventHeader)
                | slot_bits(slot)
                | (event_number & EVENT_HEADER_EVT_NUM_MASK),
        )
    }

    pub fn slot_number(&self) -> u8 {
        ((self.0 & SLOT_MASK) >> SLOT_SHIFT) as u8
    }

    pub fn event_number(&self) -> u32 {
        self.0 & EVENT_HEADER_EVT_NUM_MASK
    }
}

/// FADC250 scaler header; followed by `number_scaler_words` raw counter words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalerHeader(pub u32);

impl ScalerHeader {
    pub fn new(number_scaler_words: u8) -> Self {
        Self(defining(DataType::ScalerHeader) | (number_scaler_words as u32 & SCALER_HEADER_NWORDS_MASK))
    }

    pub fn number_scaler_words(&self) -> usize {
        (self.0 & SCALER_HEADER_NWORDS_MASK) as usize
    }
}

/// Second block header word written by the TI/TS modules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerHeader2(pub u32);

impl TriggerHeader2 {
    pub fn new(has_timestamp: bool, number_of_events: u8) -> Self {
        let ts = if has_timestamp {
            TRIG_HEADER2_HAS_TIMESTAMP_MASK
        } else {
            0
        };
        Self(TRIG_HEADER2_ID | ts | number_of_events as u32)
    }

    pub fn is_valid(&self) -> bool {
        self.0 & TRIG_HEADER2_ID_MASK == TRIG_HEADER2_ID
    }

    pub fn has_timestamp(&self) -> bool {
        self.0 & TRIG_HEADER2_HAS_TIMESTAMP_MASK != 0
    }

    pub fn number_of_events(&self) -> u8 {
        (self.0 & TRIG_HEADER2_NEVENTS_MASK) as u8
    }
}

/// Per-event record header written by the TI/TS modules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEventHeader(pub u32);

impl TriggerEventHeader {
    pub fn new(event_type: u8, word_count: u16) -> Self {
        Self(((event_type as u32) << TRIG_EVENT_HEADER_TYPE_SHIFT) | (0x01 << 16) | word_count as u32)
    }

    pub fn event_type(&self) -> u8 {
        ((self.0 & TRIG_EVENT_HEADER_TYPE_MASK) >> TRIG_EVENT_HEADER_TYPE_SHIFT) as u8
    }

    /// Number of words following this header
    pub fn word_count(&self) -> usize {
        (self.0 & TRIG_EVENT_HEADER_WORD_COUNT_MASK) as usize
    }
}
