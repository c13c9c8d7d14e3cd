// CODA reserved tag ranges (inclusive)
pub const TRIGGER_BANK_TAG_MIN: u16 = 0xFF10;
pub const TRIGGER_BANK_TAG_MAX: u16 = 0xFF4F;
pub const PHYSICS_EVENT_TAG_MIN: u16 = 0xFF50;
pub const PHYSICS_EVENT_TAG_MAX: u16 = 0xFF8F;
pub const CONTROL_EVENT_TAG_MIN: u16 = 0xFFC0;
pub const CONTROL_EVENT_TAG_MAX: u16 = 0xFFEF;
pub const CODA_RESERVED_TAG_MIN: u16 = 0xFF00;
pub const CODA_RESERVED_TAG_MAX: u16 = 0xFFFF;

// Control event tags
pub const CODA_EV_SYNC: u16 = 0xFFD0;
pub const CODA_EV_PRESTART: u16 = 0xFFD1;
pub const CODA_EV_GO: u16 = 0xFFD2;
pub const CODA_EV_PAUSE: u16 = 0xFFD3;
pub const CODA_EV_END: u16 = 0xFFD4;

// ROC bank tag: low 12 bits are the ROC id, high 4 bits are status
pub const ROC_ID_MASK: u16 = 0x0FFF;
pub const ROC_STATUS_SYNC: u16 = 0x1000;

// Limits
pub const MAX_NODE_DEPTH: usize = 5; // CODA event -> ROC -> bank -> (bank) -> leaf

// JLab Data Format Standard
pub const DATA_TYPE_DEFINING_MASK: u32 = 0x8000_0000;
pub const DATA_TYPE_MASK: u32 = 0x7800_0000;
pub const DATA_TYPE_SHIFT: u32 = 27;

pub const SLOT_MASK: u32 = 0x07C0_0000;
pub const SLOT_SHIFT: u32 = 22;

pub const BLOCK_HEADER_MODID_MASK: u32 = 0x003C_0000;
pub const BLOCK_HEADER_MODID_SHIFT: u32 = 18;
pub const BLOCK_HEADER_BLK_NUM_MASK: u32 = 0x0003_FF00;
pub const BLOCK_HEADER_BLK_NUM_SHIFT: u32 = 8;
pub const BLOCK_HEADER_BLK_LVL_MASK: u32 = 0x0000_00FF;

pub const BLOCK_TRAILER_NWORDS_MASK: u32 = 0x003F_FFFF;
pub const EVENT_HEADER_EVT_NUM_MASK: u32 = 0x003F_FFFF;
pub const SCALER_HEADER_NWORDS_MASK: u32 = 0x0000_003F;

// TI/TS block layout
pub const TRIG_HEADER2_ID_MASK: u32 = 0xFF10_0000;
pub const TRIG_HEADER2_ID: u32 = 0xFF10_0000;
pub const TRIG_HEADER2_HAS_TIMESTAMP_MASK: u32 = 1 << 16;
pub const TRIG_HEADER2_NEVENTS_MASK: u32 = 0x0000_00FF;
pub const TRIG_EVENT_HEADER_TYPE_MASK: u32 = 0xFF00_0000;
pub const TRIG_EVENT_HEADER_TYPE_SHIFT: u32 = 24;
pub const TRIG_EVENT_HEADER_WORD_COUNT_MASK: u32 = 0x0000_FFFF;

// EVIO headers
pub const BANK_TAG_SHIFT: u32 = 16;
pub const BANK_PAD_MASK: u32 = 0x0000_C000;
pub const BANK_PAD_SHIFT: u32 = 14;
pub const BANK_TYPE_MASK: u32 = 0x0000_3F00;
pub const BANK_TYPE_SHIFT: u32 = 8;
pub const BANK_NUM_MASK: u32 = 0x0000_00FF;

pub const SEGMENT_TAG_SHIFT: u32 = 24;
pub const SEGMENT_PAD_MASK: u32 = 0x00C0_0000;
pub const SEGMENT_PAD_SHIFT: u32 = 22;
pub const SEGMENT_TYPE_MASK: u32 = 0x003F_0000;
pub const SEGMENT_TYPE_SHIFT: u32 = 16;
pub const SEGMENT_LENGTH_MASK: u32 = 0x0000_FFFF;

pub const TAGSEGMENT_TAG_SHIFT: u32 = 20;
pub const TAGSEGMENT_TYPE_MASK: u32 = 0x000F_0000;
pub const TAGSEGMENT_TYPE_SHIFT: u32 = 16;
pub const TAGSEGMENT_LENGTH_MASK: u32 = 0x0000_FFFF;

// EVIO v4 file block header
pub const EVIO_BLOCK_HEADER_WORDS: usize = 8;
pub const EVIO_MAGIC: u32 = 0xc0da_0100;
pub const EVIO_MAGIC_WORD: usize = 7;
pub const EVIO_VERSION_MASK: u32 = 0x0000_00FF;
pub const EVIO_LAST_BLOCK_BIT: u32 = 1 << 9;
