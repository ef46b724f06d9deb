// Byte offsets in the correlator address space. 32-bit registers occupy two
// consecutive 16-bit words, low half first.

pub const CHANNEL_STRIDE:usize = 0x40;

// Per-channel, write
pub const PRN_KEY:usize        = 0x00;
pub const CARR_NCO:usize       = 0x04;
pub const CODE_NCO:usize       = 0x08;
pub const CODE_SLEW:usize      = 0x0C;
pub const EPOCH_LOAD:usize     = 0x0E;

// Per-channel, read
pub const I_EARLY:usize        = 0x10;
pub const Q_EARLY:usize        = 0x14;
pub const I_PROMPT:usize       = 0x18;
pub const Q_PROMPT:usize       = 0x1C;
pub const I_LATE:usize         = 0x20;
pub const Q_LATE:usize         = 0x24;
pub const CARR_MEAS:usize      = 0x28;
pub const CARR_CYCLE:usize     = 0x2C;
pub const CODE_MEAS:usize      = 0x30;
pub const EPOCH:usize          = 0x34;
pub const EPOCH_MEAS:usize     = 0x36;

// Global
pub const GLOBAL_BASE:usize    = 0x800;
pub const STATUS:usize         = GLOBAL_BASE + 0x00;
pub const NEW_DATA:usize       = GLOBAL_BASE + 0x04;
pub const ACCUM_MISSED:usize   = GLOBAL_BASE + 0x08;
pub const RESET:usize          = GLOBAL_BASE + 0x0C;
pub const PROG_TIC:usize       = GLOBAL_BASE + 0x10;
pub const PROG_ACCUM_INT:usize = GLOBAL_BASE + 0x14;

pub const REGISTER_SPACE:usize = GLOBAL_BASE + 0x20;

// STATUS bits
pub const STATUS_TIC:u16 = 0x0001;

pub fn channel_register(ch:usize, reg:usize) -> usize { ch*CHANNEL_STRIDE + reg }
