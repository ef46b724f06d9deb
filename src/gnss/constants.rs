
pub mod gps {

	pub const CODE_LENGTH:usize       = 1023;
	pub const CHIP_RATE_HZ:f64        = 1.023e6;
	pub const MS_PER_BIT:u32          = 20;
	pub const BITS_PER_FRAME:u32      = 50;

}

pub mod glonass {

	pub const CODE_LENGTH:usize       = 511;
	pub const CHIP_RATE_HZ:f64        = 0.511e6;
	pub const MS_PER_BIT:u32          = 10;

}
