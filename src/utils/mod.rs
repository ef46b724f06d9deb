
/// Sign of an integer as -1, 0 or 1
pub fn sign(x:i64) -> i64 {
	if x > 0 { 1 } else if x < 0 { -1 } else { 0 }
}

/// Saturates a frequency word computed in i64 into the unsigned range of an NCO control register
pub fn to_control_word(x:i64) -> u32 {
	if x < 0 { 0 } else if x > u32::MAX as i64 { u32::MAX } else { x as u32 }
}
