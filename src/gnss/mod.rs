
use serde::{Serialize, Deserialize};

pub mod allocator;
pub mod channel;
pub mod constants;
pub mod gps_l1_ca;

/// This module contains the discriminators and the per-interval tracking entry point
pub mod tracking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GnssSystem {
	Gps,
	Glonass,
}
