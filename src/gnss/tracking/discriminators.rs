
use crate::correlator::Accumulators;
use crate::utils::sign;

// Angles are fixed point with one radian = 16384
pub const SCALED_RADIAN:i64  = 16384;
pub const SCALED_PI_ON_2:i64 = 25736;
pub const SCALED_PI:i64      = 51472;

// Full scale of the normalized early-minus-late code discriminator
pub const CODE_ERROR_SCALE:i64 = 8192;

/// Approximate magnitude of a 2D vector: larger component plus half the smaller
pub fn rss(a:i64, b:i64) -> i64 {
	let c = a.abs();
	let d = b.abs();
	if c == 0 && d == 0 { 0 }
	else if c > d { c + (d >> 1) }
	else { d + (c >> 1) }
}

/// Integer square root by Newton iteration, rounded down
pub fn sqrt_newton(x:u64) -> u64 {
	if x == 0 { return 0; }

	// Start above the root so the iteration decreases monotonically
	let bits = 64 - x.leading_zeros();
	let mut r:u64 = 1 << ((bits + 1) / 2);
	loop {
		let next = (r + x / r) >> 1;
		if next >= r { return r; }
		r = next;
	}
}

pub fn envelope(i:i32, q:i32) -> i64 {
	let i = i as i64;
	let q = q as i64;
	sqrt_newton((i*i) as u64 + (q*q) as u64) as i64
}

fn atan_series(n:i64) -> i64 {
	n - ((((n * n) >> 14) * n) >> 13) / 9
}

/// Four-quadrant arctangent with a third-order series on each octant
pub fn atan2_fixed(y:i64, x:i64) -> i64 {
	if x == 0 && y == 0 { return 0; }

	// The ratio is at most one in magnitude on every branch, so it fits after the division
	let ratio = |num:i64, den:i64| -> i64 { (((num as i128) << 14) / (den as i128)) as i64 };

	if x > 0 && x >= y.abs() {
		atan_series(ratio(y, x))
	} else if x <= 0 && -x >= y.abs() {
		let a = atan_series(ratio(y, x));
		if y > 0 { a + SCALED_PI } else { a - SCALED_PI }
	} else if y > 0 {
		SCALED_PI_ON_2 - atan_series(ratio(x, y))
	} else {
		-atan_series(ratio(x, y)) - SCALED_PI_ON_2
	}
}

/// Phase rotation of the prompt correlator between consecutive intervals; zero when any
/// prompt component of either interval is zero
pub fn freq_error(cur:&Accumulators, prev:&Accumulators, shift:u32) -> i64 {
	if cur.i_prompt == 0 || cur.q_prompt == 0 || prev.i_prompt == 0 || prev.q_prompt == 0 {
		return 0;
	}

	let (ip, qp) = (cur.i_prompt as i128, cur.q_prompt as i128);
	let (ip_old, qp_old) = (prev.i_prompt as i128, prev.q_prompt as i128);

	let cross = (ip*qp_old - ip_old*qp) >> shift;
	let dot = (ip*ip_old + qp*qp_old).abs() >> shift;

	atan2_fixed(clamp_i64(cross), clamp_i64(dot))
}

/// Costas phase discriminator, insensitive to data bit flips. Holds `old_error` when any prompt
/// component of either interval is zero.
pub fn carrier_error(cur:&Accumulators, prev:&Accumulators, old_error:i64, divisor:i64) -> i64 {
	if cur.i_prompt == 0 || cur.q_prompt == 0 || prev.i_prompt == 0 || prev.q_prompt == 0 {
		return old_error;
	}

	let ip = cur.i_prompt as i64;
	let qp = cur.q_prompt as i64;
	atan2_fixed(qp * sign(ip), ip.abs()) / divisor
}

/// Normalized early-minus-late envelope discriminator. Holds `old_error` when any early or late
/// component is zero.
pub fn code_error(cur:&Accumulators, old_error:i64) -> i64 {
	if cur.i_early == 0 || cur.q_early == 0 || cur.i_late == 0 || cur.q_late == 0 {
		return old_error;
	}

	let early = envelope(cur.i_early, cur.q_early);
	let late = envelope(cur.i_late, cur.q_late);
	if early + late == 0 { return old_error; }

	CODE_ERROR_SCALE * (early - late) / (early + late)
}

fn clamp_i64(x:i128) -> i64 {
	if x > i64::MAX as i128 { i64::MAX } else if x < i64::MIN as i128 { i64::MIN } else { x as i64 }
}

#[cfg(test)]
mod tests {

	use super::*;

	use rand::{Rng, SeedableRng};
	use rand::rngs::StdRng;

	fn prompt(i:i32, q:i32) -> Accumulators { Accumulators::prompt(i, q) }

	#[test]
	fn atan2_of_positive_axis_is_zero() {
		for x in [1i64, 7, 1000, 1 << 20, 1 << 40].iter() {
			assert_eq!(atan2_fixed(0, *x), 0);
		}
	}

	#[test]
	fn atan2_axes_and_diagonals() {
		assert_eq!(atan2_fixed(0, 0), 0);
		assert_eq!(atan2_fixed(5, 0), SCALED_PI_ON_2);
		assert_eq!(atan2_fixed(-5, 0), -SCALED_PI_ON_2);
		assert_eq!(atan2_fixed(0, -5), -SCALED_PI);

		// pi/4 within the accuracy of the series
		let diag = atan2_fixed(1000, 1000);
		assert!((diag - 12868).abs() < 200, "{}", diag);
		assert!((atan2_fixed(-1000, -1000) + 3*12868).abs() < 200);
	}

	#[test]
	fn atan2_tracks_float_reference() {
		let mut rng = StdRng::seed_from_u64(2718);
		for _ in 0..2000 {
			let y:i64 = rng.gen_range(-100_000, 100_000);
			let x:i64 = rng.gen_range(-100_000, 100_000);
			if x == 0 && y == 0 { continue; }
			let expected = (y as f64).atan2(x as f64) * (SCALED_RADIAN as f64);
			let got = atan2_fixed(y, x) as f64;

			// The branch cut at the negative real axis may land on either side
			let d = (got - expected).abs();
			let err = d.min((d - 2.0 * SCALED_PI as f64).abs());
			assert!(err < 0.01 * SCALED_RADIAN as f64, "atan2({}, {}) = {} vs {}", y, x, got, expected);
		}
	}

	#[test]
	fn rss_magnitude() {
		assert_eq!(rss(0, 0), 0);
		assert_eq!(rss(-100, 40), 120);
		assert_eq!(rss(40, -100), 120);
		assert_eq!(rss(-7, 0), 7);
	}

	#[test]
	fn integer_square_root_is_floor() {
		assert_eq!(sqrt_newton(0), 0);
		assert_eq!(sqrt_newton(1), 1);
		assert_eq!(sqrt_newton(3), 1);
		assert_eq!(sqrt_newton(4), 2);
		assert_eq!(sqrt_newton(99), 9);
		assert_eq!(sqrt_newton(1 << 62), 1 << 31);
		assert_eq!(sqrt_newton(u64::MAX), 4294967295);

		let mut rng = StdRng::seed_from_u64(31);
		for _ in 0..1000 {
			let x:u64 = rng.gen_range(0, 1u64 << 50);
			let r = sqrt_newton(x);
			assert!(r*r <= x && (r+1)*(r+1) > x);
		}
	}

	#[test]
	fn code_error_holds_on_zero_inputs() {
		let zero = Accumulators::default();
		assert_eq!(code_error(&zero, 0), 0);
		assert_eq!(code_error(&zero, -321), -321);
		assert_eq!(code_error(&zero, 4000), 4000);
	}

	#[test]
	fn code_error_sign_follows_stronger_arm() {
		let mut a = Accumulators{ i_early: 3000, q_early: 400, i_late: 1000, q_late: 300, ..Accumulators::default() };
		assert!(code_error(&a, 0) > 0);
		std::mem::swap(&mut a.i_early, &mut a.i_late);
		std::mem::swap(&mut a.q_early, &mut a.q_late);
		assert!(code_error(&a, 0) < 0);

		let balanced = Accumulators{ i_early: 1500, q_early: -200, i_late: -1500, q_late: 200, ..Accumulators::default() };
		assert_eq!(code_error(&balanced, 77), 0);
	}

	#[test]
	fn carrier_error_ignores_data_bit() {
		let prev = prompt(5000, 500);
		let up = carrier_error(&prompt(5000, 500), &prev, 0, 2);
		let down = carrier_error(&prompt(-5000, -500), &prev, 0, 2);
		assert_eq!(up, down);
		assert!(up > 0);
		assert_eq!(carrier_error(&prompt(5000, 0), &prev, 99, 2), 99);
	}

	#[test]
	fn freq_error_measures_rotation() {
		// Rotation by a small positive angle reads back as a negative cross product
		let prev = prompt(10000, 1000);
		let cur = prompt(9900, 1400);
		assert!(freq_error(&cur, &prev, 8) < 0);
		assert!(freq_error(&prev, &cur, 8) > 0);
		assert_eq!(freq_error(&prompt(0, 100), &prev, 8), 0);
		assert_eq!(freq_error(&prev, &prev, 8), 0);
	}

}
