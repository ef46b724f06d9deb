
pub mod signal_modulation;

#[cfg(test)]
pub mod test_vectors;
