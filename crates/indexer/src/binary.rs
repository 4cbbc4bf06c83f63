use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of leading bytes inspected when sniffing for binary content.
pub const BINARY_SNIFF_BYTES: usize = 8_000;

/// More than this share of control bytes marks a sample as binary.
const CONTROL_RATIO_LIMIT: f64 = 0.05;

/// Heuristic binary check over the first [`BINARY_SNIFF_BYTES`] of `sample`.
///
/// A sample is binary if it contains a NUL byte or if more than 5% of the
/// inspected bytes are control characters other than common whitespace.
#[must_use]
pub fn looks_binary(sample: &[u8]) -> bool {
    let sample = &sample[..sample.len().min(BINARY_SNIFF_BYTES)];
    if sample.is_empty() {
        return false;
    }
    let mut control = 0usize;
    for &byte in sample {
        if byte == 0 {
            return true;
        }
        if is_suspicious_control(byte) {
            control += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = control as f64 / sample.len() as f64;
    ratio > CONTROL_RATIO_LIMIT
}

fn is_suspicious_control(byte: u8) -> bool {
    match byte {
        b'\t' | b'\n' | b'\r' | 0x0c => false,
        0x01..=0x1f | 0x7f => true,
        _ => false,
    }
}

/// Read the head of `path` and apply [`looks_binary`].
pub fn is_binary_file(path: &Path) -> io::Result<bool> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(BINARY_SNIFF_BYTES);
    file.take(BINARY_SNIFF_BYTES as u64)
        .read_to_end(&mut sample)?;
    Ok(looks_binary(&sample))
}
