//! De-framing of the raw float32 record stream
//!
//! The wire format has no header or delimiter: a record is exactly
//! `bin_count` little-endian `f32`s, records are sent back to back, and the
//! transport may split them at any byte boundary.

use byteorder::{ByteOrder, LittleEndian};

const F32_BYTES: usize = 4;

/// Accumulates bytes and yields whole records in arrival order
#[derive(Debug)]
pub struct RecordDecoder {
    bin_count: usize,
    buffer: Vec<u8>,
    start: usize,
}

impl RecordDecoder {
    pub fn new(bin_count: usize) -> Self {
        Self {
            bin_count,
            buffer: Vec::new(),
            start: 0,
        }
    }

    /// Size of one record on the wire
    pub fn record_len(&self) -> usize {
        self.bin_count * F32_BYTES
    }

    /// Bytes received but not yet consumed as a record
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.start
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        // Reclaim consumed space before growing
        if self.start > 0 && self.start >= self.buffer.len() / 2 {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the earliest complete record, if any
    pub fn next_record(&mut self) -> Option<Vec<f32>> {
        let len = self.record_len();
        if len == 0 || self.buffered() < len {
            return None;
        }
        let mut values = vec![0.0f32; self.bin_count];
        LittleEndian::read_f32_into(&self.buffer[self.start..self.start + len], &mut values);
        self.start += len;
        if self.start == self.buffer.len() {
            self.buffer.clear();
            self.start = 0;
        }
        Some(values)
    }
}

/// Encode one record in the wire format
pub fn encode_record(values: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * F32_BYTES];
    LittleEndian::write_f32_into(values, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(k: usize, n: usize) -> Vec<Vec<f32>> {
        (0..k)
            .map(|r| (0..n).map(|b| (r * 1000 + b) as f32 + 0.25).collect())
            .collect()
    }

    fn stream(records: &[Vec<f32>]) -> Vec<u8> {
        records.iter().flat_map(|r| encode_record(r)).collect()
    }

    fn decode_in_chunks(bytes: &[u8], n: usize, chunk: usize) -> Vec<Vec<f32>> {
        let mut decoder = RecordDecoder::new(n);
        let mut out = Vec::new();
        for piece in bytes.chunks(chunk) {
            decoder.extend(piece);
            while let Some(record) = decoder.next_record() {
                out.push(record);
            }
        }
        assert_eq!(decoder.buffered(), 0);
        out
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let expected = records(7, 5);
        assert_eq!(decode_in_chunks(&stream(&expected), 5, 1), expected);
    }

    #[test]
    fn test_all_at_once() {
        let expected = records(12, 16);
        assert_eq!(decode_in_chunks(&stream(&expected), 16, usize::MAX), expected);
    }

    #[test]
    fn test_chunks_straddling_records() {
        let expected = records(25, 3);
        let bytes = stream(&expected);
        for chunk in [2, 5, 7, 11, 13, 4096] {
            assert_eq!(decode_in_chunks(&bytes, 3, chunk), expected, "chunk size {chunk}");
        }
    }

    #[test]
    fn test_partial_record_stays_buffered() {
        let mut decoder = RecordDecoder::new(2);
        let bytes = encode_record(&[1.5, -2.0]);
        decoder.extend(&bytes[..5]);
        assert!(decoder.next_record().is_none());
        assert_eq!(decoder.buffered(), 5);

        decoder.extend(&bytes[5..]);
        assert_eq!(decoder.next_record(), Some(vec![1.5, -2.0]));
        assert!(decoder.next_record().is_none());
    }

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(encode_record(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
    }
}
