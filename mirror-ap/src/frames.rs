//! Length-prefixed frame files
//!
//! Captured streams are stored as a sequence of records, each a big-endian
//! `u16` payload length followed by exactly one compressed access unit.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Read};

/// Iterates the access units of a frame file.
pub struct FrameReader<R> {
    reader: R,
    frames: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, frames: 0 }
    }

    /// Records read so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Read the next record. `Ok(None)` at a clean end of input.
    ///
    /// # Errors
    /// `InvalidState` for a record cut short, `Io` for read failures.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; 2];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        }

        let len = u16::from_be_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => Error::InvalidState(format!(
                "Frame {} truncated: header announces {} bytes",
                self.frames, len
            )),
            _ => Error::Io(e),
        })?;

        self.frames += 1;
        Ok(Some(payload))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

/// Encode `payload` as one record.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(payload.len())
        .map_err(|_| Error::FrameContract(format!("Frame of {} bytes too long to encode", payload.len())))?;
    let mut record = Vec::with_capacity(payload.len() + 2);
    record.extend_from_slice(&len.to_be_bytes());
    record.extend_from_slice(payload);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_records_in_order() {
        let mut data = encode_frame(&[1, 2, 3]).unwrap();
        data.extend(encode_frame(&[]).unwrap());
        data.extend(encode_frame(&[9; 300]).unwrap());

        let frames: Vec<Vec<u8>> = FrameReader::new(Cursor::new(data))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![1, 2, 3]);
        assert!(frames[1].is_empty());
        assert_eq!(frames[2].len(), 300);
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let data = vec![0x00, 0x10, 1, 2, 3];
        let mut reader = FrameReader::new(Cursor::new(data));
        assert!(matches!(reader.next_frame(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_empty_input() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        assert!(reader.next_frame().unwrap().is_none());
        assert_eq!(reader.frames(), 0);
    }

    #[test]
    fn test_oversize_payload_cannot_be_encoded() {
        assert!(encode_frame(&vec![0u8; 70_000]).is_err());
    }
}
