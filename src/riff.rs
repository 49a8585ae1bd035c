//! RMID files are Standard Midi Files embedded in a RIFF container.
//! Support for these files is provided by unwrapping the input slice, stripping away the RIFF
//! wrappers around the raw SMF data.

use crate::prelude::*;

/// Little-endian RIFF chunks, padded to an even length.
struct RiffChunks<'a>(&'a [u8]);
impl<'a> Iterator for RiffChunks<'a> {
    type Item = (&'a [u8], &'a [u8]);
    fn next(&mut self) -> Option<Self::Item> {
        let id = self.0.split_checked(4)?;
        let len = self.0.split_checked(4)?;
        let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
        let data = match self.0.split_checked(len) {
            Some(data) => data,
            None => mem::replace(&mut self.0, &[]),
        };
        if len % 2 == 1 {
            let _pad = self.0.split_checked(1);
        }
        Some((id, data))
    }
}

/// Returns the embedded SMF data if `raw` is an RMID file, or `None` if it is anything else.
pub(crate) fn unwrap(raw: &[u8]) -> Option<&[u8]> {
    let (id, mut riff) = RiffChunks(raw).next()?;
    if id != b"RIFF" || riff.split_checked(4)? != b"RMID" {
        return None;
    }
    RiffChunks(riff).find(|(id, _)| *id == b"data").map(|(_, data)| data)
}
