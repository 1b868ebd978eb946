// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use super::SampleProducer;

/// Unsigned 8-bit PCM, copied straight through.
#[derive(Debug, Clone, Default)]
pub struct RawPcm {
    pos: usize,
}

impl RawPcm {
    /// Byte offset of the next sample.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl SampleProducer for RawPcm {
    fn load_mono(&mut self, data: &[u8], dest: &mut [u8]) -> usize {
        let available = data.len().saturating_sub(self.pos);
        let count = dest.len().min(available);
        dest[..count].copy_from_slice(&data[self.pos..self.pos + count]);
        self.pos += count;
        count
    }

    fn load_stereo(&mut self, data: &[u8], left: &mut [u8], right: &mut [u8]) -> usize {
        let available = data.len().saturating_sub(self.pos) / 2;
        let count = left.len().min(right.len()).min(available);
        let frames = data[self.pos..self.pos + count * 2].chunks_exact(2);
        for (i, frame) in frames.enumerate() {
            left[i] = frame[0];
            right[i] = frame[1];
        }
        self.pos += count * 2;
        count
    }

    fn rewind(&mut self, _data_len: usize) {
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_short_read() {
        let data = [10u8, 20, 30, 40, 50];
        let mut raw = RawPcm::default();
        let mut dest = [0u8; 3];

        assert_eq!(raw.load_mono(&data, &mut dest), 3);
        assert_eq!(dest, [10, 20, 30]);
        assert_eq!(raw.load_mono(&data, &mut dest), 2);
        assert_eq!(&dest[..2], &[40, 50]);
        assert_eq!(raw.load_mono(&data, &mut dest), 0);

        raw.rewind(data.len());
        assert_eq!(raw.position(), 0);
        assert_eq!(raw.load_mono(&data, &mut dest), 3);
    }

    #[test]
    fn test_stereo_deinterleave() {
        let data = [1u8, 2, 3, 4, 5, 6, 7];
        let mut raw = RawPcm::default();
        let mut left = [0u8; 8];
        let mut right = [0u8; 8];

        // The odd trailing byte is not a full frame.
        assert_eq!(raw.load_stereo(&data, &mut left, &mut right), 3);
        assert_eq!(&left[..3], &[1, 3, 5]);
        assert_eq!(&right[..3], &[2, 4, 6]);
        assert_eq!(raw.load_stereo(&data, &mut left, &mut right), 0);
    }
}
