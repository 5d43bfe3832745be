// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `gapless` module maps logical (post-trim) sample positions to raw
//! decode positions and back, using the container's edit list and encoder
//! priming information.

/// `PrimingInfo` records the encoder-introduced look-ahead padding at the
/// start of a stream and the trailing padding at its end, both of which are
/// discarded from output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PrimingInfo {
    /// The number of leading priming frames.
    pub leading: u32,
    /// The number of trailing remainder frames.
    pub trailing: u32,
}

/// One entry of an [`EditList`]: `duration` presented frames beginning at
/// `media_offset` on the raw decode timeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EditEntry {
    /// The first raw frame of the edit on the decode timeline.
    pub media_offset: u64,
    /// The number of frames the edit presents.
    pub duration: u64,
}

/// An `EditList` is an ordered sequence of edits forming the presentation
/// timeline over the raw decode timeline. Together the entry durations sum to
/// the presented track length.
///
/// The list is produced exactly once, at container parse time. When a
/// container has no edit data, a single entry covering the whole track is
/// substituted, or one is reconstructed from a textual priming/duration tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditList {
    entries: Vec<EditEntry>,
}

impl EditList {
    /// Creates an edit list from entries in presentation order.
    pub fn new(entries: Vec<EditEntry>) -> Self {
        EditList { entries }
    }

    /// Creates the synthetic single-edit list presenting `frames` raw frames
    /// from the start of the decode timeline.
    pub fn whole_track(frames: u64) -> Self {
        EditList { entries: vec![EditEntry { media_offset: 0, duration: frames }] }
    }

    /// Creates the single-edit list that trims encoder priming and trailing
    /// padding from a raw decode timeline of `total_frames` frames.
    pub fn from_priming(priming: PrimingInfo, total_frames: u64) -> Self {
        let trimmed = u64::from(priming.leading) + u64::from(priming.trailing);
        EditList {
            entries: vec![EditEntry {
                media_offset: u64::from(priming.leading),
                duration: total_frames.saturating_sub(trimmed),
            }],
        }
    }

    /// Returns true if no entries have been produced yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gets the edits in presentation order.
    pub fn entries(&self) -> &[EditEntry] {
        &self.entries
    }

    /// Gets the presented track length: the sum of all edit durations.
    pub fn total_duration(&self) -> u64 {
        self.entries.iter().map(|e| e.duration).sum()
    }

    /// Finds the edit containing the logical position `pos`.
    ///
    /// Returns the index of the first edit whose cumulative duration exceeds
    /// `pos`, and the offset of `pos` within that edit. A position at or past
    /// the total duration returns the last edit, with the offset carrying the
    /// overshoot; this is a normal EOF-adjacent case, not an error.
    pub fn edit_for_position(&self, pos: u64) -> (usize, u64) {
        let mut cumulative = 0;

        for (index, entry) in self.entries.iter().enumerate() {
            if pos < cumulative + entry.duration {
                return (index, pos - cumulative);
            }
            cumulative += entry.duration;
        }

        match self.entries.len() {
            0 => (0, pos),
            len => (len - 1, pos - (cumulative - self.entries[len - 1].duration)),
        }
    }

    /// Maps the logical position `pos` to its raw decode-timeline frame.
    pub fn media_offset_for_position(&self, pos: u64) -> u64 {
        let (index, offset) = self.edit_for_position(pos);
        match self.entries.get(index) {
            Some(entry) => entry.media_offset + offset,
            None => pos,
        }
    }

    /// Gets the logical position one past the last frame of the edit at
    /// `index`.
    pub fn end_of_edit(&self, index: usize) -> u64 {
        self.entries.iter().take(index + 1).map(|e| e.duration).sum()
    }

    /// Rescales every duration by `numer / denom`, rounding to nearest.
    ///
    /// This is a one-time corrective transform applied at construction when
    /// the container records edit durations in a presentation timescale that
    /// differs from the media's native timescale. It is not part of the
    /// steady-state read or seek path.
    pub fn scale_durations(&mut self, numer: u32, denom: u32) {
        assert!(denom > 0, "timescale denominator cannot be 0");
        if numer == denom {
            return;
        }
        for entry in &mut self.entries {
            let scaled =
                (u128::from(entry.duration) * u128::from(numer) + u128::from(denom / 2))
                    / u128::from(denom);
            entry.duration = scaled as u64;
        }
    }

    /// Shifts every media offset by `delta` frames, saturating at 0.
    ///
    /// As with [`scale_durations`](EditList::scale_durations), this is a
    /// one-time construction transform, used when a codec family requires a
    /// fixed priming-frame correction that the container did not record
    /// structurally.
    pub fn shift_media_offsets(&mut self, delta: i64) {
        for entry in &mut self.entries {
            entry.media_offset = if delta >= 0 {
                entry.media_offset.saturating_add(delta as u64)
            }
            else {
                entry.media_offset.saturating_sub(delta.unsigned_abs())
            };
        }
    }
}

/// The priming and duration information carried by a textual gapless tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GaplessInfo {
    /// Leading priming frames.
    pub priming: u32,
    /// Trailing remainder frames.
    pub remainder: u32,
    /// Valid (presented) frames between them.
    pub valid_frames: u64,
}

/// Parses the textual priming/duration fallback tag written by common
/// encoders: space-separated hexadecimal fields, of which the second is the
/// priming frame count, the third the trailing remainder frame count, and the
/// fourth the 64-bit valid frame count.
///
/// Returns `None` if the tag does not have the expected shape.
pub fn parse_gapless_text_tag(text: &str) -> Option<GaplessInfo> {
    let mut fields = text.split_ascii_whitespace();

    // The first field is reserved.
    fields.next()?;

    let priming = u32::from_str_radix(fields.next()?, 16).ok()?;
    let remainder = u32::from_str_radix(fields.next()?, 16).ok()?;
    let valid_frames = u64::from_str_radix(fields.next()?, 16).ok()?;

    Some(GaplessInfo { priming, remainder, valid_frames })
}

#[cfg(test)]
mod tests {
    use super::{parse_gapless_text_tag, EditEntry, EditList, GaplessInfo, PrimingInfo};

    fn two_edit_list() -> EditList {
        EditList::new(vec![
            EditEntry { media_offset: 100, duration: 50 },
            EditEntry { media_offset: 300, duration: 25 },
        ])
    }

    #[test]
    fn verify_edit_for_position() {
        let edits = two_edit_list();

        assert_eq!(edits.edit_for_position(0), (0, 0));
        assert_eq!(edits.edit_for_position(49), (0, 49));
        assert_eq!(edits.edit_for_position(50), (1, 0));
        assert_eq!(edits.edit_for_position(74), (1, 24));
        // At and past the total duration the last edit is returned.
        assert_eq!(edits.edit_for_position(75), (1, 25));
        assert_eq!(edits.edit_for_position(1000), (1, 950));
    }

    #[test]
    fn verify_edit_index_is_monotonic() {
        let edits = two_edit_list();

        let mut last_index = 0;
        for pos in 0..80 {
            let (index, _) = edits.edit_for_position(pos);
            assert!(index >= last_index);
            last_index = index;
        }
    }

    #[test]
    fn verify_media_offsets() {
        let edits = two_edit_list();

        assert_eq!(edits.media_offset_for_position(0), edits.entries()[0].media_offset);
        assert_eq!(edits.media_offset_for_position(49), 149);
        assert_eq!(edits.media_offset_for_position(50), 300);
        assert_eq!(edits.total_duration(), 75);
        assert_eq!(edits.end_of_edit(0), 50);
        assert_eq!(edits.end_of_edit(1), 75);
    }

    #[test]
    fn verify_from_priming() {
        let priming = PrimingInfo { leading: 2112, trailing: 228 };
        let edits = EditList::from_priming(priming, 2112 + 8000 + 228);

        assert_eq!(edits.total_duration(), 8000);
        assert_eq!(edits.media_offset_for_position(0), 2112);
        assert_eq!(edits.media_offset_for_position(7999), 2112 + 7999);
    }

    #[test]
    fn verify_scale_and_shift() {
        let mut edits = EditList::new(vec![EditEntry { media_offset: 0, duration: 600 }]);

        // Durations recorded at a 600 Hz presentation timescale, media at
        // 44100 Hz.
        edits.scale_durations(44_100, 600);
        assert_eq!(edits.total_duration(), 44_100);

        edits.shift_media_offsets(2112);
        assert_eq!(edits.entries()[0].media_offset, 2112);
        edits.shift_media_offsets(-5000);
        assert_eq!(edits.entries()[0].media_offset, 0);
    }

    #[test]
    fn verify_gapless_text_tag() {
        let tag = " 00000000 00000840 000000E4 0000000000001F40 00000000 00000000";

        assert_eq!(
            parse_gapless_text_tag(tag),
            Some(GaplessInfo { priming: 2112, remainder: 228, valid_frames: 8000 })
        );

        assert_eq!(parse_gapless_text_tag(""), None);
        assert_eq!(parse_gapless_text_tag(" 00000000 xyz"), None);
    }
}
