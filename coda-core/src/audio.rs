// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module provides the sample format description and channel
//! primitives shared by container parsers and packet decoders.

use std::fmt;

use bitflags::bitflags;

use crate::codecs::CodecType;

bitflags! {
    /// `Channels` is a bit mask of all channels present in a signal.
    ///
    /// The bit order follows the channel bitmap convention shared by the
    /// chunk-based container's channel-layout chunk and WAVE extensible
    /// formats, so container bitmaps convert without a translation table.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Channels: u32 {
        /// Front-left (left) or the Mono channel.
        const FRONT_LEFT         = 0x0000_0001;
        /// Front-right (right) channel.
        const FRONT_RIGHT        = 0x0000_0002;
        /// Front-centre (centre) channel.
        const FRONT_CENTRE       = 0x0000_0004;
        /// Low frequency channel 1.
        const LFE1               = 0x0000_0008;
        /// Rear-left (surround rear left) channel.
        const REAR_LEFT          = 0x0000_0010;
        /// Rear-right (surround rear right) channel.
        const REAR_RIGHT         = 0x0000_0020;
        /// Front left-of-centre channel.
        const FRONT_LEFT_CENTRE  = 0x0000_0040;
        /// Front right-of-centre channel.
        const FRONT_RIGHT_CENTRE = 0x0000_0080;
        /// Rear-centre (surround rear centre) channel.
        const REAR_CENTRE        = 0x0000_0100;
        /// Side left (surround left) channel.
        const SIDE_LEFT          = 0x0000_0200;
        /// Side right (surround right) channel.
        const SIDE_RIGHT         = 0x0000_0400;
        /// Top centre channel.
        const TOP_CENTRE         = 0x0000_0800;
        /// Top front-left channel.
        const TOP_FRONT_LEFT     = 0x0000_1000;
        /// Top front-centre channel.
        const TOP_FRONT_CENTRE   = 0x0000_2000;
        /// Top front-right channel.
        const TOP_FRONT_RIGHT    = 0x0000_4000;
        /// Top rear-left channel.
        const TOP_REAR_LEFT      = 0x0000_8000;
        /// Top rear-centre channel.
        const TOP_REAR_CENTRE    = 0x0001_0000;
        /// Top rear-right channel.
        const TOP_REAR_RIGHT     = 0x0002_0000;
    }
}

impl Channels {
    /// Gets the number of channels in the mask.
    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }

    /// Gets a mask enabling the first `count` channels. Returns `None` if
    /// `count` exceeds the number of defined channel positions.
    pub fn first(count: u32) -> Option<Channels> {
        if count == 0 || count > 18 {
            return None;
        }
        Channels::from_bits((1u32 << count) - 1)
    }
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#032b}", self.bits())
    }
}

/// A `ChannelLabel` names the content of one physical bitstream channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelLabel {
    Left,
    Right,
    Centre,
    Lfe,
    LeftSurround,
    RightSurround,
    LeftCentre,
    RightCentre,
    CentreSurround,
    LeftSideSurround,
    RightSideSurround,
    TopCentre,
    TopFrontLeft,
    TopFrontCentre,
    TopFrontRight,
    TopRearLeft,
    TopRearCentre,
    TopRearRight,
    /// A channel with no assigned position.
    Discrete(u32),
}

impl ChannelLabel {
    /// Maps a container channel-description label code to a `ChannelLabel`.
    pub fn from_code(code: u32) -> ChannelLabel {
        match code {
            1 => ChannelLabel::Left,
            2 => ChannelLabel::Right,
            3 => ChannelLabel::Centre,
            4 => ChannelLabel::Lfe,
            5 => ChannelLabel::LeftSurround,
            6 => ChannelLabel::RightSurround,
            7 => ChannelLabel::LeftCentre,
            8 => ChannelLabel::RightCentre,
            9 => ChannelLabel::CentreSurround,
            10 => ChannelLabel::LeftSideSurround,
            11 => ChannelLabel::RightSideSurround,
            12 => ChannelLabel::TopCentre,
            13 => ChannelLabel::TopFrontLeft,
            14 => ChannelLabel::TopFrontCentre,
            15 => ChannelLabel::TopFrontRight,
            16 => ChannelLabel::TopRearLeft,
            17 => ChannelLabel::TopRearCentre,
            18 => ChannelLabel::TopRearRight,
            other => ChannelLabel::Discrete(other),
        }
    }

    fn channel(self) -> Option<Channels> {
        let channel = match self {
            ChannelLabel::Left => Channels::FRONT_LEFT,
            ChannelLabel::Right => Channels::FRONT_RIGHT,
            ChannelLabel::Centre => Channels::FRONT_CENTRE,
            ChannelLabel::Lfe => Channels::LFE1,
            ChannelLabel::LeftSurround => Channels::REAR_LEFT,
            ChannelLabel::RightSurround => Channels::REAR_RIGHT,
            ChannelLabel::LeftCentre => Channels::FRONT_LEFT_CENTRE,
            ChannelLabel::RightCentre => Channels::FRONT_RIGHT_CENTRE,
            ChannelLabel::CentreSurround => Channels::REAR_CENTRE,
            ChannelLabel::LeftSideSurround => Channels::SIDE_LEFT,
            ChannelLabel::RightSideSurround => Channels::SIDE_RIGHT,
            ChannelLabel::TopCentre => Channels::TOP_CENTRE,
            ChannelLabel::TopFrontLeft => Channels::TOP_FRONT_LEFT,
            ChannelLabel::TopFrontCentre => Channels::TOP_FRONT_CENTRE,
            ChannelLabel::TopFrontRight => Channels::TOP_FRONT_RIGHT,
            ChannelLabel::TopRearLeft => Channels::TOP_REAR_LEFT,
            ChannelLabel::TopRearCentre => Channels::TOP_REAR_CENTRE,
            ChannelLabel::TopRearRight => Channels::TOP_REAR_RIGHT,
            ChannelLabel::Discrete(_) => return None,
        };
        Some(channel)
    }
}

/// A `ChannelMap` records the physical channel order of the bitstream as an
/// ordered list of labels. It is presentation information only and never
/// alters decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelMap {
    labels: Vec<ChannelLabel>,
}

impl ChannelMap {
    /// Creates a channel map from an ordered list of labels.
    pub fn from_labels(labels: Vec<ChannelLabel>) -> Self {
        ChannelMap { labels }
    }

    /// Creates a channel map from a channel bitmap, in ascending bit order.
    pub fn from_bitmap(bitmap: u32) -> Self {
        let mut labels = Vec::new();
        for bit in 0..18 {
            if bitmap & (1 << bit) != 0 {
                labels.push(ChannelLabel::from_code(bit + 1));
            }
        }
        ChannelMap { labels }
    }

    /// Creates a channel map from a channel-layout tag as used by the
    /// chunk-based container's layout chunk and the lossless codec's
    /// configuration blob. The upper 16 bits select the layout, the lower 16
    /// bits give the channel count.
    pub fn from_layout_tag(tag: u32) -> Option<Self> {
        use ChannelLabel::*;

        let labels: &[ChannelLabel] = match tag {
            // (100 << 16) | 1
            0x64_0001 => &[Centre],
            // (101 << 16) | 2
            0x65_0002 => &[Left, Right],
            // (113 << 16) | 3
            0x71_0003 => &[Centre, Left, Right],
            // (116 << 16) | 4
            0x74_0004 => &[Centre, Left, Right, CentreSurround],
            // (120 << 16) | 5
            0x78_0005 => &[Centre, Left, Right, LeftSurround, RightSurround],
            // (124 << 16) | 6
            0x7c_0006 => &[Centre, Left, Right, LeftSurround, RightSurround, Lfe],
            // (142 << 16) | 7
            0x8e_0007 => &[Centre, Left, Right, LeftSurround, RightSurround, CentreSurround, Lfe],
            // (127 << 16) | 8
            0x7f_0008 => &[Centre, LeftCentre, RightCentre, Left, Right, LeftSurround, RightSurround, Lfe],
            _ => return None,
        };

        Some(ChannelMap { labels: labels.to_vec() })
    }

    /// Gets the number of channels in the map.
    pub fn count(&self) -> usize {
        self.labels.len()
    }

    /// Gets the ordered channel labels.
    pub fn labels(&self) -> &[ChannelLabel] {
        &self.labels
    }

    /// Converts the map into a positional channel bit mask. Returns `None` if
    /// any channel is discrete or a position appears twice.
    pub fn channels(&self) -> Option<Channels> {
        let mut channels = Channels::empty();
        for label in &self.labels {
            let channel = label.channel()?;
            if channels.intersects(channel) {
                return None;
            }
            channels |= channel;
        }
        Some(channels)
    }
}

/// `SampleFormat` describes a stream of audio frames.
///
/// For compressed codecs it describes the decoded signal; `bytes_per_frame`
/// is meaningful for fixed-width formats only.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleFormat {
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The number of interleaved channels per frame.
    pub channels: u32,
    /// The number of valid bits in one sample of one channel.
    pub bits_per_channel: u32,
    /// The number of bytes in one interleaved frame. For fixed-width formats
    /// this is `channels * ceil(bits_per_channel / 8)`; variable (0) for
    /// compressed formats until decoded.
    pub bytes_per_frame: u32,
    /// The number of frames one packet decodes to. May be 0 when unknown or
    /// variable.
    pub frames_per_packet: u32,
    /// The codec that produced, or will decode, the stream.
    pub codec: CodecType,
}

impl SampleFormat {
    /// The canonical width, in bits, that decoded samples are normalized to.
    /// Narrower integer samples are widened and left-justified.
    pub const CANONICAL_BITS: u32 = 32;

    /// The number of bytes used to store one sample of one channel, rounding
    /// bit depths up to the next byte boundary.
    pub fn bytes_per_sample(&self) -> u32 {
        (self.bits_per_channel + 7) / 8
    }

    /// Returns true if `bytes_per_frame` is consistent with the channel count
    /// and bit depth of a fixed-width format.
    pub fn is_valid_fixed_width(&self) -> bool {
        self.bytes_per_frame == self.channels * self.bytes_per_sample()
    }

    /// Derives the canonical output format a packet decoder reports for this
    /// stream: same rate, channels, and packet framing, with samples widened
    /// to the canonical container width.
    pub fn canonical_output(&self) -> SampleFormat {
        SampleFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_channel: SampleFormat::CANONICAL_BITS,
            bytes_per_frame: self.channels * (SampleFormat::CANONICAL_BITS / 8),
            frames_per_packet: self.frames_per_packet,
            codec: self.codec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelLabel, ChannelMap, Channels, SampleFormat};
    use crate::codecs::CODEC_TYPE_PCM_S16BE;

    #[test]
    fn verify_channel_map_from_bitmap() {
        // Front left, front right, LFE.
        let map = ChannelMap::from_bitmap(0b1011);

        assert_eq!(
            map.labels(),
            &[ChannelLabel::Left, ChannelLabel::Right, ChannelLabel::Lfe]
        );
        assert_eq!(
            map.channels().unwrap(),
            Channels::FRONT_LEFT | Channels::FRONT_RIGHT | Channels::LFE1
        );
    }

    #[test]
    fn verify_channel_map_from_layout_tag() {
        let stereo = ChannelMap::from_layout_tag(0x65_0002).unwrap();
        assert_eq!(stereo.count(), 2);
        assert_eq!(stereo.channels().unwrap(), Channels::FRONT_LEFT | Channels::FRONT_RIGHT);

        assert!(ChannelMap::from_layout_tag(0xdead_beef).is_none());
    }

    #[test]
    fn verify_discrete_channels_have_no_mask() {
        let map = ChannelMap::from_labels(vec![ChannelLabel::Discrete(0), ChannelLabel::Left]);
        assert!(map.channels().is_none());
        assert_eq!(map.count(), 2);
    }

    #[test]
    fn verify_fixed_width_invariant() {
        let fmt = SampleFormat {
            sample_rate: 44_100,
            channels: 2,
            bits_per_channel: 16,
            bytes_per_frame: 4,
            frames_per_packet: 1,
            codec: CODEC_TYPE_PCM_S16BE,
        };

        assert!(fmt.is_valid_fixed_width());
        assert_eq!(fmt.bytes_per_sample(), 2);

        let out = fmt.canonical_output();
        assert_eq!(out.bits_per_channel, 32);
        assert_eq!(out.bytes_per_frame, 8);
    }
}
