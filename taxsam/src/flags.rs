/// The eight alignment properties packed into the SAM FLAG column.
/// Bits above 128 (secondary, QC-fail, duplicate, supplementary) are not tracked.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlignmentFlags {
    pub mate_2: bool,                  // 128
    pub mate_1: bool,                  // 64
    pub mate_aligned_reverse: bool,    // 32
    pub aligned_reverse: bool,         // 16
    pub no_paired_alignments: bool,    // 8
    pub no_single_alignments: bool,    // 4
    pub proper_paired_alignment: bool, // 2
    pub in_pair: bool,                 // 1
}

impl AlignmentFlags {
    /// Re-pack the tracked properties into a bitmask.
    pub fn bits(&self) -> u16 {
        [
            (self.mate_2, 128),
            (self.mate_1, 64),
            (self.mate_aligned_reverse, 32),
            (self.aligned_reverse, 16),
            (self.no_paired_alignments, 8),
            (self.no_single_alignments, 4),
            (self.proper_paired_alignment, 2),
            (self.in_pair, 1),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .map(|(_, bit)| bit)
        .sum()
    }
}

/// Decode a SAM flag bitmask. Bits are consumed from 128 down to 1; whatever
/// remains above the known bits is ignored.
pub fn decode_flags(mask: u16) -> AlignmentFlags {
    let mut rest = mask & 0xff;
    let mut take = |bit: u16| {
        if rest >= bit {
            rest -= bit;
            true
        } else {
            false
        }
    };
    AlignmentFlags {
        mate_2: take(128),
        mate_1: take(64),
        mate_aligned_reverse: take(32),
        aligned_reverse: take(16),
        no_paired_alignments: take(8),
        no_single_alignments: take(4),
        proper_paired_alignment: take(2),
        in_pair: take(1),
    }
}
