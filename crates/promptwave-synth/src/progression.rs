//! Chord progression library and scale helpers.

/// Chord quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quality {
    /// Major triad.
    Major,
    /// Minor triad.
    Minor,
    /// Major seventh.
    Major7,
    /// Minor seventh.
    Minor7,
}

impl Quality {
    /// Intervals above the root in semitones.
    pub fn intervals(self) -> [u8; 3] {
        match self {
            Quality::Major => [0, 4, 7],
            Quality::Minor => [0, 3, 7],
            Quality::Major7 => [4, 7, 11],
            Quality::Minor7 => [3, 7, 10],
        }
    }

    fn is_minor(self) -> bool {
        matches!(self, Quality::Minor | Quality::Minor7)
    }
}

/// A chord: MIDI root plus quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chord {
    /// MIDI note of the root.
    pub root: u8,
    /// Chord quality.
    pub quality: Quality,
}

const fn chord(root: u8, quality: Quality) -> Chord {
    Chord { root, quality }
}

/// Four-bar progressions, one chord per bar.
pub const PROGRESSIONS: [[Chord; 4]; 6] = {
    use Quality::{Major, Major7, Minor, Minor7};
    [
        // i - VI - III - VII in A minor
        [chord(57, Minor), chord(53, Major), chord(60, Major), chord(55, Major)],
        // I - V - vi - IV in C
        [chord(48, Major), chord(55, Major), chord(57, Minor), chord(53, Major)],
        // ii7 - V - Imaj7 - vi7 in D
        [chord(52, Minor7), chord(57, Major), chord(50, Major7), chord(59, Minor7)],
        // i - iv - v - i in E minor
        [chord(52, Minor), chord(57, Minor), chord(59, Minor), chord(52, Minor)],
        // Imaj7 - IVmaj7 in F, twice
        [chord(53, Major7), chord(58, Major7), chord(53, Major7), chord(58, Major7)],
        // vi - IV - I - V in G
        [chord(52, Minor), chord(48, Major), chord(55, Major), chord(50, Major)],
    ]
};

const MAJOR_PENTATONIC: [u8; 5] = [0, 2, 4, 7, 9];
const MINOR_PENTATONIC: [u8; 5] = [0, 3, 5, 7, 10];

impl Chord {
    /// MIDI notes of the chord voicing.
    pub fn notes(self) -> [u8; 3] {
        let iv = self.quality.intervals();
        [self.root + iv[0], self.root + iv[1], self.root + iv[2]]
    }

    /// MIDI note for a pentatonic scale degree over this chord, one octave up.
    ///
    /// Degrees wrap into higher octaves every five steps.
    pub fn scale_note(self, degree: u32) -> u8 {
        let scale = if self.quality.is_minor() {
            MINOR_PENTATONIC
        } else {
            MAJOR_PENTATONIC
        };
        let octave = (degree / 5) as u8;
        self.root + 12 + 12 * octave + scale[(degree % 5) as usize]
    }
}

/// Equal-tempered frequency for a MIDI note (A4 = 440 Hz).
pub fn midi_to_hz(note: u8) -> f32 {
    440.0 * libm::powf(2.0, (f32::from(note) - 69.0) / 12.0)
}

/// Stable 64-bit FNV-1a hash used to pick a progression from prompt text.
pub fn text_hash(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.to_lowercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Progression index for a prompt text.
pub fn progression_for(text: &str) -> usize {
    (text_hash(text) % PROGRESSIONS.len() as u64) as usize
}
