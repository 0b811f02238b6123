/// General MIDI instrument families, eight programs each.
const FAMILIES: [&str; 16] = [
    "Piano",
    "Chromatic Percussion",
    "Organ",
    "Guitar",
    "Bass",
    "Strings",
    "Ensemble",
    "Brass",
    "Reed",
    "Pipe",
    "Synth Lead",
    "Synth Pad",
    "Synth Effects",
    "Ethnic",
    "Percussive",
    "Sound Effects",
];

/// Family name for a 0-based program number.
pub fn program_family(program: u8) -> &'static str {
    FAMILIES[(program.min(127) / 8) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_boundaries() {
        assert_eq!(program_family(0), "Piano");
        assert_eq!(program_family(7), "Piano");
        assert_eq!(program_family(8), "Chromatic Percussion");
        assert_eq!(program_family(40), "Strings");
        assert_eq!(program_family(127), "Sound Effects");
        assert_eq!(program_family(255), "Sound Effects");
    }
}
