//! Bottom-row keyboard layout used to pick note pitches.

/// One chromatic octave, starting a minor third above the table's base pitch.
pub const KEY_ROW: [char; 13] = ['z', 's', 'x', 'd', 'c', 'v', 'g', 'b', 'h', 'n', 'j', 'm', ','];

/// Semitones between the table's base pitch and the first key.
const ROW_OFFSET: i32 = 3;

/// Base phase increment for `key`, before the octave multiplier.
pub fn key_ratio(key: char) -> Option<f32> {
    let position = KEY_ROW.iter().position(|&k| k == key.to_ascii_lowercase())?;
    let semitones = position as i32 + ROW_OFFSET;
    Some(2f32.powf(semitones as f32 / 12.0))
}
