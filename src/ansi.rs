// ABOUTME: ANSI escape handling for the %x substitution and the ansi() function

pub const ANSI_NORMAL: &str = "\x1b[0m";

const ESC: char = '\x1b';

/// Single-letter ANSI codes. Lowercase letters select attributes and
/// foreground colors; uppercase color letters select the background.
pub fn letter_code(letter: char) -> Option<String> {
    let code: u8 = match letter {
        'n' => 0,
        'h' => 1,
        'u' => 4,
        'f' => 5,
        'i' => 7,
        'x' => 30,
        'r' => 31,
        'g' => 32,
        'y' => 33,
        'b' => 34,
        'm' => 35,
        'c' => 36,
        'w' => 37,
        'X' => 40,
        'R' => 41,
        'G' => 42,
        'Y' => 43,
        'B' => 44,
        'M' => 45,
        'C' => 46,
        'W' => 47,
        _ => return None,
    };
    Some(format!("{}[{}m", ESC, code))
}

/// Extended color spec: a decimal 0-255 xterm palette index, or a
/// `#RRGGBB` truecolor value. `background` selects the SGR 48 family.
pub fn color_spec(spec: &str, background: bool) -> Option<String> {
    let base = if background { 48 } else { 38 };
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some(format!("{}[{};2;{};{};{}m", ESC, base, r, g, b));
    }
    let idx: u32 = spec.parse().ok()?;
    if idx > 255 {
        return None;
    }
    Some(format!("{}[{};5;{}m", ESC, base, idx))
}

/// Translate a run of ansi() letter codes (e.g. "hc") into escapes.
pub fn letters_to_codes(letters: &str) -> String {
    let mut out = String::new();
    for c in letters.chars() {
        if let Some(code) = letter_code(c) {
            out.push_str(&code);
        }
    }
    out
}

/// Remove every ANSI escape sequence from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESC {
            if chars.peek() == Some(&'[') {
                chars.next();
                for t in chars.by_ref() {
                    if t.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_codes() {
        assert_eq!(letter_code('n').as_deref(), Some("\x1b[0m"));
        assert_eq!(letter_code('h').as_deref(), Some("\x1b[1m"));
        assert_eq!(letter_code('c').as_deref(), Some("\x1b[36m"));
        assert_eq!(letter_code('C').as_deref(), Some("\x1b[46m"));
        assert_eq!(letter_code('q'), None);
    }

    #[test]
    fn test_palette_spec() {
        assert_eq!(color_spec("208", false).as_deref(), Some("\x1b[38;5;208m"));
        assert_eq!(color_spec("208", true).as_deref(), Some("\x1b[48;5;208m"));
        assert_eq!(color_spec("256", false), None);
    }

    #[test]
    fn test_truecolor_spec() {
        assert_eq!(
            color_spec("#ff8800", false).as_deref(),
            Some("\x1b[38;2;255;136;0m")
        );
        assert_eq!(color_spec("#ff88", false), None);
        assert_eq!(color_spec("#zzzzzz", false), None);
    }

    #[test]
    fn test_strip_ansi() {
        let painted = format!("{}hi{}", "\x1b[36m", ANSI_NORMAL);
        assert_eq!(strip_ansi(&painted), "hi");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_letters_to_codes() {
        assert_eq!(letters_to_codes("hc"), "\x1b[1m\x1b[36m");
        assert_eq!(letters_to_codes("zz"), "");
    }
}
