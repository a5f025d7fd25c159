//! Phonetic matching
//!
//! Primary algorithm is Koelner Phonetik, which maps German words to digit
//! sequences so similarly-sounding words collide. A letter's code depends on
//! the letters immediately before and after it. Consecutive duplicate codes
//! collapse to one, and `0` codes survive only at the start of a word.
//! Multi-word input encodes each word and concatenates the results.
//!
//! A classic Soundex code is kept alongside as a fallback for inputs the
//! German rules are not tuned for.

/// Both phonetic codes for one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneticCodes {
    pub koelner: String,
    pub soundex: String,
}

/// Phonetic code computation and comparison
pub struct PhoneticMatcher;

impl PhoneticMatcher {
    /// Koelner Phonetik code for the input
    pub fn koelner_phonetik(input: &str) -> String {
        split_words(input).map(|w| koelner_word(&w)).collect()
    }

    /// Soundex code for the input, per word, concatenated
    pub fn soundex(input: &str) -> String {
        split_words(input).map(|w| soundex_word(&w)).collect()
    }

    /// Both codes for the input
    pub fn phonetic_codes(input: &str) -> PhoneticCodes {
        PhoneticCodes {
            koelner: Self::koelner_phonetik(input),
            soundex: Self::soundex(input),
        }
    }

    /// Check whether two inputs share a Koelner Phonetik code
    pub fn sounds_like(a: &str, b: &str) -> bool {
        Self::koelner_phonetik(a) == Self::koelner_phonetik(b)
    }
}

/// Split into words of normalized uppercase letters
fn split_words(input: &str) -> impl Iterator<Item = Vec<char>> + '_ {
    input
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut letters = Vec::new();
            for c in w.chars() {
                match c.to_uppercase().next().unwrap_or(c) {
                    'Ä' => letters.push('A'),
                    'Ö' => letters.push('O'),
                    'Ü' => letters.push('U'),
                    'ß' => {
                        letters.push('S');
                        letters.push('S');
                    }
                    upper if upper.is_ascii_alphabetic() => letters.push(upper),
                    _ => {}
                }
            }
            letters
        })
        .filter(|w| !w.is_empty())
}

/// Encode one word with the Koelner Phonetik rules
fn koelner_word(word: &[char]) -> String {
    let mut raw = String::new();

    for (i, &c) in word.iter().enumerate() {
        let prev = if i > 0 { Some(word[i - 1]) } else { None };
        let next = word.get(i + 1).copied();

        match c {
            'A' | 'E' | 'I' | 'J' | 'O' | 'U' | 'Y' => raw.push('0'),
            'H' => {}
            'B' => raw.push('1'),
            'P' => raw.push(if next == Some('H') { '3' } else { '1' }),
            'D' | 'T' => {
                raw.push(if matches!(next, Some('C' | 'S' | 'Z')) {
                    '8'
                } else {
                    '2'
                });
            }
            'F' | 'V' | 'W' => raw.push('3'),
            'G' | 'K' | 'Q' => raw.push('4'),
            'C' => {
                let code = if i == 0 {
                    // Word-initial C is hard before A,H,K,L,O,Q,R,U,X
                    if matches!(next, Some('A' | 'H' | 'K' | 'L' | 'O' | 'Q' | 'R' | 'U' | 'X')) {
                        '4'
                    } else {
                        '8'
                    }
                } else if matches!(prev, Some('S' | 'Z')) {
                    '8'
                } else if matches!(next, Some('A' | 'H' | 'K' | 'O' | 'Q' | 'U' | 'X')) {
                    '4'
                } else {
                    '8'
                };
                raw.push(code);
            }
            'X' => {
                if matches!(prev, Some('C' | 'K' | 'Q')) {
                    raw.push('8');
                } else {
                    raw.push('4');
                    raw.push('8');
                }
            }
            'L' => raw.push('5'),
            'M' | 'N' => raw.push('6'),
            'R' => raw.push('7'),
            'S' | 'Z' => raw.push('8'),
            _ => {}
        }
    }

    // Collapse consecutive duplicates first, then drop non-leading zeros
    let mut collapsed = String::new();
    for c in raw.chars() {
        if collapsed.chars().last() != Some(c) {
            collapsed.push(c);
        }
    }

    let mut code = String::new();
    for (i, c) in collapsed.chars().enumerate() {
        if c != '0' || i == 0 {
            code.push(c);
        }
    }
    code
}

/// Classic four-character Soundex for one word
fn soundex_word(word: &[char]) -> String {
    fn digit(c: char) -> char {
        match c {
            'B' | 'F' | 'P' | 'V' => '1',
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => '2',
            'D' | 'T' => '3',
            'L' => '4',
            'M' | 'N' => '5',
            'R' => '6',
            _ => '0',
        }
    }

    let Some(&first) = word.first() else {
        return String::new();
    };

    let mut code = String::new();
    code.push(first);
    let mut last = digit(first);

    for &c in &word[1..] {
        if code.len() == 4 {
            break;
        }
        // H and W are transparent: they neither emit nor separate codes
        if c == 'H' || c == 'W' {
            continue;
        }
        let d = digit(c);
        if d == '0' {
            last = '0';
            continue;
        }
        if d != last {
            code.push(d);
        }
        last = d;
    }

    while code.len() < 4 {
        code.push('0');
    }
    code
}
