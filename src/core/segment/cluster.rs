use super::Segment;
use crate::core::Result;

const COENG: char = '\u{17D2}';
const ZWSP: char = '\u{200B}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CharClass {
    /// Consonant, independent vowel or a letter that carries marks.
    Base,
    Coeng,
    /// Dependent vowel, diacritic or joiner attached to the preceding base.
    Mark,
    Digit,
    /// Letters of other scripts, kept together as a run.
    Foreign,
    Separator,
    Other,
}

pub(crate) fn classify(c: char) -> CharClass {
    match c {
        '\u{1780}'..='\u{17B3}' | '\u{17DC}' => CharClass::Base,
        COENG => CharClass::Coeng,
        '\u{17B4}'..='\u{17D1}' | '\u{17D3}' | '\u{17DD}' => CharClass::Mark,
        '\u{200C}' | '\u{200D}' => CharClass::Mark,
        '\u{17E0}'..='\u{17E9}' | '\u{17F0}'..='\u{17F9}' => CharClass::Digit,
        ZWSP | '\u{FEFF}' => CharClass::Separator,
        c if c.is_whitespace() => CharClass::Separator,
        c if c.is_ascii_digit() => CharClass::Digit,
        c if is_khmer(c) => CharClass::Other,
        c if c.is_alphabetic() => CharClass::Foreign,
        _ => CharClass::Other,
    }
}

pub(crate) fn is_khmer(c: char) -> bool {
    matches!(c, '\u{1780}'..='\u{17FF}' | '\u{19E0}'..='\u{19FF}')
}

/// Splits text into Khmer orthographic syllables. A syllable is a base
/// character followed by any subscripts (coeng + consonant), dependent
/// vowels and signs. Digit runs and runs of foreign letters stay together,
/// every other symbol becomes a token of its own.
#[derive(Debug, Clone, Default)]
pub struct ClusterSegmenter;

impl ClusterSegmenter {
    pub fn new() -> Self {
        Self
    }

    pub fn clusters(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        let mut current_class: Option<CharClass> = None;
        let mut after_coeng = false;

        let flush = |current: &mut String, out: &mut Vec<String>| {
            if !current.is_empty() {
                out.push(std::mem::take(current));
            }
        };

        for c in text.chars() {
            let class = classify(c);
            match class {
                CharClass::Separator => {
                    flush(&mut current, &mut out);
                    current_class = None;
                    after_coeng = false;
                    continue;
                }
                CharClass::Base if after_coeng => {}
                CharClass::Base => {
                    flush(&mut current, &mut out);
                    current_class = Some(CharClass::Base);
                }
                CharClass::Coeng | CharClass::Mark => {
                    // Orphan marks start a cluster of their own.
                    if current_class != Some(CharClass::Base) {
                        flush(&mut current, &mut out);
                        current_class = Some(CharClass::Base);
                    }
                }
                CharClass::Digit | CharClass::Foreign => {
                    if current_class != Some(class) {
                        flush(&mut current, &mut out);
                        current_class = Some(class);
                    }
                }
                CharClass::Other => {
                    flush(&mut current, &mut out);
                    current.push(c);
                    flush(&mut current, &mut out);
                    current_class = None;
                    after_coeng = false;
                    continue;
                }
            }
            after_coeng = class == CharClass::Coeng;
            current.push(c);
        }
        flush(&mut current, &mut out);
        out
    }
}

impl Segment for ClusterSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.clusters(text))
    }

    fn name(&self) -> &str {
        "cluster"
    }
}
