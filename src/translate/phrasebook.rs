use async_trait::async_trait;

use super::{TranslateError, Translator};

type Table = &'static [(&'static str, &'static str)];

const EN_SW: Table = &[
    ("Hello", "Hujambo"),
    ("How are you?", "Habari yako?"),
    ("I am good", "Niko sawa"),
    ("Thank you", "Asante"),
    ("Goodbye", "Kwaheri"),
    ("What is your name?", "Jina lako nani?"),
    ("My name is", "Jina langu ni"),
    ("Nice to meet you", "Nafurahi kukutana nawe"),
    ("How is the weather?", "Hali ya hewa ikoje?"),
    ("I love this", "Nampenda hii"),
];

const EN_AM: Table = &[
    ("Hello", "ሰላም"),
    ("How are you?", "እንዴት ነህ?"),
    ("I am good", "ደህና ነኝ"),
    ("Thank you", "አመሰግናለሁ"),
    ("Goodbye", "ደህና ሁን"),
    ("What is your name?", "ስምህ ማን ነው?"),
    ("My name is", "ስሜ"),
    ("Nice to meet you", "ስለተገናኝክ ደስተኛ ነኝ"),
    ("How is the weather?", "አየር እንዴት ነው?"),
    ("I love this", "ይህን እወዳለሁ"),
];

const SW_AM: Table = &[
    ("Hujambo", "ሰላም"),
    ("Habari yako?", "እንዴት ነህ?"),
    ("Niko sawa", "ደህና ነኝ"),
    ("Asante", "አመሰግናለሁ"),
    ("Kwaheri", "ደህና ሁን"),
];

/// Tables are stored one way and read in both directions.
const TABLES: &[(&str, &str, Table)] = &[("en", "sw", EN_SW), ("en", "am", EN_AM), ("sw", "am", SW_AM)];

/// Fixed phrase mapping between English, Swahili and Amharic.
///
/// Pairs without a table of their own go through English when the source
/// language has an English table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Phrasebook;

impl Phrasebook {
    fn has_pair(from: &str, to: &str) -> bool {
        TABLES
            .iter()
            .any(|&(a, b, _)| (a == from && b == to) || (a == to && b == from))
    }

    fn lookup(from: &str, to: &str, text: &str) -> Option<&'static str> {
        TABLES.iter().find_map(|&(a, b, table)| {
            if a == from && b == to {
                table.iter().find(|(src, _)| *src == text).map(|(_, dst)| *dst)
            } else if a == to && b == from {
                table.iter().find(|(_, src)| *src == text).map(|(dst, _)| *dst)
            } else {
                None
            }
        })
    }

    pub fn phrase(&self, text: &str, from: &str, to: &str) -> Option<String> {
        if from == to {
            return Some(text.to_owned());
        }

        if Self::has_pair(from, to) {
            return Self::lookup(from, to, text).map(str::to_owned);
        }

        if from != "en" && to != "en" && Self::has_pair(from, "en") {
            // unknown phrases are carried into English verbatim
            let english = Self::lookup(from, "en", text).unwrap_or(text);
            return Self::lookup("en", to, english).map(str::to_owned);
        }

        None
    }
}

#[async_trait]
impl Translator for Phrasebook {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslateError> {
        self.phrase(text, from, to).ok_or_else(|| TranslateError::Unavailable {
            text: text.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
        })
    }
}
