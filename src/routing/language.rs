//! Answer-language resolution from the caller hint and the message text.

use super::traits::{Language, LanguageHint};

fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// Resolve the language agents should answer in.
///
/// An explicit hint always wins. Under `auto` any Han character selects
/// `zh-HK`, any Latin letter selects `en`, and otherwise `fallback` is used.
pub fn resolve(hint: Option<LanguageHint>, message: &str, fallback: Language) -> Language {
    match hint.unwrap_or_default() {
        LanguageHint::En => Language::En,
        LanguageHint::ZhHk => Language::ZhHk,
        LanguageHint::Auto => {
            if message.chars().any(is_han) {
                Language::ZhHk
            } else if message.chars().any(|c| c.is_ascii_alphabetic()) {
                Language::En
            } else {
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_hint_wins_over_text() {
        assert_eq!(resolve(Some(LanguageHint::En), "我頭痛", Language::ZhHk), Language::En);
        assert_eq!(resolve(Some(LanguageHint::ZhHk), "headache", Language::En), Language::ZhHk);
    }

    #[test]
    fn auto_detects_han_even_in_mixed_text() {
        assert_eq!(resolve(None, "I have 頭痛 today", Language::En), Language::ZhHk);
        assert_eq!(resolve(Some(LanguageHint::Auto), "feeling dizzy", Language::ZhHk), Language::En);
    }

    #[test]
    fn inconclusive_text_uses_fallback() {
        assert_eq!(resolve(None, "", Language::ZhHk), Language::ZhHk);
        assert_eq!(resolve(None, "999 !!!", Language::En), Language::En);
    }
}
