use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static DOUBLE_QUOTE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""{2,}"#).expect("dq run"));
static SINGLE_QUOTE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'{2,}").expect("sq run"));

/// Folds width/compatibility variants (NFKC), straightens typographic
/// quotes and collapses repeated quote characters.
pub fn normalize_english_text(text: &str) -> String {
    let folded: String = text
        .nfkc()
        .map(|ch| match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            other => other,
        })
        .collect();
    let folded = DOUBLE_QUOTE_RUN_RE.replace_all(&folded, "\"");
    SINGLE_QUOTE_RUN_RE.replace_all(&folded, "'").into_owned()
}

pub fn is_english(lang: &str) -> bool {
    let lang = lang.trim().to_ascii_lowercase();
    lang == "en" || lang == "english" || lang.starts_with("en-") || lang.starts_with("en_")
}

/// Final pass over merged output; only English targets are touched.
pub fn post_process_translation(text: &str, target_lang: &str) -> String {
    if !is_english(target_lang) {
        return text.to_string();
    }
    normalize_english_text(text)
}

/// Whitespace-separated word count, as used for quick size estimates.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
