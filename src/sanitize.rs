use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// Preamble the service prepends when it echoes the glossary back.
static GLOSSARY_INTRO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)I've included some words.*bilingual dictionary.*Please translate.*")
        .expect("glossary intro regex")
});

// One echoed term pair per line: {"src": "...", "tgt": "..."}
static TERM_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*\{\s*"src"\s*:\s*"(?:[^"\\]|\\.)*"\s*,\s*"tgt"\s*:\s*"(?:[^"\\]|\\.)*"\s*\}\s*$"#)
        .expect("term pair regex")
});

/// The response held nothing but echoed protocol artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("response contained only glossary/domain echo ({skipped_lines} lines), no translation")]
pub struct ExtractionEmpty {
    pub skipped_lines: usize,
}

/// Strips leading echo artifacts from one raw chunk response.
///
/// Removed from the top, in order: the first line when it contains the
/// configured domain description; glossary preamble sentences; a run of
/// blank lines and `{"src": .., "tgt": ..}` term-pair lines. The last two
/// passes repeat until neither removes anything.
///
/// A response that is empty or blank is returned as `""`. A response whose
/// every line was an artifact is reported as [`ExtractionEmpty`].
pub fn sanitize(raw: &str, domain: Option<&str>) -> Result<String, ExtractionEmpty> {
    // (byte offset, content without line terminator)
    let mut lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0usize;
    for seg in raw.split_inclusive('\n') {
        lines.push((offset, seg.trim_end_matches(['\n', '\r'])));
        offset += seg.len();
    }

    let mut start = 0usize;
    let mut artifacts = 0usize;

    if let (Some(domain), Some((_, first))) = (domain.map(str::trim), lines.first()) {
        if !domain.is_empty() && first.contains(domain) {
            start = 1;
            artifacts += 1;
        }
    }

    loop {
        let before = start;
        while start < lines.len() && GLOSSARY_INTRO_RE.is_match(lines[start].1) {
            start += 1;
            artifacts += 1;
        }
        while start < lines.len() {
            let line = lines[start].1;
            if TERM_PAIR_RE.is_match(line) {
                artifacts += 1;
            } else if !line.trim().is_empty() {
                break;
            }
            start += 1;
        }
        if start == before {
            break;
        }
    }

    if start > 0 {
        tracing::debug!(skipped = start, artifacts, "stripped response preamble");
    }

    let body = match lines.get(start) {
        Some((at, _)) => raw[*at..].trim_end_matches(['\n', '\r']),
        None => "",
    };
    if body.trim().is_empty() {
        if artifacts > 0 {
            return Err(ExtractionEmpty {
                skipped_lines: start,
            });
        }
        return Ok(String::new());
    }
    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn drops_term_pairs_and_blank_lines() {
        let raw = "{\"src\": \"AI\", \"tgt\": \"人工智能\"}\n\nHello world";
        assert_eq!(sanitize(raw, None).as_deref(), Ok("Hello world"));
    }

    #[test]
    fn term_pairs_only_is_extraction_empty() {
        let err = sanitize(r#"{"src":"x","tgt":"y"}"#, None).unwrap_err();
        assert_eq!(err.skipped_lines, 1);
    }

    #[test]
    fn empty_response_is_not_an_extraction_failure() {
        assert_eq!(sanitize("", None).as_deref(), Ok(""));
        assert_eq!(sanitize("\n  \n", None).as_deref(), Ok(""));
    }

    #[test]
    fn skips_domain_echo_on_first_line_only() {
        let domain = "  The text is a legal contract.  ";
        let raw = "Domain: The text is a legal contract.\nClause 1 applies.";
        assert_eq!(sanitize(raw, Some(domain)).as_deref(), Ok("Clause 1 applies."));

        let raw = "Clause 1 applies.\nThe text is a legal contract.";
        assert_eq!(sanitize(raw, Some(domain)).as_deref(), Ok(raw));
    }

    #[test]
    fn blank_domain_is_ignored() {
        assert_eq!(sanitize("Hello", Some("   ")).as_deref(), Ok("Hello"));
    }

    #[test]
    fn strips_preamble_then_glossary() {
        let raw = "I've included some words in a BILINGUAL DICTIONARY below. please translate accordingly.\n\
                   {\"src\": \"模型\", \"tgt\": \"model\"}\n\
                   {\"src\": \"数据\", \"tgt\": \"data\"}\n\
                   \n\
                   The model reads data.\n\
                   {\"src\": \"kept\", \"tgt\": \"inside body\"}";
        assert_eq!(
            sanitize(raw, None).as_deref(),
            Ok("The model reads data.\n{\"src\": \"kept\", \"tgt\": \"inside body\"}")
        );
    }

    #[test]
    fn preamble_after_term_pairs_is_also_removed() {
        let raw = "{\"src\": \"a\", \"tgt\": \"b\"}\n\
                   I've included some words from a bilingual dictionary. Please translate.\n\
                   Body";
        assert_eq!(sanitize(raw, None).as_deref(), Ok("Body"));
    }

    #[test]
    fn term_pair_with_extra_keys_is_kept() {
        let raw = "{\"src\": \"a\", \"tgt\": \"b\", \"note\": \"c\"}\nBody";
        assert_eq!(sanitize(raw, None).as_deref(), Ok(raw));
    }

    #[test]
    fn domain_plus_preamble_only_is_extraction_empty() {
        let raw = "legal\nI've included some words from a bilingual dictionary, please translate.";
        let err = sanitize(raw, Some("legal")).unwrap_err();
        assert_eq!(err.skipped_lines, 2);
    }

    #[test]
    fn clean_text_passes_through() {
        let raw = "  indented first line\nsecond\n\nfourth";
        assert_eq!(sanitize(raw, None).as_deref(), Ok(raw));
    }

    proptest! {
        #[test]
        fn prop_idempotent(lines in prop::collection::vec(
            prop_oneof![
                Just(String::new()),
                Just("{\"src\": \"k\", \"tgt\": \"v\"}".to_string()),
                Just("I've included some words from a bilingual dictionary. Please translate.".to_string()),
                "[A-Za-z ]{1,20}",
            ],
            0..12,
        )) {
            let raw = lines.join("\n");
            if let Ok(once) = sanitize(&raw, None) {
                prop_assert_eq!(sanitize(&once, None), Ok(once.clone()));
            }
        }
    }
}
