//! Turns extracted document text into a numbered sentence list.
//!
//! The output has one sentence per line, rendered as `"<n>. <sentence>\n"`,
//! with a single counter running across all paragraphs. Sentence boundaries
//! follow the Unicode default sentence boundary rules (UAX #29), so
//! abbreviations followed by lowercase text, decimal numbers and ellipses do
//! not end a sentence.

use std::fmt::Write;

use unicode_segmentation::UnicodeSegmentation;

/// Segments `text` into numbered sentences. Empty or blank input yields `""`.
pub fn segment(text: &str) -> String {
    let mut numbered = String::new();
    let mut counter: usize = 0;

    for paragraph in paragraphs(text) {
        for sentence in sentences(&paragraph) {
            counter = counter.saturating_add(1);
            let _ = writeln!(numbered, "{counter}. {sentence}");
        }
    }

    numbered
}

/// Number of character units in a formatted text, as used by the size gate.
pub fn char_units(text: &str) -> usize {
    text.chars().count()
}

/// Normalizes line endings and horizontal whitespace, then groups consecutive
/// non-blank lines into paragraphs joined by single spaces.
fn paragraphs(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);

    let mut paragraphs = Vec::new();
    let mut buffer = String::new();

    for line in normalized.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            if !buffer.is_empty() {
                paragraphs.push(std::mem::take(&mut buffer));
            }
            continue;
        }

        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(line);
    }

    if !buffer.is_empty() {
        paragraphs.push(buffer);
    }

    paragraphs
}

/// CRLF and lone CR become `\n`; runs of spaces and tabs become one space.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_blank_run = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
                in_blank_run = false;
            }
            ' ' | '\t' => {
                if !in_blank_run {
                    out.push(' ');
                    in_blank_run = true;
                }
            }
            other => {
                out.push(other);
                in_blank_run = false;
            }
        }
    }

    out
}

fn sentences(paragraph: &str) -> impl Iterator<Item = &str> {
    paragraph
        .split_sentence_bounds()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_input_yield_empty_output() {
        assert_eq!(segment(""), "");
        assert_eq!(segment("\n\n\r\n  \t \n"), "");
    }

    #[test]
    fn numbering_runs_across_paragraphs() {
        let text = "First sentence. Second sentence.\n\nThird one here! Fourth?";

        assert_eq!(
            segment(text),
            "1. First sentence.\n2. Second sentence.\n3. Third one here!\n4. Fourth?\n"
        );
    }

    #[test]
    fn wrapped_lines_join_into_one_paragraph() {
        let text = "This sentence is\nwrapped over\r\nthree lines.\r\rNext paragraph.";

        assert_eq!(
            segment(text),
            "1. This sentence is wrapped over three lines.\n2. Next paragraph.\n"
        );
    }

    #[test]
    fn horizontal_whitespace_collapses() {
        assert_eq!(segment("Too \t  many    spaces."), "1. Too many spaces.\n");
    }

    #[test]
    fn decimals_do_not_split() {
        assert_eq!(
            segment("The rate is 3.5 percent. It rose."),
            "1. The rate is 3.5 percent.\n2. It rose.\n"
        );
    }

    #[test]
    fn abbreviation_before_lowercase_does_not_split() {
        assert_eq!(
            segment("Bring documents, e.g. contracts and invoices. Then sign."),
            "1. Bring documents, e.g. contracts and invoices.\n2. Then sign.\n"
        );
    }

    #[test]
    fn ellipsis_before_lowercase_does_not_split() {
        assert_eq!(
            segment("Wait... nothing happened. Done."),
            "1. Wait... nothing happened.\n2. Done.\n"
        );
    }

    #[test]
    fn text_without_terminal_punctuation_is_one_sentence() {
        assert_eq!(segment("  no punctuation at all  "), "1. no punctuation at all\n");
    }

    #[test]
    fn numbering_is_contiguous_and_ordered() {
        let text: String = (1..=25)
            .map(|i| format!("Sentence number {i}.\n\n"))
            .collect();

        let output = segment(&text);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 25);
        for (idx, line) in lines.iter().enumerate() {
            let n = idx + 1;
            assert_eq!(*line, format!("{n}. Sentence number {n}."));
        }
    }

    #[test]
    fn char_units_count_scalar_values() {
        assert_eq!(char_units("héllo"), 5);
        assert_eq!(char_units("1. 日本語\n"), 7);
    }
}
