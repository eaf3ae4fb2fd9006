//! Tesseract TSV output parsing
//!
//! Columns: level, page_num, block_num, par_num, line_num, word_num, left,
//! top, width, height, conf, text. Word rows have level 5; other levels
//! carry a confidence of -1.

use crate::engine::Token;

const WORD_LEVEL: u32 = 5;

/// Words and lines recovered from a TSV dump
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsvPage {
    pub tokens: Vec<Token>,
    pub lines: Vec<String>,
}

impl TsvPage {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Parse TSV output. The header row and malformed rows are skipped.
pub fn parse(tsv: &str) -> TsvPage {
    let mut page = TsvPage::default();
    let mut current_line: Option<(u32, u32, u32, u32)> = None;
    let mut words: Vec<String> = Vec::new();

    for row in tsv.lines() {
        let fields: Vec<&str> = row.splitn(12, '\t').collect();
        if fields.len() < 12 {
            continue;
        }
        let Ok(level) = fields[0].trim().parse::<u32>() else {
            continue;
        };
        if level != WORD_LEVEL {
            continue;
        }
        let text = fields[11].trim();
        let confidence = fields[10].trim().parse::<f32>().unwrap_or(-1.0);
        if text.is_empty() {
            continue;
        }

        let key = (
            fields[1].trim().parse().unwrap_or(0),
            fields[2].trim().parse().unwrap_or(0),
            fields[3].trim().parse().unwrap_or(0),
            fields[4].trim().parse().unwrap_or(0),
        );
        if current_line != Some(key) {
            if !words.is_empty() {
                page.lines.push(words.join(" "));
                words.clear();
            }
            current_line = Some(key);
        }

        // Unscored words are engine noise
        if confidence > 0.0 {
            words.push(text.to_string());
        }
        page.tokens.push(Token {
            text: text.to_string(),
            confidence,
        });
    }
    if !words.is_empty() {
        page.lines.push(words.join(" "));
    }

    page
}
