//! Reply text cleanup before synthesis.
//!
//! Model replies arrive as markdown and often carry emoji. Neither reads
//! well aloud, so [`speakable_text`] reduces a reply to plain sentences.

/// Reduce a model reply to text a synthesizer can read aloud.
///
/// - Fenced code blocks become "Code omitted."
/// - Headers, emphasis, inline code, list markers and blockquotes lose their markup
/// - Links keep their label, images their alt text
/// - Emoji, pictographs and decorative symbols are dropped
/// - Whitespace runs collapse to a single space
#[must_use]
pub fn speakable_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            if !in_fence {
                push_sentence(&mut out, "Code omitted.");
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence || is_rule(trimmed) {
            continue;
        }

        let plain = strip_symbols(&strip_inline(strip_line_prefix(trimmed)));
        push_sentence(&mut out, plain.trim());
    }

    collapse_whitespace(&out)
}

/// Drop emoji and decorative symbols, keeping letters, digits, whitespace
/// and ordinary punctuation.
#[must_use]
pub fn strip_symbols(text: &str) -> String {
    text.chars().filter(|&c| !is_decorative(c)).collect()
}

fn push_sentence(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(text);
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|&m| compact.chars().all(|c| c == m))
}

/// Strip header hashes, blockquote markers and list bullets or numbers.
fn strip_line_prefix(line: &str) -> &str {
    let mut line = line;
    while let Some(rest) = line.strip_prefix('>') {
        line = rest.trim_start();
    }

    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes > 0 && line[hashes..].starts_with(' ') {
        return line[hashes..].trim_start();
    }

    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest;
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest;
        }
    }

    line
}

/// Remove inline markup: links, images, emphasis, strikethrough and code ticks.
fn strip_inline(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '!' if chars.get(i + 1) == Some(&'[') => {
                if let Some((label, next)) = link_at(&chars, i + 1) {
                    if !label.is_empty() {
                        out.push_str("image: ");
                        out.push_str(&label);
                    }
                    i = next;
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            '[' => {
                if let Some((label, next)) = link_at(&chars, i) {
                    out.push_str(&label);
                    i = next;
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            '*' | '`' | '~' => i += 1,
            '_' => {
                // Underscores inside words are kept (snake_case).
                let inner = i > 0
                    && chars[i - 1].is_alphanumeric()
                    && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
                if inner {
                    out.push(c);
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Parse `[label](target)` starting at `open`. Returns the label and the
/// index just past the closing parenthesis.
fn link_at(chars: &[char], open: usize) -> Option<(String, usize)> {
    let close = open + chars[open..].iter().position(|&c| c == ']')?;
    if chars.get(close + 1) != Some(&'(') {
        return None;
    }
    let end = close + 1 + chars[close + 1..].iter().position(|&c| c == ')')?;
    let label: String = chars[open + 1..close].iter().collect();
    Some((strip_inline(&label), end + 1))
}

fn is_decorative(c: char) -> bool {
    matches!(u32::from(c),
        0x200D                  // zero width joiner
        | 0x20E3                // combining keycap
        | 0x2190..=0x21FF       // arrows
        | 0x2300..=0x23FF       // misc technical
        | 0x2460..=0x24FF       // enclosed alphanumerics
        | 0x2500..=0x27BF       // box drawing, shapes, misc symbols, dingbats
        | 0x2900..=0x297F       // supplemental arrows
        | 0x2B00..=0x2BFF       // misc symbols and arrows
        | 0xE000..=0xF8FF       // private use
        | 0xFE00..=0xFE0F       // variation selectors
        | 0x1F000..=0x1FAFF     // emoji, pictographs, flags
        | 0xE0020..=0xE007F     // tag characters
    ) || (c.is_control() && !c.is_whitespace())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(speakable_text("Hello there."), "Hello there.");
    }

    #[test]
    fn markdown_markup_is_removed() {
        let input = "# Title\n\nThis is **bold** and _italic_ with `code`.\n\n- first\n2. second\n> quoted";
        assert_eq!(
            speakable_text(input),
            "Title This is bold and italic with code. first second quoted"
        );
    }

    #[test]
    fn code_fences_are_summarized() {
        let input = "Try this:\n```rust\nfn main() {}\n```\nDone.";
        assert_eq!(speakable_text(input), "Try this: Code omitted. Done.");
    }

    #[test]
    fn links_keep_labels() {
        assert_eq!(
            speakable_text("See [the docs](https://example.com) and ![a cat](cat.png)."),
            "See the docs and image: a cat."
        );
    }

    #[test]
    fn emoji_and_symbols_are_dropped() {
        assert_eq!(speakable_text("Great job 🎉👍🏽 ✅ → next"), "Great job next");
        assert_eq!(strip_symbols("café ☕ 42%"), "café  42%");
    }

    #[test]
    fn snake_case_survives() {
        assert_eq!(speakable_text("call my_function now"), "call my_function now");
    }

    #[test]
    fn only_symbols_becomes_empty() {
        assert!(speakable_text("🙂 🙂\n---\n").is_empty());
    }
}
