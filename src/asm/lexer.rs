//! Comment stripping and line/token splitting for the textual front-end
//! (spec §4.8). Kept separate from [`super::parser`] so the "turn source
//! text into a sequence of (line number, label, mnemonic, operand
//! strings)" concern doesn't get tangled with "turn those strings into
//! an [`Instruction`](crate::ir::Instruction)".

/// One non-empty logical line after comment stripping: `label:` is
/// optional, as is the instruction itself (a line can be pure label).
pub struct Line<'a> {
    pub number: usize,
    pub label: Option<&'a str>,
    pub mnemonic: Option<&'a str>,
    pub operands: Vec<&'a str>,
}

/// Replaces every `/* ... */` block comment (which may span lines) with
/// spaces, preserving line numbers for later diagnostics.
pub fn strip_block_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.char_indices().peekable();
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            let mut j = i + 2;
            while j < bytes.len() && !(bytes[j] == b'*' && bytes.get(j + 1) == Some(&b'/')) {
                out.push(if bytes[j] == b'\n' { '\n' } else { ' ' });
                j += 1;
            }
            i = (j + 2).min(bytes.len());
            out.push(' ');
            out.push(' ');
        } else {
            let ch = source[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    let _ = &mut chars;
    out
}

fn strip_line_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Splits `source` (after block-comment stripping) into parsed lines,
/// skipping blank/comment-only ones. 1-indexed line numbers, matching
/// the `filename:line: error:` diagnostic format (§6).
pub fn lines(source: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    for (zero_based, raw) in source.lines().enumerate() {
        let number = zero_based + 1;
        let code = strip_line_comment(raw).trim();
        if code.is_empty() {
            continue;
        }

        let (label, rest) = split_label(code);
        let rest = rest.trim();
        if rest.is_empty() {
            out.push(Line { number, label, mnemonic: None, operands: Vec::new() });
            continue;
        }

        let (mnemonic, operand_str) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };
        let operands = if operand_str.is_empty() {
            Vec::new()
        } else {
            operand_str.split(',').map(str::trim).collect()
        };
        out.push(Line { number, label, mnemonic: Some(mnemonic), operands });
    }
    out
}

/// Splits off a leading `label:` if the first colon in the line appears
/// before any whitespace.
fn split_label(code: &str) -> (Option<&str>, &str) {
    let colon = code.find(':');
    let space = code.find(char::is_whitespace);
    match colon {
        Some(c) if space.map_or(true, |s| c < s) => (Some(&code[..c]), &code[c + 1..]),
        _ => (None, code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_comments_are_replaced_without_shifting_line_numbers() {
        let src = "add.i32 %r0, %r0, %r1\n/* skip\nthis */nop\n";
        let stripped = strip_block_comments(src);
        let parsed = lines(&stripped);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].number, 3);
        assert_eq!(parsed[1].mnemonic, Some("nop"));
    }

    #[test]
    fn a_label_only_line_has_no_mnemonic() {
        let parsed = lines("loop:\n");
        assert_eq!(parsed[0].label, Some("loop"));
        assert!(parsed[0].mnemonic.is_none());
    }

    #[test]
    fn a_label_and_instruction_can_share_a_line() {
        let parsed = lines("loop: subi.i32 %r0, %r0, $1");
        assert_eq!(parsed[0].label, Some("loop"));
        assert_eq!(parsed[0].mnemonic, Some("subi.i32"));
        assert_eq!(parsed[0].operands, vec!["%r0", "%r0", "$1"]);
    }

    #[test]
    fn trailing_line_comments_are_dropped() {
        let parsed = lines("nop // does nothing");
        assert_eq!(parsed[0].mnemonic, Some("nop"));
        assert!(parsed[0].operands.is_empty());
    }
}
