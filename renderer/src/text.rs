//! Line-oriented text helpers used when inlining block bodies and slot
//! contributions.

/// Remove up to `columns` columns of leading whitespace from every line of
/// `segment`. The first line is only touched when it begins a line of the
/// template (`at_line_start`).
pub fn strip_indent(segment: &str, at_line_start: bool, columns: usize, tab_width: usize) -> String {
    if columns == 0 {
        return segment.to_string();
    }
    let mut out = String::with_capacity(segment.len());
    for (i, line) in segment.split_inclusive('\n').enumerate() {
        if i == 0 && !at_line_start {
            out.push_str(line);
        } else {
            out.push_str(&line[indent_cut(line, columns, tab_width)..]);
        }
    }
    out
}

/// Byte length of the leading whitespace that fits within `columns`.
fn indent_cut(line: &str, columns: usize, tab_width: usize) -> usize {
    let mut width = 0;
    for (i, c) in line.char_indices() {
        let w = match c {
            ' ' => 1,
            '\t' => tab_width,
            _ => return i,
        };
        if width + w > columns {
            return i;
        }
        width += w;
    }
    line.len()
}

fn is_blank(line: &str) -> bool {
    line.chars().all(char::is_whitespace)
}

fn leading_whitespace(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Remove the common minimal indentation of all non-blank lines, dropping a
/// blank first and last line. Blank lines come out empty.
pub fn trim_indent(text: &str) -> String {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.first().is_some_and(|l| is_blank(l)) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| is_blank(l)) {
        lines.pop();
    }
    let common = lines
        .iter()
        .filter(|l| !is_blank(l))
        .map(|l| leading_whitespace(l))
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|&l| if is_blank(l) { "" } else { &l[common..] })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop leading and trailing blank lines.
pub fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let Some(first) = lines.iter().position(|l| !is_blank(l)) else {
        return String::new();
    };
    let last = lines.iter().rposition(|l| !is_blank(l)).unwrap_or(first);
    lines[first..=last].join("\n")
}

/// The whitespace-equivalent of the current (last) line of `out`: tabs are
/// kept, every other character becomes a space.
pub fn line_prefix(out: &str) -> String {
    let current = out.rsplit('\n').next().unwrap_or("");
    current
        .chars()
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect()
}

/// Prefix every line after the first with `prefix`. Empty lines stay empty.
pub fn indent_following_lines(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(prefix);
            }
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strip_indent_by_columns() {
        assert_eq!(strip_indent("    a\n      b\n", true, 4, 4), "a\n  b\n");
        assert_eq!(strip_indent("  a\n\tb\n", true, 4, 4), "a\nb\n");
        assert_eq!(strip_indent("x    \n    y", false, 4, 4), "x    \ny");
        assert_eq!(strip_indent("  \t a", true, 4, 4), "\t a");
        assert_eq!(strip_indent("    a", true, 0, 4), "    a");
    }

    #[test]
    fn trim_indent_removes_common_margin() {
        assert_eq!(trim_indent("\n    get(\"/\")\n      ok()\n"), "get(\"/\")\n  ok()");
        assert_eq!(trim_indent("  a\n\n  b"), "a\n\nb");
        assert_eq!(trim_indent(""), "");
    }

    #[test]
    fn trim_blank_lines_keeps_inner_blanks() {
        assert_eq!(trim_blank_lines("\n  \na\n\nb\n \n"), "a\n\nb");
        assert_eq!(trim_blank_lines(" \n\n"), "");
    }

    #[test]
    fn prefix_mirrors_current_line() {
        assert_eq!(line_prefix("first\n\tval x = "), format!("\t{}", " ".repeat(8)));
        assert_eq!(line_prefix("done\n"), "");
        assert_eq!(line_prefix("  "), "  ");
    }

    #[test]
    fn following_lines_are_indented() {
        assert_eq!(indent_following_lines("a\nb\n\nc", "  "), "a\n  b\n\n  c");
        assert_eq!(indent_following_lines("single", "    "), "single");
    }
}
