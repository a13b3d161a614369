//! Text-to-markup transform applied to every reveal frame.
//!
//! Rules, per line: `**x**` → `<strong>x</strong>`; `### x` → heading block;
//! `* x` → bullet. Lines are joined with `<br>`. The output contains none of the
//! source markers, so running the transform on its own output is a no-op.

use std::sync::LazyLock;

use regex::Regex;

pub const LINE_BREAK: &str = "<br>";
pub const HEADING_OPEN: &str = r#"<strong class="block mt-3 mb-1">"#;
pub const BULLET: &str = "• ";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#{1,3}\s+(.+)$").expect("heading pattern is valid"));
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*\s+").expect("list marker pattern is valid"));

pub fn format_markup(text: &str) -> String {
    text.split('\n')
        .map(format_line)
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}

fn format_line(line: &str) -> String {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let line = BOLD.replace_all(line, "<strong>$1</strong>");

    if let Some(caps) = HEADING.captures(&line) {
        return format!("{HEADING_OPEN}{}</strong>", &caps[1]);
    }
    if let Some(marker) = LIST_MARKER.find(&line) {
        return format!("{BULLET}{}", &line[marker.end()..]);
    }
    line.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_spans() {
        assert_eq!(
            format_markup("use the **STAR** method **now**"),
            "use the <strong>STAR</strong> method <strong>now</strong>"
        );
    }

    #[test]
    fn test_unclosed_bold_left_alone() {
        assert_eq!(format_markup("half **open"), "half **open");
    }

    #[test]
    fn test_heading_line() {
        assert_eq!(
            format_markup("### Situation\nGood context."),
            format!("{HEADING_OPEN}Situation</strong><br>Good context.")
        );
    }

    #[test]
    fn test_bullets_and_line_breaks() {
        assert_eq!(
            format_markup("* first\n  * second\nplain"),
            "• first<br>• second<br>plain"
        );
    }

    #[test]
    fn test_bullet_with_bold_term() {
        assert_eq!(
            format_markup("* **Action**: be specific"),
            "• <strong>Action</strong>: be specific"
        );
    }

    #[test]
    fn test_emphasis_without_space_is_not_a_bullet() {
        assert_eq!(format_markup("*really*"), "*really*");
    }

    #[test]
    fn test_already_rendered_markup_is_unchanged() {
        let rendered = "<strong>x</strong>";
        assert_eq!(format_markup(rendered), rendered);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let samples = [
            "**x**",
            "### **Task**\n* **Action**: did things\n* Result: shipped",
            "plain words only",
            "",
            "line one\r\nline two",
            "***",
        ];
        for sample in samples {
            let once = format_markup(sample);
            assert_eq!(format_markup(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_heading_with_bold_does_not_nest_further() {
        let once = format_markup("### **Result**");
        assert_eq!(once, format!("{HEADING_OPEN}<strong>Result</strong></strong>"));
        assert_eq!(format_markup(&once), once);
    }
}
