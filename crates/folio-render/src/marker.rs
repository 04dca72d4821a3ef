//! Error marker and error documents.
//!
//! Every page that failed to render contains [`ERROR_MARKER`]. Build passes
//! count pages containing it to report how many pages had errors.

/// Marker embedded in the output of every page that failed to render.
pub const ERROR_MARKER: &str = "<!-- __FOLIO_ERROR__ -->";

/// Whether rendered output carries the error marker.
#[must_use]
pub fn contains_error_marker(output: &str) -> bool {
    output.contains(ERROR_MARKER)
}

/// Escape HTML special characters.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Error block suitable for substitution into a layout body.
#[must_use]
pub fn error_block(message: &str, source: &str) -> String {
    format!(
        "{ERROR_MARKER}\n<div class=\"folio-error\">\n  \
         <p><strong>Folio error:</strong> could not render <code>{}</code></p>\n  \
         <pre>{}</pre>\n</div>\n",
        escape_html(source),
        escape_html(message)
    )
}

/// Minimal standalone error document.
#[must_use]
pub fn error_page(message: &str, source: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Folio error</title>\n\
         <style>.folio-error {{ font-family: monospace; color: #b00020; }}</style>\n\
         </head>\n<body>\n{}</body>\n</html>\n",
        error_block(message, source)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_error_block_contains_marker_and_message() {
        let block = error_block("No layout named \"special\" exists.", "pages/a.html");
        assert!(contains_error_marker(&block));
        assert!(block.contains("No layout named &quot;special&quot; exists."));
        assert!(block.contains("pages/a.html"));
    }

    #[test]
    fn test_error_page_is_document() {
        let page = error_page("boom", "x.md");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(contains_error_marker(&page));
    }

    #[test]
    fn test_plain_output_has_no_marker() {
        assert!(!contains_error_marker("<html><body>ok</body></html>"));
    }
}
