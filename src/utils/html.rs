use ammonia;

/// Clean author-supplied text using the ammonia library.
///
/// Quiz prompts and titles are rendered by participant browsers, so they are
/// stored sanitized: safe inline tags (like <b>, <em>) survive while <script>,
/// <iframe> and event-handler attributes are stripped.
///
/// Note: this removes a <script> tag together with its content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_removed_markup_kept() {
        let cleaned = clean_html("Is <b>this</b> fair?<script>alert(1)</script>");
        assert_eq!(cleaned, "Is <b>this</b> fair?");
    }

    #[test]
    fn test_event_handlers_stripped() {
        let cleaned = clean_html(r#"<em onclick="steal()">Honest?</em>"#);
        assert_eq!(cleaned, "<em>Honest?</em>");
    }
}
