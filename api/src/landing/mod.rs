pub mod route;

use crate::config::DEFAULT_REDIRECT_URL;

/// Redirect target baked into the landing page template.
pub const TEMPLATE_REDIRECT_URL: &str = DEFAULT_REDIRECT_URL;

/// Points every occurrence of the template's redirect target at `redirect_url`.
pub fn render_landing_page(template: &str, redirect_url: &str) -> String {
    template.replace(TEMPLATE_REDIRECT_URL, redirect_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_placeholder_is_replaced() {
        let template = r#"<a href="https://www.google.com">go</a>
<script>const fallback = "https://www.google.com";</script>"#;

        let rendered = render_landing_page(template, "https://example.com");

        assert!(!rendered.contains(TEMPLATE_REDIRECT_URL));
        assert_eq!(rendered.matches("https://example.com").count(), 2);
    }

    #[test]
    fn test_template_without_placeholder_is_unchanged() {
        let template = "<html><body>Hello</body></html>";
        assert_eq!(render_landing_page(template, "https://example.com"), template);
    }

    #[test]
    fn test_default_target_renders_unchanged() {
        let template = r#"window.location.href = "https://www.google.com";"#;
        assert_eq!(render_landing_page(template, DEFAULT_REDIRECT_URL), template);
    }
}
