//! HTML text and link extraction
//!
//! The crawl loop talks to the [`PageParser`] trait; [`HtmlPageParser`] is the
//! scraper-based implementation.

use scraper::{Html, Selector};

/// Elements whose text never counts as page content
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Extraction collaborator consumed by the crawler
pub trait PageParser: Send + Sync {
    /// Visible text of the page with whitespace runs collapsed to single spaces
    fn extract_text(&self, body: &str) -> String;

    /// Contents of the `<title>` element, empty when missing
    fn extract_title(&self, body: &str) -> String;

    /// Raw `href` values of every anchor, in document order.
    /// Resolution against the page URL happens in the normalizer.
    fn extract_links(&self, body: &str) -> Vec<String>;
}

/// scraper-backed [`PageParser`]
pub struct HtmlPageParser {
    title_selector: Selector,
    link_selector: Selector,
}

impl HtmlPageParser {
    pub fn new() -> Self {
        Self {
            title_selector: Selector::parse("title").expect("static selector is valid"),
            link_selector: Selector::parse("a[href]").expect("static selector is valid"),
        }
    }
}

impl Default for HtmlPageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PageParser for HtmlPageParser {
    fn extract_text(&self, body: &str) -> String {
        let document = Html::parse_document(body);
        let mut words: Vec<&str> = Vec::new();

        for node in document.root_element().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };

            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| NON_CONTENT_TAGS.contains(&el.name()))
                    .unwrap_or(false)
            });
            if hidden {
                continue;
            }

            words.extend(text.split_whitespace());
        }

        words.join(" ")
    }

    fn extract_title(&self, body: &str) -> String {
        let document = Html::parse_document(body);
        document
            .select(&self.title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    fn extract_links(&self, body: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        document
            .select(&self.link_selector)
            .filter_map(|el| el.value().attr("href"))
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <!DOCTYPE html>
        <html>
        <head>
            <title>  Test Page </title>
            <style>body { color: red; }</style>
            <script>var tracking = "ignored";</script>
        </head>
        <body>
            <h1>Heading</h1>
            <p>First   paragraph with <a href="/about">a link</a>.</p>
            <a href="https://other.com/page#top">Other</a>
            <a href="">Empty</a>
            <a>No href</a>
        </body>
        </html>
    "#;

    #[test]
    fn test_extract_title() {
        let parser = HtmlPageParser::new();
        assert_eq!(parser.extract_title(PAGE), "Test Page");
        assert_eq!(parser.extract_title("<p>untitled</p>"), "");
    }

    #[test]
    fn test_extract_text_skips_scripts_and_styles() {
        let parser = HtmlPageParser::new();
        let text = parser.extract_text(PAGE);

        assert!(text.contains("Heading"));
        assert!(text.contains("a link"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("  "));
    }

    #[test]
    fn test_extract_links_keeps_raw_hrefs() {
        let parser = HtmlPageParser::new();
        let links = parser.extract_links(PAGE);

        assert_eq!(links, vec!["/about", "https://other.com/page#top"]);
    }
}
