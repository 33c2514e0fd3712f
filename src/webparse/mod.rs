//! Article page parsing: HTML in, title + markdown body out.
//!
//! The downloader only depends on the [`ArticlePageParser`] trait; the
//! bundled implementation targets the source's article template with CSS
//! selectors.

use scraper::{Html, Selector};

use crate::error::WebParseError;

/// A parsed article page.
#[derive(Debug, Clone)]
pub struct ParsedArticle {
    pub title: String,
    /// Body rendered as markdown paragraphs.
    pub markdown: String,
}

impl ParsedArticle {
    /// File representation: title as an h1 header, then the body.
    pub fn to_markdown_file(&self) -> String {
        format!("# {}\n\n{}\n", self.title, self.markdown)
    }
}

pub trait ArticlePageParser {
    fn parse_article(&self, html: &str) -> Result<ParsedArticle, WebParseError>;
}

/// Selector-based parser for the source's article pages.
pub struct CrhoyParser {
    title: Selector,
    content: Selector,
    blocks: Selector,
}

impl Default for CrhoyParser {
    fn default() -> Self {
        // Selectors are infallible for these literals.
        Self {
            title: Selector::parse("h1").unwrap(),
            content: Selector::parse("div.post-contenido, div.entry-content, article").unwrap(),
            blocks: Selector::parse("p, h2, h3, li").unwrap(),
        }
    }
}

impl CrhoyParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArticlePageParser for CrhoyParser {
    fn parse_article(&self, html: &str) -> Result<ParsedArticle, WebParseError> {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|t| !t.is_empty())
            .ok_or(WebParseError::MissingTitle)?;

        let container = document
            .select(&self.content)
            .next()
            .ok_or(WebParseError::MissingBody)?;

        let mut paragraphs = Vec::new();
        for block in container.select(&self.blocks) {
            let text = collapse_whitespace(&block.text().collect::<String>());
            if text.is_empty() {
                continue;
            }
            match block.value().name() {
                "h2" => paragraphs.push(format!("## {text}")),
                "h3" => paragraphs.push(format!("### {text}")),
                "li" => paragraphs.push(format!("- {text}")),
                _ => paragraphs.push(text),
            }
        }

        if paragraphs.is_empty() {
            return Err(WebParseError::MissingBody);
        }

        Ok(ParsedArticle {
            title,
            markdown: paragraphs.join("\n\n"),
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <h1>  Rebajan   tarifas eléctricas </h1>
            <div class="post-contenido">
                <p>El ICE anunció una rebaja.</p>
                <h2>Detalles</h2>
                <p>La rebaja rige desde abril.</p>
                <ul><li>Residencial: 8.5%</li></ul>
                <p>   </p>
            </div>
        </body></html>"#;

    #[test]
    fn test_parse_article_extracts_title_and_blocks() {
        let parsed = CrhoyParser::new().parse_article(PAGE).unwrap();
        assert_eq!(parsed.title, "Rebajan tarifas eléctricas");
        assert_eq!(
            parsed.markdown,
            "El ICE anunció una rebaja.\n\n## Detalles\n\nLa rebaja rige desde abril.\n\n- Residencial: 8.5%"
        );
    }

    #[test]
    fn test_markdown_file_has_h1_header() {
        let parsed = CrhoyParser::new().parse_article(PAGE).unwrap();
        assert!(parsed.to_markdown_file().starts_with("# Rebajan tarifas eléctricas\n\n"));
    }

    #[test]
    fn test_parse_article_without_title_fails() {
        let html = "<html><body><div class='post-contenido'><p>x</p></div></body></html>";
        assert!(matches!(
            CrhoyParser::new().parse_article(html),
            Err(WebParseError::MissingTitle)
        ));
    }

    #[test]
    fn test_parse_article_without_body_fails() {
        let html = "<html><body><h1>Titulo</h1></body></html>";
        assert!(matches!(
            CrhoyParser::new().parse_article(html),
            Err(WebParseError::MissingBody)
        ));
    }
}
