//! Body-tree synthesis.
//!
//! Turns optional text and HTML bodies plus an ordered list of data parts
//! into the smallest correct part tree:
//!
//! ```text
//! mixed(                         only when unreferenced parts exist
//!   related(                     only when the html references a part
//!     alternative(text, html)    or the single text/html leaf
//!     referenced parts...)
//!   unreferenced parts...)
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;
use regex::Regex;

use super::{AlternativePart, DataPart, MixedPart, Part, RelatedPart, TextPart};
use crate::config::DEFAULT_CONTENT_ID_DOMAIN;
use crate::errors::{FrameworkError, FrameworkResult};

static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\s+[^>]*src\s*=\s*(?:"cid:([^"]+)"|'cid:([^']+)'|cid:([^>\s]+))"#)
        .expect("img src regex is valid")
});

static BACKGROUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<\w+\s+[^>]*background\s*=\s*(?:"cid:([^"]+)"|'cid:([^']+)'|cid:([^>\s]+))"#)
        .expect("background regex is valid")
});

fn missing_body() -> FrameworkError {
    FrameworkError::logic("A message must have a text or an HTML part.")
}

/// Returns the distinct `cid:` tokens referenced from `img src` attributes,
/// then from `background` attributes.
pub fn scan_content_ids(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for pattern in [&*IMG_SRC_RE, &*BACKGROUND_RE] {
        for captures in pattern.captures_iter(html) {
            let token = (1..=3).find_map(|i| captures.get(i)).map(|m| m.as_str());
            if let Some(token) = token {
                if !token.is_empty() && seen.insert(token.to_string()) {
                    names.push(token.to_string());
                }
            }
        }
    }

    names
}

/// Replaces every `cid:<token>` reference whose token is exactly `token`.
fn rewrite_content_id(html: &str, token: &str, content_id: &str) -> FrameworkResult<String> {
    let pattern = Regex::new(&format!(r#"cid:{}(["'\s>]|$)"#, regex::escape(token)))
        .map_err(|e| FrameworkError::invalid_argument(format!("Invalid content id \"{}\": {}", token, e)))?;
    Ok(pattern
        .replace_all(html, |captures: &regex::Captures<'_>| format!("cid:{}{}", content_id, &captures[1]))
        .into_owned())
}

/// Builds body trees.
#[derive(Debug, Clone)]
pub struct BodySynthesizer {
    content_id_domain: String,
}

impl Default for BodySynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_ID_DOMAIN)
    }
}

impl BodySynthesizer {
    /// Creates a synthesizer generating content IDs under `content_id_domain`.
    pub fn new(content_id_domain: impl Into<String>) -> Self {
        Self {
            content_id_domain: content_id_domain.into(),
        }
    }

    /// Synthesizes the body tree.
    ///
    /// `parts` holds attachments and embeds in registration order. A part is
    /// related when the HTML references its name or content ID; the first
    /// part claiming a reference wins and later claimants are dropped.
    /// Unreferenced parts, inline or not, end up in the mixed container.
    pub fn synthesize(
        &self,
        text: Option<&TextPart>,
        html: Option<&TextPart>,
        parts: &[DataPart],
    ) -> FrameworkResult<Part> {
        if text.is_none() && html.is_none() {
            return Err(missing_body());
        }

        let names = html.map(|h| scan_content_ids(&h.body)).unwrap_or_default();
        let mut html = html.cloned();

        let mut related_names: HashSet<&str> = HashSet::new();
        let mut related = Vec::new();
        let mut others = Vec::new();

        'parts: for part in parts {
            for name in &names {
                let matches_name = part.name.as_deref() == Some(name.as_str());
                let matches_id = part.content_id.as_deref() == Some(name.as_str());
                if !matches_name && !matches_id {
                    continue;
                }
                if !related_names.insert(name.as_str()) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(cid = %name, "Dropping duplicate part for content id");
                    continue 'parts;
                }

                let content_id = part.content_id(&self.content_id_domain);
                if let Some(html) = html.as_mut() {
                    if *name != content_id {
                        html.body = rewrite_content_id(&html.body, name, &content_id)?;
                    }
                }

                let mut inline = part.clone().as_inline();
                inline.name = Some(content_id.clone());
                inline.content_id = Some(content_id);
                related.push(Part::Data(inline));
                continue 'parts;
            }
            let mut other = part.clone();
            if other.is_inline() && !other.has_content_id() {
                other.content_id = Some(other.content_id(&self.content_id_domain));
            }
            others.push(Part::Data(other));
        }

        let mut content = match (text, html) {
            (Some(text), None) => Part::Text(text.clone()),
            (None, Some(html)) => Part::Text(html),
            (Some(text), Some(html)) => {
                Part::Alternative(AlternativePart::new(vec![Part::Text(text.clone()), Part::Text(html)])?)
            }
            (None, None) => return Err(missing_body()),
        };

        if !related.is_empty() {
            content = Part::Related(RelatedPart::new(content, related)?);
        }

        if !others.is_empty() {
            let mut children = Vec::with_capacity(others.len() + 1);
            children.push(content);
            children.extend(others);
            content = Part::Mixed(MixedPart::new(children)?);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(media_type = content.media_type(), "Synthesized body");

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::ContentDisposition;

    fn gif(name: &str) -> DataPart {
        DataPart::new(b"GIF89a".to_vec())
            .with_name(name)
            .with_media_type("image/gif")
            .unwrap()
    }

    #[test]
    fn test_requires_text_or_html() {
        let err = BodySynthesizer::default().synthesize(None, None, &[]).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Logic);
    }

    #[test]
    fn test_scan_content_ids() {
        let html = r#"<img src="cid:a.gif"><img SRC='cid:b.png'><td background=cid:c.jpg><img src="cid:a.gif">"#;
        assert_eq!(scan_content_ids(html), vec!["a.gif", "b.png", "c.jpg"]);
        assert!(scan_content_ids("<a href=\"cid:x\">").is_empty());
    }

    #[test]
    fn test_referenced_part_becomes_related() {
        let html = TextPart::html("<img src=\"cid:test.gif\">");
        let part = gif("test.gif");
        let cid = part.content_id("symfony");

        let body = BodySynthesizer::default()
            .synthesize(None, Some(&html), &[part])
            .unwrap();

        let Part::Related(related) = body else { panic!("expected related part") };
        let Part::Text(main) = related.main() else { panic!("expected text main part") };
        assert_eq!(main.body, format!("<img src=\"cid:{}\">", cid));

        let Part::Data(data) = &related.related()[0] else { panic!("expected data part") };
        assert_eq!(data.disposition, ContentDisposition::Inline);
        assert_eq!(data.name.as_deref(), Some(cid.as_str()));
    }

    #[test]
    fn test_reference_by_explicit_content_id_keeps_html() {
        let html = TextPart::html("<img src=\"cid:logo@example.com\">");
        let part = gif("logo.gif").with_content_id("logo@example.com");

        let body = BodySynthesizer::default()
            .synthesize(None, Some(&html), &[part])
            .unwrap();

        let Part::Related(related) = body else { panic!("expected related part") };
        assert_eq!(related.main(), &Part::Text(html));
    }

    #[test]
    fn test_unreferenced_inline_part_goes_to_mixed() {
        let text = TextPart::new("hi");
        let body = BodySynthesizer::default()
            .synthesize(Some(&text), None, &[gif("unused.gif").as_inline()])
            .unwrap();

        let Part::Mixed(mixed) = body else { panic!("expected mixed part") };
        assert_eq!(mixed.parts().len(), 2);
        assert_eq!(mixed.parts()[0], Part::Text(text));
    }

    #[test]
    fn test_rewrite_leaves_longer_tokens_alone() {
        let html = TextPart::html("<img src=\"cid:a.gif\"><img src=\"cid:a.gif2\">");
        let part = gif("a.gif");
        let cid = part.content_id("symfony");

        let body = BodySynthesizer::default()
            .synthesize(None, Some(&html), &[part])
            .unwrap();

        let Part::Related(related) = body else { panic!("expected related part") };
        let Part::Text(main) = related.main() else { panic!("expected text main part") };
        assert_eq!(
            main.body,
            format!("<img src=\"cid:{}\"><img src=\"cid:a.gif2\">", cid)
        );
    }

    #[test]
    fn test_unreferenced_inline_part_gets_configured_content_id() {
        let text = TextPart::new("hi");
        let body = BodySynthesizer::new("example.com")
            .synthesize(Some(&text), None, &[gif("unused.gif").as_inline(), gif("doc.gif")])
            .unwrap();

        let Part::Mixed(mixed) = body else { panic!("expected mixed part") };
        let Part::Data(inline) = &mixed.parts()[1] else { panic!("expected data part") };
        assert!(inline.content_id.as_deref().unwrap().ends_with("@example.com"));
        let Part::Data(attachment) = &mixed.parts()[2] else { panic!("expected data part") };
        assert_eq!(attachment.content_id, None);
    }

    #[test]
    fn test_first_claimant_wins() {
        let html = TextPart::html("<img src=\"cid:test.gif\">");
        let first = DataPart::new(b"first".to_vec()).with_name("test.gif");
        let second = DataPart::new(b"second".to_vec()).with_name("test.gif");

        let body = BodySynthesizer::default()
            .synthesize(None, Some(&html), &[first, second])
            .unwrap();

        let Part::Related(related) = body else { panic!("expected related part, no mixed") };
        assert_eq!(related.related().len(), 1);
        let Part::Data(data) = &related.related()[0] else { panic!("expected data part") };
        assert_eq!(data.bytes().unwrap().as_ref(), b"first");
    }

    #[test]
    fn test_related_inside_mixed() {
        let text = TextPart::new("hi");
        let html = TextPart::html("<img src=\"cid:test.gif\">");
        let parts = [DataPart::new(b"%PDF".to_vec()).with_name("doc.pdf"), gif("test.gif")];

        let body = BodySynthesizer::default()
            .synthesize(Some(&text), Some(&html), &parts)
            .unwrap();

        assert_eq!(body.media_type(), "multipart/mixed");
        let children = body.children();
        assert_eq!(children[0].media_type(), "multipart/related");
        assert_eq!(children[0].children()[0].media_type(), "multipart/alternative");
        assert_eq!(children[1].media_type(), "application/octet-stream");
    }
}
