//! Textual forms under which an attachment title can show up in storage markup.
//!
//! A link authored by hand, an `ri:attachment` macro and a pasted download URL
//! all serialize the same filename differently. Each form is produced by its
//! own builder so one awkward title can only cost a single variant.

use std::collections::BTreeSet;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Path segment shared by every attachment download link.
pub const DOWNLOAD_PATH_PREFIX: &str = "/download/attachments/";

/// Everything except ASCII alphanumerics and the RFC 3986 unreserved marks.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type VariantBuilder = fn(&str) -> Option<String>;

const BUILDERS: &[VariantBuilder] = &[
    |title| Some(title.to_string()),
    |title| Some(html_escaped(title)),
    |title| Some(html_escape::decode_html_entities(title).into_owned()),
    percent_encoded,
    |title| Some(title.replace(' ', "+")),
    |title| Some(format!("ri:filename=\"{title}\"")),
    |title| Some(format!("ri:filename=\"{}\"", html_escaped(title))),
    |title| Some(format!("ri:attachment ri:filename=\"{title}\"")),
    |title| Some(format!("ri:attachment ri:filename=\"{}\"", html_escaped(title))),
    |_| Some(DOWNLOAD_PATH_PREFIX.to_string()),
];

/// All variants of `title`; empty when the title is absent or blank.
pub fn title_variants(title: Option<&str>) -> BTreeSet<String> {
    let Some(title) = title.filter(|title| !title.is_empty()) else {
        return BTreeSet::new();
    };

    BUILDERS
        .iter()
        .filter_map(|build| build(title))
        .filter(|variant| !variant.is_empty())
        .collect()
}

/// Percent-encode as a single URL path component, keeping only the
/// unreserved marks literal.
pub fn percent_encoded(title: &str) -> Option<String> {
    let encoded = utf8_percent_encode(title, URL_COMPONENT).to_string();
    if encoded.is_empty() { None } else { Some(encoded) }
}

pub fn html_escaped(title: &str) -> String {
    html_escape::encode_quoted_attribute(title).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_or_empty_title_has_no_variants() {
        assert!(title_variants(None).is_empty());
        assert!(title_variants(Some("")).is_empty());
    }

    #[test]
    fn variants_always_contain_the_literal_title() {
        for title in ["report.pdf", "A&B.pdf", "my file.docx", "Übersicht (final).xlsx"] {
            let variants = title_variants(Some(title));
            assert!(variants.contains(title), "missing literal for {title}");
        }
    }

    #[test]
    fn variants_cover_every_encoding_convention() {
        let variants = title_variants(Some("A&B <draft> v2.pdf"));
        let expected = [
            "A&B <draft> v2.pdf",
            "A&amp;B &lt;draft&gt; v2.pdf",
            "A%26B%20%3Cdraft%3E%20v2.pdf",
            "A&B+<draft>+v2.pdf",
            "ri:filename=\"A&B <draft> v2.pdf\"",
            "ri:filename=\"A&amp;B &lt;draft&gt; v2.pdf\"",
            "ri:attachment ri:filename=\"A&B <draft> v2.pdf\"",
            "ri:attachment ri:filename=\"A&amp;B &lt;draft&gt; v2.pdf\"",
            DOWNLOAD_PATH_PREFIX,
        ];
        for variant in expected {
            assert!(variants.contains(variant), "missing variant {variant}");
        }
    }

    #[test]
    fn unescaped_variant_decodes_entities() {
        let variants = title_variants(Some("Q&amp;A.txt"));
        assert!(variants.contains("Q&A.txt"));
        assert!(variants.contains("Q&amp;A.txt"));
    }

    #[test]
    fn percent_encoding_keeps_unreserved_marks() {
        assert_eq!(
            percent_encoded("my file_v1-final~.docx").as_deref(),
            Some("my%20file_v1-final~.docx")
        );
        assert_eq!(percent_encoded("a/b").as_deref(), Some("a%2Fb"));
        assert_eq!(percent_encoded("ä").as_deref(), Some("%C3%A4"));
        assert_eq!(percent_encoded(""), None);
    }

    #[test]
    fn quotes_are_escaped_like_attribute_values() {
        assert_eq!(html_escaped("say \"hi\" it's"), "say &quot;hi&quot; it&#x27;s");
    }
}
