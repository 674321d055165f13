//! Decides whether an attachment is referenced from a page's storage markup.
//!
//! The check is a union of independent match strategies and any single hit
//! wins. Declaring a live file unreferenced is the expensive mistake, so the
//! detector errs on the side of reporting a reference.

use crate::variants::{percent_encoded, title_variants};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Literal,
    CaseInsensitive,
    PercentEncoded,
    Basename,
}

impl MatchStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::CaseInsensitive => "case-insensitive",
            Self::PercentEncoded => "percent-encoded",
            Self::Basename => "basename",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMatch {
    pub title: String,
    pub candidate: String,
    pub strategy: MatchStrategy,
}

pub fn is_referenced<T: AsRef<str>>(markup: &str, titles: &[T]) -> bool {
    find_reference(markup, titles).is_some()
}

/// First match of any title against `markup`, if there is one.
pub fn find_reference<T: AsRef<str>>(markup: &str, titles: &[T]) -> Option<ReferenceMatch> {
    if markup.is_empty() {
        return None;
    }
    let markup_lower = markup.to_lowercase();

    for title in titles {
        let title = title.as_ref();
        if title.is_empty() {
            continue;
        }
        let hit = |candidate: &str, strategy| {
            Some(ReferenceMatch {
                title: title.to_string(),
                candidate: candidate.to_string(),
                strategy,
            })
        };

        for variant in title_variants(Some(title)) {
            if markup.contains(&variant) {
                return hit(variant.as_str(), MatchStrategy::Literal);
            }
            if markup_lower.contains(&variant.to_lowercase()) {
                return hit(variant.as_str(), MatchStrategy::CaseInsensitive);
            }
        }

        if let Some(encoded) = percent_encoded(title)
            && (markup.contains(&encoded) || markup_lower.contains(&encoded))
        {
            return hit(encoded.as_str(), MatchStrategy::PercentEncoded);
        }

        let basename = title.rsplit('/').next().unwrap_or(title);
        if !basename.is_empty()
            && (markup.contains(basename) || markup_lower.contains(&basename.to_lowercase()))
        {
            return hit(basename, MatchStrategy::Basename);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TITLES: [&str; 0] = [];

    #[test]
    fn verbatim_title_is_referenced() {
        let markup = "<p>Attached: quarterly-report.pdf</p>";
        assert!(is_referenced(markup, &["quarterly-report.pdf"]));
    }

    #[test]
    fn html_escaped_title_is_referenced() {
        let markup = r#"<ac:image><ri:attachment ri:filename="A&amp;B.pdf" /></ac:image>"#;
        assert!(!markup.contains("A&B.pdf"));
        assert!(is_referenced(markup, &["A&B.pdf"]));
    }

    #[test]
    fn percent_encoded_title_is_referenced() {
        let markup = r#"<a href="https://wiki.example.org/files/my%20file.docx">doc</a>"#;
        assert!(!markup.contains("my file.docx"));
        assert!(is_referenced(markup, &["my file.docx"]));
    }

    #[test]
    fn lowercase_percent_escapes_still_match() {
        let markup = r#"<a href="/files/Plan%c3%a4.pdf">plan</a>"#;
        assert!(is_referenced(markup, &["Planä.pdf"]));
    }

    #[test]
    fn case_differences_are_ignored() {
        let found = find_reference("<p>see SCREENSHOT.PNG</p>", &["screenshot.png"])
            .expect("reference");
        assert_eq!(found.strategy, MatchStrategy::CaseInsensitive);
        assert_eq!(found.candidate, "screenshot.png");
    }

    #[test]
    fn structured_attachment_tag_is_referenced() {
        let markup = r#"<ac:link><ri:attachment ri:filename="budget 2024.xlsx" /></ac:link>"#;
        let found = find_reference(markup, &["budget 2024.xlsx"]).expect("reference");
        assert_eq!(found.strategy, MatchStrategy::Literal);
    }

    #[test]
    fn download_path_counts_as_a_reference() {
        let markup = r#"<a href="/download/attachments/99/other.bin">x</a>"#;
        let found = find_reference(markup, &["unrelated.zip"]).expect("reference");
        assert_eq!(found.candidate, "/download/attachments/");
    }

    #[test]
    fn any_historical_title_can_match() {
        let markup = "<p>old-name.png</p>";
        assert!(is_referenced(markup, &["new-name.png", "old-name.png"]));
    }

    #[test]
    fn empty_markup_never_matches() {
        assert!(!is_referenced("", &["report.pdf"]));
        assert!(find_reference("", &["report.pdf"]).is_none());
    }

    #[test]
    fn no_titles_never_match() {
        assert!(!is_referenced("<p>report.pdf</p>", &NO_TITLES));
        assert!(!is_referenced("<p>report.pdf</p>", &[""]));
    }

    #[test]
    fn unrelated_markup_is_not_a_reference() {
        let markup = "<p>Nothing to see here.</p>";
        assert!(!is_referenced(markup, &["orphan.txt"]));
    }
}
