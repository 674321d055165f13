use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    De,
}

impl Locale {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("en") || value.eq_ignore_ascii_case("english") {
            return Ok(Self::En);
        }
        if value.eq_ignore_ascii_case("de") || value.eq_ignore_ascii_case("german") {
            return Ok(Self::De);
        }
        bail!("unsupported report labels: {value} (expected en|de)")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
        }
    }

    pub fn labels(self) -> &'static Labels {
        match self {
            Self::En => &ENGLISH,
            Self::De => &GERMAN,
        }
    }
}

/// Every user-facing string a report carries.
#[derive(Debug)]
pub struct Labels {
    pub filename: &'static str,
    pub size_bytes: &'static str,
    pub size_mib: &'static str,
    pub size: &'static str,
    pub download_url: &'static str,
    pub download: &'static str,
    pub owning_page: &'static str,
    pub linked_on_page: &'static str,
    pub linked_on_other_pages: &'static str,
    pub attachment_page: &'static str,
    pub api_delete: &'static str,
    pub yes: &'static str,
    pub no: &'static str,
    pub workspace: &'static str,
    pub total_files: &'static str,
    pub top_rows_shown: &'static str,
    pub unreferenced_suffix: &'static str,
    pub report_suffix: &'static str,
    pub index_title: &'static str,
    pub index_heading: &'static str,
    pub total_size_mib: &'static str,
    pub files: &'static str,
    pub report: &'static str,
    pub unreferenced_report: &'static str,
    pub unreferenced: &'static str,
}

impl Labels {
    pub fn yes_no(&self, value: bool) -> &'static str {
        if value { self.yes } else { self.no }
    }

    pub fn top_rows(&self, rows: usize) -> String {
        self.top_rows_shown.replace("{n}", &rows.to_string())
    }
}

static ENGLISH: Labels = Labels {
    filename: "Filename",
    size_bytes: "Size (bytes)",
    size_mib: "Size (MB)",
    size: "Size",
    download_url: "Download URL",
    download: "Download",
    owning_page: "Owning page",
    linked_on_page: "Linked on page",
    linked_on_other_pages: "Linked on other pages",
    attachment_page: "Attachment page",
    api_delete: "API delete link",
    yes: "Yes",
    no: "No",
    workspace: "Space",
    total_files: "Total files",
    top_rows_shown: "Top {n} files shown",
    unreferenced_suffix: "(unreferenced)",
    report_suffix: "Report",
    index_title: "Attachment storage overview",
    index_heading: "Attachment storage analysis of",
    total_size_mib: "Total size (MB)",
    files: "Files",
    report: "Report",
    unreferenced_report: "Unreferenced report",
    unreferenced: "Unreferenced",
};

static GERMAN: Labels = Labels {
    filename: "Dateiname",
    size_bytes: "Größe(Bytes)",
    size_mib: "Größe(MB)",
    size: "Größe",
    download_url: "Download URL",
    download: "Download",
    owning_page: "Originalseite",
    linked_on_page: "Verlinkt auf Seite",
    linked_on_other_pages: "Verlinkt auf anderen Seiten",
    attachment_page: "Attachment-Seite",
    api_delete: "API Delete Link",
    yes: "Ja",
    no: "Nein",
    workspace: "Space",
    total_files: "Gesamtdateien",
    top_rows_shown: "Top {n} Dateien angezeigt",
    unreferenced_suffix: "(Unreferenziert)",
    report_suffix: "Report",
    index_title: "Speicheranalyse Übersicht",
    index_heading: "Speicheranalyse vom",
    total_size_mib: "Gesamtgröße (MB)",
    files: "Dateien",
    report: "Report",
    unreferenced_report: "Unreferenced Report",
    unreferenced: "Unreferenced",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_codes_and_names() {
        assert_eq!(Locale::parse("EN").expect("en"), Locale::En);
        assert_eq!(Locale::parse(" german ").expect("de"), Locale::De);
        let error = Locale::parse("fr").expect_err("must fail");
        assert!(error.to_string().contains("expected en|de"));
    }

    #[test]
    fn labels_follow_locale() {
        assert_eq!(Locale::De.labels().yes_no(true), "Ja");
        assert_eq!(Locale::En.labels().yes_no(false), "No");
        assert_eq!(Locale::En.labels().top_rows(100), "Top 100 files shown");
    }
}
