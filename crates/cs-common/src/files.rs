//! The two spreadsheets the service knows about and the container each one
//! lives in.

use std::collections::HashSet;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedFile {
    CompaniesInMilwaukee,
    AffiliatedPrograms,
}

impl ExpectedFile {
    pub const ALL: [ExpectedFile; 2] = [
        ExpectedFile::CompaniesInMilwaukee,
        ExpectedFile::AffiliatedPrograms,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ExpectedFile::CompaniesInMilwaukee => "Companies_in_Milwaukee.xlsx",
            ExpectedFile::AffiliatedPrograms => "Affiliated_Program_Industry_Features.xlsx",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|file| file.file_name() == name)
    }

    /// Container the file is stored in. Each file maps to exactly one container.
    pub fn container(self, containers: &Containers) -> &str {
        match self {
            ExpectedFile::CompaniesInMilwaukee => &containers.one,
            ExpectedFile::AffiliatedPrograms => &containers.two,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Containers {
    /// Holds `Companies_in_Milwaukee.xlsx`.
    pub one: String,
    /// Holds `Affiliated_Program_Industry_Features.xlsx`.
    pub two: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadValidationError {
    #[error("No files provided")]
    NoFiles,
    #[error("{}", describe_rejection(.missing, .unexpected))]
    Rejected {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("Duplicate file: {0}")]
    Duplicate(String),
}

fn expected_names() -> String {
    ExpectedFile::ALL
        .iter()
        .map(|file| file.file_name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_rejection(missing: &[String], unexpected: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Missing files: {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        parts.push(format!(
            "Unexpected file: {}. Expected only {}",
            unexpected.join(", "),
            expected_names()
        ));
    }
    parts.join(". ")
}

/// Check that `names` is exactly the set of expected files, each once.
///
/// Returns the matching [`ExpectedFile`] for every name, in input order.
pub fn validate_upload_names<'a, I>(names: I) -> Result<Vec<ExpectedFile>, UploadValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    if names.is_empty() {
        return Err(UploadValidationError::NoFiles);
    }

    let missing: Vec<String> = ExpectedFile::ALL
        .iter()
        .filter(|file| !names.contains(&file.file_name()))
        .map(|file| file.file_name().to_string())
        .collect();

    let mut files = Vec::with_capacity(names.len());
    let mut unexpected = Vec::new();
    for name in &names {
        match ExpectedFile::from_file_name(name) {
            Some(file) => files.push(file),
            None => unexpected.push(name.to_string()),
        }
    }

    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(UploadValidationError::Rejected {
            missing,
            unexpected,
        });
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = files.iter().find(|file| !seen.insert(**file)) {
        return Err(UploadValidationError::Duplicate(
            duplicate.file_name().to_string(),
        ));
    }

    Ok(files)
}

/// Reduce a client supplied filename to a safe ASCII blob name.
///
/// Follows the werkzeug `secure_filename` rules: compatibility decomposition
/// to ASCII, path separators become spaces, whitespace runs collapse to `_`,
/// only `[A-Za-z0-9_.-]` survive and leading/trailing `.`/`_` are stripped.
pub fn secure_filename(raw: &str) -> String {
    let ascii: String = raw.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn containers() -> Containers {
        Containers {
            one: "companies".into(),
            two: "programs".into(),
        }
    }

    #[test]
    fn each_expected_file_routes_to_its_own_container() {
        let containers = containers();

        assert_eq!(
            ExpectedFile::CompaniesInMilwaukee.container(&containers),
            "companies"
        );
        assert_eq!(
            ExpectedFile::AffiliatedPrograms.container(&containers),
            "programs"
        );
    }

    #[test]
    fn unknown_names_are_not_expected_files() {
        assert_eq!(ExpectedFile::from_file_name("report.xlsx"), None);
        assert_eq!(
            ExpectedFile::from_file_name("Companies_in_Milwaukee.xlsx"),
            Some(ExpectedFile::CompaniesInMilwaukee)
        );
    }

    #[test]
    fn accepts_both_expected_files_in_any_order() {
        let files = validate_upload_names([
            "Affiliated_Program_Industry_Features.xlsx",
            "Companies_in_Milwaukee.xlsx",
        ])
        .unwrap();

        assert_eq!(
            files,
            vec![
                ExpectedFile::AffiliatedPrograms,
                ExpectedFile::CompaniesInMilwaukee
            ]
        );
    }

    #[test]
    fn lists_missing_files() {
        let err = validate_upload_names(["Companies_in_Milwaukee.xlsx"]).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Missing files: Affiliated_Program_Industry_Features.xlsx"
        );
    }

    #[test]
    fn names_unexpected_files() {
        let err = validate_upload_names([
            "Companies_in_Milwaukee.xlsx",
            "Affiliated_Program_Industry_Features.xlsx",
            "payroll.xlsx",
        ])
        .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Unexpected file: payroll.xlsx"));
        assert!(!message.contains("Missing"));
    }

    #[test]
    fn reports_missing_and_unexpected_together() {
        let err = validate_upload_names(["payroll.xlsx"]).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Missing files: Companies_in_Milwaukee.xlsx"));
        assert!(message.contains("Unexpected file: payroll.xlsx"));
    }

    #[test]
    fn rejects_duplicate_expected_files() {
        let err = validate_upload_names([
            "Companies_in_Milwaukee.xlsx",
            "Affiliated_Program_Industry_Features.xlsx",
            "Companies_in_Milwaukee.xlsx",
        ])
        .unwrap_err();

        assert_eq!(
            err,
            UploadValidationError::Duplicate("Companies_in_Milwaukee.xlsx".into())
        );
    }

    #[test]
    fn empty_upload_is_rejected() {
        let names: [&str; 0] = [];
        assert_eq!(
            validate_upload_names(names).unwrap_err(),
            UploadValidationError::NoFiles
        );
    }

    #[test]
    fn secure_filename_matches_werkzeug_rules() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(
            secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"),
            "i_contain_cool_umlauts.txt"
        );
        assert_eq!(
            secure_filename("Companies_in_Milwaukee.xlsx"),
            "Companies_in_Milwaukee.xlsx"
        );
        assert_eq!(secure_filename("..."), "");
    }
}
