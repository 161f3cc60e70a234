//! Input file validation.
//!
//! Existence alone says nothing: an empty template still "exists". These
//! check that each input can do its job.

use std::path::Path;

use crate::credentials::{descriptor::unmatched_placeholders, Role};

/// Check a descriptor template carries exactly one placeholder per role.
///
/// Returns the number of unknown `{{...}}` tokens, which are left verbatim.
pub fn validate_descriptor_template(path: &Path) -> Result<usize, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("Cannot read: {}", e))?;

    for role in Role::ALL {
        let count = content.matches(role.placeholder()).count();
        if count != 1 {
            return Err(format!(
                "expected exactly one {} placeholder, found {}",
                role.placeholder(),
                count
            ));
        }
    }

    let unknown = unmatched_placeholders(&content)
        .into_iter()
        .filter(|token| !Role::ALL.iter().any(|r| r.placeholder() == token))
        .count();
    Ok(unknown)
}

/// Check a build-engine config is a non-empty text file.
pub fn validate_engine_config(path: &Path) -> Result<usize, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("Cannot read: {}", e))?;
    let lines = content.lines().filter(|l| !l.trim().is_empty()).count();
    if lines == 0 {
        return Err("engine config is empty".to_string());
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_valid_template() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.xml");
        fs::write(&path, "<a>{{ADMIN_PASSWORD}}</a><b>{{USER_PASSWORD}}</b>{{HOSTNAME}}").unwrap();
        assert_eq!(validate_descriptor_template(&path), Ok(1));
    }

    #[test]
    fn test_template_missing_placeholder() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.xml");
        fs::write(&path, "<a>{{ADMIN_PASSWORD}}</a>").unwrap();
        let err = validate_descriptor_template(&path).unwrap_err();
        assert!(err.contains("{{USER_PASSWORD}}"));
    }

    #[test]
    fn test_empty_engine_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("e.pkr.hcl");
        fs::write(&path, "\n  \n").unwrap();
        assert!(validate_engine_config(&path).is_err());
    }
}
