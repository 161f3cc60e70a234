//! Placeholder substitution into the unattended descriptor.
//!
//! Substitution is literal. Each role's placeholder must appear exactly once;
//! any other `{{...}}` token is left as written and reported, not repaired.

use tracing::warn;
use zeroize::Zeroizing;

use super::{CredentialSet, Role};
use crate::error::{BuildError, BuildResult};

/// Render `template` with every role's password substituted.
///
/// The result holds plaintext and is zeroed on drop.
pub fn embed(template: &str, credentials: &CredentialSet) -> BuildResult<Zeroizing<String>> {
    for role in Role::ALL {
        let count = template.matches(role.placeholder()).count();
        if count != 1 {
            return Err(BuildError::Validation(format!(
                "descriptor template must contain {} exactly once, found {}",
                role.placeholder(),
                count
            )));
        }
    }

    let mut rendered = Zeroizing::new(template.to_string());
    for credential in credentials.iter() {
        let next = rendered.replace(credential.role.placeholder(), credential.secret.expose());
        rendered = Zeroizing::new(next);
    }

    let leftovers = unmatched_placeholders(&rendered);
    if !leftovers.is_empty() {
        warn!(
            placeholders = ?leftovers,
            "descriptor keeps placeholders that no credential fills"
        );
    }

    Ok(rendered)
}

/// `{{TOKEN}}` occurrences in `text`, in order of appearance.
pub fn unmatched_placeholders(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let token = &after[..end];
        if !token.is_empty()
            && token
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            found.push(format!("{{{{{}}}}}", token));
        }
        rest = &after[end + 2..];
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialSet, Secret};

    fn creds() -> CredentialSet {
        CredentialSet::from_secrets(vec![
            (Role::Administrator, Secret::new("admin-pass".to_string())),
            (Role::User, Secret::new("user-pass".to_string())),
        ])
    }

    #[test]
    fn test_embed_substitutes_each_role() {
        let template = "<Admin>{{ADMIN_PASSWORD}}</Admin><User>{{USER_PASSWORD}}</User>";
        let out = embed(template, &creds()).unwrap();
        assert_eq!(
            out.as_str(),
            "<Admin>admin-pass</Admin><User>user-pass</User>"
        );
    }

    #[test]
    fn test_embed_rejects_missing_placeholder() {
        let err = embed("<Admin>{{ADMIN_PASSWORD}}</Admin>", &creds()).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("{{USER_PASSWORD}}"));
    }

    #[test]
    fn test_embed_rejects_duplicate_placeholder() {
        let template = "{{ADMIN_PASSWORD}} {{ADMIN_PASSWORD}} {{USER_PASSWORD}}";
        assert!(embed(template, &creds()).is_err());
    }

    #[test]
    fn test_unknown_placeholders_left_verbatim() {
        let template = "{{ADMIN_PASSWORD}} {{USER_PASSWORD}} {{PRODUCT_KEY}}";
        let out = embed(template, &creds()).unwrap();
        assert_eq!(out.as_str(), "admin-pass user-pass {{PRODUCT_KEY}}");
        assert_eq!(unmatched_placeholders(&out), vec!["{{PRODUCT_KEY}}"]);
    }

    #[test]
    fn test_unmatched_ignores_non_tokens() {
        assert!(unmatched_placeholders("{{ lower }} {{}} {{open").is_empty());
    }
}
