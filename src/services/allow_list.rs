use std::collections::HashSet;

/// Emails permitted to sign in.
///
/// Entries and lookups are normalized (trimmed, lowercased) so the test is an
/// exact membership check on the normalized form.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    emails: HashSet<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|email| normalize_email(email.as_ref()))
                .filter(|email| !email.is_empty())
                .collect(),
        }
    }

    pub fn is_allowed(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }
}
