use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use super::{
    dto::{AuthResponse, PublicUser},
    jwt::JwtKeys,
    oauth::ExternalIdentity,
    repo_types::User,
};
use sqlx::PgPool;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trims entries, drops blanks and duplicates (case-insensitive), keeps order.
pub(crate) fn normalize_set(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim();
        if !v.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(v)) {
            out.push(v.to_string());
        }
    }
    out
}

/// Issues the access/refresh pair every login path returns.
pub(crate) fn issue_tokens(keys: &JwtKeys, user: &User) -> anyhow::Result<AuthResponse> {
    Ok(AuthResponse {
        token: keys.sign_access(user.id, &user.email)?,
        refresh_token: keys.sign_refresh(user.id, &user.email)?,
        user: PublicUser::from(user),
    })
}

/// Maps an externally authenticated identity onto a local account.
pub(crate) async fn federated_login(
    db: &PgPool,
    identity: &ExternalIdentity,
    provider: &str,
) -> anyhow::Result<User> {
    let email = normalize_email(&identity.email);
    anyhow::ensure!(is_valid_email(&email), "provider returned an invalid email");
    let name = identity
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or("cook"))
        .to_string();

    let user = User::find_or_create_federated(db, &email, &name, provider).await?;
    info!(user_id = %user.id, provider, "federated login");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("chef@kitchen.io"));
        assert!(!is_valid_email("chef@kitchen"));
        assert!(!is_valid_email("chef kitchen@io.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Chef@Kitchen.IO "), "chef@kitchen.io");
    }

    #[test]
    fn sets_drop_blanks_and_duplicates() {
        let set = normalize_set(vec![
            " vegan ".into(),
            "".into(),
            "Vegan".into(),
            "gluten-free".into(),
        ]);
        assert_eq!(set, vec!["vegan".to_string(), "gluten-free".to_string()]);
    }
}
