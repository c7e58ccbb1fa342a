//! Who is submitting: client address, account metadata, privileges.

use serde::{Deserialize, Serialize};

use crate::client::AuthorParams;

/// Logged-in account of the submitter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountInfo {
    pub id: i64,
    pub login: String,
    pub display_name: Option<String>,
    pub email: String,
    pub url: Option<String>,
    /// Registration time, unix seconds
    pub registered_at: Option<i64>,
    pub roles: Vec<String>,
}

/// Request context supplied by the CMS along with a submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorContext {
    /// Address of the direct peer of the CMS
    pub remote_addr: String,
    /// Raw `X-Forwarded-For` header, if any
    pub forwarded_for: Option<String>,
    /// Submitted through the administrative interface
    pub admin: bool,
    pub account: Option<AccountInfo>,
}

impl AuthorContext {
    /// Administrative submissions and bypass roles skip all checks
    pub fn is_privileged(&self, bypass_roles: &[String]) -> bool {
        if self.admin {
            return true;
        }
        self.account
            .as_ref()
            .is_some_and(|account| account.roles.iter().any(|role| bypass_roles.contains(role)))
    }

    pub fn author_params(&self, trusted_proxies: &[String]) -> AuthorParams {
        let mut params = AuthorParams {
            author_ip: Some(client_ip(
                &self.remote_addr,
                self.forwarded_for.as_deref(),
                trusted_proxies,
            )),
            ..Default::default()
        };

        let Some(account) = self.account.as_ref().filter(|a| a.id != 0) else {
            return params;
        };

        params.author_id = Some(account.id.to_string());
        params.author_created = account.registered_at;
        params.author_mail = Some(account.email.clone());
        params.author_name = Some(
            account
                .display_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| account.login.clone()),
        );
        params.author_url = account.url.clone().filter(|url| !url.is_empty());
        params
    }
}

/// Client address behind trusted reverse proxies.
///
/// The forwarded chain is only consulted when proxies are configured. The
/// direct peer is appended to it, trusted hops are dropped, and the
/// right-most remaining address wins.
pub fn client_ip(remote_addr: &str, forwarded_for: Option<&str>, trusted: &[String]) -> String {
    let Some(forwarded_for) = forwarded_for.filter(|h| !h.trim().is_empty()) else {
        return remote_addr.to_string();
    };
    if trusted.is_empty() {
        return remote_addr.to_string();
    }

    forwarded_for
        .split(',')
        .map(str::trim)
        .chain(std::iter::once(remote_addr))
        .filter(|addr| !trusted.iter().any(|t| t == addr))
        .last()
        .unwrap_or(remote_addr)
        .to_string()
}
