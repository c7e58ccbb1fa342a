//! Links to the service's false-positive report form.

use crate::client::ContentCheck;
use crate::oauth::encode;

/// Report form URL for the current submission attempt.
///
/// `url` must point at the page holding the form; the site URL is only a
/// fallback when the caller did not supply a context URL.
pub fn false_positive_url(
    report_url: &str,
    public_key: &str,
    content_id: Option<&str>,
    data: &ContentCheck,
    site_url: &str,
) -> String {
    let mut params: Vec<(&str, &str)> = vec![("public_key", public_key)];
    if let Some(content_id) = content_id {
        params.push(("contentId", content_id));
    }
    if let Some(captcha_id) = data.captcha_id.as_deref() {
        params.push(("captchaId", captcha_id));
    }
    if let Some(name) = data.author.author_name.as_deref() {
        params.push(("authorName", name));
    }
    if let Some(mail) = data.author.author_mail.as_deref() {
        params.push(("authorMail", mail));
    }
    params.push(("url", data.context_url.as_deref().unwrap_or(site_url)));

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", report_url, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AuthorParams;

    #[test]
    fn test_link_prefers_context_url() {
        let data = ContentCheck {
            context_url: Some("https://blog.example.com/post/1#comments".to_string()),
            author: AuthorParams {
                author_name: Some("Ann Smith".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let url = false_positive_url(
            "https://mollom.com/false-positive",
            "pub",
            Some("c-1"),
            &data,
            "https://blog.example.com",
        );
        assert_eq!(
            url,
            "https://mollom.com/false-positive?public_key=pub&contentId=c-1&authorName=Ann%20Smith\
             &url=https%3A%2F%2Fblog.example.com%2Fpost%2F1%23comments"
        );
    }

    #[test]
    fn test_link_falls_back_to_site_url() {
        let data = ContentCheck {
            captcha_id: Some("cap-1".to_string()),
            ..Default::default()
        };
        let url = false_positive_url("https://r.example", "pub", None, &data, "https://site.example");
        assert_eq!(
            url,
            "https://r.example?public_key=pub&captchaId=cap-1&url=https%3A%2F%2Fsite.example"
        );
    }
}
