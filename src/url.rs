use once_cell::sync::Lazy;
use regex::Regex;

static URL_NOISE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)[?&].*$").unwrap());

/// Drops everything from the first `?` or `&` onward, so tracking and
/// playlist parameters never reach the extraction engine.
pub fn normalize_url(url: &str) -> String {
    URL_NOISE_REGEX.replace(url, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_string() {
        assert_eq!(
            normalize_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123"),
            "https://www.youtube.com/watch"
        );
        assert_eq!(
            normalize_url("https://youtu.be/dQw4w9WgXcQ?si=tracking"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
    }

    #[test]
    fn strips_from_first_ampersand() {
        assert_eq!(
            normalize_url("https://example.com/v/abc&t=42?x=1"),
            "https://example.com/v/abc"
        );
    }

    #[test]
    fn leaves_clean_urls_untouched() {
        let url = "https://youtu.be/dQw4w9WgXcQ";
        assert_eq!(normalize_url(url), url);
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for url in [
            "https://youtu.be/abc?si=1",
            "https://www.youtube.com/watch?v=abc&list=x",
            "a&b?c&d",
            "?",
            "plain",
        ] {
            let once = normalize_url(url);
            assert_eq!(normalize_url(&once), once);
        }
    }
}
