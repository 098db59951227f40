//! Parsers for the text archive.today returns.
//!
//! These depend on the exact markup and listing format the service emits
//! today: the attribute order of the hidden `submitid` input and the `,\n`
//! separator between timemap entries. If either changes upstream, the
//! fixtures in the tests below are the place to start.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    archive::Memento,
    error::{Error, Result},
};

lazy_static! {
    static ref SUBMIT_ID_RE: Regex =
        Regex::new(r#"<input type="hidden" name="submitid" value="([^"]*)"\s*/?>"#)
            .expect("submitid regex is valid");
}

/// Returns the value of the hidden `submitid` form field in `html`.
///
/// # Errors
///
/// Fails if the page does not contain the submission form.
pub fn extract_submit_id(html: &str) -> Result<String> {
    SUBMIT_ID_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .ok_or(Error::SubmitIdNotFound)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLink<'a> {
    pub domain: &'a str,
    pub id: &'a str,
}

/// Splits `https://{domain}/{id}` into its domain and id.
///
/// # Errors
///
/// Fails if the link has no domain or id segment.
pub fn parse_snapshot_link(link: &str) -> Result<SnapshotLink<'_>> {
    // The first two segments are the scheme and the empty string between `//`
    let mut segments = link.split('/').skip(2);
    match (segments.next(), segments.next()) {
        (Some(domain), Some(id)) if !domain.is_empty() && !id.is_empty() => {
            Ok(SnapshotLink { domain, id })
        }
        _ => Err(Error::UnexpectedLink(link.into())),
    }
}

/// Parses an HTTP date such as `Mon, 01 Jan 2024 00:00:00 GMT`.
///
/// # Errors
///
/// Fails if `s` is not an RFC 2822 date.
pub fn parse_http_date(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::InvalidDate(format!("{:?}: {}", s, e)))
}

/// Parses a timemap in link format into its mementos, in listing order.
///
/// Returns no mementos if the listing has no `original` entry, which is what
/// archive.today serves for URLs it has never archived.
///
/// # Errors
///
/// Fails if a memento entry has a missing or unparseable `datetime`.
pub fn parse_timemap(body: &str) -> Result<Vec<Memento>> {
    let body = body.replace("\r\n", "\n");
    let entries: Vec<&str> = body.split(",\n").collect();

    let has_original = entries
        .first()
        .and_then(|entry| entry_field(entry, "rel"))
        .map_or(false, |rel| rel.contains("original"));
    if !has_original {
        return Ok(Vec::new());
    }

    let mut mementos = Vec::new();
    for entry in entries {
        let is_memento = entry_field(entry, "rel").map_or(false, |rel| rel.contains("memento"));
        if !is_memento {
            continue;
        }
        let datetime = entry_field(entry, "datetime")
            .ok_or_else(|| Error::MalformedTimemap(entry.trim().into()))?;
        mementos.push(Memento {
            url: entry_target(entry).into(),
            date: parse_http_date(datetime)?,
        });
    }

    Ok(mementos)
}

/// Splits an entry into its `<url>` target and the sub-fields after it.
///
/// The target ends at the first `>`, so `;` inside a URL stays part of it.
fn split_entry(entry: &str) -> (&str, &str) {
    let entry = entry.trim();
    entry
        .strip_prefix('<')
        .and_then(|rest| rest.split_once('>'))
        .or_else(|| entry.split_once(';'))
        .unwrap_or((entry, ""))
}

/// The `<url>` an entry points at, without the angle brackets.
fn entry_target(entry: &str) -> &str {
    split_entry(entry).0.trim()
}

/// Looks up `name="value"` among an entry's sub-fields.
fn entry_field<'a>(entry: &'a str, name: &str) -> Option<&'a str> {
    split_entry(entry).1.split(';').find_map(|field| {
        let (key, value) = field.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    static INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<form id="submiturl" action="https://archive.ph/submit/" method="GET">
<input type="hidden" name="submitid" value="fHcJ2nd3Bz0xVNkq4TfLGn7RB+lZXQrbI0m6S5Ylz9T8TPa6q0FSrY8Wm1VcBOsX"/>
<input id="url" type="text" name="url" value=""/>
<input type="submit" value="save"/>
</form>
</body></html>"#;

    #[test]
    fn test_extract_submit_id_from_index_page() {
        let id = extract_submit_id(INDEX_PAGE).unwrap();
        assert_eq!(
            id,
            "fHcJ2nd3Bz0xVNkq4TfLGn7RB+lZXQrbI0m6S5Ylz9T8TPa6q0FSrY8Wm1VcBOsX"
        );
    }

    #[test]
    fn test_extract_submit_id_returns_exact_value() {
        for value in ["X", "abc123", "a/b+c=="] {
            let html = format!(
                r#"<p><input type="hidden" name="submitid" value="{}"/></p>"#,
                value
            );
            assert_eq!(extract_submit_id(&html).unwrap(), value);
        }
    }

    #[test]
    fn test_extract_submit_id_when_missing_fails() {
        let err = extract_submit_id("<html><body>Please complete the CAPTCHA</body></html>")
            .unwrap_err();
        assert!(matches!(err, Error::SubmitIdNotFound));
    }

    #[test]
    fn test_extract_submit_id_when_other_hidden_field_fails() {
        let html = r#"<input type="hidden" name="csrf" value="nope"/>"#;
        assert!(matches!(
            extract_submit_id(html),
            Err(Error::SubmitIdNotFound)
        ));
    }

    #[test]
    fn test_parse_snapshot_link_returns_domain_and_id() {
        let link = parse_snapshot_link("https://sub.example.com/ABCDE").unwrap();
        assert_eq!(
            link,
            SnapshotLink {
                domain: "sub.example.com",
                id: "ABCDE"
            }
        );
    }

    #[test]
    fn test_parse_snapshot_link_ignores_trailing_segments() {
        let link = parse_snapshot_link("https://archive.ph/XYZ12/scr.png").unwrap();
        assert_eq!(link.domain, "archive.ph");
        assert_eq!(link.id, "XYZ12");
    }

    #[test]
    fn test_parse_snapshot_link_without_id_fails() {
        assert!(matches!(
            parse_snapshot_link("https://archive.ph/"),
            Err(Error::UnexpectedLink(_))
        ));
        assert!(matches!(
            parse_snapshot_link("archive.ph"),
            Err(Error::UnexpectedLink(_))
        ));
    }

    #[test]
    fn test_parse_http_date() {
        let date = parse_http_date("Mon, 01 Jan 2024 00:00:00 GMT").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_http_date_when_invalid_fails() {
        assert!(matches!(
            parse_http_date("yesterday"),
            Err(Error::InvalidDate(_))
        ));
    }

    #[test]
    fn test_parse_timemap_without_original_returns_empty() {
        let body = "<https://archive.ph/timegate/https://example.com/>; rel=\"timegate\",\n\
                    <https://archive.ph/20200102030405/https://example.com/>; rel=\"memento\"; datetime=\"Thu, 02 Jan 2020 03:04:05 GMT\"";
        assert!(parse_timemap(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_timemap_of_not_found_page_returns_empty() {
        assert!(parse_timemap("<html><body>No results</body></html>")
            .unwrap()
            .is_empty());
        assert!(parse_timemap("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_timemap_returns_mementos_in_order() {
        let body = "<https://example.com/>; rel=\"original\",\n\
                    <https://archive.ph/AAAAA>; rel=\"first memento\"; datetime=\"Wed, 02 Jan 2013 03:04:05 GMT\",\n\
                    <https://archive.ph/BBBBB>; rel=\"last memento\"; datetime=\"Thu, 02 Jan 2020 03:04:05 GMT\"";

        let mementos = parse_timemap(body).unwrap();

        assert_eq!(
            mementos,
            vec![
                Memento {
                    url: "https://archive.ph/AAAAA".into(),
                    date: Utc.with_ymd_and_hms(2013, 1, 2, 3, 4, 5).unwrap(),
                },
                Memento {
                    url: "https://archive.ph/BBBBB".into(),
                    date: Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_timemap_skips_timegate_and_self_entries() {
        let body = r#"<https://example.com/>; rel="original",
<https://archive.md/timegate/https://example.com/>; rel="timegate",
<https://archive.md/20130102030405/https://example.com/>; rel="first memento"; datetime="Wed, 02 Jan 2013 03:04:05 GMT",
<https://archive.md/20150607080910/https://example.com/>; rel="memento"; datetime="Sun, 07 Jun 2015 08:09:10 GMT",
<https://archive.md/20200102030405/https://example.com/>; rel="last memento"; datetime="Thu, 02 Jan 2020 03:04:05 GMT",
<https://archive.md/timemap/https://example.com/>; rel="self"; type="application/link-format"; from="Wed, 02 Jan 2013 03:04:05 GMT"; until="Thu, 02 Jan 2020 03:04:05 GMT"
"#;

        let mementos = parse_timemap(body).unwrap();

        let urls: Vec<_> = mementos.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://archive.md/20130102030405/https://example.com/",
                "https://archive.md/20150607080910/https://example.com/",
                "https://archive.md/20200102030405/https://example.com/",
            ]
        );
        assert_eq!(mementos[1].date, Utc.with_ymd_and_hms(2015, 6, 7, 8, 9, 10).unwrap());
    }

    #[test]
    fn test_parse_timemap_with_memento_missing_datetime_fails() {
        let body = "<https://example.com/>; rel=\"original\",\n<https://archive.ph/AAAAA>; rel=\"memento\"";
        assert!(matches!(
            parse_timemap(body),
            Err(Error::MalformedTimemap(_))
        ));
    }

    #[test]
    fn test_parse_timemap_keeps_semicolons_in_urls() {
        let body = "<https://example.com/a;jsessionid=1>; rel=\"original\",\n\
                    <https://archive.ph/20200102030405/https://example.com/a;jsessionid=1>; rel=\"memento\"; datetime=\"Thu, 02 Jan 2020 03:04:05 GMT\"";

        let mementos = parse_timemap(body).unwrap();

        assert_eq!(
            mementos,
            vec![Memento {
                url: "https://archive.ph/20200102030405/https://example.com/a;jsessionid=1".into(),
                date: Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap(),
            }]
        );
    }
}
