//! Identifier minting for labels the source graph does not know.
//!
//! A minted identifier is a pure function of the label text, so merging the
//! same mapping twice yields the same identifiers.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::entity::EntityId;

fn is_slug_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

/// Strips diacritics: maps `đ`/`Đ` to `d`/`D` (these have no canonical
/// decomposition) and drops combining marks after canonical decomposition.
#[must_use]
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        })
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Turns free text into an identifier-safe token.
///
/// Steps, in order:
/// 1. trim and case fold
/// 2. collapse each internal whitespace run into a single `-`
/// 3. fold diacritics (see [`fold_diacritics`]), so `Đ` becomes `d` and `ẵ` becomes `a`
/// 4. percent-encode whatever is still outside `[A-Za-z0-9._~-]`
///
/// # Examples
///
/// ```
/// use provkg::entity::slugify;
///
/// assert_eq!(slugify("  Đà Nẵng "), "da-nang");
/// assert_eq!(slugify("Hồ Chí Minh"), "ho-chi-minh");
/// ```
#[must_use]
pub fn slugify(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    let hyphenated = lowered.split_whitespace().collect::<Vec<_>>().join("-");

    let mut out = String::with_capacity(hyphenated.len());
    for c in fold_diacritics(&hyphenated).chars() {
        if is_slug_safe(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

/// Mints the identifier for `label` under `namespace`.
#[must_use]
pub fn mint_entity_id(namespace: &str, label: &str) -> EntityId {
    EntityId::new(format!("{namespace}{}", slugify(label)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_vietnamese() {
        assert_eq!(slugify("Đà Nẵng"), "da-nang");
        assert_eq!(slugify("ĐẮK LẮK"), "dak-lak");
        assert_eq!(slugify("Thừa Thiên Huế"), "thua-thien-hue");
    }

    #[test]
    fn test_slugify_collapses_whitespace() {
        assert_eq!(slugify("  Ha \t  Noi  "), "ha-noi");
    }

    #[test]
    fn test_slugify_percent_encodes_unsafe() {
        assert_eq!(slugify("A/B"), "a%2Fb");
        assert_eq!(slugify("x<y>"), "x%3Cy%3E");
    }

    #[test]
    fn test_slugify_is_deterministic() {
        assert_eq!(slugify("Quảng Nam"), slugify("Quảng Nam"));
    }

    #[test]
    fn test_fold_diacritics_keeps_case_and_spacing() {
        assert_eq!(fold_diacritics("Đà Nẵng"), "Da Nang");
        assert_eq!(fold_diacritics("plain"), "plain");
    }

    #[test]
    fn test_mint_entity_id() {
        let id = mint_entity_id("http://example.org/vn/entity/", "Đà Nẵng");
        assert_eq!(id.as_str(), "http://example.org/vn/entity/da-nang");
    }
}
