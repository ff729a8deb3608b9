//! Initial language selection

use crate::types::Language;

/// Language every tour is expected to ship
pub const FALLBACK_LANGUAGE: &str = "en";

/// Pick the language to load a tour in
///
/// Order of preference:
/// 1. The language the user explicitly saved
/// 2. The device locale's primary subtag (`"cs-CZ"` → `"cs"`)
/// 3. English
/// 4. The first available language
///
/// Returns `None` only when `available` is empty.
pub fn choose_language<'a>(
    available: &'a [Language],
    saved_code: Option<&str>,
    device_locale: Option<&str>,
) -> Option<&'a Language> {
    let find = |code: &str| available.iter().find(|l| l.code.eq_ignore_ascii_case(code));

    saved_code
        .and_then(find)
        .or_else(|| {
            device_locale
                .and_then(|locale| locale.split(['-', '_']).next())
                .filter(|code| !code.is_empty())
                .and_then(find)
        })
        .or_else(|| find(FALLBACK_LANGUAGE))
        .or_else(|| available.first())
}
