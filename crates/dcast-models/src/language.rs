//! Target-language parsing and locale mapping.

/// Language used when no targets are configured or requested.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Map a short language tag to the BCP-47 code the TTS service expects.
/// Unknown tags fall back to `{tag}-{TAG}` (e.g. `nl` → `nl-NL`).
pub fn bcp47_code(language: &str) -> String {
    match language {
        "en" => "en-US".to_string(),
        "es" => "es-ES".to_string(),
        "fr" => "fr-FR".to_string(),
        "de" => "de-DE".to_string(),
        "hi" => "hi-IN".to_string(),
        "it" => "it-IT".to_string(),
        "ja" => "ja-JP".to_string(),
        "ko" => "ko-KR".to_string(),
        "pt" => "pt-BR".to_string(),
        other => format!("{}-{}", other, other.to_uppercase()),
    }
}

/// Normalize a requested language list: lowercase, trim, drop empties,
/// dedupe preserving first occurrence. `None` or an empty result falls back
/// to `configured` (itself normalized), and finally to `["en"]`.
pub fn parse_target_languages(
    requested: Option<&[String]>,
    configured: Option<&str>,
) -> Vec<String> {
    if let Some(langs) = requested {
        let normalized = normalize(langs.iter().map(String::as_str));
        if !normalized.is_empty() {
            return normalized;
        }
    }
    if let Some(raw) = configured {
        let normalized = normalize(raw.split(','));
        if !normalized.is_empty() {
            return normalized;
        }
    }
    vec![DEFAULT_LANGUAGE.to_string()]
}

fn normalize<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        let lang = item.trim().to_lowercase();
        if lang.is_empty() || seen.contains(&lang) {
            continue;
        }
        seen.push(lang);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_english() {
        assert_eq!(parse_target_languages(None, None), vec!["en"]);
        assert_eq!(parse_target_languages(Some(&[]), Some("  ")), vec!["en"]);
    }

    #[test]
    fn test_request_wins_over_config() {
        let requested = vec!["ES".to_string(), "fr".to_string()];
        let langs = parse_target_languages(Some(&requested), Some("de,ja"));
        assert_eq!(langs, vec!["es", "fr"]);
    }

    #[test]
    fn test_config_fallback_dedupes() {
        let langs = parse_target_languages(None, Some("en, ES,en, ,es"));
        assert_eq!(langs, vec!["en", "es"]);
    }

    #[test]
    fn test_bcp47_known_and_fallback() {
        assert_eq!(bcp47_code("en"), "en-US");
        assert_eq!(bcp47_code("pt"), "pt-BR");
        assert_eq!(bcp47_code("nl"), "nl-NL");
    }
}
