//! Locale identifier to translation-service code lookup
//!
//! Xcode names bundles after its own locale identifiers (`zh-Hans`, `pt-BR`,
//! `es-419`); Google Translate expects its own codes (`zh-CN`, `pt`, `es`).
//! Lookups are explicit so the service never guesses a language.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::config::LanguageOverride;

/// `(xcode locale, service code, display name)`
const BUILTIN_LANGUAGES: &[(&str, &str, &str)] = &[
    ("af", "af", "Afrikaans"),
    ("sq", "sq", "Albanian"),
    ("am", "am", "Amharic"),
    ("ar", "ar", "Arabic"),
    ("hy", "hy", "Armenian"),
    ("az", "az", "Azerbaijani"),
    ("eu", "eu", "Basque"),
    ("be", "be", "Belarusian"),
    ("bn", "bn", "Bengali"),
    ("bs", "bs", "Bosnian"),
    ("bg", "bg", "Bulgarian"),
    ("ca", "ca", "Catalan"),
    ("ceb", "ceb", "Cebuano"),
    ("ny", "ny", "Chichewa"),
    ("zh-Hans", "zh-CN", "Chinese (Simplified)"),
    ("zh-Hant", "zh-TW", "Chinese (Traditional)"),
    ("co", "co", "Corsican"),
    ("hr", "hr", "Croatian"),
    ("cs", "cs", "Czech"),
    ("da", "da", "Danish"),
    ("nl", "nl", "Dutch"),
    ("en", "en", "English"),
    ("eo", "eo", "Esperanto"),
    ("et", "et", "Estonian"),
    ("tl", "tl", "Filipino"),
    ("fi", "fi", "Finnish"),
    ("fr", "fr", "French"),
    ("fy", "fy", "Frisian"),
    ("gl", "gl", "Galician"),
    ("ka", "ka", "Georgian"),
    ("de", "de", "German"),
    ("el", "el", "Greek"),
    ("gu", "gu", "Gujarati"),
    ("ht", "ht", "Haitian Creole"),
    ("ha", "ha", "Hausa"),
    ("haw", "haw", "Hawaiian"),
    ("he", "he", "Hebrew"),
    ("iw", "iw", "Hebrew (legacy code)"),
    ("hi", "hi", "Hindi"),
    ("hmn", "hmn", "Hmong"),
    ("hu", "hu", "Hungarian"),
    ("is", "is", "Icelandic"),
    ("ig", "ig", "Igbo"),
    ("id", "id", "Indonesian"),
    ("ga", "ga", "Irish"),
    ("it", "it", "Italian"),
    ("ja", "ja", "Japanese"),
    ("jw", "jw", "Javanese"),
    ("kn", "kn", "Kannada"),
    ("kk", "kk", "Kazakh"),
    ("km", "km", "Khmer"),
    ("ko", "ko", "Korean"),
    ("ku", "ku", "Kurdish"),
    ("ky", "ky", "Kyrgyz"),
    ("lo", "lo", "Lao"),
    ("la", "la", "Latin"),
    ("lv", "lv", "Latvian"),
    ("lt", "lt", "Lithuanian"),
    ("lb", "lb", "Luxembourgish"),
    ("mk", "mk", "Macedonian"),
    ("mg", "mg", "Malagasy"),
    ("ms", "ms", "Malay"),
    ("ml", "ml", "Malayalam"),
    ("mt", "mt", "Maltese"),
    ("mi", "mi", "Maori"),
    ("mr", "mr", "Marathi"),
    ("mn", "mn", "Mongolian"),
    ("my", "my", "Myanmar"),
    ("ne", "ne", "Nepali"),
    ("no", "no", "Norwegian"),
    ("nb", "no", "Norwegian Bokmål"),
    ("or", "or", "Odia"),
    ("ps", "ps", "Pashto"),
    ("fa", "fa", "Persian"),
    ("pl", "pl", "Polish"),
    ("pt", "pt", "Portuguese"),
    ("pt-BR", "pt", "Portuguese (Brazil)"),
    ("pt-PT", "pt", "Portuguese (Portugal)"),
    ("pa", "pa", "Punjabi"),
    ("ro", "ro", "Romanian"),
    ("ru", "ru", "Russian"),
    ("sm", "sm", "Samoan"),
    ("gd", "gd", "Scots Gaelic"),
    ("sr", "sr", "Serbian"),
    ("st", "st", "Sesotho"),
    ("sn", "sn", "Shona"),
    ("sd", "sd", "Sindhi"),
    ("si", "si", "Sinhala"),
    ("sk", "sk", "Slovak"),
    ("sl", "sl", "Slovenian"),
    ("so", "so", "Somali"),
    ("es", "es", "Spanish"),
    ("es-419", "es", "Spanish (Latin America)"),
    ("es-US", "es", "Spanish (US)"),
    ("es-MX", "es", "Spanish (Mexico)"),
    ("su", "su", "Sundanese"),
    ("sw", "sw", "Swahili"),
    ("sv", "sv", "Swedish"),
    ("tg", "tg", "Tajik"),
    ("ta", "ta", "Tamil"),
    ("te", "te", "Telugu"),
    ("th", "th", "Thai"),
    ("tr", "tr", "Turkish"),
    ("uk", "uk", "Ukrainian"),
    ("ur", "ur", "Urdu"),
    ("ug", "ug", "Uyghur"),
    ("uz", "uz", "Uzbek"),
    ("vi", "vi", "Vietnamese"),
    ("cy", "cy", "Welsh"),
    ("xh", "xh", "Xhosa"),
    ("yi", "yi", "Yiddish"),
    ("yo", "yo", "Yoruba"),
    ("zu", "zu", "Zulu"),
];

/// One supported locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageEntry {
    pub locale: String,
    pub service_code: String,
    pub name: String,
}

/// Immutable locale catalog, built once and passed around explicitly
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    entries: BTreeMap<String, LanguageEntry>,
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageCatalog {
    /// The built-in table
    pub fn builtin() -> Self {
        Self::with_overrides(&[])
    }

    /// Built-in table extended (or overridden) by configured entries
    pub fn with_overrides(overrides: &[LanguageOverride]) -> Self {
        let mut entries: BTreeMap<String, LanguageEntry> = BUILTIN_LANGUAGES
            .iter()
            .map(|(locale, code, name)| {
                (
                    locale.to_string(),
                    LanguageEntry {
                        locale: locale.to_string(),
                        service_code: code.to_string(),
                        name: name.to_string(),
                    },
                )
            })
            .collect();

        for o in overrides {
            let name = o
                .name
                .clone()
                .or_else(|| entries.get(&o.locale).map(|e| e.name.clone()))
                .unwrap_or_else(|| o.locale.to_uppercase());
            entries.insert(
                o.locale.clone(),
                LanguageEntry {
                    locale: o.locale.clone(),
                    service_code: o.service_code.clone(),
                    name,
                },
            );
        }

        Self { entries }
    }

    /// Service code for a locale, `None` when unsupported
    pub fn lookup(&self, locale: &str) -> Option<&str> {
        self.entries.get(locale).map(|e| e.service_code.as_str())
    }

    pub fn is_supported(&self, locale: &str) -> bool {
        self.entries.contains_key(locale)
    }

    /// Friendly name, or the upper-cased code when unknown
    pub fn display_name(&self, locale: &str) -> String {
        self.entries
            .get(locale)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| locale.to_uppercase())
    }

    /// All entries sorted by locale
    pub fn entries(&self) -> impl Iterator<Item = &LanguageEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_maps_xcode_locales() {
        let catalog = LanguageCatalog::builtin();
        assert_eq!(catalog.lookup("zh-Hans"), Some("zh-CN"));
        assert_eq!(catalog.lookup("zh-Hant"), Some("zh-TW"));
        assert_eq!(catalog.lookup("pt-BR"), Some("pt"));
        assert_eq!(catalog.lookup("nb"), Some("no"));
        assert_eq!(catalog.lookup("de"), Some("de"));
        assert_eq!(catalog.lookup("tlh"), None);
        assert!(catalog.len() > 100);
    }

    #[test]
    fn test_display_name_falls_back_to_code() {
        let catalog = LanguageCatalog::builtin();
        assert_eq!(catalog.display_name("es-419"), "Spanish (Latin America)");
        assert_eq!(catalog.display_name("tlh"), "TLH");
    }

    #[test]
    fn test_overrides_extend_and_replace() {
        let catalog = LanguageCatalog::with_overrides(&[
            LanguageOverride {
                locale: "en-GB".to_string(),
                service_code: "en".to_string(),
                name: None,
            },
            LanguageOverride {
                locale: "pt-PT".to_string(),
                service_code: "pt-PT".to_string(),
                name: None,
            },
        ]);

        assert_eq!(catalog.lookup("en-GB"), Some("en"));
        assert_eq!(catalog.display_name("en-GB"), "EN-GB");
        assert_eq!(catalog.lookup("pt-PT"), Some("pt-PT"));
        assert_eq!(catalog.display_name("pt-PT"), "Portuguese (Portugal)");
    }

    #[test]
    fn test_entries_are_sorted() {
        let catalog = LanguageCatalog::builtin();
        let locales: Vec<&str> = catalog.entries().map(|e| e.locale.as_str()).collect();
        let mut sorted = locales.clone();
        sorted.sort();
        assert_eq!(locales, sorted);
    }
}
