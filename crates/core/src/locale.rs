//! Locale catalog: the languages and regional dialects a learner can pick.
//!
//! The catalog is owned by the remote tutor service and treated as static
//! for the lifetime of a session, so the first successful fetch is cached
//! and reused. When the fetch fails the caller falls back to a hardcoded
//! French catalog rather than blocking the user.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::api::TutorApi;
use crate::error::SessionError;

/// Locale used when the catalog cannot be fetched or no choice is made.
pub const FALLBACK_LOCALE: &str = "fr-FR";

/// One regional variant of a language (e.g. `fr-CA` for Canadian French).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocaleVariant {
    /// Unique locale identifier, a language-region pair like `fr-FR`.
    pub code: String,
    pub country: String,
    pub flag: String,
    /// At most one variant per language is marked default.
    #[serde(default)]
    pub is_default: bool,
}

/// A learnable language with its regional variants. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language {
    pub code: String,
    pub name: String,
    pub native_name: String,
    pub variants: Vec<LocaleVariant>,
}

impl Language {
    /// Returns the variant marked default, or the first one when none is.
    pub fn default_variant(&self) -> Option<&LocaleVariant> {
        self.variants
            .iter()
            .find(|v| v.is_default)
            .or_else(|| self.variants.first())
    }
}

/// Finds the language and variant matching a locale code such as `fr-CA`.
pub fn resolve_locale<'a>(
    languages: &'a [Language],
    locale: &str,
) -> Option<(&'a Language, &'a LocaleVariant)> {
    languages.iter().find_map(|lang| {
        lang.variants
            .iter()
            .find(|v| v.code == locale)
            .map(|v| (lang, v))
    })
}

/// Hardcoded catalog used when the remote fetch fails.
pub fn fallback_languages() -> Vec<Language> {
    fn variant(code: &str, country: &str, flag: &str, is_default: bool) -> LocaleVariant {
        LocaleVariant {
            code: code.to_string(),
            country: country.to_string(),
            flag: flag.to_string(),
            is_default,
        }
    }

    vec![Language {
        code: "fr".to_string(),
        name: "French".to_string(),
        native_name: "Français".to_string(),
        variants: vec![
            variant("fr-FR", "France", "🇫🇷", true),
            variant("fr-BE", "Belgium", "🇧🇪", false),
            variant("fr-CH", "Switzerland", "🇨🇭", false),
            variant("fr-CA", "Canada", "🇨🇦", false),
        ],
    }]
}

/// Fetches the locale catalog once and caches it for the session.
///
/// Safe to call repeatedly; concurrent callers share the single fetch.
pub struct LocaleCatalog {
    api: Arc<dyn TutorApi>,
    cache: OnceCell<Vec<Language>>,
}

impl LocaleCatalog {
    pub fn new(api: Arc<dyn TutorApi>) -> Self {
        Self {
            api,
            cache: OnceCell::new(),
        }
    }

    /// Returns the catalog, fetching it lazily on first use.
    pub async fn languages(&self) -> Result<&[Language], SessionError> {
        let languages = self
            .cache
            .get_or_try_init(|| async {
                debug!("fetching locale catalog");
                self.api.fetch_locales().await
            })
            .await
            .map_err(SessionError::Catalog)?;
        Ok(languages.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockTutorApi};
    use reqwest::StatusCode;

    #[test]
    fn fallback_catalog_has_a_single_default_variant() {
        let languages = fallback_languages();
        assert_eq!(languages.len(), 1);
        let french = &languages[0];
        assert_eq!(french.code, "fr");
        let defaults: Vec<_> = french.variants.iter().filter(|v| v.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].code, FALLBACK_LOCALE);
    }

    #[test]
    fn default_variant_falls_back_to_first() {
        let mut language = fallback_languages().remove(0);
        assert_eq!(language.default_variant().unwrap().code, "fr-FR");

        for v in &mut language.variants {
            v.is_default = false;
        }
        assert_eq!(language.default_variant().unwrap().code, "fr-FR");

        language.variants.clear();
        assert!(language.default_variant().is_none());
    }

    #[test]
    fn resolve_locale_finds_language_and_variant() {
        let languages = fallback_languages();
        let (lang, variant) = resolve_locale(&languages, "fr-CA").unwrap();
        assert_eq!(lang.name, "French");
        assert_eq!(variant.country, "Canada");
        assert!(resolve_locale(&languages, "xx-XX").is_none());
    }

    #[tokio::test]
    async fn catalog_fetches_once_and_caches() {
        let mut api = MockTutorApi::new();
        api.expect_fetch_locales()
            .times(1)
            .returning(|| Ok(fallback_languages()));

        let catalog = LocaleCatalog::new(Arc::new(api));
        let first = catalog.languages().await.unwrap().to_vec();
        let second = catalog.languages().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn catalog_failure_maps_to_catalog_error() {
        let mut api = MockTutorApi::new();
        api.expect_fetch_locales().returning(|| {
            Err(ApiError::Status {
                status: StatusCode::BAD_GATEWAY,
                message: "upstream down".to_string(),
            })
        });

        let catalog = LocaleCatalog::new(Arc::new(api));
        let err = catalog.languages().await.unwrap_err();
        assert!(matches!(err, SessionError::Catalog(_)));
    }

    #[test]
    fn language_deserializes_from_catalog_json() {
        let json = r#"{
            "code": "es",
            "name": "Spanish",
            "native_name": "Español",
            "variants": [
                {"code": "es-MX", "country": "Mexico", "flag": "🇲🇽", "is_default": true},
                {"code": "es-ES", "country": "Spain", "flag": "🇪🇸"}
            ]
        }"#;
        let language: Language = serde_json::from_str(json).unwrap();
        assert_eq!(language.variants.len(), 2);
        assert!(language.variants[0].is_default);
        assert!(!language.variants[1].is_default);
    }
}
