// src/common/i18n.rs

use anyhow::Context;
use std::collections::HashMap;

pub const DEFAULT_LANGUAGE: &str = "en";

const CATALOGUE: &str = include_str!("../../locales/messages.json");

/// Message catalogue: language -> key -> template with `{param}` placeholders.
#[derive(Debug, Clone)]
pub struct I18nStore {
    messages: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_json(CATALOGUE)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let messages: HashMap<String, HashMap<String, String>> =
            serde_json::from_str(raw).context("invalid message catalogue")?;

        if !messages.contains_key(DEFAULT_LANGUAGE) {
            anyhow::bail!("message catalogue has no '{}' section", DEFAULT_LANGUAGE);
        }

        Ok(Self { messages })
    }

    /// Unknown languages fall back to English, unknown keys to the key itself.
    pub fn translate(&self, lang: &str, key: &str, params: &[(&str, String)]) -> String {
        let template = self
            .messages
            .get(lang)
            .and_then(|m| m.get(key))
            .or_else(|| self.messages.get(DEFAULT_LANGUAGE).and_then(|m| m.get(key)));

        let Some(template) = template else {
            return key.to_string();
        };

        params.iter().fold(template.clone(), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalogue_loads_and_languages_share_keys() {
        let store = I18nStore::load().unwrap();
        let en = &store.messages["en"];
        let af = &store.messages["af"];
        for key in en.keys() {
            assert!(af.contains_key(key), "missing af translation for {key}");
        }
    }

    #[test]
    fn substitutes_params() {
        let store = I18nStore::load().unwrap();
        let text = store.translate("en", "stock_insufficient", &[("available", "70".into())]);
        assert_eq!(text, "Only 70 available.");
    }

    #[test]
    fn falls_back_to_english_then_to_key() {
        let store = I18nStore::from_json(r#"{"en": {"hello": "Hello"}, "af": {}}"#).unwrap();
        assert_eq!(store.translate("af", "hello", &[]), "Hello");
        assert_eq!(store.translate("fr", "hello", &[]), "Hello");
        assert_eq!(store.translate("en", "missing", &[]), "missing");
    }

    #[test]
    fn rejects_catalogue_without_english() {
        assert!(I18nStore::from_json(r#"{"af": {}}"#).is_err());
    }
}
