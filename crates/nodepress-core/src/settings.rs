//! Site-wide settings, stored as a single document.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::document::DocumentStore;
use crate::error::SettingsError;
use crate::validation::{ValidationErrors, trimmed};

const SETTINGS_KEY: &str = "settings/site";

const DEFAULT_TITLE: &str = "Site Title";
const DEFAULT_FAVICON: &str = "favicon.png";

fn default_title() -> String {
    DEFAULT_TITLE.to_owned()
}

fn default_favicon() -> String {
    DEFAULT_FAVICON.to_owned()
}

fn default_copyright(title: &str) -> String {
    format!("&copy; {} {title} | All rights reserved", Utc::now().year())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_favicon")]
    pub favicon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Filled from the title when left blank.
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub landing_page: bool,
    #[serde(default)]
    pub enable_membership: bool,
    #[serde(default)]
    pub is_site_down: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: None,
            keywords: Vec::new(),
            favicon: default_favicon(),
            banner: None,
            copyright: default_copyright(DEFAULT_TITLE),
            landing_page: false,
            enable_membership: false,
            is_site_down: false,
        }
    }
}

impl Settings {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns the failing fields keyed by their wire names.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", &self.title, 100);
        errors.optional_text("description", self.description.as_deref(), 150);
        errors.text_list("keywords", &self.keywords, 50);
        errors.require_text("favicon", &self.favicon, 50);
        errors.optional_text("banner", self.banner.as_deref(), 50);
        errors.require_text("copyright", &self.copyright, 150);
        errors.into_result()
    }

    fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_owned();
        self.description = trimmed(self.description);
        self.keywords = self.keywords.iter().map(|k| k.trim().to_owned()).collect();
        self.favicon = self.favicon.trim().to_owned();
        self.banner = trimmed(self.banner);
        self.copyright = self.copyright.trim().to_owned();
        if self.copyright.is_empty() {
            self.copyright = default_copyright(&self.title);
        }
        self
    }
}

/// Reads and writes the settings document.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    docs: Arc<DocumentStore>,
}

fn invalid(message: impl Into<String>) -> SettingsError {
    let mut errors = ValidationErrors::new();
    errors.add("settings", message);
    SettingsError::Invalid(errors)
}

impl SettingsStore {
    #[must_use]
    pub fn new(docs: Arc<DocumentStore>) -> Self {
        Self { docs }
    }

    /// The stored settings, if the site has been configured.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Store`] if storage fails.
    pub async fn get(&self) -> Result<Option<Settings>, SettingsError> {
        let stored: Option<Settings> = self.docs.get_singleton(SETTINGS_KEY).await?;
        Ok(stored.map(Settings::normalized))
    }

    /// The stored settings, or the defaults when none are stored.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Store`] if storage fails.
    pub async fn get_or_default(&self) -> Result<Settings, SettingsError> {
        Ok(self.get().await?.unwrap_or_default())
    }

    /// Whether settings have ever been saved.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Store`] if storage fails.
    pub async fn is_configured(&self) -> Result<bool, SettingsError> {
        Ok(self.docs.singleton_exists(SETTINGS_KEY).await?)
    }

    /// Merge `patch` over the stored settings, validate, and save.
    ///
    /// Top-level keys in `patch` replace stored values; a `null` value
    /// resets the field to its default. Nothing is written if validation
    /// fails.
    ///
    /// # Errors
    ///
    /// - [`SettingsError::Invalid`] if the patch is not an object, has
    ///   mistyped fields, or the result fails validation.
    /// - [`SettingsError::Store`] if storage fails.
    pub async fn update(&self, patch: Value) -> Result<Settings, SettingsError> {
        let Value::Object(patch) = patch else {
            return Err(invalid("settings must be a JSON object"));
        };

        let mut merged = match self.docs.get_singleton::<Value>(SETTINGS_KEY).await? {
            Some(Value::Object(stored)) => stored,
            _ => Map::new(),
        };
        for (key, value) in patch {
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }

        let settings: Settings =
            serde_json::from_value(Value::Object(merged)).map_err(|e| invalid(e.to_string()))?;
        let settings = settings.normalized();
        settings.validate().map_err(SettingsError::Invalid)?;

        self.docs.put_singleton(SETTINGS_KEY, &settings).await?;
        info!(title = %settings.title, "site settings updated");
        Ok(settings)
    }
}
