// ABOUTME: Two-tier query classifier routing user messages to a response category
// ABOUTME: Keyword fast path first, LLM classification second, GENERAL on any failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Query Classification
//!
//! ```text
//! fast tier enabled?  specific product / availability+keyword / search word -> PRODUCT
//!                     contact keyword                                       -> CONTACT
//!                     company keyword                                       -> COMPANY_INFO
//! llm tier enabled?   provider.classify_query(query)
//! otherwise           GENERAL
//! ```
//!
//! Matching is case-insensitive substring containment. There is no
//! tokenization or word-boundary check, so a short keyword inside a longer
//! unrelated word still matches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::constants::cache::CLASSIFICATION_SETTINGS_TTL_SECS;
use crate::errors::{AppError, AppResult};
use crate::llm::ProviderResolver;
use crate::models::QueryCategory;
use crate::store::SettingsStore;

/// Keyword lists and tier switches for the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationSettings {
    /// Run the keyword tier
    pub enable_fast_classification: bool,
    /// Fall through to the LLM tier
    pub enable_llm_classification: bool,
    /// Generic product words ("price", "stock")
    pub product_keywords: BTreeSet<String>,
    /// Contact intent words ("manager", "call me")
    pub contact_keywords: BTreeSet<String>,
    /// Company questions ("address", "about you")
    pub company_keywords: BTreeSet<String>,
    /// Availability phrasing ("do you have", "in stock")
    pub availability_phrases: BTreeSet<String>,
    /// Explicit search verbs ("looking for", "find")
    pub search_words: BTreeSet<String>,
    /// Concrete product names ("bolt", "drill bit")
    pub specific_products: BTreeSet<String>,
}

fn keyword_set(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|w| (*w).to_owned()).collect()
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            enable_fast_classification: true,
            enable_llm_classification: true,
            product_keywords: keyword_set(&[
                "product", "price", "cost", "buy", "order", "catalog", "article", "stock",
            ]),
            contact_keywords: keyword_set(&[
                "contact", "manager", "call me", "phone", "email", "callback", "reach you",
            ]),
            company_keywords: keyword_set(&[
                "about you", "your company", "address", "office", "working hours", "history",
            ]),
            availability_phrases: keyword_set(&[
                "do you have", "is there", "in stock", "available", "can i get",
            ]),
            search_words: keyword_set(&["looking for", "searching for", "need to find", "find me"]),
            specific_products: keyword_set(&[
                "bolt", "nut", "screw", "washer", "anchor", "drill", "bearing", "fastener",
            ]),
        }
    }
}

impl ClassificationSettings {
    /// Normalize every keyword (trim, lowercase) and reject blank ones
    ///
    /// # Errors
    ///
    /// Returns an error naming the list that contains a blank keyword.
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            enable_fast_classification: self.enable_fast_classification,
            enable_llm_classification: self.enable_llm_classification,
            product_keywords: normalize("product_keywords", self.product_keywords)?,
            contact_keywords: normalize("contact_keywords", self.contact_keywords)?,
            company_keywords: normalize("company_keywords", self.company_keywords)?,
            availability_phrases: normalize("availability_phrases", self.availability_phrases)?,
            search_words: normalize("search_words", self.search_words)?,
            specific_products: normalize("specific_products", self.specific_products)?,
        })
    }
}

fn normalize(list: &str, words: BTreeSet<String>) -> AppResult<BTreeSet<String>> {
    words
        .into_iter()
        .map(|w| {
            let normalized = w.trim().to_lowercase();
            if normalized.is_empty() {
                Err(AppError::invalid_input(format!("{list} contains a blank keyword")))
            } else {
                Ok(normalized)
            }
        })
        .collect()
}

fn contains_any(haystack: &str, keywords: &BTreeSet<String>) -> bool {
    keywords.iter().any(|k| {
        let k = k.trim().to_lowercase();
        !k.is_empty() && haystack.contains(&k)
    })
}

fn matches_product(query: &str, settings: &ClassificationSettings) -> bool {
    if contains_any(query, &settings.specific_products) {
        return true;
    }
    // availability + specific product is subsumed by the check above
    if contains_any(query, &settings.availability_phrases)
        && contains_any(query, &settings.product_keywords)
    {
        return true;
    }
    contains_any(query, &settings.search_words)
}

/// Keyword tier on its own; `None` means "no keyword decided"
#[must_use]
pub fn fast_classify(query: &str, settings: &ClassificationSettings) -> Option<QueryCategory> {
    let query = query.to_lowercase();
    if matches_product(&query, settings) {
        Some(QueryCategory::Product)
    } else if contains_any(&query, &settings.contact_keywords) {
        Some(QueryCategory::Contact)
    } else if contains_any(&query, &settings.company_keywords) {
        Some(QueryCategory::CompanyInfo)
    } else {
        None
    }
}

struct CachedSettings {
    settings: Arc<ClassificationSettings>,
    loaded_at: Instant,
}

/// Two-tier classifier with a TTL cache over the active settings
pub struct QueryClassifier {
    resolver: Arc<dyn ProviderResolver>,
    ttl: Duration,
    cache: RwLock<Option<CachedSettings>>,
}

impl QueryClassifier {
    /// Create a classifier with the default settings TTL
    #[must_use]
    pub fn new(resolver: Arc<dyn ProviderResolver>) -> Self {
        Self::with_ttl(resolver, Duration::from_secs(CLASSIFICATION_SETTINGS_TTL_SECS))
    }

    /// Create a classifier with an explicit settings TTL
    #[must_use]
    pub fn with_ttl(resolver: Arc<dyn ProviderResolver>, ttl: Duration) -> Self {
        Self {
            resolver,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Active settings, served from cache while fresh
    ///
    /// Defaults apply when the store holds no version.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds invalid settings.
    pub async fn settings(&self, store: &dyn SettingsStore) -> AppResult<Arc<ClassificationSettings>> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.settings));
            }
        }

        let settings = match store.active_classification_settings().await? {
            Some(stored) => stored.validate()?,
            None => {
                debug!("No classification settings stored, using defaults");
                ClassificationSettings::default()
            }
        };
        let settings = Arc::new(settings);
        *self.cache.write().await = Some(CachedSettings {
            settings: Arc::clone(&settings),
            loaded_at: Instant::now(),
        });
        Ok(settings)
    }

    /// Classify a query; never fails
    #[instrument(skip(self, query, store), fields(query_len = query.len()))]
    pub async fn classify(&self, query: &str, store: &dyn SettingsStore) -> QueryCategory {
        let settings = match self.settings(store).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Classification settings unavailable, using GENERAL: {e}");
                return QueryCategory::General;
            }
        };

        if settings.enable_fast_classification {
            if let Some(category) = fast_classify(query, &settings) {
                debug!(%category, tier = "fast", "Query classified");
                return category;
            }
        }

        if settings.enable_llm_classification {
            let provider = match self.resolver.active_provider(store).await {
                Ok(provider) => provider,
                Err(e) => {
                    warn!("No provider for classification, using GENERAL: {e}");
                    return QueryCategory::General;
                }
            };
            return match provider.classify_query(query).await {
                Ok(category) => {
                    debug!(%category, tier = "llm", provider = provider.name(), "Query classified");
                    category
                }
                Err(e) => {
                    warn!("LLM classification failed, using GENERAL: {e}");
                    QueryCategory::General
                }
            };
        }

        QueryCategory::General
    }

    /// Validate, persist as the new active version, and drop the cached copy
    ///
    /// # Errors
    ///
    /// Returns an error if validation or the store write fails.
    pub async fn update_settings(
        &self,
        settings: ClassificationSettings,
        store: &dyn SettingsStore,
    ) -> AppResult<u32> {
        let settings = settings.validate()?;
        let version = store.save_classification_settings(&settings).await?;
        self.invalidate_cache().await;
        info!(version, "Classification settings updated");
        Ok(version)
    }

    /// Force the next classification to reload settings
    pub async fn invalidate_cache(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ClassificationSettings {
        ClassificationSettings::default()
    }

    #[test]
    fn test_specific_product_wins() {
        assert_eq!(
            fast_classify("Do you have a 12mm BOLT?", &settings()),
            Some(QueryCategory::Product)
        );
    }

    #[test]
    fn test_availability_needs_product_keyword() {
        let s = settings();
        assert_eq!(fast_classify("is there a discount price?", &s), Some(QueryCategory::Product));
        assert_eq!(fast_classify("is there anyone here", &s), None);
    }

    #[test]
    fn test_product_beats_contact() {
        assert_eq!(
            fast_classify("manager, I am looking for washers", &settings()),
            Some(QueryCategory::Product)
        );
    }

    #[test]
    fn test_contact_then_company() {
        let s = settings();
        assert_eq!(fast_classify("please call me back", &s), Some(QueryCategory::Contact));
        assert_eq!(fast_classify("what is your address", &s), Some(QueryCategory::CompanyInfo));
        assert_eq!(fast_classify("hello", &s), None);
    }

    #[test]
    fn test_substring_matching_has_no_word_boundary() {
        // "nut" inside "minute"
        assert_eq!(
            fast_classify("give me a minute", &settings()),
            Some(QueryCategory::Product)
        );
    }

    #[test]
    fn test_validate_normalizes_and_rejects_blank() {
        let mut s = settings();
        s.specific_products.insert("  Hex KEY ".to_owned());
        let s = s.validate().unwrap();
        assert!(s.specific_products.contains("hex key"));

        let mut bad = settings();
        bad.contact_keywords.insert("   ".to_owned());
        assert!(bad.validate().is_err());
    }
}
