//! OCR engine implementations
//!
//! This module contains implementations of the OcrEngine trait for different
//! OCR backends. Engines are conditionally compiled based on feature flags.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-leptess")]
pub mod leptess;

#[cfg_attr(
    not(any(feature = "engine-ocrs", feature = "engine-leptess")),
    allow(dead_code)
)]
mod download;
pub mod tsv;

use crate::config::EngineConfig;
use crate::engine::OcrEngine;
use crate::error::OcrError;
use std::sync::Arc;

/// Registry of available OCR engines
pub struct EngineRegistry {
    engines: Vec<Arc<dyn OcrEngine>>,
    default_engine: String,
}

impl EngineRegistry {
    /// Create a new engine registry with all available engines initialized
    #[cfg_attr(
        not(any(feature = "engine-ocrs", feature = "engine-leptess")),
        allow(unused_variables, unused_mut)
    )]
    pub fn new(config: &EngineConfig) -> Result<Self, OcrError> {
        let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();

        #[cfg(feature = "engine-ocrs")]
        {
            engines.push(Arc::new(ocrs::OcrsEngine::new(config)?));
        }

        #[cfg(feature = "engine-leptess")]
        {
            tracing::info!("Initializing leptess engine...");
            engines.push(Arc::new(leptess::LeptessEngine::new(config)?));
        }

        Self::from_engines(engines)
    }

    /// Build a registry from already constructed engines. The first one is
    /// the default.
    pub fn from_engines(engines: Vec<Arc<dyn OcrEngine>>) -> Result<Self, OcrError> {
        let default_engine = match engines.first() {
            Some(engine) => engine.name().to_string(),
            None => {
                return Err(OcrError::InitializationError(
                    "No OCR engines available. Build with --features engine-ocrs or --features engine-leptess".to_string()
                ))
            }
        };

        Ok(Self {
            engines,
            default_engine,
        })
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn OcrEngine>> {
        self.engines.iter().find(|e| e.name() == name).cloned()
    }

    /// Get the default engine
    pub fn default(&self) -> Option<Arc<dyn OcrEngine>> {
        self.get(&self.default_engine)
    }

    /// Get the default engine name
    pub fn default_name(&self) -> &str {
        &self.default_engine
    }

    /// List all available engine names
    pub fn list(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Languages in `wanted` that the engine cannot read
    pub fn unsupported_languages(engine: &dyn OcrEngine, wanted: &[String]) -> Vec<String> {
        let supported = engine.supported_languages();
        wanted
            .iter()
            .filter(|lang| !supported.contains(lang))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Recognition;
    use crate::profile::OcrProfile;
    use image::GrayImage;

    struct NamedEngine(&'static str);

    impl OcrEngine for NamedEngine {
        fn name(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "test engine"
        }

        fn recognize(&self, _: &GrayImage, _: &OcrProfile) -> Result<Recognition, OcrError> {
            Ok(Recognition::default())
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["eng".to_string()]
        }
    }

    #[test]
    fn test_first_engine_is_default() {
        let registry = EngineRegistry::from_engines(vec![
            Arc::new(NamedEngine("first")),
            Arc::new(NamedEngine("second")),
        ])
        .unwrap();

        assert_eq!(registry.default_name(), "first");
        assert_eq!(registry.list(), ["first", "second"]);
        assert!(registry.get("second").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_empty_registry_is_an_error() {
        let err = EngineRegistry::from_engines(Vec::new()).err().unwrap();
        assert_eq!(err.code(), "INIT_ERROR");
    }

    #[test]
    fn test_unsupported_languages() {
        let engine = NamedEngine("ocrs");
        let wanted = vec!["jpn".to_string(), "eng".to_string()];
        assert_eq!(
            EngineRegistry::unsupported_languages(&engine, &wanted),
            ["jpn"]
        );
    }
}
