//! Verifier Configuration
//!
//! Every pipeline call receives an explicit, immutable [`SspConfig`].
//! All replaying parties must hold identical configuration for their
//! signatures to be comparable; [`SspConfig::config_hash`] fingerprints it.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::{DomainHasher, Digest32};
use crate::engine::admissibility::{PostureClass, TimeClass, is_valid_label};
use crate::trace::signature::SignatureAlgorithm;

/// Default number of layer passes.
pub const DEFAULT_HORIZON_STEPS: u32 = 128;

/// Declared upper bound on layer passes.
pub const MAX_HORIZON_STEPS: u32 = 4096;

/// Default engine tag written into evidence.
pub const DEFAULT_ENGINE_TAG: &str = "SSP_VERIFIER__V03";

/// Modulus bound into the structural-time binding payload.
pub const DEFAULT_POSTURE_MODULUS: u64 = 1_000_003;

/// Configuration constants in force for a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SspConfig {
    /// Digest used for trace signatures and manifests.
    pub signature_algorithm: SignatureAlgorithm,

    /// Number of layer passes before forced termination.
    pub horizon_steps: u32,

    /// Posture classes the gate admits.
    pub admissible_postures: BTreeSet<PostureClass>,

    /// Structural-time classes the gate admits.
    pub admissible_time_classes: BTreeSet<TimeClass>,

    /// Engine identifier written into evidence folders.
    pub engine_tag: String,

    /// Constant mixed into the structural binding payload.
    pub posture_modulus: u64,
}

impl Default for SspConfig {
    fn default() -> Self {
        Self {
            signature_algorithm: SignatureAlgorithm::Sha256,
            horizon_steps: DEFAULT_HORIZON_STEPS,
            admissible_postures: ["P0", "P1"].into_iter().map(PostureClass::new).collect(),
            admissible_time_classes: ["T0", "T1"].into_iter().map(TimeClass::new).collect(),
            engine_tag: DEFAULT_ENGINE_TAG.to_string(),
            posture_modulus: DEFAULT_POSTURE_MODULUS,
        }
    }
}

impl SspConfig {
    /// Set the layer-pass bound.
    pub fn with_horizon_steps(mut self, horizon_steps: u32) -> Self {
        self.horizon_steps = horizon_steps;
        self
    }

    /// Replace the admissible posture set.
    pub fn with_admissible_postures<I, S>(mut self, postures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admissible_postures = postures.into_iter().map(PostureClass::new).collect();
        self
    }

    /// Replace the admissible structural-time set.
    pub fn with_admissible_time_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admissible_time_classes = classes.into_iter().map(TimeClass::new).collect();
        self
    }

    /// Check every constant against its declared domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon_steps == 0 || self.horizon_steps > MAX_HORIZON_STEPS {
            return Err(ConfigError::HorizonOutOfRange {
                got: self.horizon_steps,
                max: MAX_HORIZON_STEPS,
            });
        }
        if self.admissible_postures.is_empty() {
            return Err(ConfigError::EmptyPostureSet);
        }
        if self.admissible_time_classes.is_empty() {
            return Err(ConfigError::EmptyTimeClassSet);
        }
        let labels = self.admissible_postures.iter().map(PostureClass::as_str)
            .chain(self.admissible_time_classes.iter().map(TimeClass::as_str));
        for label in labels {
            if !is_valid_label(label) {
                return Err(ConfigError::InvalidLabel(label.to_string()));
            }
        }
        if !is_valid_label(&self.engine_tag) {
            return Err(ConfigError::InvalidEngineTag(self.engine_tag.clone()));
        }
        if self.posture_modulus == 0 {
            return Err(ConfigError::ZeroModulus);
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Render the constants block of `SSP_CONFIG.txt`.
    ///
    /// Sets are rendered in `BTreeSet` order, so the text is canonical.
    pub fn render_constants(&self) -> String {
        let postures: Vec<&str> = self.admissible_postures.iter().map(PostureClass::as_str).collect();
        let times: Vec<&str> = self.admissible_time_classes.iter().map(TimeClass::as_str).collect();
        format!(
            "signature_algorithm={}\n\
             horizon_steps={}\n\
             admissible_postures={}\n\
             admissible_time_classes={}\n\
             posture_modulus={}\n",
            self.signature_algorithm.identifier(),
            self.horizon_steps,
            postures.join(","),
            times.join(","),
            self.posture_modulus,
        )
    }

    /// Fingerprint of the configuration in force.
    pub fn config_hash(&self) -> Digest32 {
        let mut hasher = DomainHasher::for_config();
        hasher.update_prefixed(self.engine_tag.as_bytes());
        hasher.update_prefixed(self.render_constants().as_bytes());
        hasher.finalize()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Horizon outside `1..=MAX_HORIZON_STEPS`.
    #[error("horizon_steps {got} outside 1..={max}")]
    HorizonOutOfRange {
        /// Configured value.
        got: u32,
        /// Declared bound.
        max: u32,
    },

    /// No admissible posture declared.
    #[error("admissible posture set is empty")]
    EmptyPostureSet,

    /// No admissible structural-time class declared.
    #[error("admissible time class set is empty")]
    EmptyTimeClassSet,

    /// Label outside the class grammar.
    #[error("invalid class label {0:?}")]
    InvalidLabel(String),

    /// Engine tag outside the label grammar.
    #[error("invalid engine tag {0:?}")]
    InvalidEngineTag(String),

    /// Binding modulus of zero.
    #[error("posture_modulus must be non-zero")]
    ZeroModulus,

    /// JSON could not be parsed or produced.
    #[error("config parse error: {0}")]
    Parse(String),

    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
