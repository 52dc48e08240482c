//! patmem configuration management
//!
//! Configuration is consumed, never produced, by the scoring core. Every
//! section deserializes with `#[serde(default)]` so a partial file only
//! overrides what it names.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main patmem configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatmemConfig {
    /// Storage locations
    pub storage: StorageConfig,

    /// Signal calculators feeding the composite score
    pub scoring: ScoringConfig,

    /// Retention and review scheduling
    pub memory: MemoryConfig,

    /// Confidence trackers
    pub confidence: ConfidenceConfig,

    /// Diversity signals
    pub diversity: DiversityConfig,

    /// Promotion selection
    pub promotion: PromotionConfig,

    /// Habit note search and indexing
    pub habits: HabitsConfig,

    /// Near-duplicate detection and consolidation
    pub similarity: SimilarityConfig,

    /// Pattern extraction from archives
    pub patterns: PatternsConfig,
}

impl PatmemConfig {
    /// Load configuration from a TOML, YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("toml")
            .to_ascii_lowercase();

        let config: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
            "json" => serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
            _ => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check ranges and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let bm25 = &self.scoring.bm25;
        if !(1.2..=2.0).contains(&bm25.k1) {
            return Err(Error::Config(format!(
                "scoring.bm25.k1 must be in [1.2, 2.0], got {}",
                bm25.k1
            )));
        }
        if !(0.0..=1.0).contains(&bm25.b) {
            return Err(Error::Config(format!(
                "scoring.bm25.b must be in [0, 1], got {}",
                bm25.b
            )));
        }

        if self.scoring.weights.values().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(Error::Config(
                "scoring.weights must be non-negative".to_string(),
            ));
        }
        let total: f64 = self.scoring.weights.values().sum();
        if !(0.99..=1.01).contains(&total) {
            return Err(Error::Config(format!(
                "scoring.weights must sum to 1.0 (+/-0.01), got {:.4}",
                total
            )));
        }

        positive("scoring.time_decay.half_life_days", self.scoring.time_decay.half_life_days)?;
        positive("memory.ebbinghaus.base_strength", self.memory.ebbinghaus.base_strength)?;
        if self.memory.ebbinghaus.growth_factor < 0.0 {
            return Err(Error::Config(
                "memory.ebbinghaus.growth_factor must be non-negative".to_string(),
            ));
        }
        if self.memory.sm2.initial_easiness < 1.3 {
            return Err(Error::Config(format!(
                "memory.sm2.initial_easiness must be >= 1.3, got {}",
                self.memory.sm2.initial_easiness
            )));
        }

        let bayes = &self.confidence.bayesian;
        positive("confidence.bayesian.prior_variance", bayes.prior_variance)?;
        positive("confidence.bayesian.observation_variance", bayes.observation_variance)?;
        unit("confidence.bayesian.prior_mean", bayes.prior_mean)?;

        let thompson = &self.confidence.thompson;
        positive("confidence.thompson.initial_alpha", thompson.initial_alpha)?;
        positive("confidence.thompson.initial_beta", thompson.initial_beta)?;

        if self.diversity.shannon_entropy.max_contexts == 0 {
            return Err(Error::Config(
                "diversity.shannon_entropy.max_contexts must be positive".to_string(),
            ));
        }

        unit("promotion.threshold", self.promotion.threshold)?;
        unit("promotion.min_confidence", self.promotion.min_confidence)?;
        unit("promotion.stopword_penalty", self.promotion.stopword_penalty)?;

        unit("habits.min_confidence", self.habits.min_confidence)?;
        unit("habits.min_freshness", self.habits.min_freshness)?;
        unit("habits.dedup_threshold", self.habits.dedup_threshold)?;
        unit("habits.cluster_threshold", self.habits.cluster_threshold)?;
        positive("habits.freshness_half_life_days", self.habits.freshness_half_life_days)?;

        if self.patterns.max_contexts == 0 {
            return Err(Error::Config(
                "patterns.max_contexts must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be positive, got {}", name, value)))
    }
}

fn unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be in [0, 1], got {}", name, value)))
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Storage
// =============================================================================

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for the store and archives
    pub data_dir: PathBuf,

    /// Store file name, relative to `data_dir`
    pub tracker_file: String,

    /// Archive directory name, relative to `data_dir`
    pub archive_dir: String,
}

impl StorageConfig {
    /// Absolute path of the JSON store
    pub fn tracker_path(&self) -> PathBuf {
        self.data_dir.join(&self.tracker_file)
    }

    /// Absolute path of the archive directory
    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(&self.archive_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs_next::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".patmem"),
            tracker_file: "pattern_tracker.json".to_string(),
            archive_dir: "session_archive".to_string(),
        }
    }
}

// =============================================================================
// Scoring
// =============================================================================

/// A scoring signal that can carry a composite weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// BM25 lexical relevance
    Bm25,
    /// Pointwise mutual information
    Pmi,
    /// Ebbinghaus retention
    Ebbinghaus,
    /// Half-life recency decay
    TimeDecay,
    /// Shannon entropy diversity
    ShannonEntropy,
    /// Term frequency times inverse document frequency
    Tfidf,
}

impl Signal {
    /// Every signal, in a fixed order
    pub const ALL: [Signal; 6] = [
        Signal::Bm25,
        Signal::Pmi,
        Signal::Ebbinghaus,
        Signal::TimeDecay,
        Signal::ShannonEntropy,
        Signal::Tfidf,
    ];

    /// Snake-case name used in logs and config keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Bm25 => "bm25",
            Signal::Pmi => "pmi",
            Signal::Ebbinghaus => "ebbinghaus",
            Signal::TimeDecay => "time_decay",
            Signal::ShannonEntropy => "shannon_entropy",
            Signal::Tfidf => "tfidf",
        }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// BM25 parameters
    pub bm25: Bm25Config,

    /// PMI parameters
    pub pmi: PmiConfig,

    /// TF-IDF toggle
    pub tfidf: TfidfConfig,

    /// Half-life recency decay
    pub time_decay: TimeDecayConfig,

    /// Composite weights per signal (must sum to 1.0 +/- 0.01)
    pub weights: BTreeMap<Signal, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(Signal::Bm25, 0.4);
        weights.insert(Signal::Pmi, 0.3);
        weights.insert(Signal::Ebbinghaus, 0.3);

        Self {
            bm25: Bm25Config::default(),
            pmi: PmiConfig::default(),
            tfidf: TfidfConfig::default(),
            time_decay: TimeDecayConfig::default(),
            weights,
        }
    }
}

/// BM25 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// Whether the signal runs
    pub enabled: bool,
    /// Term frequency saturation (valid range 1.2 - 2.0)
    pub k1: f64,
    /// Length normalization (valid range 0 - 1)
    pub b: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            enabled: true,
            k1: 1.5,
            b: 0.75,
        }
    }
}

/// PMI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PmiConfig {
    /// Whether the signal runs
    pub enabled: bool,
    /// Pairs below this co-occurrence count are ignored
    pub min_cooccurrence: u64,
}

impl Default for PmiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_cooccurrence: 2,
        }
    }
}

/// TF-IDF configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TfidfConfig {
    /// Whether the signal runs
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Half-life time decay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeDecayConfig {
    /// Whether the signal runs
    pub enabled: bool,
    /// Days until the score halves
    pub half_life_days: f64,
}

impl Default for TimeDecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            half_life_days: 30.0,
        }
    }
}

// =============================================================================
// Memory
// =============================================================================

/// Retention and scheduling configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Ebbinghaus forgetting curve
    pub ebbinghaus: EbbinghausConfig,
    /// SM-2 spaced repetition
    pub sm2: Sm2Config,
}

/// Ebbinghaus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EbbinghausConfig {
    /// Whether the signal runs
    pub enabled: bool,
    /// Strength of a pattern seen once
    pub base_strength: f64,
    /// Strength added per additional session
    pub growth_factor: f64,
}

impl Default for EbbinghausConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_strength: 1.0,
            growth_factor: 0.5,
        }
    }
}

/// SM-2 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Sm2Config {
    /// Whether review state is attached to patterns
    pub enabled: bool,
    /// Starting easiness factor
    pub initial_easiness: f64,
}

impl Default for Sm2Config {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_easiness: 2.5,
        }
    }
}

// =============================================================================
// Confidence
// =============================================================================

/// Confidence tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Gaussian belief tracking
    pub bayesian: BayesianConfig,
    /// Beta belief sampling
    pub thompson: ThompsonConfig,
}

/// Bayesian configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianConfig {
    /// Whether beliefs are reinforced after scoring
    pub enabled: bool,
    /// Prior mean for new beliefs
    pub prior_mean: f64,
    /// Prior variance for new beliefs
    pub prior_variance: f64,
    /// Variance assigned to every observation
    pub observation_variance: f64,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prior_mean: 0.5,
            prior_variance: 0.04,
            observation_variance: 0.01,
        }
    }
}

/// Thompson sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThompsonConfig {
    /// Whether Beta beliefs are maintained
    pub enabled: bool,
    /// Starting alpha
    pub initial_alpha: f64,
    /// Starting beta
    pub initial_beta: f64,
    /// Fixed RNG seed (None = seeded from entropy)
    pub seed: Option<u64>,
}

impl Default for ThompsonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_alpha: 1.0,
            initial_beta: 1.0,
            seed: None,
        }
    }
}

// =============================================================================
// Diversity
// =============================================================================

/// Diversity signal configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    /// Shannon entropy over context dimensions
    pub shannon_entropy: EntropyConfig,
}

/// Context dimension a pattern's distribution is measured over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    /// Session dates the pattern appeared in
    Sessions,
    /// Example context lines
    Contexts,
}

/// How per-dimension entropies are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Maximum
    Max,
}

/// Shannon entropy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Whether the signal runs
    pub enabled: bool,
    /// Dimensions to measure
    pub context_keys: Vec<ContextKey>,
    /// Combination across dimensions
    pub aggregation: Aggregation,
    /// Normalizer: scores are divided by log2(max_contexts)
    pub max_contexts: u32,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_keys: vec![ContextKey::Sessions],
            aggregation: Aggregation::Mean,
            max_contexts: 10,
        }
    }
}

// =============================================================================
// Promotion, habits, similarity, patterns
// =============================================================================

/// Promotion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    /// Composite score a pattern must exceed
    pub threshold: f64,
    /// Occurrences required before a candidate is marked ready
    pub min_observations: u64,
    /// Bayesian mean required before a candidate is marked ready
    pub min_confidence: f64,
    /// Multiplier applied to stopword composites
    pub stopword_penalty: f64,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            min_observations: 3,
            min_confidence: 0.6,
            stopword_penalty: 0.5,
        }
    }
}

/// Habit search and indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitsConfig {
    /// Minimum confidence mean for a note to be searchable
    pub min_confidence: f64,
    /// Minimum freshness for a note to be searchable
    pub min_freshness: f64,
    /// Days until freshness halves
    pub freshness_half_life_days: f64,
    /// Default number of search results
    pub top_k: usize,
    /// Similarity at or above which notes are duplicates
    pub dedup_threshold: f64,
    /// Similarity at or above which notes join a cluster
    pub cluster_threshold: f64,
}

impl Default for HabitsConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_freshness: 0.3,
            freshness_half_life_days: 30.0,
            top_k: 5,
            dedup_threshold: 0.9,
            cluster_threshold: 0.85,
        }
    }
}

/// Similarity and consolidation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Maximum edit distance for a near-duplicate pair
    pub distance_threshold: usize,
    /// Patterns below this count are excluded before pair detection
    pub min_count: u64,
    /// Number of store backups kept before a batch merge
    pub backup_keep_count: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 2,
            min_count: 1,
            backup_keep_count: 5,
        }
    }
}

/// Pattern extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// Patterns taken from a session archive per update
    pub top_n: usize,
    /// Contexts kept per pattern
    pub max_contexts: usize,
    /// Co-occurrence pairs kept
    pub cooccurrence_top_n: usize,
    /// Patterns whose contexts are refreshed per update
    pub context_top_n: usize,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            top_n: 50,
            max_contexts: 5,
            cooccurrence_top_n: 20,
            context_top_n: 10,
        }
    }
}
