//! Joint edge/follower filtering pipeline
//!
//! Composes the stage functions of this crate in a fixed order. Every stage
//! consumes its input tables and returns new ones; the pipeline only threads
//! them through and records per-stage counts.

use crate::annotate::{classify_languages, classify_locations, language_summary, restrict_to_target};
use crate::attributes::{AttributeFilter, AttributeFilterSet, NumericColumn};
use crate::degree::{filter_by_degree, Role};
use crate::enrich::{enrich_edges, MarkerIndex};
use crate::identity::IdColumn;
use crate::markers::{converge, RemovedMarker};
use crate::records::{Edge, EnrichedEdge, FollowerRecord, MarkerRecord};
use crate::regroup::CategoryMap;
use crate::summary::EdgeSummary;
use crate::sync::{synchronize, verify_consistent};
use crate::table::Table;
use crate::{Error, Result};
use ahash::AHashSet;
use markerprep_filters::language::{
    canonical_code, LanguageClassifier, LanguageClassifierConfig, LanguageShare, WhatlangClassifier,
};
use markerprep_filters::location::{Gazetteer, LocationClassifier, MatchMode};
use markerprep_filters::text_preprocessing::TextNormalizer;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum number of markers a follower must follow
    pub min_brands: usize,
    /// Language code followers must be detected in
    pub target_language: String,
    /// Also require a location inside the target country
    pub require_target_country: bool,
    /// Minimum retained followers per marker
    pub min_marker_followers: usize,
    /// Marker/follower filter passes after the target restriction
    pub convergence_passes: usize,
    /// Seed handed to the language classifier
    pub seed: u64,
    pub location_match: MatchMode,
    pub parallel_language_detection: bool,
    /// Threads for language detection (None = rayon default)
    pub num_threads: Option<usize>,
    /// Numeric follower thresholds, all of which must pass
    pub attribute_filters: AttributeFilterSet,
    pub language: LanguageClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_brands: 2,
            target_language: "fr".to_string(),
            require_target_country: true,
            min_marker_followers: 20,
            convergence_passes: 1,
            seed: 3,
            location_match: MatchMode::Substring,
            parallel_language_detection: true,
            num_threads: None,
            attribute_filters: AttributeFilterSet::new(vec![
                AttributeFilter::new(NumericColumn::Followers, 25),
                AttributeFilter::new(NumericColumn::Tweets, 100),
            ]),
            language: LanguageClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "target_language must not be empty".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(Error::InvalidConfig(
                "num_threads must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.language.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "language.min_confidence must be between 0.0 and 1.0, got {}",
                self.language.min_confidence
            )));
        }
        Ok(())
    }
}

/// Raw tables fed to the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub edges: Table<Edge>,
    pub followers: Table<FollowerRecord>,
    pub markers: Table<MarkerRecord>,
}

/// Final tables and the run report.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub edges: Table<EnrichedEdge>,
    pub followers: Table<FollowerRecord>,
    pub removed_markers: Vec<RemovedMarker>,
    pub stats: PipelineStats,
}

/// Table sizes after one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    pub stage: String,
    pub edges: usize,
    pub followers: usize,
    /// Distinct markers referenced by the edges
    pub markers: usize,
}

impl StageStats {
    fn measure(stage: &str, edges: &Table<Edge>, followers: &Table<FollowerRecord>) -> Self {
        let markers: AHashSet<_> = edges.iter().map(|e| &e.marker_id).collect();
        Self {
            stage: stage.to_string(),
            edges: edges.len(),
            followers: followers.len(),
            markers: markers.len(),
        }
    }
}

/// Pipeline statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub stages: Vec<StageStats>,
    pub duplicate_edges: usize,
    pub duplicate_markers: usize,
    /// Language shares of followers before the target restriction
    pub language_shares: Vec<LanguageShare>,
    pub removed_markers: usize,
    pub convergence_passes_run: usize,
    pub summary: EdgeSummary,
}

impl PipelineStats {
    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn edge_retention_rate(&self) -> f64 {
        match (self.stages.first(), self.stages.last()) {
            (Some(first), Some(last)) if first.edges > 0 => {
                (last.edges as f64 / first.edges as f64) * 100.0
            }
            _ => 0.0,
        }
    }

    pub fn follower_retention_rate(&self) -> f64 {
        match (self.stages.first(), self.stages.last()) {
            (Some(first), Some(last)) if first.followers > 0 => {
                (last.followers as f64 / first.followers as f64) * 100.0
            }
            _ => 0.0,
        }
    }
}

/// Stage names in execution order.
pub mod stage {
    pub const INPUT: &str = "input";
    pub const FOLLOWER_DEGREE: &str = "follower_degree";
    pub const SYNC_FOLLOWERS: &str = "sync_followers";
    pub const ATTRIBUTES: &str = "attribute_filter";
    pub const SYNC_EDGES: &str = "sync_edges";
    pub const LANGUAGE: &str = "language";
    pub const LOCATION: &str = "location";
    pub const TARGET: &str = "target_restriction";
    pub const SYNC_TARGET: &str = "sync_edges_target";
    pub const CONVERGENCE: &str = "marker_convergence";
    pub const FINAL_SYNC: &str = "final_sync";

    pub const ALL: &[&str] = &[
        INPUT,
        FOLLOWER_DEGREE,
        SYNC_FOLLOWERS,
        ATTRIBUTES,
        SYNC_EDGES,
        LANGUAGE,
        LOCATION,
        TARGET,
        SYNC_TARGET,
        CONVERGENCE,
        FINAL_SYNC,
    ];
}

/// The follower/marker filtering pipeline
pub struct Pipeline {
    config: PipelineConfig,
    normalizer: TextNormalizer,
    classifier: Box<dyn LanguageClassifier>,
    locator: LocationClassifier,
    categories: CategoryMap,
    pool: Option<rayon::ThreadPool>,
}

impl Pipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    pub fn run(&self, input: PipelineInput) -> Result<PipelineOutput> {
        self.run_with_observer(input, |_| {})
    }

    /// Run every stage, calling `observer` after each one.
    pub fn run_with_observer<F>(&self, input: PipelineInput, mut observer: F) -> Result<PipelineOutput>
    where
        F: FnMut(&StageStats),
    {
        let config = &self.config;
        let mut stats = PipelineStats::default();
        let mut record = |stats: &mut PipelineStats, name: &str, edges: &Table<Edge>, followers: &Table<FollowerRecord>| {
            let row = StageStats::measure(name, edges, followers);
            observer(&row);
            stats.stages.push(row);
        };

        let PipelineInput {
            edges,
            followers,
            markers,
        } = input;
        let markers = MarkerIndex::new(markers)?;
        markers.check_compatible(&edges)?;
        stats.duplicate_markers = markers.duplicates();
        record(&mut stats, stage::INPUT, &edges, &followers);

        let outcome = filter_by_degree(edges, Role::Follower, config.min_brands);
        stats.duplicate_edges = outcome.duplicates_removed;
        let edges = outcome.edges;
        record(&mut stats, stage::FOLLOWER_DEGREE, &edges, &followers);

        let followers = synchronize(&edges, followers, IdColumn::FollowerId)?;
        record(&mut stats, stage::SYNC_FOLLOWERS, &edges, &followers);

        let followers = config.attribute_filters.apply(followers);
        record(&mut stats, stage::ATTRIBUTES, &edges, &followers);

        let edges = synchronize(&followers, edges, IdColumn::FollowerId)?;
        verify_consistent(&edges, &followers, stage::SYNC_EDGES)?;
        record(&mut stats, stage::SYNC_EDGES, &edges, &followers);

        let followers = self.classify_languages(followers);
        stats.language_shares = language_summary(&followers);
        record(&mut stats, stage::LANGUAGE, &edges, &followers);

        let followers = classify_locations(followers, &self.locator);
        record(&mut stats, stage::LOCATION, &edges, &followers);

        let followers = restrict_to_target(
            followers,
            &config.target_language,
            config.require_target_country,
        );
        record(&mut stats, stage::TARGET, &edges, &followers);

        let edges = synchronize(&followers, edges, IdColumn::FollowerId)?;
        record(&mut stats, stage::SYNC_TARGET, &edges, &followers);

        let convergence = converge(
            edges,
            &markers,
            config.min_marker_followers,
            config.min_brands,
            config.convergence_passes,
        );
        stats.removed_markers = convergence.removed_markers.len();
        stats.convergence_passes_run = convergence.passes_run;
        let edges = convergence.edges;
        record(&mut stats, stage::CONVERGENCE, &edges, &followers);

        let followers = synchronize(&edges, followers, IdColumn::FollowerId)?;
        verify_consistent(&edges, &followers, stage::FINAL_SYNC)?;
        record(&mut stats, stage::FINAL_SYNC, &edges, &followers);

        stats.summary = EdgeSummary::compute(&edges);
        let edges = enrich_edges(&edges, &markers, &self.categories)?;

        info!(
            "Pipeline finished: {} edges, {} followers, {} markers ({:.1}% of edges retained)",
            stats.summary.edges,
            stats.summary.followers,
            stats.summary.markers,
            stats.edge_retention_rate()
        );

        Ok(PipelineOutput {
            edges,
            followers,
            removed_markers: convergence.removed_markers,
            stats,
        })
    }

    /// Normalise and classify bios, on the configured thread pool if any.
    pub fn classify_languages(&self, followers: Table<FollowerRecord>) -> Table<FollowerRecord> {
        let parallel = self.config.parallel_language_detection;
        let run = || {
            classify_languages(
                followers,
                &self.normalizer,
                self.classifier.as_ref(),
                self.config.seed,
                parallel,
            )
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    classifier: Option<Box<dyn LanguageClassifier>>,
    gazetteer: Option<Gazetteer>,
    categories: CategoryMap,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            classifier: None,
            gazetteer: None,
            categories: CategoryMap::default(),
        }
    }

    pub fn gazetteer(mut self, gazetteer: Gazetteer) -> Self {
        self.gazetteer = Some(gazetteer);
        self
    }

    /// Replace the default whatlang classifier.
    pub fn classifier(mut self, classifier: Box<dyn LanguageClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn categories(mut self, categories: CategoryMap) -> Self {
        self.categories = categories;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let mut config = self.config;
        config.validate()?;
        config.target_language = canonical_code(&config.target_language);

        let gazetteer = self.gazetteer.ok_or_else(|| {
            Error::InvalidConfig("a gazetteer is required for location classification".to_string())
        })?;
        let locator = LocationClassifier::new(&gazetteer, config.location_match)?;

        let classifier = match self.classifier {
            Some(classifier) => classifier,
            None => Box::new(WhatlangClassifier::new(config.language.clone())?),
        };

        let pool = match config.num_threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::InvalidConfig(format!("failed to build thread pool: {}", e)))?,
            ),
            None => None,
        };

        Ok(Pipeline {
            config,
            normalizer: TextNormalizer::bio(),
            classifier,
            locator,
            categories: self.categories,
            pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Id;
    use markerprep_filters::language::LanguageGuess;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// "bonjour" is French, "hello" is English, anything else undetermined.
    struct KeywordClassifier {
        last_seed: Arc<AtomicU64>,
    }

    impl KeywordClassifier {
        fn boxed() -> Box<dyn LanguageClassifier> {
            Box::new(Self {
                last_seed: Arc::new(AtomicU64::new(0)),
            })
        }
    }

    impl LanguageClassifier for KeywordClassifier {
        fn classify(&self, text: &str, seed: u64) -> LanguageGuess {
            self.last_seed.store(seed, Ordering::SeqCst);
            let lower = text.to_lowercase();
            if lower.contains("bonjour") {
                LanguageGuess::detected("fr", 0.99)
            } else if lower.contains("hello") {
                LanguageGuess::detected("en", 0.99)
            } else {
                LanguageGuess::Undetermined
            }
        }
    }

    fn follower(id: &str, bio: &str, location: &str, followers: u64, tweets: u64) -> FollowerRecord {
        let mut record = FollowerRecord::new(id);
        record.description = Some(bio.to_string());
        record.location = Some(location.to_string());
        record.followers = Some(followers);
        record.tweets = Some(tweets);
        record
    }

    fn marker(id: &str, category: &str) -> MarkerRecord {
        let mut m = MarkerRecord::new(id);
        m.twitter_name = Some(id.to_lowercase());
        m.category = Some(category.to_string());
        m.followers = Some(1_000);
        m
    }

    fn edges(pairs: &[(&str, &str)]) -> Table<Edge> {
        Table::new(
            "edges",
            pairs.iter().map(|&(m, f)| Edge::new(m, f)).collect(),
        )
    }

    fn input() -> PipelineInput {
        PipelineInput {
            edges: edges(&[
                ("M1", "F1"),
                ("M2", "F1"),
                ("M1", "F1"),
                ("M1", "F2"),
                ("M2", "F2"),
                ("M1", "F3"),
                ("M2", "F3"),
                ("M1", "F4"),
                ("M2", "F4"),
                ("M1", "F5"),
                ("M2", "F5"),
                ("M1", "F6"),
                ("M1", "F7"),
                ("M3", "F7"),
                ("M3", "F3"),
                ("M1", "F8"),
                ("M2", "F8"),
            ]),
            followers: Table::new(
                "followers",
                vec![
                    follower("F1", "Bonjour de Paris", "Paris, France", 100, 200),
                    follower("F2", "bonjour &amp; merci", "Lyon", 30, 150),
                    follower("F3", "Hello there", "Paris", 100, 200),
                    follower("F4", "Bonjour", "Berlin", 100, 200),
                    follower("F5", "Bonjour", "Paris", 100, 50),
                    follower("F6", "Bonjour", "Paris", 100, 200),
                    follower("F7", "Bonjour", "Marseille", 100, 200),
                    follower("F9", "Bonjour", "Paris", 100, 200),
                ],
            ),
            markers: Table::new(
                "markers",
                vec![
                    marker("M1", "newspapers"),
                    marker("M2", "football clubs"),
                    marker("M3", "football clubs"),
                ],
            ),
        }
    }

    fn pipeline(config: PipelineConfig) -> Pipeline {
        let categories: CategoryMap = [("newspapers", "media"), ("football clubs", "sport")]
            .into_iter()
            .collect();
        Pipeline::builder(config)
            .gazetteer(Gazetteer::new(["paris", "lyon", "marseille", "france"]).unwrap())
            .classifier(KeywordClassifier::boxed())
            .categories(categories)
            .build()
            .unwrap()
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            min_marker_followers: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.min_brands, 2);
        assert_eq!(config.target_language, "fr");
        assert_eq!(config.min_marker_followers, 20);
        assert_eq!(config.convergence_passes, 1);
        assert_eq!(config.seed, 3);
        assert!(config.parallel_language_detection);
        assert_eq!(config.attribute_filters.filters().len(), 2);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"min_brands": 3, "location_match": "token", "attribute_filters": [{"column": "likes", "min": 5}]}"#,
        )
        .unwrap();
        assert_eq!(config.min_brands, 3);
        assert_eq!(config.location_match, MatchMode::Token);
        assert_eq!(config.attribute_filters.filters()[0].column, NumericColumn::Likes);
        assert_eq!(config.target_language, "fr");
    }

    #[test]
    fn test_full_run() {
        let output = pipeline(test_config()).run(input()).unwrap();

        let pairs: Vec<(String, String)> = output
            .edges
            .iter()
            .map(|e| (e.marker_id.to_string(), e.follower_id.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("M1".to_string(), "F1".to_string()),
                ("M2".to_string(), "F1".to_string()),
                ("M1".to_string(), "F2".to_string()),
                ("M2".to_string(), "F2".to_string()),
            ]
        );

        let followers: Vec<Id> = output.followers.iter().map(|f| f.follower_id.clone()).collect();
        assert_eq!(followers, vec![Id::from("F1"), Id::from("F2")]);
        assert_eq!(
            output.followers.rows()[1].description_cleantext.as_deref(),
            Some("bonjour & merci")
        );
        assert!(output.followers.iter().all(|f| f.in_target_country == Some(true)));

        let first = &output.edges.rows()[0];
        assert_eq!(first.twitter_name.as_deref(), Some("m1"));
        assert_eq!(first.coarse_category.as_deref(), Some("media"));
        assert_eq!(first.retained_followers, 2);

        assert_eq!(output.removed_markers.len(), 1);
        assert_eq!(output.removed_markers[0].marker_id, Id::from("M3"));
        assert_eq!(output.removed_markers[0].retained_followers, 1);
    }

    #[test]
    fn test_stats() {
        let output = pipeline(test_config()).run(input()).unwrap();
        let stats = &output.stats;

        let names: Vec<&str> = stats.stages.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(names, stage::ALL);

        assert_eq!(stats.duplicate_edges, 1);
        assert_eq!(stats.removed_markers, 1);
        assert_eq!(stats.convergence_passes_run, 1);

        let degree = stats.stage(stage::FOLLOWER_DEGREE).unwrap();
        assert_eq!(degree.edges, 15);
        let sync = stats.stage(stage::SYNC_FOLLOWERS).unwrap();
        assert_eq!(sync.followers, 6);
        let attributes = stats.stage(stage::ATTRIBUTES).unwrap();
        assert_eq!(attributes.followers, 5);

        assert_eq!(stats.summary.edges, 4);
        assert_eq!(stats.summary.components, 1);
        assert!((stats.edge_retention_rate() - 4.0 / 17.0 * 100.0).abs() < 1e-9);

        let total: f64 = stats.language_shares.iter().map(|s| s.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_final_tables_are_consistent() {
        let output = pipeline(test_config()).run(input()).unwrap();
        let edge_ids: AHashSet<&Id> = output.edges.iter().map(|e| &e.follower_id).collect();
        let follower_ids: AHashSet<&Id> = output.followers.iter().map(|f| &f.follower_id).collect();
        assert_eq!(edge_ids, follower_ids);
    }

    #[test]
    fn test_observer_sees_every_stage() {
        let mut seen = Vec::new();
        pipeline(test_config())
            .run_with_observer(input(), |row| seen.push(row.stage.clone()))
            .unwrap();
        assert_eq!(seen, stage::ALL);
    }

    #[test]
    fn test_seed_reaches_classifier() {
        let last_seed = Arc::new(AtomicU64::new(0));
        let classifier = KeywordClassifier {
            last_seed: Arc::clone(&last_seed),
        };
        let pipeline = Pipeline::builder(PipelineConfig {
            seed: 42,
            ..test_config()
        })
        .gazetteer(Gazetteer::new(["paris"]).unwrap())
        .classifier(Box::new(classifier))
        .build()
        .unwrap();

        pipeline.run(input()).unwrap();
        assert_eq!(last_seed.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_incompatible_follower_ids() {
        let mut input = input();
        input.followers = Table::new("followers", vec![FollowerRecord::new(1)]);

        match pipeline(test_config()).run(input) {
            Err(Error::IncompatibleIdentity {
                column, dependent_table, ..
            }) => {
                assert_eq!(column, IdColumn::FollowerId);
                assert_eq!(dependent_table, "followers");
            }
            other => panic!("unexpected result: {:?}", other.map(|o| o.edges.len())),
        }
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let parallel = pipeline(test_config()).run(input()).unwrap();
        let sequential = pipeline(PipelineConfig {
            parallel_language_detection: false,
            num_threads: Some(1),
            ..test_config()
        })
        .run(input())
        .unwrap();
        assert_eq!(parallel.edges, sequential.edges);
        assert_eq!(parallel.followers, sequential.followers);
    }

    #[test]
    fn test_builder_requires_gazetteer() {
        let result = Pipeline::builder(PipelineConfig::default())
            .classifier(KeywordClassifier::boxed())
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_config() {
        let config = PipelineConfig {
            target_language: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            num_threads: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_input() {
        let output = pipeline(test_config())
            .run(PipelineInput {
                edges: edges(&[]),
                followers: Table::new("followers", Vec::new()),
                markers: Table::new("markers", Vec::new()),
            })
            .unwrap();
        assert!(output.edges.is_empty());
        assert!(output.followers.is_empty());
        assert!(output.stats.language_shares.is_empty());
    }
}
