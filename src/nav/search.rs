//! Debounced, multi-provider search.
//!
//! Raw input goes into a single aggregator task. Every keystroke clears the
//! published results and cancels whatever query is still in flight; only the
//! last value of a burst is queried, and only the newest query can publish.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::nav::collaborators::Notifier;
use crate::sources::{DocumentClass, RawResult, SearchProvider};

/// How a query treats a failing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Any provider failure discards the whole query.
    #[default]
    FailFast,
    /// Failed providers are reported and skipped.
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub debounce: Duration,
    /// Bound on each provider call.
    pub timeout: Duration,
    pub policy: JoinPolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            timeout: Duration::from_secs(10),
            policy: JoinPolicy::FailFast,
        }
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub label: String,
    pub relevance: f64,
    /// Name of the provider that produced it.
    pub source: String,
    pub draggable: bool,
}

/// Puts results from different providers on one scale.
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, raw: &RawResult) -> f64;
}

/// Adds one to the base relevance of entries of a preferred document class.
#[derive(Debug, Clone)]
pub struct PreferredKindScorer {
    preferred: Vec<DocumentClass>,
}

impl PreferredKindScorer {
    pub fn new(preferred: Vec<DocumentClass>) -> Self {
        Self { preferred }
    }
}

impl Default for PreferredKindScorer {
    fn default() -> Self {
        Self::new(vec![DocumentClass::Workflow, DocumentClass::CommandLineTool])
    }
}

impl RelevanceScorer for PreferredKindScorer {
    fn score(&self, raw: &RawResult) -> f64 {
        match raw.class {
            Some(class) if self.preferred.contains(&class) => raw.relevance + 1.0,
            _ => raw.relevance,
        }
    }
}

/// What consumers of the aggregator see.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchUpdate {
    /// Input changed; previous results are gone.
    Cleared,
    Results {
        term: String,
        results: Vec<SearchResult>,
    },
    Failed {
        term: String,
        message: String,
    },
}

/// Score every batch and merge them, most relevant first.
///
/// Batches are taken in provider order and the sort is stable, so equal
/// scores keep each provider's own order, then provider order.
pub fn merge_ranked<I>(batches: I, scorer: &dyn RelevanceScorer) -> Vec<SearchResult>
where
    I: IntoIterator<Item = (String, Vec<RawResult>)>,
{
    let mut merged: Vec<SearchResult> = batches
        .into_iter()
        .flat_map(|(source, raws)| {
            raws.into_iter().map(move |raw| SearchResult {
                relevance: scorer.score(&raw),
                draggable: raw.class.is_some_and(DocumentClass::is_runnable),
                id: raw.id,
                title: raw.title,
                label: raw.label,
                source: source.clone(),
            })
        })
        .collect();
    merged.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    merged
}

/// Handle to the aggregator task. Dropping it stops the task.
pub struct SearchAggregator {
    input: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SearchAggregator {
    pub fn spawn(
        providers: Vec<Arc<dyn SearchProvider>>,
        scorer: Arc<dyn RelevanceScorer>,
        settings: SearchSettings,
        notifier: Arc<dyn Notifier>,
        updates: mpsc::UnboundedSender<SearchUpdate>,
    ) -> Self {
        let (input, rx) = mpsc::unbounded_channel();
        let pipeline = Pipeline {
            providers: providers.into(),
            scorer,
            settings,
            notifier,
            updates,
        };
        let task = tokio::spawn(pipeline.run(rx));
        Self { input, task }
    }

    /// Feed one raw input value, e.g. the search box after a keystroke.
    pub fn input(&self, value: impl Into<String>) {
        let _ = self.input.send(value.into());
    }
}

impl Drop for SearchAggregator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct InFlight {
    term: String,
    handle: JoinHandle<Result<Vec<SearchResult>>>,
}

struct Pipeline {
    providers: Arc<[Arc<dyn SearchProvider>]>,
    scorer: Arc<dyn RelevanceScorer>,
    settings: SearchSettings,
    notifier: Arc<dyn Notifier>,
    updates: mpsc::UnboundedSender<SearchUpdate>,
}

impl Pipeline {
    async fn run(self, mut input: mpsc::UnboundedReceiver<String>) {
        let mut pending: Option<(String, Instant)> = None;
        let mut last_emitted: Option<String> = None;
        let mut last_published: Option<(String, Vec<SearchResult>)> = None;
        let mut in_flight: Option<InFlight> = None;

        loop {
            let deadline = pending.as_ref().map(|(_, at)| *at);
            tokio::select! {
                value = input.recv() => {
                    let Some(value) = value else { break };
                    let _ = self.updates.send(SearchUpdate::Cleared);
                    if let Some(previous) = in_flight.take() {
                        previous.handle.abort();
                        debug!(term = %previous.term, "query superseded");
                        // the cancelled value never published, so it may run again
                        last_emitted = None;
                    }
                    pending = Some((value, Instant::now() + self.settings.debounce));
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let Some((value, _)) = pending.take() else { continue };
                    // a repeated value is not queried again, but its cached
                    // results are re-sent so the Cleared above is not final
                    if last_emitted.as_deref() == Some(value.as_str()) {
                        if let Some((term, results)) = &last_published {
                            let _ = self.updates.send(SearchUpdate::Results {
                                term: term.clone(),
                                results: results.clone(),
                            });
                        }
                        continue;
                    }
                    last_emitted = Some(value.clone());
                    last_published = None;

                    let term = value.trim().to_string();
                    if term.is_empty() {
                        continue;
                    }
                    info!(term = %term, providers = self.providers.len(), "dispatching query");
                    in_flight = Some(InFlight {
                        handle: tokio::spawn(self.query(term.clone())),
                        term,
                    });
                }

                joined = join_in_flight(&mut in_flight) => {
                    let term = in_flight.take().map(|f| f.term).unwrap_or_default();
                    let outcome = joined.unwrap_or_else(|e| {
                        Err(AppError::SearchProvider {
                            provider: "aggregator".into(),
                            message: e.to_string(),
                        })
                    });
                    match outcome {
                        Ok(results) => {
                            debug!(term = %term, count = results.len(), "publishing results");
                            last_published = Some((term.clone(), results.clone()));
                            let _ = self.updates.send(SearchUpdate::Results { term, results });
                        }
                        Err(e) => {
                            warn!(term = %term, error = %e, "query failed");
                            last_emitted = None;
                            self.notifier.notify_failure(&e);
                            let _ = self.updates.send(SearchUpdate::Failed {
                                term,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        if let Some(previous) = in_flight {
            previous.handle.abort();
        }
    }

    /// Build the fan-out future for one query.
    fn query(&self, term: String) -> impl std::future::Future<Output = Result<Vec<SearchResult>>> {
        let providers = self.providers.clone();
        let scorer = self.scorer.clone();
        let notifier = self.notifier.clone();
        let settings = self.settings;
        async move { fan_out(&providers, scorer.as_ref(), notifier.as_ref(), settings, term).await }
    }
}

async fn join_in_flight(
    in_flight: &mut Option<InFlight>,
) -> std::result::Result<Result<Vec<SearchResult>>, tokio::task::JoinError> {
    match in_flight {
        Some(flight) => (&mut flight.handle).await,
        None => std::future::pending().await,
    }
}

/// Query every provider concurrently and merge what the join policy lets through.
async fn fan_out(
    providers: &[Arc<dyn SearchProvider>],
    scorer: &dyn RelevanceScorer,
    notifier: &dyn Notifier,
    settings: SearchSettings,
    term: String,
) -> Result<Vec<SearchResult>> {
    let millis = settings.timeout.as_millis() as u64;
    let mut set = JoinSet::new();
    for (index, provider) in providers.iter().enumerate() {
        let provider = Arc::clone(provider);
        let term = term.clone();
        let timeout = settings.timeout;
        set.spawn(async move {
            let name = provider.name().to_string();
            let outcome = match tokio::time::timeout(timeout, provider.search(&term)).await {
                Ok(Ok(raws)) => Ok(raws),
                Ok(Err(e)) => Err(AppError::SearchProvider {
                    provider: name.clone(),
                    message: e.to_string(),
                }),
                Err(_) => Err(AppError::Timeout {
                    operation: format!("search provider '{}'", name),
                    millis,
                }),
            };
            (index, name, outcome)
        });
    }

    let mut batches: Vec<Option<(String, Vec<RawResult>)>> = vec![None; providers.len()];
    let mut failures = Vec::new();
    while let Some(joined) = set.join_next().await {
        let (index, name, outcome) = match joined {
            Ok(done) => done,
            Err(e) => (
                usize::MAX,
                "unknown".to_string(),
                Err(AppError::SearchProvider {
                    provider: "unknown".into(),
                    message: e.to_string(),
                }),
            ),
        };
        match (outcome, settings.policy) {
            (Ok(raws), _) => {
                if let Some(slot) = batches.get_mut(index) {
                    *slot = Some((name, raws));
                }
            }
            // dropping the set aborts the providers still running
            (Err(e), JoinPolicy::FailFast) => return Err(e),
            (Err(e), JoinPolicy::Partial) => {
                warn!(provider = %name, error = %e, "provider failed");
                failures.push(e);
            }
        }
    }

    // with nothing answered there is no partial result to show
    if batches.iter().all(Option::is_none) {
        if let Some(last) = failures.pop() {
            for e in &failures {
                notifier.notify_failure(e);
            }
            return Err(last);
        }
    }
    for e in &failures {
        notifier.notify_failure(e);
    }

    Ok(merge_ranked(batches.into_iter().flatten(), scorer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{raw, RecordingNotifier, ScriptedProvider};

    struct Harness {
        aggregator: SearchAggregator,
        rx: mpsc::UnboundedReceiver<SearchUpdate>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(providers: Vec<Arc<ScriptedProvider>>, settings: SearchSettings) -> Harness {
        let notifier = Arc::new(RecordingNotifier::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let aggregator = SearchAggregator::spawn(
            providers
                .into_iter()
                .map(|p| p as Arc<dyn SearchProvider>)
                .collect(),
            Arc::new(PreferredKindScorer::default()),
            settings,
            notifier.clone(),
            tx,
        );
        Harness {
            aggregator,
            rx,
            notifier,
        }
    }

    impl Harness {
        /// Next update that is not `Cleared`.
        async fn settled(&mut self) -> SearchUpdate {
            loop {
                match self.rx.recv().await.unwrap() {
                    SearchUpdate::Cleared => continue,
                    other => return other,
                }
            }
        }

        fn drain(&mut self) -> Vec<SearchUpdate> {
            let mut updates = Vec::new();
            while let Ok(update) = self.rx.try_recv() {
                updates.push(update);
            }
            updates
        }
    }

    fn titles(update: &SearchUpdate) -> Vec<&str> {
        match update {
            SearchUpdate::Results { results, .. } => results.iter().map(|r| r.title.as_str()).collect(),
            other => panic!("expected results, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_keystrokes_yields_one_query() {
        let provider = Arc::new(ScriptedProvider::new("p").answer("abcde", vec![raw("hit", 1.0)]));
        let mut h = harness(vec![provider.clone()], SearchSettings::default());

        for value in ["a", "ab", "abc", "abcd", "abcde"] {
            h.aggregator.input(value);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let update = h.settled().await;
        assert_eq!(titles(&update), vec!["hit"]);
        assert_eq!(provider.queries(), vec!["abcde".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_query_supersedes_in_flight_one() {
        let provider = Arc::new(
            ScriptedProvider::new("p")
                .answer("a", vec![raw("old", 1.0)])
                .delay("a", Duration::from_millis(500))
                .answer("ab", vec![raw("new", 1.0)]),
        );
        let mut h = harness(vec![provider.clone()], SearchSettings::default());

        h.aggregator.input("a");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(provider.queries(), vec!["a".to_string()]);

        h.aggregator.input("ab");
        let update = h.settled().await;
        assert!(matches!(&update, SearchUpdate::Results { term, .. } if term == "ab"));
        assert_eq!(titles(&update), vec!["new"]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(h
            .drain()
            .iter()
            .all(|u| !matches!(u, SearchUpdate::Results { term, .. } if term == "a")));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_value_can_be_queried_again() {
        let provider = Arc::new(
            ScriptedProvider::new("p")
                .answer("a", vec![raw("hit", 1.0)])
                .delay("a", Duration::from_millis(500)),
        );
        let mut h = harness(vec![provider.clone()], SearchSettings::default());

        h.aggregator.input("a");
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.aggregator.input("a");
        let update = h.settled().await;
        assert_eq!(titles(&update), vec!["hit"]);
        assert_eq!(provider.queries(), vec!["a".to_string(), "a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_ranked_across_providers() {
        let a = Arc::new(ScriptedProvider::new("a").answer(
            "x",
            vec![raw("a3", 3.0), raw("a5", 5.0), raw("a1", 1.0)],
        ));
        let b = Arc::new(ScriptedProvider::new("b").answer("x", vec![raw("b4", 4.0)]));
        let mut h = harness(vec![a, b], SearchSettings::default());

        h.aggregator.input("x");
        let update = h.settled().await;
        assert_eq!(titles(&update), vec!["a5", "b4", "a3", "a1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_publishes_nothing_on_provider_error() {
        let ok = Arc::new(ScriptedProvider::new("ok").answer("x", vec![raw("hit", 1.0)]));
        let down = Arc::new(ScriptedProvider::new("down").failing());
        let mut h = harness(vec![ok, down], SearchSettings::default());

        h.aggregator.input("x");
        let update = h.settled().await;
        assert!(matches!(
            &update,
            SearchUpdate::Failed { term, message } if term == "x" && message.contains("down")
        ));
        assert_eq!(h.notifier.failures().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_policy_keeps_successful_providers() {
        let ok = Arc::new(ScriptedProvider::new("ok").answer("x", vec![raw("hit", 1.0)]));
        let down = Arc::new(ScriptedProvider::new("down").failing());
        let settings = SearchSettings {
            policy: JoinPolicy::Partial,
            ..SearchSettings::default()
        };
        let mut h = harness(vec![ok, down], settings);

        h.aggregator.input("x");
        let update = h.settled().await;
        assert_eq!(titles(&update), vec!["hit"]);
        assert_eq!(h.notifier.failures().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_policy_with_every_provider_down_fails_and_retries() {
        let down = Arc::new(ScriptedProvider::new("down").failing());
        let settings = SearchSettings {
            policy: JoinPolicy::Partial,
            ..SearchSettings::default()
        };
        let mut h = harness(vec![down.clone()], settings);

        h.aggregator.input("x");
        let update = h.settled().await;
        assert!(matches!(
            &update,
            SearchUpdate::Failed { term, message } if term == "x" && message.contains("down")
        ));
        assert_eq!(h.notifier.failures().len(), 1);

        h.aggregator.input("xy");
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.aggregator.input("x");
        let update = h.settled().await;
        assert!(matches!(&update, SearchUpdate::Failed { term, .. } if term == "x"));
        assert_eq!(down.queries(), vec!["x".to_string(), "x".to_string()]);
        assert!(h
            .drain()
            .iter()
            .all(|u| !matches!(u, SearchUpdate::Results { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_input_clears_without_querying() {
        let provider = Arc::new(ScriptedProvider::new("p"));
        let mut h = harness(vec![provider.clone()], SearchSettings::default());

        h.aggregator.input("   ");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.drain(), vec![SearchUpdate::Cleared]);
        assert!(provider.queries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_value_republishes_without_querying() {
        let provider = Arc::new(ScriptedProvider::new("p").answer("ab", vec![raw("hit", 1.0)]));
        let mut h = harness(vec![provider.clone()], SearchSettings::default());

        h.aggregator.input("ab");
        h.settled().await;
        h.aggregator.input("ab");
        let update = h.settled().await;
        assert_eq!(titles(&update), vec!["hit"]);
        assert_eq!(provider.queries(), vec!["ab".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let slow = Arc::new(ScriptedProvider::new("slow").delay("x", Duration::from_secs(30)));
        let settings = SearchSettings {
            timeout: Duration::from_secs(1),
            ..SearchSettings::default()
        };
        let mut h = harness(vec![slow], settings);

        h.aggregator.input("x");
        let update = h.settled().await;
        assert!(matches!(
            &update,
            SearchUpdate::Failed { message, .. } if message.contains("timed out after 1000 ms")
        ));
    }

    #[test]
    fn preferred_kinds_get_a_bonus_and_are_draggable() {
        let mut tool = raw("tool", 0.5);
        tool.class = Some(DocumentClass::CommandLineTool);
        let plain = raw("plain", 1.2);

        let merged = merge_ranked(
            vec![("local".to_string(), vec![plain, tool])],
            &PreferredKindScorer::default(),
        );
        assert_eq!(merged[0].title, "tool");
        assert_eq!(merged[0].relevance, 1.5);
        assert!(merged[0].draggable);
        assert!(!merged[1].draggable);
        assert_eq!(merged[1].source, "local");
    }

    #[test]
    fn equal_scores_keep_provider_order() {
        let merged = merge_ranked(
            vec![
                ("a".to_string(), vec![raw("x", 1.0), raw("y", 1.0)]),
                ("b".to_string(), vec![raw("z", 1.0)]),
            ],
            &PreferredKindScorer::new(Vec::new()),
        );
        let titles: Vec<&str> = merged.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["x", "y", "z"]);
    }

    #[test]
    fn join_policy_parses_from_config_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: JoinPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"partial\"").unwrap();
        assert_eq!(w.policy, JoinPolicy::Partial);
        let w: Wrapper = toml::from_str("policy = \"fail_fast\"").unwrap();
        assert_eq!(w.policy, JoinPolicy::FailFast);
    }
}
