use crate::config::toml_config::{ProbeSection, RetrySection};
use crate::domain::model::{Classification, FetchError, FetchResponse, Identifier, ProbeResult};
use crate::domain::ports::Fetcher;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// When and how long to wait before re-issuing a fetch. Only responses whose
/// status is listed in `retry_statuses` are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Vec<Duration>,
    pub retry_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Vec::new(),
            retry_statuses: Vec::new(),
        }
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay before retry number `retry` (zero based). The schedule's last entry repeats.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff
            .get(retry as usize)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or_default()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetrySection::default())
    }
}

impl From<&RetrySection> for RetryPolicy {
    fn from(section: &RetrySection) -> Self {
        Self {
            max_retries: section.max_retries,
            backoff: section
                .backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            retry_statuses: section.retry_statuses.clone(),
        }
    }
}

/// Case-insensitive phrase matcher over a page body.
#[derive(Debug, Clone)]
pub struct PhraseClassifier {
    phrases: Vec<String>,
}

impl PhraseClassifier {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// First phrase found in `body`, if any.
    pub fn matching_phrase(&self, body: &str) -> Option<&str> {
        let haystack = body.to_lowercase();
        self.phrases
            .iter()
            .find(|phrase| haystack.contains(phrase.as_str()))
            .map(String::as_str)
    }

    pub fn classify(&self, body: &str) -> Classification {
        match self.matching_phrase(body) {
            Some(_) => Classification::Positive,
            None => Classification::Negative,
        }
    }
}

#[derive(Debug)]
enum Attempt {
    Done(Classification),
    RateLimited(u16),
}

pub struct Prober<F: Fetcher> {
    fetcher: F,
    url_template: String,
    classifier: PhraseClassifier,
    retry: RetryPolicy,
    timeout: Duration,
    max_concurrency: usize,
    limiter: Arc<Semaphore>,
}

impl<F: Fetcher> Prober<F> {
    pub fn new(fetcher: F, section: &ProbeSection, retry: RetryPolicy) -> Self {
        let max_concurrency = section.max_concurrency.max(1);
        Self {
            fetcher,
            url_template: section.url_template.clone(),
            classifier: PhraseClassifier::new(&section.positive_phrases),
            retry,
            timeout: Duration::from_secs(section.timeout_seconds),
            max_concurrency,
            limiter: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn url_for(&self, id: &Identifier) -> String {
        self.url_template.replace("{id}", id.as_str())
    }

    /// Effective parallelism for a batch of `batch_size` probes.
    pub fn concurrency_for(&self, batch_size: usize) -> usize {
        batch_size.min(self.max_concurrency)
    }

    /// Classifies one identifier. Holds a permit from the shared limiter for
    /// the whole probe, retries included.
    pub async fn probe(&self, id: &Identifier) -> Classification {
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("Probe limiter closed, marking {} unknown", id);
                return Classification::Unknown;
            }
        };

        let url = self.url_for(id);
        let mut retries = 0;
        loop {
            match self.attempt(&url).await {
                Attempt::Done(classification) => {
                    tracing::debug!("{} -> {:?}", id, classification);
                    return classification;
                }
                Attempt::RateLimited(status) if retries < self.retry.max_retries => {
                    let delay = self.retry.backoff_for(retries);
                    retries += 1;
                    tracing::debug!(
                        "{} rate limited ({}), retry {} in {:?}",
                        id,
                        status,
                        retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Attempt::RateLimited(status) => {
                    tracing::warn!("{} still rate limited ({}) after {} retries", id, status, retries);
                    return Classification::Unknown;
                }
            }
        }
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let fetched = match tokio::time::timeout(self.timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };

        match fetched {
            Ok(FetchResponse { status, .. }) if self.retry.is_retryable(status) => {
                Attempt::RateLimited(status)
            }
            Ok(FetchResponse { status, body }) if (200..300).contains(&status) => {
                Attempt::Done(self.classifier.classify(&body))
            }
            Ok(FetchResponse { status, .. }) => {
                tracing::debug!("Unexpected status {} from {}", status, url);
                Attempt::Done(Classification::Unknown)
            }
            Err(e) => {
                tracing::debug!("Fetch of {} failed: {}", url, e);
                Attempt::Done(Classification::Unknown)
            }
        }
    }

    /// Probes every identifier concurrently and waits for all of them. Results
    /// come back in input order regardless of completion order.
    pub async fn probe_batch(&self, ids: &[Identifier]) -> Vec<ProbeResult> {
        tracing::debug!(
            "Probing {} identifiers, {} at a time",
            ids.len(),
            self.concurrency_for(ids.len())
        );
        let probes = ids.iter().map(|id| async move {
            let classification = self.probe(id).await;
            ProbeResult::new(id.clone(), classification)
        });
        join_all(probes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Reply {
        Page(u16, &'static str),
        Fail(FetchError),
        Hang,
    }

    #[derive(Default)]
    struct ScriptedFetcher {
        replies: Mutex<HashMap<String, Vec<Reply>>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn script(self, url: &str, replies: Vec<Reply>) -> Self {
            self.replies.lock().unwrap().insert(url.to_string(), replies);
            self
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let reply = {
                let mut replies = self.replies.lock().unwrap();
                match replies.get_mut(url) {
                    Some(queue) if queue.len() > 1 => queue.remove(0),
                    Some(queue) => queue[0].clone(),
                    None => Reply::Page(200, "<html>available</html>"),
                }
            };
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match reply {
                Reply::Page(status, body) => Ok(FetchResponse {
                    status,
                    body: body.to_string(),
                }),
                Reply::Fail(e) => Err(e),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn section(max_concurrency: usize) -> ProbeSection {
        ProbeSection {
            url_template: "https://probe.test/{id}".to_string(),
            positive_phrases: vec!["Restricted".to_string(), "banned".to_string()],
            max_concurrency,
            timeout_seconds: 5,
            ..ProbeSection::default()
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            backoff: vec![Duration::from_millis(5)],
            retry_statuses: vec![429],
        }
    }

    fn id(s: &str) -> Identifier {
        Identifier::from_digits(s).unwrap()
    }

    #[test]
    fn test_classifier_is_case_insensitive_and_ordered() {
        let classifier = PhraseClassifier::new(["Restricted", "banned"]);
        assert_eq!(
            classifier.matching_phrase("This number is BANNED and RESTRICTED"),
            Some("restricted")
        );
        assert_eq!(classifier.classify("all good"), Classification::Negative);
    }

    #[test]
    fn test_backoff_schedule_repeats_last_entry() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: vec![Duration::from_millis(100), Duration::from_millis(500)],
            retry_statuses: vec![429],
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(500));
        assert_eq!(RetryPolicy::none().backoff_for(0), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_probe_classifies_pages_and_failures() {
        let fetcher = ScriptedFetcher::default()
            .script("https://probe.test/1", vec![Reply::Page(200, "<b>restricted</b>")])
            .script("https://probe.test/2", vec![Reply::Page(200, "<b>for sale</b>")])
            .script("https://probe.test/3", vec![Reply::Fail(FetchError::Connect("refused".into()))])
            .script("https://probe.test/4", vec![Reply::Page(500, "oops")])
            .script("https://probe.test/5", vec![Reply::Fail(FetchError::Malformed("bad utf-8".into()))]);
        let prober = Prober::new(fetcher, &section(10), fast_retry());

        assert_eq!(prober.probe(&id("1")).await, Classification::Positive);
        assert_eq!(prober.probe(&id("2")).await, Classification::Negative);
        assert_eq!(prober.probe(&id("3")).await, Classification::Unknown);
        assert_eq!(prober.probe(&id("4")).await, Classification::Unknown);
        assert_eq!(prober.probe(&id("5")).await, Classification::Unknown);
        // none of these are retryable
        assert_eq!(prober.fetcher.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_rate_limit_retried_once() {
        let fetcher = ScriptedFetcher::default().script(
            "https://probe.test/7",
            vec![Reply::Page(429, ""), Reply::Page(200, "Restricted")],
        );
        let prober = Prober::new(fetcher, &section(10), fast_retry());

        assert_eq!(prober.probe(&id("7")).await, Classification::Positive);
        assert_eq!(prober.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_becomes_unknown() {
        let fetcher =
            ScriptedFetcher::default().script("https://probe.test/8", vec![Reply::Page(429, "")]);
        let prober = Prober::new(fetcher, &section(10), fast_retry());

        assert_eq!(prober.probe(&id("8")).await, Classification::Unknown);
        assert_eq!(prober.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batch_respects_concurrency_limit() {
        let prober = Prober::new(ScriptedFetcher::default(), &section(4), RetryPolicy::none());
        let ids: Vec<Identifier> = (1..=20).map(|n| id(&n.to_string())).collect();

        let results = prober.probe_batch(&ids).await;

        assert_eq!(results.len(), 20);
        assert!(prober.fetcher.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(prober.concurrency_for(2), 2);
        assert_eq!(prober.concurrency_for(200), 4);
        assert_eq!(results[0].id, id("1"));
        assert_eq!(results[19].id, id("20"));
    }

    #[tokio::test]
    async fn test_hanging_hosts_finish_in_one_timeout() {
        let mut fetcher = ScriptedFetcher::default();
        for n in 1..=30 {
            fetcher = fetcher.script(&format!("https://probe.test/{}", n), vec![Reply::Hang]);
        }
        let prober = Prober::new(fetcher, &section(100), RetryPolicy::none())
            .with_timeout(Duration::from_millis(200));
        let ids: Vec<Identifier> = (1..=30).map(|n| id(&n.to_string())).collect();

        let started = std::time::Instant::now();
        let results = prober.probe_batch(&ids).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(results
            .iter()
            .all(|r| r.classification == Classification::Unknown));
    }
}
