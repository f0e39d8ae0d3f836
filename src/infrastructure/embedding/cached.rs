//! Embedding creation backed by the response cache

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::TiktokenCounter;
use crate::domain::cache::{Cache, CacheExt, CacheParameter, EmbeddingCacheParameter};
use crate::domain::embedding::{EmbeddingCreator, EmbeddingProvider, EmbeddingRequest, TokenCounter};
use crate::domain::knowledge::Element;
use crate::domain::DomainError;
use crate::infrastructure::cache::CacheManager;

/// Token limit used when truncating oversized content
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 8000;

/// Upper bound on one embedding stage
pub const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Builds a fresh backend client; called once per parallel worker
pub type EmbeddingBackendFactory =
    Arc<dyn Fn() -> Result<Arc<dyn EmbeddingProvider>, DomainError> + Send + Sync>;

/// Per-element embedding logic shared by all workers
#[derive(Clone)]
struct EmbeddingCalculator {
    cache: Arc<dyn Cache>,
    parameter: EmbeddingCacheParameter,
    tokenizer: Option<Arc<dyn TokenCounter>>,
    max_token_length: usize,
}

impl EmbeddingCalculator {
    async fn embed_all(
        &self,
        backend: &dyn EmbeddingProvider,
        elements: &[Arc<Element>],
    ) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut vectors = Vec::with_capacity(elements.len());
        for element in elements {
            vectors.push(self.embed_element(backend, element).await?);
        }
        Ok(vectors)
    }

    async fn embed_element(
        &self,
        backend: &dyn EmbeddingProvider,
        element: &Element,
    ) -> Result<Vec<f32>, DomainError> {
        let content = element.content();
        let key = self.parameter.create_cache_key(content);
        let cached: Option<Vec<f32>> = self.cache.get(&key).await?;
        if let Some(vector) = cached {
            return Ok(vector);
        }

        let overflow_key = self
            .parameter
            .create_overflow_cache_key(content, self.max_token_length);
        let truncated: Option<Vec<f32>> = self.cache.get(&overflow_key).await?;
        if let Some(vector) = truncated {
            debug!(element = %element.identifier(), "Using truncated embedding");
            return Ok(vector);
        }

        info!(element = %element.identifier(), "Calculating embedding");
        match self.embed_content(backend, content).await {
            Ok(vector) => {
                self.cache.put(&key, &vector).await?;
                Ok(vector)
            }
            Err(e) => {
                warn!(
                    element = %element.identifier(),
                    error = %e,
                    "Embedding failed, retrying with truncated content"
                );
                let vector = self.recover_overflow(backend, content, e).await?;
                self.cache.put(&overflow_key, &vector).await?;
                info!(
                    element = %element.identifier(),
                    local_key = %overflow_key.local_key(),
                    "Using truncated embedding"
                );
                Ok(vector)
            }
        }
    }

    async fn embed_content(
        &self,
        backend: &dyn EmbeddingProvider,
        content: &str,
    ) -> Result<Vec<f32>, DomainError> {
        let response = backend
            .embed(EmbeddingRequest::single(backend.model(), content))
            .await?;

        response.into_vectors().into_iter().next().ok_or_else(|| {
            DomainError::provider(backend.provider_name(), "Empty embedding response")
        })
    }

    /// Embeds the longest prefix of `content` that fits the token limit
    ///
    /// Returns `cause` when the content is not actually too long or cannot be measured.
    /// Token counting runs on the blocking pool since it repeats over the whole content.
    async fn recover_overflow(
        &self,
        backend: &dyn EmbeddingProvider,
        content: &str,
        cause: DomainError,
    ) -> Result<Vec<f32>, DomainError> {
        let Some(tokenizer) = &self.tokenizer else {
            error!(model = %self.parameter.model_name, "No tokenizer for model, cannot truncate");
            return Err(cause);
        };

        let tokenizer = Arc::clone(tokenizer);
        let limit = self.max_token_length;
        let text = content.to_string();
        let (tokens, prefix_len) = tokio::task::spawn_blocking(move || {
            let tokens = tokenizer.count_tokens(&text);
            let prefix_len = (tokens >= limit)
                .then(|| longest_prefix_within(tokenizer.as_ref(), &text, limit).len());
            (tokens, prefix_len)
        })
        .await
        .map_err(|e| DomainError::internal(format!("Token counting failed: {}", e)))?;

        let Some(prefix_len) = prefix_len else {
            error!(tokens, limit, "Content is within the token limit");
            return Err(cause);
        };

        debug!(
            tokens,
            limit,
            kept_bytes = prefix_len,
            total_bytes = content.len(),
            "Truncated content"
        );

        self.embed_content(backend, &content[..prefix_len]).await
    }
}

/// Longest prefix of `content`, cut at a char boundary, with fewer than `limit` tokens
///
/// `tokenizer` must be monotonic in the prefix length.
fn longest_prefix_within<'a>(
    tokenizer: &dyn TokenCounter,
    content: &'a str,
    limit: usize,
) -> &'a str {
    let boundaries: Vec<usize> = content
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(content.len()))
        .collect();

    let (mut lo, mut hi) = (0usize, boundaries.len() - 1);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if tokenizer.count_tokens(&content[..boundaries[mid]]) < limit {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    &content[..boundaries[lo]]
}

/// Distinct contents in first-seen order, plus the index of each element's content
fn dedupe_by_content(elements: &[Arc<Element>]) -> (Vec<Arc<Element>>, Vec<usize>) {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut unique = Vec::new();
    let mut positions = Vec::with_capacity(elements.len());

    for element in elements {
        let index = *first_seen.entry(element.content()).or_insert_with(|| {
            unique.push(Arc::clone(element));
            unique.len() - 1
        });
        positions.push(index);
    }

    (unique, positions)
}

/// Computes each `(model, content)` embedding at most once
///
/// Repeated contents are embedded once per call. Misses go to the backend and are written
/// to the cache. Parallel runs split the distinct contents into contiguous chunks, one per
/// worker, and keep the input order.
pub struct CachedEmbeddingCreator {
    calculator: EmbeddingCalculator,
    backend: Arc<dyn EmbeddingProvider>,
    backend_factory: EmbeddingBackendFactory,
    threads: usize,
}

impl fmt::Debug for CachedEmbeddingCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedEmbeddingCreator")
            .field("model", &self.calculator.parameter.model_name)
            .field("backend", &self.backend.provider_name())
            .field("threads", &self.threads)
            .field("max_token_length", &self.calculator.max_token_length)
            .field("tokenizer", &self.calculator.tokenizer.is_some())
            .finish()
    }
}

impl CachedEmbeddingCreator {
    /// Creator caching in the `origin` namespace of `cache_manager`
    pub fn new(
        origin: &str,
        model: impl Into<String>,
        cache_manager: &CacheManager,
        backend_factory: EmbeddingBackendFactory,
    ) -> Result<Self, DomainError> {
        let model = model.into();
        let cache = cache_manager.get_cache(origin, &CacheParameter::embedding(model.clone()))?;
        Self::with_cache(model, cache, backend_factory)
    }

    /// Creator writing to an explicit cache
    pub fn with_cache(
        model: impl Into<String>,
        cache: Arc<dyn Cache>,
        backend_factory: EmbeddingBackendFactory,
    ) -> Result<Self, DomainError> {
        let model = model.into();
        let backend = backend_factory()?;
        let tokenizer = TiktokenCounter::for_model(&model)
            .map(|counter| Arc::new(counter) as Arc<dyn TokenCounter>);

        Ok(Self {
            calculator: EmbeddingCalculator {
                cache,
                parameter: EmbeddingCacheParameter::new(model),
                tokenizer,
                max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
            },
            backend,
            backend_factory,
            threads: 1,
        })
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_max_token_length(mut self, max_token_length: usize) -> Self {
        self.calculator.max_token_length = max_token_length.max(1);
        self
    }

    /// Replaces the tokenizer used for overflow recovery, `None` disables recovery
    pub fn with_tokenizer(mut self, tokenizer: Option<Arc<dyn TokenCounter>>) -> Self {
        self.calculator.tokenizer = tokenizer;
        self
    }

    pub fn model(&self) -> &str {
        &self.calculator.parameter.model_name
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    async fn calculate_parallel(
        &self,
        elements: &[Arc<Element>],
    ) -> Result<Vec<Vec<f32>>, DomainError> {
        let thread_count = self.threads.min(elements.len());
        let per_worker = elements.len() / thread_count;

        let mut workers = JoinSet::new();
        for worker in 0..thread_count {
            let start = worker * per_worker;
            let end = if worker == thread_count - 1 {
                elements.len()
            } else {
                start + per_worker
            };
            let chunk = elements[start..end].to_vec();
            let calculator = self.calculator.clone();
            let factory = Arc::clone(&self.backend_factory);

            workers.spawn(async move {
                let backend = factory()?;
                let vectors = calculator.embed_all(backend.as_ref(), &chunk).await?;
                Ok::<_, DomainError>((worker, vectors))
            });
        }
        info!(workers = thread_count, elements = elements.len(), "Waiting for embeddings");

        let mut chunks: Vec<Option<Vec<Vec<f32>>>> = vec![None; thread_count];
        let outcome = tokio::time::timeout(EMBEDDING_TIMEOUT, async {
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(Ok((worker, vectors))) => chunks[worker] = Some(vectors),
                    Ok(Err(e)) => {
                        error!(error = %e, "Embedding worker failed");
                        return Err(e);
                    }
                    Err(e) => {
                        error!(error = %e, "Embedding worker panicked");
                        return Err(DomainError::internal(format!(
                            "Embedding worker panicked: {}",
                            e
                        )));
                    }
                }
            }
            Ok(())
        })
        .await;

        match outcome {
            Ok(result) => result?,
            Err(_) => {
                workers.abort_all();
                error!(timeout_secs = EMBEDDING_TIMEOUT.as_secs(), "Embedding did not finish in time");
                return Err(DomainError::internal("Embedding did not finish in time"));
            }
        }

        chunks
            .into_iter()
            .map(|chunk| chunk.ok_or_else(|| DomainError::internal("Embedding worker result missing")))
            .collect::<Result<Vec<_>, _>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }
}

#[async_trait]
impl EmbeddingCreator for CachedEmbeddingCreator {
    async fn calculate_embeddings(
        &self,
        elements: &[Arc<Element>],
    ) -> Result<Vec<Vec<f32>>, DomainError> {
        let (unique, positions) = dedupe_by_content(elements);
        if unique.len() < elements.len() {
            debug!(
                elements = elements.len(),
                distinct = unique.len(),
                "Embedding repeated contents once"
            );
        }

        let vectors = if self.threads <= 1 || unique.len() <= 1 {
            self.calculator.embed_all(self.backend.as_ref(), &unique).await?
        } else {
            self.calculate_parallel(&unique).await?
        };

        Ok(positions.into_iter().map(|i| vectors[i].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCache;
    use crate::domain::embedding::{MockEmbeddingProvider, MockTokenCounter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const MODEL: &str = "mock-embedding";

    fn element(id: &str, content: &str) -> Arc<Element> {
        Arc::new(Element::new(id, "requirement", content, 0, None, true).unwrap())
    }

    fn factory(provider: MockEmbeddingProvider) -> EmbeddingBackendFactory {
        Arc::new(move || Ok(Arc::new(provider.clone()) as Arc<dyn EmbeddingProvider>))
    }

    fn char_counter() -> Arc<dyn TokenCounter> {
        let mut counter = MockTokenCounter::new();
        counter
            .expect_count_tokens()
            .returning(|text| text.chars().count());
        Arc::new(counter)
    }

    fn key(content: &str) -> crate::domain::cache::CacheKey {
        EmbeddingCacheParameter::new(MODEL).create_cache_key(content)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let provider = MockEmbeddingProvider::new(MODEL, 4);
        let cache = Arc::new(MockCache::new().with_entry(&key("cached text"), "[0.5,0.25]"));
        let creator =
            CachedEmbeddingCreator::with_cache(MODEL, cache, factory(provider.clone())).unwrap();

        let vectors = creator
            .calculate_embeddings(&[element("a", "cached text")])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![0.5, 0.25]]);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_is_computed_once() {
        let provider = MockEmbeddingProvider::new(MODEL, 4);
        let cache = Arc::new(MockCache::new());
        let creator =
            CachedEmbeddingCreator::with_cache(MODEL, cache.clone(), factory(provider.clone()))
                .unwrap();
        let elements = [element("a", "same"), element("b", "same")];

        let vectors = creator.calculate_embeddings(&elements).await.unwrap();

        assert_eq!(vectors[0], provider.vector_for("same"));
        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(provider.calls(), 1);
        assert!(cache.raw(&key("same")).is_some());
    }

    #[tokio::test]
    async fn test_overflow_embeds_truncated_prefix() {
        let provider = MockEmbeddingProvider::new(MODEL, 4).with_max_input_chars(10);
        let cache = Arc::new(MockCache::new());
        let creator =
            CachedEmbeddingCreator::with_cache(MODEL, cache.clone(), factory(provider.clone()))
                .unwrap()
                .with_tokenizer(Some(char_counter()))
                .with_max_token_length(8);
        let content = "abcdefghijklmno";

        let vector = creator
            .calculate_embedding(&element("long", content))
            .await
            .unwrap();

        assert_eq!(vector, provider.vector_for("abcdefg"));
        let overflow_key =
            EmbeddingCacheParameter::new(MODEL).create_overflow_cache_key(content, 8);
        assert!(cache.raw(&overflow_key).is_some());
        assert!(cache.raw(&key(content)).is_none());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_recovered_embedding_short_circuits() {
        let provider = MockEmbeddingProvider::new(MODEL, 4).with_max_input_chars(10);
        let cache = Arc::new(MockCache::new());
        let creator =
            CachedEmbeddingCreator::with_cache(MODEL, cache, factory(provider.clone()))
                .unwrap()
                .with_tokenizer(Some(char_counter()))
                .with_max_token_length(8);
        let long = element("long", "abcdefghijklmno");

        let first = creator.calculate_embedding(&long).await.unwrap();
        let calls = provider.calls();
        let second = creator.calculate_embedding(&long).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls(), calls);
    }

    #[tokio::test]
    async fn test_failure_without_tokenizer_returns_original_error() {
        let provider = MockEmbeddingProvider::new(MODEL, 4).with_error("backend down");
        let creator = CachedEmbeddingCreator::with_cache(
            MODEL,
            Arc::new(MockCache::new()),
            factory(provider),
        )
        .unwrap()
        .with_tokenizer(None);

        let result = creator.calculate_embedding(&element("a", "text")).await;

        match result {
            Err(DomainError::Provider { message, .. }) => assert_eq!(message, "backend down"),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_within_limit_returns_original_error() {
        let provider = MockEmbeddingProvider::new(MODEL, 4).with_error("rate limited");
        let creator = CachedEmbeddingCreator::with_cache(
            MODEL,
            Arc::new(MockCache::new()),
            factory(provider.clone()),
        )
        .unwrap()
        .with_tokenizer(Some(char_counter()));

        let result = creator.calculate_embedding(&element("a", "short")).await;

        assert!(matches!(result, Err(DomainError::Provider { .. })));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_parallel_keeps_input_order() {
        let provider = MockEmbeddingProvider::new(MODEL, 4);
        let created = Arc::new(AtomicUsize::new(0));
        let backend_factory: EmbeddingBackendFactory = {
            let provider = provider.clone();
            let created = Arc::clone(&created);
            Arc::new(move || {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(provider.clone()) as Arc<dyn EmbeddingProvider>)
            })
        };
        let creator =
            CachedEmbeddingCreator::with_cache(MODEL, Arc::new(MockCache::new()), backend_factory)
                .unwrap()
                .with_threads(3);
        let elements: Vec<_> = (0..7)
            .map(|i| element(&format!("e{}", i), &format!("content number {}", i)))
            .collect();

        let vectors = creator.calculate_embeddings(&elements).await.unwrap();

        let expected: Vec<_> = (0..7)
            .map(|i| provider.vector_for(&format!("content number {}", i)))
            .collect();
        assert_eq!(vectors, expected);
        // one backend for the creator itself, one per worker
        assert_eq!(created.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_parallel_worker_failure_fails_stage() {
        let provider = MockEmbeddingProvider::new(MODEL, 4).with_error("boom");
        let creator = CachedEmbeddingCreator::with_cache(
            MODEL,
            Arc::new(MockCache::new()),
            factory(provider),
        )
        .unwrap()
        .with_tokenizer(None)
        .with_threads(2);
        let elements = [element("a", "x"), element("b", "y"), element("c", "z")];

        let result = creator.calculate_embeddings(&elements).await;

        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_repeated_content_is_embedded_once() {
        let provider = MockEmbeddingProvider::new(MODEL, 4).with_delay(Duration::from_millis(50));
        let cache = Arc::new(MockCache::new());
        let creator = CachedEmbeddingCreator::with_cache(MODEL, cache, factory(provider.clone()))
            .unwrap()
            .with_threads(2);
        let elements = [
            element("a", "same content"),
            element("b", "other content"),
            element("c", "same content"),
        ];

        let vectors = creator.calculate_embeddings(&elements).await.unwrap();

        assert_eq!(provider.calls(), 2);
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], provider.vector_for("same content"));
        assert_eq!(vectors[1], provider.vector_for("other content"));
        assert_eq!(vectors[2], vectors[0]);
    }

    #[test]
    fn test_dedupe_by_content() {
        let elements = [element("a", "x"), element("b", "y"), element("c", "x")];

        let (unique, positions) = dedupe_by_content(&elements);

        assert_eq!(
            unique.iter().map(|e| e.identifier()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(positions, vec![0, 1, 0]);
    }

    #[tokio::test]
    async fn test_overflow_tokens_are_counted_off_the_runtime_thread() {
        let runtime_thread = std::thread::current().id();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut counter = MockTokenCounter::new();
        {
            let seen = Arc::clone(&seen);
            counter.expect_count_tokens().returning(move |text| {
                seen.lock().unwrap().push(std::thread::current().id());
                text.chars().count()
            });
        }
        let provider = MockEmbeddingProvider::new(MODEL, 4).with_max_input_chars(10);
        let cache = Arc::new(MockCache::new());
        let creator = CachedEmbeddingCreator::with_cache(MODEL, cache, factory(provider.clone()))
            .unwrap()
            .with_tokenizer(Some(Arc::new(counter)))
            .with_max_token_length(8);

        let vector = creator
            .calculate_embedding(&element("long", "abcdefghijklmno"))
            .await
            .unwrap();

        assert_eq!(vector, provider.vector_for("abcdefg"));
        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|id| *id != runtime_thread));
    }

    #[test]
    fn test_longest_prefix_within_limit() {
        let counter = char_counter();

        assert_eq!(longest_prefix_within(counter.as_ref(), "abcdefghij", 4), "abc");
        assert_eq!(longest_prefix_within(counter.as_ref(), "äöüßxyz", 3), "äö");
        assert_eq!(longest_prefix_within(counter.as_ref(), "abc", 1), "");
    }
}
