//! Tiered resolver pool composition and the pool query path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hickory_proto::op::Message;
use hickory_proto::rr::{Name, RecordType};
use moka::future::Cache;

use super::probe::probe_resolvers;
use super::resolver::{Resolve, ResolveError, UdpResolver};
use super::subnet::SubnetProbe;
use crate::config::{
    Config, DEFAULT_QUERIES_PER_BASELINE_RESOLVER, DEFAULT_QUERIES_PER_PUBLIC_RESOLVER,
    DEFAULT_BASELINE_RESOLVERS, PUBLIC_RESOLVERS, parse_resolver_addr,
};

/// Per-tier timeout for pools built from probed or trusted resolvers.
const POOL_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-tier timeout for the baseline tier, chosen for reliability.
const BASELINE_TIMEOUT: Duration = Duration::from_secs(1);

/// TTL for the pool-level answer cache.
const ANSWER_CACHE_TTL: Duration = Duration::from_secs(60);

/// A tier of resolvers with an optional fallback pool.
///
/// Queries rotate across the tier members under the per-tier timeout; when
/// every member fails, the query falls through to the fallback pool. A pool
/// with an empty tier is valid as long as it carries a fallback.
pub struct ResolverPool<R: Resolve> {
    tier: Vec<R>,
    timeout: Duration,
    fallback: Option<Box<ResolverPool<R>>>,
    trust_level: u8,
    budget: usize,
    next: AtomicUsize,
    answers: Option<Cache<(Name, RecordType), Message>>,
}

impl<R: Resolve> ResolverPool<R> {
    /// Compose a pool from a tier and an optional fallback.
    ///
    /// Returns `None` when the tier is empty and there is no fallback:
    /// such a pool could never answer anything.
    pub fn new(
        tier: Vec<R>,
        timeout: Duration,
        fallback: Option<Box<ResolverPool<R>>>,
        trust_level: u8,
    ) -> Option<Self> {
        if tier.is_empty() && fallback.is_none() {
            return None;
        }

        Some(Self {
            tier,
            timeout,
            fallback,
            trust_level,
            budget: 0,
            next: AtomicUsize::new(0),
            answers: None,
        })
    }

    /// Record the aggregate query budget the pool was derived from.
    ///
    /// Carried on the pool instead of being written back into shared
    /// configuration, so concurrent pool builds cannot observe each
    /// other's derived values.
    #[must_use]
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Attach an answer cache in front of the tier.
    #[must_use]
    pub fn with_answer_cache(mut self, ttl: Duration) -> Self {
        self.answers = Some(Cache::builder().time_to_live(ttl).build());
        self
    }

    /// Number of resolvers in this pool's own tier.
    pub fn num_resolvers(&self) -> usize {
        self.tier.len()
    }

    pub fn trust_level(&self) -> u8 {
        self.trust_level
    }

    /// The aggregate queries-per-second budget this tier was derived from.
    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// The tier members, for diagnostics.
    pub fn resolvers(&self) -> &[R] {
        &self.tier
    }

    /// Type-erased entry point for the fallback recursion; boxing through a
    /// concrete return type breaks the async opaque-type cycle.
    fn resolve_boxed<'a>(
        &'a self,
        query: &'a Message,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Message, ResolveError>> + Send + 'a>,
    > {
        Box::pin(Resolve::resolve(self, query))
    }
}

impl<R: Resolve> Resolve for ResolverPool<R> {
    async fn resolve(&self, query: &Message) -> Result<Message, ResolveError> {
        let key = query
            .queries()
            .first()
            .map(|q| (q.name().clone(), q.query_type()));

        if let (Some(cache), Some(key)) = (&self.answers, &key) {
            if let Some(mut hit) = cache.get(key).await {
                hit.set_id(query.id());
                return Ok(hit);
            }
        }

        let n = self.tier.len();
        if n > 0 {
            let start = self.next.fetch_add(1, Ordering::Relaxed);
            for i in 0..n {
                let member = &self.tier[(start + i) % n];
                match tokio::time::timeout(self.timeout, member.resolve(query)).await {
                    Ok(Ok(response)) => {
                        if let (Some(cache), Some(key)) = (&self.answers, &key) {
                            cache.insert(key.clone(), response.clone()).await;
                        }
                        return Ok(response);
                    }
                    Ok(Err(_)) | Err(_) => {}
                }
            }
        }

        if let Some(fallback) = &self.fallback {
            // Boxed to break async recursion through the fallback chain.
            return fallback.resolve_boxed(query).await;
        }

        Err(ResolveError::Exhausted)
    }

    fn stop(&self) {
        for member in &self.tier {
            member.stop();
        }
        if let Some(fallback) = &self.fallback {
            fallback.stop();
        }
    }
}

/// Derive the aggregate query budget for `num` resolvers.
///
/// An unset budget defaults to `num * default_rate`; an explicit budget is
/// raised to at least `num` so every resolver keeps a non-zero rate.
fn derive_budget(configured: Option<usize>, num: usize, default_rate: usize) -> usize {
    match configured {
        None => num * default_rate,
        Some(budget) => budget.max(num),
    }
}

/// Build a single-tier pool from the explicitly trusted resolver list.
///
/// Returns `None` when no trusted address yields a handle.
pub fn trusted_pool(cfg: &Config, max: usize) -> Option<Arc<ResolverPool<UdpResolver>>> {
    let num = cfg.trusted_resolvers.len().min(max);
    if num == 0 {
        return None;
    }

    let budget = derive_budget(
        cfg.max_dns_queries,
        num,
        DEFAULT_QUERIES_PER_BASELINE_RESOLVER,
    );
    let rate = (budget / num) as u32;

    let tier: Vec<_> = cfg
        .trusted_resolvers
        .iter()
        .filter_map(|addr| parse_resolver_addr(addr))
        .filter_map(|addr| UdpResolver::new(addr, rate))
        .collect();

    let pool = ResolverPool::new(tier, POOL_TIMEOUT, None, 1)?
        .with_budget(budget)
        .with_answer_cache(ANSWER_CACHE_TTL);

    tracing::info!(
        resolvers = pool.num_resolvers(),
        rate,
        budget,
        "composed trusted resolver pool"
    );
    Some(Arc::new(pool))
}

/// Build the two-tier public pool: a probed public tier falling back to a
/// baseline tier of well-known resolvers.
///
/// The baseline tier is built from addresses assumed reachable, so a probe
/// pass that admits nothing still yields a usable pool; `None` is only
/// possible if composition itself produces nothing.
pub async fn public_pool<P: SubnetProbe>(
    probe: &P,
    cfg: &Config,
    max: usize,
) -> Option<Arc<ResolverPool<UdpResolver>>> {
    let num = PUBLIC_RESOLVERS.len().min(max);
    let budget = derive_budget(cfg.max_dns_queries, num, DEFAULT_QUERIES_PER_PUBLIC_RESOLVER);

    let baseline_tier: Vec<_> = DEFAULT_BASELINE_RESOLVERS
        .iter()
        .filter_map(|addr| parse_resolver_addr(addr))
        .filter_map(|addr| {
            UdpResolver::new(addr, DEFAULT_QUERIES_PER_BASELINE_RESOLVER as u32)
        })
        .collect();
    let baseline = ResolverPool::new(baseline_tier, BASELINE_TIMEOUT, None, 1)?;

    let public_tier = probe_resolvers(
        probe,
        PUBLIC_RESOLVERS,
        max,
        DEFAULT_QUERIES_PER_PUBLIC_RESOLVER as u32,
    )
    .await;

    if public_tier.is_empty() {
        tracing::warn!("no public resolver passed probing; relying on the baseline tier");
    }

    let pool = ResolverPool::new(public_tier, POOL_TIMEOUT, Some(Box::new(baseline)), 2)?
        .with_budget(budget)
        .with_answer_cache(ANSWER_CACHE_TTL);

    tracing::info!(
        public = pool.num_resolvers(),
        baseline = DEFAULT_BASELINE_RESOLVERS.len(),
        budget,
        "composed public resolver pool"
    );
    Some(Arc::new(pool))
}
