//! Fan-out/fan-in probing of resolver candidates.

use tokio::sync::mpsc;

use super::resolver::{Resolve, UdpResolver};
use super::subnet::SubnetProbe;
use crate::config::parse_resolver_addr;

/// Concurrently validate candidate addresses and build resolver handles
/// for the ones that pass the EDNS client-subnet check.
///
/// One task is spawned per parseable candidate; each task reports exactly
/// one outcome on the result channel, and exactly one outcome per task is
/// drained here, so no probe task is ever abandoned. Successful handles
/// beyond `max` hold live resources and are explicitly stopped rather
/// than dropped.
///
/// Individual probe failures are not reported; failure is expressed only
/// by exclusion, and an empty result means no candidate was usable.
pub async fn probe_resolvers<P: SubnetProbe>(
    probe: &P,
    candidates: &[&str],
    max: usize,
    rate: u32,
) -> Vec<UdpResolver> {
    if candidates.is_empty() || max == 0 {
        return Vec::new();
    }

    let addrs: Vec<_> = candidates
        .iter()
        .filter_map(|c| match parse_resolver_addr(c) {
            Some(addr) => Some(addr),
            None => {
                tracing::debug!(candidate = %c, "skipping unparseable resolver candidate");
                None
            }
        })
        .collect();

    if addrs.is_empty() {
        return Vec::new();
    }

    // Sized to the probe count so no sender can block on a slow collector.
    let (tx, mut rx) = mpsc::channel(addrs.len());
    let spawned = addrs.len();

    for addr in addrs {
        let probe = probe.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = match probe.check(addr).await {
                Ok(()) => UdpResolver::new(addr, rate),
                Err(err) => {
                    tracing::debug!(addr = %addr, error = %err, "resolver probe failed");
                    None
                }
            };
            let _ = tx.send(outcome).await;
        });
    }
    drop(tx);

    metrics::counter!(crate::metrics::RESOLVERS_PROBED).increment(spawned as u64);

    let mut accepted = Vec::new();
    for _ in 0..spawned {
        match rx.recv().await.flatten() {
            Some(resolver) if accepted.len() < max => accepted.push(resolver),
            Some(surplus) => surplus.stop(),
            None => {}
        }
    }

    metrics::counter!(crate::metrics::RESOLVERS_ADMITTED).increment(accepted.len() as u64);
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::subnet::tests::MockProbe;

    fn candidates(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.0.0.{i}")).collect()
    }

    #[tokio::test]
    async fn should_admit_all_when_under_cap() {
        let probe = MockProbe::accepting();
        let cands = candidates(5);
        let refs: Vec<&str> = cands.iter().map(String::as_str).collect();

        let accepted = probe_resolvers(&probe, &refs, 10, 7).await;

        assert_eq!(accepted.len(), 5);
        assert_eq!(probe.check_count(), 5);
        for r in &accepted {
            assert_eq!(r.rate(), 7);
            assert!(!r.is_stopped());
        }
    }

    #[tokio::test]
    async fn should_cap_accepted_resolvers() {
        let probe = MockProbe::accepting();
        let cands = candidates(20);
        let refs: Vec<&str> = cands.iter().map(String::as_str).collect();

        let accepted = probe_resolvers(&probe, &refs, 3, 5).await;

        // Every candidate is probed, but only `max` are admitted; the
        // function returning at all proves the per-probe drain discipline.
        assert_eq!(accepted.len(), 3);
        assert_eq!(probe.check_count(), 20);
    }

    #[tokio::test]
    async fn should_return_empty_when_all_probes_fail() {
        let probe = MockProbe::rejecting();
        let cands = candidates(8);
        let refs: Vec<&str> = cands.iter().map(String::as_str).collect();

        let accepted = probe_resolvers(&probe, &refs, 10, 5).await;

        assert!(accepted.is_empty());
        assert_eq!(probe.check_count(), 8);
    }

    #[tokio::test]
    async fn should_default_missing_port_to_53() {
        let probe = MockProbe::accepting();

        let accepted = probe_resolvers(&probe, &["10.0.0.1", "10.0.0.2:5353"], 10, 5).await;

        let mut ports: Vec<u16> = accepted.iter().map(|r| r.address().port()).collect();
        ports.sort_unstable();
        assert_eq!(ports, vec![53, 5353]);
    }

    #[tokio::test]
    async fn should_skip_unparseable_candidates() {
        let probe = MockProbe::accepting();

        let accepted = probe_resolvers(&probe, &["bogus", "10.0.0.1"], 10, 5).await;

        assert_eq!(accepted.len(), 1);
        assert_eq!(probe.check_count(), 1);
    }

    #[tokio::test]
    async fn should_return_empty_for_zero_cap() {
        let probe = MockProbe::accepting();
        let accepted = probe_resolvers(&probe, &["10.0.0.1"], 0, 5).await;
        assert!(accepted.is_empty());
    }
}
