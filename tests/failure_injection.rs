//! Failure injection tests against real mock backends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backend_guard::config::{CircuitBreakerConfig, GuardConfig, RetryConfig};
use backend_guard::health::{HealthProbe, HttpProbeTarget, ProbeTarget};
use backend_guard::resilience::{BackendError, CircuitState, Classify, CIRCUIT_OPEN};
use backend_guard::GuardContext;

mod common;

fn probe_for(addr: SocketAddr, timeout: Duration) -> HealthProbe {
    let target = HttpProbeTarget::new(&format!("http://{addr}"), "/health").unwrap();
    HealthProbe::new("backend", Arc::new(target), timeout)
}

fn fast_config(addr: SocketAddr) -> GuardConfig {
    GuardConfig {
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 1,
            timeout_ms: 2_000,
            reset_timeout_ms: 300,
        },
        retries: RetryConfig {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 50,
            jitter_ms: 5,
            ..RetryConfig::default()
        },
        backend: backend_guard::config::BackendConfig {
            name: "backend".into(),
            base_url: format!("http://{addr}"),
        },
        ..GuardConfig::default()
    }
}

async fn get(client: &reqwest::Client, addr: SocketAddr) -> Result<String, BackendError> {
    let response = client.get(format!("http://{addr}/records")).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::http(status.as_u16(), status.to_string()));
    }
    Ok(response.text().await?)
}

#[tokio::test]
async fn test_probe_healthy_backend() {
    let addr = common::start_fixed_backend(200).await;
    let probe = probe_for(addr, Duration::from_secs(2));

    let status = probe.check_health().await;
    assert!(status.healthy, "{status:?}");
    assert!(status.error.is_none());
    assert!(status.response_time_ms < 2_000);
}

#[tokio::test]
async fn test_probe_client_error_counts_as_reachable() {
    let addr = common::start_fixed_backend(404).await;
    let status = probe_for(addr, Duration::from_secs(2)).check_health().await;

    assert!(status.healthy);
    assert_eq!(status.status, Some(404));
}

#[tokio::test]
async fn test_probe_server_error_is_unhealthy() {
    let addr = common::start_fixed_backend(503).await;
    let status = probe_for(addr, Duration::from_secs(2)).check_health().await;

    assert!(!status.healthy);
    assert_eq!(status.status, Some(503));
}

#[tokio::test]
async fn test_probe_times_out_slow_backend() {
    let addr = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "late".to_string())
    })
    .await;

    let status = probe_for(addr, Duration::from_millis(200)).check_health().await;
    assert!(!status.healthy);
    assert_eq!(status.error.as_deref(), Some("timeout after 200ms"));
    assert!(status.response_time_ms >= 200);
}

#[tokio::test]
async fn test_probe_connection_refused() {
    let addr = common::refused_addr().await;
    let target = HttpProbeTarget::new(&format!("http://{addr}"), "/health").unwrap();

    let err = target.probe().await.unwrap_err();
    assert_eq!(err.code(), Some("ECONNREFUSED"));

    let status = HealthProbe::new("backend", Arc::new(target), Duration::from_secs(2))
        .check_health()
        .await;
    assert!(!status.healthy);
    assert_eq!(status.status, None);
}

#[tokio::test]
async fn test_guarded_call_survives_transient_failures() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_backend(move || {
        let cc = cc.clone();
        async move {
            if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                (503, "Service Unavailable".into())
            } else {
                (200, "Success".into())
            }
        }
    })
    .await;

    let ctx = GuardContext::from_config(fast_config(addr)).unwrap();
    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let body = ctx.call(|| get(&client, addr)).await.unwrap();
    assert_eq!(body, "Success");
    assert_eq!(call_count.load(Ordering::SeqCst), 3);
    assert_eq!(ctx.breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_breaker_opens_then_recovers() {
    let healthy = Arc::new(AtomicU32::new(0));
    let flag = healthy.clone();
    let addr = common::start_programmable_backend(move || {
        let flag = flag.clone();
        async move {
            if flag.load(Ordering::SeqCst) == 1 {
                (200, "back".into())
            } else {
                (500, "Internal Server Error".into())
            }
        }
    })
    .await;

    let ctx = GuardContext::from_config(fast_config(addr)).unwrap();
    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let err = ctx.call(|| get(&client, addr)).await.unwrap_err();
    assert_eq!(err.code(), Some(CIRCUIT_OPEN));
    assert_eq!(ctx.breaker().state(), CircuitState::Open);
    assert_eq!(ctx.breaker().stats().total_failures, 3);

    // Still rejected inside the reset window, without touching the backend.
    let err = ctx.call(|| get(&client, addr)).await.unwrap_err();
    assert!(err.is_open());

    healthy.store(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let body = ctx.call(|| get(&client, addr)).await.unwrap();
    assert_eq!(body, "back");
    assert_eq!(ctx.breaker().state(), CircuitState::Closed);
}
