//! Integration tests for the access gate: policy, elevation, expiry, launch.

mod common;

use async_trait::async_trait;
use chrono::TimeZone;
use common::{claims, ProbeMode, ScriptedProbe, ScriptedProvider, CLIENT_ID};
use opsgate_auth::{Access, AccessDenied, GrantPolicy, ManualClock};
use opsgate_runtime::auth::{ApprovalAuthority, ApprovalDecision, ApprovalError, ElevationRequest};
use opsgate_runtime::bootstrap::{AuthBootstrap, BootstrapSettings};
use opsgate_runtime::context::AccessContext;
use opsgate_runtime::launcher::{LaunchResult, ToolLauncher};
use opsgate_runtime::{AutoApprove, ElevationError};
use opsgate_types::{Capability, Tool};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<Tool>>,
}

impl ToolLauncher for RecordingLauncher {
    fn launch(&self, tool: Tool) -> LaunchResult {
        self.launched.lock().push(tool);
        LaunchResult::ok()
    }
}

#[derive(Debug, Default)]
struct CountingDenier {
    calls: AtomicUsize,
}

#[async_trait]
impl ApprovalAuthority for CountingDenier {
    async fn decide(&self, _request: &ElevationRequest) -> Result<ApprovalDecision, ApprovalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ApprovalDecision::Denied {
            reason: Some("change freeze".into()),
        })
    }
}

fn bootstrap_as(role: &str) -> AuthBootstrap {
    AuthBootstrap::new(
        Arc::new(ScriptedProbe::new(ProbeMode::Up)),
        Arc::new(ScriptedProvider::with_session(claims("u-1", role, "sid-1"))),
        BootstrapSettings::new(CLIENT_ID),
    )
}

#[tokio::test]
async fn operator_is_held_to_policy() {
    let denier = Arc::new(CountingDenier::default());
    let ctx = AccessContext::builder(bootstrap_as("operator"))
        .authority(denier.clone())
        .build();
    ctx.start().await;

    assert_eq!(ctx.check(Capability::ViewHmi), Ok(()));
    assert_eq!(ctx.check(Capability::LaunchWincc), Ok(()));
    assert!(matches!(
        ctx.check(Capability::EditConfiguration),
        Err(AccessDenied::Forbidden { .. })
    ));

    let err = ctx
        .request_elevation(Capability::EditConfiguration, "fix setpoint")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ElevationError::Unauthorized(AccessDenied::NotElevatable { .. })
    ));
    assert_eq!(denier.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.grants().grant_count(), 0);
}

#[tokio::test]
async fn elevation_lifecycle_for_engineer() {
    let t0 = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(t0));
    let ctx = AccessContext::builder(bootstrap_as("engineer"))
        .authority(Arc::new(AutoApprove))
        .clock(clock.clone())
        .build();
    ctx.start().await;

    assert_eq!(
        ctx.check(Capability::EditConfiguration),
        Err(AccessDenied::ElevationRequired {
            capability: Capability::EditConfiguration
        })
    );

    let outcome = ctx
        .request_elevation(Capability::EditConfiguration, "recipe change")
        .await
        .unwrap();
    assert!(outcome.approved);
    assert_eq!(outcome.expires_at, Some(t0 + chrono::Duration::minutes(15)));
    assert_eq!(ctx.check(Capability::EditConfiguration), Ok(()));

    let view = ctx
        .capabilities()
        .into_iter()
        .find(|v| v.capability == Capability::EditConfiguration)
        .unwrap();
    assert_eq!(view.access, Access::Elevatable);
    assert_eq!(view.granted_until, outcome.expires_at);
    assert!(view.usable);

    clock.advance(chrono::Duration::minutes(15));
    assert_eq!(
        ctx.check(Capability::EditConfiguration),
        Err(AccessDenied::GrantExpired {
            capability: Capability::EditConfiguration,
            expired_at: t0 + chrono::Duration::minutes(15),
        })
    );
    // The lapse is reported on every look, not just the first.
    assert!(matches!(
        ctx.check(Capability::EditConfiguration),
        Err(AccessDenied::GrantExpired { .. })
    ));

    // A fresh elevation replaces the expired grant.
    ctx.request_elevation(Capability::EditConfiguration, "second batch")
        .await
        .unwrap();
    assert_eq!(ctx.check(Capability::EditConfiguration), Ok(()));
}

#[tokio::test]
async fn denial_is_a_value_and_stores_nothing() {
    let denier = Arc::new(CountingDenier::default());
    let ctx = AccessContext::builder(bootstrap_as("engineer"))
        .authority(denier.clone())
        .build();
    ctx.start().await;

    let outcome = ctx
        .request_elevation(Capability::EditConfiguration, "please")
        .await
        .unwrap();

    assert!(!outcome.approved);
    assert_eq!(outcome.expires_at, None);
    assert_eq!(outcome.denial_reason.as_deref(), Some("change freeze"));
    assert_eq!(denier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.grants().grant_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn silent_authority_times_out_without_grant() {
    #[derive(Debug)]
    struct Silent;

    #[async_trait]
    impl ApprovalAuthority for Silent {
        async fn decide(
            &self,
            _request: &ElevationRequest,
        ) -> Result<ApprovalDecision, ApprovalError> {
            std::future::pending().await
        }
    }

    let ctx = AccessContext::builder(bootstrap_as("engineer"))
        .authority(Arc::new(Silent))
        .approval_timeout(Duration::from_secs(30))
        .build();
    ctx.start().await;

    let err = ctx
        .request_elevation(Capability::EditConfiguration, "waiting")
        .await
        .unwrap_err();
    assert!(matches!(err, ElevationError::Timeout(_)));
    assert_eq!(ctx.grants().grant_count(), 0);
}

#[tokio::test]
async fn logout_clears_grants() {
    let ctx = AccessContext::builder(bootstrap_as("engineer"))
        .authority(Arc::new(AutoApprove))
        .build();
    ctx.start().await;
    let session = ctx.subject().unwrap().session_id().clone();

    ctx.request_elevation(Capability::EditConfiguration, "x")
        .await
        .unwrap();
    assert_eq!(ctx.grants().list_grants(&session).unwrap().len(), 1);

    assert_eq!(ctx.logout().await, Some(session.clone()));
    assert!(ctx.grants().list_grants(&session).unwrap().is_empty());
    assert_eq!(
        ctx.check(Capability::EditConfiguration),
        Err(AccessDenied::NoSession)
    );
    assert!(ctx.capabilities().is_empty());
}

#[tokio::test]
async fn launch_is_gated_by_check() {
    let launcher = Arc::new(RecordingLauncher::default());
    let ctx = AccessContext::builder(bootstrap_as("operator"))
        .launcher(launcher.clone())
        .build();

    assert_eq!(ctx.launch(Tool::Wincc), Err(AccessDenied::NoSession));
    assert!(launcher.launched.lock().is_empty());

    ctx.start().await;
    assert_eq!(ctx.launch(Tool::HmiNavi), Ok(LaunchResult::ok()));
    assert_eq!(*launcher.launched.lock(), vec![Tool::HmiNavi]);
}
