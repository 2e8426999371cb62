//! Controller tests

use std::sync::Arc;
use std::time::Duration;

use openapi_client::models::TaskState;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_test::{assert_err, assert_ok};

use relctl::app::controller::Controller;
use relctl::app::intents::Intent;
use relctl::errors::ControllerError;
use relctl::lifecycle::diff_selection::DiffTarget;
use relctl::lifecycle::download::DownloadState;
use relctl::lifecycle::gate::{DeployGate, DeployKind, DeployPlan, DeployRequest};
use relctl::lifecycle::gitops::GitOpsSurface;
use relctl::lifecycle::ActionSurface;
use relctl::models::downstream::{Downstream, GitOps, GitProvider};
use relctl::models::release::{Release, ReleaseStatus};

use crate::mock::{failed_status, options, status, Failure, MockApi};

fn downstream_at(current: i64) -> Downstream {
    Downstream {
        name: "this-cluster".to_string(),
        current_version: Some(Release::new(current, ReleaseStatus::Deployed)),
        ..Default::default()
    }
}

fn drain(intents: &mut UnboundedReceiver<Intent>) -> Vec<Intent> {
    let mut drained = Vec::new();
    while let Ok(intent) = intents.try_recv() {
        drained.push(intent);
    }
    drained
}

async fn controller_with(
    api: &Arc<MockApi>,
) -> (Arc<Controller>, UnboundedReceiver<Intent>) {
    let (controller, intents) = Controller::new(api.clone(), options());
    controller.refresh_history().await.unwrap();
    (controller, intents)
}

#[tokio::test]
async fn test_pending_preflight_gates_without_deploying() {
    let api = Arc::new(MockApi::new(
        downstream_at(3),
        vec![
            Release::new(4, ReleaseStatus::PendingPreflight),
            Release::new(3, ReleaseStatus::Deployed),
        ],
    ));
    let (controller, mut intents) = controller_with(&api).await;

    let plan = controller
        .request_deploy(4, DeployRequest::default())
        .await
        .unwrap();
    assert_eq!(plan, DeployPlan::Gate(DeployGate::SkipPreflights));
    assert_eq!(api.count("deploy"), 0);

    let intents = drain(&mut intents);
    assert!(intents.contains(&Intent::HistoryRefreshed));
    assert!(intents.iter().any(|intent| matches!(
        intent,
        Intent::RequestDeploy { release, gate: DeployGate::SkipPreflights } if release.sequence == 4
    )));

    // results are still being computed, so history is refetched
    assert!(controller.is_history_polling());
    controller.dispose();
}

#[tokio::test]
async fn test_failed_preflight_warns_then_force_deploys_once() {
    let mut release = Release::new(4, ReleaseStatus::Pending);
    release.preflight_result = Some(r#"{"results": [{"isFail": true}, {"isPass": true}]}"#.to_string());
    let api = Arc::new(MockApi::new(
        downstream_at(3),
        vec![release, Release::new(3, ReleaseStatus::Deployed)],
    ));
    let (controller, mut intents) = controller_with(&api).await;

    let plan = controller
        .request_deploy(4, DeployRequest::default())
        .await
        .unwrap();
    assert_eq!(plan, DeployPlan::Gate(DeployGate::PreflightWarning));
    assert_eq!(api.count("deploy"), 0);

    let plan = controller
        .request_deploy(
            4,
            DeployRequest {
                force: true,
                continue_with_failed_preflights: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        plan,
        DeployPlan::Finalize {
            skip_preflights: false,
            continue_with_failed_preflights: true,
        }
    );

    assert_eq!(api.count("deploy"), 1);
    assert!(api
        .calls()
        .contains(&"deploy:4:skip=false:continue=true".to_string()));
    // a successful deploy refetches history
    assert_eq!(api.count("versions"), 2);
    assert!(controller.deploy_error_msg().is_none());

    drain(&mut intents);
    controller.dispose();
}

#[tokio::test]
async fn test_confirm_gate_for_rollback_with_auto_deploy() {
    let mut past = Release::new(2, ReleaseStatus::Deployed);
    past.deployed_at = Some(chrono::Utc::now());
    let mut downstream = downstream_at(3);
    downstream.allow_rollback = true;
    downstream.past_versions = vec![past.clone()];

    let api = Arc::new(MockApi::new(
        downstream.clone(),
        vec![Release::new(3, ReleaseStatus::Deployed), past],
    ));
    api.set_app(relctl::models::downstream::App {
        slug: "sentry".to_string(),
        auto_deploy: "semver-patch".to_string(),
        downstream: Some(downstream),
        ..Default::default()
    });
    let (controller, _intents) = controller_with(&api).await;

    let plan = controller
        .request_deploy(2, DeployRequest::default())
        .await
        .unwrap();
    assert_eq!(
        plan,
        DeployPlan::Gate(DeployGate::Confirm {
            kind: DeployKind::Rollback,
            disables_auto_deploy: true,
        })
    );
    assert_eq!(api.count("deploy"), 0);
}

#[tokio::test]
async fn test_deploy_error_is_scoped() {
    let api = Arc::new(MockApi::new(
        downstream_at(3),
        vec![Release::new(4, ReleaseStatus::Pending)],
    ));
    api.fail("deploy", Failure::Server);
    let (controller, mut intents) = controller_with(&api).await;

    let result = controller.request_deploy(4, DeployRequest::force()).await;
    assert!(matches!(result, Err(ControllerError::Request { .. })));
    assert_eq!(controller.deploy_error_msg().as_deref(), Some("internal error"));
    assert!(!controller.is_disposed());
    assert!(!drain(&mut intents).contains(&Intent::SessionExpired));
}

#[tokio::test]
async fn test_gitops_not_deployable_never_calls_server() {
    let mut release = Release::new(4, ReleaseStatus::Pending);
    release.git_deployable = Some(false);
    let mut undownloaded = Release::new(5, ReleaseStatus::PendingDownload);
    undownloaded.git_deployable = Some(false);

    let mut downstream = downstream_at(3);
    downstream.gitops = GitOps {
        is_connected: true,
        uri: "https://github.com/acme/deploys".to_string(),
        provider: Some(GitProvider::Github),
    };
    let api = Arc::new(MockApi::new(downstream, vec![undownloaded, release]));
    let (controller, _intents) = controller_with(&api).await;

    for decision in controller.decisions().await {
        assert_eq!(
            decision.surface,
            ActionSurface::GitOps(GitOpsSurface::NothingToCommit)
        );
        assert!(!decision.surface.is_enabled());
    }

    assert_ok!(controller.activate(4).await);
    assert_ok!(controller.activate(5).await);
    let plan = controller
        .request_deploy(4, DeployRequest::force())
        .await
        .unwrap();
    assert!(matches!(plan, DeployPlan::NotAllowed(_)));

    assert_eq!(api.count("deploy"), 0);
    assert_eq!(api.count("download"), 0);
}

#[tokio::test]
async fn test_gitops_commit_opens_external_view() {
    let mut release = Release::new(4, ReleaseStatus::Pending);
    release.commit_url = Some("https://github.com/acme/deploys/commit/abc123".to_string());
    let mut downstream = downstream_at(3);
    downstream.gitops.is_connected = true;

    let api = Arc::new(MockApi::new(downstream, vec![release]));
    let (controller, mut intents) = controller_with(&api).await;
    drain(&mut intents);

    controller.activate(4).await.unwrap();
    assert_eq!(
        drain(&mut intents),
        vec![Intent::RequestExternalCommitView {
            url: "https://github.com/acme/deploys/commit/abc123".to_string()
        }]
    );
    assert_eq!(api.count("deploy"), 0);
}

#[tokio::test]
async fn test_configure_is_requested_not_deployed() {
    let api = Arc::new(MockApi::new(
        downstream_at(3),
        vec![Release::new(4, ReleaseStatus::PendingConfig)],
    ));
    let (controller, mut intents) = controller_with(&api).await;
    drain(&mut intents);

    controller.activate(4).await.unwrap();
    assert!(matches!(
        drain(&mut intents).as_slice(),
        [Intent::RequestConfigure { release }] if release.sequence == 4
    ));
    assert_eq!(api.count("deploy"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_download_completion_refetches_and_clears() {
    let mut release = Release::new(5, ReleaseStatus::PendingDownload);
    release.parent_sequence = 15;
    let api = Arc::new(MockApi::new(downstream_at(3), vec![release]));
    api.script_download_statuses(
        15,
        vec![
            status(TaskState::Running, "Fetching bundle"),
            status(TaskState::Successful, "Download complete"),
        ],
    );
    let (controller, mut intents) = controller_with(&api).await;

    controller.activate(5).await.unwrap();
    assert_eq!(api.count("download:15"), 1);
    assert!(controller.is_download_polling(5));
    assert_eq!(
        controller.download(5).unwrap().state(),
        &DownloadState::Downloading
    );
    let decision = &controller.decisions().await[0];
    assert_eq!(decision.surface, ActionSurface::Download { in_progress: true });

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        controller.download(5).unwrap().message(),
        Some("Fetching bundle")
    );

    let mut downloaded = Release::new(5, ReleaseStatus::Pending);
    downloaded.parent_sequence = 15;
    api.set_releases(vec![downloaded]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!controller.is_download_polling(5));
    assert!(controller.download(5).is_none());
    assert_eq!(api.count("versions"), 2);
    assert_eq!(
        controller.history().await.release(5).unwrap().status,
        ReleaseStatus::Pending
    );

    let intents = drain(&mut intents);
    assert!(intents
        .iter()
        .any(|intent| matches!(intent, Intent::RequestDownload { release } if release.sequence == 5)));

    // nothing polls after completion
    let polls = api.count("download_status");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(api.count("download_status"), polls);
}

#[tokio::test(start_paused = true)]
async fn test_failed_download_leaves_other_pollers_running() {
    let mut first = Release::new(5, ReleaseStatus::PendingDownload);
    first.parent_sequence = 15;
    let mut second = Release::new(6, ReleaseStatus::PendingDownload);
    second.parent_sequence = 16;
    let api = Arc::new(MockApi::new(downstream_at(3), vec![second, first]));
    api.script_download_statuses(15, vec![failed_status("bundle is corrupt")]);
    api.script_download_statuses(16, vec![status(TaskState::Running, "Fetching")]);
    let (controller, _intents) = controller_with(&api).await;

    controller.start_download(5).await.unwrap();
    controller.start_download(6).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!controller.is_download_polling(5));
    assert!(controller.is_download_polling(6));

    let failed = controller.download(5).unwrap();
    assert_eq!(failed.state(), &DownloadState::Failed);
    assert_eq!(failed.message(), Some("bundle is corrupt"));

    let decisions = controller.decisions().await;
    let decision = decisions.iter().find(|d| d.sequence == 5).unwrap();
    assert!(decision.download.as_ref().unwrap().failed);
    assert!(decision.surface.is_enabled());

    // a failed download can be retried
    controller.start_download(5).await.unwrap();
    assert_eq!(api.count("download:15"), 2);
    controller.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_console_upgrade_polls_until_done() {
    let mut release = Release::new(4, ReleaseStatus::Pending);
    release.needs_kots_upgrade = true;
    let api = Arc::new(MockApi::new(downstream_at(3), vec![release]));
    api.script_upgrade_statuses(vec![
        status(TaskState::Running, "Upgrading admin console"),
        status(TaskState::Successful, "Upgrade complete"),
    ]);
    let (controller, _intents) = controller_with(&api).await;

    controller.activate(4).await.unwrap();
    assert_eq!(api.count("upgrade:4"), 1);
    assert!(controller.upgrade_progress(4).unwrap().running);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let progress = controller.upgrade_progress(4).unwrap();
    assert!(progress.running);
    assert_eq!(progress.message, "Upgrading admin console");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!controller.is_upgrade_polling(4));
    assert!(!controller.upgrade_progress(4).unwrap().running);
    assert_eq!(api.count("versions"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_console_upgrade_survives_transient_errors() {
    let mut release = Release::new(4, ReleaseStatus::Pending);
    release.needs_kots_upgrade = true;
    let api = Arc::new(MockApi::new(downstream_at(3), vec![release]));
    api.fail("upgrade_status", Failure::Server);
    let (controller, _intents) = controller_with(&api).await;

    controller.start_console_upgrade(4).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    assert_eq!(api.count("upgrade_status"), 3);
    assert!(controller.is_upgrade_polling(4));
    controller.dispose();
}

#[tokio::test]
async fn test_diff_selection_opens_inline_diff() {
    let mut older = Release::new(4, ReleaseStatus::Pending);
    older.parent_sequence = 14;
    let mut newer = Release::new(6, ReleaseStatus::Pending);
    newer.parent_sequence = 16;
    let api = Arc::new(MockApi::new(
        downstream_at(3),
        vec![
            newer,
            Release::new(5, ReleaseStatus::PendingDownload),
            older,
        ],
    ));
    let (controller, mut intents) = controller_with(&api).await;
    drain(&mut intents);

    assert_err!(controller.toggle_diff(5).await);
    controller.toggle_diff(6).await.unwrap();
    assert_eq!(controller.toggle_diff(4).await.unwrap(), vec![4, 6]);

    let target = controller.open_diff().await.unwrap();
    assert!(matches!(target, DiffTarget::Inline(_)));
    assert_eq!(
        drain(&mut intents),
        vec![Intent::RequestDiffView {
            first_sequence: 14,
            second_sequence: 16,
        }]
    );
}

#[tokio::test]
async fn test_gitops_diff_uses_current_commit_urls() {
    let mut downstream = downstream_at(3);
    downstream.gitops = GitOps {
        is_connected: true,
        uri: "https://github.com/acme/deploys".to_string(),
        provider: Some(GitProvider::Github),
    };
    let release = |sequence: i64, commit: Option<&str>| {
        let mut release = Release::new(sequence, ReleaseStatus::Pending);
        release.parent_sequence = sequence + 10;
        release.commit_url =
            commit.map(|hash| format!("https://github.com/acme/deploys/commit/{}", hash));
        release
    };
    let api = Arc::new(MockApi::new(
        downstream,
        vec![release(6, None), release(4, None)],
    ));
    let (controller, mut intents) = controller_with(&api).await;

    controller.toggle_diff(4).await.unwrap();
    controller.toggle_diff(6).await.unwrap();
    assert!(matches!(
        controller.open_diff().await,
        Err(ControllerError::NotFound(_))
    ));

    // commits land after marking
    api.set_releases(vec![release(6, Some("bbb")), release(4, Some("aaa"))]);
    controller.refresh_history().await.unwrap();
    drain(&mut intents);

    let url = "https://github.com/acme/deploys/compare/aaa...bbb".to_string();
    assert_eq!(
        controller.open_diff().await.unwrap(),
        DiffTarget::External { url: url.clone() }
    );
    assert_eq!(
        drain(&mut intents),
        vec![Intent::RequestExternalDiffView { url }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dispose_during_download_request_starts_no_poller() {
    let mut release = Release::new(5, ReleaseStatus::PendingDownload);
    release.parent_sequence = 15;
    let api = Arc::new(MockApi::new(downstream_at(3), vec![release]));
    api.script_download_statuses(15, vec![status(TaskState::Running, "Fetching")]);
    api.delay("download", Duration::from_millis(50));
    let (controller, _intents) = controller_with(&api).await;

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_download(5).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.dispose();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(ControllerError::InvalidTransition(_))));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!controller.is_download_polling(5));
    assert_eq!(api.count("download_status"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_during_upgrade_request_starts_no_poller() {
    let mut release = Release::new(4, ReleaseStatus::Pending);
    release.needs_kots_upgrade = true;
    let api = Arc::new(MockApi::new(downstream_at(3), vec![release]));
    api.delay("upgrade", Duration::from_millis(50));
    let (controller, _intents) = controller_with(&api).await;

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_console_upgrade(4).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.dispose();

    assert_err!(pending.await.unwrap());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!controller.is_upgrade_polling(4));
    assert_eq!(api.count("upgrade_status"), 0);
}

#[tokio::test]
async fn test_unauthorized_expires_session_once() {
    let api = Arc::new(MockApi::new(downstream_at(3), vec![]));
    api.fail("versions", Failure::Unauthorized);
    let (controller, mut intents) = Controller::new(api.clone(), options());

    let result = controller.refresh_history().await;
    assert!(matches!(result, Err(ControllerError::Unauthorized(_))));
    assert!(controller.is_disposed());
    assert!(controller.history().await.error_msg.is_some());

    let _ = controller.refresh_history().await;
    assert_eq!(drain(&mut intents), vec![Intent::SessionExpired]);

    assert!(matches!(
        controller.check_for_updates().await,
        Err(ControllerError::InvalidTransition(_))
    ));
    assert_eq!(api.count("updatecheck"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_stops_every_poller() {
    let mut upgrade = Release::new(7, ReleaseStatus::Pending);
    upgrade.needs_kots_upgrade = true;
    let api = Arc::new(MockApi::new(
        downstream_at(3),
        vec![
            upgrade,
            Release::new(6, ReleaseStatus::PendingPreflight),
            Release::new(5, ReleaseStatus::PendingDownload),
        ],
    ));
    api.script_download_statuses(5, vec![status(TaskState::Running, "Fetching")]);
    api.script_upgrade_statuses(vec![status(TaskState::Running, "Upgrading")]);
    api.script_update_statuses(vec![status(TaskState::Running, "Downloading")]);
    api.set_update_check(openapi_client::models::UpdateCheckResponse {
        available_updates: 1,
        ..Default::default()
    });
    let (controller, _intents) = controller_with(&api).await;

    controller.start_download(5).await.unwrap();
    controller.start_console_upgrade(7).await.unwrap();
    controller.check_for_updates().await.unwrap();
    assert!(controller.is_history_polling());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(controller.dispose(), 4);

    let calls = api.calls().len();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(api.calls().len(), calls);
    assert!(!controller.is_download_polling(5));
    assert!(!controller.is_upgrade_polling(7));
    assert!(!controller.is_checking_for_updates());
    assert!(!controller.is_history_polling());
}
