//! Deployment processor integration tests

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use hubflow::deploy::processor::{
    ActionError, AutomaticAction, DeploymentProcessor, ManualAction, ProcessingState,
};
use hubflow::deploy::session::DeploymentSession;
use hubflow::errors::CallError;
use hubflow::hub::ObtainContractCertificateError;
use hubflow::identity::StaticIdentity;
use hubflow::models::deployment::{DeploymentLock, DeploymentState};
use hubflow::models::Timestamped;
use hubflow::utils::now_millis;

use common::*;

fn build(
    hub: &Arc<MockHub>,
    identity: Arc<StaticIdentity>,
) -> (Arc<DeploymentSession>, Arc<DeploymentProcessor>) {
    let api: Arc<dyn hubflow::hub::HubApi> = hub.clone();
    let session = Arc::new(DeploymentSession::new(Arc::clone(&api), identity, 7));
    let processor = Arc::new(DeploymentProcessor::new(api, Arc::clone(&session)));
    (session, processor)
}

#[tokio::test(start_paused = true)]
async fn test_process_is_idempotent_while_in_flight() {
    let hub = MockHub::with_process_delay(Duration::from_millis(100));
    hub.set_deployment(deployment(DeploymentState::StartDeployment, true));
    hub.state.lock().unwrap().process.push_back(Ok(deployment(
        DeploymentState::TransferDeployerFundsToTransitAccount,
        false,
    )));

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;

    let first = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.try_to_process().await }
    });
    let second = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.try_to_process().await }
    });
    first.await.unwrap();
    second.await.unwrap();

    // Exactly one network call; both callers observed the same settled record
    assert_eq!(hub.calls.process.load(Ordering::SeqCst), 1);
    assert_eq!(
        session.deployment().unwrap().state,
        DeploymentState::TransferDeployerFundsToTransitAccount
    );
}

#[tokio::test(start_paused = true)]
async fn test_processing_error_beats_need_processing() {
    let hub = MockHub::new();
    let mut record = deployment(DeploymentState::StartDeployment, true);
    record.processing_error = Some(Timestamped {
        value: "transfer failed".to_string(),
        timestamp_millis: now_millis(),
    });
    hub.set_deployment(record);

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;

    assert_eq!(
        processor.processing_state(),
        ProcessingState::Manual(ManualAction::Process)
    );
}

#[tokio::test(start_paused = true)]
async fn test_need_processing_resolves_to_automatic_process() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(DeploymentState::StartDeployment, true));

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;

    assert_eq!(
        processor.processing_state(),
        ProcessingState::Automatic(AutomaticAction::Process)
    );
    assert!(processor.automatic_processing_in_progress());
}

#[tokio::test(start_paused = true)]
async fn test_waiting_certificate_resolves_to_automatic_obtain() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(
        DeploymentState::WaitingReceiveContractCertificate,
        false,
    ));

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;

    assert_eq!(
        processor.processing_state(),
        ProcessingState::Automatic(AutomaticAction::ObtainCertificate)
    );
}

#[tokio::test(start_paused = true)]
async fn test_fetch_error_resolves_to_none() {
    let hub = MockHub::new();
    // No record scripted: the fetch returns DeploymentNotFound

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;

    assert!(session.fetch_failed());
    assert_eq!(processor.processing_state(), ProcessingState::None);
}

#[tokio::test(start_paused = true)]
async fn test_run_until_settled_walks_to_certificate_handshake() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(DeploymentState::StartDeployment, true));
    {
        let mut state = hub.state.lock().unwrap();
        state.process.push_back(Ok(deployment(
            DeploymentState::TransferDeployerFundsToTransitAccount,
            true,
        )));
        state.process.push_back(Ok(deployment(
            DeploymentState::WaitingReceiveContractCertificate,
            false,
        )));
        state.obtain.push_back(Ok(certificate()));
        state.initialize.push_back(Ok(finalized_success()));
    }

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;
    processor.run_until_settled().await;

    assert_eq!(hub.calls.process.load(Ordering::SeqCst), 2);
    assert_eq!(hub.calls.obtain.load(Ordering::SeqCst), 1);
    assert_eq!(hub.calls.initialize.load(Ordering::SeqCst), 1);
    assert!(session.deployment().unwrap().contract_node.is_some());
    assert_eq!(processor.processing_state(), ProcessingState::None);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_demotes_to_manual() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(DeploymentState::StartDeployment, true));
    hub.state.lock().unwrap().process.push_back(Err(transport()));

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;
    processor.run_until_settled().await;

    // One failed call, then the loop stops in a manual state
    assert_eq!(hub.calls.process.load(Ordering::SeqCst), 1);
    assert_eq!(
        processor.processing_state(),
        ProcessingState::Manual(ManualAction::Process)
    );
    assert!(processor.process_error().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_manual_retry_recovers_after_failure() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(DeploymentState::StartDeployment, true));
    {
        let mut state = hub.state.lock().unwrap();
        state.process.push_back(Err(transport()));
        state.process.push_back(Ok(deployment(
            DeploymentState::WaitingReceiveContractCertificate,
            false,
        )));
        state.obtain.push_back(Ok(certificate()));
        state.initialize.push_back(Ok(finalized_success()));
    }

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;
    processor.run_until_settled().await;
    assert!(processor.should_process_manually());

    processor.try_to_process_manually().await;

    // The retry succeeded and the automatic flow continued to the end
    assert_eq!(hub.calls.process.load(Ordering::SeqCst), 2);
    assert_eq!(hub.calls.initialize.load(Ordering::SeqCst), 1);
    assert!(processor.process_error().is_none());
    assert_eq!(processor.processing_state(), ProcessingState::None);
}

#[tokio::test(start_paused = true)]
async fn test_obtain_certificate_not_found_offers_certificate_retry() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(
        DeploymentState::WaitingReceiveContractCertificate,
        false,
    ));
    hub.state
        .lock()
        .unwrap()
        .obtain
        .push_back(Err(CallError::Response(
            ObtainContractCertificateError::CertificateNotFound,
        )));

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;
    processor.run_until_settled().await;

    assert_eq!(processor.action_error(), Some(ActionError::ObtainCertificate));
    assert_eq!(
        processor.processing_state(),
        ProcessingState::Manual(ManualAction::RetryCreateCertificate)
    );

    // The manual action now issues the retry-generate call
    hub.state.lock().unwrap().retry.push_back(Ok(deployment(
        DeploymentState::GenerateContractCertificate,
        false,
    )));
    processor.try_to_process_manually().await;

    assert_eq!(hub.calls.retry.load(Ordering::SeqCst), 1);
    assert!(processor.action_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_obtain_transport_error_clears_certificate_action_error() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(
        DeploymentState::WaitingReceiveContractCertificate,
        false,
    ));
    hub.state.lock().unwrap().obtain.push_back(Err(transport()));

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;
    processor.run_until_settled().await;

    // Transport failures are transient: no certificate-class error, but
    // the feature error still forces manual processing
    assert!(processor.action_error().is_none());
    assert_eq!(
        processor.processing_state(),
        ProcessingState::Manual(ManualAction::Process)
    );
}

#[tokio::test(start_paused = true)]
async fn test_lock_window_delays_the_process_call() {
    let hub = MockHub::new();
    let mut record = deployment(DeploymentState::StartDeployment, true);
    record.lock = Some(DeploymentLock {
        locked_till_millis: now_millis() + 2_000,
    });
    hub.set_deployment(record);
    hub.state.lock().unwrap().process.push_back(Ok(deployment(
        DeploymentState::TransferDeployerFundsToTransitAccount,
        false,
    )));

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;

    let started = tokio::time::Instant::now();
    processor.run_until_settled().await;

    // The call waited out the lock window on the paused clock
    assert!(started.elapsed() >= Duration::from_millis(1_900));
    assert_eq!(hub.calls.process.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_strangers_deployment_is_not_processed() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(DeploymentState::StartDeployment, true));

    let (session, processor) = build(&hub, stranger_identity());
    session.fetch().await;
    processor.run_until_settled().await;
    processor.try_to_process_manually().await;

    assert_eq!(hub.calls.process.load(Ordering::SeqCst), 0);
    assert!(!processor.automatic_processing_in_progress());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_transport_error_refetches_the_record() {
    let hub = MockHub::new();
    hub.set_deployment(deployment(DeploymentState::StartDeployment, false));
    hub.state.lock().unwrap().cancel.push_back(Err(transport()));

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;
    let fetches_before = hub.calls.get_deployment.load(Ordering::SeqCst);

    processor.cancel_deployment("changed my mind".to_string()).await;

    assert!(processor.cancel_error().is_some());
    assert_eq!(
        hub.calls.get_deployment.load(Ordering::SeqCst),
        fetches_before + 1
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_rejected_once_finalizing() {
    let hub = MockHub::new();
    hub.set_deployment(finalized_success());

    let (session, processor) = build(&hub, deployer_identity());
    session.fetch().await;
    processor.cancel_deployment("too late".to_string()).await;

    assert_eq!(hub.calls.cancel.load(Ordering::SeqCst), 0);
}
