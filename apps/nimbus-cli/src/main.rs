#![forbid(unsafe_code)]

mod args;
mod logging;

use std::sync::Arc;

use clap::Parser as _;
use error_stack::Report;
use nimbus_coordinator::Coordinator;
use nimbus_locking::LockManager;
use nimbus_test_support::{InMemoryStore, RecordingEmitter};
use nimbus_types::{
    entities::Installation, CommonFields, CoreError, InstallationId, InstallationState,
    RequestId,
};
use time::OffsetDateTime;

use crate::args::{Args, Command, DemoArgs};

fn main() -> Result<(), Report<CoreError>> {
    let Args { command, log_format } = Args::parse();
    logging::init(log_format);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build the tokio runtime")
        .block_on(async {
            match command {
                Command::Demo(demo_args) => run_demo(demo_args).await,
            }
        })
}

async fn run_demo(args: DemoArgs) -> Result<(), Report<CoreError>> {
    let store = Arc::new(InMemoryStore::new());
    let emitter = Arc::new(RecordingEmitter::new());
    let lock_manager = LockManager::new(Arc::clone(&store));
    let (nudge_tx, mut nudge_rx) = nimbus_coordinator::channel();
    let coordinator = Coordinator::new(lock_manager, emitter.clone(), nudge_tx);

    let owner = args
        .request_id
        .map_or_else(RequestId::generate, |raw| RequestId::from(raw.as_str()));

    let installation = Installation {
        common: CommonFields::new(InstallationId::generate(), OffsetDateTime::now_utc()),
        state: InstallationState::CreationRequested,
        owner_id: args.owner_id,
        dns: args.dns,
        group_id: None,
        group_sequence: None,
        deletion_locked: false,
        deletion_pending_expiry: None,
    };
    let id = installation.common.id.clone();

    let created = coordinator.create(installation).await?;
    tracing::info!(id = %created.common.id, state = %created.state, "installation created");
    nudge_rx.try_recv();

    let failed = coordinator
        .transition_to(&id, InstallationState::CreationFailed, owner.clone(), |_| true)
        .await?;
    tracing::info!(id = %failed.common.id, state = %failed.state, "supervisor marked creation failed");
    nudge_rx.try_recv();

    let retried = coordinator
        .retry_transition(&id, InstallationState::CreationRequested, owner)
        .await?;
    tracing::info!(id = %retried.common.id, state = %retried.state, "retry-create succeeded");
    nudge_rx.try_recv();

    for event in emitter.events().await {
        tracing::info!(
            kind = %event.kind,
            old_state = %event.old_state,
            new_state = %event.new_state,
            "event"
        );
    }

    Ok(())
}
