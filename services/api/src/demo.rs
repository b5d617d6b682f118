use crate::infra::{build_stack, seed_demo_data, LogMailTransport};
use chrono::{Duration, Utc};
use clap::Args;
use homelet::error::AppError;
use homelet::leasing::{
    Actor, ApplicationId, ApplicationStatus, Decision, EntityStore, ExpiryPolicy, LeasingError,
    MailWorker, StoreError, TxScope, UserRole,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Staleness window, in days, used by the expiry portion of the demo.
    #[arg(long, default_value_t = 30)]
    pub(crate) expiry_days: i64,
    /// Skip the consistency audit portion of the demo.
    #[arg(long)]
    pub(crate) skip_consistency: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    demo_flow(args).map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))
}

fn demo_flow(args: DemoArgs) -> Result<(), LeasingError> {
    let stack = build_stack(ExpiryPolicy {
        max_pending_days: args.expiry_days,
    });
    seed_demo_data(&stack.store);

    let olivia = Actor::new("user-olivia", UserRole::Owner);
    let tara = Actor::new("user-tara", UserRole::Tenant);
    let tom = Actor::new("user-tom", UserRole::Tenant);
    let tessa = Actor::new("user-tessa", UserRole::Tenant);

    println!("Homelet application lifecycle demo");

    println!("\nIntake");
    let first = stack.service.create_application(&tara, apply("prop-maple"))?;
    println!("- {} applied to prop-maple ({})", tara.id, first.id);
    let second = stack.service.create_application(&tom, apply("prop-maple"))?;
    println!("- {} applied to prop-maple ({})", tom.id, second.id);

    match stack.service.create_application(&tara, apply("prop-maple")) {
        Err(LeasingError::Duplicate { existing }) => {
            println!("- duplicate application blocked, existing id {existing}");
        }
        other => println!("- unexpected duplicate outcome: {other:?}"),
    }

    println!("\nApproval");
    let approved = stack.service.decide_application(
        &olivia,
        &first.id,
        Decision::Approve,
        Some("Welcome aboard".to_string()),
    )?;
    println!(
        "- {} approved ({:?} on {})",
        approved.id,
        approved.status,
        approved.decision_date.map(|ts| ts.to_rfc3339()).unwrap_or_default()
    );

    let sibling = stack
        .store
        .application(&second.id)?
        .ok_or(LeasingError::NotFound { entity: "application" })?;
    println!(
        "- {} auto-rejected alongside it (autoRejected = {})",
        sibling.id, sibling.auto_rejected
    );

    match stack
        .service
        .decide_application(&olivia, &second.id, Decision::Approve, None)
    {
        Err(err @ LeasingError::InvalidState { .. }) => {
            println!("- late approval blocked: {err}");
        }
        other => println!("- unexpected late approval outcome: {other:?}"),
    }

    println!("\nExpiry");
    let stale = stack.service.create_application(&tessa, apply("prop-birch"))?;
    backdate(stack.store.as_ref(), &stale.id, args.expiry_days + 1)?;
    let report = stack.sweeper.sweep(Utc::now())?;
    println!(
        "- swept {} stale application(s); {} now {}",
        report.expired,
        stale.id,
        stack
            .store
            .application(&stale.id)?
            .map(|record| record.status.label())
            .unwrap_or("missing")
    );

    if !args.skip_consistency {
        println!("\nConsistency");
        // Fabricate the drift a non-transactional legacy path would leave
        // behind: an approval that never settled its property.
        let drifted = stack.service.create_application(&tom, apply("prop-birch"))?;
        stack.store.in_transaction(|tx: &mut dyn TxScope| {
            let mut record = tx
                .application(&drifted.id)?
                .ok_or_else(|| StoreError::Unavailable("demo record vanished".to_string()))?;
            record.status = ApplicationStatus::Approved;
            record.decision_date = Some(Utc::now());
            tx.put_application(record)
        })?;

        let diagnosis = stack.auditor.diagnose()?;
        println!("- diagnose found {} discrepancy(ies)", diagnosis.discrepancies.len());
        let repair = stack.auditor.repair(Utc::now())?;
        println!(
            "- repair updated {} property(ies), auto-rejected {} application(s)",
            repair.properties_updated, repair.applications_auto_rejected
        );
        let clean = stack.auditor.diagnose()?;
        println!("- post-repair discrepancies: {}", clean.discrepancies.len());
    }

    println!("\nNotifications");
    let worker = MailWorker::new(stack.queue.clone(), Arc::new(LogMailTransport));
    let summary = worker.drain();
    println!(
        "- delivered {} notification(s), dropped {}",
        summary.delivered, summary.dropped
    );

    Ok(())
}

fn apply(property: &str) -> homelet::leasing::NewApplication {
    homelet::leasing::NewApplication {
        property: homelet::leasing::PropertyId(property.to_string()),
        message: "I'd like to rent this unit, please.".to_string(),
        preferred_move_in_date: None,
        documents: Vec::new(),
        tenant_info: None,
    }
}

fn backdate(
    store: &homelet::leasing::MemoryStore,
    id: &ApplicationId,
    days: i64,
) -> Result<(), LeasingError> {
    store.in_transaction(|tx: &mut dyn TxScope| {
        let mut record = tx
            .application(id)?
            .ok_or_else(|| StoreError::Unavailable("demo record vanished".to_string()))?;
        record.application_date -= Duration::days(days);
        tx.put_application(record)
    })?;
    Ok(())
}
