use crate::infra::{demo_snapshot, DEMO_CAMP, DEMO_CLUB};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use clap::{Args, ValueEnum};
use class_enrollment::config::EnrollmentSettings;
use class_enrollment::error::AppError;
use class_enrollment::workflows::enrollment::{
    outbox, AssignmentEngine, AssignmentOptions, ChannelPublisher, ClassAssignmentNotice, ClassId,
    DeliveryResult, DispatchReport, EnrollmentError, EnrollmentRequest,
    EnrollmentWindowPolicy, InMemoryEnrollmentRepository, NotificationDispatcher, PaymentStatus,
    PriceType, Program, ProgramEnrollment, ProgramId, ProgramType, RecipientDelivery, StudentId,
};
use std::sync::Arc;

type DemoEngine = AssignmentEngine<InMemoryEnrollmentRepository, ChannelPublisher>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Program start date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Stop before the archive cascade.
    #[arg(long)]
    pub(crate) skip_archive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ProgramKind {
    WeekendClub,
    HolidayCamp,
}

impl From<ProgramKind> for ProgramType {
    fn from(kind: ProgramKind) -> Self {
        match kind {
            ProgramKind::WeekendClub => ProgramType::WeekendClub,
            ProgramKind::HolidayCamp => ProgramType::HolidayCamp,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct WindowArgs {
    /// Kind of program being checked
    #[arg(long, value_enum)]
    pub(crate) program_type: ProgramKind,
    /// Program start date (YYYY-MM-DD); omit for a program with no date on record
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Day of the sign-up (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn run_window_check(args: WindowArgs) -> Result<(), AppError> {
    let settings = EnrollmentSettings::from_env()?;
    let policy = EnrollmentWindowPolicy::from(&settings);
    let program_type = ProgramType::from(args.program_type);
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let program = Program {
        id: ProgramId::new("window-check"),
        name: format!("{} program", program_type.label()),
        program_type,
        season: String::new(),
        year: 0,
        batches: 1,
        slots: Vec::new(),
        start_date: args.start_date,
    };
    let decision = policy.can_enroll(&program, today);

    println!(
        "{} window: {} day(s) after start",
        program_type.label(),
        decision.limit_days
    );
    match decision.days_passed {
        Some(days) => println!("Sign-up on {today}: {days} day(s) since start"),
        None => println!("Sign-up on {today}: no start date on record"),
    }
    if decision.allowed {
        println!("Result: open");
    } else {
        println!(
            "Result: closed ({})",
            decision.reason.as_deref().unwrap_or("window closed")
        );
    }
    Ok(())
}

/// Prints each delivery instead of sending mail.
#[derive(Debug, Default)]
struct ConsoleDispatcher;

impl NotificationDispatcher for ConsoleDispatcher {
    fn notify_class_assignment(&self, notice: &ClassAssignmentNotice) -> DispatchReport {
        let deliveries = notice
            .recipients
            .iter()
            .map(|(role, recipient)| {
                println!(
                    "    [mail] {:?} {} <{}>: {} ({} {}), batch {} at {}",
                    role,
                    recipient.name,
                    recipient.email,
                    notice.class_info.course_name,
                    notice.program_info.season,
                    notice.program_info.year,
                    notice.class_info.batch,
                    notice.class_info.slot
                );
                RecipientDelivery {
                    role,
                    email: recipient.email.clone(),
                    result: DeliveryResult::Sent,
                }
            })
            .collect();
        DispatchReport { deliveries }
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start_date = args
        .start_date
        .unwrap_or_else(|| Local::now().date_naive());
    let now = morning_of(start_date);

    let repository = InMemoryEnrollmentRepository::with_snapshot(demo_snapshot(start_date));
    let (publisher, worker) = outbox(Arc::new(ConsoleDispatcher));
    let worker = worker.spawn();
    let engine = AssignmentEngine::new(
        Arc::new(repository),
        Arc::new(publisher),
        &EnrollmentSettings::default(),
    );

    println!("Class enrollment demo (programs start {start_date})");

    println!("\nSign-ups");
    sign_up(&engine, "s-maya", DEMO_CAMP, true, None, now)?;
    let leo = sign_up(&engine, "s-leo", DEMO_CAMP, false, Some(PriceType::SiblingDiscount), now)?;
    let ravi = sign_up(&engine, "s-ravi", DEMO_CAMP, true, None, now)?;
    let zoe = sign_up(&engine, "s-zoe", DEMO_CAMP, true, Some(PriceType::EarlyBird), now)?;
    sign_up(&engine, "s-ravi", DEMO_CLUB, true, None, now)?;
    if let Err(err) = engine.enroll_program(request("s-maya", DEMO_CAMP, None, true), now) {
        println!("- s-maya again -> rejected: {err}");
    }

    println!("\nPayment gate");
    match assign(&engine, &leo, "camp-scratch-b1", now) {
        Ok(_) => println!("- unexpected: unpaid enrollment was seated"),
        Err(err) => println!("- s-leo -> camp-scratch-b1 rejected: {err}"),
    }
    let confirmed = engine.update_payment_status(&leo.id, PaymentStatus::Confirmed)?;
    println!(
        "- s-leo payment {} -> {}",
        confirmed.payment_status.label(),
        confirmed.state().label()
    );
    let outcome = assign(&engine, &leo, "camp-scratch-b1", now)?;
    println!(
        "- s-leo -> camp-scratch-b1 ({}, notification {:?})",
        outcome.enrollment.state().label(),
        outcome.notification
    );

    println!("\nLast seat");
    assign(&engine, &ravi, "camp-python-b1", now)?;
    println!("- s-ravi -> camp-python-b1");
    match assign(&engine, &zoe, "camp-python-b1", now) {
        Ok(_) => println!("- unexpected: class over capacity"),
        Err(err) => println!("- s-zoe -> camp-python-b1 rejected: {err}"),
    }

    println!("\nWaitlist promotion");
    let proposals = engine.waitlist_proposals(&ProgramId::new(DEMO_CAMP), start_date)?;
    for proposal in &proposals {
        println!(
            "- {} -> {} (priority {}: returning {}, siblings {}, wait {})",
            proposal.student_id,
            proposal.class_id,
            proposal.priority.total,
            proposal.priority.returning,
            proposal.priority.siblings,
            proposal.priority.wait
        );
    }
    let report = engine.apply_proposals(proposals, now);
    println!(
        "- applied {}, rejected {}",
        report.applied.len(),
        report.rejected.len()
    );

    println!("\nOccupancy");
    for class_id in ["camp-scratch-b1", "camp-python-b1", "camp-scratch-b2"] {
        let view = engine.occupancy(&ClassId::new(class_id))?;
        println!(
            "- {}: {}/{} seats ({} free)",
            view.class_id, view.occupancy, view.capacity, view.available
        );
    }

    if !args.skip_archive {
        println!("\nArchive cascade");
        let archive_day = morning_of(start_date + chrono::Duration::days(5));
        let report = engine.archive_class(&ClassId::new("camp-scratch-b1"), archive_day)?;
        println!(
            "- camp-scratch-b1 archived={} completed={} failures={}",
            report.archived,
            report.completed,
            report.failures.len()
        );
        for entry in engine.course_history(&StudentId::new("s-maya"))? {
            println!(
                "- s-maya history: {} ({}) {:?}",
                entry.course_name, entry.program_name, entry.completion_status
            );
        }
    }

    drop(engine);
    let handled = worker.await.unwrap_or(0);
    println!("\nNotification outbox drained ({handled} notice(s))");
    Ok(())
}

fn morning_of(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_hms_opt(9, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&naive)
}

fn request(
    student: &str,
    program: &str,
    price_type: Option<PriceType>,
    paid: bool,
) -> EnrollmentRequest {
    EnrollmentRequest {
        student_id: StudentId::new(student),
        program_id: ProgramId::new(program),
        batch_number: 1,
        payment_confirmed: paid,
        price_type,
    }
}

fn sign_up(
    engine: &DemoEngine,
    student: &str,
    program: &str,
    paid: bool,
    price_type: Option<PriceType>,
    now: DateTime<Utc>,
) -> Result<ProgramEnrollment, EnrollmentError> {
    let enrollment = engine.enroll_program(request(student, program, price_type, paid), now)?;
    println!(
        "- {} -> {} batch {}: {} ({} {})",
        student,
        program,
        enrollment.batch_number,
        enrollment.state().label(),
        enrollment.price_type.label(),
        enrollment.price_amount
    );
    Ok(enrollment)
}

fn assign(
    engine: &DemoEngine,
    enrollment: &ProgramEnrollment,
    class_id: &str,
    now: DateTime<Utc>,
) -> Result<class_enrollment::workflows::enrollment::AssignmentOutcome, EnrollmentError> {
    engine.assign_to_class(
        &enrollment.id,
        &ClassId::new(class_id),
        AssignmentOptions::default(),
        now,
    )
}
