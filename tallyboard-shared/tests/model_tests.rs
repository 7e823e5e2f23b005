/// Integration tests for tenant-scoped models
///
/// Skipped when DATABASE_URL is unset.

mod common;

use chrono::{Duration, NaiveDate, Utc};
use tallyboard_shared::error::DomainError;
use tallyboard_shared::models::business::Business;
use tallyboard_shared::models::business_member::{BusinessMember, CreateBusinessMember, MemberRole};
use tallyboard_shared::models::client::{Client, CreateClient};
use tallyboard_shared::models::invoice::{CreateInvoice, Invoice, InvoiceStatus, UpdateInvoice};
use tallyboard_shared::models::project::{CreateProject, Project, ProjectStatus, UpdateProject};
use tallyboard_shared::models::project_member::{ProjectMember, ProjectRole};
use tallyboard_shared::models::task::{CreateTask, Task, TaskFilter, TaskPriority, TaskStatus};
use tallyboard_shared::models::time_entry::{CreateTimeEntry, StartTimer, TimeEntry};
use tallyboard_shared::models::user::{CreateInvitedUser, User};

#[tokio::test]
async fn test_project_tenant_isolation() {
    let pool = require_db!();
    let (_, business_a, project_a) = common::workspace(&pool, "Alpha").await;
    let (_, business_b, _) = common::workspace(&pool, "Beta").await;

    let own = Project::find_by_id(&pool, project_a.id, business_a.id).await.unwrap();
    assert_eq!(own.map(|p| p.business_id), Some(business_a.id));

    let other = Project::find_by_id(&pool, project_a.id, business_b.id).await.unwrap();
    assert!(other.is_none());

    let updated = Project::update(
        &pool,
        project_a.id,
        business_b.id,
        UpdateProject {
            name: Some("Hijacked".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(updated.is_none());

    assert!(!Project::delete(&pool, project_a.id, business_b.id).await.unwrap());
}

#[tokio::test]
async fn test_project_round_trip() {
    let pool = require_db!();
    let (owner, business, _) = common::workspace(&pool, "Round").await;
    let client = Client::create(
        &pool,
        business.id,
        CreateClient {
            name: "Initech".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let created = Project::create_with_owner(
        &pool,
        business.id,
        owner.id,
        CreateProject {
            name: "Brand refresh".to_string(),
            description: Some("Logo and palette".to_string()),
            status: Some(ProjectStatus::OnHold),
            client_id: Some(client.id),
            due_date: NaiveDate::from_ymd_opt(2026, 1, 31),
        },
    )
    .await
    .unwrap();

    let fetched = Project::find_by_id(&pool, created.id, business.id)
        .await
        .unwrap()
        .expect("project should exist");
    assert_eq!(fetched, created);

    let members = ProjectMember::list_by_project(&pool, business.id, created.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, owner.id);
    assert_eq!(members[0].role, ProjectRole::Manager);
}

#[tokio::test]
async fn test_project_rejects_foreign_client() {
    let pool = require_db!();
    let (owner, business_a, _) = common::workspace(&pool, "Gamma").await;
    let (_, business_b, _) = common::workspace(&pool, "Delta").await;
    let foreign = Client::create(
        &pool,
        business_b.id,
        CreateClient {
            name: "Umbrella".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let result = Project::create_with_owner(
        &pool,
        business_a.id,
        owner.id,
        CreateProject {
            name: "Nope".to_string(),
            client_id: Some(foreign.id),
            ..Default::default()
        },
    )
    .await;

    assert!(matches!(result, Err(DomainError::CrossTenant { entity: "client", .. })));
}

#[tokio::test]
async fn test_delete_task_twice() {
    let pool = require_db!();
    let (_, business, project) = common::workspace(&pool, "Twice").await;
    let task = Task::create(
        &pool,
        business.id,
        CreateTask {
            project_id: project.id,
            title: "Write copy".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(Task::delete(&pool, task.id, business.id).await.unwrap());
    assert!(!Task::delete(&pool, task.id, business.id).await.unwrap());
}

#[tokio::test]
async fn test_task_rejects_foreign_project_and_assignee() {
    let pool = require_db!();
    let (_, business_a, project_a) = common::workspace(&pool, "Echo").await;
    let (owner_b, business_b, project_b) = common::workspace(&pool, "Foxtrot").await;

    let foreign_project = Task::create(
        &pool,
        business_a.id,
        CreateTask {
            project_id: project_b.id,
            title: "Sneaky".to_string(),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(foreign_project, Err(DomainError::CrossTenant { entity: "project", .. })));

    let foreign_assignee = Task::create(
        &pool,
        business_a.id,
        CreateTask {
            project_id: project_a.id,
            title: "Outsourced".to_string(),
            assignee_id: Some(owner_b.id),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(foreign_assignee, Err(DomainError::CrossTenant { entity: "user", .. })));

    let board = Task::list_by_business(&pool, business_b.id, &TaskFilter::default(), 100, 0)
        .await
        .unwrap();
    assert!(board.is_empty());
}

#[tokio::test]
async fn test_task_board_order() {
    let pool = require_db!();
    let (_, business, project) = common::workspace(&pool, "Board").await;

    let specs = [
        ("done-high", TaskStatus::Done, TaskPriority::High, None),
        ("todo-low", TaskStatus::Todo, TaskPriority::Low, None),
        ("todo-high-undated", TaskStatus::Todo, TaskPriority::High, None),
        ("todo-high-late", TaskStatus::Todo, TaskPriority::High, NaiveDate::from_ymd_opt(2025, 9, 30)),
        ("todo-high-soon", TaskStatus::Todo, TaskPriority::High, NaiveDate::from_ymd_opt(2025, 9, 1)),
        ("review-medium", TaskStatus::Review, TaskPriority::Medium, None),
    ];

    for (title, status, priority, due_date) in specs {
        Task::create(
            &pool,
            business.id,
            CreateTask {
                project_id: project.id,
                title: title.to_string(),
                status: Some(status),
                priority: Some(priority),
                due_date,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let filter = TaskFilter {
        project_id: Some(project.id),
        ..Default::default()
    };
    let board = Task::list_by_business(&pool, business.id, &filter, 100, 0).await.unwrap();
    let titles: Vec<&str> = board.iter().map(|t| t.task.title.as_str()).collect();

    assert_eq!(
        titles,
        vec![
            "todo-high-soon",
            "todo-high-late",
            "todo-high-undated",
            "todo-low",
            "review-medium",
            "done-high",
        ]
    );

    let mut resorted = board.clone();
    resorted.reverse();
    tallyboard_shared::ordering::sort_tasks(&mut resorted);
    let resorted_titles: Vec<&str> = resorted.iter().map(|t| t.task.title.as_str()).collect();
    assert_eq!(resorted_titles, titles);
}

#[tokio::test]
async fn test_progress_for_project_without_tasks() {
    let pool = require_db!();
    let (_, business, project) = common::workspace(&pool, "Empty").await;

    let progress = Project::progress(&pool, project.id, business.id)
        .await
        .unwrap()
        .expect("project should exist");

    assert_eq!(progress.total_tasks, 0);
    assert_eq!(progress.progress_percent, 0.0);
    assert!(!progress.progress_percent.is_nan());
}

#[tokio::test]
async fn test_timer_cannot_start_twice() {
    let pool = require_db!();
    let (owner, business, project) = common::workspace(&pool, "Timer").await;
    let task = Task::create(
        &pool,
        business.id,
        CreateTask {
            project_id: project.id,
            title: "Track me".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let start = || StartTimer {
        task_id: task.id,
        description: None,
        billable: None,
    };

    let running = TimeEntry::start_timer(&pool, business.id, owner.id, start()).await.unwrap();
    assert!(running.is_running());
    assert_eq!(running.duration_seconds, 0);

    let second = TimeEntry::start_timer(&pool, business.id, owner.id, start()).await;
    assert!(matches!(second, Err(DomainError::Conflict(_))));

    let found = TimeEntry::find_running(&pool, owner.id).await.unwrap();
    assert_eq!(found.map(|t| (t.entry.id, t.business_id)), Some((running.id, business.id)));

    let stopped = TimeEntry::stop_timer(&pool, owner.id)
        .await
        .unwrap()
        .expect("timer should stop");
    assert_eq!(stopped.entry.id, running.id);
    assert!(stopped.entry.ended_at.is_some());
    assert!(stopped.entry.duration_seconds >= 0);

    assert!(TimeEntry::stop_timer(&pool, owner.id).await.unwrap().is_none());
    TimeEntry::start_timer(&pool, business.id, owner.id, start()).await.unwrap();
}

#[tokio::test]
async fn test_timer_running_in_another_business() {
    let pool = require_db!();
    let (owner, business_a, project_a) = common::workspace(&pool, "TimerA").await;
    let business_b = common::create_business(&pool, &owner, "TimerB Studio").await;
    let project_b = common::create_project(&pool, &business_b, "TimerB Website").await;

    let task = |project_id| CreateTask {
        project_id,
        title: "Track me".to_string(),
        ..Default::default()
    };
    let task_a = Task::create(&pool, business_a.id, task(project_a.id)).await.unwrap();
    let task_b = Task::create(&pool, business_b.id, task(project_b.id)).await.unwrap();

    let start = |task_id| StartTimer {
        task_id,
        description: None,
        billable: None,
    };

    let running = TimeEntry::start_timer(&pool, business_a.id, owner.id, start(task_a.id))
        .await
        .unwrap();

    match TimeEntry::start_timer(&pool, business_b.id, owner.id, start(task_b.id)).await {
        Err(DomainError::Conflict(message)) => assert!(message.contains(&business_a.id.to_string())),
        other => panic!("expected conflict, got {:?}", other),
    }

    // The blocking timer is visible and stoppable while working in business B
    let found = TimeEntry::find_running(&pool, owner.id).await.unwrap().unwrap();
    assert_eq!(found.entry.id, running.id);
    assert_eq!(found.business_id, business_a.id);

    let stopped = TimeEntry::stop_timer(&pool, owner.id).await.unwrap().unwrap();
    assert_eq!(stopped.entry.id, running.id);
    assert_eq!(stopped.business_id, business_a.id);

    let in_b = TimeEntry::start_timer(&pool, business_b.id, owner.id, start(task_b.id))
        .await
        .unwrap();
    assert!(in_b.is_running());
}

#[tokio::test]
async fn test_manual_time_entry_validation() {
    let pool = require_db!();
    let (owner, business, project) = common::workspace(&pool, "Manual").await;
    let task = Task::create(
        &pool,
        business.id,
        CreateTask {
            project_id: project.id,
            title: "Meeting".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let started_at = Utc::now() - Duration::hours(3);

    let entry = TimeEntry::create(
        &pool,
        business.id,
        owner.id,
        CreateTimeEntry {
            task_id: task.id,
            description: Some("Kickoff".to_string()),
            started_at,
            ended_at: None,
            duration_seconds: Some(2700),
            billable: Some(false),
        },
    )
    .await
    .unwrap();
    assert_eq!(entry.duration_seconds, 2700);
    assert!(!entry.billable);

    let inverted = TimeEntry::create(
        &pool,
        business.id,
        owner.id,
        CreateTimeEntry {
            task_id: task.id,
            description: None,
            started_at,
            ended_at: Some(started_at - Duration::minutes(1)),
            duration_seconds: None,
            billable: None,
        },
    )
    .await;
    assert!(matches!(inverted, Err(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_invoice_lifecycle() {
    let pool = require_db!();
    let (_, business, project) = common::workspace(&pool, "Billing").await;
    let (_, other_business, _) = common::workspace(&pool, "Other").await;

    let invoice = Invoice::create(
        &pool,
        business.id,
        CreateInvoice {
            project_id: project.id,
            amount_cents: 125_000,
            due_date: Utc::now().date_naive() + Duration::days(30),
            notes: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert!(invoice.number.starts_with("INV-"));

    let second = Invoice::create(
        &pool,
        business.id,
        CreateInvoice {
            project_id: project.id,
            amount_cents: 0,
            due_date: Utc::now().date_naive(),
            notes: None,
        },
    )
    .await
    .unwrap();
    assert_ne!(second.number, invoice.number);

    let paid_draft = Invoice::mark_paid(&pool, invoice.id, business.id, None).await;
    assert!(matches!(paid_draft, Err(DomainError::InvalidTransition { .. })));

    assert!(Invoice::mark_sent(&pool, invoice.id, other_business.id).await.unwrap().is_none());

    let sent = Invoice::mark_sent(&pool, invoice.id, business.id).await.unwrap().unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);
    assert!(sent.issued_date.is_some());

    let edit_sent = Invoice::update(
        &pool,
        invoice.id,
        business.id,
        UpdateInvoice {
            amount_cents: Some(1),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(edit_sent, Err(DomainError::InvalidTransition { .. })));
    assert!(matches!(
        Invoice::delete(&pool, invoice.id, business.id).await,
        Err(DomainError::InvalidTransition { .. })
    ));

    let issued = sent.issued_date.unwrap();
    let backdated = Invoice::mark_paid(&pool, invoice.id, business.id, Some(issued - Duration::days(1))).await;
    assert!(matches!(backdated, Err(DomainError::Validation(_))));
    let still_sent = Invoice::find_by_id(&pool, invoice.id, business.id).await.unwrap().unwrap();
    assert_eq!(still_sent.status, InvoiceStatus::Sent);
    assert!(still_sent.paid_date.is_none());

    let paid = Invoice::mark_paid(&pool, invoice.id, business.id, None).await.unwrap().unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert!(paid.paid_date.is_some());

    assert!(Invoice::delete(&pool, second.id, business.id).await.unwrap());
    assert!(!Invoice::delete(&pool, second.id, business.id).await.unwrap());
}

#[tokio::test]
async fn test_negative_invoice_amount_rejected() {
    let pool = require_db!();
    let (_, business, project) = common::workspace(&pool, "Negative").await;

    let result = Invoice::create(
        &pool,
        business.id,
        CreateInvoice {
            project_id: project.id,
            amount_cents: -1,
            due_date: Utc::now().date_naive(),
            notes: None,
        },
    )
    .await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_overdue_sweep() {
    let pool = require_db!();
    let (_, business, project) = common::workspace(&pool, "Sweep").await;

    let invoice = Invoice::create(
        &pool,
        business.id,
        CreateInvoice {
            project_id: project.id,
            amount_cents: 5_000,
            due_date: Utc::now().date_naive() - Duration::days(3),
            notes: None,
        },
    )
    .await
    .unwrap();
    Invoice::mark_sent(&pool, invoice.id, business.id).await.unwrap();

    let swept = Invoice::mark_overdue_past_due(&pool).await.unwrap();
    assert!(swept >= 1);

    let overdue = Invoice::find_by_id(&pool, invoice.id, business.id).await.unwrap().unwrap();
    assert_eq!(overdue.status, InvoiceStatus::Overdue);
}

#[tokio::test]
async fn test_business_membership_and_expired_invitation() {
    let pool = require_db!();
    let (owner, business, project) = common::workspace(&pool, "Team").await;

    let invited = User::create_invited(
        &pool,
        CreateInvitedUser {
            name: "Late Larry".to_string(),
            email: format!("larry-{}@example.com", uuid::Uuid::new_v4().simple()),
            invitation_token_hash: hex_token(),
            invitation_expires_at: Utc::now() - Duration::hours(1),
        },
    )
    .await
    .unwrap();
    BusinessMember::create(
        &pool,
        CreateBusinessMember {
            business_id: business.id,
            user_id: invited.id,
            role: MemberRole::Member,
        },
    )
    .await
    .unwrap();
    ProjectMember::add(&pool, business.id, project.id, invited.id, ProjectRole::Contributor)
        .await
        .unwrap();
    let task = Task::create(
        &pool,
        business.id,
        CreateTask {
            project_id: project.id,
            title: "Waiting on Larry".to_string(),
            assignee_id: Some(invited.id),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(task.assignee_id, Some(invited.id));

    assert_eq!(BusinessMember::count_by_business(&pool, business.id).await.unwrap(), 2);
    assert_eq!(BusinessMember::count_owners(&pool, business.id).await.unwrap(), 1);

    let expired = User::expire_invitations(&pool).await.unwrap();
    assert!(expired >= 1);

    assert!(BusinessMember::get_role(&pool, business.id, invited.id).await.unwrap().is_none());
    let user = User::find_by_id(&pool, invited.id).await.unwrap().unwrap();
    assert!(user.invitation_token_hash.is_none());

    let members = ProjectMember::list_by_project(&pool, business.id, project.id).await.unwrap();
    assert!(members.iter().all(|m| m.user_id != invited.id));

    let task = Task::find_by_id(&pool, task.id, business.id).await.unwrap().unwrap();
    assert_eq!(task.assignee_id, None);

    let listed = Business::list_for_user(&pool, owner.id).await.unwrap();
    assert!(listed.iter().any(|b| b.id == business.id && b.role == MemberRole::Owner));
}

#[tokio::test]
async fn test_concurrent_owner_changes_keep_one_owner() {
    let pool = require_db!();
    let (ada, business, _) = common::workspace(&pool, "Owners").await;
    let bob = common::create_user(&pool, "Bob").await;
    BusinessMember::create(
        &pool,
        CreateBusinessMember {
            business_id: business.id,
            user_id: bob.id,
            role: MemberRole::Owner,
        },
    )
    .await
    .unwrap();
    assert_eq!(BusinessMember::count_owners(&pool, business.id).await.unwrap(), 2);

    let (first, second) = tokio::join!(
        BusinessMember::delete(&pool, business.id, ada.id),
        BusinessMember::delete(&pool, business.id, bob.id),
    );
    let removed = [&first, &second].iter().filter(|r| matches!(r, Ok(true))).count();
    let refused = [&first, &second]
        .iter()
        .filter(|r| matches!(r, Err(DomainError::Conflict(_))))
        .count();
    assert_eq!((removed, refused), (1, 1));
    assert_eq!(BusinessMember::count_owners(&pool, business.id).await.unwrap(), 1);

    let survivor = if first.is_ok() { bob.id } else { ada.id };
    let cleo = common::create_user(&pool, "Cleo").await;
    BusinessMember::create(
        &pool,
        CreateBusinessMember {
            business_id: business.id,
            user_id: cleo.id,
            role: MemberRole::Owner,
        },
    )
    .await
    .unwrap();

    let (first, second) = tokio::join!(
        BusinessMember::update_role(&pool, business.id, survivor, MemberRole::Admin),
        BusinessMember::update_role(&pool, business.id, cleo.id, MemberRole::Admin),
    );
    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    assert!(matches!(first.as_ref().err().or(second.as_ref().err()), Some(DomainError::Conflict(_))));
    assert_eq!(BusinessMember::count_owners(&pool, business.id).await.unwrap(), 1);

    // Re-asserting the owner role on the last owner is not a demotion
    let last = if first.is_ok() { cleo.id } else { survivor };
    let kept = BusinessMember::update_role(&pool, business.id, last, MemberRole::Owner)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.role, MemberRole::Owner);
    assert!(matches!(
        BusinessMember::delete(&pool, business.id, last).await,
        Err(DomainError::Conflict(_))
    ));

    // Members that are not owners are never blocked
    let outsider = uuid::Uuid::new_v4();
    assert!(!BusinessMember::delete(&pool, business.id, outsider).await.unwrap());
    assert!(BusinessMember::update_role(&pool, business.id, outsider, MemberRole::Viewer)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_business_slugs_are_unique() {
    let pool = require_db!();
    let owner = common::create_user(&pool, "Sluggo").await;
    let name = format!("Slug Co {}", uuid::Uuid::new_v4().simple());

    let first = common::create_business(&pool, &owner, &name).await;
    let second = common::create_business(&pool, &owner, &name).await;

    assert_ne!(first.slug, second.slug);
    assert_eq!(second.slug, format!("{}-2", first.slug));

    let by_slug = Business::find_by_slug(&pool, &second.slug).await.unwrap();
    assert_eq!(by_slug.map(|b| b.id), Some(second.id));
}

fn hex_token() -> String {
    let (_, hash) = tallyboard_shared::auth::invitation::generate_invitation_token();
    hash
}
