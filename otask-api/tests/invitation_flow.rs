/// Integration tests for the invitation lifecycle
///
/// These tests verify the system end-to-end against a live database:
/// - Issue -> verify -> accept happy path
/// - Duplicate-pending rejection
/// - Permission checks (viewer, non-member, wrong email)
/// - At-most-once acceptance under concurrency
/// - Case-insensitive email binding
/// - Outbox enqueue, worker delivery, and stale-claim recovery
///
/// Each test skips itself when `DATABASE_URL` is not set.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestContext;
use otask_shared::invite::service::{InvitationService, InviteError};
use otask_shared::models::email_job::{EmailJob, EmailStatus};
use otask_shared::models::invitation::Invitation;
use otask_shared::models::membership::{CreateMembership, Membership, MembershipRole};
use serde_json::json;
use tower::ServiceExt as _;

async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_invitation(ctx: &TestContext, email: &str, role: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/v1/projects/{}/invitations", ctx.project.id))
        .header("authorization", ctx.auth_header())
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "email": email, "role": role }).to_string(),
        ))
        .unwrap()
}

fn post_accept(token: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/invitations/accept")
        .header("authorization", format!("Bearer {}", bearer))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "token": token }).to_string()))
        .unwrap()
}

/// Health endpoint reports a reachable database with its probe latency
#[tokio::test]
async fn test_health_reports_database_latency() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let response = ctx
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["database_latency_ms"].is_number());

    ctx.cleanup().await;
}

/// Full lifecycle: issue, verify, accept, and reject the second accept
#[tokio::test]
async fn test_invite_verify_accept_flow() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let invitee = common::create_user(&ctx.db, "invitee").await;

    // Issue
    let response = ctx
        .app
        .clone()
        .oneshot(post_invitation(&ctx, &invitee.email, "member"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["email"], invitee.email);
    assert_eq!(body["role"], "member");
    assert!(body["accepted_at"].is_null());

    // The token is not exposed in the response; the recipient gets it by
    // email. Pull it off the stored row.
    let invitations = Invitation::list_by_project(&ctx.db, ctx.project.id)
        .await
        .unwrap();
    let token = invitations[0].token.clone();

    // Verify without a session: token is good, but the client must log in
    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/invitations/verify?token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert_eq!(body["status"], "NEED_AUTH");
    assert_eq!(body["email"], invitee.email);

    // Verify with the invitee's session
    let invitee_token = common::token_for(&invitee);
    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/invitations/verify?token={}", token))
                .header("authorization", format!("Bearer {}", invitee_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "READY");
    assert_eq!(body["email"], invitee.email);
    assert_eq!(body["project_id"], ctx.project.id.to_string());
    assert_eq!(body["project_name"], ctx.project.name);

    // A caller who already belongs to the project is told so
    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/invitations/verify?token={}", token))
                .header("authorization", ctx.auth_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "ALREADY_MEMBER");

    // Accept
    let response = ctx
        .app
        .clone()
        .oneshot(post_accept(&token, &invitee_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["role"], "member");
    assert_eq!(body["member_id"], invitee.id.to_string());

    assert!(Membership::exists(&ctx.db, ctx.project.id, invitee.id)
        .await
        .unwrap());

    // Second accept by the same user is a conflict (already a member)
    let response = ctx
        .app
        .clone()
        .oneshot(post_accept(&token, &invitee_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    ctx.cleanup().await;
}

/// A second invitation for the same pending (project, email) is rejected;
/// once the first is accepted the slot opens up again
#[tokio::test]
async fn test_duplicate_pending_invitation_conflict() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let invitee = common::create_user(&ctx.db, "pending").await;

    let response = ctx
        .app
        .clone()
        .oneshot(post_invitation(&ctx, &invitee.email, "member"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(post_invitation(&ctx, &invitee.email, "viewer"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Accept the pending invitation
    let invitations = Invitation::list_by_project(&ctx.db, ctx.project.id)
        .await
        .unwrap();
    let token = invitations[0].token.clone();

    let response = ctx
        .app
        .clone()
        .oneshot(post_accept(&token, &common::token_for(&invitee)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // No longer pending, so a fresh invitation for the same pair is allowed
    let response = ctx
        .app
        .clone()
        .oneshot(post_invitation(&ctx, &invitee.email, "member"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    ctx.cleanup().await;
}

/// Accepting with an account whose email differs from the invited one fails
#[tokio::test]
async fn test_accept_wrong_email_forbidden() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let invitee = common::create_user(&ctx.db, "intended").await;
    let interloper = common::create_user(&ctx.db, "interloper").await;

    let response = ctx
        .app
        .clone()
        .oneshot(post_invitation(&ctx, &invitee.email, "member"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let invitations = Invitation::list_by_project(&ctx.db, ctx.project.id)
        .await
        .unwrap();
    let token = invitations[0].token.clone();

    let response = ctx
        .app
        .clone()
        .oneshot(post_accept(&token, &common::token_for(&interloper)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The invitation is untouched and the intended recipient can still join
    assert!(!Membership::exists(&ctx.db, ctx.project.id, interloper.id)
        .await
        .unwrap());

    let response = ctx
        .app
        .clone()
        .oneshot(post_accept(&token, &common::token_for(&invitee)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    ctx.cleanup().await;
}

/// An invitation sent to `A@X.COM` is accepted by the account `a@x.com`
#[tokio::test]
async fn test_accept_matches_email_case_insensitively() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let invitee = common::create_user(&ctx.db, "casefold").await;

    // Issue to the uppercase form of the invitee's address
    let response = ctx
        .app
        .clone()
        .oneshot(post_invitation(&ctx, &invitee.email.to_uppercase(), "member"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let invitations = Invitation::list_by_project(&ctx.db, ctx.project.id)
        .await
        .unwrap();
    let token = invitations[0].token.clone();

    let response = ctx
        .app
        .clone()
        .oneshot(post_accept(&token, &common::token_for(&invitee)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    assert!(Membership::exists(&ctx.db, ctx.project.id, invitee.id)
        .await
        .unwrap());

    ctx.cleanup().await;
}

/// Viewers cannot invite; non-members cannot even see the project
#[tokio::test]
async fn test_invite_permissions() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let viewer = common::create_user(&ctx.db, "viewer").await;
    Membership::create(
        &ctx.db,
        CreateMembership {
            project_id: ctx.project.id,
            member_id: viewer.id,
            role: MembershipRole::Viewer,
        },
    )
    .await
    .unwrap();

    let outsider = common::create_user(&ctx.db, "outsider").await;

    for (user, label) in [(&viewer, "viewer"), (&outsider, "outsider")] {
        let response = ctx
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/projects/{}/invitations", ctx.project.id))
                    .header("authorization", format!("Bearer {}", common::token_for(user)))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "email": "someone@example.com", "role": "member" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", label);
    }

    ctx.cleanup().await;
}

/// Garbage tokens are rejected at verify
#[tokio::test]
async fn test_verify_rejects_garbage_token() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/invitations/verify?token=not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["status"], "INVALID");

    ctx.cleanup().await;
}

/// Issuing an invitation leaves a pending row in the email outbox
#[tokio::test]
async fn test_invite_enqueues_outbox_row() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let email = format!("outbox-{}@example.com", uuid::Uuid::new_v4());

    let response = ctx
        .app
        .clone()
        .oneshot(post_invitation(&ctx, &email, "member"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // No status filter: a concurrently running worker may already have
    // claimed the row.
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM email_outbox WHERE recipient = $1")
            .bind(&email)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert_eq!(count, 1);

    sqlx::query("DELETE FROM email_outbox WHERE recipient = $1")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await;
}

/// Two accepts racing on one token produce exactly one membership
#[tokio::test]
async fn test_concurrent_accepts_only_one_wins() {
    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let invitee = common::create_user(&ctx.db, "racer").await;

    let service = InvitationService::new(
        ctx.db.clone(),
        common::TEST_SECRET,
        "http://localhost:8080",
    );

    service
        .invite(ctx.project.id, &invitee.email, MembershipRole::Member, ctx.admin.id)
        .await
        .unwrap();

    let invitations = Invitation::list_by_project(&ctx.db, ctx.project.id)
        .await
        .unwrap();
    let token = invitations[0].token.clone();

    let (a, b) = tokio::join!(
        service.accept(&token, &invitee),
        service.accept(&token, &invitee),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one accept must win: {:?} / {:?}", a, b);

    // The loser saw either the consumed row or the freshly created membership
    for result in [a, b] {
        if let Err(e) = result {
            assert!(matches!(
                e,
                InviteError::InvitationNotFoundOrExpired | InviteError::AlreadyMember
            ));
        }
    }

    let count = Membership::count_by_project(&ctx.db, ctx.project.id)
        .await
        .unwrap();
    // Admin plus the invitee, regardless of which request won
    assert_eq!(count, 2);

    ctx.cleanup().await;
}

/// The worker drains the outbox: pending rows end up sent
#[tokio::test]
async fn test_worker_delivers_outbox_row() {
    use otask_worker::mailer::{SmtpConfig, SmtpMailer};
    use otask_worker::orchestrator::{DeliveryOrchestrator, OrchestratorConfig};
    use otask_worker::queue::OutboxQueue;
    use std::sync::Arc;

    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let job = EmailJob::enqueue(
        &ctx.db,
        otask_shared::models::email_job::CreateEmailJob {
            recipient: format!("deliver-{}@example.com", uuid::Uuid::new_v4()),
            subject: "You've been invited to join project Test".to_string(),
            body: "Open this link to accept".to_string(),
        },
    )
    .await
    .unwrap();

    // Empty host puts the mailer in no-op mode: delivery "succeeds" without
    // touching the network.
    let mailer = Arc::new(
        SmtpMailer::new(&SmtpConfig {
            host: String::new(),
            port: 587,
            username: None,
            password: None,
            from: "OTask <noreply@otask.dev>".to_string(),
            use_starttls: true,
        })
        .unwrap(),
    );

    let orchestrator = DeliveryOrchestrator::with_config(
        OutboxQueue::new(ctx.db.clone()),
        mailer,
        OrchestratorConfig {
            poll_interval_secs: 1,
            batch_size: 10,
        },
    );
    let shutdown = orchestrator.shutdown_token();
    let handle = tokio::spawn(async move { orchestrator.run().await });

    common::wait_for(
        || async {
            let job = EmailJob::find_by_id(&ctx.db, job.id).await.unwrap().unwrap();
            job.status == EmailStatus::Sent
        },
        10,
    )
    .await
    .unwrap();

    shutdown.cancel();
    handle.await.unwrap().unwrap();

    let delivered = EmailJob::find_by_id(&ctx.db, job.id).await.unwrap().unwrap();
    assert_eq!(delivered.status, EmailStatus::Sent);
    assert!(delivered.sent_at.is_some());
    assert_eq!(delivered.attempts, 1);

    sqlx::query("DELETE FROM email_outbox WHERE id = $1")
        .bind(job.id)
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await;
}

/// A row stranded in "sending" by a dead worker is claimed again once its
/// claim goes stale
#[tokio::test]
async fn test_stale_sending_claim_is_reclaimed() {
    use otask_worker::queue::OutboxQueue;

    let Some(ctx) = TestContext::try_new().await else {
        return;
    };

    let job = EmailJob::enqueue(
        &ctx.db,
        otask_shared::models::email_job::CreateEmailJob {
            recipient: format!("reclaim-{}@example.com", uuid::Uuid::new_v4()),
            subject: "You've been invited to join project Test".to_string(),
            body: "Open this link to accept".to_string(),
        },
    )
    .await
    .unwrap();

    // Simulate a worker that claimed the row an hour ago and crashed before
    // finishing. Backdating created_at too makes this the oldest claimable
    // row, so the single-row claim below cannot touch rows owned by other
    // concurrently running tests.
    sqlx::query(
        r#"
        UPDATE email_outbox
        SET status = 'sending',
            attempts = 1,
            claimed_at = NOW() - interval '1 hour',
            created_at = NOW() - interval '1 hour'
        WHERE id = $1
        "#,
    )
    .bind(job.id)
    .execute(&ctx.db)
    .await
    .unwrap();

    let queue = OutboxQueue::new(ctx.db.clone());
    let jobs = queue.claim_jobs(Some(1)).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, job.id);
    assert_eq!(jobs[0].status, EmailStatus::Sending);
    assert_eq!(jobs[0].attempts, 2);

    // The reclaim refreshed the stamp, so the row is no longer stale
    let reclaimed = EmailJob::find_by_id(&ctx.db, job.id).await.unwrap().unwrap();
    let age = chrono::Utc::now() - reclaimed.claimed_at.unwrap();
    assert!(age < chrono::Duration::minutes(5));

    sqlx::query("DELETE FROM email_outbox WHERE id = $1")
        .bind(job.id)
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await;
}
