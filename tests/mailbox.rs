use anyhow::Result;
use tempfile::TempDir;
use wmail::models::RecipientKind;
use wmail::{AuthContext, Config, Mailbox, SearchFilters, SendEmail, Session, View};

async fn test_mailbox() -> Result<(Mailbox, TempDir)> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = TempDir::new()?;
    let config = Config {
        database_url: format!("sqlite:{}/wmail.db?mode=rwc", dir.path().display()),
        ..Config::default()
    };
    Ok((Mailbox::connect(config).await?, dir))
}

async fn login(mailbox: &Mailbox, email: &str) -> Result<AuthContext> {
    let user = mailbox.ensure_user(email, None).await?;
    Ok(AuthContext::authenticated(Session {
        user_id: user.id,
        email: user.email,
    }))
}

fn message(to: &str, subject: &str, body: &str) -> SendEmail {
    SendEmail {
        to: vec![to.to_string()],
        subject: subject.to_string(),
        body: body.to_string(),
        ..SendEmail::default()
    }
}

#[tokio::test]
async fn anonymous_callers_get_failure_envelopes() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let nobody = AuthContext::anonymous();

    let listed = mailbox.inbox(&nobody, None, None).await;
    assert!(!listed.success);
    assert_eq!(listed.message.as_deref(), Some("Unauthorized"));
    assert!(listed.emails.is_empty());

    let sent = mailbox
        .send_email(&nobody, message("bob@example.com", "hi", "there"))
        .await;
    assert!(!sent.success);
    assert_eq!(sent.message.as_deref(), Some("Unauthorized"));
    Ok(())
}

#[tokio::test]
async fn messages_stay_invisible_to_third_parties() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;
    let carol = login(&mailbox, "carol@example.com").await?;

    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "secret", "for bob only"))
        .await;
    assert!(sent.success);
    let email_id = sent.email_id.unwrap();

    assert_eq!(mailbox.inbox(&bob, None, None).await.emails.len(), 1);
    assert_eq!(mailbox.sent(&alice, None, None).await.emails.len(), 1);

    for view in [
        mailbox.inbox(&carol, None, None).await,
        mailbox.sent(&carol, None, None).await,
        mailbox.starred(&carol, None, None).await,
        mailbox.trashed(&carol, None, None).await,
    ] {
        assert!(view.success);
        assert!(view.emails.is_empty());
    }
    assert!(mailbox.search(&carol, "secret").await.emails.is_empty());

    // Missing and forbidden are the same answer.
    let forbidden = mailbox.email_by_id(&carol, email_id).await;
    let missing = mailbox.email_by_id(&carol, 99_999).await;
    assert!(!forbidden.success && !missing.success);
    assert_eq!(forbidden.message, missing.message);
    assert_eq!(forbidden.message.as_deref(), Some("Email not found"));
    Ok(())
}

#[tokio::test]
async fn send_creates_placeholder_users_and_single_delivery_slots() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;

    let sent = mailbox
        .send_email(
            &alice,
            SendEmail {
                to: vec!["dave@example.net".into()],
                cc: vec!["dave@example.net".into(), "erin@example.net".into()],
                subject: "welcome".into(),
                body: "first contact".into(),
                ..SendEmail::default()
            },
        )
        .await;
    assert!(sent.success);

    let email = mailbox
        .email_by_id(&alice, sent.email_id.unwrap())
        .await
        .email
        .unwrap();
    assert_eq!(email.recipients.len(), 2);

    let dave = email
        .recipients
        .iter()
        .find(|r| r.user.email == "dave@example.net")
        .unwrap();
    // First role wins for a duplicated address, and the placeholder name is
    // the address local part.
    assert_eq!(dave.kind, RecipientKind::To);
    assert_eq!(dave.user.name.as_deref(), Some("dave"));

    let erin = email
        .recipients
        .iter()
        .find(|r| r.user.email == "erin@example.net")
        .unwrap();
    assert_eq!(erin.kind, RecipientKind::Cc);
    Ok(())
}

#[tokio::test]
async fn drafts_have_no_sent_at_and_stay_out_of_sent() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;

    let draft = SendEmail {
        is_draft: true,
        ..message("bob@example.com", "wip", "unfinished thought")
    };
    assert!(mailbox.send_email(&alice, draft).await.success);

    let drafts = mailbox.drafts(&alice, None, None).await;
    assert_eq!(drafts.emails.len(), 1);
    assert!(drafts.emails[0].is_draft);
    assert!(drafts.emails[0].sent_at.is_none());
    assert!(mailbox.sent(&alice, None, None).await.emails.is_empty());
    Ok(())
}

#[tokio::test]
async fn toggle_star_is_an_involution() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;
    let carol = login(&mailbox, "carol@example.com").await?;

    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "star me", "body"))
        .await;
    let email_id = sent.email_id.unwrap();

    let starred = mailbox.toggle_star(&bob, email_id).await;
    assert!(starred.success);
    assert_eq!(starred.is_starred, Some(true));
    assert_eq!(mailbox.starred(&bob, None, None).await.emails.len(), 1);

    let unstarred = mailbox.toggle_star(&bob, email_id).await;
    assert_eq!(unstarred.is_starred, Some(false));
    assert!(mailbox.starred(&bob, None, None).await.emails.is_empty());

    let denied = mailbox.toggle_star(&carol, email_id).await;
    assert!(!denied.success);
    assert_eq!(denied.message.as_deref(), Some("Email not found"));
    Ok(())
}

#[tokio::test]
async fn viewing_marks_the_callers_delivery_read() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;

    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "news", "body"))
        .await;
    let email_id = sent.email_id.unwrap();

    // The first view returns the pre-view snapshot.
    let first = mailbox.email_by_id(&bob, email_id).await.email.unwrap();
    let delivery = first.recipients.iter().find(|r| r.user.email == "bob@example.com").unwrap();
    assert!(!delivery.is_read);

    let second = mailbox.email_by_id(&bob, email_id).await.email.unwrap();
    let delivery = second.recipients.iter().find(|r| r.user.email == "bob@example.com").unwrap();
    assert!(delivery.is_read);
    assert!(delivery.read_at.is_some());
    Ok(())
}

#[tokio::test]
async fn read_state_only_moves_for_actual_recipients() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;

    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "unread", "body"))
        .await;
    let email_id = sent.email_id.unwrap();

    // The sender holds no delivery row: benign no-op, not an error.
    assert!(mailbox.mark_as_read(&alice, email_id).await.success);
    let inbox = mailbox.inbox(&bob, None, None).await.emails;
    let delivery = inbox[0].recipients.iter().find(|r| r.user.email == "bob@example.com").unwrap();
    assert!(!delivery.is_read);

    assert!(mailbox.mark_as_read(&bob, email_id).await.success);
    let inbox = mailbox.inbox(&bob, None, None).await.emails;
    let delivery = inbox[0].recipients.iter().find(|r| r.user.email == "bob@example.com").unwrap();
    assert!(delivery.is_read);

    assert!(mailbox.mark_as_unread(&bob, email_id).await.success);
    let inbox = mailbox.inbox(&bob, None, None).await.emails;
    let delivery = inbox[0].recipients.iter().find(|r| r.user.email == "bob@example.com").unwrap();
    assert!(!delivery.is_read);
    assert!(delivery.read_at.is_none());
    Ok(())
}

#[tokio::test]
async fn pagination_windows_the_ordered_set() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;

    for n in 1..=15 {
        let sent = mailbox
            .send_email(&alice, message("bob@example.com", &format!("m{n}"), "body"))
            .await;
        assert!(sent.success);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let page1 = mailbox.inbox(&bob, Some(1), Some(10)).await.emails;
    assert_eq!(page1.len(), 10);
    assert_eq!(page1[0].subject, "m15");

    let page2 = mailbox.inbox(&bob, Some(2), Some(10)).await.emails;
    let subjects: Vec<&str> = page2.iter().map(|e| e.subject.as_str()).collect();
    assert_eq!(subjects, vec!["m5", "m4", "m3", "m2", "m1"]);

    let beyond = mailbox.inbox(&bob, Some(4), Some(10)).await;
    assert!(beyond.success);
    assert!(beyond.emails.is_empty());
    Ok(())
}

#[tokio::test]
async fn permanent_delete_requires_visibility_and_is_final() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;
    let carol = login(&mailbox, "carol@example.com").await?;

    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "gone soon", "body"))
        .await;
    let email_id = sent.email_id.unwrap();

    let denied = mailbox.delete_email_permanently(&carol, email_id).await;
    assert!(!denied.success);
    assert_eq!(denied.message.as_deref(), Some("Email not found"));

    assert!(mailbox.move_to_trash(&bob, email_id).await.success);
    assert!(mailbox.delete_email_permanently(&bob, email_id).await.success);

    assert!(!mailbox.email_by_id(&alice, email_id).await.success);
    assert!(mailbox.trashed(&bob, None, None).await.emails.is_empty());
    Ok(())
}

#[tokio::test]
async fn label_names_are_shared_and_reference_counted() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;

    let created = mailbox.create_label(&alice, "projects", Some("#FF0000")).await;
    assert!(created.success);
    let label = created.label.unwrap();

    // Same name from another user reuses the shared row.
    let reused = mailbox.create_label(&bob, "projects", None).await;
    assert!(reused.success);
    assert_eq!(reused.label.unwrap().id, label.id);

    let duplicate = mailbox.create_label(&alice, "projects", None).await;
    assert!(!duplicate.success);
    assert_eq!(duplicate.message.as_deref(), Some("Label already exists"));

    // Dropping one association leaves the other holder untouched.
    assert!(mailbox.delete_label(&bob, label.id).await.success);
    let alices = mailbox.user_labels(&alice).await;
    assert_eq!(alices.labels.len(), 1);
    assert_eq!(alices.labels[0].id, label.id);

    // The last holder takes the row with them; the name is free again.
    assert!(mailbox.delete_label(&alice, label.id).await.success);
    assert!(mailbox.user_labels(&alice).await.labels.is_empty());
    let recreated = mailbox.create_label(&bob, "projects", None).await;
    assert!(recreated.success);
    assert_ne!(recreated.label.unwrap().id, label.id);
    Ok(())
}

#[tokio::test]
async fn labelling_messages_feeds_counts_and_the_label_view() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;
    let carol = login(&mailbox, "carol@example.com").await?;

    let label = mailbox
        .create_label(&alice, "travel", None)
        .await
        .label
        .unwrap();
    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "itinerary", "body"))
        .await;
    let email_id = sent.email_id.unwrap();

    assert!(mailbox.add_label_to_email(&alice, email_id, label.id).await.success);
    let again = mailbox.add_label_to_email(&alice, email_id, label.id).await;
    assert!(!again.success);
    assert_eq!(again.message.as_deref(), Some("Label already applied"));

    let denied = mailbox.add_label_to_email(&carol, email_id, label.id).await;
    assert!(!denied.success);
    assert_eq!(denied.message.as_deref(), Some("Email not found"));

    // The count follows visibility, and trashing removes it again.
    assert_eq!(mailbox.user_labels(&alice).await.labels[0].count, 1);
    assert_eq!(
        mailbox
            .emails_by_label(&bob, label.id, None, None)
            .await
            .emails
            .len(),
        1
    );

    assert!(mailbox.move_to_trash(&alice, email_id).await.success);
    assert_eq!(mailbox.user_labels(&alice).await.labels[0].count, 0);
    assert!(
        mailbox
            .emails_by_label(&alice, label.id, None, None)
            .await
            .emails
            .is_empty()
    );
    Ok(())
}

#[tokio::test]
async fn read_receipts_are_idempotent_and_notify_once() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;

    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "receipt test", "body"))
        .await;
    let email_id = sent.email_id.unwrap();

    let first = mailbox.record_read_receipt(&bob, email_id).await;
    assert!(first.success);
    let second = mailbox.record_read_receipt(&bob, email_id).await;
    assert!(second.success);
    assert_eq!(second.message.as_deref(), Some("Read receipt already recorded"));

    let receipts = mailbox.read_receipts(&alice, email_id).await;
    assert_eq!(receipts.receipts.len(), 1);
    assert_eq!(receipts.receipts[0].user.email, "bob@example.com");

    let feed = mailbox.notifications(&alice).await;
    assert_eq!(feed.notifications.len(), 1);
    let note = &feed.notifications[0];
    assert_eq!(note.title, "Email Read");
    assert!(note.message.contains("bob@example.com"));
    assert!(note.message.contains("receipt test"));
    assert_eq!(note.email_id, Some(email_id));

    // The sender is not a recipient and cannot record a receipt.
    let denied = mailbox.record_read_receipt(&alice, email_id).await;
    assert!(!denied.success);
    assert_eq!(denied.message.as_deref(), Some("Email not found"));
    Ok(())
}

#[tokio::test]
async fn notification_feed_is_scoped_to_its_owner() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;

    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "ping", "body"))
        .await;
    mailbox.record_read_receipt(&bob, sent.email_id.unwrap()).await;

    let note_id = mailbox.notifications(&alice).await.notifications[0].id;
    assert!(mailbox.notifications(&bob).await.notifications.is_empty());

    // Someone else's notification id behaves like a missing one.
    let denied = mailbox.mark_notification_read(&bob, note_id).await;
    assert!(!denied.success);
    assert_eq!(denied.message.as_deref(), Some("Notification not found"));

    assert!(mailbox.mark_notification_read(&alice, note_id).await.success);
    assert!(mailbox.notifications(&alice).await.notifications[0].is_read);

    assert!(mailbox.delete_notification(&alice, note_id).await.success);
    assert!(mailbox.notifications(&alice).await.notifications.is_empty());
    Ok(())
}

#[tokio::test]
async fn search_matches_substrings_case_insensitively() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;

    mailbox
        .send_email(&alice, message("bob@example.com", "Quarterly Report", "numbers inside"))
        .await;
    mailbox
        .send_email(&alice, message("bob@example.com", "lunch", "see you at noon"))
        .await;

    let by_subject = mailbox.search(&bob, "rEpOrT").await;
    assert_eq!(by_subject.emails.len(), 1);
    assert_eq!(by_subject.emails[0].subject, "Quarterly Report");

    let by_sender = mailbox.search(&bob, "alice@").await;
    assert_eq!(by_sender.emails.len(), 2);

    let blank = mailbox.search(&bob, "   ").await;
    assert!(blank.success);
    assert!(blank.emails.is_empty());
    Ok(())
}

#[tokio::test]
async fn advanced_search_conjoins_its_filters() -> Result<()> {
    let (mailbox, _dir) = test_mailbox().await?;
    let alice = login(&mailbox, "alice@example.com").await?;
    let bob = login(&mailbox, "bob@example.com").await?;

    mailbox
        .send_email(&alice, message("bob@example.com", "budget draft", "plain text"))
        .await;
    mailbox
        .send_email(&alice, message("bob@example.com", "minutes", "the budget was discussed"))
        .await;
    mailbox
        .send_email(&alice, message("bob@example.com", "minutes", "nothing else"))
        .await;

    // Excluded term knocks out a hit in either field.
    let without = mailbox
        .advanced_search(
            &bob,
            SearchFilters {
                doesnt_have: Some("budget".into()),
                ..SearchFilters::default()
            },
        )
        .await;
    assert_eq!(without.emails.len(), 1);
    assert_eq!(without.emails[0].body, "nothing else");

    let with_words = mailbox
        .advanced_search(
            &bob,
            SearchFilters {
                has_words: Some("budget".into()),
                ..SearchFilters::default()
            },
        )
        .await;
    assert_eq!(with_words.emails.len(), 2);

    let narrowed = mailbox
        .advanced_search(
            &bob,
            SearchFilters {
                from: Some("alice".into()),
                to: Some("bob".into()),
                subject: Some("minutes".into()),
                doesnt_have: Some("budget".into()),
                ..SearchFilters::default()
            },
        )
        .await;
    assert_eq!(narrowed.emails.len(), 1);

    let stale_window = mailbox
        .advanced_search(
            &bob,
            SearchFilters {
                date_to: Some(chrono::Utc::now() - chrono::Duration::hours(1)),
                ..SearchFilters::default()
            },
        )
        .await;
    assert!(stale_window.success);
    assert!(stale_window.emails.is_empty());
    Ok(())
}

#[tokio::test]
async fn mutations_signal_the_views_they_stale() -> Result<()> {
    let (mut mailbox, _dir) = test_mailbox().await?;
    let mut invalidations = mailbox.invalidations();
    let alice = login(&mailbox, "alice@example.com").await?;

    let sent = mailbox
        .send_email(&alice, message("bob@example.com", "signal", "body"))
        .await;
    assert!(sent.success);

    let mut staled = Vec::new();
    while let Ok(view) = invalidations.try_recv() {
        staled.push(view);
    }
    assert_eq!(staled, vec![View::Inbox, View::Sent, View::Drafts]);

    mailbox.move_to_trash(&alice, sent.email_id.unwrap()).await;
    let mut staled = Vec::new();
    while let Ok(view) = invalidations.try_recv() {
        staled.push(view);
    }
    assert_eq!(staled, vec![View::Inbox, View::Trash]);
    Ok(())
}
