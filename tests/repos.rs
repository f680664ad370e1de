//! Repository tests against a live Postgres. Run with
//! `RUN_MODE=test cargo test -- --ignored` once `config/test.toml` points at a
//! scratch database.

use chrono::{Duration, NaiveTime, Utc};

use bennes_lib::config::Config;
use bennes_lib::errors::RepoError;
use bennes_lib::models::*;
use bennes_lib::types::DbPool;
use bennes_lib::{create_db_pool, migrations, repos};

async fn prepare_db() -> DbPool {
    let config = Config::new().unwrap();
    let db_pool = create_db_pool(&config).await.unwrap();
    migrations::run(&db_pool).await.unwrap();
    db_pool
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password_hash: "$2b$04$invalidinvalidinvalidinvalidinvalidinvalidinvalidinva".to_string(),
        first_name: "Jean".to_string(),
        last_name: "Martin".to_string(),
        phone: None,
        company_name: None,
        role: UserRole::Customer,
        verification_token: None,
    }
}

#[tokio::test]
#[ignore]
async fn time_slot_capacity_is_never_exceeded() {
    let db_pool = prepare_db().await;
    let conn = db_pool.get().await.unwrap();
    let repo = repos::time_slot::make_repo();

    let date = Utc::now().date_naive() + Duration::days(3650 + i64::from(rand::random::<u16>()));
    let slot = repo
        .insert_exactly_one(
            &*conn,
            NewTimeSlot {
                date,
                start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                max_bookings: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(slot.current_bookings, 0);

    // The only booking goes through
    let reserved = repos::time_slot::reserve(&*conn, slot.id).await.unwrap().unwrap();
    assert_eq!(reserved.current_bookings, 1);

    // The slot is full now
    assert_eq!(repos::time_slot::reserve(&*conn, slot.id).await.unwrap(), None);

    // Releasing twice stays at zero
    let released = repos::time_slot::release(&*conn, slot.id).await.unwrap().unwrap();
    assert_eq!(released.current_bookings, 0);
    let released = repos::time_slot::release(&*conn, slot.id).await.unwrap().unwrap();
    assert_eq!(released.current_bookings, 0);

    repo.delete(&*conn, slot.id.into()).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn booked_time_slot_is_not_deleted() {
    let db_pool = prepare_db().await;
    let conn = db_pool.get().await.unwrap();
    let repo = repos::time_slot::make_repo();

    let date = Utc::now().date_naive() + Duration::days(3650 + i64::from(rand::random::<u16>()));
    let slot = repo
        .insert_exactly_one(
            &*conn,
            NewTimeSlot {
                date,
                start_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                max_bookings: 2,
            },
        )
        .await
        .unwrap();

    repos::time_slot::reserve(&*conn, slot.id).await.unwrap().unwrap();
    assert_eq!(repos::time_slot::delete_unbooked(&*conn, slot.id).await.unwrap(), None);
    assert!(repo.select_one(&*conn, slot.id.into()).await.unwrap().is_some());

    repos::time_slot::release(&*conn, slot.id).await.unwrap().unwrap();
    let deleted = repos::time_slot::delete_unbooked(&*conn, slot.id).await.unwrap().unwrap();
    assert_eq!(deleted.id, slot.id);
    assert!(repo.select_one(&*conn, slot.id.into()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn failed_logins_lock_the_account() {
    let db_pool = prepare_db().await;
    let conn = db_pool.get().await.unwrap();
    let repo = repos::user::make_repo();
    let user = repo
        .insert_exactly_one(&*conn, new_user(&format!("verrou-{}@exemple.fr", rand::random::<u32>())))
        .await
        .unwrap();
    let now = Utc::now();
    let lock = now + Duration::minutes(30);

    let counted = repos::user::record_failed_login(&*conn, user.id, now, 3, lock).await.unwrap();
    assert_eq!((counted.login_attempts, counted.lock_until), (1, None));
    let counted = repos::user::record_failed_login(&*conn, user.id, now, 3, lock).await.unwrap();
    assert_eq!((counted.login_attempts, counted.lock_until), (2, None));

    // The third failure locks and restarts the counter
    let counted = repos::user::record_failed_login(&*conn, user.id, now, 3, lock).await.unwrap();
    assert_eq!(counted.login_attempts, 0);
    assert!(counted.is_locked(now));

    // Once the lock has expired the count starts over and the lock is cleared
    let later = lock + Duration::minutes(1);
    let counted = repos::user::record_failed_login(&*conn, user.id, later, 3, later + Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!((counted.login_attempts, counted.lock_until), (1, None));

    repo.delete(&*conn, user.id.into()).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn concurrent_failed_logins_are_all_counted() {
    let db_pool = prepare_db().await;
    let user = {
        let conn = db_pool.get().await.unwrap();
        repos::user::make_repo()
            .insert_exactly_one(&*conn, new_user(&format!("course-{}@exemple.fr", rand::random::<u32>())))
            .await
            .unwrap()
    };
    let now = Utc::now();
    let user_id = user.id;

    let attempts = (0..2).map(|_| {
        let db_pool = db_pool.clone();
        tokio::spawn(async move {
            let conn = db_pool.get().await.unwrap();
            repos::user::record_failed_login(&*conn, user_id, now, 10, now + Duration::minutes(30))
                .await
                .unwrap()
        })
    });
    for attempt in attempts.collect::<Vec<_>>() {
        attempt.await.unwrap();
    }

    let conn = db_pool.get().await.unwrap();
    let stored = repos::user::make_repo().select_exactly_one(&*conn, user.id.into()).await.unwrap();
    assert_eq!(stored.login_attempts, 2);
    repos::user::make_repo().delete(&*conn, user.id.into()).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn email_search_matches_wildcards_literally() {
    let db_pool = prepare_db().await;
    let conn = db_pool.get().await.unwrap();
    let repo = repos::user::make_repo();
    let tag = rand::random::<u32>();
    let literal = repo
        .insert_exactly_one(&*conn, new_user(&format!("a_b{}@exemple.fr", tag)))
        .await
        .unwrap();
    let lookalike = repo
        .insert_exactly_one(&*conn, new_user(&format!("axb{}@exemple.fr", tag)))
        .await
        .unwrap();

    let found = repo
        .select(
            &*conn,
            UserFilter {
                email_like: Some(format!("a_b{}", tag)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(found.into_iter().map(|u| u.id).collect::<Vec<_>>(), vec![literal.id]);

    repo.delete(&*conn, literal.id.into()).await.unwrap();
    repo.delete(&*conn, lookalike.id.into()).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn duplicate_email_is_a_conflict() {
    let db_pool = prepare_db().await;
    let conn = db_pool.get().await.unwrap();
    let repo = repos::user::make_repo();

    let email = format!("doublon-{}@exemple.fr", rand::random::<u32>());
    let user = repo.insert_exactly_one(&*conn, new_user(&email)).await.unwrap();
    assert_eq!(user.login_attempts, 0);

    // Emails are compared lowercased
    match repo.insert_exactly_one(&*conn, new_user(&email.to_uppercase())).await {
        Err(RepoError::Conflict { .. }) => (),
        other => panic!("Expected conflict, got {:?}", other.map(|u| u.id)),
    }

    let found = repo
        .select_exactly_one(
            &*conn,
            UserFilter {
                email: Some(email.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(found.id, user.id);

    repo.delete(&*conn, user.id.into()).await.unwrap();
}
