//! Integration tests for overlapping transactions.
//!
//! `MemoryStore` calls never suspend, so the store here yields after every read: transactions
//! started together interleave their reads and commit against each other's writes.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::yield_now;
use tournament_bracket::store::{Batch, DocKey, Filter, Snapshot};
use tournament_bracket::{
    DocumentStore, MemoryStore, Principal, Subscription, TournamentError, TournamentId,
    TournamentKind, TournamentService,
};

#[derive(Clone, Default)]
struct YieldingStore {
    inner: MemoryStore,
}

#[async_trait]
impl DocumentStore for YieldingStore {
    async fn get(&self, key: &DocKey) -> Result<Option<Snapshot>, TournamentError> {
        let found = self.inner.get(key).await;
        yield_now().await;
        found
    }

    async fn commit(&self, batch: Batch) -> Result<(), TournamentError> {
        self.inner.commit(batch).await
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Snapshot>, TournamentError> {
        let found = self.inner.query(collection, filters).await;
        yield_now().await;
        found
    }

    async fn subscribe(&self, key: &DocKey) -> Result<Subscription, TournamentError> {
        self.inner.subscribe(key).await
    }
}

type Service = TournamentService<YieldingStore>;

async fn service_with(users: &[&str]) -> Service {
    let service = TournamentService::with_seed(YieldingStore::default(), 5);
    for name in users {
        service
            .create_profile(&Principal::new(*name), name)
            .await
            .unwrap();
    }
    service
}

fn who(uid: &str) -> Principal {
    Principal::new(uid)
}

/// `uid`'s active pointer names `id` exactly when `uid` is on that tournament's roster.
async fn assert_pointer_matches_roster(service: &Service, id: TournamentId, uid: &str) {
    let registered = match service.get_tournament(id).await {
        Ok(t) => t.value.is_registered(uid),
        Err(TournamentError::NotFound(_)) => false,
        Err(e) => panic!("unexpected error: {e}"),
    };
    let pointer = service
        .get_profile(uid)
        .await
        .unwrap()
        .unwrap()
        .active_tournament_id;
    assert_eq!(pointer, registered.then_some(id), "{uid}");
}

/// Exactly one of two racing results failed, and it failed as a stale write.
fn one_stale<A, B>(a: &Result<A, TournamentError>, b: &Result<B, TournamentError>) {
    let errors: Vec<&TournamentError> = [a.as_ref().err(), b.as_ref().err()].into_iter().flatten().collect();
    assert_eq!(errors, vec![&TournamentError::StaleWrite]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_all_land() {
    let names: Vec<String> = (0..12).map(|i| format!("player{i}")).collect();
    let mut all = vec!["org"];
    all.extend(names.iter().map(String::as_str));
    let service = Arc::new(service_with(&all).await);
    let id = service
        .create_tournament(&who("org"), "Open", TournamentKind::Duel, true)
        .await
        .unwrap()
        .id;

    let handles: Vec<_> = names
        .iter()
        .cloned()
        .map(|uid| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.join_tournament(&who(&uid), id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let t = service.get_tournament(id).await.unwrap().value;
    assert_eq!(t.players.len(), 13);
    for uid in &names {
        assert!(t.is_registered(uid));
        assert_pointer_matches_roster(&service, id, uid).await;
    }
}

#[tokio::test]
async fn racing_starts_have_one_winner() {
    let service = service_with(&["org", "bob", "cat"]).await;
    let id = service
        .create_tournament(&who("org"), "Open", TournamentKind::Duel, true)
        .await
        .unwrap()
        .id;
    service.join_tournament(&who("bob"), id).await.unwrap();
    service.join_tournament(&who("cat"), id).await.unwrap();

    let org = who("org");
    let (a, b) = tokio::join!(
        service.start_tournament(&org, id),
        service.start_tournament(&org, id)
    );
    one_stale(&a, &b);
    let stored = service.get_tournament(id).await.unwrap().value;
    assert_eq!(Some(&stored), a.as_ref().ok().or(b.as_ref().ok()));
    let organizer = service.get_profile("org").await.unwrap().unwrap();
    assert_eq!(organizer.stats.tournaments_hosted, 1);
}

#[tokio::test]
async fn join_and_invite_of_one_account_register_it_once() {
    let service = service_with(&["cap", "xena"]).await;
    let id = service
        .create_tournament(&who("cap"), "Squads", TournamentKind::TeamVsTeam, true)
        .await
        .unwrap()
        .id;

    let (x, cap) = (who("xena"), who("cap"));
    let (joined, invited) = tokio::join!(
        service.join_tournament(&x, id),
        service.invite_member(&cap, id, "xena")
    );
    one_stale(&joined, &invited);

    let t = service.get_tournament(id).await.unwrap().value;
    let entries = t.players.iter().filter(|p| p.includes("xena")).count();
    assert_eq!(entries, 1);
    assert_pointer_matches_roster(&service, id, "xena").await;

    // Retrying the loser now sees the winner's registration.
    if joined.is_ok() {
        assert_eq!(
            service.invite_member(&cap, id, "xena").await,
            Err(TournamentError::AlreadyRegistered)
        );
    } else {
        assert_eq!(
            service.join_tournament(&x, id).await,
            Err(TournamentError::AlreadyRegistered)
        );
    }
}

#[tokio::test]
async fn delete_racing_a_join_leaves_no_dangling_pointer() {
    let service = service_with(&["org", "xena"]).await;
    let id = service
        .create_tournament(&who("org"), "Open", TournamentKind::Duel, true)
        .await
        .unwrap()
        .id;

    let (org, x) = (who("org"), who("xena"));
    let (deleted, joined) = tokio::join!(
        service.delete_tournament(&org, id),
        service.join_tournament(&x, id)
    );
    assert!(deleted.is_err() || joined.is_err());
    assert_pointer_matches_roster(&service, id, "xena").await;
    assert_pointer_matches_roster(&service, id, "org").await;

    if deleted.is_err() {
        assert_eq!(deleted, Err(TournamentError::StaleWrite));
        service.delete_tournament(&org, id).await.unwrap();
        assert_pointer_matches_roster(&service, id, "xena").await;
    }
}

#[tokio::test]
async fn kick_racing_an_invite_leaves_no_dangling_pointer() {
    let service = service_with(&["org", "cap", "mate", "xena"]).await;
    let id = service
        .create_tournament(&who("org"), "Squads", TournamentKind::TeamVsTeam, false)
        .await
        .unwrap()
        .id;
    service.join_tournament(&who("cap"), id).await.unwrap();
    service.invite_member(&who("cap"), id, "mate").await.unwrap();

    let (org, cap) = (who("org"), who("cap"));
    let (kicked, invited) = tokio::join!(
        service.kick_participant(&org, id, "cap"),
        service.invite_member(&cap, id, "xena")
    );
    one_stale(&kicked, &invited);
    for uid in ["cap", "mate", "xena"] {
        assert_pointer_matches_roster(&service, id, uid).await;
    }
}
