use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use post_image_harvester::error::{AppError, AppResult};
use post_image_harvester::infrastructure::{Session, SessionFactory};
use post_image_harvester::models::Credentials;
use post_image_harvester::orchestrator::SessionPool;

struct FakeSession {
    slot: usize,
    authenticated: bool,
    fail_auth: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Session for FakeSession {
    fn label(&self) -> String {
        format!("fake #{}", self.slot)
    }

    async fn authenticate(&mut self, _credentials: &Credentials) -> AppResult<()> {
        if self.fail_auth {
            return Err(AppError::login_failed("找不到登录表单"));
        }
        self.authenticated = true;
        Ok(())
    }

    async fn close(&mut self) -> AppResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Other("关闭时出错也不影响其他会话".to_string()))
    }
}

#[derive(Default)]
struct FakeFactory {
    failing_slots: Vec<usize>,
    failing_auth: bool,
    created: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn create(&self, slot: usize) -> AppResult<FakeSession> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if self.failing_slots.contains(&slot) {
            return Err(AppError::Other(format!("slot {} unavailable", slot)));
        }
        Ok(FakeSession {
            slot,
            authenticated: false,
            fail_auth: self.failing_auth,
            closes: Arc::clone(&self.closes),
        })
    }
}

fn cookies() -> Credentials {
    Credentials::Cookies {
        c_user: "1".to_string(),
        xs: "x".to_string(),
    }
}

#[tokio::test]
async fn test_pool_size_is_clamped() {
    let factory = FakeFactory::default();
    let pool = SessionPool::build(&factory, 12, None).await.unwrap();
    assert_eq!(pool.size(), 5);

    let factory = FakeFactory::default();
    let pool = SessionPool::build(&factory, 0, None).await.unwrap();
    assert_eq!(pool.size(), 1);
}

#[tokio::test]
async fn test_round_robin_assignment() {
    let factory = FakeFactory::default();
    let mut pool = SessionPool::build(&factory, 3, Some(&cookies())).await.unwrap();

    for index in 0..9 {
        assert_eq!(pool.slot_for(index), index % 3);
        let session = pool.acquire(index).unwrap();
        assert_eq!(session.slot, index % 3);
        assert!(session.authenticated);
    }
}

#[tokio::test]
async fn test_failed_slot_degrades_pool() {
    let factory = FakeFactory {
        failing_slots: vec![1],
        ..Default::default()
    };
    let pool = SessionPool::build(&factory, 3, None).await.unwrap();

    assert_eq!(factory.created.load(Ordering::SeqCst), 3);
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.shutdown().await, 2);
    assert_eq!(factory.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_no_session_is_fatal() {
    let factory = FakeFactory {
        failing_slots: vec![0, 1],
        ..Default::default()
    };
    let result = SessionPool::build(&factory, 2, None).await;
    assert!(matches!(result, Err(AppError::NoSessions { requested: 2 })));
}

#[tokio::test]
async fn test_auth_failure_keeps_session() {
    let factory = FakeFactory {
        failing_auth: true,
        ..Default::default()
    };
    let mut pool = SessionPool::build(&factory, 2, Some(&cookies())).await.unwrap();

    assert_eq!(pool.size(), 2);
    assert!(!pool.acquire(0).unwrap().authenticated);
}

#[tokio::test]
async fn test_every_session_closed_exactly_once() {
    let factory = FakeFactory::default();
    let mut pool = SessionPool::build(&factory, 4, None).await.unwrap();

    let checked_out = pool.check_out_all();
    assert_eq!(checked_out.len(), 4);
    assert!(pool.acquire(0).is_none());
    for (slot, session) in checked_out {
        pool.check_in(slot, session);
    }

    assert_eq!(pool.shutdown().await, 4);
    assert_eq!(factory.closes.load(Ordering::SeqCst), 4);
}
