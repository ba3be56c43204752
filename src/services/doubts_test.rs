use super::*;
use crate::gateway::test_helpers::{MockGateway, doubt};
use crate::gateway::types::DoubtList;
use crate::services::chat::ChatSession;
use crate::state::chat::Chapter;
use crate::store::MemoryStorage;

fn listing(doubts: Vec<Doubt>) -> Result<DoubtList, GatewayError> {
    Ok(DoubtList { success: true, doubts })
}

#[tokio::test]
async fn first_read_fetches_then_serves_cache() {
    let mock = Arc::new(MockGateway::new());
    mock.push_doubts(listing(vec![doubt("1", "why?")]));
    let board = DoubtBoard::new(mock.clone());
    assert!(board.cached("c1").is_none());

    let first = board.doubts("c1", false).await.unwrap();
    let second = board.doubts("c1", false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].question, "why?");
    assert_eq!(mock.calls.lock().unwrap().fetch_doubts, 1);
}

#[tokio::test]
async fn force_bypasses_cache() {
    let mock = Arc::new(MockGateway::new());
    mock.push_doubts(listing(vec![doubt("1", "why?")]));
    mock.push_doubts(listing(vec![doubt("1", "why?"), doubt("2", "how?")]));
    let board = DoubtBoard::new(mock.clone());

    board.doubts("c1", false).await.unwrap();
    let refreshed = board.doubts("c1", true).await.unwrap();

    assert_eq!(refreshed.len(), 2);
    assert_eq!(board.cached("c1").unwrap().len(), 2);
    assert_eq!(mock.calls.lock().unwrap().fetch_doubts, 2);
}

#[tokio::test]
async fn failed_fetch_caches_empty_list() {
    let mock = Arc::new(MockGateway::new());
    mock.push_doubts(Err(GatewayError::Network("offline".into())));
    let board = DoubtBoard::new(mock.clone());

    assert!(board.doubts("c1", false).await.is_err());
    assert_eq!(board.cached("c1"), Some(Vec::new()));
    assert!(board.doubts("c1", false).await.unwrap().is_empty());
    assert_eq!(mock.calls.lock().unwrap().fetch_doubts, 1);
}

#[tokio::test]
async fn saved_doubt_triggers_refresh() {
    let mock = Arc::new(MockGateway::new());
    mock.push_doubts(listing(vec![doubt("9", "what is x?")]));
    let board = Arc::new(DoubtBoard::new(mock.clone()));
    let session = ChatSession::new(mock.clone(), Arc::new(MemoryStorage::new()), 6);
    let task = spawn_refresh_task(board.clone(), session.subscribe());

    session.open_chat(Chapter::new("c1", "Linear Equations"));
    session.send_user_message("what is x?").await.unwrap();
    while board.cached("c1").is_none() {
        tokio::task::yield_now().await;
    }

    assert_eq!(board.cached("c1").unwrap()[0].id, "9");
    drop(session);
    task.await.unwrap();
}
