use std::sync::Arc;

use queued::queue::{hash_item, QueueRegistry, DEFAULT_QUEUE};

#[tokio::test]
async fn test_registry_creation_has_default_queue() {
    let registry = QueueRegistry::new(false);

    assert_eq!(registry.queue_count(), 1);
    assert!(registry.get(DEFAULT_QUEUE).is_some());
    assert!(!registry.allow_duplicates());
}

#[tokio::test]
async fn test_get_or_create_queue() {
    let registry = QueueRegistry::new(false);

    let queue = registry.get_or_create("emails");

    assert_eq!(queue.name(), "emails");
    assert_eq!(registry.queue_count(), 2);
}

#[tokio::test]
async fn test_get_or_create_returns_existing_queue() {
    let registry = QueueRegistry::new(false);

    let queue1 = registry.get_or_create("emails");
    queue1.enqueue(&b"data"[..]).unwrap();

    let queue2 = registry.get_or_create("emails");

    assert!(Arc::ptr_eq(&queue1, &queue2));
    assert_eq!(queue2.size(), 1);
    assert_eq!(registry.queue_count(), 2);
}

#[tokio::test]
async fn test_get_queue_nonexistent() {
    let registry = QueueRegistry::new(false);

    assert!(registry.get("nonexistent").is_none());
}

#[tokio::test]
async fn test_queues_inherit_duplicate_policy() {
    let registry = QueueRegistry::new(true);

    let queue = registry.get_or_create("dups");
    queue.enqueue(&b"x"[..]).unwrap();
    queue.enqueue(&b"x"[..]).unwrap();

    assert!(queue.allows_duplicates());
    assert_eq!(queue.size(), 2);
}

#[tokio::test]
async fn test_list_all_queues() {
    let registry = QueueRegistry::new(false);

    registry.get_or_create("queue-b");
    registry.get_or_create("queue-a");

    assert_eq!(
        registry.list_queues(),
        vec!["default".to_string(), "queue-a".to_string(), "queue-b".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_queue_creation() {
    let registry = Arc::new(QueueRegistry::new(false));
    let mut handles = vec![];

    for _ in 0..32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move { registry.get_or_create("racy") }));
    }

    let mut queues = vec![];
    for handle in handles {
        queues.push(handle.await.unwrap());
    }

    assert_eq!(registry.queue_count(), 2);
    assert!(queues.iter().all(|q| Arc::ptr_eq(q, &queues[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access_to_same_queue() {
    let registry = Arc::new(QueueRegistry::new(true));
    let mut handles = vec![];

    for i in 0..10u32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let queue = registry.get_or_create("shared");
            for j in 0..10u32 {
                queue.enqueue([i.to_be_bytes(), j.to_be_bytes()].concat()).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.get("shared").unwrap().size(), 100);
}

#[tokio::test]
async fn test_queue_isolation() {
    let registry = QueueRegistry::new(false);

    registry.get_or_create("a").enqueue(&b"only-in-a"[..]).unwrap();
    let b = registry.get_or_create("b");

    assert_eq!(b.size(), 0);
    assert!(!b.has(&hash_item(b"only-in-a")));
    assert!(b.dequeue().is_err());
    assert_eq!(registry.get("a").unwrap().size(), 1);
}

#[tokio::test]
async fn test_queue_names_case_sensitive() {
    let registry = QueueRegistry::new(false);

    registry.get_or_create("Jobs");
    registry.get_or_create("jobs");

    assert_eq!(registry.queue_count(), 3);
}

#[tokio::test]
async fn test_stats_summary() {
    let registry = QueueRegistry::new(false);

    let emails = registry.get_or_create("emails");
    emails.enqueue(&b"one"[..]).unwrap();
    emails.enqueue(&b"two"[..]).unwrap();
    emails.dequeue().unwrap();

    let summary = registry.stats_summary();

    assert_eq!(summary.total_queues, 2);
    let stats = &summary.queues["emails"];
    assert_eq!(stats.size, 1);
    assert_eq!(stats.enqueued_total, 2);
    assert_eq!(stats.dequeued_total, 1);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["queues"]["emails"]["size"], 1);
    assert_eq!(json["total_queues"], 2);
}
