use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tokio::sync::mpsc::error::TryRecvError;

use super::Broker;
use super::topic::Topic;

#[test]
fn test_topic_new() {
    let topic = Topic::new("test_topic");
    assert_eq!(topic.name, "test_topic");
    assert_eq!(topic.subscriber_count(), 0);
    assert!(topic.messages().is_empty());
}

#[test]
fn test_broker_new() {
    let broker = Broker::default();
    assert_eq!(broker.topic_count(), 0);
    assert_eq!(broker.current_sequence(), 0);
    assert_eq!(broker.mailbox_capacity(), Broker::DEFAULT_MAILBOX_CAPACITY);
}

#[test]
fn test_zero_mailbox_capacity_is_clamped() {
    let broker = Broker::with_mailbox_capacity(0);
    assert_eq!(broker.mailbox_capacity(), 1);
}

#[test]
fn test_messaging_ids_and_fields() {
    let broker = Broker::new();

    let first = broker.add_message("test-topic", "Message 1");
    let second = broker.add_message("test-topic", "Message 2");

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert_eq!(first.content, "Message 1");
    assert_eq!(first.topic, "test-topic");
    assert_eq!(second.content, "Message 2");
    assert_eq!(broker.current_sequence(), 2);
}

#[test]
fn test_messages_are_kept_per_topic() {
    let broker = Broker::new();

    broker.add_message("topic1", "First");
    broker.add_message("topic2", "Second");
    broker.add_message("topic1", "Third");

    let topic1 = broker.get_topic_messages("topic1");
    let topic2 = broker.get_topic_messages("topic2");
    assert_eq!(topic1.len(), 2);
    assert_eq!(topic2.len(), 1);
    assert_eq!(topic1[0].content, "First");
    assert_eq!(topic1[1].content, "Third");
    assert_eq!(topic2[0].content, "Second");
}

#[test]
fn test_publish_without_subscribers_creates_topic() {
    let broker = Broker::new();
    broker.add_message("lonely", "hello");
    assert!(broker.contains_topic("lonely"));
    assert_eq!(broker.get_topic_messages("lonely").len(), 1);
}

#[test]
fn test_get_topic_messages_is_a_snapshot() {
    let broker = Broker::new();
    broker.add_message("snap", "one");

    let snapshot = broker.get_topic_messages("snap");
    broker.add_message("snap", "two");

    assert_eq!(snapshot.len(), 1);
    assert_eq!(broker.get_topic_messages("snap").len(), 2);
}

#[test]
fn test_unknown_topic_reads_as_empty() {
    let broker = Broker::new();
    assert!(broker.get_topic_messages("never-published").is_empty());
}

#[test]
fn test_get_or_create_returns_same_topic() {
    let broker = Broker::new();
    let a = broker.get_or_create_topic("shared");
    let b = broker.get_or_create_topic("shared");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(broker.topic_count(), 1);
}

#[test]
fn test_concurrent_get_or_create_yields_one_topic() {
    let broker = Arc::new(Broker::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let broker = Arc::clone(&broker);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                broker.get_or_create_topic("race")
            })
        })
        .collect();

    let topics: Vec<Arc<Topic>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for topic in &topics[1..] {
        assert!(Arc::ptr_eq(&topics[0], topic));
    }
    assert_eq!(broker.topic_count(), 1);
}

#[test]
fn test_concurrent_publishes_get_unique_increasing_ids() {
    let broker = Arc::new(Broker::new());
    let topics = ["a", "b", "c", "d"];

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let broker = Arc::clone(&broker);
            let topic = topics[i % topics.len()];
            thread::spawn(move || {
                (0..250)
                    .map(|n| broker.add_message(topic, format!("{i}-{n}")).id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all_ids = HashSet::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        // Each thread sees its own publishes in increasing order.
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        for id in ids {
            assert!(all_ids.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(all_ids.len(), 2000);
    assert_eq!(broker.current_sequence(), 2000);

    for topic in topics {
        let history = broker.get_topic_messages(topic);
        assert_eq!(history.len(), 500);
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));
        assert!(history.iter().all(|m| m.topic == topic));
    }
}

#[test]
fn test_subscriber_receives_published_message() {
    let broker = Arc::new(Broker::new());
    let mut subscription = broker.subscribe("news");

    let published = broker.add_message("news", "hello");

    let received = subscription.try_recv().unwrap();
    assert_eq!(received.id, published.id);
    assert_eq!(received.content, "hello");
    assert_eq!(received.topic, "news");
}

#[test]
fn test_subscriber_only_sees_its_topic() {
    let broker = Arc::new(Broker::new());
    let mut subscription = broker.subscribe("mine");

    broker.add_message("other", "not for me");

    assert!(matches!(subscription.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn test_subscribe_registers_and_drop_releases() {
    let broker = Arc::new(Broker::new());
    let subscription = broker.subscribe("ephemeral");

    let topic = broker.get_or_create_topic("ephemeral");
    assert_eq!(topic.subscriber_count(), 1);
    assert_eq!(subscription.topic(), "ephemeral");

    drop(subscription);
    assert_eq!(topic.subscriber_count(), 0);
    assert!(!broker.contains_topic("ephemeral"));
}

#[test]
fn test_topic_collected_after_last_unsubscribe_and_recreated() {
    let broker = Arc::new(Broker::new());
    broker.add_message("cycle", "before");

    let first = broker.subscribe("cycle");
    let second = broker.subscribe("cycle");

    first.unsubscribe();
    assert!(broker.contains_topic("cycle"));

    second.unsubscribe();
    assert!(!broker.contains_topic("cycle"));

    // History went away with the topic.
    broker.add_message("cycle", "after");
    assert!(broker.contains_topic("cycle"));
    let history = broker.get_topic_messages("cycle");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "after");

    let _third = broker.subscribe("cycle");
    assert!(broker.contains_topic("cycle"));
}

#[test]
fn test_full_mailbox_drops_only_for_stalled_subscriber() {
    let broker = Arc::new(Broker::new());
    let mut stalled = broker.subscribe("busy");
    let mut healthy = broker.subscribe("busy");

    for n in 0..Broker::DEFAULT_MAILBOX_CAPACITY {
        broker.add_message("busy", format!("msg {n}"));
        healthy.try_recv().unwrap();
    }

    let overflow = broker.add_message("busy", "one too many");
    assert_eq!(overflow.id, 101);

    // The healthy subscriber gets it, the stalled one only has the first 100.
    assert_eq!(healthy.try_recv().unwrap().id, overflow.id);
    for expected in 1..=100 {
        assert_eq!(stalled.try_recv().unwrap().id, expected);
    }
    assert!(matches!(stalled.try_recv(), Err(TryRecvError::Empty)));

    // It is still in the history.
    assert_eq!(broker.get_topic_messages("busy").len(), 101);
}

#[test]
fn test_delivery_preserves_publish_order() {
    let broker = Arc::new(Broker::with_mailbox_capacity(3));
    let mut subscription = broker.subscribe("gaps");

    for n in 1..=5 {
        broker.add_message("gaps", format!("{n}"));
    }

    let received: Vec<_> = std::iter::from_fn(|| subscription.try_recv().ok())
        .map(|m| m.id)
        .collect();
    assert_eq!(received, vec![1, 2, 3]);

    broker.add_message("gaps", "6");
    assert_eq!(subscription.try_recv().unwrap().id, 6);
}

#[test]
fn test_close_all_subscribers_ends_mailboxes() {
    let broker = Arc::new(Broker::new());
    let mut a = broker.subscribe("one");
    let mut b = broker.subscribe("two");
    broker.add_message("one", "pending");

    assert_eq!(broker.close_all_subscribers(), 2);

    // Pending messages drain before the close is observed.
    assert_eq!(a.try_recv().unwrap().content, "pending");
    assert!(matches!(a.try_recv(), Err(TryRecvError::Disconnected)));
    assert!(matches!(b.try_recv(), Err(TryRecvError::Disconnected)));

    drop(a);
    drop(b);
    assert_eq!(broker.topic_count(), 0);
}

#[tokio::test]
async fn test_recv_wakes_on_publish() {
    let broker = Arc::new(Broker::new());
    let mut subscription = broker.subscribe("async");

    let publisher = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            broker.add_message("async", "later");
        })
    };

    let message = subscription.recv().await.unwrap();
    assert_eq!(message.content, "later");
    publisher.await.unwrap();
}

#[test]
fn test_subscribe_after_collection_attaches_to_new_topic() {
    let broker = Arc::new(Broker::new());
    let first = broker.subscribe("reborn");
    let retired = broker.get_or_create_topic("reborn");

    first.unsubscribe();
    assert!(!broker.contains_topic("reborn"));

    let mut second = broker.subscribe("reborn");
    let current = broker.get_or_create_topic("reborn");
    assert!(!Arc::ptr_eq(&retired, &current));
    assert_eq!(retired.subscriber_count(), 0);
    assert_eq!(current.subscriber_count(), 1);

    let published = broker.add_message("reborn", "fresh");
    assert!(retired.messages().is_empty());
    assert_eq!(second.try_recv().unwrap().id, published.id);
    assert_eq!(second.history().len(), 1);
}

#[test]
fn test_publish_and_subscribe_race_topic_collection() {
    let broker = Arc::new(Broker::with_mailbox_capacity(10_000));
    let stop = Arc::new(AtomicBool::new(false));

    // Keeps the topic flipping between collected and recreated.
    let churn = {
        let broker = Arc::clone(&broker);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                broker.subscribe("churn").unsubscribe();
            }
        })
    };

    let publishers: Vec<_> = (0..4)
        .map(|i| {
            let broker = Arc::clone(&broker);
            thread::spawn(move || {
                for n in 0..2_000 {
                    // Holding a mailbox keeps the topic registered while we publish.
                    let mut subscription = broker.subscribe("churn");
                    let published = broker.add_message("churn", format!("{i}-{n}"));

                    let history = broker.get_topic_messages("churn");
                    assert!(
                        history.iter().any(|m| m.id == published.id),
                        "message {} not in the registered topic",
                        published.id
                    );
                    assert!(
                        subscription.history().iter().any(|m| m.id == published.id),
                        "subscription attached to a collected topic"
                    );

                    // Own message reaches own mailbox.
                    loop {
                        let received = subscription.try_recv().unwrap();
                        if received.id == published.id {
                            break;
                        }
                        assert!(received.id < published.id);
                    }
                }
            })
        })
        .collect();

    for handle in publishers {
        handle.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    churn.join().unwrap();

    assert_eq!(broker.current_sequence(), 8_000);
    assert!(!broker.contains_topic("churn"));
}
