//! # Delivery Scenarios
//!
//! End-to-end behaviour of the broker through `Bus::publish` /
//! `Bus::subscribe`:
//!
//! 1. **Fan-out**: every client on a channel sees every message, in order.
//! 2. **Rotation**: several handlers of one client take turns.
//! 3. **Eviction**: a failing handler is dropped and the message retried.
//! 4. **Recovery**: a client whose handlers all failed pauses, and a new
//!    subscription flushes everything it missed.

#[cfg(test)]
mod tests {
    use crate::support::{failing, handlers, payloads, recording, wait_until, Deliveries, Delivery};
    use fanout_bus::{Bus, Message};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    const SPICES: [&str; 4] = ["chipotle", "jalapeno", "habanero", "tabasco"];

    async fn publish_all(bus: &Bus, channel: &str, items: &[&str]) {
        for item in items {
            bus.publish(channel, Message::text(item)).await.unwrap();
        }
    }

    // =============================================================================
    // FAN-OUT
    // =============================================================================

    #[tokio::test]
    async fn test_two_clients_both_receive_in_order() {
        let bus = Bus::new();
        let c1: Deliveries = Arc::default();
        let c2: Deliveries = Arc::default();

        bus.subscribe("c1", "test", recording("h1", &c1)).unwrap();
        bus.subscribe("c2", "test", recording("h2", &c2)).unwrap();
        publish_all(&bus, "test", &["chipotle", "jalapeno"]).await;

        wait_until("four acks", || c1.lock().len() + c2.lock().len() == 4).await;
        assert_eq!(payloads(&c1), vec!["chipotle", "jalapeno"]);
        assert_eq!(payloads(&c2), vec!["chipotle", "jalapeno"]);
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let bus = Bus::new();
        let red: Deliveries = Arc::default();
        let blue: Deliveries = Arc::default();

        bus.subscribe("c1", "red", recording("r", &red)).unwrap();
        bus.subscribe("c1", "blue", recording("b", &blue)).unwrap();
        publish_all(&bus, "red", &["r1", "r2"]).await;
        publish_all(&bus, "blue", &["b1"]).await;

        wait_until("both channels", || red.lock().len() == 2 && blue.lock().len() == 1).await;
        assert_eq!(payloads(&red), vec!["r1", "r2"]);
        assert_eq!(payloads(&blue), vec!["b1"]);
    }

    #[tokio::test]
    async fn test_publish_before_subscribe_is_not_replayed() {
        let bus = Bus::new();
        publish_all(&bus, "t", &["early"]).await;
        sleep(Duration::from_millis(20)).await;

        let log: Deliveries = Arc::default();
        bus.subscribe("c1", "t", recording("h", &log)).unwrap();
        publish_all(&bus, "t", &["late"]).await;

        wait_until("late message", || !log.lock().is_empty()).await;
        sleep(Duration::from_millis(20)).await;
        assert_eq!(payloads(&log), vec!["late"]);
    }

    // =============================================================================
    // ROTATION
    // =============================================================================

    #[tokio::test]
    async fn test_same_client_handlers_alternate() {
        let bus = Bus::new();
        let log: Deliveries = Arc::default();

        bus.subscribe("c1", "test", recording("hA", &log)).unwrap();
        bus.subscribe("c1", "test", recording("hB", &log)).unwrap();
        publish_all(&bus, "test", &SPICES[..3]).await;

        wait_until("three acks", || log.lock().len() == 3).await;
        assert_eq!(
            *log.lock(),
            vec![
                Delivery { handler: "hA", payload: "chipotle".into() },
                Delivery { handler: "hB", payload: "jalapeno".into() },
                Delivery { handler: "hA", payload: "habanero".into() },
            ]
        );
    }

    // =============================================================================
    // EVICTION
    // =============================================================================

    #[tokio::test]
    async fn test_failing_handler_evicted_and_message_retried() {
        let bus = Bus::new();
        let log: Deliveries = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe("c1", "test", recording("h1", &log)).unwrap();
        bus.subscribe("c1", "test", failing(&calls)).unwrap();
        bus.subscribe("c1", "test", recording("h3", &log)).unwrap();
        publish_all(&bus, "test", &SPICES).await;

        wait_until("four acks", || log.lock().len() == 4).await;
        assert_eq!(handlers(&log), vec!["h1", "h3", "h1", "h3"]);
        assert_eq!(payloads(&log), SPICES.to_vec());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count("c1", "test"), 2);
        assert!(!bus.is_paused("c1", "test"));
    }

    #[tokio::test]
    async fn test_evicted_handler_never_called_after_resume() {
        let bus = Bus::new();
        let log: Deliveries = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe("c1", "t", failing(&calls)).unwrap();
        publish_all(&bus, "t", &["m1"]).await;
        wait_until("pause", || bus.is_paused("c1", "t")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        bus.subscribe("c1", "t", recording("good", &log)).unwrap();
        publish_all(&bus, "t", &["m2", "m3"]).await;

        wait_until("all delivered", || log.lock().len() == 3).await;
        assert_eq!(payloads(&log), vec!["m1", "m2", "m3"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // =============================================================================
    // RECOVERY
    // =============================================================================

    #[tokio::test]
    async fn test_all_handlers_fail_then_new_handler_flushes() {
        let bus = Bus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe("c1", "test", failing(&calls)).unwrap();
        bus.subscribe("c1", "test", failing(&calls)).unwrap();
        publish_all(&bus, "test", &SPICES).await;

        wait_until("pause", || bus.is_paused("c1", "test")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(bus.handler_count("c1", "test"), 0);

        let log: Deliveries = Arc::default();
        bus.subscribe("c1", "test", recording("good", &log)).unwrap();

        wait_until("four acks", || log.lock().len() == 4).await;
        assert_eq!(payloads(&log), SPICES.to_vec());
        wait_until("running again", || !bus.is_paused("c1", "test")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recovery_with_another_failing_handler_stays_paused() {
        let bus = Bus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe("c1", "t", failing(&calls)).unwrap();
        publish_all(&bus, "t", &["m1", "m2"]).await;
        wait_until("pause", || bus.is_paused("c1", "t")).await;

        // Replay with a handler that fails again: still paused, nothing lost.
        bus.subscribe("c1", "t", failing(&calls)).unwrap();
        wait_until("second failure", || calls.load(Ordering::SeqCst) == 2).await;
        sleep(Duration::from_millis(20)).await;
        assert!(bus.is_paused("c1", "t"));

        let log: Deliveries = Arc::default();
        bus.subscribe("c1", "t", recording("good", &log)).unwrap();
        wait_until("flush", || log.lock().len() == 2).await;
        assert_eq!(payloads(&log), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_shutdown_reports_stuck_client() {
        let bus = Bus::new();
        let log: Deliveries = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe("ok", "t", recording("h", &log)).unwrap();
        bus.subscribe("stuck", "t", failing(&calls)).unwrap();
        publish_all(&bus, "t", &SPICES).await;

        let report = bus.shutdown().await;
        assert_eq!(payloads(&log), SPICES.to_vec());
        assert_eq!(report.delivered, 4);
        assert_eq!(report.retained + report.unread, 4);
    }
}
