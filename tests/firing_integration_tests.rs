//! End-to-end firing scenarios against the scripted transport, driven on
//! the paused tokio clock so multi-second bursts finish instantly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use microjewel::{Laser, LaserError, MockTransport, PulseMode};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn count_frames(writes: &Arc<Mutex<Vec<String>>>, command: &str) -> usize {
    let needle = format!(":{command}\r");
    writes
        .lock()
        .unwrap()
        .iter()
        .filter(|frame| frame.ends_with(&needle))
        .count()
}

fn firing_mock() -> MockTransport {
    MockTransport::new()
        .reply_always("PM 2", b"OK\r")
        .reply_always("RR 5", b"OK\r")
        .reply_always("BC 20", b"OK\r")
        .reply_always("EN 1", b"OK\r")
        .reply_always("EN 0", b"OK\r")
        .reply_always("EN?", b"1\r")
        .reply_always("FL 1", b"OK\r")
        .reply_always("FL 0", b"OK\r")
        .reply_always("SS?", b"3075\r")
}

/// Configure a 20-shot burst at 5 Hz: a four second wait that outlasts the
/// head's watchdog.
async fn burst_laser(mock: MockTransport) -> (Laser, Arc<Mutex<Vec<String>>>) {
    let writes = mock.write_log();
    let mut laser = Laser::new();
    laser
        .connect_transport(Box::new(mock), Duration::from_secs(1))
        .await
        .unwrap();
    laser.set_pulse_mode(PulseMode::Burst).await.unwrap();
    laser.set_rep_rate(5).await.unwrap();
    laser.set_burst_count(20).await.unwrap();
    laser.arm().await.unwrap();
    (laser, writes)
}

#[tokio::test(start_paused = true)]
async fn long_burst_is_kept_alive_by_watchdog_kicks() -> anyhow::Result<()> {
    init_logs();
    let (laser, writes) = burst_laser(firing_mock()).await;

    laser.fire().await?;

    // One status query verifies the shot; the rest are watchdog kicks,
    // roughly one per second across the four second burst.
    let queries = count_frames(&writes, "SS?");
    assert!(
        (4..=6).contains(&queries),
        "expected verification plus ~4 kicks, saw {queries} status queries"
    );
    assert_eq!(count_frames(&writes, "FL 1"), 1);
    assert_eq!(count_frames(&writes, "FL 0"), 1);

    // The kicker goes quiet once the burst completes.
    let after_fire = count_frames(&writes, "SS?");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(count_frames(&writes, "SS?"), after_fire);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn emergency_stop_interrupts_a_burst_in_progress() {
    init_logs();
    let (laser, writes) = burst_laser(firing_mock()).await;
    let stop = laser.stop_handle();
    let laser = Arc::new(laser);

    let firing = {
        let laser = Arc::clone(&laser);
        tokio::spawn(async move { laser.fire().await })
    };

    // One second into the four second burst, pull the plug.
    tokio::time::sleep(Duration::from_secs(1)).await;
    stop.stop().await.unwrap();

    let result = firing.await.unwrap();
    assert!(matches!(result, Err(LaserError::Aborted)));

    // Exactly one stop command: the emergency stop's own. The interrupted
    // fire sequence must not send a second one.
    assert_eq!(count_frames(&writes, "FL 0"), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnecting_does_not_double_the_watchdog_kicks() {
    init_logs();
    let (mut laser, first_writes) = burst_laser(firing_mock()).await;
    laser.disconnect().await;

    let second = firing_mock();
    let second_writes = second.write_log();
    laser
        .connect_transport(Box::new(second), Duration::from_secs(1))
        .await
        .unwrap();
    laser.arm().await.unwrap();

    let before = count_frames(&first_writes, "SS?");
    laser.fire().await.unwrap();

    // A second kicker would roughly double the kick rate.
    let queries = count_frames(&second_writes, "SS?");
    assert!(
        (4..=6).contains(&queries),
        "expected a single kicker's worth of status queries, saw {queries}"
    );
    // The old transport sees no further traffic.
    assert_eq!(count_frames(&first_writes, "SS?"), before);
}

#[tokio::test(start_paused = true)]
async fn short_bursts_do_not_wake_the_watchdog() {
    init_logs();
    // 5 shots at 5 Hz is a one second burst, under the watchdog threshold.
    let mock = firing_mock().reply_always("BC 5", b"OK\r");
    let writes = mock.write_log();
    let mut laser = Laser::new();
    laser
        .connect_transport(Box::new(mock), Duration::from_secs(1))
        .await
        .unwrap();
    laser.set_pulse_mode(PulseMode::Burst).await.unwrap();
    laser.set_rep_rate(5).await.unwrap();
    laser.set_burst_count(5).await.unwrap();
    laser.arm().await.unwrap();

    laser.fire().await.unwrap();

    // Only the verification query; no kicks.
    assert_eq!(count_frames(&writes, "SS?"), 1);
}
