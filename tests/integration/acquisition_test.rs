use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use envmon::core::monitor::{
    AcquisitionLoop, Channel, LoopStatus, SensorStatus, ShutdownOutcome, SENTINEL_VALUE,
};
use envmon::EnvmonError;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;

use super::support::{wait_until, ScriptedChannel};

const FAST_TICK: Duration = Duration::from_millis(10);

#[test]
fn test_devices_released_exactly_once() {
    let temperature = ScriptedChannel::new(Channel::Temperature, 21.0);
    let humidity = ScriptedChannel::new(Channel::Humidity, 55.0);
    let t_calls = temperature.calls();
    let h_calls = humidity.calls();

    let acquisition = AcquisitionLoop::builder()
        .channel(temperature.boxed())
        .channel(humidity.boxed())
        .tick_interval(FAST_TICK)
        .build();

    acquisition.start().unwrap();
    assert_eq!(acquisition.status(), LoopStatus::Running);
    acquisition.start_collection();
    assert!(wait_until(Duration::from_secs(2), || acquisition.ticks() >= 3));

    assert_eq!(acquisition.request_stop(), ShutdownOutcome::Clean);
    assert_eq!(acquisition.status(), LoopStatus::Stopped);
    assert_eq!(acquisition.request_stop(), ShutdownOutcome::AlreadyStopped);
    drop(acquisition);

    for calls in [&t_calls, &h_calls] {
        assert_eq!(calls.opens(), 1);
        assert_eq!(calls.closes(), 1);
    }
}

#[test]
fn test_init_failure_never_samples() {
    let temperature = ScriptedChannel::new(Channel::Temperature, 21.0);
    let humidity = ScriptedChannel::new(Channel::Humidity, 55.0).failing_open();
    let t_calls = temperature.calls();
    let h_calls = humidity.calls();

    let acquisition = AcquisitionLoop::builder()
        .channels(vec![temperature.boxed(), humidity.boxed()])
        .tick_interval(FAST_TICK)
        .build();
    let mut readings = acquisition.subscribe();

    let err = acquisition.start().unwrap_err();
    assert!(matches!(
        err,
        EnvmonError::DeviceInit {
            channel: Channel::Humidity,
            ..
        }
    ));
    assert!(matches!(acquisition.status(), LoopStatus::Failed(_)));

    acquisition.start_collection();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(acquisition.ticks(), 0);
    assert!(readings.try_recv().is_err());
    assert!(acquisition.latest().is_none());

    // The channel opened before the failure is released again
    assert_eq!(t_calls.closes(), 1);
    assert_eq!(t_calls.reads(), 0);
    assert_eq!(h_calls.reads(), 0);

    acquisition.request_stop();
    assert!(matches!(acquisition.status(), LoopStatus::Failed(_)));
}

#[test]
fn test_read_failure_substitutes_sentinel_for_one_tick() {
    let temperature = ScriptedChannel::new(Channel::Temperature, 21.0).failing_reads(&[1]);
    let humidity = ScriptedChannel::new(Channel::Humidity, 55.0);

    let acquisition = AcquisitionLoop::builder()
        .channels(vec![temperature.boxed(), humidity.boxed()])
        .tick_interval(FAST_TICK)
        .build();
    let mut readings = acquisition.subscribe();
    acquisition.start().unwrap();
    acquisition.start_collection();

    let first = readings.blocking_recv().unwrap();
    let second = readings.blocking_recv().unwrap();
    let third = readings.blocking_recv().unwrap();
    acquisition.request_stop();

    assert_eq!(first.temperature, 21.0);
    assert_eq!(first.status.temperature, SensorStatus::Normal);

    assert_eq!(second.temperature, SENTINEL_VALUE);
    assert_eq!(second.status.temperature, SensorStatus::Error);
    assert_eq!(second.faulted_channels(), vec![Channel::Temperature]);
    // The other channel is unaffected
    assert_eq!(second.humidity, 55.0);
    assert_eq!(second.status.humidity, SensorStatus::Normal);

    assert_eq!(third.temperature, 21.0);
    assert_eq!(third.status.temperature, SensorStatus::Normal);
    assert!(third.timestamp >= second.timestamp);
    assert!(second.timestamp >= first.timestamp);
}

#[test]
fn test_no_readings_while_collection_disabled() {
    let temperature = ScriptedChannel::new(Channel::Temperature, 21.0);
    let calls = temperature.calls();

    let acquisition = AcquisitionLoop::builder()
        .channel(temperature.boxed())
        .tick_interval(FAST_TICK)
        .build();
    acquisition.start().unwrap();

    thread::sleep(Duration::from_millis(60));
    assert_eq!(acquisition.ticks(), 0);
    assert_eq!(calls.reads(), 0);

    acquisition.start_collection();
    assert!(wait_until(Duration::from_secs(2), || acquisition.ticks() >= 2));

    acquisition.stop_collection();
    assert!(!acquisition.is_collecting());
    // At most one tick can still be in flight
    thread::sleep(Duration::from_millis(30));
    let settled = acquisition.ticks();
    thread::sleep(Duration::from_millis(60));
    assert_eq!(acquisition.ticks(), settled);

    assert_eq!(acquisition.request_stop(), ShutdownOutcome::Clean);
    assert_eq!(calls.closes(), 1);
}

#[test]
fn test_stop_before_start() {
    let temperature = ScriptedChannel::new(Channel::Temperature, 21.0);
    let calls = temperature.calls();
    let acquisition = AcquisitionLoop::new(vec![temperature.boxed()]);

    assert_eq!(acquisition.request_stop(), ShutdownOutcome::NotStarted);
    assert!(matches!(acquisition.start(), Err(EnvmonError::LoopStopped)));
    assert_eq!(calls.opens(), 0);
    assert_eq!(calls.closes(), 0);
}

#[test]
fn test_start_twice_is_rejected() {
    let acquisition = AcquisitionLoop::builder()
        .channel(ScriptedChannel::new(Channel::Temperature, 21.0).boxed())
        .tick_interval(FAST_TICK)
        .build();

    acquisition.start().unwrap();
    assert!(matches!(acquisition.start(), Err(EnvmonError::AlreadyStarted)));
    assert_eq!(acquisition.request_stop(), ShutdownOutcome::Clean);
}

#[test]
fn test_shutdown_interrupts_long_tick() {
    let acquisition = AcquisitionLoop::builder()
        .channel(ScriptedChannel::new(Channel::Temperature, 21.0).boxed())
        .tick_interval(Duration::from_secs(30))
        .build();
    let mut readings = acquisition.subscribe();
    acquisition.start().unwrap();
    acquisition.start_collection();
    readings.blocking_recv().unwrap();

    let started = Instant::now();
    assert_eq!(acquisition.request_stop(), ShutdownOutcome::Clean);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_stuck_read_times_out_shutdown() {
    let stuck = ScriptedChannel::new(Channel::Temperature, 21.0).read_delay(Duration::from_millis(800));
    let calls = stuck.calls();

    let acquisition = AcquisitionLoop::builder()
        .channel(stuck.boxed())
        .tick_interval(FAST_TICK)
        .shutdown_timeout(Duration::from_millis(100))
        .build();
    acquisition.start().unwrap();
    acquisition.start_collection();
    assert!(wait_until(Duration::from_secs(2), || calls.reads() >= 1));

    let started = Instant::now();
    assert_eq!(acquisition.request_stop(), ShutdownOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_millis(700));

    // The detached thread still releases the device once its read returns
    assert!(wait_until(Duration::from_secs(3), || calls.closes() == 1));
}

#[test]
fn test_channels_sampled_in_fixed_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let acquisition = AcquisitionLoop::builder()
        .channel(ScriptedChannel::new(Channel::Smoke, 5.0).order_log(Arc::clone(&log)).boxed())
        .channel(ScriptedChannel::new(Channel::Humidity, 55.0).order_log(Arc::clone(&log)).boxed())
        .channel(ScriptedChannel::new(Channel::Temperature, 21.0).order_log(Arc::clone(&log)).boxed())
        .tick_interval(FAST_TICK)
        .build();
    let mut readings = acquisition.subscribe();
    acquisition.start().unwrap();
    acquisition.start_collection();

    let reading = readings.blocking_recv().unwrap();
    acquisition.stop_collection();
    acquisition.request_stop();

    assert_eq!(reading.smoke, Some(5.0));
    let order = log.lock();
    assert_eq!(
        &order[..3],
        &[Channel::Temperature, Channel::Humidity, Channel::Smoke]
    );
}

#[test]
fn test_latest_tracks_last_reading() {
    let acquisition = AcquisitionLoop::builder()
        .channel(ScriptedChannel::new(Channel::Temperature, 23.5).boxed())
        .channel(ScriptedChannel::new(Channel::Humidity, 60.0).boxed())
        .tick_interval(FAST_TICK)
        .build();
    assert!(acquisition.latest().is_none());

    acquisition.start().unwrap();
    acquisition.start_collection();
    assert!(wait_until(Duration::from_secs(2), || acquisition.latest().is_some()));
    acquisition.request_stop();

    let latest = acquisition.latest().unwrap();
    assert_eq!(latest.temperature, 23.5);
    assert_eq!(latest.smoke, None);
    assert_eq!(latest.status.smoke, SensorStatus::Offline);
}

#[test]
fn test_panicking_read_fails_loop_and_closes_subscribers() {
    let acquisition = AcquisitionLoop::builder()
        .channel(ScriptedChannel::new(Channel::Temperature, 21.0).panicking_read(1).boxed())
        .tick_interval(FAST_TICK)
        .build();
    let mut readings = acquisition.subscribe();
    acquisition.start().unwrap();
    acquisition.start_collection();

    assert_eq!(readings.blocking_recv().unwrap().temperature, 21.0);
    // The second read kills the thread; subscribers must not wait forever
    assert!(matches!(readings.blocking_recv(), Err(RecvError::Closed)));
    assert!(wait_until(Duration::from_secs(2), || matches!(
        acquisition.status(),
        LoopStatus::Failed(_)
    )));

    // Late subscribers see the closed channel too
    let mut late = acquisition.subscribe();
    assert!(matches!(late.blocking_recv(), Err(RecvError::Closed)));

    acquisition.request_stop();
    assert!(matches!(acquisition.status(), LoopStatus::Failed(_)));
    assert_eq!(acquisition.latest().unwrap().temperature, 21.0);
}

#[test]
fn test_concurrent_stop_releases_devices_once() {
    let temperature = ScriptedChannel::new(Channel::Temperature, 21.0);
    let calls = temperature.calls();
    let acquisition = AcquisitionLoop::builder()
        .channel(temperature.boxed())
        .tick_interval(FAST_TICK)
        .build();
    acquisition.start().unwrap();
    acquisition.start_collection();
    assert!(wait_until(Duration::from_secs(2), || acquisition.ticks() >= 1));

    let outcomes: Vec<ShutdownOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| acquisition.request_stop()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let clean = outcomes.iter().filter(|o| **o == ShutdownOutcome::Clean).count();
    let already = outcomes
        .iter()
        .filter(|o| **o == ShutdownOutcome::AlreadyStopped)
        .count();
    assert_eq!(clean, 1);
    assert_eq!(already, outcomes.len() - 1);
    assert_eq!(calls.opens(), 1);
    assert_eq!(calls.closes(), 1);
    assert_eq!(acquisition.status(), LoopStatus::Stopped);
}

#[test]
fn test_collection_toggled_from_many_threads() {
    let acquisition = AcquisitionLoop::builder()
        .channel(ScriptedChannel::new(Channel::Temperature, 21.0).boxed())
        .tick_interval(Duration::from_millis(1))
        .build();
    acquisition.start().unwrap();

    thread::scope(|scope| {
        for worker in 0..4 {
            let acquisition = &acquisition;
            scope.spawn(move || {
                for i in 0..200 {
                    if (i + worker) % 2 == 0 {
                        acquisition.start_collection();
                    } else {
                        acquisition.stop_collection();
                    }
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..500 {
                let _ = acquisition.is_collecting();
            }
        });
    });

    // The last explicit call wins once the togglers are done
    acquisition.stop_collection();
    assert!(!acquisition.is_collecting());
    acquisition.start_collection();
    assert!(acquisition.is_collecting());
    let before = acquisition.ticks();
    assert!(wait_until(Duration::from_secs(2), || acquisition.ticks() > before));

    assert_eq!(acquisition.status(), LoopStatus::Running);
    assert_eq!(acquisition.request_stop(), ShutdownOutcome::Clean);
}
