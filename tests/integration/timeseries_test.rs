use std::thread;

use chrono::Local;
use envmon::core::monitor::{
    Channel, ChannelSample, Reading, SensorStatus, SharedWindow, TimeSeriesWindow, WindowSet,
};

fn sample(value: f64) -> ChannelSample {
    ChannelSample::new(value, Local::now())
}

#[test]
fn test_window_never_exceeds_capacity() {
    let mut window = TimeSeriesWindow::with_capacity(Channel::Temperature, 5);
    for i in 0..100 {
        window.append(sample(i as f64));
        assert!(window.len() <= 5);
    }
    assert_eq!(window.values(), vec![95.0, 96.0, 97.0, 98.0, 99.0]);
}

#[test]
fn test_bounds_follow_eviction() {
    let mut window = TimeSeriesWindow::with_capacity(Channel::Temperature, 3);
    for value in [10.0, 20.0, 30.0, 40.0] {
        window.append(sample(value));
    }

    assert_eq!(window.values(), vec![20.0, 30.0, 40.0]);
    let bounds = window.bounds();
    assert!((bounds.min - 18.0).abs() < 1e-9);
    assert!((bounds.max - 42.0).abs() < 1e-9);
}

#[test]
fn test_humidity_bounds_stay_in_domain() {
    let mut window = TimeSeriesWindow::with_capacity(Channel::Humidity, 10);
    window.append(sample(0.5));
    window.append(sample(99.5));

    let bounds = window.bounds();
    assert_eq!(bounds.min, 0.0);
    assert_eq!(bounds.max, 100.0);
}

#[test]
fn test_flat_series_gets_minimum_range() {
    let mut window = TimeSeriesWindow::new(Channel::Temperature);
    for _ in 0..10 {
        window.append(sample(25.0));
    }
    let bounds = window.bounds();
    assert!((bounds.min - 24.9).abs() < 1e-9);
    assert!((bounds.max - 25.1).abs() < 1e-9);
}

#[test]
fn test_window_set_skips_faulted_channels() {
    let mut windows = WindowSet::with_capacity(10);

    windows.record(&Reading::new(21.0, 50.0, Some(3.0)));
    let mut faulted = Reading::new(0.0, 52.0, None);
    faulted.status.set(Channel::Temperature, SensorStatus::Error);
    windows.record(&faulted);

    assert_eq!(windows.get(Channel::Temperature).values(), vec![21.0]);
    assert_eq!(windows.get(Channel::Humidity).values(), vec![50.0, 52.0]);
    assert_eq!(windows.get(Channel::Smoke).values(), vec![3.0]);
}

#[test]
fn test_shared_window_concurrent_appends() {
    let shared = SharedWindow::new(TimeSeriesWindow::with_capacity(Channel::Smoke, 20));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    shared.append(sample((w * 100 + i) as f64));
                }
            })
        })
        .collect();

    for _ in 0..50 {
        let len = shared.with_samples(|samples| samples.count());
        assert!(len <= 20);
    }
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(shared.len(), 20);
    let bounds = shared.bounds();
    assert!(bounds.min >= 0.0);
    assert!(bounds.max > bounds.min);
}
