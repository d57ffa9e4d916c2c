use identd::config::types::IdentdConfig;
use identd::connections::ConnectionId;
use identd::context::SharedConfig;
use identd::gate::ConnectionGate;
use identd::server::{ServerError, ServiceControl};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Records start/stop calls instead of binding a socket.
#[derive(Default)]
struct FakeService {
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
}

impl ServiceControl for FakeService {
    fn start(&self) -> Result<(), ServerError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ServerError::PermanentlyFailed);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn gate_with(config: IdentdConfig) -> (ConnectionGate, Arc<FakeService>) {
    let service = Arc::new(FakeService::default());
    let gate = ConnectionGate::new(service.clone(), Arc::new(SharedConfig::new(config)));
    (gate, service)
}

const A: ConnectionId = ConnectionId(1);
const B: ConnectionId = ConnectionId(2);

#[test]
fn first_attempt_starts_last_attempt_stops() {
    let (gate, service) = gate_with(IdentdConfig::default());

    assert!(gate.attempt_started(A));
    assert!(service.is_running());
    assert!(gate.attempt_started(B));
    assert_eq!(service.starts.load(Ordering::SeqCst), 1);

    assert!(gate.attempt_ended(A));
    assert!(service.is_running());
    assert_eq!(service.stops.load(Ordering::SeqCst), 0);

    assert!(gate.attempt_ended(B));
    assert!(!service.is_running());
    assert_eq!(service.stops.load(Ordering::SeqCst), 1);
    assert_eq!(gate.outstanding(), 0);
}

#[test]
fn duplicate_start_is_ignored() {
    let (gate, service) = gate_with(IdentdConfig::default());
    assert!(gate.attempt_started(A));
    assert!(!gate.attempt_started(A));
    assert_eq!(gate.outstanding(), 1);

    // One end closes the attempt even though it was reported twice.
    assert!(gate.attempt_ended(A));
    assert!(!service.is_running());
}

#[test]
fn unknown_end_does_not_stop() {
    let (gate, service) = gate_with(IdentdConfig::default());
    assert!(gate.attempt_started(A));
    assert!(!gate.attempt_ended(B));
    assert!(service.is_running());
    assert_eq!(gate.outstanding(), 1);
    assert_eq!(service.stops.load(Ordering::SeqCst), 0);
}

#[test]
fn always_on_leaves_service_alone() {
    let config = IdentdConfig {
        always_on: true,
        ..IdentdConfig::default()
    };
    let (gate, service) = gate_with(config);
    service.start().unwrap();

    gate.attempt_started(A);
    gate.attempt_ended(A);
    assert!(service.is_running());
    assert_eq!(service.starts.load(Ordering::SeqCst), 1);
    assert_eq!(service.stops.load(Ordering::SeqCst), 0);
}

#[test]
fn start_failure_still_tracks_attempt() {
    let (gate, service) = gate_with(IdentdConfig::default());
    service.fail_start.store(true, Ordering::SeqCst);

    assert!(gate.attempt_started(A));
    assert!(!service.is_running());
    assert_eq!(gate.outstanding(), 1);

    assert!(gate.attempt_ended(A));
    assert_eq!(gate.outstanding(), 0);
}

#[test]
fn restarts_on_next_cycle() {
    let (gate, service) = gate_with(IdentdConfig::default());
    for _ in 0..3 {
        gate.attempt_started(A);
        gate.attempt_ended(A);
    }
    assert_eq!(service.starts.load(Ordering::SeqCst), 3);
    assert_eq!(service.stops.load(Ordering::SeqCst), 3);
}

#[test]
fn clear_forgets_attempts_without_stopping() {
    let (gate, service) = gate_with(IdentdConfig::default());
    gate.attempt_started(A);
    gate.attempt_started(B);
    gate.clear();
    assert_eq!(gate.outstanding(), 0);
    assert!(service.is_running());
}

#[test]
fn concurrent_attempts_balance_out() {
    let (gate, service) = gate_with(IdentdConfig::default());
    let gate = Arc::new(gate);

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let gate = gate.clone();
            std::thread::spawn(move || {
                for i in 0..100u64 {
                    let id = ConnectionId(t * 1000 + i);
                    gate.attempt_started(id);
                    gate.attempt_ended(id);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(gate.outstanding(), 0);
    assert!(!service.is_running());
    assert_eq!(
        service.starts.load(Ordering::SeqCst),
        service.stops.load(Ordering::SeqCst)
    );
}
