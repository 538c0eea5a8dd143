//! End-to-end: TOML run config through context and stepper.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use stormsync::config::RunConfig;
use stormsync::core::{DomainId, IntegrationContext};
use stormsync::{StepError, StormStepper};

const RUN: &str = r#"
max_domains = 9
first_domains = [2, 5, 8]
affinity = ""
stack_size_bytes = 1048576
thread_name_prefix = "nest"
"#;

fn d(raw: u32) -> DomainId {
    DomainId::new(raw).unwrap()
}

fn context(toml: &str) -> IntegrationContext {
    let config = RunConfig::from_toml_str(toml).unwrap();
    IntegrationContext::initialize(config.to_settings().unwrap()).unwrap()
}

#[test]
fn test_multi_step_run() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let integrator = Arc::new(move |domain: DomainId, step: usize| {
        let name = std::thread::current().name().map(str::to_owned);
        tx.send((domain, step, name)).unwrap();
    });

    let mut stepper = StormStepper::new(context(RUN), integrator);
    let stats = stepper.run(4).unwrap();

    for s in &stats {
        assert_eq!(s.privilege_order, vec![d(2), d(5), d(8)]);
        assert!(s.report.is_clean());
        assert!(matches!(s.serial_domain, Some(dom) if [2, 5, 8].contains(&dom.get())));
    }

    let calls: Vec<_> = rx.try_iter().collect();
    assert_eq!(calls.len(), 12);
    assert!(calls.contains(&(d(5), 3, Some("nest-05".to_owned()))));
}

#[test]
fn test_single_storm_run_completes() {
    let mut stepper = StormStepper::new(
        context("max_domains = 2\nfirst_domains = [2]\nstack_size_bytes = 1048576"),
        Arc::new(|_: DomainId, _: usize| {}),
    );
    let stats = stepper.step().unwrap();
    assert_eq!(stats.privilege_order, vec![d(2)]);
    assert_eq!(stats.serial_domain, Some(d(2)));
}

#[test]
fn test_panic_is_reported_not_hung() {
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);

    std::thread::spawn(move || {
        let mut stepper = StormStepper::new(
            context(RUN),
            Arc::new(|domain: DomainId, step: usize| {
                assert!(!(domain.get() == 8 && step == 1), "nest 8 diverged");
            }),
        );
        let result = stepper.run(3);
        done_tx
            .send(matches!(
                result,
                Err(StepError::WorkerPanicked { step: 1, ref domains }) if domains == &[d(8)]
            ))
            .unwrap();
    });

    match done_rx.recv_timeout(Duration::from_secs(10)) {
        Ok(reported) => assert!(reported),
        Err(RecvTimeoutError::Timeout) => panic!("step deadlocked after a worker panic"),
        Err(RecvTimeoutError::Disconnected) => panic!("stepper thread died"),
    }
}
