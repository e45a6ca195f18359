use nvmecheck_harness::groups::write_cmd;
use nvmecheck_harness::{CaseStatus, GroupRunner, HarnessConfig, TestContext};
use nvmecheck_queues::sim::SimController;
use nvmecheck_queues::NamespaceDesc;

fn ns(nsid: u32, extended_lba: bool) -> NamespaceDesc {
    NamespaceDesc {
        nsid,
        total_blocks: 64,
        lba_data_size: 512,
        metadata_size: if extended_lba { 8 } else { 0 },
        extended_lba,
    }
}

fn config_with_dumps(dir: &std::path::Path) -> HarnessConfig {
    HarnessConfig {
        io_queue_capacity: 4,
        dump_dir: dir.to_path_buf(),
        ..HarnessConfig::default()
    }
}

#[test]
fn group_passes_against_a_compliant_device() {
    let mut sim = SimController::new();
    sim.add_namespace(ns(1, false));
    sim.add_namespace(ns(2, true)); // extended LBA; the case must skip it
    sim.add_namespace(ns(3, false));

    let dumps = tempfile::tempdir().unwrap();
    let mut ctx = TestContext::new(Box::new(sim), config_with_dumps(dumps.path()));
    let report = write_cmd::runner().run(&mut ctx);

    assert!(report.passed(), "failures: {:?}", report.outcomes);
    assert_eq!(report.total, 2);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == CaseStatus::Passed));

    // All writes were reaped; the pair is drained and still registered.
    let pair = ctx.registry.get(write_cmd::IO_QUEUE_PAIR_OBJ).unwrap();
    let pair = pair.borrow();
    assert_eq!(pair.outstanding(), 0);
    assert_eq!(pair.capacity(), 4);
}

#[test]
fn scenario_without_setup_fails_with_unknown_group() {
    let mut sim = SimController::new();
    sim.add_namespace(ns(1, false));

    let dumps = tempfile::tempdir().unwrap();
    let mut ctx = TestContext::new(Box::new(sim), config_with_dumps(dumps.path()));

    // Deliberately run the scenario case without its setup case.
    let mut runner = GroupRunner::new(write_cmd::GROUP);
    runner.add(Box::new(write_cmd::IgnoreMetaPtrBare::new()));
    let report = runner.run(&mut ctx);

    assert_eq!(report.failures, 1);
    assert_eq!(report.outcomes[0].status, CaseStatus::Failed);
    let message = report.outcomes[0].error.as_deref().unwrap();
    assert!(
        message.contains(write_cmd::IO_QUEUE_PAIR_OBJ),
        "got: {message}"
    );
}

#[test]
fn group_reports_the_device_failure_status() {
    let mut sim = SimController::new();
    sim.add_namespace(ns(1, false));
    sim.set_forced_status(Some(nvmecheck_queues::Status::INVALID_FIELD));

    let dumps = tempfile::tempdir().unwrap();
    let mut ctx = TestContext::new(Box::new(sim), config_with_dumps(dumps.path()));
    let report = write_cmd::runner().run(&mut ctx);

    assert_eq!(report.failures, 1);
    assert_eq!(report.outcomes[0].status, CaseStatus::Passed); // setup issues no IO
    assert_eq!(report.outcomes[1].status, CaseStatus::Failed);
    let message = report.outcomes[1].error.as_deref().unwrap();
    assert!(message.contains("namspc1"), "got: {message}");
}
