use std::time::{Duration, Instant};

use nvmecheck_harness::io::{self, DumpSite};
use nvmecheck_harness::{ResourceRegistry, TestError};
use nvmecheck_queues::sim::{CompletionPolicy, SimController};
use nvmecheck_queues::{
    prp, Command, DataBuffer, HostMemory, NamespaceDesc, QueuePair, Status,
};

fn bare_ns(nsid: u32) -> NamespaceDesc {
    NamespaceDesc {
        nsid,
        total_blocks: 64,
        lba_data_size: 512,
        metadata_size: 0,
        extended_lba: false,
    }
}

fn poisoned_one_block_write(mem: &mut HostMemory, nsid: u32) -> Command {
    let buffer = DataBuffer::zeroed(mem, 512).unwrap();
    let mut cmd = Command::write();
    cmd.set_prp_buffer(prp::PRP1_PAGE | prp::PRP2_PAGE | prp::PRP2_LIST, buffer);
    cmd.set_nsid(nsid);
    cmd.set_start_lba(0);
    cmd.set_block_count(1).unwrap();
    cmd.set_dword(4, 0xffff_ffff).unwrap();
    cmd.set_dword(5, 0xffff_ffff).unwrap();
    cmd
}

#[test]
fn inquiry_is_idempotent_between_submissions() {
    let mut sim = SimController::new();
    sim.add_namespace(bare_ns(1));
    sim.set_completion_policy(CompletionPolicy::AfterPolls(50));
    let mut mem = HostMemory::new(2 * 1024 * 1024);
    let mut pair = QueuePair::create(&mut sim, &mut mem, 1, 4).unwrap();

    assert_eq!(io::reap_inquiry(&pair, &mem).unwrap(), 0);
    assert_eq!(io::reap_inquiry(&pair, &mem).unwrap(), 0);

    let cmd = poisoned_one_block_write(&mut mem, 1);
    pair.submit(&mut sim, &mut mem, cmd).unwrap();

    // The completion is still deferred; inquiry stays at zero and repeated
    // calls agree with each other.
    assert_eq!(io::reap_inquiry(&pair, &mem).unwrap(), 0);
    assert_eq!(io::reap_inquiry(&pair, &mem).unwrap(), 0);
}

#[test]
fn timeout_fires_late_enough_and_leaves_the_queue_alone() {
    let mut sim = SimController::new();
    sim.add_namespace(bare_ns(1));
    sim.set_completion_policy(CompletionPolicy::Withhold);
    let mut mem = HostMemory::new(2 * 1024 * 1024);
    let mut pair = QueuePair::create(&mut sim, &mut mem, 1, 4).unwrap();

    let timeout = Duration::from_millis(25);
    let started = Instant::now();
    let cmd = poisoned_one_block_write(&mut mem, 1);
    let err = io::send_and_reap(&mut sim, &mut mem, &mut pair, cmd, timeout, "wd", true)
        .expect_err("withheld completion must time out");
    let elapsed = started.elapsed();

    assert!(matches!(err, TestError::DeviceTimeout { qid: 1, .. }));
    assert!(elapsed >= timeout, "timed out after only {elapsed:?}");
    assert!(
        elapsed < timeout + Duration::from_millis(500),
        "timeout took far too long: {elapsed:?}"
    );
    // No phantom completion was fabricated or consumed.
    assert_eq!(io::reap_inquiry(&pair, &mem).unwrap(), 0);
    assert_eq!(pair.outstanding(), 1);
}

#[test]
fn deferred_completion_is_reaped_within_the_timeout() {
    let mut sim = SimController::new();
    sim.add_namespace(bare_ns(1));
    sim.set_completion_policy(CompletionPolicy::AfterPolls(5));
    let mut mem = HostMemory::new(2 * 1024 * 1024);
    let mut pair = QueuePair::create(&mut sim, &mut mem, 1, 4).unwrap();

    let cmd = poisoned_one_block_write(&mut mem, 1);
    let entry = io::send_and_reap(
        &mut sim,
        &mut mem,
        &mut pair,
        cmd,
        Duration::from_millis(2000),
        "deferred",
        true,
    )
    .unwrap();
    assert!(entry.status.is_success());
    assert_eq!(io::reap_inquiry(&pair, &mem).unwrap(), 0);
}

#[test]
fn device_failure_status_surfaces_with_the_exact_code() {
    let mut sim = SimController::new();
    sim.add_namespace(bare_ns(1));
    sim.set_forced_status(Some(Status::INVALID_FIELD));
    let mut mem = HostMemory::new(2 * 1024 * 1024);
    let mut pair = QueuePair::create(&mut sim, &mut mem, 1, 4).unwrap();

    let cmd = poisoned_one_block_write(&mut mem, 1);
    let err = io::send_and_reap(
        &mut sim,
        &mut mem,
        &mut pair,
        cmd,
        Duration::from_millis(2000),
        "namspc1",
        true,
    )
    .expect_err("forced failure status must not be masked");

    match err {
        TestError::UnexpectedStatus {
            label,
            status,
            expected_success,
        } => {
            assert_eq!(label, "namspc1");
            assert_eq!(status, Status::INVALID_FIELD.raw());
            assert!(expected_success);
        }
        other => panic!("wrong error kind: {other:?}"),
    }
}

#[test]
fn expected_failure_that_succeeds_is_also_an_error() {
    let mut sim = SimController::new();
    sim.add_namespace(bare_ns(1));
    let mut mem = HostMemory::new(2 * 1024 * 1024);
    let mut pair = QueuePair::create(&mut sim, &mut mem, 1, 4).unwrap();

    let cmd = poisoned_one_block_write(&mut mem, 1);
    let err = io::send_and_reap(
        &mut sim,
        &mut mem,
        &mut pair,
        cmd,
        Duration::from_millis(2000),
        "negative",
        false,
    )
    .expect_err("an unexpectedly clean completion must fail the case");
    assert!(matches!(
        err,
        TestError::UnexpectedStatus {
            expected_success: false,
            ..
        }
    ));
}

#[test]
fn end_to_end_scenario_through_the_registry() {
    let mut sim = SimController::new();
    sim.add_namespace(bare_ns(1));
    let mut mem = HostMemory::new(2 * 1024 * 1024);
    let pair = QueuePair::create(&mut sim, &mut mem, 1, 4).unwrap();

    let mut registry = ResourceRegistry::new();
    registry.register("e2e/io-queue-pair", pair).unwrap();

    let shared = registry.get("e2e/io-queue-pair").unwrap();
    let mut pair = shared.borrow_mut();
    assert_eq!(pair.capacity(), 4);
    assert_eq!(io::reap_inquiry(&pair, &mem).unwrap(), 0);

    let cmd = poisoned_one_block_write(&mut mem, 1);
    let entry = io::send_and_reap(
        &mut sim,
        &mut mem,
        &mut pair,
        cmd,
        Duration::from_millis(2000),
        "namspc1",
        true,
    )
    .unwrap();

    assert!(entry.status.is_success());
    assert_eq!(io::reap_inquiry(&pair, &mem).unwrap(), 0);
    assert_eq!(pair.outstanding(), 0);
}

#[test]
fn precondition_guard_passes_on_an_empty_queue() {
    let mut sim = SimController::new();
    sim.add_namespace(bare_ns(1));
    let mut mem = HostMemory::new(2 * 1024 * 1024);
    let pair = QueuePair::create(&mut sim, &mut mem, 1, 4).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let site = DumpSite {
        dir: dir.path(),
        group: "g",
        test: "t",
    };
    io::require_empty_cq(&pair, &mem, &site).unwrap();
    // No artifact for a satisfied precondition.
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}
