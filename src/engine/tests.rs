use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::*;
use crate::diagnostics::InferredLocation;
use crate::error::{FailureKind, OperationError};
use crate::operations::{Operation, Registry};
use crate::sequencer::{OrderBy, OrderDirection};
use crate::template::{Location, TemplateNode};

type Log = Arc<Mutex<Vec<(String, String)>>>;

/// Records `(item, value attribute)` for every call.
struct Record {
    name: &'static str,
    log: Log,
}

impl Operation for Record {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, node: &TemplateNode, ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        let value = node.attribute("value").unwrap_or_default().to_string();
        self.log.lock().unwrap().push((ctx.item().to_string(), value));
        Ok(())
    }
}

/// Fails when `value` equals `when`.
struct FailIf;

impl Operation for FailIf {
    fn name(&self) -> &str {
        "failif"
    }

    fn execute(&self, node: &TemplateNode, _ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        if node.attribute("value") == node.attribute("when") {
            return Err(OperationError::operation(format!(
                "matched '{}'",
                node.attribute("when").unwrap_or_default()
            )));
        }
        Ok(())
    }
}

struct Boom;

impl Operation for Boom {
    fn name(&self) -> &str {
        "boom"
    }

    fn execute(&self, _node: &TemplateNode, _ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        panic!("kaboom");
    }
}

/// Records the `dir` attribute of the reference named by `id`.
struct Lookup {
    log: Log,
}

impl Operation for Lookup {
    fn name(&self) -> &str {
        "lookup"
    }

    fn execute(&self, node: &TemplateNode, ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        let id = node.attribute("id").unwrap_or_default();
        let reference = ctx
            .reference(id)
            .ok_or_else(|| OperationError::operation(format!("no reference '{id}'")))?;
        let dir = reference.attribute("dir").unwrap_or_default().to_string();
        self.log.lock().unwrap().push((ctx.item().to_string(), dir));
        Ok(())
    }
}

/// Item "1" fails only once item "2" is in flight; item "2" finishes only
/// after the pool has halted.
struct Handshake {
    started: Arc<AtomicBool>,
    log: Log,
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for the other worker");
        thread::sleep(Duration::from_millis(1));
    }
}

impl Operation for Handshake {
    fn name(&self) -> &str {
        "slow"
    }

    fn execute(&self, _node: &TemplateNode, ctx: &mut ExecutionContext<'_>) -> Result<(), OperationError> {
        match ctx.item() {
            "1" => {
                wait_until(|| self.started.load(Ordering::SeqCst));
                Err(OperationError::operation("item 1 failed"))
            }
            "2" => {
                self.started.store(true, Ordering::SeqCst);
                wait_until(|| ctx.is_halting());
                self.log.lock().unwrap().push(("2".into(), "slow-done".into()));
                Ok(())
            }
            other => {
                self.log.lock().unwrap().push((other.into(), "slow-done".into()));
                Ok(())
            }
        }
    }
}

fn registry(log: &Log) -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register(Record {
        name: "record",
        log: Arc::clone(log),
    });
    registry.register(Record {
        name: "after",
        log: Arc::clone(log),
    });
    registry.register(FailIf);
    registry.register(Boom);
    registry.register(Lookup { log: Arc::clone(log) });
    registry
}

fn template(children: Vec<TemplateNode>) -> Template {
    let root = children
        .into_iter()
        .fold(TemplateNode::new("do"), |root, child| root.with_child(child));
    Template::new(root)
}

fn record(value: &str) -> TemplateNode {
    TemplateNode::new("record").with_attribute("value", value)
}

fn fail_if(value: &str, when: &str) -> TemplateNode {
    TemplateNode::new("failif")
        .with_attribute("value", value)
        .with_attribute("when", when)
}

fn items(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn numbered(count: usize) -> Vec<String> {
    (1..=count).map(|i| i.to_string()).collect()
}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<(String, String)> {
    log.lock().unwrap().clone()
}

#[test]
fn test_empty_item_list_is_a_noop() {
    let log = new_log();
    let engine = ForEachEngine::new(LoopConfig::new("x"), template(vec![record("${x}")]), registry(&log));

    let report = engine.run(Vec::new()).unwrap();
    assert_eq!(report.items_total, 0);
    assert_eq!(report.items_processed, 0);
    assert_eq!(report.workers, 0);
    assert_eq!(engine.state(), EngineState::Completed);
    assert!(entries(&log).is_empty());
}

#[test]
fn test_item_value_is_substituted_per_iteration() {
    let log = new_log();
    let config = LoopConfig::new("stringItem").with_max_threads(4);
    let engine = ForEachEngine::new(config, template(vec![record("${stringItem}")]), registry(&log));

    let report = engine.run(items(&["Item1", "Item2", "Item3", "Item4"])).unwrap();
    assert_eq!(report.items_processed, 4);
    assert!(report.workers >= 1 && report.workers <= 4);

    let mut values: Vec<String> = entries(&log).into_iter().map(|(_, value)| value).collect();
    values.sort();
    assert_eq!(values, vec!["Item1", "Item2", "Item3", "Item4"]);
    for (item, value) in entries(&log) {
        assert_eq!(item, value);
    }
}

#[test]
fn test_string_items_run_in_input_order_on_one_worker() {
    let log = new_log();
    let config = LoopConfig::new("stringItem").with_max_threads(1);
    let engine = ForEachEngine::new(config, template(vec![record("${stringItem}")]), registry(&log));

    let report = engine.run(items(&["Item1", "Item2", "Item3", "Item4"])).unwrap();
    assert_eq!(report.items_processed, 4);
    assert_eq!(report.workers, 1);
    let values: Vec<String> = entries(&log).into_iter().map(|(_, value)| value).collect();
    assert_eq!(values, vec!["Item1", "Item2", "Item3", "Item4"]);
}

#[test]
fn test_single_worker_keeps_sequenced_order() {
    let log = new_log();
    let config = LoopConfig::new("n")
        .with_max_threads(1)
        .with_order(OrderBy::Name, OrderDirection::Descending);
    let engine = ForEachEngine::new(config, template(vec![record("${n}")]), registry(&log));

    let report = engine.run(items(&["b", "c", "a"])).unwrap();
    assert_eq!(report.workers, 1);
    let values: Vec<String> = entries(&log).into_iter().map(|(_, value)| value).collect();
    assert_eq!(values, vec!["c", "b", "a"]);
}

#[test]
fn test_parallel_and_sequential_process_the_same_items() {
    let sequential = new_log();
    let parallel = new_log();
    let tmpl = || template(vec![record("${n}")]);

    ForEachEngine::new(LoopConfig::new("n").with_max_threads(1), tmpl(), registry(&sequential))
        .run(numbered(200))
        .unwrap();
    let report = ForEachEngine::new(LoopConfig::new("n").with_max_threads(8), tmpl(), registry(&parallel))
        .run(numbered(200))
        .unwrap();
    assert_eq!(report.items_processed, 200);

    let mut left = entries(&sequential);
    let mut right = entries(&parallel);
    left.sort();
    right.sort();
    assert_eq!(left.len(), 200);
    assert_eq!(left, right);
}

#[test]
fn test_workers_never_exceed_items() {
    let log = new_log();
    let engine = ForEachEngine::new(
        LoopConfig::new("n").with_max_threads(16),
        template(vec![record("${n}")]),
        registry(&log),
    );
    let report = engine.run(numbered(3)).unwrap();
    assert!(report.workers <= 3);
}

#[test]
fn test_stop_on_first_error_stops_dequeuing() {
    let log = new_log();
    let config = LoopConfig::new("n").with_max_threads(1);
    let engine = ForEachEngine::new(
        config,
        template(vec![record("${n}"), fail_if("${n}", "3"), TemplateNode::new("after")]),
        registry(&log),
    );

    let err = engine.run(numbered(50)).unwrap_err();
    let LoopError::Failed { primary, records, report } = &err else {
        panic!("expected a failed run, got {err:?}");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(primary.item, "3");
    assert_eq!(primary.operation, "failif");
    assert_eq!(primary.kind, FailureKind::Operation);
    assert_eq!(report.items_processed, 3);

    let recorded: Vec<String> = entries(&log).into_iter().map(|(item, _)| item).collect();
    // record + after for 1 and 2, record only for 3
    assert_eq!(recorded, vec!["1", "1", "2", "2", "3"]);
    assert_eq!(engine.state(), EngineState::Completed);
}

#[test]
fn test_stop_on_first_error_in_parallel_stops_early() {
    let log = new_log();
    let config = LoopConfig::new("n").with_max_threads(4);
    let engine = ForEachEngine::new(config, template(vec![fail_if("x", "x")]), registry(&log));

    let err = engine.run(numbered(1000)).unwrap_err();
    let LoopError::Failed { records, report, .. } = &err else {
        panic!("expected a failed run");
    };
    // At most one failure per worker can slip in before the halt is seen
    assert!(!records.is_empty() && records.len() <= 4);
    assert!(report.items_processed < 1000);
}

#[test]
fn test_in_flight_operation_finishes_but_its_item_stops() {
    let log = new_log();
    let mut registry = registry(&log);
    registry.register(Handshake {
        started: Arc::new(AtomicBool::new(false)),
        log: Arc::clone(&log),
    });
    let config = LoopConfig::new("n")
        .with_max_threads(2)
        .with_stop_on_first_error(true);
    let engine = ForEachEngine::new(
        config,
        template(vec![
            TemplateNode::new("slow"),
            TemplateNode::new("after").with_attribute("value", "after-${n}"),
        ]),
        registry,
    );

    let err = engine.run(numbered(4)).unwrap_err();
    let LoopError::Failed { primary, records, report } = &err else {
        panic!("expected a failed run, got {err:?}");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(primary.item, "1");
    assert_eq!(report.workers, 2);
    // Items 1 and 2 each ran an operation; 3 and 4 were never taken
    assert_eq!(report.items_processed, 2);
    assert_eq!(entries(&log), vec![("2".to_string(), "slow-done".to_string())]);
}

#[test]
fn test_stop_loop_on_error_abandons_only_the_failing_item() {
    let log = new_log();
    let config = LoopConfig::new("n")
        .with_max_threads(2)
        .with_stop_on_first_error(false)
        .with_stop_loop_on_error(true);
    let engine = ForEachEngine::new(
        config,
        template(vec![fail_if("${n}", "2"), TemplateNode::new("after").with_attribute("value", "${n}")]),
        registry(&log),
    );

    let err = engine.run(numbered(5)).unwrap_err();
    assert_eq!(err.records().len(), 1);
    let LoopError::Failed { report, .. } = &err else {
        panic!("expected a failed run");
    };
    assert_eq!(report.items_processed, 5);

    let mut after: Vec<String> = entries(&log).into_iter().map(|(item, _)| item).collect();
    after.sort();
    assert_eq!(after, vec!["1", "3", "4", "5"]);
}

#[test]
fn test_continue_after_error_when_both_policies_are_off() {
    let log = new_log();
    let config = LoopConfig::new("n")
        .with_max_threads(1)
        .with_stop_on_first_error(false)
        .with_stop_loop_on_error(false);
    let engine = ForEachEngine::new(
        config,
        template(vec![fail_if("${n}", "2"), TemplateNode::new("after").with_attribute("value", "${n}")]),
        registry(&log),
    );

    let err = engine.run(numbered(3)).unwrap_err();
    assert_eq!(err.records().len(), 1);
    let after: Vec<String> = entries(&log).into_iter().map(|(item, _)| item).collect();
    assert_eq!(after, vec!["1", "2", "3"]);
}

#[test]
fn test_primary_error_is_the_first_captured() {
    let log = new_log();
    let config = LoopConfig::new("n")
        .with_max_threads(1)
        .with_stop_on_first_error(false);
    let engine = ForEachEngine::new(
        config,
        template(vec![TemplateNode::new("fail").with_attribute("message", "bad ${n}")]),
        registry(&log),
    );

    let err = engine.run(items(&["a", "b", "c"])).unwrap_err();
    let records = err.records();
    assert_eq!(records.len(), 3);
    assert_eq!(err.primary().map(|p| p.item.as_str()), Some("a"));
    assert_eq!(err.to_string(), records[0].to_string());
    assert!(err.to_string().contains("bad a"));
    let sequences: Vec<usize> = records.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[test]
fn test_panicking_operation_is_captured_as_unknown() {
    let log = new_log();
    let config = LoopConfig::new("n").with_max_threads(2).with_stop_on_first_error(false);
    let engine = ForEachEngine::new(
        config,
        template(vec![TemplateNode::new("boom"), record("${n}")]),
        registry(&log),
    );

    let err = engine.run(numbered(2)).unwrap_err();
    let records = err.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.kind == FailureKind::Unknown));
    assert!(records[0].message.contains("kaboom"));
    // stoplooponerror skipped the record after the panic
    assert!(entries(&log).is_empty());
}

#[test]
fn test_unknown_node_is_an_infrastructure_error() {
    let log = new_log();
    let engine = ForEachEngine::new(
        LoopConfig::new("n").with_max_threads(1),
        template(vec![TemplateNode::new("nonesuch")]),
        registry(&log),
    );

    let err = engine.run(numbered(1)).unwrap_err();
    let primary = err.primary().unwrap();
    assert_eq!(primary.kind, FailureKind::Infrastructure);
    assert!(primary.message.contains("nonesuch"));
}

#[test]
fn test_foreign_namespace_nodes_are_skipped() {
    let log = new_log();
    let config = LoopConfig::new("n").with_max_threads(1).with_namespace("build");
    let engine = ForEachEngine::new(
        config,
        template(vec![
            record("plain"),
            record("mine").with_namespace("build"),
            record("theirs").with_namespace("docs"),
            TemplateNode::new("nonesuch").with_namespace("docs"),
        ]),
        registry(&log),
    );

    engine.run(numbered(1)).unwrap();
    let values: Vec<String> = entries(&log).into_iter().map(|(_, value)| value).collect();
    assert_eq!(values, vec!["plain", "mine"]);
}

#[test]
fn test_shared_reference_is_readable_by_later_operations() {
    let log = new_log();
    let engine = ForEachEngine::new(
        LoopConfig::new("n").with_max_threads(1),
        template(vec![
            TemplateNode::new("fileset")
                .with_attribute("id", "sources")
                .with_attribute("dir", "src/${n}"),
            TemplateNode::new("lookup").with_attribute("id", "sources"),
        ]),
        registry(&log),
    );

    engine.run(items(&["a", "b"])).unwrap();
    assert_eq!(
        entries(&log),
        vec![
            ("a".to_string(), "src/a".to_string()),
            ("b".to_string(), "src/b".to_string())
        ]
    );
    assert_eq!(engine.references().len(), 1);
    assert_eq!(
        engine.references().get("sources").unwrap().attribute("dir"),
        Some("src/b")
    );
}

#[test]
fn test_local_values_are_isolated_per_iteration() {
    let log = new_log();
    let engine = ForEachEngine::new(
        LoopConfig::new("n").with_max_threads(8),
        template(vec![
            TemplateNode::new("set")
                .with_attribute("name", "target")
                .with_attribute("value", "${n}.out"),
            record("${target}"),
        ]),
        registry(&log),
    );

    engine.run(numbered(300)).unwrap();
    let recorded = entries(&log);
    assert_eq!(recorded.len(), 300);
    for (item, value) in &recorded {
        assert_eq!(value, &format!("{item}.out"));
    }
    let distinct: HashSet<&String> = recorded.iter().map(|(item, _)| item).collect();
    assert_eq!(distinct.len(), 300);
}

#[test]
fn test_local_values_do_not_leak_into_the_next_item() {
    let log = new_log();
    let engine = ForEachEngine::new(
        LoopConfig::new("n").with_max_threads(1),
        template(vec![
            record("${seen}"),
            TemplateNode::new("set")
                .with_attribute("name", "seen")
                .with_attribute("value", "${n}"),
        ]),
        registry(&log),
    );

    engine.run(items(&["a", "b"])).unwrap();
    let values: Vec<String> = entries(&log).into_iter().map(|(_, value)| value).collect();
    assert_eq!(values, vec!["${seen}", "${seen}"]);
}

#[test]
fn test_nested_failure_skips_enclosing_siblings() {
    let log = new_log();
    let config = LoopConfig::new("n").with_max_threads(1).with_stop_on_first_error(false);
    let engine = ForEachEngine::new(
        config,
        template(vec![
            TemplateNode::new("group")
                .with_child(record("inner"))
                .with_child(fail_if("${n}", "1"))
                .with_child(record("skipped")),
            record("outer"),
        ]),
        registry(&log),
    );

    let err = engine.run(items(&["1", "2"])).unwrap_err();
    assert_eq!(err.records().len(), 1);
    let recorded = entries(&log);
    assert_eq!(
        recorded,
        vec![
            ("1".to_string(), "inner".to_string()),
            ("2".to_string(), "inner".to_string()),
            ("2".to_string(), "skipped".to_string()),
            ("2".to_string(), "outer".to_string()),
        ]
    );
}

#[test]
fn test_location_falls_back_to_last_successful_operation() {
    let log = new_log();
    let engine = ForEachEngine::new(
        LoopConfig::new("n").with_max_threads(1),
        template(vec![
            record("${n}").with_location(Location::new("t.yaml", "do[0] (record)")),
            TemplateNode::new("fail"),
        ]),
        registry(&log),
    );

    let err = engine.run(numbered(1)).unwrap_err();
    match &err.primary().unwrap().location {
        InferredLocation::AfterOperation { operation, location } => {
            assert_eq!(operation, "record");
            assert_eq!(location.to_string(), "t.yaml:do[0] (record)");
        }
        other => panic!("unexpected location {other:?}"),
    }
}

#[test]
fn test_location_falls_back_to_enclosing_template() {
    let log = new_log();
    let root = TemplateNode::new("do")
        .with_location(Location::new("t.yaml", "do"))
        .with_child(TemplateNode::new("fail"));
    let engine = ForEachEngine::new(LoopConfig::new("n").with_max_threads(1), Template::new(root), registry(&log));

    let err = engine.run(numbered(1)).unwrap_err();
    assert!(matches!(
        &err.primary().unwrap().location,
        InferredLocation::Enclosing(location) if location.path == "do"
    ));
}

#[test]
fn test_location_unknown_without_any_hint() {
    let log = new_log();
    let engine = ForEachEngine::new(
        LoopConfig::new("n").with_max_threads(1),
        template(vec![TemplateNode::new("fail")]),
        registry(&log),
    );

    let err = engine.run(numbered(1)).unwrap_err();
    assert_eq!(err.primary().unwrap().location, InferredLocation::Unknown);
}

#[test]
fn test_invalid_configuration_fails_before_dispatch() {
    let log = new_log();
    let engine = ForEachEngine::new(LoopConfig::new(""), template(vec![record("x")]), registry(&log));

    let err = engine.run(numbered(3)).unwrap_err();
    assert!(matches!(err, LoopError::Configuration(_)));
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(entries(&log).is_empty());
}

#[test]
fn test_engine_can_run_again() {
    let log = new_log();
    let engine = ForEachEngine::new(
        LoopConfig::new("n").with_max_threads(2),
        template(vec![record("${n}")]),
        registry(&log),
    );

    engine.run(numbered(3)).unwrap();
    engine.run(numbered(2)).unwrap();
    assert_eq!(entries(&log).len(), 5);
}
