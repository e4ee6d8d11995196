use super::*;
use crate::modules::GeometryService;
use crate::pset::FileInPath;
use crate::schedule::ModuleOutcome;
use color_eyre::eyre::eyre;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
struct Call {
    label: String,
    event: EventId,
    sequence: u64,
    draw: u64,
}

type Log = Rc<RefCell<Vec<Call>>>;

/// Records every invocation and one random draw; outcome chosen per event.
struct Recorder {
    log: Log,
    decide: fn(EventId) -> color_eyre::Result<ModuleOutcome>,
}

impl Producer for Recorder {
    fn produce(
        &mut self,
        event: &mut Event,
        ctx: &mut ModuleContext<'_>,
    ) -> color_eyre::Result<ModuleOutcome> {
        let draw = rand::RngCore::next_u64(ctx.engine());
        self.log.borrow_mut().push(Call {
            label: ctx.label().to_string(),
            event: event.id(),
            sequence: ctx.sequence(),
            draw,
        });
        (self.decide)(event.id())
    }
}

type Torn = Rc<RefCell<Vec<String>>>;

/// Records its own end-of-run notification; optionally errors on one event.
struct Teardown {
    log: Torn,
    label: String,
    fail_on: Option<u32>,
}

impl Producer for Teardown {
    fn produce(&mut self, event: &mut Event, _: &mut ModuleContext<'_>) -> color_eyre::Result<ModuleOutcome> {
        if self.fail_on == Some(event.id().event) {
            return Err(eyre!("boom"));
        }
        Ok(ModuleOutcome::Continue)
    }

    fn end_run(&mut self) -> color_eyre::Result<()> {
        self.log.borrow_mut().push(self.label.clone());
        Ok(())
    }
}

fn always(_: EventId) -> color_eyre::Result<ModuleOutcome> {
    Ok(ModuleOutcome::Continue)
}

fn stop_odd(id: EventId) -> color_eyre::Result<ModuleOutcome> {
    Ok(if id.event % 2 == 1 {
        ModuleOutcome::Stop
    } else {
        ModuleOutcome::Continue
    })
}

fn fail_on_two(id: EventId) -> color_eyre::Result<ModuleOutcome> {
    if id.event == 2 {
        Err(eyre!("cannot handle event 2"))
    } else {
        Ok(ModuleOutcome::Continue)
    }
}

fn fail_outcome(_: EventId) -> color_eyre::Result<ModuleOutcome> {
    Ok(ModuleOutcome::Fail)
}

fn factory(log: &Log) -> ComponentFactory {
    let mut factory = ComponentFactory::with_builtins();
    for (plugin, decide) in [
        ("Recorder", always as fn(EventId) -> color_eyre::Result<ModuleOutcome>),
        ("StopOdd", stop_odd),
        ("FailOnTwo", fail_on_two),
        ("FailOutcome", fail_outcome),
    ] {
        let log = log.clone();
        factory.register_producer(plugin, move |_ctx| {
            Ok(Recorder {
                log: log.clone(),
                decide,
            })
        });
    }
    factory
}

fn empty_source(n: i32) -> ParameterSet {
    ParameterSet::builder()
        .set("numberEvents", n)
        .unwrap()
        .build()
}

fn base(n: i32) -> ProcessBuilder {
    let mut b = ProcessBuilder::new("test");
    b.source("source", "EmptyEvent", empty_source(n)).unwrap();
    b
}

fn calls_of<'a>(log: &'a [Call], label: &str) -> Vec<&'a Call> {
    log.iter().filter(|c| c.label == label).collect()
}

#[test]
fn test_end_to_end_geometry_and_single_gen() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("Geometry/gdml")).unwrap();
    fs::write(dir.path().join("Geometry/gdml/ndos.gdml"), "<gdml/>").unwrap();

    let log: Log = Rc::default();
    let mut b = base(3);
    b.search_dir(dir.path());
    b.service(
        "Geometry",
        "Geometry",
        ParameterSet::builder()
            .set("GDML", FileInPath::new("Geometry/gdml/ndos.gdml"))
            .unwrap()
            .set("BigBoxUsed", true)
            .unwrap()
            .build(),
    )
    .unwrap();
    b.producer("singlegen", "Recorder", ParameterSet::new()).unwrap();
    b.end_path("doit", &["singlegen"]).unwrap();

    let mut process = b.build();
    let summary = process.run(&factory(&log)).unwrap();

    let calls = log.borrow();
    let events: Vec<u32> = calls.iter().map(|c| c.event.event).collect();
    assert_eq!(events, vec![1, 2, 3]);
    assert_eq!(
        process.history(),
        &[
            ProcessState::Configured,
            ProcessState::Initialized,
            ProcessState::Running,
            ProcessState::Draining,
            ProcessState::Finished
        ]
    );
    assert!(process
        .services()
        .get("Geometry")
        .unwrap()
        .is::<GeometryService>());
    assert_eq!(summary.events_processed, 3);
    assert_eq!(summary.path("doit").unwrap().passed, 3);
    assert!(summary.succeeded());
}

#[test]
fn test_max_events_bounds_end_path_runs() {
    for (max, available, expected) in [(2, 5, 2), (10, 3, 3), (0, 3, 0)] {
        let log: Log = Rc::default();
        let mut b = base(available);
        b.max_events(MaxEvents::Bounded(max));
        b.producer("gen", "Recorder", ParameterSet::new()).unwrap();
        b.end_path("e", &["gen"]).unwrap();
        let mut process = b.build();
        let summary = process.run(&factory(&log)).unwrap();
        assert_eq!(log.borrow().len(), expected, "max {} available {}", max, available);
        assert_eq!(summary.events_read, expected as u64);
        assert_eq!(process.state(), ProcessState::Finished);
    }
}

#[test]
fn test_draws_independent_of_path_layout() {
    let run = |layout: u8| {
        let log: Log = Rc::default();
        let mut b = base(3);
        b.master_seed(42);
        b.producer("a", "Recorder", ParameterSet::new()).unwrap();
        b.producer("b", "Recorder", ParameterSet::new()).unwrap();
        match layout {
            0 => {
                b.path("p1", &["a", "b"]).unwrap();
            }
            _ => {
                b.path("p1", &["b"]).unwrap();
                b.path("p2", &["a", "b"]).unwrap();
                b.end_path("e", &["a"]).unwrap();
            }
        }
        b.build().run(&factory(&log)).unwrap();
        let calls = log.borrow();
        let draws = |label| -> Vec<u64> { calls_of(&calls, label).iter().map(|c| c.draw).collect() };
        (draws("a"), draws("b"))
    };

    assert_eq!(run(0), run(0));
    assert_eq!(run(0), run(1));
    let (a, b) = run(0);
    assert_ne!(a, b);
}

#[test]
fn test_explicit_seed_overrides_master() {
    let draws = |master: u64| {
        let log: Log = Rc::default();
        let mut b = base(2);
        b.master_seed(master);
        let params = ParameterSet::builder().set("Seed", 1234u32).unwrap().build();
        b.producer("gen", "Recorder", params).unwrap();
        b.path("p", &["gen"]).unwrap();
        b.build().run(&factory(&log)).unwrap();
        let draws: Vec<u64> = log.borrow().iter().map(|c| c.draw).collect();
        draws
    };
    assert_eq!(draws(1), draws(2));
}

#[test]
fn test_shared_module_runs_once_per_event() {
    let log: Log = Rc::default();
    let mut b = base(4);
    b.producer("gen", "Recorder", ParameterSet::new()).unwrap();
    b.producer("other", "Recorder", ParameterSet::new()).unwrap();
    b.path("p1", &["gen", "other"]).unwrap();
    b.path("p2", &["other", "gen"]).unwrap();
    let mut process = b.build();
    let summary = process.run(&factory(&log)).unwrap();

    assert_eq!(calls_of(&log.borrow(), "gen").len(), 4);
    let gen = summary.module("gen").unwrap();
    assert_eq!((gen.visited, gen.executed), (8, 4));
}

#[test]
fn test_end_paths_run_after_paths() {
    let log: Log = Rc::default();
    let mut b = base(3);
    b.producer("late", "Recorder", ParameterSet::new()).unwrap();
    b.producer("early", "Recorder", ParameterSet::new()).unwrap();
    b.end_path("e", &["late"]).unwrap();
    b.path("p", &["early"]).unwrap();
    b.build().run(&factory(&log)).unwrap();

    let calls = log.borrow();
    for event in 1..=3 {
        let seq = |label: &str| {
            calls
                .iter()
                .find(|c| c.label == label && c.event.event == event)
                .map(|c| c.sequence)
                .unwrap()
        };
        assert!(seq("early") < seq("late"));
    }
    let sequences: Vec<u64> = calls.iter().map(|c| c.sequence).collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_stop_rejects_path_but_not_end_path() {
    let log: Log = Rc::default();
    let mut b = base(4);
    b.producer("filter", "StopOdd", ParameterSet::new()).unwrap();
    b.producer("after", "Recorder", ParameterSet::new()).unwrap();
    b.producer("out", "Recorder", ParameterSet::new()).unwrap();
    b.path("p", &["filter", "after"]).unwrap();
    b.end_path("e", &["out"]).unwrap();
    let summary = b.build().run(&factory(&log)).unwrap();

    assert_eq!(calls_of(&log.borrow(), "after").len(), 2);
    assert_eq!(calls_of(&log.borrow(), "out").len(), 4);
    let p = summary.path("p").unwrap();
    assert_eq!((p.run, p.passed, p.rejected, p.failed), (4, 2, 2, 0));
}

#[test]
fn test_unknown_component_in_path() {
    let mut b = base(1);
    b.producer("gen", "Recorder", ParameterSet::new()).unwrap();
    assert_eq!(
        b.path("p", &["gen", "ghost"]).err(),
        Some(ConfigError::UnknownComponent {
            label: "ghost".into()
        })
    );
}

#[test]
fn test_second_source_rejected() {
    let mut b = ProcessBuilder::new("test");
    b.source("s1", "EmptyEvent", ParameterSet::new()).unwrap();
    assert_eq!(
        b.source("s2", "EmptyEvent", ParameterSet::new()).err(),
        Some(ConfigError::DuplicateSource {
            existing: "s1".into(),
            requested: "s2".into()
        })
    );
}

#[test]
fn test_no_source_fails_initialization() {
    let log: Log = Rc::default();
    let mut process = ProcessBuilder::new("test").build();
    let err = process.initialize(&factory(&log)).unwrap_err();
    assert!(matches!(
        err,
        FrameworkError::Configuration(ConfigError::NoSource)
    ));
    assert_eq!(process.state(), ProcessState::Failed);
    assert_eq!(
        process.history(),
        &[ProcessState::Configured, ProcessState::Failed]
    );
}

struct NotingService {
    log: Torn,
    label: String,
}

impl Service for NotingService {
    fn end_run(&mut self) -> color_eyre::Result<()> {
        self.log.borrow_mut().push(self.label.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

struct CountdownSource {
    log: Torn,
    left: u32,
}

impl Source for CountdownSource {
    fn next_event(&mut self) -> color_eyre::Result<Option<Event>> {
        if self.left == 0 {
            return Ok(None);
        }
        self.left -= 1;
        Ok(Some(Event::new(EventId::new(1, 0, 3 - self.left))))
    }

    fn end_run(&mut self) -> color_eyre::Result<()> {
        self.log.borrow_mut().push("source".to_string());
        Ok(())
    }
}

/// Factory with recording services, a 3-event source and `Teardown`
/// producers (`TeardownFailOnTwo` errors on event 2).
fn teardown_factory(torn: &Torn) -> ComponentFactory {
    let mut factory = ComponentFactory::with_builtins();
    for (plugin, fail_on) in [("Teardown", None), ("TeardownFailOnTwo", Some(2))] {
        let t = torn.clone();
        factory.register_producer(plugin, move |ctx| {
            Ok(Teardown {
                log: t.clone(),
                label: ctx.label().to_string(),
                fail_on,
            })
        });
    }
    let t = torn.clone();
    factory.register_service("Noting", move |ctx| {
        Ok(NotingService {
            log: t.clone(),
            label: ctx.label().to_string(),
        })
    });
    let t = torn.clone();
    factory.register_source("Countdown", move |_ctx| {
        Ok(CountdownSource {
            log: t.clone(),
            left: 3,
        })
    });
    factory
}

#[test]
fn test_teardown_order_after_successful_run() {
    let torn: Torn = Rc::default();
    let mut b = ProcessBuilder::new("test");
    b.service("svcA", "Noting", ParameterSet::new()).unwrap();
    b.service("svcB", "Noting", ParameterSet::new()).unwrap();
    b.source("source", "Countdown", ParameterSet::new()).unwrap();
    b.producer("first", "Teardown", ParameterSet::new()).unwrap();
    b.producer("second", "Teardown", ParameterSet::new()).unwrap();
    b.path("p", &["first"]).unwrap();
    b.end_path("e", &["second"]).unwrap();
    let mut process = b.build();
    let summary = process.run(&teardown_factory(&torn)).unwrap();

    assert_eq!(summary.events_processed, 3);
    assert_eq!(
        *torn.borrow(),
        vec!["second", "first", "source", "svcB", "svcA"]
    );
    process.finish().unwrap_err();
    assert_eq!(torn.borrow().len(), 5);
}

#[test]
fn test_abort_still_notifies_failing_module() {
    let torn: Torn = Rc::default();
    let mut b = ProcessBuilder::new("test");
    b.service("svc", "Noting", ParameterSet::new()).unwrap();
    b.source("source", "Countdown", ParameterSet::new()).unwrap();
    b.producer("bad", "TeardownFailOnTwo", ParameterSet::new()).unwrap();
    b.producer("good", "Teardown", ParameterSet::new()).unwrap();
    b.path("p", &["bad", "good"]).unwrap();
    let mut process = b.build();
    let err = process.run(&teardown_factory(&torn)).unwrap_err();

    assert!(matches!(err, FrameworkError::ModuleExecution { ref label, .. } if label == "bad"));
    assert!(error_chain(&err).contains("boom"));
    assert_eq!(*torn.borrow(), vec!["good", "bad", "source", "svc"]);
    assert_eq!(process.state(), ProcessState::Failed);
}

#[test]
fn test_undeclared_service_lookup_fails_init() {
    let mut factory = ComponentFactory::with_builtins();
    factory.register_producer("NeedsService", |ctx| {
        ctx.get_service("Nope")?;
        Ok(Recorder {
            log: Rc::default(),
            decide: always,
        })
    });

    let params = ParameterSet::new();
    let services = ServiceTable::new();
    let search = SearchPath::new();
    let ctx = InitContext::new("gen", "NeedsService", &params, &services, &search);
    assert_eq!(
        ctx.get_service("Nope").err(),
        Some(ConfigError::ServiceNotFound {
            name: "Nope".into()
        })
    );

    let mut b = base(1);
    b.producer("gen", "NeedsService", ParameterSet::new()).unwrap();
    b.path("p", &["gen"]).unwrap();
    let mut process = b.build();
    let err = process.run(&factory).unwrap_err();
    assert!(matches!(err, FrameworkError::ComponentInit { ref label, .. } if label == "gen"));
    assert!(error_chain(&err).contains("service 'Nope' is not declared"));
}

#[test]
fn test_busy_service_is_not_reentered() {
    let torn: Torn = Rc::default();
    let handle = ServiceHandle::new(
        "svc",
        Box::new(NotingService {
            log: torn.clone(),
            label: "svc".into(),
        }),
    );
    let nested = handle.with_mut(|_: &mut NotingService| {
        handle.with(|s: &NotingService| s.label.clone())
    });
    assert_eq!(nested, Some(None));
    assert!(handle.is::<NotingService>());
    assert!(handle.end_run().is_ok());
    assert_eq!(*torn.borrow(), vec!["svc"]);
}

#[test]
fn test_component_init_failure_tears_down_in_reverse() {
    let torn: Torn = Rc::default();
    let factory = teardown_factory(&torn);

    let mut b = base(1);
    b.producer("first", "Teardown", ParameterSet::new()).unwrap();
    b.producer("second", "Teardown", ParameterSet::new()).unwrap();
    b.producer("broken", "SingleGen", ParameterSet::new()).unwrap();
    b.path("p", &["first", "second", "broken"]).unwrap();
    let mut process = b.build();
    let err = process.run(&factory).unwrap_err();

    assert_eq!(err.component(), Some("broken"));
    assert!(matches!(err, FrameworkError::ComponentInit { .. }));
    assert_eq!(*torn.borrow(), vec!["second".to_string(), "first".to_string()]);
    assert_eq!(process.state(), ProcessState::Failed);
}

#[test]
fn test_missing_gdml_is_component_init() {
    let mut b = base(1);
    b.service(
        "Geometry",
        "Geometry",
        ParameterSet::builder()
            .set("GDML", FileInPath::new("Geometry/gdml/does-not-exist.gdml"))
            .unwrap()
            .build(),
    )
    .unwrap();
    let mut process = b.build();
    let err = process.run(&ComponentFactory::with_builtins()).unwrap_err();
    assert!(matches!(err, FrameworkError::ComponentInit { ref label, .. } if label == "Geometry"));
    assert!(error_chain(&err).contains("does-not-exist.gdml"));
}

#[test]
fn test_abort_policy_stops_run() {
    let log: Log = Rc::default();
    let mut b = base(5);
    b.producer("bad", "FailOnTwo", ParameterSet::new()).unwrap();
    b.producer("out", "Recorder", ParameterSet::new()).unwrap();
    b.path("p", &["bad"]).unwrap();
    b.end_path("e", &["out"]).unwrap();
    let mut process = b.build();
    let err = process.run(&factory(&log)).unwrap_err();

    match &err {
        FrameworkError::ModuleExecution { label, event, .. } => {
            assert_eq!(label, "bad");
            assert_eq!(event.event, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(error_chain(&err).contains("cannot handle event 2"));
    assert_eq!(calls_of(&log.borrow(), "out").len(), 1);
    assert_eq!(process.state(), ProcessState::Failed);
    assert!(process.summary().error.is_some());
}

#[test]
fn test_fail_outcome_under_abort() {
    let log: Log = Rc::default();
    let mut b = base(3);
    b.producer("bad", "FailOutcome", ParameterSet::new()).unwrap();
    b.path("p", &["bad"]).unwrap();
    let err = b.build().run(&factory(&log)).unwrap_err();
    assert!(error_chain(&err).contains("Fail outcome"));
}

#[test]
fn test_fail_path_policy_continues() {
    let log: Log = Rc::default();
    let mut b = base(3);
    b.failure_policy(FailurePolicy::FailPath);
    b.producer("bad", "FailOnTwo", ParameterSet::new()).unwrap();
    b.producer("good", "Recorder", ParameterSet::new()).unwrap();
    b.producer("out", "Recorder", ParameterSet::new()).unwrap();
    b.path("p1", &["bad"]).unwrap();
    b.path("p2", &["good"]).unwrap();
    b.end_path("e", &["out"]).unwrap();
    let summary = b.build().run(&factory(&log)).unwrap();

    assert_eq!(summary.events_processed, 3);
    assert_eq!(summary.path("p1").unwrap().failed, 1);
    assert_eq!(summary.path("p2").unwrap().passed, 3);
    assert_eq!(calls_of(&log.borrow(), "out").len(), 3);
    assert_eq!(summary.module("bad").unwrap().failed, 1);
}

#[test]
fn test_skip_event_policy() {
    let log: Log = Rc::default();
    let mut b = base(3);
    b.failure_policy(FailurePolicy::SkipEvent);
    b.producer("bad", "FailOnTwo", ParameterSet::new()).unwrap();
    b.producer("good", "Recorder", ParameterSet::new()).unwrap();
    b.producer("out", "Recorder", ParameterSet::new()).unwrap();
    b.path("p1", &["bad"]).unwrap();
    b.path("p2", &["good"]).unwrap();
    b.end_path("e", &["out"]).unwrap();
    let summary = b.build().run(&factory(&log)).unwrap();

    assert_eq!((summary.events_processed, summary.events_skipped), (2, 1));
    let out_events: Vec<u32> = calls_of(&log.borrow(), "out").iter().map(|c| c.event.event).collect();
    assert_eq!(out_events, vec![1, 3]);
    assert_eq!(calls_of(&log.borrow(), "good").len(), 2);
}

#[test]
fn test_stop_handle_ends_loop() {
    let log: Log = Rc::default();
    let mut b = base(-1);
    b.producer("gen", "Recorder", ParameterSet::new()).unwrap();
    b.path("p", &["gen"]).unwrap();
    let mut process = b.build();
    let stop = process.stop_handle();
    stop.stop();
    let summary = process.run(&factory(&log)).unwrap();
    assert_eq!(summary.events_read, 0);
    assert_eq!(process.state(), ProcessState::Finished);
}

#[test]
fn test_seed_table_replay_continues_streams() {
    let dir = TempDir::new().unwrap();
    let table_path = dir.path().join("seeds.json");

    let draws_of = |log: &Log| -> Vec<u64> { log.borrow().iter().map(|c| c.draw).collect() };

    // One long run of 4 events.
    let full: Log = Rc::default();
    let mut b = base(4);
    b.producer("gen", "Recorder", ParameterSet::new()).unwrap();
    b.path("p", &["gen"]).unwrap();
    b.build().run(&factory(&full)).unwrap();

    // Two events, save, then two more from the saved state.
    let first: Log = Rc::default();
    let mut b = base(2);
    b.producer("gen", "Recorder", ParameterSet::new()).unwrap();
    b.path("p", &["gen"]).unwrap();
    let mut process = b.build();
    process.run(&factory(&first)).unwrap();
    process.seed_table().save(&table_path).unwrap();

    let second: Log = Rc::default();
    let mut b = base(2);
    b.restore_seeds(SeedTable::load(&table_path).unwrap());
    b.producer("gen", "Recorder", ParameterSet::new()).unwrap();
    b.path("p", &["gen"]).unwrap();
    b.build().run(&factory(&second)).unwrap();

    let mut replay = draws_of(&first);
    replay.extend(draws_of(&second));
    assert_eq!(replay, draws_of(&full));
}

#[test]
fn test_unscheduled_module_not_instantiated() {
    let log: Log = Rc::default();
    let mut b = base(2);
    b.producer("used", "Recorder", ParameterSet::new()).unwrap();
    b.producer("idle", "DoesNotExist", ParameterSet::new()).unwrap();
    b.path("p", &["used"]).unwrap();
    let summary = b.build().run(&factory(&log)).unwrap();
    assert!(summary.module("idle").is_none());
    assert!(summary.module("used").is_some());
}

#[test]
fn test_invalid_transitions() {
    let log: Log = Rc::default();
    let mut process = base(1).build();
    assert!(matches!(
        process.finish(),
        Err(FrameworkError::InvalidTransition {
            from: ProcessState::Configured,
            to: ProcessState::Draining
        })
    ));
    process.initialize(&factory(&log)).unwrap();
    assert!(matches!(
        process.initialize(&factory(&log)),
        Err(FrameworkError::InvalidTransition { .. })
    ));
    assert_eq!(process.state(), ProcessState::Initialized);
}

#[test]
fn test_max_events_parsing() {
    assert_eq!(MaxEvents::parse("unbounded").unwrap(), MaxEvents::Unbounded);
    assert_eq!(MaxEvents::parse("-1").unwrap(), MaxEvents::Unbounded);
    assert_eq!(MaxEvents::parse("9999").unwrap(), MaxEvents::Bounded(9999));
    assert!(MaxEvents::parse("-2").is_err());
    assert!(MaxEvents::parse("lots").is_err());
    assert!(!MaxEvents::Bounded(0).allows(0));
    assert!(MaxEvents::Unbounded.allows(u64::MAX));
}

#[test]
fn test_pset_ids_recorded() {
    let log: Log = Rc::default();
    let params = ParameterSet::builder().set("Seed", 7).unwrap().build();
    let id = params.id();
    let mut b = base(1);
    b.producer("gen", "Recorder", params).unwrap();
    b.path("p", &["gen"]).unwrap();
    let summary = b.build().run(&factory(&log)).unwrap();
    assert_eq!(summary.module("gen").unwrap().pset_id, id);
}
