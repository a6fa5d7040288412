use crate::test_utils::{self, DropProbe, Recorder};
use crate::{ExecutionSpace, Priority, ReadyState, Scheduler, SchedulerError, Serial, TaskFuture, TaskKind, TaskSpec};
use anyhow::Result;
use parking_lot::Mutex;
use rstest::rstest;
use static_assertions::assert_impl_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

assert_impl_all!(Serial: Send, Sync, ExecutionSpace);

fn record(sched: &Scheduler, recorder: &Recorder, spec: TaskSpec, label: usize) -> Result<TaskFuture<()>> {
    let recorder = recorder.clone();
    Ok(sched.spawn(spec, move |_| {
        recorder.record(label);
    })?)
}

#[test]
fn test_chain_runs_in_dependency_order() -> Result<()> {
    let sched = test_utils::scheduler(1)?;
    let recorder = Recorder::new();

    // Spawned in reverse priority so that only the edges enforce the order.
    let a = record(&sched, &recorder, TaskSpec::single().priority(Priority::LOW), 0)?;
    let b = record(&sched, &recorder, TaskSpec::single().after(&a), 1)?;
    let c = record(&sched, &recorder, TaskSpec::single().priority(Priority::HIGH).after(&b), 2)?;

    assert_eq!(c.state(), ReadyState::NotReady);
    sched.execute()?;

    assert_eq!(recorder.order(), vec![0, 1, 2]);
    assert!([&a, &b, &c].iter().all(|f| f.is_ready()));
    assert_eq!(sched.pending(), 0);
    Ok(())
}

#[rstest]
#[case(1)]
#[case(4)]
fn test_newly_ready_task_beats_lower_priority(#[case] workers: usize) -> Result<()> {
    let sched = test_utils::scheduler(workers)?;
    let recorder = Recorder::new();

    let a = record(&sched, &recorder, TaskSpec::single().priority(Priority::HIGH), 0)?;
    record(&sched, &recorder, TaskSpec::single().priority(Priority::HIGH).after(&a), 1)?;
    record(&sched, &recorder, TaskSpec::single().priority(Priority::new(5)?), 2)?;

    sched.execute()?;

    let order = recorder.order();
    assert_eq!(order.len(), 3);
    if workers == 1 {
        assert_eq!(order, vec![0, 1, 2]);
    } else {
        assert!(recorder.first(0) < recorder.first(1));
    }
    Ok(())
}

#[rstest]
#[case(1)]
#[case(4)]
fn test_dependency_on_other_scheduler_is_rejected(#[case] workers: usize) -> Result<()> {
    let other = test_utils::scheduler(1)?;
    let sched = test_utils::scheduler(workers)?;
    let recorder = Recorder::new();

    let foreign = record(&other, &recorder, TaskSpec::single(), 0)?;
    let err = sched.spawn(TaskSpec::single().after(&foreign), |_| {}).unwrap_err();
    assert_eq!(err, SchedulerError::ForeignDependency(foreign.id()));
    assert_eq!(sched.when_all([&foreign]).unwrap_err(), SchedulerError::ForeignDependency(foreign.id()));
    assert_eq!(sched.pending(), 0);

    // Both schedulers still terminate, and local dependencies still work.
    let own = record(&sched, &recorder, TaskSpec::single(), 1)?;
    record(&sched, &recorder, TaskSpec::single().after(&own), 2)?;

    other.execute()?;
    sched.execute()?;

    assert_eq!(other.pending(), 0);
    assert_eq!(sched.pending(), 0);
    assert_eq!(recorder.total(), 3);
    assert!(recorder.first(1) < recorder.first(2));
    Ok(())
}

#[test]
fn test_priority_then_fifo() -> Result<()> {
    let sched = test_utils::scheduler(1)?;
    let recorder = Recorder::new();

    record(&sched, &recorder, TaskSpec::single().priority(Priority::LOW), 0)?;
    record(&sched, &recorder, TaskSpec::team(), 1)?;
    record(&sched, &recorder, TaskSpec::single(), 2)?;
    record(&sched, &recorder, TaskSpec::single().priority(Priority::HIGH), 3)?;
    record(&sched, &recorder, TaskSpec::single(), 4)?;
    record(&sched, &recorder, TaskSpec::single().priority(Priority::HIGH), 5)?;

    sched.execute()?;

    assert_eq!(recorder.order(), vec![3, 5, 2, 4, 1, 0]);
    Ok(())
}

#[test]
fn test_outputs_flow_through_dependencies() -> Result<()> {
    let sched = test_utils::scheduler(1)?;

    let a = sched.spawn(TaskSpec::single(), |_| 20u64)?;
    let b = sched.spawn(TaskSpec::single(), |_| 22u64)?;

    let inputs = [a.clone(), b.clone()];
    let sum = sched.spawn(TaskSpec::single().after_all(&inputs), move |_| {
        inputs.iter().map(|f| *f.get().unwrap()).sum::<u64>()
    })?;

    assert_eq!(sum.get(), None);
    sched.execute()?;

    assert_eq!(a.get(), Some(&20));
    assert_eq!(sum.get(), Some(&42));
    Ok(())
}

#[test]
fn test_respawn_delays_dependents() -> Result<()> {
    let sched = test_utils::scheduler(1)?;
    let recorder = Recorder::new();

    let parent = {
        let recorder = recorder.clone();
        sched.spawn(TaskSpec::single(), move |cx| {
            recorder.record(0);

            let recorder = recorder.clone();
            cx.respawn(TaskSpec::single().priority(Priority::LOW), move |_| {
                recorder.record(1);
            })
            .unwrap();
        })?
    };
    record(&sched, &recorder, TaskSpec::single().priority(Priority::HIGH).after(&parent), 2)?;

    sched.execute()?;

    assert_eq!(recorder.order(), vec![0, 1, 2]);
    assert!(parent.is_ready());
    Ok(())
}

#[test]
fn test_spawned_children_run_in_same_execute() -> Result<()> {
    let sched = test_utils::scheduler(1)?;
    let recorder = Recorder::new();
    let children = Arc::new(Mutex::new(Vec::new()));

    {
        let recorder = recorder.clone();
        let children = children.clone();
        sched.spawn(TaskSpec::single(), move |cx| {
            recorder.record(0);

            for label in 1..=3 {
                let recorder = recorder.clone();
                let child = cx.spawn(TaskSpec::single(), move |_| {
                    recorder.record(label);
                    label
                });
                children.lock().push(child.unwrap());
            }
        })?;
    }

    sched.execute()?;

    assert_eq!(recorder.order(), vec![0, 1, 2, 3]);
    let children = children.lock();
    assert_eq!(children.iter().map(|c| *c.get().unwrap()).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(sched.stats().spawned, 4);
    Ok(())
}

#[test]
fn test_context_describes_worker_and_task() -> Result<()> {
    let sched = test_utils::scheduler(1)?;

    let info = sched.spawn(TaskSpec::team().priority(Priority::LOW), |cx| {
        (
            cx.worker_index(),
            cx.concurrency(),
            cx.team_rank(),
            cx.team_size(),
            cx.scratch().len(),
            cx.kind(),
            cx.priority(),
            cx.task_id(),
        )
    })?;

    sched.execute()?;

    let &(worker, concurrency, rank, size, scratch, kind, priority, id) = info.get().unwrap();
    assert_eq!((worker, concurrency, rank, size), (0, 1, 0, 1));
    assert_eq!(scratch, 512);
    assert_eq!(kind, TaskKind::Team);
    assert_eq!(priority, Priority::LOW);
    assert_eq!(id, info.id());
    Ok(())
}

#[test]
fn test_scratch_is_reused_across_tasks() -> Result<()> {
    let sched = Scheduler::with_space(Serial::new(64));

    let first = sched.spawn(TaskSpec::single(), |cx| {
        let scratch = cx.scratch();
        scratch[0] = 42;
        scratch.len()
    })?;
    let second = sched.spawn(TaskSpec::single().after(&first), |cx| cx.scratch()[0])?;

    sched.execute()?;

    assert_eq!(first.get(), Some(&64));
    assert_eq!(second.get(), Some(&42));
    Ok(())
}

#[test]
fn test_continuation_on_own_task_is_rejected() -> Result<()> {
    let sched = test_utils::scheduler(1)?;
    let own: Arc<OnceLock<TaskFuture<()>>> = Arc::new(OnceLock::new());
    let result = Arc::new(Mutex::new(None));

    let future = {
        let own = own.clone();
        let result = result.clone();
        sched.spawn(TaskSpec::single(), move |cx| {
            let own = own.get().unwrap();
            let res = cx.respawn(TaskSpec::single().after(own), |_| {});
            *result.lock() = Some(res.map(|_| ()));
        })?
    };
    own.set(future.clone()).unwrap();

    sched.execute()?;

    assert_eq!(*result.lock(), Some(Err(SchedulerError::SelfDependency)));
    assert!(future.is_ready());
    assert_eq!(sched.stats().spawned, 1);
    Ok(())
}

#[test]
fn test_when_all_orders_dependents() -> Result<()> {
    let sched = test_utils::scheduler(1)?;
    let recorder = Recorder::new();

    let inputs = vec![
        record(&sched, &recorder, TaskSpec::single().priority(Priority::LOW), 0)?,
        record(&sched, &recorder, TaskSpec::team(), 1)?,
    ];
    let all = sched.when_all(&inputs)?;
    record(&sched, &recorder, TaskSpec::single().priority(Priority::HIGH).after(&all), 2)?;

    sched.execute()?;

    assert_eq!(recorder.order(), vec![1, 0, 2]);
    assert!(all.is_ready());

    let stats = sched.stats();
    assert_eq!(stats.spawned, 4);
    assert_eq!(stats.completed, 4);
    assert_eq!(stats.applied, 3);
    Ok(())
}

#[test]
fn test_panic_poisons_scheduler() -> Result<()> {
    let sched = test_utils::scheduler(1)?;

    let bad = sched.spawn(TaskSpec::single(), |_| -> () { panic!("boom") })?;
    let after = sched.spawn(TaskSpec::single().after(&bad), |_| {})?;

    let err = sched.execute().unwrap_err();
    assert_eq!(
        err,
        SchedulerError::TaskPanicked {
            id: bad.id(),
            message: "boom".to_string()
        }
    );

    assert!(sched.is_poisoned());
    assert!(!after.is_ready());
    assert_eq!(sched.spawn(TaskSpec::single(), |_| {}).unwrap_err(), SchedulerError::Poisoned);
    assert_eq!(sched.execute().unwrap_err(), SchedulerError::Poisoned);
    Ok(())
}

#[test]
fn test_output_lives_as_long_as_its_future() -> Result<()> {
    let sched = test_utils::scheduler(1)?;
    let drops = Arc::new(AtomicUsize::new(0));

    let probe = {
        let drops = drops.clone();
        sched.spawn(TaskSpec::single(), move |_| DropProbe::new(&drops))?
    };
    sched.spawn(TaskSpec::single().after(&probe), |_| {})?;

    sched.execute()?;
    assert!(probe.get().is_some());
    assert_eq!(drops.load(Ordering::Relaxed), 0);

    drop(probe);
    assert_eq!(drops.load(Ordering::Relaxed), 1);

    let stats = sched.stats();
    assert_eq!(stats.destroyed, stats.spawned);
    Ok(())
}

#[test]
fn test_execute_can_be_repeated() -> Result<()> {
    let sched = test_utils::scheduler(1)?;
    let recorder = Recorder::new();

    // Nothing to do.
    sched.execute()?;

    let first = record(&sched, &recorder, TaskSpec::single(), 0)?;
    sched.execute()?;

    // A dependency completed in an earlier run is already satisfied.
    record(&sched, &recorder, TaskSpec::single().after(&first), 1)?;
    sched.execute()?;

    assert_eq!(recorder.order(), vec![0, 1]);
    assert_eq!(sched.pending(), 0);
    Ok(())
}

#[test]
fn test_nested_execute_is_rejected() -> Result<()> {
    let sched = Arc::new(test_utils::scheduler(1)?);

    let inner = sched.clone();
    let nested = sched.spawn(TaskSpec::single(), move |_| inner.execute())?;

    sched.execute()?;

    assert_eq!(nested.get(), Some(&Err(SchedulerError::AlreadyExecuting)));
    Ok(())
}
