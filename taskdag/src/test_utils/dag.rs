use crate::task::NUM_PRIORITY_LEVELS;
use crate::test_utils::Recorder;
use crate::{Priority, Scheduler, TaskContext, TaskFuture, TaskKind, TaskSpec};
use anyhow::Result;

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) priority: Priority,
    pub(crate) kind: TaskKind,

    /// Indices of earlier nodes.
    pub(crate) deps: Vec<usize>,

    /// Continuations respawned by the payload, and by each continuation in
    /// turn until `depth` is exhausted.
    pub(crate) fanout: usize,
    pub(crate) depth: usize,
}

impl Node {
    /// Payload runs: the node itself plus every continuation of its tree.
    pub(crate) fn expected_runs(&self) -> usize {
        (1..=self.depth).map(|d| self.fanout.pow(d as u32)).sum::<usize>() + 1
    }
}

/// A random task graph. Edges only point to earlier nodes, so it is acyclic.
#[derive(Debug, Clone)]
pub(crate) struct RandomDag {
    pub(crate) nodes: Vec<Node>,
}

impl RandomDag {
    pub(crate) fn generate(seed: u64, len: usize, max_deps: usize, respawn: bool) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);

        let nodes = (0..len)
            .map(|i| {
                let num_deps = rng.usize(0..=max_deps.min(i));
                let mut deps: Vec<usize> = (0..num_deps).map(|_| rng.usize(0..i)).collect();
                deps.sort_unstable();
                deps.dedup();

                let (fanout, depth) = match respawn && rng.u8(0..4) == 0 {
                    true => (rng.usize(1..=2), rng.usize(1..=2)),
                    false => (0, 0),
                };

                Node {
                    priority: Priority::from_index(rng.usize(0..NUM_PRIORITY_LEVELS)),
                    kind: if rng.bool() { TaskKind::Single } else { TaskKind::Team },
                    deps,
                    fanout,
                    depth,
                }
            })
            .collect();

        RandomDag { nodes }
    }

    /// Spawns every node in index order. Each payload records its label and
    /// returns its label plus the outputs of its dependencies, so any two runs
    /// of the same graph produce the same outputs.
    pub(crate) fn spawn(&self, sched: &Scheduler, recorder: &Recorder) -> Result<Vec<TaskFuture<u64>>> {
        let mut futures: Vec<TaskFuture<u64>> = Vec::with_capacity(self.nodes.len());

        for (label, node) in self.nodes.iter().enumerate() {
            let spec = match node.kind {
                TaskKind::Single => TaskSpec::single(),
                TaskKind::Team => TaskSpec::team(),
            };
            let spec = node.deps.iter().fold(spec.priority(node.priority), |spec, &dep| spec.after(&futures[dep]));

            let inputs: Vec<TaskFuture<u64>> = node.deps.iter().map(|&dep| futures[dep].clone()).collect();
            let recorder = recorder.clone();
            let (fanout, depth) = (node.fanout, node.depth);

            let future = sched.spawn(spec, move |cx| {
                recorder.record(label);
                respawn_tree(cx, &recorder, label, fanout, depth);

                inputs.iter().fold(label as u64, |acc, input| {
                    acc.wrapping_mul(31).wrapping_add(*input.get().expect("dependency output not ready"))
                })
            })?;

            futures.push(future);
        }

        Ok(futures)
    }

    /// Every node ran once along with its continuations, and only after each
    /// of its dependencies and their continuations ran.
    pub(crate) fn verify(&self, recorder: &Recorder) {
        for (label, node) in self.nodes.iter().enumerate() {
            assert_eq!(recorder.runs(label), node.expected_runs(), "node {} run count", label);

            let first = recorder.first(label).unwrap();
            for &dep in &node.deps {
                let dep_last = recorder.last(dep).unwrap();
                assert!(dep_last < first, "node {} ran before its dependency {} completed", label, dep);
            }
        }
    }
}

fn respawn_tree(cx: &mut TaskContext<'_>, recorder: &Recorder, label: usize, fanout: usize, depth: usize) {
    if depth == 0 {
        return;
    }

    for _ in 0..fanout {
        let recorder = recorder.clone();
        let spec = TaskSpec::single().priority(cx.priority());

        cx.respawn(spec, move |cx| {
            recorder.record(label);
            respawn_tree(cx, &recorder, label, fanout, depth - 1);
        })
        .unwrap();
    }
}
