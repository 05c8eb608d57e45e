//! Python binding (feature `python`).

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::time::Duration;

use crate::config::{SearchConfig, SearchStrategy};
use crate::graph::Graph;
use crate::models::{EdgeSpec, TaskSpec};
use crate::search::SchedulerError;

/// One placed task.
#[pyclass(name = "ScheduledTask")]
#[derive(Clone, Debug)]
pub struct PyScheduledTask {
    #[pyo3(get)]
    pub label: String,
    #[pyo3(get)]
    pub processor: usize,
    #[pyo3(get)]
    pub start: u64,
    #[pyo3(get)]
    pub finish: u64,
}

#[pymethods]
impl PyScheduledTask {
    fn __repr__(&self) -> String {
        format!(
            "ScheduledTask(label={:?}, processor={}, start={}, finish={})",
            self.label, self.processor, self.start, self.finish
        )
    }
}

/// Result of `schedule_graph`.
#[pyclass(name = "ScheduleResult")]
#[derive(Clone, Debug)]
pub struct PyScheduleResult {
    #[pyo3(get)]
    pub makespan: u64,
    /// Placements, processor by processor in start order
    #[pyo3(get)]
    pub tasks: Vec<PyScheduledTask>,
    #[pyo3(get)]
    pub strategy: String,
    #[pyo3(get)]
    pub expanded: u64,
}

#[pymethods]
impl PyScheduleResult {
    fn __repr__(&self) -> String {
        format!(
            "ScheduleResult(makespan={}, tasks={}, strategy={:?})",
            self.makespan,
            self.tasks.len(),
            self.strategy
        )
    }
}

fn to_py_err(err: SchedulerError) -> PyErr {
    match err {
        SchedulerError::InvalidGraph(_) | SchedulerError::InvalidConfiguration(_) => {
            PyValueError::new_err(err.to_string())
        }
        SchedulerError::PrecedenceViolation(_) | SchedulerError::SearchExhausted { .. } => {
            PyRuntimeError::new_err(err.to_string())
        }
    }
}

/// Compute a minimum-makespan schedule.
///
/// # Arguments
/// * `tasks` - (label, cost) pairs
/// * `edges` - (source, destination, communication cost) triples
/// * `processor_count` - Number of identical processors
/// * `parallelism` - Worker threads for the search
/// * `strategy` - "auto", "astar" or "branch_and_bound"
/// * `time_limit_ms` - Optional wall-clock budget
///
/// # Raises
/// * ValueError on an invalid graph or configuration
/// * RuntimeError if the budget runs out before optimality is proven
#[pyfunction]
#[pyo3(signature = (tasks, edges, processor_count, parallelism=1, strategy="auto", time_limit_ms=None))]
fn schedule_graph(
    py: Python<'_>,
    tasks: Vec<(String, u64)>,
    edges: Vec<(String, String, u64)>,
    processor_count: usize,
    parallelism: usize,
    strategy: &str,
    time_limit_ms: Option<u64>,
) -> PyResult<PyScheduleResult> {
    let strategy: SearchStrategy = strategy.parse().map_err(PyValueError::new_err)?;
    let tasks: Vec<TaskSpec> = tasks
        .into_iter()
        .map(|(label, cost)| TaskSpec::new(label, cost))
        .collect();
    let edges: Vec<EdgeSpec> = edges
        .into_iter()
        .map(|(source, destination, cost)| EdgeSpec::new(source, destination, cost))
        .collect();

    let graph = Graph::build(&tasks, &edges)
        .map_err(|e| to_py_err(SchedulerError::InvalidGraph(e)))?;
    let mut config = SearchConfig::new(processor_count)
        .with_parallelism(parallelism)
        .with_strategy(strategy);
    config.time_limit = time_limit_ms.map(Duration::from_millis);

    let outcome = py
        .allow_threads(|| crate::schedule(&graph, &config))
        .map_err(to_py_err)?;

    Ok(PyScheduleResult {
        makespan: outcome.schedule.makespan,
        tasks: outcome
            .schedule
            .iter()
            .map(|t| PyScheduledTask {
                label: t.label.clone(),
                processor: t.processor,
                start: t.start,
                finish: t.finish,
            })
            .collect(),
        strategy: outcome.stats.strategy.to_string(),
        expanded: outcome.stats.expanded,
    })
}

#[pymodule]
fn optsched_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyScheduledTask>()?;
    m.add_class::<PyScheduleResult>()?;
    m.add_function(wrap_pyfunction!(schedule_graph, m)?)?;
    Ok(())
}
