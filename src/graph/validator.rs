use std::collections::{HashSet, VecDeque};

use petgraph::Direction;

use crate::domain::model::{Directives, EndpointId, FlowStepDto, StepKind};
use crate::error::FlowError;
use crate::evaluator::parse_expression;

use super::builder::{build_definition, FlowDefinition};

/// 验证流程步骤的合法性
///
/// Checks, in order: exactly one START, unique ids, per-step structure (fails
/// on the first offending step, in submission order), and that every step can
/// reach a terminal ENDPOINT.
pub fn validate_steps(
    steps: &[FlowStepDto],
    endpoint_exists: impl Fn(EndpointId) -> bool,
) -> Result<(), FlowError> {
    // 1. START 唯一性
    let start_count = steps.iter().filter(|s| s.kind == StepKind::Start).count();
    if start_count != 1 {
        return Err(FlowError::StartCardinality(start_count));
    }
    let start_id = steps
        .iter()
        .find(|s| s.kind == StepKind::Start)
        .map(|s| s.id.as_str())
        .unwrap_or_default();

    // 2. ID 唯一性
    let mut ids = HashSet::with_capacity(steps.len());
    for step in steps {
        if step.id.trim().is_empty() {
            return Err(FlowError::invalid_step(&step.id, "step id must not be empty"));
        }
        if !ids.insert(step.id.as_str()) {
            return Err(FlowError::DuplicateStepId(step.id.clone()));
        }
    }

    // 3. 逐个步骤结构检查
    for step in steps {
        validate_step(step, start_id, &ids, &endpoint_exists)?;
    }

    // 4. 终止性检查
    let definition = build_definition(0, steps)?;
    check_termination(&definition, steps)
}

fn validate_step(
    step: &FlowStepDto,
    start_id: &str,
    ids: &HashSet<&str>,
    endpoint_exists: &impl Fn(EndpointId) -> bool,
) -> Result<(), FlowError> {
    let target_ok = |field: &str, target: &str| -> Result<(), FlowError> {
        if !ids.contains(target) {
            return Err(FlowError::invalid_step(
                &step.id,
                format!("{} '{}' does not exist", field, target),
            ));
        }
        if target == start_id {
            return Err(FlowError::invalid_step(
                &step.id,
                format!("{} cannot point to the START step", field),
            ));
        }
        Ok(())
    };

    match &step.kind {
        StepKind::Start => {
            if step.endpoint_id.is_some() {
                return Err(FlowError::invalid_step(&step.id, "START step must not reference an endpoint"));
            }
            let next = step
                .next_true()
                .ok_or_else(|| FlowError::invalid_step(&step.id, "START step requires nextIfTrue"))?;
            target_ok("nextIfTrue", next)?;
            if step.next_false().is_some() {
                return Err(FlowError::invalid_step(&step.id, "START step must not define nextIfFalse"));
            }
        }
        StepKind::Endpoint => {
            let endpoint_id = step
                .endpoint_id
                .ok_or_else(|| FlowError::invalid_step(&step.id, "ENDPOINT step requires endpointId"))?;
            if !endpoint_exists(endpoint_id) {
                return Err(FlowError::EndpointNotFound {
                    step_id: step.id.clone(),
                    endpoint_id,
                });
            }
            if let Some(next) = step.next_true() {
                target_ok("nextIfTrue", next)?;
            }
            if let Some(next) = step.next_false() {
                target_ok("nextIfFalse", next)?;
            }
        }
        StepKind::Branch => {
            let condition = step
                .condition
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| FlowError::invalid_step(&step.id, "Branch node must have a non-empty condition"))?;
            parse_expression(condition).map_err(|e| {
                FlowError::invalid_step(&step.id, format!("invalid condition: {}", e))
            })?;
            let if_true = step
                .next_true()
                .ok_or_else(|| FlowError::invalid_step(&step.id, "BRANCH step requires nextIfTrue"))?;
            let if_false = step
                .next_false()
                .ok_or_else(|| FlowError::invalid_step(&step.id, "BRANCH step requires nextIfFalse"))?;
            target_ok("nextIfTrue", if_true)?;
            target_ok("nextIfFalse", if_false)?;
        }
        StepKind::Unknown(tag) => {
            return Err(FlowError::invalid_step(&step.id, format!("unknown step type '{}'", tag)));
        }
    }

    for (field, processor) in [
        ("preProcessor", &step.pre_processor),
        ("postProcessor", &step.post_processor),
    ] {
        if let Some(value) = processor.as_ref().filter(|v| !v.is_null()) {
            Directives::parse(value)
                .map_err(|e| FlowError::invalid_step(&step.id, format!("{}: {}", field, e)))?;
        }
    }

    Ok(())
}

/// Every step must reach a terminal ENDPOINT.
///
/// Walks incoming edges from all terminals at once; whatever is not reached
/// cannot terminate.
fn check_termination(definition: &FlowDefinition, steps: &[FlowStepDto]) -> Result<(), FlowError> {
    let terminals = definition.terminal_indices();
    if terminals.is_empty() {
        return Err(FlowError::NoTerminalStep);
    }

    let graph = &definition.graph;
    let mut reached: HashSet<_> = terminals.iter().copied().collect();
    let mut queue: VecDeque<_> = terminals.into_iter().collect();
    while let Some(idx) = queue.pop_front() {
        for pred in graph.neighbors_directed(idx, Direction::Incoming) {
            if reached.insert(pred) {
                queue.push_back(pred);
            }
        }
    }

    for step in steps {
        let reaches_terminal = definition
            .node_index_map
            .get(&step.id)
            .map(|idx| reached.contains(idx))
            .unwrap_or(false);
        if !reaches_terminal {
            return Err(FlowError::NonTerminating {
                step_id: step.id.clone(),
            });
        }
    }
    Ok(())
}
