use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::domain::model::{FlowId, FlowStep, FlowStepDto, StepKind};
use crate::error::FlowError;

use super::types::*;

/// 流程定义 - 配置后的不可变图结构
#[derive(Debug)]
pub struct FlowDefinition {
    /// 流程 ID
    pub flow_id: FlowId,

    /// 图结构
    pub graph: StableDiGraph<FlowStep, EdgeKind>,

    /// START 节点索引
    pub start_idx: NodeIndex,

    /// 步骤 ID 到 NodeIndex 的映射
    pub node_index_map: StepIndexMap,
}

impl FlowDefinition {
    /// 根据步骤 ID 获取步骤
    pub fn get_step(&self, step_id: &str) -> Option<&FlowStep> {
        let idx = self.node_index_map.get(step_id)?;
        self.graph.node_weight(*idx)
    }

    pub fn start_step(&self) -> Option<&FlowStep> {
        self.graph.node_weight(self.start_idx)
    }

    /// 获取从某步骤出发的特定类型的边的目标步骤 ID
    pub fn successor(&self, step_id: &str, kind: EdgeKind) -> Option<&str> {
        let idx = self.node_index_map.get(step_id)?;
        self.graph
            .edges_directed(*idx, Direction::Outgoing)
            .find(|edge| *edge.weight() == kind)
            .and_then(|edge| self.graph.node_weight(edge.target()))
            .map(FlowStep::id)
    }

    pub fn steps(&self) -> impl Iterator<Item = &FlowStep> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// ENDPOINT steps without outgoing edges
    pub fn terminal_indices(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|idx| {
                self.graph
                    .node_weight(*idx)
                    .map(|s| *s.kind() == StepKind::Endpoint && s.is_terminal())
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// 从步骤列表构建流程定义
///
/// Requires exactly one START step and that every successor id names a step
/// in `steps`. The remaining invariants are checked by
/// [`validate_steps`](super::validate_steps).
pub fn build_definition(flow_id: FlowId, steps: &[FlowStepDto]) -> Result<FlowDefinition, FlowError> {
    let mut graph = StableDiGraph::<FlowStep, EdgeKind>::new();
    let mut node_index_map: HashMap<String, NodeIndex> = HashMap::new();

    // 1. 添加所有节点
    for dto in steps {
        let idx = graph.add_node(FlowStep::from(dto));
        if node_index_map.insert(dto.id.clone(), idx).is_some() {
            return Err(FlowError::DuplicateStepId(dto.id.clone()));
        }
    }

    // 2. 添加所有边
    for dto in steps {
        let source = node_index_map[&dto.id];
        let edges = [
            (dto.next_true(), EdgeKind::IfTrue),
            (dto.next_false(), EdgeKind::IfFalse),
        ];
        for (target, kind) in edges {
            let Some(target) = target else { continue };
            let target_idx = node_index_map.get(target).ok_or_else(|| {
                FlowError::invalid_step(&dto.id, format!("successor '{}' does not exist", target))
            })?;
            graph.add_edge(source, *target_idx, kind);
        }
    }

    // 3. 查找 START 节点
    let starts: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|idx| graph.node_weight(*idx).map(|s| *s.kind() == StepKind::Start).unwrap_or(false))
        .collect();
    let start_idx = match starts.as_slice() {
        [only] => *only,
        other => return Err(FlowError::StartCardinality(other.len())),
    };

    Ok(FlowDefinition {
        flow_id,
        graph,
        start_idx,
        node_index_map,
    })
}
