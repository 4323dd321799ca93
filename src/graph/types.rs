use petgraph::stable_graph::NodeIndex;

/// 边类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// `nextIfTrue`: START 的唯一出边，ENDPOINT 成功，BRANCH 条件为真
    IfTrue,
    /// `nextIfFalse`: ENDPOINT 失败，BRANCH 条件为假
    IfFalse,
}

/// 步骤 ID 到 petgraph NodeIndex 的映射
pub type StepIndexMap = std::collections::HashMap<String, NodeIndex>;
