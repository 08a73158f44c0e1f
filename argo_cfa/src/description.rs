//! A serializable, name-based description of a control-flow automaton.
//!
//! Locations are referred to by name within their function. Every function implicitly has the
//! locations `entry` and `exit`.

use crate::{Cfa, CfaBuilder, CfaError, CfaNodeId, Expr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfaDescription {
    #[serde(default = "default_main")]
    pub main: String,
    pub functions: Vec<FunctionDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescription {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    #[serde(default)]
    pub error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub action: EdgeAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeAction {
    Blank,
    Assign {
        var: String,
        expr: Expr,
    },
    Assume {
        expr: Expr,
        #[serde(default = "default_truth")]
        truth: bool,
    },
    /// `from` is the call site and `to` the return site
    Call { callee: String },
}

fn default_main() -> String {
    "main".to_string()
}

fn default_truth() -> bool {
    true
}

impl CfaDescription {
    pub fn build(&self) -> Result<Cfa, CfaError> {
        let mut builder = CfaBuilder::new();
        let mut names: HashMap<(&str, &str), CfaNodeId> = HashMap::new();
        for function in &self.functions {
            let info = builder.add_function(&function.name)?;
            names.insert((function.name.as_str(), "entry"), info.entry);
            names.insert((function.name.as_str(), "exit"), info.exit);
        }
        for function in &self.functions {
            for node in &function.nodes {
                let id = builder.add_node(&function.name)?;
                if node.error {
                    builder.mark_error(id)?;
                }
                names.insert((function.name.as_str(), node.name.as_str()), id);
            }
        }
        for function in &self.functions {
            let lookup = |node: &str| {
                names
                    .get(&(function.name.as_str(), node))
                    .copied()
                    .ok_or_else(|| CfaError::UnknownNodeName {
                        function: function.name.clone(),
                        node: node.to_string(),
                    })
            };
            for edge in &function.edges {
                let from = lookup(edge.from.as_str())?;
                let to = lookup(edge.to.as_str())?;
                match &edge.action {
                    EdgeAction::Blank => {
                        builder.blank(from, to)?;
                    }
                    EdgeAction::Assign { var, expr } => {
                        builder.assign(from, to, var, expr.clone())?;
                    }
                    EdgeAction::Assume { expr, truth } => {
                        builder.assume(from, to, expr.clone(), *truth)?;
                    }
                    EdgeAction::Call { callee } => {
                        builder.call(from, to, callee)?;
                    }
                }
            }
        }
        builder.build(&self.main)
    }
}
