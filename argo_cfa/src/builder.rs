use crate::{
    Cfa, CfaEdge, CfaEdgeId, CfaError, CfaNode, CfaNodeId, EdgeKind, Expr, FunctionInfo,
    Identifier, ident,
};
use petgraph::prelude::DiGraph;
use std::collections::BTreeMap;

/// Incrementally assembles a [`Cfa`].
///
/// Node and edge ids are handed out densely in insertion order, so the ids returned by the
/// builder are the ids the finished automaton uses.
#[derive(Debug, Default)]
pub struct CfaBuilder {
    graph: DiGraph<CfaNode, CfaEdge>,
    functions: BTreeMap<Identifier, FunctionInfo>,
}

impl CfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a function, creating its entry and exit locations.
    pub fn add_function<S: AsRef<str>>(&mut self, name: S) -> Result<FunctionInfo, CfaError> {
        let name = ident(name);
        if self.functions.contains_key(&name) {
            return Err(CfaError::DuplicateFunction(name.to_string()));
        }
        let entry = self.push_node(name);
        let exit = self.push_node(name);
        let info = FunctionInfo { name, entry, exit };
        self.functions.insert(name, info);
        Ok(info)
    }

    /// Add a fresh location to an already declared function.
    pub fn add_node<S: AsRef<str>>(&mut self, function: S) -> Result<CfaNodeId, CfaError> {
        let info = self.function(function.as_ref())?;
        Ok(self.push_node(info.name))
    }

    pub fn mark_error(&mut self, node: CfaNodeId) -> Result<(), CfaError> {
        let weight = self
            .graph
            .node_weight_mut(node.index())
            .ok_or(CfaError::UnknownNode(node))?;
        weight.is_error = true;
        Ok(())
    }

    pub fn blank(&mut self, from: CfaNodeId, to: CfaNodeId) -> Result<CfaEdgeId, CfaError> {
        self.add_edge(from, to, EdgeKind::Blank)
    }

    pub fn assign<S: AsRef<str>>(
        &mut self,
        from: CfaNodeId,
        to: CfaNodeId,
        var: S,
        expr: Expr,
    ) -> Result<CfaEdgeId, CfaError> {
        let var = ident(var);
        self.add_edge(from, to, EdgeKind::Assign { var, expr })
    }

    pub fn assume(
        &mut self,
        from: CfaNodeId,
        to: CfaNodeId,
        expr: Expr,
        truth: bool,
    ) -> Result<CfaEdgeId, CfaError> {
        self.add_edge(from, to, EdgeKind::Assume { expr, truth })
    }

    /// Add a call from `call_site` into `callee`, resuming at `return_site`.
    ///
    /// Creates both the call edge (into the callee's entry) and the matching return edge (from
    /// the callee's exit).
    pub fn call<S: AsRef<str>>(
        &mut self,
        call_site: CfaNodeId,
        return_site: CfaNodeId,
        callee: S,
    ) -> Result<(CfaEdgeId, CfaEdgeId), CfaError> {
        let callee = self.function(callee.as_ref())?;
        let caller = self.node_function(call_site)?;
        if caller != self.node_function(return_site)? {
            return Err(CfaError::CrossFunctionEdge {
                from: call_site,
                to: return_site,
            });
        }
        let call = self.push_edge(
            call_site,
            callee.entry,
            EdgeKind::FunctionCall {
                callee: callee.name,
                return_site,
            },
        );
        let ret = self.push_edge(
            callee.exit,
            return_site,
            EdgeKind::FunctionReturn {
                callee: callee.name,
            },
        );
        Ok((call, ret))
    }

    pub fn build<S: AsRef<str>>(self, main: S) -> Result<Cfa, CfaError> {
        let main = self.function(main.as_ref())?.name;
        Ok(Cfa::new(self.graph, self.functions, main))
    }

    pub(crate) fn function(&self, name: &str) -> Result<FunctionInfo, CfaError> {
        self.functions
            .get(&ident(name))
            .copied()
            .ok_or_else(|| CfaError::UnknownFunction(name.to_string()))
    }

    fn add_edge(
        &mut self,
        from: CfaNodeId,
        to: CfaNodeId,
        kind: EdgeKind,
    ) -> Result<CfaEdgeId, CfaError> {
        let function = self.node_function(from)?;
        if function != self.node_function(to)? {
            return Err(CfaError::CrossFunctionEdge { from, to });
        }
        if self.functions[&function].exit == from {
            return Err(CfaError::EdgeFromExit(from));
        }
        Ok(self.push_edge(from, to, kind))
    }

    fn node_function(&self, node: CfaNodeId) -> Result<Identifier, CfaError> {
        self.graph
            .node_weight(node.index())
            .map(|n| n.function)
            .ok_or(CfaError::UnknownNode(node))
    }

    fn push_node(&mut self, function: Identifier) -> CfaNodeId {
        let id = CfaNodeId(self.graph.node_count() as u32);
        let idx = self.graph.add_node(CfaNode {
            id,
            function,
            is_error: false,
        });
        debug_assert_eq!(idx, id.index());
        id
    }

    fn push_edge(&mut self, source: CfaNodeId, target: CfaNodeId, kind: EdgeKind) -> CfaEdgeId {
        let id = CfaEdgeId(self.graph.edge_count() as u32);
        let idx = self.graph.add_edge(
            source.index(),
            target.index(),
            CfaEdge {
                id,
                source,
                target,
                kind,
            },
        );
        debug_assert_eq!(idx, id.index());
        id
    }
}

#[cfg(test)]
mod tests {
    use crate::{CfaBuilder, CfaError, CfaNodeId, EdgeKind, Expr};

    #[test]
    fn rejects_duplicate_functions() {
        let mut b = CfaBuilder::new();
        b.add_function("f").unwrap();
        assert_eq!(
            b.add_function("f"),
            Err(CfaError::DuplicateFunction("f".to_string()))
        );
    }

    #[test]
    fn rejects_edges_across_functions() {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let f = b.add_function("f").unwrap();
        assert_eq!(
            b.blank(main.entry, f.entry),
            Err(CfaError::CrossFunctionEdge {
                from: main.entry,
                to: f.entry
            })
        );
        assert_eq!(
            b.blank(main.exit, main.entry),
            Err(CfaError::EdgeFromExit(main.exit))
        );
        assert_eq!(
            b.blank(main.entry, CfaNodeId(42)),
            Err(CfaError::UnknownNode(CfaNodeId(42)))
        );
    }

    #[test]
    fn calls_create_call_and_return_edges() {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let f = b.add_function("f").unwrap();
        b.assign(f.entry, f.exit, "x", Expr::constant(1)).unwrap();
        let ret = b.add_node("main").unwrap();
        let (call, back) = b.call(main.entry, ret, "f").unwrap();
        b.blank(ret, main.exit).unwrap();
        let cfa = b.build("main").unwrap();

        let call = cfa.edge(call).unwrap();
        assert_eq!(call.target, f.entry);
        assert!(matches!(call.kind, EdgeKind::FunctionCall { return_site, .. } if return_site == ret));
        let back = cfa.edge(back).unwrap();
        assert_eq!((back.source, back.target), (f.exit, ret));
        assert!(back.kind.is_interprocedural());
        assert_eq!(cfa.function("f").unwrap().entry, f.entry);
    }

    #[test]
    fn build_requires_known_main() {
        let b = CfaBuilder::new();
        assert!(matches!(b.build("main"), Err(CfaError::UnknownFunction(_))));
    }
}
