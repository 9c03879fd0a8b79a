use crate::ast::{AstVisitor, Expr, ExprKind, Script};
use crate::deps::DependencyGraph;

/// Walker that records dependency edges while a compilation runs.
///
/// Every `~proc` call and command reference inside a script body becomes an
/// edge from the enclosing script's full name to the referenced key.
pub struct DependencyTreeBuilder<'a> {
    graph: &'a mut DependencyGraph<String>,
    current: Option<String>,
}

impl<'a> DependencyTreeBuilder<'a> {
    pub fn new(graph: &'a mut DependencyGraph<String>) -> Self {
        Self {
            graph,
            current: None,
        }
    }
}

impl AstVisitor for DependencyTreeBuilder<'_> {
    fn enter_script(&mut self, script: &Script) {
        self.current = Some(script.full_name());
    }

    fn enter_expr(&mut self, expr: &Expr) {
        let Some(current) = self.current.clone() else {
            return;
        };
        match &expr.kind {
            ExprKind::Gosub { name, .. } => {
                self.graph
                    .add_dependency(current, format!("[proc,{}]", name.text));
            }
            ExprKind::Command { name, .. } => {
                self.graph.add_dependency(current, name.text.clone());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::walk_script;
    use crate::lexer::{runescript_table, Lexer};
    use crate::parser::Parser;

    #[test]
    fn test_edges_are_recorded() {
        let table = runescript_table();
        let source = "[proc,bar]() ~foo(1); mes(\"hi\");";
        let (tokens, _) = Lexer::new(&table, source).tokenize();
        let (scripts, diagnostics) = Parser::new(&tokens).parse_file();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let mut graph = DependencyGraph::new();
        let mut builder = DependencyTreeBuilder::new(&mut graph);
        for script in &scripts {
            walk_script(&mut builder, script);
        }
        let node = graph.find(&"[proc,bar]".to_string()).unwrap();
        assert!(node.depends_on().contains("[proc,foo]"));
        assert!(node.depends_on().contains("mes"));
        let used = graph.find(&"[proc,foo]".to_string()).unwrap();
        assert!(used.used_by().contains("[proc,bar]"));
    }
}
