//! Abstract Syntax Tree types for templates

/// Literal values written directly in markup
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
}

/// One step of a variable path
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// `.name` or `["name"]`
    Field(String),
    /// `[3]`, negative counts from the end
    Index(i64),
}

/// Binary operators, comparison and logical
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Variable lookup, first segment is always a field
    Path(Vec<PathSegment>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// A filter application: `| name: arg, arg`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
}

/// An expression followed by its filters
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub expr: Expr,
    pub filters: Vec<FilterCall>,
}

/// One `if`/`elsif` arm
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Node>,
}

/// A node of a parsed template
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text
    Text(String),
    /// `{{ expr | filters }}`
    Output(Output),
    /// `{% if %}` ... `{% elsif %}` ... `{% else %}` ... `{% endif %}`
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    /// `{% for var in iterable %}` ... `{% endfor %}`
    For {
        variable: String,
        iterable: Expr,
        body: Vec<Node>,
    },
    /// `{% liquefy expr %}` renders an object with its own template
    Liquefy(Output),
}

/// A parsed template, ready for execution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub nodes: Vec<Node>,
}

impl Template {
    /// Number of nodes, nested ones included
    pub fn node_count(&self) -> usize {
        count_nodes(&self.nodes)
    }
}

fn count_nodes(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| {
            1 + match node {
                Node::If {
                    branches,
                    otherwise,
                } => {
                    branches.iter().map(|b| count_nodes(&b.body)).sum::<usize>()
                        + otherwise.as_deref().map(count_nodes).unwrap_or(0)
                }
                Node::For { body, .. } => count_nodes(body),
                _ => 0,
            }
        })
        .sum()
}
