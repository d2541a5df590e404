//! Arena-backed syntax tree.
//!
//! Nodes refer to each other by [`NodeId`]; the parent link is a plain id so
//! the tree never owns upward. Ids are stable for the life of a compilation,
//! which is what lets the relaxation loop rewrite an operand's mode in place and
//! have the next code-generation pass see it.

use std::cell::Cell;

use serde::Serialize;

use crate::addressing::{AddressingMode, IndexRegister, Register, Size};
use crate::symbols::{ScopeId, SymbolTable};
use crate::token::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Org,
    Dc,
    Ds,
    Even,
}

impl DirectiveKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "org" => Some(DirectiveKind::Org),
            "dc" => Some(DirectiveKind::Dc),
            "ds" => Some(DirectiveKind::Ds),
            "even" => Some(DirectiveKind::Even),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: String,
    pub size: Option<Size>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub size: Option<Size>,
}

/// One instruction operand. Only the mode is mutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    mode: Cell<AddressingMode>,
    pub pinned: bool,
    pub base_value: Option<NodeId>,
    pub base_displacement: Option<NodeId>,
    pub index_register: Option<IndexRegister>,
    pub outer_displacement: Option<NodeId>,
}

impl Operand {
    pub fn new(mode: AddressingMode) -> Self {
        Self {
            mode: Cell::new(mode),
            pinned: false,
            base_value: None,
            base_displacement: None,
            index_register: None,
            outer_displacement: None,
        }
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode.get()
    }

    pub fn set_mode(&self, mode: AddressingMode) {
        self.mode.set(mode);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Statement,
    Label(String),
    Instruction(Instruction),
    Operand(Operand),
    Directive(Directive),
    Number(i64),
    Identifier(String),
    Register(Register),
    RegisterRange(Register, Register),
    RegisterList,
    Str(String),
    Comment(String),
    Binary(BinOp),
    Negate,
    CurrentAddress,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub region: Region,
}

/// The parts of a `Statement`, any of which may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementParts {
    pub label: Option<NodeId>,
    pub instruction: Option<NodeId>,
    pub directive: Option<NodeId>,
    pub comment: Option<NodeId>,
}

/// What an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub symbols: &'a SymbolTable,
    pub scope: ScopeId,
    /// Address of the statement being evaluated, the value of `*`.
    pub pc: i64,
}

#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
                region: Region::default(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Creates a node owning `children`; it is detached until [`attach`](Self::attach).
    pub fn push(&mut self, kind: NodeKind, region: Region, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        for child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes.push(Node {
            kind,
            parent: None,
            children,
            region,
        });
        id
    }

    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Creates a node and appends it to `parent`.
    pub fn add(&mut self, parent: NodeId, kind: NodeKind, region: Region) -> NodeId {
        let id = self.push(kind, region, Vec::new());
        self.attach(parent, id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn region(&self, id: NodeId) -> Region {
        self.nodes[id.0].region
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn statements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children(self.root())
            .iter()
            .copied()
            .filter(|&id| matches!(self.kind(id), NodeKind::Statement))
    }

    pub fn statement_parts(&self, statement: NodeId) -> StatementParts {
        let mut parts = StatementParts::default();
        for &child in self.children(statement) {
            match self.kind(child) {
                NodeKind::Label(_) => parts.label = Some(child),
                NodeKind::Instruction(_) => parts.instruction = Some(child),
                NodeKind::Directive(_) => parts.directive = Some(child),
                NodeKind::Comment(_) => parts.comment = Some(child),
                _ => {}
            }
        }
        parts
    }

    pub fn instruction(&self, id: NodeId) -> Option<&Instruction> {
        match self.kind(id) {
            NodeKind::Instruction(insn) => Some(insn),
            _ => None,
        }
    }

    pub fn operand(&self, id: NodeId) -> Option<&Operand> {
        match self.kind(id) {
            NodeKind::Operand(op) => Some(op),
            _ => None,
        }
    }

    /// Operand children of an instruction, in source order.
    pub fn operands(&self, instruction: NodeId) -> Vec<(NodeId, &Operand)> {
        self.children(instruction)
            .iter()
            .filter_map(|&id| self.operand(id).map(|op| (id, op)))
            .collect()
    }

    pub fn register(&self, id: NodeId) -> Option<Register> {
        match self.kind(id) {
            NodeKind::Register(r) => Some(*r),
            _ => None,
        }
    }

    /// Base register of an operand, if its base is a register node.
    pub fn base_register(&self, operand: &Operand) -> Option<Register> {
        operand.base_value.and_then(|id| self.register(id))
    }

    /// MOVEM mask in d0 = bit 0 order for a register, range or list node.
    pub fn register_mask(&self, id: NodeId) -> Option<u16> {
        match self.kind(id) {
            NodeKind::Register(r) => r.mask_bit().map(|b| 1u16 << b),
            NodeKind::RegisterRange(from, to) => {
                let (lo, hi) = (from.mask_bit()?, to.mask_bit()?);
                let (lo, hi) = (lo.min(hi), lo.max(hi));
                Some((lo..=hi).fold(0u16, |m, b| m | (1 << b)))
            }
            NodeKind::RegisterList => self
                .children(id)
                .iter()
                .try_fold(0u16, |m, &child| Some(m | self.register_mask(child)?)),
            _ => None,
        }
    }

    /// Value of an expression node, `None` while any part is unresolved.
    pub fn get_bits(&self, id: NodeId, cx: &EvalContext<'_>) -> Option<i64> {
        match self.kind(id) {
            NodeKind::Number(n) => Some(*n),
            NodeKind::Identifier(name) => cx.symbols.lookup(cx.scope, name)?.value,
            NodeKind::CurrentAddress => Some(cx.pc),
            NodeKind::Negate => self.get_bits(self.children(id)[0], cx)?.checked_neg(),
            NodeKind::Binary(op) => {
                let children = self.children(id);
                let lhs = self.get_bits(children[0], cx)?;
                let rhs = self.get_bits(children[1], cx)?;
                match op {
                    BinOp::Add => lhs.checked_add(rhs),
                    BinOp::Sub => lhs.checked_sub(rhs),
                    BinOp::Mul => lhs.checked_mul(rhs),
                    BinOp::Div => lhs.checked_div(rhs),
                }
            }
            _ => None,
        }
    }

    /// Identifier nodes under `id` that do not resolve to a value.
    pub fn unresolved(&self, id: NodeId, cx: &EvalContext<'_>) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_unresolved(id, cx, &mut out);
        out
    }

    fn collect_unresolved(&self, id: NodeId, cx: &EvalContext<'_>, out: &mut Vec<NodeId>) {
        if let NodeKind::Identifier(name) = self.kind(id) {
            let defined = cx
                .symbols
                .lookup(cx.scope, name)
                .is_some_and(|s| s.value.is_some());
            if !defined {
                out.push(id);
            }
            return;
        }
        for &child in self.children(id) {
            self.collect_unresolved(child, cx, out);
        }
    }

    /// Depth-first iteration over `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            out.extend_from_slice(self.children(out[i]));
            i += 1;
        }
        out
    }
}
