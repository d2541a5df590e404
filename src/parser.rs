//! Recursive-descent parser from tokens to an [`Ast`].
//!
//! Parsing stops at the first syntax error. Operands are classified into an
//! initial addressing mode here; forms with a narrower variant start wide and
//! are shrunk later by relaxation unless the source pinned them.

use crate::addressing::{AddressingMode, IndexRegister, Register, Size};
use crate::ast::{Ast, BinOp, Directive, DirectiveKind, Instruction, NodeId, NodeKind, Operand};
use crate::error::SyntaxError;
use crate::instructions::{branch_kind, BranchKind};
use crate::lexer::{self, parse_number, unescape};
use crate::token::{Region, Token, TokenKind};

type PResult<T> = Result<T, SyntaxError>;

pub fn parse(source: &str) -> PResult<Ast> {
    let tokens = lexer::tokenize(source)?;
    Parser::new(tokens).parse_program()
}

/// Mode a bare expression takes as a branch operand.
#[derive(Debug, Clone, Copy)]
struct BranchTarget {
    mode: AddressingMode,
    pinned: bool,
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    ast: Ast,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token<'a>>) -> Self {
        Self {
            tokens,
            pos: 0,
            ast: Ast::new(),
        }
    }

    fn peek(&self) -> Token<'a> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Token<'a> {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + n).min(last)]
    }

    fn bump(&mut self) -> Token<'a> {
        let tok = self.peek();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        if self.peek().kind == kind {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token<'a>> {
        self.eat(kind).ok_or_else(|| self.unexpected(kind.describe()))
    }

    fn unexpected(&self, wanted: &str) -> SyntaxError {
        let tok = self.peek();
        let found = match tok.kind {
            TokenKind::Newline | TokenKind::Eof => tok.kind.describe().to_string(),
            _ => format!("`{}`", tok.text),
        };
        SyntaxError::new(format!("expected {wanted}, found {found}"), tok.offset)
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].region().end()
        }
    }

    fn region_from(&self, start: usize) -> Region {
        Region::new(start, self.prev_end().saturating_sub(start))
    }

    fn at_line_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Comment | TokenKind::Eof
        )
    }

    fn parse_program(mut self) -> PResult<Ast> {
        let root = self.ast.root();
        loop {
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.bump();
                }
                _ => {
                    let stmt = self.parse_statement()?;
                    self.ast.attach(root, stmt);
                }
            }
        }
        Ok(self.ast)
    }

    fn parse_statement(&mut self) -> PResult<NodeId> {
        let start = self.peek().offset;
        let mut parts = Vec::new();

        if self.peek().kind == TokenKind::Identifier && self.peek_at(1).kind == TokenKind::Colon {
            let name = self.bump();
            self.bump();
            if Register::parse(name.text).is_some() {
                return Err(SyntaxError::new(
                    format!("register name `{}` cannot be a label", name.text),
                    name.offset,
                ));
            }
            parts.push(
                self.ast
                    .push(NodeKind::Label(name.text.to_string()), name.region(), Vec::new()),
            );
        }

        if self.peek().kind == TokenKind::Identifier {
            parts.push(self.parse_operation()?);
        }

        if let Some(tok) = self.eat(TokenKind::Comment) {
            let text = tok.text[1..].trim().to_string();
            parts.push(self.ast.push(NodeKind::Comment(text), tok.region(), Vec::new()));
        }

        let region = self.region_from(start);
        match self.peek().kind {
            TokenKind::Newline => {
                self.bump();
            }
            TokenKind::Eof => {}
            _ => return Err(self.unexpected("end of line")),
        }
        Ok(self.ast.push(NodeKind::Statement, region, parts))
    }

    fn parse_operation(&mut self) -> PResult<NodeId> {
        let tok = self.bump();
        let (base, suffix) = match tok.text.find('.') {
            Some(i) if i > 0 => (&tok.text[..i], Some(&tok.text[i + 1..])),
            _ => (tok.text, None),
        };
        let mnemonic = base.to_ascii_lowercase();

        if let Some(kind) = DirectiveKind::parse(&mnemonic) {
            let size = self.size_suffix(suffix, tok.offset + base.len(), false)?;
            return self.parse_directive(kind, size, tok.offset);
        }

        let branch = branch_kind(&mnemonic);
        let size = self.size_suffix(suffix, tok.offset + base.len(), branch == Some(BranchKind::Bcc))?;
        let target = branch.map(|kind| match (kind, size) {
            (BranchKind::DBcc, _) => BranchTarget {
                mode: AddressingMode::Relative16,
                pinned: true,
            },
            (BranchKind::Bcc, None) => BranchTarget {
                mode: AddressingMode::Relative16,
                pinned: false,
            },
            (BranchKind::Bcc, Some(size)) => BranchTarget {
                mode: match size {
                    Size::Byte => AddressingMode::Relative8,
                    Size::Word => AddressingMode::Relative16,
                    Size::Long => AddressingMode::Relative32,
                },
                pinned: true,
            },
        });

        let mut operands = Vec::new();
        if !self.at_line_end() {
            loop {
                operands.push(self.parse_operand(target)?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        // a branch's size suffix is carried by its displacement mode
        let size = if branch.is_some() { None } else { size };
        let region = self.region_from(tok.offset);
        Ok(self.ast.push(
            NodeKind::Instruction(Instruction { mnemonic, size }),
            region,
            operands,
        ))
    }

    fn size_suffix(&self, suffix: Option<&str>, offset: usize, short_ok: bool) -> PResult<Option<Size>> {
        let Some(s) = suffix else {
            return Ok(None);
        };
        if short_ok && s.eq_ignore_ascii_case("s") {
            return Ok(Some(Size::Byte));
        }
        Size::from_suffix(s)
            .map(Some)
            .ok_or_else(|| SyntaxError::new(format!("unknown size suffix `.{s}`"), offset))
    }

    fn parse_directive(&mut self, kind: DirectiveKind, size: Option<Size>, start: usize) -> PResult<NodeId> {
        let mut args = Vec::new();
        if !self.at_line_end() {
            loop {
                if let Some(tok) = self.eat(TokenKind::Str) {
                    if kind != DirectiveKind::Dc || size.unwrap_or(Size::Word) != Size::Byte {
                        return Err(SyntaxError::new("strings are only allowed in `dc.b`", tok.offset));
                    }
                    args.push(self.ast.push(NodeKind::Str(unescape(tok.text)), tok.region(), Vec::new()));
                } else {
                    args.push(self.parse_expr()?);
                }
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        let expected = match kind {
            DirectiveKind::Org | DirectiveKind::Ds => Some(1),
            DirectiveKind::Even => Some(0),
            DirectiveKind::Dc => None,
        };
        let count_ok = match expected {
            Some(n) => args.len() == n,
            None => !args.is_empty(),
        };
        if !count_ok {
            let what = match expected {
                Some(0) => "no arguments".to_string(),
                Some(n) => format!("{n} argument"),
                None => "at least one value".to_string(),
            };
            return Err(SyntaxError::new(format!("directive takes {what}"), start));
        }

        let region = self.region_from(start);
        Ok(self.ast.push(NodeKind::Directive(Directive { kind, size }), region, args))
    }

    // ---- operands ----

    fn finish_operand(&mut self, operand: Operand, start: usize, children: Vec<NodeId>) -> NodeId {
        let region = self.region_from(start);
        self.ast.push(NodeKind::Operand(operand), region, children)
    }

    fn register_node(&mut self, reg: Register, tok: Token<'a>) -> NodeId {
        self.ast.push(NodeKind::Register(reg), tok.region(), Vec::new())
    }

    fn peek_register(&self, n: usize) -> Option<Register> {
        let tok = self.peek_at(n);
        if tok.kind == TokenKind::Identifier {
            Register::parse(tok.text)
        } else {
            None
        }
    }

    fn parse_operand(&mut self, branch: Option<BranchTarget>) -> PResult<NodeId> {
        let start = self.peek().offset;
        match self.peek().kind {
            TokenKind::Hash => {
                self.bump();
                let value = self.parse_expr()?;
                let mut op = Operand::new(AddressingMode::Immediate);
                op.base_value = Some(value);
                Ok(self.finish_operand(op, start, vec![value]))
            }
            TokenKind::Minus
                if self.peek_at(1).kind == TokenKind::LParen
                    && matches!(self.peek_register(2), Some(Register::Address(_)))
                    && self.peek_at(3).kind == TokenKind::RParen =>
            {
                self.bump();
                self.bump();
                let tok = self.bump();
                let reg = self.register_node(Register::parse(tok.text).unwrap_or(Register::Address(0)), tok);
                self.bump();
                let mut op = Operand::new(AddressingMode::PreDecrement);
                op.base_value = Some(reg);
                Ok(self.finish_operand(op, start, vec![reg]))
            }
            TokenKind::Identifier if self.peek_register(0).is_some() => self.parse_register_operand(start),
            TokenKind::LParen => self.parse_paren_operand(start, branch),
            _ => {
                let value = self.parse_expr()?;
                self.parse_after_expression(value, start, branch)
            }
        }
    }

    fn parse_register_operand(&mut self, start: usize) -> PResult<NodeId> {
        let tok = self.peek();
        let reg = Register::parse(tok.text).unwrap_or(Register::Data(0));
        let is_list = matches!(reg, Register::Data(_) | Register::Address(_))
            && (self.peek_at(1).kind == TokenKind::Slash
                || (self.peek_at(1).kind == TokenKind::Minus && self.peek_register(2).is_some()));
        if is_list {
            return self.parse_register_list(start);
        }

        self.bump();
        let mode = match reg {
            Register::Data(_) => AddressingMode::DataRegisterDirect,
            Register::Address(_) => AddressingMode::AddressRegisterDirect,
            Register::Sr => AddressingMode::StatusRegister,
            Register::Ccr => AddressingMode::ConditionCodeRegister,
            Register::Usp => AddressingMode::UserStackPointer,
            Register::Pc => {
                return Err(SyntaxError::new("`pc` is only valid as a base register", tok.offset));
            }
        };
        let node = self.register_node(reg, tok);
        let mut op = Operand::new(mode);
        op.base_value = Some(node);
        Ok(self.finish_operand(op, start, vec![node]))
    }

    fn list_register(&mut self) -> PResult<(Register, Region)> {
        match self.peek_register(0) {
            Some(reg @ (Register::Data(_) | Register::Address(_))) => {
                let tok = self.bump();
                Ok((reg, tok.region()))
            }
            _ => Err(self.unexpected("data or address register")),
        }
    }

    fn parse_register_list(&mut self, start: usize) -> PResult<NodeId> {
        let mut items = Vec::new();
        loop {
            let (from, from_region) = self.list_register()?;
            let item = if self.eat(TokenKind::Minus).is_some() {
                let (to, to_region) = self.list_register()?;
                self.ast.push(
                    NodeKind::RegisterRange(from, to),
                    from_region.merge(to_region),
                    Vec::new(),
                )
            } else {
                self.ast.push(NodeKind::Register(from), from_region, Vec::new())
            };
            items.push(item);
            if self.eat(TokenKind::Slash).is_none() {
                break;
            }
        }
        let list = self.ast.push(NodeKind::RegisterList, self.region_from(start), items);
        let mut op = Operand::new(AddressingMode::RegisterList);
        op.base_value = Some(list);
        Ok(self.finish_operand(op, start, vec![list]))
    }

    /// An address register or `pc` used as a base.
    fn base_register(&mut self) -> PResult<(Register, NodeId)> {
        match self.peek_register(0) {
            Some(reg @ (Register::Address(_) | Register::Pc)) => {
                let tok = self.bump();
                Ok((reg, self.register_node(reg, tok)))
            }
            _ => Err(self.unexpected("address register or `pc`")),
        }
    }

    /// `Xn[.w|.l][*scale]`
    fn index_register(&mut self) -> PResult<IndexRegister> {
        let tok = self.peek();
        if tok.kind != TokenKind::Identifier {
            return Err(self.unexpected("index register"));
        }
        let (name, suffix) = match tok.text.find('.') {
            Some(i) => (&tok.text[..i], Some(&tok.text[i + 1..])),
            None => (tok.text, None),
        };
        let register = match Register::parse(name) {
            Some(r @ (Register::Data(_) | Register::Address(_))) => r,
            _ => return Err(self.unexpected("index register")),
        };
        let size = match suffix.map(|s| s.to_ascii_lowercase()) {
            None => Size::Word,
            Some(s) if s == "w" => Size::Word,
            Some(s) if s == "l" => Size::Long,
            Some(s) => {
                return Err(SyntaxError::new(
                    format!("index register size must be `.w` or `.l`, not `.{s}`"),
                    tok.offset,
                ))
            }
        };
        self.bump();

        let mut scale = 1;
        if self.eat(TokenKind::Star).is_some() {
            let tok = self.expect(TokenKind::Number)?;
            scale = match parse_number(tok.text) {
                Some(n @ (1 | 2 | 4 | 8)) => n as u8,
                _ => return Err(SyntaxError::new("index scale must be 1, 2, 4 or 8", tok.offset)),
            };
        }
        Ok(IndexRegister {
            register,
            size,
            scale,
        })
    }

    fn is_index_register_next(&self) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Identifier
            && matches!(
                Register::parse(tok.text.split('.').next().unwrap_or("")),
                Some(Register::Data(_) | Register::Address(_))
            )
    }

    /// Builds `(d,An)`, `(d,An,Xn)` and the PC-relative equivalents.
    fn indexed_operand(
        &mut self,
        start: usize,
        displacement: Option<NodeId>,
        base: (Register, NodeId),
        index: Option<IndexRegister>,
    ) -> NodeId {
        let (reg, base_node) = base;
        let pc = reg == Register::Pc;
        let mode = match (pc, index.is_some(), displacement.is_some()) {
            (false, false, _) => AddressingMode::Displacement,
            (false, true, true) => AddressingMode::Index,
            (false, true, false) => AddressingMode::Index8,
            (true, false, _) => AddressingMode::PcDisplacement,
            (true, true, true) => AddressingMode::PcIndex,
            (true, true, false) => AddressingMode::PcIndex8,
        };
        let mut op = Operand::new(mode);
        op.base_value = Some(base_node);
        op.base_displacement = displacement;
        op.index_register = index;
        let mut children = vec![base_node];
        children.extend(displacement);
        self.finish_operand(op, start, children)
    }

    fn parse_paren_operand(&mut self, start: usize, branch: Option<BranchTarget>) -> PResult<NodeId> {
        self.bump();
        if self.peek().kind == TokenKind::LBracket {
            return self.parse_memory_indirect(start);
        }

        if matches!(self.peek_register(0), Some(Register::Address(_) | Register::Pc)) {
            let base = self.base_register()?;
            if self.eat(TokenKind::Comma).is_some() {
                let index = self.index_register()?;
                self.expect(TokenKind::RParen)?;
                return Ok(self.indexed_operand(start, None, base, Some(index)));
            }
            self.expect(TokenKind::RParen)?;
            if base.0 == Register::Pc {
                return Ok(self.indexed_operand(start, None, base, None));
            }
            let mode = if self.eat(TokenKind::Plus).is_some() {
                AddressingMode::PostIncrement
            } else {
                AddressingMode::AddressRegisterIndirect
            };
            let mut op = Operand::new(mode);
            op.base_value = Some(base.1);
            return Ok(self.finish_operand(op, start, vec![base.1]));
        }

        let value = self.parse_expr()?;
        if self.eat(TokenKind::Comma).is_some() {
            let base = self.base_register()?;
            let index = if self.eat(TokenKind::Comma).is_some() {
                Some(self.index_register()?)
            } else {
                None
            };
            self.expect(TokenKind::RParen)?;
            return Ok(self.indexed_operand(start, Some(value), base, index));
        }
        self.expect(TokenKind::RParen)?;
        if self.absolute_suffix().is_some() {
            return self.parse_after_expression(value, start, branch);
        }
        let value = self.parse_binary_rhs(0, value)?;
        self.parse_after_expression(value, start, branch)
    }

    /// `([bd,An,Xn],od)` and `([bd,An],Xn,od)`.
    fn parse_memory_indirect(&mut self, start: usize) -> PResult<NodeId> {
        self.bump();
        let displacement = if matches!(self.peek_register(0), Some(Register::Address(_) | Register::Pc)) {
            None
        } else {
            let value = self.parse_expr()?;
            self.expect(TokenKind::Comma)?;
            Some(value)
        };
        let base = self.base_register()?;
        let mut index = None;
        let mut pre_indexed = false;
        if self.eat(TokenKind::Comma).is_some() {
            index = Some(self.index_register()?);
            pre_indexed = true;
        }
        self.expect(TokenKind::RBracket)?;

        let mut outer = None;
        while self.eat(TokenKind::Comma).is_some() {
            if index.is_none() && self.is_index_register_next() {
                index = Some(self.index_register()?);
            } else if outer.is_none() {
                outer = Some(self.parse_expr()?);
            } else {
                return Err(self.unexpected("`)`"));
            }
        }
        self.expect(TokenKind::RParen)?;

        let mode = match (base.0 == Register::Pc, pre_indexed) {
            (false, false) => AddressingMode::MemoryIndirectPostIndexed,
            (false, true) => AddressingMode::MemoryIndirectPreIndexed,
            (true, false) => AddressingMode::PcMemoryIndirectPostIndexed,
            (true, true) => AddressingMode::PcMemoryIndirectPreIndexed,
        };
        let mut op = Operand::new(mode);
        op.base_value = Some(base.1);
        op.base_displacement = displacement;
        op.index_register = index;
        op.outer_displacement = outer;
        let mut children = vec![base.1];
        children.extend(displacement);
        children.extend(outer);
        Ok(self.finish_operand(op, start, children))
    }

    /// `.w` / `.l` directly after an absolute address.
    fn absolute_suffix(&self) -> Option<AddressingMode> {
        let tok = self.peek();
        if tok.kind != TokenKind::Identifier {
            return None;
        }
        match tok.text.to_ascii_lowercase().as_str() {
            ".w" => Some(AddressingMode::AbsoluteShort),
            ".l" => Some(AddressingMode::AbsoluteLong),
            _ => None,
        }
    }

    fn parse_after_expression(
        &mut self,
        value: NodeId,
        start: usize,
        branch: Option<BranchTarget>,
    ) -> PResult<NodeId> {
        if self.eat(TokenKind::LParen).is_some() {
            let base = self.base_register()?;
            let index = if self.eat(TokenKind::Comma).is_some() {
                Some(self.index_register()?)
            } else {
                None
            };
            self.expect(TokenKind::RParen)?;
            return Ok(self.indexed_operand(start, Some(value), base, index));
        }

        let mut op = if let Some(mode) = self.absolute_suffix() {
            self.bump();
            let mut op = Operand::new(mode);
            op.pinned = true;
            op
        } else if let Some(target) = branch {
            let mut op = Operand::new(target.mode);
            op.pinned = target.pinned;
            op
        } else {
            Operand::new(AddressingMode::AbsoluteLong)
        };
        op.base_value = Some(value);
        Ok(self.finish_operand(op, start, vec![value]))
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> PResult<NodeId> {
        let lhs = self.parse_unary()?;
        self.parse_binary_rhs(0, lhs)
    }

    fn peek_binop(&self) -> Option<(BinOp, u8)> {
        match self.peek().kind {
            TokenKind::Plus => Some((BinOp::Add, 1)),
            TokenKind::Minus => Some((BinOp::Sub, 1)),
            TokenKind::Star => Some((BinOp::Mul, 2)),
            TokenKind::Slash => Some((BinOp::Div, 2)),
            _ => None,
        }
    }

    fn parse_binary_rhs(&mut self, min_prec: u8, mut lhs: NodeId) -> PResult<NodeId> {
        while let Some((op, prec)) = self.peek_binop() {
            if prec < min_prec {
                break;
            }
            self.bump();
            let first = self.parse_unary()?;
            let rhs = self.parse_binary_rhs(prec + 1, first)?;
            let region = self.ast.region(lhs).merge(self.ast.region(rhs));
            lhs = self.ast.push(NodeKind::Binary(op), region, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<NodeId> {
        if let Some(minus) = self.eat(TokenKind::Minus) {
            let inner = self.parse_unary()?;
            let region = minus.region().merge(self.ast.region(inner));
            return Ok(self.ast.push(NodeKind::Negate, region, vec![inner]));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<NodeId> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Number | TokenKind::Char => {
                self.bump();
                let value = parse_number(tok.text)
                    .ok_or_else(|| SyntaxError::new(format!("number `{}` is out of range", tok.text), tok.offset))?;
                Ok(self.ast.push(NodeKind::Number(value), tok.region(), Vec::new()))
            }
            TokenKind::Identifier => {
                if Register::parse(tok.text).is_some() {
                    return Err(SyntaxError::new(
                        format!("register `{}` cannot appear in an expression", tok.text),
                        tok.offset,
                    ));
                }
                self.bump();
                Ok(self.ast.push(NodeKind::Identifier(tok.text.to_string()), tok.region(), Vec::new()))
            }
            TokenKind::Star => {
                self.bump();
                Ok(self.ast.push(NodeKind::CurrentAddress, tok.region(), Vec::new()))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}
