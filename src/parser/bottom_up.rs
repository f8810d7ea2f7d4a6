//! The recursive-descent parser: turns the flat, bracket-balanced token
//! stream into the annotated tree, declaring tags and building declarer
//! modes inline as it goes (rather than as separate passes over an
//! intermediate phrase-structure representation — a pragmatic collapse of
//! what would otherwise be two handoff-heavy tree-rewriting passes into
//! one single-walk parser, justified by the size of a full two-phase
//! Algol 68 grammar recogniser).

use crate::diag::{Diagnostics, Severity};
use crate::lexer::{Token, TokenKind};
use crate::moid::pack::{Pack, PackEntry};
use crate::moid::{ModeTable, MoidId};
use crate::node::{Attribute, Node, NodeArena, NodeId};
use crate::parser::standenv::{default_priority, StandEnv};
use crate::symtab::{SymbolTableId, SymbolTables};

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    arena: &'a mut NodeArena,
    modes: &'a mut ModeTable,
    symtab: &'a mut SymbolTables,
    diags: &'a mut Diagnostics,
    table: SymbolTableId,
    level: u32,
    std_table: SymbolTableId,
    /// The most recently seen `PRIO` declaration not yet consumed by a
    /// matching `OP` declaration, so `PRIO + = 6; OP + = ...` in the same
    /// range resolves without a second tree pass.
    pending_priority: Option<(String, u8)>,
}

const DECLARER_KEYWORDS: &[&str] = &[
    "INT", "REAL", "BOOL", "CHAR", "BITS", "BYTES", "COMPLEX", "STRING", "VOID", "FORMAT", "REF",
    "FLEX", "STRUCT", "UNION", "PROC", "LONG", "SHORT",
];

impl<'a> Parser<'a> {
    pub fn new(
        tokens: &'a [Token],
        arena: &'a mut NodeArena,
        modes: &'a mut ModeTable,
        symtab: &'a mut SymbolTables,
        diags: &'a mut Diagnostics,
        env: &StandEnv,
    ) -> Self {
        let table = symtab.new_table(1, Some(env.table));
        Parser {
            tokens,
            pos: 0,
            arena,
            modes,
            symtab,
            diags,
            table,
            level: 1,
            std_table: env.table,
            pending_priority: None,
        }
    }

    /// Parses the whole token stream as one program: an implicit serial
    /// clause, wrapped in a `ParticularProgram` node.
    pub fn parse_program(mut self) -> NodeId {
        let start = self.span();
        let series = self.parse_serial(&[TokenKind::Eof]);
        let mut node = Node::new(Attribute::ParticularProgram, start);
        node.symbol_table = Some(self.table);
        let id = self.arena.alloc(node);
        self.arena.append_child(id, series);
        id
    }

    // ---- token-stream plumbing ----

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn span(&self) -> crate::diag::SourceSpan {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span.clone()
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if k == kw)
    }

    fn is_kw_at(&self, offset: usize, kw: &str) -> bool {
        matches!(self.peek_at(offset), TokenKind::Keyword(k) if k == kw)
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.is_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) {
        if !self.eat_kw(kw) {
            let span = self.span();
            self.diags.error(Severity::Syntax, Some(span), format!("expected '{}'", kw));
        }
    }

    fn eat_punct(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn node(&mut self, attr: Attribute, span: crate::diag::SourceSpan) -> NodeId {
        self.arena.alloc(Node::new(attr, span))
    }

    fn child(&mut self, parent: NodeId, kid: NodeId) {
        self.arena.append_child(parent, kid);
    }

    // ---- serial clauses ----

    /// Parses statements until one of `terminators` is seen (without
    /// consuming it), building a flat `Series` node.
    fn parse_serial(&mut self, terminators: &[TokenKind]) -> NodeId {
        let start_span = self.span();
        let series = self.node(Attribute::Series, start_span);
        loop {
            if self.at_eof() || terminators.contains(self.peek()) {
                break;
            }
            let stmt = self.parse_statement();
            self.child(series, stmt);
            if !self.eat_punct(&TokenKind::Semicolon) {
                break;
            }
        }
        series
    }

    fn parse_statement(&mut self) -> NodeId {
        if self.is_kw("MODE") {
            return self.parse_mode_declaration();
        }
        if self.is_kw("PRIO") {
            return self.parse_prio_declaration();
        }
        if self.is_kw("OP") {
            return self.parse_op_declaration();
        }
        if self.declarer_starts_here() {
            return self.parse_identity_or_variable_declaration();
        }
        if let TokenKind::Identifier(name) = self.peek().clone() {
            if matches!(self.peek_at(1), TokenKind::Colon) {
                self.bump();
                self.bump();
                let label_tag = self
                    .symtab
                    .declare_label(self.table, &name)
                    .unwrap_or_else(|e| e);
                let span = self.span();
                let inner = self.parse_statement();
                let mut n = Node::new(Attribute::Goto, span).with_symbol(name);
                n.tag = Some(label_tag);
                let id = self.arena.alloc(n);
                self.child(id, inner);
                return id;
            }
        }
        self.parse_unit()
    }

    fn declarer_starts_here(&self) -> bool {
        if let TokenKind::Keyword(k) = self.peek() {
            if DECLARER_KEYWORDS.contains(&k.as_str()) {
                return true;
            }
        }
        if let TokenKind::Identifier(name) = self.peek() {
            if self.modes.lookup_indicant(name).is_some() {
                return matches!(self.peek_at(1), TokenKind::Identifier(_));
            }
        }
        false
    }

    // ---- declarations ----

    fn parse_mode_declaration(&mut self) -> NodeId {
        let span = self.span();
        self.bump(); // MODE
        let decl = self.node(Attribute::ModeDeclaration, span);
        loop {
            let name = self.expect_identifier();
            self.eat_operator("=");
            let placeholder = self.modes.new_indicant(&name, None);
            let body = self.parse_declarer();
            self.modes.get_mut(placeholder).equivalent = Some(body);
            let tag = self.symtab.declare_indicant(self.table, &name).unwrap_or_else(|e| e);
            self.symtab.tag_mut(tag).mode = Some(placeholder);
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        decl
    }

    fn parse_prio_declaration(&mut self) -> NodeId {
        let span = self.span();
        self.bump(); // PRIO
        let decl = self.node(Attribute::PriorityDeclaration, span);
        loop {
            let name = self.operator_symbol();
            self.eat_operator("=");
            let prio: u8 = match self.bump().kind {
                TokenKind::IntDenotation(d) => d.parse().unwrap_or(9),
                _ => 9,
            };
            self.priorities_set(&name, prio);
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        decl
    }

    fn priorities_set(&mut self, name: &str, prio: u8) {
        // Priorities are recorded directly on whatever operator tag(s)
        // already exist in scope; an operator declared later in the same
        // range picks this priority up when `parse_op_declaration` looks
        // it up.
        for tag in self.symtab.lookup_operators(self.table, name) {
            self.symtab.tag_mut(tag).priority = Some(prio);
        }
        self.pending_priority = Some((name.to_string(), prio));
    }

    fn parse_op_declaration(&mut self) -> NodeId {
        let span = self.span();
        self.bump(); // OP
        let decl = self.node(Attribute::OperatorDeclaration, span);
        loop {
            let name = self.operator_symbol();
            self.eat_punct(&TokenKind::LParen);
            let params = self.parse_formal_parameter_pack();
            self.eat_punct(&TokenKind::RParen);
            let result = self.parse_declarer();
            let proc_mode = self.modes.new_proc(params, result, None);
            self.eat_punct(&TokenKind::Colon);
            let body = self.parse_unit();
            let tag = self.symtab.declare_operator(self.table, &name);
            self.symtab.tag_mut(tag).mode = Some(proc_mode);
            self.symtab.tag_mut(tag).defining_node = Some(body);
            let arity = params.len();
            let prio = if arity >= 2 {
                self.pending_priority_for(&name).unwrap_or(6)
            } else {
                9
            };
            self.symtab.tag_mut(tag).priority = Some(prio);
            self.child(decl, body);
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        decl
    }

    fn pending_priority_for(&self, name: &str) -> Option<u8> {
        match &self.pending_priority {
            Some((n, p)) if n == name => Some(*p),
            _ => default_priority(self.symtab, self.std_table, name),
        }
    }

    /// `declarer name [:= unit | = unit] { , name ... }`.
    fn parse_identity_or_variable_declaration(&mut self) -> NodeId {
        let span = self.span();
        let mode = self.parse_declarer();
        let decl = self.node(Attribute::IdentityDeclaration, span.clone());
        loop {
            let name_span = self.span();
            let name = self.expect_identifier();
            let entry = if self.eat_punct(&TokenKind::Becomes) {
                let value = self.parse_unit();
                let tag = self
                    .symtab
                    .declare_identifier(self.table, &name)
                    .unwrap_or_else(|e| e);
                self.symtab.tag_mut(tag).mode = Some(mode);
                let mut n = Node::new(Attribute::VariableDeclaration, name_span).with_symbol(name);
                n.tag = Some(tag);
                n.mode = Some(mode);
                let id = self.arena.alloc(n);
                self.child(id, value);
                id
            } else if self.eat_operator("=") {
                let value = self.parse_unit();
                let tag = self
                    .symtab
                    .declare_identifier(self.table, &name)
                    .unwrap_or_else(|e| e);
                self.symtab.tag_mut(tag).mode = Some(mode);
                let mut n = Node::new(Attribute::Identity, name_span).with_symbol(name);
                n.tag = Some(tag);
                n.mode = Some(mode);
                let id = self.arena.alloc(n);
                self.child(id, value);
                id
            } else {
                let tag = self
                    .symtab
                    .declare_identifier(self.table, &name)
                    .unwrap_or_else(|e| e);
                self.symtab.tag_mut(tag).mode = Some(mode);
                let mut n = Node::new(Attribute::VariableDeclaration, name_span).with_symbol(name);
                n.tag = Some(tag);
                n.mode = Some(mode);
                self.arena.alloc(n)
            };
            self.child(decl, entry);
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        decl
    }

    // ---- declarers ----

    fn parse_declarer(&mut self) -> MoidId {
        let mut sizety: i8 = 0;
        loop {
            if self.eat_kw("LONG") {
                sizety += 1;
                continue;
            }
            if self.eat_kw("SHORT") {
                sizety -= 1;
                continue;
            }
            break;
        }
        if self.eat_kw("REF") {
            let sub = self.parse_declarer();
            return self.modes.new_ref(sub, None);
        }
        if self.eat_kw("FLEX") {
            let dim = self.parse_bounds_dim();
            let elem = self.parse_declarer();
            let row = self.modes.new_row_chain(dim, elem, None);
            return self.modes.new_flex(row, None);
        }
        if matches!(self.peek(), TokenKind::LBracket) {
            let dim = self.parse_bounds_dim();
            let elem = self.parse_declarer();
            return self.modes.new_row_chain(dim, elem, None);
        }
        if self.eat_kw("STRUCT") {
            self.eat_punct(&TokenKind::LParen);
            let pack = self.parse_struct_field_pack();
            self.eat_punct(&TokenKind::RParen);
            return self.modes.new_struct(pack, None);
        }
        if self.eat_kw("UNION") {
            self.eat_punct(&TokenKind::LParen);
            let pack = self.parse_union_member_pack();
            self.eat_punct(&TokenKind::RParen);
            return self.modes.new_union(pack, None);
        }
        if self.eat_kw("PROC") {
            let params = if self.eat_punct(&TokenKind::LParen) {
                let p = self.parse_formal_declarer_pack();
                self.eat_punct(&TokenKind::RParen);
                p
            } else {
                Pack::new()
            };
            let result = if self.declarer_token_follows() {
                self.parse_declarer()
            } else {
                self.modes.void()
            };
            return self.modes.new_proc(params, result, None);
        }
        if self.eat_kw("VOID") {
            return self.modes.void();
        }
        if self.eat_kw("FORMAT") {
            return self.modes.format_mode();
        }
        for (kw, kind) in [
            ("INT", crate::moid::StandardKind::Int),
            ("REAL", crate::moid::StandardKind::Real),
            ("BOOL", crate::moid::StandardKind::Bool),
            ("CHAR", crate::moid::StandardKind::Char),
            ("BITS", crate::moid::StandardKind::Bits),
            ("BYTES", crate::moid::StandardKind::Bytes),
            ("COMPLEX", crate::moid::StandardKind::Complex),
            ("STRING", crate::moid::StandardKind::String),
        ] {
            if self.eat_kw(kw) {
                let span = self.span();
                return self.modes.standard_mode(kind, sizety, self.diags, Some(span));
            }
        }
        if let TokenKind::Identifier(name) = self.peek().clone() {
            self.bump();
            return self.modes.new_indicant(&name, None);
        }
        let span = self.span();
        self.diags.error(Severity::Syntax, Some(span), "expected a mode declarer");
        self.modes.void()
    }

    fn declarer_token_follows(&self) -> bool {
        match self.peek() {
            TokenKind::Keyword(k) => DECLARER_KEYWORDS.contains(&k.as_str()),
            TokenKind::Identifier(name) => self.modes.lookup_indicant(name).is_some(),
            _ => false,
        }
    }

    /// Bounds lists only matter for their *count*: `[1:10, 1:20]` is a
    /// 2-dimensional row regardless of the actual bound expressions, which
    /// are runtime units evaluated by the generator, not the parser.
    fn parse_bounds_dim(&mut self) -> usize {
        self.eat_punct(&TokenKind::LBracket);
        let mut dim = 0usize;
        loop {
            dim += 1;
            // Skip one bound's worth of tokens: an optional "unit :" pair
            // or a bare "unit", up to the next comma/close-bracket.
            let mut depth = 0i32;
            loop {
                match self.peek() {
                    TokenKind::LParen | TokenKind::LBracket => {
                        depth += 1;
                        self.bump();
                    }
                    TokenKind::RParen => {
                        depth -= 1;
                        self.bump();
                    }
                    TokenKind::RBracket if depth > 0 => {
                        depth -= 1;
                        self.bump();
                    }
                    TokenKind::RBracket => break,
                    TokenKind::Comma if depth == 0 => break,
                    TokenKind::Eof => break,
                    _ => {
                        self.bump();
                    }
                }
            }
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        self.eat_punct(&TokenKind::RBracket);
        dim
    }

    fn parse_struct_field_pack(&mut self) -> Pack {
        let mut pack = Pack::new();
        loop {
            let mode = self.parse_declarer();
            loop {
                let name = self.expect_identifier();
                pack.push(PackEntry::new(mode, Some(name), None));
                if !self.eat_punct(&TokenKind::Comma) {
                    break;
                }
                if self.declarer_token_follows() {
                    break;
                }
            }
            if matches!(self.peek(), TokenKind::RParen) {
                break;
            }
        }
        pack
    }

    fn parse_union_member_pack(&mut self) -> Pack {
        let mut pack = Pack::new();
        loop {
            let mode = self.parse_declarer();
            pack.push(PackEntry::new(mode, None, None));
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        pack
    }

    fn parse_formal_declarer_pack(&mut self) -> Pack {
        let mut pack = Pack::new();
        if matches!(self.peek(), TokenKind::RParen) {
            return pack;
        }
        loop {
            let mode = self.parse_declarer();
            pack.push(PackEntry::new(mode, None, None));
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        pack
    }

    /// A routine text's formal parameter list: `declarer identifier` pairs.
    fn parse_formal_parameter_pack(&mut self) -> Pack {
        let mut pack = Pack::new();
        if matches!(self.peek(), TokenKind::RParen) {
            return pack;
        }
        loop {
            let mode = self.parse_declarer();
            let name = self.expect_identifier();
            let tag = self.symtab.declare_identifier(self.table, &name).unwrap_or_else(|e| e);
            self.symtab.tag_mut(tag).mode = Some(mode);
            pack.push(PackEntry::new(mode, Some(name), None));
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        pack
    }

    // ---- units ----

    fn parse_unit(&mut self) -> NodeId {
        let lhs = self.parse_formula(1);
        if self.eat_punct(&TokenKind::Becomes) {
            let span = self.span();
            let rhs = self.parse_unit();
            let id = self.node(Attribute::Assignation, span);
            self.child(id, lhs);
            self.child(id, rhs);
            return id;
        }
        lhs
    }

    fn parse_formula(&mut self, min_prio: u8) -> NodeId {
        let mut lhs = self.parse_operand();
        loop {
            let Some(name) = self.peek_operator_name() else { break };
            let prio = default_priority(self.symtab, self.table, &name).unwrap_or(6);
            if prio < min_prio {
                break;
            }
            let span = self.span();
            self.bump();
            let rhs = self.parse_formula(prio + 1);
            let id = self.node(Attribute::Formula, span).with_symbol_id(&mut self.arena, name);
            self.child(id, lhs);
            self.child(id, rhs);
            lhs = id;
        }
        lhs
    }

    fn peek_operator_name(&self) -> Option<String> {
        match self.peek() {
            TokenKind::Operator(s) => Some(s.clone()),
            TokenKind::Identifier(name) if self.is_known_operator_word(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn is_known_operator_word(&self, name: &str) -> bool {
        matches!(name, "MOD" | "OVER" | "AND" | "OR" | "NOT" | "ABS" | "SIGN" | "ODD")
    }

    fn parse_operand(&mut self) -> NodeId {
        if let Some(name) = self.peek_monadic_operator() {
            let span = self.span();
            self.bump();
            let operand = self.parse_operand();
            let n = Node::new(Attribute::MonadicFormula, span).with_symbol(name);
            let id = self.arena.alloc(n);
            self.child(id, operand);
            return id;
        }
        self.parse_secondary()
    }

    fn peek_monadic_operator(&self) -> Option<String> {
        match self.peek() {
            TokenKind::Operator(s) if s == "-" || s == "+" || s == "~" => Some(s.clone()),
            TokenKind::Keyword(k) if k == "NOT" => Some(k.clone()),
            TokenKind::Identifier(name) if matches!(name.as_str(), "NOT" | "ABS" | "SIGN" | "ODD") => {
                Some(name.clone())
            }
            _ => None,
        }
    }

    fn parse_secondary(&mut self) -> NodeId {
        if let TokenKind::Identifier(name) = self.peek().clone() {
            if self.is_kw_at(1, "OF") {
                let span = self.span();
                self.bump();
                self.bump();
                let operand = self.parse_secondary();
                let id = self.node(Attribute::FieldSelection, span).with_symbol_id(&mut self.arena, name);
                self.child(id, operand);
                return id;
            }
        }
        let mut node = self.parse_primary();
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    let span = self.span();
                    self.bump();
                    let call = self.node(Attribute::Call, span);
                    self.child(call, node);
                    if !matches!(self.peek(), TokenKind::RParen) {
                        loop {
                            let arg = self.parse_unit();
                            self.child(call, arg);
                            if !self.eat_punct(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.eat_punct(&TokenKind::RParen);
                    node = call;
                }
                TokenKind::LBracket => {
                    let span = self.span();
                    self.bump();
                    let slice = self.node(Attribute::Slice, span);
                    self.child(slice, node);
                    loop {
                        let idx = self.parse_unit();
                        self.child(slice, idx);
                        if !self.eat_punct(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.eat_punct(&TokenKind::RBracket);
                    node = slice;
                }
                _ => break,
            }
        }
        node
    }

    fn parse_primary(&mut self) -> NodeId {
        let span = self.span();
        match self.peek().clone() {
            TokenKind::IntDenotation(d) => {
                self.bump();
                self.node(Attribute::IntDenotation, span).with_symbol_id(&mut self.arena, d)
            }
            TokenKind::RealDenotation(d) => {
                self.bump();
                self.node(Attribute::RealDenotation, span).with_symbol_id(&mut self.arena, d)
            }
            TokenKind::BoolDenotation(b) => {
                self.bump();
                self.node(Attribute::BoolDenotation, span)
                    .with_symbol_id(&mut self.arena, if b { "true" } else { "false" }.to_string())
            }
            TokenKind::CharDenotation(c) => {
                self.bump();
                self.node(Attribute::CharDenotation, span).with_symbol_id(&mut self.arena, c.to_string())
            }
            TokenKind::StringDenotation(s) => {
                self.bump();
                self.node(Attribute::StringDenotation, span).with_symbol_id(&mut self.arena, s)
            }
            TokenKind::Identifier(name) => {
                self.bump();
                let id = self.node(Attribute::Identifier, span).with_symbol_id(&mut self.arena, name.clone());
                if let Some(tag) = self.symtab.lookup_identifier(self.table, &name) {
                    self.arena.get_mut(id).tag = Some(tag);
                }
                id
            }
            TokenKind::Keyword(k) if k == "NIL" => {
                self.bump();
                self.node(Attribute::Nihilism, span)
            }
            TokenKind::Keyword(k) if k == "SKIP" => {
                self.bump();
                self.node(Attribute::Skip, span)
            }
            TokenKind::Keyword(k) if k == "GOTO" || k == "EXIT" => {
                self.bump();
                let name = self.expect_identifier();
                let tag = self.symtab.lookup_label(self.table, &name);
                let sym_span = self.span();
                let sym = self.node(Attribute::GotoSymbol, sym_span).with_symbol_id(&mut self.arena, name);
                if let Some(t) = tag {
                    self.arena.get_mut(sym).tag = Some(t);
                }
                let id = self.node(Attribute::Goto, span);
                self.child(id, sym);
                id
            }
            TokenKind::Keyword(k) if k == "HEAP" || k == "LOC" => {
                self.bump();
                let mode = self.parse_declarer();
                let attr = if k == "HEAP" {
                    Attribute::HeapGenerator
                } else {
                    Attribute::LocGenerator
                };
                let id = self.node(attr, span);
                self.arena.get_mut(id).mode = Some(mode);
                id
            }
            TokenKind::Keyword(k) if k == "BEGIN" => {
                self.bump();
                self.enter_range();
                let body = self.parse_serial(&[TokenKind::Keyword("END".to_string())]);
                self.expect_kw("END");
                self.exit_range();
                let id = self.node(Attribute::ClosedClause, span);
                self.child(id, body);
                id
            }
            TokenKind::LParen => {
                self.bump();
                self.enter_range();
                if let Some(routine) = self.try_parse_routine_text(span.clone()) {
                    self.exit_range();
                    return routine;
                }
                let first = self.parse_statement();
                if matches!(self.peek(), TokenKind::Comma) {
                    let coll = self.node(Attribute::CollateralClause, span);
                    self.child(coll, first);
                    while self.eat_punct(&TokenKind::Comma) {
                        let unit = self.parse_statement();
                        self.child(coll, unit);
                    }
                    self.eat_punct(&TokenKind::RParen);
                    self.exit_range();
                    return coll;
                }
                let body = if self.eat_punct(&TokenKind::Semicolon) {
                    let series = self.node(Attribute::Series, span.clone());
                    self.child(series, first);
                    loop {
                        if matches!(self.peek(), TokenKind::RParen) {
                            break;
                        }
                        let stmt = self.parse_statement();
                        self.child(series, stmt);
                        if !self.eat_punct(&TokenKind::Semicolon) {
                            break;
                        }
                    }
                    series
                } else {
                    first
                };
                self.eat_punct(&TokenKind::RParen);
                self.exit_range();
                let id = self.node(Attribute::ClosedClause, span);
                self.child(id, body);
                id
            }
            TokenKind::Keyword(k) if k == "IF" => self.parse_conditional(span),
            TokenKind::Keyword(k) if k == "CASE" => self.parse_case(span),
            TokenKind::Keyword(k) if k == "FOR" || k == "FROM" || k == "WHILE" || k == "TO" || k == "DO" => {
                self.parse_loop(span)
            }
            _ => {
                self.diags.error(Severity::Syntax, Some(span.clone()), "expected a unit");
                self.bump();
                self.node(Attribute::Skip, span)
            }
        }
    }

    fn enter_range(&mut self) {
        self.level += 1;
        self.table = self.symtab.new_table(self.level, Some(self.table));
    }

    fn exit_range(&mut self) {
        self.level -= 1;
        self.table = self
            .symtab
            .table(self.table)
            .previous
            .unwrap_or(self.table);
    }

    /// Attempts to parse a routine text (`(formal params) declarer : unit`)
    /// starting right after the opening `(` was consumed. On failure,
    /// rewinds so the caller can fall back to an ordinary enclosed clause.
    fn try_parse_routine_text(&mut self, span: crate::diag::SourceSpan) -> Option<NodeId> {
        let saved_pos = self.pos;
        if matches!(self.peek(), TokenKind::RParen) {
            // Niladic: `() INT: 42` is vanishingly rare; bail to the
            // ordinary empty-collateral-clause path instead.
            return None;
        }
        if !self.declarer_token_follows() {
            return None;
        }
        let params = self.parse_formal_parameter_pack();
        if !self.eat_punct(&TokenKind::RParen) {
            self.pos = saved_pos;
            return None;
        }
        if !self.declarer_token_follows() && !matches!(self.peek(), TokenKind::Keyword(k) if k == "VOID") {
            self.pos = saved_pos;
            return None;
        }
        let result = self.parse_declarer();
        if !self.eat_punct(&TokenKind::Colon) {
            self.pos = saved_pos;
            return None;
        }
        let body = self.parse_unit();
        let proc_mode = self.modes.new_proc(params, result, None);
        let id = self.node(Attribute::RoutineText, span);
        self.arena.get_mut(id).mode = Some(proc_mode);
        // Recorded so the interpreter can re-resolve each formal parameter's
        // tag by name (the PROC mode's pack carries the name but not the
        // tag) against the table this routine text's own body was parsed
        // in, same as `parse_program`'s top-level node does for itself.
        self.arena.get_mut(id).symbol_table = Some(self.table);
        self.child(id, body);
        Some(id)
    }

    fn parse_conditional(&mut self, span: crate::diag::SourceSpan) -> NodeId {
        self.bump(); // IF
        let id = self.node(Attribute::ConditionalClause, span);
        let cond = self.parse_serial(&[
            TokenKind::Keyword("THEN".to_string()),
        ]);
        self.expect_kw("THEN");
        let then_branch = self.parse_serial(&[
            TokenKind::Keyword("ELIF".to_string()),
            TokenKind::Keyword("ELSE".to_string()),
            TokenKind::Keyword("FI".to_string()),
        ]);
        self.child(id, cond);
        self.child(id, then_branch);
        if self.eat_kw("ELIF") {
            let nested_span = self.span();
            let nested = self.parse_conditional_tail(nested_span);
            self.child(id, nested);
        } else if self.eat_kw("ELSE") {
            let else_branch = self.parse_serial(&[TokenKind::Keyword("FI".to_string())]);
            self.child(id, else_branch);
            self.expect_kw("FI");
        } else {
            self.expect_kw("FI");
        }
        id
    }

    /// An `ELIF` continuation reuses the conditional-clause shape so the
    /// mode checker can treat it identically to a nested `IF`.
    fn parse_conditional_tail(&mut self, span: crate::diag::SourceSpan) -> NodeId {
        let id = self.node(Attribute::ConditionalClause, span);
        let cond = self.parse_serial(&[TokenKind::Keyword("THEN".to_string())]);
        self.expect_kw("THEN");
        let then_branch = self.parse_serial(&[
            TokenKind::Keyword("ELIF".to_string()),
            TokenKind::Keyword("ELSE".to_string()),
            TokenKind::Keyword("FI".to_string()),
        ]);
        self.child(id, cond);
        self.child(id, then_branch);
        if self.eat_kw("ELIF") {
            let nested_span = self.span();
            let nested = self.parse_conditional_tail(nested_span);
            self.child(id, nested);
        } else if self.eat_kw("ELSE") {
            let else_branch = self.parse_serial(&[TokenKind::Keyword("FI".to_string())]);
            self.child(id, else_branch);
        }
        id
    }

    fn parse_case(&mut self, span: crate::diag::SourceSpan) -> NodeId {
        self.bump(); // CASE
        let id = self.node(Attribute::CaseClause, span);
        let selector = self.parse_serial(&[TokenKind::Keyword("IN".to_string())]);
        self.expect_kw("IN");
        self.child(id, selector);
        loop {
            let branch_span = self.span();
            let branch = self.parse_serial(&[
                TokenKind::Comma,
                TokenKind::Keyword("OUT".to_string()),
                TokenKind::Keyword("ESAC".to_string()),
            ]);
            let wrapped = self.node(Attribute::InCasePart, branch_span);
            self.child(wrapped, branch);
            self.child(id, wrapped);
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        if self.eat_kw("OUT") {
            let out_span = self.span();
            let out = self.parse_serial(&[TokenKind::Keyword("ESAC".to_string())]);
            let wrapped = self.node(Attribute::OutCasePart, out_span);
            self.child(wrapped, out);
            self.child(id, wrapped);
        }
        self.expect_kw("ESAC");
        id
    }

    fn parse_loop(&mut self, span: crate::diag::SourceSpan) -> NodeId {
        let id = self.node(Attribute::LoopClause, span);
        self.enter_range();
        if self.eat_kw("FOR") {
            let name = self.expect_identifier();
            let tag = self.symtab.declare_identifier(self.table, &name).unwrap_or_else(|e| e);
            let int_mode = self.modes.standard_mode(crate::moid::StandardKind::Int, 0, self.diags, None);
            self.symtab.tag_mut(tag).mode = Some(int_mode);
            let part_span = self.span();
            let mut part = Node::new(Attribute::ForPart, part_span).with_symbol(name);
            part.tag = Some(tag);
            let part_id = self.arena.alloc(part);
            self.child(id, part_id);
        }
        if self.eat_kw("FROM") {
            let span = self.span();
            let unit = self.parse_unit();
            let part = self.node(Attribute::FromPart, span);
            self.child(part, unit);
            self.child(id, part);
        }
        if self.eat_kw("BY") {
            let span = self.span();
            let unit = self.parse_unit();
            let part = self.node(Attribute::ByPart, span);
            self.child(part, unit);
            self.child(id, part);
        }
        if self.eat_kw("TO") || self.eat_kw("DOWNTO") {
            let span = self.span();
            let unit = self.parse_unit();
            let part = self.node(Attribute::ToPart, span);
            self.child(part, unit);
            self.child(id, part);
        }
        if self.eat_kw("WHILE") {
            let span = self.span();
            let unit = self.parse_serial(&[TokenKind::Keyword("DO".to_string())]);
            let part = self.node(Attribute::WhilePart, span);
            self.child(part, unit);
            self.child(id, part);
        }
        self.expect_kw("DO");
        let body_span = self.span();
        let body = self.parse_serial(&[
            TokenKind::Keyword("UNTIL".to_string()),
            TokenKind::Keyword("OD".to_string()),
        ]);
        let do_part = self.node(Attribute::DoPart, body_span);
        self.child(do_part, body);
        self.child(id, do_part);
        if self.eat_kw("UNTIL") {
            let span = self.span();
            let unit = self.parse_serial(&[TokenKind::Keyword("OD".to_string())]);
            let part = self.node(Attribute::UntilPart, span);
            self.child(part, unit);
            self.child(id, part);
        }
        self.expect_kw("OD");
        self.exit_range();
        id
    }

    // ---- helpers ----

    fn expect_identifier(&mut self) -> String {
        if let TokenKind::Identifier(name) = self.peek().clone() {
            self.bump();
            name
        } else {
            let span = self.span();
            self.diags.error(Severity::Syntax, Some(span), "expected an identifier");
            String::new()
        }
    }

    fn operator_symbol(&mut self) -> String {
        match self.peek().clone() {
            TokenKind::Operator(s) => {
                self.bump();
                s
            }
            TokenKind::Identifier(s) => {
                self.bump();
                s
            }
            _ => {
                let span = self.span();
                self.diags.error(Severity::Syntax, Some(span), "expected an operator symbol");
                String::new()
            }
        }
    }

    fn eat_operator(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), TokenKind::Operator(s) if s == sym) {
            self.bump();
            true
        } else {
            false
        }
    }
}

trait WithSymbolId {
    fn with_symbol_id(self, arena: &mut NodeArena, symbol: String) -> Self;
}

impl WithSymbolId for NodeId {
    fn with_symbol_id(self, arena: &mut NodeArena, symbol: String) -> Self {
        arena.get_mut(self).symbol = Some(symbol);
        self
    }
}
