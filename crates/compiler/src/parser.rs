//! Recursive-descent parser over the lexer's token buffer (§4.7).
//!
//! Concatenative, keyword-dispatched grammar: each statement form maps 1:1
//! to an [`Operation`] variant. `{ }` delimits every nested expression-list
//! block (`if`/`else`/function bodies/`coll foreach`); `;` and newline are
//! insignificant statement separators, not required terminators.
//!
//! `define NAME TYPE LITERAL` materializes its literal into the heap
//! immediately and records it in the parser's define table, so a later
//! `push define NAME` resolves to the same shared, pinned `Object` rather
//! than being re-parsed per occurrence.

use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use loom_core::{
    process, AddressMode, ArithOp, ClearKind, CollOp, ConditionalLink, ExpressionList, FfiOp,
    FfiType, FunctionData, FunctionLiteral, Heap, Literal, NullKind, Object, ObjectData,
    Operation, SentinelKind, SourceLocation, TypeTag,
};
use std::collections::HashMap;

type Result<T> = std::result::Result<T, ParseError>;

/// Parse a whole source file into its root expression list (the VM's root
/// function body — see `ExpressionList::is_function_body`).
pub fn parse(
    source: &str,
    heap: &mut Heap,
    file_index: u32,
    record_debug: bool,
) -> Result<ExpressionList> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens, heap, file_index, record_debug);
    let mut root = parser.parse_block(|k| *k == TokenKind::Eof)?;
    root.is_function_body = true;
    Ok(root)
}

struct Parser<'h> {
    tokens: Vec<Token>,
    pos: usize,
    heap: &'h mut Heap,
    defines: HashMap<String, Object>,
    next_list_id: u64,
    file_index: u32,
    record_debug: bool,
}

impl<'h> Parser<'h> {
    fn new(tokens: Vec<Token>, heap: &'h mut Heap, file_index: u32, record_debug: bool) -> Self {
        Parser {
            tokens,
            pos: 0,
            heap,
            defines: HashMap::new(),
            next_list_id: 1,
            file_index,
            record_debug,
        }
    }

    fn fresh_list(&mut self) -> ExpressionList {
        let id = self.next_list_id;
        self.next_list_id += 1;
        ExpressionList::new(id)
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_tok(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while *self.peek() == TokenKind::Newline {
            self.advance();
        }
    }

    fn mismatch(&self, found: &TokenKind, expected: &str, line: u32, column: u32) -> ParseError {
        if *found == TokenKind::Eof {
            ParseError {
                kind: ParseErrorKind::UnexpectedEof { expected: expected.into() },
                line,
                column,
            }
        } else {
            ParseError {
                kind: ParseErrorKind::UnexpectedToken {
                    expected: expected.into(),
                    found: format!("{found:?}"),
                },
                line,
                column,
            }
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        self.skip_newlines();
        if *self.peek() == kind {
            Ok(self.advance())
        } else {
            let tok = self.peek_tok().clone();
            Err(self.mismatch(&tok.kind, expected, tok.line, tok.column))
        }
    }

    fn expect_int(&mut self) -> Result<i64> {
        self.skip_newlines();
        let tok = self.peek_tok().clone();
        match tok.kind {
            TokenKind::Int(ref n) => {
                self.advance();
                n.to_i64()
                    .ok_or_else(|| ParseError {
                        kind: ParseErrorKind::BadIntLiteral("out of i64 range".into()),
                        line: tok.line,
                        column: tok.column,
                    })
            }
            ref other => Err(self.mismatch(other, "integer", tok.line, tok.column)),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        self.skip_newlines();
        let tok = self.peek_tok().clone();
        match tok.kind {
            TokenKind::Ident(s) => {
                self.advance();
                Ok(s)
            }
            ref other => Err(self.mismatch(other, "identifier", tok.line, tok.column)),
        }
    }

    fn expect_str(&mut self) -> Result<String> {
        self.skip_newlines();
        let tok = self.peek_tok().clone();
        match tok.kind {
            TokenKind::Str(s) => {
                self.advance();
                Ok(s)
            }
            ref other => Err(self.mismatch(other, "string literal", tok.line, tok.column)),
        }
    }

    fn expect_ffi_type(&mut self) -> Result<FfiType> {
        self.skip_newlines();
        let tok = self.peek_tok().clone();
        match tok.kind {
            TokenKind::FfiScalar(ty) => {
                self.advance();
                Ok(ty)
            }
            ref other => Err(self.mismatch(other, "ffi scalar type", tok.line, tok.column)),
        }
    }

    // --- blocks & statements ---

    fn parse_block(&mut self, is_terminator: impl Fn(&TokenKind) -> bool) -> Result<ExpressionList> {
        let mut list = self.fresh_list();
        loop {
            self.skip_newlines();
            if is_terminator(self.peek()) || *self.peek() == TokenKind::Eof {
                break;
            }
            self.parse_statement(&mut list)?;
        }
        Ok(list)
    }

    fn parse_statement(&mut self, list: &mut ExpressionList) -> Result<()> {
        self.skip_newlines();
        let tok = self.peek_tok().clone();
        let (line, column) = (tok.line, tok.column);

        if tok.kind == TokenKind::Checkpoint {
            self.advance();
            if list.error_label_index.is_some() {
                return Err(ParseError { kind: ParseErrorKind::DuplicateCheckpoint, line, column });
            }
            list.error_label_index = Some(list.ops.len());
            self.push_op(list, Operation::Checkpoint, line, column);
            return Ok(());
        }

        let op = self.parse_operation(tok)?;
        self.push_op(list, op, line, column);
        Ok(())
    }

    fn push_op(&mut self, list: &mut ExpressionList, op: Operation, line: u32, column: u32) {
        let index = list.ops.len();
        list.ops.push(op);
        if self.record_debug {
            process::record_node_site(
                list,
                index,
                SourceLocation { file_index: self.file_index, line, column },
            );
        }
    }

    /// Parses the single opcode node starting at `tok` (not yet consumed
    /// except to peek). Shared between top-level statements and `dump`'s
    /// inline operand.
    fn parse_operation(&mut self, tok: Token) -> Result<Operation> {
        match tok.kind {
            TokenKind::Push => {
                self.advance();
                self.parse_push()
            }
            TokenKind::Pop => {
                self.advance();
                Ok(Operation::Pop(self.expect_int()?))
            }
            TokenKind::Remove => {
                self.advance();
                Ok(Operation::Remove(self.expect_int()?))
            }
            TokenKind::Dup => {
                self.advance();
                Ok(Operation::Dup)
            }
            TokenKind::Copy => {
                self.advance();
                Ok(Operation::Copy)
            }
            TokenKind::Swap => {
                self.advance();
                Ok(Operation::Swap)
            }
            TokenKind::Lift => {
                self.advance();
                Ok(Operation::Lift(self.expect_int()?))
            }
            TokenKind::Sink => {
                self.advance();
                Ok(Operation::Sink(self.expect_int()?))
            }
            TokenKind::Squash => {
                self.advance();
                Ok(Operation::Squash(self.expect_int()?))
            }
            TokenKind::Reserve => {
                self.advance();
                Ok(Operation::Reserve(self.expect_int()?))
            }
            TokenKind::Clear => {
                self.advance();
                self.skip_newlines();
                if *self.peek() == TokenKind::Frame {
                    self.advance();
                    Ok(Operation::Clear(ClearKind::Frame))
                } else {
                    Ok(Operation::Clear(ClearKind::Stack))
                }
            }
            TokenKind::Size => {
                self.advance();
                Ok(Operation::StackSize)
            }
            TokenKind::Load => {
                self.advance();
                self.parse_load_store(true)
            }
            TokenKind::Store => {
                self.advance();
                self.parse_load_store(false)
            }
            TokenKind::Commit => {
                self.advance();
                Ok(Operation::Commit)
            }
            TokenKind::CommitIndex => {
                self.advance();
                Ok(Operation::CommitIndex)
            }
            TokenKind::Revert => {
                self.advance();
                Ok(Operation::Revert)
            }
            TokenKind::Inc => { self.advance(); Ok(Operation::Arith(ArithOp::Inc)) }
            TokenKind::Dec => { self.advance(); Ok(Operation::Arith(ArithOp::Dec)) }
            TokenKind::Neg => { self.advance(); Ok(Operation::Arith(ArithOp::Neg)) }
            TokenKind::Add => { self.advance(); Ok(Operation::Arith(ArithOp::Add)) }
            TokenKind::Sub => { self.advance(); Ok(Operation::Arith(ArithOp::Sub)) }
            TokenKind::Mul => { self.advance(); Ok(Operation::Arith(ArithOp::Mul)) }
            TokenKind::Div => { self.advance(); Ok(Operation::Arith(ArithOp::Div)) }
            TokenKind::Not => { self.advance(); Ok(Operation::Arith(ArithOp::Not)) }
            TokenKind::And => { self.advance(); Ok(Operation::Arith(ArithOp::And)) }
            TokenKind::Or => { self.advance(); Ok(Operation::Arith(ArithOp::Or)) }
            TokenKind::Lt => { self.advance(); Ok(Operation::Arith(ArithOp::Lt)) }
            TokenKind::Gt => { self.advance(); Ok(Operation::Arith(ArithOp::Gt)) }
            TokenKind::Le => { self.advance(); Ok(Operation::Arith(ArithOp::Le)) }
            TokenKind::Ge => { self.advance(); Ok(Operation::Arith(ArithOp::Ge)) }
            TokenKind::Eq => { self.advance(); Ok(Operation::Arith(ArithOp::Eq)) }
            TokenKind::Ne => { self.advance(); Ok(Operation::Arith(ArithOp::Ne)) }
            TokenKind::Same => { self.advance(); Ok(Operation::Arith(ArithOp::Same)) }
            TokenKind::Is => { self.advance(); Ok(Operation::Arith(ArithOp::Is)) }
            TokenKind::Accumulate => {
                self.advance();
                Ok(Operation::Accumulate)
            }
            TokenKind::Coll => {
                self.advance();
                self.parse_coll()
            }
            TokenKind::If => {
                self.advance();
                self.parse_if()
            }
            TokenKind::Repeat => {
                self.advance();
                Ok(Operation::Push(TypeTag::Object, Literal::Sentinel(SentinelKind::Repeat)))
            }
            TokenKind::Invoke => {
                self.advance();
                self.skip_newlines();
                if *self.peek() == TokenKind::Tail {
                    self.advance();
                    Ok(Operation::InvokeTail)
                } else {
                    Ok(Operation::Invoke)
                }
            }
            TokenKind::Unwind => {
                self.advance();
                Ok(Operation::Unwind)
            }
            TokenKind::Halt => {
                self.advance();
                Ok(Operation::Halt)
            }
            TokenKind::Function => {
                self.advance();
                let lit = self.parse_function_literal()?;
                Ok(Operation::Push(TypeTag::Function, Literal::Function(Box::new(lit))))
            }
            TokenKind::Current => { self.advance(); Ok(Operation::Current) }
            TokenKind::SetCreator => { self.advance(); Ok(Operation::SetCreator) }
            TokenKind::SaveArgs => { self.advance(); Ok(Operation::SaveArgs) }
            TokenKind::Dtor => { self.advance(); Ok(Operation::Dtor) }
            TokenKind::Cast => {
                self.advance();
                let tag = self.parse_type_tag()?;
                Ok(Operation::Cast(tag))
            }
            TokenKind::Precision => { self.advance(); Ok(Operation::SetPrecision) }
            TokenKind::Epsilon => { self.advance(); Ok(Operation::SetEpsilon) }
            TokenKind::Ffi => {
                self.advance();
                self.parse_ffi()
            }
            TokenKind::Define => {
                self.advance();
                self.parse_define()
            }
            TokenKind::Nop => { self.advance(); Ok(Operation::Nop) }
            TokenKind::Module => {
                self.advance();
                let name = self.expect_str()?;
                Ok(Operation::Module(name))
            }
            TokenKind::Dump => {
                self.advance();
                self.skip_newlines();
                if *self.peek() == TokenKind::LParen {
                    self.advance();
                    let inner_tok = self.peek_tok().clone();
                    if inner_tok.kind == TokenKind::Checkpoint {
                        return Err(self.mismatch(
                            &inner_tok.kind,
                            "an operand (checkpoint can't be nested inline)",
                            inner_tok.line,
                            inner_tok.column,
                        ));
                    }
                    let inner = self.parse_operation(inner_tok)?;
                    self.expect_kind(TokenKind::RParen, ")")?;
                    Ok(Operation::Dump(Some(Box::new(inner))))
                } else {
                    Ok(Operation::Dump(None))
                }
            }
            TokenKind::Assert => { self.advance(); Ok(Operation::Assert) }
            TokenKind::Gc => { self.advance(); Ok(Operation::Gc) }
            other => {
                self.advance();
                Err(self.mismatch(&other, "a statement", tok.line, tok.column))
            }
        }
    }

    fn parse_push(&mut self) -> Result<Operation> {
        self.skip_newlines();
        if *self.peek() == TokenKind::Define {
            self.advance();
            let name = self.expect_ident()?;
            let obj = self.resolve_define(&name)?;
            return Ok(Operation::Push(TypeTag::Object, Literal::Define(obj)));
        }
        let tag = self.parse_type_tag()?;
        let literal = self.parse_literal_for_tag(tag)?;
        Ok(Operation::Push(tag, literal))
    }

    fn resolve_define(&mut self, name: &str) -> Result<Object> {
        let tok = self.peek_tok().clone();
        self.defines.get(name).copied().ok_or(ParseError {
            kind: ParseErrorKind::UnknownDefine(name.to_string()),
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_type_tag(&mut self) -> Result<TypeTag> {
        self.skip_newlines();
        let tok = self.advance();
        match tok.kind {
            TokenKind::TypeInt => Ok(TypeTag::Int),
            TokenKind::TypeFloat => Ok(TypeTag::Float),
            TokenKind::TypeString => Ok(TypeTag::String),
            TokenKind::TypeChar => Ok(TypeTag::Char),
            TokenKind::TypeBool => Ok(TypeTag::Bool),
            TokenKind::TypeObject => Ok(TypeTag::Object),
            TokenKind::TypePtr => Ok(TypeTag::Ptr),
            TokenKind::TypeUmap => Ok(TypeTag::Umap),
            TokenKind::TypeUset => Ok(TypeTag::Uset),
            TokenKind::TypeArray => Ok(TypeTag::Array),
            TokenKind::TypePair => Ok(TypeTag::Pair),
            TokenKind::TypeExprlist => Ok(TypeTag::Exprlist),
            TokenKind::FfiStructType => Ok(TypeTag::FfiStruct),
            // `function` does double duty: it introduces a function literal
            // block, and (here) it's the `TypeTag::Function` designator —
            // there's only one keyword for both roles.
            TokenKind::Function => Ok(TypeTag::Function),
            ref other => Err(self.mismatch(other, "a type", tok.line, tok.column)),
        }
    }

    fn parse_literal_for_tag(&mut self, tag: TypeTag) -> Result<Literal> {
        self.skip_newlines();
        match tag {
            TypeTag::Int => {
                let tok = self.advance();
                match tok.kind {
                    TokenKind::Int(n) => Ok(Literal::Int(n)),
                    TokenKind::Null => Ok(Literal::Null),
                    ref other => Err(self.mismatch(other, "an int literal", tok.line, tok.column)),
                }
            }
            TypeTag::Float => {
                let tok = self.advance();
                match tok.kind {
                    TokenKind::Float(f) => Ok(Literal::Float(f)),
                    TokenKind::Null => Ok(Literal::Null),
                    ref other => Err(self.mismatch(other, "a float literal", tok.line, tok.column)),
                }
            }
            TypeTag::String => {
                let tok = self.advance();
                match tok.kind {
                    TokenKind::Str(s) => Ok(Literal::String(s)),
                    TokenKind::Null => Ok(Literal::Null),
                    ref other => Err(self.mismatch(other, "a string literal", tok.line, tok.column)),
                }
            }
            TypeTag::Char => {
                let tok = self.advance();
                match tok.kind {
                    TokenKind::Char(c) => Ok(Literal::Char(c)),
                    TokenKind::Null => Ok(Literal::Null),
                    ref other => Err(self.mismatch(other, "a char literal", tok.line, tok.column)),
                }
            }
            TypeTag::Bool => {
                let tok = self.advance();
                match tok.kind {
                    TokenKind::True => Ok(Literal::Bool(true)),
                    TokenKind::False => Ok(Literal::Bool(false)),
                    TokenKind::Null => Ok(Literal::Null),
                    ref other => Err(self.mismatch(other, "true, false, or null", tok.line, tok.column)),
                }
            }
            TypeTag::Object => {
                let tok = self.advance();
                match tok.kind {
                    TokenKind::Null => Ok(Literal::Null),
                    TokenKind::Ident(name) => sentinel_literal(&name)
                        .ok_or_else(|| ParseError {
                            kind: ParseErrorKind::UnexpectedToken {
                                expected: "a sentinel name".into(),
                                found: name,
                            },
                            line: tok.line,
                            column: tok.column,
                        }),
                    ref other => Err(self.mismatch(other, "a sentinel name or null", tok.line, tok.column)),
                }
            }
            TypeTag::Ptr => {
                self.expect_kind(TokenKind::Null, "null")?;
                Ok(Literal::Null)
            }
            // `push array <filler>` constructs a fresh empty container;
            // `push array null` pushes the array-kind null (§4.2). Any
            // non-null literal works as the filler — the value is discarded,
            // only its presence (and not being `null`) matters.
            TypeTag::Array | TypeTag::Umap | TypeTag::Uset | TypeTag::Pair => {
                let tok = self.advance();
                match tok.kind {
                    TokenKind::Null => Ok(Literal::Null),
                    TokenKind::Int(n) => Ok(Literal::Int(n)),
                    ref other => Err(self.mismatch(other, "null or an integer filler", tok.line, tok.column)),
                }
            }
            TypeTag::Function => {
                let lit = self.parse_function_literal()?;
                Ok(Literal::Function(Box::new(lit)))
            }
            TypeTag::Exprlist | TypeTag::FfiStruct => {
                let tok = self.peek_tok().clone();
                Err(self.mismatch(
                    &tok.kind,
                    "a pushable literal (exprlist/ffi-struct values aren't push literals)",
                    tok.line,
                    tok.column,
                ))
            }
        }
    }

    fn parse_function_literal(&mut self) -> Result<FunctionLiteral> {
        self.skip_newlines();
        let name = if let TokenKind::Ident(_) = self.peek() {
            match self.advance().kind {
                TokenKind::Ident(s) => Some(s),
                _ => unreachable!(),
            }
        } else {
            None
        };
        self.skip_newlines();
        let own_stack = if *self.peek() == TokenKind::WithStack {
            self.advance();
            true
        } else {
            false
        };
        self.expect_kind(TokenKind::LBrace, "{")?;
        let mut body = self.parse_block(|k| *k == TokenKind::RBrace)?;
        self.expect_kind(TokenKind::RBrace, "}")?;
        body.is_function_body = true;
        Ok(FunctionLiteral { name, own_stack, body })
    }

    fn parse_if(&mut self) -> Result<Operation> {
        let mut links = vec![self.parse_conditional_link()?];
        loop {
            self.skip_newlines();
            if *self.peek() != TokenKind::Else {
                break;
            }
            self.advance();
            self.skip_newlines();
            if *self.peek() == TokenKind::If {
                self.advance();
                links.push(self.parse_conditional_link()?);
            } else {
                self.expect_kind(TokenKind::LBrace, "{")?;
                let body = self.parse_block(|k| *k == TokenKind::RBrace)?;
                self.expect_kind(TokenKind::RBrace, "}")?;
                links.push(ConditionalLink { guard: None, body });
                break;
            }
        }
        Ok(Operation::If(links))
    }

    fn parse_conditional_link(&mut self) -> Result<ConditionalLink> {
        self.expect_kind(TokenKind::LParen, "(")?;
        let guard = self.parse_block(|k| *k == TokenKind::RParen)?;
        self.expect_kind(TokenKind::RParen, ")")?;
        self.expect_kind(TokenKind::LBrace, "{")?;
        let body = self.parse_block(|k| *k == TokenKind::RBrace)?;
        self.expect_kind(TokenKind::RBrace, "}")?;
        Ok(ConditionalLink { guard: Some(guard), body })
    }

    fn parse_coll(&mut self) -> Result<Operation> {
        self.skip_newlines();
        let tok = self.advance();
        let op = match tok.kind {
            TokenKind::Get => CollOp::Get,
            TokenKind::Put => CollOp::Put,
            TokenKind::Append => CollOp::Append,
            TokenKind::Insert => CollOp::Insert,
            TokenKind::Del => CollOp::Del,
            TokenKind::Contains => CollOp::Contains,
            TokenKind::Reverse => CollOp::Reverse,
            TokenKind::Size => CollOp::Size,
            TokenKind::Clear => CollOp::Clear,
            TokenKind::Projection => CollOp::Projection,
            TokenKind::Spread => CollOp::Spread,
            TokenKind::RSpread => CollOp::RSpread,
            TokenKind::Foreach => {
                self.expect_kind(TokenKind::LBrace, "{")?;
                let body = self.parse_block(|k| *k == TokenKind::RBrace)?;
                self.expect_kind(TokenKind::RBrace, "}")?;
                CollOp::Foreach(body)
            }
            ref other => return Err(self.mismatch(other, "a collection opcode", tok.line, tok.column)),
        };
        Ok(Operation::Coll(op))
    }

    fn parse_load_store(&mut self, is_load: bool) -> Result<Operation> {
        self.skip_newlines();
        let tok = self.peek_tok().clone();
        let (mode, idx) = match tok.kind {
            TokenKind::Int(_) => (AddressMode::TopRelative, self.expect_int()?),
            TokenKind::Abs => { self.advance(); (AddressMode::Abs, self.expect_int()?) }
            TokenKind::Rel => { self.advance(); (AddressMode::Rel, self.expect_int()?) }
            TokenKind::Root => { self.advance(); (AddressMode::Root, self.expect_int()?) }
            TokenKind::Parent => {
                self.advance();
                let n = self.expect_int()?;
                let idx = self.expect_int()?;
                (AddressMode::Parent(n.max(0) as u32), idx)
            }
            TokenKind::Local => { self.advance(); (AddressMode::Local, self.expect_int()?) }
            TokenKind::Arg => { self.advance(); (AddressMode::Arg, self.expect_int()?) }
            TokenKind::Commit => { self.advance(); (AddressMode::Commit, self.expect_int()?) }
            ref other => return Err(self.mismatch(other, "an address mode or integer", tok.line, tok.column)),
        };
        Ok(if is_load { Operation::Load(mode, idx) } else { Operation::Store(mode, idx) })
    }

    fn parse_ffi(&mut self) -> Result<Operation> {
        self.skip_newlines();
        let tok = self.advance();
        let op = match tok.kind {
            TokenKind::Lib => {
                let alias = self.expect_ident()?;
                let path = self.expect_str()?;
                FfiOp::Lib { alias, path }
            }
            TokenKind::Sym => {
                let alias = self.expect_ident()?;
                let name = self.expect_ident()?;
                FfiOp::Sym { alias, name }
            }
            TokenKind::Call => {
                let argc = self.expect_int()?.max(0) as u32;
                let ret = self.expect_ffi_type()?;
                FfiOp::Call { argc, ret }
            }
            TokenKind::Struct => {
                let name = self.expect_ident()?;
                let mut fields = Vec::new();
                loop {
                    self.skip_newlines();
                    if !matches!(self.peek(), TokenKind::Ident(_)) {
                        break;
                    }
                    let fname = self.expect_ident()?;
                    let fty = self.expect_ffi_type()?;
                    fields.push((fname, fty));
                }
                FfiOp::Struct { name, fields }
            }
            ref other => return Err(self.mismatch(other, "an ffi sub-opcode", tok.line, tok.column)),
        };
        Ok(Operation::Ffi(op))
    }

    fn parse_define(&mut self) -> Result<Operation> {
        let name = self.expect_ident()?;
        let tag = self.parse_type_tag()?;
        let literal = self.parse_literal_for_tag(tag)?;
        let obj = self.materialize_literal(tag, &literal);
        self.defines.insert(name.clone(), obj);
        Ok(Operation::Define(name, tag, literal))
    }

    /// Builds the long-lived, pinned `Object` a `define` binds its name to,
    /// mirroring `loom-runtime`'s `stackops::push` construction rules
    /// without needing a `Vm` (definitions live in the heap only; they have
    /// no evaluation-time side effects beyond the allocation itself).
    fn materialize_literal(&mut self, tag: TypeTag, literal: &Literal) -> Object {
        match (tag, literal) {
            (TypeTag::Int, Literal::Int(n)) => self.heap.make_int(n.clone()),
            (TypeTag::Float, Literal::Float(f)) => self.heap.alloc(ObjectData::Float(f.clone())),
            (TypeTag::String, Literal::String(s)) => self.heap.alloc(ObjectData::String(s.clone())),
            (TypeTag::Char, Literal::Char(c)) => self.heap.alloc(ObjectData::Char(*c)),
            (TypeTag::Bool, Literal::Bool(b)) => self.heap.bool_value(*b),
            (_, Literal::Null) => self.heap.null_value(null_kind_for_tag(tag)),
            (TypeTag::Object, Literal::Sentinel(kind)) => self.heap.sentinel(*kind),
            (TypeTag::Array, _) => self.heap.alloc(ObjectData::Array(Vec::new())),
            (TypeTag::Umap, _) => self.heap.alloc(ObjectData::UnorderedMap(Vec::new())),
            (TypeTag::Uset, _) => self.heap.alloc(ObjectData::UnorderedSet(Vec::new())),
            (TypeTag::Function, Literal::Function(lit)) => {
                let data = FunctionData::new(lit.name.clone(), lit.body.clone(), lit.own_stack);
                self.heap.alloc(ObjectData::Function(data))
            }
            // Unreachable given `parse_literal_for_tag`'s own matching
            // rules, but `define` can't fail after having already
            // committed its name to the table — fall back to a pointer
            // null rather than panic.
            _ => self.heap.null_value(NullKind::Pointer),
        }
    }
}

fn null_kind_for_tag(tag: TypeTag) -> NullKind {
    match tag {
        TypeTag::Int => NullKind::Int,
        TypeTag::Float => NullKind::Float,
        TypeTag::Bool => NullKind::Bool,
        TypeTag::Char => NullKind::Char,
        TypeTag::String => NullKind::String,
        TypeTag::Pair => NullKind::Pair,
        TypeTag::Array => NullKind::Array,
        TypeTag::Umap | TypeTag::Uset => NullKind::MapOrSet,
        TypeTag::Function => NullKind::Function,
        TypeTag::Ptr => NullKind::Pointer,
        TypeTag::Object | TypeTag::Exprlist | TypeTag::FfiStruct => NullKind::Pointer,
    }
}

fn sentinel_literal(name: &str) -> Option<Literal> {
    let kind = match name {
        "exit-scope" => SentinelKind::ExitScope,
        "repeat" => SentinelKind::Repeat,
        "repeat-if-true" => SentinelKind::RepeatIfTrue,
        "repeat-if-false" => SentinelKind::RepeatIfFalse,
        "tailcall-request" => SentinelKind::TailcallRequest,
        "exit-request" => SentinelKind::ExitRequest,
        "raise-request" => SentinelKind::RaiseRequest,
        "error-label" => SentinelKind::ErrorLabel,
        _ => return None,
    };
    Some(Literal::Sentinel(kind))
}
