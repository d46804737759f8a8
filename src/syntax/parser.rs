use crate::diagnostic::Diagnostic;
use crate::ir::*;
use crate::span::{Span, Spanned};

use super::lexer::Lexeme;

const MAX_NESTING_DEPTH: u32 = 256;

pub struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
    ids: StmtIdSource,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
            ids: StmtIdSource::new(),
        }
    }

    /// Parse a whole program: either a single braced block or a bare
    /// statement sequence running to end of file.
    pub fn parse_program(mut self) -> Result<Block, Vec<Diagnostic>> {
        let block = if self.at(&Lexeme::LBrace) {
            self.advance();
            let block = self.parse_block_body(&Lexeme::RBrace);
            self.expect(&Lexeme::RBrace);
            if !self.at(&Lexeme::Eof) {
                self.error_at_current("expected end of file after top-level block");
            }
            block
        } else {
            self.parse_block_body(&Lexeme::Eof)
        };

        if self.diagnostics.is_empty() {
            Ok(block)
        } else {
            Err(self.diagnostics)
        }
    }

    fn parse_block(&mut self) -> Block {
        self.expect(&Lexeme::LBrace);
        let block = self.parse_block_body(&Lexeme::RBrace);
        self.expect(&Lexeme::RBrace);
        block
    }

    fn parse_block_body(&mut self, terminator: &Lexeme) -> Block {
        if !self.enter_nesting() {
            return Block::default();
        }
        let mut stmts = Vec::new();
        while !self.at(terminator) && !self.at(&Lexeme::Eof) {
            let before = self.pos;
            stmts.push(self.parse_stmt());
            if self.pos == before {
                // No progress — skip the offending token to avoid looping.
                self.advance();
            }
        }
        self.exit_nesting();
        Block { stmts }
    }

    fn parse_stmt(&mut self) -> Stmt {
        let start = self.current_span();
        let kind = match self.peek().clone() {
            Lexeme::Let => self.parse_let(),
            Lexeme::Function => self.parse_function(),
            Lexeme::If => {
                self.advance();
                let cond = self.parse_expr();
                let body = self.parse_block();
                StmtKind::If { cond, body }
            }
            Lexeme::Switch => self.parse_switch(),
            Lexeme::For => {
                self.advance();
                let init = self.parse_block();
                let cond = self.parse_expr();
                let post = self.parse_block();
                let body = self.parse_block();
                StmtKind::For {
                    init,
                    cond,
                    post,
                    body,
                }
            }
            Lexeme::Break => {
                self.advance();
                StmtKind::Break
            }
            Lexeme::Continue => {
                self.advance();
                StmtKind::Continue
            }
            Lexeme::Leave => {
                self.advance();
                StmtKind::Leave
            }
            Lexeme::LBrace => StmtKind::Block(self.parse_block()),
            _ => self.parse_expr_or_assign(),
        };
        let span = start.merge(self.prev_span());
        Stmt {
            id: self.ids.next_id(),
            span,
            kind,
        }
    }

    fn parse_let(&mut self) -> StmtKind {
        self.expect(&Lexeme::Let);
        let mut vars = vec![self.expect_ident().node];
        while self.eat(&Lexeme::Comma) {
            vars.push(self.expect_ident().node);
        }
        let value = if self.eat(&Lexeme::ColonEq) {
            Some(self.parse_expr())
        } else {
            None
        };
        StmtKind::Let { vars, value }
    }

    fn parse_function(&mut self) -> StmtKind {
        self.expect(&Lexeme::Function);
        let name = self.expect_ident().node;
        self.expect(&Lexeme::LParen);
        let mut params = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            params.push(self.expect_ident().node);
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::RParen);
        let mut returns = Vec::new();
        if self.eat(&Lexeme::Arrow) {
            returns.push(self.expect_ident().node);
            while self.eat(&Lexeme::Comma) {
                returns.push(self.expect_ident().node);
            }
        }
        let body = self.parse_block();
        StmtKind::FnDef(FunctionDef {
            name,
            params,
            returns,
            body,
        })
    }

    fn parse_switch(&mut self) -> StmtKind {
        self.expect(&Lexeme::Switch);
        let expr = self.parse_expr();
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            if self.eat(&Lexeme::Case) {
                let value = self.expect_integer();
                let body = self.parse_block();
                cases.push(SwitchCase { value, body });
            } else if self.eat(&Lexeme::Default) {
                if default.is_some() {
                    self.error_at_current("duplicate 'default' case in switch");
                }
                default = Some(self.parse_block());
            } else {
                break;
            }
        }
        if cases.is_empty() && default.is_none() {
            self.error_at_current("switch requires at least one case");
        }
        StmtKind::Switch {
            expr,
            cases,
            default,
        }
    }

    /// Statement starting with an identifier: either an assignment
    /// `a, b := expr` or a call evaluated for its effects.
    fn parse_expr_or_assign(&mut self) -> StmtKind {
        if let Lexeme::Ident(_) = self.peek() {
            // Lookahead: ident (, ident)* ':=' means assignment.
            if self.is_assignment_ahead() {
                let mut targets = vec![self.expect_ident().node];
                while self.eat(&Lexeme::Comma) {
                    targets.push(self.expect_ident().node);
                }
                self.expect(&Lexeme::ColonEq);
                let value = self.parse_expr();
                return StmtKind::Assign { targets, value };
            }
        }
        let expr = self.parse_expr();
        if !matches!(expr.kind, ExprKind::Call { .. }) {
            self.diagnostics.push(
                Diagnostic::error(
                    "only calls can be used as statements".to_string(),
                    expr.span,
                )
                .with_help("bind the value with 'let' or discard it with pop(...)".to_string()),
            );
        }
        StmtKind::Expr(expr)
    }

    fn is_assignment_ahead(&self) -> bool {
        let mut i = self.pos;
        loop {
            match self.tokens.get(i).map(|t| &t.node) {
                Some(Lexeme::Ident(_)) => i += 1,
                _ => return false,
            }
            match self.tokens.get(i).map(|t| &t.node) {
                Some(Lexeme::ColonEq) => return true,
                Some(Lexeme::Comma) => i += 1,
                _ => return false,
            }
        }
    }

    fn parse_expr(&mut self) -> Expr {
        let start = self.current_span();
        match self.peek().clone() {
            Lexeme::Integer(value) => {
                self.advance();
                Expr {
                    span: start,
                    kind: ExprKind::Literal(value),
                }
            }
            Lexeme::Ident(name) => {
                self.advance();
                if self.at(&Lexeme::LParen) {
                    if !self.enter_nesting() {
                        return Expr {
                            span: start,
                            kind: ExprKind::Ident(name),
                        };
                    }
                    self.advance();
                    let mut args = Vec::new();
                    while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
                        args.push(self.parse_expr());
                        if !self.eat(&Lexeme::Comma) {
                            break;
                        }
                    }
                    self.expect(&Lexeme::RParen);
                    self.exit_nesting();
                    Expr {
                        span: start.merge(self.prev_span()),
                        kind: ExprKind::Call { name, args },
                    }
                } else {
                    Expr {
                        span: start,
                        kind: ExprKind::Ident(name),
                    }
                }
            }
            other => {
                self.error_at_current(&format!("expected expression, found {}", other.description()));
                self.advance();
                Expr {
                    span: start,
                    kind: ExprKind::Literal(0),
                }
            }
        }
    }

    // ── Token helpers ──

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.current_span()
        } else {
            self.tokens[(self.pos - 1).min(self.tokens.len() - 1)].span
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let at = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        &self.tokens[at]
    }

    fn at(&self, token: &Lexeme) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            ));
            self.current_span()
        }
    }

    fn expect_ident(&mut self) -> Spanned<String> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_at_current(&format!(
                "expected identifier, found {}",
                self.peek().description()
            ));
            Spanned::new(String::new(), self.current_span())
        }
    }

    fn expect_integer(&mut self) -> u64 {
        if let Lexeme::Integer(value) = self.peek().clone() {
            self.advance();
            value
        } else {
            self.error_at_current(&format!(
                "expected integer, found {}",
                self.peek().description()
            ));
            0
        }
    }

    fn error_at_current(&mut self, message: &str) {
        self.diagnostics
            .push(Diagnostic::error(message.to_string(), self.current_span()));
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_at_current("nesting depth exceeded (maximum 256 levels)");
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }
}
