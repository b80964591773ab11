//! Recursive-descent parser over the token stream, precedence climbing for
//! expressions.

use crate::ast::{BinOp, Expr, FunctionDecl, Program, Stmt, TopItem, UnOp};
use crate::error::CompileError;
use crate::lexer::{Lexer, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, CompileError>;

pub fn parse(source: &str) -> Result<Program, Vec<CompileError>> {
    let tokens = Lexer::new(source).tokenize().map_err(|e| vec![e])?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_program().map_err(|e| vec![e])
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: &TokenKind) -> PResult<()> {
        if self.peek() == expected {
            self.bump();
            Ok(())
        } else {
            Err(CompileError::new(self.line(), format!("expected {expected:?}, found {:?}", self.peek())))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.bump() {
            TokenKind::Ident(name) => Ok(name),
            other => Err(CompileError::new(self.line(), format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_program(&mut self) -> PResult<Program> {
        let mut items = Vec::new();
        while *self.peek() != TokenKind::Eof {
            items.push(self.parse_top_item()?);
        }
        Ok(Program { items })
    }

    fn parse_top_item(&mut self) -> PResult<TopItem> {
        if *self.peek() == TokenKind::Function {
            Ok(TopItem::Function(self.parse_function_decl()?))
        } else {
            Ok(TopItem::Stmt(self.parse_stmt()?))
        }
    }

    fn parse_function_decl(&mut self) -> PResult<FunctionDecl> {
        let line = self.line();
        self.expect(&TokenKind::Function)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if *self.peek() != TokenKind::RParen {
            params.push(self.expect_ident()?);
            while *self.peek() == TokenKind::Comma {
                self.bump();
                params.push(self.expect_ident()?);
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(FunctionDecl { name, params, body, line })
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while *self.peek() != TokenKind::RBrace {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        match self.peek().clone() {
            TokenKind::Global => {
                self.bump();
                let name = self.expect_ident()?;
                self.expect(&TokenKind::Assign)?;
                let value = self.parse_expr()?;
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt::GlobalDecl { name, value, line })
            }
            TokenKind::Local => {
                self.bump();
                let name = self.expect_ident()?;
                self.expect(&TokenKind::Assign)?;
                let value = self.parse_expr()?;
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt::LocalDecl { name, value, line })
            }
            TokenKind::Return => {
                self.bump();
                let value = if *self.peek() == TokenKind::Semi { None } else { Some(self.parse_expr()?) };
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt::Return { value, line })
            }
            TokenKind::If => {
                self.bump();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let then_branch = self.parse_block()?;
                let else_branch = if *self.peek() == TokenKind::Else {
                    self.bump();
                    self.parse_block()?
                } else {
                    Vec::new()
                };
                Ok(Stmt::If { cond, then_branch, else_branch, line })
            }
            TokenKind::While => {
                self.bump();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body, line })
            }
            TokenKind::Ident(name) if self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::Assign) => {
                self.bump();
                self.bump();
                let value = self.parse_expr()?;
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt::Assign { name, value, line })
            }
            _ => {
                let value = self.parse_expr()?;
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt::ExprStmt { value, line })
            }
        }
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == TokenKind::OrOr {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while *self.peek() == TokenKind::AndAnd {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.peek() {
            TokenKind::Minus => {
                self.bump();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            TokenKind::Bang => {
                self.bump();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let line = self.line();
        match self.bump() {
            TokenKind::Int(v) => Ok(Expr::Int(v)),
            TokenKind::Float(v) => Ok(Expr::Float(v)),
            TokenKind::Str(v) => Ok(Expr::Str(v)),
            TokenKind::Null => Ok(Expr::Null),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if *self.peek() == TokenKind::LParen {
                    self.bump();
                    let mut args = Vec::new();
                    if *self.peek() != TokenKind::RParen {
                        args.push(self.parse_expr()?);
                        while *self.peek() == TokenKind::Comma {
                            self.bump();
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(&TokenKind::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(CompileError::new(line, format!("unexpected token {other:?} in expression"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_global_declaration_with_arithmetic() {
        let program = parse("global x = 3 + 4; return x;").unwrap();
        assert_eq!(program.items.len(), 2);
        assert!(matches!(program.items[0], TopItem::Stmt(Stmt::GlobalDecl { .. })));
        assert!(matches!(program.items[1], TopItem::Stmt(Stmt::Return { .. })));
    }

    #[test]
    fn parses_a_function_declaration() {
        let program = parse("function f(a, b) { return a + b; }").unwrap();
        match &program.items[0] {
            TopItem::Function(f) => {
                assert_eq!(f.name, "f");
                assert_eq!(f.params, vec!["a", "b"]);
                assert_eq!(f.body.len(), 1);
            }
            other => panic!("expected a function decl, got {other:?}"),
        }
    }

    #[test]
    fn operator_precedence_binds_multiplication_tighter_than_addition() {
        let program = parse("global x = 1 + 2 * 3;").unwrap();
        match &program.items[0] {
            TopItem::Stmt(Stmt::GlobalDecl { value, .. }) => {
                assert_eq!(*value, Expr::Binary(BinOp::Add, Box::new(Expr::Int(1)), Box::new(Expr::Binary(BinOp::Mul, Box::new(Expr::Int(2)), Box::new(Expr::Int(3))))));
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn reports_an_error_on_a_missing_semicolon() {
        assert!(parse("global x = 1").is_err());
    }

    #[test]
    fn parses_if_else_and_while() {
        let program = parse("function f() { if (1) { return 1; } else { return 0; } while (1) { return 2; } }").unwrap();
        match &program.items[0] {
            TopItem::Function(f) => {
                assert!(matches!(f.body[0], Stmt::If { .. }));
                assert!(matches!(f.body[1], Stmt::While { .. }));
            }
            other => panic!("unexpected item {other:?}"),
        }
    }
}
