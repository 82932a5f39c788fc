//! Math action: arithmetic first, language model second.
//!
//! Plain expressions (`+`, `-`, `*`, `/`, `^`, parentheses, unary minus)
//! are evaluated locally by a recursive-descent parser. Anything else,
//! word problems included, goes to the language model with a
//! step-by-step prompt.

use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::action::{Action, ActionArgs, ActionOutput, ActionSpec, required_str};
use tandem_core::error::ActionError;
use tandem_core::message::Message;
use tandem_core::provider::{Provider, ProviderRequest};
use tracing::debug;

pub fn math_prompt(question: &str) -> String {
    format!(
        "Solve the problem step-by-step: {question}.\n\
         Require more information if the provided information is not enough to solve the problem."
    )
}

pub struct MathAction {
    provider: Arc<dyn Provider>,
    model: String,
}

impl MathAction {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Action for MathAction {
    fn name(&self) -> &str {
        "math"
    }

    fn spec(&self) -> ActionSpec {
        ActionSpec {
            name: "math".into(),
            label: "Math".into(),
            args: vec![("question".into(), "math_question".into())],
        }
    }

    async fn execute(&self, args: &ActionArgs) -> Result<ActionOutput, ActionError> {
        let question = required_str(args, "question")?;

        if let Some(value) = extract_expression(question).and_then(|expr| evaluate(expr).ok()) {
            debug!(question, value, "Evaluated locally");
            return Ok(ActionOutput {
                content: format_number(value),
                data: Some(serde_json::json!({ "result": value })),
            });
        }

        let request = ProviderRequest::new(
            self.model.clone(),
            vec![Message::user(math_prompt(question))],
        );
        let response = self.provider.complete(request).await?;
        Ok(ActionOutput::text(response.content))
    }
}

/// Strip conversational framing ("What is", "?", "=") around an expression.
fn extract_expression(question: &str) -> Option<&str> {
    let mut q = question.trim();
    let lower = q.to_ascii_lowercase();
    for prefix in ["what is", "what's", "compute", "calculate", "evaluate"] {
        if lower.starts_with(prefix) {
            q = &q[prefix.len()..];
            break;
        }
    }
    let q = q.trim().trim_end_matches(['?', '.', '=', ' ']).trim();
    (!q.is_empty()).then_some(q)
}

/// Drop the fractional part of whole numbers.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate a mathematical expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("Unexpected token at position {}: {tok:?}", parser.pos));
    }
    if !result.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' | '×' => Token::Star,
            '/' | '÷' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num_str = &input[start..end];
                let num = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {num_str}"))?;
                Token::Number(num)
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.consume();
                    left += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.consume();
                    left -= self.parse_term()?;
                }
                _ => return Ok(left),
            }
        }
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.consume();
                    left *= self.parse_unary()?;
                }
                Some(Token::Slash) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".into());
                    }
                    left /= right;
                }
                _ => return Ok(left),
            }
        }
    }

    // unary = '-' unary | power
    fn parse_unary(&mut self) -> Result<f64, String> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            return Ok(-self.parse_unary()?);
        }
        self.parse_power()
    }

    // power = primary ('^' unary)?   (right-associative)
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                let val = self.parse_expr()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}
