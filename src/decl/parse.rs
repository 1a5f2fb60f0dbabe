//! Type expressions used in declaration files.
//!
//! ```text
//! expr := term ('|' term)*
//! term := ident ('[' expr (',' expr)* ']')?
//! ```
use crate::descriptor::{Descriptor, TypeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Open,
    Close,
    Comma,
    Pipe,
}

fn tokenize(src: &str) -> Result<Vec<Token<'_>>, String> {
    let mut out = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'[' => { out.push(Token::Open); i += 1 }
            b']' => { out.push(Token::Close); i += 1 }
            b',' => { out.push(Token::Comma); i += 1 }
            b'|' => { out.push(Token::Pipe); i += 1 }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'.')) {
                    i += 1;
                }
                out.push(Token::Ident(&src[start..i]));
            }
            other => return Err(format!("unexpected character '{}' at offset {i}", other as char)),
        }
    }
    Ok(out)
}

struct Parser<'a, 'l> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    lookup: &'l dyn Fn(&str) -> Option<Descriptor>,
}

/// Parse a type expression. `lookup` resolves names that are not built in
/// (declared enums and object types).
pub fn parse_type(src: &str, lookup: &dyn Fn(&str) -> Option<Descriptor>) -> Result<Descriptor, String> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err("empty type expression".to_string());
    }
    let mut parser = Parser { tokens, pos: 0, lookup };
    let d = parser.expr()?;
    match parser.peek() {
        None => Ok(d),
        Some(t) => Err(format!("unexpected {t:?} after complete type in `{src}`")),
    }
}

impl<'a> Parser<'a, '_> {
    fn peek(&self) -> Option<Token<'a>> { self.tokens.get(self.pos).copied() }

    fn bump(&mut self) -> Option<Token<'a>> {
        let t = self.peek();
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Result<Descriptor, String> {
        let mut members = vec![self.term()?];
        while self.peek() == Some(Token::Pipe) {
            self.bump();
            members.push(self.term()?);
        }
        Ok(if members.len() == 1 { members.remove(0) } else { Descriptor::union(members) })
    }

    fn term(&mut self) -> Result<Descriptor, String> {
        let name = match self.bump() {
            Some(Token::Ident(name)) => name,
            Some(t) => return Err(format!("expected a type name, found {t:?}")),
            None => return Err("expected a type name, found end of input".to_string()),
        };
        let args = if self.peek() == Some(Token::Open) {
            self.bump();
            let mut args = vec![self.expr()?];
            loop {
                match self.bump() {
                    Some(Token::Comma) => args.push(self.expr()?),
                    Some(Token::Close) => break,
                    Some(t) => return Err(format!("expected ',' or ']' in `{name}[..]`, found {t:?}")),
                    None => return Err(format!("unclosed `{name}[`")),
                }
            }
            Some(args)
        } else {
            None
        };
        build(name, args, self.lookup)
    }
}

fn build(name: &str, args: Option<Vec<Descriptor>>, lookup: &dyn Fn(&str) -> Option<Descriptor>) -> Result<Descriptor, String> {
    let Some(mut args) = args else {
        return Ok(match name {
            "any" => Descriptor::Any,
            "null" | "none" => Descriptor::null(),
            "bool" => Descriptor::bool(),
            "int" => Descriptor::int(),
            "float" => Descriptor::float(),
            "str" => Descriptor::str(),
            "date" => Descriptor::Primitive(TypeKey::date()),
            "datetime" => Descriptor::Primitive(TypeKey::datetime()),
            "time" => Descriptor::Primitive(TypeKey::time()),
            "uuid" => Descriptor::Primitive(TypeKey::uuid()),
            "decimal" => Descriptor::Primitive(TypeKey::decimal()),
            "list" => Descriptor::Primitive(TypeKey::list()),
            "tuple" => Descriptor::Primitive(TypeKey::tuple()),
            "dict" => Descriptor::Primitive(TypeKey::dict()),
            "set" => Descriptor::Primitive(TypeKey::set()),
            other => lookup(other).ok_or_else(|| format!("unknown type `{other}`"))?,
        });
    };
    let given = args.len();
    let arity = |n: usize| -> Result<(), String> {
        if given == n { Ok(()) } else { Err(format!("`{name}` takes {n} type argument(s), got {given}")) }
    };
    Ok(match name {
        "list" => { arity(1)?; Descriptor::list(args.remove(0)) }
        "set" => { arity(1)?; Descriptor::set(args.remove(0)) }
        "optional" => { arity(1)?; Descriptor::optional(args.remove(0)) }
        "dict" => {
            arity(2)?;
            let value = args.remove(1);
            Descriptor::dict(args.remove(0), value)
        }
        "tuple" => Descriptor::tuple(args),
        other => return Err(format!("`{other}` does not take type arguments")),
    })
}
