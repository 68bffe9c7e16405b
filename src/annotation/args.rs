//! Argument grammar shared by every annotation attribute.
//!
//! ```text
//! #[response(200, description = "Found", ref = Task)]
//! #[property(type = "string", enum = ["todo", "done"], min_length = 1)]
//! #[schema(required("title"), properties(title(type = "string")))]
//! ```

use super::AnnotationError;
use serde_json::{Map, Number, Value};
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{bracketed, parenthesized, token, Attribute, Expr, Ident, Lit, Meta, Token};

/// Parsed value of one argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// `key` with no value
    Flag,
    Str(String),
    Number(Number),
    Bool(bool),
    /// `key = some::Type`
    Path(String),
    /// `key = [a, b]`
    Array(Vec<ArgValue>),
    /// `key(nested = 1, ..)`
    List(ArgList),
}

/// One `name = value` entry. Positional values have an empty name.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub value: ArgValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgList {
    pub args: Vec<Arg>,
}

impl ArgList {
    /// Parses the arguments of an attribute. `#[hidden]` yields an empty list.
    pub fn from_attribute(attr: &Attribute) -> Result<Self, AnnotationError> {
        match &attr.meta {
            Meta::Path(_) => Ok(ArgList::default()),
            Meta::List(list) => syn::parse2::<ArgList>(list.tokens.clone())
                .map_err(|e| AnnotationError::Syntax(e.to_string())),
            Meta::NameValue(name_value) => match &name_value.value {
                Expr::Lit(expr_lit) => Ok(ArgList {
                    args: vec![Arg {
                        name: String::new(),
                        value: lit_value(&expr_lit.lit, false)
                            .map_err(|e| AnnotationError::Syntax(e.to_string()))?,
                    }],
                }),
                _ => Err(AnnotationError::Syntax(
                    "expected a literal after `=`".to_string(),
                )),
            },
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.args.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl Parse for ArgList {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = Vec::new();

        while !input.is_empty() {
            let arg = if input.peek(Lit) || input.peek(Token![-]) || input.peek(token::Bracket) {
                Arg {
                    name: String::new(),
                    value: parse_value(input)?,
                }
            } else {
                let ident = Ident::parse_any(input)?;
                let name = ident.unraw().to_string();
                let value = if input.peek(Token![=]) {
                    input.parse::<Token![=]>()?;
                    parse_value(input)?
                } else if input.peek(token::Paren) {
                    parse_group(input)?
                } else {
                    ArgValue::Flag
                };
                Arg { name, value }
            };
            args.push(arg);

            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }

        Ok(ArgList { args })
    }
}

/// `( .. )` holds nested arguments; plain values inside it become positional entries.
fn parse_group(input: ParseStream) -> syn::Result<ArgValue> {
    let content;
    parenthesized!(content in input);
    Ok(ArgValue::List(content.parse()?))
}

fn parse_value(input: ParseStream) -> syn::Result<ArgValue> {
    if input.peek(token::Bracket) {
        let content;
        bracketed!(content in input);
        let values = Punctuated::<ArgValue, Token![,]>::parse_terminated_with(&content, parse_value)?;
        return Ok(ArgValue::Array(values.into_iter().collect()));
    }

    if input.peek(Token![-]) {
        input.parse::<Token![-]>()?;
        let lit: Lit = input.parse()?;
        return lit_value(&lit, true);
    }

    if input.peek(Lit) {
        let lit: Lit = input.parse()?;
        return lit_value(&lit, false);
    }

    if input.peek(Ident::peek_any) {
        let path = syn::Path::parse_mod_style(input)?;
        let joined = path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect::<Vec<_>>()
            .join("::");
        return Ok(ArgValue::Path(joined));
    }

    Err(input.error("expected a literal, a path or an array"))
}

fn lit_value(lit: &Lit, negative: bool) -> syn::Result<ArgValue> {
    let value = match lit {
        Lit::Str(s) if !negative => ArgValue::Str(s.value()),
        Lit::Char(c) if !negative => ArgValue::Str(c.value().to_string()),
        Lit::Bool(b) if !negative => ArgValue::Bool(b.value),
        Lit::Int(i) => {
            let number = if negative {
                i.base10_parse::<i64>().map(|v| Number::from(-v))?
            } else {
                match i.base10_parse::<u64>() {
                    Ok(v) => Number::from(v),
                    Err(_) => Number::from(i.base10_parse::<i64>()?),
                }
            };
            ArgValue::Number(number)
        }
        Lit::Float(f) => {
            let v = f.base10_parse::<f64>()?;
            let v = if negative { -v } else { v };
            let number = Number::from_f64(v)
                .ok_or_else(|| syn::Error::new(f.span(), "number is not finite"))?;
            ArgValue::Number(number)
        }
        other => return Err(syn::Error::new(other.span(), "unsupported literal")),
    };
    Ok(value)
}

impl Arg {
    fn invalid(&self, expected: &'static str) -> AnnotationError {
        AnnotationError::InvalidValue {
            name: self.display_name(),
            expected,
        }
    }

    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            "<positional>".to_string()
        } else {
            self.name.clone()
        }
    }

    pub fn is_positional(&self) -> bool {
        self.name.is_empty()
    }

    /// A string or a path; paths are accepted so `ref = Task` reads naturally.
    pub fn as_string(&self) -> Result<String, AnnotationError> {
        match &self.value {
            ArgValue::Str(s) | ArgValue::Path(s) => Ok(s.clone()),
            _ => Err(self.invalid("a string")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, AnnotationError> {
        match &self.value {
            ArgValue::Flag => Ok(true),
            ArgValue::Bool(b) => Ok(*b),
            _ => Err(self.invalid("a boolean")),
        }
    }

    pub fn as_u64(&self) -> Result<u64, AnnotationError> {
        match &self.value {
            ArgValue::Number(n) => n.as_u64().ok_or_else(|| self.invalid("a non-negative integer")),
            _ => Err(self.invalid("a non-negative integer")),
        }
    }

    pub fn as_number(&self) -> Result<Number, AnnotationError> {
        match &self.value {
            ArgValue::Number(n) => Ok(n.clone()),
            _ => Err(self.invalid("a number")),
        }
    }

    pub fn as_json(&self) -> Value {
        value_to_json(&self.value)
    }

    /// An array, or a single scalar taken as a one-element list.
    pub fn as_json_list(&self) -> Result<Vec<Value>, AnnotationError> {
        match &self.value {
            ArgValue::Array(values) => Ok(values.iter().map(value_to_json).collect()),
            ArgValue::List(list) if list.iter().all(Arg::is_positional) => {
                Ok(list.iter().map(|a| value_to_json(&a.value)).collect())
            }
            ArgValue::Flag | ArgValue::List(_) => Err(self.invalid("an array")),
            other => Ok(vec![value_to_json(other)]),
        }
    }

    pub fn as_string_list(&self) -> Result<Vec<String>, AnnotationError> {
        let strings = match &self.value {
            ArgValue::Str(s) | ArgValue::Path(s) => return Ok(vec![s.clone()]),
            ArgValue::Array(values) => values
                .iter()
                .map(|v| match v {
                    ArgValue::Str(s) | ArgValue::Path(s) => Some(s.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>(),
            ArgValue::List(list) => list
                .iter()
                .map(|a| match &a.value {
                    ArgValue::Flag => Some(a.name.clone()),
                    ArgValue::Str(s) | ArgValue::Path(s) if a.is_positional() => Some(s.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>(),
            _ => None,
        };
        strings.ok_or_else(|| self.invalid("a list of strings"))
    }

    pub fn as_list(&self) -> Result<&ArgList, AnnotationError> {
        match &self.value {
            ArgValue::List(list) => Ok(list),
            _ => Err(self.invalid("nested arguments")),
        }
    }

    /// A nested list interpreted as a `key = value` map.
    pub fn as_json_map(&self) -> Result<Map<String, Value>, AnnotationError> {
        match &self.value {
            ArgValue::List(list) => Ok(list_to_json(list)),
            _ => Err(self.invalid("nested `key = value` arguments")),
        }
    }
}

fn value_to_json(value: &ArgValue) -> Value {
    match value {
        ArgValue::Flag => Value::Bool(true),
        ArgValue::Str(s) | ArgValue::Path(s) => Value::String(s.clone()),
        ArgValue::Number(n) => Value::Number(n.clone()),
        ArgValue::Bool(b) => Value::Bool(*b),
        ArgValue::Array(values) => Value::Array(values.iter().map(value_to_json).collect()),
        ArgValue::List(list) => Value::Object(list_to_json(list)),
    }
}

fn list_to_json(list: &ArgList) -> Map<String, Value> {
    list.iter()
        .map(|arg| (arg.name.clone(), value_to_json(&arg.value)))
        .collect()
}
