use super::{ExpressionError, ExpressionEvaluator, ExpressionVars};
use crate::core::config::ExpressionConfig;
use dashmap::DashMap;
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};
use serde_json::{Map as JsonMap, Number, Value};
use std::sync::Arc;

/// Scope name bound to the expression input (`.`).
const INPUT_VAR: &str = "input";
/// Prefix of scope names bound to `$name` variables.
const VAR_PREFIX: &str = "var_";

/// Expression evaluator backed by a locked-down Rhai engine.
///
/// Accepts a jq-flavoured surface which is rewritten to Rhai before compilation:
///
/// | written          | evaluated as            |
/// |------------------|-------------------------|
/// | `.`, `.a.b`      | `input`, `input?.a?.b`  |
/// | `.[0]`           | `input?[0]`             |
/// | `$name`          | `var_name`              |
/// | `a // b`         | `a ?? b`            |
/// | `and`, `or`      | `&&`, `\|\|`        |
/// | `null`           | `()`                |
/// | `{k: v}`         | `#{k: v}`           |
///
/// Compiled ASTs are cached by expression text.
pub struct RhaiEvaluator {
    engine: Engine,
    cache: DashMap<String, Arc<AST>>,
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new(&ExpressionConfig::default())
    }
}

impl RhaiEvaluator {
    pub fn new(config: &ExpressionConfig) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_levels);
        engine.set_max_expr_depths(config.max_expr_depth, config.max_expr_depth);
        engine.on_print(|_| {});
        engine.on_debug(|_, _, _| {});
        RhaiEvaluator {
            engine,
            cache: DashMap::new(),
        }
    }

    fn compile(&self, expression: &str) -> Result<Arc<AST>, ExpressionError> {
        if let Some(ast) = self.cache.get(expression) {
            return Ok(ast.clone());
        }
        let source = translate(expression);
        let ast = self
            .engine
            .compile_expression(&source)
            .map_err(|err| ExpressionError::Compile {
                expression: expression.to_string(),
                message: err.to_string(),
            })?;
        let ast = Arc::new(ast);
        self.cache.insert(expression.to_string(), ast.clone());
        Ok(ast)
    }

    pub fn cached_expressions(&self) -> usize {
        self.cache.len()
    }
}

impl ExpressionEvaluator for RhaiEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        input: &Value,
        vars: &ExpressionVars,
    ) -> Result<Value, ExpressionError> {
        let ast = self.compile(expression.trim())?;

        let mut scope = Scope::new();
        scope.push_dynamic(INPUT_VAR, to_dynamic(input));
        for (name, value) in vars {
            let name = name.trim_start_matches('$');
            scope.push_dynamic(format!("{}{}", VAR_PREFIX, name), to_dynamic(value));
        }

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|err| ExpressionError::Evaluation {
                expression: expression.to_string(),
                message: err.to_string(),
            })?;
        Ok(from_dynamic(result))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Rewrite jq-flavoured syntax into Rhai source. String literals are copied untouched.
///
/// Path segments use Rhai's null-safe access (`?.`, `?[`), so reading through a missing
/// value yields `()` like jq's `null` instead of failing.
fn translate(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut out = String::with_capacity(expression.len() + 16);
    // Last non-whitespace character emitted, used to tell `.field` from `x.field`.
    let mut prev: Option<char> = None;
    // Whether the last token ends a path, so a following `[` indexes into it.
    let mut in_path = false;
    // One entry per open `[`: true when it opened an index rather than an array literal.
    let mut brackets: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' | '`' => {
                let quote = c;
                out.push(c);
                i += 1;
                while i < chars.len() {
                    let s = chars[i];
                    out.push(s);
                    i += 1;
                    if s == '\\' && i < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    } else if s == quote {
                        break;
                    }
                }
                prev = Some(quote);
                in_path = true;
            }
            '$' if chars.get(i + 1).copied().is_some_and(is_ident_start) => {
                out.push_str(VAR_PREFIX);
                i += 1;
                while i < chars.len() && is_ident_char(chars[i]) {
                    out.push(chars[i]);
                    i += 1;
                }
                prev = Some('a');
                in_path = true;
            }
            '.' => {
                let next_is_field = chars.get(i + 1).copied().is_some_and(is_ident_start);
                let is_access = prev
                    .map(|p| is_ident_char(p) || matches!(p, ')' | ']' | '}' | '"' | '\'' | '.'))
                    .unwrap_or(false);
                if is_access {
                    // `1.5` stays a number literal.
                    out.push_str(if next_is_field { "?." } else { "." });
                } else {
                    out.push_str(INPUT_VAR);
                    if next_is_field {
                        out.push_str("?.");
                    }
                    in_path = true;
                }
                prev = Some('.');
                i += 1;
            }
            '[' => {
                if in_path {
                    out.push_str("?[");
                } else {
                    out.push('[');
                }
                brackets.push(in_path);
                in_path = false;
                prev = Some('[');
                i += 1;
            }
            ']' => {
                out.push(']');
                in_path = brackets.pop().unwrap_or(false);
                prev = Some(']');
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                out.push_str("??");
                prev = Some('?');
                in_path = false;
                i += 2;
            }
            '{' => {
                out.push_str("#{");
                prev = Some('{');
                in_path = false;
                i += 1;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let after_dot = prev == Some('.');
                in_path = after_dot;
                match word.as_str() {
                    "and" if !after_dot => {
                        out.push_str("&&");
                        prev = Some('&');
                    }
                    "or" if !after_dot => {
                        out.push_str("||");
                        prev = Some('|');
                    }
                    "null" if !after_dot => {
                        out.push_str("()");
                        prev = Some(')');
                    }
                    _ => {
                        out.push_str(&word);
                        prev = Some('a');
                    }
                }
            }
            c => {
                out.push(c);
                if !c.is_whitespace() {
                    prev = Some(c);
                    in_path = c == ')';
                }
                i += 1;
            }
        }
    }
    out
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::from(0_i64)
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
        Value::Object(map) => {
            let mut rhai_map = Map::new();
            for (key, value) in map {
                rhai_map.insert(key.as_str().into(), to_dynamic(value));
            }
            Dynamic::from_map(rhai_map)
        }
    }
}

fn from_dynamic(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return Value::Number(Number::from(i));
    }
    if let Ok(f) = value.as_float() {
        return Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    if value.is_string() {
        return Value::String(value.into_string().unwrap_or_default());
    }
    if value.is_char() {
        return value
            .as_char()
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null);
    }
    if value.is_array() {
        if let Some(arr) = value.try_cast::<Array>() {
            return Value::Array(arr.into_iter().map(from_dynamic).collect());
        }
        return Value::Null;
    }
    if value.is_map() {
        if let Some(map) = value.try_cast::<Map>() {
            let mut json_map = JsonMap::new();
            for (key, value) in map {
                json_map.insert(key.to_string(), from_dynamic(value));
            }
            return Value::Object(json_map);
        }
        return Value::Null;
    }
    Value::String(value.to_string())
}
