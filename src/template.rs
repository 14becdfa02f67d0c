// A small text template language modelled on Go's `text/template`.
//
// Templates are parsed once into a node tree and executed against a
// `serde_json::Value`. Supported syntax:
//
// - `{{.}}`, `{{.Field.Sub}}`, `{{"literal"}}`, `` {{`raw`}} ``, integers,
//   `true`/`false`
// - calls `{{bold "x"}}` and pipelines `{{.Name | bold}}`, where the piped
//   value becomes the last argument of the next function
// - `{{if}}`, `{{with}}`, `{{range}}`, each with an optional `{{else}}`,
//   closed by `{{end}}`
// - `{{- ` / ` -}}` whitespace trimming and `{{/* comments */}}`
//
// Functions are the style tokens from [`crate::style`] plus `printf`.

use serde_json::Value;

use crate::error::TemplateError;
use crate::style::Styles;

const PRINTF: &str = "printf";
const NO_VALUE: &str = "<no value>";

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    root: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Action(Pipeline),
    If(Branch),
    With(Branch),
    Range(Branch),
}

#[derive(Debug, Clone)]
struct Branch {
    pipe: Pipeline,
    body: Vec<Node>,
    otherwise: Vec<Node>,
}

#[derive(Debug, Clone)]
struct Pipeline {
    cmds: Vec<Cmd>,
}

#[derive(Debug, Clone)]
enum Cmd {
    Func { name: String, args: Vec<Operand> },
    Operand(Operand),
}

#[derive(Debug, Clone)]
enum Operand {
    Dot,
    Field(Vec<String>),
    Literal(Value),
    Call(String),
}

impl Template {
    /// Parse `source`. `name` is only used in error messages.
    pub fn parse(name: &str, source: &str) -> Result<Template, TemplateError> {
        let items = split_actions(name, source)?;
        let mut parser = Parser {
            name,
            items: items.into_iter(),
        };
        let (root, stop) = parser.list()?;
        match stop {
            Stop::Eof => Ok(Template {
                name: name.to_string(),
                root,
            }),
            Stop::End => Err(TemplateError::parse(name, "unexpected {{end}}")),
            Stop::Else => Err(TemplateError::parse(name, "unexpected {{else}}")),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute against `data`, calling style functions through `styles`.
    pub fn execute(&self, data: &Value, styles: &mut Styles) -> Result<String, TemplateError> {
        let mut exec = Exec {
            name: &self.name,
            styles,
        };
        let mut out = String::new();
        exec.walk(&mut out, &self.root, data)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Lexing

#[derive(Debug)]
enum Item {
    Text(String),
    Action(String),
}

/// Split source into literal text and the inner text of `{{ }}` actions,
/// applying trim markers on the way.
fn split_actions(name: &str, source: &str) -> Result<Vec<Item>, TemplateError> {
    let mut items = Vec::new();
    let mut rest = source;
    let mut trim_next = false;

    while let Some(open) = rest.find("{{") {
        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start();
        }
        let mut body = &rest[open + 2..];
        if let Some(stripped) = body.strip_prefix('-') {
            if stripped.starts_with(char::is_whitespace) {
                text = text.trim_end();
                body = stripped;
            }
        }
        if !text.is_empty() {
            items.push(Item::Text(text.to_string()));
        }

        let close = find_close(body)
            .ok_or_else(|| TemplateError::parse(name, "unclosed action"))?;
        let mut inner = &body[..close];
        trim_next = false;
        if let Some(stripped) = inner.strip_suffix('-') {
            if stripped.ends_with(char::is_whitespace) {
                inner = stripped;
                trim_next = true;
            }
        }
        items.push(Item::Action(inner.trim().to_string()));
        rest = &body[close + 2..];
    }

    let text = if trim_next { rest.trim_start() } else { rest };
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
    Ok(items)
}

/// Byte offset of the `}}` closing an action, skipping quoted strings.
fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dot,
    Field(Vec<String>),
    Str(String),
    Int(i64),
    Bool(bool),
    Ident(String),
    Pipe,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(name: &str, src: &str) -> Result<Vec<Token>, TemplateError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(TemplateError::parse(name, "unterminated quoted string")),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = match chars.get(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('"') => '"',
                                Some('\\') => '\\',
                                Some(other) => {
                                    return Err(TemplateError::parse(
                                        name,
                                        format!("unknown escape sequence \\{other}"),
                                    ))
                                }
                                None => return Err(TemplateError::parse(name, "unterminated quoted string")),
                            };
                            s.push(escaped);
                            i += 2;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
                i += 1;
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .map(|offset| start + offset)
                    .ok_or_else(|| TemplateError::parse(name, "unterminated raw quoted string"))?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '.' => {
                let mut path = Vec::new();
                i += 1;
                while i < chars.len() && is_ident_start(chars[i]) {
                    let start = i;
                    while i < chars.len() && is_ident_char(chars[i]) {
                        i += 1;
                    }
                    path.push(chars[start..i].iter().collect());
                    if i + 1 < chars.len() && chars[i] == '.' && is_ident_start(chars[i + 1]) {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(if path.is_empty() { Token::Dot } else { Token::Field(path) });
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| TemplateError::parse(name, format!("bad number syntax: {literal:?}")))?;
                tokens.push(Token::Int(value));
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(TemplateError::parse(
                    name,
                    format!("unexpected {other:?} in command"),
                ))
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parsing

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Eof,
    End,
    Else,
}

struct Parser<'a> {
    name: &'a str,
    items: std::vec::IntoIter<Item>,
}

fn is_function(name: &str) -> bool {
    name == PRINTF || Styles::is_defined(name)
}

impl Parser<'_> {
    fn err(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::parse(self.name, message)
    }

    fn list(&mut self) -> Result<(Vec<Node>, Stop), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.next() {
            let src = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action(src) => src,
            };
            if src.starts_with("/*") {
                if !src.ends_with("*/") {
                    return Err(self.err("unclosed comment"));
                }
                continue;
            }
            let (word, rest) = match src.split_once(char::is_whitespace) {
                Some((word, rest)) => (word, rest.trim()),
                None => (src.as_str(), ""),
            };
            match word {
                "end" | "else" if !rest.is_empty() => {
                    return Err(self.err(format!("unexpected {rest:?} in {word}")));
                }
                "end" => return Ok((nodes, Stop::End)),
                "else" => return Ok((nodes, Stop::Else)),
                "if" | "with" | "range" => nodes.push(self.branch(word, rest)?),
                _ => nodes.push(Node::Action(self.pipeline(&src)?)),
            }
        }
        Ok((nodes, Stop::Eof))
    }

    fn branch(&mut self, keyword: &str, src: &str) -> Result<Node, TemplateError> {
        if src.is_empty() {
            return Err(self.err(format!("missing value for {keyword}")));
        }
        let pipe = self.pipeline(src)?;
        let (body, stop) = self.list()?;
        let otherwise = match stop {
            Stop::End => Vec::new(),
            Stop::Else => match self.list()? {
                (nodes, Stop::End) => nodes,
                (_, Stop::Else) => return Err(self.err(format!("expected end; found else in {keyword}"))),
                (_, Stop::Eof) => return Err(self.err(format!("unexpected EOF in {keyword}"))),
            },
            Stop::Eof => return Err(self.err(format!("unexpected EOF in {keyword}"))),
        };
        let branch = Branch { pipe, body, otherwise };
        Ok(match keyword {
            "if" => Node::If(branch),
            "with" => Node::With(branch),
            _ => Node::Range(branch),
        })
    }

    fn pipeline(&self, src: &str) -> Result<Pipeline, TemplateError> {
        let tokens = tokenize(self.name, src)?;
        let mut cmds = Vec::new();
        for (stage, group) in tokens.split(|token| *token == Token::Pipe).enumerate() {
            if group.is_empty() {
                return Err(self.err("missing command in pipeline"));
            }
            cmds.push(self.command(stage, group)?);
        }
        Ok(Pipeline { cmds })
    }

    fn command(&self, stage: usize, tokens: &[Token]) -> Result<Cmd, TemplateError> {
        match &tokens[0] {
            Token::Ident(name) => {
                if !is_function(name) {
                    return Err(self.err(format!("function {name:?} not defined")));
                }
                let args = tokens[1..]
                    .iter()
                    .map(|token| self.operand(token))
                    .collect::<Result<_, _>>()?;
                Ok(Cmd::Func {
                    name: name.clone(),
                    args,
                })
            }
            _ if stage > 0 => Err(self.err(format!(
                "non executable command in pipeline stage {}",
                stage + 1
            ))),
            _ if tokens.len() > 1 => Err(self.err("can't give argument to non-function")),
            token => Ok(Cmd::Operand(self.operand(token)?)),
        }
    }

    fn operand(&self, token: &Token) -> Result<Operand, TemplateError> {
        Ok(match token {
            Token::Dot => Operand::Dot,
            Token::Field(path) => Operand::Field(path.clone()),
            Token::Str(s) => Operand::Literal(Value::String(s.clone())),
            Token::Int(n) => Operand::Literal(Value::from(*n)),
            Token::Bool(b) => Operand::Literal(Value::Bool(*b)),
            Token::Ident(name) if is_function(name) => Operand::Call(name.clone()),
            Token::Ident(name) => return Err(self.err(format!("function {name:?} not defined"))),
            Token::Pipe => return Err(self.err("unexpected | in operand")),
        })
    }
}

// ---------------------------------------------------------------------------
// Execution

struct Exec<'a> {
    name: &'a str,
    styles: &'a mut Styles,
}

impl Exec<'_> {
    fn err(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::exec(self.name, message)
    }

    fn walk(&mut self, out: &mut String, nodes: &[Node], dot: &Value) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(pipe) => {
                    let value = self.pipeline(pipe, dot)?;
                    out.push_str(&printable(&value));
                }
                Node::If(branch) => {
                    if truthy(&self.pipeline(&branch.pipe, dot)?) {
                        self.walk(out, &branch.body, dot)?;
                    } else {
                        self.walk(out, &branch.otherwise, dot)?;
                    }
                }
                Node::With(branch) => {
                    let value = self.pipeline(&branch.pipe, dot)?;
                    if truthy(&value) {
                        self.walk(out, &branch.body, &value)?;
                    } else {
                        self.walk(out, &branch.otherwise, dot)?;
                    }
                }
                Node::Range(branch) => {
                    let value = self.pipeline(&branch.pipe, dot)?;
                    let elements: Vec<&Value> = match &value {
                        Value::Array(items) => items.iter().collect(),
                        Value::Object(map) => map.values().collect(),
                        Value::Null => Vec::new(),
                        other => {
                            return Err(self.err(format!(
                                "range can't iterate over {}",
                                printable(other)
                            )))
                        }
                    };
                    if elements.is_empty() {
                        self.walk(out, &branch.otherwise, dot)?;
                    }
                    for element in elements {
                        self.walk(out, &branch.body, element)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn pipeline(&mut self, pipe: &Pipeline, dot: &Value) -> Result<Value, TemplateError> {
        let mut piped = None;
        for cmd in &pipe.cmds {
            piped = Some(self.command(cmd, dot, piped.take())?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn command(&mut self, cmd: &Cmd, dot: &Value, piped: Option<Value>) -> Result<Value, TemplateError> {
        match cmd {
            Cmd::Operand(operand) => self.operand(operand, dot),
            Cmd::Func { name, args } => {
                let mut values = args
                    .iter()
                    .map(|arg| self.operand(arg, dot))
                    .collect::<Result<Vec<_>, _>>()?;
                values.extend(piped);
                self.call(name, &values)
            }
        }
    }

    fn operand(&mut self, operand: &Operand, dot: &Value) -> Result<Value, TemplateError> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Field(path) => self.field(dot, path),
            Operand::Call(name) => self.call(name, &[]),
        }
    }

    fn field(&self, dot: &Value, path: &[String]) -> Result<Value, TemplateError> {
        let mut current = dot;
        for name in path {
            current = match current {
                Value::Object(map) => map
                    .get(name)
                    .ok_or_else(|| self.err(format!("can't evaluate field {name}: not present in data")))?,
                other => {
                    return Err(self.err(format!(
                        "can't evaluate field {name} in type {}",
                        kind(other)
                    )))
                }
            };
        }
        Ok(current.clone())
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, TemplateError> {
        if name == PRINTF {
            return self.printf(args).map(Value::String);
        }
        let text = args.last().map(printable);
        self.styles
            .call(name, text.as_deref())
            .map(Value::String)
            .ok_or_else(|| self.err(format!("function {name:?} not defined")))
    }

    fn printf(&self, args: &[Value]) -> Result<String, TemplateError> {
        let Some((Value::String(format), rest)) = args.split_first() else {
            return Err(self.err("printf: format must be a string"));
        };
        let mut rest = rest.iter();
        let mut out = String::new();
        let mut chars = format.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => out.push('%'),
                Some(verb @ ('v' | 's' | 'd')) => match rest.next() {
                    Some(arg) => out.push_str(&printable(arg)),
                    None => out.push_str(&format!("%!{verb}(MISSING)")),
                },
                Some(other) => out.push_str(&format!("%!{other}(BADVERB)")),
                None => out.push_str("%!(NOVERB)"),
            }
        }
        Ok(out)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Text form of a value as it appears in rendered output.
fn printable(value: &Value) -> String {
    match value {
        Value::Null => NO_VALUE.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(printable).collect();
            format!("[{}]", inner.join(" "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{key}:{}", printable(value)))
                .collect();
            format!("map[{}]", inner.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::TemplateErrorKind;
    use crate::style::{Style, SPIN_FRAMES};

    fn render(src: &str, data: Value) -> Result<String, TemplateError> {
        Template::parse("test", src)?.execute(&data, &mut Styles::new())
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render("hello world", Value::Null).unwrap(), "hello world");
    }

    #[test]
    fn field_piped_into_style() {
        let out = render("Hello {{.Name | bold}}", json!({"Name": "World"})).unwrap();
        assert_eq!(out, format!("Hello {}", Style::Bold.apply("World")));
    }

    #[test]
    fn literal_piped_into_color() {
        let out = render(r#"{{"Status" | green}}"#, Value::Null).unwrap();
        assert_eq!(out, Style::Green.apply("Status"));
    }

    #[test]
    fn call_form_matches_pipe_form() {
        let a = render(r#"{{cyan "x"}}"#, Value::Null).unwrap();
        let b = render(r#"{{"x" | cyan}}"#, Value::Null).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nested_fields_and_dot() {
        let data = json!({"Draft": {"UploadState": "SUCCESS"}});
        assert_eq!(render("{{.Draft.UploadState}}", data).unwrap(), "SUCCESS");
        assert_eq!(render("v{{.}}", json!("1.2")).unwrap(), "v1.2");
    }

    #[test]
    fn with_rebinds_dot_and_skips_empty() {
        let src = "S{{with .Draft}} Draft: {{.}}{{end}}{{with .Published}} Published: {{.}}{{end}}";
        let data = json!({"Draft": "PENDING", "Published": ""});
        assert_eq!(render(src, data).unwrap(), "S Draft: PENDING");
    }

    #[test]
    fn if_else_branches() {
        let src = "{{if .Ok}}yes{{else}}no{{end}}";
        assert_eq!(render(src, json!({"Ok": true})).unwrap(), "yes");
        assert_eq!(render(src, json!({"Ok": 0})).unwrap(), "no");
    }

    #[test]
    fn range_over_array_and_empty_else() {
        let src = "{{range .Errors}}[{{.Code}}]{{else}}none{{end}}";
        let data = json!({"Errors": [{"Code": "A"}, {"Code": "B"}]});
        assert_eq!(render(src, data).unwrap(), "[A][B]");
        assert_eq!(render(src, json!({"Errors": []})).unwrap(), "none");
    }

    #[test]
    fn printf_formats_arguments() {
        let src = r#"{{printf "(%v)%v" .Code .Status}}"#;
        let out = render(src, json!({"Code": 404, "Status": "Not Found"})).unwrap();
        assert_eq!(out, "(404)Not Found");
        assert_eq!(render(r#"{{printf "%v%%"}}"#, Value::Null).unwrap(), "%!v(MISSING)%");
    }

    #[test]
    fn trim_markers_eat_whitespace() {
        let src = "a  {{- \"b\" -}}  \n c";
        assert_eq!(render(src, Value::Null).unwrap(), "abc");
    }

    #[test]
    fn comments_render_nothing() {
        assert_eq!(render("a{{/* note */}}b", Value::Null).unwrap(), "ab");
    }

    #[test]
    fn spin_advances_per_invocation() {
        let tmpl = Template::parse("spin", "{{spin}}{{spin}}").unwrap();
        let mut styles = Styles::new();
        let out = tmpl.execute(&Value::Null, &mut styles).unwrap();
        assert_eq!(out, format!("{}{}", SPIN_FRAMES[0], SPIN_FRAMES[1]));
        assert_eq!(tmpl.execute(&Value::Null, &mut styles).unwrap(), SPIN_FRAMES[2..4].concat());
    }

    #[test]
    fn null_prints_no_value() {
        assert_eq!(render("{{.}}", Value::Null).unwrap(), "<no value>");
    }

    #[test]
    fn missing_field_is_exec_error() {
        let err = render("{{.Missing}}", json!({"Name": "x"})).unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::Exec);
        assert!(err.message.contains("Missing"), "{err}");

        let err = render("{{.Name}}", Value::Null).unwrap_err();
        assert!(err.message.contains("type null"), "{err}");
    }

    #[test]
    fn malformed_templates_are_parse_errors() {
        for src in [
            "{{.Name",
            "{{nope}}",
            "{{if .X}}open",
            "{{end}}",
            "{{.A .B}}",
            "{{. | }}",
            "{{\"x\" | .Name}}",
            "{{\"unterminated}}",
        ] {
            let err = Template::parse("bad", src).unwrap_err();
            assert_eq!(err.kind, TemplateErrorKind::Parse, "{src}: {err}");
        }
    }

    #[test]
    fn closing_braces_inside_strings_do_not_end_action() {
        assert_eq!(render(r#"{{"}}"}}"#, Value::Null).unwrap(), "}}");
    }
}
