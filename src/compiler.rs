use std::fmt::Display;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompilerError {
    #[error("invalid compiler version `{0}`")]
    InvalidVersion(String),
    #[error("unsupported pragma constraint `{0}`")]
    InvalidConstraint(String),
    #[error("source pragma `{pragma}` does not admit solc {version}")]
    PragmaMismatch { pragma: String, version: String },
}

/// The single solc version a project compiles with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompilerSpec {
    major: u64,
    minor: u64,
    patch: u64,
}

impl CompilerSpec {
    pub fn parse(version: &str) -> Result<Self, CompilerError> {
        let invalid = || CompilerError::InvalidVersion(version.to_string());
        let mut parts = version.trim().split('.');
        let mut next = || -> Result<u64, CompilerError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let spec = CompilerSpec {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(spec)
    }

    /// Checks every `pragma solidity` directive of a source file against this version.
    /// Sources without a pragma are accepted, solc only warns about them.
    pub fn check_source(&self, source: &str) -> Result<(), CompilerError> {
        for pragma in solidity_pragmas(source) {
            if !self.satisfies(&pragma)? {
                return Err(CompilerError::PragmaMismatch {
                    pragma,
                    version: self.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Evaluates a pragma expression such as `^0.8.0`, `>=0.8.0 <0.9.0` or `0.7.6 || ^0.8.0`
    pub fn satisfies(&self, expression: &str) -> Result<bool, CompilerError> {
        for alternative in expression.split("||") {
            let constraints = tokenize(alternative)?;
            if constraints.is_empty() {
                return Err(CompilerError::InvalidConstraint(expression.to_string()));
            }
            let mut matched = true;
            for constraint in &constraints {
                if !constraint.admits(self) {
                    matched = false;
                    break;
                }
            }
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Display for CompilerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Caret,
    Tilde,
}

#[derive(Debug)]
struct Constraint {
    operator: Operator,
    version: CompilerSpec,
    // number of version levels written in the pragma, `0.8` has two
    levels: usize,
    // exclusive upper bound of `^` and `~`
    ceiling: Option<CompilerSpec>,
}

impl Constraint {
    fn new(operator: Operator, version: CompilerSpec, levels: usize) -> Option<Self> {
        let ceiling = match operator {
            Operator::Caret => Some(caret_ceiling(version)?),
            Operator::Tilde => Some(CompilerSpec {
                major: version.major,
                minor: version.minor.checked_add(1)?,
                patch: 0,
            }),
            _ => None,
        };
        Some(Constraint {
            operator,
            version,
            levels,
            ceiling,
        })
    }

    fn admits(&self, version: &CompilerSpec) -> bool {
        // only the written levels take part, `=0.8` admits every 0.8.x
        let ordering = truncate(*version, self.levels).cmp(&truncate(self.version, self.levels));
        match (self.operator, self.ceiling) {
            (Operator::Exact, _) => ordering.is_eq(),
            (Operator::Greater, _) => ordering.is_gt(),
            (Operator::GreaterEq, _) => ordering.is_ge(),
            (Operator::Less, _) => ordering.is_lt(),
            (Operator::LessEq, _) => ordering.is_le(),
            (Operator::Caret | Operator::Tilde, Some(ceiling)) => {
                *version >= self.version && *version < ceiling
            }
            (Operator::Caret | Operator::Tilde, None) => false,
        }
    }
}

fn truncate(version: CompilerSpec, levels: usize) -> CompilerSpec {
    CompilerSpec {
        major: version.major,
        minor: if levels > 1 { version.minor } else { 0 },
        patch: if levels > 2 { version.patch } else { 0 },
    }
}

// ^1.2.3 := <2.0.0, ^0.8.1 := <0.9.0, ^0.0.3 := <0.0.4
fn caret_ceiling(bound: CompilerSpec) -> Option<CompilerSpec> {
    let ceiling = match (bound.major, bound.minor) {
        (0, 0) => CompilerSpec {
            patch: bound.patch.checked_add(1)?,
            ..bound
        },
        (0, minor) => CompilerSpec {
            major: 0,
            minor: minor.checked_add(1)?,
            patch: 0,
        },
        (major, _) => CompilerSpec {
            major: major.checked_add(1)?,
            minor: 0,
            patch: 0,
        },
    };
    Some(ceiling)
}

fn split_operator(token: &str) -> (Option<Operator>, &str) {
    // two-character operators first
    for (prefix, operator) in [
        (">=", Operator::GreaterEq),
        ("<=", Operator::LessEq),
        (">", Operator::Greater),
        ("<", Operator::Less),
        ("=", Operator::Exact),
        ("^", Operator::Caret),
        ("~", Operator::Tilde),
    ] {
        if let Some(rest) = token.strip_prefix(prefix) {
            return (Some(operator), rest);
        }
    }
    (None, token)
}

fn tokenize(expression: &str) -> Result<Vec<Constraint>, CompilerError> {
    let mut constraints = Vec::new();
    let mut pending: Option<Operator> = None;
    for token in expression.split_whitespace() {
        let (operator, rest) = split_operator(token);
        if rest.is_empty() {
            // operator separated from its version, e.g. `>= 0.8.0`
            if pending.is_some() || operator.is_none() {
                return Err(CompilerError::InvalidConstraint(expression.to_string()));
            }
            pending = operator;
            continue;
        }
        let operator = match (pending.take(), operator) {
            (Some(_), Some(_)) => {
                return Err(CompilerError::InvalidConstraint(expression.to_string()))
            }
            (Some(op), None) | (None, Some(op)) => op,
            (None, None) => Operator::Exact,
        };
        let constraint = parse_partial(rest)
            .and_then(|(version, levels)| Constraint::new(operator, version, levels))
            .ok_or_else(|| CompilerError::InvalidConstraint(expression.to_string()))?;
        constraints.push(constraint);
    }
    if pending.is_some() {
        return Err(CompilerError::InvalidConstraint(expression.to_string()));
    }
    Ok(constraints)
}

// `0.8` is kept as `0.8.0` plus the number of levels written
fn parse_partial(version: &str) -> Option<(CompilerSpec, usize)> {
    let mut numbers = [0u64; 3];
    let parts: Vec<&str> = version.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    let version = CompilerSpec {
        major: numbers[0],
        minor: numbers[1],
        patch: numbers[2],
    };
    Some((version, parts.len()))
}

fn solidity_pragmas(source: &str) -> Vec<String> {
    strip_comments(source)
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("pragma")?;
            let rest = rest.trim_start().strip_prefix("solidity")?;
            Some(rest.split(';').next().unwrap_or_default().trim().to_string())
        })
        .collect()
}

// Blanks out `//` and `/* */` comments, keeping line breaks and string literals
fn strip_comments(source: &str) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Code,
        Line,
        Block,
        Quoted(char),
    }
    let mut stripped = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Code => match (c, chars.peek().copied()) {
                ('/', Some('/')) => {
                    chars.next();
                    state = State::Line;
                }
                ('/', Some('*')) => {
                    chars.next();
                    stripped.push(' ');
                    state = State::Block;
                }
                ('"' | '\'', _) => {
                    stripped.push(c);
                    state = State::Quoted(c);
                }
                _ => stripped.push(c),
            },
            State::Line => {
                if c == '\n' {
                    stripped.push(c);
                    state = State::Code;
                }
            }
            State::Block => match (c, chars.peek().copied()) {
                ('*', Some('/')) => {
                    chars.next();
                    state = State::Code;
                }
                ('\n', _) => stripped.push(c),
                _ => {}
            },
            State::Quoted(quote) => {
                stripped.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        stripped.push(escaped);
                    }
                } else if c == quote || c == '\n' {
                    state = State::Code;
                }
            }
        }
    }
    stripped
}
