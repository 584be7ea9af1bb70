//! Graph loading: runs build.hm parsing and constructs the target graph and
//! mode registry from it.

use crate::command::{self, Token};
use crate::eval::{self, EvalString};
use crate::graph::{Action, FileLoc, Graph, GraphError, TargetId, TargetSpec};
use crate::mode::ModeRegistry;
use crate::parse::{self, Statement, Word};
use crate::require::Requirement;
use crate::smallmap::SmallMap;
use crate::trace;
use anyhow::{anyhow, bail};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

/// Variable lookup for `$var` references embedded in a larger word.  Only
/// variables holding plain text may be used this way; multiple tokens are
/// joined with spaces.
struct TextVars<'a>(&'a SmallMap<String, Vec<Token>>);

impl<'a> eval::Env for TextVars<'a> {
    fn get_var(&self, var: &str) -> Option<Cow<str>> {
        let tokens = self.0.get(var)?;
        let text: Vec<&str> = tokens
            .iter()
            .filter_map(|token| match token {
                Token::Literal(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        Some(Cow::Owned(text.join(" ")))
    }
}

/// A target as declared, before names are resolved to ids.
struct Decl {
    name: String,
    loc: FileLoc,
    doc: Option<String>,
    out: Option<String>,
    sources: Vec<String>,
    deps: Vec<String>,
    members: Vec<String>,
    is_virtual: bool,
    requirements: Vec<Requirement>,
    action: Action,
}

/// Words of an attribute that only accepts paths or names.  Globs expand now.
fn literals(tokens: Vec<Token>) -> anyhow::Result<Vec<String>> {
    let mut words = Vec::new();
    for token in tokens {
        match token {
            Token::Literal(s) => words.push(s),
            Token::Glob(pattern) => words.extend(command::expand_glob(&pattern)?),
            Token::Mode | Token::Run(_) => bail!("$mode and $(...) are only allowed in commands"),
        }
    }
    Ok(words)
}

fn single(tokens: Vec<Token>) -> anyhow::Result<String> {
    let mut words = literals(tokens)?;
    if words.len() != 1 {
        bail!("expected one word, got {}", words.len());
    }
    Ok(words.remove(0))
}

fn boolean(tokens: Vec<Token>) -> anyhow::Result<bool> {
    match single(tokens)?.as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => bail!("expected true or false, got {:?}", other),
    }
}

fn requirement(words: Vec<String>) -> anyhow::Result<Requirement> {
    let Some((kind, args)) = words.split_first() else {
        bail!("empty requirement");
    };
    Ok(match (kind.as_str(), args) {
        ("exists", [path]) => Requirement::Exists(path.clone()),
        ("mode", [mode]) => Requirement::Mode(mode.clone()),
        ("not-mode", [mode]) => Requirement::NotMode(mode.clone()),
        ("succeeds", argv) if !argv.is_empty() => Requirement::Succeeds(argv.to_vec()),
        ("exists" | "mode" | "not-mode", _) => bail!("{} takes one argument", kind),
        ("succeeds", _) => bail!("succeeds needs a command"),
        _ => bail!("unknown requirement {:?}", kind),
    })
}

/// Internal state used while loading.
#[derive(Default)]
struct Loader {
    vars: SmallMap<String, Vec<Token>>,
    modes: ModeRegistry,
    default: Vec<String>,
    decls: Vec<Decl>,
}

impl Loader {
    /// Text of a word, with `$var` references expanded.
    fn text(&self, word: &EvalString<&str>) -> anyhow::Result<String> {
        for var in word.var_refs() {
            match self.vars.get(var) {
                _ if var == "mode" => bail!("$mode must be a word of its own"),
                None => bail!("undefined variable ${}", var),
                Some(tokens) if tokens.iter().any(|t| !matches!(t, Token::Literal(_))) => {
                    bail!("${} holds more than text and must be a word of its own", var)
                }
                Some(_) => {}
            }
        }
        Ok(word.evaluate(&TextVars(&self.vars)))
    }

    fn resolve(&self, words: Vec<Word>) -> anyhow::Result<Vec<Token>> {
        let mut tokens = Vec::new();
        for word in words {
            match word {
                Word::Text(text) => match text.whole_var() {
                    Some("mode") => tokens.push(Token::Mode),
                    Some(var) => match self.vars.get(var) {
                        Some(value) => tokens.extend(value.iter().cloned()),
                        None => bail!("undefined variable ${}", var),
                    },
                    None => tokens.push(Token::Literal(self.text(&text)?)),
                },
                Word::Glob(pattern) => tokens.push(Token::Glob(pattern.to_string())),
                Word::Run(args) => {
                    let argv = args
                        .iter()
                        .map(|arg| self.text(arg))
                        .collect::<anyhow::Result<Vec<_>>>()?;
                    tokens.push(Token::Run(argv));
                }
            }
        }
        Ok(tokens)
    }

    fn add_target(&mut self, filename: &Arc<PathBuf>, target: parse::Target) -> anyhow::Result<()> {
        let mut decl = Decl {
            name: target.name.to_string(),
            loc: FileLoc {
                filename: filename.clone(),
                line: target.line,
            },
            doc: None,
            out: None,
            sources: Vec::new(),
            deps: Vec::new(),
            members: Vec::new(),
            is_virtual: false,
            requirements: Vec::new(),
            action: Action::default(),
        };
        let mut seen: Vec<&str> = Vec::new();
        for attr in target.attrs {
            let loc = FileLoc {
                filename: filename.clone(),
                line: attr.line,
            };
            if attr.key != "requires" {
                if seen.contains(&attr.key) {
                    bail!("{}: duplicate attribute {:?}", loc, attr.key);
                }
                seen.push(attr.key);
            }
            self.resolve(attr.words)
                .and_then(|tokens| apply_attr(&mut decl, attr.key, tokens))
                .map_err(|err| anyhow!("{}: {}", loc, err))?;
        }
        self.decls.push(decl);
        Ok(())
    }

    fn parse(&mut self, path: PathBuf, mut bytes: Vec<u8>) -> anyhow::Result<()> {
        let filename = Arc::new(path);
        if let Err(err) = std::str::from_utf8(&bytes) {
            bail!("{}: {}", filename.display(), err);
        }
        // The parser treats NUL as end of input.
        if let Some(pos) = bytes.iter().position(|&b| b == 0) {
            let line = bytes[..pos].iter().filter(|&&b| b == b'\n').count() + 1;
            bail!("{}:{}: NUL byte in manifest", filename.display(), line);
        }
        bytes.push(0);

        let mut parser = parse::Parser::new(&bytes);
        loop {
            let stmt = match parser
                .read()
                .map_err(|err| anyhow!(parser.format_parse_error(&filename, err)))?
            {
                None => break,
                Some(s) => s,
            };
            match stmt {
                Statement::VarDef(name, words) => {
                    let tokens = self
                        .resolve(words)
                        .map_err(|err| anyhow!("{}: {}: {}", filename.display(), name, err))?;
                    self.vars.insert(name.to_string(), tokens);
                }
                Statement::Mode(name, words) => {
                    let tokens = self
                        .resolve(words)
                        .map_err(|err| anyhow!("{}: mode {}: {}", filename.display(), name, err))?;
                    if tokens.contains(&Token::Mode) {
                        bail!("{}: mode {} refers to $mode", filename.display(), name);
                    }
                    self.modes.register(name, tokens);
                }
                Statement::Default(defaults) => {
                    self.default.extend(defaults.into_iter().map(str::to_string));
                }
                Statement::Target(target) => self.add_target(&filename, target)?,
            }
        }
        Ok(())
    }

    /// Resolve target names to ids and build the graph.
    fn finish(self, config_files: Vec<String>) -> anyhow::Result<State> {
        let mut index: FxHashMap<String, TargetId> = FxHashMap::default();
        for (i, decl) in self.decls.iter().enumerate() {
            if index.insert(decl.name.clone(), TargetId::from(i)).is_some() {
                return Err(GraphError::Duplicate {
                    name: decl.name.clone(),
                    loc: decl.loc.clone(),
                }
                .into());
            }
        }
        let ids = |decl: &Decl, names: &[String]| -> Result<Vec<TargetId>, GraphError> {
            names
                .iter()
                .map(|name| {
                    index
                        .get(name)
                        .copied()
                        .ok_or_else(|| GraphError::UnknownReference {
                            target: decl.name.clone(),
                            name: name.clone(),
                            loc: decl.loc.clone(),
                        })
                })
                .collect()
        };

        let mut graph = Graph::default();
        graph.config_files = config_files;
        for decl in self.decls {
            let deps = ids(&decl, &decl.deps)?;
            let members = ids(&decl, &decl.members)?;
            let out = decl.out.unwrap_or_else(|| decl.name.clone());
            graph.add_target(TargetSpec {
                name: decl.name,
                location: decl.loc,
                doc: decl.doc,
                out,
                sources: decl.sources,
                deps,
                members,
                is_virtual: decl.is_virtual,
                requirements: decl.requirements,
                action: decl.action,
            })?;
        }

        let default = self
            .default
            .iter()
            .map(|name| graph.id(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(State {
            graph,
            modes: self.modes,
            default,
        })
    }
}

fn apply_attr(decl: &mut Decl, key: &str, tokens: Vec<Token>) -> anyhow::Result<()> {
    match key {
        "doc" => decl.doc = Some(literals(tokens)?.join(" ")),
        "out" => decl.out = Some(single(tokens)?),
        "sources" => decl.sources = literals(tokens)?,
        "deps" => decl.deps = literals(tokens)?,
        "targets" => decl.members = literals(tokens)?,
        "virtual" => decl.is_virtual = boolean(tokens)?,
        "requires" => decl.requirements.push(requirement(literals(tokens)?)?),
        "command" => decl.action.command = tokens,
        "stdin" => decl.action.stdin = literals(tokens)?,
        "invalidate_cache" => decl.action.invalidate_cache = boolean(tokens)?,
        _ => bail!("unknown attribute {:?}", key),
    }
    Ok(())
}

/// State loaded by read().
pub struct State {
    pub graph: Graph,
    pub modes: ModeRegistry,
    /// Targets named by `default` statements, in order.
    pub default: Vec<TargetId>,
}

/// Load a manifest.  The manifest itself becomes part of every target's
/// hashed inputs.
pub fn read(build_filename: &str) -> anyhow::Result<State> {
    let bytes = match trace::scope("fs::read", || std::fs::read(build_filename)) {
        Ok(b) => b,
        Err(e) => bail!("read {}: {}", build_filename, e),
    };
    parse(build_filename, bytes)
}

/// Load manifest text that was already read.
pub fn parse(name: &str, content: Vec<u8>) -> anyhow::Result<State> {
    let mut loader = Loader::default();
    trace::scope("loader.parse", || loader.parse(PathBuf::from(name), content))?;
    loader.finish(vec![name.to_string()])
}
