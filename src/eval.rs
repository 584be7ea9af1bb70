//! Represents manifest words with embedded variable references, e.g.
//! `-I$root/include`, and the mechanism for expanding those into plain text.

use std::borrow::Cow;

/// An environment providing a mapping of variable name to variable value.
pub trait Env {
    fn get_var(&self, var: &str) -> Option<Cow<str>>;
}

/// One token within an EvalString, either literal text or a variable reference.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalPart<T: AsRef<str>> {
    Literal(T),
    VarRef(T),
}

/// A parsed but unexpanded word, e.g. "-I$root/include".
/// This is generic to support EvalString<&str>, which borrows from the
/// manifest text while parsing, and EvalString<String>, which outlives it.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalString<T: AsRef<str>>(Vec<EvalPart<T>>);

impl<T: AsRef<str>> EvalString<T> {
    pub fn new(parts: Vec<EvalPart<T>>) -> Self {
        EvalString(parts)
    }

    pub fn parts(&self) -> &[EvalPart<T>] {
        &self.0
    }

    /// If the word is exactly one variable reference, e.g. `$cflags`, returns
    /// the variable name.  Such words splice a variable's tokens rather than
    /// joining them into text.
    pub fn whole_var(&self) -> Option<&str> {
        match self.0.as_slice() {
            [EvalPart::VarRef(v)] => Some(v.as_ref()),
            _ => None,
        }
    }

    /// Names of all variables referenced by the word.
    pub fn var_refs(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|part| match part {
            EvalPart::VarRef(v) => Some(v.as_ref()),
            EvalPart::Literal(_) => None,
        })
    }

    /// Expand into a String, looking variables up in env.  Unknown variables
    /// expand to nothing.
    pub fn evaluate(&self, env: &dyn Env) -> String {
        let mut val = String::new();
        for part in &self.0 {
            match part {
                EvalPart::Literal(s) => val.push_str(s.as_ref()),
                EvalPart::VarRef(v) => {
                    if let Some(text) = env.get_var(v.as_ref()) {
                        val.push_str(&text);
                    }
                }
            }
        }
        val
    }
}

impl EvalString<&str> {
    pub fn into_owned(self) -> EvalString<String> {
        EvalString(
            self.0
                .into_iter()
                .map(|part| match part {
                    EvalPart::Literal(s) => EvalPart::Literal(s.to_owned()),
                    EvalPart::VarRef(s) => EvalPart::VarRef(s.to_owned()),
                })
                .collect(),
        )
    }
}
