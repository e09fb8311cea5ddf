//! The value a `grammar` declaration evaluates to.
//!
//! Grammars are kept as plain data: the productions are recorded in source order and no
//! classification or rewriting happens here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One symbol on the right-hand side of a production.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrammarSymbol {
    Terminal(String),
    NonTerminal(String),
}

/// `head -> body`. An empty body derives the empty word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub head: String,
    pub body: Vec<GrammarSymbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    pub start: String,
    pub productions: Vec<Production>,
}

impl Grammar {
    pub fn new(start: impl Into<String>, productions: Vec<Production>) -> Self {
        Self {
            start: start.into(),
            productions,
        }
    }

    /// Every non-terminal that heads a production or is referenced by one, plus the start
    /// symbol.
    pub fn non_terminals(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::from([self.start.as_str()]);
        for production in &self.productions {
            names.insert(production.head.as_str());
            for symbol in &production.body {
                if let GrammarSymbol::NonTerminal(name) = symbol {
                    names.insert(name.as_str());
                }
            }
        }
        names
    }

    pub fn terminals(&self) -> BTreeSet<&str> {
        self.productions
            .iter()
            .flat_map(|production| &production.body)
            .filter_map(|symbol| match symbol {
                GrammarSymbol::Terminal(value) => Some(value.as_str()),
                GrammarSymbol::NonTerminal(_) => None,
            })
            .collect()
    }

    /// The productions whose head is `head`, in source order.
    pub fn productions_of<'a>(&'a self, head: &'a str) -> impl Iterator<Item = &'a Production> {
        self.productions.iter().filter(move |p| p.head == head)
    }

    /// Non-terminals that are referenced but never appear as a head.
    pub fn undefined_non_terminals(&self) -> BTreeSet<&str> {
        let heads: BTreeSet<&str> = self.productions.iter().map(|p| p.head.as_str()).collect();
        self.non_terminals()
            .into_iter()
            .filter(|name| !heads.contains(name))
            .collect()
    }
}

impl fmt::Display for GrammarSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarSymbol::Terminal(value) => write!(f, "{value:?}"),
            GrammarSymbol::NonTerminal(name) => write!(f, "<{name}>"),
        }
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> ->", self.head)?;
        if self.body.is_empty() {
            return write!(f, " $eps");
        }
        for symbol in &self.body {
            write!(f, " {symbol}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "start <{}>", self.start)?;
        for production in &self.productions {
            writeln!(f, "{production}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced() -> Grammar {
        use GrammarSymbol::*;
        Grammar::new(
            "S",
            vec![
                Production {
                    head: "S".into(),
                    body: vec![Terminal("a".into()), NonTerminal("S".into()), Terminal("b".into())],
                },
                Production {
                    head: "S".into(),
                    body: vec![],
                },
                Production {
                    head: "T".into(),
                    body: vec![NonTerminal("U".into())],
                },
            ],
        )
    }

    #[test]
    fn test_symbol_sets() {
        let g = balanced();

        assert_eq!(g.non_terminals(), BTreeSet::from(["S", "T", "U"]));
        assert_eq!(g.terminals(), BTreeSet::from(["a", "b"]));
        assert_eq!(g.undefined_non_terminals(), BTreeSet::from(["U"]));
        assert_eq!(g.productions_of("S").count(), 2);
    }

    #[test]
    fn test_display() {
        let text = balanced().to_string();

        assert!(text.starts_with("start <S>\n"));
        assert!(text.contains("<S> -> \"a\" <S> \"b\"\n"));
        assert!(text.contains("<S> -> $eps\n"));
    }
}
