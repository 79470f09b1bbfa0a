//! Compilation of token definitions into one composite automaton.
//!
//! Every named capture inside a token's pattern is namespaced with the
//! token's name, each start/end fragment is wrapped in an outer
//! `<name>_start` / `<name>_end` group, and all fragments are joined by
//! alternation. Group names are resolved to indices here, once, so the scan
//! only ever works with `CaptureLocations`.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::{CaptureLocations, Captures, Regex, RegexBuilder};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::fragment::Attributes;
use crate::parser::ParserOptions;
use crate::token::{AttrValue, CaptureRef, Role, TokenDefinition, ValueSource};

/// Opening of a named group, with any backslashes directly before it.
static GROUP_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\\*)\(\?P?<([A-Za-z_][A-Za-z0-9_]*)>").expect("group-opening pattern is valid")
});

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Prefix every named group in `pattern` with `<token>_`.
///
/// An escaped parenthesis (`\(?P<x>`) is left alone.
pub(crate) fn namespace_groups(pattern: &str, token: &str) -> String {
    GROUP_OPEN
        .replace_all(pattern, |caps: &Captures<'_>| {
            let escapes = &caps[1];
            if escapes.len() % 2 == 1 {
                caps[0].to_owned()
            } else {
                format!("{}(?P<{}_{}>", escapes, token, &caps[2])
            }
        })
        .into_owned()
}

fn builder(pattern: &str, options: &ParserOptions) -> RegexBuilder {
    let mut builder = RegexBuilder::new(pattern);
    builder
        .dot_matches_new_line(options.dot_matches_newline)
        .multi_line(options.multi_line)
        .case_insensitive(options.case_insensitive);
    if let Some(limit) = options.size_limit {
        builder.size_limit(limit);
    }
    builder
}

/// A literal, or a capture group index fixed at compile time.
#[derive(Debug)]
pub(crate) enum Resolver {
    Literal(AttrValue),
    Capture {
        group: Option<usize>,
        capture: CaptureRef,
    },
}

impl Resolver {
    fn compile(source: &ValueSource, token: &str, groups: &HashMap<String, usize>) -> Self {
        match source {
            ValueSource::Literal(value) => Resolver::Literal(value.clone()),
            ValueSource::Capture(capture) => {
                let name = format!("{}_{}", token, capture.group());
                let group = groups.get(&name).copied();
                if group.is_none() {
                    debug!(token, group = capture.group(), "capture reference names no group");
                }
                Resolver::Capture {
                    group,
                    capture: capture.clone(),
                }
            }
        }
    }

    pub(crate) fn resolve(&self, haystack: &str, locs: &CaptureLocations) -> AttrValue {
        match self {
            Resolver::Literal(value) => value.clone(),
            Resolver::Capture { group, capture } => {
                let captured = group
                    .and_then(|index| locs.get(index))
                    .map(|(start, end)| &haystack[start..end]);
                capture.resolve(captured)
            }
        }
    }
}

/// A token definition together with its precompiled pieces.
#[derive(Debug)]
pub(crate) struct CompiledToken {
    pub(crate) def: TokenDefinition,
    /// End pattern on its own, run against the whole haystack.
    closer: Option<Regex>,
    text: Option<Resolver>,
    attributes: Vec<(String, Resolver)>,
}

impl CompiledToken {
    /// Resolve this token's attributes against a match, overriding `into`.
    pub(crate) fn resolve_attributes(
        &self,
        haystack: &str,
        locs: &CaptureLocations,
        into: &mut Attributes,
    ) {
        for (key, resolver) in &self.attributes {
            into.insert(key.clone(), resolver.resolve(haystack, locs));
        }
    }

    /// Text of a single token: its replacement text, or the matched substring.
    pub(crate) fn resolve_text(&self, haystack: &str, locs: &CaptureLocations, matched: &str) -> String {
        match &self.text {
            Some(resolver) => resolver.resolve(haystack, locs).to_string(),
            None => matched.to_owned(),
        }
    }

    /// End offset of this token's closing delimiter if it matches at `pos`.
    ///
    /// The search sees the text before `pos`, so `\b` and `^` in the end
    /// pattern behave as they do in the composite automaton.
    pub(crate) fn closes_at(&self, haystack: &str, pos: usize) -> Option<usize> {
        let closer = self.closer.as_ref()?;
        closer
            .find_at(haystack, pos)
            .filter(|m| m.start() == pos)
            .map(|m| m.end())
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    group: usize,
    token: usize,
    role: Role,
}

/// The composite pattern plus the outer-group index.
#[derive(Debug)]
pub(crate) struct Automaton {
    regex: Option<Regex>,
    pattern: String,
    tokens: Vec<CompiledToken>,
    slots: Vec<Slot>,
    index: HashMap<String, (usize, Role)>,
}

impl Automaton {
    pub(crate) fn compile(defs: Vec<TokenDefinition>, options: &ParserOptions) -> Result<Self> {
        let mut names = HashSet::new();
        let mut starts: HashMap<&str, &str> = HashMap::new();
        for def in &defs {
            if !is_valid_name(&def.name) {
                return Err(ConfigError::invalid_name(&def.name));
            }
            if !names.insert(def.name.as_str()) {
                return Err(ConfigError::duplicate_name(&def.name));
            }
            if let Some(existing) = starts.insert(def.start.as_str(), def.name.as_str()) {
                return Err(ConfigError::DuplicatePattern {
                    token: def.name.clone(),
                    existing: existing.to_owned(),
                });
            }
        }

        let mut alternatives = Vec::with_capacity(defs.len() * 2);
        let mut outer = Vec::with_capacity(defs.len() * 2);
        let mut closers = Vec::with_capacity(defs.len());

        for (token, def) in defs.iter().enumerate() {
            let start = namespace_groups(&def.start, &def.name);
            let start_role = if def.is_paired() {
                Role::Start
            } else {
                Role::Single
            };
            builder(&start, options)
                .build()
                .map_err(|e| ConfigError::invalid_pattern(&def.name, start_role, e))?;
            let group = format!("{}_{}", def.name, start_role.group_suffix());
            alternatives.push(format!("(?P<{}>{})", group, start));
            outer.push((group, token, start_role));

            let closer = match &def.end {
                Some(end) => {
                    let end = namespace_groups(end, &def.name);
                    let closer = builder(&end, options)
                        .build()
                        .map_err(|e| ConfigError::invalid_pattern(&def.name, Role::End, e))?;
                    let group = format!("{}_{}", def.name, Role::End.group_suffix());
                    alternatives.push(format!("(?P<{}>{})", group, end));
                    outer.push((group, token, Role::End));
                    Some(closer)
                }
                None => None,
            };
            closers.push(closer);
        }

        let pattern = alternatives.join("|");
        let regex = if defs.is_empty() {
            None
        } else {
            Some(builder(&pattern, options).build().map_err(ConfigError::Composite)?)
        };

        let groups: HashMap<String, usize> = regex
            .iter()
            .flat_map(|regex| regex.capture_names().enumerate())
            .filter_map(|(index, name)| name.map(|name| (name.to_owned(), index)))
            .collect();

        let slots = outer
            .iter()
            .filter_map(|(name, token, role)| {
                groups.get(name).map(|&group| Slot {
                    group,
                    token: *token,
                    role: *role,
                })
            })
            .collect();
        let index = outer
            .into_iter()
            .map(|(name, token, role)| (name, (token, role)))
            .collect();

        let tokens = defs
            .into_iter()
            .zip(closers)
            .map(|(def, closer)| {
                let text = def
                    .text
                    .as_ref()
                    .map(|source| Resolver::compile(source, &def.name, &groups));
                let attributes = def
                    .attributes
                    .iter()
                    .map(|(key, source)| (key.clone(), Resolver::compile(source, &def.name, &groups)))
                    .collect();
                CompiledToken {
                    def,
                    closer,
                    text,
                    attributes,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            tokens = tokens.len(),
            groups = groups.len(),
            "compiled token automaton"
        );

        Ok(Self {
            regex,
            pattern,
            tokens,
            slots,
            index,
        })
    }

    /// Fresh capture slots for one scan, or `None` when no tokens exist.
    pub(crate) fn capture_locations(&self) -> Option<CaptureLocations> {
        self.regex.as_ref().map(Regex::capture_locations)
    }

    /// Next match at or after `start`, as a byte range.
    pub(crate) fn find_at(
        &self,
        locs: &mut CaptureLocations,
        haystack: &str,
        start: usize,
    ) -> Option<(usize, usize)> {
        let regex = self.regex.as_ref()?;
        regex
            .captures_read_at(locs, haystack, start)
            .map(|m| (m.start(), m.end()))
    }

    /// The token and role whose outer group took part in the last match.
    pub(crate) fn classify(&self, locs: &CaptureLocations) -> Option<(usize, Role)> {
        self.slots
            .iter()
            .find(|slot| locs.get(slot.group).is_some())
            .map(|slot| (slot.token, slot.role))
    }

    #[inline]
    pub(crate) fn token(&self, index: usize) -> &CompiledToken {
        &self.tokens[index]
    }

    pub(crate) fn tokens(&self) -> impl Iterator<Item = &TokenDefinition> {
        self.tokens.iter().map(|token| &token.def)
    }

    pub(crate) fn lookup(&self, group: &str) -> Option<(usize, Role)> {
        self.index.get(group).copied()
    }

    pub(crate) fn pattern(&self) -> &str {
        &self.pattern
    }
}
