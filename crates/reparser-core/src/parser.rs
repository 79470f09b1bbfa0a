//! Single-pass scanner over the composite automaton.
//!
//! `parse` walks the matches of the compiled automaton from left to right,
//! keeping a stack of open tokens. Malformed markup never fails: stray end
//! delimiters are swallowed and unclosed tokens keep styling the trailing
//! text.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;

use regex::CaptureLocations;
use tracing::{debug, trace};

use crate::automaton::Automaton;
use crate::error::{ConfigError, HookError, HookStage, Result};
use crate::fragment::{Attributes, Fragment};
use crate::span::Span;
use crate::token::{Role, TokenDefinition};

/// Compilation options for the composite automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// `.` matches `\n` (markup may span lines).
    pub dot_matches_newline: bool,
    /// `^` and `$` match at line boundaries.
    pub multi_line: bool,
    pub case_insensitive: bool,
    /// Upper bound on the compiled automaton's size in bytes.
    pub size_limit: Option<usize>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            dot_matches_newline: true,
            multi_line: true,
            case_insensitive: false,
            size_limit: None,
        }
    }
}

impl ParserOptions {
    pub fn with_dot_matches_newline(mut self, yes: bool) -> Self {
        self.dot_matches_newline = yes;
        self
    }

    pub fn with_multi_line(mut self, yes: bool) -> Self {
        self.multi_line = yes;
        self
    }

    pub fn with_case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    pub fn with_size_limit(mut self, bytes: usize) -> Self {
        self.size_limit = Some(bytes);
        self
    }
}

/// Text hooks run around the scan.
///
/// Both default to the identity. `postprocess` only sees plain text between
/// tokens, never a single token's replacement text.
pub trait Hooks {
    /// Runs once on the whole input before scanning.
    fn preprocess<'t>(&self, text: &'t str) -> std::result::Result<Cow<'t, str>, HookError> {
        Ok(Cow::Borrowed(text))
    }

    /// Runs once per emitted plain-text span.
    fn postprocess<'t>(&self, span: &'t str) -> std::result::Result<Cow<'t, str>, HookError> {
        Ok(Cow::Borrowed(span))
    }
}

/// Hooks that leave text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Hooks for Identity {}

static IDENTITY: Identity = Identity;

/// Inline markup parser built from an ordered list of token definitions.
///
/// The compiled automaton is immutable; one `Parser` can serve any number of
/// concurrent `parse` calls.
pub struct Parser {
    automaton: Automaton,
    options: ParserOptions,
    hooks: Box<dyn Hooks + Send + Sync>,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("tokens", &self.automaton.tokens().map(|t| &t.name).collect::<Vec<_>>())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// Compile `tokens` with default options.
    pub fn new(tokens: impl IntoIterator<Item = TokenDefinition>) -> Result<Self> {
        Self::with_options(tokens, ParserOptions::default())
    }

    pub fn with_options(
        tokens: impl IntoIterator<Item = TokenDefinition>,
        options: ParserOptions,
    ) -> Result<Self> {
        let automaton = Automaton::compile(tokens.into_iter().collect(), &options)?;
        Ok(Self {
            automaton,
            options,
            hooks: Box::new(Identity),
        })
    }

    /// Install hooks used by [`parse`](Self::parse).
    pub fn with_hooks(mut self, hooks: impl Hooks + Send + Sync + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Token definitions in registration order.
    pub fn tokens(&self) -> impl Iterator<Item = &TokenDefinition> {
        self.automaton.tokens()
    }

    /// The composite pattern source.
    pub fn pattern(&self) -> &str {
        self.automaton.pattern()
    }

    /// Resolve an outer capture name (`bold_start`, `bold_end`, ...) to its token and role.
    pub fn lookup(&self, group: &str) -> Option<(&TokenDefinition, Role)> {
        self.automaton
            .lookup(group)
            .map(|(token, role)| (&self.automaton.token(token).def, role))
    }

    /// Parse `text` with the installed hooks.
    ///
    /// Fails only if `preprocess` fails; the returned iterator yields an
    /// error only if `postprocess` fails.
    pub fn parse<'p, 't>(&'p self, text: &'t str) -> Result<Fragments<'p, 't>> {
        self.parse_with(text, self.hooks.as_ref())
    }

    /// Parse `text` with hooks supplied for this call only.
    pub fn parse_with<'p, 't>(
        &'p self,
        text: &'t str,
        hooks: &'p dyn Hooks,
    ) -> Result<Fragments<'p, 't>> {
        let text = hooks
            .preprocess(text)
            .map_err(|e| ConfigError::hook(HookStage::Preprocess, e))?;
        Ok(Fragments::new(&self.automaton, hooks, text))
    }

    /// Parse `text` without hooks.
    pub fn parse_plain<'p, 't>(&'p self, text: &'t str) -> Fragments<'p, 't> {
        Fragments::new(&self.automaton, &IDENTITY, Cow::Borrowed(text))
    }

    /// Parse eagerly into a vector.
    pub fn parse_to_vec(&self, text: &str) -> Result<Vec<Fragment>> {
        self.parse(text)?.collect()
    }
}

/// A token that has been opened and not yet closed.
#[derive(Debug)]
struct OpenToken {
    token: usize,
    /// Attributes resolved against the opening match.
    attributes: Attributes,
}

/// Lazy iterator over the fragments of one input.
///
/// Each call to `next` runs the scan only as far as needed to produce the
/// next fragment. Dropping the iterator abandons the scan.
pub struct Fragments<'p, 't> {
    automaton: &'p Automaton,
    hooks: &'p dyn Hooks,
    text: Cow<'t, str>,
    locs: Option<CaptureLocations>,
    /// Where the next automaton search starts.
    search_from: usize,
    /// End of the previous match, used to reject an empty match right after it.
    last_match_end: Option<usize>,
    /// End of text already accounted for.
    cursor: usize,
    stack: Vec<OpenToken>,
    /// Union of the open tokens' attributes.
    inherited: Attributes,
    queue: VecDeque<Fragment>,
    finished: bool,
}

impl<'p, 't> Fragments<'p, 't> {
    fn new(automaton: &'p Automaton, hooks: &'p dyn Hooks, text: Cow<'t, str>) -> Self {
        Self {
            automaton,
            hooks,
            text,
            locs: automaton.capture_locations(),
            search_from: 0,
            last_match_end: None,
            cursor: 0,
            stack: Vec::new(),
            inherited: Attributes::new(),
            queue: VecDeque::with_capacity(2),
            finished: false,
        }
    }

    /// The preprocessed input being scanned; spans index into this.
    pub fn source(&self) -> &str {
        &self.text
    }

    /// Number of tokens currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    fn skipping(&self) -> bool {
        self.stack
            .last()
            .is_some_and(|open| self.automaton.token(open.token).def.skip)
    }

    fn rebuild_inherited(&mut self) {
        self.inherited.clear();
        for open in &self.stack {
            self.inherited
                .extend(open.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    /// Queue plain text between the cursor and `end`, if any.
    fn flush_text(&mut self, end: usize) -> Result<()> {
        if self.cursor >= end {
            return Ok(());
        }
        let span = Span::new(self.cursor, end);
        let text = self
            .hooks
            .postprocess(&self.text[span.start..span.end])
            .map_err(|e| ConfigError::hook(HookStage::Postprocess, e))?
            .into_owned();
        self.queue
            .push_back(Fragment::new(text, self.inherited.clone(), span));
        self.cursor = end;
        Ok(())
    }

    /// Find the next match, skipping an empty match that abuts the previous one.
    fn next_match(&mut self) -> Option<(usize, usize, usize, Role)> {
        let locs = self.locs.as_mut()?;
        loop {
            if self.search_from > self.text.len() {
                return None;
            }
            let (start, end) = self.automaton.find_at(locs, &self.text, self.search_from)?;
            if start == end {
                self.search_from = next_boundary(&self.text, end);
                if self.last_match_end == Some(end) {
                    continue;
                }
            } else {
                self.search_from = end;
            }
            self.last_match_end = Some(end);
            let (token, role) = self.automaton.classify(locs)?;
            return Some((start, end, token, role));
        }
    }

    /// Process one match. Returns `false` once the input is exhausted.
    fn step(&mut self) -> Result<bool> {
        let Some((start, mut end, token, mut role)) = self.next_match() else {
            self.flush_text(self.text.len())?;
            if !self.stack.is_empty() {
                debug!(open = self.stack.len(), "unclosed tokens at end of input");
            }
            return Ok(false);
        };

        let automaton = self.automaton;
        let compiled = automaton.token(token);
        let skipping = self.skipping();

        // A start delimiter of an open token that also reads as its end closes it.
        if role == Role::Start && self.stack.iter().any(|open| open.token == token) {
            if let Some(close_end) = compiled.closes_at(&self.text, start) {
                role = Role::End;
                if close_end > start {
                    end = close_end;
                    self.search_from = end;
                    self.last_match_end = Some(end);
                }
            }
        }

        trace!(
            token = %compiled.def.name,
            %role,
            start,
            end,
            skipping,
            "match"
        );

        if role == Role::End {
            let innermost = self.stack.last().is_some_and(|open| open.token == token);
            if skipping && !innermost {
                return Ok(true);
            }
            self.flush_text(start)?;
            match self.stack.iter().rposition(|open| open.token == token) {
                Some(index) => {
                    self.stack.remove(index);
                    self.rebuild_inherited();
                }
                None => {
                    debug!(
                        token = %compiled.def.name,
                        start,
                        "stray end delimiter swallowed"
                    );
                }
            }
            self.cursor = end;
            return Ok(true);
        }

        if skipping {
            return Ok(true);
        }

        self.flush_text(start)?;
        let Some(locs) = self.locs.as_ref() else {
            return Ok(false);
        };
        match role {
            Role::Start => {
                let mut attributes = Attributes::new();
                compiled.resolve_attributes(&self.text, locs, &mut attributes);
                self.stack.push(OpenToken { token, attributes });
                self.rebuild_inherited();
            }
            Role::Single => {
                let text = compiled.resolve_text(&self.text, locs, &self.text[start..end]);
                let mut attributes = self.inherited.clone();
                compiled.resolve_attributes(&self.text, locs, &mut attributes);
                self.queue
                    .push_back(Fragment::new(text, attributes, Span::new(start, end)));
            }
            Role::End => {}
        }
        self.cursor = end;
        Ok(true)
    }
}

impl Iterator for Fragments<'_, '_> {
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(fragment) = self.queue.pop_front() {
                return Some(Ok(fragment));
            }
            if self.finished {
                return None;
            }
            match self.step() {
                Ok(true) => {}
                Ok(false) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    self.queue.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl std::iter::FusedIterator for Fragments<'_, '_> {}

/// Byte offset of the character boundary after `pos` (or one past the end).
fn next_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(pos + 1, |c| pos + c.len_utf8())
}
